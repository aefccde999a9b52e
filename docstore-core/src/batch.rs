// docstore-core/src/batch.rs
//! `_id`-ordered pagination over a match set
//!
//! Each page is fetched with the base query narrowed to `_id > last seen`,
//! ordered by `DocumentId` and limited to the batch size. The handler runs
//! to completion before the next page is fetched, so at most one page is held
//! at a time. Pages follow `DocumentId` ordering: integers first, then
//! strings bytewise, which is the ordering `$gt` applies within each kind.

use serde_json::{json, Value};
use tracing::debug;

use crate::collection_api::DocumentCollection;
use crate::document::{DocumentId, ID_FIELD};
use crate::error::{DocStoreError, Result};
use crate::find_options::{apply_projection, Projection};

/// Filter selecting ids strictly after `last` in `DocumentId` order
///
/// `$gt` never matches across kinds, so after an integer id every string id
/// is still ahead; `$gte: ""` selects all of them.
fn after_id(last: &DocumentId) -> Value {
    match last {
        DocumentId::Int(i) => json!({"$or": [
            {"_id": {"$gt": i}},
            {"_id": {"$gte": ""}}
        ]}),
        DocumentId::String(s) => json!({"_id": {"$gt": s}}),
    }
}

fn document_id(doc: &Value) -> Result<DocumentId> {
    match doc.get(ID_FIELD) {
        Some(id) => DocumentId::from_value(id),
        None => Err(DocStoreError::InvalidDocument(
            "stored document has no _id".to_string(),
        )),
    }
}

/// Paging options
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Applied to each page after paging; `_id` is always fetched internally
    pub projection: Option<Value>,
}

impl BatchOptions {
    pub fn new(batch_size: usize) -> Self {
        BatchOptions {
            batch_size,
            projection: None,
        }
    }

    pub fn with_projection(mut self, projection: Value) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// Feed `handler` every matching document, `batch_size` at a time
///
/// The handler receives each page and its zero-based index. Returns the
/// number of pages handled; a handler error stops iteration and is returned.
pub fn batch_query<C, F>(collection: &C, query: &Value, batch_size: usize, handler: F) -> Result<usize>
where
    C: DocumentCollection + ?Sized,
    F: FnMut(Vec<Value>, usize) -> Result<()>,
{
    batch_query_with(collection, query, &BatchOptions::new(batch_size), handler)
}

/// `batch_query` with a projection applied to every page
pub fn batch_query_with<C, F>(collection: &C, query: &Value, options: &BatchOptions, mut handler: F) -> Result<usize>
where
    C: DocumentCollection + ?Sized,
    F: FnMut(Vec<Value>, usize) -> Result<()>,
{
    if options.batch_size == 0 {
        return Err(DocStoreError::InvalidQuery(
            "batch_size must be greater than zero".to_string(),
        ));
    }
    let projection = match &options.projection {
        Some(spec) => Projection::parse(spec)?,
        None => None,
    };
    let mut last_seen: Option<DocumentId> = None;
    let mut page_index = 0usize;

    loop {
        let page_query = match &last_seen {
            None => query.clone(),
            Some(last) => json!({"$and": [query, after_id(last)]}),
        };

        let mut keyed = collection
            .find_documents(&page_query, None)?
            .to_array()
            .into_iter()
            .map(|doc| Ok((document_id(&doc)?, doc)))
            .collect::<Result<Vec<(DocumentId, Value)>>>()?;
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        keyed.truncate(options.batch_size);

        let last_id = match keyed.last() {
            Some((id, _)) => id.clone(),
            None => break,
        };
        let page: Vec<Value> = keyed.into_iter().map(|(_, doc)| doc).collect();

        debug!(
            collection = collection.collection_name(),
            page = page_index,
            size = page.len(),
            "batch page"
        );

        let page = match &projection {
            Some(_) => page
                .iter()
                .map(|doc| apply_projection(doc, projection.as_ref()))
                .collect(),
            None => page,
        };
        handler(page, page_index)?;

        last_seen = Some(last_id);
        page_index += 1;
    }

    Ok(page_index)
}
