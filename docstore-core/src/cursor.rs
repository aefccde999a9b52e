// docstore-core/src/cursor.rs
//! Owned cursor over a materialized result set
//!
//! `sort`, `skip` and `limit` consume the cursor and return a new one over
//! the documents not yet read. A projection, if any, is applied as documents
//! leave the cursor so sorting always sees complete documents.

use serde_json::Value;

use crate::error::Result;
use crate::find_options::{apply_projection, apply_sort, Projection, SortSpec};

#[derive(Debug, Clone, Default)]
pub struct Cursor {
    docs: Vec<Value>,
    projection: Option<Projection>,
    position: usize,
}

impl Cursor {
    pub fn new(docs: Vec<Value>) -> Self {
        Cursor {
            docs,
            projection: None,
            position: 0,
        }
    }

    pub fn with_projection(docs: Vec<Value>, projection: Option<Projection>) -> Self {
        Cursor {
            docs,
            projection,
            position: 0,
        }
    }

    fn unread(mut self) -> (Vec<Value>, Option<Projection>) {
        let docs = self.docs.split_off(self.position.min(self.docs.len()));
        (docs, self.projection)
    }

    /// Sort the unread documents by a `{field: 1 | -1}` spec
    pub fn sort(self, spec: &Value) -> Result<Cursor> {
        let spec = SortSpec::parse(spec)?;
        self.sort_by(&spec)
    }

    pub fn sort_by(self, spec: &SortSpec) -> Result<Cursor> {
        let (mut docs, projection) = self.unread();
        apply_sort(&mut docs, spec)?;
        Ok(Cursor::with_projection(docs, projection))
    }

    /// Drop the first `n` unread documents
    pub fn skip(self, n: usize) -> Cursor {
        let (docs, projection) = self.unread();
        let docs = docs.into_iter().skip(n).collect();
        Cursor::with_projection(docs, projection)
    }

    /// Keep at most `n` unread documents
    pub fn limit(self, n: usize) -> Cursor {
        let (mut docs, projection) = self.unread();
        docs.truncate(n);
        Cursor::with_projection(docs, projection)
    }

    /// Next document, or `None` once exhausted
    pub fn next_document(&mut self) -> Option<Value> {
        let doc = self.docs.get(self.position)?;
        self.position += 1;
        Some(apply_projection(doc, self.projection.as_ref()))
    }

    /// Fetch the next chunk of documents (up to `chunk_size`)
    pub fn next_chunk(&mut self, chunk_size: usize) -> Vec<Value> {
        let end = self.position.saturating_add(chunk_size).min(self.docs.len());
        let chunk = self.docs[self.position.min(end)..end]
            .iter()
            .map(|doc| apply_projection(doc, self.projection.as_ref()))
            .collect();
        self.position = end.max(self.position);
        chunk
    }

    /// Materialize every unread document
    pub fn to_array(&mut self) -> Vec<Value> {
        let remaining = self.remaining();
        self.next_chunk(remaining)
    }

    /// Remaining documents in the cursor
    pub fn remaining(&self) -> usize {
        self.docs.len().saturating_sub(self.position)
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.docs.len()
    }
}

impl Iterator for Cursor {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.next_document()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}
