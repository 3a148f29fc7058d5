pub mod html;

use crate::source::RawDocument;
use crate::types::{Record, RecordKind};

pub use html::HtmlExtractor;

/// Turns a raw document into structured records of one kind.
///
/// Implementations fail soft: an item that cannot be read is left out of the
/// result, it never aborts the batch. An empty vector is a valid answer.
pub trait Extractor: Send + Sync {
    fn extract(&self, doc: &RawDocument, kind: RecordKind) -> Vec<Record>;
}
