//! Push feed ingestion: transport seam, wire messages, flush batching.

pub mod batcher;
pub mod events;
pub mod source;

pub use batcher::{BatchItem, FlushBatcher};
pub use events::{PushKind, PushMessage};
pub use source::{into_stream, JsonlSource, PushSource};
