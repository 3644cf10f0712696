//! Table computation: merge buffers in, render-ready pages out.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Push records │────►│ MergeBuffer  │────►│  Snapshot    │
//! │ (per source) │     │ (bounded)    │     │  (request)   │
//! └──────────────┘     └──────────────┘     └──────┬───────┘
//!                                                  │ pipeline::compute
//!                                                  ▼
//!   filter ──► join/group ──► sort ──► paginate ──► columns ──► common keys
//! ```
//!
//! Everything below [`merge`] is a pure function of the request, so the
//! same snapshot always produces the same response.

pub mod columns;
pub mod common_keys;
pub mod filter;
pub mod join;
pub mod key_codec;
pub mod merge;
pub mod paginate;
pub mod pipeline;
pub mod sort;

pub use key_codec::{KeyLayout, NO_ID};
pub use merge::{ApplyOutcome, BufferSpec, Capacity, MergeBuffer, MergeEvent};
pub use pipeline::compute;
