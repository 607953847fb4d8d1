//! DOM-based usage estimation.
//!
//! When a chat site's network traffic yields no usage, the rendered page is
//! the fallback source: each assistant message is counted once it finishes
//! streaming, with tokens estimated from its text and the last user prompt.

pub mod dedupe;
pub mod detector;
pub mod document;
pub mod runner;

#[cfg(test)]
pub(crate) mod fake;

pub use dedupe::{DEDUPE_WINDOW, DedupeWindow};
pub use detector::{StabilityDetector, TrackState};
pub use document::{Document, NodeId};
pub use runner::{DomSignal, ObserverRunner};
