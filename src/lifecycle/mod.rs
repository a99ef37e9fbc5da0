//! Access-Pattern Tracker: records accesses, derives
//! frequency/recency/trend summaries, and nominates migration candidates
//! for the Tiered Storage Engine.

mod tracker;

pub use tracker::{AccessPatternTracker, TrackedMetadata};
