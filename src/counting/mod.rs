//! Scanning counter: two parallel windows keyed by reference coordinate,
//! one tallying per-position mutation-class counts and depth columns, one
//! tallying distinct sequence-variant observations. In sorted-input mode
//! both emit progressively as their left bound advances, bounding memory by
//! the largest read span.

pub mod mutation_window;
pub mod variant_window;
pub mod window;

pub use mutation_window::MutationCounter;
pub use variant_window::VariantCounter;
pub use window::ScanWindow;
