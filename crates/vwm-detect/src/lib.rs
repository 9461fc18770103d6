//! vwm Tamper Detection
//!
//! Periodically compares the mounted watermark node against a baseline
//! snapshot and reports out-of-band changes:
//! - child count changes (field removed, sibling injected) → `Children`
//! - anything else observable (geometry, visibility, opacity) → `Attributes`
//!
//! Detection is best effort and read-only: the detector never writes to the
//! node it observes.

mod detector;
mod node;

pub use detector::{DetectionMode, DetectorOptions, ModificationDetector, ModificationKind};
pub use node::{NodeSnapshot, ObservedNode, Visibility};
