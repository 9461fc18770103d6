//! Events emitted by the overlay for the owning view.

use vwm_detect::ModificationKind;
use vwm_timing::Point;

/// Messages sent from the overlay's timers and detector to the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayEvent {
    /// Overlay became visible (the view starts its fade-in)
    Shown,
    /// Overlay became hidden
    Hidden,
    /// Random field moved
    Moved { coord: Point },
    /// Watermark subtree must be remounted under a new key
    Remount { key: u64 },
    /// Out-of-band change that a remount does not repair
    ModificationDetected { kind: ModificationKind },
}
