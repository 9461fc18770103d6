//! Read-only view of the mounted watermark node.

use vwm_timing::Size;

/// Effective visibility of the node, as computed by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Visible,
    /// Laid out but not painted (`visibility: hidden`)
    Hidden,
    /// Removed from layout (`display: none`)
    Collapsed,
}

/// Observable state of the node at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSnapshot {
    /// Offset geometry
    pub size: Size,
    /// Number of direct children
    pub child_count: usize,
    pub visibility: Visibility,
    /// Computed opacity, 0.0–1.0
    pub opacity: f32,
}

impl NodeSnapshot {
    pub fn new(size: Size, child_count: usize) -> Self {
        Self {
            size,
            child_count,
            visibility: Visibility::Visible,
            opacity: 1.0,
        }
    }
}

/// A mounted node the detector may inspect.
///
/// `snapshot` returns `None` when the node is detached or cannot be
/// measured right now; the detector treats that as "nothing observable".
pub trait ObservedNode: Send + Sync {
    fn snapshot(&self) -> Option<NodeSnapshot>;
}
