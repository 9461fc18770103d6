//! Interval-driven modification detector.

use crate::node::{NodeSnapshot, ObservedNode};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use vwm_timing::{Timer, TimingError};

/// Check interval used when none (or zero) is configured
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Layout mode of the observed watermark
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DetectionMode {
    #[default]
    Stripes,
    Random,
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stripes => write!(f, "stripes"),
            Self::Random => write!(f, "random"),
        }
    }
}

/// What kind of out-of-band change was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModificationKind {
    /// Child count changed; the owner remounts the subtree
    Children,
    /// Any other observable change; reported as tampering
    Attributes,
}

impl ModificationKind {
    /// Compare two snapshots. Child count takes precedence.
    pub fn classify(baseline: &NodeSnapshot, current: &NodeSnapshot) -> Option<Self> {
        if baseline.child_count != current.child_count {
            Some(Self::Children)
        } else if baseline != current {
            Some(Self::Attributes)
        } else {
            None
        }
    }
}

impl fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Children => write!(f, "children"),
            Self::Attributes => write!(f, "attributes"),
        }
    }
}

/// Callback for detected modifications
pub type ModifiedCallback = Arc<dyn Fn(ModificationKind) + Send + Sync>;

/// Options for `ModificationDetector`
#[derive(Clone)]
pub struct DetectorOptions {
    pub mode: DetectionMode,
    pub check_interval: Duration,
    pub on_modified: ModifiedCallback,
}

impl DetectorOptions {
    pub fn new<F>(mode: DetectionMode, check_interval: Duration, on_modified: F) -> Self
    where
        F: Fn(ModificationKind) + Send + Sync + 'static,
    {
        Self {
            mode,
            check_interval,
            on_modified: Arc::new(on_modified),
        }
    }
}

#[derive(Default)]
struct DetectorState {
    node: Option<Arc<dyn ObservedNode>>,
    baseline: Option<NodeSnapshot>,
    /// Checking suspended while the owner keeps the overlay hidden
    hidden: bool,
    destroyed: bool,
}

struct Shared {
    mode: DetectionMode,
    on_modified: ModifiedCallback,
    state: Mutex<DetectorState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, DetectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) {
        let node = {
            let state = self.state();
            if state.destroyed || state.hidden {
                return;
            }
            match &state.node {
                Some(node) => node.clone(),
                None => return,
            }
        };

        let Some(current) = node.snapshot() else {
            debug!("Watermark node not observable this tick");
            return;
        };

        let kind = {
            let mut state = self.state();
            if state.destroyed || state.hidden {
                return;
            }
            // Node swapped while it was being measured
            if !state.node.as_ref().is_some_and(|n| Arc::ptr_eq(n, &node)) {
                return;
            }
            match state.baseline.replace(current) {
                Some(baseline) => ModificationKind::classify(&baseline, &current),
                None => None,
            }
        };

        if let Some(kind) = kind {
            warn!("Watermark ({}) modification detected: {}", self.mode, kind);
            (self.on_modified)(kind);
        }
    }
}

/// Periodic, read-only tamper detector for the watermark node.
///
/// Clones share the same state and timer.
#[derive(Clone)]
pub struct ModificationDetector {
    shared: Arc<Shared>,
    timer: Arc<Timer>,
}

impl ModificationDetector {
    /// Create a detector and start its check interval on the current runtime.
    pub fn new(options: DetectorOptions) -> Result<Self, TimingError> {
        let every = if options.check_interval.is_zero() {
            warn!("Zero check interval, using {:?}", DEFAULT_CHECK_INTERVAL);
            DEFAULT_CHECK_INTERVAL
        } else {
            options.check_interval
        };

        let shared = Arc::new(Shared {
            mode: options.mode,
            on_modified: options.on_modified,
            state: Mutex::new(DetectorState::default()),
        });

        let s = shared.clone();
        let timer = Timer::new("modification-check", move || every, move || s.check())?;
        timer.start();
        info!("Modification detector started ({}, every {:?})", options.mode, every);

        Ok(Self {
            shared,
            timer: Arc::new(timer),
        })
    }

    pub fn mode(&self) -> DetectionMode {
        self.shared.mode
    }

    /// Observe `node` (or nothing) from now on, with a fresh baseline.
    pub fn set_node(&self, node: Option<Arc<dyn ObservedNode>>) {
        let baseline = node.as_ref().and_then(|n| n.snapshot());
        let mut state = self.shared.state();
        if state.destroyed {
            return;
        }
        debug!("Detector node {}", if node.is_some() { "attached" } else { "detached" });
        state.node = node;
        state.baseline = baseline;
    }

    /// Suspend checking; the owner is hiding the overlay on purpose.
    pub fn set_hidden(&self) {
        self.shared.state().hidden = true;
    }

    /// Resume checking against a freshly taken baseline.
    pub fn set_visible(&self) {
        self.refresh_baseline();
        self.shared.state().hidden = false;
    }

    /// Re-snapshot the node after a change the owner made itself.
    pub fn refresh_baseline(&self) {
        let node = self.shared.state().node.clone();
        let baseline = node.as_ref().and_then(|n| n.snapshot());
        let mut state = self.shared.state();
        let same_node = match (&state.node, &node) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        if same_node && baseline.is_some() {
            state.baseline = baseline;
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.shared.state().hidden
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.state().destroyed
    }

    /// Stop checking and release the node. Safe to call repeatedly.
    pub fn destroy(&self) {
        self.timer.stop();
        let mut state = self.shared.state();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        state.node = None;
        state.baseline = None;
        info!("Modification detector destroyed");
    }
}
