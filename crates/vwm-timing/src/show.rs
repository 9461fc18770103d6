//! Show/hide oscillator.
//!
//! Alternates the overlay between hidden and visible:
//! - while hidden, waits `DwellTimes::visible` then calls `on_show`
//! - while visible, waits `DwellTimes::hidden` then calls `on_hide`
//!
//! The current state is always read back through `is_visible`, so the
//! controller never shows an overlay that is already visible.

use crate::controller::Controller;
use crate::timer::{Callback, Timer, TimingError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Dwell durations of the oscillator. Both are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DwellTimes {
    /// Delay before a hidden overlay is shown
    visible: Duration,
    /// Delay before a visible overlay is hidden
    hidden: Duration,
}

impl DwellTimes {
    /// Returns `None` if either duration is zero.
    pub fn new(visible: Duration, hidden: Duration) -> Option<Self> {
        if visible.is_zero() || hidden.is_zero() {
            return None;
        }
        Some(Self { visible, hidden })
    }

    /// Build from millisecond options; missing or zero values yield `None`.
    pub fn from_millis(visible: Option<u64>, hidden: Option<u64>) -> Option<Self> {
        Self::new(
            Duration::from_millis(visible?),
            Duration::from_millis(hidden?),
        )
    }

    pub fn visible(&self) -> Duration {
        self.visible
    }

    pub fn hidden(&self) -> Duration {
        self.hidden
    }

    /// Dwell before the next transition, given the current state.
    pub fn next_delay(&self, currently_visible: bool) -> Duration {
        if currently_visible {
            self.hidden
        } else {
            self.visible
        }
    }
}

/// Options for `ShowController`
#[derive(Clone)]
pub struct ShowOptions {
    pub dwell: DwellTimes,
    pub is_visible: Arc<dyn Fn() -> bool + Send + Sync>,
    pub on_show: Callback,
    pub on_hide: Callback,
}

impl ShowOptions {
    pub fn new<V, S, H>(dwell: DwellTimes, is_visible: V, on_show: S, on_hide: H) -> Self
    where
        V: Fn() -> bool + Send + Sync + 'static,
        S: Fn() + Send + Sync + 'static,
        H: Fn() + Send + Sync + 'static,
    {
        Self {
            dwell,
            is_visible: Arc::new(is_visible),
            on_show: Arc::new(on_show),
            on_hide: Arc::new(on_hide),
        }
    }

    /// Same options with `before` run ahead of every `on_show`.
    pub fn with_show_hook<F>(self, before: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let on_show = self.on_show.clone();
        Self {
            on_show: Arc::new(move || {
                before();
                on_show();
            }),
            ..self
        }
    }
}

/// Timer-driven visible/hidden oscillator.
pub struct ShowController {
    timer: Timer,
    transitions: Arc<AtomicU64>,
}

impl ShowController {
    /// Create a stopped controller on the current runtime.
    pub fn new(options: ShowOptions) -> Result<Self, TimingError> {
        let ShowOptions {
            dwell,
            is_visible,
            on_show,
            on_hide,
        } = options;
        let transitions = Arc::new(AtomicU64::new(0));

        let interval = {
            let is_visible = is_visible.clone();
            move || dwell.next_delay(is_visible())
        };

        let toggle = {
            let transitions = transitions.clone();
            move || {
                transitions.fetch_add(1, Ordering::Relaxed);
                if is_visible() {
                    debug!("Watermark dwell elapsed, hiding");
                    on_hide();
                } else {
                    debug!("Watermark dwell elapsed, showing");
                    on_show();
                }
            }
        };

        Ok(Self {
            timer: Timer::new("show", interval, toggle)?,
            transitions,
        })
    }

    /// Number of show/hide transitions since construction or the last reset
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }
}

impl Controller for ShowController {
    fn start(&self) {
        self.timer.start();
    }

    fn stop(&self) {
        self.timer.stop();
    }

    fn reset(&self) {
        self.timer.stop();
        self.transitions.store(0, Ordering::Relaxed);
        info!("Show controller reset");
    }

    fn is_running(&self) -> bool {
        self.timer.is_running()
    }
}
