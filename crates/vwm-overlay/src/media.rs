//! Host video element seam.
//!
//! The overlay only needs the paused state and play/pause notifications.
//! Every listener it adds is held as a `Subscription`, which removes the
//! listener again when dropped.

use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Media events the overlay listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEvent {
    Play,
    Pause,
}

impl fmt::Display for MediaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Play => write!(f, "play"),
            Self::Pause => write!(f, "pause"),
        }
    }
}

/// Handle of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Event listener callback
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// A video element that reports playback state changes.
pub trait VideoElement: Send + Sync {
    fn is_paused(&self) -> bool;

    fn add_listener(&self, event: MediaEvent, listener: Listener) -> ListenerId;

    /// Returns false if the listener was not registered
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Check whether two handles refer to the same element
pub fn same_element(a: &Arc<dyn VideoElement>, b: &Arc<dyn VideoElement>) -> bool {
    Arc::ptr_eq(a, b)
}

/// A registered listener, removed on drop.
pub struct Subscription {
    video: Arc<dyn VideoElement>,
    event: MediaEvent,
    id: ListenerId,
}

impl Subscription {
    pub fn new<F>(video: &Arc<dyn VideoElement>, event: MediaEvent, listener: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = video.add_listener(event, Arc::new(listener));
        trace!("Subscribed to {} ({:?})", event, id);
        Self {
            video: video.clone(),
            event,
            id,
        }
    }

    pub fn event(&self) -> MediaEvent {
        self.event
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.video.remove_listener(self.id) {
            trace!("Unsubscribed from {} ({:?})", self.event, self.id);
        }
    }
}
