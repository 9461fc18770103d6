//! In-memory stand-ins for the host video and the mounted overlay node.
//!
//! Used by the demo binary to drive the overlay without a browser, and
//! handy in tests of code built on top of `VideoWatermark`.

use crate::media::{Listener, ListenerId, MediaEvent, VideoElement};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use vwm_detect::{NodeSnapshot, ObservedNode, Visibility};
use vwm_timing::Size;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Video element whose playback is driven by hand.
pub struct SimulatedVideo {
    paused: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, (MediaEvent, Listener)>>,
}

impl SimulatedVideo {
    /// Create a paused video
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            paused: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        })
    }

    /// Start playback, firing `play` if it was paused
    pub fn play(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            self.dispatch(MediaEvent::Play);
        }
    }

    /// Pause playback, firing `pause` if it was playing
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            self.dispatch(MediaEvent::Pause);
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn dispatch(&self, event: MediaEvent) {
        // Listeners may add or remove listeners; call them unlocked.
        let targets: Vec<Listener> = lock(&self.listeners)
            .values()
            .filter(|(e, _)| *e == event)
            .map(|(_, l)| l.clone())
            .collect();
        debug!("Video {} -> {} listener(s)", event, targets.len());
        for listener in targets {
            listener();
        }
    }
}

impl VideoElement for SimulatedVideo {
    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn add_listener(&self, event: MediaEvent, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).insert(id, (event, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        lock(&self.listeners).remove(&id).is_some()
    }
}

/// Out-of-band changes a user might make to the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tamper {
    /// Delete the text field element
    RemoveChild,
    /// Inject an extra element
    InjectChild,
    /// Shrink the overlay to nothing
    Collapse,
    /// `visibility: hidden`
    Hide,
    /// `opacity: 0`
    Transparent,
}

/// Overlay node with mutable observable state.
pub struct SimulatedNode {
    snapshot: Mutex<NodeSnapshot>,
    attached: AtomicBool,
}

impl SimulatedNode {
    pub fn new(size: Size, child_count: usize) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(NodeSnapshot::new(size, child_count)),
            attached: AtomicBool::new(true),
        })
    }

    /// Legitimate layout change
    pub fn resize(&self, size: Size) {
        lock(&self.snapshot).size = size;
    }

    /// Remove the node from the document
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub fn apply(&self, tamper: Tamper) {
        let mut s = lock(&self.snapshot);
        match tamper {
            Tamper::RemoveChild => s.child_count = s.child_count.saturating_sub(1),
            Tamper::InjectChild => s.child_count += 1,
            Tamper::Collapse => s.size = Size::ZERO,
            Tamper::Hide => s.visibility = Visibility::Hidden,
            Tamper::Transparent => s.opacity = 0.0,
        }
        debug!("Simulated node tampered: {:?}", tamper);
    }
}

impl ObservedNode for SimulatedNode {
    fn snapshot(&self) -> Option<NodeSnapshot> {
        if !self.attached.load(Ordering::SeqCst) {
            return None;
        }
        Some(*lock(&self.snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_video_dispatch() {
        let video = SimulatedVideo::new();
        let plays = Arc::new(AtomicUsize::new(0));
        let p = plays.clone();
        let id = video.add_listener(MediaEvent::Play, Arc::new(move || {
            p.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(video.is_paused());
        video.play();
        video.play(); // already playing, no event
        assert_eq!(plays.load(Ordering::SeqCst), 1);

        video.pause();
        assert!(video.remove_listener(id));
        assert!(!video.remove_listener(id));
        video.play();
        assert_eq!(plays.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_node_tamper() {
        let node = SimulatedNode::new(Size::new(640, 360), 1);
        node.apply(Tamper::RemoveChild);
        node.apply(Tamper::RemoveChild);
        assert_eq!(node.snapshot().unwrap().child_count, 0);

        node.apply(Tamper::Collapse);
        assert!(node.snapshot().unwrap().size.is_empty());

        node.detach();
        assert!(node.snapshot().is_none());
    }
}
