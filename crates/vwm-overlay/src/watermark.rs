//! Video watermark orchestrator.
//!
//! Owns, per configuration, exactly one visibility controller (stripes:
//! show/hide only; random: show/hide plus placement) and one modification
//! detector. Both are rebuilt from scratch whenever an input they depend on
//! changes; nothing is reconfigured in place.
//!
//! Inputs arrive from the rendering layer (`mount_node`, `on_layout`,
//! `on_text_size_changed`, `on_shown`) and from the host video (play/pause).
//! Outputs are `OverlayEvent`s, drained with `poll_events`, and the current
//! `OverlayStyle`.

use crate::config::{ConfigError, WatermarkConfig, WatermarkMode};
use crate::events::OverlayEvent;
use crate::media::{same_element, MediaEvent, Subscription, VideoElement};
use crate::text::{scaled_font_size, TextMeasure, DEFAULT_FONT_SIZE};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use vwm_detect::{DetectorOptions, ModificationDetector, ModificationKind, ObservedNode};
use vwm_timing::{
    Controller, DwellTimes, Point, RandomShowController, RandomShowOptions, ShowController,
    ShowOptions, Size, UpdateCadence,
};

/// Style the view applies to the overlay root (and field, in random mode).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Re-render key; a new value means remount
    pub key: u64,
    pub hidden: bool,
    /// `None` inherits the surrounding font size
    pub font_size: Option<f64>,
    pub left: i32,
    pub top: i32,
    /// `None` fills the player
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Field offset; only in random mode once the container is known
    pub field: Option<Point>,
}

#[derive(Default)]
struct LayoutState {
    explicit_width: Option<u32>,
    explicit_height: Option<u32>,
    /// Offset geometry of the mounted root
    measured: Size,
    /// Rendered size of the text field
    text: Size,
    coord: Point,
}

impl LayoutState {
    fn container(&self) -> Size {
        Size::new(
            self.explicit_width.unwrap_or(self.measured.width),
            self.explicit_height.unwrap_or(self.measured.height),
        )
    }

    fn bounds(&self) -> Point {
        self.container().max_offset(self.text)
    }
}

/// State shared with timer and detector callbacks.
struct OverlayState {
    visible: AtomicBool,
    render_key: AtomicU64,
    layout: Mutex<LayoutState>,
    detector: Mutex<Option<ModificationDetector>>,
    events: Sender<OverlayEvent>,
}

impl OverlayState {
    fn layout(&self) -> MutexGuard<'_, LayoutState> {
        self.layout.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn detector_slot(&self) -> MutexGuard<'_, Option<ModificationDetector>> {
        self.detector.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn detector(&self) -> Option<ModificationDetector> {
        self.detector_slot().clone()
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn emit(&self, event: OverlayEvent) {
        if self.events.send(event).is_err() {
            trace!("Overlay event dropped: {:?}", event);
        }
    }

    fn show(&self) {
        self.visible.store(true, Ordering::SeqCst);
        self.emit(OverlayEvent::Shown);
    }

    fn hide(&self) {
        self.visible.store(false, Ordering::SeqCst);
        // Suspend before anything can observe the hidden overlay
        if let Some(detector) = self.detector() {
            detector.set_hidden();
        }
        self.emit(OverlayEvent::Hidden);
    }

    fn place(&self, coord: Point) {
        self.layout().coord = coord;
        self.emit(OverlayEvent::Moved { coord });
    }

    fn on_modified(&self, kind: ModificationKind) {
        match kind {
            ModificationKind::Children => {
                let key = self.render_key.fetch_add(1, Ordering::SeqCst) + 1;
                info!("Watermark structure changed, remounting (key {})", key);
                self.emit(OverlayEvent::Remount { key });
            }
            ModificationKind::Attributes => {
                warn!("Watermark integrity compromised");
                self.emit(OverlayEvent::ModificationDetected { kind });
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DetectorKey {
    mode: WatermarkMode,
    interval: Duration,
}

/// Inputs a playback binding was built from, apart from the video itself.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PlaybackKey {
    Stripes {
        dwell: DwellTimes,
    },
    Random {
        dwell: Option<DwellTimes>,
        cadence: UpdateCadence,
        font_size: Option<f64>,
    },
}

/// Active controller plus its play/pause listeners.
struct PlaybackBinding {
    key: PlaybackKey,
    video: Arc<dyn VideoElement>,
    controller: Arc<dyn Controller>,
    subscriptions: Vec<Subscription>,
}

impl Drop for PlaybackBinding {
    fn drop(&mut self) {
        self.subscriptions.clear();
        self.controller.reset();
        debug!("Playback binding torn down");
    }
}

fn show_options(state: &Arc<OverlayState>, dwell: DwellTimes) -> ShowOptions {
    let (s1, s2, s3) = (state.clone(), state.clone(), state.clone());
    ShowOptions::new(dwell, move || s1.is_visible(), move || s2.show(), move || s3.hide())
}

/// Lifecycle owner of one watermark overlay.
pub struct VideoWatermark {
    config: WatermarkConfig,
    video: Option<Arc<dyn VideoElement>>,
    node: Option<Arc<dyn ObservedNode>>,
    state: Arc<OverlayState>,
    events: Receiver<OverlayEvent>,
    detector_key: Option<DetectorKey>,
    playback: Option<PlaybackBinding>,
}

impl VideoWatermark {
    /// Create the overlay. Must be called inside a tokio runtime for the
    /// timers to run; otherwise the overlay stays static.
    pub fn new(
        config: WatermarkConfig,
        video: Option<Arc<dyn VideoElement>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, rx) = unbounded();

        let state = Arc::new(OverlayState {
            visible: AtomicBool::new(true),
            render_key: AtomicU64::new(0),
            layout: Mutex::new(LayoutState {
                explicit_width: config.width,
                explicit_height: config.height,
                ..Default::default()
            }),
            detector: Mutex::new(None),
            events: tx,
        });

        let mut watermark = Self {
            config,
            video,
            node: None,
            state,
            events: rx,
            detector_key: None,
            playback: None,
        };
        watermark.check_inputs();
        watermark.sync();
        info!("Video watermark created ({:?} mode)", watermark.config.mode);
        Ok(watermark)
    }

    /// Replace the configuration and/or video. Parts whose inputs changed
    /// are torn down and rebuilt.
    pub fn reconfigure(
        &mut self,
        config: WatermarkConfig,
        video: Option<Arc<dyn VideoElement>>,
    ) -> Result<(), ConfigError> {
        config.validate()?;
        {
            let mut layout = self.state.layout();
            layout.explicit_width = config.width;
            layout.explicit_height = config.height;
            if config.text != self.config.text {
                // Stale until the field measures the new text
                layout.text = Size::ZERO;
            }
        }
        self.config = config;
        self.video = video;
        self.check_inputs();
        self.sync();
        Ok(())
    }

    pub fn config(&self) -> &WatermarkConfig {
        &self.config
    }

    /// The overlay root was (re)mounted.
    pub fn mount_node(&mut self, node: Arc<dyn ObservedNode>) {
        if let Some(snapshot) = node.snapshot() {
            if !snapshot.size.is_empty() {
                self.state.layout().measured = snapshot.size;
            }
        }
        self.node = Some(node.clone());
        if let Some(detector) = self.state.detector() {
            detector.set_node(Some(node));
        }
        debug!("Watermark node mounted (key {})", self.render_key());
        self.sync();
    }

    /// The overlay root was removed.
    pub fn unmount_node(&mut self) {
        self.node = None;
        if let Some(detector) = self.state.detector() {
            detector.set_node(None);
        }
    }

    /// Layout pass: new container geometry for the root.
    pub fn on_layout(&mut self, container: Size) {
        self.state.layout().measured = container;
        if let Some(detector) = self.state.detector() {
            detector.refresh_baseline();
        }
        self.sync();
    }

    /// The text field reported its rendered size.
    pub fn on_text_size_changed(&mut self, size: Size) {
        self.state.layout().text = size;
        if let Some(detector) = self.state.detector() {
            detector.refresh_baseline();
        }
        self.sync();
    }

    /// Measure the text at the current font size and record the result.
    ///
    /// Returns `None` while there is no text or the font size is withheld.
    pub fn measure_text(&mut self, measure: &dyn TextMeasure) -> Option<Size> {
        if self.config.text.is_empty() {
            return None;
        }
        let font_size = match (self.font_size(), self.config.base_font_size) {
            (Some(size), _) => size,
            (None, None) => DEFAULT_FONT_SIZE,
            (None, Some(_)) => return None,
        };
        let size = measure.measure(&self.config.text, font_size);
        trace!("Watermark text measured at {}px: {}", font_size, size);
        self.on_text_size_changed(size);
        Some(size)
    }

    /// The show transition finished; resume tamper checks.
    pub fn on_shown(&self) {
        if !self.is_visible() {
            return;
        }
        if let Some(detector) = self.state.detector() {
            detector.set_visible();
        }
    }

    /// Derived font size; `None` while scaling has no container to scale by.
    pub fn font_size(&self) -> Option<f64> {
        match (self.config.base_font_size, self.config.scale_by_size) {
            (Some(base), Some(scale)) => scaled_font_size(base, scale, self.container_size()),
            (base, _) => base,
        }
    }

    /// Explicit size where configured, measured size otherwise
    pub fn container_size(&self) -> Size {
        self.state.layout().container()
    }

    pub fn text_size(&self) -> Size {
        self.state.layout().text
    }

    pub fn coord(&self) -> Point {
        self.state.layout().coord
    }

    pub fn is_visible(&self) -> bool {
        self.state.is_visible()
    }

    pub fn render_key(&self) -> u64 {
        self.state.render_key.load(Ordering::SeqCst)
    }

    /// Check if a visibility controller is bound to the video
    pub fn is_bound(&self) -> bool {
        self.playback.is_some()
    }

    /// Check if the bound controller has a pending transition
    pub fn is_animating(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|binding| binding.controller.is_running())
    }

    pub fn has_detector(&self) -> bool {
        self.state.detector_slot().is_some()
    }

    pub fn style(&self) -> OverlayStyle {
        let font_size = self.font_size().or(self.config.base_font_size);
        let layout = self.state.layout();
        let field = (self.config.mode == WatermarkMode::Random && !layout.container().is_empty())
            .then_some(layout.coord);

        OverlayStyle {
            key: self.render_key(),
            hidden: !self.is_visible(),
            font_size,
            left: self.config.x.unwrap_or(0),
            top: self.config.y.unwrap_or(0),
            width: self.config.width,
            height: self.config.height,
            field,
        }
    }

    /// Drain pending events (non-blocking).
    pub fn poll_events(&self) -> Vec<OverlayEvent> {
        self.events.try_iter().collect()
    }

    fn check_inputs(&self) {
        if self.config.mode == WatermarkMode::Random && self.video.is_none() {
            warn!("Random watermark needs a video element; placement disabled");
        }
        if self.config.mode == WatermarkMode::Stripes && self.config.dwell_times().is_none() {
            debug!("No show/hide timeouts; stripes stay visible");
        }
    }

    fn sync(&mut self) {
        self.sync_detector();
        self.sync_playback();
    }

    fn sync_detector(&mut self) {
        let desired = self.config.detection_interval().map(|interval| DetectorKey {
            mode: self.config.mode,
            interval,
        });
        if desired == self.detector_key {
            return;
        }
        self.detector_key = desired;

        if let Some(old) = self.state.detector_slot().take() {
            old.destroy();
        }
        let Some(key) = desired else { return };

        let weak = Arc::downgrade(&self.state);
        let options = DetectorOptions::new(key.mode.into(), key.interval, move |kind| {
            if let Some(state) = weak.upgrade() {
                state.on_modified(kind);
            }
        });
        match ModificationDetector::new(options) {
            Ok(detector) => {
                detector.set_node(self.node.clone());
                if !self.is_visible() {
                    detector.set_hidden();
                }
                *self.state.detector_slot() = Some(detector);
            }
            Err(e) => warn!("Modification detection disabled: {}", e),
        }
    }

    /// What the playback binding should be built from, if anything.
    fn desired_playback(&self) -> Option<(PlaybackKey, Arc<dyn VideoElement>)> {
        let video = self.video.clone()?;
        let dwell = self.config.dwell_times();

        let key = match self.config.mode {
            WatermarkMode::Stripes => PlaybackKey::Stripes { dwell: dwell? },
            WatermarkMode::Random => {
                let font_size = self.font_size();
                if self.config.base_font_size.is_some() && font_size.is_none() {
                    return None;
                }
                // Placement needs the field's own measured size
                if self.config.text.is_empty() || self.text_size().height == 0 {
                    return None;
                }
                PlaybackKey::Random {
                    dwell,
                    cadence: self.config.update_cadence(),
                    font_size,
                }
            }
        };
        Some((key, video))
    }

    fn sync_playback(&mut self) {
        let desired = self.desired_playback();
        let unchanged = match (&self.playback, &desired) {
            (Some(binding), Some((key, video))) => {
                binding.key == *key && same_element(&binding.video, video)
            }
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        self.playback = None;
        if let Some((key, video)) = desired {
            self.playback = self.bind(key, video);
        }
    }

    fn bind(&self, key: PlaybackKey, video: Arc<dyn VideoElement>) -> Option<PlaybackBinding> {
        let state = &self.state;

        let built = match key {
            PlaybackKey::Stripes { dwell } => ShowController::new(show_options(state, dwell))
                .map(|c| (Arc::new(c) as Arc<dyn Controller>, None)),
            PlaybackKey::Random { dwell, cadence, .. } => {
                let (s1, s2) = (state.clone(), state.clone());
                let mut options = RandomShowOptions::new(
                    cadence,
                    move || s1.layout().bounds(),
                    move |coord| s2.place(coord),
                );
                if let Some(dwell) = dwell {
                    options = options.with_show(show_options(state, dwell));
                }
                RandomShowController::new(options).map(|c| {
                    let c = Arc::new(c);
                    (c.clone() as Arc<dyn Controller>, Some(c))
                })
            }
        };
        let (controller, random) = match built {
            Ok(built) => built,
            Err(e) => {
                warn!("Watermark controller not started: {}", e);
                return None;
            }
        };

        let subscriptions = vec![
            {
                let c = controller.clone();
                Subscription::new(&video, MediaEvent::Play, move || c.start())
            },
            {
                let c = controller.clone();
                Subscription::new(&video, MediaEvent::Pause, move || c.stop())
            },
        ];

        if !video.is_paused() {
            controller.start();
        } else if let Some(random) = random {
            if state.is_visible() {
                random.update();
            }
        }
        info!("Watermark controller bound: {:?}", key);

        Some(PlaybackBinding {
            key,
            video,
            controller,
            subscriptions,
        })
    }
}

impl Drop for VideoWatermark {
    fn drop(&mut self) {
        self.playback = None;
        if let Some(detector) = self.state.detector_slot().take() {
            detector.destroy();
        }
        debug!("Video watermark dropped");
    }
}
