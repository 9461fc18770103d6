//! vwm Overlay
//!
//! Lifecycle owner of the video watermark overlay. Wires the host video's
//! play/pause events to the active visibility controller, tracks container
//! and text sizes, derives the font size, and turns detector reports into
//! remounts or tamper events.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut watermark = VideoWatermark::new(config, Some(video))?;
//! watermark.mount_node(node);
//! watermark.measure_text(&ApproxMeasure);
//!
//! for event in watermark.poll_events() {
//!     // apply to the rendered overlay
//! }
//! ```

mod config;
mod events;
mod media;
mod sim;
mod text;
mod watermark;

pub use config::{ConfigError, WatermarkConfig, WatermarkMode};
pub use events::OverlayEvent;
pub use media::{ListenerId, MediaEvent, Subscription, VideoElement};
pub use sim::{SimulatedNode, SimulatedVideo, Tamper};
pub use text::{scaled_font_size, ApproxMeasure, FontMeasure, TextError, TextMeasure, DEFAULT_FONT_SIZE};
pub use watermark::{OverlayStyle, VideoWatermark};

pub use vwm_detect::{ModificationKind, NodeSnapshot, ObservedNode, Visibility};
pub use vwm_timing::{Point, Size};
