//! vwm Timing
//!
//! Timer-driven controllers for the watermark overlay:
//! - `Timer`: a single armed, restartable, cancellable repeating timer
//! - `ShowController`: alternates the overlay between hidden and visible
//! - `RandomShowController`: re-rolls the overlay position inside its bounds
//!
//! All controllers run their timers on the tokio runtime that was current
//! when they were constructed and only talk back through callbacks.

mod controller;
mod geometry;
mod random;
mod show;
mod timer;

pub use controller::Controller;
pub use geometry::{random_coord, Point, Size};
pub use random::{RandomShowController, RandomShowOptions, UpdateCadence};
pub use show::{DwellTimes, ShowController, ShowOptions};
pub use timer::{Callback, Timer, TimingError};
