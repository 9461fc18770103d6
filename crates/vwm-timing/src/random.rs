//! Random placement controller.
//!
//! Re-rolls the watermark position inside caller-supplied bounds.
//! Two drivers:
//! - with `show` options, every show transition re-rolls the position
//!   (the field reappears somewhere else)
//! - without, the field stays visible and moves on its own cadence; by
//!   default each interval is drawn anew from 5–20 seconds so the cadence
//!   itself cannot be predicted

use crate::controller::Controller;
use crate::geometry::{random_coord, Point};
use crate::show::{ShowController, ShowOptions};
use crate::timer::{Timer, TimingError};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Default lower bound of the randomized update cadence
pub const DEFAULT_UPDATE_MIN: Duration = Duration::from_secs(5);

/// Default upper bound of the randomized update cadence
pub const DEFAULT_UPDATE_MAX: Duration = Duration::from_secs(20);

/// How often an always-visible field moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateCadence {
    /// Fixed interval
    Fixed(Duration),
    /// Uniformly drawn (whole milliseconds) before every re-arm
    Random { min: Duration, max: Duration },
}

impl Default for UpdateCadence {
    fn default() -> Self {
        UpdateCadence::Random {
            min: DEFAULT_UPDATE_MIN,
            max: DEFAULT_UPDATE_MAX,
        }
    }
}

impl UpdateCadence {
    /// Fixed cadence if `fixed_ms` is given and positive, otherwise a random
    /// cadence over `[min_ms, max_ms]`.
    pub fn from_millis(fixed_ms: Option<u64>, min_ms: u64, max_ms: u64) -> Self {
        match fixed_ms {
            Some(ms) if ms > 0 => UpdateCadence::Fixed(Duration::from_millis(ms)),
            _ => UpdateCadence::Random {
                min: Duration::from_millis(min_ms),
                max: Duration::from_millis(max_ms),
            },
        }
    }

    /// Delay before the next update.
    pub fn next_interval(&self) -> Duration {
        match *self {
            UpdateCadence::Fixed(every) => every,
            UpdateCadence::Random { min, max } => {
                let lo = min.min(max).as_millis() as u64;
                let hi = min.max(max).as_millis() as u64;
                Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
            }
        }
    }
}

/// Options for `RandomShowController`
#[derive(Clone)]
pub struct RandomShowOptions {
    /// Cadence used when there are no show options
    pub cadence: UpdateCadence,
    /// Maximum top-left offset that keeps the field inside its container
    pub get_bounds: Arc<dyn Fn() -> Point + Send + Sync>,
    pub on_update: Arc<dyn Fn(Point) + Send + Sync>,
    /// When set, position changes ride on a show/hide cycle
    pub show: Option<ShowOptions>,
}

impl RandomShowOptions {
    pub fn new<B, U>(cadence: UpdateCadence, get_bounds: B, on_update: U) -> Self
    where
        B: Fn() -> Point + Send + Sync + 'static,
        U: Fn(Point) + Send + Sync + 'static,
    {
        Self {
            cadence,
            get_bounds: Arc::new(get_bounds),
            on_update: Arc::new(on_update),
            show: None,
        }
    }

    pub fn with_show(mut self, show: ShowOptions) -> Self {
        self.show = Some(show);
        self
    }
}

struct Placer {
    get_bounds: Arc<dyn Fn() -> Point + Send + Sync>,
    on_update: Arc<dyn Fn(Point) + Send + Sync>,
}

impl Placer {
    fn update(&self) {
        let bounds = (self.get_bounds)();
        let coord = Point::new(random_coord(bounds.x), random_coord(bounds.y));
        trace!("Watermark placed at {} within {}", coord, bounds);
        (self.on_update)(coord);
    }
}

enum Driver {
    Show(ShowController),
    Cadence(Timer),
}

/// Randomly repositioning controller.
pub struct RandomShowController {
    placer: Arc<Placer>,
    driver: Driver,
}

impl RandomShowController {
    /// Create a stopped controller on the current runtime.
    pub fn new(options: RandomShowOptions) -> Result<Self, TimingError> {
        let placer = Arc::new(Placer {
            get_bounds: options.get_bounds,
            on_update: options.on_update,
        });

        let driver = match options.show {
            Some(show) => {
                let p = placer.clone();
                Driver::Show(ShowController::new(show.with_show_hook(move || p.update()))?)
            }
            None => {
                let cadence = options.cadence;
                let p = placer.clone();
                let timer = Timer::new(
                    "random-update",
                    move || {
                        let next = cadence.next_interval();
                        trace!("Next watermark move in {:?}", next);
                        next
                    },
                    move || p.update(),
                )?;
                Driver::Cadence(timer)
            }
        };

        Ok(Self { placer, driver })
    }

    /// Draw a new position inside the current bounds and report it.
    pub fn update(&self) {
        self.placer.update();
    }
}

impl Controller for RandomShowController {
    fn start(&self) {
        match &self.driver {
            Driver::Show(show) => show.start(),
            Driver::Cadence(timer) => {
                if timer.is_running() {
                    return;
                }
                self.placer.update();
                timer.start();
            }
        }
    }

    fn stop(&self) {
        match &self.driver {
            Driver::Show(show) => show.stop(),
            Driver::Cadence(timer) => timer.stop(),
        }
    }

    fn reset(&self) {
        match &self.driver {
            Driver::Show(show) => show.reset(),
            Driver::Cadence(timer) => timer.stop(),
        }
        debug!("Random controller reset");
    }

    fn is_running(&self) -> bool {
        match &self.driver {
            Driver::Show(show) => show.is_running(),
            Driver::Cadence(timer) => timer.is_running(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::show::DwellTimes;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::time::sleep;

    fn recorder() -> (Arc<Mutex<Vec<Point>>>, impl Fn(Point) + Send + Sync + 'static) {
        let points = Arc::new(Mutex::new(Vec::new()));
        let p = points.clone();
        (points, move |coord| p.lock().unwrap().push(coord))
    }

    #[test]
    fn test_cadence_from_millis() {
        assert_eq!(
            UpdateCadence::from_millis(Some(3000), 5000, 20000),
            UpdateCadence::Fixed(Duration::from_secs(3))
        );
        assert_eq!(UpdateCadence::from_millis(None, 5000, 20000), UpdateCadence::default());
        // A zero fixed timeout falls back to the random cadence
        assert_eq!(UpdateCadence::from_millis(Some(0), 5000, 20000), UpdateCadence::default());
    }

    #[test]
    fn test_random_cadence_range() {
        let cadence = UpdateCadence::default();
        let mut distinct = std::collections::HashSet::new();
        for _ in 0..500 {
            let next = cadence.next_interval();
            assert!(next >= DEFAULT_UPDATE_MIN && next <= DEFAULT_UPDATE_MAX);
            distinct.insert(next);
        }
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_random_cadence_inverted_range() {
        let cadence = UpdateCadence::Random {
            min: Duration::from_secs(2),
            max: Duration::from_secs(1),
        };
        for _ in 0..100 {
            let next = cadence.next_interval();
            assert!(next >= Duration::from_secs(1) && next <= Duration::from_secs(2));
        }
    }

    #[tokio::test]
    async fn test_update_stays_in_bounds() {
        let container = Size::new(200, 100);
        let text = Size::new(50, 20);
        let (points, on_update) = recorder();
        let options = RandomShowOptions::new(
            UpdateCadence::default(),
            move || container.max_offset(text),
            on_update,
        );
        let controller = RandomShowController::new(options).unwrap();

        for _ in 0..1000 {
            controller.update();
        }
        let points = points.lock().unwrap();
        assert_eq!(points.len(), 1000);
        assert!(points.iter().all(|p| (0..=150).contains(&p.x) && (0..=80).contains(&p.y)));
    }

    #[tokio::test]
    async fn test_update_with_degenerate_bounds() {
        let (points, on_update) = recorder();
        let options =
            RandomShowOptions::new(UpdateCadence::default(), || Point::new(-30, 0), on_update);
        let controller = RandomShowController::new(options).unwrap();

        controller.update();
        assert_eq!(*points.lock().unwrap(), vec![Point::ORIGIN]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_updates_immediately_then_on_cadence() {
        let (points, on_update) = recorder();
        let options = RandomShowOptions::new(
            UpdateCadence::Fixed(Duration::from_millis(1000)),
            || Point::new(10, 10),
            on_update,
        );
        let controller = RandomShowController::new(options).unwrap();

        controller.start();
        assert_eq!(points.lock().unwrap().len(), 1);

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(points.lock().unwrap().len(), 3);

        controller.stop();
        let last = *points.lock().unwrap().last().unwrap();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(points.lock().unwrap().len(), 3);
        assert_eq!(*points.lock().unwrap().last().unwrap(), last);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_does_not_reposition() {
        let (points, on_update) = recorder();
        let options = RandomShowOptions::new(
            UpdateCadence::Fixed(Duration::from_millis(1000)),
            || Point::new(10, 10),
            on_update,
        );
        let controller = RandomShowController::new(options).unwrap();

        controller.start();
        controller.start();
        assert_eq!(points.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_random_cadence_stays_in_window() {
        let (points, on_update) = recorder();
        let options = RandomShowOptions::new(UpdateCadence::default(), || Point::new(5, 5), on_update);
        let controller = RandomShowController::new(options).unwrap();
        controller.start();

        sleep(Duration::from_millis(4900)).await;
        assert_eq!(points.lock().unwrap().len(), 1);

        // The first interval is at most 20s, later ones at least 5s apart
        sleep(Duration::from_millis(15200)).await;
        let moves = points.lock().unwrap().len();
        assert!((2..=5).contains(&moves));
        controller.reset();
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_mode_rerolls_on_each_show() {
        let visible = Arc::new(AtomicBool::new(false));
        let (v1, v2, v3) = (visible.clone(), visible.clone(), visible.clone());
        let show = ShowOptions::new(
            DwellTimes::from_millis(Some(1000), Some(2000)).unwrap(),
            move || v1.load(Ordering::SeqCst),
            move || v2.store(true, Ordering::SeqCst),
            move || v3.store(false, Ordering::SeqCst),
        );
        let (points, on_update) = recorder();
        let options = RandomShowOptions::new(UpdateCadence::default(), || Point::new(100, 100), on_update)
            .with_show(show);
        let controller = RandomShowController::new(options).unwrap();

        // No immediate placement in show mode
        controller.start();
        assert!(points.lock().unwrap().is_empty());

        sleep(Duration::from_millis(1001)).await;
        assert_eq!(points.lock().unwrap().len(), 1);
        assert!(visible.load(Ordering::SeqCst));

        // Hiding does not move the field
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(points.lock().unwrap().len(), 1);
        assert!(!visible.load(Ordering::SeqCst));

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(points.lock().unwrap().len(), 2);

        controller.stop();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(points.lock().unwrap().len(), 2);
    }
}
