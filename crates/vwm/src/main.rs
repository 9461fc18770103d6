//! vwm: Video Watermark Overlay
//!
//! Binds a watermark configuration to a simulated video and overlay node,
//! plays out a scripted pause/resume/tamper timeline, and logs everything
//! the overlay reports.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use vwm_overlay::{
    ApproxMeasure, FontMeasure, OverlayEvent, SimulatedNode, SimulatedVideo, Size, Tamper,
    TextMeasure, VideoElement, VideoWatermark, WatermarkConfig,
};

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Event loop granularity
const TICK: Duration = Duration::from_millis(100);

/// Children of a freshly rendered overlay root (the text field)
const OVERLAY_CHILDREN: usize = 1;

#[derive(Parser, Debug)]
#[command(name = "vwm", version, about = "Drive a video watermark overlay against a simulated player")]
struct Cli {
    /// Watermark configuration (TOML or JSON). Uses a built-in demo when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scenario length in seconds.
    #[arg(long, default_value_t = 30)]
    duration: u64,

    /// Pause the video after this many seconds.
    #[arg(long)]
    pause_at: Option<u64>,

    /// Resume the video after this many seconds.
    #[arg(long)]
    resume_at: Option<u64>,

    /// Tamper with the overlay after this many seconds.
    #[arg(long)]
    tamper_at: Option<u64>,

    /// Kind of tampering.
    #[arg(long, value_enum, default_value_t = TamperChoice::Children)]
    tamper: TamperChoice,

    /// Measure text with this TrueType/OpenType font instead of an estimate.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Player width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Player height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Log debug output.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TamperChoice {
    /// Remove the text field
    Children,
    /// Inject an extra element
    Inject,
    /// Collapse the overlay to zero size
    Collapse,
    /// Set `visibility: hidden`
    Hide,
    /// Set `opacity: 0`
    Transparent,
}

impl From<TamperChoice> for Tamper {
    fn from(choice: TamperChoice) -> Self {
        match choice {
            TamperChoice::Children => Tamper::RemoveChild,
            TamperChoice::Inject => Tamper::InjectChild,
            TamperChoice::Collapse => Tamper::Collapse,
            TamperChoice::Hide => Tamper::Hide,
            TamperChoice::Transparent => Tamper::Transparent,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Pause,
    Resume,
    Tamper(Tamper),
}

/// Timeline of scripted actions, ordered by offset
struct Script {
    actions: VecDeque<(Duration, Action)>,
}

impl Script {
    fn from_cli(cli: &Cli) -> Self {
        let mut actions: Vec<(Duration, Action)> = [
            cli.pause_at.map(|s| (s, Action::Pause)),
            cli.resume_at.map(|s| (s, Action::Resume)),
            cli.tamper_at.map(|s| (s, Action::Tamper(cli.tamper.into()))),
        ]
        .into_iter()
        .flatten()
        .map(|(secs, action)| (Duration::from_secs(secs), action))
        .collect();
        actions.sort_by_key(|(at, _)| *at);

        Self {
            actions: actions.into(),
        }
    }

    /// Next action due at `elapsed`, if any
    fn due(&mut self, elapsed: Duration) -> Option<Action> {
        match self.actions.front() {
            Some((at, _)) if *at <= elapsed => self.actions.pop_front().map(|(_, a)| a),
            _ => None,
        }
    }
}

/// Simulated view: owns the mounted node and applies overlay events to it.
struct View {
    player: Size,
    node: Arc<SimulatedNode>,
    measure: Box<dyn TextMeasure>,
}

impl View {
    fn mount(&mut self, watermark: &mut VideoWatermark) {
        self.node = SimulatedNode::new(self.player, OVERLAY_CHILDREN);
        watermark.mount_node(self.node.clone());
        if let Some(size) = watermark.measure_text(self.measure.as_ref()) {
            debug!("Watermark text is {}", size);
        }
    }

    fn handle(&mut self, watermark: &mut VideoWatermark, event: OverlayEvent) {
        match event {
            OverlayEvent::Shown => {
                info!("Watermark shown");
                // No fade-in to wait for
                watermark.on_shown();
            }
            OverlayEvent::Hidden => info!("Watermark hidden"),
            OverlayEvent::Moved { coord } => info!("Watermark moved to {}", coord),
            OverlayEvent::Remount { key } => {
                info!("Remounting watermark (key {})", key);
                self.mount(watermark);
            }
            OverlayEvent::ModificationDetected { kind } => {
                warn!("Tampering reported: {}", kind);
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .compact()
        .init();

    let config = match &cli.config {
        Some(path) => WatermarkConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => WatermarkConfig::demo(),
    };
    let measure: Box<dyn TextMeasure> = match &cli.font {
        Some(path) => Box::new(
            FontMeasure::from_file(path)
                .with_context(|| format!("Failed to load font {}", path.display()))?,
        ),
        None => Box::new(ApproxMeasure),
    };

    info!("vwm starting ({:?} mode, {}s)", config.mode, cli.duration);
    debug!("Configuration:\n{}", config.to_toml());

    let video = SimulatedVideo::new();
    let mut watermark = VideoWatermark::new(config, Some(video.clone() as Arc<dyn VideoElement>))
        .context("Invalid watermark configuration")?;

    let player = Size::new(cli.width, cli.height);
    let mut view = View {
        player,
        node: SimulatedNode::new(player, OVERLAY_CHILDREN),
        measure,
    };
    view.mount(&mut watermark);
    info!("Overlay style: {:?}", watermark.style());

    video.play();
    info!("Video playing");

    let mut script = Script::from_cli(&cli);
    let start = Instant::now();
    let end = start + Duration::from_secs(cli.duration);
    let mut ticker = interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let now = Instant::now();

        while let Some(action) = script.due(now - start) {
            match action {
                Action::Pause => {
                    info!("Video paused");
                    video.pause();
                }
                Action::Resume => {
                    info!("Video resumed");
                    video.play();
                }
                Action::Tamper(tamper) => {
                    info!("Tampering with overlay: {:?}", tamper);
                    view.node.apply(tamper);
                }
            }
        }

        for event in watermark.poll_events() {
            view.handle(&mut watermark, event);
        }

        if now >= end {
            break;
        }
    }

    info!("Final overlay style: {:?}", watermark.style());
    drop(watermark);
    info!("vwm shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_order() {
        let cli = Cli::parse_from([
            "vwm",
            "--pause-at",
            "10",
            "--resume-at",
            "12",
            "--tamper-at",
            "5",
            "--tamper",
            "collapse",
        ]);
        let mut script = Script::from_cli(&cli);

        assert!(script.due(Duration::from_secs(4)).is_none());
        assert!(matches!(
            script.due(Duration::from_secs(5)),
            Some(Action::Tamper(Tamper::Collapse))
        ));
        assert!(script.due(Duration::from_secs(9)).is_none());
        assert!(matches!(script.due(Duration::from_secs(20)), Some(Action::Pause)));
        assert!(matches!(script.due(Duration::from_secs(20)), Some(Action::Resume)));
        assert!(script.due(Duration::from_secs(20)).is_none());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["vwm"]);
        assert_eq!(cli.duration, 30);
        assert!(cli.config.is_none());
        assert!(Script::from_cli(&cli).actions.is_empty());
    }
}
