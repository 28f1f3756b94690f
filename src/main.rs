//! Replay driver: runs recorded landmark streams through the engine.
//!
//! Stands in for the excluded capture/detector collaborators so the whole
//! pipeline can be exercised end to end. Input is newline-delimited JSON:
//! either a bare array of [x, y, z] landmark triples per line, or an object
//! `{"landmarks": [...], "pose": [rx, ry, rz, tx, ty, tz]}` when an
//! external pose accompanies the frame.

use anyhow::{Context, Result};
use clap::Parser;
use gesture_pointer::{
    app::{GestureEngine, LandmarkSource, SourceTick},
    config::{self, Config, PoseConfig},
    devices::{KeyboardDevice, PointerDevice, RecordingKeyboard, RecordingPointer},
    landmarks::LandmarkSet,
    pipeline::FrameInput,
    pose::Pose,
};
use log::info;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Recorded landmark stream to replay (JSON lines)
    #[arg(short, long)]
    replay: PathBuf,

    /// Path to configuration file (YAML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to an action profile (JSON format)
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Enable pointer motion output
    #[arg(short, long)]
    motion: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Points(Vec<[f64; 3]>),
    Tagged {
        landmarks: Vec<[f64; 3]>,
        #[serde(default)]
        pose: Option<[f64; 6]>,
    },
}

/// Landmark source reading one frame per line from a recording
struct ReplaySource {
    lines: Lines<BufReader<File>>,
}

impl ReplaySource {
    fn open(path: &PathBuf) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Cannot open replay file {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl LandmarkSource for ReplaySource {
    fn poll(&mut self) -> gesture_pointer::Result<SourceTick> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(SourceTick::Closed);
            };
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: ReplayLine = serde_json::from_str(&line)
                .map_err(|e| gesture_pointer::Error::InvalidInput(format!("Bad replay line: {e}")))?;
            let (points, pose) = match parsed {
                ReplayLine::Points(points) => (points, None),
                ReplayLine::Tagged { landmarks, pose } => (landmarks, pose),
            };
            let landmarks = LandmarkSet::new(points.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect())?;
            let input = match pose {
                Some(p) => FrameInput::with_external_pose(
                    landmarks,
                    Pose::new(Vector3::new(p[0], p[1], p[2]), Vector3::new(p[3], p[4], p[5])),
                ),
                None => FrameInput::new(landmarks),
            };
            return Ok(SourceTick::Frame(input));
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(path)?
        }
        None => {
            // Without a config file, run every channel with default ranges
            // and take the pose from the replay stream itself.
            Config {
                signals: Config::default_signals(),
                pose: PoseConfig {
                    strategy: "external".to_string(),
                    ..PoseConfig::default()
                },
                ..Config::default()
            }
        }
    };

    let pointer = Arc::new(Mutex::new(RecordingPointer::default()));
    let keyboard = Arc::new(Mutex::new(RecordingKeyboard::default()));
    let pointer_device: Arc<Mutex<dyn PointerDevice>> = pointer.clone();
    let keyboard_device: Arc<Mutex<dyn KeyboardDevice>> = keyboard.clone();

    let mut engine = GestureEngine::from_config(&config, pointer_device, keyboard_device)?;

    if let Some(profile_path) = &args.profile {
        let entries = config::load_profile(profile_path)?;
        engine.bind_profile(&entries)?;
    }
    engine.set_motion_enabled(args.motion);

    let mut source = ReplaySource::open(&args.replay)?;
    engine.run(&mut source)?;

    let signals = engine.signals();
    let map = signals.lock().expect("engine stopped");
    let mut names: Vec<&String> = map.keys().collect();
    names.sort();
    println!("Final signal values:");
    for name in names {
        let signal = &map[name];
        println!("  {name:<12} raw {:>10.4}  scaled {:>6.3}", signal.raw_value(), signal.scaled_value());
    }

    let pointer = pointer.lock().expect("engine stopped");
    let keyboard = keyboard.lock().expect("engine stopped");
    println!(
        "Pointer commands: {}, clicks: {}, key events: {}",
        pointer.motions.len(),
        pointer.clicks.len(),
        keyboard.events.len()
    );

    Ok(())
}
