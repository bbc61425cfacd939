use std::path::Path;

use anyhow::{bail, Result};
use chrono::Utc;
use log::info;

use reflectai::chat::{ChatEngine, ConversationLog};
use reflectai::signal::{
    Emotion, EmotionClassifier, EmotionReading, EyeGeometry, EyeTracker, Frame, FrameSource,
    Point,
};
use reflectai::store::SessionStore;
use reflectai::{MonitorConfig, MonitorController, MonitorEvent, SignalSuite};

// Scripted stand-ins for the external capture device and models. A real
// deployment plugs the webcam, the emotion classifier, and the face-landmark
// model into the same traits.

struct ScriptedCamera {
    remaining: u32,
}

impl FrameSource for ScriptedCamera {
    fn next_frame(&mut self) -> Result<Frame> {
        if self.remaining == 0 {
            bail!("capture device closed");
        }
        self.remaining -= 1;
        Ok(Frame {
            timestamp: Utc::now(),
            image: vec![0u8; 64],
        })
    }
}

/// Neutral for the first few sampled frames, then persistently sad.
struct ScriptedClassifier {
    calls: u64,
}

impl EmotionClassifier for ScriptedClassifier {
    fn classify(&mut self, _frame: &Frame) -> Result<EmotionReading> {
        self.calls += 1;
        let (dominant, score) = if self.calls > 4 {
            (Emotion::Sad, 52.0)
        } else {
            (Emotion::Neutral, 90.0)
        };
        let scores = [(dominant, score), (Emotion::Surprise, 5.0)]
            .into_iter()
            .collect();
        Ok(EmotionReading { dominant, scores })
    }
}

/// Wide-open eyes that start drooping after a while.
struct DroopingEyes {
    frames: u64,
}

impl EyeTracker for DroopingEyes {
    fn eye_landmarks(&mut self, _frame: &Frame) -> Option<EyeGeometry> {
        self.frames += 1;
        let opening = if self.frames > 150 { 1.0 } else { 6.0 };
        Some(synthetic_geometry(opening))
    }
}

fn synthetic_eye(opening: f32) -> [Point; 6] {
    [
        (0.0, 0.0),
        (3.0, opening / 2.0),
        (7.0, opening / 2.0),
        (10.0, 0.0),
        (7.0, -opening / 2.0),
        (3.0, -opening / 2.0),
    ]
}

fn synthetic_geometry(opening: f32) -> EyeGeometry {
    EyeGeometry {
        left: synthetic_eye(opening),
        right: synthetic_eye(opening),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = MonitorConfig::load(Path::new("reflectai.json"))?;
    info!("affect monitor starting, data dir {}", config.data_dir.display());

    let store = SessionStore::open(&config.data_dir)?;
    let conversation = ConversationLog::open(config.data_dir.join("chat"))?;
    // No remote backend wired in the demo; replies and summaries degrade to
    // the local templates and a warning respectively.
    let chat = ChatEngine::new(None);

    let signals = SignalSuite {
        frames: Box::new(ScriptedCamera { remaining: 600 }),
        classifier: Box::new(ScriptedClassifier { calls: 0 }),
        eyes: Box::new(DroopingEyes { frames: 0 }),
    };

    let mut controller = MonitorController::new();
    let mut events = controller.start(config, store, signals, chat, conversation)?;

    tokio::select! {
        _ = async {
            while let Some(event) = events.recv().await {
                match event {
                    MonitorEvent::EmotionLogged(event) => {
                        info!("event #{}: {:?} ({:?})", event.seq, event.emotion, event.fatigue_status);
                    }
                    MonitorEvent::ConversationOpened(message) => {
                        info!("assistant: {message}");
                    }
                    MonitorEvent::SessionEnded => break,
                }
            }
        } => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, stopping");
        }
    }

    controller.stop().await
}
