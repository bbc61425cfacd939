//! End-to-end runs of the monitoring loop with scripted signal sources.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use chrono::Utc;
use uuid::Uuid;

use reflectai::chat::{ChatBackend, ChatEngine, ChatMessage, ConversationLog};
use reflectai::emotion::{EmotionStabilizer, EventGate};
use reflectai::fatigue::{FatigueSnapshot, FatigueStatus};
use reflectai::signal::{
    Emotion, EmotionClassifier, EmotionReading, EyeGeometry, EyeTracker, Frame, FrameSource,
};
use reflectai::store::SessionStore;
use reflectai::{MonitorConfig, MonitorController, MonitorEvent, SignalSuite};

struct EndlessCamera;

impl FrameSource for EndlessCamera {
    fn next_frame(&mut self) -> Result<Frame> {
        Ok(Frame {
            timestamp: Utc::now(),
            image: vec![1u8; 32],
        })
    }
}

struct FailingCamera {
    remaining: u32,
}

impl FrameSource for FailingCamera {
    fn next_frame(&mut self) -> Result<Frame> {
        if self.remaining == 0 {
            bail!("device unreadable");
        }
        self.remaining -= 1;
        Ok(Frame {
            timestamp: Utc::now(),
            image: vec![1u8; 32],
        })
    }
}

/// A capture device that takes far longer than the tick interval per frame.
struct SlowCamera {
    delay: Duration,
}

impl FrameSource for SlowCamera {
    fn next_frame(&mut self) -> Result<Frame> {
        std::thread::sleep(self.delay);
        Ok(Frame {
            timestamp: Utc::now(),
            image: vec![1u8; 32],
        })
    }
}

struct AlwaysSad;

impl EmotionClassifier for AlwaysSad {
    fn classify(&mut self, _frame: &Frame) -> Result<EmotionReading> {
        let scores: BTreeMap<Emotion, f32> =
            [(Emotion::Sad, 55.0), (Emotion::Neutral, 20.0)].into_iter().collect();
        Ok(EmotionReading {
            dominant: Emotion::Sad,
            scores,
        })
    }
}

struct NoFace;

impl EyeTracker for NoFace {
    fn eye_landmarks(&mut self, _frame: &Frame) -> Option<EyeGeometry> {
        None
    }
}

struct CannedSummarizer;

impl ChatBackend for CannedSummarizer {
    fn generate(&self, _prompt: &str, _history: &[ChatMessage]) -> Result<String> {
        Ok("reply".into())
    }

    fn summarize(&self, messages: &[ChatMessage]) -> Result<String> {
        Ok(format!("closed with {} messages", messages.len()))
    }
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("reflectai-pipeline-{}", Uuid::new_v4()))
}

fn fast_config(data_dir: PathBuf) -> MonitorConfig {
    MonitorConfig {
        data_dir,
        tick_interval_ms: 2,
        prediction_interval: 1,
        stability_threshold: 2,
        log_cooldown_secs: 0,
        ..MonitorConfig::default()
    }
}

#[tokio::test]
async fn sustained_sadness_logs_once_and_opens_conversation() {
    let dir = temp_dir();
    let config = fast_config(dir.clone());

    let store = SessionStore::open(&dir).unwrap();
    let conversation = ConversationLog::open(dir.join("chat")).unwrap();
    let chat = ChatEngine::new(Some(Box::new(CannedSummarizer)));
    let signals = SignalSuite {
        frames: Box::new(EndlessCamera),
        classifier: Box::new(AlwaysSad),
        eyes: Box::new(NoFace),
    };

    let mut controller = MonitorController::new();
    let mut events = controller
        .start(config, store, signals, chat, conversation)
        .unwrap();

    // wait for the proactive opener, then let the loop run a little longer
    let opener = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(MonitorEvent::ConversationOpened(message)) => break message,
                Some(_) => continue,
                None => panic!("event channel closed before conversation opened"),
            }
        }
    })
    .await
    .expect("conversation should open");
    assert!(opener.contains("down"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.stop().await.unwrap();

    // exactly one logged event despite many more sad frames
    let store = SessionStore::open(&dir).unwrap();
    let logged = store.load_events().unwrap();
    assert_eq!(logged.len(), 1);
    let event = &logged["000000"];
    assert_eq!(event.emotion, Emotion::Sad);
    assert_eq!(event.fatigue_status, FatigueStatus::NoFace);
    assert!(event.image_path.is_some());

    // first-prediction record persisted; markers cleared by finalize
    let record = store.current_session().unwrap().unwrap();
    assert_eq!(record.first_event.emotion, Emotion::Sad);
    assert!(!dir.join("session_id").exists());

    // the opener was summarized into the archive and the session cleared
    let log = ConversationLog::open(dir.join("chat")).unwrap();
    assert!(log.messages().is_empty());
    assert_eq!(log.load_archive().len(), 1);

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn capture_failure_ends_the_loop_through_finalize() {
    let dir = temp_dir();
    let config = fast_config(dir.clone());

    let store = SessionStore::open(&dir).unwrap();
    let conversation = ConversationLog::open(dir.join("chat")).unwrap();
    let chat = ChatEngine::new(None);
    let signals = SignalSuite {
        frames: Box::new(FailingCamera { remaining: 3 }),
        classifier: Box::new(AlwaysSad),
        eyes: Box::new(NoFace),
    };

    let mut controller = MonitorController::new();
    let mut events = controller
        .start(config, store, signals, chat, conversation)
        .unwrap();

    // the loop must finalize on its own, without a stop call
    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(MonitorEvent::SessionEnded) => break true,
                Some(_) => continue,
                None => break false,
            }
        }
    })
    .await
    .expect("loop should end after capture failure");
    assert!(ended);

    controller.stop().await.unwrap();

    // session identity cleared so the next start is a fresh session
    assert!(!dir.join("session_id").exists());

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn slow_frame_source_does_not_block_shutdown() {
    let dir = temp_dir();
    let config = fast_config(dir.clone());

    let store = SessionStore::open(&dir).unwrap();
    let conversation = ConversationLog::open(dir.join("chat")).unwrap();
    let chat = ChatEngine::new(None);
    let signals = SignalSuite {
        frames: Box::new(SlowCamera {
            delay: Duration::from_millis(400),
        }),
        classifier: Box::new(AlwaysSad),
        eyes: Box::new(NoFace),
    };

    let mut controller = MonitorController::new();
    let mut events = controller
        .start(config, store, signals, chat, conversation)
        .unwrap();

    // let a capture get stuck mid-sleep, then stop; the loop must observe
    // cancellation immediately instead of waiting out the capture
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stop_started = Instant::now();
    controller.stop().await.unwrap();
    assert!(
        stop_started.elapsed() < Duration::from_millis(250),
        "stop took {:?} with a capture in flight",
        stop_started.elapsed()
    );

    // finalize still ran: session ended and identity cleared
    let ended = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            match events.recv().await {
                Some(MonitorEvent::SessionEnded) => break true,
                Some(_) => continue,
                None => break false,
            }
        }
    })
    .await
    .expect("session end should be reported");
    assert!(ended);
    assert!(!dir.join("session_id").exists());

    // the capture that finished after shutdown must not have logged anything
    let store = SessionStore::open(&dir).unwrap();
    assert!(store.load_events().unwrap().is_empty());

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn failed_session_start_still_reports_session_end() {
    let dir = temp_dir();
    let config = fast_config(dir.clone());

    let store = SessionStore::open(&dir).unwrap();
    let conversation = ConversationLog::open(dir.join("chat")).unwrap();
    let chat = ChatEngine::new(None);
    let signals = SignalSuite {
        frames: Box::new(EndlessCamera),
        classifier: Box::new(AlwaysSad),
        eyes: Box::new(NoFace),
    };

    // occupy the identity file's staging path with a directory so persisting
    // the new session identity fails before the first tick
    fs::create_dir(dir.join("session_id.tmp")).unwrap();

    let mut controller = MonitorController::new();
    let mut events = controller
        .start(config, store, signals, chat, conversation)
        .unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(MonitorEvent::SessionEnded) => break true,
                Some(MonitorEvent::EmotionLogged(_)) => {
                    panic!("no frames should be processed when the session fails to start")
                }
                Some(_) => continue,
                None => break false,
            }
        }
    })
    .await
    .expect("a failed session start should still end the session");
    assert!(ended);

    controller.stop().await.unwrap();
    assert!(!dir.join("session_id").exists());

    let _ = fs::remove_dir_all(dir);
}

/// Concrete scenario: sad at 0.5 confidence against a 0.4 threshold with
/// weight 1.2, stability threshold 3. The first event fires on the third
/// sampled frame; the remaining frames log nothing.
#[test]
fn sad_scenario_fires_exactly_on_third_sampled_frame() {
    let thresholds: BTreeMap<Emotion, f32> = [(Emotion::Sad, 0.4)].into_iter().collect();
    let weights: BTreeMap<Emotion, f32> = [(Emotion::Sad, 1.2)].into_iter().collect();
    let mut stabilizer = EmotionStabilizer::new(thresholds, weights, 5);
    let mut gate = EventGate::new(3, Duration::from_secs(3), 0);

    let calm = FatigueSnapshot {
        status: FatigueStatus::NotFatigued,
        severity: 0.0,
    };
    let t0 = Instant::now();

    let mut fired = Vec::new();
    for frame in 0..5u64 {
        let observation = stabilizer.observe([(Emotion::Sad, 50.0)].into_iter().collect());
        let now = t0 + Duration::from_secs(10 + frame);
        if let Some(event) = gate.consider(&observation, calm, now) {
            fired.push((frame, event));
        }
    }

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, 2);
    assert_eq!(fired[0].1.emotion, Emotion::Sad);
}
