//! The polling loop: one tick pulls one frame, runs fatigue on every frame
//! and emotion on every Nth, then feeds the event gate. Per-tick work runs
//! on the blocking pool under a timeout, so a stalled capture or classifier
//! call costs at most its own frame; it never wedges the loop or shutdown.
//! Only frame capture failure ends the loop; every other error is absorbed
//! or logged.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatEngine, ConversationLog};
use crate::config::MonitorConfig;
use crate::signal::{frame_ear, EmotionClassifier, EyeTracker, FrameSource};
use crate::store::{EmotionEvent, SessionStore};

use super::SessionContext;

const TICK_TIMEOUT_SECS: u64 = 10;

/// The three external signal sources, bundled for the loop.
pub struct SignalSuite {
    pub frames: Box<dyn FrameSource>,
    pub classifier: Box<dyn EmotionClassifier>,
    pub eyes: Box<dyn EyeTracker>,
}

/// Notifications for whoever is rendering or observing the loop.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    EmotionLogged(EmotionEvent),
    ConversationOpened(String),
    SessionEnded,
}

/// Pipeline state, mutated only under short-lived locks. The slow external
/// calls happen under the separate signals lock, never this one, so finalize
/// and shutdown are never stuck behind a stalled capture.
struct PipelineState {
    ctx: SessionContext,
    store: SessionStore,
    conversation: ConversationLog,
    closed: bool,
}

pub async fn monitor_loop(
    config: MonitorConfig,
    mut store: SessionStore,
    signals: SignalSuite,
    chat: ChatEngine,
    mut conversation: ConversationLog,
    events_tx: UnboundedSender<MonitorEvent>,
    cancel_token: CancellationToken,
) {
    let ctx = match SessionContext::new(&config, &mut store) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("failed to start monitoring session: {err:#}");
            // begin_session may already have persisted an identity file;
            // tear down through the same path the capture-failure exit uses
            finalize(&mut store, &chat, &mut conversation, &events_tx);
            return;
        }
    };
    info!("monitoring session {} started", ctx.session_id);

    let prediction_interval = config.prediction_interval.max(1);
    let signals = Arc::new(Mutex::new(signals));
    let state = Arc::new(Mutex::new(PipelineState {
        ctx,
        store,
        conversation,
        closed: false,
    }));

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut frame_index: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                frame_index += 1;

                let worker = tokio::task::spawn_blocking({
                    let signals = Arc::clone(&signals);
                    let state = Arc::clone(&state);
                    let events_tx = events_tx.clone();
                    let cancel = cancel_token.clone();
                    move || {
                        process_frame(
                            &signals,
                            &state,
                            &events_tx,
                            &cancel,
                            prediction_interval,
                            frame_index,
                        )
                    }
                });

                // race the tick against both its timeout and shutdown; an
                // abandoned worker finishes in the background and is fenced
                // off by the `closed` flag
                tokio::select! {
                    outcome = tokio::time::timeout(
                        Duration::from_secs(TICK_TIMEOUT_SECS),
                        worker,
                    ) => {
                        match outcome {
                            Ok(Ok(Ok(()))) => {}
                            Ok(Ok(Err(err))) => {
                                // capture failure is the one fatal error here
                                error!("frame capture failed, stopping monitor: {err:#}");
                                break;
                            }
                            Ok(Err(join_err)) => {
                                error!("tick worker failed to join: {join_err}");
                            }
                            Err(_) => {
                                warn!(
                                    "tick overran {TICK_TIMEOUT_SECS}s, skipping frame {frame_index}"
                                );
                            }
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        info!("monitor loop shutting down");
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("monitor loop shutting down");
                break;
            }
        }
    }

    // a stalled tick can still hold the signals lock, but the state lock is
    // only ever held for quick mutations, so finalize does not wait on it
    let mut guard = lock_state(&state);
    guard.closed = true;
    let PipelineState {
        store,
        conversation,
        ..
    } = &mut *guard;
    finalize(store, &chat, conversation, &events_tx);
}

/// Per-frame work, strictly ordered: fatigue, then emotion, then the gate.
/// Runs on the blocking pool. The only propagated error is frame
/// acquisition; a tick arriving while the previous one still holds the
/// signal sources skips its frame instead of queueing behind it.
fn process_frame(
    signals: &Mutex<SignalSuite>,
    state: &Mutex<PipelineState>,
    events_tx: &UnboundedSender<MonitorEvent>,
    cancel: &CancellationToken,
    prediction_interval: u64,
    frame_index: u64,
) -> Result<()> {
    let mut suite = match signals.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::WouldBlock) => {
            debug!("previous tick still in flight, skipping frame {frame_index}");
            return Ok(());
        }
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
    };

    let frame = suite
        .frames
        .next_frame()
        .context("frame acquisition failed")?;

    let geometry = suite.eyes.eye_landmarks(&frame);
    let sampled = frame_index % prediction_interval == 0;
    let reading = sampled.then(|| suite.classifier.classify(&frame));
    drop(suite);

    // a frame that finished capturing after shutdown began is dropped
    if cancel.is_cancelled() {
        return Ok(());
    }

    let mut guard = lock_state(state);
    let state = &mut *guard;
    if state.closed {
        return Ok(());
    }

    // fatigue evaluation runs on every frame
    let ear = geometry.map(|geometry| frame_ear(&geometry));
    state.ctx.fatigue.update(ear);

    // emotion evaluation is sub-sampled to bound classifier cost
    let Some(result) = reading else {
        return Ok(());
    };

    let observation = match result {
        Ok(reading) => state.ctx.stabilizer.observe(reading.scores),
        Err(err) => {
            debug!("no usable emotion signal this frame: {err:#}");
            state.ctx.stabilizer.hold()
        }
    };

    let fatigue = state.ctx.fatigue.snapshot();
    let Some(mut event) = state.ctx.gate.consider(&observation, fatigue, Instant::now()) else {
        return Ok(());
    };

    // downstream effects: snapshot, log append, trigger. Each is idempotent
    // under retry and none of them may end the loop.
    match state.store.save_snapshot(&frame, event.emotion) {
        Ok(path) => event.image_path = Some(path),
        Err(err) => warn!("snapshot save failed: {err:#}"),
    }

    if let Err(err) = state.store.append_event(&event) {
        error!("failed to append emotion event {}: {err:#}", event.seq);
    }

    match state.ctx.trigger.maybe_open(&state.store, &event) {
        Ok(Some(message)) => {
            if let Err(err) = state.conversation.add_assistant_message(message.clone()) {
                warn!("failed to persist conversation opener: {err:#}");
            }
            let _ = events_tx.send(MonitorEvent::ConversationOpened(message));
        }
        Ok(None) => {}
        Err(err) => error!("conversation trigger failed: {err:#}"),
    }

    info!(
        "logged emotion change #{}: {:?} ({:?})",
        event.seq, event.emotion, event.fatigue_status
    );
    let _ = events_tx.send(MonitorEvent::EmotionLogged(event));

    Ok(())
}

fn lock_state(state: &Mutex<PipelineState>) -> MutexGuard<'_, PipelineState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Deterministic teardown, shared by stop, capture failure, and a failed
/// session start. A failed summary must never lose already-persisted emotion
/// or fatigue logs.
fn finalize(
    store: &mut SessionStore,
    chat: &ChatEngine,
    conversation: &mut ConversationLog,
    events_tx: &UnboundedSender<MonitorEvent>,
) {
    if let Err(err) = conversation.close(chat) {
        warn!("session summary failed; keeping unsummarized history: {err:#}");
    }

    if let Err(err) = store.end_session() {
        error!("failed to clear session markers: {err:#}");
    }

    let _ = events_tx.send(MonitorEvent::SessionEnded);
}
