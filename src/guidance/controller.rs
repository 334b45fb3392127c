use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex as StdMutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    camera::CaptureDevice,
    models::CaptureSession,
    sensing::{MotionSampleSource, SensingController},
    sessions::SessionManager,
    settings::GuidanceSettings,
};

use super::{
    config::GuidanceConfig,
    events::{GuidanceEffect, GuidanceEvent, GuidanceSnapshot},
    orientation::MotionSample,
    scoring::GuidanceCategory,
    state::{CountdownState, GuidanceState},
    targets::AngleId,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const EVENT_CAPACITY: usize = 64;

type TaskSlot = Arc<StdMutex<Option<JoinHandle<()>>>>;
type ScopeSlot = Arc<StdMutex<Option<Scope>>>;

/// One run of guidance, from `start` to `stop`.
struct Scope {
    id: u64,
    token: CancellationToken,
}

/// Held only by caller-facing handles. When the last one goes away the
/// running scope is cancelled, which ends sampling and every timer task.
struct ScopeOwner {
    scope: ScopeSlot,
}

impl Drop for ScopeOwner {
    fn drop(&mut self) {
        if let Some(scope) = lock(&self.scope).take() {
            scope.token.cancel();
            log_info!("guidance released without stop");
        }
    }
}

/// Drives [`GuidanceState`] from live samples and owns every timer around it:
/// the feedback cue, the capture countdown and the sampling task.
///
/// Cheap to clone; all clones share one guidance session. Dropping the last
/// clone handed out by [`GuidanceController::new`] stops guidance.
#[derive(Clone)]
pub struct GuidanceController {
    state: Arc<Mutex<GuidanceState>>,
    config: GuidanceConfig,
    sessions: SessionManager,
    camera: Arc<dyn CaptureDevice>,
    locale: Arc<str>,
    events: broadcast::Sender<GuidanceEvent>,
    snapshots: Arc<watch::Sender<GuidanceSnapshot>>,
    countdown: TaskSlot,
    cue: TaskSlot,
    sensing: Arc<Mutex<SensingController>>,
    /// Present while guidance is running. Cancelling it stops every timer task.
    scope: ScopeSlot,
    next_scope: Arc<AtomicU64>,
    /// `None` on the internal handles given to spawned tasks.
    _owner: Option<Arc<ScopeOwner>>,
    voice_enabled: Arc<AtomicBool>,
    cues_enabled: Arc<AtomicBool>,
}

impl GuidanceController {
    pub fn new(
        config: GuidanceConfig,
        settings: &GuidanceSettings,
        sessions: SessionManager,
        camera: Arc<dyn CaptureDevice>,
    ) -> Self {
        let mut config = config;
        config.angle_wrap = settings.angle_wrap;

        let state = GuidanceState::new(&config, AngleId::default());
        let (snapshots, _) = watch::channel(state.snapshot(None));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let scope: ScopeSlot = Arc::new(StdMutex::new(None));

        Self {
            state: Arc::new(Mutex::new(state)),
            config,
            sessions,
            camera,
            locale: Arc::from(settings.locale.as_str()),
            events,
            snapshots: Arc::new(snapshots),
            countdown: Arc::new(StdMutex::new(None)),
            cue: Arc::new(StdMutex::new(None)),
            sensing: Arc::new(Mutex::new(SensingController::new())),
            scope: scope.clone(),
            next_scope: Arc::new(AtomicU64::new(0)),
            _owner: Some(Arc::new(ScopeOwner { scope })),
            voice_enabled: Arc::new(AtomicBool::new(settings.voice_enabled)),
            cues_enabled: Arc::new(AtomicBool::new(settings.cues_enabled)),
        }
    }

    pub fn snapshot(&self) -> GuidanceSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuidanceSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<GuidanceEvent> {
        self.events.subscribe()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn is_running(&self) -> bool {
        self.scope_token().is_some()
    }

    /// Whether the sampling task is still pulling from its source.
    pub async fn is_sampling(&self) -> bool {
        self.sensing.lock().await.is_active()
    }

    pub fn set_voice_enabled(&self, enabled: bool) {
        self.voice_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set_cues_enabled(&self, enabled: bool) {
        self.cues_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Open the capture screen: make sure a session is active, start sampling
    /// and arm the feedback cue. Fails if guidance is already running.
    pub async fn start(
        &self,
        source: Box<dyn MotionSampleSource>,
        start_angle: Option<AngleId>,
    ) -> Result<()> {
        let Some(scope) = self.claim_scope() else {
            bail!("guidance already running");
        };
        // Anything acquired below is torn down if a later step fails.
        let guard = scope.token.clone().drop_guard();

        let (angle, session) = match self.acquire(source, start_angle, &scope.token).await {
            Ok(acquired) => acquired,
            Err(err) => {
                self.release_scope(scope.id);
                return Err(err);
            }
        };
        guard.disarm();

        log_info!("guidance started at {} for session {}", angle, session.id);
        self.emit(GuidanceEvent::AngleChanged { angle });
        self.publish_snapshot().await;
        Ok(())
    }

    async fn acquire(
        &self,
        source: Box<dyn MotionSampleSource>,
        start_angle: Option<AngleId>,
        token: &CancellationToken,
    ) -> Result<(AngleId, CaptureSession)> {
        let session = self.sessions.ensure_active_session(&self.locale).await?;
        let angle = start_angle.unwrap_or_default();
        let cue_interval = {
            let mut state = self.state.lock().await;
            *state = GuidanceState::new(&self.config, angle);
            state.cue_interval()
        };

        self.restart_cue(GuidanceCategory::Far, cue_interval);
        self.sensing
            .lock()
            .await
            .start_sampling(
                source,
                self.config.sample_interval,
                self.detached(),
                token.child_token(),
            )
            .await?;
        Ok((angle, session))
    }

    /// Leave the capture screen. Idempotent. An in-flight capture still completes.
    pub async fn stop(&self) -> Result<()> {
        let scope = lock(&self.scope).take();
        let Some(scope) = scope else {
            return Ok(());
        };
        scope.token.cancel();

        let sampling = self.sensing.lock().await.stop_sampling().await;
        abort_slot(&self.countdown);
        abort_slot(&self.cue);

        self.state.lock().await.halt();
        self.publish_snapshot().await;

        log_info!("guidance stopped");
        sampling
    }

    pub async fn on_sample(&self, sample: MotionSample) {
        let now = time::Instant::now().into_std();
        let (effects, score) = {
            let mut state = self.state.lock().await;
            let effects = state.on_sample(sample, now);
            (effects, state.score)
        };

        if self.config.debug_samples {
            log_info!(
                "sample x={:.3} y={:.3} z={:.3} score={:.2}",
                sample.x,
                sample.y,
                sample.z,
                score
            );
        }

        self.apply_effects(effects).await;
        self.publish_snapshot().await;
    }

    pub async fn manual_capture(&self) {
        let effects = self.state.lock().await.manual_capture();
        self.apply_effects(effects).await;
        self.publish_snapshot().await;
    }

    pub async fn skip_angle(&self) {
        let effects = self.state.lock().await.skip_angle();
        self.apply_effects(effects).await;
        self.publish_snapshot().await;
    }

    pub async fn select_angle(&self, angle: AngleId) {
        let effects = self.state.lock().await.select_angle(angle);
        self.apply_effects(effects).await;
        self.publish_snapshot().await;
    }

    /// The motion source is gone. Last values stay on screen; timers keep running.
    pub async fn mark_sensor_unavailable(&self, reason: String) {
        self.state.lock().await.mark_sensor_unavailable();
        log_warn!("motion sensor unavailable: {}", reason);
        self.emit(GuidanceEvent::SensorUnavailable { reason });
        self.publish_snapshot().await;
    }

    async fn apply_effects(&self, effects: Vec<GuidanceEffect>) {
        for effect in effects {
            match effect {
                GuidanceEffect::CategoryChanged {
                    category,
                    cue_interval,
                } => {
                    log_debug!("category -> {}", category.as_str());
                    self.restart_cue(category, cue_interval);
                }
                GuidanceEffect::CountdownStarted { epoch } => self.spawn_countdown(epoch),
                GuidanceEffect::CountdownCancelled => abort_slot(&self.countdown),
                GuidanceEffect::CountdownTick { remaining } => {
                    self.emit(GuidanceEvent::CountdownTick { remaining })
                }
                GuidanceEffect::TriggerCapture { angle, manual } => {
                    self.spawn_capture(angle, manual)
                }
                GuidanceEffect::Voice(prompt) => {
                    if self.voice_enabled.load(Ordering::SeqCst) {
                        self.emit(GuidanceEvent::Voice { prompt });
                    }
                }
                GuidanceEffect::PhotoRecorded { angle } => {
                    self.emit(GuidanceEvent::PhotoCaptured { angle })
                }
                GuidanceEffect::CaptureFailed { angle, message } => {
                    log_warn!("capture for {} failed: {}", angle, message);
                    self.emit(GuidanceEvent::CaptureFailed { angle, message });
                }
                GuidanceEffect::AngleChanged { angle } => {
                    self.emit(GuidanceEvent::AngleChanged { angle })
                }
                GuidanceEffect::SequenceComplete => {
                    let session_id = self.sessions.active_session_id().await;
                    log_info!("all angles captured for session {:?}", session_id);
                    self.emit(GuidanceEvent::SessionComplete { session_id });
                }
            }
        }
    }

    /// Replace the cue task with one beating at the new category's cadence.
    fn restart_cue(&self, category: GuidanceCategory, period: Duration) {
        let Some(token) = self.scope_token() else {
            return;
        };

        let events = self.events.clone();
        let cues_enabled = self.cues_enabled.clone();

        let mut slot = lock(&self.cue);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        *slot = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if cues_enabled.load(Ordering::SeqCst) {
                            emit_event(&events, GuidanceEvent::Cue { category });
                        }
                    }
                }
            }
        }));
    }

    fn spawn_countdown(&self, epoch: u64) {
        let Some(token) = self.scope_token() else {
            return;
        };

        let controller = self.detached();
        let tick_interval = self.config.tick_interval;

        let mut slot = lock(&self.countdown);
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        *slot = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let (effects, counting) = {
                            let mut state = controller.state.lock().await;
                            let effects = state.on_tick(epoch);
                            let counting = state.countdown_epoch() == epoch
                                && matches!(state.countdown, CountdownState::CountingDown { .. });
                            (effects, counting)
                        };
                        controller.apply_effects(effects).await;
                        controller.publish_snapshot().await;
                        if !counting {
                            break;
                        }
                    }
                }
            }
        }));
    }

    /// Fire the camera once. Runs detached so the countdown task never waits on it.
    fn spawn_capture(&self, angle: AngleId, manual: bool) {
        log_info!(
            "capturing {} ({})",
            angle,
            if manual { "manual" } else { "countdown" }
        );
        self.emit(GuidanceEvent::CaptureTriggered { angle, manual });

        let controller = self.detached();
        tokio::spawn(async move {
            controller.run_capture(angle).await;
        });
    }

    async fn run_capture(&self, angle: AngleId) {
        let outcome = match self.camera.capture(angle).await {
            Ok(image) => self
                .sessions
                .append_photo(angle, image)
                .await
                .map(|_| ())
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        let effects = self.state.lock().await.on_capture_finished(outcome);
        self.apply_effects(effects).await;
        self.publish_snapshot().await;
    }

    async fn publish_snapshot(&self) {
        let session_id = self.sessions.active_session_id().await;
        let snapshot = self.state.lock().await.snapshot(session_id);
        self.snapshots.send_replace(snapshot);
    }

    fn emit(&self, event: GuidanceEvent) {
        emit_event(&self.events, event);
    }

    /// A handle for spawned tasks. It does not keep guidance alive.
    fn detached(&self) -> Self {
        Self {
            _owner: None,
            ..self.clone()
        }
    }

    /// Check for a live scope and install a fresh one under a single lock.
    fn claim_scope(&self) -> Option<Scope> {
        let mut slot = lock(&self.scope);
        if slot.as_ref().is_some_and(|scope| !scope.token.is_cancelled()) {
            return None;
        }
        let id = self.next_scope.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        *slot = Some(Scope {
            id,
            token: token.clone(),
        });
        Some(Scope { id, token })
    }

    /// Drop the scope only if it is still the one `id` claimed.
    fn release_scope(&self, id: u64) {
        let mut slot = lock(&self.scope);
        if slot.as_ref().is_some_and(|scope| scope.id == id) {
            if let Some(scope) = slot.take() {
                scope.token.cancel();
            }
        }
    }

    fn scope_token(&self) -> Option<CancellationToken> {
        lock(&self.scope)
            .as_ref()
            .map(|scope| scope.token.clone())
            .filter(|token| !token.is_cancelled())
    }
}

fn emit_event(events: &broadcast::Sender<GuidanceEvent>, event: GuidanceEvent) {
    // No subscribers is fine.
    let _ = events.send(event);
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn abort_slot(slot: &StdMutex<Option<JoinHandle<()>>>) {
    if let Some(handle) = lock(slot).take() {
        handle.abort();
    }
}
