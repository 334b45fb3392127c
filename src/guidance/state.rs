use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::config::{AngleWrap, GuidanceConfig};
use super::events::{GuidanceEffect, GuidanceSnapshot, VoicePrompt};
use super::orientation::{calculate_orientation, MotionSample, Orientation};
use super::scoring::{alignment_score, GuidanceCategory};
use super::targets::AngleId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CountdownState {
    Idle,
    CountingDown { remaining: u8 },
    Capturing,
}

impl Default for CountdownState {
    fn default() -> Self {
        CountdownState::Idle
    }
}

/// Latest measurement plus the countdown machine for the active angle.
///
/// Pure: no timers, no I/O. Callers pass time in and act on the returned effects.
#[derive(Debug, Clone)]
pub struct GuidanceState {
    pub angle: AngleId,
    pub orientation: Orientation,
    pub score: f64,
    pub category: GuidanceCategory,
    pub countdown: CountdownState,
    pub sensor_available: bool,
    pub sequence_complete: bool,
    /// Bumped on every countdown start so ticks from a cancelled run are ignored.
    countdown_epoch: u64,
    last_adjust_prompt: Option<Instant>,
    countdown_ticks: u8,
    voice_throttle: Duration,
    angle_wrap: AngleWrap,
    config: GuidanceConfig,
}

impl Default for GuidanceState {
    fn default() -> Self {
        Self::new(&GuidanceConfig::default(), AngleId::Front)
    }
}

impl GuidanceState {
    pub fn new(config: &GuidanceConfig, angle: AngleId) -> Self {
        debug_assert!(angle.target().validate().is_ok());
        Self {
            angle,
            orientation: Orientation::default(),
            score: 0.0,
            category: GuidanceCategory::Far,
            countdown: CountdownState::Idle,
            sensor_available: true,
            sequence_complete: false,
            countdown_epoch: 0,
            last_adjust_prompt: None,
            countdown_ticks: config.countdown_ticks.max(1),
            voice_throttle: config.voice_throttle,
            angle_wrap: config.angle_wrap,
            config: config.clone(),
        }
    }

    pub fn countdown_epoch(&self) -> u64 {
        self.countdown_epoch
    }

    pub fn cue_interval(&self) -> Duration {
        self.config.cue_interval(self.category)
    }

    /// Single entry point for sensor data.
    pub fn on_sample(&mut self, sample: MotionSample, now: Instant) -> Vec<GuidanceEffect> {
        let orientation = calculate_orientation(sample);
        let score = alignment_score(&orientation, self.angle.target(), self.angle_wrap);
        let category = GuidanceCategory::from_score(score);

        self.orientation = orientation;
        self.score = score;

        let mut effects = Vec::new();
        if category != self.category {
            effects.extend(self.on_category_changed(category));
        }

        if self.category == GuidanceCategory::Far {
            if let Some(prompt) = self.throttled_adjust_prompt(now) {
                effects.push(prompt);
            }
        }

        effects
    }

    pub fn on_category_changed(&mut self, category: GuidanceCategory) -> Vec<GuidanceEffect> {
        self.category = category;

        let mut effects = vec![GuidanceEffect::CategoryChanged {
            category,
            cue_interval: self.config.cue_interval(category),
        }];

        match (category, self.countdown) {
            (GuidanceCategory::Locked, CountdownState::Idle) if !self.sequence_complete => {
                self.countdown_epoch = self.countdown_epoch.wrapping_add(1);
                self.countdown = CountdownState::CountingDown {
                    remaining: self.countdown_ticks,
                };
                effects.push(GuidanceEffect::CountdownStarted {
                    epoch: self.countdown_epoch,
                });
                effects.push(GuidanceEffect::Voice(VoicePrompt::Ready));
            }
            (GuidanceCategory::Locked, _) => {}
            (_, CountdownState::CountingDown { .. }) => {
                // Lost the lock: start over next time, no partial credit.
                self.countdown = CountdownState::Idle;
                effects.push(GuidanceEffect::CountdownCancelled);
            }
            _ => {}
        }

        effects
    }

    /// One countdown second elapsed for the run identified by `epoch`.
    pub fn on_tick(&mut self, epoch: u64) -> Vec<GuidanceEffect> {
        let CountdownState::CountingDown { remaining } = self.countdown else {
            return Vec::new();
        };
        if epoch != self.countdown_epoch {
            return Vec::new();
        }

        if remaining > 1 {
            self.countdown = CountdownState::CountingDown {
                remaining: remaining - 1,
            };
            vec![GuidanceEffect::CountdownTick {
                remaining: remaining - 1,
            }]
        } else {
            self.countdown = CountdownState::Capturing;
            vec![GuidanceEffect::TriggerCapture {
                angle: self.angle,
                manual: false,
            }]
        }
    }

    /// Close out a capture. `Err` carries the user-facing message.
    pub fn on_capture_finished(&mut self, result: Result<(), String>) -> Vec<GuidanceEffect> {
        if self.countdown != CountdownState::Capturing {
            return Vec::new();
        }
        self.countdown = CountdownState::Idle;

        let angle = self.angle;
        match result {
            Ok(()) => {
                let mut effects = vec![
                    GuidanceEffect::Voice(VoicePrompt::Success),
                    GuidanceEffect::PhotoRecorded { angle },
                ];
                effects.extend(self.advance());
                effects
            }
            Err(message) => vec![GuidanceEffect::CaptureFailed { angle, message }],
        }
    }

    /// Capture right now if the pose is locked, otherwise nudge the user.
    pub fn manual_capture(&mut self) -> Vec<GuidanceEffect> {
        if self.countdown == CountdownState::Capturing {
            return Vec::new();
        }
        if self.category != GuidanceCategory::Locked {
            return vec![GuidanceEffect::Voice(VoicePrompt::Adjust)];
        }

        let mut effects = Vec::new();
        if matches!(self.countdown, CountdownState::CountingDown { .. }) {
            effects.push(GuidanceEffect::CountdownCancelled);
        }
        self.countdown = CountdownState::Capturing;
        effects.push(GuidanceEffect::TriggerCapture {
            angle: self.angle,
            manual: true,
        });
        effects
    }

    pub fn skip_angle(&mut self) -> Vec<GuidanceEffect> {
        if self.countdown == CountdownState::Capturing {
            return Vec::new();
        }
        let mut effects = self.cancel_countdown();
        effects.extend(self.advance());
        effects
    }

    pub fn select_angle(&mut self, angle: AngleId) -> Vec<GuidanceEffect> {
        if self.countdown == CountdownState::Capturing {
            return Vec::new();
        }
        let mut effects = self.cancel_countdown();
        self.sequence_complete = false;
        effects.extend(self.switch_to(angle));
        effects
    }

    /// Sensor is gone for good; keep showing the last values.
    pub fn mark_sensor_unavailable(&mut self) {
        self.sensor_available = false;
    }

    /// Guidance is shutting down: drop any pending countdown. An in-flight capture is left alone.
    pub fn halt(&mut self) -> Vec<GuidanceEffect> {
        self.cancel_countdown()
    }

    pub fn snapshot(&self, session_id: Option<String>) -> GuidanceSnapshot {
        GuidanceSnapshot {
            angle: self.angle,
            extra_assist: self.angle.target().extra_assist,
            orientation: self.orientation,
            score: self.score,
            category: self.category,
            countdown: self.countdown,
            sensor_available: self.sensor_available,
            sequence_complete: self.sequence_complete,
            session_id,
        }
    }

    fn cancel_countdown(&mut self) -> Vec<GuidanceEffect> {
        if matches!(self.countdown, CountdownState::CountingDown { .. }) {
            self.countdown = CountdownState::Idle;
            vec![GuidanceEffect::CountdownCancelled]
        } else {
            Vec::new()
        }
    }

    fn advance(&mut self) -> Vec<GuidanceEffect> {
        match self.angle.next() {
            Some(next) => self.switch_to(next),
            None => {
                self.sequence_complete = true;
                vec![GuidanceEffect::SequenceComplete]
            }
        }
    }

    fn switch_to(&mut self, angle: AngleId) -> Vec<GuidanceEffect> {
        self.angle = angle;
        self.orientation = Orientation::default();
        self.score = 0.0;

        let mut effects = vec![GuidanceEffect::AngleChanged { angle }];
        if self.category != GuidanceCategory::Far {
            self.category = GuidanceCategory::Far;
            effects.push(GuidanceEffect::CategoryChanged {
                category: GuidanceCategory::Far,
                cue_interval: self.config.cue_interval(GuidanceCategory::Far),
            });
        }
        effects
    }

    fn throttled_adjust_prompt(&mut self, now: Instant) -> Option<GuidanceEffect> {
        let due = self
            .last_adjust_prompt
            .map(|last| now.saturating_duration_since(last) >= self.voice_throttle)
            .unwrap_or(true);

        if due {
            self.last_adjust_prompt = Some(now);
            Some(GuidanceEffect::Voice(VoicePrompt::Adjust))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVEL: MotionSample = MotionSample {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };
    // yaw 90, pitch -90: nowhere near the front target
    const SIDEWAYS: MotionSample = MotionSample {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    };

    fn started_countdown(effects: &[GuidanceEffect]) -> Option<u64> {
        effects.iter().find_map(|effect| match effect {
            GuidanceEffect::CountdownStarted { epoch } => Some(*epoch),
            _ => None,
        })
    }

    fn captures(effects: &[GuidanceEffect]) -> usize {
        effects
            .iter()
            .filter(|effect| matches!(effect, GuidanceEffect::TriggerCapture { .. }))
            .count()
    }

    #[test]
    fn lock_starts_a_three_tick_countdown() {
        let mut state = GuidanceState::default();
        let effects = state.on_sample(LEVEL, Instant::now());

        assert_eq!(state.category, GuidanceCategory::Locked);
        assert_eq!(state.countdown, CountdownState::CountingDown { remaining: 3 });
        assert!(started_countdown(&effects).is_some());
        assert!(effects.contains(&GuidanceEffect::Voice(VoicePrompt::Ready)));
    }

    #[test]
    fn sustained_lock_captures_exactly_once() {
        let mut state = GuidanceState::default();
        let now = Instant::now();
        let epoch = started_countdown(&state.on_sample(LEVEL, now)).unwrap();

        let mut fired = 0;
        for _ in 0..3 {
            state.on_sample(LEVEL, now);
            fired += captures(&state.on_tick(epoch));
        }
        assert_eq!(fired, 1);
        assert_eq!(state.countdown, CountdownState::Capturing);

        // Further ticks and locked samples do nothing while capturing.
        assert!(state.on_tick(epoch).is_empty());
        assert_eq!(captures(&state.on_sample(LEVEL, now)), 0);
    }

    #[test]
    fn losing_lock_cancels_without_capture() {
        let mut state = GuidanceState::default();
        let now = Instant::now();
        let epoch = started_countdown(&state.on_sample(LEVEL, now)).unwrap();
        state.on_tick(epoch);

        let effects = state.on_sample(SIDEWAYS, now);
        assert!(effects.contains(&GuidanceEffect::CountdownCancelled));
        assert_eq!(state.countdown, CountdownState::Idle);

        // The cancelled run's timer may still fire once more.
        assert!(state.on_tick(epoch).is_empty());
    }

    #[test]
    fn relock_restarts_from_full_count() {
        let mut state = GuidanceState::default();
        let now = Instant::now();
        let first = started_countdown(&state.on_sample(LEVEL, now)).unwrap();
        state.on_tick(first);
        state.on_tick(first);
        state.on_sample(SIDEWAYS, now);

        let second = started_countdown(&state.on_sample(LEVEL, now)).unwrap();
        assert_ne!(first, second);
        assert_eq!(state.countdown, CountdownState::CountingDown { remaining: 3 });
        assert!(state.on_tick(first).is_empty());
    }

    #[test]
    fn successful_capture_advances_to_next_angle() {
        let mut state = GuidanceState::default();
        state.on_sample(LEVEL, Instant::now());
        state.manual_capture();

        let effects = state.on_capture_finished(Ok(()));
        assert_eq!(state.countdown, CountdownState::Idle);
        assert_eq!(state.angle, AngleId::Right45);
        assert_eq!(state.category, GuidanceCategory::Far);
        assert!(effects.contains(&GuidanceEffect::PhotoRecorded {
            angle: AngleId::Front
        }));
        assert!(effects.contains(&GuidanceEffect::AngleChanged {
            angle: AngleId::Right45
        }));
    }

    #[test]
    fn failed_capture_returns_to_idle_in_place() {
        let mut state = GuidanceState::default();
        state.on_sample(LEVEL, Instant::now());
        state.manual_capture();

        let effects = state.on_capture_finished(Err("camera busy".into()));
        assert_eq!(state.countdown, CountdownState::Idle);
        assert_eq!(state.angle, AngleId::Front);
        assert_eq!(
            effects,
            vec![GuidanceEffect::CaptureFailed {
                angle: AngleId::Front,
                message: "camera busy".into()
            }]
        );

        // No automatic retry: still locked, but no new countdown until the lock is re-achieved.
        assert!(started_countdown(&state.on_sample(LEVEL, Instant::now())).is_none());
    }

    #[test]
    fn donor_success_completes_instead_of_advancing() {
        let mut state = GuidanceState::new(&GuidanceConfig::default(), AngleId::Donor);
        // upside down: roll 180
        state.on_sample(MotionSample::new(0.0, 0.0, -1.0), Instant::now());
        assert_eq!(state.category, GuidanceCategory::Locked);
        state.manual_capture();

        let effects = state.on_capture_finished(Ok(()));
        assert!(effects.contains(&GuidanceEffect::SequenceComplete));
        assert_eq!(state.angle, AngleId::Donor);
        assert!(state.sequence_complete);

        // Completed sequences do not re-arm the countdown.
        state.on_sample(SIDEWAYS, Instant::now());
        let effects = state.on_sample(MotionSample::new(0.0, 0.0, -1.0), Instant::now());
        assert!(started_countdown(&effects).is_none());
    }

    #[test]
    fn manual_capture_needs_a_lock() {
        let mut state = GuidanceState::default();
        state.on_sample(SIDEWAYS, Instant::now());
        assert_eq!(
            state.manual_capture(),
            vec![GuidanceEffect::Voice(VoicePrompt::Adjust)]
        );
        assert_eq!(state.countdown, CountdownState::Idle);
    }

    #[test]
    fn manual_capture_preempts_running_countdown() {
        let mut state = GuidanceState::default();
        state.on_sample(LEVEL, Instant::now());

        let effects = state.manual_capture();
        assert_eq!(
            effects,
            vec![
                GuidanceEffect::CountdownCancelled,
                GuidanceEffect::TriggerCapture {
                    angle: AngleId::Front,
                    manual: true
                }
            ]
        );
        assert!(state.manual_capture().is_empty());
    }

    #[test]
    fn adjust_prompt_is_throttled_while_far() {
        let mut state = GuidanceState::default();
        let start = Instant::now();
        let adjust = GuidanceEffect::Voice(VoicePrompt::Adjust);

        let mut prompts = 0;
        for step in 0..90u64 {
            // 9 seconds of far samples at 100ms
            let now = start + Duration::from_millis(step * 100);
            let effects = state.on_sample(SIDEWAYS, now);
            prompts += effects.iter().filter(|effect| **effect == adjust).count();
        }
        assert_eq!(prompts, 3);
    }

    #[test]
    fn category_change_carries_cue_interval() {
        let mut state = GuidanceState::default();
        let effects = state.on_sample(LEVEL, Instant::now());
        assert_eq!(
            effects[0],
            GuidanceEffect::CategoryChanged {
                category: GuidanceCategory::Locked,
                cue_interval: Duration::from_millis(600)
            }
        );
        assert_eq!(state.cue_interval(), Duration::from_millis(600));
    }

    #[test]
    fn skip_cancels_countdown_and_moves_on() {
        let mut state = GuidanceState::default();
        state.on_sample(LEVEL, Instant::now());

        let effects = state.skip_angle();
        assert_eq!(effects[0], GuidanceEffect::CountdownCancelled);
        assert_eq!(state.angle, AngleId::Right45);
        assert_eq!(state.countdown, CountdownState::Idle);
    }

    #[test]
    fn select_angle_jumps_and_clears_completion() {
        let mut state = GuidanceState::new(&GuidanceConfig::default(), AngleId::Donor);
        state.skip_angle();
        assert!(state.sequence_complete);

        state.select_angle(AngleId::Top);
        assert_eq!(state.angle, AngleId::Top);
        assert!(!state.sequence_complete);
        assert!(state.snapshot(None).extra_assist);
    }

    #[test]
    fn halt_drops_pending_countdown() {
        let mut state = GuidanceState::default();
        let epoch = started_countdown(&state.on_sample(LEVEL, Instant::now())).unwrap();

        assert_eq!(state.halt(), vec![GuidanceEffect::CountdownCancelled]);
        assert_eq!(state.countdown, CountdownState::Idle);
        assert!(state.on_tick(epoch).is_empty());
        assert!(state.halt().is_empty());
    }

    #[test]
    fn sensor_loss_freezes_last_values() {
        let mut state = GuidanceState::default();
        state.on_sample(LEVEL, Instant::now());
        state.mark_sensor_unavailable();

        let snapshot = state.snapshot(Some("s1".into()));
        assert!(!snapshot.sensor_available);
        assert_eq!(snapshot.score, 1.0);
        assert_eq!(snapshot.category, GuidanceCategory::Locked);
    }
}
