use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::error::GuidanceError;
use crate::guidance::MotionSample;

/// Anything that can stream tri-axial motion samples at a roughly fixed rate.
#[async_trait]
pub trait MotionSampleSource: Send {
    fn name(&self) -> &str;

    /// Acquire the sensor. `SensorUnavailable` means no samples will ever arrive.
    async fn start(&mut self, interval: Duration) -> Result<(), GuidanceError>;

    /// Wait for the next sample. `Ok(None)` means the stream ended cleanly.
    async fn next_sample(&mut self) -> Result<Option<MotionSample>, GuidanceError>;

    async fn stop(&mut self) -> Result<(), GuidanceError>;
}

/// Replays a fixed list of samples, one per interval.
pub struct ScriptedMotionSource {
    name: String,
    samples: VecDeque<MotionSample>,
    ticker: Option<Interval>,
    delivered: usize,
    fail_on_start: Option<String>,
    fail_after: Option<(usize, String)>,
}

impl ScriptedMotionSource {
    pub fn new(samples: Vec<MotionSample>) -> Self {
        Self {
            name: "scripted".to_string(),
            samples: samples.into(),
            ticker: None,
            delivered: 0,
            fail_on_start: None,
            fail_after: None,
        }
    }

    /// Same sample `count` times.
    pub fn repeat(sample: MotionSample, count: usize) -> Self {
        Self::new(vec![sample; count])
    }

    /// One JSON object per line: `{"x": 0.0, "y": 0.0, "z": 1.0}`. Blank lines are skipped.
    pub async fn from_jsonl_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read motion script {}", path.display()))?;

        let mut samples = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let sample: MotionSample = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid sample", path.display(), index + 1))?;
            samples.push(sample);
        }

        let mut source = Self::new(samples);
        source.name = path.display().to_string();
        Ok(source)
    }

    pub fn then(mut self, sample: MotionSample, count: usize) -> Self {
        self.samples.extend(std::iter::repeat(sample).take(count));
        self
    }

    /// Simulate a denied permission or missing hardware.
    pub fn failing_on_start(mut self, reason: &str) -> Self {
        self.fail_on_start = Some(reason.to_string());
        self
    }

    /// Simulate the sensor dying after `count` samples.
    pub fn fail_after(mut self, count: usize, reason: &str) -> Self {
        self.fail_after = Some((count, reason.to_string()));
        self
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

#[async_trait]
impl MotionSampleSource for ScriptedMotionSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self, interval: Duration) -> Result<(), GuidanceError> {
        if let Some(reason) = &self.fail_on_start {
            return Err(GuidanceError::SensorUnavailable(reason.clone()));
        }

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        Ok(())
    }

    async fn next_sample(&mut self) -> Result<Option<MotionSample>, GuidanceError> {
        let ticker = self
            .ticker
            .as_mut()
            .ok_or_else(|| GuidanceError::SensorUnavailable("source not started".into()))?;
        ticker.tick().await;

        if let Some((limit, reason)) = &self.fail_after {
            if self.delivered >= *limit {
                return Err(GuidanceError::SensorUnavailable(reason.clone()));
            }
        }

        let sample = self.samples.pop_front();
        if sample.is_some() {
            self.delivered += 1;
        }
        Ok(sample)
    }

    async fn stop(&mut self) -> Result<(), GuidanceError> {
        self.ticker = None;
        Ok(())
    }
}
