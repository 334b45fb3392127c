use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::guidance::GuidanceController;

use super::loop_worker::sampling_loop;
use super::source::MotionSampleSource;

/// Owns the background task feeding motion samples into guidance.
#[derive(Default)]
pub struct SensingController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SensingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn start_sampling(
        &mut self,
        source: Box<dyn MotionSampleSource>,
        interval: Duration,
        guidance: GuidanceController,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        if self.is_active() {
            bail!("sampling already active");
        }

        info!("Starting motion sampling from {}", source.name());
        let token_clone = cancel_token.clone();
        let handle = tokio::spawn(sampling_loop(source, interval, guidance, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop_sampling(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sampling loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}
