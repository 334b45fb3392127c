use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::guidance::GuidanceController;

use super::source::MotionSampleSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Pull samples from `source` into `guidance` until cancelled or the source gives out.
pub async fn sampling_loop(
    mut source: Box<dyn MotionSampleSource>,
    interval: Duration,
    guidance: GuidanceController,
    cancel_token: CancellationToken,
) {
    let name = source.name().to_string();

    if let Err(err) = source.start(interval).await {
        log_warn!("motion source {} failed to start: {err}", name);
        guidance.mark_sensor_unavailable(err.to_string()).await;
        return;
    }
    log_info!(
        "sampling motion from {} every {}ms",
        name,
        interval.as_millis()
    );

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down");
                break;
            }
            next = source.next_sample() => match next {
                Ok(Some(sample)) => guidance.on_sample(sample).await,
                Ok(None) => {
                    log_info!("motion source {} has no more samples", name);
                    break;
                }
                Err(err) => {
                    log_warn!("motion source {} failed: {err}", name);
                    guidance.mark_sensor_unavailable(err.to_string()).await;
                    break;
                }
            }
        }
    }

    if let Err(err) = source.stop().await {
        log_error!("failed to release motion source {}: {err}", name);
    }
}
