// file: src/utils/telemetry.rs
// description: stage timing for pipeline cycles
// reference: https://docs.rs/tracing

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Threshold after which a finished stage is reported as slow.
pub const SLOW_STAGE: Duration = Duration::from_secs(60);

/// Times one named stage of a cycle and logs it with structured fields.
pub struct OperationTimer {
    stage: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(stage: &'static str) -> Self {
        debug!(stage, "stage started");
        Self {
            stage,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!(stage = self.stage, elapsed_ms = elapsed.as_millis() as u64, "stage finished");
        self.warn_if_slow(elapsed);
        elapsed
    }

    pub fn finish_with_count(self, count: usize) -> Duration {
        let elapsed = self.elapsed();
        info!(
            stage = self.stage,
            count,
            elapsed_ms = elapsed.as_millis() as u64,
            "stage finished"
        );
        self.warn_if_slow(elapsed);
        elapsed
    }

    fn warn_if_slow(&self, elapsed: Duration) {
        if elapsed > SLOW_STAGE {
            warn!(
                stage = self.stage,
                "slow stage: {:.1}s (threshold {}s)",
                elapsed.as_secs_f64(),
                SLOW_STAGE.as_secs()
            );
        }
    }
}
