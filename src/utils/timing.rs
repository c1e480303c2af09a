//! Checkpointed timers for logging how long an orchestration call spends in each phase.

use log::{debug, info, warn};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Timer {
    start_time: Instant,
    operation_name: String,
    checkpoints: Vec<(String, Instant)>,
}

impl Timer {
    pub fn start(operation_name: &str) -> Self {
        debug!("Starting timer for: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name: operation_name.to_string(),
            checkpoints: Vec::new(),
        }
    }

    /// Add a checkpoint to track intermediate timing
    pub fn checkpoint(&mut self, checkpoint_name: &str) {
        let now = Instant::now();
        self.checkpoints.push((checkpoint_name.to_string(), now));
        debug!(
            "{} - {}: {}ms",
            self.operation_name,
            checkpoint_name,
            now.duration_since(self.start_time).as_millis()
        );
    }

    pub fn finish(self) -> Duration {
        let total_duration = self.start_time.elapsed();
        if self.checkpoints.is_empty() {
            info!(
                "{} completed in {}ms",
                self.operation_name,
                total_duration.as_millis()
            );
        } else {
            let mut last_time = self.start_time;
            let segments: Vec<String> = self
                .checkpoints
                .iter()
                .map(|(name, time)| {
                    let segment = time.duration_since(last_time);
                    last_time = *time;
                    format!("{}={}ms", name, segment.as_millis())
                })
                .collect();
            info!(
                "{} completed in {}ms ({})",
                self.operation_name,
                total_duration.as_millis(),
                segments.join(", ")
            );
        }
        total_duration
    }

    /// Finish with a warning if the operation took too long
    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let operation_name = self.operation_name.clone();
        let total_duration = self.finish();
        if total_duration > threshold {
            warn!(
                "{} took {}ms (exceeds threshold of {}ms)",
                operation_name,
                total_duration.as_millis(),
                threshold.as_millis()
            );
        }
        total_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_are_recorded_in_order() {
        let mut timer = Timer::start("resolve");
        timer.checkpoint("cache");
        timer.checkpoint("fetch");
        assert_eq!(timer.checkpoints.len(), 2);
        assert_eq!(timer.checkpoints[0].0, "cache");
        assert!(timer.checkpoints[1].1 >= timer.checkpoints[0].1);
        let total = timer.finish_with_threshold(Duration::from_secs(60));
        assert!(total < Duration::from_secs(60));
    }
}
