use crate::partition::partition::SchedulerInputs;
use crate::partition::DataPartition;
use crate::storage::ExtentType;
use std::sync::Arc;
use tokio::time::{interval_at, sleep, Duration, Instant};

impl DataPartition {
    /// The partition's control loop. Ticks never overlap: each branch runs to completion before
    /// the next one is picked.
    pub(crate) async fn run_scheduler(self: Arc<Self>, inputs: SchedulerInputs) {
        let SchedulerInputs {
            mut repair_rx,
            mut volume_info_rx,
            mut stop,
        } = inputs;
        let options = self.ctx.options().clone();
        let ticker = |period: Duration| interval_at(Instant::now() + period, period);

        let mut repair_timer = ticker(options.repair_interval);
        let mut crc_timer = ticker(options.crc_validate_interval);
        let mut persist_timer = ticker(options.persist_interval);
        let mut truncate_timer = ticker(options.truncate_interval);
        let volume_info_retry = sleep(options.volume_info_retry_interval);
        tokio::pin!(volume_info_retry);
        let mut volume_info_retry_armed = false;
        let mut index: u64 = 0;

        slog::debug!(self.logger, "Scheduler started");
        loop {
            tokio::select! {
                _ = &mut stop => break,
                Some(()) = repair_rx.recv() => {
                    self.run_repair(ExtentType::Tiny, false).await;
                    self.run_repair(ExtentType::Normal, false).await;
                }
                _ = repair_timer.tick() => {
                    index += 1;
                    self.update_status();
                    let extent_type = if index % 2 == 0 { ExtentType::Tiny } else { ExtentType::Normal };
                    self.run_repair(extent_type, true).await;
                    self.fix_issues().await;
                }
                _ = crc_timer.tick() => {
                    self.validate_crc().await;
                }
                Some(()) = volume_info_rx.recv() => {
                    if !self.refresh_volume_info().await {
                        volume_info_retry.as_mut().reset(Instant::now() + options.volume_info_retry_interval);
                        volume_info_retry_armed = true;
                    }
                }
                _ = &mut volume_info_retry, if volume_info_retry_armed => {
                    volume_info_retry_armed = !self.refresh_volume_info().await;
                    if volume_info_retry_armed {
                        volume_info_retry.as_mut().reset(Instant::now() + options.volume_info_retry_interval);
                    }
                }
                _ = persist_timer.tick() => {
                    if let Err(e) = self.persist_metadata_only() {
                        slog::error!(self.logger, "Periodic metadata persist failed: {}", e);
                    }
                }
                _ = truncate_timer.tick() => {
                    self.propose_truncate();
                }
            }
        }
        slog::debug!(self.logger, "Scheduler stopped");
    }

    async fn refresh_volume_info(&self) -> bool {
        match self.update_volume_info_from_master().await {
            Ok(()) => true,
            Err(e) => {
                slog::warn!(self.logger, "Volume info refresh failed, will retry: {}", e);
                false
            }
        }
    }
}
