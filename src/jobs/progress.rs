//! Progress Reporter
//!
//! The model APIs expose no mid-call progress, so a polling client would
//! watch a frozen number for minutes. The reporter writes synthetic,
//! bounded progress instead: starting at a floor and stepping toward a
//! ceiling it never crosses, leaving the range above for the real terminal
//! transition. The loop is self-terminating: it exits when the job turns
//! terminal or disappears, and carries its own hard runtime bound so an
//! orphaned reporter can never tick forever.

use std::sync::Arc;
use tokio::time::{Instant, interval};
use tracing::{debug, warn};

use super::store::{JobStore, JobUpdate};
use crate::constants::progress as progress_constants;
use crate::types::JobId;

pub struct ProgressReporter {
    store: Arc<dyn JobStore>,
    id: JobId,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn JobStore>, id: JobId) -> Self {
        Self { store, id }
    }

    /// Tick until the job is terminal, the ceiling is reached, or the
    /// runtime bound fires. Refused writes are expected when the
    /// orchestrator races ahead, so they are logged and ignored.
    pub async fn run(self) {
        let started = Instant::now();
        let mut ticker = interval(progress_constants::TICK_INTERVAL);

        loop {
            ticker.tick().await;

            if started.elapsed() >= progress_constants::MAX_RUNTIME {
                warn!(job = %self.id, "Progress reporter hit its runtime bound");
                return;
            }

            let Some(record) = self.store.get(self.id).await else {
                debug!(job = %self.id, "Job record gone, reporter exiting");
                return;
            };
            if record.state.is_terminal() {
                return;
            }

            let next = if record.progress < progress_constants::REPORTER_FLOOR {
                progress_constants::REPORTER_FLOOR
            } else {
                record
                    .progress
                    .saturating_add(progress_constants::REPORTER_STEP)
                    .min(progress_constants::REPORTER_CEILING)
            };

            if next > record.progress {
                let applied = self.store.update(self.id, JobUpdate::new().progress(next)).await;
                if !applied {
                    debug!(job = %self.id, "Progress write refused, reporter exiting");
                    return;
                }
            }

            if next >= progress_constants::REPORTER_CEILING {
                return;
            }
        }
    }
}
