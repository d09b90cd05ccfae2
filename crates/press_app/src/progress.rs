use std::sync::atomic::{AtomicUsize, Ordering};

use engine_logging::{engine_debug, engine_info};
use press_engine::{PipelineEvent, ProgressSink, Stage};

/// Turns pipeline events into log lines and counts skipped items.
#[derive(Debug, Default)]
pub struct LogProgressSink {
    skipped: AtomicUsize,
}

impl LogProgressSink {
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Progress(progress) => {
                // Per-item counters only at the end of a stage.
                if progress.done == progress.total || progress.stage == Stage::Done {
                    engine_info!("{}: {}/{}", progress.stage, progress.done, progress.total);
                } else {
                    engine_debug!("{}: {}/{}", progress.stage, progress.done, progress.total);
                }
            }
            PipelineEvent::ItemSkipped { stage, item, reason } => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                engine_debug!("{} skipped while {}: {}", item, stage, reason);
            }
            PipelineEvent::IssueCompleted { label, result } => match result {
                Ok(path) => engine_info!("Issue {} written to {}", label, path.display()),
                Err(reason) => engine_info!("Issue {} not written: {}", label, reason),
            },
        }
    }
}
