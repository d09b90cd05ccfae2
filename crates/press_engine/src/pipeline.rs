use std::path::PathBuf;

use chrono::NaiveDate;
use engine_logging::{engine_error, engine_info, engine_warn, set_issue_context};
use thiserror::Error;

use crate::extract::{IssueExtractor, StructureError};
use crate::fetch::{ProgressSink, Session};
use crate::notify::Notifier;
use crate::package::{PackageError, PackageWriter};
use crate::scrape::IssueScraper;
use crate::{FetchError, PipelineEvent, Progress, Stage};

/// Failure that aborts one issue; the run goes on with the next one.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("cannot fetch {url}: {source}")]
    Fetch { url: String, source: FetchError },
    #[error("unexpected page structure: {0}")]
    Structure(#[from] StructureError),
    #[error("packaging failed: {0}")]
    Package(#[from] PackageError),
}

/// Outcome of one requested issue.
#[derive(Debug)]
pub struct IssueOutcome {
    /// The requested date, or `"current"`.
    pub label: String,
    pub result: Result<PathBuf, IssueError>,
}

/// Scrape, package and (optionally) deliver, one issue after the other.
pub struct Pipeline<'a> {
    session: &'a dyn Session,
    extractor: IssueExtractor,
    writer: PackageWriter,
    notifier: Option<Box<dyn Notifier>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(session: &'a dyn Session, extractor: IssueExtractor, writer: PackageWriter) -> Self {
        Self {
            session,
            extractor,
            writer,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Processes every date in order; no dates means the current issue.
    pub async fn run(&self, dates: &[NaiveDate], sink: &dyn ProgressSink) -> Vec<IssueOutcome> {
        let requested: Vec<Option<NaiveDate>> = if dates.is_empty() {
            vec![None]
        } else {
            dates.iter().copied().map(Some).collect()
        };

        let mut outcomes = Vec::with_capacity(requested.len());
        for date in requested {
            let label = date.map_or_else(|| "current".to_string(), |d| d.to_string());
            set_issue_context(Some(&label));
            let result = self.run_issue(date, sink).await;
            match &result {
                Ok(path) => engine_info!("Issue ready: {}", path.display()),
                Err(err) => engine_error!("Issue failed: {}", err),
            }
            sink.emit(PipelineEvent::IssueCompleted {
                label: label.clone(),
                result: result
                    .as_ref()
                    .map(Clone::clone)
                    .map_err(ToString::to_string),
            });
            set_issue_context(None);
            outcomes.push(IssueOutcome { label, result });
        }
        outcomes
    }

    pub async fn run_issue(
        &self,
        date: Option<NaiveDate>,
        sink: &dyn ProgressSink,
    ) -> Result<PathBuf, IssueError> {
        let issue = IssueScraper::new(self.session, &self.extractor)
            .scrape(date, sink)
            .await?;
        let output = self.writer.write(&issue, self.session, sink).await?;

        if let Some(notifier) = &self.notifier {
            sink.emit(PipelineEvent::Progress(Progress {
                stage: Stage::Delivering,
                done: 0,
                total: 1,
            }));
            // The file stays on disk either way.
            if let Err(err) = notifier.deliver(&issue.metadata(), &output) {
                engine_warn!("Delivery of {} failed: {}", output.display(), err);
            }
        }
        sink.emit(PipelineEvent::Progress(Progress {
            stage: Stage::Done,
            done: 1,
            total: 1,
        }));
        Ok(output)
    }
}
