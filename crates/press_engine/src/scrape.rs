use chrono::NaiveDate;
use engine_logging::{engine_info, engine_warn};
use press_core::{ImageNames, Issue};

use crate::extract::IssueExtractor;
use crate::fetch::{fetch_page, ProgressSink, Session};
use crate::pipeline::IssueError;
use crate::{PipelineEvent, Progress, Stage};

/// Fetches an issue and all its articles, one request at a time.
pub struct IssueScraper<'a> {
    session: &'a dyn Session,
    extractor: &'a IssueExtractor,
}

impl<'a> IssueScraper<'a> {
    pub fn new(session: &'a dyn Session, extractor: &'a IssueExtractor) -> Self {
        Self { session, extractor }
    }

    /// Scrapes the issue for `date`, or the current issue when `date` is `None`.
    ///
    /// Landing-page failures are fatal; a failing article is logged, reported to
    /// `sink` and left without content.
    pub async fn scrape(
        &self,
        date: Option<NaiveDate>,
        sink: &dyn ProgressSink,
    ) -> Result<Issue, IssueError> {
        let date_label = date.map(|d| d.to_string());
        let url = self.extractor.profile().issue_url(date_label.as_deref());
        sink.emit(PipelineEvent::Progress(Progress {
            stage: Stage::FetchingIssue,
            done: 0,
            total: 1,
        }));

        let page = fetch_page(self.session, &url)
            .await
            .map_err(|source| IssueError::Fetch {
                url: url.clone(),
                source,
            })?;
        let mut issue = self.extractor.parse_issue(&page.html, &page.url, date)?;
        engine_info!("Creating e-reader edition of issue {}", issue);

        let article_ids = issue.article_ids();
        let mut names = ImageNames::new();
        names.claim(&issue.cover);

        let total = issue.articles().count();
        engine_info!("Downloading and processing {} articles", total);
        for (done, article) in issue.articles_mut().enumerate() {
            let reason = match fetch_page(self.session, article.source().as_str()).await {
                Ok(page) => self
                    .extractor
                    .parse_article(article, &page.html, &article_ids, &mut names)
                    .err()
                    .map(|err| err.to_string()),
                Err(err) => Some(err.to_string()),
            };
            if let Some(reason) = reason {
                engine_warn!("Skipping article {} ({}): {}", article.id(), article.source(), reason);
                sink.emit(PipelineEvent::ItemSkipped {
                    stage: Stage::FetchingArticles,
                    item: article.id().to_string(),
                    reason,
                });
            }
            sink.emit(PipelineEvent::Progress(Progress {
                stage: Stage::FetchingArticles,
                done: done + 1,
                total,
            }));
        }
        Ok(issue)
    }
}
