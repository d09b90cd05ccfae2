use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use engine_logging::{engine_info, engine_warn};
use press_engine::{
    FetchSettings, IssueExtractor, KindlegenConverter, PackageWriter, Pipeline, ReqwestSession,
    Session, SiteProfile, SmtpNotifier,
};

use crate::config::AppConfig;
use crate::progress::LogProgressSink;

/// Runs every requested issue. `Ok(false)` when at least one issue failed.
pub fn run(config: AppConfig, dates: &[NaiveDate]) -> Result<bool> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start the async runtime")?;
    runtime.block_on(run_issues(config, dates))
}

async fn run_issues(config: AppConfig, dates: &[NaiveDate]) -> Result<bool> {
    let profile = SiteProfile::default();
    let session = ReqwestSession::new(FetchSettings::default(), profile.login.clone());

    match config.credentials() {
        Some(credentials) => {
            let accepted = session
                .login(&credentials)
                .await
                .context("login request failed")?;
            if !accepted {
                bail!("login rejected for {}", credentials.email);
            }
        }
        None => engine_warn!("No credentials configured, subscriber-only articles will be skipped"),
    }

    let extractor = IssueExtractor::new(profile).context("invalid site profile")?;
    let mut writer = PackageWriter::new(config.package_config());
    if let Some(binary) = config.converter.as_deref() {
        writer = writer.with_converter(Box::new(KindlegenConverter::new(binary)));
    }
    let mut pipeline = Pipeline::new(&session, extractor, writer);
    if let Some((smtp, recipients)) = config.delivery() {
        engine_info!("Finished issues go to {}", recipients.join(", "));
        pipeline = pipeline.with_notifier(Box::new(SmtpNotifier::new(smtp, recipients)));
    }

    let sink = LogProgressSink::default();
    let outcomes = pipeline.run(dates, &sink).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    engine_info!(
        "{} of {} issue(s) written, {} item(s) skipped",
        outcomes.len() - failed,
        outcomes.len(),
        sink.skipped()
    );
    Ok(failed == 0)
}
