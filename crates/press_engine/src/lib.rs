//! Press engine: session, extraction and packaging of periodical issues.
mod archive;
mod convert;
mod decode;
mod extract;
mod fetch;
mod login;
mod markup;
mod notify;
mod package;
mod persist;
mod pipeline;
mod rewrite;
mod scrape;
mod site;
mod templates;
mod transcode;
mod types;

pub use archive::{archive_dir, ArchiveError, MIMETYPE};
pub use convert::{ConversionError, FormatConverter, KindlegenConverter};
pub use decode::{decode_markup, DecodeError, DecodedMarkup};
pub use extract::{IssueExtractor, StructureError};
pub use fetch::{
    fetch_page, Credentials, FetchSettings, NullProgressSink, Page, ProgressSink, ReqwestSession,
    ResourceKind, Session,
};
pub use login::{login_succeeded, LoginRequest};
pub use notify::{Notifier, NotifyError, SmtpNotifier, SmtpSettings};
pub use package::{PackageConfig, PackageError, PackageLayout, PackageWriter};
pub use persist::{ensure_output_dir, reset_dir, AtomicFileWriter, PersistError};
pub use pipeline::{IssueError, IssueOutcome, Pipeline};
pub use rewrite::{ContentRewriter, RewriteOutput};
pub use scrape::IssueScraper;
pub use site::{
    ArticleSelectors, ContentRules, LandingSelectors, LoginForm, ProfileError, SiteProfile,
    SiteRules,
};
pub use templates::{
    render_article, render_container_xml, render_content_opf, render_toc_html, render_toc_ncx,
    PackageContents, TocSection, STYLE_CSS,
};
pub use transcode::{normalize, ImageNormalization, TranscodeError};
pub use types::{
    FailureKind, FetchError, FetchMetadata, FetchOutput, PipelineEvent, Progress, Stage,
};
