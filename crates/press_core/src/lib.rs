//! Press core: the in-memory model of a periodical issue.
mod article;
mod image;
mod issue;
mod naming;

pub use article::{id_from_href, Article};
pub use image::{Image, ImageNames, MediaType, IMAGE_DIR};
pub use issue::{parse_issue_date, Issue, IssueMetadata, Section};
pub use naming::{safe_file_stem, safe_member_name, short_hash};
