use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;

use crate::article::Article;
use crate::image::Image;
use crate::naming::safe_file_stem;

const ISSUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses an issue identifier of the form `YYYY-MM-DD`.
pub fn parse_issue_date(id: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(id, ISSUE_DATE_FORMAT).ok()
}

/// A thematic grouping of articles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub articles: Vec<Article>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            articles: Vec::new(),
        }
    }

    pub fn push(&mut self, article: Article) {
        self.articles.push(article);
    }
}

/// Descriptive fields shared by the package metadata and delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueMetadata {
    pub id: String,
    pub title: String,
    pub publication: String,
    pub publisher: Option<String>,
    pub date: NaiveDate,
}

/// One periodical edition: the root of the document graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    id: String,
    pub title: String,
    pub publication: String,
    pub publisher: Option<String>,
    pub date: NaiveDate,
    pub cover: Image,
    sections: Vec<Section>,
}

impl Issue {
    /// The identifier is made filesystem-safe on construction.
    pub fn new(
        id: &str,
        publication: impl Into<String>,
        title: impl Into<String>,
        date: NaiveDate,
        cover: Image,
    ) -> Self {
        Self {
            id: safe_file_stem(id, "issue"),
            title: title.into(),
            publication: publication.into(),
            publisher: None,
            date,
            cover,
            sections: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// All articles across sections, in source order.
    pub fn articles(&self) -> impl Iterator<Item = &Article> + '_ {
        self.sections.iter().flat_map(|s| s.articles.iter())
    }

    pub fn articles_mut(&mut self) -> impl Iterator<Item = &mut Article> + '_ {
        self.sections.iter_mut().flat_map(|s| s.articles.iter_mut())
    }

    /// Articles whose content was extracted; only these are packaged.
    pub fn rendered_articles(&self) -> impl Iterator<Item = &Article> + '_ {
        self.articles().filter(|a| a.has_content())
    }

    pub fn article_ids(&self) -> HashSet<String> {
        self.articles().map(|a| a.id().to_string()).collect()
    }

    /// Article images in order, then the cover. An image shared by several
    /// articles (same relative path) is listed once.
    pub fn images(&self) -> Vec<&Image> {
        let mut seen = HashSet::new();
        self.articles()
            .flat_map(|a| a.images.iter())
            .chain(std::iter::once(&self.cover))
            .filter(|image| seen.insert(image.rel_path()))
            .collect()
    }

    pub fn title_with_publication(&self) -> String {
        format!("{} (Issue {}): {}", self.publication, self.date, self.title)
    }

    pub fn metadata(&self) -> IssueMetadata {
        IssueMetadata {
            id: self.id.clone(),
            title: self.title.clone(),
            publication: self.publication.clone(),
            publisher: self.publisher.clone(),
            date: self.date,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.title)
    }
}
