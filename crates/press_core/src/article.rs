use std::fmt;

use url::Url;

use crate::image::Image;

const ARTICLE_ID_PREFIX: &str = "article";

/// Source id of a link: query and fragment stripped, last non-empty `/` segment.
///
/// `"http://site/node/111?page=2"` and `"/node/111/"` both give `"111"`.
pub fn id_from_href(href: &str) -> Option<&str> {
    let without_fragment = href.split('#').next().unwrap_or(href);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    without_query
        .split('/')
        .filter(|segment| !segment.is_empty())
        .last()
}

/// One content item of an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    id: String,
    source: Url,
    pub title: String,
    /// Kicker label, filled once the article page has been fetched.
    pub topic: Option<String>,
    pub abstract_text: Option<String>,
    /// Rewritten inner markup; `None` until extracted (and forever if extraction failed).
    pub content: Option<String>,
    /// Images referenced by `content`, in order of appearance.
    pub images: Vec<Image>,
}

impl Article {
    pub fn new(source_id: &str, title: impl Into<String>, source: Url) -> Self {
        Self {
            id: Self::id_for(source_id),
            source,
            title: title.into(),
            topic: None,
            abstract_text: None,
            content: None,
            images: Vec::new(),
        }
    }

    /// Article identifier for a source id (`"111"` becomes `"article111"`).
    pub fn id_for(source_id: &str) -> String {
        format!("{ARTICLE_ID_PREFIX}{source_id}")
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &Url {
        &self.source
    }

    /// Name of the rendered document, relative to the content root.
    pub fn file_name(&self) -> String {
        Self::file_name_for(&self.id)
    }

    pub fn file_name_for(id: &str) -> String {
        format!("{id}.html")
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Sets the topic unless it is blank.
    pub fn set_topic(&mut self, topic: &str) {
        let topic = topic.trim();
        if !topic.is_empty() {
            self.topic = Some(topic.to_string());
        }
    }

    pub fn title_with_topic(&self) -> String {
        match self.topic.as_deref() {
            Some(topic) if !topic.is_empty() => format!("{topic}: {}", self.title),
            _ => self.title.clone(),
        }
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title_with_topic())
    }
}
