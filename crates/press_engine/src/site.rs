//! Everything that ties the pipeline to one source site.
//!
//! Selectors are kept as plain strings in [`SiteProfile`] so a change in the
//! site's markup is a data change; [`SiteRules`] is the compiled form used by
//! the extractor.

use scraper::Selector;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("invalid selector for {rule}: {selector}")]
    InvalidSelector { rule: &'static str, selector: String },
}

/// How to authenticate against the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub url: String,
    pub form_selector: String,
    pub email_field: String,
    pub password_field: String,
}

/// Selectors for the issue landing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingSelectors {
    pub cover_image: String,
    pub section: String,
    pub section_heading: String,
    pub article_entry: String,
    pub article_link: String,
}

/// Selectors and rewrite switches for article pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSelectors {
    pub kicker: String,
    pub rubric: String,
    pub content: String,
    /// Boxes dropped from the content container before rewriting.
    pub remove: Vec<String>,
    /// Turn `<p><strong>lead</strong>...</p>` into `<h4>lead</h4>`.
    pub promote_lead_ins: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub publication: String,
    pub publisher: Option<String>,
    pub current_issue_url: String,
    /// Prefix a `YYYY-MM-DD` date is appended to.
    pub dated_issue_url: String,
    /// Local name of the cover image inside the package.
    pub cover_name: String,
    pub login: LoginForm,
    pub landing: LandingSelectors,
    pub article: ArticleSelectors,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            publication: "The Economist".to_string(),
            publisher: Some("The Economist Newspaper Ltd.".to_string()),
            current_issue_url: "http://www.economist.com/printedition".to_string(),
            dated_issue_url: "http://www.economist.com/printedition/".to_string(),
            cover_name: "cover.jpg".to_string(),
            login: LoginForm {
                url: "https://www.economist.com/user/login".to_string(),
                form_selector: "form#user-login".to_string(),
                email_field: "name".to_string(),
                password_field: "pass".to_string(),
            },
            landing: LandingSelectors {
                cover_image: ".issue-image > img".to_string(),
                section: ".section".to_string(),
                section_heading: "h4".to_string(),
                article_entry: ".article".to_string(),
                article_link: ".node-link".to_string(),
            },
            article: ArticleSelectors {
                kicker: ".fly-title".to_string(),
                rubric: ".rubric".to_string(),
                content: ".ec-article-content".to_string(),
                remove: vec![".related-items".to_string(), ".related-expanded".to_string()],
                promote_lead_ins: true,
            },
        }
    }
}

impl SiteProfile {
    /// Landing page URL for a dated issue, or the current issue when `date` is `None`.
    pub fn issue_url(&self, date: Option<&str>) -> String {
        match date {
            Some(date) => format!("{}{date}", self.dated_issue_url),
            None => self.current_issue_url.clone(),
        }
    }

    pub fn compile(&self) -> Result<SiteRules, ProfileError> {
        Ok(SiteRules {
            cover_image: compile("cover_image", &self.landing.cover_image)?,
            section: compile("section", &self.landing.section)?,
            section_heading: compile("section_heading", &self.landing.section_heading)?,
            article_entry: compile("article_entry", &self.landing.article_entry)?,
            article_link: compile("article_link", &self.landing.article_link)?,
            kicker: compile("kicker", &self.article.kicker)?,
            rubric: compile("rubric", &self.article.rubric)?,
            content: compile("content", &self.article.content)?,
            content_rules: ContentRules {
                remove: self
                    .article
                    .remove
                    .iter()
                    .map(|s| compile("remove", s))
                    .collect::<Result<_, _>>()?,
                promote_lead_ins: self.article.promote_lead_ins,
            },
        })
    }
}

fn compile(rule: &'static str, selector: &str) -> Result<Selector, ProfileError> {
    Selector::parse(selector).map_err(|_| ProfileError::InvalidSelector {
        rule,
        selector: selector.to_string(),
    })
}

/// Rules applied to the content container of an article.
#[derive(Debug, Clone)]
pub struct ContentRules {
    pub remove: Vec<Selector>,
    pub promote_lead_ins: bool,
}

#[derive(Debug, Clone)]
pub struct SiteRules {
    pub cover_image: Selector,
    pub section: Selector,
    pub section_heading: Selector,
    pub article_entry: Selector,
    pub article_link: Selector,
    pub kicker: Selector,
    pub rubric: Selector,
    pub content: Selector,
    pub content_rules: ContentRules,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_compiles() {
        assert!(SiteProfile::default().compile().is_ok());
    }

    #[test]
    fn broken_selector_names_the_rule() {
        let mut profile = SiteProfile::default();
        profile.article.content = "[[".to_string();
        let err = profile.compile().unwrap_err();
        assert_eq!(
            err,
            ProfileError::InvalidSelector {
                rule: "content",
                selector: "[[".to_string()
            }
        );
    }

    #[test]
    fn issue_urls() {
        let profile = SiteProfile::default();
        assert_eq!(
            profile.issue_url(Some("2013-01-05")),
            "http://www.economist.com/printedition/2013-01-05"
        );
        assert_eq!(profile.issue_url(None), "http://www.economist.com/printedition");
    }
}
