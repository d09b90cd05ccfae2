use std::collections::HashSet;

use chrono::{Local, NaiveDate};
use engine_logging::engine_warn;
use press_core::{id_from_href, parse_issue_date, Article, Image, ImageNames, Issue, Section};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::rewrite::{resolve_url, ContentRewriter};
use crate::site::{ProfileError, SiteProfile, SiteRules};

/// An expected element is missing from the fetched markup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("cover image not found")]
    MissingCover,
    #[error("no sections found")]
    NoSections,
    #[error("section {index} has no heading")]
    MissingSectionHeading { index: usize },
    #[error("entry {index} of section '{section}' has no usable link")]
    MissingArticleLink { section: String, index: usize },
    #[error("article content container not found")]
    MissingContent,
    #[error("cannot resolve url '{0}'")]
    InvalidUrl(String),
}

/// Turns landing-page and article markup into the issue graph.
#[derive(Debug, Clone)]
pub struct IssueExtractor {
    profile: SiteProfile,
    rules: SiteRules,
}

impl IssueExtractor {
    pub fn new(profile: SiteProfile) -> Result<Self, ProfileError> {
        let rules = profile.compile()?;
        Ok(Self { profile, rules })
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// Builds the issue skeleton (sections and article stubs) from the landing page.
    ///
    /// `page_url` is the URL the page was served from; its last path segment is
    /// the issue identifier. `requested_date` overrides the date parsed from it.
    pub fn parse_issue(
        &self,
        html: &str,
        page_url: &Url,
        requested_date: Option<NaiveDate>,
    ) -> Result<Issue, StructureError> {
        let document = Html::parse_document(html);

        let issue_id = id_from_href(page_url.path())
            .map(ToOwned::to_owned)
            .or_else(|| requested_date.map(|d| d.to_string()))
            .ok_or_else(|| StructureError::InvalidUrl(page_url.to_string()))?;

        let cover_el = document
            .select(&self.rules.cover_image)
            .next()
            .ok_or(StructureError::MissingCover)?;
        let cover_src = cover_el
            .value()
            .attr("src")
            .and_then(|src| resolve_url(src, page_url))
            .ok_or(StructureError::MissingCover)?;
        let title = cover_el
            .value()
            .attr("title")
            .or_else(|| cover_el.value().attr("alt"))
            .unwrap_or_default()
            .trim()
            .to_string();
        let cover = Image::with_name(cover_src, &self.profile.cover_name);

        let date = requested_date
            .or_else(|| parse_issue_date(&issue_id))
            .unwrap_or_else(|| {
                let today = Local::now().date_naive();
                engine_warn!(
                    "Issue identifier '{}' is not a date, using {} as issue date",
                    issue_id,
                    today
                );
                today
            });

        let mut issue = Issue::new(&issue_id, &self.profile.publication, title, date, cover);
        issue.publisher = self.profile.publisher.clone();

        for (index, section_el) in document.select(&self.rules.section).enumerate() {
            let section = self.parse_section(section_el, index, page_url)?;
            issue.push(section);
        }
        if issue.sections().is_empty() {
            return Err(StructureError::NoSections);
        }
        Ok(issue)
    }

    fn parse_section(
        &self,
        section_el: ElementRef,
        index: usize,
        page_url: &Url,
    ) -> Result<Section, StructureError> {
        let heading = section_el
            .select(&self.rules.section_heading)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .ok_or(StructureError::MissingSectionHeading { index })?;

        let mut section = Section::new(heading);
        for (entry_index, entry) in section_el.select(&self.rules.article_entry).enumerate() {
            let missing = || StructureError::MissingArticleLink {
                section: section.title.clone(),
                index: entry_index,
            };
            let link = entry.select(&self.rules.article_link).next().ok_or_else(missing)?;
            let target = link
                .value()
                .attr("href")
                .and_then(|href| resolve_url(href, page_url))
                .ok_or_else(missing)?;
            let source_id = id_from_href(target.path()).ok_or_else(missing)?.to_string();
            section.push(Article::new(&source_id, element_text(link), target));
        }
        Ok(section)
    }

    /// Fills in one article from its page.
    ///
    /// On error the article is left untouched (content stays unset).
    pub fn parse_article(
        &self,
        article: &mut Article,
        html: &str,
        article_ids: &HashSet<String>,
        names: &mut ImageNames,
    ) -> Result<(), StructureError> {
        let document = Html::parse_document(html);

        let container = document
            .select(&self.rules.content)
            .next()
            .ok_or(StructureError::MissingContent)?;

        let source = article.source().clone();
        let output = ContentRewriter::new(&self.rules.content_rules, &source, article_ids)
            .rewrite(container, names);

        if let Some(topic) = first_text(&document, &self.rules.kicker) {
            article.set_topic(&topic);
        }
        article.abstract_text = first_text(&document, &self.rules.rubric).filter(|t| !t.is_empty());
        article.content = Some(output.html);
        article.images = output.images;
        Ok(())
    }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(element_text)
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
