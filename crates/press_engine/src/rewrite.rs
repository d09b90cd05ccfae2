use std::collections::HashSet;

use ego_tree::NodeRef;
use press_core::{id_from_href, Article, Image, ImageNames};
use scraper::node::Node;
use scraper::ElementRef;
use url::Url;

use crate::markup::{escape_attr, escape_text, is_dropped_element, is_void_element};
use crate::site::ContentRules;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    pub html: String,
    pub images: Vec<Image>,
}

/// Serializes an article's content container while applying the content rules:
/// removal boxes are dropped, internal links point at rendered files, bold
/// lead-in paragraphs become headings and images point at their local copies.
pub struct ContentRewriter<'a> {
    rules: &'a ContentRules,
    base_url: &'a Url,
    article_ids: &'a HashSet<String>,
}

impl<'a> ContentRewriter<'a> {
    pub fn new(rules: &'a ContentRules, base_url: &'a Url, article_ids: &'a HashSet<String>) -> Self {
        Self {
            rules,
            base_url,
            article_ids,
        }
    }

    /// Rewrites the children of `container` (its inner markup).
    pub fn rewrite(&self, container: ElementRef, names: &mut ImageNames) -> RewriteOutput {
        let mut ctx = RewriteContext {
            out: String::new(),
            images: Vec::new(),
            names,
        };
        for child in container.children() {
            self.visit_node(child, &mut ctx);
        }
        RewriteOutput {
            html: ctx.out,
            images: ctx.images,
        }
    }

    fn visit_node(&self, node: NodeRef<'_, Node>, ctx: &mut RewriteContext) {
        match node.value() {
            // Escaped in every context, style included.
            Node::Text(text) => ctx.out.push_str(&escape_text(text)),
            Node::Comment(comment) => {
                ctx.out.push_str("<!--");
                ctx.out.push_str(comment);
                ctx.out.push_str("-->");
            }
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element, ctx);
                }
            }
            _ => {
                for child in node.children() {
                    self.visit_node(child, ctx);
                }
            }
        }
    }

    fn visit_element(&self, element: ElementRef, ctx: &mut RewriteContext) {
        let tag = element.value().name().to_ascii_lowercase();
        if is_dropped_element(&tag) || self.rules.remove.iter().any(|sel| sel.matches(&element)) {
            return;
        }

        match tag.as_str() {
            "p" if self.rules.promote_lead_ins => match lead_in(element) {
                Some(text) => {
                    ctx.out.push_str("<h4>");
                    ctx.out.push_str(&escape_text(&text));
                    ctx.out.push_str("</h4>");
                }
                None => self.emit_element(element, &tag, None, ctx),
            },
            "a" => {
                let href = element
                    .value()
                    .attr("href")
                    .and_then(|href| self.local_link(href))
                    .map(|local| ("href", local));
                self.emit_element(element, &tag, href, ctx);
            }
            "img" => {
                let src = element
                    .value()
                    .attr("src")
                    .and_then(|src| self.image_source(src))
                    .map(|source| {
                        let image = ctx.names.image_for(source);
                        let rel_path = image.rel_path().to_string();
                        ctx.images.push(image);
                        ("src", rel_path)
                    });
                self.emit_element(element, &tag, src, ctx);
            }
            _ => self.emit_element(element, &tag, None, ctx),
        }
    }

    /// Writes `element` as-is, except for one optionally replaced attribute.
    fn emit_element(
        &self,
        element: ElementRef,
        tag: &str,
        replace: Option<(&str, String)>,
        ctx: &mut RewriteContext,
    ) {
        ctx.out.push('<');
        ctx.out.push_str(tag);
        for (name, value) in element.value().attrs() {
            let value = match &replace {
                Some((replaced, new_value)) if name.eq_ignore_ascii_case(replaced) => new_value.as_str(),
                _ => value,
            };
            ctx.out.push(' ');
            ctx.out.push_str(name);
            ctx.out.push_str("=\"");
            ctx.out.push_str(&escape_attr(value));
            ctx.out.push('"');
        }
        if is_void_element(tag) {
            ctx.out.push_str("/>");
            return;
        }
        ctx.out.push('>');
        for child in element.children() {
            self.visit_node(child, ctx);
        }
        ctx.out.push_str("</");
        ctx.out.push_str(tag);
        ctx.out.push('>');
    }

    /// Rendered file name when `href` points at another article of this issue.
    fn local_link(&self, href: &str) -> Option<String> {
        let target = resolve_url(href, self.base_url)?;
        if !same_site(&target, self.base_url) {
            return None;
        }
        let id = Article::id_for(id_from_href(target.path())?);
        self.article_ids
            .contains(&id)
            .then(|| Article::file_name_for(&id))
    }

    fn image_source(&self, src: &str) -> Option<Url> {
        resolve_url(src, self.base_url).filter(|url| matches!(url.scheme(), "http" | "https"))
    }
}

struct RewriteContext<'n> {
    out: String,
    images: Vec<Image>,
    names: &'n mut ImageNames,
}

/// Text of the leading `<strong>` when it is the paragraph's first child node.
fn lead_in(paragraph: ElementRef) -> Option<String> {
    let first = paragraph.first_child()?;
    let strong = ElementRef::wrap(first)?;
    if !strong.value().name().eq_ignore_ascii_case("strong") {
        return None;
    }
    Some(strong.text().collect::<String>().trim().to_string())
}

pub(crate) fn resolve_url(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.join(trimmed).ok()
}

fn same_site(target: &Url, base: &Url) -> bool {
    fn bare(url: &Url) -> Option<&str> {
        url.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h))
    }
    matches!(target.scheme(), "http" | "https")
        && bare(target).is_some()
        && bare(target).map(str::to_ascii_lowercase) == bare(base).map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteProfile;
    use scraper::{Html, Selector};

    fn rewrite(body: &str, ids: &[&str]) -> RewriteOutput {
        let rules = SiteProfile::default().compile().unwrap();
        let base = Url::parse("http://www.economist.com/node/100").unwrap();
        let ids: HashSet<String> = ids.iter().map(|s| s.to_string()).collect();
        let html = format!(r#"<div class="ec-article-content">{body}</div>"#);
        let doc = Html::parse_fragment(&html);
        let sel = Selector::parse(".ec-article-content").unwrap();
        let container = doc.select(&sel).next().unwrap();
        let mut names = ImageNames::new();
        ContentRewriter::new(&rules.content_rules, &base, &ids).rewrite(container, &mut names)
    }

    #[test]
    fn lead_in_paragraph_becomes_heading() {
        let out = rewrite("<p><strong>Lead</strong> rest of it</p><p>plain <strong>x</strong></p>", &[]);
        assert_eq!(out.html, "<h4>Lead</h4><p>plain <strong>x</strong></p>");
    }

    #[test]
    fn leading_text_prevents_promotion() {
        let out = rewrite("<p> <strong>Lead</strong></p>", &[]);
        assert_eq!(out.html, "<p> <strong>Lead</strong></p>");
    }

    #[test]
    fn related_boxes_are_dropped() {
        let out = rewrite(
            r#"<p>a</p><div class="related-items"><a href="/node/5">x</a></div><aside class="related-expanded">y</aside><p>b</p>"#,
            &[],
        );
        assert_eq!(out.html, "<p>a</p><p>b</p>");
    }

    #[test]
    fn scripts_are_dropped_and_style_text_is_escaped() {
        let out = rewrite(
            r#"<p>a</p><script>if (1 < 2 && x) { go(); }</script><style>p > b { }</style><p>b</p>"#,
            &[],
        );
        assert_eq!(out.html, "<p>a</p><style>p &gt; b { }</style><p>b</p>");
    }

    #[test]
    fn relative_and_absolute_internal_links_are_localized() {
        let out = rewrite(
            r#"<a href="/node/111">rel</a><a href="http://economist.com/node/112?fsrc=x">abs</a>"#,
            &["article111", "article112"],
        );
        assert_eq!(
            out.html,
            r#"<a href="article111.html">rel</a><a href="article112.html">abs</a>"#
        );
    }

    #[test]
    fn ids_match_by_equality_not_prefix() {
        let out = rewrite(r#"<a href="http://www.economist.com/node/1111">x</a>"#, &["article111"]);
        assert_eq!(out.html, r#"<a href="http://www.economist.com/node/1111">x</a>"#);
    }

    #[test]
    fn foreign_hosts_are_not_localized() {
        let out = rewrite(r#"<a href="http://other.org/node/111">x</a>"#, &["article111"]);
        assert_eq!(out.html, r#"<a href="http://other.org/node/111">x</a>"#);
    }

    #[test]
    fn images_are_localized_in_order() {
        let out = rewrite(r#"<p><img src="http://x/a.jpg"></p><img src="/media/b.png">"#, &[]);
        assert_eq!(
            out.html,
            r#"<p><img src="images/a.jpg"/></p><img src="images/b.png"/>"#
        );
        let names: Vec<&str> = out.images.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
        assert_eq!(
            out.images[1].source().as_str(),
            "http://www.economist.com/media/b.png"
        );
    }

    #[test]
    fn other_attributes_survive_image_rewrite() {
        let out = rewrite(r#"<img alt="Chart &amp; table" src="http://x/c.gif">"#, &[]);
        assert!(out.html.contains(r#"src="images/c.gif""#));
        assert!(out.html.contains(r#"alt="Chart &amp; table""#));
    }

    #[test]
    fn data_uris_are_left_alone() {
        let out = rewrite(r#"<img src="data:image/gif;base64,R0lG">"#, &[]);
        assert_eq!(out.html, r#"<img src="data:image/gif;base64,R0lG"/>"#);
        assert!(out.images.is_empty());
    }
}
