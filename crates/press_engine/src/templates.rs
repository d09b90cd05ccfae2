//! Fixed documents of the package, filled from the issue.

use std::fmt::Write;

use press_core::{safe_member_name, Article, Image, Issue};

use crate::markup::{escape_attr, escape_text};

pub const STYLE_CSS: &str = "body { font-family: serif; margin: 0 0.5em; }
h1 { font-size: 1.4em; }
h2.title { font-size: 1.3em; margin: 0.2em 0; }
h4 { font-size: 1em; margin: 1em 0 0.3em 0; }
p { text-indent: 0; margin: 0 0 0.6em 0; }
p.topic { font-size: 0.8em; text-transform: uppercase; margin: 0; }
p.abstract { font-style: italic; }
div.section h3 { font-size: 1.1em; border-bottom: 1px solid #000; }
img { max-width: 100%; }
";

const XHTML_DOCTYPE: &str = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">";

/// One table-of-contents group: a section and its rendered articles.
#[derive(Debug, Clone)]
pub struct TocSection<'a> {
    pub title: &'a str,
    pub articles: Vec<&'a Article>,
}

/// What actually went into the package, used by every metadata document.
#[derive(Debug, Clone)]
pub struct PackageContents<'a> {
    pub issue: &'a Issue,
    /// Sections with at least one rendered article, in issue order.
    pub sections: Vec<TocSection<'a>>,
    /// Images that were written, in `issue.images()` order.
    pub images: Vec<&'a Image>,
    pub language: &'a str,
}

impl<'a> PackageContents<'a> {
    pub fn new(
        issue: &'a Issue,
        rendered: &[String],
        written_images: &[String],
        language: &'a str,
    ) -> Self {
        let sections = issue
            .sections()
            .iter()
            .map(|section| TocSection {
                title: &section.title,
                articles: section
                    .articles
                    .iter()
                    .filter(|a| rendered.iter().any(|id| id == a.id()))
                    .collect(),
            })
            .filter(|section| !section.articles.is_empty())
            .collect();
        let images = issue
            .images()
            .into_iter()
            .filter(|image| written_images.iter().any(|p| p == image.rel_path()))
            .collect();
        Self {
            issue,
            sections,
            images,
            language,
        }
    }

    pub fn articles(&self) -> impl Iterator<Item = &'a Article> + '_ {
        self.sections.iter().flat_map(|s| s.articles.iter().copied())
    }

    fn uid(&self) -> String {
        format!(
            "{}-{}",
            safe_member_name(&self.issue.publication).to_ascii_lowercase(),
            self.issue.id()
        )
    }

    fn cover_written(&self) -> bool {
        self.images
            .iter()
            .any(|image| image.rel_path() == self.issue.cover.rel_path())
    }
}

pub fn render_container_xml() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">
  <rootfiles>
    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>
  </rootfiles>
</container>
"
    .to_string()
}

pub fn render_content_opf(contents: &PackageContents) -> String {
    let issue = contents.issue;
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" version=\"2.0\" unique-identifier=\"BookId\">\n",
    );
    out.push_str(
        "  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:opf=\"http://www.idpf.org/2007/opf\">\n",
    );
    let _ = writeln!(
        out,
        "    <dc:title>{}</dc:title>",
        escape_text(&issue.title_with_publication())
    );
    let _ = writeln!(out, "    <dc:language>{}</dc:language>", escape_text(contents.language));
    let _ = writeln!(
        out,
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>",
        escape_text(&contents.uid())
    );
    let _ = writeln!(out, "    <dc:creator>{}</dc:creator>", escape_text(&issue.publication));
    if let Some(publisher) = issue.publisher.as_deref() {
        let _ = writeln!(out, "    <dc:publisher>{}</dc:publisher>", escape_text(publisher));
    }
    let _ = writeln!(out, "    <dc:date>{}</dc:date>", issue.date);
    if contents.cover_written() {
        let _ = writeln!(
            out,
            "    <meta name=\"cover\" content=\"{}\"/>",
            escape_attr(issue.cover.id())
        );
    }
    out.push_str("  </metadata>\n  <manifest>\n");
    out.push_str("    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n");
    out.push_str("    <item id=\"toc\" href=\"toc.html\" media-type=\"application/xhtml+xml\"/>\n");
    out.push_str("    <item id=\"style\" href=\"style.css\" media-type=\"text/css\"/>\n");
    for article in contents.articles() {
        let _ = writeln!(
            out,
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>",
            escape_attr(article.id()),
            escape_attr(&article.file_name())
        );
    }
    for image in &contents.images {
        // Unknown types are never written, so they never reach the manifest.
        if let Some(mime) = image.media_type().mime() {
            let _ = writeln!(
                out,
                "    <item id=\"{}\" href=\"{}\" media-type=\"{mime}\"/>",
                escape_attr(image.id()),
                escape_attr(image.rel_path())
            );
        }
    }
    out.push_str("  </manifest>\n  <spine toc=\"ncx\">\n    <itemref idref=\"toc\"/>\n");
    for article in contents.articles() {
        let _ = writeln!(out, "    <itemref idref=\"{}\"/>", escape_attr(article.id()));
    }
    out.push_str("  </spine>\n  <guide>\n");
    out.push_str("    <reference type=\"toc\" title=\"Table of Contents\" href=\"toc.html\"/>\n");
    if let Some(first) = contents.articles().next() {
        let _ = writeln!(
            out,
            "    <reference type=\"text\" title=\"Beginning\" href=\"{}\"/>",
            escape_attr(&first.file_name())
        );
    }
    out.push_str("  </guide>\n</package>\n");
    out
}

pub fn render_toc_html(contents: &PackageContents) -> String {
    let title = escape_text(&contents.issue.title_with_publication());
    let mut out = xhtml_head(&title);
    let _ = writeln!(out, "<h1>{title}</h1>");
    for section in &contents.sections {
        out.push_str("<div class=\"section\">\n");
        let _ = writeln!(out, "<h3>{}</h3>", escape_text(section.title));
        out.push_str("<ul>\n");
        for article in &section.articles {
            let _ = writeln!(
                out,
                "<li><a href=\"{}\">{}</a></li>",
                escape_attr(&article.file_name()),
                escape_text(&article.title_with_topic())
            );
        }
        out.push_str("</ul>\n</div>\n");
    }
    out.push_str("</body>\n</html>\n");
    out
}

pub fn render_toc_ncx(contents: &PackageContents) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n");
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n<head>\n");
    let _ = writeln!(out, "  <meta name=\"dtb:uid\" content=\"{}\"/>", escape_attr(&contents.uid()));
    out.push_str("  <meta name=\"dtb:depth\" content=\"2\"/>\n");
    out.push_str("  <meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
    out.push_str("  <meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n</head>\n");
    let _ = writeln!(
        out,
        "<docTitle><text>{}</text></docTitle>",
        escape_text(&contents.issue.title_with_publication())
    );
    out.push_str("<navMap>\n");
    out.push_str("  <navPoint id=\"toc\" playOrder=\"1\"><navLabel><text>Table of Contents</text></navLabel><content src=\"toc.html\"/></navPoint>\n");

    // A section shares its play order with its first article: both open the same file.
    let mut play_order = 1;
    for (index, section) in contents.sections.iter().enumerate() {
        let Some(first) = section.articles.first() else {
            continue;
        };
        play_order += 1;
        let _ = writeln!(
            out,
            "  <navPoint id=\"section{}\" playOrder=\"{play_order}\"><navLabel><text>{}</text></navLabel><content src=\"{}\"/>",
            index + 1,
            escape_text(section.title),
            escape_attr(&first.file_name())
        );
        for (position, article) in section.articles.iter().enumerate() {
            if position > 0 {
                play_order += 1;
            }
            let _ = writeln!(
                out,
                "    <navPoint id=\"nav{}\" playOrder=\"{play_order}\"><navLabel><text>{}</text></navLabel><content src=\"{}\"/></navPoint>",
                escape_attr(article.id()),
                escape_text(&article.title_with_topic()),
                escape_attr(&article.file_name())
            );
        }
        out.push_str("  </navPoint>\n");
    }
    out.push_str("</navMap>\n</ncx>\n");
    out
}

/// Renders one article page. `None` for an article without content.
pub fn render_article(article: &Article) -> Option<String> {
    let content = article.content.as_deref()?;
    let title = escape_text(&article.title);
    let mut out = xhtml_head(&title);
    out.push_str("<div class=\"article\">\n");
    if let Some(topic) = article.topic.as_deref() {
        let _ = writeln!(out, "<p class=\"topic\">{}</p>", escape_text(topic));
    }
    let _ = writeln!(out, "<h2 class=\"title\">{title}</h2>");
    if let Some(abstract_text) = article.abstract_text.as_deref() {
        let _ = writeln!(out, "<p class=\"abstract\">{}</p>", escape_text(abstract_text));
    }
    let _ = writeln!(out, "<div class=\"content\">{content}</div>");
    out.push_str("</div>\n</body>\n</html>\n");
    Some(out)
}

fn xhtml_head(escaped_title: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{XHTML_DOCTYPE}\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n<meta http-equiv=\"Content-Type\" content=\"application/xhtml+xml; charset=utf-8\"/>\n<title>{escaped_title}</title>\n<link rel=\"stylesheet\" type=\"text/css\" href=\"style.css\"/>\n</head>\n<body>\n"
    )
}
