//! Link and image extraction
//!
//! Both extractors walk the parsed document with an explicit stack rather
//! than recursion: nesting depth is attacker-controlled, and hostile HTML
//! must not be able to exhaust the call stack.

use crate::catalog::{now_timestamp, Catalog};
use crate::config::Config;
use crate::text::filter_caption;
use crate::url::{canonicalize, UrlTarget};
use ego_tree::NodeRef;
use scraper::{Html, Node, Selector};

/// An image discovered on a page, with its derived caption text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHit {
    pub url: String,
    pub alt: String,
    pub surrounding: String,
}

/// Walks the document and upserts every crawlable link into the catalog
///
/// Returns the number of hrefs that survived normalization. Callers skip
/// this entirely while URL discovery is suspended.
pub fn harvest_links(doc: &Html, base_url: &str, catalog: &Catalog, config: &Config) -> usize {
    let mut found = 0;
    let mut stack = vec![doc.tree.root()];
    while let Some(node) = stack.pop() {
        if let Node::Element(element) = node.value() {
            if element.name() == "a" {
                if let Some(href) = element.attr("href") {
                    if !href.trim().is_empty() {
                        if let Some(url) =
                            canonicalize(href, base_url, UrlTarget::Page, config.max_url_length)
                        {
                            catalog.upsert_page(&url, &now_timestamp());
                            found += 1;
                        }
                    }
                }
            }
        }
        stack.extend(node.children());
    }
    found
}

/// Walks the document and collects every image with a usable absolute URL
///
/// `caption_seed` (page title or first h1) is prefixed onto the
/// surrounding text of every hit before filtering.
pub fn collect_images(doc: &Html, base_url: &str, caption_seed: &str, config: &Config) -> Vec<ImageHit> {
    let mut hits = Vec::new();
    let mut stack = vec![doc.tree.root()];
    while let Some(node) = stack.pop() {
        if let Node::Element(element) = node.value() {
            if element.name() == "img" {
                if let Some(src) = element.attr("src") {
                    if let Some(url) =
                        canonicalize(src, base_url, UrlTarget::Image, config.max_url_length)
                    {
                        if url.starts_with("http") {
                            let alt = element
                                .attr("alt")
                                .map(|alt| filter_caption(alt, config.max_str_length))
                                .unwrap_or_default();
                            let surrounding =
                                surrounding_text(node, caption_seed, config.max_str_length);
                            hits.push(ImageHit {
                                url,
                                alt,
                                surrounding,
                            });
                        }
                    }
                }
            }
        }
        stack.extend(node.children());
    }
    hits
}

/// Derives the surrounding text of an image node
///
/// The nearest non-blank text sibling on each side (non-text siblings are
/// skipped), prefixed with the page caption seed, then filtered and capped
/// like alt text.
fn surrounding_text(node: NodeRef<'_, Node>, caption_seed: &str, budget: usize) -> String {
    let before = nearest_text(node.prev_siblings());
    let after = nearest_text(node.next_siblings());

    let mut parts = Vec::new();
    if !caption_seed.is_empty() {
        parts.push(caption_seed.to_string());
    }
    parts.extend(before);
    parts.extend(after);
    filter_caption(&parts.join(" "), budget)
}

/// First non-blank text node in the iterator (nearest sibling first)
fn nearest_text<'a, I>(siblings: I) -> Option<String>
where
    I: Iterator<Item = NodeRef<'a, Node>>,
{
    siblings.into_iter().find_map(|sibling| match sibling.value() {
        Node::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    })
}

/// The page title, falling back to the first `<h1>` text anywhere
pub fn caption_seed(doc: &Html) -> String {
    first_text(doc, "title")
        .or_else(|| first_text(doc, "h1"))
        .unwrap_or_default()
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CatalogCounts;

    const BASE: &str = "https://x.com/dir/page.html";

    fn parse(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn harvests_and_normalizes_anchors() {
        let catalog = Catalog::new().unwrap();
        let config = Config::default();
        let doc = parse(
            r#"<html><body>
                <a href="/a/b">one</a>
                <a href="other.html">two</a>
                <a href="mailto:x@y.com">nope</a>
                <a href="">blank</a>
            </body></html>"#,
        );

        let found = harvest_links(&doc, BASE, &catalog, &config);
        assert_eq!(found, 2);
        assert_eq!(
            catalog.counts(),
            CatalogCounts {
                pending_pages: 2,
                ..CatalogCounts::default()
            }
        );
    }

    #[test]
    fn duplicate_hrefs_yield_one_record() {
        let catalog = Catalog::new().unwrap();
        let config = Config::default();
        let doc = parse(r#"<a href="/a">x</a><a href="/a">y</a><a href="/a#frag">z</a>"#);

        harvest_links(&doc, BASE, &catalog, &config);
        assert_eq!(catalog.counts().pending_pages, 1);
    }

    #[test]
    fn collects_images_with_alt_and_siblings() {
        let config = Config::default();
        let doc = parse(
            r#"<html><head><title>The Beach Guide</title></head><body>
                <p>Golden sand before <img src="/i/sunset.jpg" alt="a red sunset"> and waves after</p>
            </body></html>"#,
        );

        let hits = collect_images(&doc, BASE, &caption_seed(&doc), &config);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://x.com/i/sunset.jpg");
        assert_eq!(hits[0].alt, "red sunset");
        assert_eq!(hits[0].surrounding, "beach guide golden sand waves");
    }

    #[test]
    fn image_query_strings_are_stripped() {
        let config = Config::default();
        let doc = parse(r#"<img src="/i/a.png?width=200">"#);
        let hits = collect_images(&doc, BASE, "", &config);
        assert_eq!(hits[0].url, "https://x.com/i/a.png");
    }

    #[test]
    fn title_falls_back_to_first_h1() {
        let doc = parse("<html><body><h1>Big Header</h1><h1>Later</h1></body></html>");
        assert_eq!(caption_seed(&doc), "Big Header");

        let titled = parse("<html><head><title>Real Title</title></head><body><h1>H</h1></body></html>");
        assert_eq!(caption_seed(&titled), "Real Title");
    }

    #[test]
    fn deeply_nested_markup_does_not_overflow() {
        let mut html = String::from("<html><body>");
        for _ in 0..5000 {
            html.push_str("<div>");
        }
        html.push_str(r#"<a href="/deep">x</a><img src="/deep.jpg">"#);
        for _ in 0..5000 {
            html.push_str("</div>");
        }
        html.push_str("</body></html>");

        let catalog = Catalog::new().unwrap();
        let config = Config::default();
        let doc = parse(&html);
        assert_eq!(harvest_links(&doc, BASE, &catalog, &config), 1);
        assert_eq!(collect_images(&doc, BASE, "", &config).len(), 1);
    }

    #[test]
    fn relative_image_without_scheme_host_is_skipped() {
        let config = Config::default();
        // A base URL with no scheme leaves nothing to resolve against
        let doc = parse(r#"<img src="/i/a.jpg">"#);
        let hits = collect_images(&doc, "not-a-url", "", &config);
        assert!(hits.is_empty());
    }
}
