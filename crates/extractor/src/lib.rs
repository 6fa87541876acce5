//! Text extractor
//!
//! Walks a container's text nodes in document order, discards anything
//! rendered inside a hyperlink, and keeps only the fragments that read as
//! a view count or a publish date. Output below the readiness floor is a
//! soft "not rendered yet" signal, never an error.

mod patterns;

use tracing::trace;
use tubedeck_core_types::NodeId;
use tubedeck_dom::Page;

pub use patterns::is_views_or_date;

/// Shorter output than this means the host page has not rendered the
/// readout yet; callers retry on the next trigger.
pub const MIN_CONTENT_LEN: usize = 5;

/// Extraction outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Extraction {
    /// Filtered, normalized view/date text.
    Ready(String),
    /// Nothing usable yet; soft failure.
    NotReady,
}

impl Extraction {
    pub fn ready(self) -> Option<String> {
        match self {
            Extraction::Ready(text) => Some(text),
            Extraction::NotReady => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Extraction::Ready(_))
    }
}

/// Extract the view-count/date readout from `container`.
pub fn extract_views_and_date(page: &Page, container: NodeId) -> Extraction {
    let mut pieces: Vec<String> = Vec::new();

    for text_node in page.descendant_text_nodes(container) {
        if is_inside_link(page, text_node, container) {
            continue;
        }
        let Ok(data) = page.text_data(text_node) else {
            continue;
        };
        let trimmed = data.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed.to_string());
        }
    }

    let joined = pieces.join(" ");
    let all_text = patterns::WHITESPACE_RUN
        .replace_all(&joined, " ")
        .trim()
        .to_string();

    let filtered: Vec<&str> = patterns::FRAGMENT_SPLIT
        .split(&all_text)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty() && is_views_or_date(fragment))
        .collect();

    let result = filtered.join(" ");
    trace!(raw = %all_text, filtered = %result, "extracted watch info");

    if result.len() < MIN_CONTENT_LEN {
        Extraction::NotReady
    } else {
        Extraction::Ready(result)
    }
}

/// Whether any ancestor strictly between the text node and the container
/// is a hyperlink.
fn is_inside_link(page: &Page, text_node: NodeId, container: NodeId) -> bool {
    let mut current = page.parent(text_node).ok().flatten();
    while let Some(ancestor) = current {
        if ancestor == container {
            return false;
        }
        if page.tag(ancestor).map(|t| t == "a").unwrap_or(false) {
            return true;
        }
        current = page.parent(ancestor).ok().flatten();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `#info` container with plain text plus hashtag links, the shape the
    /// watch page renders.
    fn info_fixture(page: &Page) -> NodeId {
        let info = page.create_element_with("div", &[("id", "info")]);
        page.append_child(page.body(), info).unwrap();

        let views = page.create_text("1,024,155 views  ");
        page.append_child(info, views).unwrap();

        let date = page.create_text("  Nov 21, 2025");
        page.append_child(info, date).unwrap();

        let link = page.create_element_with("a", &[("href", "/hashtag/sorts")]);
        page.append_child(info, link).unwrap();
        let link_text = page.create_text("#shorts 9,999,999 views");
        page.append_child(link, link_text).unwrap();

        info
    }

    #[test]
    fn keeps_views_and_date_drops_link_text() {
        let page = Page::new();
        let info = info_fixture(&page);

        let text = extract_views_and_date(&page, info).ready().unwrap();
        assert!(text.contains("1,024,155 views"));
        assert!(text.contains("Nov 21, 2025"));
        assert!(!text.contains("#shorts"));
        assert!(!text.contains("9,999,999"));
    }

    #[test]
    fn nested_link_text_is_still_excluded() {
        let page = Page::new();
        let info = page.create_element("div");
        page.append_child(page.body(), info).unwrap();
        let link = page.create_element("a");
        page.append_child(info, link).unwrap();
        let span = page.create_element("span");
        page.append_child(link, span).unwrap();
        let t = page.create_text("Members first");
        page.append_child(span, t).unwrap();
        let visible = page.create_text("2 weeks ago");
        page.append_child(info, visible).unwrap();

        assert_eq!(
            extract_views_and_date(&page, info),
            Extraction::Ready("2 weeks ago".into())
        );
    }

    #[test]
    fn short_output_is_not_ready() {
        let page = Page::new();
        let info = page.create_element("div");
        page.append_child(page.body(), info).unwrap();

        // Empty container: nothing rendered yet.
        assert!(!extract_views_and_date(&page, info).is_ready());

        // Unrelated text only: everything filtered away.
        let t = page.create_text("Show transcript");
        page.append_child(info, t).unwrap();
        assert_eq!(extract_views_and_date(&page, info), Extraction::NotReady);
    }

    #[test]
    fn whitespace_runs_collapse() {
        let page = Page::new();
        let info = page.create_element("div");
        page.append_child(page.body(), info).unwrap();
        let t = page.create_text("  3\u{a0}hours   ago \n premiered ");
        page.append_child(info, t).unwrap();

        // Non-breaking and repeated whitespace collapse to single spaces.
        let text = extract_views_and_date(&page, info).ready().unwrap();
        assert_eq!(text, "3 hours ago premiered");
    }
}
