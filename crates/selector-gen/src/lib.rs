//! Selector synthesizer
//!
//! Given a click target (often a deeply nested node), derives a short CSS
//! selector for the interactive element the user meant. Strategies run in
//! preference order and the first success wins: id, then unique attribute
//! selectors, then a bounded ancestor path. Only the attribute strategy
//! checks uniqueness; the path fallback is explicitly best-effort.

use thiserror::Error;
use tracing::debug;

use tubedeck_core_types::NodeId;
use tubedeck_dom::{DomError, Page};

/// Attributes tried for the unique-attribute strategy, in order.
const UNIQUE_ATTRS: [&str; 4] = ["aria-label", "title", "data-testid", "data-id"];

/// Max ancestor levels in the path fallback.
const MAX_PATH_DEPTH: usize = 3;

/// Synthesizer error enumeration
#[derive(Debug, Error, Clone)]
pub enum SynthesizeError {
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Derive a selector for `node`.
pub fn synthesize(page: &Page, node: NodeId) -> Result<String, SynthesizeError> {
    let target = clickable_target(page, node)?;

    // Ids are unique by construction.
    if let Some(id) = non_empty_attr(page, target, "id") {
        return Ok(format!("#{id}"));
    }

    let tag = page.tag(target)?;
    for attr in UNIQUE_ATTRS {
        let Some(value) = non_empty_attr(page, target, attr) else {
            continue;
        };
        let candidate = format!("{tag}[{attr}=\"{value}\"]");
        // An unparseable or ambiguous candidate silently falls through to
        // the next strategy.
        match page.query_selector_all(&candidate) {
            Ok(matches) if matches.len() == 1 => {
                debug!(selector = %candidate, "unique attribute selector");
                return Ok(candidate);
            }
            Ok(matches) => {
                debug!(selector = %candidate, count = matches.len(), "not unique, falling through");
            }
            Err(_) => {}
        }
    }

    Ok(ancestor_path(page, target)?)
}

/// Ascend toward the body looking for the nearest clickable ancestor: a
/// native button, a hyperlink, or an element with `role="button"`. The
/// walk never crosses into the body; without a hit the original node is
/// the synthesis target.
fn clickable_target(page: &Page, node: NodeId) -> Result<NodeId, SynthesizeError> {
    let body = page.body();
    let mut current = node;
    while current != body {
        if is_clickable(page, current)? {
            return Ok(current);
        }
        match page.parent(current)? {
            Some(parent) => {
                // A child of a native button means the button is the
                // intended target.
                if parent != body && page.tag(parent)? == "button" {
                    return Ok(parent);
                }
                current = parent;
            }
            None => break,
        }
    }
    Ok(node)
}

fn is_clickable(page: &Page, node: NodeId) -> Result<bool, SynthesizeError> {
    let tag = page.tag(node)?;
    if tag == "button" || tag == "a" {
        return Ok(true);
    }
    Ok(page.attribute(node, "role").as_deref() == Some("button"))
}

/// Bounded tag.class path, outermost first, joined with " > ". An
/// ancestor with an id terminates the walk and is included as `tag#id`.
fn ancestor_path(page: &Page, target: NodeId) -> Result<String, SynthesizeError> {
    let body = page.body();
    let mut path: Vec<String> = Vec::new();
    let mut current = Some(target);
    let mut depth = 0;

    while let Some(id) = current {
        if id == body || depth >= MAX_PATH_DEPTH {
            break;
        }
        let tag = page.tag(id)?;
        if let Some(id_attr) = non_empty_attr(page, id, "id") {
            path.insert(0, format!("{tag}#{id_attr}"));
            break;
        }

        let mut level = tag;
        if let Some(class) = meaningful_class(page, id) {
            level.push('.');
            level.push_str(&class);
        }
        path.insert(0, level);

        current = page.parent(id)?;
        depth += 1;
    }

    Ok(path.join(" > "))
}

/// First class that is not part of the host page's click-ripple /
/// touch-feedback decoration.
fn meaningful_class(page: &Page, node: NodeId) -> Option<String> {
    page.classes(node)
        .into_iter()
        .find(|c| !c.starts_with("yt-simple-endpoint") && !c.contains("touch-feedback"))
}

fn non_empty_attr(page: &Page, node: NodeId, name: &str) -> Option<String> {
    page.attribute(node, name).filter(|v| !v.is_empty())
}
