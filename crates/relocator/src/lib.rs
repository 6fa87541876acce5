//! Layout relocator
//!
//! Clones the views/date readout into the top row next to the channel
//! info and optionally pulls the action controls into the same container,
//! then restyles the row so the remaining controls sit right-justified.
//! Every move is independent and optional; a missing source element skips
//! that move only. Reparented elements get a two-phase visibility fix
//! because the host page's component framework may reassert hidden styles
//! asynchronously after the move.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use tubedeck_core_types::NodeId;
use tubedeck_dom::{DomError, Page};
use tubedeck_extractor::{extract_views_and_date, Extraction};
use tubedeck_waiter::{wait_for_any, wait_for_element, WaitError, DEFAULT_TIMEOUT};

pub use tubedeck_core_types::{CLONE_ID, LAST_TEXT_ATTR};

/// Candidate selectors for the subscriber-count element, tried in order.
pub const SUBSCRIBER_SELECTORS: [&str; 4] = [
    "#owner-sub-count",
    "ytd-video-owner-renderer #owner #subscriber-count",
    "#subscriber-count",
    "yt-formatted-string#owner-sub-count",
];

/// The views/date source container.
pub const INFO_SELECTOR: &str = "ytd-watch-info-text #info";

/// Wrapper around the source container, watched as a fallback trigger.
pub const INFO_CONTAINER_SELECTOR: &str = "ytd-watch-info-text #info-container";

/// Action controls pulled into the owner row, each optional.
const RELOCATED_CONTROLS: [&str; 4] = [
    "#subscribe-button",
    "#notification-preference-button",
    "#sponsor-button",
    "#purchase-button",
];

/// Buttons that, when visible inside the owner renderer, take the
/// right-justifying auto margin instead of the subscribe control.
const RIGHT_JUSTIFY_CANDIDATES: [&str; 3] = [
    "#sponsor-button:not([hidden])",
    "#purchase-button:not([hidden])",
    "#analytics-button:not([hidden])",
];

#[derive(Clone, Debug)]
pub struct RelocateOptions {
    /// Upper bound on each element wait.
    pub timeout: Duration,

    /// Whether action controls are moved into the owner container, or
    /// only restyled in place.
    pub relocate_buttons: bool,
}

impl Default for RelocateOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            relocate_buttons: false,
        }
    }
}

/// Relocation outcome; all three are normal results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelocateOutcome {
    /// Fresh clone inserted and styled.
    Relocated { clone: NodeId, info: NodeId },

    /// Clone already present; nothing touched.
    AlreadyPresent,

    /// Source text below the readiness floor; retry on a later trigger.
    NotReady,
}

/// Relocator error enumeration
#[derive(Debug, Error, Clone)]
pub enum RelocateError {
    /// A required element never appeared
    #[error(transparent)]
    Wait(#[from] WaitError),

    /// Substrate failure
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Entry point. Idempotent: a present clone makes this a no-op before any
/// waiting or styling happens.
pub async fn relocate_watch_info(
    page: &Page,
    options: &RelocateOptions,
) -> Result<RelocateOutcome, RelocateError> {
    if page.query_selector(&format!("#{CLONE_ID}"))?.is_some() {
        debug!("cloned watch info already present");
        return Ok(RelocateOutcome::AlreadyPresent);
    }

    let subscriber = wait_for_any(page, &SUBSCRIBER_SELECTORS, options.timeout).await?;
    let info = wait_for_element(page, INFO_SELECTOR, options.timeout).await?;

    let text = match extract_views_and_date(page, info) {
        Extraction::Ready(text) => text,
        Extraction::NotReady => {
            debug!("no usable watch-info text yet");
            return Ok(RelocateOutcome::NotReady);
        }
    };

    let clone = create_clone(page, &text)?;
    insert_clone(page, clone, subscriber.node)?;

    if options.relocate_buttons {
        relocate_controls(page).await?;
    }
    apply_row_styles(page)?;
    force_visible(page, &[clone]).await?;

    debug!(%clone, text = %text, "watch info cloned into top row");
    Ok(RelocateOutcome::Relocated { clone, info })
}

/// Remove the clone and undo every style the relocation applied. Safe to
/// call when nothing was relocated.
pub fn remove_cloned_info(page: &Page) -> Result<(), DomError> {
    if let Some(clone) = page.query_selector(&format!("#{CLONE_ID}"))? {
        page.remove(clone)?;
        debug!("removed cloned watch info");
    }

    let owner = page.query_selector("#top-row #owner")?;
    if let Some(owner) = owner {
        for property in ["display", "align-items", "gap"] {
            page.clear_style(owner, property)?;
        }
        if let Some(renderer) = page.query_selector_within(owner, "ytd-video-owner-renderer")? {
            for property in ["display", "align-items", "gap", "flex-wrap"] {
                page.clear_style(renderer, property)?;
            }
        }
        for selector in ["#sponsor-button", "#purchase-button", "#analytics-button"] {
            if let Some(button) = page.query_selector_within(owner, selector)? {
                page.clear_style(button, "margin-left")?;
            }
        }
    }
    if let Some(subscribe) = page.query_selector("#top-row #subscribe-button")? {
        page.clear_style(subscribe, "margin-left")?;
    }
    Ok(())
}

fn create_clone(page: &Page, text: &str) -> Result<NodeId, DomError> {
    let clone = page.create_element_with("div", &[("id", CLONE_ID)]);
    for (property, value) in [
        ("display", "inline-flex"),
        ("align-items", "flex-end"),
        ("margin-left", "12px"),
        ("font-size", "14px"),
        ("font-weight", "400"),
        ("line-height", "2rem"),
        ("color", "var(--yt-spec-text-secondary)"),
    ] {
        page.set_style(clone, property, value)?;
    }
    page.set_text_content(clone, text)?;
    page.set_attribute(clone, LAST_TEXT_ATTR, text)?;
    Ok(clone)
}

/// Insert at the end of the upload-info's parent so the readout sits at
/// the same level as the channel info; fall back to right after the
/// subscriber count.
fn insert_clone(page: &Page, clone: NodeId, subscriber: NodeId) -> Result<(), DomError> {
    let upload_info = page.closest(subscriber, "#upload-info")?;
    if let Some(upload_info) = upload_info {
        if let Some(parent) = page.parent(upload_info)? {
            page.append_child(parent, clone)?;
            debug!("inserted clone after upload-info");
            return Ok(());
        }
    }
    let parent = page
        .parent(subscriber)?
        .ok_or_else(|| DomError::InvalidOperation("subscriber count has no parent".into()))?;
    let siblings = page.children(parent)?;
    let after = siblings
        .iter()
        .position(|s| *s == subscriber)
        .and_then(|i| siblings.get(i + 1))
        .copied();
    page.insert_before(parent, clone, after)?;
    debug!("inserted clone after subscriber count (fallback)");
    Ok(())
}

/// Pull each action control into the owner container. Absence of any one
/// source element must not abort the others.
async fn relocate_controls(page: &Page) -> Result<(), RelocateError> {
    let Some(owner) = page.query_selector("#top-row #owner")? else {
        warn!("owner container missing, skipping control relocation");
        return Ok(());
    };
    let mut moved = Vec::new();
    for selector in RELOCATED_CONTROLS {
        match page.query_selector(selector)? {
            Some(control) => {
                page.append_child(owner, control)?;
                moved.push(control);
            }
            None => debug!(selector, "control not present, skipped"),
        }
    }
    force_visible(page, &moved).await?;
    Ok(())
}

/// Two-phase visibility fix for reparented elements.
///
/// Phase one runs synchronously: conflicting inline `display: none` is
/// cleared, visibility and opacity are pinned, and layout is flushed.
/// Phase two waits one frame, then re-reads computed style and overrides
/// anything the component framework reasserted in the meantime. A single
/// synchronous pass is not enough: the framework's own state tracking can
/// re-hide moved elements after this turn ends.
async fn force_visible(page: &Page, nodes: &[NodeId]) -> Result<(), DomError> {
    if nodes.is_empty() {
        return Ok(());
    }
    for node in nodes {
        if page.style(*node, "display").as_deref() == Some("none") {
            page.clear_style(*node, "display")?;
        }
        page.set_style(*node, "visibility", "visible")?;
        page.set_style(*node, "opacity", "1")?;
    }
    page.force_layout();

    page.next_frame().await;

    for node in nodes {
        if page.computed_style(*node, "display") == "none" {
            page.set_style(*node, "display", "inline-flex")?;
        }
        if page.computed_style(*node, "visibility") == "hidden" {
            page.set_style(*node, "visibility", "visible")?;
        }
    }
    Ok(())
}

/// Flex styling that keeps the remaining controls right-justified.
fn apply_row_styles(page: &Page) -> Result<(), DomError> {
    let owner = page.query_selector("#top-row #owner")?;
    if let Some(owner) = owner {
        page.set_style(owner, "display", "flex")?;
        page.set_style(owner, "align-items", "center")?;
        page.set_style(owner, "gap", "12px")?;
    }

    let renderer = owner
        .map(|o| page.query_selector_within(o, "ytd-video-owner-renderer"))
        .transpose()?
        .flatten();
    if let Some(renderer) = renderer {
        page.set_style(renderer, "display", "flex")?;
        page.set_style(renderer, "align-items", "center")?;
        page.set_style(renderer, "gap", "12px")?;
        page.set_style(renderer, "flex-wrap", "wrap")?;
    }

    // First visible action button in the owner row takes the auto margin;
    // with none present the subscribe control is pushed right instead.
    let mut action_button_found = false;
    if let Some(owner) = owner {
        for selector in RIGHT_JUSTIFY_CANDIDATES {
            if let Some(button) = page.query_selector_within(owner, selector)? {
                page.set_style(button, "margin-left", "auto")?;
                action_button_found = true;
                break;
            }
        }
    }

    if !action_button_found {
        if let Some(subscribe) = page.query_selector("#top-row #subscribe-button")? {
            page.set_style(subscribe, "margin-left", "auto")?;
        }
    }
    Ok(())
}
