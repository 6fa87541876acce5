//! Interactive element picker
//!
//! While a pick is in progress the page carries three helper nodes (a
//! dimming overlay, a hover highlight, and an instruction tooltip) and a
//! single capture-phase input handler. Pointer moves track the hovered
//! element, a click resolves the pick into a selector plus label, and
//! Escape cancels. Teardown is symmetric: every node and handler added
//! at start is removed on finish, whichever way the session ends.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use tubedeck_core_types::{NodeId, PickedElement};
use tubedeck_dom::{DomError, Handled, HandlerGuard, InputEvent, Page};
use tubedeck_selector_gen::synthesize;

/// Instruction line shown while picking.
const TOOLTIP_TEXT: &str = "Click on an element to select it, or press ESC to cancel";

/// Fallback label when the picked element has no usable text or naming
/// attribute.
const FALLBACK_LABEL: &str = "Custom Element";

/// Labels longer than this are cut off.
const MAX_LABEL_LEN: usize = 50;

#[derive(Debug, Error, Clone)]
pub enum PickError {
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// How a picking session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PickOutcome {
    Picked(PickedElement),
    Cancelled,
}

/// The helper nodes and handler registered for one session.
struct Session {
    overlay: NodeId,
    highlight: NodeId,
    tooltip: NodeId,
    // Held for its Drop side effect.
    _guard: HandlerGuard,
    outcome_tx: mpsc::UnboundedSender<PickOutcome>,
}

/// Element picker bound to one page. At most one session is active at a
/// time; starting while active is a no-op.
#[derive(Clone)]
pub struct Picker {
    page: Page,
    session: Arc<Mutex<Option<Session>>>,
}

impl Picker {
    pub fn new(page: &Page) -> Self {
        Self {
            page: page.clone(),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin a picking session. Outcomes arrive on `outcome_tx` when the
    /// user clicks or cancels. Returns `false` when a session is already
    /// running (the existing session keeps its channel).
    pub fn start(&self, outcome_tx: mpsc::UnboundedSender<PickOutcome>) -> Result<bool, PickError> {
        let mut slot = self.session.lock();
        if slot.is_some() {
            debug!("picker already active, ignoring start");
            return Ok(false);
        }

        let page = &self.page;
        let body = page.body();

        let overlay = page.create_element_with("div", &[("id", "tubedeck-picker-overlay")]);
        page.set_style(overlay, "position", "fixed")?;
        page.set_style(overlay, "background", "rgba(0, 0, 0, 0.1)")?;
        page.set_style(overlay, "cursor", "crosshair")?;
        page.set_style(overlay, "z-index", "999999")?;
        page.set_style(overlay, "pointer-events", "none")?;
        page.append_child(body, overlay)?;

        let highlight = page.create_element_with("div", &[("id", "tubedeck-picker-highlight")]);
        page.set_style(highlight, "position", "absolute")?;
        page.set_style(highlight, "border", "2px solid #3ea6ff")?;
        page.set_style(highlight, "z-index", "1000000")?;
        page.set_style(highlight, "pointer-events", "none")?;
        page.set_style(highlight, "display", "none")?;
        page.append_child(body, highlight)?;

        let tooltip = page.create_element_with("div", &[("id", "tubedeck-picker-tooltip")]);
        page.set_style(tooltip, "position", "fixed")?;
        page.set_style(tooltip, "z-index", "1000001")?;
        page.set_style(tooltip, "pointer-events", "none")?;
        page.append_child(body, tooltip)?;
        page.set_text_content(tooltip, TOOLTIP_TEXT)?;

        let picker = self.clone();
        let guard = page.add_input_handler(Arc::new(move |event: &InputEvent| {
            picker.on_event(event)
        }));

        debug!("picker session started");
        *slot = Some(Session {
            overlay,
            highlight,
            tooltip,
            _guard: guard,
            outcome_tx,
        });
        Ok(true)
    }

    /// Cancel the active session, reporting [`PickOutcome::Cancelled`].
    /// No-op when idle.
    pub fn cancel(&self) {
        self.finish(Some(PickOutcome::Cancelled));
    }

    /// Tear the session down without reporting an outcome. No-op when
    /// idle.
    pub fn stop(&self) {
        self.finish(None);
    }

    pub fn is_active(&self) -> bool {
        self.session.lock().is_some()
    }

    fn on_event(&self, event: &InputEvent) -> Handled {
        match event {
            InputEvent::PointerMove { x, y } => {
                self.track_hover(*x, *y);
                Handled::Consumed
            }
            InputEvent::Click { x, y } => {
                self.resolve_click(*x, *y);
                Handled::Consumed
            }
            InputEvent::Key { key, .. } if key == "Escape" => {
                self.cancel();
                Handled::Consumed
            }
            InputEvent::Key { .. } => Handled::Ignored,
        }
    }

    /// Move the highlight box over whatever real element is under the
    /// pointer.
    fn track_hover(&self, x: f64, y: f64) {
        let slot = self.session.lock();
        let Some(session) = slot.as_ref() else {
            return;
        };

        match self.hit_test(session, x, y) {
            Some(node) => {
                if let Some(rect) = self.page.rect(node) {
                    let _ = self.page.set_rect(session.highlight, rect);
                }
                let _ = self.page.set_style(session.highlight, "display", "block");
            }
            None => {
                let _ = self.page.set_style(session.highlight, "display", "none");
            }
        }
    }

    fn resolve_click(&self, x: f64, y: f64) {
        let picked = {
            let slot = self.session.lock();
            let Some(session) = slot.as_ref() else {
                return;
            };

            let Some(node) = self.hit_test(session, x, y) else {
                // Nothing under the pointer; keep picking.
                return;
            };

            let selector = match synthesize(&self.page, node) {
                Ok(selector) => selector,
                Err(err) => {
                    warn!(%node, error = %err, "selector synthesis failed, pick ignored");
                    return;
                }
            };
            let label = self.label_for(node);
            PickedElement { selector, label }
        };

        debug!(selector = %picked.selector, label = %picked.label, "element picked");
        self.finish(Some(PickOutcome::Picked(picked)));
    }

    /// Hit test that sees through the picker's own chrome.
    fn hit_test(&self, session: &Session, x: f64, y: f64) -> Option<NodeId> {
        let node = self.page.element_from_point(x, y)?;
        let chrome = [session.overlay, session.highlight, session.tooltip];
        if chrome.contains(&node) {
            return None;
        }
        Some(node)
    }

    /// Visible text wins, then the common naming attributes, then a
    /// generic placeholder.
    fn label_for(&self, node: NodeId) -> String {
        let text = self.page.text_content(node);
        let text = text.trim();
        if !text.is_empty() {
            return text.chars().take(MAX_LABEL_LEN).collect();
        }
        for attr in ["aria-label", "title"] {
            if let Some(value) = self.page.attribute(node, attr) {
                let value = value.trim();
                if !value.is_empty() {
                    return value.chars().take(MAX_LABEL_LEN).collect();
                }
            }
        }
        FALLBACK_LABEL.to_string()
    }

    fn finish(&self, outcome: Option<PickOutcome>) {
        let Some(session) = self.session.lock().take() else {
            return;
        };

        for node in [session.overlay, session.highlight, session.tooltip] {
            let _ = self.page.remove(node);
        }
        // Handler guard drops here, deregistering the capture handler.

        if let Some(outcome) = outcome {
            let _ = session.outcome_tx.send(outcome);
        }
        debug!("picker session finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubedeck_dom::Rect;

    fn page_with_button() -> (Page, NodeId) {
        let page = Page::new();
        let button = page.create_element_with("button", &[("id", "like-button")]);
        page.set_text_content(button, "Like this video").unwrap();
        page.set_rect(button, Rect::new(10.0, 10.0, 80.0, 30.0)).unwrap();
        page.append_child(page.body(), button).unwrap();
        (page, button)
    }

    #[tokio::test]
    async fn click_resolves_selector_and_label_then_tears_down() {
        let (page, _button) = page_with_button();
        let picker = Picker::new(&page);
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(picker.start(tx).unwrap());
        let handlers_before = page.input_handler_count();

        page.dispatch_click(20.0, 20.0);

        let outcome = rx.try_recv().unwrap();
        assert_eq!(
            outcome,
            PickOutcome::Picked(PickedElement {
                selector: "#like-button".into(),
                label: "Like this video".into(),
            })
        );

        assert!(!picker.is_active());
        assert_eq!(page.input_handler_count(), handlers_before - 1);
        assert!(page.query_selector("#tubedeck-picker-overlay").unwrap().is_none());
        assert!(page.query_selector("#tubedeck-picker-highlight").unwrap().is_none());
        assert!(page.query_selector("#tubedeck-picker-tooltip").unwrap().is_none());
    }

    #[tokio::test]
    async fn escape_cancels_with_symmetric_teardown() {
        let (page, _button) = page_with_button();
        let picker = Picker::new(&page);
        let (tx, mut rx) = mpsc::unbounded_channel();
        picker.start(tx).unwrap();

        page.dispatch_key("Escape");

        assert_eq!(rx.try_recv().unwrap(), PickOutcome::Cancelled);
        assert!(!picker.is_active());
        assert_eq!(page.input_handler_count(), 0);
        assert!(page.query_selector("#tubedeck-picker-overlay").unwrap().is_none());
    }

    #[tokio::test]
    async fn pointer_move_tracks_hovered_element() {
        let (page, button) = page_with_button();
        let picker = Picker::new(&page);
        let (tx, _rx) = mpsc::unbounded_channel();
        picker.start(tx).unwrap();

        page.dispatch_pointer_move(20.0, 20.0);

        let highlight = page
            .query_selector("#tubedeck-picker-highlight")
            .unwrap()
            .unwrap();
        assert_eq!(page.style(highlight, "display").as_deref(), Some("block"));
        assert_eq!(page.rect(highlight), page.rect(button));

        // Off every element: the highlight hides again.
        page.dispatch_pointer_move(500.0, 500.0);
        assert_eq!(page.style(highlight, "display").as_deref(), Some("none"));
    }

    #[tokio::test]
    async fn second_start_is_a_no_op() {
        let (page, _button) = page_with_button();
        let picker = Picker::new(&page);
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        assert!(picker.start(tx1).unwrap());
        assert!(!picker.start(tx2).unwrap());
        assert_eq!(page.input_handler_count(), 1);
        assert_eq!(
            page.query_selector_all("#tubedeck-picker-overlay").unwrap().len(),
            1
        );

        // The original session (and its channel) is still the live one.
        page.dispatch_key("Escape");
        assert_eq!(rx1.try_recv().unwrap(), PickOutcome::Cancelled);
    }

    #[tokio::test]
    async fn clicks_during_picking_do_not_reach_the_page() {
        let (page, button) = page_with_button();
        let picker = Picker::new(&page);
        let (tx, _rx) = mpsc::unbounded_channel();
        picker.start(tx).unwrap();

        page.dispatch_click(20.0, 20.0);
        assert_eq!(page.click_count(button), 0);
    }

    #[tokio::test]
    async fn label_falls_back_to_naming_attributes() {
        let page = Page::new();
        let icon = page.create_element_with("button", &[("aria-label", "Share")]);
        page.set_rect(icon, Rect::new(0.0, 0.0, 20.0, 20.0)).unwrap();
        page.append_child(page.body(), icon).unwrap();

        let picker = Picker::new(&page);
        let (tx, mut rx) = mpsc::unbounded_channel();
        picker.start(tx).unwrap();
        page.dispatch_click(5.0, 5.0);

        match rx.try_recv().unwrap() {
            PickOutcome::Picked(picked) => assert_eq!(picked.label, "Share"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
