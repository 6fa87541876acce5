//! Hotkey dispatch
//!
//! A capture-phase key handler maps single-character keys to clicks on
//! page controls. Built-in actions resolve through fixed selector lists;
//! anything else is looked up in the user's custom shortcuts. Keys typed
//! into text-entry fields never trigger, and a key with no binding or no
//! matching control propagates untouched.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use tubedeck_core_types::{CustomShortcuts, HotkeyMap, NodeId};
use tubedeck_dom::{Handled, HandlerGuard, InputEvent, Page};

/// Selector list for the built-in "like" action, tried as one
/// comma-separated group.
pub const LIKE_SELECTOR: &str = "button[aria-label*=\"like\"], button[title*=\"like\"], \
     #top-level-buttons-computed ytd-toggle-button-renderer:first-child button";

/// Selector list for the built-in "dislike" action.
pub const DISLIKE_SELECTOR: &str = "button[aria-label*=\"Dislike\"], button[title*=\"dislike\"], \
     #top-level-buttons-computed ytd-toggle-button-renderer:nth-child(2) button";

/// Live hotkey bindings, hot-swappable while the handler stays installed.
#[derive(Default)]
struct Bindings {
    map: HotkeyMap,
    custom: CustomShortcuts,
}

/// Keyboard dispatcher bound to one page.
#[derive(Clone)]
pub struct Hotkeys {
    page: Page,
    bindings: Arc<RwLock<Bindings>>,
}

impl Hotkeys {
    pub fn new(page: &Page, map: HotkeyMap, custom: CustomShortcuts) -> Self {
        Self {
            page: page.clone(),
            bindings: Arc::new(RwLock::new(Bindings { map, custom })),
        }
    }

    /// Register the capture-phase key handler. Dropping the returned
    /// guard deregisters it.
    pub fn install(&self) -> HandlerGuard {
        let this = self.clone();
        self.page
            .add_input_handler(Arc::new(move |event: &InputEvent| match event {
                InputEvent::Key { key, target } => this.handle_key(key, *target),
                _ => Handled::Ignored,
            }))
    }

    /// Replace the key-to-action table without reinstalling the handler.
    pub fn set_map(&self, map: HotkeyMap) {
        self.bindings.write().map = map;
    }

    /// Replace the custom-shortcut table without reinstalling the handler.
    pub fn set_custom_shortcuts(&self, custom: CustomShortcuts) {
        self.bindings.write().custom = custom;
    }

    /// Resolve one key press. `target` is the focused node, if any.
    pub fn handle_key(&self, key: &str, target: Option<NodeId>) -> Handled {
        if target.map_or(false, |node| self.is_text_entry(node)) {
            return Handled::Ignored;
        }

        let mut chars = key.chars();
        let (Some(ch), None) = (chars.next(), chars.next()) else {
            // Named keys ("Escape", "Enter", ...) are not hotkeys.
            return Handled::Ignored;
        };

        let selector = {
            let bindings = self.bindings.read();
            let Some(action) = bindings.map.action_for(ch) else {
                return Handled::Ignored;
            };
            debug!(key = %ch, action = %action, "hotkey matched");
            match self.selector_for(&bindings, action) {
                Some(selector) => selector,
                None => return Handled::Ignored,
            }
        };

        match self.page.query_selector(&selector) {
            Ok(Some(control)) => {
                if let Err(err) = self.page.click(control) {
                    warn!(%control, error = %err, "hotkey click failed");
                    return Handled::Ignored;
                }
                debug!(%control, "hotkey clicked control");
                Handled::Consumed
            }
            Ok(None) => {
                debug!(selector = %selector, "hotkey control not on page");
                Handled::Ignored
            }
            Err(err) => {
                warn!(selector = %selector, error = %err, "stored hotkey selector is invalid");
                Handled::Ignored
            }
        }
    }

    fn selector_for(&self, bindings: &Bindings, action: &str) -> Option<String> {
        match action {
            "like" => Some(LIKE_SELECTOR.to_string()),
            "dislike" => Some(DISLIKE_SELECTOR.to_string()),
            custom => bindings
                .custom
                .get(custom)
                .map(|shortcut| shortcut.selector.clone()),
        }
    }

    /// Text-entry focus suppresses hotkeys entirely.
    fn is_text_entry(&self, node: NodeId) -> bool {
        match self.page.tag(node).ok().as_deref() {
            Some("input") | Some("textarea") => true,
            _ => self
                .page
                .attribute(node, "contenteditable")
                .map_or(false, |v| v != "false"),
        }
    }
}
