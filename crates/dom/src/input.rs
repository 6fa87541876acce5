//! Synchronous capture-phase input dispatch
//!
//! Handlers run in registration order within the dispatching turn; the
//! first handler that consumes an event stops propagation and suppresses
//! the default action (for clicks, the click landing on the hit element).

use tubedeck_core_types::NodeId;

/// Events the page can dispatch.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PointerMove {
        x: f64,
        y: f64,
    },
    Click {
        x: f64,
        y: f64,
    },
    Key {
        /// Key value, e.g. "a", ",", "Escape".
        key: String,
        /// Focused element at dispatch time.
        target: Option<NodeId>,
    },
}

/// Outcome of running one handler (or a full dispatch).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handled {
    /// Default suppressed, propagation stopped.
    Consumed,
    /// Event proceeds normally.
    Ignored,
}

impl Handled {
    pub fn is_consumed(&self) -> bool {
        matches!(self, Handled::Consumed)
    }
}

/// A capture-phase listener. Handlers receive every event kind and filter
/// themselves; they must not block.
pub trait InputHandler: Send + Sync {
    fn on_event(&self, event: &InputEvent) -> Handled;
}

impl<F> InputHandler for F
where
    F: Fn(&InputEvent) -> Handled + Send + Sync,
{
    fn on_event(&self, event: &InputEvent) -> Handled {
        self(event)
    }
}
