//! Change watcher
//!
//! Once a cloned readout exists, one observer pair (the source container
//! and, when present, its wrapper) keeps the clone's text synchronized
//! with the live source. Both triggers funnel into the same re-extraction
//! routine; a genuine change is swapped in behind a short translate+fade
//! transition. The cached value on the clone is the diffing key, so
//! duplicate triggers from the two observers collapse into one update.

use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use tubedeck_core_types::{NodeId, LAST_TEXT_ATTR};
use tubedeck_dom::{DomError, MutationRecord, MutationStream, ObserveOptions, ObserverGuard, Page};
use tubedeck_extractor::{extract_views_and_date, Extraction, MIN_CONTENT_LEN};

/// Watcher error enumeration
#[derive(Debug, Error, Clone)]
pub enum WatchError {
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// Transition timing for the animated swap.
#[derive(Clone, Copy, Debug)]
pub struct SwapTiming {
    /// Deferred window before the text is exchanged.
    pub swap_delay: Duration,

    /// Time after the exchange until the transition style is cleared.
    pub settle_delay: Duration,
}

impl Default for SwapTiming {
    fn default() -> Self {
        Self {
            swap_delay: Duration::from_millis(150),
            settle_delay: Duration::from_millis(150),
        }
    }
}

/// A live observer pair feeding the clone. Dropping (or disconnecting)
/// tears down both observers and the pump task; re-attaching callers must
/// disconnect the previous instance first so at most one pair is active.
pub struct InfoWatcher {
    guards: Vec<ObserverGuard>,
    pump: JoinHandle<()>,
}

impl InfoWatcher {
    /// Attach observers to `source` (and `wrapper` when given) and keep
    /// `clone` synchronized until disconnected.
    pub fn attach(
        page: &Page,
        source: NodeId,
        wrapper: Option<NodeId>,
        clone: NodeId,
        timing: SwapTiming,
    ) -> Result<Self, WatchError> {
        let mut guards = Vec::with_capacity(2);

        let (source_guard, source_stream) = page.observe(source, ObserveOptions::content())?;
        guards.push(source_guard);

        let wrapper_stream = match wrapper {
            Some(wrapper) => {
                let (guard, stream) = page.observe(wrapper, ObserveOptions::content())?;
                guards.push(guard);
                Some(stream)
            }
            None => None,
        };

        debug!(%source, wrapper = ?wrapper, "watching for watch-info changes");

        let pump = tokio::spawn(pump_changes(
            page.clone(),
            source,
            clone,
            timing,
            source_stream,
            wrapper_stream,
        ));

        Ok(Self { guards, pump })
    }

    /// Tear down both observers and stop reacting to changes.
    pub fn disconnect(&self) {
        for guard in &self.guards {
            guard.disconnect();
        }
        self.pump.abort();
    }
}

impl Drop for InfoWatcher {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn pump_changes(
    page: Page,
    source: NodeId,
    clone: NodeId,
    timing: SwapTiming,
    mut source_stream: MutationStream,
    mut wrapper_stream: Option<MutationStream>,
) {
    loop {
        tokio::select! {
            batch = source_stream.next_batch() => {
                match batch {
                    Some(_) => refresh(&page, source, clone, timing),
                    None => break,
                }
            }
            batch = next_or_pending(&mut wrapper_stream) => {
                match batch {
                    Some(_) => refresh(&page, source, clone, timing),
                    None => wrapper_stream = None,
                }
            }
        }
    }
}

async fn next_or_pending(stream: &mut Option<MutationStream>) -> Option<Vec<MutationRecord>> {
    match stream {
        Some(stream) => stream.next_batch().await,
        None => std::future::pending().await,
    }
}

/// The shared re-extraction routine both observers trigger.
fn refresh(page: &Page, source: NodeId, clone: NodeId, timing: SwapTiming) {
    let last = page.attribute(clone, LAST_TEXT_ATTR).unwrap_or_default();
    let next = match extract_views_and_date(page, source) {
        Extraction::Ready(text) => text,
        // Not rendered yet; try again on the next trigger.
        Extraction::NotReady => return,
    };

    trace!(last = %last, next = %next, "checking for watch-info change");

    if next == last || next.len() <= MIN_CONTENT_LEN {
        return;
    }

    debug!("watch info changed, animating swap");
    animate_swap(page.clone(), clone, next.clone(), timing);
    // Cache once the swap is scheduled, so piled-up triggers for the same
    // value do not re-animate.
    let _ = page.set_attribute(clone, LAST_TEXT_ATTR, &next);
}

/// Translate+fade out, exchange the text after the deferred window, ease
/// back in, then drop the transition override.
fn animate_swap(page: Page, clone: NodeId, text: String, timing: SwapTiming) {
    let _ = page.set_style(
        clone,
        "transition",
        "transform 0.3s ease-out, opacity 0.3s ease-out",
    );
    let _ = page.set_style(clone, "transform", "translateY(-5px)");
    let _ = page.set_style(clone, "opacity", "0.5");

    tokio::spawn(async move {
        tokio::time::sleep(timing.swap_delay).await;
        let _ = page.set_text_content(clone, &text);
        let _ = page.set_style(clone, "transform", "translateY(0)");
        let _ = page.set_style(clone, "opacity", "1");

        tokio::time::sleep(timing.settle_delay).await;
        let _ = page.clear_style(clone, "transition");
    });
}
