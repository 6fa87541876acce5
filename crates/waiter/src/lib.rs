//! Element waiter
//!
//! Produces the first element matching one of the candidate selectors,
//! present now or appearing later. The current document is checked
//! synchronously before any observation infrastructure is created; the
//! slow path registers exactly one child-list observer on the body and
//! races it against a deadline. Both exit branches tear the other down,
//! so no watcher outlives the call.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use tubedeck_core_types::NodeId;
use tubedeck_dom::{DomError, ObserveOptions, Page};

/// Hard upper bound when the caller does not choose one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Waiter error enumeration
#[derive(Debug, Error, Clone)]
pub enum WaitError {
    /// No candidate matched before the deadline
    #[error("timeout waiting for element: {selectors}")]
    Timeout { selectors: String },

    /// A candidate selector failed to parse
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// A resolved wait: the element plus the candidate selector it satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitedElement {
    pub node: NodeId,
    /// Index into the caller's selector list.
    pub selector_index: usize,
}

/// Wait for a single selector.
pub async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<NodeId, WaitError> {
    wait_for_any(page, &[selector], timeout)
        .await
        .map(|found| found.node)
}

/// Wait for the first element matching any candidate selector.
///
/// Ties among nodes added in the same batch are broken by selector-list
/// order, not document order.
pub async fn wait_for_any(
    page: &Page,
    selectors: &[&str],
    timeout: Duration,
) -> Result<WaitedElement, WaitError> {
    // Fast path: match against the current document, in list order,
    // without creating an observer.
    for (index, selector) in selectors.iter().enumerate() {
        if let Some(node) = page.query_selector(selector)? {
            trace!(selector, "element already present");
            return Ok(WaitedElement {
                node,
                selector_index: index,
            });
        }
    }

    debug!(selectors = %selectors.join(", "), "waiting for element");

    let (guard, mut stream) = page.observe(page.body(), ObserveOptions::child_list_subtree())?;

    let found = tokio::time::timeout(timeout, async {
        while let Some(batch) = stream.next_batch().await {
            for record in &batch {
                for added in record.added_nodes() {
                    if !page.is_element(*added) {
                        continue;
                    }
                    for (index, selector) in selectors.iter().enumerate() {
                        if page.matches(*added, selector)? {
                            return Ok(Some(WaitedElement {
                                node: *added,
                                selector_index: index,
                            }));
                        }
                        if let Some(node) = page.query_selector_within(*added, selector)? {
                            return Ok(Some(WaitedElement {
                                node,
                                selector_index: index,
                            }));
                        }
                    }
                }
            }
        }
        // Page dropped out from under us; report as a timeout-shaped miss.
        Ok::<Option<WaitedElement>, WaitError>(None)
    })
    .await;

    // Either branch: a single teardown point for the observer.
    guard.disconnect();

    match found {
        Ok(Ok(Some(found))) => {
            debug!(index = found.selector_index, "element appeared");
            Ok(found)
        }
        Ok(Ok(None)) | Err(_) => {
            debug!(selectors = %selectors.join(", "), "timed out");
            Err(WaitError::Timeout {
                selectors: selectors.join(", "),
            })
        }
        Ok(Err(err)) => Err(err),
    }
}
