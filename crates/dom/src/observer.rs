//! Mutation observation
//!
//! Observers register interest in a target subtree; every mutating page
//! operation produces one batch of records, delivered through an unbounded
//! channel after the synchronous mutation completes, in registration order.

use tokio::sync::mpsc;
use tubedeck_core_types::NodeId;

/// What an observer wants to hear about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Child additions/removals on the target (or, with `subtree`, any
    /// descendant).
    pub child_list: bool,

    /// Extend interest to the whole subtree under the target.
    pub subtree: bool,

    /// Text-node data changes.
    pub character_data: bool,
}

impl ObserveOptions {
    pub fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
            character_data: false,
        }
    }

    pub fn content() -> Self {
        Self {
            child_list: true,
            subtree: true,
            character_data: true,
        }
    }
}

#[derive(Clone, Debug)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    CharacterData,
}

#[derive(Clone, Debug)]
pub struct MutationRecord {
    /// For child-list records the parent whose children changed; for
    /// character-data records the text node itself.
    pub target: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    pub fn added_nodes(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { added, .. } => added,
            MutationKind::CharacterData => &[],
        }
    }
}

pub(crate) struct ObserverEntry {
    pub target: NodeId,
    pub options: ObserveOptions,
    pub sender: mpsc::UnboundedSender<Vec<MutationRecord>>,
}

/// Receiving end of an observer subscription.
pub struct MutationStream {
    pub(crate) receiver: mpsc::UnboundedReceiver<Vec<MutationRecord>>,
}

impl MutationStream {
    /// Await the next batch; `None` once the page is gone.
    pub async fn next_batch(&mut self) -> Option<Vec<MutationRecord>> {
        self.receiver.recv().await
    }

    /// Non-blocking drain, for synchronous pumps in tests.
    pub fn try_next_batch(&mut self) -> Option<Vec<MutationRecord>> {
        self.receiver.try_recv().ok()
    }
}
