//! Arena tree storage and structural operations
//!
//! All methods are synchronous and run under the page lock; mutation
//! records are assembled by the page wrapper from the return values here.

use std::collections::HashMap;

use tubedeck_core_types::NodeId;

use crate::errors::DomError;
use crate::node::{ElementData, Node, NodeKind};

pub(crate) struct Tree {
    nodes: HashMap<NodeId, Node>,
    body: NodeId,
    next_id: u64,
    next_attach: u64,
}

impl Tree {
    pub fn new() -> Self {
        let body_id = NodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(
            body_id,
            Node {
                id: body_id,
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Element(ElementData::new("body")),
                attached_at: 0,
            },
        );
        Self {
            nodes,
            body: body_id,
            next_id: 2,
            next_attach: 1,
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                parent: None,
                children: Vec::new(),
                kind,
                attached_at: 0,
            },
        );
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(&id).ok_or(DomError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(&id).ok_or(DomError::UnknownNode(id))
    }

    pub fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        self.node(id)?.element().ok_or(DomError::NotAnElement(id))
    }

    pub fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        self.node_mut(id)?
            .element_mut()
            .ok_or(DomError::NotAnElement(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, DomError> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>, DomError> {
        Ok(self.node(id)?.children.clone())
    }

    pub fn child_elements(&self, id: NodeId) -> Result<Vec<NodeId>, DomError> {
        Ok(self
            .node(id)?
            .children
            .iter()
            .copied()
            .filter(|c| self.nodes.get(c).map(|n| n.kind.is_element()).unwrap_or(false))
            .collect())
    }

    /// Whether `ancestor` is `node` itself or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Node is connected when the body is among its inclusive ancestors.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(node) && self.is_inclusive_ancestor(self.body, node)
    }

    /// Pre-order (document order) walk of the subtree under `root`.
    pub fn descendants(&self, root: NodeId, include_self: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        if include_self {
            stack.push(root);
        } else if let Some(node) = self.nodes.get(&root) {
            for child in node.children.iter().rev() {
                stack.push(*child);
            }
        }
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                for child in node.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }
        out
    }

    /// Document-order element descendants.
    pub fn descendant_elements(&self, root: NodeId, include_self: bool) -> Vec<NodeId> {
        self.descendants(root, include_self)
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .map(|n| n.kind.is_element())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Document-order text-node descendants.
    pub fn descendant_texts(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root, false)
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .map(|n| !n.kind.is_element())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Concatenated text of all descendant text nodes, document order.
    pub fn text_content(&self, root: NodeId) -> String {
        let mut out = String::new();
        for id in self.descendants(root, true) {
            if let Some(Node {
                kind: NodeKind::Text(data),
                ..
            }) = self.nodes.get(&id)
            {
                out.push_str(data);
            }
        }
        out
    }

    pub fn text_data(&self, id: NodeId) -> Result<&str, DomError> {
        match &self.node(id)?.kind {
            NodeKind::Text(data) => Ok(data),
            NodeKind::Element(_) => Err(DomError::NotAText(id)),
        }
    }

    pub fn set_text_data(&mut self, id: NodeId, data: &str) -> Result<(), DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(existing) => {
                *existing = data.to_string();
                Ok(())
            }
            NodeKind::Element(_) => Err(DomError::NotAText(id)),
        }
    }

    fn detach(&mut self, child: NodeId) -> Result<Option<NodeId>, DomError> {
        let old_parent = self.node(child)?.parent;
        if let Some(parent_id) = old_parent {
            let parent = self.node_mut(parent_id)?;
            parent.children.retain(|c| *c != child);
            self.node_mut(child)?.parent = None;
        }
        Ok(old_parent)
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent. Returns the previous parent, if any.
    pub fn append_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
    ) -> Result<Option<NodeId>, DomError> {
        self.node(parent)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::InvalidOperation(format!(
                "cannot insert {child} into its own subtree"
            )));
        }
        let old_parent = self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        self.mark_attached(parent, child)?;
        Ok(old_parent)
    }

    /// Insert `child` into `parent` just before `reference`; appends when
    /// `reference` is `None` or not a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<Option<NodeId>, DomError> {
        self.node(parent)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::InvalidOperation(format!(
                "cannot insert {child} into its own subtree"
            )));
        }
        let old_parent = self.detach(child)?;
        let parent_node = self.node_mut(parent)?;
        let index = reference
            .and_then(|r| parent_node.children.iter().position(|c| *c == r))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(index, child);
        self.mark_attached(parent, child)?;
        Ok(old_parent)
    }

    fn mark_attached(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let seq = self.next_attach;
        self.next_attach += 1;
        let node = self.node_mut(child)?;
        node.parent = Some(parent);
        node.attached_at = seq;
        Ok(())
    }

    /// Detach `node` from its parent. The subtree stays alive in the arena
    /// so handles remain valid, but it is no longer connected.
    pub fn remove(&mut self, node: NodeId) -> Result<Option<NodeId>, DomError> {
        if node == self.body {
            return Err(DomError::InvalidOperation("cannot remove body".into()));
        }
        self.detach(node)
    }
}
