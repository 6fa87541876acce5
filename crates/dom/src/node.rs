//! Node storage for the live tree

use std::collections::BTreeMap;

use tubedeck_core_types::NodeId;

use crate::style::StyleMap;

/// Layout rectangle in viewport coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// Element payload: tag, attributes and the two style layers.
#[derive(Clone, Debug)]
pub struct ElementData {
    /// Lower-cased tag name.
    pub tag: String,

    /// Attributes, including `id` and `class`.
    pub attributes: BTreeMap<String, String>,

    /// Author-set inline styles (highest precedence).
    pub inline_style: StyleMap,

    /// Styles the host page's component framework asserts; it may rewrite
    /// these asynchronously after the element is moved.
    pub framework_style: StyleMap,

    /// Layout rect, if the element has been laid out.
    pub rect: Option<Rect>,

    /// Number of clicks delivered to this element.
    pub click_count: u64,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            inline_style: StyleMap::new(),
            framework_style: StyleMap::new(),
            rect: None,
            click_count: 0,
        }
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| *c == class)
    }
}

/// Node payload variants.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

impl NodeKind {
    pub fn is_element(&self) -> bool {
        matches!(self, NodeKind::Element(_))
    }
}

/// A node in the arena. Parent/children links use ids so the tree can be
/// mutated under a single lock without reference cycles.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,

    /// Sequence number of the node's latest attachment. Later-attached
    /// elements paint on top, so hit-test ties resolve by this.
    pub attached_at: u64,
}

impl Node {
    pub fn element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    pub fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }
}
