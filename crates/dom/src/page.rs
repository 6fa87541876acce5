//! The live page handle
//!
//! `Page` is a cheap-to-clone handle over the arena tree, observer
//! registry, input handler list and navigation state. All work is
//! synchronous and runs under short-lived locks; observer delivery goes
//! through unbounded channels so a mutating call never blocks on a slow
//! consumer.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::trace;
use tubedeck_core_types::NodeId;

use crate::errors::DomError;
use crate::input::{Handled, InputEvent, InputHandler};
use crate::node::Rect;
use crate::observer::{
    MutationKind, MutationRecord, MutationStream, ObserveOptions, ObserverEntry,
};
use crate::selector;
use crate::style;
use crate::tree::Tree;

struct PageInner {
    tree: Mutex<Tree>,
    observers: Mutex<BTreeMap<u64, ObserverEntry>>,
    next_observer_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Arc<dyn InputHandler>)>>,
    next_handler_id: AtomicU64,
    focus: Mutex<Option<NodeId>>,
    url: Mutex<String>,
    nav_tx: broadcast::Sender<String>,
    layout_flushes: AtomicU64,
}

/// Handle to the live page.
#[derive(Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        let (nav_tx, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(PageInner {
                tree: Mutex::new(Tree::new()),
                observers: Mutex::new(BTreeMap::new()),
                next_observer_id: AtomicU64::new(1),
                handlers: Mutex::new(Vec::new()),
                next_handler_id: AtomicU64::new(1),
                focus: Mutex::new(None),
                url: Mutex::new(String::new()),
                nav_tx,
                layout_flushes: AtomicU64::new(0),
            }),
        }
    }

    // -- structure ---------------------------------------------------------

    pub fn body(&self) -> NodeId {
        self.inner.tree.lock().body()
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.tree.lock().create_element(tag)
    }

    pub fn create_element_with(&self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut tree = self.inner.tree.lock();
        let id = tree.create_element(tag);
        if let Ok(data) = tree.element_mut(id) {
            for (name, value) in attrs {
                data.attributes.insert((*name).into(), (*value).into());
            }
        }
        id
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.tree.lock().create_text(text)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let old_parent = self.inner.tree.lock().append_child(parent, child)?;
        self.emit(Self::reparent_records(old_parent, parent, child));
        Ok(())
    }

    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let old_parent = self
            .inner
            .tree
            .lock()
            .insert_before(parent, child, reference)?;
        self.emit(Self::reparent_records(old_parent, parent, child));
        Ok(())
    }

    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        let old_parent = self.inner.tree.lock().remove(node)?;
        if let Some(parent) = old_parent {
            self.emit(vec![MutationRecord {
                target: parent,
                kind: MutationKind::ChildList {
                    added: Vec::new(),
                    removed: vec![node],
                },
            }]);
        }
        Ok(())
    }

    fn reparent_records(
        old_parent: Option<NodeId>,
        new_parent: NodeId,
        child: NodeId,
    ) -> Vec<MutationRecord> {
        let mut records = Vec::with_capacity(2);
        if let Some(old) = old_parent {
            records.push(MutationRecord {
                target: old,
                kind: MutationKind::ChildList {
                    added: Vec::new(),
                    removed: vec![child],
                },
            });
        }
        records.push(MutationRecord {
            target: new_parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
            },
        });
        records
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, DomError> {
        self.inner.tree.lock().parent(node)
    }

    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>, DomError> {
        self.inner.tree.lock().children(node)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.inner.tree.lock().is_connected(node)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.inner
            .tree
            .lock()
            .node(node)
            .map(|n| n.kind.is_element())
            .unwrap_or(false)
    }

    pub fn tag(&self, node: NodeId) -> Result<String, DomError> {
        Ok(self.inner.tree.lock().element(node)?.tag.clone())
    }

    // -- attributes --------------------------------------------------------

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .tree
            .lock()
            .element(node)
            .ok()
            .and_then(|e| e.attributes.get(name).cloned())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.inner
            .tree
            .lock()
            .element(node)
            .map(|e| e.attributes.contains_key(name))
            .unwrap_or(false)
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.inner
            .tree
            .lock()
            .element_mut(node)?
            .attributes
            .insert(name.into(), value.into());
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DomError> {
        self.inner.tree.lock().element_mut(node)?.attributes.remove(name);
        Ok(())
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.inner
            .tree
            .lock()
            .element(node)
            .map(|e| e.classes().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    // -- text --------------------------------------------------------------

    pub fn text_content(&self, node: NodeId) -> String {
        self.inner.tree.lock().text_content(node)
    }

    pub fn text_data(&self, node: NodeId) -> Result<String, DomError> {
        Ok(self.inner.tree.lock().text_data(node)?.to_string())
    }

    /// Change a text node's data in place. Emits a character-data record.
    pub fn set_text(&self, node: NodeId, data: &str) -> Result<(), DomError> {
        self.inner.tree.lock().set_text_data(node, data)?;
        self.emit(vec![MutationRecord {
            target: node,
            kind: MutationKind::CharacterData,
        }]);
        Ok(())
    }

    /// Replace an element's children with a single text node.
    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        let (removed, added) = {
            let mut tree = self.inner.tree.lock();
            tree.element(node)?;
            let removed = tree.children(node)?;
            for child in &removed {
                tree.remove(*child)?;
            }
            let text_node = tree.create_text(text);
            tree.append_child(node, text_node)?;
            (removed, vec![text_node])
        };
        self.emit(vec![MutationRecord {
            target: node,
            kind: MutationKind::ChildList { added, removed },
        }]);
        Ok(())
    }

    /// Document-order text-node descendants of `node`.
    pub fn descendant_text_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.tree.lock().descendant_texts(node)
    }

    // -- selectors ---------------------------------------------------------

    pub fn matches(&self, node: NodeId, selector_str: &str) -> Result<bool, DomError> {
        let list = selector::parse(selector_str)?;
        Ok(selector::matches(&self.inner.tree.lock(), node, &list))
    }

    /// First match in the whole document, document order.
    pub fn query_selector(&self, selector_str: &str) -> Result<Option<NodeId>, DomError> {
        let list = selector::parse(selector_str)?;
        let tree = self.inner.tree.lock();
        Ok(selector::query_first(&tree, tree.body(), &list))
    }

    pub fn query_selector_all(&self, selector_str: &str) -> Result<Vec<NodeId>, DomError> {
        let list = selector::parse(selector_str)?;
        let tree = self.inner.tree.lock();
        Ok(selector::query_all(&tree, tree.body(), &list))
    }

    /// First match among `scope`'s descendants (excluding `scope`).
    pub fn query_selector_within(
        &self,
        scope: NodeId,
        selector_str: &str,
    ) -> Result<Option<NodeId>, DomError> {
        let list = selector::parse(selector_str)?;
        Ok(selector::query_first(&self.inner.tree.lock(), scope, &list))
    }

    /// Nearest inclusive ancestor matching the selector.
    pub fn closest(&self, node: NodeId, selector_str: &str) -> Result<Option<NodeId>, DomError> {
        let list = selector::parse(selector_str)?;
        let tree = self.inner.tree.lock();
        let mut current = Some(node);
        while let Some(id) = current {
            if tree.node(id)?.kind.is_element() && selector::matches(&tree, id, &list) {
                return Ok(Some(id));
            }
            current = tree.parent(id)?;
        }
        Ok(None)
    }

    // -- styles ------------------------------------------------------------

    pub fn set_style(&self, node: NodeId, property: &str, value: &str) -> Result<(), DomError> {
        self.inner
            .tree
            .lock()
            .element_mut(node)?
            .inline_style
            .set(property, value);
        Ok(())
    }

    /// Remove an inline property (the `el.style.x = ""` reset).
    pub fn clear_style(&self, node: NodeId, property: &str) -> Result<(), DomError> {
        self.inner
            .tree
            .lock()
            .element_mut(node)?
            .inline_style
            .remove(property);
        Ok(())
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.inner
            .tree
            .lock()
            .element(node)
            .ok()
            .and_then(|e| e.inline_style.get(property).map(str::to_string))
    }

    /// Host-framework side: assert a style the component framework controls.
    /// May happen at any time, including after the element is reparented.
    pub fn set_framework_style(
        &self,
        node: NodeId,
        property: &str,
        value: &str,
    ) -> Result<(), DomError> {
        self.inner
            .tree
            .lock()
            .element_mut(node)?
            .framework_style
            .set(property, value);
        Ok(())
    }

    /// Resolved style: inline over framework-asserted over defaults.
    pub fn computed_style(&self, node: NodeId, property: &str) -> String {
        self.inner
            .tree
            .lock()
            .element(node)
            .map(|e| style::resolve(&e.inline_style, &e.framework_style, property).to_string())
            .unwrap_or_default()
    }

    // -- geometry & clicks -------------------------------------------------

    pub fn set_rect(&self, node: NodeId, rect: Rect) -> Result<(), DomError> {
        self.inner.tree.lock().element_mut(node)?.rect = Some(rect);
        Ok(())
    }

    pub fn rect(&self, node: NodeId) -> Option<Rect> {
        self.inner.tree.lock().element(node).ok().and_then(|e| e.rect)
    }

    /// Topmost connected, laid-out element under the point. Elements with
    /// `pointer-events: none` or `display: none` never hit; ties at equal
    /// z-index go to the most recently attached element.
    pub fn element_from_point(&self, x: f64, y: f64) -> Option<NodeId> {
        let tree = self.inner.tree.lock();
        let mut best: Option<(i64, u64, NodeId)> = None;
        for id in tree.descendant_elements(tree.body(), true) {
            let Ok(node) = tree.node(id) else {
                continue;
            };
            let Some(element) = node.element() else {
                continue;
            };
            let Some(rect) = element.rect else {
                continue;
            };
            if !rect.contains(x, y) {
                continue;
            }
            if style::resolve(&element.inline_style, &element.framework_style, "pointer-events")
                == "none"
            {
                continue;
            }
            if style::resolve(&element.inline_style, &element.framework_style, "display") == "none" {
                continue;
            }
            let z: i64 = style::resolve(&element.inline_style, &element.framework_style, "z-index")
                .parse()
                .unwrap_or(0);
            let key = (z, node.attached_at, id);
            if best.map(|b| key > b).unwrap_or(true) {
                best = Some(key);
            }
        }
        best.map(|(_, _, id)| id)
    }

    /// Deliver one programmatic click to the element, as `element.click()`
    /// would.
    pub fn click(&self, node: NodeId) -> Result<(), DomError> {
        let mut tree = self.inner.tree.lock();
        let element = tree.element_mut(node)?;
        element.click_count += 1;
        trace!(%node, count = element.click_count, "click delivered");
        Ok(())
    }

    pub fn click_count(&self, node: NodeId) -> u64 {
        self.inner
            .tree
            .lock()
            .element(node)
            .map(|e| e.click_count)
            .unwrap_or(0)
    }

    // -- input dispatch ----------------------------------------------------

    pub fn add_input_handler(&self, handler: Arc<dyn InputHandler>) -> HandlerGuard {
        let id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.inner.handlers.lock().push((id, handler));
        HandlerGuard {
            inner: self.inner.clone(),
            id,
            removed: AtomicBool::new(false),
        }
    }

    pub fn input_handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }

    fn run_handlers(&self, event: &InputEvent) -> Handled {
        // Snapshot so handlers can add/remove listeners mid-dispatch.
        let handlers: Vec<Arc<dyn InputHandler>> = self
            .inner
            .handlers
            .lock()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            if handler.on_event(event).is_consumed() {
                return Handled::Consumed;
            }
        }
        Handled::Ignored
    }

    pub fn dispatch_pointer_move(&self, x: f64, y: f64) -> Handled {
        self.run_handlers(&InputEvent::PointerMove { x, y })
    }

    /// Dispatch a user click at a point. When no capture handler consumes
    /// it, the default action lands one click on the hit element.
    pub fn dispatch_click(&self, x: f64, y: f64) -> Handled {
        let outcome = self.run_handlers(&InputEvent::Click { x, y });
        if outcome.is_consumed() {
            return outcome;
        }
        if let Some(target) = self.element_from_point(x, y) {
            let _ = self.click(target);
        }
        Handled::Ignored
    }

    pub fn dispatch_key(&self, key: &str) -> Handled {
        let target = *self.inner.focus.lock();
        self.run_handlers(&InputEvent::Key {
            key: key.to_string(),
            target,
        })
    }

    pub fn set_focus(&self, node: Option<NodeId>) {
        *self.inner.focus.lock() = node;
    }

    pub fn focused(&self) -> Option<NodeId> {
        *self.inner.focus.lock()
    }

    // -- observers ---------------------------------------------------------

    pub fn observe(
        &self,
        target: NodeId,
        options: ObserveOptions,
    ) -> Result<(ObserverGuard, MutationStream), DomError> {
        self.inner.tree.lock().node(target)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.lock().insert(
            id,
            ObserverEntry {
                target,
                options,
                sender,
            },
        );
        Ok((
            ObserverGuard {
                inner: self.inner.clone(),
                id,
                disconnected: AtomicBool::new(false),
            },
            MutationStream { receiver },
        ))
    }

    /// Number of live observers; success and failure paths alike must
    /// leave this at what it was before they started watching.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    fn emit(&self, records: Vec<MutationRecord>) {
        if records.is_empty() {
            return;
        }
        let tree = self.inner.tree.lock();
        let observers = self.inner.observers.lock();
        for entry in observers.values() {
            let relevant: Vec<MutationRecord> = records
                .iter()
                .filter(|record| {
                    let in_scope = if entry.options.subtree {
                        tree.is_inclusive_ancestor(entry.target, record.target)
                    } else {
                        record.target == entry.target
                    };
                    if !in_scope {
                        return false;
                    }
                    match record.kind {
                        MutationKind::ChildList { .. } => entry.options.child_list,
                        MutationKind::CharacterData => entry.options.character_data,
                    }
                })
                .cloned()
                .collect();
            if !relevant.is_empty() {
                // Receiver gone means the stream was dropped without
                // disconnecting; the guard will clean the entry up.
                let _ = entry.sender.send(relevant);
            }
        }
    }

    // -- frames, layout, navigation ----------------------------------------

    /// Force a synchronous layout flush.
    pub fn force_layout(&self) {
        self.inner.layout_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn layout_flushes(&self) -> u64 {
        self.inner.layout_flushes.load(Ordering::Relaxed)
    }

    /// Wait for the next rendering opportunity. Work the host framework
    /// scheduled before this call has run by the time it returns.
    pub async fn next_frame(&self) {
        tokio::time::sleep(Duration::from_millis(16)).await;
    }

    pub fn url(&self) -> String {
        self.inner.url.lock().clone()
    }

    /// Update the page URL, notifying navigation subscribers.
    pub fn set_url(&self, url: &str) {
        {
            let mut current = self.inner.url.lock();
            if *current == url {
                return;
            }
            *current = url.to_string();
        }
        let _ = self.inner.nav_tx.send(url.to_string());
    }

    pub fn subscribe_navigation(&self) -> broadcast::Receiver<String> {
        self.inner.nav_tx.subscribe()
    }
}

/// Disconnects its observer when dropped; either side (guard drop or
/// explicit call) tears the registration down exactly once.
pub struct ObserverGuard {
    inner: Arc<PageInner>,
    id: u64,
    disconnected: AtomicBool,
}

impl ObserverGuard {
    pub fn disconnect(&self) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            self.inner.observers.lock().remove(&self.id);
        }
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Removes its input handler when dropped.
pub struct HandlerGuard {
    inner: Arc<PageInner>,
    id: u64,
    removed: AtomicBool,
}

impl HandlerGuard {
    pub fn remove(&self) {
        if !self.removed.swap(true, Ordering::SeqCst) {
            self.inner.handlers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_and_mutate() {
        let page = Page::new();
        let row = page.create_element_with("div", &[("id", "top-row")]);
        page.append_child(page.body(), row).unwrap();
        assert_eq!(page.query_selector("#top-row").unwrap(), Some(row));

        page.remove(row).unwrap();
        assert!(!page.is_connected(row));
        assert_eq!(page.query_selector("#top-row").unwrap(), None);
    }

    #[tokio::test]
    async fn child_list_observer_sees_subtree_additions() {
        let page = Page::new();
        let (guard, mut stream) = page
            .observe(page.body(), ObserveOptions::child_list_subtree())
            .unwrap();

        let wrapper = page.create_element("div");
        page.append_child(page.body(), wrapper).unwrap();
        let inner = page.create_element_with("span", &[("id", "late")]);
        page.append_child(wrapper, inner).unwrap();

        let first = stream.next_batch().await.unwrap();
        assert_eq!(first[0].added_nodes(), &[wrapper]);
        let second = stream.next_batch().await.unwrap();
        assert_eq!(second[0].added_nodes(), &[inner]);

        guard.disconnect();
        assert_eq!(page.observer_count(), 0);
    }

    #[tokio::test]
    async fn character_data_needs_opt_in() {
        let page = Page::new();
        let el = page.create_element("span");
        page.append_child(page.body(), el).unwrap();
        page.set_text_content(el, "before").unwrap();
        let text = page.descendant_text_nodes(el)[0];

        let (_g1, mut child_only) = page
            .observe(el, ObserveOptions::child_list_subtree())
            .unwrap();
        let (_g2, mut full) = page.observe(el, ObserveOptions::content()).unwrap();

        page.set_text(text, "after").unwrap();
        assert!(child_only.try_next_batch().is_none());
        let batch = full.try_next_batch().unwrap();
        assert!(matches!(batch[0].kind, MutationKind::CharacterData));
    }

    #[test]
    fn guard_drop_disconnects() {
        let page = Page::new();
        {
            let _pair = page
                .observe(page.body(), ObserveOptions::child_list_subtree())
                .unwrap();
            assert_eq!(page.observer_count(), 1);
        }
        assert_eq!(page.observer_count(), 0);
    }

    #[test]
    fn hit_testing_skips_pointer_events_none() {
        let page = Page::new();
        let below = page.create_element("div");
        page.append_child(page.body(), below).unwrap();
        page.set_rect(below, Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();

        let overlay = page.create_element("div");
        page.append_child(page.body(), overlay).unwrap();
        page.set_rect(overlay, Rect::new(0.0, 0.0, 100.0, 100.0))
            .unwrap();
        page.set_style(overlay, "pointer-events", "none").unwrap();

        assert_eq!(page.element_from_point(50.0, 50.0), Some(below));
    }

    #[test]
    fn hit_test_tie_goes_to_latest_attached() {
        let page = Page::new();
        let first = page.create_element("div");
        page.append_child(page.body(), first).unwrap();
        let second = page.create_element("div");
        page.append_child(page.body(), second).unwrap();
        for node in [first, second] {
            page.set_rect(node, Rect::new(0.0, 0.0, 100.0, 100.0))
                .unwrap();
        }
        assert_eq!(page.element_from_point(50.0, 50.0), Some(second));

        // Reparenting the older sibling stacks it on top.
        page.append_child(page.body(), first).unwrap();
        assert_eq!(page.element_from_point(50.0, 50.0), Some(first));
    }

    #[test]
    fn unhandled_click_lands_on_hit_element() {
        let page = Page::new();
        let button = page.create_element("button");
        page.append_child(page.body(), button).unwrap();
        page.set_rect(button, Rect::new(10.0, 10.0, 20.0, 20.0))
            .unwrap();

        assert_eq!(page.dispatch_click(15.0, 15.0), Handled::Ignored);
        assert_eq!(page.click_count(button), 1);

        let guard = page.add_input_handler(Arc::new(|event: &InputEvent| {
            match event {
                InputEvent::Click { .. } => Handled::Consumed,
                _ => Handled::Ignored,
            }
        }));
        assert_eq!(page.dispatch_click(15.0, 15.0), Handled::Consumed);
        assert_eq!(page.click_count(button), 1);
        guard.remove();
        assert_eq!(page.input_handler_count(), 0);
    }
}
