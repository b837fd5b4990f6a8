//! In-memory element tree the board renders into.
//!
//! The [`Document`] plays the role of the browser DOM: elements with a tag
//! name, string attributes, classes, text and children. It is the only
//! durable record of what is on screen; decks read identities back out of it
//! instead of keeping a shadow copy.
//!
//! Elements live in a generational arena. An [`ElementHandle`] stays valid
//! until its element is detached, after which every operation on it fails
//! with [`ViewError::StaleHandle`].

pub mod subscription;

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

pub use subscription::{EventContext, EventKind, Handler, LiveCounter, Subscription};

/// Opaque reference to an element in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("element handle {0} is stale")]
    StaleHandle(ElementHandle),

    #[error("cannot append {child} into its own descendant {parent}")]
    Cycle {
        parent: ElementHandle,
        child: ElementHandle,
    },

    #[error("the root element cannot be detached")]
    DetachRoot,
}

#[derive(Debug)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    text: String,
    parent: Option<ElementHandle>,
    children: Vec<ElementHandle>,
    subscriptions: Vec<Subscription>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: BTreeMap::new(),
            classes: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            subscriptions: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: ElementHandle,
    mutations: u64,
    live: LiveCounter,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document holding only a `body` root element.
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: ElementHandle {
                index: 0,
                generation: 0,
            },
            mutations: 0,
            live: LiveCounter::default(),
        };
        doc.root = doc.allocate(Node::new("body"));
        doc.mutations = 0;
        doc
    }

    #[must_use]
    pub const fn body(&self) -> ElementHandle {
        self.root
    }

    /// Total number of mutations applied since the document was created.
    ///
    /// Writes that leave the tree unchanged (same attribute value, class
    /// already present) are not counted.
    #[must_use]
    pub const fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Number of event subscriptions that have not been disposed yet.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.live.get()
    }

    /// Number of live elements, including the root.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    #[must_use]
    pub fn contains(&self, handle: ElementHandle) -> bool {
        self.node(handle).is_ok()
    }

    /// Create a detached element. It becomes visible once appended.
    pub fn create_element(&mut self, tag: &str) -> ElementHandle {
        self.mutations += 1;
        self.allocate(Node::new(tag))
    }

    fn allocate(&mut self, node: Node) -> ElementHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return ElementHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        ElementHandle {
            index,
            generation: 0,
        }
    }

    fn node(&self, handle: ElementHandle) -> Result<&Node, ViewError> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(ViewError::StaleHandle(handle))
    }

    fn node_mut(&mut self, handle: ElementHandle) -> Result<&mut Node, ViewError> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(ViewError::StaleHandle(handle))
    }

    /// Tag name of an element.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn tag(&self, handle: ElementHandle) -> Result<&str, ViewError> {
        Ok(self.node(handle)?.tag.as_str())
    }

    /// Read an attribute; `Ok(None)` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn attribute(&self, handle: ElementHandle, name: &str) -> Result<Option<&str>, ViewError> {
        Ok(self.node(handle)?.attributes.get(name).map(String::as_str))
    }

    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn set_attribute(
        &mut self,
        handle: ElementHandle,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), ViewError> {
        let value = value.into();
        let node = self.node_mut(handle)?;
        if node.attributes.get(name) == Some(&value) {
            return Ok(());
        }
        node.attributes.insert(name.to_string(), value);
        self.mutations += 1;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn remove_attribute(&mut self, handle: ElementHandle, name: &str) -> Result<(), ViewError> {
        if self.node_mut(handle)?.attributes.remove(name).is_some() {
            self.mutations += 1;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn has_class(&self, handle: ElementHandle, class: &str) -> Result<bool, ViewError> {
        Ok(self.node(handle)?.classes.iter().any(|c| c == class))
    }

    /// Classes in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn classes(&self, handle: ElementHandle) -> Result<&[String], ViewError> {
        Ok(&self.node(handle)?.classes)
    }

    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn add_class(&mut self, handle: ElementHandle, class: &str) -> Result<(), ViewError> {
        let node = self.node_mut(handle)?;
        if node.classes.iter().any(|c| c == class) {
            return Ok(());
        }
        node.classes.push(class.to_string());
        self.mutations += 1;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn remove_class(&mut self, handle: ElementHandle, class: &str) -> Result<(), ViewError> {
        let node = self.node_mut(handle)?;
        let before = node.classes.len();
        node.classes.retain(|c| c != class);
        if node.classes.len() != before {
            self.mutations += 1;
        }
        Ok(())
    }

    /// Add or remove `class` depending on `on`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn toggle_class(
        &mut self,
        handle: ElementHandle,
        class: &str,
        on: bool,
    ) -> Result<(), ViewError> {
        if on {
            self.add_class(handle, class)
        } else {
            self.remove_class(handle, class)
        }
    }

    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn text(&self, handle: ElementHandle) -> Result<&str, ViewError> {
        Ok(self.node(handle)?.text.as_str())
    }

    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn set_text(
        &mut self,
        handle: ElementHandle,
        text: impl Into<String>,
    ) -> Result<(), ViewError> {
        let text = text.into();
        let node = self.node_mut(handle)?;
        if node.text == text {
            return Ok(());
        }
        node.text = text;
        self.mutations += 1;
        Ok(())
    }

    /// Children in document order.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn children(&self, handle: ElementHandle) -> Result<&[ElementHandle], ViewError> {
        Ok(&self.node(handle)?.children)
    }

    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn parent(&self, handle: ElementHandle) -> Result<Option<ElementHandle>, ViewError> {
        Ok(self.node(handle)?.parent)
    }

    /// First element in the subtree under `scope` whose `id` attribute is `id`.
    #[must_use]
    pub fn find_by_id(&self, scope: ElementHandle, id: &str) -> Option<ElementHandle> {
        let node = self.node(scope).ok()?;
        if node.attributes.get("id").map(String::as_str) == Some(id) {
            return Some(scope);
        }
        node.children
            .iter()
            .find_map(|child| self.find_by_id(*child, id))
    }

    /// Append `child` as the last child of `parent`, moving it out of its
    /// current parent if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if either element is gone and
    /// [`ViewError::Cycle`] if `child` is `parent` or one of its ancestors.
    pub fn append_child(
        &mut self,
        parent: ElementHandle,
        child: ElementHandle,
    ) -> Result<(), ViewError> {
        self.node(child)?;
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(ViewError::Cycle { parent, child });
            }
            cursor = self.node(current)?.parent;
        }

        if let Some(old_parent) = self.node(child)?.parent {
            self.node_mut(old_parent)?.children.retain(|c| *c != child);
        }
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        self.mutations += 1;
        Ok(())
    }

    /// Remove an element from the tree and free it together with its whole
    /// subtree. Subscriptions held by freed elements are dropped here.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element was already detached
    /// and [`ViewError::DetachRoot`] for the body element.
    pub fn detach(&mut self, handle: ElementHandle) -> Result<(), ViewError> {
        if handle == self.root {
            return Err(ViewError::DetachRoot);
        }
        if let Some(parent) = self.node(handle)?.parent {
            self.node_mut(parent)?.children.retain(|c| *c != handle);
        }
        self.free_subtree(handle);
        self.mutations += 1;
        Ok(())
    }

    /// Detach every child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if `parent` no longer exists.
    pub fn clear_children(&mut self, parent: ElementHandle) -> Result<usize, ViewError> {
        let children = self.children(parent)?.to_vec();
        for child in &children {
            self.detach(*child)?;
        }
        Ok(children.len())
    }

    fn free_subtree(&mut self, handle: ElementHandle) {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return;
        };
        if slot.generation != handle.generation {
            return;
        }
        let Some(node) = slot.node.take() else {
            return;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        for child in node.children {
            self.free_subtree(child);
        }
        // `node.subscriptions` drops here, disposing the handlers.
    }

    /// Attach a handler to an element for the element's whole lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn listen(
        &mut self,
        handle: ElementHandle,
        event: EventKind,
        handler: Handler,
    ) -> Result<(), ViewError> {
        let subscription = Subscription::new(event, handler, &self.live);
        self.node_mut(handle)?.subscriptions.push(subscription);
        Ok(())
    }

    /// Run every handler attached to `handle` for `event`; returns how many
    /// ran.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn dispatch(&self, handle: ElementHandle, event: EventKind) -> Result<usize, ViewError> {
        let handlers: Vec<Handler> = self
            .node(handle)?
            .subscriptions
            .iter()
            .filter(|sub| sub.event() == event)
            .map(Subscription::handler)
            .collect();
        let ctx = EventContext {
            target: handle,
            event,
        };
        for handler in &handlers {
            handler(&ctx);
        }
        Ok(handlers.len())
    }

    /// Indented outline of the subtree under `handle`, one element per line.
    #[must_use]
    pub fn render_tree(&self, handle: ElementHandle) -> String {
        let mut out = String::new();
        self.write_tree(handle, 0, &mut out);
        out
    }

    fn write_tree(&self, handle: ElementHandle, depth: usize, out: &mut String) {
        let Ok(node) = self.node(handle) else {
            return;
        };
        let _ = write!(out, "{:indent$}<{}", "", node.tag, indent = depth * 2);
        for (name, value) in &node.attributes {
            let _ = write!(out, " {name}=\"{value}\"");
        }
        if !node.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", node.classes.join(" "));
        }
        out.push('>');
        if !node.text.is_empty() {
            out.push_str(&node.text);
        }
        out.push('\n');
        for child in &node.children {
            self.write_tree(*child, depth + 1, out);
        }
    }
}
