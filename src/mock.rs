//! # Mock Platform
//!
//! An in-memory document and a recording component runtime, for exercising widgets
//! without a browser.
//!
//! [`MockPlatform`] keeps a small element tree, answers simple selectors (`tag`,
//! `.class`, `#id`, `[attr]`, `[attr=value]`), attaches shadow roots, and runs custom
//! element callbacks when elements are attached, detached, or have a tracked attribute
//! changed. Visibility is never reported on its own; call
//! [`MockPlatform::fire_visibility`] to play the role of the viewport.
//!
//! [`RecordingRuntime`] records every render and hydrate call it receives.

use core::fmt::{self, Debug};
use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};

use waterui_embed_core::{
    CustomElement, ElementFactory, EmbedError, Platform, Props, Runtime, ShadowMode,
    ShadowOptions, VisibilityCallback, VisibilityEntry, VisibilityObserver, VisibilityOptions,
};

static NEXT_DOCUMENT: AtomicU64 = AtomicU64::new(1);

const BODY: usize = 0;

/// Handle to a node of a [`MockPlatform`] document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockElement {
    document: u64,
    index: usize,
}

#[derive(Debug, Default)]
struct Node {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<usize>,
    parent: Option<usize>,
    text: String,
    shadow: Option<(usize, ShadowMode)>,
}

struct Observation {
    element: MockElement,
    options: VisibilityOptions,
    callback: Option<VisibilityCallback>,
    active: bool,
}

type Observations = Rc<RefCell<Vec<Observation>>>;

struct MockObserver {
    observations: Weak<RefCell<Vec<Observation>>>,
    index: usize,
}

impl VisibilityObserver for MockObserver {
    fn disconnect(&mut self) {
        let Some(observations) = self.observations.upgrade() else {
            return;
        };
        let callback = {
            let mut observations = observations.borrow_mut();
            let observation = &mut observations[self.index];
            observation.active = false;
            observation.callback.take()
        };
        drop(callback);
    }
}

struct Definition {
    observed: Vec<String>,
    factory: ElementFactory<MockElement>,
}

/// Shared handle to the adapter object driving a custom element.
pub type CustomElementHandle = Rc<RefCell<Box<dyn CustomElement>>>;

/// An in-memory host document.
pub struct MockPlatform {
    document: u64,
    nodes: RefCell<Vec<Node>>,
    current_script: Cell<Option<usize>>,
    observations: Observations,
    visibility_supported: Cell<bool>,
    custom_elements_supported: Cell<bool>,
    definitions: RefCell<HashMap<String, Definition>>,
    upgraded: RefCell<HashMap<usize, CustomElementHandle>>,
}

impl Debug for MockPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPlatform")
            .field("document", &self.document)
            .field("nodes", &self.nodes.borrow().len())
            .field("definitions", &self.definitions.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Creates a document containing only a `body` element.
    #[must_use]
    pub fn new() -> Self {
        Self {
            document: NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed),
            nodes: RefCell::new(vec![Node {
                tag: "body".into(),
                ..Node::default()
            }]),
            current_script: Cell::new(None),
            observations: Rc::new(RefCell::new(Vec::new())),
            visibility_supported: Cell::new(true),
            custom_elements_supported: Cell::new(true),
            definitions: RefCell::new(HashMap::new()),
            upgraded: RefCell::new(HashMap::new()),
        }
    }

    const fn element(&self, index: usize) -> MockElement {
        MockElement {
            document: self.document,
            index,
        }
    }

    fn index(&self, element: &MockElement) -> usize {
        assert_eq!(
            element.document, self.document,
            "element belongs to another mock document"
        );
        element.index
    }

    /// The document body.
    #[must_use]
    pub const fn body(&self) -> MockElement {
        self.element(BODY)
    }

    /// Creates a `tag` element that is not attached anywhere.
    pub fn create_detached(&self, tag: &str) -> MockElement {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(Node {
            tag: tag.to_ascii_lowercase(),
            ..Node::default()
        });
        self.element(nodes.len() - 1)
    }

    /// Creates a `tag` element as the last child of `parent`.
    pub fn create_element(&self, tag: &str, parent: &MockElement) -> MockElement {
        self.create_element_with_attributes(tag, parent, &[])
    }

    /// Creates an element with `attributes` already set, then attaches it to `parent`.
    ///
    /// Custom elements therefore see their markup attributes on first connect, the way
    /// parsed markup behaves.
    pub fn create_element_with_attributes(
        &self,
        tag: &str,
        parent: &MockElement,
        attributes: &[(&str, &str)],
    ) -> MockElement {
        let element = self.create_detached(tag);
        {
            let mut nodes = self.nodes.borrow_mut();
            nodes[element.index].attributes = attributes
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect();
        }
        self.append_child(parent, &element);
        element
    }

    /// Appends a data block of the given `type` containing `json` to `host`.
    pub fn append_props_block(&self, host: &MockElement, kind: &str, json: &str) -> MockElement {
        let block = self.create_element_with_attributes("script", host, &[("type", kind)]);
        self.set_text(&block, json);
        block
    }

    /// Moves `child` to the end of `parent`, connecting it if `parent` is connected.
    pub fn append_child(&self, parent: &MockElement, child: &MockElement) {
        let parent_index = self.index(parent);
        let child_index = self.index(child);
        self.detach(child_index);
        {
            let mut nodes = self.nodes.borrow_mut();
            nodes[parent_index].children.push(child_index);
            nodes[child_index].parent = Some(parent_index);
        }
        if self.is_connected(child) {
            for index in self.subtree(child_index) {
                self.connect_node(index);
            }
        }
    }

    /// Detaches `element` from its parent, disconnecting it.
    pub fn remove(&self, element: &MockElement) {
        let index = self.index(element);
        let was_connected = self.is_connected(element);
        self.detach(index);
        if was_connected {
            for index in self.subtree(index) {
                let handle = self.upgraded.borrow().get(&index).cloned();
                if let Some(handle) = handle {
                    handle.borrow_mut().disconnect();
                }
            }
        }
    }

    fn detach(&self, index: usize) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(parent) = nodes[index].parent.take() {
            nodes[parent].children.retain(|&child| child != index);
        }
    }

    fn subtree(&self, index: usize) -> Vec<usize> {
        let nodes = self.nodes.borrow();
        let mut result = Vec::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(nodes[current].children.iter().rev());
        }
        result
    }

    /// Returns `true` if `element` is attached below the body.
    #[must_use]
    pub fn is_connected(&self, element: &MockElement) -> bool {
        let nodes = self.nodes.borrow();
        let mut current = Some(self.index(element));
        while let Some(index) = current {
            if index == BODY {
                return true;
            }
            current = nodes[index].parent;
        }
        false
    }

    /// Sets an attribute, notifying a custom element if it tracks `name`.
    pub fn set_attribute(&self, element: &MockElement, name: &str, value: &str) {
        let index = self.index(element);
        let old = {
            let mut nodes = self.nodes.borrow_mut();
            let attributes = &mut nodes[index].attributes;
            if let Some(entry) = attributes.iter_mut().find(|(key, _)| key == name) {
                Some(core::mem::replace(&mut entry.1, value.to_string()))
            } else {
                attributes.push((name.to_string(), value.to_string()));
                None
            }
        };
        self.notify_attribute(index, name, old.as_deref(), Some(value));
    }

    /// Removes an attribute, notifying a custom element if it tracks `name`.
    pub fn remove_attribute(&self, element: &MockElement, name: &str) {
        let index = self.index(element);
        let old = {
            let mut nodes = self.nodes.borrow_mut();
            let attributes = &mut nodes[index].attributes;
            let position = attributes.iter().position(|(key, _)| key == name);
            position.map(|position| attributes.remove(position).1)
        };
        if old.is_some() {
            self.notify_attribute(index, name, old.as_deref(), None);
        }
    }

    fn notify_attribute(&self, index: usize, name: &str, old: Option<&str>, new: Option<&str>) {
        let handle = self.upgraded.borrow().get(&index).cloned();
        let Some(handle) = handle else {
            return;
        };
        let tag = self.nodes.borrow()[index].tag.clone();
        let tracked = self
            .definitions
            .borrow()
            .get(&tag)
            .is_some_and(|definition| definition.observed.iter().any(|o| o == name));
        if tracked {
            handle.borrow_mut().attribute_changed(name, old, new);
        }
    }

    /// Adds `class` to the element's class list.
    pub fn add_class(&self, element: &MockElement, class: &str) {
        let current = self.attribute(element, "class").unwrap_or_default();
        let joined = if current.is_empty() {
            class.to_string()
        } else {
            format!("{current} {class}")
        };
        self.set_attribute(element, "class", &joined);
    }

    /// Replaces the text of `element`.
    pub fn set_text(&self, element: &MockElement, text: &str) {
        let index = self.index(element);
        self.nodes.borrow_mut()[index].text = text.to_string();
    }

    /// Makes `script` the currently executing script, or clears it.
    pub fn set_current_script(&self, script: Option<&MockElement>) {
        self.current_script
            .set(script.map(|script| self.index(script)));
    }

    /// The mode of the shadow root attached to `element`.
    #[must_use]
    pub fn shadow_mode(&self, element: &MockElement) -> Option<ShadowMode> {
        self.nodes.borrow()[self.index(element)]
            .shadow
            .map(|(_, mode)| mode)
    }

    /// Turns the visibility observation capability on or off.
    pub fn set_visibility_supported(&self, supported: bool) {
        self.visibility_supported.set(supported);
    }

    /// Turns the custom element registry on or off.
    pub fn set_custom_elements_supported(&self, supported: bool) {
        self.custom_elements_supported.set(supported);
    }

    /// Reports `entry` to every active observation of `element`.
    ///
    /// Returns the number of callbacks invoked.
    pub fn fire_visibility(&self, element: &MockElement, entry: VisibilityEntry) -> usize {
        let indices: Vec<usize> = self
            .observations
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, observation)| observation.active && observation.element == *element)
            .map(|(index, _)| index)
            .collect();

        let mut fired = 0;
        for index in indices {
            let callback = self.observations.borrow_mut()[index].callback.take();
            let Some(mut callback) = callback else {
                continue;
            };
            callback(entry);
            fired += 1;

            let mut observations = self.observations.borrow_mut();
            if observations[index].active {
                observations[index].callback = Some(callback);
            }
        }
        fired
    }

    /// Number of active observations of `element`.
    #[must_use]
    pub fn observer_count(&self, element: &MockElement) -> usize {
        self.observations
            .borrow()
            .iter()
            .filter(|observation| observation.active && observation.element == *element)
            .count()
    }

    /// Options of the first active observation of `element`.
    #[must_use]
    pub fn observed_options(&self, element: &MockElement) -> Option<VisibilityOptions> {
        self.observations
            .borrow()
            .iter()
            .find(|observation| observation.active && observation.element == *element)
            .map(|observation| observation.options.clone())
    }

    /// Number of registered custom element types.
    #[must_use]
    pub fn definition_count(&self) -> usize {
        self.definitions.borrow().len()
    }

    /// Attributes tracked by the custom element type `tag`.
    #[must_use]
    pub fn observed_attributes(&self, tag: &str) -> Option<Vec<String>> {
        self.definitions
            .borrow()
            .get(tag)
            .map(|definition| definition.observed.clone())
    }

    /// The adapter object driving `element`, if it is an upgraded custom element.
    #[must_use]
    pub fn custom_element(&self, element: &MockElement) -> Option<CustomElementHandle> {
        self.upgraded.borrow().get(&self.index(element)).cloned()
    }

    fn connect_node(&self, index: usize) {
        let tag = self.nodes.borrow()[index].tag.clone();
        let factory = self
            .definitions
            .borrow()
            .get(&tag)
            .map(|definition| Rc::clone(&definition.factory));
        let Some(factory) = factory else {
            return;
        };

        let existing = self.upgraded.borrow().get(&index).cloned();
        let handle = match existing {
            Some(handle) => handle,
            None => {
                let handle = Rc::new(RefCell::new(factory(self.element(index))));
                self.upgraded.borrow_mut().insert(index, Rc::clone(&handle));
                handle
            }
        };
        handle.borrow_mut().connect();
    }

    fn matches(&self, node: &Node, selector: &str) -> bool {
        let attribute = |name: &str| {
            node.attributes
                .iter()
                .find_map(|(key, value)| (key == name).then_some(value.as_str()))
        };

        if let Some(class) = selector.strip_prefix('.') {
            return attribute("class")
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == class));
        }
        if let Some(id) = selector.strip_prefix('#') {
            return attribute("id") == Some(id);
        }
        if let Some(inner) = selector
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return match inner.split_once('=') {
                Some((name, value)) => {
                    attribute(name.trim()) == Some(value.trim().trim_matches(['"', '\'']))
                }
                None => attribute(inner.trim()).is_some(),
            };
        }
        node.tag == selector.to_ascii_lowercase()
    }
}

impl Platform for MockPlatform {
    type Element = MockElement;

    fn query_selector_all(&self, selector: &str) -> Vec<MockElement> {
        let selector = selector.trim();
        let candidates = self.subtree(BODY);
        let nodes = self.nodes.borrow();
        candidates
            .into_iter()
            .skip(1)
            .filter(|&index| self.matches(&nodes[index], selector))
            .map(|index| self.element(index))
            .collect()
    }

    fn current_script(&self) -> Option<MockElement> {
        self.current_script.get().map(|index| self.element(index))
    }

    fn parent(&self, element: &MockElement) -> Option<MockElement> {
        self.nodes.borrow()[self.index(element)]
            .parent
            .map(|index| self.element(index))
    }

    fn children(&self, element: &MockElement) -> Vec<MockElement> {
        self.nodes.borrow()[self.index(element)]
            .children
            .iter()
            .map(|&index| self.element(index))
            .collect()
    }

    fn tag_name(&self, element: &MockElement) -> String {
        self.nodes.borrow()[self.index(element)].tag.clone()
    }

    fn attributes(&self, element: &MockElement) -> Vec<(String, String)> {
        self.nodes.borrow()[self.index(element)].attributes.clone()
    }

    fn text_content(&self, element: &MockElement) -> String {
        let nodes = self.nodes.borrow();
        self.subtree(self.index(element))
            .into_iter()
            .map(|index| nodes[index].text.as_str())
            .collect()
    }

    fn remove_child(&self, parent: &MockElement, child: &MockElement) {
        if self.parent(child).as_ref() == Some(parent) {
            self.remove(child);
        }
    }

    fn attach_shadow(
        &self,
        element: &MockElement,
        options: &ShadowOptions,
    ) -> Result<MockElement, EmbedError> {
        let index = self.index(element);
        if self.nodes.borrow()[index].shadow.is_some() {
            return Err(EmbedError::ShadowAttach {
                reason: "element already hosts a shadow root".into(),
            });
        }
        let root = self.create_detached("#shadow-root");
        self.nodes.borrow_mut()[index].shadow = Some((root.index, options.mode));
        Ok(root)
    }

    fn shadow_root(&self, element: &MockElement) -> Option<MockElement> {
        self.nodes.borrow()[self.index(element)]
            .shadow
            .map(|(index, _)| self.element(index))
    }

    fn observe_visibility(
        &self,
        element: &MockElement,
        options: &VisibilityOptions,
        callback: VisibilityCallback,
    ) -> Result<Box<dyn VisibilityObserver>, EmbedError> {
        if !self.visibility_supported.get() {
            return Err(EmbedError::VisibilityUnavailable);
        }
        let mut observations = self.observations.borrow_mut();
        observations.push(Observation {
            element: *element,
            options: options.clone(),
            callback: Some(callback),
            active: true,
        });
        Ok(Box::new(MockObserver {
            observations: Rc::downgrade(&self.observations),
            index: observations.len() - 1,
        }))
    }

    fn custom_element_defined(&self, name: &str) -> bool {
        self.definitions.borrow().contains_key(name)
    }

    fn define_custom_element(
        &self,
        name: &str,
        observed_attributes: Vec<String>,
        factory: ElementFactory<MockElement>,
    ) -> Result<(), EmbedError> {
        if !self.custom_elements_supported.get() {
            return Err(EmbedError::CustomElementsUnavailable);
        }
        if self.custom_element_defined(name) {
            return Err(EmbedError::Platform(format!(
                "`{name}` has already been defined"
            )));
        }
        self.definitions.borrow_mut().insert(
            name.to_string(),
            Definition {
                observed: observed_attributes,
                factory,
            },
        );

        let pending: Vec<usize> = {
            let nodes = self.nodes.borrow();
            self.subtree(BODY)
                .into_iter()
                .filter(|&index| nodes[index].tag == name)
                .collect()
        };
        for index in pending {
            self.connect_node(index);
        }
        Ok(())
    }
}

/// A call received by a [`RecordingRuntime`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall<T> {
    /// `render`; `tree` is `None` for the empty tree.
    Render {
        /// Render target.
        target: MockElement,
        /// Rendered tree.
        tree: Option<T>,
    },
    /// `hydrate`.
    Hydrate {
        /// Render target.
        target: MockElement,
        /// Hydrated tree.
        tree: T,
    },
}

impl<T> RenderCall<T> {
    /// The target of the call.
    #[must_use]
    pub const fn target(&self) -> &MockElement {
        match self {
            Self::Render { target, .. } | Self::Hydrate { target, .. } => target,
        }
    }
}

/// A component runtime that records calls instead of rendering.
#[derive(Debug)]
pub struct RecordingRuntime<T = Props> {
    calls: RefCell<Vec<RenderCall<T>>>,
}

impl<T> Default for RecordingRuntime<T> {
    fn default() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl RecordingRuntime {
    /// Creates a runtime whose trees are props.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Clone> RecordingRuntime<T> {
    /// Every call received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<RenderCall<T>> {
        self.calls.borrow().clone()
    }

    /// Calls that targeted `target`.
    #[must_use]
    pub fn calls_for(&self, target: &MockElement) -> Vec<RenderCall<T>> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.target() == target)
            .cloned()
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl<T: Clone + 'static> Runtime<MockElement> for RecordingRuntime<T> {
    type Tree = T;

    fn render(&self, tree: Option<&T>, target: &MockElement) {
        self.calls.borrow_mut().push(RenderCall::Render {
            target: *target,
            tree: tree.cloned(),
        });
    }

    fn hydrate(&self, tree: &T, target: &MockElement) {
        self.calls.borrow_mut().push(RenderCall::Hydrate {
            target: *target,
            tree: tree.clone(),
        });
    }
}
