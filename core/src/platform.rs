//! The boundary between the embedder and its two external collaborators.
//!
//! The embedder never touches a document directly. Everything it needs from the
//! host page goes through [`Platform`], and everything it needs from the component
//! runtime goes through [`Runtime`]. A browser binding implements [`Platform`] on top
//! of the DOM; tests implement it over an in-memory tree.
//!
//! All types here are single-threaded. Callbacks handed to the platform are invoked
//! on the UI thread at the platform's discretion.

use core::{any::type_name, fmt::Debug, hash::Hash};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::{EmbedError, Props};

/// Encapsulation mode of an attached shadow root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    /// The shadow root is reachable from script outside the host.
    #[default]
    Open,
    /// The shadow root is hidden from script outside the host.
    Closed,
}

/// Options forwarded to the platform when attaching an isolated sub-tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShadowOptions {
    /// Encapsulation mode, open unless overridden.
    pub mode: ShadowMode,
    /// Whether focus is delegated to the first focusable element inside the tree.
    pub delegates_focus: bool,
}

/// Parameters of the visibility predicate used for deferred activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisibilityOptions {
    /// Minimum fraction of the host that must be visible, in `0.0..=1.0`.
    pub threshold: f64,
    /// Margin around the viewport that counts as visible, in CSS margin syntax.
    pub root_margin: String,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            root_margin: String::from("0px"),
        }
    }
}

impl VisibilityOptions {
    /// Returns `true` if `entry` qualifies as a visibility event under these options.
    ///
    /// With the default options this fires as soon as any part of the host intersects
    /// the viewport.
    #[must_use]
    pub fn is_satisfied(&self, entry: &VisibilityEntry) -> bool {
        entry.is_intersecting && entry.ratio >= self.threshold
    }
}

/// A single visibility change reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityEntry {
    /// Whether the element currently intersects the (margin-adjusted) viewport.
    pub is_intersecting: bool,
    /// Visible fraction of the element.
    pub ratio: f64,
}

impl VisibilityEntry {
    /// An entry reporting the element fully visible.
    #[must_use]
    pub const fn visible() -> Self {
        Self {
            is_intersecting: true,
            ratio: 1.0,
        }
    }

    /// An entry reporting the element out of view.
    #[must_use]
    pub const fn hidden() -> Self {
        Self {
            is_intersecting: false,
            ratio: 0.0,
        }
    }
}

/// Callback invoked by the platform for every visibility change of an observed element.
pub type VisibilityCallback = Box<dyn FnMut(VisibilityEntry)>;

/// A live visibility observation.
pub trait VisibilityObserver {
    /// Stops observing. Calling this more than once has no effect.
    fn disconnect(&mut self);
}

impl Debug for dyn VisibilityObserver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(type_name::<Self>())
    }
}

/// The fixed capability interface of a registered custom element instance.
///
/// The platform creates one implementor per element through the factory passed to
/// [`Platform::define_custom_element`] and forwards its lifecycle callbacks to it.
pub trait CustomElement {
    /// The element was attached to a document.
    fn connect(&mut self);
    /// The element was detached from its document.
    fn disconnect(&mut self);
    /// A tracked attribute changed.
    fn attribute_changed(&mut self, name: &str, old: Option<&str>, new: Option<&str>);
    /// Layers explicit properties over the element's defaults.
    fn set_props(&mut self, props: Props);
    /// Returns the properties the element last rendered with.
    fn props(&self) -> Props;
}

impl Debug for dyn CustomElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(type_name::<Self>())
    }
}

/// Creates the adapter object for a freshly constructed custom element.
pub type ElementFactory<E> = Rc<dyn Fn(E) -> Box<dyn CustomElement>>;

/// Host document capabilities required by the embedder.
///
/// `Element` is a handle with identity semantics: two handles compare equal exactly
/// when they refer to the same node. Shadow roots are elements too, as far as the
/// embedder is concerned; they only ever serve as render targets.
pub trait Platform: 'static {
    /// Handle to a node in the host document.
    type Element: Clone + Eq + Hash + Debug + 'static;

    /// Returns every element matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Vec<Self::Element>;

    /// Returns the script element whose execution is currently in progress, if any.
    fn current_script(&self) -> Option<Self::Element>;

    /// Returns the parent element of `element`.
    fn parent(&self, element: &Self::Element) -> Option<Self::Element>;

    /// Returns the direct children of `element`, in document order.
    fn children(&self, element: &Self::Element) -> Vec<Self::Element>;

    /// Returns the lower-case tag name of `element`.
    fn tag_name(&self, element: &Self::Element) -> String;

    /// Returns every attribute of `element` as `(name, value)` pairs.
    fn attributes(&self, element: &Self::Element) -> Vec<(String, String)>;

    /// Returns the value of a single attribute.
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String> {
        self.attributes(element)
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    /// Returns the concatenated text content of `element`.
    fn text_content(&self, element: &Self::Element) -> String;

    /// Detaches `child` from `parent`.
    fn remove_child(&self, parent: &Self::Element, child: &Self::Element);

    /// Attaches an isolated sub-tree to `element` and returns its root.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::ShadowAttach`] if the element cannot host a shadow root.
    fn attach_shadow(
        &self,
        element: &Self::Element,
        options: &ShadowOptions,
    ) -> Result<Self::Element, EmbedError>;

    /// Returns the shadow root already attached to `element`, if the platform can see it.
    fn shadow_root(&self, element: &Self::Element) -> Option<Self::Element> {
        let _ = element;
        None
    }

    /// Starts observing the visibility of `element`.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::VisibilityUnavailable`] on platforms without a visibility
    /// observation primitive. This is the default.
    fn observe_visibility(
        &self,
        element: &Self::Element,
        options: &VisibilityOptions,
        callback: VisibilityCallback,
    ) -> Result<Box<dyn VisibilityObserver>, EmbedError> {
        let _ = (element, options, callback);
        Err(EmbedError::VisibilityUnavailable)
    }

    /// Returns `true` if a custom element type is already registered under `name`.
    fn custom_element_defined(&self, name: &str) -> bool {
        let _ = name;
        false
    }

    /// Registers a custom element type.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::CustomElementsUnavailable`] on platforms without a custom
    /// element registry. This is the default.
    fn define_custom_element(
        &self,
        name: &str,
        observed_attributes: Vec<String>,
        factory: ElementFactory<Self::Element>,
    ) -> Result<(), EmbedError> {
        let _ = (name, observed_attributes, factory);
        Err(EmbedError::CustomElementsUnavailable)
    }
}

/// The component runtime that turns a tree of UI nodes into content of a target.
pub trait Runtime<E>: 'static {
    /// A renderable tree produced by a component.
    type Tree: 'static;

    /// Renders `tree` into `target`, replacing its content. `None` renders the empty tree.
    fn render(&self, tree: Option<&Self::Tree>, target: &E);

    /// Attaches `tree` to server-rendered content already present in `target`.
    fn hydrate(&self, tree: &Self::Tree, target: &E);
}

/// Returns `true` if `name` is a valid custom element name.
///
/// Valid names start with an ASCII lower-case letter, contain a hyphen, and use no
/// upper-case characters.
#[must_use]
pub fn is_valid_custom_element_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase())
        && name.contains('-')
        && !name.chars().any(|c| c.is_ascii_uppercase() || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_predicate_fires_on_any_intersection() {
        let options = VisibilityOptions::default();
        assert!(options.is_satisfied(&VisibilityEntry {
            is_intersecting: true,
            ratio: 0.0,
        }));
        assert!(!options.is_satisfied(&VisibilityEntry::hidden()));
    }

    #[test]
    fn threshold_requires_visible_fraction() {
        let options = VisibilityOptions {
            threshold: 0.5,
            ..VisibilityOptions::default()
        };
        assert!(!options.is_satisfied(&VisibilityEntry {
            is_intersecting: true,
            ratio: 0.25,
        }));
        assert!(options.is_satisfied(&VisibilityEntry::visible()));
    }

    #[test]
    fn custom_element_names() {
        assert!(is_valid_custom_element_name("price-card"));
        assert!(!is_valid_custom_element_name("pricecard"));
        assert!(!is_valid_custom_element_name("Price-card"));
        assert!(!is_valid_custom_element_name("-price"));
    }

    #[test]
    fn shadow_options_parse_camel_case() {
        let options: ShadowOptions =
            serde_json::from_str(r#"{"mode":"closed","delegatesFocus":true}"#).unwrap();
        assert_eq!(options.mode, ShadowMode::Closed);
        assert!(options.delegates_focus);
    }
}
