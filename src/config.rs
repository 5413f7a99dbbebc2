//! Per-render configuration.
//!
//! A configuration is split into two halves. [`EmbedOptions`] is plain data and can be
//! read from a JSON document, which lets a host page describe its mounts without any
//! Rust involvement:
//!
//! ```
//! use waterui_embed::config::EmbedOptions;
//!
//! let options = EmbedOptions::from_json(
//!     r#"{ "selector": ".price-widget", "lazy": { "threshold": 0.5 }, "shadowRoot": true }"#,
//! )
//! .unwrap();
//! assert_eq!(options.selector.as_deref(), Some(".price-widget"));
//! assert!(options.visibility().is_some());
//! ```
//!
//! [`EmbedConfig`] adds the lifecycle hooks on top and is what `render` takes.

use core::fmt::{self, Debug};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use waterui_embed_core::{Props, ShadowOptions, VisibilityOptions};

use crate::lifecycle::WidgetInstance;

/// Isolation request: a flag, or platform options for the shadow root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShadowRootOption {
    /// `true` attaches a shadow root with default options, `false` renders into the host.
    Enabled(bool),
    /// Attach a shadow root with these options.
    Options(ShadowOptions),
}

impl ShadowRootOption {
    /// Returns the shadow options to attach with, or `None` if isolation is off.
    #[must_use]
    pub fn options(&self) -> Option<ShadowOptions> {
        match self {
            Self::Enabled(true) => Some(ShadowOptions::default()),
            Self::Enabled(false) => None,
            Self::Options(options) => Some(options.clone()),
        }
    }
}

/// Deferred activation request: a flag, or parameters of the visibility predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LazyOption {
    /// `true` waits for any part of the host to become visible.
    Enabled(bool),
    /// Wait until the host is visible according to these options.
    Options(VisibilityOptions),
}

impl LazyOption {
    /// Returns the visibility predicate parameters, or `None` if activation is immediate.
    #[must_use]
    pub fn options(&self) -> Option<VisibilityOptions> {
        match self {
            Self::Enabled(true) => Some(VisibilityOptions::default()),
            Self::Enabled(false) => None,
            Self::Options(options) => Some(options.clone()),
        }
    }
}

/// The data half of a configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedOptions {
    /// Mount into every element matching this selector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Mount into the parent of the currently executing script.
    pub inline: bool,
    /// Read the selector from the `data-mount-in` attribute of the executing script.
    pub client_specified: bool,
    /// Properties used when neither markup nor the caller provides a value.
    pub default_props: Props,
    /// Remove the host's existing children (except props blocks) before mounting.
    pub clean: bool,
    /// Hydrate existing markup instead of replacing it.
    pub hydrate: bool,
    /// Isolation request. Unset means off for selector mounts and on for custom elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_root: Option<ShadowRootOption>,
    /// Deferred activation request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lazy: Option<LazyOption>,
    /// Register a custom element under this name instead of resolving hosts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    /// Attributes tracked by a registered custom element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_attributes: Option<Vec<String>>,
}

impl EmbedOptions {
    /// Parses options from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid options document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Shadow options for a selector mount, `None` when isolation is off.
    #[must_use]
    pub fn isolation(&self) -> Option<ShadowOptions> {
        self.shadow_root.as_ref().and_then(ShadowRootOption::options)
    }

    /// Visibility predicate parameters, `None` when activation is immediate.
    #[must_use]
    pub fn visibility(&self) -> Option<VisibilityOptions> {
        self.lazy.as_ref().and_then(LazyOption::options)
    }
}

/// Hook run before mounting. Returning `Some` replaces the computed props verbatim.
pub type BeforeMountHook<E> = Rc<dyn Fn(&E, &Props) -> Option<Props>>;

/// Hook run with a live instance, after mount or on unmount.
pub type InstanceHook<E> = Rc<dyn Fn(&WidgetInstance<E>)>;

/// Lifecycle hooks of a configuration.
pub struct Hooks<E> {
    pub(crate) before_mount: Option<BeforeMountHook<E>>,
    pub(crate) mounted: Option<InstanceHook<E>>,
    pub(crate) unmount: Option<InstanceHook<E>>,
}

impl<E> Default for Hooks<E> {
    fn default() -> Self {
        Self {
            before_mount: None,
            mounted: None,
            unmount: None,
        }
    }
}

impl<E> Clone for Hooks<E> {
    fn clone(&self) -> Self {
        Self {
            before_mount: self.before_mount.clone(),
            mounted: self.mounted.clone(),
            unmount: self.unmount.clone(),
        }
    }
}

impl<E> Debug for Hooks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_mount", &self.before_mount.is_some())
            .field("mounted", &self.mounted.is_some())
            .field("unmount", &self.unmount.is_some())
            .finish()
    }
}

/// Options plus hooks, built fluently.
///
/// ```
/// use waterui_embed::config::EmbedConfig;
///
/// let config = EmbedConfig::<u32>::new()
///     .selector("[data-widget=cart]")
///     .default_prop("currency", "EUR")
///     .clean(true)
///     .lazy(true);
/// assert!(config.options().clean);
/// ```
pub struct EmbedConfig<E> {
    options: EmbedOptions,
    hooks: Hooks<E>,
}

impl<E> Default for EmbedConfig<E> {
    fn default() -> Self {
        Self::from_options(EmbedOptions::default())
    }
}

impl<E> Clone for EmbedConfig<E> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl<E> Debug for EmbedConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedConfig")
            .field("options", &self.options)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<E> From<EmbedOptions> for EmbedConfig<E> {
    fn from(options: EmbedOptions) -> Self {
        Self::from_options(options)
    }
}

impl<E> EmbedConfig<E> {
    /// Creates an empty configuration. It resolves no hosts until a strategy is set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from data options, without hooks.
    #[must_use]
    pub const fn from_options(options: EmbedOptions) -> Self {
        Self {
            options,
            hooks: Hooks {
                before_mount: None,
                mounted: None,
                unmount: None,
            },
        }
    }

    /// Returns the data options.
    #[must_use]
    pub const fn options(&self) -> &EmbedOptions {
        &self.options
    }

    pub(crate) const fn hooks(&self) -> &Hooks<E> {
        &self.hooks
    }

    /// Mounts into every element matching `selector`.
    #[must_use]
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.options.selector = Some(selector.into());
        self
    }

    /// Mounts into the parent of the currently executing script.
    #[must_use]
    pub const fn inline(mut self, inline: bool) -> Self {
        self.options.inline = inline;
        self
    }

    /// Reads the target selector from the executing script's `data-mount-in` attribute.
    #[must_use]
    pub const fn client_specified(mut self, client_specified: bool) -> Self {
        self.options.client_specified = client_specified;
        self
    }

    /// Replaces the default props.
    #[must_use]
    pub fn default_props(mut self, props: Props) -> Self {
        self.options.default_props = props;
        self
    }

    /// Sets a single default prop.
    #[must_use]
    pub fn default_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.default_props.insert(key.into(), value.into());
        self
    }

    /// Removes existing host children before mounting.
    #[must_use]
    pub const fn clean(mut self, clean: bool) -> Self {
        self.options.clean = clean;
        self
    }

    /// Hydrates existing markup instead of replacing it.
    #[must_use]
    pub const fn hydrate(mut self, hydrate: bool) -> Self {
        self.options.hydrate = hydrate;
        self
    }

    /// Turns isolation on or off.
    #[must_use]
    pub fn shadow_root(mut self, enabled: bool) -> Self {
        self.options.shadow_root = Some(ShadowRootOption::Enabled(enabled));
        self
    }

    /// Turns isolation on with explicit shadow options.
    #[must_use]
    pub fn shadow_options(mut self, options: ShadowOptions) -> Self {
        self.options.shadow_root = Some(ShadowRootOption::Options(options));
        self
    }

    /// Turns deferred activation on or off.
    #[must_use]
    pub fn lazy(mut self, enabled: bool) -> Self {
        self.options.lazy = Some(LazyOption::Enabled(enabled));
        self
    }

    /// Turns deferred activation on with explicit visibility options.
    #[must_use]
    pub fn lazy_options(mut self, options: VisibilityOptions) -> Self {
        self.options.lazy = Some(LazyOption::Options(options));
        self
    }

    /// Registers a custom element under `tag_name` instead of resolving hosts.
    #[must_use]
    pub fn tag_name(mut self, tag_name: impl Into<String>) -> Self {
        self.options.tag_name = Some(tag_name.into());
        self
    }

    /// Sets the attributes a registered custom element tracks.
    #[must_use]
    pub fn observed_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.observed_attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Runs `hook` before mounting. Returning `Some` replaces the computed props.
    #[must_use]
    pub fn on_before_mount(mut self, hook: impl Fn(&E, &Props) -> Option<Props> + 'static) -> Self {
        self.hooks.before_mount = Some(Rc::new(hook));
        self
    }

    /// Runs `hook` after an instance has been mounted.
    #[must_use]
    pub fn on_mounted(mut self, hook: impl Fn(&WidgetInstance<E>) + 'static) -> Self {
        self.hooks.mounted = Some(Rc::new(hook));
        self
    }

    /// Runs `hook` when an instance is unmounted.
    #[must_use]
    pub fn on_unmount(mut self, hook: impl Fn(&WidgetInstance<E>) + 'static) -> Self {
        self.hooks.unmount = Some(Rc::new(hook));
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use waterui_embed_core::ShadowMode;

    use super::*;

    #[test]
    fn parses_flags_and_objects() {
        let options = EmbedOptions::from_json(
            r#"{
                "selector": ".cart",
                "clientSpecified": true,
                "defaultProps": { "currency": "EUR" },
                "shadowRoot": { "mode": "closed" },
                "lazy": true
            }"#,
        )
        .unwrap();

        assert_eq!(options.selector.as_deref(), Some(".cart"));
        assert!(options.client_specified);
        assert_eq!(options.default_props.get("currency"), Some(&json!("EUR")));
        assert_eq!(options.isolation().map(|o| o.mode), Some(ShadowMode::Closed));
        assert_eq!(options.visibility(), Some(VisibilityOptions::default()));
    }

    #[test]
    fn disabled_flags_mean_off() {
        let options = EmbedOptions::from_json(r#"{ "shadowRoot": false, "lazy": false }"#).unwrap();
        assert_eq!(options.isolation(), None);
        assert_eq!(options.visibility(), None);
        assert_eq!(EmbedOptions::default().isolation(), None);
    }

    #[test]
    fn lazy_options_fill_defaults() {
        let options = EmbedOptions::from_json(r#"{ "lazy": { "rootMargin": "200px" } }"#).unwrap();
        let visibility = options.visibility().unwrap();
        assert_eq!(visibility.root_margin, "200px");
        assert!(visibility.threshold.abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let options = EmbedOptions::from_json(r##"{ "selector": "#a", "theme": "dark" }"##).unwrap();
        assert_eq!(options.selector.as_deref(), Some("#a"));
    }

    #[test]
    fn builder_sets_hooks() {
        let config = EmbedConfig::<u32>::new()
            .selector(".a")
            .on_before_mount(|_, _| None)
            .on_unmount(|_| {});
        assert!(config.hooks().before_mount.is_some());
        assert!(config.hooks().mounted.is_none());
        assert!(config.hooks().unmount.is_some());
    }
}
