//! Registering a component as a custom element type.
//!
//! Each element of the registered type is driven by its own [`WidgetElement`], which
//! the platform creates and calls back into. These elements manage their render target
//! themselves and never appear in a factory's instance list.

use core::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use waterui_embed_core::{
    CustomElement, ElementFactory, EmbedError, Platform, Props, Runtime, ShadowOptions,
    platform::is_valid_custom_element_name,
    props::{self, PROP_PREFIX, to_kebab_case},
};

use crate::{
    config::{EmbedOptions, ShadowRootOption},
    lifecycle::Component,
};

/// Everything elements of one registered type share.
struct Definition<P: Platform, R: Runtime<P::Element>> {
    platform: Weak<P>,
    runtime: Rc<R>,
    component: Component<R::Tree>,
    defaults: Props,
    shadow: Option<ShadowOptions>,
    hydrate: bool,
}

/// Attributes a registered element tracks: the configured list, or one prop attribute
/// per default prop.
#[must_use]
pub fn observed_attributes(options: &EmbedOptions) -> Vec<String> {
    options.observed_attributes.clone().unwrap_or_else(|| {
        options
            .default_props
            .keys()
            .map(|key| format!("{PROP_PREFIX}{}", to_kebab_case(key)))
            .collect()
    })
}

/// Registers `component` as the custom element `tag_name`.
///
/// Returns `Ok(false)` without touching the registry if the name is already taken.
///
/// # Errors
///
/// Returns [`EmbedError::InvalidTagName`] for names the platform would reject, and
/// forwards registration failures of the platform.
pub fn register<P, R>(
    platform: &Rc<P>,
    runtime: Rc<R>,
    component: Component<R::Tree>,
    tag_name: &str,
    options: &EmbedOptions,
) -> Result<bool, EmbedError>
where
    P: Platform,
    R: Runtime<P::Element>,
{
    if !is_valid_custom_element_name(tag_name) {
        return Err(EmbedError::InvalidTagName(tag_name.to_string()));
    }

    if platform.custom_element_defined(tag_name) {
        tracing::warn!("Custom element `{tag_name}` is already defined, skipping registration");
        return Ok(false);
    }

    let definition = Rc::new(Definition {
        platform: Rc::downgrade(platform),
        runtime,
        component,
        defaults: options.default_props.clone(),
        shadow: options
            .shadow_root
            .as_ref()
            .map_or_else(|| Some(ShadowOptions::default()), ShadowRootOption::options),
        hydrate: options.hydrate,
    });

    let factory: ElementFactory<P::Element> = Rc::new(move |host| {
        Box::new(WidgetElement::new(Rc::clone(&definition), host)) as Box<dyn CustomElement>
    });

    platform.define_custom_element(tag_name, observed_attributes(options), factory)?;
    tracing::debug!("Registered custom element `{tag_name}`");
    Ok(true)
}

/// The adapter object behind one element of a registered type.
pub struct WidgetElement<P: Platform, R: Runtime<P::Element>> {
    definition: Rc<Definition<P, R>>,
    host: P::Element,
    target: Option<P::Element>,
    explicit: Props,
    props: Props,
    connected: bool,
    rendered: bool,
}

impl<P: Platform, R: Runtime<P::Element>> Debug for WidgetElement<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetElement")
            .field("host", &self.host)
            .field("target", &self.target)
            .field("props", &self.props)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl<P: Platform, R: Runtime<P::Element>> WidgetElement<P, R> {
    fn new(definition: Rc<Definition<P, R>>, host: P::Element) -> Self {
        Self {
            definition,
            host,
            target: None,
            explicit: Props::new(),
            props: Props::new(),
            connected: false,
            rendered: false,
        }
    }

    fn refresh_props(&mut self, platform: &P) {
        let mut defaults = self.definition.defaults.clone();
        props::merge(&mut defaults, self.explicit.clone());
        self.props = props::collect(platform, &self.host, &defaults);
    }

    fn ensure_target(&mut self, platform: &P) -> Result<P::Element, EmbedError> {
        if let Some(target) = &self.target {
            return Ok(target.clone());
        }
        let target = match &self.definition.shadow {
            Some(options) => match platform.shadow_root(&self.host) {
                Some(existing) => existing,
                None => platform.attach_shadow(&self.host, options)?,
            },
            None => self.host.clone(),
        };
        self.target = Some(target.clone());
        Ok(target)
    }

    fn render(&mut self, platform: &P) {
        let target = match self.ensure_target(platform) {
            Ok(target) => target,
            Err(e) => {
                tracing::error!(host = ?self.host, "Cannot render custom element: {e}");
                return;
            }
        };

        let tree = (self.definition.component)(&self.props);
        if self.definition.hydrate && !self.rendered {
            self.definition.runtime.hydrate(&tree, &target);
        } else {
            self.definition.runtime.render(Some(&tree), &target);
        }
        self.rendered = true;
    }
}

impl<P: Platform, R: Runtime<P::Element>> CustomElement for WidgetElement<P, R> {
    fn connect(&mut self) {
        let Some(platform) = self.definition.platform.upgrade() else {
            return;
        };
        self.connected = true;
        self.refresh_props(&platform);
        self.render(&platform);
    }

    fn disconnect(&mut self) {
        self.connected = false;
        if let Some(target) = &self.target {
            self.definition.runtime.render(None, target);
        }
    }

    fn attribute_changed(&mut self, name: &str, old: Option<&str>, new: Option<&str>) {
        if old == new {
            return;
        }
        let Some(platform) = self.definition.platform.upgrade() else {
            return;
        };
        tracing::trace!(host = ?self.host, "Tracked attribute `{name}` changed");
        self.refresh_props(&platform);
        if self.connected {
            self.render(&platform);
        }
    }

    fn set_props(&mut self, props: Props) {
        props::merge(&mut self.explicit, props);
        let Some(platform) = self.definition.platform.upgrade() else {
            return;
        };
        self.refresh_props(&platform);
        if self.connected {
            self.render(&platform);
        }
    }

    fn props(&self) -> Props {
        self.props.clone()
    }
}
