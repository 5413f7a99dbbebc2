//! Mounting, updating and unmounting widgets on host elements.
//!
//! [`embed`] turns a component into a factory. Every call to [`Embed::render`] resolves
//! hosts and mounts one [`WidgetInstance`] per host, in these steps:
//!
//! 1. Force-unmount whatever already lives on the host.
//! 2. Collect props from markup over the defaults (and per-call overrides).
//! 3. Let the before-mount hook replace them.
//! 4. Optionally clean the host, keeping props blocks so props can be re-collected.
//! 5. Pick the render target: the host, or a shadow root attached to it.
//! 6. Activate (render or hydrate) now, or on first qualifying visibility event.
//! 7. Record the host's bookkeeping and register the instance.
//! 8. Run the after-mount hook.
//!
//! A factory's registry always holds exactly the instances whose host bookkeeping
//! names that factory as owner.

use core::{
    cell::{Cell, RefCell},
    fmt::{self, Debug},
    hash::Hash,
};
use std::rc::{Rc, Weak};

use uuid::Uuid;
use waterui_embed_core::{
    EmbedError, Platform, Props, Runtime, VisibilityCallback, VisibilityObserver,
    VisibilityOptions, props,
};

use crate::{
    config::{EmbedConfig, Hooks},
    custom_element, host,
    meta::{self, HostMeta},
};

/// A component: a function from props to a tree the runtime can render.
pub type Component<T> = Rc<dyn Fn(&Props) -> T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    /// Waiting for the visibility predicate.
    Pending,
    /// Rendered at least once.
    Active,
    /// Removed from its registry.
    Unmounted,
}

trait Lifecycle<E> {
    fn update(&self, instance: &WidgetInstance<E>, partial: Props);
    fn unmount(&self, instance: &WidgetInstance<E>);
}

struct InstanceState<E> {
    id: Uuid,
    host: E,
    target: E,
    props: RefCell<Props>,
    activation: Cell<Activation>,
    observer: RefCell<Option<Box<dyn VisibilityObserver>>>,
    hooks: Hooks<E>,
    lifecycle: Weak<dyn Lifecycle<E>>,
}

impl<E> InstanceState<E> {
    fn take_observer(&self) {
        let observer = self.observer.borrow_mut().take();
        if let Some(mut observer) = observer {
            observer.disconnect();
        }
    }

    /// Moves a pending instance to active. Returns `false` if it was not pending.
    fn begin_activation(&self) -> bool {
        if self.activation.get() != Activation::Pending {
            return false;
        }
        self.activation.set(Activation::Active);
        self.take_observer();
        true
    }

    /// Keeps `observer` while activation is pending, otherwise disconnects it right away.
    fn park(&self, mut observer: Box<dyn VisibilityObserver>) {
        if self.activation.get() == Activation::Pending {
            *self.observer.borrow_mut() = Some(observer);
        } else {
            observer.disconnect();
        }
    }

    fn retire(&self) {
        self.activation.set(Activation::Unmounted);
        self.take_observer();
    }
}

/// A widget mounted on one host element.
///
/// This is a cheap handle; clones refer to the same instance.
pub struct WidgetInstance<E> {
    state: Rc<InstanceState<E>>,
}

impl<E> Clone for WidgetInstance<E> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<E> PartialEq for WidgetInstance<E> {
    fn eq(&self, other: &Self) -> bool {
        self.state.id == other.state.id
    }
}

impl<E> Eq for WidgetInstance<E> {}

impl<E: Debug> Debug for WidgetInstance<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetInstance")
            .field("id", &self.state.id)
            .field("host", &self.state.host)
            .field("activation", &self.state.activation.get())
            .finish_non_exhaustive()
    }
}

impl<E> WidgetInstance<E> {
    /// Process-unique identifier of this instance.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.state.id
    }

    /// The host element this instance owns.
    #[must_use]
    pub fn host(&self) -> &E {
        &self.state.host
    }

    /// The node the runtime renders into.
    #[must_use]
    pub fn target(&self) -> &E {
        &self.state.target
    }

    /// A snapshot of the current props.
    #[must_use]
    pub fn props(&self) -> Props {
        self.state.props.borrow().clone()
    }

    /// Returns `true` once the instance has rendered and until it is unmounted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.activation.get() == Activation::Active
    }

    /// Returns `true` while activation waits for the host to become visible.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.activation.get() == Activation::Pending
    }

    /// Merges `partial` over the current props and re-renders.
    ///
    /// Hooks do not run and markup is not re-read. Has no effect after unmount. Before
    /// a deferred activation fires, only the props are merged.
    pub fn update(&self, partial: Props) {
        if let Some(lifecycle) = self.state.lifecycle.upgrade() {
            lifecycle.update(self, partial);
        }
    }
}

impl<E: Eq + Hash + 'static> WidgetInstance<E> {
    /// Returns `true` while this instance owns its host.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        meta::owner(&self.state.host).is_some_and(|(_, instance)| instance == self.state.id)
    }

    /// Unmounts the instance. Calling this again, or after the factory already
    /// unmounted it, does nothing.
    pub fn unmount(&self) {
        if let Some(lifecycle) = self.state.lifecycle.upgrade() {
            lifecycle.unmount(self);
        } else {
            // The factory is gone; release the host without a runtime.
            self.state.retire();
            meta::remove_owned(&self.state.host, self.state.id);
        }
    }
}

struct EmbedInner<P: Platform, R: Runtime<P::Element>> {
    id: Uuid,
    this: Weak<Self>,
    platform: Rc<P>,
    runtime: Rc<R>,
    component: Component<R::Tree>,
    config: RefCell<Rc<EmbedConfig<P::Element>>>,
    registry: RefCell<Vec<WidgetInstance<P::Element>>>,
}

impl<P: Platform, R: Runtime<P::Element>> EmbedInner<P, R> {
    fn lifecycle(&self) -> Weak<dyn Lifecycle<P::Element>> {
        self.this.clone()
    }

    fn owns(&self, instance: &WidgetInstance<P::Element>) -> bool {
        self.registry.borrow().contains(instance)
    }

    fn registered(&self, id: Uuid) -> Option<WidgetInstance<P::Element>> {
        self.registry
            .borrow()
            .iter()
            .find(|instance| instance.id() == id)
            .cloned()
    }

    fn mount(
        &self,
        host: &P::Element,
        overrides: Option<Props>,
        config: &EmbedConfig<P::Element>,
    ) -> Result<WidgetInstance<P::Element>, EmbedError> {
        if let Some(previous) = meta::unmount_handle(host) {
            tracing::warn!(?host, "Host already carries a widget, unmounting it first");
            previous();
        }

        let options = config.options();
        let hooks = config.hooks();

        let mut defaults = options.default_props.clone();
        if let Some(overrides) = overrides {
            props::merge(&mut defaults, overrides);
        }
        let mut props = props::collect(&*self.platform, host, &defaults);

        if let Some(before_mount) = &hooks.before_mount
            && let Some(replacement) = before_mount(host, &props)
        {
            props = replacement;
        }

        if options.clean {
            self.clean(host);
        }

        let target = match options.isolation() {
            Some(shadow) => match self.platform.shadow_root(host) {
                Some(existing) => existing,
                None => self.platform.attach_shadow(host, &shadow)?,
            },
            None => host.clone(),
        };

        // Hooks run by the forced unmount may have mounted the host again.
        while let Some((owner, current)) = meta::owner(host) {
            if owner == self.id
                && let Some(existing) = self.registered(current)
            {
                tracing::debug!(
                    ?host,
                    id = %current,
                    "Host was remounted while unmounting, keeping that widget"
                );
                return Ok(existing);
            }
            let Some(previous) = meta::unmount_handle(host) else {
                break;
            };
            tracing::warn!(
                ?host,
                "Host was claimed by another factory during mount, unmounting it"
            );
            previous();
        }

        let visibility = options.visibility();
        let instance = WidgetInstance {
            state: Rc::new(InstanceState {
                id: Uuid::new_v4(),
                host: host.clone(),
                target: target.clone(),
                props: RefCell::new(props),
                activation: Cell::new(if visibility.is_some() {
                    Activation::Pending
                } else {
                    Activation::Active
                }),
                observer: RefCell::new(None),
                hooks: hooks.clone(),
                lifecycle: self.lifecycle(),
            }),
        };

        let handle = instance.clone();
        meta::insert(
            host,
            HostMeta {
                owner: self.id,
                instance: instance.id(),
                target,
                tree: None,
                unmount: Rc::new(move || handle.unmount()),
            },
        );

        if let Some(visibility) = visibility {
            if let Err(e) = self.defer(&instance, &visibility, options.hydrate) {
                instance.state.retire();
                meta::remove_owned(host, instance.id());
                return Err(e);
            }
            self.registry.borrow_mut().push(instance.clone());
        } else {
            self.registry.borrow_mut().push(instance.clone());
            self.activate(&instance, options.hydrate);
        }

        tracing::debug!(?host, id = %instance.id(), "Mounted widget");

        if let Some(mounted) = &hooks.mounted {
            mounted(&instance);
        }

        Ok(instance)
    }

    fn clean(&self, host: &P::Element) {
        for child in self.platform.children(host) {
            if !props::is_data_block(&*self.platform, &child) {
                self.platform.remove_child(host, &child);
            }
        }
    }

    fn defer(
        &self,
        instance: &WidgetInstance<P::Element>,
        visibility: &VisibilityOptions,
        hydrate: bool,
    ) -> Result<(), EmbedError> {
        let state = Rc::downgrade(&instance.state);
        let this = self.this.clone();
        let predicate = visibility.clone();

        let callback: VisibilityCallback = Box::new(move |entry| {
            if !predicate.is_satisfied(&entry) {
                return;
            }
            let Some(state) = state.upgrade() else {
                return;
            };
            if !state.begin_activation() {
                return;
            }
            if let Some(this) = this.upgrade() {
                this.activate(&WidgetInstance { state }, hydrate);
            }
        });

        let observer = self
            .platform
            .observe_visibility(instance.host(), visibility, callback)?;
        instance.state.park(observer);
        Ok(())
    }

    fn activate(&self, instance: &WidgetInstance<P::Element>, hydrate: bool) {
        let tree = (self.component)(&instance.props());
        if hydrate {
            self.runtime.hydrate(&tree, instance.target());
        } else {
            self.runtime.render(Some(&tree), instance.target());
        }
        meta::set_tree(instance.host(), instance.id(), Rc::new(tree));
    }
}

impl<P: Platform, R: Runtime<P::Element>> Lifecycle<P::Element> for EmbedInner<P, R> {
    fn update(&self, instance: &WidgetInstance<P::Element>, partial: Props) {
        if !self.owns(instance) {
            tracing::debug!(id = %instance.id(), "Ignoring update of an unmounted widget");
            return;
        }

        props::merge(&mut instance.state.props.borrow_mut(), partial);

        if instance.is_active() {
            let tree = (self.component)(&instance.props());
            self.runtime.render(Some(&tree), instance.target());
            meta::set_tree(instance.host(), instance.id(), Rc::new(tree));
        }
    }

    fn unmount(&self, instance: &WidgetInstance<P::Element>) {
        let removed = {
            let mut registry = self.registry.borrow_mut();
            registry
                .iter()
                .position(|candidate| candidate == instance)
                .map(|index| registry.remove(index))
        };
        let Some(instance) = removed else {
            return;
        };

        instance.state.retire();
        self.runtime.render(None, instance.target());
        meta::remove_owned(instance.host(), instance.id());

        tracing::debug!(host = ?instance.host(), id = %instance.id(), "Unmounted widget");

        if let Some(on_unmount) = &instance.state.hooks.unmount {
            on_unmount(&instance);
        }
    }
}

/// A component bound to a platform and runtime, plus the instances it has mounted.
pub struct Embed<P: Platform, R: Runtime<P::Element>> {
    inner: Rc<EmbedInner<P, R>>,
}

impl<P: Platform, R: Runtime<P::Element>> Clone for Embed<P, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: Platform, R: Runtime<P::Element>> Debug for Embed<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embed")
            .field("id", &self.inner.id)
            .field("instances", &self.inner.registry.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Binds `component` to a platform and runtime.
///
/// ```
/// use std::rc::Rc;
/// use waterui_embed::{EmbedConfig, embed, mock::{MockPlatform, RecordingRuntime}};
///
/// let platform = Rc::new(MockPlatform::new());
/// let body = platform.body();
/// let host = platform.create_element("div", &body);
/// platform.set_attribute(&host, "class", "greeting");
/// platform.set_attribute(&host, "data-prop-name", "World");
///
/// let runtime = Rc::new(RecordingRuntime::new());
/// let widget = embed(platform, runtime.clone(), |props| props.clone());
/// let instances = widget.render(EmbedConfig::new().selector(".greeting")).unwrap();
///
/// assert_eq!(instances.len(), 1);
/// assert_eq!(instances[0].props()["name"], "World");
/// assert_eq!(runtime.calls().len(), 1);
/// ```
pub fn embed<P, R, F>(platform: Rc<P>, runtime: Rc<R>, component: F) -> Embed<P, R>
where
    P: Platform,
    R: Runtime<P::Element>,
    F: Fn(&Props) -> R::Tree + 'static,
{
    Embed {
        inner: Rc::new_cyclic(|this| EmbedInner {
            id: Uuid::new_v4(),
            this: this.clone(),
            platform,
            runtime,
            component: Rc::new(component),
            config: RefCell::new(Rc::new(EmbedConfig::new())),
            registry: RefCell::new(Vec::new()),
        }),
    }
}

impl<P: Platform, R: Runtime<P::Element>> Embed<P, R> {
    /// Mounts into every host `config` designates, or registers a custom element if
    /// it names a tag.
    ///
    /// The configuration becomes the one [`Embed::render_one`] uses.
    ///
    /// # Errors
    ///
    /// Returns the first platform failure (shadow attachment, missing visibility
    /// observation, custom element registration). Hosts mounted before the failure
    /// stay mounted.
    pub fn render(
        &self,
        config: EmbedConfig<P::Element>,
    ) -> Result<Vec<WidgetInstance<P::Element>>, EmbedError> {
        let config = Rc::new(config);
        let previous = self.inner.config.replace(Rc::clone(&config));
        drop(previous);

        if let Some(tag_name) = &config.options().tag_name {
            custom_element::register(
                &self.inner.platform,
                Rc::clone(&self.inner.runtime),
                Rc::clone(&self.inner.component),
                tag_name,
                config.options(),
            )?;
            return Ok(Vec::new());
        }

        let hosts = host::resolve(&*self.inner.platform, config.options());
        tracing::debug!(count = hosts.len(), "Resolved host elements");

        hosts
            .iter()
            .map(|host| self.inner.mount(host, None, &config))
            .collect()
    }

    /// Mounts onto a single host with the most recent configuration.
    ///
    /// `overrides` take precedence over the configured defaults; markup still wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to attach a shadow root or observe
    /// visibility.
    pub fn render_one(
        &self,
        host: &P::Element,
        overrides: Option<Props>,
    ) -> Result<WidgetInstance<P::Element>, EmbedError> {
        let config = Rc::clone(&self.inner.config.borrow());
        self.inner.mount(host, overrides, &config)
    }

    /// Unmounts every instance this factory currently holds.
    pub fn unmount_all(&self) {
        let snapshot = self.inner.registry.borrow().clone();
        for instance in &snapshot {
            self.inner.unmount(instance);
        }
    }

    /// A snapshot of the live instances, in mount order.
    #[must_use]
    pub fn instances(&self) -> Vec<WidgetInstance<P::Element>> {
        self.inner.registry.borrow().clone()
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Returns `true` if nothing is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.borrow().is_empty()
    }

    /// Returns the instance mounted on `host` by this factory.
    #[must_use]
    pub fn instance_for(&self, host: &P::Element) -> Option<WidgetInstance<P::Element>> {
        self.inner
            .registry
            .borrow()
            .iter()
            .find(|instance| instance.host() == host)
            .cloned()
    }

    /// The platform this factory mounts into.
    #[must_use]
    pub fn platform(&self) -> &Rc<P> {
        &self.inner.platform
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use serde_json::json;
    use waterui_embed_core::{EmbedError, ShadowMode, ShadowOptions, VisibilityEntry};

    use super::*;
    use crate::mock::{MockElement, MockPlatform, RecordingRuntime, RenderCall};

    type TestEmbed = Embed<MockPlatform, RecordingRuntime>;

    fn props(value: serde_json::Value) -> Props {
        value.as_object().cloned().unwrap()
    }

    fn setup(hosts: usize) -> (Rc<MockPlatform>, Rc<RecordingRuntime>, TestEmbed, Vec<MockElement>) {
        let platform = Rc::new(MockPlatform::new());
        let body = platform.body();
        let elements = (0..hosts)
            .map(|_| {
                let host = platform.create_element("div", &body);
                platform.add_class(&host, "widget");
                host
            })
            .collect();
        let runtime = Rc::new(RecordingRuntime::new());
        let widget = embed(Rc::clone(&platform), Rc::clone(&runtime), Props::clone);
        (platform, runtime, widget, elements)
    }

    #[test]
    fn render_mounts_every_resolved_host() {
        let (_platform, runtime, widget, hosts) = setup(2);
        let instances = widget
            .render(EmbedConfig::new().selector(".widget"))
            .unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(widget.len(), 2);
        assert_eq!(runtime.calls().len(), 2);
        for (instance, host) in instances.iter().zip(&hosts) {
            assert_eq!(instance.host(), host);
            assert_eq!(instance.target(), host);
            assert!(instance.is_active());
            assert!(instance.is_mounted());
        }
    }

    #[test]
    fn props_follow_precedence() {
        let (platform, runtime, widget, hosts) = setup(1);
        let host = &hosts[0];
        platform.append_props_block(host, "text/props", r#"{"b":3,"c":4}"#);
        platform.set_attribute(host, "data-prop-c", "5");

        let instances = widget
            .render(
                EmbedConfig::new()
                    .selector(".widget")
                    .default_props(props(json!({ "a": 1, "b": 2 }))),
            )
            .unwrap();

        let expected = props(json!({ "a": 1, "b": 3, "c": 5 }));
        assert_eq!(instances[0].props(), expected);
        assert_eq!(
            runtime.calls(),
            vec![RenderCall::Render {
                target: *host,
                tree: Some(expected),
            }]
        );
    }

    #[test]
    fn overrides_beat_defaults_but_not_markup() {
        let (platform, _runtime, widget, hosts) = setup(1);
        let host = &hosts[0];
        platform.set_attribute(host, "data-prop-size", "large");

        widget
            .render(EmbedConfig::new().default_prop("size", "small").default_prop("tone", "calm"))
            .unwrap();
        let instance = widget
            .render_one(host, Some(props(json!({ "size": "medium", "tone": "loud" }))))
            .unwrap();

        assert_eq!(instance.props(), props(json!({ "size": "large", "tone": "loud" })));
    }

    #[test]
    fn before_mount_hook_replaces_props() {
        let (_platform, runtime, widget, _hosts) = setup(1);
        let instances = widget
            .render(
                EmbedConfig::new()
                    .selector(".widget")
                    .default_prop("a", 1)
                    .on_before_mount(|_, _| Some(props(json!({ "replaced": true })))),
            )
            .unwrap();

        assert_eq!(instances[0].props(), props(json!({ "replaced": true })));
        assert!(matches!(
            &runtime.calls()[0],
            RenderCall::Render { tree: Some(tree), .. } if tree == &props(json!({ "replaced": true })),
        ));
    }

    #[test]
    fn before_mount_hook_returning_none_keeps_props() {
        let (_platform, _runtime, widget, _hosts) = setup(1);
        let instances = widget
            .render(
                EmbedConfig::new()
                    .selector(".widget")
                    .default_prop("a", 1)
                    .on_before_mount(|_, _| None),
            )
            .unwrap();
        assert_eq!(instances[0].props(), props(json!({ "a": 1 })));
    }

    #[test]
    fn mounting_twice_keeps_one_instance() {
        let (_platform, runtime, widget, hosts) = setup(1);
        let unmounts = Rc::new(Cell::new(0));
        let config = EmbedConfig::new().selector(".widget").on_unmount({
            let unmounts = Rc::clone(&unmounts);
            move |_| unmounts.set(unmounts.get() + 1)
        });

        let first = widget.render(config.clone()).unwrap();
        let second = widget.render(config).unwrap();

        assert_eq!(widget.len(), 1);
        assert_eq!(unmounts.get(), 1);
        assert!(!first[0].is_mounted());
        assert!(second[0].is_mounted());
        assert_eq!(widget.instance_for(&hosts[0]), Some(second[0].clone()));
        assert!(runtime.calls().contains(&RenderCall::Render {
            target: hosts[0],
            tree: None,
        }));
    }

    type Slot = Rc<RefCell<Option<TestEmbed>>>;

    fn remounting(slot: &Slot) -> EmbedConfig<MockElement> {
        let slot = Rc::clone(slot);
        EmbedConfig::new().selector(".widget").on_unmount(move |instance| {
            let target = slot.borrow().clone();
            if let Some(target) = target {
                target.render_one(instance.host(), None).unwrap();
            }
        })
    }

    #[test]
    fn remount_from_unmount_hook_keeps_one_instance() {
        let (_platform, _runtime, widget, hosts) = setup(1);
        let slot: Slot = Rc::default();
        *slot.borrow_mut() = Some(widget.clone());

        let first = widget.render(remounting(&slot)).unwrap();
        let second = widget.render(remounting(&slot)).unwrap();
        slot.borrow_mut().take();

        assert_eq!(widget.len(), 1);
        assert!(!first[0].is_mounted());
        assert!(second[0].is_mounted());
        assert_eq!(widget.instances(), second);
        assert_eq!(
            meta::owner(&hosts[0]).map(|(_, instance)| instance),
            Some(second[0].id())
        );

        widget.unmount_all();
        assert!(!meta::is_mounted(&hosts[0]));
    }

    #[test]
    fn remount_by_another_factory_during_mount_is_evicted() {
        let (platform, runtime, widget, hosts) = setup(1);
        let other = embed(Rc::clone(&platform), Rc::clone(&runtime), Props::clone);
        let slot: Slot = Rc::default();
        *slot.borrow_mut() = Some(other.clone());

        widget.render(remounting(&slot)).unwrap();
        let current = widget.render(EmbedConfig::new().selector(".widget")).unwrap();
        slot.borrow_mut().take();

        assert!(other.is_empty());
        assert_eq!(widget.len(), 1);
        assert!(current[0].is_mounted());
        assert_eq!(widget.instance_for(&hosts[0]), Some(current[0].clone()));
    }

    #[test]
    fn remount_from_another_factory_evicts_the_owner() {
        let (platform, runtime, first, hosts) = setup(1);
        let second = embed(Rc::clone(&platform), Rc::clone(&runtime), Props::clone);

        first.render(EmbedConfig::new().selector(".widget")).unwrap();
        second.render_one(&hosts[0], None).unwrap();

        assert!(first.is_empty());
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn unmount_is_idempotent() {
        let (_platform, runtime, widget, hosts) = setup(1);
        let unmounts = Rc::new(Cell::new(0));
        let instances = widget
            .render(EmbedConfig::new().selector(".widget").on_unmount({
                let unmounts = Rc::clone(&unmounts);
                move |instance| {
                    assert!(!instance.is_mounted());
                    unmounts.set(unmounts.get() + 1);
                }
            }))
            .unwrap();

        instances[0].unmount();
        instances[0].unmount();

        assert_eq!(unmounts.get(), 1);
        assert!(widget.is_empty());
        assert!(!meta::is_mounted(&hosts[0]));
        let empty_renders = runtime
            .calls()
            .into_iter()
            .filter(|call| matches!(call, RenderCall::Render { tree: None, .. }))
            .count();
        assert_eq!(empty_renders, 1);
    }

    #[test]
    fn unmount_all_empties_the_registry() {
        let (_platform, _runtime, widget, hosts) = setup(3);
        widget.render(EmbedConfig::new().selector(".widget")).unwrap();
        assert_eq!(widget.len(), 3);

        widget.unmount_all();

        assert!(widget.is_empty());
        assert!(hosts.iter().all(|host| !meta::is_mounted(host)));
    }

    #[test]
    fn mounted_hook_sees_registered_instance() {
        let (_platform, _runtime, widget, _hosts) = setup(1);
        let seen = Rc::new(Cell::new(false));
        let inner = widget.clone();
        widget
            .render(EmbedConfig::new().selector(".widget").on_mounted({
                let seen = Rc::clone(&seen);
                move |instance| seen.set(inner.instances().contains(instance))
            }))
            .unwrap();
        assert!(seen.get());
    }

    #[test]
    fn update_merges_and_rerenders_without_hooks() {
        let (platform, runtime, widget, hosts) = setup(1);
        platform.set_attribute(&hosts[0], "data-prop-count", "1");
        let mounts = Rc::new(Cell::new(0));
        let instances = widget
            .render(EmbedConfig::new().selector(".widget").on_mounted({
                let mounts = Rc::clone(&mounts);
                move |_| mounts.set(mounts.get() + 1)
            }))
            .unwrap();

        platform.set_attribute(&hosts[0], "data-prop-count", "9");
        instances[0].update(props(json!({ "count": 2, "label": "x" })));

        assert_eq!(mounts.get(), 1);
        assert_eq!(instances[0].props(), props(json!({ "count": 2, "label": "x" })));
        assert_eq!(runtime.calls().len(), 2);
        assert_eq!(
            meta::rendered_tree::<_, Props>(&hosts[0]).as_deref(),
            Some(&props(json!({ "count": 2, "label": "x" })))
        );
    }

    #[test]
    fn update_after_unmount_is_ignored() {
        let (_platform, runtime, widget, _hosts) = setup(1);
        let instances = widget.render(EmbedConfig::new().selector(".widget")).unwrap();
        instances[0].unmount();
        let calls = runtime.calls().len();

        instances[0].update(props(json!({ "late": true })));

        assert_eq!(runtime.calls().len(), calls);
    }

    #[test]
    fn clean_keeps_props_blocks() {
        let (platform, _runtime, widget, hosts) = setup(1);
        let host = &hosts[0];
        let placeholder = platform.create_element("p", host);
        let block = platform.append_props_block(host, "application/json", r#"{"a":1}"#);

        let instances = widget
            .render(EmbedConfig::new().selector(".widget").clean(true))
            .unwrap();

        assert_eq!(platform.children(host), vec![block]);
        assert!(platform.parent(&placeholder).is_none());
        assert_eq!(instances[0].props(), props(json!({ "a": 1 })));
    }

    #[test]
    fn shadow_root_becomes_the_target() {
        let (platform, runtime, widget, hosts) = setup(1);
        let instances = widget
            .render(EmbedConfig::new().selector(".widget").shadow_options(ShadowOptions {
                mode: ShadowMode::Closed,
                delegates_focus: false,
            }))
            .unwrap();

        let shadow = platform.shadow_root(&hosts[0]).unwrap();
        assert_eq!(instances[0].target(), &shadow);
        assert_eq!(platform.shadow_mode(&hosts[0]), Some(ShadowMode::Closed));
        assert!(matches!(runtime.calls()[0], RenderCall::Render { target, .. } if target == shadow));
    }

    #[test]
    fn remount_reuses_existing_shadow_root() {
        let (platform, _runtime, widget, hosts) = setup(1);
        let config = EmbedConfig::new().selector(".widget").shadow_root(true);
        let first = widget.render(config.clone()).unwrap();
        let second = widget.render(config).unwrap();

        assert_eq!(first[0].target(), second[0].target());
        assert_eq!(platform.shadow_root(&hosts[0]).as_ref(), Some(second[0].target()));
    }

    #[test]
    fn hydrate_uses_hydrate_primitive() {
        let (_platform, runtime, widget, hosts) = setup(1);
        widget
            .render(EmbedConfig::new().selector(".widget").hydrate(true))
            .unwrap();
        assert_eq!(
            runtime.calls(),
            vec![RenderCall::Hydrate {
                target: hosts[0],
                tree: Props::new(),
            }]
        );
    }

    #[test]
    fn lazy_activation_waits_for_visibility() {
        let (platform, runtime, widget, hosts) = setup(1);
        let host = hosts[0];
        let instances = widget
            .render(EmbedConfig::new().selector(".widget").lazy(true))
            .unwrap();
        let instance = &instances[0];

        assert!(instance.is_pending());
        assert!(instance.is_mounted());
        assert!(runtime.calls().is_empty());
        assert_eq!(platform.observer_count(&host), 1);

        assert_eq!(platform.fire_visibility(&host, VisibilityEntry::hidden()), 1);
        assert!(runtime.calls().is_empty());

        assert_eq!(platform.fire_visibility(&host, VisibilityEntry::visible()), 1);
        assert_eq!(runtime.calls().len(), 1);
        assert!(instance.is_active());
        assert_eq!(platform.observer_count(&host), 0);

        assert_eq!(platform.fire_visibility(&host, VisibilityEntry::visible()), 0);
        assert_eq!(runtime.calls().len(), 1);
    }

    #[test]
    fn lazy_threshold_comes_from_configuration() {
        let (platform, runtime, widget, hosts) = setup(1);
        widget
            .render(EmbedConfig::new().selector(".widget").lazy_options(VisibilityOptions {
                threshold: 0.5,
                root_margin: "100px".into(),
            }))
            .unwrap();

        assert_eq!(
            platform.observed_options(&hosts[0]).map(|o| o.root_margin),
            Some("100px".to_string())
        );
        platform.fire_visibility(
            &hosts[0],
            VisibilityEntry {
                is_intersecting: true,
                ratio: 0.2,
            },
        );
        assert!(runtime.calls().is_empty());
        platform.fire_visibility(
            &hosts[0],
            VisibilityEntry {
                is_intersecting: true,
                ratio: 0.6,
            },
        );
        assert_eq!(runtime.calls().len(), 1);
    }

    #[test]
    fn lazy_activation_renders_props_merged_while_pending() {
        let (platform, runtime, widget, hosts) = setup(1);
        let instances = widget
            .render(EmbedConfig::new().selector(".widget").lazy(true))
            .unwrap();

        instances[0].update(props(json!({ "early": 1 })));
        assert!(runtime.calls().is_empty());

        platform.fire_visibility(&hosts[0], VisibilityEntry::visible());
        assert_eq!(
            runtime.calls(),
            vec![RenderCall::Render {
                target: hosts[0],
                tree: Some(props(json!({ "early": 1 }))),
            }]
        );
    }

    #[test]
    fn unmount_cancels_pending_observation() {
        let (platform, runtime, widget, hosts) = setup(1);
        let instances = widget
            .render(EmbedConfig::new().selector(".widget").lazy(true))
            .unwrap();

        instances[0].unmount();
        assert_eq!(platform.observer_count(&hosts[0]), 0);

        platform.fire_visibility(&hosts[0], VisibilityEntry::visible());
        assert_eq!(
            runtime.calls(),
            vec![RenderCall::Render {
                target: hosts[0],
                tree: None,
            }]
        );
    }

    #[test]
    fn missing_visibility_observer_is_a_hard_failure() {
        let (platform, runtime, widget, hosts) = setup(1);
        platform.set_visibility_supported(false);

        let result = widget.render(EmbedConfig::new().selector(".widget").lazy(true));

        assert_eq!(result.unwrap_err(), EmbedError::VisibilityUnavailable);
        assert!(widget.is_empty());
        assert!(!meta::is_mounted(&hosts[0]));
        assert!(runtime.calls().is_empty());
    }

    #[test]
    fn dropped_factory_still_releases_host() {
        let (_platform, _runtime, widget, hosts) = setup(1);
        let instances = widget.render(EmbedConfig::new().selector(".widget")).unwrap();
        // Keep the mounted handle, drop every factory handle.
        drop(widget);

        instances[0].unmount();
        assert!(!meta::is_mounted(&hosts[0]));
    }
}
