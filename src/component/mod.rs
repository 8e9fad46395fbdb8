//! Components
//!
//! A component position is driven by a [`Component`] object created from its
//! [`ComponentType`]. Function components are plain closures wrapped in an
//! internal adapter; class components implement the full lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//! mount:   initial_state → derived_state_from_props → will_mount → render → did_mount
//! update:  will_receive_props → derived_state_from_props → should_update
//!          → will_update → render → snapshot_before_update → did_update
//! unmount: will_unmount
//! errors:  state_from_error → catch_error (on the nearest willing ancestor)
//! ```

mod context;
mod instance;
mod suspense;

pub use context::{Context, ContextId, ProvidedContext, Subscribers, create_context};
pub use instance::{Snapshot, StateUpdate, Updater};
pub use suspense::Suspension;

pub(crate) use context::{ContextMap, ContextSlot, unsubscribe};
pub(crate) use instance::{Callback, InstanceBits, InstanceShared};

use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;

use crate::error::{Interrupt, RenderError, RenderResult};
use crate::node::{Child, Props, State, Value};

/// Output of a render function.
pub type Rendered = Result<Child, Interrupt>;

/// Answer of an error boundary offered a descendant's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boundary {
    /// Not handled here; keep walking up
    #[default]
    Declined,
    /// Handled; re-render this boundary
    Caught,
}

// =============================================================================
// Component
// =============================================================================

/// A stateful component object.
///
/// Only [`Component::render`] is required. Every other hook defaults to a
/// no-op that keeps the engine's standard behavior.
pub trait Component: 'static {
    fn render(&mut self, props: &Props, state: &State, scope: &RenderScope<'_>) -> Rendered;

    /// State before the first render.
    fn initial_state(&self, _props: &Props) -> State {
        State::new()
    }

    /// Partial state derived from incoming props, merged before each render.
    fn derived_state_from_props(&self, _props: &Props, _state: &State) -> Option<State> {
        None
    }

    /// Before the first render. `updater` is live from here on.
    fn will_mount(&mut self, _updater: &Updater) {}

    fn did_mount(&mut self) -> RenderResult<()> {
        Ok(())
    }

    /// New props arrived from the parent (not called for self-initiated renders).
    fn will_receive_props(&mut self, _next_props: &Props, _context: &Value) {}

    /// Return `false` to skip this render. Forced renders never ask.
    fn should_update(&mut self, _props: &Props, _next_props: &Props, _next_state: &State) -> bool {
        true
    }

    fn will_update(&mut self, _next_props: &Props, _next_state: &State) {}

    /// Captured right after render, handed to [`Component::did_update`].
    fn snapshot_before_update(&mut self, _prev_props: &Props, _prev_state: &State) -> Option<Snapshot> {
        None
    }

    fn did_update(&mut self, _prev_props: &Props, _prev_state: &State, _snapshot: Option<Snapshot>) -> RenderResult<()> {
        Ok(())
    }

    fn will_unmount(&mut self) -> RenderResult<()> {
        Ok(())
    }

    /// Context value this instance provides to its subtree.
    fn provided_context(&self) -> Option<ProvidedContext> {
        None
    }

    /// Fallback state for a descendant's error.
    fn state_from_error(&self, _error: &RenderError) -> Option<State> {
        None
    }

    /// Handle a descendant's error. Reporting [`Boundary::Caught`] or
    /// scheduling new state through `updater` both count as handled.
    fn catch_error(&mut self, _error: &RenderError, _updater: &Updater) -> RenderResult<Boundary> {
        Ok(Boundary::Declined)
    }
}

// =============================================================================
// RenderScope
// =============================================================================

/// What a render function may reach besides its props.
pub struct RenderScope<'a> {
    updater: &'a Updater,
    context: &'a Value,
}

impl<'a> RenderScope<'a> {
    pub(crate) fn new(updater: &'a Updater, context: &'a Value) -> Self {
        Self { updater, context }
    }

    /// Handle for scheduling updates, e.g. from event handlers.
    #[inline]
    pub fn updater(&self) -> &Updater {
        self.updater
    }

    /// Value of the context this component type consumes, or `Null`.
    #[inline]
    pub fn context(&self) -> &Value {
        self.context
    }

    /// Current local state.
    pub fn state(&self) -> State {
        self.updater.state()
    }

    /// Shorthand for `scope.updater().set_state(update)`.
    pub fn set_state(&self, update: impl Into<StateUpdate>) {
        self.updater.set_state(update);
    }

    pub fn props(&self) -> Props {
        self.updater.props()
    }
}

// =============================================================================
// ComponentType
// =============================================================================

type RenderFn = Rc<dyn Fn(&Props, &RenderScope<'_>) -> Rendered>;
type Factory = Rc<dyn Fn(&Props, &Value) -> Box<dyn Component>>;

#[derive(Clone)]
enum ComponentKind {
    Function(RenderFn),
    Class(Factory),
}

/// Consumed context declared by a component type.
#[derive(Clone)]
pub(crate) struct ContextLink {
    pub(crate) id: ContextId,
    pub(crate) default: Value,
}

struct ComponentDef {
    name: CompactString,
    kind: ComponentKind,
    context: Option<ContextLink>,
}

/// Identity of a component. Two types are equal iff they were created by the
/// same constructor call, so build them once and reuse them.
#[derive(Clone)]
pub struct ComponentType(Rc<ComponentDef>);

impl ComponentType {
    /// Stateless function component.
    pub fn function(name: impl Into<CompactString>, render: impl Fn(&Props, &RenderScope<'_>) -> Rendered + 'static) -> Self {
        Self::from_kind(name.into(), ComponentKind::Function(Rc::new(render)), None)
    }

    /// Class component built by `factory(props, context)` on mount.
    pub fn class(name: impl Into<CompactString>, factory: impl Fn(&Props, &Value) -> Box<dyn Component> + 'static) -> Self {
        Self::from_kind(name.into(), ComponentKind::Class(Rc::new(factory)), None)
    }

    /// Class component built with `C::default()`.
    pub fn of<C: Component + Default>(name: impl Into<CompactString>) -> Self {
        Self::class(name, |_, _| Box::new(C::default()))
    }

    /// Same component reading `context` (a new identity).
    #[must_use]
    pub fn with_context(self, context: &Context) -> Self {
        self.with_link(context.link())
    }

    pub(crate) fn with_link(self, link: ContextLink) -> Self {
        Self::from_kind(self.0.name.clone(), self.0.kind.clone(), Some(link))
    }

    fn from_kind(name: CompactString, kind: ComponentKind, context: Option<ContextLink>) -> Self {
        Self(Rc::new(ComponentDef { name, kind, context }))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Class components take part in `should_update` and receive the full lifecycle.
    #[inline]
    pub fn is_class(&self) -> bool {
        matches!(self.0.kind, ComponentKind::Class(_))
    }

    pub(crate) fn context_link(&self) -> Option<&ContextLink> {
        self.0.context.as_ref()
    }

    pub(crate) fn instantiate(&self, props: &Props, context: &Value) -> Box<dyn Component> {
        match &self.0.kind {
            ComponentKind::Function(render) => Box::new(FunctionComponent { render: render.clone() }),
            ComponentKind::Class(factory) => factory(props, context),
        }
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.0.name)
            .field("class", &self.is_class())
            .finish()
    }
}

/// Adapter running a render closure as a component.
struct FunctionComponent {
    render: RenderFn,
}

impl Component for FunctionComponent {
    fn render(&mut self, props: &Props, _state: &State, scope: &RenderScope<'_>) -> Rendered {
        (self.render)(props, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain;

    impl Component for Plain {
        fn render(&mut self, _: &Props, _: &State, _: &RenderScope<'_>) -> Rendered {
            Ok(Child::Empty)
        }
    }

    #[test]
    fn test_component_type_identity() {
        let a = ComponentType::function("A", |_, _| Ok(Child::Empty));
        let b = ComponentType::function("A", |_, _| Ok(Child::Empty));
        assert_eq!(a, a.clone());
        assert_ne!(a, b, "identity is per constructor call, not per name");
        assert!(!a.is_class());
        assert!(ComponentType::of::<Plain>("Plain").is_class());
    }

    #[test]
    fn test_with_context_is_new_identity() {
        let ctx = create_context(Value::from("light"));
        let base = ComponentType::of::<Plain>("Themed");
        let themed = base.clone().with_context(&ctx);
        assert_ne!(base, themed);
        assert_eq!(themed.name(), "Themed");
        assert!(themed.is_class());
        assert_eq!(themed.context_link().map(|l| l.default.clone()), Some(Value::from("light")));
    }

    #[test]
    fn test_default_hooks() {
        let mut plain = Plain;
        assert!(plain.should_update(&Props::new(), &Props::new(), &State::new()));
        assert!(plain.did_mount().is_ok());
        assert!(plain.provided_context().is_none());
        assert!(plain.state_from_error(&RenderError::component("X", "y")).is_none());
    }
}
