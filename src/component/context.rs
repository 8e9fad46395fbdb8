//! Ambient context
//!
//! A provider instance publishes its `value` prop to every descendant whose
//! component type consumes the same context. Consumers subscribe to the
//! nearest provider when they mount; when the provider's value changes it
//! force-updates every subscriber, so consumers below a component that bails
//! out of rendering still see the new value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use crate::error::RenderResult;
use crate::node::{Child, Props, State, VNode, Value, create_node};
use crate::tree::InstanceId;

use super::{Component, ComponentType, ContextLink, RenderScope, Rendered, Updater};

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Identity of one context created by [`create_context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

/// Consumers currently subscribed to a provider, in subscription order.
/// `None` once the provider has been torn down.
pub type Subscribers = Rc<RefCell<Option<Vec<(InstanceId, Updater)>>>>;

/// Context published by a component for its subtree.
#[derive(Clone)]
pub struct ProvidedContext {
    pub id: ContextId,
    pub subscribers: Subscribers,
}

impl fmt::Debug for ProvidedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvidedContext").field("id", &self.id).finish_non_exhaustive()
    }
}

// =============================================================================
// Context
// =============================================================================

/// Provider/consumer pair sharing one context identity.
#[derive(Clone)]
pub struct Context {
    id: ContextId,
    default: Value,
    provider: ComponentType,
    consumer: ComponentType,
}

/// Create a context whose consumers see `default` when no provider is above them.
pub fn create_context(default: impl Into<Value>) -> Context {
    let id = ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed));
    let default = default.into();
    let link = ContextLink {
        id,
        default: default.clone(),
    };

    let provider = ComponentType::class("Provider", move |_, _| {
        Box::new(Provider {
            id,
            subscribers: Rc::new(RefCell::new(Some(Vec::new()))),
        })
    });
    let consumer = ComponentType::function("Consumer", render_consumer).with_link(link);

    Context {
        id,
        default,
        provider,
        consumer,
    }
}

impl Context {
    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Provider component type. Reads its `value` prop.
    #[inline]
    pub fn provider(&self) -> &ComponentType {
        &self.provider
    }

    /// Consumer component type. Calls its `render` prop with the value.
    #[inline]
    pub fn consumer(&self) -> &ComponentType {
        &self.consumer
    }

    /// Provider node publishing `value` to `children`.
    pub fn provide(&self, value: impl Into<Value>, children: Vec<Child>) -> VNode {
        create_node(&self.provider, Props::new().with("value", value), children)
    }

    /// Consumer node rendering `render(value)`.
    pub fn consume(&self, render: impl Fn(&Value) -> Child + 'static) -> VNode {
        let render: ConsumerFn = Rc::new(render);
        create_node(&self.consumer, Props::new().with("render", Value::any(render)), Vec::<Child>::new())
    }

    pub(crate) fn link(&self) -> ContextLink {
        ContextLink {
            id: self.id,
            default: self.default.clone(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

type ConsumerFn = Rc<dyn Fn(&Value) -> Child>;

fn render_consumer(props: &Props, scope: &RenderScope<'_>) -> Rendered {
    let render = props.get("render").and_then(|v| v.downcast_ref::<ConsumerFn>());
    Ok(match render {
        Some(render) => render(scope.context()),
        None => Child::Empty,
    })
}

// =============================================================================
// Provider
// =============================================================================

struct Provider {
    id: ContextId,
    subscribers: Subscribers,
}

impl Component for Provider {
    fn render(&mut self, props: &Props, _state: &State, _scope: &RenderScope<'_>) -> Rendered {
        Ok(Child::List(props.children().to_vec()))
    }

    fn should_update(&mut self, props: &Props, next_props: &Props, _next_state: &State) -> bool {
        if props.get("value") != next_props.get("value") {
            let subscribers: Vec<Updater> = self
                .subscribers
                .borrow()
                .iter()
                .flatten()
                .map(|(_, updater)| updater.clone())
                .collect();
            for updater in subscribers {
                updater.force_update();
            }
        }
        true
    }

    fn will_unmount(&mut self) -> RenderResult<()> {
        *self.subscribers.borrow_mut() = None;
        Ok(())
    }

    fn provided_context(&self) -> Option<ProvidedContext> {
        Some(ProvidedContext {
            id: self.id,
            subscribers: self.subscribers.clone(),
        })
    }
}

// =============================================================================
// ContextMap
// =============================================================================

/// Nearest provider of one context.
#[derive(Clone)]
pub(crate) struct ContextSlot {
    pub(crate) provider: InstanceId,
    pub(crate) subscribers: Subscribers,
}

impl ContextSlot {
    /// Register a consumer. No-op once the provider is gone.
    pub(crate) fn subscribe(&self, id: InstanceId, updater: Updater) {
        if let Some(list) = self.subscribers.borrow_mut().as_mut() {
            list.push((id, updater));
        }
    }
}

/// Ambient context visible at one tree position. Persistent: extending it
/// copies the map so outer positions keep their view.
#[derive(Clone, Default)]
pub(crate) struct ContextMap(Rc<FxHashMap<ContextId, ContextSlot>>);

impl ContextMap {
    pub(crate) fn get(&self, id: ContextId) -> Option<&ContextSlot> {
        self.0.get(&id)
    }

    #[must_use]
    pub(crate) fn with(&self, id: ContextId, slot: ContextSlot) -> Self {
        let mut map = (*self.0).clone();
        map.insert(id, slot);
        Self(Rc::new(map))
    }
}

impl fmt::Debug for ContextMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Drop `id` from a subscriber list.
pub(crate) fn unsubscribe(subscribers: &Subscribers, id: InstanceId) {
    if let Some(list) = subscribers.borrow_mut().as_mut() {
        list.retain(|(sub, _)| *sub != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    #[test]
    fn test_contexts_have_distinct_ids() {
        let a = create_context(1);
        let b = create_context(1);
        assert_ne!(a.id(), b.id());
        assert_ne!(a.provider(), b.provider());
        assert!(a.provider().is_class());
        assert!(!a.consumer().is_class());
        assert_eq!(a.default_value(), &Value::from(1));
    }

    #[test]
    fn test_context_map_is_persistent() {
        let ctx = create_context(Value::Null);
        let outer = ContextMap::default();
        let slot = ContextSlot {
            provider: InstanceId::from(KeyData::from_ffi(1)),
            subscribers: Rc::new(RefCell::new(Some(Vec::new()))),
        };
        let inner = outer.with(ctx.id(), slot);
        assert!(outer.get(ctx.id()).is_none());
        assert!(inner.get(ctx.id()).is_some());
    }

    #[test]
    fn test_provide_builds_provider_node() {
        let ctx = create_context("dark");
        let node = ctx.provide("light", vec![Child::from("x")]);
        assert_eq!(node.component_type(), Some(ctx.provider()));
        assert_eq!(node.props().get("value"), Some(&Value::from("light")));
        assert_eq!(node.children().len(), 1);
    }
}
