//! Node and component diff
//!
//! One call to [`Renderer::diff`] brings one arena position in line with its
//! current description. Host elements and text are handled in [`element`],
//! child lists in [`children`], host properties in [`props`] and event
//! listeners in [`events`]. Component positions are driven through their
//! lifecycle here.
//!
//! # Records
//!
//! When the child pass matches a new description to an existing record, the
//! record is reused in place: its `VNode` is swapped and the previous
//! description is passed to [`Renderer::diff`] as `old`. `old == None` means
//! the position is mounting.

pub(crate) mod children;
pub(crate) mod element;
pub(crate) mod events;
pub(crate) mod props;

use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::component::{Callback, ComponentType, ContextMap, ContextSlot, InstanceBits, InstanceShared, RenderScope, Updater};
use crate::error::{Interrupt, RenderError, RenderResult};
use crate::host::{Host, Namespace, NodeType};
use crate::node::{Child, NodeRef, RefValue, Tag, VNode, Value};
use crate::render::Renderer;
use crate::tree::{Instance, InstanceId, NodeFlags, NodeId};

// =============================================================================
// Pass state
// =============================================================================

/// Statistics about the last render or flush.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct RenderStats {
    /// Host nodes created
    pub nodes_created: usize,
    /// Host nodes kept (matched or adopted)
    pub nodes_reused: usize,
    /// Positions torn down
    pub nodes_removed: usize,
    /// Existing host nodes re-inserted at a new place
    pub nodes_moved: usize,
    /// Component render calls
    pub components_rendered: usize,
    /// Component diffs skipped by `should_update` or an unchanged description
    pub components_bailed: usize,
    /// Errors absorbed by an error boundary
    pub errors_caught: usize,
    /// Renders that suspended
    pub suspensions: usize,
}

impl RenderStats {
    /// Whether the pass touched any host node.
    pub fn has_host_changes(&self) -> bool {
        self.nodes_created + self.nodes_removed + self.nodes_moved > 0
    }
}

/// Ref attachment queued for the commit phase.
pub(crate) struct PendingRef {
    pub(crate) node_ref: NodeRef,
    pub(crate) value: Option<RefValue>,
    pub(crate) at: NodeId,
}

/// Work collected during one diff pass.
#[derive(Default)]
pub(crate) struct Pass {
    /// Instances with queued post-commit callbacks, in queue order
    pub(crate) commit_queue: Vec<InstanceId>,
    pub(crate) refs: Vec<PendingRef>,
}

/// Ambient state inherited from the parent position.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub(crate) context: ContextMap,
    pub(crate) namespace: Namespace,
}

/// Where one position is diffed.
pub(crate) struct Site<'a, N> {
    pub(crate) frame: &'a Frame,
    pub(crate) parent_dom: &'a N,
    /// Host node the position's output is expected in front of
    pub(crate) old_dom: Option<N>,
    pub(crate) hydrating: bool,
    /// Self-initiated render of a component (skips the unchanged check)
    pub(crate) rerender: bool,
}

impl<'a, N: Clone> Site<'a, N> {
    /// Site for the children of the current position.
    pub(crate) fn nested(&self, frame: &'a Frame, parent_dom: &'a N, old_dom: Option<N>) -> Self {
        Self {
            frame,
            parent_dom,
            old_dom,
            hydrating: self.hydrating,
            rerender: false,
        }
    }
}

/// Existing host nodes offered for adoption. Adopted entries are taken out.
pub(crate) type Excess<N> = Option<Vec<Option<N>>>;

/// Insertion point after a position was diffed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Anchor<N> {
    /// Render deferred during hydration; the caller advances past the held node
    Suspended,
    At(Option<N>),
}

#[derive(Debug)]
pub(crate) struct Outcome<N> {
    pub(crate) anchor: Anchor<N>,
    /// Position kept its previous child list (bail-out, text, interrupted render)
    pub(crate) kept_children: bool,
}

impl<N> Outcome<N> {
    fn at(anchor: Option<N>) -> Self {
        Self {
            anchor: Anchor::At(anchor),
            kept_children: false,
        }
    }

    fn kept(anchor: Option<N>) -> Self {
        Self {
            anchor: Anchor::At(anchor),
            kept_children: true,
        }
    }
}

/// Why a component diff stopped early.
enum Fault {
    /// The component's own render interrupted
    Interrupt(Interrupt),
    /// Unhandled error from a descendant
    Child(RenderError),
}

// =============================================================================
// Dispatcher
// =============================================================================

impl<H: Host> Renderer<H> {
    /// Diff position `id` against `old`, its previous description.
    pub(crate) fn diff(
        &mut self,
        pass: &mut Pass,
        mut site: Site<'_, H::Node>,
        id: NodeId,
        old: Option<VNode>,
        excess: &mut Excess<H::Node>,
    ) -> RenderResult<Outcome<H::Node>> {
        let Some(vnode) = self.tree.vnode(id).cloned() else {
            return Ok(Outcome::at(site.old_dom));
        };

        let old_flags = self.tree.flags(id);
        self.tree.remove_flags(id, NodeFlags::HYDRATE | NodeFlags::SUSPENDED);

        // Resume a render that was deferred while hydrating.
        let mut resumed: Excess<H::Node> = None;
        if old_flags.contains(NodeFlags::SUSPENDED) {
            site.hydrating = old_flags.contains(NodeFlags::HYDRATE);
        }
        if old_flags.contains(NodeFlags::SUSPENDED | NodeFlags::HYDRATE) {
            let stash = self
                .tree
                .instance_of(id)
                .and_then(|iid| self.tree.instance_mut(iid))
                .map(|inst| std::mem::take(&mut inst.stash))
                .unwrap_or_default();
            if !stash.is_empty() {
                site.old_dom = stash.first().cloned();
                resumed = Some(stash.into_iter().map(Some).collect());
                debug!(?id, "resuming suspended render");
            }
        }
        let excess = if resumed.is_some() { &mut resumed } else { excess };

        let outcome = match vnode.tag() {
            Tag::Component(_) => self.diff_component(pass, site, id, &vnode, old.as_ref(), excess)?,
            Tag::Fragment => self.diff_fragment(pass, site, id, &vnode, old.as_ref(), excess)?,
            Tag::Element(_) | Tag::Text => {
                let unchanged = excess.is_none()
                    && old.is_some()
                    && self.tree.state(id).and_then(|s| s.rendered) == Some(vnode.sequence());
                if unchanged {
                    Outcome::kept(site.old_dom)
                } else {
                    let outcome = self.diff_element(pass, site, id, &vnode, old.as_ref(), excess)?;
                    self.mark_rendered(id, Some(vnode.sequence()));
                    outcome
                }
            }
        };

        if let Some(hook) = &self.hooks.on_diffed {
            hook(id);
        }
        Ok(outcome)
    }

    fn diff_fragment(
        &mut self,
        pass: &mut Pass,
        site: Site<'_, H::Node>,
        id: NodeId,
        vnode: &VNode,
        old: Option<&VNode>,
        excess: &mut Excess<H::Node>,
    ) -> RenderResult<Outcome<H::Node>> {
        let previous = self.tree.state(id).and_then(|s| s.rendered);
        if !site.rerender && old.is_some() && previous == Some(vnode.sequence()) {
            return Ok(Outcome::kept(site.old_dom));
        }

        let children = vnode.children().to_vec();
        let child_site = site.nested(site.frame, site.parent_dom, site.old_dom.clone());
        let anchor = self.diff_children(pass, child_site, id, &children, excess)?;
        self.mark_rendered(id, Some(vnode.sequence()));
        Ok(Outcome::at(anchor))
    }

    pub(crate) fn mark_rendered(&mut self, id: NodeId, sequence: Option<u64>) {
        if let Some(state) = self.tree.state_mut(id) {
            state.rendered = sequence;
        }
    }

    /// Force every instance in the subtree to skip `should_update` next time.
    pub(crate) fn mark_as_force(&self, id: NodeId) {
        if let Some(inst) = self.tree.instance_of(id).and_then(|iid| self.tree.instance(iid)) {
            inst.shared.insert(InstanceBits::FORCE);
        }
        for child in self.tree.child_ids(id) {
            self.mark_as_force(child);
        }
    }
}

// =============================================================================
// Components
// =============================================================================

impl<H: Host> Renderer<H> {
    fn diff_component(
        &mut self,
        pass: &mut Pass,
        site: Site<'_, H::Node>,
        id: NodeId,
        vnode: &VNode,
        old: Option<&VNode>,
        excess: &mut Excess<H::Node>,
    ) -> RenderResult<Outcome<H::Node>> {
        let old_dom = site.old_dom.clone();
        let hydrating = site.hydrating;

        let fault = match self.render_component(pass, site, id, vnode, old, excess) {
            Ok(outcome) => return Ok(outcome),
            Err(fault) => fault,
        };
        self.mark_rendered(id, None);

        match fault {
            Fault::Child(err) => {
                self.mark_as_force(id);
                Err(err)
            }
            Fault::Interrupt(Interrupt::Suspend(suspension)) => {
                self.stats.suspensions += 1;
                if let Some(updater) = self.updater(id) {
                    suspension.park(updater);
                }
                debug!(?id, hydrating, "render suspended");
                if hydrating || excess.is_some() {
                    self.hold_suspended(id, excess, old_dom, hydrating);
                    Ok(Outcome {
                        anchor: Anchor::Suspended,
                        kept_children: false,
                    })
                } else {
                    Ok(Outcome::kept(old_dom))
                }
            }
            Fault::Interrupt(Interrupt::Error(err)) => {
                if hydrating || excess.is_some() {
                    for slot in excess.iter_mut().flatten() {
                        if let Some(node) = slot.take() {
                            self.remove_node(&node);
                        }
                    }
                }
                self.mark_as_force(id);
                self.catch_error(err, id)?;
                Ok(Outcome::kept(old_dom))
            }
        }
    }

    /// Context value and nearest provider for a component type.
    fn resolve_context(&self, ty: &ComponentType, frame: &Frame) -> (Option<ContextSlot>, Value) {
        let Some(link) = ty.context_link() else {
            return (None, Value::Null);
        };
        match frame.context.get(link.id) {
            Some(slot) => {
                let value = self
                    .tree
                    .instance(slot.provider)
                    .and_then(|provider| provider.shared.props().get("value").cloned())
                    .unwrap_or_default();
                (Some(slot.clone()), value)
            }
            None => (None, link.default.clone()),
        }
    }

    /// Existing instance of `id`, or a new one. The flag is `true` when new.
    fn ensure_instance(
        &mut self,
        id: NodeId,
        ty: &ComponentType,
        vnode: &VNode,
        provider: Option<&ContextSlot>,
        context: &Value,
    ) -> (InstanceId, bool) {
        if let Some(iid) = self.tree.instance_of(id).filter(|iid| self.tree.instance(*iid).is_some()) {
            if let Some(inst) = self.tree.instance(iid) {
                if inst.shared.has(InstanceBits::PENDING_ERROR) {
                    inst.shared.insert(InstanceBits::PROCESSING_EXCEPTION);
                }
            }
            return (iid, false);
        }

        let props = vnode.props().clone();
        let component = ty.instantiate(&props, context);
        let state = component.initial_state(&props);
        let queue = self.queue.clone();
        let iid = self.tree.instances.insert_with_key(|iid| {
            let shared = Rc::new(InstanceShared::new(iid, ty.name(), props, state));
            let updater = Updater::new(shared.clone(), queue);
            Instance {
                component,
                ty: ty.clone(),
                shared,
                updater,
                node: id,
                mount_point: None,
                ambient: ContextMap::default(),
                stash: Vec::new(),
                subscription: None,
            }
        });

        if let Some(slot) = provider {
            if let Some(inst) = self.tree.instance_mut(iid) {
                slot.subscribe(iid, inst.updater.clone());
                inst.subscription = Some(slot.subscribers.clone());
            }
        }
        if let Some(state) = self.tree.state_mut(id) {
            state.instance = Some(iid);
        }
        (iid, true)
    }

    fn render_component(
        &mut self,
        pass: &mut Pass,
        site: Site<'_, H::Node>,
        id: NodeId,
        vnode: &VNode,
        old: Option<&VNode>,
        excess: &mut Excess<H::Node>,
    ) -> Result<Outcome<H::Node>, Fault> {
        let Some(ty) = vnode.component_type() else {
            return Ok(Outcome::at(site.old_dom));
        };
        let is_class = ty.is_class();
        let props = vnode.props().clone();
        let (provider, context) = self.resolve_context(ty, site.frame);
        let (iid, mounting) = self.ensure_instance(id, ty, vnode, provider.as_ref(), &context);
        let previous = self.tree.state(id).and_then(|s| s.rendered);
        let depth = self.tree.state(id).map_or(0, |s| s.depth);
        let max_rerenders = self.config.max_rerenders.max(1);

        let Some(inst) = self.tree.instance_mut(iid) else {
            return Ok(Outcome::at(site.old_dom));
        };
        inst.node = id;
        let shared = inst.shared.clone();
        let updater = inst.updater.clone();

        if let Some(derived) = inst.component.derived_state_from_props(&props, &shared.draft()) {
            shared.merge_into_draft(derived);
        }

        let old_props = shared.props();
        let old_state = shared.state();
        shared.attach(depth);

        let mut did_update_at = None;
        if mounting {
            inst.component.will_mount(&updater);
            if is_class {
                shared.push_callback(Callback::DidMount);
            }
        } else {
            if old.is_some_and(|old| !old.ptr_eq(vnode)) {
                inst.component.will_receive_props(&props, &context);
            }

            let refused = !shared.has(InstanceBits::FORCE)
                && is_class
                && !inst.component.should_update(&old_props, &props, &shared.draft());
            if refused || (!site.rerender && previous == Some(vnode.sequence())) {
                if previous != Some(vnode.sequence()) {
                    shared.set_props(props);
                    shared.commit_draft();
                    shared.remove(InstanceBits::DIRTY);
                }
                shared.promote_state_callbacks();
                if shared.has_callbacks() {
                    pass.commit_queue.push(iid);
                }
                self.stats.components_bailed += 1;
                self.mark_rendered(id, Some(vnode.sequence()));
                return Ok(Outcome::kept(site.old_dom));
            }

            inst.component.will_update(&props, &shared.draft());
            if is_class {
                did_update_at = Some(shared.push_callback(Callback::DidUpdate {
                    props: old_props.clone(),
                    state: old_state.clone(),
                    snapshot: None,
                }));
            }
        }

        shared.set_context(context.clone());
        shared.set_props(props.clone());
        inst.mount_point = Some(site.parent_dom.clone());
        inst.ambient = site.frame.context.clone();
        shared.remove(InstanceBits::FORCE);

        let scope = RenderScope::new(&updater, &context);
        let output = if is_class {
            shared.commit_draft();
            shared.remove(InstanceBits::DIRTY);
            let state = shared.state();
            let output = inst.component.render(&props, &state, &scope).map_err(Fault::Interrupt)?;
            shared.promote_state_callbacks();
            output
        } else {
            let mut count = 0;
            loop {
                shared.remove(InstanceBits::DIRTY);
                shared.commit_draft();
                let state = shared.state();
                let output = inst.component.render(&props, &state, &scope).map_err(Fault::Interrupt)?;
                count += 1;
                if !shared.is_dirty() {
                    break output;
                }
                if count >= max_rerenders {
                    warn!(component = ty.name(), count, "render loop hit the re-render cap");
                    break output;
                }
            }
        };
        shared.commit_draft();

        let mut context_map = site.frame.context.clone();
        if let Some(provided) = inst.component.provided_context() {
            context_map = context_map.with(
                provided.id,
                ContextSlot {
                    provider: iid,
                    subscribers: provided.subscribers,
                },
            );
        }
        if let Some(at) = did_update_at {
            if let Some(snapshot) = inst.component.snapshot_before_update(&old_props, &old_state) {
                shared.set_snapshot(at, snapshot);
            }
        }
        self.stats.components_rendered += 1;
        trace!(component = ty.name(), ?id, "rendered component");

        let children = match output {
            Child::Node(node) if node.tag().is_fragment() && node.key().is_none() => node.children().to_vec(),
            Child::List(items) => items,
            other => vec![other],
        };

        let frame = Frame {
            context: context_map,
            namespace: site.frame.namespace,
        };
        let child_site = site.nested(&frame, site.parent_dom, site.old_dom.clone());
        let anchor = self
            .diff_children(pass, child_site, id, &children, excess)
            .map_err(Fault::Child)?;

        if shared.has_callbacks() {
            pass.commit_queue.push(iid);
        }
        if shared.has(InstanceBits::PENDING_ERROR) {
            shared.remove(InstanceBits::PROCESSING_EXCEPTION | InstanceBits::PENDING_ERROR);
        }
        self.mark_rendered(id, Some(vnode.sequence()));
        Ok(Outcome::at(anchor))
    }

    /// Hold back the host nodes of a component that suspended while
    /// hydrating: everything between the suspense markers, or the single
    /// node at the insertion point.
    fn hold_suspended(&mut self, id: NodeId, excess: &mut Excess<H::Node>, old_dom: Option<H::Node>, hydrating: bool) {
        let open = self.config.suspense_open_marker;
        let close = self.config.suspense_close_marker;
        let mut anchor = old_dom;
        let mut stash = Vec::new();
        let mut markers: i32 = 0;
        let mut done = false;

        let list = excess.get_or_insert_with(Vec::new);
        for slot in list.iter_mut() {
            let Some(node) = slot.clone() else {
                continue;
            };
            if done {
                continue;
            }
            if self.host.node_type(&node) == NodeType::Comment {
                let data = self.host.text(&node);
                if data == open {
                    if markers > 0 {
                        stash.push(node);
                    }
                    markers += 1;
                } else if data == close {
                    markers -= 1;
                    if markers > 0 {
                        stash.push(node.clone());
                    }
                    done = markers == 0;
                    anchor = Some(node);
                }
                *slot = None;
            } else if markers > 0 {
                stash.push(node);
                *slot = None;
            }
        }

        if !done {
            while let Some(node) = anchor.clone() {
                if self.host.node_type(&node) != NodeType::Comment {
                    break;
                }
                match self.host.next_sibling(&node) {
                    Some(next) => anchor = Some(next),
                    None => break,
                }
            }
            if let Some(node) = &anchor {
                if let Some(slot) = list.iter_mut().find(|slot| slot.as_ref() == Some(node)) {
                    *slot = None;
                }
            }
            stash = anchor.iter().cloned().collect();
        }

        let mut flags = NodeFlags::SUSPENDED;
        if hydrating {
            flags |= NodeFlags::HYDRATE;
        }
        self.tree.insert_flags(id, flags);
        self.tree.set_dom(id, anchor);
        if let Some(inst) = self.tree.instance_of(id).and_then(|iid| self.tree.instance_mut(iid)) {
            inst.stash = stash;
        }
    }

    /// Detach a host node if it is attached.
    pub(crate) fn remove_node(&mut self, node: &H::Node) {
        if self.host.parent_node(node).is_some() {
            self.host.remove(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::component::{Component, Rendered, StateUpdate, Suspension, create_context};
    use crate::config::RenderConfig;
    use crate::host::memory::{HostId, MemoryHost, Mutation};
    use crate::node::{EntriesExt, Props, State, h};
    use crate::props;

    fn setup_with(config: RenderConfig) -> (Renderer<MemoryHost>, HostId) {
        let mut renderer = Renderer::with_config(MemoryHost::new(), config);
        let root = renderer.host_mut().create_root("div");
        (renderer, root)
    }

    fn setup() -> (Renderer<MemoryHost>, HostId) {
        setup_with(RenderConfig::default())
    }

    fn leaf(ty: &ComponentType) -> VNode {
        h(ty, props! {}, Vec::<Child>::new())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Context
    // ─────────────────────────────────────────────────────────────────────────

    /// Refuses every update; its subtree only changes through subscriptions.
    struct Frozen {
        inner: VNode,
    }

    impl Component for Frozen {
        fn render(&mut self, _: &Props, _: &State, _: &RenderScope<'_>) -> Rendered {
            Ok(self.inner.clone().into())
        }

        fn should_update(&mut self, _: &Props, _: &Props, _: &State) -> bool {
            false
        }
    }

    fn show(value: &Value) -> Child {
        h("span", props! {}, [value.to_text().unwrap_or_default()]).into()
    }

    #[test]
    fn test_context_reaches_consumer_below_bailout() {
        let (mut renderer, root) = setup();
        let ctx = create_context("default");
        let consumer = ctx.consume(show);
        let frozen = ComponentType::class("Frozen", move |_, _| Box::new(Frozen { inner: consumer.clone() }));

        renderer.render(ctx.provide("a", vec![leaf(&frozen).into()]), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<span>a</span>");

        renderer.render(ctx.provide("b", vec![leaf(&frozen).into()]), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<span>a</span>");
        assert_eq!(renderer.queue().len(), 1, "subscriber forced");

        renderer.flush().unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<span>b</span>");
    }

    #[test]
    fn test_context_default_and_nearest_provider() {
        let (mut renderer, root) = setup();
        let ctx = create_context("default");
        let tree = h(
            "div",
            props! {},
            [
                ctx.consume(show),
                ctx.provide("outer", vec![ctx.consume(show).into(), ctx.provide("inner", vec![ctx.consume(show).into()]).into()]),
            ],
        );
        renderer.render(tree, &root).unwrap();
        assert_eq!(
            renderer.host().inner_markup(root),
            "<div><span>default</span><span>outer</span><span>inner</span></div>"
        );
    }

    #[test]
    fn test_provider_value_change_renders_in_same_pass() {
        let (mut renderer, root) = setup();
        let ctx = create_context(0);
        renderer.render(ctx.provide(1, vec![ctx.consume(show).into()]), &root).unwrap();
        renderer.render(ctx.provide(2, vec![ctx.consume(show).into()]), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<span>2</span>");

        renderer.flush().unwrap();
        assert_eq!(renderer.last_stats().components_rendered, 0, "already rendered with the new value");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Suspension
    // ─────────────────────────────────────────────────────────────────────────

    fn lazy(suspension: &Suspension, content: &'static str) -> ComponentType {
        let suspension = suspension.clone();
        ComponentType::function("Lazy", move |_, _| {
            if !suspension.is_resolved() {
                return Err(Interrupt::Suspend(suspension.clone()));
            }
            Ok(h("p", props! {}, [content]).into())
        })
    }

    #[test]
    fn test_suspended_component_resumes_after_resolve() {
        let (mut renderer, root) = setup();
        let suspension = Suspension::new();
        let ty = lazy(&suspension, "loaded");

        renderer.render(h("div", props! {}, [leaf(&ty)]), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<div></div>");
        assert_eq!(renderer.last_stats().suspensions, 1);
        assert!(renderer.queue().is_empty());

        suspension.resolve();
        assert_eq!(renderer.queue().len(), 1);
        renderer.flush().unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<div><p>loaded</p></div>");
    }

    #[test]
    fn test_hydration_keeps_suspended_markup() {
        let (mut renderer, root) = setup();
        let host = renderer.host_mut();
        let open = host.create_comment("$s");
        host.append(root, open);
        let p = host.build(root, "p", &[]);
        host.build_text(p, "late");
        let close = host.create_comment("/$s");
        host.append(root, close);

        let suspension = Suspension::new();
        let ty = lazy(&suspension, "late");
        renderer.hydrate(leaf(&ty), &root).unwrap();
        assert!(renderer.host().contains(root, p), "server markup kept while suspended");

        suspension.resolve();
        renderer.flush().unwrap();
        assert_eq!(renderer.host().parent_node(&p), Some(root));
        assert_eq!(renderer.host().inner_markup(p), "late");
        assert!(
            !renderer
                .host()
                .mutations()
                .iter()
                .any(|m| matches!(m, Mutation::Create { .. })),
            "suspended markup adopted"
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Re-render loop
    // ─────────────────────────────────────────────────────────────────────────

    /// Counts up to three by updating its own state while rendering.
    fn climber(renders: Rc<Cell<usize>>) -> ComponentType {
        ComponentType::function("Climber", move |_, scope| {
            renders.set(renders.get() + 1);
            let n = scope.state().get_value("n").and_then(Value::as_number).unwrap_or(0.0);
            if n < 3.0 {
                scope.set_state(StateUpdate::set("n", n + 1.0));
            }
            Ok(h("b", props! {}, [n]).into())
        })
    }

    #[test]
    fn test_render_loop_converges_in_one_pass() {
        let (mut renderer, root) = setup();
        let renders = Rc::new(Cell::new(0));
        renderer.render(leaf(&climber(renders.clone())), &root).unwrap();
        assert_eq!(renders.get(), 4);
        assert_eq!(renderer.host().inner_markup(root), "<b>3</b>");

        renderer.flush().unwrap();
        assert_eq!(renders.get(), 4, "stale queue entries are skipped");
    }

    #[test]
    fn test_render_loop_cap_defers_to_flush() {
        let (mut renderer, root) = setup_with(RenderConfig::new(2));
        let renders = Rc::new(Cell::new(0));
        renderer.render(leaf(&climber(renders.clone())), &root).unwrap();
        assert_eq!(renders.get(), 2);
        assert_eq!(renderer.host().inner_markup(root), "<b>1</b>");

        renderer.flush().unwrap();
        assert_eq!(renders.get(), 4);
        assert_eq!(renderer.host().inner_markup(root), "<b>3</b>");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Component output shapes
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_component_returning_list_and_nothing() {
        let (mut renderer, root) = setup();
        let show_list = Rc::new(Cell::new(true));
        let flag = show_list.clone();
        let ty = ComponentType::function("Maybe", move |_, _| {
            Ok(if flag.get() {
                Child::List(vec!["a".into(), Child::Empty, "b".into()])
            } else {
                Child::Empty
            })
        });

        renderer.render(h("div", props! {}, [leaf(&ty), h("hr", props! {}, Vec::<Child>::new())]), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<div>ab<hr></div>");

        show_list.set(false);
        renderer.render(h("div", props! {}, [leaf(&ty), h("hr", props! {}, Vec::<Child>::new())]), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<div><hr></div>");

        show_list.set(true);
        renderer.render(h("div", props! {}, [leaf(&ty), h("hr", props! {}, Vec::<Child>::new())]), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<div>ab<hr></div>", "inserted before the sibling");
    }
}
