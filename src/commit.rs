//! Commit phase, error boundaries and teardown
//!
//! After a diff pass the queued refs are applied and every instance in the
//! commit queue runs its post-commit callbacks. Failures in any of these, and
//! in teardown hooks, go through [`Renderer::catch_error`]: the nearest
//! ancestor instance that reacts by scheduling new state handles the error.

use tracing::{debug, trace, warn};

use crate::component::{Boundary, Callback, InstanceBits, unsubscribe};
use crate::diff::{Pass, PendingRef};
use crate::error::{RenderError, RenderResult};
use crate::host::Host;
use crate::render::Renderer;
use crate::tree::NodeId;

impl<H: Host> Renderer<H> {
    /// Apply refs, then run post-commit callbacks in queue order.
    ///
    /// A failing callback stops the remaining callbacks of its own instance
    /// only. The first error no boundary handled is returned at the end.
    pub(crate) fn commit(&mut self, pass: Pass) -> RenderResult<()> {
        let mut unhandled = None;

        for PendingRef { node_ref, value, at } in pass.refs {
            if let Err(err) = node_ref.apply(value) {
                self.route_error(err, at, &mut unhandled);
            }
        }

        if let Some(hook) = &self.hooks.on_commit {
            hook(pass.commit_queue.len());
        }

        for iid in pass.commit_queue {
            let Some(inst) = self.tree.instance(iid) else {
                continue;
            };
            let node = inst.node;
            for callback in inst.shared.take_callbacks() {
                let result = match callback {
                    Callback::User(f) => f(),
                    Callback::DidMount => match self.tree.instance_mut(iid) {
                        Some(inst) => inst.component.did_mount(),
                        None => Ok(()),
                    },
                    Callback::DidUpdate { props, state, snapshot } => match self.tree.instance_mut(iid) {
                        Some(inst) => inst.component.did_update(&props, &state, snapshot),
                        None => Ok(()),
                    },
                };
                if let Err(err) = result {
                    self.route_error(err, node, &mut unhandled);
                    break;
                }
            }
        }

        unhandled.map_or(Ok(()), Err)
    }

    fn route_error(&mut self, err: RenderError, at: NodeId, unhandled: &mut Option<RenderError>) {
        if let Err(err) = self.catch_error(err, at) {
            unhandled.get_or_insert(err);
        }
    }

    /// Offer `error` to the ancestors of `at`, nearest first.
    ///
    /// An instance handles the error when it is dirty after `state_from_error`
    /// and `catch_error` ran. It is then marked pending-error and the walk
    /// stops. A hook that fails replaces the error and the walk continues.
    pub(crate) fn catch_error(&mut self, mut error: RenderError, at: NodeId) -> RenderResult<()> {
        let mut cursor = self.tree.parent(at);
        while let Some(id) = cursor {
            cursor = self.tree.parent(id);
            let Some(iid) = self.tree.instance_of(id) else {
                continue;
            };
            let Some(inst) = self.tree.instance_mut(iid) else {
                continue;
            };
            if inst.shared.has(InstanceBits::PROCESSING_EXCEPTION) {
                continue;
            }
            inst.shared.insert(InstanceBits::FORCE);
            let updater = inst.updater.clone();

            if let Some(fallback) = inst.component.state_from_error(&error) {
                updater.set_state(fallback);
            }
            match inst.component.catch_error(&error, &updater) {
                Ok(Boundary::Caught) => updater.force_update(),
                Ok(Boundary::Declined) => {}
                Err(hook_error) => {
                    debug!(boundary = updater.name(), %hook_error, "error boundary failed");
                    error = hook_error;
                    continue;
                }
            }

            if inst.shared.is_dirty() {
                inst.shared.insert(InstanceBits::PENDING_ERROR);
                self.stats.errors_caught += 1;
                debug!(boundary = updater.name(), %error, "error caught");
                return Ok(());
            }
        }

        self.queue.reset_batch();
        warn!(%error, "unhandled render error");
        Err(error)
    }

    /// Tear down the subtree at `id`: detach refs, run `will_unmount`, recurse,
    /// then remove the host node unless an ancestor's removal already
    /// detached it. Errors go to the ancestors of `initiator`; the teardown
    /// always completes and reports the first unhandled error afterwards.
    pub(crate) fn teardown(&mut self, id: NodeId, initiator: NodeId, skip_remove: bool) -> RenderResult<()> {
        if let Some(hook) = &self.hooks.on_unmount {
            hook(id);
        }
        let mut unhandled = None;
        let dom = self.tree.dom(id);

        if let Some(node_ref) = self.tree.vnode(id).and_then(|v| v.node_ref().cloned()) {
            let owned = match (node_ref.current(), &dom) {
                (None, _) => true,
                (Some(current), Some(dom)) => current.is_host_node(dom),
                (Some(_), None) => false,
            };
            if owned {
                if let Err(err) = node_ref.apply(None) {
                    self.route_error(err, initiator, &mut unhandled);
                }
            }
        }

        let instance = self.tree.instance_of(id);
        if let Some(inst) = instance.and_then(|iid| self.tree.instance_mut(iid)) {
            let result = inst.component.will_unmount();
            inst.mount_point = None;
            inst.shared.detach();
            if let Some(subscribers) = inst.subscription.take() {
                unsubscribe(&subscribers, inst.shared.id());
            }
            if let Err(err) = result {
                self.route_error(err, initiator, &mut unhandled);
            }
        }

        let component_like = self.tree.is_component_like(id);
        for child in self.tree.child_ids(id) {
            if let Err(err) = self.teardown(child, initiator, skip_remove || !component_like) {
                unhandled.get_or_insert(err);
            }
        }

        if let Some(node) = &dom {
            if !skip_remove {
                self.remove_node(node);
            }
            if !component_like {
                self.listeners.remove(node);
            }
        }
        if let Some(iid) = instance {
            self.tree.instances.remove(iid);
        }
        self.tree.free(id);
        self.stats.nodes_removed += 1;
        trace!(?id, "unmounted");

        unhandled.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::component::{Component, ComponentType, RenderScope, Rendered, Snapshot, Updater};
    use crate::error::Interrupt;
    use crate::host::memory::{HostId, MemoryHost};
    use crate::node::{Child, EntriesExt, NodeRef, Props, RefValue, State, VNode, Value, create_ref, h};
    use crate::props;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn setup() -> (Renderer<MemoryHost>, HostId) {
        let mut renderer = Renderer::new(MemoryHost::new());
        let root = renderer.host_mut().create_root("div");
        (renderer, root)
    }

    fn leaf(ty: &ComponentType) -> VNode {
        h(ty, props! {}, Vec::<Child>::new())
    }

    fn thrower() -> ComponentType {
        ComponentType::function("Thrower", |_, _| {
            Err(Interrupt::Error(RenderError::component("Thrower", "boom")))
        })
    }

    /// Renders its `child` prop until an error arrives, then a fallback.
    struct Fallback {
        child: ComponentType,
    }

    impl Component for Fallback {
        fn render(&mut self, _: &Props, state: &State, _: &RenderScope<'_>) -> Rendered {
            if state.has_value("failed") {
                return Ok(h("p", props! {}, ["fallback"]).into());
            }
            Ok(leaf(&self.child).into())
        }

        fn state_from_error(&self, _error: &RenderError) -> Option<State> {
            Some(vec![("failed".into(), Value::Bool(true))])
        }
    }

    #[test]
    fn test_error_boundary_renders_fallback() {
        let (mut renderer, root) = setup();
        let child = thrower();
        let boundary = ComponentType::class("Fallback", move |_, _| Box::new(Fallback { child: child.clone() }));

        renderer.render(leaf(&boundary), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "");
        assert_eq!(renderer.last_stats().errors_caught, 1);
        assert_eq!(renderer.queue().len(), 1, "boundary scheduled for a fallback render");

        renderer.flush().unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<p>fallback</p>");
    }

    /// Boundary counting caught errors; its fallback is another component or
    /// a plain `<p>`.
    struct Guard {
        child: ComponentType,
        fallback: Option<ComponentType>,
        hits: Rc<Cell<usize>>,
    }

    impl Component for Guard {
        fn render(&mut self, _: &Props, state: &State, _: &RenderScope<'_>) -> Rendered {
            if !state.has_value("failed") {
                return Ok(leaf(&self.child).into());
            }
            Ok(match &self.fallback {
                Some(ty) => leaf(ty).into(),
                None => h("p", props! {}, ["fallback"]).into(),
            })
        }

        fn state_from_error(&self, _error: &RenderError) -> Option<State> {
            self.hits.set(self.hits.get() + 1);
            Some(vec![("failed".into(), Value::Bool(true))])
        }
    }

    fn guard(name: &'static str, child: ComponentType, fallback: Option<ComponentType>, hits: &Rc<Cell<usize>>) -> ComponentType {
        let hits = hits.clone();
        ComponentType::class(name, move |_, _| {
            Box::new(Guard {
                child: child.clone(),
                fallback: fallback.clone(),
                hits: hits.clone(),
            })
        })
    }

    #[test]
    fn test_failing_fallback_escalates_to_outer_boundary() {
        let (mut renderer, root) = setup();
        let inner_hits = Rc::new(Cell::new(0));
        let outer_hits = Rc::new(Cell::new(0));
        let inner = guard("Inner", thrower(), Some(thrower()), &inner_hits);
        let outer = guard("Outer", inner, None, &outer_hits);

        renderer.render(leaf(&outer), &root).unwrap();
        assert_eq!((inner_hits.get(), outer_hits.get()), (1, 0));

        renderer.flush().unwrap();
        assert_eq!(inner_hits.get(), 1, "inner boundary is skipped while its fallback fails");
        assert_eq!(outer_hits.get(), 1);
        assert_eq!(renderer.host().inner_markup(root), "<p>fallback</p>");
        assert!(renderer.queue().is_empty());
    }

    struct FailsOnUnmount {
        unmounts: Rc<Cell<usize>>,
        fail: bool,
    }

    impl Component for FailsOnUnmount {
        fn render(&mut self, _: &Props, _: &State, _: &RenderScope<'_>) -> Rendered {
            Ok(h("span", props! {}, ["s"]).into())
        }

        fn will_unmount(&mut self) -> RenderResult<()> {
            self.unmounts.set(self.unmounts.get() + 1);
            if self.fail {
                return Err(RenderError::lifecycle("will_unmount", "still busy"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_failing_will_unmount_still_removes_siblings() {
        let (mut renderer, root) = setup();
        let unmounts = Rc::new(Cell::new(0));
        let item = |fail: bool| {
            let unmounts = unmounts.clone();
            let ty = ComponentType::class("FailsOnUnmount", move |_, _| {
                Box::new(FailsOnUnmount {
                    unmounts: unmounts.clone(),
                    fail,
                })
            });
            Child::from(leaf(&ty))
        };

        renderer.render(h("div", props! {}, [item(false), item(true), item(false)]), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<div><span>s</span><span>s</span><span>s</span></div>");

        let err = renderer.render(Child::Empty, &root).unwrap_err();
        assert!(matches!(err, RenderError::Lifecycle { hook: "will_unmount", .. }));
        assert_eq!(unmounts.get(), 3, "every instance is torn down");
        assert_eq!(renderer.host().inner_markup(root), "");
    }

    #[test]
    fn test_unhandled_error_escapes_render() {
        let (mut renderer, root) = setup();
        let err = renderer.render(leaf(&thrower()), &root).unwrap_err();
        assert!(matches!(err, RenderError::Component { ref component, .. } if component == "Thrower"));
        assert!(renderer.queue().is_empty());
    }

    struct FailsOnMount;

    impl Component for FailsOnMount {
        fn render(&mut self, _: &Props, _: &State, _: &RenderScope<'_>) -> Rendered {
            Ok(h("span", props! {}, ["child"]).into())
        }

        fn did_mount(&mut self) -> RenderResult<()> {
            Err(RenderError::lifecycle("did_mount", "no backend"))
        }
    }

    struct Catcher {
        child: ComponentType,
        caught: Rc<RefCell<Vec<String>>>,
    }

    impl Component for Catcher {
        fn render(&mut self, _: &Props, _: &State, _: &RenderScope<'_>) -> Rendered {
            Ok(leaf(&self.child).into())
        }

        fn catch_error(&mut self, error: &RenderError, _updater: &Updater) -> RenderResult<Boundary> {
            self.caught.borrow_mut().push(error.to_string());
            Ok(Boundary::Caught)
        }
    }

    #[test]
    fn test_commit_error_goes_to_catching_ancestor() {
        let (mut renderer, root) = setup();
        let caught = Rc::new(RefCell::new(Vec::new()));
        let child = ComponentType::class("FailsOnMount", |_, _| Box::new(FailsOnMount));
        let c = caught.clone();
        let catcher = ComponentType::class("Catcher", move |_, _| {
            Box::new(Catcher {
                child: child.clone(),
                caught: c.clone(),
            })
        });

        renderer.render(leaf(&catcher), &root).unwrap();
        assert_eq!(renderer.host().inner_markup(root), "<span>child</span>");
        assert_eq!(*caught.borrow(), ["lifecycle hook `did_mount` failed: no backend"]);
        assert_eq!(renderer.queue().len(), 1);

        renderer.flush().unwrap();
        assert_eq!(caught.borrow().len(), 1);
    }

    #[test]
    fn test_commit_error_without_boundary_is_returned() {
        let (mut renderer, root) = setup();
        let ty = ComponentType::class("FailsOnMount", |_, _| Box::new(FailsOnMount));
        let err = renderer.render(leaf(&ty), &root).unwrap_err();
        assert!(matches!(err, RenderError::Lifecycle { hook: "did_mount", .. }));
        assert_eq!(renderer.host().inner_markup(root), "<span>child</span>", "output stays committed");
    }

    #[test]
    fn test_callback_ref_attach_and_detach() {
        let (mut renderer, root) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        let node_ref = NodeRef::callback(move |value| {
            l.borrow_mut().push(value.and_then(RefValue::as_host::<HostId>));
            Ok(None)
        });

        renderer.render(h("b", props! { "ref" => node_ref.clone() }, ["x"]), &root).unwrap();
        let b = renderer.host().child_nodes(&root)[0];
        renderer.render(h("b", props! { "ref" => node_ref }, ["y"]), &root).unwrap();
        assert_eq!(*log.borrow(), [Some(b)], "same ref is not re-applied");

        renderer.render(Child::Empty, &root).unwrap();
        assert_eq!(*log.borrow(), [Some(b), None]);
    }

    #[test]
    fn test_component_ref_holds_updater() {
        let (mut renderer, root) = setup();
        let ty = ComponentType::function("Label", |_, _| Ok("label".into()));
        let r = create_ref();
        renderer.render(h(&ty, props! { "ref" => r.clone() }, Vec::<Child>::new()), &root).unwrap();

        let current = r.current().expect("ref attached");
        let updater = current.as_component().expect("component ref");
        assert_eq!(updater.name(), "Label");
        assert!(updater.is_mounted());
        assert!(current.as_host::<HostId>().is_none());
    }

    struct Logged {
        log: Log,
        refuse: bool,
    }

    impl Component for Logged {
        fn render(&mut self, props: &Props, _: &State, _: &RenderScope<'_>) -> Rendered {
            self.log.borrow_mut().push("render");
            let label = props.get("label").cloned().unwrap_or_default();
            Ok(h("i", props! {}, [label.to_text().unwrap_or_default()]).into())
        }

        fn will_mount(&mut self, _: &Updater) {
            self.log.borrow_mut().push("will_mount");
        }

        fn did_mount(&mut self) -> RenderResult<()> {
            self.log.borrow_mut().push("did_mount");
            Ok(())
        }

        fn will_receive_props(&mut self, _: &Props, _: &Value) {
            self.log.borrow_mut().push("will_receive_props");
        }

        fn should_update(&mut self, _: &Props, _: &Props, _: &State) -> bool {
            self.log.borrow_mut().push("should_update");
            !self.refuse
        }

        fn will_update(&mut self, _: &Props, _: &State) {
            self.log.borrow_mut().push("will_update");
        }

        fn snapshot_before_update(&mut self, _: &Props, _: &State) -> Option<Snapshot> {
            self.log.borrow_mut().push("snapshot");
            Some(Box::new(7u8))
        }

        fn did_update(&mut self, prev_props: &Props, _: &State, snapshot: Option<Snapshot>) -> RenderResult<()> {
            assert_eq!(prev_props.get("label"), Some(&Value::from("a")));
            assert_eq!(snapshot.and_then(|s| s.downcast::<u8>().ok()).map(|s| *s), Some(7));
            self.log.borrow_mut().push("did_update");
            Ok(())
        }

        fn will_unmount(&mut self) -> RenderResult<()> {
            self.log.borrow_mut().push("will_unmount");
            Ok(())
        }
    }

    fn logged(log: &Log, refuse: bool) -> ComponentType {
        let log = log.clone();
        ComponentType::class("Logged", move |_, _| {
            Box::new(Logged {
                log: log.clone(),
                refuse,
            })
        })
    }

    #[test]
    fn test_lifecycle_order() {
        let (mut renderer, root) = setup();
        let log: Log = Rc::default();
        let ty = logged(&log, false);

        renderer.render(h(&ty, props! { "label" => "a" }, Vec::<Child>::new()), &root).unwrap();
        assert_eq!(*log.borrow(), ["will_mount", "render", "did_mount"]);

        log.borrow_mut().clear();
        renderer.render(h(&ty, props! { "label" => "b" }, Vec::<Child>::new()), &root).unwrap();
        assert_eq!(
            *log.borrow(),
            ["will_receive_props", "should_update", "will_update", "render", "snapshot", "did_update"]
        );
        assert_eq!(renderer.host().inner_markup(root), "<i>b</i>");

        log.borrow_mut().clear();
        renderer.unmount(&root).unwrap();
        assert_eq!(*log.borrow(), ["will_unmount"]);
    }

    #[test]
    fn test_should_update_false_keeps_output_but_takes_props() {
        let (mut renderer, root) = setup();
        let log: Log = Rc::default();
        let ty = logged(&log, true);
        let r = create_ref();

        renderer
            .render(h(&ty, props! { "label" => "a", "ref" => r.clone() }, Vec::<Child>::new()), &root)
            .unwrap();
        renderer
            .render(h(&ty, props! { "label" => "b", "ref" => r.clone() }, Vec::<Child>::new()), &root)
            .unwrap();

        assert_eq!(renderer.host().inner_markup(root), "<i>a</i>");
        assert_eq!(renderer.last_stats().components_bailed, 1);
        let updater = r.current().and_then(|v| v.as_component().cloned()).expect("component ref");
        assert_eq!(updater.props().get("label"), Some(&Value::from("b")));
        assert_eq!(log.borrow().iter().filter(|e| **e == "render").count(), 1);
    }
}
