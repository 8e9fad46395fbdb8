//! Arena of rendered positions
//!
//! Every position the engine has rendered owns one record, addressed by a
//! [`NodeId`]. The description (`VNode`) sits in the primary map; everything
//! the engine learns about the position (host node, component instance,
//! child list, status flags) sits in a side table keyed by the same handle.
//! Parent links are plain handles, so walking upward never owns anything.
//!
//! A record is reused in place when the diff matches a new description to it:
//! the description is swapped and the side-table entry kept.

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use slotmap::{SecondaryMap, SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::component::{Component, ComponentType, ContextMap, InstanceShared, Subscribers, Updater};
use crate::node::VNode;

new_key_type! {
    /// Handle to a rendered position.
    pub struct NodeId;

    /// Handle to a component instance.
    pub struct InstanceId;
}

bitflags! {
    /// Per-position diff and mode flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub(crate) struct NodeFlags: u8 {
        /// Paired with a new description during the current child pass
        const MATCHED = 1 << 1;
        /// Host output must be (re)inserted
        const INSERT = 1 << 2;
        /// Suspended while hydrating
        const HYDRATE = 1 << 5;
        /// Render deferred; output preserved for resumption
        const SUSPENDED = 1 << 7;
    }
}

/// Child slots of a position. `None` marks an empty child.
pub(crate) type ChildList = SmallVec<[Option<NodeId>; 4]>;

/// Engine-private fields of one position.
pub(crate) struct NodeState<N> {
    pub(crate) parent: Option<NodeId>,
    pub(crate) index: usize,
    pub(crate) depth: u32,
    /// `None` until the position's children were diffed once
    pub(crate) children: Option<ChildList>,
    /// Own host node, or the first host node of a component-like subtree
    pub(crate) dom: Option<N>,
    pub(crate) instance: Option<InstanceId>,
    pub(crate) flags: NodeFlags,
    /// Sequence of the last description diffed successfully
    pub(crate) rendered: Option<u64>,
}

impl<N> NodeState<N> {
    fn new(parent: Option<NodeId>, index: usize, depth: u32) -> Self {
        Self {
            parent,
            index,
            depth,
            children: None,
            dom: None,
            instance: None,
            flags: NodeFlags::empty(),
            rendered: None,
        }
    }
}

/// A live component instance.
pub(crate) struct Instance<N> {
    pub(crate) component: Box<dyn Component>,
    pub(crate) ty: ComponentType,
    pub(crate) shared: Rc<InstanceShared>,
    pub(crate) updater: Updater,
    /// Position currently rendered by this instance
    pub(crate) node: NodeId,
    /// Host parent the instance renders into. `None` once unmounted.
    pub(crate) mount_point: Option<N>,
    /// Ambient context captured at the last render
    pub(crate) ambient: ContextMap,
    /// Host nodes held back while suspended during hydration
    pub(crate) stash: Vec<N>,
    /// Provider this instance consumes from
    pub(crate) subscription: Option<Subscribers>,
}

impl<N: fmt::Debug> fmt::Debug for Instance<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.ty.name())
            .field("node", &self.node)
            .field("mount_point", &self.mount_point)
            .field("stash", &self.stash.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tree
// =============================================================================

pub(crate) struct Tree<N> {
    nodes: SlotMap<NodeId, VNode>,
    state: SecondaryMap<NodeId, NodeState<N>>,
    pub(crate) instances: SlotMap<InstanceId, Instance<N>>,
}

impl<N> Default for Tree<N> {
    fn default() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            state: SecondaryMap::new(),
            instances: SlotMap::with_key(),
        }
    }
}

impl<N: Clone> Tree<N> {
    /// Allocate a record for `vnode`.
    pub(crate) fn insert(&mut self, vnode: VNode, parent: Option<NodeId>, index: usize) -> NodeId {
        let depth = parent.and_then(|p| self.state.get(p)).map_or(0, |s| s.depth + 1);
        let id = self.nodes.insert(vnode);
        self.state.insert(id, NodeState::new(parent, index, depth));
        id
    }

    /// Free a record. The instance, if any, is freed separately.
    pub(crate) fn free(&mut self, id: NodeId) {
        self.nodes.remove(id);
        self.state.remove(id);
    }

    #[inline]
    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn vnode(&self, id: NodeId) -> Option<&VNode> {
        self.nodes.get(id)
    }

    /// Swap the description of a reused record, returning the previous one.
    pub(crate) fn replace_vnode(&mut self, id: NodeId, vnode: VNode) -> Option<VNode> {
        self.nodes.get_mut(id).map(|slot| std::mem::replace(slot, vnode))
    }

    #[inline]
    pub(crate) fn state(&self, id: NodeId) -> Option<&NodeState<N>> {
        self.state.get(id)
    }

    #[inline]
    pub(crate) fn state_mut(&mut self, id: NodeId) -> Option<&mut NodeState<N>> {
        self.state.get_mut(id)
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.state.get(id).and_then(|s| s.parent)
    }

    pub(crate) fn dom(&self, id: NodeId) -> Option<N> {
        self.state.get(id).and_then(|s| s.dom.clone())
    }

    pub(crate) fn set_dom(&mut self, id: NodeId, dom: Option<N>) {
        if let Some(state) = self.state.get_mut(id) {
            state.dom = dom;
        }
    }

    /// Occupied child handles in order.
    pub(crate) fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.state
            .get(id)
            .and_then(|s| s.children.as_ref())
            .map(|children| children.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn flags(&self, id: NodeId) -> NodeFlags {
        self.state.get(id).map_or(NodeFlags::empty(), |s| s.flags)
    }

    pub(crate) fn insert_flags(&mut self, id: NodeId, flags: NodeFlags) {
        if let Some(state) = self.state.get_mut(id) {
            state.flags |= flags;
        }
    }

    pub(crate) fn remove_flags(&mut self, id: NodeId, flags: NodeFlags) {
        if let Some(state) = self.state.get_mut(id) {
            state.flags -= flags;
        }
    }

    pub(crate) fn is_component_like(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(VNode::is_component_like)
    }

    pub(crate) fn instance_of(&self, id: NodeId) -> Option<InstanceId> {
        self.state.get(id).and_then(|s| s.instance)
    }

    #[inline]
    pub(crate) fn instance(&self, id: InstanceId) -> Option<&Instance<N>> {
        self.instances.get(id)
    }

    #[inline]
    pub(crate) fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance<N>> {
        self.instances.get_mut(id)
    }
}
