//! Render entry point
//!
//! A [`Renderer`] owns a host adapter and everything the engine remembers
//! about what it rendered there: the arena of positions, listener slots, the
//! render queue and per-mount root records.
//!
//! ```ignore
//! let mut renderer = Renderer::new(MemoryHost::new());
//! let root = renderer.host_mut().create_root("main");
//! renderer.render(h("p", Props::new(), ["hello"]), &root)?;
//! assert_eq!(renderer.host().inner_markup(&root), "<p>hello</p>");
//! ```

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::component::{ContextMap, Updater};
use crate::config::{RenderConfig, RenderHooks};
use crate::diff::events::{EventClock, ListenerMap};
use crate::diff::{Excess, Frame, Pass, RenderStats, Site};
use crate::error::RenderResult;
use crate::host::Host;
use crate::node::{Child, State, VNode};
use crate::scheduler::RenderQueue;
use crate::tree::{NodeId, Tree};

/// Reconciles virtual trees into a host tree.
pub struct Renderer<H: Host> {
    pub(crate) host: H,
    pub(crate) tree: Tree<H::Node>,
    pub(crate) listeners: FxHashMap<H::Node, ListenerMap>,
    pub(crate) clock: EventClock,
    pub(crate) queue: RenderQueue,
    pub(crate) config: RenderConfig,
    pub(crate) hooks: RenderHooks,
    pub(crate) stats: RenderStats,
    /// Root record of each mount point
    pub(crate) roots: FxHashMap<H::Node, NodeId>,
}

impl<H: Host> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, RenderConfig::default())
    }

    pub fn with_config(host: H, config: RenderConfig) -> Self {
        Self {
            host,
            tree: Tree::default(),
            listeners: FxHashMap::default(),
            clock: EventClock::default(),
            queue: RenderQueue::new(),
            config,
            hooks: RenderHooks::default(),
            stats: RenderStats::default(),
            roots: FxHashMap::default(),
        }
    }

    /// Install observer hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: RenderHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Use `queue` for state updates instead of a private one.
    #[must_use]
    pub fn with_queue(mut self, queue: RenderQueue) -> Self {
        self.queue = queue;
        self
    }

    #[inline]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[inline]
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[inline]
    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Statistics of the most recent render, hydrate, unmount or flush.
    #[inline]
    pub fn last_stats(&self) -> RenderStats {
        self.stats
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Render `child` into `mount`, diffing against what was rendered there
    /// before. On first render, existing children of `mount` are offered for
    /// adoption.
    pub fn render(&mut self, child: impl Into<Child>, mount: &H::Node) -> RenderResult<()> {
        self.render_root(child.into(), mount, false)
    }

    /// Adopt the existing children of `mount` as the output of `child`.
    /// Props are not reconciled; listeners and refs are attached.
    pub fn hydrate(&mut self, child: impl Into<Child>, mount: &H::Node) -> RenderResult<()> {
        self.render_root(child.into(), mount, true)
    }

    /// Tear down everything rendered into `mount`. Returns whether anything
    /// was mounted there.
    pub fn unmount(&mut self, mount: &H::Node) -> RenderResult<bool> {
        self.stats = RenderStats::default();
        let Some(root) = self.roots.remove(mount) else {
            return Ok(false);
        };
        debug!(?mount, "unmounting root");
        self.teardown(root, root, false)?;
        Ok(true)
    }

    fn render_root(&mut self, child: Child, mount: &H::Node, hydrating: bool) -> RenderResult<()> {
        self.stats = RenderStats::default();
        let vnode = VNode::fragment(vec![child]);

        let mut previous = self.roots.get(mount).copied().filter(|id| self.tree.contains(*id));
        if hydrating {
            if let Some(stale) = previous.take() {
                // Keep its host nodes: they are the material being adopted.
                self.teardown(stale, stale, true)?;
            }
        }

        let (id, old) = match previous {
            Some(id) => {
                let old = self.tree.replace_vnode(id, vnode);
                (id, old)
            }
            None => (self.tree.insert(vnode, None, 0), None),
        };
        self.roots.insert(mount.clone(), id);

        let existing = previous.is_none();
        let mut excess: Excess<H::Node> = if existing {
            let nodes = self.host.child_nodes(mount);
            (!nodes.is_empty()).then(|| nodes.into_iter().map(Some).collect())
        } else {
            None
        };
        let old_dom = match previous {
            Some(id) => self.tree.dom(id),
            None => self.host.first_child(mount),
        };
        debug!(?mount, hydrating, adopting = excess.as_ref().map_or(0, Vec::len), "render started");

        let frame = Frame {
            context: ContextMap::default(),
            namespace: self.host.namespace(mount),
        };
        let site = Site {
            frame: &frame,
            parent_dom: mount,
            old_dom,
            hydrating,
            rerender: false,
        };
        let mut pass = Pass::default();
        self.diff(&mut pass, site, id, old, &mut excess)?;
        self.commit(pass)?;
        debug!(stats = ?self.stats, "render finished");
        Ok(())
    }

    /// Refresh the first-host-node pointer of component-like ancestors after
    /// the output of `id` changed.
    pub(crate) fn update_parent_dom_pointers(&mut self, id: NodeId) {
        let mut cursor = self.tree.parent(id);
        while let Some(parent) = cursor {
            if !self.tree.is_component_like(parent) {
                break;
            }
            let first = self
                .tree
                .child_ids(parent)
                .into_iter()
                .find_map(|child| self.tree.dom(child));
            self.tree.set_dom(parent, first);
            cursor = self.tree.parent(parent);
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Root position rendered into `mount`. Its single child is the rendered
    /// tree.
    pub fn root(&self, mount: &H::Node) -> Option<NodeId> {
        self.roots.get(mount).copied()
    }

    /// Host node of a position. For component-like positions, the first host
    /// node of their output.
    pub fn host_node(&self, id: NodeId) -> Option<H::Node> {
        self.tree.dom(id)
    }

    pub fn vnode(&self, id: NodeId) -> Option<&VNode> {
        self.tree.vnode(id)
    }

    /// Occupied child positions in order.
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.child_ids(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.parent(id)
    }

    /// Update handle of the component rendered at `id`.
    pub fn updater(&self, id: NodeId) -> Option<Updater> {
        let iid = self.tree.instance_of(id)?;
        self.tree.instance(iid).map(|inst| inst.updater.clone())
    }

    /// Committed state of the component rendered at `id`.
    pub fn component_state(&self, id: NodeId) -> Option<State> {
        self.updater(id).map(|updater| updater.state())
    }

    /// Number of live positions across all roots.
    pub fn live_positions(&self) -> usize {
        self.tree.len()
    }
}

impl<H: Host + fmt::Debug> fmt::Debug for Renderer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("host", &self.host)
            .field("roots", &self.roots.len())
            .field("positions", &self.tree.len())
            .field("queue", &self.queue)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
