//! Batched re-render scheduling
//!
//! State updates never render synchronously. [`Updater::set_state`] marks the
//! instance dirty and appends it to a [`RenderQueue`]; the first request of a
//! batch calls the queue's debounce hook, which is where an embedder arranges
//! for [`Renderer::flush`] to run "soon". Every further request in the same
//! batch only appends, so several updates in one turn coalesce into a single
//! render per instance.
//!
//! [`SharedRenderer`] wires the debounce hook to a [`TaskQueue`] for
//! embedders without an event loop of their own.
//!
//! [`Updater::set_state`]: crate::Updater::set_state

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::component::{InstanceBits, InstanceShared};
use crate::diff::{Frame, Pass, Site};
use crate::error::RenderResult;
use crate::host::Host;
use crate::node::Child;
use crate::render::Renderer;
use crate::tree::NodeFlags;

// =============================================================================
// RenderQueue
// =============================================================================

type Debounce = Rc<dyn Fn()>;

#[derive(Default)]
struct QueueInner {
    items: RefCell<Vec<Rc<InstanceShared>>>,
    /// Requests since the last completed flush
    pending: Cell<usize>,
    debounce: RefCell<Option<Debounce>>,
    /// Bumped whenever the debounce hook is replaced
    generation: Cell<u64>,
    /// Generation the last flush was scheduled with
    scheduled: Cell<u64>,
}

/// Queue of dirty component instances awaiting a re-render.
///
/// Clones share the same queue. Each renderer owns one; tests can create as
/// many isolated queues as they like.
#[derive(Clone, Default)]
pub struct RenderQueue(Rc<QueueInner>);

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the hook called when a batch needs flushing. The hook must
    /// arrange for [`Renderer::flush`] to run later; calling it re-entrantly
    /// is not supported.
    pub fn set_debounce(&self, hook: impl Fn() + 'static) {
        *self.0.debounce.borrow_mut() = Some(Rc::new(hook));
        self.0.generation.set(self.0.generation.get() + 1);
    }

    /// Number of instances waiting.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Mark `shared` dirty and queue it. No-op for instances already dirty.
    pub(crate) fn request_update(&self, shared: &Rc<InstanceShared>) {
        let mut first = false;
        if !shared.is_dirty() {
            shared.insert(InstanceBits::DIRTY);
            self.0.items.borrow_mut().push(shared.clone());
            first = self.0.pending.get() == 0;
            self.0.pending.set(self.0.pending.get() + 1);
            trace!(component = shared.name(), "update requested");
        }

        let generation = self.0.generation.get();
        if first || self.0.scheduled.get() != generation {
            self.0.scheduled.set(generation);
            let hook = self.0.debounce.borrow().clone();
            if let Some(hook) = hook {
                hook();
            }
        }
    }

    /// Next instance to render. The queue is re-sorted by depth (stable, so
    /// insertion order breaks ties) whenever it grew since the last pop.
    pub(crate) fn pop_next(&self, last_len: &mut usize) -> Option<Rc<InstanceShared>> {
        let mut items = self.0.items.borrow_mut();
        if items.is_empty() {
            return None;
        }
        if items.len() > *last_len {
            items.sort_by_key(|shared| shared.depth());
        }
        let next = items.remove(0);
        *last_len = items.len();
        Some(next)
    }

    /// End the current batch: the next request schedules a new flush.
    pub(crate) fn reset_batch(&self) {
        self.0.pending.set(0);
    }
}

impl fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderQueue")
            .field("len", &self.len())
            .field("pending", &self.0.pending.get())
            .field("debounce", &self.0.debounce.borrow().is_some())
            .finish()
    }
}

// =============================================================================
// Flush
// =============================================================================

impl<H: Host> Renderer<H> {
    /// Re-render every queued instance, shallowest first, including instances
    /// queued while flushing. Instances unmounted before their turn are
    /// skipped.
    pub fn flush(&mut self) -> RenderResult<()> {
        self.stats = Default::default();
        let queue = self.queue.clone();
        debug!(queued = queue.len(), "flush started");

        let mut last_len = 1;
        while let Some(shared) = queue.pop_next(&mut last_len) {
            if !shared.is_dirty() {
                continue;
            }
            if let Err(err) = self.rerender(&shared) {
                queue.reset_batch();
                return Err(err);
            }
        }

        queue.reset_batch();
        debug!(stats = ?self.stats, "flush finished");
        Ok(())
    }

    /// Render one instance in place at its current host position.
    fn rerender(&mut self, shared: &Rc<InstanceShared>) -> RenderResult<()> {
        let Some(inst) = self.tree.instance(shared.id()) else {
            return Ok(());
        };
        let Some(mount_point) = inst.mount_point.clone() else {
            return Ok(());
        };
        let id = inst.node;
        let frame = Frame {
            context: inst.ambient.clone(),
            namespace: self.host.namespace(&mount_point),
        };
        trace!(component = shared.name(), ?id, "re-rendering");

        let old_dom = self.tree.dom(id);
        let hydrating = self.tree.flags(id).contains(NodeFlags::HYDRATE);
        let mut excess = if hydrating { Some(vec![old_dom.clone()]) } else { None };
        let anchor = match &old_dom {
            Some(dom) => Some(dom.clone()),
            None => self.dom_sibling(id, None),
        };

        let mut pass = Pass::default();
        let site = Site {
            frame: &frame,
            parent_dom: &mount_point,
            old_dom: anchor,
            hydrating,
            rerender: true,
        };
        let old = self.tree.vnode(id).cloned();
        self.diff(&mut pass, site, id, old, &mut excess)?;
        self.commit(pass)?;

        if self.tree.dom(id) != old_dom {
            self.update_parent_dom_pointers(id);
        }
        Ok(())
    }
}

// =============================================================================
// Deferred execution
// =============================================================================

type Task = Box<dyn FnOnce()>;

/// FIFO of deferred callbacks, standing in for a microtask queue.
#[derive(Clone, Default)]
pub struct TaskQueue(Rc<RefCell<VecDeque<Task>>>);

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: impl FnOnce() + 'static) {
        self.0.borrow_mut().push_back(Box::new(task));
    }

    /// Run tasks until the queue is empty, including tasks pushed by tasks.
    /// Returns the number of tasks run.
    pub fn run(&self) -> usize {
        let mut count = 0;
        loop {
            let task = self.0.borrow_mut().pop_front();
            let Some(task) = task else {
                return count;
            };
            task();
            count += 1;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskQueue").field(&self.len()).finish()
    }
}

/// Renderer whose state updates flush through a [`TaskQueue`].
pub struct SharedRenderer<H: Host>(Rc<RefCell<Renderer<H>>>);

impl<H: Host + 'static> SharedRenderer<H> {
    /// Take ownership of `renderer` and route its flushes through `tasks`.
    pub fn new(renderer: Renderer<H>, tasks: &TaskQueue) -> Self {
        let queue = renderer.queue().clone();
        let cell = Rc::new(RefCell::new(renderer));
        let weak: Weak<RefCell<Renderer<H>>> = Rc::downgrade(&cell);
        let tasks = tasks.clone();

        queue.set_debounce(move || {
            let weak = weak.clone();
            tasks.push(move || {
                let Some(cell) = weak.upgrade() else {
                    return;
                };
                let Ok(mut renderer) = cell.try_borrow_mut() else {
                    warn!("renderer busy, deferred flush skipped");
                    return;
                };
                if let Err(err) = renderer.flush() {
                    warn!(%err, "deferred flush failed");
                }
            });
        });
        Self(cell)
    }

    pub fn render(&self, child: impl Into<Child>, mount: &H::Node) -> RenderResult<()> {
        self.0.borrow_mut().render(child, mount)
    }

    pub fn flush(&self) -> RenderResult<()> {
        self.0.borrow_mut().flush()
    }

    /// Borrow the renderer.
    pub fn with<R>(&self, f: impl FnOnce(&mut Renderer<H>) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl<H: Host> Clone for SharedRenderer<H> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
