//! Component instance state shared between the engine and [`Updater`]s.
//!
//! The arena owns the component object itself; everything a state update
//! touches (props, state, draft state, status bits, queued callbacks) lives in
//! an `Rc<InstanceShared>` so an `Updater` captured by an event handler can
//! reach it without borrowing the renderer.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use compact_str::CompactString;

use crate::error::RenderResult;
use crate::node::{EntriesExt, Props, State, Value};
use crate::scheduler::RenderQueue;
use crate::tree::InstanceId;

bitflags! {
    /// Per-instance status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub(crate) struct InstanceBits: u8 {
        /// Re-rendering after catching an error; errors skip this boundary
        const PROCESSING_EXCEPTION = 1 << 0;
        /// Produced fallback state for a caught error
        const PENDING_ERROR = 1 << 1;
        /// Skip `should_update` on the next render
        const FORCE = 1 << 2;
        /// Needs a render
        const DIRTY = 1 << 3;
    }
}

/// Value returned by `snapshot_before_update`, handed to `did_update`.
pub type Snapshot = Box<dyn Any>;

/// Work queued on an instance for the commit phase.
pub(crate) enum Callback {
    DidMount,
    DidUpdate {
        props: Props,
        state: State,
        snapshot: Option<Snapshot>,
    },
    User(Box<dyn FnOnce() -> RenderResult<()>>),
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DidMount => f.write_str("DidMount"),
            Self::DidUpdate { .. } => f.write_str("DidUpdate"),
            Self::User(_) => f.write_str("User"),
        }
    }
}

// =============================================================================
// StateUpdate
// =============================================================================

type UpdateFn = Box<dyn FnOnce(&State, &Props) -> Option<State>>;

/// A state change request.
pub enum StateUpdate {
    /// Assign these entries onto the draft state
    Merge(State),
    /// Compute a partial state from the draft state and current props.
    /// `None` leaves state untouched and schedules nothing.
    With(UpdateFn),
}

impl StateUpdate {
    pub fn with(f: impl FnOnce(&State, &Props) -> Option<State> + 'static) -> Self {
        Self::With(Box::new(f))
    }

    /// Single-entry merge.
    pub fn set(name: impl Into<CompactString>, value: impl Into<Value>) -> Self {
        Self::Merge(vec![(name.into(), value.into())])
    }
}

impl From<State> for StateUpdate {
    fn from(state: State) -> Self {
        Self::Merge(state)
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge(state) => f.debug_tuple("Merge").field(state).finish(),
            Self::With(_) => f.write_str("With(..)"),
        }
    }
}

// =============================================================================
// InstanceShared
// =============================================================================

pub(crate) struct InstanceShared {
    id: InstanceId,
    name: CompactString,
    bits: Cell<InstanceBits>,
    depth: Cell<u32>,
    attached: Cell<bool>,
    props: RefCell<Props>,
    state: RefCell<State>,
    draft: RefCell<Option<State>>,
    context: RefCell<Value>,
    state_callbacks: RefCell<Vec<Callback>>,
    callbacks: RefCell<Vec<Callback>>,
}

impl InstanceShared {
    pub(crate) fn new(id: InstanceId, name: &str, props: Props, state: State) -> Self {
        Self {
            id,
            name: name.into(),
            bits: Cell::new(InstanceBits::DIRTY),
            depth: Cell::new(0),
            attached: Cell::new(false),
            props: RefCell::new(props),
            state: RefCell::new(state),
            draft: RefCell::new(None),
            context: RefCell::new(Value::Null),
            state_callbacks: RefCell::new(Vec::new()),
            callbacks: RefCell::new(Vec::new()),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Status bits
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    pub(crate) fn has(&self, bits: InstanceBits) -> bool {
        self.bits.get().intersects(bits)
    }

    #[inline]
    pub(crate) fn insert(&self, bits: InstanceBits) {
        self.bits.set(self.bits.get() | bits);
    }

    #[inline]
    pub(crate) fn remove(&self, bits: InstanceBits) {
        self.bits.set(self.bits.get() - bits);
    }

    #[inline]
    pub(crate) fn is_dirty(&self) -> bool {
        self.has(InstanceBits::DIRTY)
    }

    #[inline]
    pub(crate) fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// Bind to a rendered position. From here on state updates schedule renders.
    pub(crate) fn attach(&self, depth: u32) {
        self.depth.set(depth);
        self.attached.set(true);
    }

    pub(crate) fn detach(&self) {
        self.attached.set(false);
    }

    #[inline]
    pub(crate) fn is_attached(&self) -> bool {
        self.attached.get()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Props / state
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn props(&self) -> Props {
        self.props.borrow().clone()
    }

    pub(crate) fn set_props(&self, props: Props) {
        *self.props.borrow_mut() = props;
    }

    pub(crate) fn state(&self) -> State {
        self.state.borrow().clone()
    }

    /// State including every update not yet rendered.
    pub(crate) fn draft(&self) -> State {
        match &*self.draft.borrow() {
            Some(draft) => draft.clone(),
            None => self.state.borrow().clone(),
        }
    }

    pub(crate) fn merge_into_draft(&self, partial: State) {
        let mut draft = self.draft.borrow_mut();
        let draft = draft.get_or_insert_with(|| self.state.borrow().clone());
        draft.merge(partial);
    }

    /// Promote the draft to current state.
    pub(crate) fn commit_draft(&self) {
        if let Some(next) = self.draft.borrow_mut().take() {
            *self.state.borrow_mut() = next;
        }
    }

    pub(crate) fn context(&self) -> Value {
        self.context.borrow().clone()
    }

    pub(crate) fn set_context(&self, value: Value) {
        *self.context.borrow_mut() = value;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Callbacks
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn push_callback(&self, callback: Callback) -> usize {
        let mut callbacks = self.callbacks.borrow_mut();
        callbacks.push(callback);
        callbacks.len() - 1
    }

    /// Fill in the snapshot of a queued `DidUpdate`.
    pub(crate) fn set_snapshot(&self, at: usize, value: Snapshot) {
        if let Some(Callback::DidUpdate { snapshot, .. }) = self.callbacks.borrow_mut().get_mut(at) {
            *snapshot = Some(value);
        }
    }

    pub(crate) fn push_state_callback(&self, callback: Callback) {
        self.state_callbacks.borrow_mut().push(callback);
    }

    /// Move state-update callbacks behind the render callbacks.
    pub(crate) fn promote_state_callbacks(&self) {
        let pending = std::mem::take(&mut *self.state_callbacks.borrow_mut());
        self.callbacks.borrow_mut().extend(pending);
    }

    pub(crate) fn has_callbacks(&self) -> bool {
        !self.callbacks.borrow().is_empty()
    }

    pub(crate) fn take_callbacks(&self) -> Vec<Callback> {
        std::mem::take(&mut *self.callbacks.borrow_mut())
    }
}

impl fmt::Debug for InstanceShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceShared")
            .field("name", &self.name)
            .field("bits", &self.bits.get())
            .field("depth", &self.depth.get())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Updater
// =============================================================================

/// Handle for requesting re-renders of one component instance.
///
/// Cheap to clone; safe to capture in event handlers. Calls on an unmounted
/// instance only touch its draft state.
#[derive(Clone)]
pub struct Updater {
    shared: Rc<InstanceShared>,
    queue: RenderQueue,
}

impl Updater {
    pub(crate) fn new(shared: Rc<InstanceShared>, queue: RenderQueue) -> Self {
        Self { shared, queue }
    }

    /// Merge `update` into the draft state and schedule a render.
    pub fn set_state(&self, update: impl Into<StateUpdate>) {
        self.enqueue_state(update.into(), None);
    }

    /// [`Updater::set_state`], then run `callback` after the resulting commit.
    pub fn set_state_then(&self, update: impl Into<StateUpdate>, callback: impl FnOnce() -> RenderResult<()> + 'static) {
        self.enqueue_state(update.into(), Some(Callback::User(Box::new(callback))));
    }

    fn enqueue_state(&self, update: StateUpdate, callback: Option<Callback>) {
        let partial = match update {
            StateUpdate::Merge(partial) => Some(partial),
            StateUpdate::With(f) => {
                let draft = self.shared.draft();
                let props = self.shared.props();
                f(&draft, &props)
            }
        };
        let Some(partial) = partial else {
            return;
        };
        self.shared.merge_into_draft(partial);

        if self.shared.is_attached() {
            if let Some(callback) = callback {
                self.shared.push_state_callback(callback);
            }
            self.queue.request_update(&self.shared);
        }
    }

    /// Re-render without consulting `should_update`.
    pub fn force_update(&self) {
        if self.shared.is_attached() {
            self.shared.insert(InstanceBits::FORCE);
            self.queue.request_update(&self.shared);
        }
    }

    /// [`Updater::force_update`], then run `callback` after the resulting commit.
    pub fn force_update_then(&self, callback: impl FnOnce() -> RenderResult<()> + 'static) {
        if self.shared.is_attached() {
            self.shared.insert(InstanceBits::FORCE);
            self.shared.push_callback(Callback::User(Box::new(callback)));
            self.queue.request_update(&self.shared);
        }
    }

    /// Last rendered state.
    pub fn state(&self) -> State {
        self.shared.state()
    }

    /// Last rendered props.
    pub fn props(&self) -> Props {
        self.shared.props()
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.is_attached()
    }

    /// Display name of the component type.
    pub fn name(&self) -> &str {
        self.shared.name()
    }

    #[inline]
    pub(crate) fn shared(&self) -> &Rc<InstanceShared> {
        &self.shared
    }

    #[inline]
    pub(crate) fn instance_id(&self) -> InstanceId {
        self.shared.id()
    }
}

impl PartialEq for Updater {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Updater").field(&self.shared.name).finish()
    }
}
