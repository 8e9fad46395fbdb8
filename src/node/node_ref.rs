//! External references
//!
//! A [`NodeRef`] is an output slot the caller wants filled with whatever a
//! node materialized into: a host node for elements and text, the component's
//! [`Updater`] for component invocations.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::Updater;
use crate::error::RenderResult;

/// Cleanup returned by a callback ref, run instead of a detach call.
pub type RefCleanup = Box<dyn FnOnce()>;

type RefCallback = Box<dyn Fn(Option<&RefValue>) -> RenderResult<Option<RefCleanup>>>;

/// What a ref points at.
#[derive(Clone)]
pub enum RefValue {
    /// Type-erased host node handle
    Host(Rc<dyn Any>),
    /// Component instance
    Component(Updater),
}

impl RefValue {
    pub(crate) fn host<N: Clone + 'static>(node: &N) -> Self {
        Self::Host(Rc::new(node.clone()))
    }

    /// Host node handle, if this ref holds a node of type `N`.
    pub fn as_host<N: Clone + 'static>(&self) -> Option<N> {
        match self {
            Self::Host(node) => node.downcast_ref::<N>().cloned(),
            Self::Component(_) => None,
        }
    }

    pub fn as_component(&self) -> Option<&Updater> {
        match self {
            Self::Component(updater) => Some(updater),
            Self::Host(_) => None,
        }
    }

    pub(crate) fn is_host_node<N: PartialEq + 'static>(&self, node: &N) -> bool {
        match self {
            Self::Host(held) => held.downcast_ref::<N>() == Some(node),
            Self::Component(_) => false,
        }
    }
}

impl fmt::Debug for RefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(_) => f.write_str("Host(..)"),
            Self::Component(_) => f.write_str("Component(..)"),
        }
    }
}

enum RefKind {
    Object(RefCell<Option<RefValue>>),
    Callback {
        f: RefCallback,
        cleanup: RefCell<Option<RefCleanup>>,
    },
}

/// Shared ref handle. Two handles are equal iff they are the same ref.
#[derive(Clone)]
pub struct NodeRef(Rc<RefKind>);

/// Create an object-style ref with an empty `current` slot.
pub fn create_ref() -> NodeRef {
    NodeRef(Rc::new(RefKind::Object(RefCell::new(None))))
}

impl NodeRef {
    /// Callback ref. Called with `Some` on attach and `None` on detach,
    /// unless the previous attach returned a cleanup, which then runs instead.
    pub fn callback(f: impl Fn(Option<&RefValue>) -> RenderResult<Option<RefCleanup>> + 'static) -> Self {
        Self(Rc::new(RefKind::Callback {
            f: Box::new(f),
            cleanup: RefCell::new(None),
        }))
    }

    /// Current target of an object ref. Always `None` for callback refs.
    pub fn current(&self) -> Option<RefValue> {
        match &*self.0 {
            RefKind::Object(cell) => cell.borrow().clone(),
            RefKind::Callback { .. } => None,
        }
    }

    pub(crate) fn apply(&self, value: Option<RefValue>) -> RenderResult<()> {
        match &*self.0 {
            RefKind::Object(cell) => {
                *cell.borrow_mut() = value;
                Ok(())
            }
            RefKind::Callback { f, cleanup } => {
                let previous = cleanup.borrow_mut().take();
                let had_cleanup = previous.is_some();
                if let Some(run) = previous {
                    run();
                }
                if !had_cleanup || value.is_some() {
                    let next = f(value.as_ref())?;
                    *cleanup.borrow_mut() = next;
                }
                Ok(())
            }
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            RefKind::Object(cell) => f.debug_tuple("NodeRef").field(&*cell.borrow()).finish(),
            RefKind::Callback { .. } => f.write_str("NodeRef(<callback>)"),
        }
    }
}
