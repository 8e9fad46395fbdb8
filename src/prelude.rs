//! Prelude module for common imports.
//!
//! ```ignore
//! use tola_reconciler::prelude::*;
//! ```

// Node model
pub use crate::node::{
    Child, EntriesExt, Handler, NodeRef, Props, State, VNode, Value, clone_node, create_node, create_ref, h,
};

// Components
pub use crate::component::{
    Boundary, Component, ComponentType, RenderScope, Rendered, StateUpdate, Suspension, Updater, create_context,
};

// Rendering
pub use crate::render::Renderer;
pub use crate::scheduler::{SharedRenderer, TaskQueue};

// Host
pub use crate::host::memory::MemoryHost;
pub use crate::host::{Event, Host};

// Errors
pub use crate::error::{Interrupt, RenderError, RenderResult};

// Macros
pub use crate::{children, props};
