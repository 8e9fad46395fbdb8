//! tola-reconciler - Keyed virtual-tree reconciler
//!
//! ## Core Concepts
//!
//! **Descriptions vs. records**: a [`VNode`] is an immutable description of one
//! tree position. What the engine learns while rendering it (host node,
//! component instance, child list) lives in an arena keyed by [`NodeId`], so
//! descriptions can be shared and re-rendered freely.
//!
//! **Host boundary**: the engine renders into any tree implementing [`Host`].
//! [`MemoryHost`] is a complete in-memory host with a mutation log.
//!
//! **Batched updates**: [`Updater::set_state`] never renders synchronously;
//! dirty components are queued and re-rendered by [`Renderer::flush`],
//! shallowest first.
//!
//! ## Modules
//! - `node`: Virtual nodes, props, values, refs
//! - `component`: Component trait, lifecycle, context, suspension
//! - `render`: `Renderer` entry points
//! - `scheduler`: Render queue and deferred flushing
//! - `host`: Host capability trait and the in-memory host
//!
//! ## Usage
//!
//! ```ignore
//! use tola_reconciler::prelude::*;
//!
//! let counter = ComponentType::function("Counter", |props, scope| {
//!     let count = scope.state().get_value("count").and_then(Value::as_number).unwrap_or(0.0);
//!     Ok(h("button", props! {}, [count]).into())
//! });
//!
//! let mut renderer = Renderer::new(MemoryHost::new());
//! let root = renderer.host_mut().create_root("main");
//! renderer.render(h(&counter, props! {}, Vec::<Child>::new()), &root)?;
//! ```

#[macro_use]
mod macros;

// =============================================================================
// Modules
// =============================================================================

/// Virtual node model: VNode, Tag, Props, Value, Child, NodeRef
pub mod node;

/// Arena of rendered positions
pub mod tree;

/// Node, component, child and property diff
pub(crate) mod diff;

/// Components: lifecycle trait, updaters, context, suspension
pub mod component;

/// Render queue and deferred flush
pub mod scheduler;

/// Commit phase, error boundaries, teardown
mod commit;

/// Host capability set and in-memory host
pub mod host;

/// Renderer entry point
pub mod render;

/// Renderer configuration and observer hooks
pub mod config;

/// Error types
pub mod error;

/// Prelude for common imports
pub mod prelude;

// =============================================================================
// Re-exports
// =============================================================================

// Node model
pub use node::{
    Child, Entries, EntriesExt, Handler, Key, NodeRef, Props, RefCleanup, RefValue, State, Tag, TextValue, VNode,
    Value, clone_node, create_node, create_ref, h, is_valid_node, to_child_array,
};

// Arena handles
pub use tree::{InstanceId, NodeId};

// Components
pub use component::{
    Boundary, Component, ComponentType, Context, ContextId, ProvidedContext, RenderScope, Rendered, Snapshot,
    StateUpdate, Subscribers, Suspension, Updater, create_context,
};

// Rendering
pub use diff::RenderStats;
pub use render::Renderer;
pub use scheduler::{RenderQueue, SharedRenderer, TaskQueue};

// Host
pub use host::memory::{HostId, MemoryHost, Mutation};
pub use host::{Event, Host, HostError, Listener, Namespace, NodeType};

// Configuration
pub use config::{DEFAULT_MAX_RERENDERS, RenderConfig, RenderHooks};

// Error types
pub use error::{Interrupt, RenderError, RenderResult};
