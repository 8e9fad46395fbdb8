//! Host tree boundary
//!
//! The engine never owns the tree it renders into. Everything it needs from
//! the outside world goes through the [`Host`] capability set: node creation,
//! attribute/style/text mutation, event registration, structural edits and
//! read access to the existing structure (for hydration and sibling search).
//!
//! [`memory::MemoryHost`] is a complete in-memory implementation used by the
//! test suite and by embedders that want to inspect output as markup.

pub mod memory;

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use compact_str::CompactString;
use thiserror::Error;

use crate::node::Value;

// =============================================================================
// Node classification
// =============================================================================

/// Host node type, numbered like the DOM's `nodeType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    /// Comments are used as suspense markers and skipped when walking siblings
    Comment = 8,
    /// Detached container (template content, document fragment)
    Fragment = 11,
}

/// Element namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
}

impl Namespace {
    pub const XHTML_URI: &'static str = "http://www.w3.org/1999/xhtml";
    pub const SVG_URI: &'static str = "http://www.w3.org/2000/svg";
    pub const MATHML_URI: &'static str = "http://www.w3.org/1998/Math/MathML";

    /// Namespace URI.
    #[inline]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Html => Self::XHTML_URI,
            Self::Svg => Self::SVG_URI,
            Self::MathMl => Self::MATHML_URI,
        }
    }

    /// Resolve a namespace URI, falling back to HTML.
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            Self::SVG_URI => Self::Svg,
            Self::MATHML_URI => Self::MathMl,
            _ => Self::Html,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Event delivered by the host to registered listeners.
///
/// The same `Event` value travels through the capture and bubble phases of one
/// dispatch, which is what lets the engine stamp it once with a dispatch
/// sequence (see [`crate::diff::events`]).
pub struct Event {
    kind: CompactString,
    detail: Option<Rc<dyn Any>>,
    pub(crate) dispatched: Option<u64>,
    propagation_stopped: bool,
    default_prevented: bool,
}

impl Event {
    /// Create an event of the given type (`"click"`, `"input"`, ...).
    pub fn new(kind: impl Into<CompactString>) -> Self {
        Self {
            kind: kind.into(),
            detail: None,
            dispatched: None,
            propagation_stopped: false,
            default_prevented: false,
        }
    }

    /// Attach an arbitrary payload.
    pub fn with_detail(mut self, detail: impl Any) -> Self {
        self.detail = Some(Rc::new(detail));
        self
    }

    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Payload, if it has type `T`.
    pub fn detail<T: 'static>(&self) -> Option<&T> {
        self.detail.as_deref().and_then(|d| d.downcast_ref())
    }

    /// Dispatch sequence stamped by the first engine listener that saw this event.
    #[inline]
    pub fn dispatch_sequence(&self) -> Option<u64> {
        self.dispatched
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    #[inline]
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    #[inline]
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("dispatched", &self.dispatched)
            .field("propagation_stopped", &self.propagation_stopped)
            .finish_non_exhaustive()
    }
}

/// Listener registered with the host. The engine registers exactly one per
/// (node, event name, capture) triple and never swaps it.
pub type Listener = Rc<dyn Fn(&mut Event)>;

// =============================================================================
// Errors
// =============================================================================

/// Error reported by a host adapter.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The node does not expose a settable property with this name
    #[error("property `{0}` is not settable on this node")]
    UnsupportedProperty(CompactString),

    /// The property exists but rejected the value
    #[error("property `{name}` rejected value: {reason}")]
    InvalidValue {
        /// Property name
        name: CompactString,
        /// Adapter-specific reason
        reason: String,
    },
}

// =============================================================================
// Host
// =============================================================================

/// Capability set the engine requires from a host tree.
///
/// Node handles are cheap clonable identities; two handles compare equal iff
/// they name the same host node.
pub trait Host {
    /// Handle to a host node.
    type Node: Clone + Eq + Hash + fmt::Debug + 'static;

    // ─────────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────────

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn create_element_ns(&mut self, namespace: Namespace, tag: &str) -> Self::Node;

    fn create_text(&mut self, text: &str) -> Self::Node;

    // ─────────────────────────────────────────────────────────────────────────
    // Read access
    // ─────────────────────────────────────────────────────────────────────────

    fn node_type(&self, node: &Self::Node) -> NodeType;

    /// Tag name for elements, `None` otherwise.
    fn local_name(&self, node: &Self::Node) -> Option<CompactString>;

    fn namespace(&self, node: &Self::Node) -> Namespace;

    fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn child_nodes(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn first_child(&self, node: &Self::Node) -> Option<Self::Node> {
        self.child_nodes(node).into_iter().next()
    }

    /// Text value of a text or comment node; empty for elements.
    fn text(&self, node: &Self::Node) -> String;

    /// Attributes currently present on an element, in document order.
    fn attributes(&self, node: &Self::Node) -> Vec<(CompactString, String)>;

    /// Detached container holding the children of template-like elements.
    fn content(&self, _node: &Self::Node) -> Option<Self::Node> {
        None
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    fn set_text(&mut self, node: &Self::Node, text: &str);

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    /// Whether `name` is a live, settable property of this node.
    fn has_property(&self, _node: &Self::Node, _name: &str) -> bool {
        false
    }

    /// Current value of a live property.
    fn property(&self, _node: &Self::Node, _name: &str) -> Option<Value> {
        None
    }

    fn set_property(&mut self, _node: &Self::Node, name: &str, _value: &Value) -> Result<(), HostError> {
        Err(HostError::UnsupportedProperty(name.into()))
    }

    /// Replace the whole inline style text.
    fn set_style_text(&mut self, node: &Self::Node, css: &str);

    /// Set or clear one inline style declaration.
    fn set_style(&mut self, node: &Self::Node, name: &str, value: Option<&str>);

    /// Set or clear a custom (`--*`) style property.
    fn set_custom_style(&mut self, node: &Self::Node, name: &str, value: Option<&str>) {
        self.set_style(node, name, value);
    }

    fn add_event_listener(&mut self, node: &Self::Node, event: &str, capture: bool, listener: Listener);

    fn remove_event_listener(&mut self, node: &Self::Node, event: &str, capture: bool);

    /// Insert `node` into `parent` before `reference`, or append when `None`.
    /// Moves the node if it is already attached.
    fn insert_before(&mut self, parent: &Self::Node, node: &Self::Node, reference: Option<&Self::Node>);

    /// Detach `node` from its parent.
    fn remove(&mut self, node: &Self::Node);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_uri_roundtrip() {
        for ns in [Namespace::Html, Namespace::Svg, Namespace::MathMl] {
            assert_eq!(Namespace::from_uri(ns.uri()), ns);
        }
        assert_eq!(Namespace::from_uri("urn:unknown"), Namespace::Html);
    }

    #[test]
    fn test_event_detail() {
        let mut event = Event::new("input").with_detail(42u32);
        assert_eq!(event.kind(), "input");
        assert_eq!(event.detail::<u32>(), Some(&42));
        assert_eq!(event.detail::<String>(), None);
        assert!(!event.is_propagation_stopped());
        event.stop_propagation();
        assert!(event.is_propagation_stopped());
    }

    #[test]
    fn test_node_type_numbers() {
        assert_eq!(NodeType::Element as u8, 1);
        assert_eq!(NodeType::Text as u8, 3);
        assert_eq!(NodeType::Comment as u8, 8);
    }
}
