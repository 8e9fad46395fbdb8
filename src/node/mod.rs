//! Virtual node model
//!
//! A [`VNode`] is an immutable, cheaply clonable description of one tree
//! position: a host element, a text leaf, a component invocation or a
//! fragment. Everything the engine learns while rendering a position lives in
//! the arena (see [`crate::tree`]), never on the description itself, so the
//! same `VNode` may be handed to the renderer any number of times.
//!
//! Every freshly constructed node draws a process-wide, strictly increasing
//! render sequence. [`VNode::copy`] keeps the sequence, which is how a
//! re-used description is recognized as "unchanged" by the diff.

mod child;
mod node_ref;
mod props;
mod value;

pub use child::{Child, is_valid_node, to_child_array};
pub use node_ref::{NodeRef, RefCleanup, RefValue, create_ref};
pub use props::Props;
pub use value::{Entries, EntriesExt, Handler, State, Value};

pub(crate) use value::format_number;

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use compact_str::CompactString;

use crate::component::ComponentType;

/// Sibling identity used for matching across renders.
pub type Key = CompactString;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[inline]
fn next_sequence() -> u64 {
    NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// Tag
// =============================================================================

/// Node kind plus the data that identifies it for matching.
#[derive(Clone)]
pub enum Tag {
    /// Host element with its tag name
    Element(CompactString),
    Text,
    Component(ComponentType),
    Fragment,
}

impl Tag {
    crate::impl_variant_checks!(Element(_), Text, Component(_), Fragment);

    /// Component and fragment positions own no host node of their own.
    #[inline]
    pub fn is_component_like(&self) -> bool {
        matches!(self, Self::Component(_) | Self::Fragment)
    }

    #[inline]
    pub fn element_name(&self) -> Option<&str> {
        match self {
            Self::Element(name) => Some(name),
            _ => None,
        }
    }

    #[inline]
    pub fn component_type(&self) -> Option<&ComponentType> {
        match self {
            Self::Component(ty) => Some(ty),
            _ => None,
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => a == b,
            (Self::Component(a), Self::Component(b)) => a == b,
            (Self::Text, Self::Text) | (Self::Fragment, Self::Fragment) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(name) => write!(f, "<{name}>"),
            Self::Text => f.write_str("#text"),
            Self::Component(ty) => write!(f, "<{}/>", ty.name()),
            Self::Fragment => f.write_str("<>"),
        }
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::Element(name.into())
    }
}

impl From<CompactString> for Tag {
    fn from(name: CompactString) -> Self {
        Self::Element(name)
    }
}

impl From<ComponentType> for Tag {
    fn from(ty: ComponentType) -> Self {
        Self::Component(ty)
    }
}

impl From<&ComponentType> for Tag {
    fn from(ty: &ComponentType) -> Self {
        Self::Component(ty.clone())
    }
}

// =============================================================================
// Text payload
// =============================================================================

/// Payload of a text node. A string and a number with the same printed form
/// are different payloads (the host text is rewritten, the node is kept).
#[derive(Debug, Clone, PartialEq)]
pub enum TextValue {
    Str(CompactString),
    Number(f64),
}

impl TextValue {
    pub fn to_text(&self) -> CompactString {
        match self {
            Self::Str(s) => s.clone(),
            Self::Number(n) => format_number(*n),
        }
    }
}

// =============================================================================
// VNode
// =============================================================================

struct VNodeData {
    tag: Tag,
    props: Props,
    text: Option<TextValue>,
    key: Option<Key>,
    node_ref: Option<NodeRef>,
    sequence: u64,
}

/// Shared virtual node description.
#[derive(Clone)]
pub struct VNode(Rc<VNodeData>);

impl VNode {
    fn from_parts(tag: Tag, props: Props, text: Option<TextValue>, key: Option<Key>, node_ref: Option<NodeRef>) -> Self {
        Self(Rc::new(VNodeData {
            tag,
            props,
            text,
            key,
            node_ref,
            sequence: next_sequence(),
        }))
    }

    /// Text leaf.
    pub fn text(value: TextValue) -> Self {
        Self::from_parts(Tag::Text, Props::new(), Some(value), None, None)
    }

    /// Unkeyed fragment over `children`.
    pub fn fragment(children: Vec<Child>) -> Self {
        Self::from_parts(Tag::Fragment, Props::new().with_children(children), None, None, None)
    }

    /// Shallow copy that keeps the render sequence.
    #[must_use]
    pub fn copy(&self) -> Self {
        let data = &*self.0;
        Self(Rc::new(VNodeData {
            tag: data.tag.clone(),
            props: data.props.clone(),
            text: data.text.clone(),
            key: data.key.clone(),
            node_ref: data.node_ref.clone(),
            sequence: data.sequence,
        }))
    }

    /// Same description with a key.
    #[must_use]
    pub fn with_key(self, key: impl Into<Key>) -> Self {
        let data = &*self.0;
        Self::from_parts(data.tag.clone(), data.props.clone(), data.text.clone(), Some(key.into()), data.node_ref.clone())
    }

    /// Same description with an external ref.
    #[must_use]
    pub fn with_ref(self, node_ref: NodeRef) -> Self {
        let data = &*self.0;
        Self::from_parts(data.tag.clone(), data.props.clone(), data.text.clone(), data.key.clone(), Some(node_ref))
    }

    #[inline]
    pub fn tag(&self) -> &Tag {
        &self.0.tag
    }

    #[inline]
    pub fn props(&self) -> &Props {
        &self.0.props
    }

    #[inline]
    pub fn children(&self) -> &[Child] {
        self.0.props.children()
    }

    #[inline]
    pub fn text_value(&self) -> Option<&TextValue> {
        self.0.text.as_ref()
    }

    #[inline]
    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    #[inline]
    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.0.node_ref.as_ref()
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.0.sequence
    }

    #[inline]
    pub fn component_type(&self) -> Option<&ComponentType> {
        self.0.tag.component_type()
    }

    #[inline]
    pub fn is_component_like(&self) -> bool {
        self.0.tag.is_component_like()
    }

    #[inline]
    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Matching identity: same key and same tag.
    #[inline]
    pub(crate) fn same_identity(&self, other: &Self) -> bool {
        self.0.key == other.0.key && self.0.tag == other.0.tag
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("tag", &self.0.tag);
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        if let Some(text) = &self.0.text {
            s.field("text", text);
        }
        s.field("sequence", &self.0.sequence).finish_non_exhaustive()
    }
}

// =============================================================================
// Construction
// =============================================================================

/// Split `key` and `ref` out of a prop set.
fn take_key_and_ref(props: &mut Props) -> (Option<Key>, Option<NodeRef>) {
    let key = props.remove("key").and_then(|v| v.to_text());
    let node_ref = match props.remove("ref") {
        Some(Value::Ref(r)) => Some(r),
        _ => None,
    };
    (key, node_ref)
}

/// Create a virtual node. `key` and `ref` entries of `props` become the
/// node's key and external ref; non-empty `children` replace
/// `props.children()`.
pub fn create_node<C: Into<Child>>(tag: impl Into<Tag>, mut props: Props, children: impl IntoIterator<Item = C>) -> VNode {
    let (key, node_ref) = take_key_and_ref(&mut props);
    let children: Vec<Child> = children.into_iter().map(Into::into).collect();
    if !children.is_empty() {
        props.set_children(children);
    }
    VNode::from_parts(tag.into(), props, None, key, node_ref)
}

/// Shorthand for [`create_node`].
#[inline]
pub fn h<C: Into<Child>>(tag: impl Into<Tag>, props: Props, children: impl IntoIterator<Item = C>) -> VNode {
    create_node(tag, props, children)
}

/// Clone `vnode` with prop overrides and optionally replaced children. The
/// result is a new node (fresh render sequence); key and ref are kept unless
/// overridden.
pub fn clone_node(vnode: &VNode, mut overrides: Props, children: Option<Vec<Child>>) -> VNode {
    let (key, node_ref) = take_key_and_ref(&mut overrides);
    let mut props = vnode.props().clone();
    props.assign(overrides);
    if let Some(children) = children {
        props.set_children(children);
    }
    VNode::from_parts(
        vnode.tag().clone(),
        props,
        vnode.text_value().cloned(),
        key.or_else(|| vnode.key().cloned()),
        node_ref.or_else(|| vnode.node_ref().cloned()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;

    #[test]
    fn test_create_node_extracts_key_and_ref() {
        let r = create_ref();
        let node = create_node("li", props! { "key" => "a", "ref" => r.clone(), "class" => "item" }, ["x"]);
        assert_eq!(node.key().map(|k| k.as_str()), Some("a"));
        assert_eq!(node.node_ref(), Some(&r));
        assert!(node.props().get("key").is_none());
        assert!(node.props().get("ref").is_none());
        assert_eq!(node.props().get("class"), Some(&Value::from("item")));
        assert_eq!(node.children().len(), 1);
    }

    #[test]
    fn test_numeric_key_is_stringified() {
        let node = create_node("li", props! { "key" => 3 }, Vec::<Child>::new());
        assert_eq!(node.key().map(|k| k.as_str()), Some("3"));
    }

    #[test]
    fn test_sequence_is_increasing_and_copy_preserves_it() {
        let a = create_node("div", Props::new(), Vec::<Child>::new());
        let b = create_node("div", Props::new(), Vec::<Child>::new());
        assert!(b.sequence() > a.sequence());

        let c = a.copy();
        assert_eq!(c.sequence(), a.sequence());
        assert!(!c.ptr_eq(&a));
    }

    #[test]
    fn test_clone_node_overrides() {
        let base = create_node("a", props! { "key" => "k", "href" => "/x", "title" => "t" }, ["link"]);
        let cloned = clone_node(&base, props! { "href" => "/y" }, Some(vec![Child::from("other")]));
        assert_eq!(cloned.key().map(|k| k.as_str()), Some("k"));
        assert_eq!(cloned.props().get("href"), Some(&Value::from("/y")));
        assert_eq!(cloned.props().get("title"), Some(&Value::from("t")));
        assert!(matches!(&cloned.children()[0], Child::Text(s) if s == "other"));
        assert_ne!(cloned.sequence(), base.sequence());

        let rekeyed = clone_node(&base, props! { "key" => "z" }, None);
        assert_eq!(rekeyed.key().map(|k| k.as_str()), Some("z"));
        assert!(matches!(&rekeyed.children()[0], Child::Text(s) if s == "link"));
    }

    #[test]
    fn test_tag_identity() {
        assert_eq!(Tag::from("div"), Tag::from("div"));
        assert_ne!(Tag::from("div"), Tag::from("span"));
        assert_ne!(Tag::Text, Tag::Fragment);
        assert!(Tag::Fragment.is_component_like());
        assert!(Tag::from("p").is_element());
        assert!(Tag::Text.is_text());
    }
}
