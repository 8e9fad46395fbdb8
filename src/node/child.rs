//! Child descriptions
//!
//! What a component returns and what an element lists as children. Empty
//! entries keep their slot so conditional children do not shift positions.

use compact_str::CompactString;

use super::VNode;

/// One entry of a children list.
#[derive(Debug, Clone, Default)]
pub enum Child {
    /// Renders nothing (null, undefined and booleans)
    #[default]
    Empty,
    Node(VNode),
    Text(CompactString),
    Number(f64),
    /// Nested list, rendered as an implicit fragment
    List(Vec<Child>),
}

impl Child {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[inline]
    pub fn as_node(&self) -> Option<&VNode> {
        match self {
            Self::Node(vnode) => Some(vnode),
            _ => None,
        }
    }
}

/// Deep-flatten children, dropping empty entries.
pub fn to_child_array(children: &[Child]) -> Vec<Child> {
    fn walk(children: &[Child], out: &mut Vec<Child>) {
        for child in children {
            match child {
                Child::Empty => {}
                Child::List(items) => walk(items, out),
                other => out.push(other.clone()),
            }
        }
    }
    let mut out = Vec::with_capacity(children.len());
    walk(children, &mut out);
    out
}

/// Whether `child` is a virtual node (as opposed to text, a list or nothing).
#[inline]
pub fn is_valid_node(child: &Child) -> bool {
    matches!(child, Child::Node(_))
}

// =============================================================================
// Conversions
// =============================================================================

impl From<VNode> for Child {
    fn from(vnode: VNode) -> Self {
        Self::Node(vnode)
    }
}

impl From<&VNode> for Child {
    fn from(vnode: &VNode) -> Self {
        Self::Node(vnode.clone())
    }
}

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Self::Text(s.into())
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Self::Text(s.into())
    }
}

impl From<CompactString> for Child {
    fn from(s: CompactString) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Self::Empty
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<Vec<Child>> for Child {
    fn from(items: Vec<Child>) -> Self {
        Self::List(items)
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Empty, Into::into)
    }
}

macro_rules! impl_child_from_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Child {
                fn from(n: $ty) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

impl_child_from_number!(f64, f32, i32, i64, u32, u64, usize);
