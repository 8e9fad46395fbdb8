//! Prop and state values
//!
//! Props, state and inline styles are ordered `(name, Value)` lists. Lookups
//! are linear, which beats hashing for the handful of entries a node carries.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use compact_str::{CompactString, format_compact};

use crate::host::Event;

use super::NodeRef;

/// Ordered name/value pairs. Used for props, state and style maps.
pub type Entries = Vec<(CompactString, Value)>;

/// Component state.
pub type State = Entries;

/// Extension trait for lookups on [`Entries`].
pub trait EntriesExt {
    /// Get a value by name
    fn get_value(&self, name: &str) -> Option<&Value>;

    /// Check if a name is present
    fn has_value(&self, name: &str) -> bool;

    /// Insert or update
    fn set_value(&mut self, name: impl Into<CompactString>, value: impl Into<Value>);

    /// Remove by name, returning the old value if present
    fn remove_value(&mut self, name: &str) -> Option<Value>;

    /// Assign every entry of `other` onto `self`
    fn merge(&mut self, other: Entries);
}

impl EntriesExt for Entries {
    fn get_value(&self, name: &str) -> Option<&Value> {
        self.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    fn has_value(&self, name: &str) -> bool {
        self.iter().any(|(k, _)| k == name)
    }

    fn set_value(&mut self, name: impl Into<CompactString>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value;
        } else {
            self.push((name, value));
        }
    }

    fn remove_value(&mut self, name: &str) -> Option<Value> {
        self.iter()
            .position(|(k, _)| k == name)
            .map(|pos| self.remove(pos).1)
    }

    fn merge(&mut self, other: Entries) {
        for (name, value) in other {
            self.set_value(name, value);
        }
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Event handler prop value. Compared by identity.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&mut Event)>);

impl Handler {
    pub fn new(f: impl Fn(&mut Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn call(&self, event: &mut Event) {
        (self.0)(event)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

// =============================================================================
// Value
// =============================================================================

/// Dynamically typed prop/state value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(CompactString),
    /// Inline style map (only meaningful for the `style` prop)
    Style(Entries),
    Handler(Handler),
    Ref(NodeRef),
    /// Opaque application data, compared by identity
    Any(Rc<dyn Any>),
}

impl Value {
    /// Wrap arbitrary data.
    pub fn any(data: impl Any) -> Self {
        Self::Any(Rc::new(data))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Truthiness with script semantics: null, false, 0, NaN and "" are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Self::Handler(h) => Some(h),
            _ => None,
        }
    }

    /// Borrow opaque data of type `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Any(data) => data.downcast_ref(),
            _ => None,
        }
    }

    /// Whether this value is callable (never rendered as an attribute).
    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Handler(_))
    }

    /// String form used for attributes and text. `None` for values that
    /// have no textual form (handlers, refs, opaque data, style maps).
    pub fn to_text(&self) -> Option<CompactString> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { "true".into() } else { "false".into() }),
            Self::Number(n) => Some(format_number(*n)),
            Self::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Format a number the way script engines print it: integral values carry
/// no fractional part.
pub(crate) fn format_number(n: f64) -> CompactString {
    if n.is_nan() {
        CompactString::const_new("NaN")
    } else if n.is_infinite() {
        if n > 0.0 {
            CompactString::const_new("Infinity")
        } else {
            CompactString::const_new("-Infinity")
        }
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format_compact!("{}", n as i64)
    } else {
        format_compact!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Style(a), Self::Style(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            (Self::Any(a), Self::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Style(entries) => f.debug_tuple("Style").field(entries).finish(),
            Self::Handler(h) => h.fmt(f),
            Self::Ref(r) => r.fmt(f),
            Self::Any(_) => f.write_str("Any(..)"),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

macro_rules! impl_value_from_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

impl_value_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl From<CompactString> for Value {
    fn from(s: CompactString) -> Self {
        Self::Str(s)
    }
}

impl From<Handler> for Value {
    fn from(h: Handler) -> Self {
        Self::Handler(h)
    }
}

impl From<NodeRef> for Value {
    fn from(r: NodeRef) -> Self {
        Self::Ref(r)
    }
}

impl From<Entries> for Value {
    fn from(entries: Entries) -> Self {
        Self::Style(entries)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_operations() {
        let mut entries: Entries = Vec::new();

        entries.set_value("count", 1);
        entries.set_value("label", "clicks");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.get_value("count"), Some(&Value::Number(1.0)));
        assert!(entries.has_value("label"));
        assert!(!entries.has_value("missing"));

        entries.set_value("count", 2);
        assert_eq!(entries.get_value("count"), Some(&Value::Number(2.0)));
        assert_eq!(entries.len(), 2, "update must not append");

        let removed = entries.remove_value("label");
        assert_eq!(removed, Some(Value::from("clicks")));
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_entries_merge_keeps_order() {
        let mut state: Entries = vec![("a".into(), 1.into()), ("b".into(), 2.into())];
        state.merge(vec![("b".into(), 3.into()), ("c".into(), 4.into())]);
        let names: Vec<&str> = state.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(state.get_value("b"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_string_and_number_are_distinct() {
        assert_ne!(Value::from("5"), Value::from(5));
        assert_eq!(Value::from(5).to_text().as_deref(), Some("5"));
        assert_eq!(Value::from("5").to_text().as_deref(), Some("5"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::any(()).is_truthy());
    }

    #[test]
    fn test_handler_identity() {
        let a = Handler::new(|_| {});
        let b = Handler::new(|_| {});
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn test_any_downcast() {
        let v = Value::any(7u8);
        assert_eq!(v.downcast_ref::<u8>(), Some(&7));
        assert_eq!(v.downcast_ref::<u16>(), None);
        assert!(!v.is_callable());
    }
}
