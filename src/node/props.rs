//! Node props

use compact_str::CompactString;

use super::{Child, Entries, EntriesExt, Value};

/// Props of an element or component invocation.
///
/// Children are kept apart from the named entries so that components can
/// hand them back unchanged and elements can diff them without a lookup.
#[derive(Debug, Clone, Default)]
pub struct Props {
    entries: Entries,
    children: Vec<Child>,
}

impl Props {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs.
    pub fn from_entries(entries: Entries) -> Self {
        Self {
            entries,
            children: Vec::new(),
        }
    }

    /// Builder-style [`Props::set`].
    #[must_use]
    pub fn with(mut self, name: impl Into<CompactString>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder-style [`Props::set_children`].
    #[must_use]
    pub fn with_children(mut self, children: Vec<Child>) -> Self {
        self.children = children;
        self
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get_value(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.has_value(name)
    }

    pub fn set(&mut self, name: impl Into<CompactString>, value: impl Into<Value>) {
        self.entries.set_value(name, value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.remove_value(name)
    }

    /// Named entries in insertion order.
    #[inline]
    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn set_children(&mut self, children: Vec<Child>) {
        self.children = children;
    }

    /// Number of named entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.children.is_empty()
    }

    /// Apply `overrides` on top of these props. Override children replace
    /// the current ones only when present.
    pub(crate) fn assign(&mut self, overrides: Props) {
        self.entries.merge(overrides.entries);
        if !overrides.children.is_empty() {
            self.children = overrides.children;
        }
    }
}

impl From<Entries> for Props {
    fn from(entries: Entries) -> Self {
        Self::from_entries(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_props_builder() {
        let props = Props::new()
            .with("id", "main")
            .with("tabIndex", 2)
            .with_children(vec![Child::from("hi")]);
        assert_eq!(props.get("id"), Some(&Value::from("main")));
        assert_eq!(props.len(), 2);
        assert_eq!(props.children().len(), 1);
        let names: Vec<&str> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["id", "tabIndex"]);
    }

    #[test]
    fn test_props_assign() {
        let mut props = Props::new().with("a", 1).with_children(vec![Child::from("x")]);
        props.assign(Props::new().with("a", 2).with("b", 3));
        assert_eq!(props.get("a"), Some(&Value::from(2)));
        assert_eq!(props.get("b"), Some(&Value::from(3)));
        assert_eq!(props.children().len(), 1, "empty override keeps children");
    }
}
