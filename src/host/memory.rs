//! In-memory host tree
//!
//! [`MemoryHost`] implements [`Host`] over a flat node table. Every call the
//! engine makes is appended to a [`Mutation`] log, which is what tests assert
//! on ("no host mutations", "exactly one insert"). [`MemoryHost::markup`]
//! serializes a subtree to HTML and [`MemoryHost::dispatch`] delivers events
//! through capture and bubble phases.

use std::fmt;

use compact_str::CompactString;

use crate::node::Value;

use super::{Event, Host, HostError, Listener, Namespace, NodeType};

/// Handle to a [`MemoryHost`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(u32);

impl HostId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Element (`name` is the tag) or text node (`name` is `#text`) created
    Create { node: HostId, name: CompactString },
    SetText { node: HostId, text: String },
    SetAttribute { node: HostId, name: CompactString, value: String },
    RemoveAttribute { node: HostId, name: CompactString },
    SetProperty { node: HostId, name: CompactString, value: Value },
    SetStyle { node: HostId, name: CompactString, value: Option<String> },
    SetStyleText { node: HostId, css: String },
    AddListener { node: HostId, event: CompactString, capture: bool },
    RemoveListener { node: HostId, event: CompactString, capture: bool },
    Insert { parent: HostId, node: HostId, before: Option<HostId> },
    Remove { node: HostId },
}

impl Mutation {
    /// Whether this call changed the structure of the tree.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Remove { .. })
    }
}

enum Kind {
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
}

struct ElementData {
    tag: CompactString,
    namespace: Namespace,
    attributes: Vec<(CompactString, String)>,
    style: Vec<(CompactString, String)>,
    properties: Vec<(CompactString, Value)>,
    listeners: Vec<(CompactString, bool, Listener)>,
    /// Template content container
    content: Option<HostId>,
}

struct NodeData {
    kind: Kind,
    parent: Option<HostId>,
    children: Vec<HostId>,
}

/// Elements whose children are not serialized and never present.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

fn is_live_property(tag: &str, name: &str) -> bool {
    match name {
        "value" => matches!(
            tag,
            "input" | "textarea" | "select" | "option" | "progress" | "button" | "output" | "data" | "meter" | "li"
        ),
        "checked" | "indeterminate" => tag == "input",
        "selected" => tag == "option",
        "muted" => matches!(tag, "audio" | "video"),
        _ => false,
    }
}

/// Flat in-memory node table implementing [`Host`].
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<NodeData>,
    log: Vec<Mutation>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: Kind) -> HostId {
        let id = HostId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: &HostId) -> Option<&NodeData> {
        self.nodes.get(id.index())
    }

    fn element(&self, id: &HostId) -> Option<&ElementData> {
        match &self.node(id)?.kind {
            Kind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: &HostId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.index())?.kind {
            Kind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn new_element(&mut self, namespace: Namespace, tag: &str) -> HostId {
        let content = (tag == "template").then(|| self.alloc(Kind::Fragment));
        let id = self.alloc(Kind::Element(ElementData {
            tag: tag.into(),
            namespace,
            attributes: Vec::new(),
            style: Vec::new(),
            properties: Vec::new(),
            listeners: Vec::new(),
            content,
        }));
        self.log.push(Mutation::Create {
            node: id,
            name: tag.into(),
        });
        id
    }

    fn detach(&mut self, id: HostId) {
        let Some(parent) = self.nodes.get_mut(id.index()).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(parent.index()) {
            parent.children.retain(|child| *child != id);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Setup helpers (not logged)
    // ─────────────────────────────────────────────────────────────────────────

    /// Detached element to render into.
    pub fn create_root(&mut self, tag: &str) -> HostId {
        let id = self.new_element(Namespace::Html, tag);
        self.log.pop();
        id
    }

    /// Comment node, e.g. a suspense marker for hydration tests.
    pub fn create_comment(&mut self, data: &str) -> HostId {
        self.alloc(Kind::Comment(data.into()))
    }

    /// Append `child` to `parent` without logging, for building existing
    /// markup before a hydration test.
    pub fn append(&mut self, parent: HostId, child: HostId) {
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(child.index()) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent.index()) {
            node.children.push(child);
        }
    }

    /// Build an element with attributes without logging.
    pub fn build(&mut self, parent: HostId, tag: &str, attributes: &[(&str, &str)]) -> HostId {
        let id = self.new_element(Namespace::Html, tag);
        self.log.pop();
        if let Some(data) = self.element_mut(&id) {
            data.attributes = attributes.iter().map(|(k, v)| ((*k).into(), (*v).to_string())).collect();
        }
        self.append(parent, id);
        id
    }

    /// Build a text node without logging.
    pub fn build_text(&mut self, parent: HostId, text: &str) -> HostId {
        let id = self.alloc(Kind::Text(text.into()));
        self.append(parent, id);
        id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    pub fn mutations(&self) -> &[Mutation] {
        &self.log
    }

    /// Drain the mutation log.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.log)
    }

    pub fn attribute(&self, node: HostId, name: &str) -> Option<&str> {
        self.element(&node)?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn style_value(&self, node: HostId, name: &str) -> Option<&str> {
        self.element(&node)?
            .style
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of listeners registered on `node`.
    pub fn listener_count(&self, node: HostId) -> usize {
        self.element(&node).map_or(0, |data| data.listeners.len())
    }

    /// Whether `node` is reachable from `root`.
    pub fn contains(&self, root: HostId, node: HostId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == root {
                return true;
            }
            cursor = self.node(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Serialize `node` and its subtree.
    pub fn markup(&self, node: HostId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialize the children of `node`.
    pub fn inner_markup(&self, node: HostId) -> String {
        let mut out = String::new();
        for child in self.node(&node).map(|n| n.children.as_slice()).unwrap_or_default() {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: HostId, out: &mut String) {
        let Some(node) = self.node(&id) else {
            return;
        };
        match &node.kind {
            Kind::Text(text) => out.push_str(&escape_html(text)),
            Kind::Comment(data) => {
                out.push_str("<!--");
                out.push_str(data);
                out.push_str("-->");
            }
            Kind::Fragment => {
                for child in &node.children {
                    self.write_node(*child, out);
                }
            }
            Kind::Element(data) => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                if !data.style.is_empty() {
                    out.push_str(" style=\"");
                    out.push_str(&escape_attr(&style_text(&data.style)));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&data.tag.as_str()) {
                    return;
                }
                let children = data.content.and_then(|c| self.node(&c)).map_or(&node.children, |c| &c.children);
                for child in children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&data.tag);
                out.push('>');
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    /// Deliver `event` at `target`: capture listeners from the outermost
    /// ancestor down, then bubble listeners from `target` up. Returns `false`
    /// if a listener prevented the default action.
    pub fn dispatch(&self, target: HostId, event: &mut Event) -> bool {
        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(id) = cursor {
            path.push(id);
            cursor = self.node(&id).and_then(|n| n.parent);
        }

        let phases = path.iter().rev().map(|id| (*id, true)).chain(path.iter().map(|id| (*id, false)));
        for (id, capture) in phases {
            let listeners: Vec<Listener> = self
                .element(&id)
                .map(|data| {
                    data.listeners
                        .iter()
                        .filter(|(name, c, _)| name == event.kind() && *c == capture)
                        .map(|(_, _, listener)| listener.clone())
                        .collect()
                })
                .unwrap_or_default();
            for listener in listeners {
                listener(event);
            }
            if event.is_propagation_stopped() {
                break;
            }
        }
        !event.is_default_prevented()
    }
}

fn style_text(style: &[(CompactString, String)]) -> String {
    style
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

fn escape_attr(s: &str) -> String {
    escape_html(s).replace('"', "&quot;")
}

impl Host for MemoryHost {
    type Node = HostId;

    fn create_element(&mut self, tag: &str) -> HostId {
        self.new_element(Namespace::Html, tag)
    }

    fn create_element_ns(&mut self, namespace: Namespace, tag: &str) -> HostId {
        self.new_element(namespace, tag)
    }

    fn create_text(&mut self, text: &str) -> HostId {
        let id = self.alloc(Kind::Text(text.into()));
        self.log.push(Mutation::Create {
            node: id,
            name: "#text".into(),
        });
        id
    }

    fn node_type(&self, node: &HostId) -> NodeType {
        match self.node(node).map(|n| &n.kind) {
            Some(Kind::Element(_)) => NodeType::Element,
            Some(Kind::Text(_)) => NodeType::Text,
            Some(Kind::Comment(_)) => NodeType::Comment,
            Some(Kind::Fragment) | None => NodeType::Fragment,
        }
    }

    fn local_name(&self, node: &HostId) -> Option<CompactString> {
        self.element(node).map(|data| data.tag.clone())
    }

    fn namespace(&self, node: &HostId) -> Namespace {
        self.element(node).map_or(Namespace::Html, |data| data.namespace)
    }

    fn parent_node(&self, node: &HostId) -> Option<HostId> {
        self.node(node)?.parent
    }

    fn next_sibling(&self, node: &HostId) -> Option<HostId> {
        let parent = self.node(node)?.parent?;
        let siblings = &self.node(&parent)?.children;
        let at = siblings.iter().position(|child| child == node)?;
        siblings.get(at + 1).copied()
    }

    fn child_nodes(&self, node: &HostId) -> Vec<HostId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn first_child(&self, node: &HostId) -> Option<HostId> {
        self.node(node)?.children.first().copied()
    }

    fn text(&self, node: &HostId) -> String {
        match self.node(node).map(|n| &n.kind) {
            Some(Kind::Text(text) | Kind::Comment(text)) => text.clone(),
            _ => String::new(),
        }
    }

    fn attributes(&self, node: &HostId) -> Vec<(CompactString, String)> {
        let Some(data) = self.element(node) else {
            return Vec::new();
        };
        let mut attributes = data.attributes.clone();
        if !data.style.is_empty() {
            attributes.push(("style".into(), style_text(&data.style)));
        }
        attributes
    }

    fn content(&self, node: &HostId) -> Option<HostId> {
        self.element(node)?.content
    }

    fn set_text(&mut self, node: &HostId, text: &str) {
        if let Some(NodeData {
            kind: Kind::Text(value) | Kind::Comment(value),
            ..
        }) = self.nodes.get_mut(node.index())
        {
            *value = text.to_string();
            self.log.push(Mutation::SetText {
                node: *node,
                text: text.to_string(),
            });
        }
    }

    fn set_attribute(&mut self, node: &HostId, name: &str, value: &str) {
        let Some(data) = self.element_mut(node) else {
            return;
        };
        match data.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => data.attributes.push((name.into(), value.to_string())),
        }
        self.log.push(Mutation::SetAttribute {
            node: *node,
            name: name.into(),
            value: value.to_string(),
        });
    }

    fn remove_attribute(&mut self, node: &HostId, name: &str) {
        let Some(data) = self.element_mut(node) else {
            return;
        };
        let before = data.attributes.len();
        data.attributes.retain(|(k, _)| k != name);
        if data.attributes.len() != before {
            self.log.push(Mutation::RemoveAttribute {
                node: *node,
                name: name.into(),
            });
        }
    }

    fn has_property(&self, node: &HostId, name: &str) -> bool {
        self.element(node).is_some_and(|data| is_live_property(&data.tag, name))
    }

    fn property(&self, node: &HostId, name: &str) -> Option<Value> {
        let data = self.element(node)?;
        if !is_live_property(&data.tag, name) {
            return None;
        }
        if let Some((_, value)) = data.properties.iter().find(|(k, _)| k == name) {
            return Some(value.clone());
        }
        let attribute = data.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v);
        Some(match name {
            "value" => Value::from(attribute.cloned().unwrap_or_default()),
            _ => Value::Bool(attribute.is_some()),
        })
    }

    fn set_property(&mut self, node: &HostId, name: &str, value: &Value) -> Result<(), HostError> {
        let Some(data) = self.element_mut(node) else {
            return Err(HostError::UnsupportedProperty(name.into()));
        };
        if !is_live_property(&data.tag, name) {
            return Err(HostError::UnsupportedProperty(name.into()));
        }
        let stored = if name == "value" {
            match value.to_text() {
                Some(text) => Value::Str(text),
                None => {
                    return Err(HostError::InvalidValue {
                        name: name.into(),
                        reason: format!("{value:?} is not textual"),
                    });
                }
            }
        } else {
            Value::Bool(value.is_truthy())
        };
        match data.properties.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = stored.clone(),
            None => data.properties.push((name.into(), stored.clone())),
        }
        self.log.push(Mutation::SetProperty {
            node: *node,
            name: name.into(),
            value: stored,
        });
        Ok(())
    }

    fn set_style_text(&mut self, node: &HostId, css: &str) {
        let Some(data) = self.element_mut(node) else {
            return;
        };
        data.style = css
            .split(';')
            .filter_map(|decl| {
                let (name, value) = decl.split_once(':')?;
                let name = name.trim();
                (!name.is_empty()).then(|| (name.into(), value.trim().to_string()))
            })
            .collect();
        self.log.push(Mutation::SetStyleText {
            node: *node,
            css: css.to_string(),
        });
    }

    fn set_style(&mut self, node: &HostId, name: &str, value: Option<&str>) {
        let Some(data) = self.element_mut(node) else {
            return;
        };
        match value.filter(|v| !v.is_empty()) {
            Some(value) => match data.style.iter_mut().find(|(k, _)| k == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => data.style.push((name.into(), value.to_string())),
            },
            None => data.style.retain(|(k, _)| k != name),
        }
        self.log.push(Mutation::SetStyle {
            node: *node,
            name: name.into(),
            value: value.map(str::to_string),
        });
    }

    fn add_event_listener(&mut self, node: &HostId, event: &str, capture: bool, listener: Listener) {
        let Some(data) = self.element_mut(node) else {
            return;
        };
        data.listeners.retain(|(name, c, _)| !(name == event && *c == capture));
        data.listeners.push((event.into(), capture, listener));
        self.log.push(Mutation::AddListener {
            node: *node,
            event: event.into(),
            capture,
        });
    }

    fn remove_event_listener(&mut self, node: &HostId, event: &str, capture: bool) {
        let Some(data) = self.element_mut(node) else {
            return;
        };
        data.listeners.retain(|(name, c, _)| !(name == event && *c == capture));
        self.log.push(Mutation::RemoveListener {
            node: *node,
            event: event.into(),
            capture,
        });
    }

    fn insert_before(&mut self, parent: &HostId, node: &HostId, reference: Option<&HostId>) {
        self.detach(*node);
        let Some(parent_data) = self.nodes.get_mut(parent.index()) else {
            return;
        };
        let at = reference
            .and_then(|r| parent_data.children.iter().position(|child| child == r))
            .unwrap_or(parent_data.children.len());
        parent_data.children.insert(at, *node);
        if let Some(data) = self.nodes.get_mut(node.index()) {
            data.parent = Some(*parent);
        }
        self.log.push(Mutation::Insert {
            parent: *parent,
            node: *node,
            before: reference.copied(),
        });
    }

    fn remove(&mut self, node: &HostId) {
        self.detach(*node);
        self.log.push(Mutation::Remove { node: *node });
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("nodes", &self.nodes.len())
            .field("mutations", &self.log.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_insert_and_markup() {
        let mut host = MemoryHost::new();
        let root = host.create_root("main");
        let p = host.create_element("p");
        let text = host.create_text("a < b");
        host.insert_before(&p, &text, None);
        host.set_attribute(&p, "title", "say \"hi\"");
        host.insert_before(&root, &p, None);
        assert_eq!(host.inner_markup(root), r#"<p title="say &quot;hi&quot;">a &lt; b</p>"#);
        assert_eq!(host.markup(root), r#"<main><p title="say &quot;hi&quot;">a &lt; b</p></main>"#);
    }

    #[test]
    fn test_insert_before_moves() {
        let mut host = MemoryHost::new();
        let root = host.create_root("ul");
        let a = host.build(root, "li", &[]);
        let b = host.build(root, "li", &[]);
        let c = host.build(root, "li", &[]);
        host.insert_before(&root, &c, Some(&a));
        assert_eq!(host.child_nodes(&root), [c, a, b]);
        assert_eq!(host.next_sibling(&a), Some(b));
        assert_eq!(host.next_sibling(&b), None);
        assert_eq!(host.mutations().len(), 1, "setup helpers are not logged");
    }

    #[test]
    fn test_remove_detaches() {
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        let span = host.build(root, "span", &[]);
        host.remove(&span);
        assert_eq!(host.parent_node(&span), None);
        assert!(host.child_nodes(&root).is_empty());
        assert!(!host.contains(root, span));
    }

    #[test]
    fn test_style_text_and_declarations() {
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        host.set_style_text(&root, "color: red; margin: 0");
        assert_eq!(host.style_value(root, "color"), Some("red"));
        host.set_style(&root, "color", None);
        host.set_style(&root, "padding", Some("1px"));
        assert_eq!(host.markup(root), r#"<div style="margin: 0; padding: 1px"></div>"#);
        assert_eq!(
            host.attributes(&root),
            [(CompactString::from("style"), "margin: 0; padding: 1px".to_string())]
        );
    }

    #[test]
    fn test_live_properties() {
        let mut host = MemoryHost::new();
        let input = host.create_element("input");
        let div = host.create_element("div");
        assert!(host.has_property(&input, "value"));
        assert!(!host.has_property(&div, "value"));

        host.set_attribute(&input, "value", "initial");
        assert_eq!(host.property(&input, "value"), Some(Value::from("initial")));
        assert!(host.set_property(&input, "value", &Value::from(3)).is_ok());
        assert_eq!(host.property(&input, "value"), Some(Value::from("3")));
        assert_eq!(host.attribute(input, "value"), Some("initial"), "property does not reflect");

        assert_eq!(host.property(&input, "checked"), Some(Value::Bool(false)));
        assert!(host.set_property(&input, "checked", &Value::Bool(true)).is_ok());
        assert_eq!(host.property(&input, "checked"), Some(Value::Bool(true)));

        let err = host.set_property(&div, "value", &Value::from("x"));
        assert!(matches!(err, Err(HostError::UnsupportedProperty(_))));
    }

    #[test]
    fn test_template_content() {
        let mut host = MemoryHost::new();
        let template = host.create_element("template");
        let content = host.content(&template);
        assert!(content.is_some());
        assert_eq!(content.map(|c| host.node_type(&c)), Some(NodeType::Fragment));
    }

    #[test]
    fn test_dispatch_phases() {
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        let button = host.build(root, "button", &[]);
        let order = Rc::new(RefCell::new(Vec::new()));

        for (node, label, capture) in [
            (root, "root-capture", true),
            (root, "root-bubble", false),
            (button, "button-bubble", false),
            (button, "button-capture", true),
        ] {
            let order = order.clone();
            host.add_event_listener(&node, "click", capture, Rc::new(move |_: &mut Event| order.borrow_mut().push(label)));
        }

        assert!(host.dispatch(button, &mut Event::new("click")));
        assert_eq!(
            *order.borrow(),
            ["root-capture", "button-capture", "button-bubble", "root-bubble"]
        );
    }

    #[test]
    fn test_dispatch_stop_and_prevent() {
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        let link = host.build(root, "a", &[("href", "/")]);
        let hits = Rc::new(RefCell::new(0));

        host.add_event_listener(
            &link,
            "click",
            false,
            Rc::new(|event: &mut Event| {
                event.prevent_default();
                event.stop_propagation();
            }),
        );
        let h = hits.clone();
        host.add_event_listener(&root, "click", false, Rc::new(move |_: &mut Event| *h.borrow_mut() += 1));

        assert!(!host.dispatch(link, &mut Event::new("click")));
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn test_comments_serialize() {
        let mut host = MemoryHost::new();
        let root = host.create_root("div");
        let open = host.create_comment("$s");
        host.append(root, open);
        host.build_text(root, "x");
        assert_eq!(host.inner_markup(root), "<!--$s-->x");
        assert_eq!(host.node_type(&open), NodeType::Comment);
        assert_eq!(host.text(&open), "$s");
    }
}
