//! Host property reconciliation
//!
//! One prop at a time: `style` diffs declaration by declaration, `on*` props
//! go through the listener slots of [`super::events`], everything else is set
//! as a live property when the host exposes one and as an attribute otherwise.

use std::borrow::Cow;
use std::rc::Rc;

use tracing::trace;

use crate::host::{Host, Namespace};
use crate::node::{Entries, EntriesExt, Value};
use crate::render::Renderer;

use super::events::{ListenerSlot, event_name, proxy};

/// Names always written as attributes even when the host has a property of
/// the same name.
const ATTRIBUTE_ONLY: &[&str] = &[
    "width", "height", "href", "list", "form", "tabIndex", "tabindex", "download", "rowSpan", "colSpan", "role",
    "popover",
];

/// SVG prop spelling fixes: `xlinkHref`/`xlink:href` → `href`,
/// `className` → `class`.
fn normalize_svg_name(name: &str) -> Cow<'_, str> {
    let mut out = Cow::Borrowed(name);
    for pattern in ["xlinkH", "xlink:h"] {
        if let Some(at) = out.find(pattern) {
            let mut fixed = String::with_capacity(out.len());
            fixed.push_str(&out[..at]);
            fixed.push('h');
            fixed.push_str(&out[at + pattern.len()..]);
            out = Cow::Owned(fixed);
            break;
        }
    }
    if let Some(stem) = out.strip_suffix("sName") {
        out = Cow::Owned(format!("{stem}s"));
    }
    out
}

impl<H: Host> Renderer<H> {
    /// Bring one prop of `dom` from `old` to `value`.
    pub(crate) fn set_property(&mut self, dom: &H::Node, name: &str, value: &Value, old: &Value, namespace: Namespace) {
        if name == "style" {
            self.set_style(dom, value, old);
        } else if name.starts_with("on") {
            self.set_listener(dom, name, value, old);
        } else {
            self.set_attribute_or_property(dom, name, value, namespace);
        }
    }

    fn set_style(&mut self, dom: &H::Node, value: &Value, old: &Value) {
        if let Value::Str(css) = value {
            self.host.set_style_text(dom, css);
            return;
        }

        let mut old_entries: Option<&Entries> = match old {
            Value::Style(entries) => Some(entries),
            _ => None,
        };
        if matches!(old, Value::Str(_)) {
            self.host.set_style_text(dom, "");
            old_entries = None;
        }
        let new_entries = match value {
            Value::Style(entries) => Some(entries),
            _ => None,
        };

        if let Some(old_entries) = old_entries {
            for (name, _) in old_entries {
                if !new_entries.is_some_and(|new| new.has_value(name)) {
                    self.apply_style(dom, name, None);
                }
            }
        }
        if let Some(new_entries) = new_entries {
            for (name, value) in new_entries {
                if old_entries.and_then(|old| old.get_value(name)) != Some(value) {
                    self.apply_style(dom, name, value.to_text().as_deref());
                }
            }
        }
    }

    fn apply_style(&mut self, dom: &H::Node, name: &str, value: Option<&str>) {
        if name.starts_with('-') {
            self.host.set_custom_style(dom, name, value);
        } else {
            self.host.set_style(dom, name, value);
        }
    }

    fn set_listener(&mut self, dom: &H::Node, name: &str, value: &Value, old: &Value) {
        let (event, capture) = event_name(name);
        let key = (event.clone(), capture);

        let Some(handler) = value.as_handler() else {
            let removed = self.listeners.get_mut(dom).and_then(|map| map.remove(&key));
            if removed.is_some() {
                self.host.remove_event_listener(dom, &event, capture);
            }
            return;
        };

        let now = self.clock.now();
        let map = self.listeners.entry(dom.clone()).or_default();
        if let Some(slot) = map.get(&key) {
            slot.set_handler(handler.clone());
            if !old.is_callable() {
                slot.set_attached(now);
            }
            return;
        }

        let slot = Rc::new(ListenerSlot::new(handler.clone(), now));
        let listener = proxy(&slot, &self.clock);
        map.insert(key, slot);
        self.host.add_event_listener(dom, &event, capture, listener);
    }

    fn set_attribute_or_property(&mut self, dom: &H::Node, name: &str, value: &Value, namespace: Namespace) {
        let name: Cow<'_, str> = if namespace == Namespace::Svg {
            normalize_svg_name(name)
        } else {
            if !ATTRIBUTE_ONLY.contains(&name) && self.host.has_property(dom, name) {
                let assigned = if value.is_null() { Value::from("") } else { value.clone() };
                match self.host.set_property(dom, name, &assigned) {
                    Ok(()) => return,
                    Err(err) => trace!(name, %err, "property rejected, falling back to attribute"),
                }
            }
            Cow::Borrowed(name)
        };

        if value.is_callable() {
            return;
        }
        let keeps_false = name.as_bytes().get(4) == Some(&b'-');
        if !value.is_null() && (*value != Value::Bool(false) || keeps_false) {
            let text = if name == "popover" && *value == Value::Bool(true) {
                Some("".into())
            } else {
                value.to_text()
            };
            if let Some(text) = text {
                self.host.set_attribute(dom, &name, &text);
            }
        } else {
            self.host.remove_attribute(dom, &name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_svg_name() {
        assert_eq!(normalize_svg_name("xlinkHref"), "href");
        assert_eq!(normalize_svg_name("xlink:href"), "href");
        assert_eq!(normalize_svg_name("className"), "class");
        assert_eq!(normalize_svg_name("viewBox"), "viewBox");
        assert!(matches!(normalize_svg_name("fill"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_attribute_only_names() {
        for name in ["width", "href", "tabIndex", "popover"] {
            assert!(ATTRIBUTE_ONLY.contains(&name), "{name} must stay an attribute");
        }
        assert!(!ATTRIBUTE_ONLY.contains(&"value"));
    }
}
