//! Host element and text diff

use crate::error::RenderResult;
use crate::host::{Host, Namespace, NodeType};
use crate::node::{Props, TextValue, VNode, Value};
use crate::render::Renderer;
use crate::tree::NodeId;

use super::{Anchor, Excess, Frame, Outcome, Pass, Site};

impl<H: Host> Renderer<H> {
    /// Create, adopt or update the host node of an element or text position,
    /// then reconcile its props and children.
    pub(crate) fn diff_element(
        &mut self,
        pass: &mut Pass,
        site: Site<'_, H::Node>,
        id: NodeId,
        vnode: &VNode,
        old: Option<&VNode>,
        excess: &mut Excess<H::Node>,
    ) -> RenderResult<Outcome<H::Node>> {
        let tag = vnode.tag().element_name();
        let mut hydrating = site.hydrating;
        let namespace = match tag {
            Some("svg") => Namespace::Svg,
            Some("math") => Namespace::MathMl,
            _ => site.frame.namespace,
        };

        let mut dom = self.tree.dom(id);
        if let Some(list) = excess.as_mut() {
            for slot in list.iter_mut() {
                let fits = slot.as_ref().is_some_and(|node| match tag {
                    Some(tag) => {
                        self.host.node_type(node) == NodeType::Element && self.host.local_name(node).as_deref() == Some(tag)
                    }
                    None => self.host.node_type(node) == NodeType::Text,
                });
                if fits {
                    dom = slot.take();
                    break;
                }
            }
        }

        let mut reads_existing = excess.is_some();
        let dom = match dom {
            Some(dom) => {
                self.stats.nodes_reused += 1;
                dom
            }
            None => {
                self.stats.nodes_created += 1;
                let Some(tag) = tag else {
                    let text = vnode.text_value().map(TextValue::to_text).unwrap_or_default();
                    let node = self.host.create_text(&text);
                    self.tree.set_dom(id, Some(node.clone()));
                    return Ok(Outcome {
                        anchor: Anchor::At(Some(node)),
                        kept_children: false,
                    });
                };
                // A fresh parent: nothing below it can be adopted.
                hydrating = false;
                reads_existing = false;
                if namespace == Namespace::Html {
                    self.host.create_element(tag)
                } else {
                    self.host.create_element_ns(namespace, tag)
                }
            }
        };
        self.tree.set_dom(id, Some(dom.clone()));

        let Some(tag) = tag else {
            if let Some(value) = vnode.text_value() {
                let text = value.to_text();
                let changed = old.and_then(VNode::text_value) != Some(value);
                if changed && (!hydrating || self.host.text(&dom) != text.as_str()) {
                    self.host.set_text(&dom, &text);
                }
            }
            return Ok(Outcome {
                anchor: Anchor::At(Some(dom)),
                kept_children: old.is_some(),
            });
        };

        let mut child_excess: Excess<H::Node> =
            reads_existing.then(|| self.host.child_nodes(&dom).into_iter().map(Some).collect());

        let new_props = vnode.props();
        let old_props = if !hydrating && child_excess.is_some() {
            Props::from_entries(
                self.host
                    .attributes(&dom)
                    .into_iter()
                    .map(|(name, value)| (name, Value::from(value)))
                    .collect(),
            )
        } else {
            old.map(|o| o.props().clone()).unwrap_or_default()
        };

        for (name, value) in old_props.iter() {
            if new_props.contains(name) {
                continue;
            }
            if (name == "value" && new_props.contains("defaultValue"))
                || (name == "checked" && new_props.contains("defaultChecked"))
            {
                continue;
            }
            self.set_property(&dom, name, &Value::Null, value, namespace);
        }

        let mut input_value = None;
        let mut checked = None;
        for (name, value) in new_props.iter() {
            match name {
                "value" => input_value = Some(value),
                "checked" => checked = Some(value),
                _ => {
                    let previous = old_props.get(name);
                    if (!hydrating || value.is_callable()) && previous != Some(value) {
                        self.set_property(&dom, name, value, previous.unwrap_or(&Value::Null), namespace);
                    }
                }
            }
        }

        let parent_dom = self.host.content(&dom).unwrap_or_else(|| dom.clone());
        let frame = Frame {
            context: site.frame.context.clone(),
            namespace: if tag == "foreignObject" { Namespace::Html } else { namespace },
        };
        let anchor = match &child_excess {
            Some(list) => list.first().cloned().flatten(),
            None if self.tree.state(id).is_some_and(|s| s.children.is_some()) => self.dom_sibling(id, Some(0)),
            None => None,
        };
        let child_site = Site {
            frame: &frame,
            parent_dom: &parent_dom,
            old_dom: anchor,
            hydrating,
            rerender: false,
        };
        self.diff_children(pass, child_site, id, vnode.children(), &mut child_excess)?;

        if let Some(list) = child_excess {
            for node in list.into_iter().flatten() {
                self.remove_node(&node);
            }
        }

        if !hydrating {
            let is_progress = tag == "progress";
            match input_value.filter(|v| !v.is_null()) {
                None if is_progress => self.host.remove_attribute(&dom, "value"),
                Some(value)
                    if self.host.property(&dom, "value").as_ref() != Some(value) || (is_progress && !value.is_truthy()) =>
                {
                    let previous = old_props.get("value").cloned().unwrap_or_default();
                    self.set_property(&dom, "value", value, &previous, namespace);
                }
                _ => {}
            }
            if let Some(value) = checked.filter(|v| !v.is_null()) {
                if self.host.property(&dom, "checked").as_ref() != Some(value) {
                    let previous = old_props.get("checked").cloned().unwrap_or_default();
                    self.set_property(&dom, "checked", value, &previous, namespace);
                }
            }
        }

        Ok(Outcome::at(Some(dom)))
    }
}
