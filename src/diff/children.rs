//! Child list reconciliation
//!
//! Matching uses a running skew: the new child at position `i` is first
//! compared with the old child at `i + skew`, and only searched for when that
//! slot is not a match. Appends, truncations, single inserts and removals and
//! adjacent swaps all resolve without a search and without host moves.
//!
//! ```text
//! old:  a b c        new:  c a b
//! i=0  c  skewed 0 → search → found at 2 (offset 2) → move, skew -1
//! i=1  a  skewed 0 → hit
//! i=2  b  skewed 1 → hit
//! ```

use tracing::trace;

use crate::error::{RenderError, RenderResult};
use crate::host::{Host, NodeType};
use crate::node::{Child, RefValue, TextValue, VNode};
use crate::render::Renderer;
use crate::tree::{ChildList, NodeFlags, NodeId};

use super::{Anchor, Excess, Pass, PendingRef, Site};

/// New child paired with its record.
struct Placed {
    id: NodeId,
    /// Previous description when an existing record was reused
    old: Option<VNode>,
}

/// Turn one child description into a node, or `None` for an empty slot.
fn normalize(child: &Child) -> Option<VNode> {
    match child {
        Child::Empty => None,
        Child::Node(vnode) => Some(vnode.clone()),
        Child::Text(text) => Some(VNode::text(TextValue::Str(text.clone()))),
        Child::Number(n) => Some(VNode::text(TextValue::Number(*n))),
        Child::List(items) => Some(VNode::fragment(items.clone())),
    }
}

impl<H: Host> Renderer<H> {
    /// Reconcile the children of `parent` with `children`. Returns the
    /// insertion point after the last child.
    pub(crate) fn diff_children(
        &mut self,
        pass: &mut Pass,
        site: Site<'_, H::Node>,
        parent: NodeId,
        children: &[Child],
        excess: &mut Excess<H::Node>,
    ) -> RenderResult<Option<H::Node>> {
        let (placed, mut old_dom, teardown_error) = self.construct(parent, children, site.old_dom.clone());
        let mut first_dom: Option<H::Node> = None;

        for (index, slot) in placed.into_iter().enumerate() {
            let Some(Placed { id, old }) = slot else {
                continue;
            };
            if let Some(state) = self.tree.state_mut(id) {
                state.index = index;
            }
            let child_site = Site {
                frame: site.frame,
                parent_dom: site.parent_dom,
                old_dom: old_dom.clone(),
                hydrating: site.hydrating,
                rerender: false,
            };
            let old_ref = old.as_ref().and_then(|o| o.node_ref().cloned());
            let outcome = self.diff(pass, child_site, id, old, excess)?;

            let new_dom = self.tree.dom(id);
            let new_ref = self.tree.vnode(id).and_then(|v| v.node_ref().cloned());
            if let Some(node_ref) = new_ref.filter(|r| old_ref.as_ref() != Some(r)) {
                if let Some(previous) = old_ref {
                    if let Err(err) = previous.apply(None) {
                        self.catch_error(err, id)?;
                    }
                }
                let value = match self.tree.instance_of(id).and_then(|iid| self.tree.instance(iid)) {
                    Some(inst) => Some(RefValue::Component(inst.updater.clone())),
                    None => new_dom.as_ref().map(RefValue::host),
                };
                pass.refs.push(PendingRef { node_ref, value, at: id });
            }

            if first_dom.is_none() && new_dom.is_some() {
                first_dom = new_dom.clone();
            }

            let place = self.tree.flags(id).contains(NodeFlags::INSERT);
            if place || outcome.kept_children {
                old_dom = self.insert(id, old_dom, site.parent_dom, place);
            } else if let (true, Anchor::At(anchor)) = (self.tree.is_component_like(id), &outcome.anchor) {
                old_dom = anchor.clone();
            } else if let Some(dom) = &new_dom {
                old_dom = self.host.next_sibling(dom);
            }

            self.tree.remove_flags(id, NodeFlags::INSERT | NodeFlags::MATCHED);
        }

        if self.tree.is_component_like(parent) {
            self.tree.set_dom(parent, first_dom);
        }
        match teardown_error {
            Some(err) => Err(err),
            None => Ok(old_dom),
        }
    }

    /// Pair every new child with an old record (or a fresh one), install the
    /// new child list on `parent` and tear down unmatched old children.
    fn construct(
        &mut self,
        parent: NodeId,
        children: &[Child],
        mut old_dom: Option<H::Node>,
    ) -> (Vec<Option<Placed>>, Option<H::Node>, Option<RenderError>) {
        let old_children: ChildList = self
            .tree
            .state(parent)
            .and_then(|s| s.children.clone())
            .unwrap_or_default();
        let new_len = children.len() as isize;
        let old_len = old_children.len() as isize;
        let mut remaining = old_children.len();
        let mut skew: isize = 0;

        let mut placed: Vec<Option<Placed>> = Vec::with_capacity(children.len());
        for (i, child) in children.iter().enumerate() {
            let Some(vnode) = normalize(child) else {
                placed.push(None);
                continue;
            };

            let skewed = i as isize + skew;
            let matching = self.find_matching_index(&vnode, &old_children, skewed, remaining);
            let mut reused = None;
            if let Some(m) = matching {
                remaining = remaining.saturating_sub(1);
                reused = old_children[m];
                if let Some(old_id) = reused {
                    self.tree.insert_flags(old_id, NodeFlags::MATCHED);
                }
            }

            let mounting = reused.is_none_or(|old_id| self.tree.state(old_id).is_none_or(|s| s.rendered.is_none()));
            let component_like = vnode.is_component_like();
            let (id, old) = match reused {
                Some(old_id) => (old_id, self.tree.replace_vnode(old_id, vnode)),
                None => (self.tree.insert(vnode, Some(parent), i), None),
            };

            if mounting {
                if matching.is_none() {
                    if new_len > old_len {
                        skew -= 1;
                    } else if new_len < old_len {
                        skew += 1;
                    }
                }
                if !component_like {
                    self.tree.insert_flags(id, NodeFlags::INSERT);
                }
            } else if let Some(m) = matching.map(|m| m as isize).filter(|m| *m != skewed) {
                if m == skewed - 1 {
                    skew -= 1;
                } else if m == skewed + 1 {
                    skew += 1;
                } else {
                    if m > skewed {
                        skew -= 1;
                    } else {
                        skew += 1;
                    }
                    self.tree.insert_flags(id, NodeFlags::INSERT);
                }
            }

            placed.push(Some(Placed { id, old }));
        }

        let mut first_error = None;
        if remaining > 0 {
            for old_id in old_children.iter().flatten().copied() {
                if !self.tree.contains(old_id) || self.tree.flags(old_id).contains(NodeFlags::MATCHED) {
                    continue;
                }
                if old_dom.is_some() && self.tree.dom(old_id) == old_dom {
                    old_dom = self.dom_sibling(old_id, None);
                }
                trace!(?old_id, "unmounting unmatched child");
                if let Err(err) = self.teardown(old_id, old_id, false) {
                    first_error.get_or_insert(err);
                }
            }
        }

        // Installed after the unmount loop: sibling lookups for removed
        // children resolve against the old list.
        let list: ChildList = placed.iter().map(|slot| slot.as_ref().map(|p| p.id)).collect();
        if let Some(state) = self.tree.state_mut(parent) {
            state.children = Some(list);
        }

        (placed, old_dom, first_error)
    }

    /// Index of the old child `vnode` should reuse.
    fn find_matching_index(&self, vnode: &VNode, old_children: &ChildList, skewed: isize, remaining: usize) -> Option<usize> {
        let unmatched = |id: NodeId| !self.tree.flags(id).contains(NodeFlags::MATCHED);
        let same = |id: NodeId| self.tree.vnode(id).is_some_and(|old| old.same_identity(vnode));

        let slot = usize::try_from(skewed).ok().and_then(|i| old_children.get(i).map(|s| (i, *s)));
        let available = slot.and_then(|(_, s)| s).is_some_and(unmatched);

        match slot {
            Some((i, None)) if vnode.key().is_none() => return Some(i),
            Some((i, Some(old))) if available && same(old) => return Some(i),
            _ => {}
        }
        if remaining <= usize::from(available) {
            return None;
        }

        // Nearest first, left before right at each distance.
        let len = old_children.len() as isize;
        let mut left = skewed - 1;
        let mut right = skewed + 1;
        while left >= 0 || right < len {
            for candidate in [left, right] {
                if candidate < 0 || candidate >= len {
                    continue;
                }
                let index = candidate as usize;
                if let Some(old) = old_children[index] {
                    if unmatched(old) && same(old) {
                        return Some(index);
                    }
                }
            }
            left -= 1;
            right += 1;
        }
        None
    }

    /// Place the host output of `id` before `old_dom` when needed. Returns the
    /// insertion point after it.
    pub(crate) fn insert(&mut self, id: NodeId, mut old_dom: Option<H::Node>, parent_dom: &H::Node, place: bool) -> Option<H::Node> {
        if self.tree.is_component_like(id) {
            for child in self.tree.child_ids(id) {
                old_dom = self.insert(child, old_dom, parent_dom, place);
            }
            return old_dom;
        }

        let dom = self.tree.dom(id);
        if dom != old_dom {
            if place {
                if let Some(node) = &dom {
                    let is_element = self.tree.vnode(id).is_some_and(|v| v.tag().is_element());
                    let detached = old_dom.as_ref().is_some_and(|o| self.host.parent_node(o).is_none());
                    if is_element && detached {
                        old_dom = self.dom_sibling(id, None);
                    }
                    if self.host.parent_node(node).is_some() {
                        self.stats.nodes_moved += 1;
                    }
                    self.host.insert_before(parent_dom, node, old_dom.as_ref());
                }
            }
            old_dom = dom;
        }

        let mut next = old_dom.and_then(|n| self.host.next_sibling(&n));
        while let Some(node) = next.as_ref().filter(|n| self.host.node_type(n) == NodeType::Comment) {
            next = self.host.next_sibling(node);
        }
        next
    }

    /// First host node after `id` among its siblings (`from == None`), or
    /// among its own children starting at `from`. Climbs through
    /// component-like ancestors.
    pub(crate) fn dom_sibling(&self, id: NodeId, from: Option<usize>) -> Option<H::Node> {
        let state = self.tree.state(id)?;
        let Some(start) = from else {
            let parent = state.parent?;
            return self.dom_sibling(parent, Some(state.index + 1));
        };

        let found = state
            .children
            .iter()
            .flat_map(|c| c.iter().skip(start))
            .flatten()
            .find_map(|child| self.tree.dom(*child));
        if found.is_some() {
            return found;
        }
        if self.tree.is_component_like(id) {
            self.dom_sibling(id, None)
        } else {
            None
        }
    }
}
