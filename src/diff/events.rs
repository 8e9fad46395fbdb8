//! Event listener proxies
//!
//! The host sees exactly one listener per (node, event, capture) triple: a
//! proxy that looks the current handler up at dispatch time. Handler props may
//! change identity on every render without the host listener being swapped.
//!
//! # Dispatch clock
//!
//! The first proxy reached by an event stamps it with the current clock value
//! and advances the clock. Handlers remember the clock value at the time they
//! were attached. A handler attached after the event started (because a diff
//! ran while the event was still bubbling) has a larger attach value than the
//! event's stamp and is skipped for that event.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use crate::host::{Event, Listener};
use crate::node::Handler;

/// Logical clock shared by every proxy of one renderer.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventClock(Rc<Cell<u64>>);

impl EventClock {
    #[inline]
    pub(crate) fn now(&self) -> u64 {
        self.0.get()
    }

    /// Current value, then advance.
    pub(crate) fn tick(&self) -> u64 {
        let now = self.0.get();
        self.0.set(now + 1);
        now
    }
}

/// Current handler behind one proxy.
#[derive(Debug)]
pub(crate) struct ListenerSlot {
    handler: RefCell<Option<Handler>>,
    attached: Cell<u64>,
}

impl ListenerSlot {
    pub(crate) fn new(handler: Handler, attached: u64) -> Self {
        Self {
            handler: RefCell::new(Some(handler)),
            attached: Cell::new(attached),
        }
    }

    pub(crate) fn set_handler(&self, handler: Handler) {
        *self.handler.borrow_mut() = Some(handler);
    }

    pub(crate) fn set_attached(&self, at: u64) {
        self.attached.set(at);
    }

    #[inline]
    pub(crate) fn attached(&self) -> u64 {
        self.attached.get()
    }
}

/// Listener slots of one host node, keyed by event name and capture flag.
pub(crate) type ListenerMap = FxHashMap<(CompactString, bool), Rc<ListenerSlot>>;

/// Host listener forwarding to `slot`. Does nothing once the slot is dropped.
pub(crate) fn proxy(slot: &Rc<ListenerSlot>, clock: &EventClock) -> Listener {
    let slot: Weak<ListenerSlot> = Rc::downgrade(slot);
    let clock = clock.clone();
    Rc::new(move |event: &mut Event| {
        let Some(slot) = slot.upgrade() else {
            return;
        };
        match event.dispatched {
            None => event.dispatched = Some(clock.tick()),
            Some(stamp) if stamp < slot.attached() => return,
            Some(_) => {}
        }
        let handler = slot.handler.borrow().clone();
        if let Some(handler) = handler {
            handler.call(event);
        }
    })
}

/// Split an `on*` prop name into the host event name and capture flag.
///
/// `onClick` → `click`, `onClickCapture` → (`click`, capture),
/// `onGotPointerCapture` stays a bubbling `gotpointercapture` listener.
pub(crate) fn event_name(prop: &str) -> (CompactString, bool) {
    let lower = prop.to_ascii_lowercase();
    let capture = lower.ends_with("capture") && !lower.ends_with("pointercapture");
    let base = if capture { &prop[..prop.len() - "capture".len()] } else { prop };
    let name = base.get(2..).unwrap_or_default();
    let starts_upper = name.chars().next().is_some_and(char::is_uppercase);
    let name = if starts_upper { name.to_lowercase() } else { name.to_string() };
    (name.into(), capture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        assert_eq!(event_name("onClick"), ("click".into(), false));
        assert_eq!(event_name("onclick"), ("click".into(), false));
        assert_eq!(event_name("onClickCapture"), ("click".into(), true));
        assert_eq!(event_name("onGotPointerCapture"), ("gotpointercapture".into(), false));
        assert_eq!(event_name("oncustomThing"), ("customThing".into(), false));
    }

    #[test]
    fn test_clock_ticks_after_read() {
        let clock = EventClock::default();
        assert_eq!(clock.tick(), 0);
        assert_eq!(clock.now(), 1);
        let shared = clock.clone();
        shared.tick();
        assert_eq!(clock.now(), 2);
    }

    #[test]
    fn test_proxy_stamps_and_skips_late_handlers() {
        let clock = EventClock::default();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let early = Rc::new(ListenerSlot::new(Handler::new(move |_| h.set(h.get() + 1)), clock.now()));
        let early_proxy = proxy(&early, &clock);

        let mut event = Event::new("click");
        early_proxy(&mut event);
        assert_eq!(event.dispatch_sequence(), Some(0));
        assert_eq!(hits.get(), 1);

        // Attached while the same event is still travelling.
        let h = hits.clone();
        let late = Rc::new(ListenerSlot::new(Handler::new(move |_| h.set(h.get() + 10)), clock.now()));
        let late_proxy = proxy(&late, &clock);
        late_proxy(&mut event);
        assert_eq!(hits.get(), 1, "late handler must not see an event that started before it");

        let mut next = Event::new("click");
        late_proxy(&mut next);
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn test_proxy_is_inert_after_slot_drop() {
        let clock = EventClock::default();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let slot = Rc::new(ListenerSlot::new(Handler::new(move |_| h.set(h.get() + 1)), 0));
        let listener = proxy(&slot, &clock);
        drop(slot);
        listener(&mut Event::new("click"));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_handler_swap_keeps_proxy() {
        let clock = EventClock::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let slot = Rc::new(ListenerSlot::new(Handler::new(move |_| s.borrow_mut().push("first")), 0));
        let listener = proxy(&slot, &clock);
        let s = seen.clone();
        slot.set_handler(Handler::new(move |_| s.borrow_mut().push("second")));
        listener(&mut Event::new("input"));
        assert_eq!(*seen.borrow(), ["second"]);
    }
}
