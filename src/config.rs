//! Renderer configuration

use std::fmt;
use std::rc::Rc;

use crate::tree::NodeId;

/// Default cap on in-place re-renders of a component that keeps
/// invalidating itself while rendering.
pub const DEFAULT_MAX_RERENDERS: usize = 25;

/// Comment data opening a server-rendered suspended region.
pub const DEFAULT_SUSPENSE_OPEN: &str = "$s";

/// Comment data closing a server-rendered suspended region.
pub const DEFAULT_SUSPENSE_CLOSE: &str = "/$s";

/// Renderer limits and markers.
#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    /// Maximum renders of a function component within one diff while it
    /// keeps marking itself dirty. The pass proceeds with the last output.
    /// Default: 25
    pub max_rerenders: usize,
    /// Comment marker opening a suspended region during hydration.
    pub suspense_open_marker: &'static str,
    /// Comment marker closing a suspended region during hydration.
    pub suspense_close_marker: &'static str,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_rerenders: DEFAULT_MAX_RERENDERS,
            suspense_open_marker: DEFAULT_SUSPENSE_OPEN,
            suspense_close_marker: DEFAULT_SUSPENSE_CLOSE,
        }
    }
}

impl RenderConfig {
    /// Config with a custom re-render cap.
    pub fn new(max_rerenders: usize) -> Self {
        Self {
            max_rerenders,
            ..Self::default()
        }
    }

    /// Strict config: a single render per diff, no in-place retries.
    pub fn strict() -> Self {
        Self::new(1)
    }
}

/// Observer callbacks invoked at fixed points of a pass.
#[derive(Clone, Default)]
pub struct RenderHooks {
    /// After a position finished diffing
    pub on_diffed: Option<Rc<dyn Fn(NodeId)>>,
    /// Before a position is torn down
    pub on_unmount: Option<Rc<dyn Fn(NodeId)>>,
    /// Before post-commit callbacks run, with the number of instances queued
    pub on_commit: Option<Rc<dyn Fn(usize)>>,
}

impl RenderHooks {
    #[must_use]
    pub fn on_diffed(mut self, f: impl Fn(NodeId) + 'static) -> Self {
        self.on_diffed = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_unmount(mut self, f: impl Fn(NodeId) + 'static) -> Self {
        self.on_unmount = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_commit(mut self, f: impl Fn(usize) + 'static) -> Self {
        self.on_commit = Some(Rc::new(f));
        self
    }
}

impl fmt::Debug for RenderHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHooks")
            .field("on_diffed", &self.on_diffed.is_some())
            .field("on_unmount", &self.on_unmount.is_some())
            .field("on_commit", &self.on_commit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.max_rerenders, 25);
        assert_eq!(config.suspense_open_marker, "$s");
        assert_eq!(config.suspense_close_marker, "/$s");
        assert_eq!(RenderConfig::strict().max_rerenders, 1);
    }

    #[test]
    fn test_hooks_builder() {
        let hooks = RenderHooks::default().on_commit(|_| {});
        assert!(hooks.on_commit.is_some());
        assert!(hooks.on_diffed.is_none());
        assert_eq!(
            format!("{hooks:?}"),
            "RenderHooks { on_diffed: false, on_unmount: false, on_commit: true }"
        );
    }
}
