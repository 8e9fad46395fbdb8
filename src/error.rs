//! Error types for tola-reconciler.
//!
//! Render functions return [`Interrupt`] so that a component can either fail
//! or signal that its content is not ready yet. Everything else in the engine
//! reports [`RenderError`].

use std::error::Error as StdError;
use std::sync::Arc;

use compact_str::CompactString;
use thiserror::Error;

use crate::component::Suspension;
use crate::host::HostError;

/// Errors that can escape a render, hydrate or flush call.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// A component's render function failed
    #[error("component `{component}` failed to render: {message}")]
    Component {
        /// Display name of the failing component
        component: CompactString,
        /// Failure description
        message: String,
    },

    /// A lifecycle hook, ref callback or post-commit callback failed
    #[error("lifecycle hook `{hook}` failed: {message}")]
    Lifecycle {
        /// Name of the hook
        hook: &'static str,
        /// Failure description
        message: String,
    },

    /// Application-defined error
    #[error(transparent)]
    Custom(Arc<dyn StdError + Send + Sync>),

    /// The host adapter rejected an operation.
    ///
    /// The engine itself falls back to attributes when a property write is
    /// rejected; this variant carries host failures raised by embedder code
    /// (lifecycle hooks, ref callbacks, render functions) through `?`.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Result type alias for engine operations.
pub type RenderResult<T> = Result<T, RenderError>;

impl RenderError {
    /// Create a render failure for the named component.
    pub fn component(component: impl Into<CompactString>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a lifecycle failure.
    pub fn lifecycle(hook: &'static str, message: impl Into<String>) -> Self {
        Self::Lifecycle {
            hook,
            message: message.into(),
        }
    }

    /// Wrap any application error.
    pub fn custom(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(err))
    }
}

/// Non-local exit from a component render.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// Content is not ready; keep the current output and resume later
    Suspend(Suspension),
    /// Render-time failure, handed to the nearest error boundary
    Error(RenderError),
}

impl From<RenderError> for Interrupt {
    fn from(err: RenderError) -> Self {
        Self::Error(err)
    }
}

impl From<HostError> for Interrupt {
    fn from(err: HostError) -> Self {
        Self::Error(err.into())
    }
}

impl From<Suspension> for Interrupt {
    fn from(suspension: Suspension) -> Self {
        Self::Suspend(suspension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk on fire")]
    struct Fire;

    #[test]
    fn test_error_display() {
        let err = RenderError::component("Counter", "boom");
        assert_eq!(err.to_string(), "component `Counter` failed to render: boom");

        let err = RenderError::lifecycle("did_mount", "nope");
        assert_eq!(err.to_string(), "lifecycle hook `did_mount` failed: nope");

        let err = RenderError::custom(Fire);
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn test_interrupt_from_error() {
        fn render() -> Result<(), Interrupt> {
            Err(RenderError::component("X", "bad"))?;
            Ok(())
        }
        assert!(matches!(render(), Err(Interrupt::Error(RenderError::Component { .. }))));
    }

    #[test]
    fn test_host_error_propagates_from_hooks() {
        fn did_mount() -> RenderResult<()> {
            Err(HostError::UnsupportedProperty("scrollTop".into()))?;
            Ok(())
        }
        let err = did_mount().unwrap_err();
        assert!(matches!(err, RenderError::Host(HostError::UnsupportedProperty(ref name)) if name == "scrollTop"));
        assert_eq!(err.to_string(), "property `scrollTop` is not settable on this node");

        fn render() -> Result<(), Interrupt> {
            Err(HostError::UnsupportedProperty("value".into()))?;
            Ok(())
        }
        assert!(matches!(render(), Err(Interrupt::Error(RenderError::Host(_)))));
    }

    #[test]
    fn test_error_is_clone() {
        static_assertions::assert_impl_all!(RenderError: Clone, Send, Sync);
    }
}
