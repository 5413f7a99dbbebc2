use thiserror::Error;

/// Error type produced when a host platform capability the embedder depends on fails.
///
/// Faults in host-page data (malformed props, duplicate registrations, repeated
/// unmounts) never surface here; they degrade with a diagnostic instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EmbedError {
    /// Deferred activation was requested but the platform cannot observe visibility.
    #[error("visibility observation is not available on this platform")]
    VisibilityUnavailable,
    /// The platform refused to attach an isolated sub-tree to the host element.
    #[error("failed to attach shadow root: {reason}")]
    ShadowAttach {
        /// Reason reported by the platform.
        reason: String,
    },
    /// The platform has no custom element registry.
    #[error("custom elements are not available on this platform")]
    CustomElementsUnavailable,
    /// The requested custom element name is not a valid element name.
    #[error("`{0}` is not a valid custom element name")]
    InvalidTagName(String),
    /// A signal key is already bound to a value of another type.
    #[error("signal `{key}` already holds a value of a different type")]
    SignalTypeMismatch {
        /// The conflicting key.
        key: String,
    },
    /// Any other failure reported by the host platform.
    #[error("platform error: {0}")]
    Platform(String),
}
