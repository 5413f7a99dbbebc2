//! Host element discovery.
//!
//! Exactly one strategy is honoured per call, in this order:
//!
//! 1. `inline`: the parent of the script that is currently executing.
//! 2. `client_specified`: the selector found in that script's [`MOUNT_IN_ATTRIBUTE`].
//! 3. `selector`: a direct query.
//!
//! Custom element registration bypasses discovery entirely; the platform creates the
//! hosts itself.

use waterui_embed_core::Platform;

use crate::config::EmbedOptions;

/// Attribute on the invoking script that names the selector to mount into.
pub const MOUNT_IN_ATTRIBUTE: &str = "data-mount-in";

/// Returns the hosts `options` designates, in document order.
pub fn resolve<P: Platform>(platform: &P, options: &EmbedOptions) -> Vec<P::Element> {
    if options.inline {
        let Some(script) = platform.current_script() else {
            tracing::debug!("Inline mount requested outside of an executing script");
            return Vec::new();
        };
        return platform.parent(&script).into_iter().collect();
    }

    if options.client_specified {
        let Some(script) = platform.current_script() else {
            tracing::debug!("Client-specified mount requested outside of an executing script");
            return Vec::new();
        };
        let Some(selector) = platform.attribute(&script, MOUNT_IN_ATTRIBUTE) else {
            tracing::debug!(?script, "Invoking script has no `{MOUNT_IN_ATTRIBUTE}` attribute");
            return Vec::new();
        };
        return platform.query_selector_all(&selector);
    }

    options
        .selector
        .as_deref()
        .map(|selector| platform.query_selector_all(selector))
        .unwrap_or_default()
}
