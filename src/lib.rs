#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]

pub mod bus;
pub mod config;
pub mod custom_element;
pub mod host;
pub mod lifecycle;
pub mod logging;
mod meta;
pub mod mock;
pub mod signal;

#[doc(inline)]
pub use config::{EmbedConfig, EmbedOptions};
#[doc(inline)]
pub use lifecycle::{Component, Embed, WidgetInstance, embed};
pub use meta::{is_mounted, render_target, rendered_tree};
pub use nami as reactive;
pub use tracing as log;

#[doc(inline)]
pub use waterui_embed_core::{
    CustomElement, EmbedError, Platform, Props, Runtime, ShadowMode, ShadowOptions,
    VisibilityEntry, VisibilityObserver, VisibilityOptions, platform, props,
};

pub mod prelude {
    //! Commonly used items, for glob import.
    //!
    //! ```
    //! use waterui_embed::prelude::*;
    //! ```
    pub use super::{
        Embed, EmbedConfig, EmbedOptions, Platform, Props, Runtime, WidgetInstance,
        bus::{self, EventBus},
        embed,
        signal::{self, computed, create_store, get_signal},
    };
}
