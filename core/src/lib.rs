#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! Core types for `waterui-embed`.
//!
//! This crate holds the pieces of the embedder that do not depend on lifecycle state:
//! the [`Platform`] and [`Runtime`] boundary traits that a host document and a
//! component runtime implement, the property extraction rules in [`props`], and the
//! shared [`EmbedError`] type.

mod error;
pub mod platform;
pub mod props;

pub use error::EmbedError;
pub use platform::{
    CustomElement, ElementFactory, Platform, Runtime, ShadowMode, ShadowOptions,
    VisibilityCallback, VisibilityEntry, VisibilityObserver, VisibilityOptions,
};
pub use props::Props;
