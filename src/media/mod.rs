//! Audio assets
//!
//! This module provides:
//! - Opening program and effect assets as async byte streams
//! - Effect lookup by fuzzy name

pub mod catalog;
pub mod source;

pub use catalog::find_effect;
pub use source::{AssetStore, FileStore, ProgramStream};
