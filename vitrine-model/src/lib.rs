//! Core data model definitions shared across Vitrine crates.
#![allow(missing_docs)]

pub mod error;
pub mod image;
pub mod token;

pub use error::{ModelError, Result as ModelResult};
pub use image::{
    CanonicalAddress, ContentFingerprint, ImageEncoding, ImageReference,
    RenderableImage,
};
pub use token::TokenData;
