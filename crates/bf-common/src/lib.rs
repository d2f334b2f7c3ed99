//! Browser Fleet common types, IDs, and errors.
//!
//! This crate provides foundational types shared across bf-core modules:
//! - The profile data model exchanged with the persistence collaborator
//! - Typed profile identifiers
//! - The unified error type with stable codes and categories

pub mod error;
pub mod id;
pub mod profile;

pub use error::{format_error_human, Error, ErrorCategory, Result};
pub use id::ProfileId;
pub use profile::{
    BrowserProfile, CanvasSettings, FontSettings, LaunchAttributes, ProxyScheme, ProxySettings,
    WebRtcSettings,
};
