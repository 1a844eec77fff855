//! Burn-style bundle binder
//!
//! This library binds a fully-resolved graph of packages, payloads,
//! containers, searches and variables into a composite self-extracting
//! installer: a bootstrapper stub executable with an embedded control
//! section, one or more cabinet containers, and the XML manifests the
//! runtime engine parses at install time.
//!
//! The command-line front end, the source-language compiler and the native
//! installer-database reader all live outside this crate; hosts drive the
//! pipeline through [`bind::Binder`] and the traits in [`reader`] and
//! [`extension`].

pub mod bind;
pub mod cacheid;
pub mod container;
pub mod error;
pub mod extension;
pub mod harvest;
pub mod hash;
pub mod manifest;
pub mod message;
pub mod order;
pub mod reader;
pub mod resolve;
pub mod stub;
pub mod symbol;
pub mod validate;

// Re-export commonly used types
pub use bind::{BindPaths, BindResult, Binder};
pub use error::{Error, Result};
pub use message::{Message, Messages, Severity, SourceLocation};
