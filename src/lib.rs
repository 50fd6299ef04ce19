// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::enum_variant_names)]
#![allow(clippy::wrong_self_convention)]
#![allow(clippy::explicit_counter_loop)]
#![allow(clippy::doc_overindented_list_items)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::redundant_guards)]
#![allow(clippy::regex_creation_in_loops)]
#![allow(clippy::manual_find)]
#![allow(clippy::match_like_matches_macro)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]
#![cfg_attr(test, allow(unused_variables))]

//! # PDF Oxide
//!
//! A PDF writer core: serializes an in-memory document model (cross-reference
//! table + trailer) back to bytes, with optional garbage collection, object
//! deduplication, renumbering/compaction, page-resource localization, and
//! fast-web-view linearization (ISO 32000-1 Annex F).
//!
//! ## Scope
//!
//! This crate owns the write path only. The object model
//! ([`object::Object`]/[`object::ObjectRef`]), the stream decoding filters
//! ([`decoders`]), and the classic/stream xref parser ([`xref`]) are consumed
//! as given rather than redesigned — they exist here because the writer needs
//! to read an existing file back in for incremental updates and resource
//! localization.
//!
//! ## Quick start
//!
//! ```ignore
//! use pdf_oxide::writer::{Options, GarbageLevel, WriteDriver, WriteDocument};
//!
//! # fn example(doc: WriteDocument) -> pdf_oxide::Result<()> {
//! let mut options = Options::default();
//! options.garbage = GarbageLevel::Dedupe;
//! options.linearize = true;
//!
//! let bytes = WriteDriver::new(options, "1.7").write_to_vec(doc)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Core PDF parsing (external collaborator: object model + xref)
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
/// Parser configuration options
pub mod parser_config;
pub mod xref;
pub mod xref_reconstruction;

// Stream decoders (external collaborator, consumed not redesigned)
pub mod decoders;

// Encryption support (shared by the writer's encrypted-save path)
pub mod encryption;

pub mod geometry;

// Ambient configuration
pub mod config;

// PDF writer core
pub mod writer;

// Digital signatures (optional)
#[cfg(feature = "signatures")]
#[cfg_attr(docsrs, doc(cfg(feature = "signatures")))]
pub mod signatures;

pub use error::{Error, Result};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        // VERSION is populated from CARGO_PKG_VERSION at compile time
        assert!(VERSION.starts_with("0."));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pdf_oxide");
    }
}
