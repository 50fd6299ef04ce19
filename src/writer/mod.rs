//! PDF writing module: save an in-memory document to bytes, with optional
//! garbage collection, renumbering, linearization, and signature patching.
//!
//! ## Architecture
//!
//! ```text
//! WriteDocument + Options
//!     ↓
//! [ReachabilityMarker] (mark)
//!     ↓
//! [dedup::deduplicate] (optional)
//!     ↓
//! [compact::compact / renumber_all] (optional)
//!     ↓
//! [resource_localizer::localize] + [LinearizationPlanner] (linearized only)
//!     ↓
//! [WriteDriver] → [ObjectSerializer] + [XrefWriter] → PDF bytes
//!     ↓
//! [signature_patch::patch_signatures] (if the document has unsaved signatures)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pdf_oxide::writer::{WriteDocument, Options, WriteDriver};
//!
//! let mut doc = WriteDocument::new();
//! // ... populate doc ...
//! let driver = WriteDriver::new(Options::default());
//! let bytes = driver.write_to_vec(&mut doc)?;
//! ```

mod bitwriter;
mod compact;
mod dedup;
mod driver;
pub mod linearization;
mod mark;
mod model;
mod object_serializer;
mod options;
mod resource_localizer;
#[cfg(feature = "signatures")]
mod signature_patch;
mod sink;
mod usage;
mod xref_writer;

pub use bitwriter::{bits_needed, calculate_delta_encoding, BitWriter};
pub use compact::{compact, renumber_all, renumber_object, RenumberMap};
pub use dedup::deduplicate;
pub use driver::WriteDriver;
pub use linearization::{
    HintStreamBuilder, HintTables, LinearizationAnalyzer, LinearizationConfig,
    LinearizationParams, LinearizationPlanner, LinearizedPdfBuilder, ObjectInfo, PageOffsetEntry,
    PageOffsetHeader, SharedObjectEntry, SharedObjectHeader,
};
pub use mark::ReachabilityMarker;
pub use model::WriteDocument;
pub use object_serializer::{ObjectSerializer, ObjectWriteDecision};
pub use options::{ExpandFlags, GarbageLevel, Options};
pub use resource_localizer::localize;
#[cfg(feature = "signatures")]
pub use signature_patch::{patch_signatures, PendingSignature};
pub use sink::OutputSink;
pub use usage::{PageObjects, UseList};
pub use xref_writer::{XrefWriteEntry, XrefWriter};
