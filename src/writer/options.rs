//! Save options, per spec §6.1.
//!
//! Modeled per spec §9's explicit recommendation: `do_garbage` as an
//! ordered enum and `do_expand` as a bitflag set, replacing the original's
//! raw integer/bitmask and `(expand == 0) || deflate` style predicates with
//! named types.

use crate::error::{Error, Result};
use bitflags::bitflags;

/// `do_garbage` (spec §6.1): how aggressively to collect and compact the
/// object graph before writing. Ordered: a higher level implies every
/// effect of the levels below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum GarbageLevel {
    /// No collection; objects are written as found.
    #[default]
    None,
    /// Mark-and-sweep: unreachable objects are dropped.
    Sweep,
    /// Sweep, then compact surviving objects into a contiguous range.
    Renumber,
    /// Renumber, then collapse structurally-equal non-stream objects.
    Dedupe,
    /// Dedupe, additionally comparing raw stream bodies byte-for-byte.
    DedupeStreams,
}

bitflags! {
    /// `do_expand` (spec §6.1): which stream kinds to decode before
    /// re-serializing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExpandFlags: u8 {
        /// Expand nothing; copy stream bodies as found.
        const NONE = 0;
        /// Decode image-ish streams (`/Subtype /Image`, CCITT/DCT/RunLength/JBIG2/JPX filters).
        const IMAGES = 1 << 0;
        /// Decode font program streams.
        const FONTS = 1 << 1;
        /// Decode every stream kind.
        const ALL = Self::IMAGES.bits() | Self::FONTS.bits();
    }
}

impl Default for ExpandFlags {
    fn default() -> Self {
        ExpandFlags::NONE
    }
}

/// Save options passed by the caller to [`crate::writer::driver::WriteDriver`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Append new objects to an existing file rather than rewriting it.
    /// Mutually exclusive with `garbage > None` and `linearize`.
    pub incremental: bool,
    /// Wrap binary stream bodies in ASCIIHex.
    pub ascii: bool,
    /// Which stream kinds to decode before re-serializing.
    pub expand: ExpandFlags,
    /// Apply Flate to unfiltered (or expanded) streams.
    pub deflate: bool,
    /// Garbage collection / compaction level.
    pub garbage: GarbageLevel,
    /// Produce a linearized (fast web view) file. Forces `garbage >= Sweep`.
    pub linearize: bool,
    /// Pre-sanitize page content streams before writing (stubbed upstream;
    /// the writer core does not implement content-stream rewriting itself).
    pub clean: bool,
    /// On a per-object load/decode failure, emit `null` and increment the
    /// error counter instead of aborting the save.
    pub continue_on_error: bool,
}

impl Options {
    /// `do_tight` (spec §6.1): whether dict/array output should omit
    /// whitespace between entries. Derived, not user-settable directly.
    pub fn tight(&self) -> bool {
        self.expand == ExpandFlags::NONE || self.deflate
    }

    /// Validate that no mutually-exclusive options were requested together
    /// (spec §7's "illegal option combination", propagated before any
    /// output is produced).
    pub fn validate(&self) -> Result<()> {
        if self.incremental && self.garbage > GarbageLevel::None {
            return Err(Error::IllegalOptionCombination(
                "incremental update cannot be combined with garbage collection".to_string(),
            ));
        }
        if self.incremental && self.linearize {
            return Err(Error::IllegalOptionCombination(
                "incremental update cannot be combined with linearization".to_string(),
            ));
        }
        Ok(())
    }

    /// The effective garbage level once `linearize`'s implicit floor (spec
    /// §6.1: "forces garbage >= 1") is applied.
    pub fn effective_garbage(&self) -> GarbageLevel {
        if self.linearize && self.garbage == GarbageLevel::None {
            GarbageLevel::Sweep
        } else {
            self.garbage
        }
    }
}
