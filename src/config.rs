//! Ambient configuration shared across the writer core.

/// Maximum depth of recursive traversal (page-tree walks, reachability
/// marking, resource localization) before `Error::RecursionLimitExceeded`
/// is raised. Bounds stack usage against maliciously nested object graphs.
pub const MAX_RECURSION_DEPTH: u32 = 256;

/// Maximum `/Prev` chain length followed when loading an existing xref
/// for incremental update or resource localization.
pub const MAX_XREF_PREV_CHAIN: u32 = 100;

/// Default I/O buffer size used by the output sink.
pub const DEFAULT_SINK_BUFFER_SIZE: usize = 64 * 1024;

/// Size of the window searched around a signature field's parent object
/// offset when locating `/ByteRange`, `/Contents`, and `/Filter` literals
/// for deferred patching. Per spec: a fixed 5 KB read.
pub const SIGNATURE_PATCH_WINDOW: usize = 5 * 1024;
