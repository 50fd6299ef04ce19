//! The document model the writer core operates on.
//!
//! Spec §2.1 treats the document model as an external collaborator; this is
//! the concrete (intentionally thin) implementation, an arena of numbered
//! objects addressed by object number (spec §9's Design Note), built either
//! from a parsed [`crate::xref::CrossRefTable`] (incremental update /
//! resource localization) or object-by-object (tests, fresh documents).

use crate::error::{Error, Result};
use crate::object::Object;
use crate::xref::CrossRefTable;
use std::collections::HashMap;

/// The xref-stream-only keys that belong to the source file's `/XRef`
/// stream dictionary, not to a trailer: stripped when a table built from an
/// xref stream is adopted as `self.trailer` so they don't leak into an
/// unrelated classic trailer on a later save.
const XREF_STREAM_ONLY_KEYS: &[&str] = &["Type", "W", "Index", "Length", "Filter", "DecodeParms"];

/// The state captured by [`WriteDocument::mark_incremental_base`]: the
/// prior file's raw bytes (emitted verbatim ahead of the appended update)
/// and a snapshot of every object as loaded, used to tell which objects
/// changed since (spec §4.9/§6.3's incremental-update contract).
#[derive(Debug, Clone)]
pub struct IncrementalBase {
    prev_xref_offset: u64,
    original_bytes: Vec<u8>,
    snapshot: HashMap<u32, Object>,
}

impl IncrementalBase {
    /// The prior file's final `startxref` target, written to this save's
    /// `/Prev`.
    pub fn prev_xref_offset(&self) -> u64 {
        self.prev_xref_offset
    }

    /// The prior file's raw bytes, unchanged, to prepend to the appended
    /// update.
    pub fn original_bytes(&self) -> &[u8] {
        &self.original_bytes
    }
}

/// An in-memory arena of numbered PDF objects plus a trailer dictionary,
/// owned by the writer for the duration of a save.
#[derive(Debug, Clone, Default)]
pub struct WriteDocument {
    objects: HashMap<u32, (u16, Object)>,
    trailer: HashMap<String, Object>,
    next_free_num: u32,
    used_xref_stream: bool,
    incremental_base: Option<IncrementalBase>,
}

impl WriteDocument {
    /// An empty document with an empty trailer.
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            trailer: HashMap::new(),
            next_free_num: 1,
            used_xref_stream: false,
            incremental_base: None,
        }
    }

    /// Build a document from a parsed cross-reference table, resolving each
    /// in-use entry through `load`, a caller-supplied closure (typically
    /// backed by `crate::parser::parse_object` reading at the entry's
    /// recorded offset). Records whether the table came from a PDF 1.5+
    /// xref stream (spec §4.7's "choice driven by whether the source used
    /// xref streams"), stripping the stream-only keys from the adopted
    /// trailer.
    pub fn from_cross_ref_table<F>(table: &CrossRefTable, mut load: F) -> Result<Self>
    where
        F: FnMut(u32, &crate::xref::XRefEntry) -> Result<Object>,
    {
        let mut doc = Self::new();

        for num in table.all_object_numbers() {
            let entry = table.get(num).expect("all_object_numbers yields present keys");
            if !entry.in_use {
                continue;
            }
            let obj = load(num, entry)?;
            doc.insert_object(num, entry.generation, obj);
        }

        if let Some(trailer) = table.trailer() {
            let mut trailer = trailer.clone();
            let is_xref_stream = matches!(trailer.get("Type"), Some(Object::Name(t)) if t == "XRef");
            if is_xref_stream {
                for key in XREF_STREAM_ONLY_KEYS {
                    trailer.remove(*key);
                }
            }
            doc.used_xref_stream = is_xref_stream;
            doc.trailer = trailer;
        }

        Ok(doc)
    }

    /// Whether the source this document was loaded from used a PDF 1.5+
    /// cross-reference stream rather than the classic `xref`/`trailer`
    /// form.
    pub fn used_xref_stream(&self) -> bool {
        self.used_xref_stream
    }

    /// Mark `self` as based on a previously-parsed file, enabling
    /// `Options::incremental`: `prev_xref_offset` is the prior file's
    /// `startxref` target, and `original_bytes` its raw bytes. Snapshots
    /// every currently-loaded object so later saves can tell what changed.
    pub fn mark_incremental_base(&mut self, prev_xref_offset: u64, original_bytes: Vec<u8>) {
        let snapshot = self.objects.iter().map(|(&num, (_, obj))| (num, obj.clone())).collect();
        self.incremental_base = Some(IncrementalBase { prev_xref_offset, original_bytes, snapshot });
    }

    /// The incremental base captured by `mark_incremental_base`, if any.
    pub fn incremental_base(&self) -> Option<&IncrementalBase> {
        self.incremental_base.as_ref()
    }

    /// Object numbers that are new or whose content differs from the
    /// incremental base's snapshot — these are the only objects an
    /// incremental save emits. With no base, every tracked object counts
    /// as dirty.
    pub fn incremental_dirty_numbers(&self) -> Vec<u32> {
        let Some(base) = &self.incremental_base else { return self.objects.keys().copied().collect() };
        self.objects
            .iter()
            .filter(|(num, (_, obj))| base.snapshot.get(num) != Some(obj))
            .map(|(&num, _)| num)
            .collect()
    }

    /// Object numbers present in the incremental base but no longer
    /// tracked — these must be patched to `Free` xref entries rather than
    /// silently dropped, so a reader's object table stays consistent.
    pub fn incremental_removed_numbers(&self) -> Vec<u32> {
        let Some(base) = &self.incremental_base else { return Vec::new() };
        base.snapshot.keys().copied().filter(|num| !self.objects.contains_key(num)).collect()
    }

    /// Number of object-number slots needed to index every known object
    /// (highest object number + 1), used to size a [`crate::writer::usage::UseList`].
    pub fn capacity(&self) -> usize {
        self.objects.keys().copied().max().map(|n| n as usize + 1).unwrap_or(1)
    }

    /// Look up an object by number, ignoring generation (the writer only
    /// ever holds the live generation of each object it tracks).
    pub fn get(&self, num: u32) -> Option<&Object> {
        self.objects.get(&num).map(|(_, obj)| obj)
    }

    /// Generation number currently recorded for `num`.
    pub fn generation(&self, num: u32) -> Option<u16> {
        self.objects.get(&num).map(|(gen, _)| *gen)
    }

    /// Insert or replace the object at `num`.
    pub fn insert_object(&mut self, num: u32, gen: u16, obj: Object) {
        self.next_free_num = self.next_free_num.max(num + 1);
        self.objects.insert(num, (gen, obj));
    }

    /// Remove and return the object at `num`, if any.
    pub fn remove_object(&mut self, num: u32) -> Option<(u16, Object)> {
        self.objects.remove(&num)
    }

    /// Assign the next unused object number to `obj` at generation 0 and
    /// return the new number (`create_object` in spec §6.2's collaborator
    /// interface).
    pub fn create_object(&mut self, obj: Object) -> u32 {
        let num = self.next_free_num;
        self.next_free_num += 1;
        self.objects.insert(num, (0, obj));
        num
    }

    /// Iterator over every tracked object number.
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.objects.keys().copied()
    }

    /// Direct access to the backing object map, e.g. for `compact::renumber_all`.
    pub fn objects_mut(&mut self) -> &mut HashMap<u32, (u16, Object)> {
        &mut self.objects
    }

    /// Read-only access to the backing object map, for the deduplicator's
    /// pairwise comparison pass.
    pub fn objects_for_dedupe(&self) -> &HashMap<u32, (u16, Object)> {
        &self.objects
    }

    /// Object number of the `/Pages` tree root named by the trailer's
    /// `/Root/Pages`, if the catalog and the reference both resolve.
    pub fn pages_root(&self) -> Option<u32> {
        let Some(Object::Reference(root_ref)) = self.trailer_value("Root") else { return None };
        let Some(Object::Dictionary(root)) = self.get(root_ref.id) else { return None };
        let Some(Object::Reference(pages_ref)) = root.get("Pages") else { return None };
        Some(pages_ref.id)
    }

    /// Number of page leaves reachable from the trailer's `/Root/Pages`
    /// tree, used to size the linearization planner's per-page lists.
    pub fn count_pages(&self) -> usize {
        let Some(pages_root) = self.pages_root() else { return 0 };

        let mut count = 0;
        let mut stack = vec![pages_root];
        let mut visited = std::collections::HashSet::new();

        while let Some(num) = stack.pop() {
            if !visited.insert(num) {
                continue;
            }
            let Some(Object::Dictionary(dict)) = self.get(num) else { continue };
            match dict.get("Kids").and_then(Object::as_array) {
                Some(kids) => {
                    for kid in kids {
                        if let Some(r) = kid.as_reference() {
                            stack.push(r.id);
                        }
                    }
                }
                None => count += 1,
            }
        }

        count
    }

    /// Ordered leaf page object numbers under `/Root/Pages`, in document
    /// order, for per-page classification during linearization planning.
    pub fn leaf_pages(&self) -> Vec<u32> {
        let Some(pages_root) = self.pages_root() else { return Vec::new() };
        let mut out = Vec::new();
        let mut visited = std::collections::HashSet::new();
        self.collect_leaf_pages(pages_root, &mut out, &mut visited);
        out
    }

    fn collect_leaf_pages(&self, num: u32, out: &mut Vec<u32>, visited: &mut std::collections::HashSet<u32>) {
        if !visited.insert(num) {
            return;
        }
        let Some(Object::Dictionary(dict)) = self.get(num) else { return };
        match dict.get("Kids").and_then(Object::as_array) {
            Some(kids) => {
                for kid in kids {
                    if let Some(r) = kid.as_reference() {
                        self.collect_leaf_pages(r.id, out, visited);
                    }
                }
            }
            None => out.push(num),
        }
    }

    /// Replace the entire object map (used after `compact::renumber_all`
    /// produces a freshly renumbered map).
    pub fn replace_objects(&mut self, objects: HashMap<u32, (u16, Object)>) {
        self.next_free_num = objects.keys().copied().max().map(|n| n + 1).unwrap_or(1);
        self.objects = objects;
    }

    /// A trailer dictionary value.
    pub fn trailer_value(&self, key: &str) -> Option<&Object> {
        self.trailer.get(key)
    }

    /// Set a trailer dictionary value.
    pub fn set_trailer_value(&mut self, key: &str, value: Object) {
        self.trailer.insert(key.to_string(), value);
    }

    /// The full trailer dictionary.
    pub fn trailer(&self) -> &HashMap<String, Object> {
        &self.trailer
    }

    /// Mutable access to the trailer, e.g. to force `/Size` after compaction.
    pub fn trailer_mut(&mut self) -> &mut HashMap<String, Object> {
        &mut self.trailer
    }

    /// Inline a resolved `/Length` value into stream object `num`'s
    /// dictionary, per spec §4.1 (the indirect length object itself is then
    /// dropped from the use-list by the caller).
    pub fn bake_length(&mut self, num: u32, length: i64) {
        if let Some((_, Object::Stream { dict, .. })) = self.objects.get_mut(&num) {
            dict.insert("Length".to_string(), Object::Integer(length));
        }
    }

    /// Force every tracked generation number to zero, per `do_garbage >= 2`
    /// (spec §3's documented encryption-invalidating policy).
    pub fn zero_all_generations(&mut self) {
        for (gen, _) in self.objects.values_mut() {
            *gen = 0;
        }
    }

    /// Resolve a top-level object, returning an error matching spec §7's
    /// "unresolvable reference" kind rather than silently returning `None`
    /// — for callers (e.g. the linearization planner's page-tree walk) that
    /// need to distinguish "doesn't exist" from "optional and absent".
    pub fn require(&self, num: u32) -> Result<&Object> {
        self.get(num).ok_or(Error::ObjectNotFound(num, self.generation(num).unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    #[test]
    fn create_object_assigns_increasing_numbers() {
        let mut doc = WriteDocument::new();
        let a = doc.create_object(Object::Null);
        let b = doc.create_object(Object::Null);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn insert_object_bumps_next_free_num() {
        let mut doc = WriteDocument::new();
        doc.insert_object(10, 0, Object::Null);
        let next = doc.create_object(Object::Null);
        assert_eq!(next, 11);
    }

    #[test]
    fn bake_length_sets_stream_dict_entry() {
        let mut doc = WriteDocument::new();
        doc.insert_object(
            1,
            0,
            Object::Stream {
                dict: HashMap::new(),
                data: bytes::Bytes::new(),
            },
        );
        doc.bake_length(1, 42);

        if let Some(Object::Stream { dict, .. }) = doc.get(1) {
            assert_eq!(dict.get("Length"), Some(&Object::Integer(42)));
        } else {
            panic!("expected stream");
        }
    }

    #[test]
    fn require_errors_on_missing_object() {
        let doc = WriteDocument::new();
        assert!(doc.require(5).is_err());
    }

    #[test]
    fn trailer_round_trip() {
        let mut doc = WriteDocument::new();
        doc.set_trailer_value("Root", Object::Reference(ObjectRef::new(1, 0)));
        assert_eq!(doc.trailer_value("Root"), Some(&Object::Reference(ObjectRef::new(1, 0))));
    }

    #[test]
    fn count_pages_walks_the_page_tree() {
        let mut doc = WriteDocument::new();
        let mut root = HashMap::new();
        root.insert("Pages".to_string(), Object::Reference(ObjectRef::new(2, 0)));
        doc.insert_object(1, 0, Object::Dictionary(root));

        let mut pages = HashMap::new();
        pages.insert(
            "Kids".to_string(),
            Object::Array(vec![Object::Reference(ObjectRef::new(3, 0)), Object::Reference(ObjectRef::new(4, 0))]),
        );
        doc.insert_object(2, 0, Object::Dictionary(pages));
        doc.insert_object(3, 0, Object::Dictionary(HashMap::new()));
        doc.insert_object(4, 0, Object::Dictionary(HashMap::new()));

        doc.set_trailer_value("Root", Object::Reference(ObjectRef::new(1, 0)));

        assert_eq!(doc.count_pages(), 2);
    }

    #[test]
    fn incremental_base_tracks_dirty_and_removed_numbers() {
        let mut doc = WriteDocument::new();
        doc.insert_object(1, 0, Object::Integer(1));
        doc.insert_object(2, 0, Object::Integer(2));
        doc.mark_incremental_base(100, b"%PDF-1.7\n...".to_vec());

        // Unchanged.
        // Modified.
        doc.insert_object(2, 0, Object::Integer(99));
        // New.
        doc.insert_object(3, 0, Object::Integer(3));
        // Removed.
        doc.remove_object(1);

        let mut dirty = doc.incremental_dirty_numbers();
        dirty.sort_unstable();
        assert_eq!(dirty, vec![2, 3]);
        assert_eq!(doc.incremental_removed_numbers(), vec![1]);
        assert_eq!(doc.incremental_base().unwrap().prev_xref_offset(), 100);
    }

    #[test]
    fn from_cross_ref_table_detects_xref_stream_source() {
        let mut table = CrossRefTable::new();
        table.add_entry(1, crate::xref::XRefEntry::uncompressed(10, 0));
        let mut trailer = HashMap::new();
        trailer.insert("Type".to_string(), Object::Name("XRef".to_string()));
        trailer.insert("W".to_string(), Object::Array(vec![Object::Integer(1)]));
        trailer.insert("Root".to_string(), Object::Reference(ObjectRef::new(1, 0)));
        table.set_trailer(trailer);

        let doc = WriteDocument::from_cross_ref_table(&table, |_, _| Ok(Object::Null)).unwrap();
        assert!(doc.used_xref_stream());
        assert_eq!(doc.trailer_value("W"), None);
        assert!(doc.trailer_value("Root").is_some());
    }
}
