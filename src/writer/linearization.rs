//! PDF Linearization (Fast Web View) support.
//!
//! This module provides functionality to linearize PDF files for efficient
//! network access, allowing the first page to be displayed quickly while
//! the rest of the document downloads.
//!
//! ## Overview
//!
//! Linearized PDFs reorganize objects so that:
//! - The first page can be displayed immediately
//! - Subsequent pages can be accessed efficiently via hint tables
//! - Objects are ordered for optimal sequential/random access
//!
//! ## PDF Structure
//!
//! A linearized PDF has 11 parts in this order:
//! 1. Header
//! 2. Linearization parameter dictionary
//! 3. First-page cross-reference table and trailer
//! 4. Document catalog and document-level objects
//! 5. Primary hint stream
//! 6. First-page section (objects for first page)
//! 7. Remaining pages
//! 8. Shared objects
//! 9. Other objects
//! 10. Overflow hint stream (optional)
//! 11. Main cross-reference table and trailer
//!
//! ## Standards Reference
//!
//! - PDF Reference 1.7: Annex F "Linearized PDF"
//! - ISO 32000-1:2008: Annex F

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::writer::bitwriter::BitWriter;
use crate::writer::compact::RenumberMap;
use crate::writer::usage::{self, PageObjects, UseList};
use std::collections::{HashMap, HashSet};

/// Linearization configuration options.
#[derive(Debug, Clone)]
pub struct LinearizationConfig {
    /// First page to display (0-indexed).
    pub first_page: usize,
    /// Whether to include hint tables.
    pub include_hints: bool,
}

impl Default for LinearizationConfig {
    fn default() -> Self {
        Self {
            first_page: 0,
            include_hints: true,
        }
    }
}

/// Linearization parameter dictionary entries.
///
/// Per PDF spec Table F.1.
#[derive(Debug, Clone)]
pub struct LinearizationParams {
    /// Version identification for linearized format.
    pub version: f32,
    /// Total length of the file in bytes.
    pub file_length: u64,
    /// Offset and length of primary hint stream [offset, length].
    pub hint_stream: [u64; 2],
    /// Object number of first page's page object.
    pub first_page_object: u32,
    /// Offset of end of first page.
    pub end_of_first_page: u64,
    /// Number of pages in document.
    pub num_pages: u32,
    /// Offset of first entry of main cross-reference table.
    pub main_xref_offset: u64,
    /// Page number of first page (0-indexed).
    pub first_page_num: u32,
}

impl LinearizationParams {
    /// Create a new linearization parameters structure.
    pub fn new(num_pages: u32) -> Self {
        Self {
            version: 1.0,
            file_length: 0,
            hint_stream: [0, 0],
            first_page_object: 0,
            end_of_first_page: 0,
            num_pages,
            main_xref_offset: 0,
            first_page_num: 0,
        }
    }

    /// Build the linearization parameter dictionary as a PDF Object.
    pub fn to_object(&self) -> Object {
        let mut dict = HashMap::new();

        dict.insert("Linearized".to_string(), Object::Real(self.version as f64));
        dict.insert("L".to_string(), Object::Integer(self.file_length as i64));
        dict.insert(
            "H".to_string(),
            Object::Array(vec![
                Object::Integer(self.hint_stream[0] as i64),
                Object::Integer(self.hint_stream[1] as i64),
            ]),
        );
        dict.insert("O".to_string(), Object::Integer(self.first_page_object as i64));
        dict.insert("E".to_string(), Object::Integer(self.end_of_first_page as i64));
        dict.insert("N".to_string(), Object::Integer(self.num_pages as i64));
        dict.insert("T".to_string(), Object::Integer(self.main_xref_offset as i64));

        if self.first_page_num != 0 {
            dict.insert("P".to_string(), Object::Integer(self.first_page_num as i64));
        }

        Object::Dictionary(dict)
    }
}

/// Page offset hint table entry per PDF spec Table F.4.
#[derive(Debug, Clone, Default)]
pub struct PageOffsetEntry {
    /// Number of objects in the page (delta from minimum).
    pub num_objects_delta: u32,
    /// Page length in bytes (delta from minimum).
    pub page_length_delta: u32,
    /// Number of shared objects referenced from this page.
    pub num_shared_objects: u32,
    /// Shared object identifiers.
    pub shared_object_ids: Vec<u32>,
    /// Numerators of fractional positions for shared objects.
    pub shared_object_numerators: Vec<u32>,
    /// Offset to content stream start (delta from minimum).
    pub content_stream_offset_delta: u32,
    /// Content stream length (delta from minimum).
    pub content_stream_length_delta: u32,
}

/// Page offset hint table header per PDF spec Table F.3.
#[derive(Debug, Clone, Default)]
pub struct PageOffsetHeader {
    /// Minimum object number in first page.
    pub min_object_num: u32,
    /// Location of first page's page object.
    pub first_page_location: u64,
    /// Bits needed for page length delta.
    pub bits_page_length: u8,
    /// Minimum page length.
    pub min_page_length: u32,
    /// Bits needed for object count delta.
    pub bits_object_count: u8,
    /// Minimum object count per page.
    pub min_object_count: u32,
    /// Bits for content stream offset delta.
    pub bits_content_offset: u8,
    /// Minimum content stream offset.
    pub min_content_offset: u32,
    /// Bits for content stream length delta.
    pub bits_content_length: u8,
    /// Minimum content stream length.
    pub min_content_length: u32,
    /// Bits for shared object identifier.
    pub bits_shared_object_id: u8,
    /// Bits for numerator of fractional position.
    pub bits_shared_numerator: u8,
    /// Denominator of fractional position.
    pub shared_denominator: u32,
}

/// Shared object hint table entry per PDF spec Table F.6.
#[derive(Debug, Clone, Default)]
pub struct SharedObjectEntry {
    /// Object length in bytes (delta from minimum).
    pub object_length_delta: u32,
    /// Whether the object is referenced by the first page.
    pub in_first_page: bool,
    /// Object number delta (for objects in object streams).
    pub object_num_delta: u32,
    /// Number of objects in the group.
    pub num_objects: u32,
}

/// Shared object hint table header per PDF spec Table F.5.
#[derive(Debug, Clone, Default)]
pub struct SharedObjectHeader {
    /// Object number of first shared object.
    pub first_object_num: u32,
    /// Location of first shared object.
    pub first_object_location: u64,
    /// Number of shared object entries for first page.
    pub num_first_page_entries: u32,
    /// Number of shared object entries for remaining pages.
    pub num_remaining_entries: u32,
    /// Bits needed for object length delta.
    pub bits_object_length: u8,
    /// Minimum object length.
    pub min_object_length: u32,
    /// Bits for object number delta.
    pub bits_object_num: u8,
}

/// Combined hint tables for linearization.
#[derive(Debug, Clone, Default)]
pub struct HintTables {
    /// Page offset hint table header.
    pub page_offset_header: PageOffsetHeader,
    /// Page offset entries (one per page).
    pub page_offset_entries: Vec<PageOffsetEntry>,
    /// Shared object hint table header.
    pub shared_object_header: SharedObjectHeader,
    /// Shared object entries.
    pub shared_object_entries: Vec<SharedObjectEntry>,
}

impl HintTables {
    /// Create new empty hint tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize hint tables to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();

        // Write page offset hint table
        self.write_page_offset_table(&mut data);

        // Write shared object hint table
        self.write_shared_object_table(&mut data);

        data
    }

    fn write_page_offset_table(&self, data: &mut Vec<u8>) {
        let header = &self.page_offset_header;

        // Write header fields (fixed sizes per spec). Item 2 (first-page
        // object location) is a 32-bit field; `first_page_location` is kept
        // as u64 internally for arithmetic but truncated here.
        Self::write_u32(data, header.min_object_num);
        Self::write_u32(data, header.first_page_location as u32);
        Self::write_u16(data, header.bits_page_length as u16);
        Self::write_u32(data, header.min_page_length);
        Self::write_u16(data, header.bits_object_count as u16);
        Self::write_u32(data, header.min_object_count);
        Self::write_u16(data, header.bits_content_offset as u16);
        Self::write_u32(data, header.min_content_offset);
        Self::write_u16(data, header.bits_content_length as u16);
        Self::write_u32(data, header.min_content_length);
        Self::write_u16(data, header.bits_shared_object_id as u16);
        Self::write_u16(data, header.bits_shared_numerator as u16);
        Self::write_u16(data, header.shared_denominator as u16);

        // Write per-page entries (variable bit-packed)
        let mut bit_writer = BitWriter::new();

        for entry in &self.page_offset_entries {
            bit_writer.write_bits(entry.num_objects_delta as u64, header.bits_object_count);
            bit_writer.write_bits(entry.page_length_delta as u64, header.bits_page_length);
            bit_writer.write_bits(entry.num_shared_objects as u64, header.bits_shared_object_id);

            for &id in &entry.shared_object_ids {
                bit_writer.write_bits(id as u64, header.bits_shared_object_id);
            }

            for &num in &entry.shared_object_numerators {
                bit_writer.write_bits(num as u64, header.bits_shared_numerator);
            }

            bit_writer
                .write_bits(entry.content_stream_offset_delta as u64, header.bits_content_offset);
            bit_writer
                .write_bits(entry.content_stream_length_delta as u64, header.bits_content_length);
        }

        data.extend(bit_writer.finish());
    }

    fn write_shared_object_table(&self, data: &mut Vec<u8>) {
        let header = &self.shared_object_header;

        // Write header fields
        Self::write_u32(data, header.first_object_num);
        Self::write_u64(data, header.first_object_location);
        Self::write_u32(data, header.num_first_page_entries);
        Self::write_u32(data, header.num_remaining_entries);
        Self::write_u16(data, header.bits_object_length as u16);
        Self::write_u32(data, header.min_object_length);
        Self::write_u16(data, header.bits_object_num as u16);

        // Write entries (bit-packed)
        let mut bit_writer = BitWriter::new();

        for entry in &self.shared_object_entries {
            bit_writer.write_bits(entry.object_length_delta as u64, header.bits_object_length);
            bit_writer.write_bits(if entry.in_first_page { 1 } else { 0 }, 1);
            bit_writer.write_bits(entry.object_num_delta as u64, header.bits_object_num);
            bit_writer.write_bits(entry.num_objects as u64, header.bits_object_num);
        }

        data.extend(bit_writer.finish());
    }

    fn write_u16(data: &mut Vec<u8>, value: u16) {
        data.extend(&value.to_be_bytes());
    }

    fn write_u32(data: &mut Vec<u8>, value: u32) {
        data.extend(&value.to_be_bytes());
    }

    fn write_u64(data: &mut Vec<u8>, value: u64) {
        data.extend(&value.to_be_bytes());
    }
}

/// Information about an object for linearization analysis.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object reference (number and generation).
    pub obj_ref: ObjectRef,
    /// Byte offset in the file.
    pub offset: u64,
    /// Length in bytes.
    pub length: u64,
    /// Pages that reference this object (empty for first page objects).
    pub referenced_by_pages: HashSet<usize>,
    /// Whether this is a content stream.
    pub is_content_stream: bool,
    /// Whether this is a page object.
    pub is_page_object: bool,
}

/// Linearization analyzer to determine object ordering.
#[derive(Debug)]
pub struct LinearizationAnalyzer {
    /// All objects in the document.
    objects: Vec<ObjectInfo>,
    /// Number of pages.
    #[allow(dead_code)]
    num_pages: usize,
    /// First page index.
    first_page: usize,
    /// Objects belonging to first page.
    first_page_objects: HashSet<u32>,
    /// Shared objects (referenced by multiple pages).
    shared_objects: HashSet<u32>,
    /// Objects for each page (indexed by page number).
    page_objects: Vec<HashSet<u32>>,
}

impl LinearizationAnalyzer {
    /// Create a new analyzer.
    pub fn new(num_pages: usize, first_page: usize) -> Self {
        Self {
            objects: Vec::new(),
            num_pages,
            first_page,
            first_page_objects: HashSet::new(),
            shared_objects: HashSet::new(),
            page_objects: vec![HashSet::new(); num_pages],
        }
    }

    /// Add an object for analysis.
    pub fn add_object(&mut self, info: ObjectInfo) {
        self.objects.push(info);
    }

    /// Analyze objects to determine categorization.
    pub fn analyze(&mut self) {
        // First pass: count references
        let mut reference_counts: HashMap<u32, usize> = HashMap::new();

        for obj in &self.objects {
            for &page in &obj.referenced_by_pages {
                *reference_counts.entry(obj.obj_ref.id).or_default() += 1;

                if page < self.page_objects.len() {
                    self.page_objects[page].insert(obj.obj_ref.id);
                }
            }
        }

        // Categorize objects
        for obj in &self.objects {
            let id = obj.obj_ref.id;

            if obj.referenced_by_pages.contains(&self.first_page) {
                self.first_page_objects.insert(id);
            }

            let ref_count = reference_counts.get(&id).copied().unwrap_or(0);
            if ref_count > 1 {
                self.shared_objects.insert(id);
            }
        }
    }

    /// Get the ordered list of objects for the first page.
    pub fn get_first_page_objects(&self) -> Vec<u32> {
        let mut objects: Vec<_> = self.first_page_objects.iter().copied().collect();
        objects.sort();
        objects
    }

    /// Get shared objects.
    pub fn get_shared_objects(&self) -> Vec<u32> {
        let mut objects: Vec<_> = self.shared_objects.iter().copied().collect();
        objects.sort();
        objects
    }

    /// Get objects for a specific page (excluding first page and shared).
    pub fn get_page_specific_objects(&self, page: usize) -> Vec<u32> {
        if page >= self.page_objects.len() || page == self.first_page {
            return Vec::new();
        }

        let mut objects: Vec<_> = self.page_objects[page]
            .iter()
            .filter(|id| !self.first_page_objects.contains(id) && !self.shared_objects.contains(id))
            .copied()
            .collect();
        objects.sort();
        objects
    }
}

/// Builder for creating linearized PDFs.
pub struct LinearizedPdfBuilder {
    #[allow(dead_code)]
    config: LinearizationConfig,
    params: LinearizationParams,
    hint_tables: HintTables,
}

impl LinearizedPdfBuilder {
    /// Create a new linearized PDF builder.
    pub fn new(num_pages: u32, config: LinearizationConfig) -> Self {
        let params = LinearizationParams::new(num_pages);

        Self {
            config,
            params,
            hint_tables: HintTables::new(),
        }
    }

    /// Set the first page object number.
    pub fn set_first_page_object(&mut self, obj_num: u32) {
        self.params.first_page_object = obj_num;
    }

    /// Set the first page number (for alternate first page display).
    pub fn set_first_page_num(&mut self, page_num: u32) {
        self.params.first_page_num = page_num;
    }

    /// Update file length after writing.
    pub fn set_file_length(&mut self, length: u64) {
        self.params.file_length = length;
    }

    /// Set hint stream offset and length.
    pub fn set_hint_stream_info(&mut self, offset: u64, length: u64) {
        self.params.hint_stream = [offset, length];
    }

    /// Set end of first page offset.
    pub fn set_end_of_first_page(&mut self, offset: u64) {
        self.params.end_of_first_page = offset;
    }

    /// Set main cross-reference table offset.
    pub fn set_main_xref_offset(&mut self, offset: u64) {
        self.params.main_xref_offset = offset;
    }

    /// Get the linearization parameters.
    pub fn params(&self) -> &LinearizationParams {
        &self.params
    }

    /// Get mutable access to hint tables.
    pub fn hint_tables_mut(&mut self) -> &mut HintTables {
        &mut self.hint_tables
    }

    /// Build the linearization parameter dictionary object.
    pub fn build_params_object(&self) -> Object {
        self.params.to_object()
    }

    /// Build the hint stream data.
    pub fn build_hint_stream(&self) -> Vec<u8> {
        self.hint_tables.to_bytes()
    }
}

pub use crate::writer::bitwriter::{bits_needed, calculate_delta_encoding};

/// Per-page/shared-object classification driven by the reachability marker's
/// [`UseList`], implementing spec §4.5's five-step linearization plan.
///
/// Runs after marking but before final compaction: it assigns section flags,
/// sorts objects into linearization order, and produces the renumber map
/// that `writer::compact` then applies.
pub struct LinearizationPlanner<'a> {
    use_list: &'a mut UseList,
    num_pages: usize,
    first_page: usize,
}

impl<'a> LinearizationPlanner<'a> {
    /// Create a planner over an already-marked use-list.
    pub fn new(use_list: &'a mut UseList, num_pages: usize, first_page: usize) -> Self {
        Self {
            use_list,
            num_pages,
            first_page,
        }
    }

    /// Step 1: classify every object reachable from the trailer.
    ///
    /// `page_kids` gives, per page index, the object numbers referenced by
    /// that page (already collected by the reachability marker).
    /// `catalogue_refs` are objects on the direct catalogue path (outside
    /// any page). `outlines_use_page1` mirrors `/PageMode = /UseOutlines`.
    pub fn mark_trailer(
        &mut self,
        catalogue_refs: &[u32],
        page_kids: &[Vec<u32>],
        names_dests_refs: &[u32],
        outlines_ref: Option<u32>,
        outlines_use_page1: bool,
    ) {
        for &num in catalogue_refs {
            self.use_list.add_flags(num, usage::CATALOGUE);
        }

        for &num in names_dests_refs {
            self.use_list.add_flags(num, usage::OTHER_OBJECTS);
        }

        if let Some(num) = outlines_ref {
            if outlines_use_page1 {
                self.use_list.mark_page(num, 0);
            } else {
                self.use_list.add_flags(num, usage::OTHER_OBJECTS);
            }
        }

        for (page, kids) in page_kids.iter().enumerate() {
            for &num in kids {
                self.use_list.mark_page(num, page);
            }
        }
    }

    /// Flags a page's own root dictionary object, so it sorts ahead of its
    /// non-page-object peers within its section (spec §4.5 step 3).
    pub fn mark_page_object(&mut self, num: u32) {
        self.use_list.add_flags(num, usage::PAGE_OBJECT);
    }

    /// Step 2: register the Linearization Params and hint-stream objects.
    pub fn add_linearization_objs(&mut self, params_obj: u32, hint_stream_obj: u32) {
        self.use_list.add_flags(params_obj, usage::PARAMS);
        self.use_list.add_flags(hint_stream_obj, usage::HINTS);
    }

    /// Step 3/4: sort all used objects into linearization order and report
    /// the index of the first `PARAMS`-flagged object (`opts.start`), the
    /// boundary between the first-page group and the remainder.
    ///
    /// Order (lower = written later, matching spec §4.5 step 3):
    /// `HINTS < PAGE1 < CATALOGUE < PARAMS < OTHER_OBJECTS < unused <
    /// SHARED < page-N`, with `PAGE_OBJECT` preceding non-page-object peers
    /// within a section.
    pub fn sorted_order(&self) -> (Vec<u32>, usize) {
        let mut nums: Vec<u32> = self.use_list.used_object_numbers().collect();
        nums.sort_by(|&a, &b| section_rank(self.use_list, a).cmp(&section_rank(self.use_list, b)));

        let start = nums
            .iter()
            .position(|&n| self.use_list.has_flags(n, usage::PARAMS))
            .unwrap_or(0);

        (nums, start)
    }

    /// Step 5: rebuild per-page object lists from the use-list, sorted and
    /// deduplicated (spec §4.5 step 5).
    pub fn rebuild_page_objects(&self) -> Vec<PageObjects> {
        let mut pages: Vec<PageObjects> = (0..self.num_pages).map(PageObjects::new).collect();

        for num in self.use_list.used_object_numbers() {
            if let Some(page) = self.use_list.page_index(num) {
                if page < pages.len() {
                    pages[page].push(num);
                }
            }
        }

        for page in &mut pages {
            page.sort_dedupe();
        }

        pages
    }
}

/// Section rank used by [`LinearizationPlanner::sorted_order`]; lower sorts
/// later in the output, matching the original's "i >= j" comparator.
fn section_rank(use_list: &UseList, num: u32) -> (u8, u8) {
    let flags = use_list.flags(num);
    let page_object_bonus = if flags & usage::PAGE_OBJECT != 0 { 0 } else { 1 };

    let section = if flags & usage::HINTS != 0 {
        0
    } else if flags & usage::PAGE1 != 0 {
        1
    } else if flags & usage::CATALOGUE != 0 {
        2
    } else if flags & usage::PARAMS != 0 {
        3
    } else if flags & usage::OTHER_OBJECTS != 0 {
        4
    } else if flags == 0 {
        5
    } else if flags & usage::SHARED != 0 {
        6
    } else {
        7 + use_list.page_index(num).map(|p| p as u8).unwrap_or(0)
    };

    (section, page_object_bonus)
}

/// Applies the sort order computed by [`LinearizationPlanner`] onto an
/// existing identity renumber map, per spec §4.5 step 5.
pub fn renumber_map_from_order(order: &[u32]) -> RenumberMap {
    let max_num = order.iter().copied().max().unwrap_or(0);
    let mut map = RenumberMap::identity(max_num as usize + 1);
    for (new_num, &old_num) in order.iter().enumerate() {
        map.set(old_num, new_num as u32 + 1);
    }
    map
}

/// Builds the two hint tables (Tables F.3-F.6) from per-page and
/// per-shared-object statistics accumulated after pass 0, per spec §4.8.
pub struct HintStreamBuilder {
    page_denominator: u32,
}

impl HintStreamBuilder {
    /// Create a builder. `page_denominator` is the fixed fractional-position
    /// denominator used for shared-object numerators (spec leaves both
    /// fractional-denominator fields zero when unused).
    pub fn new() -> Self {
        Self { page_denominator: 0 }
    }

    /// Build the page-offset table from per-page stats and resolved offsets.
    ///
    /// `page_stats`: `(num_objects, page_length, num_shared, content_offset,
    /// content_length, shared_ids)` per page, in final page order.
    #[allow(clippy::type_complexity)]
    pub fn build_page_offset_table(
        &self,
        first_page_location: u64,
        page_stats: &[(u32, u32, u32, u32, u32, Vec<u32>)],
    ) -> Result<(PageOffsetHeader, Vec<PageOffsetEntry>)> {
        if page_stats.is_empty() {
            return Err(Error::InvalidPdf(
                "linearization requires at least one page".to_string(),
            ));
        }

        let obj_counts: Vec<u32> = page_stats.iter().map(|s| s.0).collect();
        let page_lengths: Vec<u32> = page_stats.iter().map(|s| s.1).collect();
        let shared_counts: Vec<u32> = page_stats.iter().map(|s| s.2).collect();
        let content_offsets: Vec<u32> = page_stats.iter().map(|s| s.3).collect();
        let content_lengths: Vec<u32> = page_stats.iter().map(|s| s.4).collect();
        let all_shared_ids: Vec<u32> = page_stats.iter().flat_map(|s| s.5.iter().copied()).collect();

        let (min_object_count, bits_object_count) = calculate_delta_encoding(&obj_counts);
        let (min_page_length, bits_page_length) = calculate_delta_encoding(&page_lengths);
        let (_, bits_shared_object_id) =
            calculate_delta_encoding(&shared_counts.iter().chain(all_shared_ids.iter()).copied().collect::<Vec<_>>());
        let (min_content_offset, bits_content_offset) = calculate_delta_encoding(&content_offsets);
        let (min_content_length, bits_content_length) = calculate_delta_encoding(&content_lengths);

        let header = PageOffsetHeader {
            min_object_num: 0,
            first_page_location,
            bits_page_length,
            min_page_length,
            bits_object_count,
            min_object_count,
            bits_content_offset,
            min_content_offset,
            bits_content_length,
            min_content_length,
            bits_shared_object_id,
            bits_shared_numerator: 0,
            shared_denominator: self.page_denominator,
        };

        let entries = page_stats
            .iter()
            .enumerate()
            .map(|(page_idx, (num_objects, page_length, num_shared, content_offset, content_length, shared_ids))| {
                // Page-1 shared ids are emitted as zero per Acrobat convention
                // (spec §9 open question, preserved as-is).
                let ids = if page_idx == 0 {
                    vec![0u32; shared_ids.len()]
                } else {
                    shared_ids.clone()
                };

                PageOffsetEntry {
                    num_objects_delta: num_objects.saturating_sub(min_object_count),
                    page_length_delta: page_length.saturating_sub(min_page_length),
                    num_shared_objects: *num_shared,
                    shared_object_ids: ids,
                    shared_object_numerators: vec![0; shared_ids.len()],
                    content_stream_offset_delta: content_offset.saturating_sub(min_content_offset),
                    content_stream_length_delta: content_length.saturating_sub(min_content_length),
                }
            })
            .collect();

        Ok((header, entries))
    }

    /// Build the shared-object table from per-shared-object statistics.
    ///
    /// `entries_in`: `(object_num, length, in_first_page)` for every shared
    /// object, page-1 entries first.
    pub fn build_shared_object_table(
        &self,
        first_object_location: u64,
        entries_in: &[(u32, u32, bool)],
    ) -> (SharedObjectHeader, Vec<SharedObjectEntry>) {
        let first_object_num = entries_in.first().map(|e| e.0).unwrap_or(0);
        let lengths: Vec<u32> = entries_in.iter().map(|e| e.1).collect();
        let (min_object_length, bits_object_length) = calculate_delta_encoding(&lengths);

        let num_first_page_entries = entries_in.iter().filter(|e| e.2).count() as u32;
        let num_remaining_entries = entries_in.len() as u32 - num_first_page_entries;

        let header = SharedObjectHeader {
            first_object_num,
            first_object_location,
            num_first_page_entries,
            num_remaining_entries,
            bits_object_length,
            min_object_length,
            bits_object_num: bits_needed(entries_in.len() as u32),
        };

        let entries = entries_in
            .iter()
            .enumerate()
            .map(|(i, (_, length, in_first_page))| SharedObjectEntry {
                object_length_delta: length.saturating_sub(min_object_length),
                in_first_page: *in_first_page,
                object_num_delta: i as u32,
                num_objects: 1,
            })
            .collect();

        (header, entries)
    }
}

impl Default for HintStreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}
