//! xref emission, per spec §4.7.
//!
//! Grounded on `crate::xref::XRefEntry`/`CrossRefTable` for the read-side
//! shapes this reuses, generalized here to the write side's exact-20-byte
//! classic entries, multi-subsection incremental partitioning, and the
//! PDF 1.5+ cross-reference-stream form.

use crate::object::Object;
use crate::writer::object_serializer::ObjectSerializer;
use std::collections::HashMap;
use std::io::Write;

/// One xref entry as the writer needs it: a final object number plus its
/// on-disk location.
#[derive(Debug, Clone, Copy)]
pub enum XrefWriteEntry {
    /// In-use object at `offset`, generation `gen`.
    InUse { offset: u64, gen: u16 },
    /// Free-list slot pointing at `next_free` (object 0's convention: points
    /// at itself with generation 65535).
    Free { next_free: u32, gen: u16 },
}

/// Emits either the classic `xref`/`trailer` form or a PDF 1.5+
/// cross-reference stream, per spec §4.7.
pub struct XrefWriter;

impl XrefWriter {
    /// Classic form: `xref\n`, one or more `start count\n` subsections each
    /// holding exactly-20-byte entries, then `trailer\n` + the dict +
    /// `startxref\nOFFSET\n%%EOF\n`.
    ///
    /// `entries` must be in ascending object-number order. Contiguous runs
    /// become one subsection each.
    pub fn write_classic(
        out: &mut Vec<u8>,
        entries: &[(u32, XrefWriteEntry)],
        trailer: &HashMap<String, Object>,
        prev_offset: Option<u64>,
    ) {
        out.extend_from_slice(b"xref\n");

        for subsection in contiguous_subsections(entries) {
            let start = subsection[0].0;
            write!(out, "{} {}\n", start, subsection.len()).unwrap();
            for &(_, entry) in subsection {
                write_classic_entry(out, entry);
            }
        }

        out.extend_from_slice(b"trailer\n");
        let mut trailer = trailer.clone();
        if let Some(prev) = prev_offset {
            trailer.insert("Prev".to_string(), Object::Integer(prev as i64));
        }
        let serializer = ObjectSerializer::new();
        out.extend(serializer.serialize(&Object::Dictionary(trailer)));
        out.extend_from_slice(b"\n");
    }

    /// Append `startxref\nOFFSET\n%%EOF\n` at the current end of `out`.
    pub fn write_startxref(out: &mut Vec<u8>, xref_offset: u64) {
        write!(out, "startxref\n{}\n%%EOF\n", xref_offset).unwrap();
    }

    /// PDF 1.5+ cross-reference stream form: a normal stream object with
    /// `/Type /XRef`, `/W [1 4 1]`, `/Index [ranges]`, whose body is packed
    /// `{type_byte, 4-byte big-endian offset, 1-byte gen}` triples.
    pub fn build_xref_stream_object(
        entries: &[(u32, XrefWriteEntry)],
        mut trailer: HashMap<String, Object>,
        prev_offset: Option<u64>,
    ) -> Object {
        let mut index = Vec::new();
        for subsection in contiguous_subsections(entries) {
            index.push(Object::Integer(subsection[0].0 as i64));
            index.push(Object::Integer(subsection.len() as i64));
        }

        let mut body = Vec::with_capacity(entries.len() * 6);
        for &(_, entry) in entries {
            write_stream_entry(&mut body, entry);
        }

        trailer.insert("Type".to_string(), Object::Name("XRef".to_string()));
        trailer.insert(
            "W".to_string(),
            Object::Array(vec![Object::Integer(1), Object::Integer(4), Object::Integer(1)]),
        );
        trailer.insert("Index".to_string(), Object::Array(index));
        if let Some(prev) = prev_offset {
            trailer.insert("Prev".to_string(), Object::Integer(prev as i64));
        }

        Object::Stream { dict: trailer, data: bytes::Bytes::from(body) }
    }
}

fn write_classic_entry(out: &mut Vec<u8>, entry: XrefWriteEntry) {
    match entry {
        XrefWriteEntry::InUse { offset, gen } => {
            write!(out, "{:010} {:05} n \n", offset, gen).unwrap();
        }
        XrefWriteEntry::Free { next_free, gen } => {
            write!(out, "{:010} {:05} f \n", next_free, gen).unwrap();
        }
    }
}

fn write_stream_entry(out: &mut Vec<u8>, entry: XrefWriteEntry) {
    match entry {
        XrefWriteEntry::InUse { offset, gen } => {
            out.push(1);
            out.extend(&(offset as u32).to_be_bytes());
            out.push(gen as u8);
        }
        XrefWriteEntry::Free { next_free, gen } => {
            out.push(0);
            out.extend(&next_free.to_be_bytes());
            out.push(gen as u8);
        }
    }
}

fn contiguous_subsections(entries: &[(u32, XrefWriteEntry)]) -> Vec<&[(u32, XrefWriteEntry)]> {
    let mut subsections = Vec::new();
    let mut start = 0;

    for i in 1..entries.len() {
        if entries[i].0 != entries[i - 1].0 + 1 {
            subsections.push(&entries[start..i]);
            start = i;
        }
    }
    if start < entries.len() {
        subsections.push(&entries[start..]);
    }

    subsections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_entry_is_exactly_twenty_bytes() {
        let mut out = Vec::new();
        write_classic_entry(&mut out, XrefWriteEntry::InUse { offset: 1234, gen: 0 });
        assert_eq!(out.len(), 20);
        assert_eq!(&out, b"0000001234 00000 n \n");
    }

    #[test]
    fn free_entry_formats_next_free_and_gen() {
        let mut out = Vec::new();
        write_classic_entry(&mut out, XrefWriteEntry::Free { next_free: 0, gen: 65535 });
        assert_eq!(&out, b"0000000000 65535 f \n");
    }

    #[test]
    fn contiguous_runs_split_into_subsections() {
        let entries = vec![
            (0, XrefWriteEntry::Free { next_free: 0, gen: 65535 }),
            (1, XrefWriteEntry::InUse { offset: 10, gen: 0 }),
            (2, XrefWriteEntry::InUse { offset: 20, gen: 0 }),
            (5, XrefWriteEntry::InUse { offset: 50, gen: 0 }),
        ];

        let subsections = contiguous_subsections(&entries);
        assert_eq!(subsections.len(), 2);
        assert_eq!(subsections[0].len(), 3);
        assert_eq!(subsections[1].len(), 1);
    }

    #[test]
    fn classic_xref_emits_trailer_with_prev() {
        let entries = vec![(1, XrefWriteEntry::InUse { offset: 9, gen: 0 })];
        let mut trailer = HashMap::new();
        trailer.insert("Size".to_string(), Object::Integer(2));

        let mut out = Vec::new();
        XrefWriter::write_classic(&mut out, &entries, &trailer, Some(500));
        let text = String::from_utf8_lossy(&out);

        assert!(text.starts_with("xref\n1 1\n"));
        assert!(text.contains("trailer\n"));
        assert!(text.contains("/Prev 500"));
    }

    #[test]
    fn xref_stream_object_carries_type_w_and_index() {
        let entries = vec![
            (0, XrefWriteEntry::Free { next_free: 0, gen: 65535 }),
            (1, XrefWriteEntry::InUse { offset: 17, gen: 0 }),
        ];
        let obj = XrefWriter::build_xref_stream_object(&entries, HashMap::new(), None);

        if let Object::Stream { dict, data } = obj {
            assert_eq!(dict.get("Type"), Some(&Object::Name("XRef".to_string())));
            assert_eq!(data.len(), 12);
        } else {
            panic!("expected stream");
        }
    }
}
