//! End-to-end save scenarios exercising the full two-pass driver against
//! small hand-built documents, covering the concrete scenarios and
//! universal invariants named in the writer core's testable-properties
//! section.

use pdf_oxide::object::{Object, ObjectRef};
use pdf_oxide::writer::{GarbageLevel, Options, WriteDocument, WriteDriver};
use std::collections::HashMap;

fn dict(pairs: &[(&str, Object)]) -> Object {
    Object::Dictionary(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

/// 1-page doc: catalog (1), pages (2), page (3), content stream (4), font (5).
fn minimal_one_page_doc() -> WriteDocument {
    let mut doc = WriteDocument::new();

    doc.insert_object(
        1,
        0,
        dict(&[
            ("Type", Object::Name("Catalog".to_string())),
            ("Pages", Object::Reference(ObjectRef::new(2, 0))),
        ]),
    );
    doc.insert_object(
        2,
        0,
        dict(&[
            ("Type", Object::Name("Pages".to_string())),
            ("Kids", Object::Array(vec![Object::Reference(ObjectRef::new(3, 0))])),
            ("Count", Object::Integer(1)),
        ]),
    );
    doc.insert_object(
        3,
        0,
        dict(&[
            ("Type", Object::Name("Page".to_string())),
            ("Parent", Object::Reference(ObjectRef::new(2, 0))),
            ("Contents", Object::Reference(ObjectRef::new(4, 0))),
            (
                "Resources",
                dict(&[("Font", dict(&[("F1", Object::Reference(ObjectRef::new(5, 0)))]))]),
            ),
        ]),
    );
    doc.insert_object(
        4,
        0,
        Object::Stream {
            dict: HashMap::new(),
            data: bytes::Bytes::from_static(b"BT /F1 12 Tf (Hi) Tj ET"),
        },
    );
    doc.insert_object(
        5,
        0,
        dict(&[
            ("Type", Object::Name("Font".to_string())),
            ("Subtype", Object::Name("Type1".to_string())),
            ("BaseFont", Object::Name("Helvetica".to_string())),
        ]),
    );

    doc.set_trailer_value("Root", Object::Reference(ObjectRef::new(1, 0)));
    doc
}

/// E1: minimal 1-page doc, defaults — header/footer shape, 6 xref entries
/// (5 objects + the free-list head at 0).
#[test]
fn e1_minimal_document_defaults() {
    let doc = minimal_one_page_doc();
    let mut driver = WriteDriver::new(Options::default(), "1.7");
    let bytes = driver.write_to_vec(doc).unwrap();

    assert!(bytes.starts_with(b"%PDF-1.7\n%"));
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.trim_end().ends_with("%%EOF"));

    let xref_start = text.find("\nxref\n").expect("xref section present") + 1;
    let xref_section = &text[xref_start..];
    let subsection_header = xref_section.lines().nth(1).unwrap();
    assert_eq!(subsection_header, "0 6");
}

/// E2: 3-page doc with duplicate identical image streams, garbage=DedupeStreams
/// — exactly one copy of the image survives, and every page's reference to
/// it resolves to the same (possibly renumbered) object.
#[test]
fn e2_duplicate_image_streams_collapse_under_dedupe() {
    let mut doc = WriteDocument::new();
    let image_dict = || {
        let mut d = HashMap::new();
        d.insert("Type".to_string(), Object::Name("XObject".to_string()));
        d.insert("Subtype".to_string(), Object::Name("Image".to_string()));
        d.insert("Width".to_string(), Object::Integer(1));
        d.insert("Height".to_string(), Object::Integer(1));
        d.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        d
    };
    let image_bytes = bytes::Bytes::from_static(b"identical-pixel-data");

    // Two distinct object numbers, byte-identical stream bodies.
    doc.insert_object(10, 0, Object::Stream { dict: image_dict(), data: image_bytes.clone() });
    doc.insert_object(11, 0, Object::Stream { dict: image_dict(), data: image_bytes.clone() });
    doc.insert_object(12, 0, Object::Stream { dict: image_dict(), data: image_bytes });

    let page = |num: u32, image_obj: u32| {
        dict(&[
            ("Type", Object::Name("Page".to_string())),
            ("Parent", Object::Reference(ObjectRef::new(2, 0))),
            (
                "Resources",
                dict(&[("XObject", dict(&[("Im0", Object::Reference(ObjectRef::new(image_obj, 0)))]))]),
            ),
            ("_marker", Object::Integer(num as i64)),
        ])
    };
    doc.insert_object(3, 0, page(3, 10));
    doc.insert_object(4, 0, page(4, 11));
    doc.insert_object(5, 0, page(5, 12));

    doc.insert_object(
        2,
        0,
        dict(&[
            ("Type", Object::Name("Pages".to_string())),
            (
                "Kids",
                Object::Array(vec![
                    Object::Reference(ObjectRef::new(3, 0)),
                    Object::Reference(ObjectRef::new(4, 0)),
                    Object::Reference(ObjectRef::new(5, 0)),
                ]),
            ),
            ("Count", Object::Integer(3)),
        ]),
    );
    doc.insert_object(
        1,
        0,
        dict(&[
            ("Type", Object::Name("Catalog".to_string())),
            ("Pages", Object::Reference(ObjectRef::new(2, 0))),
        ]),
    );
    doc.set_trailer_value("Root", Object::Reference(ObjectRef::new(1, 0)));

    let options = Options { garbage: GarbageLevel::DedupeStreams, ..Default::default() };
    let mut driver = WriteDriver::new(options, "1.7");
    let bytes = driver.write_to_vec(doc).unwrap();

    let text = String::from_utf8_lossy(&bytes);
    assert_eq!(text.matches("identical-pixel-data").count(), 1, "exactly one copy of the image body should survive");
}

/// E4: a dangling reference in a page dict — pointing at an object number
/// nothing resolves to — is rewritten to a direct `null` literal by the
/// reachability marker, under default options (no garbage collection
/// requested).
#[test]
fn e4_dangling_reference_in_page_dict_rewritten_to_null() {
    let mut doc = WriteDocument::new();
    doc.insert_object(1, 0, dict(&[("Type", Object::Name("Catalog".to_string())), ("Pages", Object::Reference(ObjectRef::new(2, 0)))]));
    doc.insert_object(
        2,
        0,
        dict(&[
            ("Type", Object::Name("Pages".to_string())),
            ("Kids", Object::Array(vec![Object::Reference(ObjectRef::new(3, 0))])),
            ("Count", Object::Integer(1)),
        ]),
    );
    doc.insert_object(
        3,
        0,
        dict(&[
            ("Type", Object::Name("Page".to_string())),
            ("Parent", Object::Reference(ObjectRef::new(2, 0))),
            // Object 999 does not exist anywhere in the document.
            ("Annots", Object::Array(vec![Object::Reference(ObjectRef::new(999, 0))])),
        ]),
    );
    doc.set_trailer_value("Root", Object::Reference(ObjectRef::new(1, 0)));

    let mut driver = WriteDriver::new(Options::default(), "1.7");
    let bytes = driver.write_to_vec(doc).unwrap();

    let text = String::from_utf8_lossy(&bytes);
    assert!(!text.contains("999"), "the dangling object number must not survive into the output");
    assert!(text.contains("/Annots [null]") || text.contains("/Annots[null]"), "the dangling reference should be rewritten to a direct null literal");
}

/// Boundary behavior distinct from E4: an indirect reference to a stream's
/// `/Length` is inlined as a direct integer (not left as a dangling `null`,
/// since the referenced object does resolve).
#[test]
fn stream_with_indirect_length_resolves_to_direct_integer() {
    let mut doc = WriteDocument::new();
    doc.insert_object(1, 0, dict(&[("Type", Object::Name("Catalog".to_string())), ("Pages", Object::Reference(ObjectRef::new(2, 0)))]));
    doc.insert_object(
        2,
        0,
        dict(&[
            ("Type", Object::Name("Pages".to_string())),
            ("Kids", Object::Array(vec![Object::Reference(ObjectRef::new(3, 0))])),
            ("Count", Object::Integer(1)),
        ]),
    );
    doc.insert_object(3, 0, dict(&[("Type", Object::Name("Page".to_string())), ("Contents", Object::Reference(ObjectRef::new(4, 0)))]));

    let mut stream_dict = HashMap::new();
    stream_dict.insert("Length".to_string(), Object::Reference(ObjectRef::new(5, 0)));
    doc.insert_object(4, 0, Object::Stream { dict: stream_dict, data: bytes::Bytes::from_static(b"0123456789") });
    doc.insert_object(5, 0, Object::Integer(10));

    doc.set_trailer_value("Root", Object::Reference(ObjectRef::new(1, 0)));

    let mut driver = WriteDriver::new(Options::default(), "1.7");
    let bytes = driver.write_to_vec(doc).unwrap();

    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Length 10"), "indirect /Length should be baked to a direct integer");
}

/// Invariant 3: after compaction (garbage >= Renumber), the set of in-use
/// object numbers is a contiguous prefix `{1..k}`.
#[test]
fn invariant_compaction_yields_contiguous_object_numbers() {
    let mut doc = WriteDocument::new();
    doc.insert_object(1, 0, dict(&[("Type", Object::Name("Catalog".to_string())), ("Pages", Object::Reference(ObjectRef::new(100, 0)))]));
    doc.insert_object(
        100,
        0,
        dict(&[
            ("Type", Object::Name("Pages".to_string())),
            ("Kids", Object::Array(vec![Object::Reference(ObjectRef::new(250, 0))])),
            ("Count", Object::Integer(1)),
        ]),
    );
    doc.insert_object(250, 0, dict(&[("Type", Object::Name("Page".to_string()))]));
    // Unreachable garbage object with a high number, dropped by Sweep.
    doc.insert_object(999, 0, Object::Integer(42));

    doc.set_trailer_value("Root", Object::Reference(ObjectRef::new(1, 0)));

    let options = Options { garbage: GarbageLevel::Renumber, ..Default::default() };
    let mut driver = WriteDriver::new(options, "1.7");
    let bytes = driver.write_to_vec(doc).unwrap();

    let text = String::from_utf8_lossy(&bytes);
    // Exactly 3 surviving objects (Catalog, Pages, Page); compacted to 1..3.
    for n in 1..=3 {
        assert!(text.contains(&format!("{} 0 obj", n)), "object {n} should exist after compaction");
    }
    assert!(!text.contains("999"), "unreachable high-numbered garbage must not survive");
}

/// Invariant 5: every classic xref entry line is exactly 20 bytes.
#[test]
fn invariant_xref_entries_are_twenty_bytes() {
    let doc = minimal_one_page_doc();
    let mut driver = WriteDriver::new(Options::default(), "1.7");
    let bytes = driver.write_to_vec(doc).unwrap();
    let text = String::from_utf8_lossy(&bytes);

    let xref_body = text.split("xref\n").nth(1).unwrap();
    for line in xref_body.lines().skip(1) {
        if line == "trailer" {
            break;
        }
        assert_eq!(line.len() + 1, 20, "xref entry {line:?} must be 20 bytes including its newline");
    }
}

/// Invariant 7: two-pass idempotence — writing the same document twice with
/// identical options produces byte-identical output.
#[test]
fn invariant_repeat_write_is_byte_identical() {
    let mut driver_a = WriteDriver::new(Options::default(), "1.7");
    let bytes_a = driver_a.write_to_vec(minimal_one_page_doc()).unwrap();

    let mut driver_b = WriteDriver::new(Options::default(), "1.7");
    let bytes_b = driver_b.write_to_vec(minimal_one_page_doc()).unwrap();

    assert_eq!(bytes_a, bytes_b);
}

/// Reads the integer value following `key` (e.g. `"/L"`) as a bare token
/// (`key` immediately followed by a space and decimal digits).
fn extract_int(text: &str, key: &str) -> i64 {
    let needle = format!("{key} ");
    let start = text.find(&needle).unwrap_or_else(|| panic!("{key} not found in output")) + needle.len();
    let rest = &text[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse().unwrap_or_else(|_| panic!("{key} value not a plain integer"))
}

/// E3: same shape as E2 but saved with `linearize`. `/N` is the page count,
/// `/O` is the first page dict's object number, `/L` is the exact output
/// length, and the file's final byte is `\n` right after `%%EOF`.
#[test]
fn e3_linearized_params_match_output_shape() {
    let doc = minimal_one_page_doc();
    let options = Options { linearize: true, ..Default::default() };
    let mut driver = WriteDriver::new(options, "1.7");
    let bytes = driver.write_to_vec(doc).unwrap();

    assert!(bytes.ends_with(b"%%EOF\n"), "file must end with %%EOF followed by a single newline");

    let text = String::from_utf8_lossy(&bytes);
    assert_eq!(extract_int(&text, "/N"), 1, "/N should be the page count");
    assert_eq!(extract_int(&text, "/O"), 3, "/O should be the first (and only) page dict's object number");
    assert_eq!(extract_int(&text, "/L"), bytes.len() as i64, "/L should equal the exact output length");
}

/// E6: `/Outlines` plus `/PageMode /UseOutlines`, saved with `linearize` —
/// the outline tree is classified into the first-page section, so it's
/// written ahead of any object used only by a later page.
#[test]
fn e6_outlines_with_use_outlines_page_mode_lands_in_first_page_group() {
    let mut doc = WriteDocument::new();
    doc.insert_object(
        1,
        0,
        dict(&[
            ("Type", Object::Name("Catalog".to_string())),
            ("Pages", Object::Reference(ObjectRef::new(2, 0))),
            ("Outlines", Object::Reference(ObjectRef::new(6, 0))),
            ("PageMode", Object::Name("UseOutlines".to_string())),
        ]),
    );
    doc.insert_object(
        2,
        0,
        dict(&[
            ("Type", Object::Name("Pages".to_string())),
            (
                "Kids",
                Object::Array(vec![Object::Reference(ObjectRef::new(3, 0)), Object::Reference(ObjectRef::new(4, 0))]),
            ),
            ("Count", Object::Integer(2)),
        ]),
    );
    doc.insert_object(3, 0, dict(&[("Type", Object::Name("Page".to_string())), ("Parent", Object::Reference(ObjectRef::new(2, 0)))]));
    doc.insert_object(
        4,
        0,
        dict(&[
            ("Type", Object::Name("Page".to_string())),
            ("Parent", Object::Reference(ObjectRef::new(2, 0))),
            ("Contents", Object::Reference(ObjectRef::new(5, 0))),
        ]),
    );
    doc.insert_object(5, 0, Object::Stream { dict: HashMap::new(), data: bytes::Bytes::from_static(b"second-page-marker-stream") });
    doc.insert_object(6, 0, dict(&[("Type", Object::Name("Outlines".to_string())), ("Count", Object::Integer(0))]));
    doc.set_trailer_value("Root", Object::Reference(ObjectRef::new(1, 0)));

    let options = Options { linearize: true, ..Default::default() };
    let mut driver = WriteDriver::new(options, "1.7");
    let bytes = driver.write_to_vec(doc).unwrap();
    let text = String::from_utf8_lossy(&bytes);

    let outlines_pos = text.find("/Type /Outlines").expect("outlines dict present in output");
    let second_page_pos = text.find("second-page-marker-stream").expect("second page's content stream present in output");
    assert!(
        outlines_pos < second_page_pos,
        "outlines should be classified into the first-page section, ahead of objects used only by page 2"
    );
}

#[cfg(feature = "signatures")]
mod incremental_signature {
    use super::*;
    use pdf_oxide::signatures::DigestSigner;
    use pdf_oxide::writer::{patch_signatures, PendingSignature};

    struct StubSigner(Vec<u8>);

    impl DigestSigner for StubSigner {
        fn sign_byte_range(&self, _path: &std::path::Path, _byte_range: &[i64; 4]) -> pdf_oxide::error::Result<Vec<u8>> {
            Ok(self.0.clone())
        }
        fn placeholder_size(&self) -> usize {
            self.0.len() * 2 + 2
        }
    }

    /// E5: a signature field placeholder saved via an incremental update,
    /// then patched. The original bytes are preserved verbatim, and the
    /// final `/ByteRange` literal equals `[0 a b c]` where `a` is the
    /// `/Contents` hex string's start offset, `b = a + contents_length + 1`
    /// (contents_length includes the angle brackets), and `c` is the
    /// remaining bytes to the end of the file.
    #[test]
    fn e5_incremental_save_then_patch_produces_literal_byte_range() {
        let mut doc = minimal_one_page_doc();

        let mut base_driver = WriteDriver::new(Options::default(), "1.7");
        let original = base_driver.write_to_vec(doc.clone()).unwrap();

        doc.mark_incremental_base(0, original.clone());

        let sig_num = doc.create_object(dict(&[
            ("Type", Object::Name("Sig".to_string())),
            ("Filter", Object::Name("Adobe.PPKLite".to_string())),
            (
                "ByteRange",
                Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(0), Object::Integer(0)]),
            ),
            ("Contents", Object::String(vec![0u8; 128])),
        ]));

        let options = Options { incremental: true, ..Default::default() };
        let mut driver = WriteDriver::new(options, "1.7");
        let bytes = driver.write_to_vec(doc).unwrap();

        assert!(bytes.starts_with(&original), "incremental save must preserve the original bytes verbatim");
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Prev 0"), "incremental trailer must chain to the prior startxref via /Prev");

        let marker = format!("{sig_num} 0 obj");
        let parent_offset = bytes
            .windows(marker.len())
            .position(|w| w == marker.as_bytes())
            .expect("signature object present in the incremental output");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signed.pdf");
        std::fs::write(&path, &bytes).unwrap();

        let pending = vec![PendingSignature { parent_offset }];
        let signer = StubSigner(vec![0xAB; 32]);
        patch_signatures(&path, &pending, &signer).unwrap();

        let patched = std::fs::read(&path).unwrap();
        let patched_text = String::from_utf8_lossy(&patched);

        let byte_range_key = "/ByteRange [";
        let br_start = patched_text.find(byte_range_key).expect("/ByteRange literal present");
        let br_close = patched_text[br_start..].find(']').map(|i| br_start + i).expect("/ByteRange closing bracket");
        let nums: Vec<i64> = patched_text[br_start + byte_range_key.len()..br_close]
            .split_whitespace()
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(nums.len(), 4, "/ByteRange must have exactly 4 entries");
        assert_eq!(nums[0], 0, "byte range always starts at file offset 0");

        let contents_key = "/Contents ";
        let contents_offset =
            (patched_text.find(contents_key).expect("/Contents literal present") + contents_key.len()) as i64;
        let contents_len = patched[contents_offset as usize..]
            .iter()
            .position(|&b| b == b'>')
            .map(|p| p as i64 + 1)
            .expect("/Contents hex literal closing bracket");

        let a = nums[1];
        let b = nums[2];
        let c = nums[3];
        assert_eq!(a, contents_offset, "a is the /Contents literal's start offset");
        assert_eq!(b, a + contents_len + 1, "b skips past the /Contents literal");
        assert_eq!(c, patched.len() as i64 - b, "c is the remaining bytes to file end");
    }
}
