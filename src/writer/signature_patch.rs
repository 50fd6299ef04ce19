//! Signature patcher, per spec §4.10.
//!
//! Runs after the output file is closed and re-opened for read/write: each
//! unsaved signature field's `/ByteRange`, `/Contents`, and `/Filter`
//! literals are located by a bounded window search, the final `/ByteRange`
//! is computed from every signature's placeholder span, and the opaque
//! signer is invoked to fill in the digest. Grounded on
//! `crate::signatures::ByteRangeCalculator` (byte-range math, placeholder
//! replacement) and `crate::signatures::DigestSigner` (the collaborator
//! interface spec §6.2 names as `write_digest`).

use crate::config::SIGNATURE_PATCH_WINDOW;
use crate::error::{Error, Result};
use crate::signatures::{ByteRangeCalculator, DigestSigner};
use std::path::Path;

/// One signature field awaiting its digest: the byte offset of its parent
/// object in the written file, plus (once located) the spans of the three
/// literals the patcher must rewrite.
#[derive(Debug, Clone, Copy)]
pub struct PendingSignature {
    /// Offset of the signature dictionary's first byte in the output file.
    pub parent_offset: usize,
}

/// A signature field whose literals have been located within the patch
/// window.
#[derive(Debug, Clone)]
struct LocatedSignature {
    contents_offset: usize,
    placeholder_size: usize,
    byte_range_offset: usize,
    byte_range_reserved: usize,
}

/// Locate `/ByteRange`, `/Contents`, `/Filter` within [`SIGNATURE_PATCH_WINDOW`]
/// bytes of `sig.parent_offset`, erroring per spec §9 if they don't fit.
fn locate(data: &[u8], sig: PendingSignature) -> Result<LocatedSignature> {
    let window_end = (sig.parent_offset + SIGNATURE_PATCH_WINDOW).min(data.len());
    let window = &data[sig.parent_offset..window_end];

    if find_literal(window, b"/Filter").is_none() {
        return Err(Error::SignatureWindowOverflow {
            offset: sig.parent_offset,
            window: SIGNATURE_PATCH_WINDOW,
        });
    }

    let byte_range_rel = find_literal(window, b"/ByteRange").ok_or(Error::SignatureWindowOverflow {
        offset: sig.parent_offset,
        window: SIGNATURE_PATCH_WINDOW,
    })?;
    let byte_range_offset = sig.parent_offset + byte_range_rel;
    let byte_range_reserved = array_literal_len(&data[byte_range_offset..window_end])
        .ok_or(Error::SignatureWindowOverflow { offset: sig.parent_offset, window: SIGNATURE_PATCH_WINDOW })?;

    let contents_offset = ByteRangeCalculator::find_contents_offset(data, sig.parent_offset).ok_or(
        Error::SignatureWindowOverflow { offset: sig.parent_offset, window: SIGNATURE_PATCH_WINDOW },
    )?;
    let placeholder_size = hex_literal_len(&data[contents_offset..window_end])
        .ok_or(Error::SignatureWindowOverflow { offset: sig.parent_offset, window: SIGNATURE_PATCH_WINDOW })?;

    Ok(LocatedSignature { contents_offset, placeholder_size, byte_range_offset, byte_range_reserved })
}

fn find_literal(window: &[u8], needle: &[u8]) -> Option<usize> {
    window.windows(needle.len()).position(|w| w == needle)
}

/// Length in bytes of a `[ ... ]` array literal starting at `data[0]`.
fn array_literal_len(data: &[u8]) -> Option<usize> {
    let start = data.iter().position(|&b| b == b'[')?;
    let mut depth = 0usize;
    for (i, &b) in data[start..].iter().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Length in bytes of a `<...>` hex-string literal starting at `data[0]`.
fn hex_literal_len(data: &[u8]) -> Option<usize> {
    if data.first() != Some(&b'<') {
        return None;
    }
    data.iter().position(|&b| b == b'>').map(|end| end + 1)
}

/// Patch every pending signature in `path` with its final `/ByteRange` and
/// signed digest, per spec §4.10's five-step sequence. Signatures are
/// patched in ascending `parent_offset` order; the `/ByteRange` every
/// signature receives excludes every signature's `/Contents` span (the
/// multi-signature case), not just its own.
pub fn patch_signatures(
    path: &Path,
    pending: &[PendingSignature],
    signer: &dyn DigestSigner,
) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }

    let mut data = std::fs::read(path)?;
    let file_size = data.len();

    let mut located: Vec<LocatedSignature> =
        pending.iter().map(|&sig| locate(&data, sig)).collect::<Result<_>>()?;
    located.sort_by_key(|l| l.contents_offset);

    let excluded: Vec<(usize, usize)> =
        located.iter().map(|l| (l.contents_offset, l.contents_offset + l.placeholder_size)).collect();
    let byte_range = ByteRangeCalculator::calculate_multi_byte_range(file_size, &excluded);
    let formatted = ByteRangeCalculator::format_byte_range_n(&byte_range);

    for sig in &located {
        overwrite_padded(&mut data, sig.byte_range_offset, sig.byte_range_reserved, formatted.as_bytes())?;
    }
    std::fs::write(path, &data)?;

    for sig in &located {
        let digest = signer.sign_byte_range(path, &[byte_range[0], byte_range[1], byte_range[2], byte_range[3]])?;
        let hex = to_hex(&digest);
        let placeholder_hex_len = sig.placeholder_size - 2;
        if hex.len() > placeholder_hex_len {
            return Err(Error::CompressionFailure(format!(
                "digest {} hex chars exceeds placeholder capacity {}",
                hex.len(),
                placeholder_hex_len
            )));
        }
        let mut data = std::fs::read(path)?;
        let mut value = String::with_capacity(sig.placeholder_size);
        value.push('<');
        value.push_str(&hex);
        value.push_str(&"0".repeat(placeholder_hex_len - hex.len()));
        value.push('>');
        data[sig.contents_offset..sig.contents_offset + sig.placeholder_size].copy_from_slice(value.as_bytes());
        std::fs::write(path, &data)?;
    }

    Ok(())
}

/// Overwrite `data[offset..offset+reserved]` with `value`, space-padding to
/// the original reservation (spec §4.10 step 4).
fn overwrite_padded(data: &mut [u8], offset: usize, reserved: usize, value: &[u8]) -> Result<()> {
    if value.len() > reserved {
        return Err(Error::SignatureWindowOverflow { offset, window: reserved });
    }
    let slot = &mut data[offset..offset + reserved];
    slot[..value.len()].copy_from_slice(value);
    for b in &mut slot[value.len()..] {
        *b = b' ';
    }
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    struct StubSigner(Vec<u8>);

    impl DigestSigner for StubSigner {
        fn sign_byte_range(&self, _path: &Path, _byte_range: &[i64; 4]) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
        fn placeholder_size(&self) -> usize {
            self.0.len() * 2 + 2
        }
    }

    fn write_temp(contents: &[u8]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("sigpatch-test-{:p}.pdf", contents.as_ptr()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn array_literal_len_finds_matching_bracket() {
        assert_eq!(array_literal_len(b"[0 0 0 0] rest"), Some(9));
    }

    #[test]
    fn hex_literal_len_finds_closing_angle() {
        assert_eq!(hex_literal_len(b"<00AA>>>"), Some(6));
    }

    #[test]
    fn patch_signatures_fills_byte_range_and_digest() {
        let doc = b"%PDF-1.7\n1 0 obj\n<< /Type /Sig /Filter /Adobe.PPKLite /ByteRange [0 0 0 0            ] /Contents <00000000000000000000> >>\nendobj\n%%EOF";
        let path = write_temp(doc);
        let parent_offset = doc.windows(6).position(|w| w == b"1 0 ob").unwrap();

        let pending = vec![PendingSignature { parent_offset }];
        let signer = StubSigner(vec![0xAB, 0xCD]);
        patch_signatures(&path, &pending, &signer).unwrap();

        let patched = std::fs::read(&path).unwrap();
        let text = String::from_utf8_lossy(&patched);
        assert!(text.contains("/ByteRange [0 "));
        assert!(text.contains("abcd0000000000000000>"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn patch_signatures_is_noop_on_empty_list() {
        let path = write_temp(b"%PDF-1.7\n%%EOF");
        let signer = StubSigner(vec![]);
        patch_signatures(&path, &[], &signer).unwrap();
        std::fs::remove_file(&path).ok();
    }
}
