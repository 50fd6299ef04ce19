//! Duplicate-object detection, per spec §4.2.
//!
//! Only runs at garbage level >= 3. Structural equality comes for free from
//! `Object`'s derived `PartialEq`; at level 4, stream bodies are additionally
//! compared byte-for-byte (spec §9 open question: filters are not
//! normalized first, so differently-encoded-but-identical-content streams
//! are considered distinct).

use crate::object::Object;
use crate::writer::compact::RenumberMap;
use crate::writer::options::GarbageLevel;
use crate::writer::usage::UseList;
use std::collections::HashMap;

/// Pairwise-compares every in-use object and collapses structural
/// duplicates onto the lowest-numbered instance, updating `renumber_map`
/// and `use_list` in place. `O(n^2)`, acceptable since it is opt-in (spec
/// §4.2).
pub fn deduplicate(
    objects: &HashMap<u32, (u16, Object)>,
    use_list: &mut UseList,
    renumber_map: &mut RenumberMap,
    level: GarbageLevel,
) {
    if level < GarbageLevel::Dedupe {
        return;
    }

    let compare_streams = level >= GarbageLevel::DedupeStreams;

    let mut in_use: Vec<u32> = use_list.used_object_numbers().collect();
    in_use.sort_unstable();

    for idx_i in (0..in_use.len()).rev() {
        let i = in_use[idx_i];
        if !use_list.is_used(i) {
            continue;
        }
        let Some((_, obj_i)) = objects.get(&i) else { continue };

        for &j in in_use.iter().take(idx_i) {
            if !use_list.is_used(j) {
                continue;
            }
            let Some((_, obj_j)) = objects.get(&j) else { continue };

            if objects_equal(obj_i, obj_j, compare_streams) {
                let (hi, lo) = if i > j { (i, j) } else { (j, i) };
                renumber_map.set(hi, renumber_map.get(lo).unwrap_or(lo));
                use_list.clear(hi);
                break;
            }
        }
    }
}

fn objects_equal(a: &Object, b: &Object, compare_streams: bool) -> bool {
    match (a, b) {
        (Object::Stream { dict: da, data: xa }, Object::Stream { dict: db, data: xb }) => {
            if !compare_streams {
                return false;
            }
            da == db && xa == xb
        }
        _ => a == b,
    }
}
