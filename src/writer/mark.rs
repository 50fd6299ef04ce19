//! Reachability marking from the trailer, per spec §4.1.
//!
//! The original recurses (`markobj`/`mark_all`) through the document graph;
//! per spec §9's Design Note on untrusted recursive input, this uses an
//! explicit work-list instead, with the use-list's non-zero word doubling
//! as the visited set.

use crate::object::Object;
use crate::writer::model::WriteDocument;
use crate::writer::usage::UseList;
use std::collections::HashSet;

/// Marks every object reachable from `doc`'s trailer into `use_list`,
/// repairing dangling references by replacing them with `Object::Null` in
/// their containing array/dict. Repair runs unconditionally, independent of
/// `Options::garbage` — spec §4.1/§7 require defaults to already produce a
/// reference-safe document.
pub struct ReachabilityMarker<'a> {
    doc: &'a mut WriteDocument,
}

impl<'a> ReachabilityMarker<'a> {
    /// Create a marker over `doc`.
    pub fn new(doc: &'a mut WriteDocument) -> Self {
        Self { doc }
    }

    /// Mark from the trailer's `/Root` (and, defensively, `/Info` and
    /// `/Encrypt` if present), repairing every dangling reference found
    /// along the way by rewriting it to `Object::Null` in place. Returns
    /// the resulting use-list.
    pub fn mark_all(&mut self) -> UseList {
        let mut use_list = UseList::new(self.doc.capacity());
        let mut work_list: Vec<u32> = Vec::new();
        let mut visited: HashSet<u32> = HashSet::new();

        for key in ["Root", "Info", "Encrypt"] {
            if let Some(Object::Reference(r)) = self.doc.trailer_value(key) {
                work_list.push(r.id);
            }
        }

        while let Some(num) = work_list.pop() {
            if !visited.insert(num) {
                continue;
            }

            let Some(obj) = self.doc.get(num).cloned() else {
                continue;
            };

            // Ensure the slot is non-zero even if no section flag applies yet;
            // later passes (dedup, linearization) OR further flags in.
            use_list.set_word(num, use_list.word(num).max(1));

            let repaired = repair_duff_references(&obj, &|id| self.doc.get(id).is_some());
            if repaired != obj {
                let gen = self.doc.generation(num).unwrap_or(0);
                self.doc.insert_object(num, gen, repaired.clone());
            }

            Self::enqueue(&repaired, &mut work_list);

            if let Object::Stream { dict, .. } = &repaired {
                if let Some(Object::Reference(len_ref)) = dict.get("Length") {
                    // Inline the indirect /Length per spec §4.1, clearing its
                    // use bit since it's no longer referenced once inlined.
                    if let Some(len_obj) = self.doc.get(len_ref.id) {
                        if let Some(n) = len_obj.as_integer() {
                            self.doc.bake_length(num, n);
                            use_list.clear(len_ref.id);
                        }
                    }
                }
            }
        }

        use_list
    }

    fn enqueue(obj: &Object, work_list: &mut Vec<u32>) {
        match obj {
            Object::Reference(r) => work_list.push(r.id),
            Object::Array(items) => {
                for item in items {
                    Self::enqueue(item, work_list);
                }
            }
            Object::Dictionary(dict) => {
                for value in dict.values() {
                    Self::enqueue(value, work_list);
                }
            }
            Object::Stream { dict, .. } => {
                for value in dict.values() {
                    Self::enqueue(value, work_list);
                }
            }
            _ => {}
        }
    }
}

/// Replace every reference to an unresolvable object within `obj` with
/// `Object::Null`, given the set of object numbers known to resolve.
pub fn repair_duff_references(obj: &Object, resolves: &dyn Fn(u32) -> bool) -> Object {
    match obj {
        Object::Reference(r) if !resolves(r.id) => Object::Null,
        Object::Array(items) => Object::Array(items.iter().map(|i| repair_duff_references(i, resolves)).collect()),
        Object::Dictionary(dict) => Object::Dictionary(
            dict.iter()
                .map(|(k, v)| (k.clone(), repair_duff_references(v, resolves)))
                .collect(),
        ),
        Object::Stream { dict, data } => Object::Stream {
            dict: dict
                .iter()
                .map(|(k, v)| (k.clone(), repair_duff_references(v, resolves)))
                .collect(),
            data: data.clone(),
        },
        other => other.clone(),
    }
}
