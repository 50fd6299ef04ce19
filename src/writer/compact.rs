//! Object compaction and renumbering, per spec §4.3.
//!
//! `RenumberMap` starts as the identity map (or as the deduplicator's
//! collapse map) and is walked by [`compact`] to assign a contiguous
//! `1..=k` numbering to every in-use object.

use crate::object::{Object, ObjectRef};
use crate::writer::usage::UseList;
use std::collections::HashMap;

/// `new_num[old]` -> new object number, 0 meaning "dropped". Maintains the
/// reverse map `rev[new] = old` alongside it.
#[derive(Debug, Clone)]
pub struct RenumberMap {
    new_num: Vec<u32>,
    rev: Vec<u32>,
}

impl RenumberMap {
    /// Identity map over object numbers `0..len`.
    pub fn identity(len: usize) -> Self {
        let new_num: Vec<u32> = (0..len as u32).collect();
        Self {
            rev: new_num.clone(),
            new_num,
        }
    }

    /// Number of object slots tracked.
    pub fn len(&self) -> usize {
        self.new_num.len()
    }

    /// Whether the map tracks no object slots.
    pub fn is_empty(&self) -> bool {
        self.new_num.is_empty()
    }

    fn ensure_len(&mut self, num: u32) {
        let needed = num as usize + 1;
        if self.new_num.len() < needed {
            self.new_num.resize(needed, 0);
        }
    }

    /// Map `old` to `new`, recording the reverse entry. 0 means "dropped".
    pub fn set(&mut self, old: u32, new: u32) {
        self.ensure_len(old);
        self.new_num[old as usize] = new;
        if new != 0 {
            let needed = new as usize + 1;
            if self.rev.len() < needed {
                self.rev.resize(needed, 0);
            }
            self.rev[new as usize] = old;
        }
    }

    /// The new object number for `old`, or `None` if dropped/untracked.
    pub fn get(&self, old: u32) -> Option<u32> {
        match self.new_num.get(old as usize).copied() {
            Some(0) | None => None,
            Some(n) => Some(n),
        }
    }

    /// The original object number that now maps to `new`, if any.
    pub fn original_of(&self, new: u32) -> Option<u32> {
        self.rev.get(new as usize).copied()
    }

    /// Reset every entry back to the identity mapping.
    pub fn reset_to_identity(&mut self) {
        for (old, slot) in self.new_num.iter_mut().enumerate() {
            *slot = old as u32;
        }
        self.rev.clone_from(&self.new_num);
    }
}

/// Step 1 of §4.3: walk `renumber_map` (already populated by the
/// deduplicator, or identity if dedup did not run) and assign the next free
/// low number to every object that is in-use and not already collapsed onto
/// another object.
///
/// Requires `renumber_map[num] <= num` for every `num` (guaranteed by the
/// deduplicator, which only ever collapses a higher number onto a lower
/// one).
pub fn compact(map: &mut RenumberMap, use_list: &UseList) {
    let mut next_free = 1u32;
    let mut resolved: HashMap<u32, u32> = HashMap::new();

    for num in 1..map.len() as u32 {
        let target = map.get(num).unwrap_or(num);

        if !use_list.is_used(target) {
            map.set(num, 0);
            continue;
        }

        if target == num {
            let assigned = next_free;
            next_free += 1;
            resolved.insert(num, assigned);
            map.set(num, assigned);
        } else {
            // Inherit the already-computed new number of the collapse
            // target; targets are always processed first since dedup only
            // ever maps a higher number onto a lower one.
            let assigned = resolved.get(&target).copied().unwrap_or(0);
            resolved.insert(num, assigned);
            map.set(num, assigned);
        }
    }
}

/// Step 2 of §4.3: rewrite every indirect reference in `obj` under `map`.
/// References to dropped objects become `Object::Null`.
pub fn renumber_object(obj: &Object, map: &RenumberMap) -> Object {
    match obj {
        Object::Reference(r) => match map.get(r.id) {
            Some(new_id) => Object::Reference(ObjectRef::new(new_id, r.gen)),
            None => Object::Null,
        },
        Object::Array(items) => Object::Array(items.iter().map(|i| renumber_object(i, map)).collect()),
        Object::Dictionary(dict) => {
            Object::Dictionary(dict.iter().map(|(k, v)| (k.clone(), renumber_object(v, map))).collect())
        }
        Object::Stream { dict, data } => Object::Stream {
            dict: dict.iter().map(|(k, v)| (k.clone(), renumber_object(v, map))).collect(),
            data: data.clone(),
        },
        other => other.clone(),
    }
}

/// Rewrite every object in `objects` (including the trailer, passed as the
/// last element by convention of the caller) under `map`, and reset `map`
/// back to the identity — the new numbering is now baked into the objects
/// themselves.
pub fn renumber_all(objects: &mut HashMap<u32, (u16, Object)>, map: &mut RenumberMap) {
    let mut renumbered = HashMap::with_capacity(objects.len());

    for (old_num, (gen, obj)) in objects.drain() {
        let Some(new_num) = map.get(old_num) else {
            continue;
        };
        renumbered.insert(new_num, (gen, renumber_object(&obj, map)));
    }

    *objects = renumbered;
    map.reset_to_identity();
}
