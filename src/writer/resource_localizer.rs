//! Page-resource localization, per spec §4.4.
//!
//! Walks the page tree pushing inheritable attributes (`/Resources` and the
//! four box entries plus `/Rotate`) down onto each leaf so every page is
//! self-contained — a prerequisite for linearization, since a linearized
//! page's first-page group must not depend on a `/Pages` ancestor that
//! lives in the remainder of the file.

use crate::object::Object;
use crate::writer::model::WriteDocument;
use std::collections::{HashMap, HashSet};

const INHERITABLE_DIRECT: &[&str] = &["MediaBox", "CropBox", "BleedBox", "TrimBox", "ArtBox", "Rotate"];
const RESOURCE_SUBDICTS: &[&str] = &[
    "ExtGState", "ColorSpace", "Pattern", "Shading", "XObject", "Font", "ProcSet", "Properties",
];

/// Localizes inherited page attributes onto every leaf page, then strips
/// those keys from interior `/Pages` nodes so the tree is flat-leaf-only
/// afterward (spec §4.4). Cycles are broken with a visited set standing in
/// for the original's object-model mark bit.
pub fn localize(doc: &mut WriteDocument, pages_root: u32) {
    let mut inherited = HashMap::new();
    let mut visited = HashSet::new();
    let mut interior_nodes = Vec::new();

    walk(doc, pages_root, inherited.clone(), &mut visited, &mut interior_nodes);
    inherited.clear();

    for num in interior_nodes {
        if let Some(Object::Dictionary(dict)) = doc.get(num).cloned().as_mut() {
            let mut dict = dict.clone();
            for key in INHERITABLE_DIRECT.iter().chain(["Resources"].iter()) {
                dict.remove(*key);
            }
            doc.insert_object(num, doc.generation(num).unwrap_or(0), Object::Dictionary(dict));
        }
    }
}

fn walk(
    doc: &mut WriteDocument,
    num: u32,
    inherited: HashMap<String, Object>,
    visited: &mut HashSet<u32>,
    interior_nodes: &mut Vec<u32>,
) {
    if !visited.insert(num) {
        return;
    }

    let Some(obj) = doc.get(num).cloned() else { return };
    let Object::Dictionary(dict) = &obj else { return };

    let mut next_inherited = inherited.clone();
    for key in INHERITABLE_DIRECT {
        if let Some(value) = dict.get(*key) {
            next_inherited.insert(key.to_string(), value.clone());
        }
    }
    if let Some(resources) = dict.get("Resources") {
        next_inherited.insert("Resources".to_string(), resources.clone());
    }

    let is_page_type = matches!(dict.get("Type"), Some(Object::Name(t)) if t == "Page");
    let kids = dict.get("Kids").and_then(Object::as_array).cloned();

    if let Some(kids) = kids {
        interior_nodes.push(num);
        for kid in &kids {
            if let Some(kid_ref) = kid.as_reference() {
                walk(doc, kid_ref.id, next_inherited.clone(), visited, interior_nodes);
            }
        }
        return;
    }

    if !is_page_type {
        return;
    }

    let mut merged = dict.clone();
    for key in INHERITABLE_DIRECT {
        if !merged.contains_key(*key) {
            if let Some(value) = next_inherited.get(*key) {
                merged.insert(key.to_string(), value.clone());
            }
        }
    }
    merge_resources(&mut merged, next_inherited.get("Resources"));

    doc.insert_object(num, doc.generation(num).unwrap_or(0), Object::Dictionary(merged));
}

fn merge_resources(page_dict: &mut HashMap<String, Object>, inherited_resources: Option<&Object>) {
    let Some(Object::Dictionary(parent_res)) = inherited_resources else { return };

    let mut local_res = match page_dict.remove("Resources") {
        Some(Object::Dictionary(d)) => d,
        _ => HashMap::new(),
    };

    for sub_key in RESOURCE_SUBDICTS {
        let parent_sub = parent_res.get(*sub_key);
        match (local_res.get(*sub_key).cloned(), parent_sub) {
            (Some(Object::Dictionary(mut local_sub)), Some(Object::Dictionary(parent_sub))) => {
                for (k, v) in parent_sub {
                    local_sub.entry(k.clone()).or_insert_with(|| v.clone());
                }
                local_res.insert(sub_key.to_string(), Object::Dictionary(local_sub));
            }
            (None, Some(parent_sub)) => {
                local_res.insert(sub_key.to_string(), parent_sub.clone());
            }
            _ => {}
        }
    }

    // Non-sub-dictionary entries (rare, but present verbatim) fill gaps too.
    for (k, v) in parent_res {
        local_res.entry(k.clone()).or_insert_with(|| v.clone());
    }

    page_dict.insert("Resources".to_string(), Object::Dictionary(local_res));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    fn dict(pairs: &[(&str, Object)]) -> Object {
        Object::Dictionary(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn leaf_inherits_mediabox_and_resources_from_root() {
        let mut doc = WriteDocument::new();
        doc.insert_object(
            1,
            0,
            dict(&[
                ("Type", Object::Name("Pages".to_string())),
                ("Kids", Object::Array(vec![Object::Reference(ObjectRef::new(2, 0))])),
                ("MediaBox", Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)])),
                (
                    "Resources",
                    dict(&[("Font", dict(&[("F1", Object::Reference(ObjectRef::new(9, 0)))]))]),
                ),
            ]),
        );
        doc.insert_object(2, 0, dict(&[("Type", Object::Name("Page".to_string()))]));

        localize(&mut doc, 1);

        let Object::Dictionary(leaf) = doc.get(2).unwrap() else { panic!("expected dict") };
        assert!(leaf.contains_key("MediaBox"));
        let Some(Object::Dictionary(res)) = leaf.get("Resources") else { panic!("expected Resources") };
        assert!(res.contains_key("Font"));

        let Object::Dictionary(root) = doc.get(1).unwrap() else { panic!("expected dict") };
        assert!(!root.contains_key("MediaBox"));
        assert!(!root.contains_key("Resources"));
    }

    #[test]
    fn leaf_local_resource_entries_win_over_inherited() {
        let mut doc = WriteDocument::new();
        doc.insert_object(
            1,
            0,
            dict(&[
                ("Type", Object::Name("Pages".to_string())),
                ("Kids", Object::Array(vec![Object::Reference(ObjectRef::new(2, 0))])),
                (
                    "Resources",
                    dict(&[("Font", dict(&[("F1", Object::Reference(ObjectRef::new(9, 0)))]))]),
                ),
            ]),
        );
        doc.insert_object(
            2,
            0,
            dict(&[
                ("Type", Object::Name("Page".to_string())),
                (
                    "Resources",
                    dict(&[("Font", dict(&[("F1", Object::Reference(ObjectRef::new(42, 0)))]))]),
                ),
            ]),
        );

        localize(&mut doc, 1);

        let Object::Dictionary(leaf) = doc.get(2).unwrap() else { panic!("expected dict") };
        let Some(Object::Dictionary(res)) = leaf.get("Resources") else { panic!("expected Resources") };
        let Some(Object::Dictionary(fonts)) = res.get("Font") else { panic!("expected Font") };
        assert_eq!(fonts.get("F1"), Some(&Object::Reference(ObjectRef::new(42, 0))));
    }
}
