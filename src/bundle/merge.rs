// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

use indexmap::IndexMap;

use crate::value::{Mapping, Value};

/// Merge two provider/tool/hook lists by their `module` key, preserving
/// first-seen order: the result is `a ∪ (b \ a)` with entries shared by both
/// sides merged in place rather than duplicated (§8 invariant 5).
pub fn merge_module_lists(a: Vec<Mapping>, b: Vec<Mapping>) -> Vec<Mapping> {
    let mut result = a;
    let mut index_by_module: IndexMap<String, usize> = IndexMap::new();
    for (i, entry) in result.iter().enumerate() {
        if let Some(module) = module_id(entry) {
            index_by_module.insert(module.to_string(), i);
        }
    }

    for entry in b {
        match module_id(&entry).map(str::to_string) {
            Some(module) if index_by_module.contains_key(&module) => {
                let idx = index_by_module[&module];
                let merged = merge_module_entry(result[idx].clone(), entry);
                result[idx] = merged;
            }
            Some(module) => {
                index_by_module.insert(module, result.len());
                result.push(entry);
            }
            None => result.push(entry),
        }
    }

    result
}

fn module_id(entry: &Mapping) -> Option<&str> {
    entry.get("module").and_then(Value::as_str)
}

/// Merge one entry's fields into another: `config` sub-maps merge
/// recursively (later wins on leaves), every other sibling key is a plain
/// later-wins scalar replacement.
fn merge_module_entry(mut a: Mapping, b: Mapping) -> Mapping {
    for (key, value) in b {
        if key == "config" {
            match a.get_mut("config") {
                Some(existing) => existing.deep_merge(value),
                None => {
                    a.insert(key, value);
                }
            }
        } else {
            a.insert(key, value);
        }
    }
    a
}
