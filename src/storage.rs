use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::fragment::Fragment;

#[derive(Clone, Debug)]
struct StoredFragment {
    total: u32,
    data: Vec<u8>,
}

/// A node's local in-memory fragment table, keyed by file name and then by position.
///
/// A file name is known to the store exactly while at least one of its fragments is held, so the
/// known-files set is the key set of `files`.
#[derive(Default)]
pub struct Storage {
    files: HashMap<String, BTreeMap<u32, StoredFragment>>,
}

impl Storage {
    pub fn new() -> Self {
        Storage {
            files: HashMap::new(),
        }
    }

    /// Inserts `fragment` unless a fragment with the same `(file_name, position)` key is already
    /// held. Returns `true` if the fragment was newly stored.
    pub fn insert(&mut self, fragment: Fragment) -> bool {
        let Fragment {
            file_name,
            position,
            total,
            data,
        } = fragment;
        let positions = self.files.entry(file_name).or_insert_with(BTreeMap::new);
        if positions.contains_key(&position) {
            return false;
        }
        positions.insert(position, StoredFragment { total, data });
        true
    }

    pub fn contains(&self, file_name: &str, position: u32) -> bool {
        self.files
            .get(file_name)
            .map_or(false, |positions| positions.contains_key(&position))
    }

    /// Returns the fragments held for `file_name`, in position order.
    pub fn get(&self, file_name: &str) -> Vec<Fragment> {
        match self.files.get(file_name) {
            Some(positions) => positions
                .iter()
                .map(|(&position, stored)| Fragment {
                    file_name: file_name.to_string(),
                    position,
                    total: stored.total,
                    data: stored.data.clone(),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns the names of all files with at least one local fragment.
    pub fn file_names(&self) -> BTreeSet<String> {
        self.files.keys().cloned().collect()
    }

    /// Returns the number of fragments held across all files.
    pub fn fragment_count(&self) -> usize {
        self.files.values().map(BTreeMap::len).sum()
    }
}
