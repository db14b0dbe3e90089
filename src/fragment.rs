use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A contiguous slice of a file, tagged with its position and the file's total fragment count.
///
/// Positions are zero-based and dense: a complete file has fragments `0..total`.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub file_name: String,
    pub position: u32,
    pub total: u32,
    pub data: Vec<u8>,
}

impl ::std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(
            f,
            "{} [{}/{}] ({} bytes)",
            self.file_name,
            self.position,
            self.total,
            self.data.len()
        )
    }
}

/// Returns the number of fragments `len` bytes split into with `fragment_size`.
pub fn fragment_count(len: usize, fragment_size: usize) -> usize {
    (len + fragment_size - 1) / fragment_size
}

/// Splits `content` into fragments of `fragment_size` bytes. The final fragment may be shorter.
pub fn split(file_name: &str, content: &[u8], fragment_size: usize) -> Vec<Fragment> {
    assert!(fragment_size > 0, "fragment size must be positive");
    let total = fragment_count(content.len(), fragment_size) as u32;
    content
        .chunks(fragment_size)
        .enumerate()
        .map(|(position, chunk)| Fragment {
            file_name: file_name.to_string(),
            position: position as u32,
            total,
            data: chunk.to_vec(),
        })
        .collect()
}

/// Returns `true` while `collected` cannot yet form a complete file: either nothing was found or
/// fewer positions are filled than the declared total.
pub fn needs_more(collected: &BTreeMap<u32, Fragment>) -> bool {
    match collected.values().next() {
        None => true,
        Some(first) => collected.len() < first.total as usize,
    }
}

/// Concatenates the payloads of `collected` in position order.
///
/// Fails with `NotFound` if nothing was collected, and with `Incomplete` unless exactly the
/// positions `0..total` declared by the collected fragments are present.
pub fn assemble(file_name: &str, collected: &BTreeMap<u32, Fragment>) -> Result<Vec<u8>> {
    let total = match collected.values().next() {
        Some(first) => first.total,
        None => return Err(Error::NotFound(file_name.to_string())),
    };

    let is_dense = collected.len() == total as usize
        && collected.keys().enumerate().all(|(i, &position)| i as u32 == position)
        && collected.values().all(|fragment| fragment.total == total);
    if !is_dense {
        return Err(Error::Incomplete {
            name: file_name.to_string(),
            have: collected.len(),
            total,
        });
    }

    let mut content = Vec::with_capacity(collected.values().map(|f| f.data.len()).sum());
    for fragment in collected.values() {
        content.extend_from_slice(&fragment.data);
    }
    Ok(content)
}
