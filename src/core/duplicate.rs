//! Pairwise duplicate matching over a fingerprinted catalog.
//!
//! Every hashed record is compared with every other hashed record, O(n^2).
//! Records whose fingerprinting failed or never ran take no part.

use crate::core::catalog::{Catalog, VideoRecord};
use crate::core::hash::Fingerprint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PairOrder {
    /// Both (A, B) and (B, A) are reported.
    #[default]
    Ordered,
    /// Each pair once, first element earlier in catalog order.
    Unordered,
}

/// Two distinct, successfully fingerprinted records judged similar.
#[derive(Debug, Clone, Copy)]
pub struct DuplicatePair<'a> {
    pub first: &'a VideoRecord,
    pub second: &'a VideoRecord,
}

pub fn find_duplicates<'a, F>(
    catalog: &'a Catalog,
    order: PairOrder,
    mut is_similar: F,
) -> Vec<DuplicatePair<'a>>
where
    F: FnMut(&Fingerprint, &Fingerprint) -> bool,
{
    let hashed: Vec<(usize, &VideoRecord, &Fingerprint)> = catalog
        .records()
        .iter()
        .enumerate()
        .filter_map(|(i, record)| record.fingerprint().map(|fp| (i, record, fp)))
        .collect();

    let mut pairs = Vec::new();
    for &(i, first, first_fp) in &hashed {
        for &(j, second, second_fp) in &hashed {
            // A record is always similar to itself; never ask.
            if i == j || first.path() == second.path() {
                continue;
            }
            if order == PairOrder::Unordered && j < i {
                continue;
            }
            if is_similar(first_fp, second_fp) && !same_on_disk(first, second) {
                pairs.push(DuplicatePair { first, second });
            }
        }
    }
    pairs
}

/// Two names for one file on disk: a symlink and its target, or hard links.
fn same_on_disk(a: &VideoRecord, b: &VideoRecord) -> bool {
    match same_file::is_same_file(a.path(), b.path()) {
        Ok(same) => same,
        Err(e) => {
            log::debug!(
                "Cannot compare {} with {}: {}",
                a.path().display(),
                b.path().display(),
                e
            );
            false
        }
    }
}
