//! New-posting detection.
//!
//! Computes which fetched postings have not been notified yet. The diff is
//! pure: committing ids to the seen set is the caller's job, and happens only
//! after a posting's dispatch pass completes.

use std::collections::{BTreeSet, HashSet};

use crate::models::Posting;

/// Postings whose id is not in `seen`, oldest first.
///
/// Duplicate ids in `fetched` keep their first occurrence. Ordering is by
/// publication time ascending, ties broken by id ascending; postings with no
/// parseable date sort first.
pub fn new_postings(fetched: &[Posting], seen: &BTreeSet<String>) -> Vec<Posting> {
    let mut taken: HashSet<&str> = HashSet::with_capacity(fetched.len());

    let mut fresh = Vec::new();
    for posting in fetched {
        if !seen.contains(&posting.id) && taken.insert(posting.id.as_str()) {
            fresh.push(posting.clone());
        }
    }

    fresh.sort_by(Posting::chronological_cmp);
    fresh
}
