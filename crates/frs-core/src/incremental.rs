//! The incremental fact filter: an anti-join on the dimension-key triple.
//!
//! This is the only thing standing between a re-derived candidate and a
//! duplicate fact row; the storage layer is not assumed to enforce
//! uniqueness. It runs on every fact load, watermark or not.

use std::collections::HashSet;

use crate::fact::{FactKey, FactRow};

/// Candidates split by whether they may be loaded.
#[derive(Debug, Clone)]
pub struct Filtered<F> {
  pub fresh:          Vec<F>,
  /// Candidates whose key triple is already in the fact table.
  pub already_loaded: usize,
  /// Candidates whose key triple appeared earlier in the same batch.
  pub repeated:       usize,
}

/// Keep only candidates whose key triple is neither in `loaded` nor shared
/// with an earlier candidate. Candidate order is preserved, so the caller
/// decides which of several same-key rows wins by ordering them.
pub fn retain_unloaded<F: FactRow>(
  candidates: Vec<F>,
  loaded: impl IntoIterator<Item = FactKey>,
) -> Filtered<F> {
  let loaded: HashSet<FactKey> = loaded.into_iter().collect();
  let mut seen: HashSet<FactKey> = HashSet::new();
  let mut out = Filtered {
    fresh:          Vec::with_capacity(candidates.len()),
    already_loaded: 0,
    repeated:       0,
  };
  for candidate in candidates {
    let key = candidate.fact_key();
    if loaded.contains(&key) {
      out.already_loaded += 1;
    } else if !seen.insert(key) {
      out.repeated += 1;
    } else {
      out.fresh.push(candidate);
    }
  }
  out
}
