//! Seeded, stratified train/test splitting.

use crate::error::{ChurnError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Row indices of the two partitions, each in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices into train and test partitions, preserving the label
/// proportions in both.
///
/// Each class contributes `round(n_class * test_size)` rows to the test
/// partition, clamped so that both partitions receive at least one row of
/// every class. The same `labels`, `test_size` and `seed` always give the same
/// split.
///
/// # Errors
/// Returns [`ChurnError::InvalidParameter`] if `test_size` is not in `(0, 1)`
/// or a class has fewer than two members.
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ChurnError::InvalidParameter(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (label, mut rows) in by_class {
        let n = rows.len();
        if n < 2 {
            return Err(ChurnError::InvalidParameter(format!(
                "class {} has {} member(s); stratified split needs at least 2",
                label, n
            )));
        }
        let n_test = ((n as f64) * test_size).round().clamp(1.0, (n - 1) as f64) as usize;
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(SplitIndices { train, test })
}
