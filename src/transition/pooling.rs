//! Cohort pooling
//!
//! Per-file count tables are merged by summing counts over the outer union of
//! their keys. Probabilities are only computed afterwards, on the pooled
//! counts; averaging per-file probabilities would weight a short recording the
//! same as a long one.

use crate::transition::types::CountTables;

impl CountTables {
    /// Add another table's counts into this one
    pub fn absorb(&mut self, other: CountTables) {
        for (key, count) in other.behavior_counts {
            *self.behavior_counts.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.transition_counts {
            *self.transition_counts.entry(key).or_insert(0) += count;
        }
    }
}

/// Sum per-file count tables into one cohort table
pub fn pool_counts<I>(tables: I) -> CountTables
where
    I: IntoIterator<Item = CountTables>,
{
    tables
        .into_iter()
        .fold(CountTables::default(), |mut pooled, table| {
            pooled.absorb(table);
            pooled
        })
}
