//! Read batching for sparse sampling
//!
//! Sampled elements map to "units" (a quantization block, or one element
//! for plain float encodings, or one byte for the fallback path). Nearby
//! units are fetched with one range read; a run is split when the gap to
//! the next needed unit is too large or the run would grow past the cap.

/// A contiguous run of units fetched with a single read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRun {
    pub first: u64,
    pub count: u64,
}

impl BatchRun {
    /// One past the last unit
    pub fn end(&self) -> u64 {
        self.first + self.count
    }

    pub fn contains(&self, unit: u64) -> bool {
        unit >= self.first && unit < self.end()
    }
}

/// Group needed units into contiguous runs
///
/// `units` may be unsorted and contain duplicates. A run is broken when the
/// number of unneeded units between two needed ones exceeds `max_gap`, or
/// when extending it would make it longer than `max_batch` units.
pub fn plan_batches(units: &[u64], max_gap: u64, max_batch: u64) -> Vec<BatchRun> {
    let max_batch = max_batch.max(1);

    let mut sorted = units.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return runs;
    };

    let mut current = BatchRun { first, count: 1 };
    for unit in iter {
        let gap = unit - current.end();
        let extended = unit - current.first + 1;
        if gap > max_gap || extended > max_batch {
            runs.push(current);
            current = BatchRun {
                first: unit,
                count: 1,
            };
        } else {
            current.count = extended;
        }
    }
    runs.push(current);
    runs
}
