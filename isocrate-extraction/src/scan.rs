//! Offset planning
//!
//! Turns per-item output counts into per-item write offsets with an
//! exclusive prefix sum. The pipeline only depends on the [`OffsetPlanner`]
//! trait, so any scan primitive can be plugged in.

use crate::parallel::{self, Backend};
use isocrate_core::{Error, Result};
use log::trace;
use rayon::prelude::*;

/// Exclusive scan result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutput {
    /// `offsets[i]` is the sum of all counts before item `i`
    pub offsets: Vec<usize>,
    /// Sum of all counts
    pub total: usize,
}

impl ScanOutput {
    /// Check that this is the exclusive scan of `counts`.
    ///
    /// Generation writes every item into `offsets[i]..offsets[i] + counts[i]`,
    /// so a planner whose output leaves gaps or overlaps is rejected here.
    pub fn validate(&self, counts: &[u32]) -> Result<()> {
        if self.offsets.len() != counts.len() {
            return Err(Error::Algorithm(format!(
                "Planner returned {} offsets for {} counts",
                self.offsets.len(),
                counts.len()
            )));
        }

        let mut running = 0usize;
        for (i, (&offset, &count)) in self.offsets.iter().zip(counts).enumerate() {
            if offset != running {
                return Err(Error::Algorithm(format!(
                    "Planner offset {} at item {} should be {}",
                    offset, i, running
                )));
            }
            running += count as usize;
        }

        if self.total != running {
            return Err(Error::Algorithm(format!(
                "Planner total {} should be {}",
                self.total, running
            )));
        }
        Ok(())
    }
}

/// Exclusive prefix-sum capability used between classification and generation
pub trait OffsetPlanner: Send + Sync {
    /// Compute `offsets[i] = counts[0] + .. + counts[i - 1]` and the grand total
    fn exclusive_scan(&self, counts: &[u32]) -> Result<ScanOutput>;
}

/// Single-threaded scan
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialScan;

impl OffsetPlanner for SerialScan {
    fn exclusive_scan(&self, counts: &[u32]) -> Result<ScanOutput> {
        Ok(scan_serial(counts.iter().map(|&c| c as usize), counts.len()))
    }
}

fn scan_serial<I>(counts: I, len: usize) -> ScanOutput
where
    I: Iterator<Item = usize>,
{
    let mut offsets = Vec::with_capacity(len);
    let mut total = 0usize;
    for count in counts {
        offsets.push(total);
        total += count;
    }
    ScanOutput { offsets, total }
}

/// Two-pass chunked scan on the rayon pool.
///
/// Pass one sums each chunk in parallel, a short serial scan turns the chunk
/// sums into chunk bases, and pass two scans every chunk from its base.
#[derive(Debug, Clone, Copy)]
pub struct ParallelScan {
    pub chunk_size: usize,
}

impl ParallelScan {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for ParallelScan {
    fn default() -> Self {
        Self::new(16 * 1024)
    }
}

impl OffsetPlanner for ParallelScan {
    fn exclusive_scan(&self, counts: &[u32]) -> Result<ScanOutput> {
        let chunk = self.chunk_size.max(1);
        if counts.len() <= chunk || !parallel::is_parallel_enabled() {
            return SerialScan.exclusive_scan(counts);
        }

        let chunk_sums: Vec<usize> = parallel::execute_parallel(|| {
            counts
                .par_chunks(chunk)
                .map(|c| c.iter().map(|&v| v as usize).sum::<usize>())
                .collect()
        })?;

        let bases = scan_serial(chunk_sums.iter().copied(), chunk_sums.len());
        trace!(
            "parallel scan: {} counts in {} chunks of {}",
            counts.len(),
            chunk_sums.len(),
            chunk
        );

        let mut offsets = vec![0usize; counts.len()];
        parallel::execute_parallel(|| {
            offsets
                .par_chunks_mut(chunk)
                .zip(counts.par_chunks(chunk))
                .zip(bases.offsets.par_iter())
                .for_each(|((out, counts), &base)| {
                    let mut running = base;
                    for (slot, &count) in out.iter_mut().zip(counts) {
                        *slot = running;
                        running += count as usize;
                    }
                });
        })?;

        Ok(ScanOutput {
            offsets,
            total: bases.total,
        })
    }
}

/// Expand a per-cell scan into a per-output map.
///
/// Output `t` of the concatenated outputs belongs to the item `i` with
/// `offsets[i] <= t < offsets[i] + counts[i]`; the returned vector holds
/// that `i` for every `t`.
pub fn expand_cell_ids(
    backend: Backend,
    counts: &[u32],
    scan: &ScanOutput,
) -> Result<Vec<usize>> {
    let mut owners = parallel::try_filled_vec(scan.total, 0usize)?;
    let active = parallel::parallel_filter_indices(backend, counts.len(), |i| counts[i] != 0)?;
    let slices = parallel::split_disjoint(
        &mut owners,
        active
            .iter()
            .map(|&i| scan.offsets[i]..scan.offsets[i] + counts[i] as usize),
    )?;

    parallel::for_each_disjoint(backend, &active, slices, |item, out| out.fill(item))?;

    Ok(owners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_serial_scan() {
        let scan = SerialScan.exclusive_scan(&[3, 0, 6, 3]).unwrap();
        assert_eq!(scan.offsets, vec![0, 3, 3, 9]);
        assert_eq!(scan.total, 12);
    }

    #[test]
    fn test_empty_scan() {
        let scan = ParallelScan::new(4).exclusive_scan(&[]).unwrap();
        assert!(scan.offsets.is_empty());
        assert_eq!(scan.total, 0);
    }

    #[test]
    fn test_parallel_scan_matches_serial() {
        let counts: Vec<u32> = (0..10_000).map(|i| (i * 7 % 16) as u32).collect();
        let serial = SerialScan.exclusive_scan(&counts).unwrap();
        let parallel = ParallelScan::new(333).exclusive_scan(&counts).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_validate_rejects_bad_offsets() {
        let counts = [2, 0, 1];
        let good = SerialScan.exclusive_scan(&counts).unwrap();
        assert!(good.validate(&counts).is_ok());

        let overlapping = ScanOutput {
            offsets: vec![0, 1, 1],
            total: 3,
        };
        assert!(matches!(
            overlapping.validate(&counts),
            Err(Error::Algorithm(_))
        ));

        let short = ScanOutput {
            offsets: vec![0, 2],
            total: 3,
        };
        assert!(short.validate(&counts).is_err());

        let wrong_total = ScanOutput {
            offsets: vec![0, 2, 2],
            total: 4,
        };
        assert!(wrong_total.validate(&counts).is_err());
    }

    #[test]
    fn test_expand_cell_ids() {
        let counts = [2, 0, 1, 3];
        let scan = SerialScan.exclusive_scan(&counts).unwrap();
        let owners = expand_cell_ids(Backend::Serial, &counts, &scan).unwrap();
        assert_eq!(owners, vec![0, 0, 2, 3, 3, 3]);
    }

    proptest! {
        #[test]
        fn prop_scan_is_exclusive_prefix_sum(
            counts in prop::collection::vec(0u32..16, 0..2000),
            chunk in 1usize..300,
        ) {
            let scan = ParallelScan::new(chunk).exclusive_scan(&counts).unwrap();
            prop_assert_eq!(scan.offsets.len(), counts.len());
            let mut running = 0usize;
            for (offset, &count) in scan.offsets.iter().zip(&counts) {
                prop_assert_eq!(*offset, running);
                running += count as usize;
            }
            prop_assert_eq!(scan.total, running);
        }

        #[test]
        fn prop_expand_lower_bound(counts in prop::collection::vec(0u32..6, 1..500)) {
            let scan = SerialScan.exclusive_scan(&counts).unwrap();
            let owners = expand_cell_ids(Backend::Parallel, &counts, &scan).unwrap();
            prop_assert_eq!(owners.len(), scan.total);
            for (t, &cell) in owners.iter().enumerate() {
                prop_assert!(scan.offsets[cell] <= t);
                prop_assert!(t < scan.offsets[cell] + counts[cell] as usize);
            }
        }
    }
}
