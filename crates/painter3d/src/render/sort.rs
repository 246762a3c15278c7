//! Depth bucket sort
//!
//! A painter's-algorithm backend needs triangles ordered by depth, but an
//! exact comparison sort is overkill when the consumer only needs an
//! approximate back-to-front walk. [`DepthSorter`] bins triangles into a
//! fixed number of depth buckets in O(n) over the triangle count, trading
//! exactness within a bucket for per-frame speed and zero steady-state
//! allocation.
//!
//! All storage is preallocated at construction. `clear` retains capacity,
//! so a sorter reused across frames never reallocates.

use log::debug;
use thiserror::Error;

/// Default number of depth buckets
pub const DEFAULT_BIN_COUNT: usize = 512;

/// Default triangle capacity, the most triangles addressable with 16-bit
/// vertex indices (u16::MAX / 3)
pub const DEFAULT_MAX_TRIANGLES: usize = 21_845;

/// Errors from the depth sorter
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SortError {
    /// The fixed triangle capacity was reached; the triangle was not added
    #[error("depth sorter is full ({capacity} triangles)")]
    CapacityExceeded {
        /// The sorter's fixed capacity
        capacity: usize,
    },
}

/// Ordering produced by [`DepthSorter::sort`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortMode {
    /// Submission order, no depth ordering at all
    None,
    /// Deepest triangles first (painter's algorithm)
    BackToFront,
    /// Nearest triangles first (early-out depth testing)
    FrontToBack,
}

/// One triangle staged for sorting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortingTriangle {
    /// Caller-assigned identifier, carried through the sort untouched
    pub id: u32,
    /// Sort key; larger means deeper
    pub depth: f32,
}

/// Fixed-capacity depth bucket sorter
#[derive(Debug)]
pub struct DepthSorter {
    pending: Vec<SortingTriangle>,
    bins: Vec<Vec<SortingTriangle>>,
    max_triangles: usize,
}

impl DepthSorter {
    /// Create a sorter with the given bucket count and triangle capacity
    pub fn new(bin_count: usize, max_triangles: usize) -> Self {
        let bin_count = bin_count.max(1);
        let per_bin = (max_triangles / bin_count).max(8);
        Self {
            pending: Vec::with_capacity(max_triangles),
            bins: (0..bin_count).map(|_| Vec::with_capacity(per_bin)).collect(),
            max_triangles,
        }
    }

    /// The fixed triangle capacity
    pub fn capacity(&self) -> usize {
        self.max_triangles
    }

    /// The number of depth buckets
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Number of triangles currently staged or binned
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no triangles are staged
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stage a triangle for the next sort
    ///
    /// The capacity check happens before any write, so a full sorter is
    /// left untouched by a rejected push.
    pub fn push(&mut self, id: u32, depth: f32) -> Result<(), SortError> {
        if self.pending.len() >= self.max_triangles {
            return Err(SortError::CapacityExceeded {
                capacity: self.max_triangles,
            });
        }
        if !depth.is_finite() {
            debug!("skipping triangle {id} with non-finite depth {depth}");
            return Ok(());
        }
        self.pending.push(SortingTriangle { id, depth });
        Ok(())
    }

    /// Bin all staged triangles by depth over `[min_depth, max_depth]`
    ///
    /// Depths outside the range clamp into the first or last bucket. A
    /// degenerate range (all triangles at one depth) is widened by a small
    /// nudge so every triangle lands in a valid bucket.
    pub fn sort(&mut self, mode: SortMode, min_depth: f32, max_depth: f32) {
        for bin in &mut self.bins {
            bin.clear();
        }

        let bin_count = self.bins.len();
        if mode == SortMode::None || bin_count < 2 {
            self.bins[0].extend_from_slice(&self.pending);
            return;
        }

        let mut max_depth = max_depth;
        if max_depth - min_depth <= 0.0 {
            max_depth = min_depth + 0.001;
        }
        let inv_range = 1.0 / (max_depth - min_depth);

        for tri in &self.pending {
            let normalized = (tri.depth - min_depth) * inv_range;
            let bin = ((normalized * bin_count as f32) as isize)
                .clamp(0, bin_count as isize - 1) as usize;
            self.bins[bin].push(*tri);
        }
    }

    /// Visit every binned triangle in the order given by `mode`
    ///
    /// `BackToFront` walks the buckets deepest-first; `FrontToBack` and
    /// `None` walk them in ascending order. Within a bucket, submission
    /// order is preserved.
    pub fn for_each(&self, mode: SortMode, mut visit: impl FnMut(&SortingTriangle)) {
        match mode {
            SortMode::BackToFront => {
                for bin in self.bins.iter().rev() {
                    for tri in bin {
                        visit(tri);
                    }
                }
            }
            SortMode::FrontToBack | SortMode::None => {
                for bin in &self.bins {
                    for tri in bin {
                        visit(tri);
                    }
                }
            }
        }
    }

    /// Drop all staged and binned triangles, retaining capacity
    pub fn clear(&mut self) {
        self.pending.clear();
        for bin in &mut self.bins {
            bin.clear();
        }
    }
}

impl Default for DepthSorter {
    fn default() -> Self {
        Self::new(DEFAULT_BIN_COUNT, DEFAULT_MAX_TRIANGLES)
    }
}
