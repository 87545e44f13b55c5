//! Cell array sizing and fold-to-cell addressing.

/// Returns the smallest prime that is at least `n` (and at least 2).
pub fn find_prime(n: usize) -> usize {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

/// Maps folds to cells and cells to latch partitions.
///
/// Cell `i` belongs to partition `i & (n_parts - 1)` and is stored at slot
/// `i >> log2(n_parts)` of that partition's cell array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellLayout {
    n_cells: usize,
    n_parts: usize,
    part_shift: u32,
}

impl CellLayout {
    /// `n_parts` must be a power of two no larger than `n_cells`.
    pub(crate) fn new(n_cells: usize, n_parts: usize) -> Self {
        debug_assert!(n_parts.is_power_of_two());
        debug_assert!(n_parts <= n_cells);
        Self {
            n_cells,
            n_parts,
            part_shift: n_parts.trailing_zeros(),
        }
    }

    #[inline]
    pub(crate) fn n_cells(&self) -> usize {
        self.n_cells
    }

    #[inline]
    pub(crate) fn n_parts(&self) -> usize {
        self.n_parts
    }

    /// Cell index of `fold`.
    #[inline(always)]
    pub(crate) fn cell_of(&self, fold: u64) -> usize {
        (fold % self.n_cells as u64) as usize
    }

    #[inline(always)]
    pub(crate) fn partition_of_cell(&self, cell: usize) -> usize {
        cell & (self.n_parts - 1)
    }

    /// Partition whose latch covers `fold`.
    #[inline(always)]
    pub(crate) fn partition_of(&self, fold: u64) -> usize {
        self.partition_of_cell(self.cell_of(fold))
    }

    /// Slot of a global cell index inside its partition.
    #[inline(always)]
    pub(crate) fn local_slot(&self, cell: usize) -> usize {
        cell >> self.part_shift
    }

    /// Global cell index of slot `slot` in partition `part`.
    #[inline(always)]
    pub(crate) fn global_cell(&self, part: usize, slot: usize) -> usize {
        (slot << self.part_shift) | part
    }

    /// Number of cells owned by partition `part`.
    pub(crate) fn cells_in_partition(&self, part: usize) -> usize {
        if part >= self.n_cells {
            return 0;
        }
        (self.n_cells - part).div_ceil(self.n_parts)
    }
}
