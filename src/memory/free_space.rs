use crate::core::{Address, Words};

/// A run of unallocated core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub size: Words,
    pub address: Address,
}

impl Extent {
    pub fn end(&self) -> Address {
        self.address + self.size
    }
}

/// Unallocated core, as a set of extents.
#[derive(Debug, Clone)]
pub struct FreeSpaceTable {
    extents: Vec<Extent>,
}

impl FreeSpaceTable {
    pub fn new(core_size: Words) -> Self {
        let mut extents = Vec::new();
        if core_size > 0 {
            extents.push(Extent {
                size: core_size,
                address: 0,
            });
        }
        Self { extents }
    }

    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub fn total(&self) -> Words {
        self.extents.iter().map(|extent| extent.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Merges adjacent extents until none remain. Returns the number of merges.
    pub fn consolidate(&mut self) -> usize {
        let mut merges = 0;
        while let Some((lower, upper)) = self.find_adjacent() {
            let absorbed = self.extents[upper];
            self.extents[lower].size += absorbed.size;
            self.extents.remove(upper);
            merges += 1;
        }
        merges
    }

    fn find_adjacent(&self) -> Option<(usize, usize)> {
        self.extents.iter().enumerate().find_map(|(i, lower)| {
            self.extents
                .iter()
                .position(|upper| upper.address == lower.end() && upper.size > 0)
                .filter(|&j| j != i)
                .map(|j| (i, j))
        })
    }

    /// Smallest extent first, so the first fit is the best fit.
    pub fn sort_by_size(&mut self) {
        self.extents.sort_by_key(|extent| (extent.size, extent.address));
    }

    /// Best-fit allocation. An exact fit consumes the extent; otherwise the
    /// extent is carved from its base.
    pub fn allocate(&mut self, size: Words) -> Option<Address> {
        let idx = self
            .extents
            .iter()
            .enumerate()
            .filter(|(_, extent)| extent.size >= size)
            .min_by_key(|(_, extent)| (extent.size, extent.address))
            .map(|(idx, _)| idx)?;

        let extent = &mut self.extents[idx];
        let address = extent.address;
        if extent.size == size {
            self.extents.remove(idx);
        } else {
            extent.address += size;
            extent.size -= size;
        }
        Some(address)
    }

    /// Returns a region to the table, folding it into its neighbours.
    pub fn release(&mut self, extent: Extent) {
        if extent.size == 0 {
            return;
        }
        self.extents.push(extent);
        self.consolidate();
    }

    /// True when some pair of extents touches end-to-start.
    pub fn has_adjacent(&self) -> bool {
        self.find_adjacent().is_some()
    }
}
