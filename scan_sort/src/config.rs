use crate::error::{Error, Result};
use rand::{seq::SliceRandom, SeedableRng};
use rand_hc::Hc128Rng;
use scan_sort_gpu::radix::{DEFAULT_BITS, MAX_BITS};
use std::thread;

/// Order in which the host emulator hands out hardware block indices.
///
/// Real schedulers make no promise about the order blocks start in. The
/// non-ascending orders let tests check that nothing depends on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchOrder {
    #[default]
    Ascending,
    Descending,
    /// A pseudo-random permutation, fixed by the seed.
    Shuffled(u64),
}

impl DispatchOrder {
    /// The hardware block index of the `i`th block to be dispatched.
    pub fn arrange(self, grid_dim: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..grid_dim).collect();
        match self {
            DispatchOrder::Ascending => {}
            DispatchOrder::Descending => order.reverse(),
            DispatchOrder::Shuffled(seed) => {
                let mut rng = Hc128Rng::seed_from_u64(seed);
                order.shuffle(&mut rng);
            }
        }
        order
    }
}

/// Upper bound on [`HostConfig::resident_blocks`]. Each resident block costs
/// up to 256 OS threads.
pub const MAX_RESIDENT_BLOCKS: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostConfig {
    /// Blocks that run concurrently. Each one is backed by a full block of
    /// OS threads. Launches fail when this exceeds [`MAX_RESIDENT_BLOCKS`].
    pub resident_blocks: usize,
    pub dispatch_order: DispatchOrder,
}

impl HostConfig {
    pub fn with_resident_blocks(mut self, resident_blocks: usize) -> Self {
        self.resident_blocks = resident_blocks.clamp(1, MAX_RESIDENT_BLOCKS);
        self
    }

    pub fn with_dispatch_order(mut self, dispatch_order: DispatchOrder) -> Self {
        self.dispatch_order = dispatch_order;
        self
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        let parallelism = thread::available_parallelism().map_or(2, |n| n.get());
        Self {
            resident_blocks: parallelism.clamp(2, 4),
            dispatch_order: DispatchOrder::Ascending,
        }
    }
}

/// Parameters of the radix sort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortConfig {
    bits: u32,
}

impl SortConfig {
    /// Sorts on the low `bits` bits of every key. Higher bits are ignored,
    /// so keys must fit into `bits` bits to come out in numeric order.
    pub fn new(bits: u32) -> Result<Self> {
        if (1..=MAX_BITS).contains(&bits) {
            Ok(Self { bits })
        } else {
            Err(Error::InvalidBitWidth(bits))
        }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        Self { bits: DEFAULT_BITS }
    }
}
