//! Stable least-significant-bit-first radix sort.
//!
//! Every pass partitions the keys on one bit: the 0-keys and the 1-keys are
//! counted with a hierarchical scan each, and a scatter moves every key to
//! its rank within its group. Since every pass is stable, `bits` passes sort
//! the keys by their low `bits` bits.

use crate::{
    config::SortConfig,
    device::{Device, Launch},
    error::{Error, Result},
    scan::Levels,
};
use log::{info, trace};

/// Two buffers of equal length. A pass reads the front buffer and writes the
/// back buffer, then the two trade places.
pub struct BufferPair<A> {
    buffers: [A; 2],
    parity: usize,
}

impl<A> BufferPair<A> {
    pub fn new(front: A, back: A) -> Self {
        Self {
            buffers: [front, back],
            parity: 0,
        }
    }

    /// Number of swaps so far, modulo 2.
    pub fn parity(&self) -> usize {
        self.parity
    }

    pub fn front(&self) -> &A {
        &self.buffers[self.parity]
    }

    pub fn back(&self) -> &A {
        &self.buffers[1 - self.parity]
    }

    pub fn swap(&mut self) {
        self.parity = 1 - self.parity;
    }
}

/// Sorts arrays of `count` keys. All device memory is allocated up front and
/// reused by every pass and every call to [`RadixSort::sort`].
pub struct RadixSort<'d, D: Device> {
    device: &'d D,
    config: SortConfig,
    count: usize,
    buffers: BufferPair<D::Array>,
    /// Inclusive counts of the 0-keys and the 1-keys.
    prefix: [D::Array; 2],
    levels: [Levels<D::Array>; 2],
}

impl<'d, D: Device> RadixSort<'d, D> {
    pub fn new(device: &'d D, count: usize, config: SortConfig) -> Result<Self> {
        if count == 0 {
            return Err(Error::EmptyInput);
        }

        let levels = [Levels::new(device, count)?, Levels::new(device, count)?];
        info!(
            "radix sort of {count} keys on {} bits, levels {:?}",
            config.bits(),
            levels[0].sizes().as_slice()
        );
        Ok(Self {
            device,
            config,
            count,
            buffers: BufferPair::new(device.alloc_zeroed(count)?, device.alloc_zeroed(count)?),
            prefix: [device.alloc_zeroed(count)?, device.alloc_zeroed(count)?],
            levels,
        })
    }

    /// The buffer holding the keys after the last pass.
    pub fn front(&self) -> &D::Array {
        self.buffers.front()
    }

    /// Copies `keys` into the front buffer.
    pub fn load(&self, keys: &[i32]) -> Result<()> {
        if keys.len() != self.count {
            return Err(Error::LengthMismatch {
                expected: self.count,
                actual: keys.len(),
            });
        }
        self.device.write(self.buffers.front(), 0, keys)
    }

    /// Stably partitions the front buffer on `bit` into the back buffer and
    /// swaps the two.
    pub fn run_pass(&mut self, bit: u32) -> Result<()> {
        trace!("radix pass on bit {bit}, parity {}", self.buffers.parity());
        self.count_groups(bit)?;
        self.device.launch(&Launch::RadixScatter {
            bit,
            source: self.buffers.front(),
            prefix: [&self.prefix[0], &self.prefix[1]],
            output: self.buffers.back(),
        })?;
        self.buffers.swap();
        Ok(())
    }

    /// Sorts `keys` on the configured number of low bits.
    pub fn sort(&mut self, keys: &[i32]) -> Result<Vec<i32>> {
        self.load(keys)?;
        for bit in 0..self.config.bits() {
            self.run_pass(bit)?;
        }
        self.device.read_back(self.buffers.front())
    }

    /// Fills both prefix arrays with the inclusive count of 0-keys and
    /// 1-keys on `bit`, using one hierarchical scan per group run in the
    /// same launches.
    fn count_groups(&self, bit: u32) -> Result<()> {
        let [zeros, ones] = &self.levels;
        let sizes = zeros.sizes();
        let level = |i| [zeros.level(&self.prefix[0], i), ones.level(&self.prefix[1], i)];
        let group = |i| zeros.group(i).zip(ones.group(i)).map(|(z, o)| [z, o]);

        self.device.launch(&Launch::RadixSplitScan {
            bit,
            source: self.buffers.front(),
            streams: level(0),
            group: group(0),
        })?;
        for i in (1..sizes.depth()).filter(|&i| sizes.scans(i)) {
            self.device.launch(&Launch::DualBlockScan {
                streams: level(i),
                group: group(i),
            })?;
        }

        for i in (0..sizes.depth() - 1).rev() {
            if let Some(sums) = group(i) {
                self.device.launch(&Launch::DualAddBlockSums {
                    streams: level(i),
                    sums,
                })?;
            }
        }
        Ok(())
    }
}

/// Sorts `keys` on `device` on the low `config.bits()` bits of every key.
pub fn sort<D: Device>(device: &D, keys: &[i32], config: SortConfig) -> Result<Vec<i32>> {
    if keys.is_empty() {
        return Err(Error::EmptyInput);
    }
    RadixSort::new(device, keys.len(), config)?.sort(keys)
}

/// Stable sort on the host by the low `bits` bits of every key.
pub fn sequential_sort(keys: &[i32], bits: u32) -> Vec<i32> {
    let mask = u32::MAX.checked_shr(32 - bits.min(32)).unwrap_or(0);
    let mut sorted = keys.to_vec();
    sorted.sort_by_key(|&key| key as u32 & mask);
    sorted
}
