//! The statically compiled kernel variants and the typed launch records that
//! bind buffers to them.

use crate::{
    device::DeviceArray,
    error::{Error, Result},
};
use itertools::Itertools;
use scan_sort_gpu::{
    hierarchy, lookback,
    radix,
};
use std::fmt;

/// Entry points of the kernel crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    LookbackScan,
    BlockScan,
    BlockScanWithGroupOutput,
    AddBlockSums,
    RadixSplitScan,
    RadixSplitScanWithGroupOutput,
    DualBlockScan,
    DualBlockScanWithGroupOutput,
    DualAddBlockSums,
    RadixScatter,
}

impl Kernel {
    /// Name of the entry point in the compiled module.
    pub fn name(self) -> &'static str {
        match self {
            Kernel::LookbackScan => "lookback_scan",
            Kernel::BlockScan => "block_scan",
            Kernel::BlockScanWithGroupOutput => "block_scan_with_group_output",
            Kernel::AddBlockSums => "add_block_sums",
            Kernel::RadixSplitScan => "radix_split_scan",
            Kernel::RadixSplitScanWithGroupOutput => "radix_split_scan_with_group_output",
            Kernel::DualBlockScan => "dual_block_scan",
            Kernel::DualBlockScanWithGroupOutput => "dual_block_scan_with_group_output",
            Kernel::DualAddBlockSums => "dual_add_block_sums",
            Kernel::RadixScatter => "radix_scatter",
        }
    }

    /// Threads per block. Fixed at compile time for every kernel.
    pub fn block_size(self) -> usize {
        match self {
            Kernel::LookbackScan => lookback::BLOCK_SIZE,
            _ => hierarchy::BLOCK_SIZE,
        }
    }

    /// Elements covered by one block of a scan kernel.
    pub fn section_size(self) -> usize {
        2 * self.block_size()
    }

    /// `i32`s of shared memory each block needs.
    pub fn shared_len(self) -> usize {
        match self {
            Kernel::LookbackScan => lookback::SHARED_LEN,
            Kernel::BlockScan | Kernel::BlockScanWithGroupOutput => hierarchy::SHARED_LEN,
            Kernel::RadixSplitScan
            | Kernel::RadixSplitScanWithGroupOutput
            | Kernel::DualBlockScan
            | Kernel::DualBlockScanWithGroupOutput => radix::SHARED_LEN,
            Kernel::AddBlockSums | Kernel::DualAddBlockSums | Kernel::RadixScatter => 0,
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a kernel accesses a bound buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
    Atomic,
}

impl Access {
    pub fn writes(self) -> bool {
        !matches!(self, Access::Read)
    }
}

/// A buffer bound to a named kernel parameter.
#[derive(Debug)]
pub struct Binding<'a, B> {
    pub name: &'static str,
    pub buffer: &'a B,
    pub access: Access,
}

impl<B> Clone for Binding<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for Binding<'_, B> {}

/// One kernel launch with its bound buffers.
///
/// The element count of a launch is the length of its primary buffer. The
/// group count and every other buffer length follow from it.
#[derive(Debug)]
pub enum Launch<'a, B> {
    /// Single-pass scan of `input` into `output`.
    LookbackScan {
        input: &'a B,
        output: &'a B,
        counter: &'a B,
        status: &'a B,
    },
    /// In-place scan of every section of a level, optionally emitting the
    /// section totals into the next level.
    BlockScan { data: &'a B, group: Option<&'a B> },
    /// Adds the scanned next level to every section but the first.
    AddBlockSums { data: &'a B, sums: &'a B },
    /// Predicate split of `source` on `bit`, scanned into both streams.
    RadixSplitScan {
        bit: u32,
        source: &'a B,
        streams: [&'a B; 2],
        group: Option<[&'a B; 2]>,
    },
    /// `BlockScan` over both predicate streams at once.
    DualBlockScan {
        streams: [&'a B; 2],
        group: Option<[&'a B; 2]>,
    },
    /// `AddBlockSums` over both predicate streams at once.
    DualAddBlockSums {
        streams: [&'a B; 2],
        sums: [&'a B; 2],
    },
    /// Moves every key of `source` to its rank in `output`.
    RadixScatter {
        bit: u32,
        source: &'a B,
        prefix: [&'a B; 2],
        output: &'a B,
    },
}

/// Number of blocks needed to cover `count` elements with sections of
/// `section` elements.
pub fn section_count(count: usize, section: usize) -> usize {
    (count + section - 1) / section
}

/// Length of the level above a hierarchical scan level of `count`
/// elements: one total per section except the last.
pub fn next_level_len(count: usize) -> usize {
    section_count(count, hierarchy::SECTION_SIZE).saturating_sub(1)
}

impl<'a, B: DeviceArray> Launch<'a, B> {
    pub fn kernel(&self) -> Kernel {
        match self {
            Launch::LookbackScan { .. } => Kernel::LookbackScan,
            Launch::BlockScan { group: None, .. } => Kernel::BlockScan,
            Launch::BlockScan { group: Some(_), .. } => Kernel::BlockScanWithGroupOutput,
            Launch::AddBlockSums { .. } => Kernel::AddBlockSums,
            Launch::RadixSplitScan { group: None, .. } => Kernel::RadixSplitScan,
            Launch::RadixSplitScan { group: Some(_), .. } => {
                Kernel::RadixSplitScanWithGroupOutput
            }
            Launch::DualBlockScan { group: None, .. } => Kernel::DualBlockScan,
            Launch::DualBlockScan { group: Some(_), .. } => Kernel::DualBlockScanWithGroupOutput,
            Launch::DualAddBlockSums { .. } => Kernel::DualAddBlockSums,
            Launch::RadixScatter { .. } => Kernel::RadixScatter,
        }
    }

    /// Number of elements the launch processes.
    pub fn count(&self) -> usize {
        match self {
            Launch::LookbackScan { input, .. } => input.len(),
            Launch::BlockScan { data, .. } | Launch::AddBlockSums { data, .. } => data.len(),
            Launch::RadixSplitScan { source, .. } | Launch::RadixScatter { source, .. } => {
                source.len()
            }
            Launch::DualBlockScan { streams, .. } | Launch::DualAddBlockSums { streams, .. } => {
                streams[0].len()
            }
        }
    }

    /// Number of blocks to launch.
    ///
    /// Scan kernels cover a section of `2 * block_size` elements per block.
    /// The add kernels use one block per `block_size` elements and skip the
    /// two chunks of the first section, which has no preceding sections. The
    /// scatter has one thread per key.
    pub fn grid_size(&self) -> usize {
        let kernel = self.kernel();
        let count = self.count();
        match self {
            Launch::AddBlockSums { .. } | Launch::DualAddBlockSums { .. } => {
                section_count(count, kernel.block_size()).saturating_sub(2)
            }
            Launch::RadixScatter { .. } => section_count(count, kernel.block_size()),
            _ => section_count(count, kernel.section_size()),
        }
    }

    /// Length of the next level, which the `with_group_output` variants
    /// fill with the section totals.
    pub fn group_len(&self) -> usize {
        next_level_len(self.count())
    }

    /// Every bound buffer in kernel parameter order.
    pub fn bindings(&self) -> Vec<Binding<'a, B>> {
        fn bind<'b, B>(name: &'static str, buffer: &'b B, access: Access) -> Binding<'b, B> {
            Binding {
                name,
                buffer,
                access,
            }
        }

        match *self {
            Launch::LookbackScan {
                input,
                output,
                counter,
                status,
            } => vec![
                bind("input", input, Access::Read),
                bind("output", output, Access::Write),
                bind("counter", counter, Access::Atomic),
                bind("status", status, Access::Atomic),
            ],
            Launch::BlockScan { data, group } => {
                let mut bindings = vec![bind("data", data, Access::ReadWrite)];
                if let Some(group) = group {
                    bindings.push(bind("group", group, Access::Write));
                }
                bindings
            }
            Launch::AddBlockSums { data, sums } => vec![
                bind("data", data, Access::ReadWrite),
                bind("sums", sums, Access::Read),
            ],
            Launch::RadixSplitScan {
                source,
                streams,
                group,
                ..
            } => {
                let mut bindings = vec![
                    bind("source", source, Access::Read),
                    bind("zeros", streams[0], Access::Write),
                    bind("ones", streams[1], Access::Write),
                ];
                if let Some(group) = group {
                    bindings.push(bind("group_zeros", group[0], Access::Write));
                    bindings.push(bind("group_ones", group[1], Access::Write));
                }
                bindings
            }
            Launch::DualBlockScan { streams, group } => {
                let mut bindings = vec![
                    bind("zeros", streams[0], Access::ReadWrite),
                    bind("ones", streams[1], Access::ReadWrite),
                ];
                if let Some(group) = group {
                    bindings.push(bind("group_zeros", group[0], Access::Write));
                    bindings.push(bind("group_ones", group[1], Access::Write));
                }
                bindings
            }
            Launch::DualAddBlockSums { streams, sums } => vec![
                bind("zeros", streams[0], Access::ReadWrite),
                bind("ones", streams[1], Access::ReadWrite),
                bind("sums_zeros", sums[0], Access::Read),
                bind("sums_ones", sums[1], Access::Read),
            ],
            Launch::RadixScatter {
                source,
                prefix,
                output,
                ..
            } => vec![
                bind("source", source, Access::Read),
                bind("zeros", prefix[0], Access::Read),
                bind("ones", prefix[1], Access::Read),
                bind("output", output, Access::Write),
            ],
        }
    }

    /// Checks buffer lengths and aliasing before anything runs on the device.
    pub fn validate(&self) -> Result<()> {
        let kernel = self.kernel();
        let count = self.count();
        if count == 0 {
            return Err(Error::EmptyInput);
        }
        let group_len = self.group_len();

        let expect = |buffer: &'static str, array: &B, expected: usize| {
            if array.len() == expected {
                Ok(())
            } else {
                Err(Error::Capacity {
                    kernel,
                    buffer,
                    expected,
                    actual: array.len(),
                })
            }
        };

        match *self {
            Launch::LookbackScan {
                output,
                counter,
                status,
                ..
            } => {
                expect("output", output, count)?;
                expect("counter", counter, 1)?;
                expect(
                    "status",
                    status,
                    lookback::STATUS_FIELDS * self.grid_size(),
                )?;
            }
            Launch::BlockScan { group, .. } => {
                if let Some(group) = group {
                    expect("group", group, group_len)?;
                }
            }
            Launch::AddBlockSums { sums, .. } => {
                expect("sums", sums, group_len)?;
            }
            Launch::RadixSplitScan {
                bit,
                streams,
                group,
                ..
            } => {
                check_bit(kernel, bit)?;
                expect("zeros", streams[0], count)?;
                expect("ones", streams[1], count)?;
                if let Some(group) = group {
                    expect("group_zeros", group[0], group_len)?;
                    expect("group_ones", group[1], group_len)?;
                }
            }
            Launch::DualBlockScan { streams, group } => {
                expect("ones", streams[1], count)?;
                if let Some(group) = group {
                    expect("group_zeros", group[0], group_len)?;
                    expect("group_ones", group[1], group_len)?;
                }
            }
            Launch::DualAddBlockSums { streams, sums } => {
                expect("ones", streams[1], count)?;
                expect("sums_zeros", sums[0], group_len)?;
                expect("sums_ones", sums[1], group_len)?;
            }
            Launch::RadixScatter {
                bit,
                prefix,
                output,
                ..
            } => {
                check_bit(kernel, bit)?;
                expect("zeros", prefix[0], count)?;
                expect("ones", prefix[1], count)?;
                expect("output", output, count)?;
            }
        }

        self.check_aliasing()
    }

    /// A buffer that is written or updated atomically may not appear in any
    /// other slot of the same launch.
    fn check_aliasing(&self) -> Result<()> {
        let bindings = self.bindings();
        for (a, b) in bindings.iter().tuple_combinations() {
            if a.buffer.is_empty() || a.buffer.address() != b.buffer.address() {
                continue;
            }
            if a.access.writes() || b.access.writes() {
                let written = if a.access.writes() { a } else { b };
                return Err(Error::Aliasing {
                    kernel: self.kernel(),
                    buffer: written.name,
                });
            }
        }
        Ok(())
    }
}

fn check_bit(kernel: Kernel, bit: u32) -> Result<()> {
    if bit < radix::MAX_BITS {
        Ok(())
    } else {
        Err(Error::Launch(format!("{kernel}: bit {bit} is out of range")))
    }
}
