//! Single-pass inclusive scan using decoupled look-back.
//!
//! Every block scans its section locally, publishes the section total in a
//! status table and then resolves its exclusive prefix by walking backwards
//! over the entries of its predecessors, stopping at the first one that has
//! already published an inclusive prefix.
//!
//! Blocks do not use the hardware block index. Thread 0 of every block claims
//! a virtual block index from a global counter instead, so a block can only
//! ever wait on blocks that have already started running. The scan still
//! requires the device to guarantee forward progress for all resident blocks.

use crate::{block_scan, lane::Lane};
use core::sync::atomic::{AtomicI32, Ordering};

/// The length of data scanned by a single block.
pub const SECTION_SIZE: usize = 512;

/// The kernel launch should use this as the block size so that the number of
/// threads is half the number of section elements.
pub const BLOCK_SIZE: usize = SECTION_SIZE / 2;

/// Shared memory per block: the section, the claimed virtual block index and
/// the resolved look-back prefix.
pub const SHARED_LEN: usize = SECTION_SIZE + 2;

/// Number of `i32` fields in one status table entry: state, aggregate and
/// inclusive prefix.
pub const STATUS_FIELDS: usize = 3;

const STATE: usize = 0;
const AGGREGATE: usize = 1;
const INCLUSIVE: usize = 2;

const AGGREGATE_READY: i32 = 1;
const INCLUSIVE_READY: i32 = 2;

/// What a block has published about itself so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockStatus {
    Empty,
    /// The total of the block's own section.
    AggregateReady(i32),
    /// The inclusive prefix up to and including the block's section.
    InclusiveReady(i32),
}

/// One entry of three `i32`s per block, zeroed before the launch. All
/// accesses are atomic since entries are read by other blocks while they are
/// being written.
pub struct StatusTable {
    entries: *mut i32,
}

impl StatusTable {
    /// # Safety
    ///
    /// `entries` must point to `STATUS_FIELDS` zero-initialised `i32`s per
    /// block of the grid.
    pub unsafe fn from_raw(entries: *mut i32) -> Self {
        Self { entries }
    }

    #[inline(always)]
    fn field(&self, block: usize, field: usize) -> &AtomicI32 {
        unsafe { &*(self.entries.add(block * STATUS_FIELDS + field) as *const AtomicI32) }
    }

    pub fn publish_aggregate(&self, block: usize, aggregate: i32) {
        self.field(block, AGGREGATE)
            .store(aggregate, Ordering::Relaxed);
        self.field(block, STATE)
            .store(AGGREGATE_READY, Ordering::Release);
    }

    pub fn publish_inclusive(&self, block: usize, inclusive: i32) {
        self.field(block, INCLUSIVE)
            .store(inclusive, Ordering::Relaxed);
        self.field(block, STATE)
            .store(INCLUSIVE_READY, Ordering::Release);
    }

    pub fn status(&self, block: usize) -> BlockStatus {
        match self.field(block, STATE).load(Ordering::Acquire) {
            AGGREGATE_READY => {
                BlockStatus::AggregateReady(self.field(block, AGGREGATE).load(Ordering::Relaxed))
            }
            INCLUSIVE_READY => {
                BlockStatus::InclusiveReady(self.field(block, INCLUSIVE).load(Ordering::Relaxed))
            }
            _ => BlockStatus::Empty,
        }
    }

    /// Resolves the exclusive prefix of `block`: the sum of every section
    /// before it. Spins on each predecessor until it has published at least
    /// its aggregate.
    pub fn look_back(&self, block: usize) -> i32 {
        let mut prefix = 0i32;
        let mut pred = block;
        while pred > 0 {
            pred -= 1;
            loop {
                match self.status(pred) {
                    BlockStatus::Empty => core::hint::spin_loop(),
                    BlockStatus::AggregateReady(aggregate) => {
                        prefix = prefix.wrapping_add(aggregate);
                        break;
                    }
                    BlockStatus::InclusiveReady(inclusive) => {
                        return prefix.wrapping_add(inclusive);
                    }
                }
            }
        }
        prefix
    }
}

/// Inclusive scan of `input` into `output` in a single launch.
///
/// `counter` is a single zeroed `i32` and `status` a zeroed table of
/// `STATUS_FIELDS` entries per block. Both must be reset before every launch.
pub unsafe fn lookback_scan<L: Lane>(
    lane: &L,
    shared: *mut i32,
    input: *const i32,
    output: *mut i32,
    count: usize,
    counter: *mut i32,
    status: *mut i32,
) {
    let t_idx = lane.thread_idx();
    let section_len = 2 * lane.block_dim();
    let block_slot = shared.add(section_len);
    let prefix_slot = shared.add(section_len + 1);

    // Claim the next virtual block index.
    if t_idx == 0 {
        let counter = &*(counter as *const AtomicI32);
        *(&mut *block_slot) = counter.fetch_add(1, Ordering::Relaxed);
    }
    lane.sync_threads();

    let block = *block_slot as usize;
    let section_start = block * section_len;

    block_scan::load_section(lane, input, count, section_start, shared);
    block_scan::inclusive_scan(lane, [shared]);

    if t_idx == 0 {
        let table = StatusTable::from_raw(status);
        let aggregate = block_scan::section_total(lane, shared);
        table.publish_aggregate(block, aggregate);
        let prefix = table.look_back(block);
        table.publish_inclusive(block, aggregate.wrapping_add(prefix));
        *(&mut *prefix_slot) = prefix;
    }
    lane.sync_threads();

    block_scan::store_section(lane, shared, *prefix_slot, output, count, section_start);
}
