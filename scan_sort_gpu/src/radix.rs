//! Kernels for one pass of the least-significant-bit-first radix sort.
//!
//! A pass over bit `b` splits the keys into a 0-stream and a 1-stream of
//! predicate flags, scans both with the hierarchical scan and scatters every
//! key to its rank within its stream. All 0-keys land before all 1-keys and
//! each stream keeps its input order, so the pass is a stable partition.

use crate::{block_scan, hierarchy, lane::Lane};
use cust_core::DeviceCopy;

pub use crate::hierarchy::{BLOCK_SIZE, SECTION_SIZE};

/// Shared memory per block: one section for each predicate stream.
pub const SHARED_LEN: usize = 2 * hierarchy::SHARED_LEN;

/// Number of bits sorted when the caller does not say otherwise.
pub const DEFAULT_BITS: u32 = 14;

/// Widest key the sort can examine.
pub const MAX_BITS: u32 = 32;

/// Uniform parameters of a radix pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, DeviceCopy)]
pub struct RadixParams {
    pub count: usize,
    pub bit: u32,
}

#[inline(always)]
pub fn is_zero_bit(key: i32, bit: u32) -> bool {
    (key as u32 >> bit) & 1 == 0
}

/// Computes the predicate flags of `source` for `params.bit` and scans both
/// streams per section into `prefix[0]` (bit is 0) and `prefix[1]` (bit is 1).
/// Section totals go to the next level when `group` is given.
pub unsafe fn split_scan<L: Lane>(
    lane: &L,
    shared: *mut i32,
    params: RadixParams,
    source: *const i32,
    prefix: [*mut i32; 2],
    group: Option<([*mut i32; 2], usize)>,
) {
    let t_idx = lane.thread_idx();
    let b_dim = lane.block_dim();
    let section_len = 2 * b_dim;
    let section_start = lane.block_idx() * section_len;
    let scratch = hierarchy::stream_scratch::<2>(shared, section_len);

    for local in [t_idx, t_idx + b_dim] {
        let i = section_start + local;
        let (zero, one) = if i >= params.count {
            (0, 0)
        } else if is_zero_bit(*source.add(i), params.bit) {
            (1, 0)
        } else {
            (0, 1)
        };
        *(&mut *scratch[0].add(local)) = zero;
        *(&mut *scratch[1].add(local)) = one;
    }

    block_scan::inclusive_scan(lane, scratch);
    for k in 0..2 {
        block_scan::store_section(lane, scratch[k], 0, prefix[k], params.count, section_start);
    }

    if let Some((group, group_len)) = group {
        hierarchy::write_section_totals(lane, scratch, group, group_len);
    }
}

/// Moves every key of `source` to its slot in `output`.
///
/// A key belongs to the 0-stream when the 0-prefix increases at its index.
/// Its destination is then its rank in the 0-stream; otherwise it goes after
/// all 0-keys, at its rank in the 1-stream. Launched with one thread per key.
pub unsafe fn scatter<L: Lane>(
    lane: &L,
    params: RadixParams,
    source: *const i32,
    prefix: [*const i32; 2],
    output: *mut i32,
) {
    let idx = lane.global_idx();
    if idx >= params.count {
        return;
    }

    let zeros = prefix[0];
    let rank = *zeros.add(idx);
    let in_zero_stream = if idx == 0 {
        rank > 0
    } else {
        rank > *zeros.add(idx - 1)
    };

    let dst = if in_zero_stream {
        rank - 1
    } else {
        *zeros.add(params.count - 1) + *prefix[1].add(idx) - 1
    };
    *(&mut *output.add(dst as usize)) = *source.add(idx);
}
