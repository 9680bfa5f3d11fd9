//! Kernels for the multi-level reduce-then-propagate scan.
//!
//! Level `i + 1` holds one element per section of level `i`, except for the
//! last section which has no successor to pass its total to. The scan kernels
//! run bottom-up, scanning each level in place and emitting the section
//! totals into the next level. The add kernels run top-down and add the
//! scanned totals of the level above to every section but the first.
//!
//! The kernels are generic over the number of streams `K` so the radix sort
//! can scan its two predicate streams in the same launch.

use crate::{block_scan, lane::Lane};

/// The length of data scanned by a single block.
pub const SECTION_SIZE: usize = 128;

/// The kernel launch should use this as the block size so that the number of
/// threads is half the number of section elements.
pub const BLOCK_SIZE: usize = SECTION_SIZE / 2;

/// Shared memory per block and per stream.
pub const SHARED_LEN: usize = SECTION_SIZE;

/// Scans every section of the `K` level buffers in place.
///
/// When `group` is given, thread 0 of every block whose index is below
/// `group_len` also writes the section total into the corresponding element
/// of the next level. `shared` must hold `K * 2 * block_dim` elements.
pub unsafe fn scan_sections<L: Lane, const K: usize>(
    lane: &L,
    shared: *mut i32,
    data: [*mut i32; K],
    count: usize,
    group: Option<([*mut i32; K], usize)>,
) {
    let section_len = 2 * lane.block_dim();
    let section_start = lane.block_idx() * section_len;
    let scratch = stream_scratch::<K>(shared, section_len);

    for k in 0..K {
        block_scan::load_section(lane, data[k], count, section_start, scratch[k]);
    }
    block_scan::inclusive_scan(lane, scratch);
    for k in 0..K {
        block_scan::store_section(lane, scratch[k], 0, data[k], count, section_start);
    }

    if let Some((group, group_len)) = group {
        write_section_totals(lane, scratch, group, group_len);
    }
}

/// Adds the scanned total of all preceding sections to every element of a
/// section.
///
/// The launch has one block per chunk of `block_dim` elements, excluding the
/// chunks of the first section since it has no predecessor. `sums[j]` is the
/// inclusive scan of the totals of sections `0..=j`, i.e. the prefix of
/// section `j + 1`.
pub unsafe fn add_section_sums<L: Lane, const K: usize>(
    lane: &L,
    data: [*mut i32; K],
    count: usize,
    sums: [*const i32; K],
) {
    let section_len = 2 * lane.block_dim();
    let i = section_len + lane.global_idx();
    if i >= count {
        return;
    }

    let section = i / section_len;
    for k in 0..K {
        let x = data[k].add(i);
        *(&mut *x) = (*x).wrapping_add(*sums[k].add(section - 1));
    }
}

/// Splits the shared memory of a block into one section per stream.
#[inline(always)]
pub fn stream_scratch<const K: usize>(shared: *mut i32, section_len: usize) -> [*mut i32; K] {
    let mut scratch = [shared; K];
    for (k, s) in scratch.iter_mut().enumerate() {
        *s = shared.wrapping_add(k * section_len);
    }
    scratch
}

/// Thread 0 writes the total of every stream's section into the next level.
/// The last block of a level has no slot there.
#[inline(always)]
pub unsafe fn write_section_totals<L: Lane, const K: usize>(
    lane: &L,
    scratch: [*mut i32; K],
    group: [*mut i32; K],
    group_len: usize,
) {
    let b_idx = lane.block_idx();
    if lane.thread_idx() == 0 && b_idx < group_len {
        for k in 0..K {
            *(&mut *group[k].add(b_idx)) = block_scan::section_total(lane, scratch[k]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::harness::{run_blocks, Ptr};

    fn running_sum(xs: &[i32]) -> Vec<i32> {
        let mut acc = 0;
        xs.iter()
            .map(|x| {
                acc += x;
                acc
            })
            .collect()
    }

    #[test]
    fn two_levels_compose_into_a_full_scan() {
        // 4 threads per block, 8 elements per section, 3 sections.
        let block_dim = 4;
        let xs: Vec<i32> = (0..20).map(|i| (i * 7) % 11).collect();
        let mut data = xs.clone();
        let mut sums = vec![0i32; 2];
        let count = data.len();
        let (data_ptr, sums_ptr) = (Ptr(data.as_mut_ptr()), Ptr(sums.as_mut_ptr()));

        run_blocks(3, block_dim, 2 * block_dim, |lane, shared| unsafe {
            scan_sections(lane, shared, [data_ptr.get()], count, Some(([sums_ptr.get()], 2)));
        });
        run_blocks(1, block_dim, 2 * block_dim, |lane, shared| unsafe {
            scan_sections::<_, 1>(lane, shared, [sums_ptr.get()], 2, None);
        });
        // ceil(20 / 4) - 2 = 3 chunks past the first section.
        run_blocks(3, block_dim, 0, |lane, _| unsafe {
            add_section_sums(lane, [data_ptr.get()], count, [sums_ptr.get() as *const i32]);
        });

        assert_eq!(data, running_sum(&xs));
    }

    #[test]
    fn last_section_has_no_group_slot() {
        let block_dim = 2;
        let mut data = vec![1i32; 10];
        let mut group = vec![-1i32; 3];
        let (data_ptr, group_ptr) = (Ptr(data.as_mut_ptr()), Ptr(group.as_mut_ptr()));

        // Three sections of four, the group buffer only has room for two.
        run_blocks(3, block_dim, 2 * block_dim, |lane, shared| unsafe {
            scan_sections(lane, shared, [data_ptr.get()], 10, Some(([group_ptr.get()], 2)));
        });

        assert_eq!(group, [4, 4, -1]);
        assert_eq!(data, [1, 2, 3, 4, 1, 2, 3, 4, 1, 2]);
    }
}
