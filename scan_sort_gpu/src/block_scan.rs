use crate::{lane::Lane, step::scan_strides};

/// Copies the section of global memory starting at `section_start` into
/// `scratch`. Each thread loads two elements, at `thread_idx` and
/// `thread_idx + block_dim`, since the section is twice the size of the block.
///
/// Positions past `count` are filled with zero so that the section total is
/// valid for a partially filled last block.
#[inline(always)]
pub unsafe fn load_section<L: Lane>(
    lane: &L,
    xs: *const i32,
    count: usize,
    section_start: usize,
    scratch: *mut i32,
) {
    let t_idx = lane.thread_idx();
    let b_dim = lane.block_dim();

    for local in [t_idx, t_idx + b_dim] {
        let i = section_start + local;
        *(&mut *scratch.add(local)) = if i < count { *xs.add(i) } else { 0 };
    }
}

/// Copies the scanned section in `scratch` back into global memory, adding
/// `offset` to every element.
#[inline(always)]
pub unsafe fn store_section<L: Lane>(
    lane: &L,
    scratch: *const i32,
    offset: i32,
    ys: *mut i32,
    count: usize,
    section_start: usize,
) {
    let t_idx = lane.thread_idx();
    let b_dim = lane.block_dim();

    for local in [t_idx, t_idx + b_dim] {
        let i = section_start + local;
        if i < count {
            *(&mut *ys.add(i)) = (*scratch.add(local)).wrapping_add(offset);
        }
    }
}

/// Performs an in-place inclusive scan over each of the `K` scratch arrays.
/// Every array holds `2 * block_dim` values and is shared by the whole block.
///
/// Round `r` uses stride `s = 2^r`. The array is divided into segments of
/// `2s` elements and every thread adds the last element of the lower half of
/// its segment to one element of the upper half. After `log2(block_dim) + 1`
/// rounds the arrays are fully scanned and `scratch[2 * block_dim - 1]` holds
/// the section total. No element written in a round is read in that round, so
/// one barrier per round suffices.
///
/// Must be called by every thread of the block.
#[inline(always)]
pub unsafe fn inclusive_scan<L: Lane, const K: usize>(lane: &L, scratch: [*mut i32; K]) {
    let t_idx = lane.thread_idx();

    // Make the loads of the whole block visible before the first round.
    lane.sync_threads();

    for stride in scan_strides(lane.block_dim()) {
        let segment = (t_idx / stride) * 2 * stride;
        let idx = segment + stride + t_idx % stride;
        let src = segment + stride - 1;
        for xys in scratch {
            *(&mut *xys.add(idx)) = (*xys.add(idx)).wrapping_add(*xys.add(src));
        }
        lane.sync_threads();
    }
}

/// The total of a scanned section.
#[inline(always)]
pub unsafe fn section_total<L: Lane>(lane: &L, scratch: *const i32) -> i32 {
    *scratch.add(2 * lane.block_dim() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::harness::{run_blocks, Ptr};
    use std::sync::Mutex;

    /// Scans `xs` (at most `2 * block_dim` values) with a single block and
    /// returns the stored values and the section total.
    fn scan_one_block(block_dim: usize, xs: &[i32], offset: i32) -> (Vec<i32>, i32) {
        let mut xs = xs.to_vec();
        let mut ys = vec![0i32; xs.len()];
        let count = xs.len();
        let input = Ptr(xs.as_mut_ptr());
        let output = Ptr(ys.as_mut_ptr());
        let total = Mutex::new(0);

        run_blocks(1, block_dim, 2 * block_dim, |lane, shared| unsafe {
            load_section(lane, input.get(), count, 0, shared);
            inclusive_scan(lane, [shared]);
            if lane.thread_idx() == 0 {
                *total.lock().unwrap() = section_total(lane, shared);
            }
            store_section(lane, shared, offset, output.get(), count, 0);
        });

        let total = *total.lock().unwrap();
        (ys, total)
    }

    #[test]
    fn scans_a_full_section() {
        let xs: Vec<i32> = (1..=16).collect();
        let (ys, total) = scan_one_block(8, &xs, 0);
        let expected: Vec<i32> = (1..=16).map(|n| n * (n + 1) / 2).collect();
        assert_eq!(ys, expected);
        assert_eq!(total, 136);
    }

    #[test]
    fn partial_section_is_padded_with_zeros() {
        let (ys, total) = scan_one_block(4, &[3, 1, 4, 1, 5], 0);
        assert_eq!(ys, [3, 4, 8, 9, 14]);
        assert_eq!(total, 14);
    }

    #[test]
    fn offset_is_added_on_store() {
        let (ys, _) = scan_one_block(2, &[1, 1, 1], 10);
        assert_eq!(ys, [11, 12, 13]);
    }

    #[test]
    fn dual_scan_runs_both_arrays_in_the_same_rounds() {
        let block_dim = 4;
        let mut out = vec![0i32; 4 * block_dim];
        let output = Ptr(out.as_mut_ptr());

        run_blocks(1, block_dim, 4 * block_dim, |lane, shared| unsafe {
            let zeros = shared;
            let ones = shared.add(2 * block_dim);
            for local in [lane.thread_idx(), lane.thread_idx() + block_dim] {
                *zeros.add(local) = (local % 2) as i32;
                *ones.add(local) = 1;
            }
            inclusive_scan(lane, [zeros, ones]);
            for local in [lane.thread_idx(), lane.thread_idx() + block_dim] {
                *output.get().add(local) = *zeros.add(local);
                *output.get().add(2 * block_dim + local) = *ones.add(local);
            }
        });

        assert_eq!(&out[..8], &[0, 1, 1, 2, 2, 3, 3, 4]);
        assert_eq!(&out[8..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
