//! Device entry points. Every variant is compiled ahead of time; the host
//! selects one by name.

use crate::{
    hierarchy,
    lane::CudaLane,
    lookback,
    radix::{self, RadixParams},
};
use cuda_std::{kernel, shared_array};

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn lookback_scan(
    input: *const i32,
    output: *mut i32,
    count: usize,
    counter: *mut i32,
    status: *mut i32,
) {
    let shared = shared_array![i32; lookback::SHARED_LEN];
    lookback::lookback_scan(&CudaLane, shared, input, output, count, counter, status);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn block_scan(data: *mut i32, count: usize) {
    let shared = shared_array![i32; hierarchy::SHARED_LEN];
    hierarchy::scan_sections::<_, 1>(&CudaLane, shared, [data], count, None);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn block_scan_with_group_output(
    data: *mut i32,
    count: usize,
    group: *mut i32,
    group_len: usize,
) {
    let shared = shared_array![i32; hierarchy::SHARED_LEN];
    hierarchy::scan_sections(&CudaLane, shared, [data], count, Some(([group], group_len)));
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn add_block_sums(data: *mut i32, count: usize, sums: *const i32) {
    hierarchy::add_section_sums(&CudaLane, [data], count, [sums]);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn radix_split_scan(
    params: RadixParams,
    source: *const i32,
    zeros: *mut i32,
    ones: *mut i32,
) {
    let shared = shared_array![i32; radix::SHARED_LEN];
    radix::split_scan(&CudaLane, shared, params, source, [zeros, ones], None);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn radix_split_scan_with_group_output(
    params: RadixParams,
    source: *const i32,
    zeros: *mut i32,
    ones: *mut i32,
    group_zeros: *mut i32,
    group_ones: *mut i32,
    group_len: usize,
) {
    let shared = shared_array![i32; radix::SHARED_LEN];
    radix::split_scan(
        &CudaLane,
        shared,
        params,
        source,
        [zeros, ones],
        Some(([group_zeros, group_ones], group_len)),
    );
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn dual_block_scan(zeros: *mut i32, ones: *mut i32, count: usize) {
    let shared = shared_array![i32; radix::SHARED_LEN];
    hierarchy::scan_sections::<_, 2>(&CudaLane, shared, [zeros, ones], count, None);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn dual_block_scan_with_group_output(
    zeros: *mut i32,
    ones: *mut i32,
    count: usize,
    group_zeros: *mut i32,
    group_ones: *mut i32,
    group_len: usize,
) {
    let shared = shared_array![i32; radix::SHARED_LEN];
    hierarchy::scan_sections(
        &CudaLane,
        shared,
        [zeros, ones],
        count,
        Some(([group_zeros, group_ones], group_len)),
    );
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn dual_add_block_sums(
    zeros: *mut i32,
    ones: *mut i32,
    count: usize,
    sums_zeros: *const i32,
    sums_ones: *const i32,
) {
    hierarchy::add_section_sums(&CudaLane, [zeros, ones], count, [sums_zeros, sums_ones]);
}

#[kernel]
#[allow(improper_ctypes_definitions, clippy::missing_safety_doc)]
pub unsafe fn radix_scatter(
    params: RadixParams,
    source: *const i32,
    zeros: *const i32,
    ones: *const i32,
    output: *mut i32,
) {
    radix::scatter(&CudaLane, params, source, [zeros, ones], output);
}
