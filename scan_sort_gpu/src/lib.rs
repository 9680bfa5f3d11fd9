#![cfg_attr(
    target_os = "cuda",
    no_std,
    feature(register_attr),
    register_attr(nvvm_internal)
)]

pub mod block_scan;
pub mod hierarchy;
#[cfg(target_os = "cuda")]
pub mod kernels;
pub mod lane;
pub mod lookback;
pub mod radix;
mod step;
