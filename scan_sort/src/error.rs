//! Errors of the scan and sort pipelines.

use crate::device::launch::Kernel;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every error is fatal for the scan or sort invocation that raised it. Any
/// partially written output must be discarded.
#[derive(Error, Debug)]
pub enum Error {
    /// The inclusive scan of an empty array is undefined.
    #[error("input is empty")]
    EmptyInput,

    /// A buffer bound to a launch does not have the length the kernel
    /// expects for the launch's element count.
    #[error("{kernel}: buffer `{buffer}` holds {actual} elements, expected {expected}")]
    Capacity {
        kernel: Kernel,
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A buffer the kernel writes to is bound to more than one slot.
    #[error("{kernel}: buffer `{buffer}` is written and bound more than once")]
    Aliasing {
        kernel: Kernel,
        buffer: &'static str,
    },

    /// Host data and device buffer lengths disagree.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The look-back scan spins on its predecessors and may hang on a device
    /// that can starve resident blocks.
    #[error("device does not guarantee forward progress of resident blocks, use the hierarchical scan")]
    ForwardProgress,

    #[error("bit width {0} is outside 1..={max}", max = scan_sort_gpu::radix::MAX_BITS)]
    InvalidBitWidth(u32),

    /// Raw buffer contents are not a whole number of little-endian `i32`s.
    #[error("byte length {0} is not a multiple of 4")]
    Layout(usize),

    #[error("launch failed: {0}")]
    Launch(String),

    #[cfg(feature = "cuda")]
    #[error(transparent)]
    Cuda(#[from] cust::error::CudaError),
}
