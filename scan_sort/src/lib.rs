//! Parallel inclusive scan and stable radix sort of `i32` arrays, run as
//! block-structured kernels on a CUDA device or on the host emulator.

pub mod config;
pub mod device;
mod error;
pub mod radix;
pub mod scan;

pub use config::{DispatchOrder, HostConfig, SortConfig, MAX_RESIDENT_BLOCKS};
pub use device::{host::HostDevice, Device, DeviceArray};
pub use error::{Error, Result};
pub use radix::{sequential_sort, sort, RadixSort};
pub use scan::{scan, sequential_scan, HierarchicalScan, LookbackScan, ScanStrategy};

#[cfg(feature = "cuda")]
pub use device::cuda::CudaDevice;
