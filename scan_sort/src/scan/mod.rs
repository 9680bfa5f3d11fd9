//! Inclusive prefix sums of `i32` arrays on a [`Device`].

mod hierarchy;
mod lookback;

pub use hierarchy::{HierarchicalScan, LevelSizes};
pub(crate) use hierarchy::Levels;
pub use lookback::LookbackScan;

use crate::{
    device::Device,
    error::{Error, Result},
};
use log::info;

/// How blocks combine their section totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanStrategy {
    /// Single launch with decoupled look-back. Needs a device that
    /// guarantees forward progress.
    Lookback,
    /// One launch per level up and one per level down. Runs anywhere.
    Hierarchical,
    /// Look-back where it is safe, hierarchical otherwise.
    #[default]
    Auto,
}

impl ScanStrategy {
    /// Resolves `Auto` for `device`.
    pub fn resolve<D: Device>(self, device: &D) -> ScanStrategy {
        match self {
            ScanStrategy::Auto if device.guarantees_forward_progress() => ScanStrategy::Lookback,
            ScanStrategy::Auto => ScanStrategy::Hierarchical,
            strategy => strategy,
        }
    }
}

/// Uploads `xs`, scans it on `device` and returns the inclusive prefix sums.
pub fn scan<D: Device>(device: &D, xs: &[i32], strategy: ScanStrategy) -> Result<Vec<i32>> {
    if xs.is_empty() {
        return Err(Error::EmptyInput);
    }

    let strategy = strategy.resolve(device);
    info!("scanning {} elements with {:?}", xs.len(), strategy);
    match strategy {
        ScanStrategy::Lookback => {
            let lookback = LookbackScan::new(device, xs.len())?;
            let input = device.upload(xs)?;
            let output = device.alloc_zeroed(xs.len())?;
            lookback.run(&input, &output)?;
            device.read_back(&output)
        }
        _ => {
            let hierarchical = HierarchicalScan::new(device, xs.len())?;
            let data = device.upload(xs)?;
            hierarchical.run(&data)?;
            device.read_back(&data)
        }
    }
}

/// Inclusive scan on the host, wrapping on overflow like the kernels do.
pub fn sequential_scan(xs: &[i32]) -> Vec<i32> {
    xs.iter()
        .scan(0i32, |sum, &x| {
            *sum = sum.wrapping_add(x);
            Some(*sum)
        })
        .collect()
}
