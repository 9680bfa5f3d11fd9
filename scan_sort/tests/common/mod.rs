#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_hc::Hc128Rng;
use scan_sort::{
    device::{host::HostArray, Launch},
    Device, DispatchOrder, HostConfig, HostDevice, Result,
};

pub const SEED: &[u8; 32] = b"LVXn6sWNasjDReRS2OZ9a0eY1aprVNYX";

pub fn host(order: DispatchOrder) -> HostDevice {
    HostDevice::new(
        HostConfig::default()
            .with_resident_blocks(2)
            .with_dispatch_order(order),
    )
}

pub fn random_values(len: usize, max_value: i32, rng: &mut impl Rng) -> Vec<i32> {
    (0..len).map(|_| rng.gen_range(0..max_value)).collect()
}

pub fn rng() -> Hc128Rng {
    Hc128Rng::from_seed(*SEED)
}

pub fn is_sorted(xs: &[i32]) -> bool {
    xs.windows(2).all(|w| w[0] <= w[1])
}

/// A host device that does not promise forward progress, like hardware
/// that may starve a resident block while another spins.
pub struct NoProgressDevice(pub HostDevice);

impl Device for NoProgressDevice {
    type Array = HostArray;

    fn alloc_zeroed(&self, len: usize) -> Result<HostArray> {
        self.0.alloc_zeroed(len)
    }

    fn upload(&self, xs: &[i32]) -> Result<HostArray> {
        self.0.upload(xs)
    }

    fn write(&self, buf: &HostArray, offset: usize, xs: &[i32]) -> Result<()> {
        self.0.write(buf, offset, xs)
    }

    fn copy(&self, src: &HostArray, dst: &HostArray) -> Result<()> {
        self.0.copy(src, dst)
    }

    fn read_back(&self, buf: &HostArray) -> Result<Vec<i32>> {
        self.0.read_back(buf)
    }

    fn launch(&self, launch: &Launch<'_, HostArray>) -> Result<()> {
        self.0.launch(launch)
    }

    fn guarantees_forward_progress(&self) -> bool {
        false
    }
}
