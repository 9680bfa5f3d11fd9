use crate::{
    device::{launch::section_count, Device, DeviceArray, Launch},
    error::{Error, Result},
};
use log::info;
use scan_sort_gpu::lookback::{SECTION_SIZE, STATUS_FIELDS};

/// Single-pass scan of `count` elements.
///
/// Owns the virtual block counter and the status table. Both are zeroed
/// before every run, so one instance can scan any number of arrays of the
/// same length.
pub struct LookbackScan<'d, D: Device> {
    device: &'d D,
    count: usize,
    counter: D::Array,
    status: D::Array,
}

impl<'d, D: Device> LookbackScan<'d, D> {
    pub fn new(device: &'d D, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::EmptyInput);
        }
        if !device.guarantees_forward_progress() {
            return Err(Error::ForwardProgress);
        }

        let blocks = section_count(count, SECTION_SIZE);
        info!("look-back scan of {count} elements over {blocks} blocks");
        Ok(Self {
            device,
            count,
            counter: device.alloc_zeroed(1)?,
            status: device.alloc_zeroed(STATUS_FIELDS * blocks)?,
        })
    }

    /// Writes the inclusive scan of `input` into `output`.
    pub fn run(&self, input: &D::Array, output: &D::Array) -> Result<()> {
        if input.len() != self.count {
            return Err(Error::LengthMismatch {
                expected: self.count,
                actual: input.len(),
            });
        }

        self.device.zero(&self.counter)?;
        self.device.zero(&self.status)?;
        self.device.launch(&Launch::LookbackScan {
            input,
            output,
            counter: &self.counter,
            status: &self.status,
        })
    }
}
