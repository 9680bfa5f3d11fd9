//! CUDA backend. Runs the PTX that `build.rs` compiles from `scan_sort_gpu`.

use crate::{
    device::{check_write, Device, DeviceArray, Launch},
    error::{Error, Result},
};
use cust::prelude::*;
use log::debug;
use scan_sort_gpu::radix::RadixParams;
use std::cell::RefCell;

static PTX: &str = include_str!("../../../resources/scan_sort_gpu.ptx");

pub struct CudaArray {
    buf: RefCell<DeviceBuffer<i32>>,
    len: usize,
    address: usize,
}

impl CudaArray {
    fn new(buf: DeviceBuffer<i32>) -> Self {
        let len = buf.len();
        let address = buf.as_device_ptr().as_raw() as usize;
        Self {
            buf: RefCell::new(buf),
            len,
            address,
        }
    }

    fn device_ptr(&self) -> DevicePointer<i32> {
        self.buf.borrow().as_device_ptr()
    }
}

impl DeviceArray for CudaArray {
    fn len(&self) -> usize {
        self.len
    }

    fn address(&self) -> usize {
        self.address
    }
}

/// Fields drop in declaration order, so the context outlives the module and
/// the stream.
pub struct CudaDevice {
    module: Module,
    stream: Stream,
    _ctx: Context,
}

impl CudaDevice {
    pub fn new() -> Result<Self> {
        let ctx = cust::quick_init()?;
        let module = Module::from_ptx(PTX, &[])?;
        let stream = Stream::new(StreamFlags::NON_BLOCKING, None)?;
        Ok(Self {
            module,
            stream,
            _ctx: ctx,
        })
    }
}

impl Device for CudaDevice {
    type Array = CudaArray;

    fn alloc_zeroed(&self, len: usize) -> Result<CudaArray> {
        self.upload(&vec![0; len])
    }

    fn upload(&self, xs: &[i32]) -> Result<CudaArray> {
        Ok(CudaArray::new(xs.as_dbuf()?))
    }

    fn write(&self, buf: &CudaArray, offset: usize, xs: &[i32]) -> Result<()> {
        check_write(buf.len(), offset, xs)?;
        let mut dev = buf.buf.borrow_mut();
        if offset == 0 && xs.len() == buf.len() {
            dev.copy_from(xs)?;
        } else {
            let mut host = vec![0; buf.len()];
            dev.copy_to(&mut host)?;
            host[offset..offset + xs.len()].copy_from_slice(xs);
            dev.copy_from(&host)?;
        }
        Ok(())
    }

    fn copy(&self, src: &CudaArray, dst: &CudaArray) -> Result<()> {
        if src.len() != dst.len() {
            return Err(Error::LengthMismatch {
                expected: dst.len(),
                actual: src.len(),
            });
        }
        if src.address() == dst.address() {
            return Ok(());
        }
        let host = self.read_back(src)?;
        dst.buf.borrow_mut().copy_from(&host)?;
        Ok(())
    }

    fn read_back(&self, buf: &CudaArray) -> Result<Vec<i32>> {
        let mut host = vec![0; buf.len()];
        buf.buf.borrow().copy_to(&mut host)?;
        Ok(host)
    }

    fn launch(&self, launch: &Launch<'_, CudaArray>) -> Result<()> {
        launch.validate()?;

        let kernel = launch.kernel();
        let grid_size = launch.grid_size() as u32;
        let block_size = kernel.block_size() as u32;
        let count = launch.count();
        debug!("{kernel}: {count} elements, {grid_size} blocks of {block_size} lanes");
        if grid_size == 0 {
            return Ok(());
        }

        let function = self.module.get_function(kernel.name())?;
        let stream = &self.stream;
        let group_len = launch.group_len();
        unsafe {
            match *launch {
                Launch::LookbackScan {
                    input,
                    output,
                    counter,
                    status,
                } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(
                        input.device_ptr(),
                        output.device_ptr(),
                        count,
                        counter.device_ptr(),
                        status.device_ptr()
                    )
                )?,
                Launch::BlockScan { data, group: None } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(data.device_ptr(), count)
                )?,
                Launch::BlockScan {
                    data,
                    group: Some(group),
                } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(
                        data.device_ptr(),
                        count,
                        group.device_ptr(),
                        group_len
                    )
                )?,
                Launch::AddBlockSums { data, sums } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(
                        data.device_ptr(),
                        count,
                        sums.device_ptr()
                    )
                )?,
                Launch::RadixSplitScan {
                    bit,
                    source,
                    streams,
                    group: None,
                } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(
                        RadixParams { count, bit },
                        source.device_ptr(),
                        streams[0].device_ptr(),
                        streams[1].device_ptr()
                    )
                )?,
                Launch::RadixSplitScan {
                    bit,
                    source,
                    streams,
                    group: Some(group),
                } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(
                        RadixParams { count, bit },
                        source.device_ptr(),
                        streams[0].device_ptr(),
                        streams[1].device_ptr(),
                        group[0].device_ptr(),
                        group[1].device_ptr(),
                        group_len
                    )
                )?,
                Launch::DualBlockScan {
                    streams,
                    group: None,
                } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(
                        streams[0].device_ptr(),
                        streams[1].device_ptr(),
                        count
                    )
                )?,
                Launch::DualBlockScan {
                    streams,
                    group: Some(group),
                } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(
                        streams[0].device_ptr(),
                        streams[1].device_ptr(),
                        count,
                        group[0].device_ptr(),
                        group[1].device_ptr(),
                        group_len
                    )
                )?,
                Launch::DualAddBlockSums { streams, sums } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(
                        streams[0].device_ptr(),
                        streams[1].device_ptr(),
                        count,
                        sums[0].device_ptr(),
                        sums[1].device_ptr()
                    )
                )?,
                Launch::RadixScatter {
                    bit,
                    source,
                    prefix,
                    output,
                } => launch!(
                    function<<<grid_size, block_size, 0, stream>>>(
                        RadixParams { count, bit },
                        source.device_ptr(),
                        prefix[0].device_ptr(),
                        prefix[1].device_ptr(),
                        output.device_ptr()
                    )
                )?,
            }
        }
        self.stream.synchronize()?;
        Ok(())
    }

    /// A block that has started stays resident until it exits, and the
    /// look-back scan only waits on blocks that claimed their index earlier.
    fn guarantees_forward_progress(&self) -> bool {
        true
    }
}
