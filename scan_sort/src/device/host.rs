//! A device emulated on the host.
//!
//! Every resident block is backed by one OS thread per lane. The lanes of a
//! block share a scratch area and a barrier, so the kernel bodies of
//! `scan_sort_gpu` run unchanged. Blocks claim the next hardware block index
//! from a dispatch queue whose order is set by [`DispatchOrder`].
//!
//! [`DispatchOrder`]: crate::config::DispatchOrder

use crate::{
    config::{HostConfig, MAX_RESIDENT_BLOCKS},
    device::{check_write, Device, DeviceArray, Kernel, Launch},
    error::{Error, Result},
};
use log::debug;
use scan_sort_gpu::{hierarchy, lane::Lane, lookback, radix, radix::RadixParams};
use std::{
    cell::UnsafeCell,
    io, ptr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Barrier, PoisonError, RwLock,
    },
    thread,
};

const LANE_STACK_SIZE: usize = 256 * 1024;

/// A buffer in host memory. Kernels write to it through raw pointers while a
/// launch holds a shared reference to it.
pub struct HostArray {
    cells: Box<[UnsafeCell<i32>]>,
}

impl HostArray {
    fn zeroed(len: usize) -> Self {
        Self {
            cells: (0..len).map(|_| UnsafeCell::new(0)).collect(),
        }
    }

    fn from_slice(xs: &[i32]) -> Self {
        Self {
            cells: xs.iter().map(|&x| UnsafeCell::new(x)).collect(),
        }
    }

    fn as_ptr(&self) -> *mut i32 {
        UnsafeCell::raw_get(self.cells.as_ptr())
    }
}

impl DeviceArray for HostArray {
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn address(&self) -> usize {
        self.cells.as_ptr() as usize
    }
}

/// Raw pointer handed to the lane threads.
#[derive(Clone, Copy)]
struct DevicePtr(*mut i32);

unsafe impl Send for DevicePtr {}
unsafe impl Sync for DevicePtr {}

impl DevicePtr {
    fn of(array: &HostArray) -> Self {
        Self(array.as_ptr())
    }

    fn get(self) -> *mut i32 {
        self.0
    }
}

pub struct HostLane<'a> {
    thread_idx: usize,
    block_idx: usize,
    block_dim: usize,
    grid_dim: usize,
    barrier: &'a Barrier,
}

impl Lane for HostLane<'_> {
    fn thread_idx(&self) -> usize {
        self.thread_idx
    }

    fn block_idx(&self) -> usize {
        self.block_idx
    }

    fn block_dim(&self) -> usize {
        self.block_dim
    }

    fn grid_dim(&self) -> usize {
        self.grid_dim
    }

    fn sync_threads(&self) {
        self.barrier.wait();
    }
}

/// The lanes of one resident block.
struct Slot {
    shared: DevicePtr,
    barrier: Barrier,
    claimed: AtomicUsize,
}

impl Slot {
    /// Runs blocks until the dispatch queue is drained. Thread 0 claims the
    /// next block and every lane picks it up after the barrier, so all lanes
    /// of the slot leave the loop together.
    fn run_lane<F>(
        &self,
        thread_idx: usize,
        block_dim: usize,
        order: &[usize],
        next: &AtomicUsize,
        body: &F,
    ) where
        F: Fn(&HostLane<'_>, *mut i32),
    {
        let grid_dim = order.len();
        loop {
            if thread_idx == 0 {
                self.claimed
                    .store(next.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
            }
            self.barrier.wait();

            let claimed = self.claimed.load(Ordering::Relaxed);
            if claimed >= grid_dim {
                break;
            }
            let lane = HostLane {
                thread_idx,
                block_idx: order[claimed],
                block_dim,
                grid_dim,
                barrier: &self.barrier,
            };
            body(&lane, self.shared.get());

            // The scratch area and claim slot are reused by the next block.
            self.barrier.wait();
        }
    }
}

#[derive(Default)]
pub struct HostDevice {
    config: HostConfig,
    /// Lanes spawned before spawning fails. Lets tests reach the error path.
    #[cfg(test)]
    spawn_limit: Option<usize>,
}

impl HostDevice {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            #[cfg(test)]
            spawn_limit: None,
        }
    }

    fn spawn_lane<'scope, 'env, F>(
        &self,
        scope: &'scope thread::Scope<'scope, 'env>,
        spawned: usize,
        f: F,
    ) -> io::Result<thread::ScopedJoinHandle<'scope, ()>>
    where
        F: FnOnce() + Send + 'scope,
    {
        #[cfg(test)]
        if self.spawn_limit.is_some_and(|limit| spawned >= limit) {
            return Err(io::Error::new(io::ErrorKind::Other, "spawn limit reached"));
        }
        #[cfg(not(test))]
        let _ = spawned;
        thread::Builder::new()
            .stack_size(LANE_STACK_SIZE)
            .spawn_scoped(scope, f)
    }

    /// Runs `body` for every block of a grid of `grid_dim` blocks of
    /// `kernel.block_size()` lanes and waits for all of them.
    ///
    /// Lanes wait on `gate` until every lane of the grid is spawned. If a
    /// spawn fails they see `aborted` and return before touching a barrier.
    fn run_grid<F>(&self, kernel: Kernel, grid_dim: usize, body: F) -> Result<()>
    where
        F: Fn(&HostLane<'_>, *mut i32) + Sync,
    {
        if self.config.resident_blocks > MAX_RESIDENT_BLOCKS {
            return Err(Error::Launch(format!(
                "{kernel}: {} resident blocks exceed the limit of {MAX_RESIDENT_BLOCKS}",
                self.config.resident_blocks
            )));
        }

        let block_dim = kernel.block_size();
        let order = self.config.dispatch_order.arrange(grid_dim);
        let next = AtomicUsize::new(0);
        let resident = self.config.resident_blocks.clamp(1, grid_dim.max(1));

        let scratch: Vec<HostArray> = (0..resident)
            .map(|_| HostArray::zeroed(kernel.shared_len()))
            .collect();
        let slots: Vec<Slot> = scratch
            .iter()
            .map(|shared| Slot {
                shared: DevicePtr::of(shared),
                barrier: Barrier::new(block_dim),
                claimed: AtomicUsize::new(0),
            })
            .collect();
        let gate = RwLock::new(());
        let aborted = AtomicBool::new(false);

        thread::scope(|scope| {
            let closed = gate.write().unwrap_or_else(PoisonError::into_inner);
            let mut lanes = Vec::with_capacity(resident * block_dim);
            let mut spawn_error = None;
            'spawn: for slot in &slots {
                for thread_idx in 0..block_dim {
                    let (order, next, body) = (&order, &next, &body);
                    let (gate, aborted) = (&gate, &aborted);
                    let lane = self.spawn_lane(scope, lanes.len(), move || {
                        drop(gate.read());
                        if !aborted.load(Ordering::Acquire) {
                            slot.run_lane(thread_idx, block_dim, order, next, body)
                        }
                    });
                    match lane {
                        Ok(lane) => lanes.push(lane),
                        Err(e) => {
                            spawn_error = Some(e);
                            break 'spawn;
                        }
                    }
                }
            }
            if spawn_error.is_some() {
                aborted.store(true, Ordering::Release);
            }
            drop(closed);

            let mut panicked = false;
            for lane in lanes {
                panicked |= lane.join().is_err();
            }
            if let Some(e) = spawn_error {
                return Err(Error::Launch(format!("{kernel}: cannot spawn lane: {e}")));
            }
            if panicked {
                return Err(Error::Launch(format!("{kernel}: lane panicked")));
            }
            Ok(())
        })
    }
}

impl Device for HostDevice {
    type Array = HostArray;

    fn alloc_zeroed(&self, len: usize) -> Result<HostArray> {
        Ok(HostArray::zeroed(len))
    }

    fn upload(&self, xs: &[i32]) -> Result<HostArray> {
        Ok(HostArray::from_slice(xs))
    }

    fn write(&self, buf: &HostArray, offset: usize, xs: &[i32]) -> Result<()> {
        check_write(buf.len(), offset, xs)?;
        for (cell, &x) in buf.cells[offset..].iter().zip(xs) {
            unsafe { *cell.get() = x };
        }
        Ok(())
    }

    fn copy(&self, src: &HostArray, dst: &HostArray) -> Result<()> {
        if src.len() != dst.len() {
            return Err(Error::LengthMismatch {
                expected: dst.len(),
                actual: src.len(),
            });
        }
        unsafe { ptr::copy(src.as_ptr(), dst.as_ptr(), src.len()) };
        Ok(())
    }

    fn read_back(&self, buf: &HostArray) -> Result<Vec<i32>> {
        Ok(buf.cells.iter().map(|cell| unsafe { *cell.get() }).collect())
    }

    fn launch(&self, launch: &Launch<'_, HostArray>) -> Result<()> {
        launch.validate()?;

        let kernel = launch.kernel();
        let grid = launch.grid_size();
        let count = launch.count();
        debug!(
            "{kernel}: {count} elements, {grid} blocks of {} lanes",
            kernel.block_size()
        );
        if grid == 0 {
            return Ok(());
        }

        let group_len = launch.group_len();
        match *launch {
            Launch::LookbackScan {
                input,
                output,
                counter,
                status,
            } => {
                let input = DevicePtr::of(input);
                let output = DevicePtr::of(output);
                let counter = DevicePtr::of(counter);
                let status = DevicePtr::of(status);
                self.run_grid(kernel, grid, |lane, shared| unsafe {
                    lookback::lookback_scan(
                        lane,
                        shared,
                        input.get(),
                        output.get(),
                        count,
                        counter.get(),
                        status.get(),
                    )
                })
            }
            Launch::BlockScan { data, group } => {
                let data = DevicePtr::of(data);
                let group = group.map(DevicePtr::of);
                self.run_grid(kernel, grid, |lane, shared| unsafe {
                    let group = group.map(|g| ([g.get()], group_len));
                    hierarchy::scan_sections(lane, shared, [data.get()], count, group)
                })
            }
            Launch::AddBlockSums { data, sums } => {
                let data = DevicePtr::of(data);
                let sums = DevicePtr::of(sums);
                self.run_grid(kernel, grid, |lane, _| unsafe {
                    hierarchy::add_section_sums(lane, [data.get()], count, [sums.get() as *const i32])
                })
            }
            Launch::RadixSplitScan {
                bit,
                source,
                streams,
                group,
            } => {
                let params = RadixParams { count, bit };
                let source = DevicePtr::of(source);
                let streams = streams.map(DevicePtr::of);
                let group = group.map(|g| g.map(DevicePtr::of));
                self.run_grid(kernel, grid, |lane, shared| unsafe {
                    let group = group.map(|g| (g.map(DevicePtr::get), group_len));
                    radix::split_scan(
                        lane,
                        shared,
                        params,
                        source.get(),
                        streams.map(DevicePtr::get),
                        group,
                    )
                })
            }
            Launch::DualBlockScan { streams, group } => {
                let streams = streams.map(DevicePtr::of);
                let group = group.map(|g| g.map(DevicePtr::of));
                self.run_grid(kernel, grid, |lane, shared| unsafe {
                    let group = group.map(|g| (g.map(DevicePtr::get), group_len));
                    hierarchy::scan_sections(lane, shared, streams.map(DevicePtr::get), count, group)
                })
            }
            Launch::DualAddBlockSums { streams, sums } => {
                let streams = streams.map(DevicePtr::of);
                let sums = sums.map(DevicePtr::of);
                self.run_grid(kernel, grid, |lane, _| unsafe {
                    hierarchy::add_section_sums(
                        lane,
                        streams.map(DevicePtr::get),
                        count,
                        sums.map(|s| s.get() as *const i32),
                    )
                })
            }
            Launch::RadixScatter {
                bit,
                source,
                prefix,
                output,
            } => {
                let params = RadixParams { count, bit };
                let source = DevicePtr::of(source);
                let prefix = prefix.map(DevicePtr::of);
                let output = DevicePtr::of(output);
                self.run_grid(kernel, grid, |lane, _| unsafe {
                    radix::scatter(
                        lane,
                        params,
                        source.get(),
                        prefix.map(|p| p.get() as *const i32),
                        output.get(),
                    )
                })
            }
        }
    }

    /// Every resident block has its own OS threads, so a spinning block
    /// never starves the block it waits on.
    fn guarantees_forward_progress(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchOrder;

    #[test]
    fn write_and_read_back() {
        let device = HostDevice::default();
        let buf = device.alloc_zeroed(5).unwrap();
        device.write(&buf, 2, &[7, 8]).unwrap();
        assert_eq!(device.read_back(&buf).unwrap(), [0, 0, 7, 8, 0]);

        let other = device.upload(&[1, 2, 3, 4, 5]).unwrap();
        device.copy(&other, &buf).unwrap();
        assert_eq!(device.read_back(&buf).unwrap(), [1, 2, 3, 4, 5]);
        device.zero(&buf).unwrap();
        assert_eq!(device.read_back(&buf).unwrap(), [0; 5]);
    }

    #[test]
    fn copy_requires_equal_lengths() {
        let device = HostDevice::default();
        let (a, b) = (device.alloc_zeroed(3).unwrap(), device.alloc_zeroed(4).unwrap());
        assert!(matches!(
            device.copy(&a, &b),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn every_block_runs_exactly_once_in_any_order() {
        for order in [
            DispatchOrder::Ascending,
            DispatchOrder::Descending,
            DispatchOrder::Shuffled(3),
        ] {
            let device = HostDevice::new(
                HostConfig::default()
                    .with_resident_blocks(3)
                    .with_dispatch_order(order),
            );
            let runs: Vec<AtomicUsize> = (0..10).map(|_| AtomicUsize::new(0)).collect();
            device
                .run_grid(Kernel::AddBlockSums, 10, |lane, _| {
                    if lane.thread_idx() == 0 {
                        runs[lane.block_idx()].fetch_add(1, Ordering::Relaxed);
                    }
                })
                .unwrap();
            assert!(runs.iter().all(|r| r.load(Ordering::Relaxed) == 1));
        }
    }

    #[test]
    fn lanes_of_a_block_share_scratch() {
        let device = HostDevice::new(HostConfig::default().with_resident_blocks(2));
        let totals: Vec<AtomicUsize> = (0..4).map(|_| AtomicUsize::new(0)).collect();
        device
            .run_grid(Kernel::BlockScan, 4, |lane, shared| unsafe {
                *shared.add(lane.thread_idx()) = lane.block_idx() as i32;
                lane.sync_threads();
                if lane.thread_idx() == 0 {
                    let sum: i32 = (0..lane.block_dim()).map(|t| *shared.add(t)).sum();
                    totals[lane.block_idx()].store(sum as usize, Ordering::Relaxed);
                }
            })
            .unwrap();
        let block_dim = Kernel::BlockScan.block_size();
        for (block, total) in totals.iter().enumerate() {
            assert_eq!(total.load(Ordering::Relaxed), block * block_dim);
        }
    }

    #[test]
    fn failed_spawn_releases_the_spawned_lanes() {
        let runs = AtomicUsize::new(0);
        for limit in [0, 10, Kernel::BlockScan.block_size() + 1] {
            let device = HostDevice {
                config: HostConfig::default().with_resident_blocks(2),
                spawn_limit: Some(limit),
            };
            let result = device.run_grid(Kernel::BlockScan, 4, |lane, _| {
                lane.sync_threads();
                runs.fetch_add(1, Ordering::Relaxed);
            });
            assert!(matches!(result, Err(Error::Launch(_))));
        }
        assert_eq!(runs.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn too_many_resident_blocks_is_an_error() {
        let device = HostDevice::new(HostConfig {
            resident_blocks: MAX_RESIDENT_BLOCKS + 1,
            ..HostConfig::default()
        });
        let result = device.run_grid(Kernel::LookbackScan, 64, |_, _| {});
        assert!(matches!(result, Err(Error::Launch(_))));

        let device = HostDevice::new(HostConfig::default().with_resident_blocks(100_000));
        assert!(device.run_grid(Kernel::AddBlockSums, 20, |_, _| {}).is_ok());
    }
}
