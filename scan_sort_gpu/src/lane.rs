/// The view a single thread has of the launch it is running in.
///
/// Kernel bodies are written against this trait so that the same code runs as
/// a CUDA kernel and inside the host-side block emulator.
pub trait Lane {
    /// Index of the thread within its block.
    fn thread_idx(&self) -> usize;

    /// Index of the block within the grid, as assigned by the scheduler.
    fn block_idx(&self) -> usize;

    /// Number of threads per block.
    fn block_dim(&self) -> usize;

    /// Number of blocks in the grid.
    fn grid_dim(&self) -> usize;

    /// Waits until every thread of the block has reached the barrier. Writes
    /// to shared memory made before the barrier are visible after it.
    fn sync_threads(&self);

    fn global_idx(&self) -> usize {
        self.block_idx() * self.block_dim() + self.thread_idx()
    }
}

#[cfg(target_os = "cuda")]
pub struct CudaLane;

#[cfg(target_os = "cuda")]
impl Lane for CudaLane {
    #[inline(always)]
    fn thread_idx(&self) -> usize {
        cuda_std::thread::thread_idx_x() as usize
    }

    #[inline(always)]
    fn block_idx(&self) -> usize {
        cuda_std::thread::block_idx_x() as usize
    }

    #[inline(always)]
    fn block_dim(&self) -> usize {
        cuda_std::thread::block_dim_x() as usize
    }

    #[inline(always)]
    fn grid_dim(&self) -> usize {
        cuda_std::thread::grid_dim_x() as usize
    }

    #[inline(always)]
    fn sync_threads(&self) {
        cuda_std::thread::sync_threads()
    }
}
