//! The compute device the pipelines run on.
//!
//! A device allocates zeroed `i32` buffers, launches the kernels of
//! [`Kernel`] over a grid of blocks and reads buffers back. Launches are
//! blocking: once `launch` returns, every block of the grid has finished.

pub mod host;
pub mod launch;

#[cfg(feature = "cuda")]
pub mod cuda;

use crate::error::{Error, Result};
pub use launch::{Access, Binding, Kernel, Launch};

/// A linear buffer of `i32`s in device memory.
pub trait DeviceArray {
    fn len(&self) -> usize;

    /// Identifies the allocation. Two arrays with the same address are the
    /// same buffer.
    fn address(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Device {
    type Array: DeviceArray;

    fn alloc_zeroed(&self, len: usize) -> Result<Self::Array>;

    fn upload(&self, xs: &[i32]) -> Result<Self::Array>;

    /// Overwrites `xs.len()` elements of `buf` starting at `offset`.
    fn write(&self, buf: &Self::Array, offset: usize, xs: &[i32]) -> Result<()>;

    /// Copies all of `src` into `dst`. Both must have the same length.
    fn copy(&self, src: &Self::Array, dst: &Self::Array) -> Result<()>;

    fn read_back(&self, buf: &Self::Array) -> Result<Vec<i32>>;

    /// Validates `launch` and runs it to completion.
    fn launch(&self, launch: &Launch<'_, Self::Array>) -> Result<()>;

    /// Whether every resident block keeps making progress while another
    /// block spins on it. The look-back scan depends on this.
    fn guarantees_forward_progress(&self) -> bool;

    /// Sets every element of `buf` to zero.
    fn zero(&self, buf: &Self::Array) -> Result<()> {
        self.write(buf, 0, &vec![0; buf.len()])
    }
}

/// Checks that `xs.len()` elements fit into a buffer of `len` elements at
/// `offset`.
pub(crate) fn check_write(len: usize, offset: usize, xs: &[i32]) -> Result<()> {
    match offset.checked_add(xs.len()) {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::LengthMismatch {
            expected: len.saturating_sub(offset),
            actual: xs.len(),
        }),
    }
}

/// Packs `xs` as 4-byte little-endian integers without a header.
pub fn encode_le(xs: &[i32]) -> Vec<u8> {
    xs.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Inverse of [`encode_le`].
pub fn decode_le(bytes: &[u8]) -> Result<Vec<i32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Layout(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_is_little_endian() {
        assert_eq!(encode_le(&[1, -2]), [1, 0, 0, 0, 0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(decode_le(&[0, 1, 0, 0]).unwrap(), [256]);
    }

    #[test]
    fn codec_rejects_partial_integers() {
        assert!(matches!(decode_le(&[0; 6]), Err(Error::Layout(6))));
    }

    #[test]
    fn write_must_stay_in_bounds() {
        assert!(check_write(4, 1, &[0; 3]).is_ok());
        assert!(matches!(
            check_write(4, 2, &[0; 3]),
            Err(Error::LengthMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(check_write(4, usize::MAX, &[0]).is_err());
    }
}
