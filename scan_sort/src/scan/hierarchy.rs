use crate::{
    device::{launch::next_level_len, Device, DeviceArray, Launch},
    error::{Error, Result},
};
use log::info;

/// Element counts of the levels of a hierarchical scan, starting with the
/// scanned array itself. Every level holds one total per section of the level
/// below except the last one. The top level fits into a single section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelSizes(Vec<usize>);

impl LevelSizes {
    pub fn new(count: usize) -> Self {
        let mut sizes = vec![count];
        let mut size = next_level_len(count);
        while size > 0 {
            sizes.push(size);
            size = next_level_len(size);
        }
        Self(sizes)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Number of levels, including level 0.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Whether phase A scans `level`. A single-element top level is already
    /// its own inclusive scan.
    pub fn scans(&self, level: usize) -> bool {
        level + 1 < self.depth() || self.0[level] > 1
    }
}

/// The buffers of levels `1..` of a hierarchy, allocated once.
pub(crate) struct Levels<A> {
    sizes: LevelSizes,
    upper: Vec<A>,
}

impl<A: DeviceArray> Levels<A> {
    pub fn new<D: Device<Array = A>>(device: &D, count: usize) -> Result<Self> {
        let sizes = LevelSizes::new(count);
        let upper = sizes.as_slice()[1..]
            .iter()
            .map(|&len| device.alloc_zeroed(len))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sizes, upper })
    }

    pub fn sizes(&self) -> &LevelSizes {
        &self.sizes
    }

    /// Level `i`, where level 0 is `base`.
    pub fn level<'a>(&'a self, base: &'a A, i: usize) -> &'a A {
        match i {
            0 => base,
            _ => &self.upper[i - 1],
        }
    }

    /// The level that receives the section totals of level `i`.
    pub fn group(&self, i: usize) -> Option<&A> {
        self.upper.get(i)
    }
}

/// Multi-level scan of `count` elements in place.
pub struct HierarchicalScan<'d, D: Device> {
    device: &'d D,
    levels: Levels<D::Array>,
}

impl<'d, D: Device> HierarchicalScan<'d, D> {
    pub fn new(device: &'d D, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::EmptyInput);
        }
        let levels = Levels::new(device, count)?;
        info!("hierarchical scan levels: {:?}", levels.sizes().as_slice());
        Ok(Self { device, levels })
    }

    pub fn level_sizes(&self) -> &LevelSizes {
        self.levels.sizes()
    }

    /// Replaces `data` with its inclusive scan.
    pub fn run(&self, data: &D::Array) -> Result<()> {
        let sizes = self.levels.sizes();
        if data.len() != sizes.as_slice()[0] {
            return Err(Error::LengthMismatch {
                expected: sizes.as_slice()[0],
                actual: data.len(),
            });
        }

        // Reduce: scan every level, passing section totals up.
        for i in (0..sizes.depth()).filter(|&i| sizes.scans(i)) {
            self.device.launch(&Launch::BlockScan {
                data: self.levels.level(data, i),
                group: self.levels.group(i),
            })?;
        }

        // Propagate: add the scanned totals back down.
        for i in (0..sizes.depth() - 1).rev() {
            if let Some(sums) = self.levels.group(i) {
                self.device.launch(&Launch::AddBlockSums {
                    data: self.levels.level(data, i),
                    sums,
                })?;
            }
        }
        Ok(())
    }
}
