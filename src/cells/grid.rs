//! Partition geometry for the periodic primary image.

use super::config::CellListConfig;
use super::morton::{DilatedInteger, MortonNumber, AXES, MAX_AXIS_VALUE};
use crate::core::particle::Vec3;
use crate::error::{Error, Result};
use log::debug;

/// Cell counts, widths and offsets for one build of the cell list.
///
/// Each cell owns a lattice slot of width `lattice_width`; its interaction
/// box is wider (`interaction_width`) and shifted by `offset`, so boxes of
/// neighbouring cells overlap and a particle near a face does not flip
/// between cells on every small excursion.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGrid {
    count: [usize; AXES],
    dilated_max: [DilatedInteger; AXES],
    lattice_width: Vec3,
    interaction_width: Vec3,
    offset: Vec3,
    primary: Vec3,
    overlink: usize,
    dilated_overlink: DilatedInteger,
    array_len: usize,
}

impl CellGrid {
    /// Lay out cells over a primary image of size `primary` so that no
    /// interaction shorter than `range` escapes the look-ahead cube.
    pub fn build(primary: Vec3, range: f64, config: &CellListConfig) -> Result<Self> {
        config.validate()?;
        if !range.is_finite() || range <= 0.0 {
            return Err(Error::Config(format!(
                "interaction range must be finite and > 0 (got {range})"
            )));
        }
        if !primary.iter().all(|&l| l.is_finite() && l > 0.0) {
            return Err(Error::Config(
                "primary cell size must be finite and > 0 on every axis".into(),
            ));
        }

        let min_width =
            config.oversize * range * (1.0 + 10.0 * f64::EPSILON) / config.overlink as f64;
        let walk = 2 * config.overlink + 1;

        let mut count = [0usize; AXES];
        let mut dilated_max = [DilatedInteger::ZERO; AXES];
        let mut lattice_width = [0.0; AXES];
        let mut interaction_width = [0.0; AXES];
        let mut offset = [0.0; AXES];

        for k in 0..AXES {
            let axis_name = char::from(b'x' + k as u8);
            let n = (primary[k] / min_width).floor();
            if n < 3.0 {
                return Err(Error::Config(format!(
                    "not enough cells in {axis_name} dimension, need 3+ (got {n})"
                )));
            }
            if n > f64::from(MAX_AXIS_VALUE) {
                return Err(Error::Config(format!(
                    "too many cells in {axis_name} dimension ({n}); increase the interaction range"
                )));
            }
            let n = n as usize;
            if walk > n {
                return Err(Error::Config(format!(
                    "overlink {} needs {walk} cells in {axis_name} dimension, only {n} fit",
                    config.overlink
                )));
            }
            count[k] = n;
            dilated_max[k] = DilatedInteger::new(n as u32 - 1);
            lattice_width[k] = primary[k] / n as f64;
            let skin = (lattice_width[k] - min_width) * config.lambda;
            interaction_width[k] = lattice_width[k] + skin;
            offset[k] = -0.5 * skin;
        }

        let array_len =
            MortonNumber::new(count[0] as u32, count[1] as u32, count[2] as u32).cell_id();

        debug!("Cells <x,y,z> {},{},{}", count[0], count[1], count[2]);
        debug!(
            "Cell offset <x,y,z> {},{},{}",
            offset[0], offset[1], offset[2]
        );
        debug!(
            "Cell dimension <x,y,z> {},{},{}",
            interaction_width[0], interaction_width[1], interaction_width[2]
        );
        debug!(
            "Lattice spacing <x,y,z> {},{},{}",
            lattice_width[0], lattice_width[1], lattice_width[2]
        );
        debug!("Morton array length {array_len}");

        Ok(Self {
            count,
            dilated_max,
            lattice_width,
            interaction_width,
            offset,
            primary,
            overlink: config.overlink,
            dilated_overlink: DilatedInteger::new(config.overlink as u32),
            array_len,
        })
    }

    #[inline]
    pub fn count(&self) -> [usize; AXES] {
        self.count
    }

    /// Number of real cells (product of the per-axis counts).
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.count.iter().product()
    }

    /// Length of the Morton-indexed arrays; at least [`CellGrid::num_cells`].
    #[inline]
    pub fn array_len(&self) -> usize {
        self.array_len
    }

    #[inline]
    pub fn lattice_width(&self) -> Vec3 {
        self.lattice_width
    }

    #[inline]
    pub fn interaction_width(&self) -> Vec3 {
        self.interaction_width
    }

    #[inline]
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    #[inline]
    pub fn overlink(&self) -> usize {
        self.overlink
    }

    #[inline]
    pub(crate) fn dilated_overlink(&self) -> DilatedInteger {
        self.dilated_overlink
    }

    /// Largest valid dilated coordinate on `axis`.
    #[inline]
    pub fn dilated_max(&self, axis: usize) -> DilatedInteger {
        self.dilated_max[axis]
    }

    /// Fail if `id` does not address the Morton arrays.
    #[inline]
    pub fn check_index(&self, id: usize) -> Result<usize> {
        if id >= self.array_len {
            return Err(Error::IndexOutOfRange {
                index: id,
                len: self.array_len,
            });
        }
        Ok(id)
    }

    /// Cell holding `pos`, which must already be in the primary image.
    pub fn cell_of_wrapped(&self, pos: Vec3) -> MortonNumber {
        let mut out = MortonNumber::default();
        for k in 0..AXES {
            let n = self.count[k] as i64;
            let raw = ((pos[k] + 0.5 * self.primary[k] - self.offset[k]) / self.lattice_width[k])
                .floor() as i64;
            let mut c = raw % n;
            if c < 0 {
                c += n;
            }
            out[k] = DilatedInteger::new(c as u32);
        }
        out
    }

    /// Lower corner of the interaction box of `coords` in the primary image.
    pub fn cell_origin(&self, coords: &MortonNumber) -> Vec3 {
        let mut out = [0.0; AXES];
        for (k, o) in out.iter_mut().enumerate() {
            *o = f64::from(coords[k].value()) * self.lattice_width[k] - 0.5 * self.primary[k]
                + self.offset[k];
        }
        out
    }

    /// Lower corner of the periodic image of `coords` whose centre is nearest
    /// to `pos`.
    pub fn cell_origin_near(&self, coords: &MortonNumber, pos: Vec3) -> Vec3 {
        let mut out = self.cell_origin(coords);
        for k in 0..AXES {
            let l = self.primary[k];
            let centre = out[k] + 0.5 * self.interaction_width[k];
            out[k] -= l * ((centre - pos[k]) / l).round();
        }
        out
    }

    /// Longest interaction the built grid can serve without missing pairs.
    ///
    /// Two particles in cells more than `overlink` apart are separated by at
    /// least `overlink` lattice widths minus the box overlap.
    pub fn max_supported_interaction_length(&self) -> f64 {
        (0..AXES)
            .map(|k| {
                let overlap = self.interaction_width[k] - self.lattice_width[k];
                self.overlink as f64 * self.lattice_width[k] - overlap
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Every real cell, x fastest.
    pub fn cells(&self) -> impl Iterator<Item = MortonNumber> + '_ {
        let [nx, ny, nz] = self.count;
        (0..nz).flat_map(move |z| {
            (0..ny).flat_map(move |y| {
                (0..nx).map(move |x| MortonNumber::new(x as u32, y as u32, z as u32))
            })
        })
    }
}
