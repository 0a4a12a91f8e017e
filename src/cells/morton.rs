//! Dilated integers and three-axis Morton numbers.
//!
//! A dilated integer keeps the bits of a plain coordinate at every third bit
//! position, so three of them interleave into a single Z-order index with a
//! shift and an OR. Increment, decrement, addition and subtraction all work
//! directly on the dilated form, which keeps cell migration free of any
//! encode/decode round trip.

use crate::error::{Error, Result};
use std::ops::{Index, IndexMut};

/// Number of spatial axes the Morton index interleaves.
pub const AXES: usize = 3;

/// Plain-integer bits stored per axis (3 * 21 = 63 bits of the `u64`).
pub const BITS_PER_AXIS: u32 = 21;

/// Bit positions owned by one dilated axis value (bits 0, 3, 6, ..., 60).
const DILATED_MASK: u64 = 0x1249_2492_4924_9249;

/// Largest plain value a single axis can hold.
pub const MAX_AXIS_VALUE: u32 = (1 << BITS_PER_AXIS) - 1;

#[inline(always)]
fn spread_bits(x: u32) -> u64 {
    let mut x = u64::from(x) & 0x001f_ffff;
    x = (x | (x << 32)) & 0x001f_0000_0000_ffff;
    x = (x | (x << 16)) & 0x001f_0000_ff00_00ff;
    x = (x | (x << 8)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x << 4)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x << 2)) & DILATED_MASK;
    x
}

#[inline(always)]
fn compact_bits(x: u64) -> u32 {
    let mut x = x & DILATED_MASK;
    x = (x | (x >> 2)) & 0x10c3_0c30_c30c_30c3;
    x = (x | (x >> 4)) & 0x100f_00f0_0f00_f00f;
    x = (x | (x >> 8)) & 0x001f_0000_ff00_00ff;
    x = (x | (x >> 16)) & 0x001f_0000_0000_ffff;
    x = (x | (x >> 32)) & 0x001f_ffff;
    x as u32
}

/// One axis coordinate held in dilated form.
///
/// Ordering of dilated values matches ordering of the plain values, so
/// comparisons against a dilated cell maximum need no decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DilatedInteger(u64);

impl DilatedInteger {
    /// Zero in dilated form.
    pub const ZERO: Self = Self(0);

    /// The largest representable dilated value; arithmetic wraps here.
    pub const MAX: Self = Self(DILATED_MASK);

    /// Dilate a plain coordinate. Bits above [`BITS_PER_AXIS`] are discarded.
    #[inline]
    pub fn new(value: u32) -> Self {
        Self(spread_bits(value))
    }

    /// Recover the plain coordinate.
    #[inline]
    pub fn value(self) -> u32 {
        compact_bits(self.0)
    }

    /// Raw dilated bits.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// `self + 1`, wrapping at [`DilatedInteger::MAX`].
    #[inline]
    pub fn inc(self) -> Self {
        Self((self.0 | !DILATED_MASK).wrapping_add(1) & DILATED_MASK)
    }

    /// `self - 1`, wrapping below zero to [`DilatedInteger::MAX`].
    #[inline]
    pub fn dec(self) -> Self {
        Self(self.0.wrapping_sub(1) & DILATED_MASK)
    }

    /// Dilated addition, wrapping at [`DilatedInteger::MAX`].
    #[inline]
    pub fn add(self, rhs: Self) -> Self {
        Self((self.0 | !DILATED_MASK).wrapping_add(rhs.0) & DILATED_MASK)
    }

    /// Dilated subtraction, wrapping below zero.
    #[inline]
    pub fn sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0) & DILATED_MASK)
    }

    /// `self + step` modulo `max + 1`, where `max` is the largest valid
    /// coordinate on this axis. `self` must be `<= max` and `step <= max + 1`.
    #[inline]
    pub fn add_wrapped(self, step: Self, max: Self) -> Self {
        let out = self.add(step);
        if out > max {
            out.sub(max.inc())
        } else {
            out
        }
    }

    /// `self - step` modulo `max + 1`. A borrow below zero lands on
    /// `max - borrow + 1`, mirroring plain modular arithmetic.
    #[inline]
    pub fn sub_wrapped(self, step: Self, max: Self) -> Self {
        let out = self.sub(step);
        if out > max {
            out.sub(Self::MAX.sub(max))
        } else {
            out
        }
    }

    /// Periodic increment by one on an axis whose largest coordinate is `max`.
    #[inline]
    pub fn inc_wrapped(self, max: Self) -> Self {
        let out = self.inc();
        if out > max {
            Self::ZERO
        } else {
            out
        }
    }

    /// Periodic decrement by one on an axis whose largest coordinate is `max`.
    #[inline]
    pub fn dec_wrapped(self, max: Self) -> Self {
        if self == Self::ZERO {
            max
        } else {
            self.dec()
        }
    }
}

/// A cell coordinate as three dilated axis values.
///
/// The flat index ([`MortonNumber::morton`]) is the Z-order interleave of the
/// three axes and is used directly as an array offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MortonNumber {
    axes: [DilatedInteger; AXES],
}

impl MortonNumber {
    /// Encode plain `(x, y, z)`.
    #[inline]
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self {
            axes: [
                DilatedInteger::new(x),
                DilatedInteger::new(y),
                DilatedInteger::new(z),
            ],
        }
    }

    /// Build from a coordinate slice; anything but three axes is a domain error.
    pub fn from_coords(coords: &[u32]) -> Result<Self> {
        match *coords {
            [x, y, z] => Ok(Self::new(x, y, z)),
            _ => Err(Error::DomainError(format!(
                "Morton numbers need exactly {} axes, got {}",
                AXES,
                coords.len()
            ))),
        }
    }

    /// Decode a flat Morton index.
    #[inline]
    pub fn from_morton(code: u64) -> Self {
        Self {
            axes: [
                DilatedInteger(code & DILATED_MASK),
                DilatedInteger((code >> 1) & DILATED_MASK),
                DilatedInteger((code >> 2) & DILATED_MASK),
            ],
        }
    }

    /// Decode a flat cell id.
    #[inline]
    pub fn from_cell_id(id: usize) -> Self {
        Self::from_morton(id as u64)
    }

    /// The interleaved Morton code.
    #[inline]
    pub fn morton(&self) -> u64 {
        self.axes[0].0 | (self.axes[1].0 << 1) | (self.axes[2].0 << 2)
    }

    /// The Morton code as an array offset (the cell id).
    #[inline]
    pub fn cell_id(&self) -> usize {
        self.morton() as usize
    }

    /// Plain per-axis coordinates.
    #[inline]
    pub fn coords(&self) -> [u32; AXES] {
        [
            self.axes[0].value(),
            self.axes[1].value(),
            self.axes[2].value(),
        ]
    }
}

impl Index<usize> for MortonNumber {
    type Output = DilatedInteger;

    #[inline]
    fn index(&self, axis: usize) -> &DilatedInteger {
        &self.axes[axis]
    }
}

impl IndexMut<usize> for MortonNumber {
    #[inline]
    fn index_mut(&mut self, axis: usize) -> &mut DilatedInteger {
        &mut self.axes[axis]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dilation_places_bits_every_third_position() {
        assert_eq!(DilatedInteger::new(0b1).raw(), 0b1);
        assert_eq!(DilatedInteger::new(0b11).raw(), 0b1001);
        assert_eq!(DilatedInteger::new(0b101).raw(), 0b1_000_001);
        assert_eq!(DilatedInteger::new(MAX_AXIS_VALUE), DilatedInteger::MAX);
        assert_eq!(DilatedInteger::MAX.value(), MAX_AXIS_VALUE);
    }

    #[test]
    fn morton_order_interleaves_x_fastest() {
        assert_eq!(MortonNumber::new(1, 0, 0).morton(), 1);
        assert_eq!(MortonNumber::new(0, 1, 0).morton(), 2);
        assert_eq!(MortonNumber::new(0, 0, 1).morton(), 4);
        assert_eq!(MortonNumber::new(1, 1, 1).morton(), 7);
        assert_eq!(MortonNumber::new(2, 0, 0).morton(), 8);
    }

    #[test]
    fn raw_inc_and_dec_wrap_at_the_dilated_maximum() {
        assert_eq!(DilatedInteger::MAX.inc(), DilatedInteger::ZERO);
        assert_eq!(DilatedInteger::ZERO.dec(), DilatedInteger::MAX);
        assert_eq!(DilatedInteger::new(6).inc().value(), 7);
        assert_eq!(DilatedInteger::new(8).dec().value(), 7);
    }

    #[test]
    fn wrapped_arithmetic_matches_modular_integers() {
        let count = 5u32;
        let max = DilatedInteger::new(count - 1);
        for start in 0..count {
            for step in 0..=count {
                let d = DilatedInteger::new(start);
                let s = DilatedInteger::new(step);
                assert_eq!(d.add_wrapped(s, max).value(), (start + step) % count);
                let expect = (start + count - step % count) % count;
                assert_eq!(d.sub_wrapped(s, max).value(), expect);
            }
        }
    }

    #[test]
    fn inc_wrapped_cycles_back_to_zero() {
        let count = 7u32;
        let max = DilatedInteger::new(count - 1);
        let mut d = DilatedInteger::ZERO;
        for _ in 0..count - 1 {
            d = d.inc_wrapped(max);
            assert_ne!(d, DilatedInteger::ZERO);
        }
        d = d.inc_wrapped(max);
        assert_eq!(d, DilatedInteger::ZERO);
        assert_eq!(DilatedInteger::ZERO.dec_wrapped(max), max);
    }

    #[test]
    fn axis_mutation_leaves_other_axes_alone() {
        let mut m = MortonNumber::new(3, 4, 5);
        m[1] = m[1].inc();
        assert_eq!(m.coords(), [3, 5, 5]);
        m[2] = m[2].dec();
        assert_eq!(m.coords(), [3, 5, 4]);
        assert_eq!(MortonNumber::from_morton(m.morton()), m);
    }

    #[test]
    fn wrong_axis_count_is_a_domain_error() {
        assert!(MortonNumber::from_coords(&[1, 2, 3]).is_ok());
        let err = MortonNumber::from_coords(&[1, 2]).unwrap_err();
        assert!(matches!(err, Error::DomainError(_)));
        assert!(MortonNumber::from_coords(&[1, 2, 3, 4]).is_err());
    }
}
