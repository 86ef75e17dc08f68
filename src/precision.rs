//! Working precision of a computation.
//!
//! Every big-value taking part in one pi computation shares the same
//! [`Precision`]. It is passed explicitly to each constructor instead of being
//! set as process-wide state, so two computations at different precisions can
//! run side by side.

use crate::error::{Error, Result};

/// Bits in one limb of the packed wire representation.
pub const LIMB_BITS: u32 = u64::BITS;

/// Mantissa precision in bits, validated to be positive and allocatable.
///
/// # Example
///
/// ```
/// use pidecimals::Precision;
///
/// let p = Precision::new(3200).unwrap();
/// assert_eq!(p.bits(), 3200);
/// assert_eq!(p.limbs(), 50);
/// assert!(Precision::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Precision(u32);

impl Precision {
    /// Validate a bit count.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPrecision`] for zero bits and
    /// [`Error::PrecisionTooLarge`] beyond the backend's maximum.
    pub fn new(bits: u64) -> Result<Self> {
        if bits == 0 {
            return Err(Error::InvalidPrecision(bits));
        }
        let max = u64::from(rug::float::prec_max());
        if bits > max {
            return Err(Error::PrecisionTooLarge {
                requested: bits,
                max,
            });
        }
        Ok(Precision(bits as u32))
    }

    /// Mantissa bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Number of 64-bit limbs needed to hold a mantissa of this precision.
    pub fn limbs(self) -> usize {
        self.0.div_ceil(LIMB_BITS) as usize
    }

    /// Rough count of decimal digits this precision can represent.
    pub fn decimal_digits(self) -> usize {
        (f64::from(self.0) * std::f64::consts::LOG10_2).floor() as usize
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bits", self.0)
    }
}
