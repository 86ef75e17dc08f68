//! Fixed-layout byte packing of big-values.
//!
//! Partial sums cross process boundaries as flat byte buffers whose size
//! depends only on the precision, so every rank can allocate its receive
//! buffer before any data arrives.
//!
//! # Layout
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0      | 1    | [`WireTag`] (zero / positive / negative) |
//! | 1      | 3    | reserved, zero |
//! | 4      | 4    | precision in bits, `u32` little endian |
//! | 8      | 8    | binary exponent, `i64` little endian |
//! | 16     | 8·L  | mantissa limbs, `u64` little endian, least significant first |
//!
//! `L` is [`Precision::limbs`]. The value is `±mantissa · 2^exponent`.

use rug::integer::Order;
use rug::{Float, Integer};

use crate::big::BigValue;
use crate::error::{Error, Result};
use crate::precision::Precision;

/// Bytes before the first limb.
pub const HEADER_LEN: usize = 16;

/// Sign tag stored in the first byte of a packed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireTag {
    /// Exact zero; exponent and limbs are all zero
    Zero = 0,
    /// Strictly positive finite value
    Positive = 1,
    /// Strictly negative finite value
    Negative = 2,
}

impl WireTag {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(WireTag::Zero),
            1 => Ok(WireTag::Positive),
            2 => Ok(WireTag::Negative),
            other => Err(Error::InvalidBuffer(format!("unknown sign tag {other}"))),
        }
    }
}

/// Size in bytes of every packed value at this precision.
pub fn packed_len(precision: Precision) -> usize {
    HEADER_LEN + precision.limbs() * 8
}

/// Pack a value into its fixed-size wire form.
///
/// # Errors
///
/// [`Error::NonFinite`] for NaN or infinities, [`Error::InvalidBuffer`] when
/// the value's precision differs from `precision`.
pub fn pack(value: &BigValue, precision: Precision) -> Result<Vec<u8>> {
    if value.precision_bits() != precision.bits() {
        return Err(Error::InvalidBuffer(format!(
            "value has {} bits, expected {}",
            value.precision_bits(),
            precision.bits()
        )));
    }
    let mut buf = vec![0u8; packed_len(precision)];
    buf[4..8].copy_from_slice(&precision.bits().to_le_bytes());
    if value.is_zero() {
        buf[0] = WireTag::Zero as u8;
        return Ok(buf);
    }
    let (mantissa, exponent) = value.as_float().to_integer_exp().ok_or(Error::NonFinite)?;
    let tag = if mantissa < 0 {
        WireTag::Negative
    } else {
        WireTag::Positive
    };
    let limbs = Integer::from(mantissa.abs_ref()).to_digits::<u64>(Order::Lsf);
    if limbs.len() > precision.limbs() {
        return Err(Error::InvalidBuffer(format!(
            "mantissa needs {} limbs, layout has {}",
            limbs.len(),
            precision.limbs()
        )));
    }
    buf[0] = tag as u8;
    buf[8..16].copy_from_slice(&i64::from(exponent).to_le_bytes());
    for (slot, limb) in buf[HEADER_LEN..].chunks_exact_mut(8).zip(&limbs) {
        slot.copy_from_slice(&limb.to_le_bytes());
    }
    Ok(buf)
}

/// Rebuild a value from its wire form. Lossless for anything [`pack`] wrote.
///
/// # Errors
///
/// [`Error::InvalidBuffer`] when the length, precision field, tag, or
/// exponent do not match the expected layout.
pub fn unpack(buf: &[u8], precision: Precision) -> Result<BigValue> {
    if buf.len() != packed_len(precision) {
        return Err(Error::InvalidBuffer(format!(
            "expected {} bytes, got {}",
            packed_len(precision),
            buf.len()
        )));
    }
    let stored_bits = u32::from_le_bytes(read_array(&buf[4..8])?);
    if stored_bits != precision.bits() {
        return Err(Error::InvalidBuffer(format!(
            "buffer packed at {stored_bits} bits, expected {}",
            precision.bits()
        )));
    }
    let tag = WireTag::from_byte(buf[0])?;
    if tag == WireTag::Zero {
        return Ok(BigValue::zero(precision));
    }
    let exponent = i64::from_le_bytes(read_array(&buf[8..16])?);
    let exponent = i32::try_from(exponent)
        .map_err(|_| Error::InvalidBuffer(format!("exponent {exponent} out of range")))?;
    let limbs = buf[HEADER_LEN..]
        .chunks_exact(8)
        .map(|chunk| read_array(chunk).map(u64::from_le_bytes))
        .collect::<Result<Vec<u64>>>()?;
    let mut mantissa = Integer::from_digits(&limbs, Order::Lsf);
    if tag == WireTag::Negative {
        mantissa = -mantissa;
    }
    let mut value = Float::with_val(precision.bits(), &mantissa);
    value <<= exponent;
    Ok(BigValue::from_float(value))
}

fn read_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| Error::InvalidBuffer(format!("expected {N} bytes, got {}", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(bits: u64) -> Precision {
        Precision::new(bits).unwrap()
    }

    #[test]
    fn tag_values_are_stable() {
        assert_eq!(WireTag::Zero as u8, 0);
        assert_eq!(WireTag::Positive as u8, 1);
        assert_eq!(WireTag::Negative as u8, 2);
        assert!(WireTag::from_byte(3).is_err());
    }

    #[test]
    fn packed_len_follows_precision() {
        assert_eq!(packed_len(p(64)), 24);
        assert_eq!(packed_len(p(65)), 32);
        assert_eq!(packed_len(p(3200)), 16 + 50 * 8);
    }

    #[test]
    fn zero_packs_to_header_only() {
        let buf = pack(&BigValue::zero(p(128)), p(128)).unwrap();
        assert_eq!(buf[0], WireTag::Zero as u8);
        assert!(buf[8..].iter().all(|&b| b == 0));
        assert!(unpack(&buf, p(128)).unwrap().is_zero());
    }

    #[test]
    fn third_survives_transport_bit_for_bit() {
        let mut third = BigValue::from_u64(p(1000), 1);
        third.div_u64(3);
        third.negate();
        let buf = pack(&third, p(1000)).unwrap();
        assert_eq!(buf.len(), packed_len(p(1000)));
        assert_eq!(buf[0], WireTag::Negative as u8);
        assert_eq!(unpack(&buf, p(1000)).unwrap(), third);
    }

    #[test]
    fn huge_and_tiny_exponents_survive() {
        let big = BigValue::from_u64(p(256), 10).pow_u32(400);
        assert_eq!(unpack(&pack(&big, p(256)).unwrap(), p(256)).unwrap(), big);

        let mut tiny = BigValue::from_u64(p(256), 1);
        tiny.div_assign(&big);
        assert_eq!(unpack(&pack(&tiny, p(256)).unwrap(), p(256)).unwrap(), tiny);
    }

    #[test]
    fn precision_mismatch_rejected() {
        let x = BigValue::from_u64(p(128), 5);
        assert!(matches!(pack(&x, p(192)), Err(Error::InvalidBuffer(_))));

        let buf = pack(&x, p(128)).unwrap();
        // Same length (two limbs either way) but a different precision field
        assert!(matches!(unpack(&buf, p(127)), Err(Error::InvalidBuffer(_))));
        assert!(matches!(unpack(&buf[..20], p(128)), Err(Error::InvalidBuffer(_))));
    }

    #[test]
    fn non_finite_rejected() {
        let mut x = BigValue::from_u64(p(64), 1);
        x.div_assign(&BigValue::zero(p(64)));
        assert!(matches!(pack(&x, p(64)), Err(Error::NonFinite)));
    }
}
