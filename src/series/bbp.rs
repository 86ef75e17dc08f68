//! Bailey-Borwein-Plouffe series.
//!
//! ```text
//! pi = sum_n 16^-n * (4/(8n+1) - 2/(8n+4) - 1/(8n+5) - 1/(8n+6))
//! ```
//!
//! The state is the decay factor `16^-n`. Powers of two are exact in binary
//! floating point, so seeding and stepping agree bit for bit.

use super::{Recurrence, seed_index, unit_fraction};
use crate::big::BigValue;
use crate::error::Result;
use crate::precision::Precision;

/// Reciprocal of the per-term decay.
const DECAY: u64 = 16;

/// BBP recurrence engine.
#[derive(Debug, Clone, Copy)]
pub struct Bbp {
    precision: Precision,
}

/// Decay factor `16^-n` for the current index.
#[derive(Debug, Clone, PartialEq)]
pub struct BbpState {
    pub(crate) decay: BigValue,
}

impl Bbp {
    /// Engine computing at `precision`.
    pub fn new(precision: Precision) -> Self {
        Bbp { precision }
    }
}

impl Recurrence for Bbp {
    type State = BbpState;

    const NAME: &'static str = "BBP";

    fn precision(&self) -> Precision {
        self.precision
    }

    fn seed(&self, start: u64) -> Result<BbpState> {
        let index = seed_index(start)?;
        let quotient = unit_fraction(self.precision, 1, DECAY);
        Ok(BbpState {
            decay: quotient.pow_u32(index),
        })
    }

    fn term(&self, state: &BbpState, n: u64) -> BigValue {
        let k = 8 * n;
        let mut term = unit_fraction(self.precision, 4, k + 1);
        term.sub_assign(&unit_fraction(self.precision, 2, k + 4));
        term.sub_assign(&unit_fraction(self.precision, 1, k + 5));
        term.sub_assign(&unit_fraction(self.precision, 1, k + 6));
        term.mul_assign(&state.decay);
        term
    }

    fn step(&self, state: &mut BbpState, _n: u64) {
        state.decay.div_u64(DECAY);
    }

    fn close(&self, sum: BigValue) -> Result<BigValue> {
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimals::{PI_REFERENCE, matching_decimals};
    use crate::distribution::Block;
    use crate::error::Error;
    use crate::series::sum_block;

    fn engine(bits: u64) -> Bbp {
        Bbp::new(Precision::new(bits).unwrap())
    }

    #[test]
    fn seed_matches_stepping() {
        let bbp = engine(640);
        let mut state = bbp.seed(0).unwrap();
        for k in 0..120 {
            assert_eq!(bbp.seed(k).unwrap(), state, "state differs at index {k}");
            bbp.step(&mut state, k);
        }
    }

    #[test]
    fn seed_past_index_range_fails() {
        let bbp = engine(128);
        assert!(matches!(
            bbp.seed(crate::series::MAX_ITERATIONS + 1),
            Err(Error::TooManyIterations { .. })
        ));
        assert!(bbp.seed(1 << 32).is_err());
    }

    #[test]
    fn first_term_is_exact() {
        let bbp = engine(128);
        let state = bbp.seed(0).unwrap();
        // 4 - 1/2 - 1/5 - 1/6 = 47/15
        let mut expected = BigValue::from_u64(bbp.precision(), 47);
        expected.div_u64(15);
        assert!(bbp.term(&state, 0).agrees_within_ulps(&expected, 4));
    }

    #[test]
    fn sequential_sum_matches_reference() {
        let bbp = engine(1000);
        let sum = sum_block(&bbp, Block::new(0, 300)).unwrap();
        let pi = bbp.close(sum).unwrap();
        let matched = matching_decimals(&pi, PI_REFERENCE);
        assert!(matched >= 280, "only {matched} decimals");
    }

    #[test]
    fn zero_iterations_give_zero() {
        let bbp = engine(256);
        let sum = sum_block(&bbp, Block::new(0, 0)).unwrap();
        assert!(bbp.close(sum).unwrap().is_zero());
    }
}
