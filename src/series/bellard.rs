//! Bellard's series.
//!
//! ```text
//! pi = 1/64 * sum_n (-1)^n / 1024^n * ( -32/(4n+1) -   1/(4n+3)
//!                                      + 256/(10n+1) - 64/(10n+3)
//!                                      -   4/(10n+5) -  4/(10n+7)
//!                                      +   1/(10n+9) )
//! ```

use super::{Recurrence, seed_index, unit_fraction};
use crate::big::BigValue;
use crate::error::Result;
use crate::precision::Precision;

const JUMP: u64 = 1024;
const CLOSING_DIVISOR: u64 = 64;

/// Bellard recurrence engine.
#[derive(Debug, Clone, Copy)]
pub struct Bellard {
    precision: Precision,
}

/// Signed power `(-1)^n / 1024^n` plus the two linear denominators.
#[derive(Debug, Clone, PartialEq)]
pub struct BellardState {
    pub(crate) power: BigValue,
    pub(crate) four_n: u64,
    pub(crate) ten_n: u64,
}

impl Bellard {
    /// Engine computing at `precision`.
    pub fn new(precision: Precision) -> Self {
        Bellard { precision }
    }
}

impl Recurrence for Bellard {
    type State = BellardState;

    const NAME: &'static str = "Bellard";

    fn precision(&self) -> Precision {
        self.precision
    }

    fn seed(&self, start: u64) -> Result<BellardState> {
        let index = seed_index(start)?;
        let mut power = unit_fraction(self.precision, 1, JUMP).pow_u32(index);
        if start % 2 == 1 {
            power.negate();
        }
        Ok(BellardState {
            power,
            four_n: 4 * start,
            ten_n: 10 * start,
        })
    }

    fn term(&self, state: &BellardState, _n: u64) -> BigValue {
        let p = self.precision;
        let (four_n, ten_n) = (state.four_n, state.ten_n);

        let mut positive = unit_fraction(p, 256, ten_n + 1);
        positive.add_assign(&unit_fraction(p, 1, ten_n + 9));

        let mut negative = unit_fraction(p, 32, four_n + 1);
        negative.add_assign(&unit_fraction(p, 1, four_n + 3));
        negative.add_assign(&unit_fraction(p, 64, ten_n + 3));
        negative.add_assign(&unit_fraction(p, 4, ten_n + 5));
        negative.add_assign(&unit_fraction(p, 4, ten_n + 7));

        positive.sub_assign(&negative);
        positive.mul_assign(&state.power);
        positive
    }

    fn step(&self, state: &mut BellardState, _n: u64) {
        state.power.div_u64(JUMP);
        state.power.negate();
        state.four_n += 4;
        state.ten_n += 10;
    }

    fn close(&self, mut sum: BigValue) -> Result<BigValue> {
        sum.div_u64(CLOSING_DIVISOR);
        Ok(sum)
    }
}
