//! Chudnovsky series.
//!
//! ```text
//!                    426880 * sqrt(10005)
//! pi = -------------------------------------------------------
//!      sum_n (6n)! (13591409 + 545140134 n) / ((n!)^3 (3n)! c^n)
//! ```
//!
//! with `c = (-640320)^3`.
//!
//! The state carries three values:
//!
//! - `ratio = (6n)! / ((n!)^3 (3n)!)`, always an integer. Moving to `n + 1`
//!   multiplies by `(12n+2)(12n+6)(12n+10)` and divides by `(n+1)^3`.
//! - `power = c^n`.
//! - `linear = 13591409 + 545140134 n`.
//!
//! Seeding builds `ratio` from exact factorials, which costs `O(start)`
//! integer work once per block.

use log::debug;
use rug::Integer;

use super::{Recurrence, seed_index};
use crate::big::{BigValue, factorial};
use crate::error::{Error, Result};
use crate::precision::Precision;

const LINEAR_BASE: u64 = 13_591_409;
const LINEAR_STEP: u64 = 545_140_134;
/// `(-640320)^3`
const CUBE: i64 = -262_537_412_640_768_000;
const SCALE: u64 = 426_880;
const RADICAND: u64 = 10_005;

/// Chudnovsky recurrence engine.
#[derive(Debug, Clone)]
pub struct Chudnovsky {
    precision: Precision,
    /// `CUBE` at the engine precision, shared by seeding and every step.
    cube: BigValue,
}

/// Factorial ratio, cube power and linear term for the current index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChudnovskyState {
    pub(crate) ratio: BigValue,
    pub(crate) power: BigValue,
    pub(crate) linear: BigValue,
}

impl Chudnovsky {
    /// Engine computing at `precision`.
    pub fn new(precision: Precision) -> Self {
        Chudnovsky {
            precision,
            cube: BigValue::from_i64(precision, CUBE),
        }
    }
}

impl Recurrence for Chudnovsky {
    type State = ChudnovskyState;

    const NAME: &'static str = "Chudnovsky";

    fn precision(&self) -> Precision {
        self.precision
    }

    fn seed(&self, start: u64) -> Result<ChudnovskyState> {
        let k = seed_index(start)?;
        let numerator = factorial(6 * k);
        let mut denominator = factorial(k);
        denominator = Integer::from(&denominator * &denominator) * &denominator;
        denominator *= factorial(3 * k);
        debug!(
            "Chudnovsky seed at {start}: ratio has {} significant bits",
            numerator.significant_bits()
        );

        let mut linear = BigValue::from_u64(self.precision, LINEAR_STEP);
        linear.mul_u64(start);
        linear.add_u64(LINEAR_BASE);

        Ok(ChudnovskyState {
            ratio: BigValue::from_ratio(self.precision, &numerator, &denominator)?,
            power: self.cube.pow_u32(k),
            linear,
        })
    }

    fn term(&self, state: &ChudnovskyState, _n: u64) -> BigValue {
        let mut term = state.ratio.product(&state.linear);
        term.div_assign(&state.power);
        term
    }

    fn step(&self, state: &mut ChudnovskyState, n: u64) {
        let twelve_n = 12 * n;
        state.ratio.mul_u64(twelve_n + 2);
        state.ratio.mul_u64(twelve_n + 6);
        state.ratio.mul_u64(twelve_n + 10);
        for _ in 0..3 {
            state.ratio.div_u64(n + 1);
        }
        state.power.mul_assign(&self.cube);
        state.linear.add_u64(LINEAR_STEP);
    }

    fn close(&self, sum: BigValue) -> Result<BigValue> {
        if sum.is_zero() {
            return Err(Error::DivisionByZero(Self::NAME));
        }
        let mut pi = BigValue::from_u64(self.precision, RADICAND).sqrt();
        pi.mul_u64(SCALE);
        pi.div_assign(&sum);
        Ok(pi)
    }
}
