//! ALGO / micro-ALGO conversions.
//!
//! Ticket prices are configured in ALGO (the display unit) while the chain
//! node reports payment amounts as integer micro-ALGO. All conversions go
//! through [`rust_decimal::Decimal`] so that prices such as `0.1` map to
//! exactly `100_000` micro-ALGO.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Number of micro-ALGO in one ALGO.
pub const MICRO_ALGOS_PER_ALGO: u64 = 1_000_000;

/// Decimal places of the micro-ALGO unit.
const MICRO_ALGO_SCALE: u32 = 6;

/// An amount in the chain's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MicroAlgos(u64);

impl MicroAlgos {
    /// Wraps a raw micro-ALGO amount.
    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    /// Returns the raw micro-ALGO amount.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Converts an ALGO amount to micro-ALGO.
    ///
    /// Fractions below one micro-ALGO are rounded up so a payer can never
    /// settle a price with less than it states. Returns `None` for negative
    /// amounts or amounts that do not fit in a `u64`.
    #[must_use]
    pub fn from_algos(algos: Decimal) -> Option<Self> {
        if algos.is_sign_negative() {
            return None;
        }
        let micro = algos.checked_mul(Decimal::from(MICRO_ALGOS_PER_ALGO))?.ceil();
        micro.to_u64().map(Self)
    }

    /// Converts to ALGO with exactly six decimal places.
    #[must_use]
    pub fn to_algos(self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), MICRO_ALGO_SCALE).normalize()
    }
}

impl fmt::Display for MicroAlgos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} µALGO", self.0)
    }
}

impl From<u64> for MicroAlgos {
    fn from(amount: u64) -> Self {
        Self(amount)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        let Ok(d) = Decimal::from_str(s) else {
            panic!("invalid decimal literal {s}");
        };
        d
    }

    #[test]
    fn whole_algos_convert_exactly() {
        assert_eq!(MicroAlgos::from_algos(dec("5")), Some(MicroAlgos::new(5_000_000)));
    }

    #[test]
    fn fractional_price_has_no_float_drift() {
        assert_eq!(MicroAlgos::from_algos(dec("0.1")), Some(MicroAlgos::new(100_000)));
        assert_eq!(MicroAlgos::from_algos(dec("2.5")), Some(MicroAlgos::new(2_500_000)));
    }

    #[test]
    fn sub_micro_fraction_rounds_up() {
        assert_eq!(
            MicroAlgos::from_algos(dec("1.0000001")),
            Some(MicroAlgos::new(1_000_001))
        );
    }

    #[test]
    fn negative_price_is_rejected() {
        assert_eq!(MicroAlgos::from_algos(dec("-1")), None);
    }

    #[test]
    fn to_algos_keeps_micro_precision() {
        assert_eq!(MicroAlgos::new(4_999_999).to_algos(), dec("4.999999"));
        assert_eq!(MicroAlgos::new(5_000_000).to_algos(), dec("5"));
        assert_eq!(MicroAlgos::new(0).to_algos(), Decimal::ZERO);
    }
}
