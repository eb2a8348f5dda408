//! Account collaborator views: account values and open positions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::Symbol;
use crate::{Price, Size};

/// Account values read once per decision cycle.
///
/// `unavailable()` is the typed fallback for a failed account read. It has a
/// zero NAV so that sizing degrades to HOLD, and `is_valid()` returns false so
/// the session baseline is never captured from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Net liquidation value.
    pub nav: Price,
    pub margin_excess: Price,
    pub gross_position_value: Price,
    /// Special memorandum account balance.
    pub sma: Price,
    pub buying_power: Price,
    #[serde(skip, default = "valid_default")]
    valid: bool,
}

fn valid_default() -> bool {
    true
}

impl AccountState {
    #[must_use]
    pub fn new(
        nav: Price,
        margin_excess: Price,
        gross_position_value: Price,
        sma: Price,
        buying_power: Price,
    ) -> Self {
        Self {
            nav,
            margin_excess,
            gross_position_value,
            sma,
            buying_power,
            valid: true,
        }
    }

    /// Placeholder for a failed account read.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            nav: Price::ZERO,
            margin_excess: Price::ZERO,
            gross_position_value: Price::ZERO,
            sma: Price::ZERO,
            buying_power: Price::ZERO,
            valid: false,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid && !self.nav.inner().is_sign_negative()
    }

    /// Fraction of margin capacity in use: gross / (excess + gross).
    ///
    /// Returns zero when the denominator is not positive.
    #[must_use]
    pub fn margin_usage(&self) -> Decimal {
        let denom = self.margin_excess.inner() + self.gross_position_value.inner();
        if denom <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.gross_position_value.inner() / denom
    }
}

/// Open position reported by the account collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    /// Signed quantity: positive = long, negative = short.
    pub qty: Size,
    pub avg_price: Price,
}

impl Position {
    #[must_use]
    pub fn new(symbol: Symbol, qty: Size, avg_price: Price) -> Self {
        Self {
            symbol,
            qty,
            avg_price,
        }
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.qty.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(excess: Decimal, gross: Decimal) -> AccountState {
        AccountState::new(
            Price::new(dec!(100000)),
            Price::new(excess),
            Price::new(gross),
            Price::new(dec!(20000)),
            Price::new(dec!(200000)),
        )
    }

    #[test]
    fn test_margin_usage() {
        let acct = account(dec!(90000), dec!(10000));
        assert_eq!(acct.margin_usage(), dec!(0.1));
    }

    #[test]
    fn test_margin_usage_zero_denominator() {
        let acct = account(dec!(0), dec!(0));
        assert_eq!(acct.margin_usage(), Decimal::ZERO);
    }

    #[test]
    fn test_unavailable_is_invalid_with_zero_nav() {
        let acct = AccountState::unavailable();
        assert!(!acct.is_valid());
        assert!(acct.nav.is_zero());
    }

    #[test]
    fn test_deserialized_account_is_valid() {
        let json = r#"{"nav":"1000","margin_excess":"900","gross_position_value":"100","sma":"50","buying_power":"4000"}"#;
        let acct: AccountState = serde_json::from_str(json).unwrap();
        assert!(acct.is_valid());
    }
}
