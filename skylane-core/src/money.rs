use serde::{Deserialize, Serialize};
use std::fmt;

/// Exact fixed-point amount: integer minor units plus a currency code.
/// Fares multiplied by passenger counts stay exact, no rounding drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: String,
}

impl Money {
    pub fn new(amount_minor: i64, currency: &str) -> Self {
        Self {
            amount_minor,
            currency: currency.to_string(),
        }
    }

    /// Multiply by a passenger count.
    pub fn times(&self, n: u32) -> Money {
        Money {
            amount_minor: self.amount_minor * i64::from(n),
            currency: self.currency.clone(),
        }
    }

    /// Two-decimal string the payment provider expects, e.g. "400.00".
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.amount_minor / 100, (self.amount_minor % 100).abs())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}
