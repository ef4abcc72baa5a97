use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Deserialize;

/// Corporate action affecting a holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetEventKind {
    /// Return of capital on `amount` shares, reducing their cost by `value`.
    CapitalReturn {
        #[schemars(with = "String")]
        amount: Decimal,
        #[schemars(with = "String")]
        value: Decimal,
    },
    /// Accumulation dividend on `amount` shares, increasing their cost by `value`.
    Dividend {
        #[schemars(with = "String")]
        amount: Decimal,
        #[schemars(with = "String")]
        value: Decimal,
    },
    Split {
        #[schemars(with = "String")]
        multiplier: Decimal,
    },
    Unsplit {
        #[schemars(with = "String")]
        multiplier: Decimal,
    },
}

impl AssetEventKind {
    /// Change in share count across this event as (numerator, denominator).
    ///
    /// Kept as a fraction so an unsplit never goes through a rounded reciprocal.
    pub fn share_ratio(&self) -> (Decimal, Decimal) {
        match self {
            AssetEventKind::Split { multiplier } => (*multiplier, Decimal::ONE),
            AssetEventKind::Unsplit { multiplier } => (Decimal::ONE, *multiplier),
            AssetEventKind::CapitalReturn { .. } | AssetEventKind::Dividend { .. } => {
                (Decimal::ONE, Decimal::ONE)
            }
        }
    }

    /// Number of shares that `shares` becomes once this event takes effect
    pub fn restructured(&self, shares: Decimal) -> Decimal {
        let (numerator, denominator) = self.share_ratio();
        shares * numerator / denominator
    }

    pub fn is_restructure(&self) -> bool {
        matches!(self, AssetEventKind::Split { .. } | AssetEventKind::Unsplit { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEvent {
    pub kind: AssetEventKind,
    pub date: NaiveDate,
    pub asset: String,
}
