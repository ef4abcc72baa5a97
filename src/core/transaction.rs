use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

/// Kind of share transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Buy,
    Sell,
    Gift,
}

impl TransactionKind {
    pub fn is_disposal(self) -> bool {
        matches!(self, TransactionKind::Sell | TransactionKind::Gift)
    }

    pub fn display(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::Gift => "GIFT",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// A single trade of an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Sequential identifier assigned when the input is read
    pub id: usize,
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub asset: String,
    pub amount: Decimal,
    pub price: Decimal,
    pub expenses: Decimal,
}

impl Transaction {
    /// Gross consideration before expenses
    pub fn value(&self) -> Decimal {
        self.amount * self.price
    }
}

/// The part of a transaction taking part in a single match.
///
/// Expenses are apportioned by amount. `offset` carries corporate action
/// value attributed to this slice and is folded into `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionToMatch {
    pub transaction: Arc<Transaction>,
    pub amount: Decimal,
    pub price: Decimal,
    pub expenses: Decimal,
    pub offset: Decimal,
}

impl TransactionToMatch {
    pub fn new(transaction: Arc<Transaction>) -> Self {
        TransactionToMatch {
            amount: transaction.amount,
            price: transaction.price,
            expenses: transaction.expenses,
            offset: Decimal::ZERO,
            transaction,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.transaction.kind
    }

    pub fn date(&self) -> NaiveDate {
        self.transaction.date
    }

    pub fn asset(&self) -> &str {
        &self.transaction.asset
    }

    pub fn value(&self) -> Decimal {
        self.amount * self.price + self.offset
    }

    /// Split `amount` off this slice, returning the split part.
    ///
    /// Expenses and offset move proportionally; taking the whole remaining
    /// amount moves the exact remainder so no residue is left behind.
    pub fn split_off(&mut self, amount: Decimal) -> TransactionToMatch {
        debug_assert!(amount <= self.amount);
        if amount >= self.amount {
            let taken = self.clone();
            self.amount = Decimal::ZERO;
            self.expenses = Decimal::ZERO;
            self.offset = Decimal::ZERO;
            return taken;
        }
        let expenses = self.expenses * amount / self.amount;
        let offset = self.offset * amount / self.amount;
        self.amount -= amount;
        self.expenses -= expenses;
        self.offset -= offset;
        TransactionToMatch {
            transaction: Arc::clone(&self.transaction),
            amount,
            price: self.price,
            expenses,
            offset,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.amount.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn buy(amount: Decimal, price: Decimal, expenses: Decimal) -> Arc<Transaction> {
        Arc::new(Transaction {
            id: 0,
            kind: TransactionKind::Buy,
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            asset: "FOO".to_string(),
            amount,
            price,
            expenses,
        })
    }

    #[test]
    fn value_excludes_expenses() {
        let tx = buy(dec!(100), dec!(5), dec!(10));
        assert_eq!(tx.value(), dec!(500));
        assert_eq!(TransactionToMatch::new(tx).value(), dec!(500));
    }

    #[test]
    fn offset_is_added_to_value() {
        let mut slice = TransactionToMatch::new(buy(dec!(10), dec!(2), dec!(0)));
        slice.offset = dec!(-3);
        assert_eq!(slice.value(), dec!(17));
    }

    #[test]
    fn split_off_apportions_expenses() {
        let mut slice = TransactionToMatch::new(buy(dec!(100), dec!(5), dec!(10)));
        let part = slice.split_off(dec!(25));
        assert_eq!(part.amount, dec!(25));
        assert_eq!(part.expenses, dec!(2.5));
        assert_eq!(slice.amount, dec!(75));
        assert_eq!(slice.expenses, dec!(7.5));
    }

    #[test]
    fn split_off_remainder_is_exact() {
        let mut slice = TransactionToMatch::new(buy(dec!(3), dec!(1), dec!(1)));
        let a = slice.split_off(dec!(1));
        let b = slice.split_off(dec!(1));
        let c = slice.split_off(dec!(1));
        assert!(slice.is_exhausted());
        assert_eq!(a.expenses + b.expenses + c.expenses, dec!(1));
    }

    #[test]
    fn disposal_kinds() {
        assert!(TransactionKind::Sell.is_disposal());
        assert!(TransactionKind::Gift.is_disposal());
        assert!(!TransactionKind::Buy.is_disposal());
    }
}
