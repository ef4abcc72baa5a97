use rust_decimal::{Decimal, RoundingStrategy};

/// Round a gain, loss or tax amount down to whole pounds.
pub fn round_gain(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::ToNegativeInfinity)
}

/// Round a cost up to whole pounds.
pub fn round_expense(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::ToPositiveInfinity)
}
