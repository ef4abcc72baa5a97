use crate::core::transaction::{TransactionKind, TransactionToMatch};
use crate::tax::uk::TaxYear;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Which HMRC identification rule produced a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKind {
    /// Acquisition on the same day as the disposal
    SameDay(TransactionToMatch),
    /// Acquisition within 30 days after the disposal
    BedAndBreakfast(TransactionToMatch),
    /// Section 104 holding: pool amount at disposal and cost basis per share
    Section104 {
        pool_amount: Decimal,
        cost_basis: Decimal,
    },
}

impl MatchKind {
    pub fn display(&self) -> &'static str {
        match self {
            MatchKind::SameDay(_) => "SAME DAY",
            MatchKind::BedAndBreakfast(_) => "BED & BREAKFAST",
            MatchKind::Section104 { .. } => "SECTION 104",
        }
    }
}

/// One slice of a disposal identified against one acquisition or the pool.
///
/// Everything but the three stored fields is derived on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposalMatch {
    pub kind: MatchKind,
    pub disposal: TransactionToMatch,
    pub restructure_multiplier: Decimal,
}

impl DisposalMatch {
    pub fn new(kind: MatchKind, disposal: TransactionToMatch) -> Self {
        DisposalMatch {
            kind,
            disposal,
            restructure_multiplier: Decimal::ONE,
        }
    }

    pub fn with_restructure_multiplier(mut self, multiplier: Decimal) -> Self {
        self.restructure_multiplier = multiplier;
        self
    }

    pub fn asset(&self) -> &str {
        self.disposal.asset()
    }

    pub fn date(&self) -> NaiveDate {
        self.disposal.date()
    }

    pub fn tax_year(&self) -> TaxYear {
        TaxYear::from_date(self.date())
    }

    /// Identity of the physical disposal this match belongs to
    pub fn disposal_id(&self) -> usize {
        self.disposal.transaction.id
    }

    pub fn is_gift(&self) -> bool {
        self.disposal.kind() == TransactionKind::Gift
    }

    pub fn acquisition_cost_including_expenses(&self) -> Decimal {
        match &self.kind {
            MatchKind::SameDay(acquisition) | MatchKind::BedAndBreakfast(acquisition) => {
                acquisition.value() + acquisition.expenses
            }
            MatchKind::Section104 { cost_basis, .. } => self.disposal.amount * *cost_basis,
        }
    }

    /// Gifts are treated as disposed of at cost, so their gain nets to zero.
    pub fn gross_disposal_proceeds(&self) -> Decimal {
        if self.is_gift() {
            self.acquisition_cost_including_expenses()
        } else {
            self.disposal.value()
        }
    }

    /// Signed gain for this slice; negative is a loss
    pub fn gain(&self) -> Decimal {
        self.gross_disposal_proceeds()
            - self.disposal.expenses
            - self.acquisition_cost_including_expenses()
    }
}
