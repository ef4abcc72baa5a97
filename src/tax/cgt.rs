use crate::core::disposal::DisposalMatch;
use crate::core::input::CalculatorInput;
use crate::core::rounding::{round_expense, round_gain};
use crate::core::transaction::{Transaction, TransactionKind};
use crate::tax::matcher::{match_disposals, MatchError};
use crate::tax::uk::{RateTable, TaxYear, TaxYearRates};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CgtError {
    #[error("missing tax year rates for {0}")]
    MissingTaxYearRates(TaxYear),
    #[error("gift of {asset} on {date} has no shares to derive a unit price from")]
    ZeroDisposalAmount { asset: String, date: NaiveDate },
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// A single disposal with all of the matches that identify its shares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposalResult {
    pub disposal: Arc<Transaction>,
    pub disposal_matches: Vec<DisposalMatch>,
    net_gain: Decimal,
}

impl DisposalResult {
    pub fn new(
        disposal: Arc<Transaction>,
        disposal_matches: Vec<DisposalMatch>,
    ) -> Result<Self, CgtError> {
        if disposal.kind == TransactionKind::Gift && disposal.amount.is_zero() {
            return Err(CgtError::ZeroDisposalAmount {
                asset: disposal.asset.clone(),
                date: disposal.date,
            });
        }
        debug_assert!(disposal.kind != TransactionKind::Gift || disposal.expenses.is_zero());
        let net_gain = round_gain(disposal_matches.iter().map(DisposalMatch::gain).sum());
        Ok(DisposalResult {
            disposal,
            disposal_matches,
            net_gain,
        })
    }

    /// Gain less costs, negative for a loss
    pub fn net_gain(&self) -> Decimal {
        self.net_gain
    }

    /// Net gain, or zero for a loss
    pub fn gain(&self) -> Decimal {
        self.net_gain.max(Decimal::ZERO)
    }

    /// Net loss as a positive amount, or zero for a gain
    pub fn loss(&self) -> Decimal {
        (-self.net_gain).max(Decimal::ZERO)
    }

    /// Acquisition costs (with their expenses) plus the disposal's own expenses
    pub fn allowable_costs(&self) -> Decimal {
        self.disposal_matches
            .iter()
            .map(DisposalMatch::acquisition_cost_including_expenses)
            .fold(self.disposal.expenses, |total, cost| total + cost)
    }

    /// Proceeds before any expenses are deducted
    pub fn gross_proceeds(&self) -> Decimal {
        self.disposal_matches
            .iter()
            .map(DisposalMatch::gross_disposal_proceeds)
            .sum()
    }

    pub fn is_gift(&self) -> bool {
        self.disposal.kind == TransactionKind::Gift
    }

    /// Gifts have no sale price, so theirs is derived from the proceeds
    pub fn disposal_unit_price(&self) -> Decimal {
        if self.is_gift() {
            self.gross_proceeds()
                .checked_div(self.disposal.amount)
                .unwrap_or(Decimal::ZERO)
        } else {
            self.disposal.price
        }
    }
}

/// Totals for one tax year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxYearSummary {
    pub tax_year: TaxYear,
    /// Net gain: gains less losses
    pub gain: Decimal,
    pub proceeds: Decimal,
    pub number_of_disposals: usize,
    pub total_allowable_costs: Decimal,
    pub total_gains_before_losses: Decimal,
    pub total_losses: Decimal,
    pub exemption: Decimal,
    /// Losses left to carry into the following year
    pub carry_forward_loss: Decimal,
    pub taxable_gain: Decimal,
    pub basic_rate_tax: Decimal,
    pub higher_rate_tax: Decimal,
    pub disposal_results: Vec<DisposalResult>,
}

/// Input together with the per-year summaries computed from it
#[derive(Debug, Clone)]
pub struct CalculatorResult {
    pub input: CalculatorInput,
    pub tax_year_summaries: Vec<TaxYearSummary>,
}

/// Match every disposal in `input` and summarise the result by tax year
pub fn calculate(input: CalculatorInput, rates: &RateTable) -> Result<CalculatorResult, CgtError> {
    let matches = match_disposals(&input.transactions, &input.asset_events)?;
    let tax_year_summaries = summarise(matches, rates)?;
    Ok(CalculatorResult {
        input,
        tax_year_summaries,
    })
}

/// Aggregate disposal matches into one summary per tax year, oldest first.
///
/// Losses carried forward from each year feed into the next, so years are
/// folded strictly in order.
pub fn summarise<I>(matches: I, rates: &RateTable) -> Result<Vec<TaxYearSummary>, CgtError>
where
    I: IntoIterator<Item = DisposalMatch>,
{
    let (_, summaries) = group_by(matches, DisposalMatch::tax_year)
        .into_iter()
        .try_fold(
            (Decimal::ZERO, Vec::new()),
            |(carry_forward_loss, mut summaries), (tax_year, matches)| {
                let year_rates = rates
                    .get(tax_year)
                    .ok_or(CgtError::MissingTaxYearRates(tax_year))?;
                let (carry_forward_loss, summary) =
                    summarise_year(tax_year, matches, year_rates, carry_forward_loss)?;
                summaries.push(summary);
                Ok::<_, CgtError>((carry_forward_loss, summaries))
            },
        )?;
    Ok(summaries)
}

fn summarise_year(
    tax_year: TaxYear,
    matches: Vec<DisposalMatch>,
    rates: &TaxYearRates,
    carry_forward_loss: Decimal,
) -> Result<(Decimal, TaxYearSummary), CgtError> {
    let mut disposal_results = Vec::new();
    for (_, matches) in group_by(matches, DisposalMatch::disposal_id) {
        let Some(first) = matches.first() else {
            continue;
        };
        let disposal = Arc::clone(&first.disposal.transaction);
        disposal_results.push(DisposalResult::new(disposal, matches)?);
    }
    disposal_results.sort_by(|a, b| {
        (a.disposal.date, &a.disposal.asset).cmp(&(b.disposal.date, &b.disposal.asset))
    });

    let total_gains_before_losses: Decimal = disposal_results.iter().map(|d| d.gain()).sum();
    let total_losses: Decimal = disposal_results.iter().map(|d| d.loss()).sum();
    let gain = total_gains_before_losses - total_losses;
    let proceeds: Decimal = disposal_results.iter().map(|d| d.gross_proceeds()).sum();
    let allowable_costs: Decimal = disposal_results.iter().map(|d| d.allowable_costs()).sum();

    let (taxable_gain, carry_forward_loss) =
        apply_exemption_and_losses(gain, rates.exemption, carry_forward_loss);
    let basic_rate_tax = round_gain(taxable_gain * rates.basic_rate / Decimal::ONE_HUNDRED);
    let higher_rate_tax = round_gain(taxable_gain * rates.higher_rate / Decimal::ONE_HUNDRED);

    log::info!(
        "{}: {} disposals, net gain {}, taxable {}, loss carried forward {}",
        tax_year,
        disposal_results.len(),
        gain,
        taxable_gain,
        carry_forward_loss
    );

    let summary = TaxYearSummary {
        tax_year,
        gain,
        proceeds: round_gain(proceeds),
        number_of_disposals: disposal_results.len(),
        total_allowable_costs: round_expense(allowable_costs),
        total_gains_before_losses,
        total_losses,
        exemption: rates.exemption,
        carry_forward_loss,
        taxable_gain,
        basic_rate_tax,
        higher_rate_tax,
        disposal_results,
    };
    Ok((carry_forward_loss, summary))
}

/// Returns the taxable gain and the loss left to carry forward.
///
/// Carried losses only reduce gains above the annual exemption, and the
/// exemption itself is never carried.
pub fn apply_exemption_and_losses(
    gain: Decimal,
    exemption: Decimal,
    carry_forward_loss: Decimal,
) -> (Decimal, Decimal) {
    let gain_above_exemption = (gain - exemption).max(Decimal::ZERO);
    if gain_above_exemption > Decimal::ZERO {
        let loss_used = gain_above_exemption.min(carry_forward_loss);
        (gain_above_exemption - loss_used, carry_forward_loss - loss_used)
    } else if gain < Decimal::ZERO {
        (Decimal::ZERO, carry_forward_loss - gain)
    } else {
        (Decimal::ZERO, carry_forward_loss)
    }
}

fn group_by<K, I, F>(matches: I, key: F) -> BTreeMap<K, Vec<DisposalMatch>>
where
    K: Ord,
    I: IntoIterator<Item = DisposalMatch>,
    F: Fn(&DisposalMatch) -> K,
{
    let mut groups: BTreeMap<K, Vec<DisposalMatch>> = BTreeMap::new();
    for m in matches {
        groups.entry(key(&m)).or_default().push(m);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::disposal::tests::tx;
    use crate::core::disposal::MatchKind;
    use crate::core::transaction::TransactionToMatch;
    use rust_decimal_macros::dec;

    fn rates() -> RateTable {
        [
            (TaxYear(2020), TaxYearRates::new(dec!(12000), dec!(10), dec!(20))),
            (TaxYear(2021), TaxYearRates::new(dec!(12300), dec!(10), dec!(20))),
            (TaxYear(2022), TaxYearRates::new(dec!(12300), dec!(10), dec!(20))),
        ]
        .into_iter()
        .collect()
    }

    fn pool_sale(
        id: usize,
        date: &str,
        asset: &str,
        amount: Decimal,
        price: Decimal,
        expenses: Decimal,
        cost_basis: Decimal,
    ) -> DisposalMatch {
        let sale = tx(id, TransactionKind::Sell, date, asset, amount, price, expenses);
        DisposalMatch::new(
            MatchKind::Section104 {
                pool_amount: amount,
                cost_basis,
            },
            TransactionToMatch::new(sale),
        )
    }

    #[test]
    fn single_pool_disposal() {
        let m = pool_sale(1, "2019-06-01", "FOO", dec!(100), dec!(7), dec!(10), dec!(5.00));
        let summaries = summarise(vec![m], &rates()).unwrap();

        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.tax_year, TaxYear(2020));
        assert_eq!(summary.number_of_disposals, 1);
        assert_eq!(summary.gain, dec!(190));
        assert_eq!(summary.proceeds, dec!(700));
        assert_eq!(summary.total_allowable_costs, dec!(510));
        assert_eq!(summary.taxable_gain, Decimal::ZERO);
        assert_eq!(summary.carry_forward_loss, Decimal::ZERO);
    }

    #[test]
    fn gift_disposal_result() {
        let purchase = tx(1, TransactionKind::Buy, "2019-06-01", "FOO", dec!(50), dec!(6), dec!(0));
        let gift = tx(2, TransactionKind::Gift, "2019-06-01", "FOO", dec!(50), dec!(0), dec!(0));
        let m = DisposalMatch::new(
            MatchKind::SameDay(TransactionToMatch::new(purchase)),
            TransactionToMatch::new(Arc::clone(&gift)),
        );
        let result = DisposalResult::new(gift, vec![m]).unwrap();

        assert_eq!(result.gross_proceeds(), dec!(300));
        assert_eq!(result.gain(), Decimal::ZERO);
        assert_eq!(result.loss(), Decimal::ZERO);
        assert_eq!(result.disposal_unit_price(), dec!(6.00));
    }

    #[test]
    fn gift_of_zero_shares_is_rejected() {
        let gift = tx(2, TransactionKind::Gift, "2019-06-01", "FOO", dec!(0), dec!(0), dec!(0));
        let err = DisposalResult::new(gift, vec![]).unwrap_err();
        assert!(matches!(err, CgtError::ZeroDisposalAmount { .. }));
    }

    #[test]
    fn sale_unit_price_is_transaction_price() {
        let m = pool_sale(1, "2019-06-01", "FOO", dec!(100), dec!(7.25), dec!(0), dec!(5));
        let sale = Arc::clone(&m.disposal.transaction);
        let result = DisposalResult::new(sale, vec![m]).unwrap();
        assert_eq!(result.disposal_unit_price(), dec!(7.25));
    }

    #[test]
    fn disposal_net_gain_rounded_down_before_split() {
        // 100 * 1.005 - 100 * 1.01 = -0.5, rounds down to a loss of 1
        let m = pool_sale(1, "2019-06-01", "FOO", dec!(100), dec!(1.005), dec!(0), dec!(1.01));
        let sale = Arc::clone(&m.disposal.transaction);
        let result = DisposalResult::new(sale, vec![m]).unwrap();
        assert_eq!(result.gain(), Decimal::ZERO);
        assert_eq!(result.loss(), dec!(1));
    }

    #[test]
    fn matches_for_one_disposal_are_combined() {
        let sale = tx(7, TransactionKind::Sell, "2019-06-01", "FOO", dec!(20), dec!(10), dec!(4));
        let mut disposal = TransactionToMatch::new(Arc::clone(&sale));
        let purchase = tx(6, TransactionKind::Buy, "2019-06-01", "FOO", dec!(5), dec!(8), dec!(1));

        let same_day = DisposalMatch::new(
            MatchKind::SameDay(TransactionToMatch::new(purchase)),
            disposal.split_off(dec!(5)),
        );
        let pooled = DisposalMatch::new(
            MatchKind::Section104 {
                pool_amount: dec!(100),
                cost_basis: dec!(12),
            },
            disposal.split_off(dec!(15)),
        );

        let summaries = summarise(vec![pooled, same_day], &rates()).unwrap();
        let summary = &summaries[0];
        assert_eq!(summary.number_of_disposals, 1);

        let result = &summary.disposal_results[0];
        assert_eq!(result.disposal_matches.len(), 2);
        assert_eq!(result.gross_proceeds(), dec!(200));
        // 4 disposal expenses + (40 + 1) same day + 180 pool
        assert_eq!(result.allowable_costs(), dec!(225));
        assert_eq!(result.loss(), dec!(25));
        assert_eq!(summary.total_losses, dec!(25));
        assert_eq!(summary.carry_forward_loss, dec!(25));
    }

    #[test]
    fn results_sorted_by_date_then_asset() {
        let matches = vec![
            pool_sale(1, "2019-08-01", "AAA", dec!(1), dec!(2), dec!(0), dec!(1)),
            pool_sale(2, "2019-07-01", "ZZZ", dec!(1), dec!(2), dec!(0), dec!(1)),
            pool_sale(3, "2019-07-01", "BBB", dec!(1), dec!(2), dec!(0), dec!(1)),
            pool_sale(4, "2019-06-01", "CCC", dec!(1), dec!(2), dec!(0), dec!(1)),
        ];
        let summaries = summarise(matches, &rates()).unwrap();
        let order: Vec<_> = summaries[0]
            .disposal_results
            .iter()
            .map(|d| (d.disposal.date.to_string(), d.disposal.asset.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2019-06-01".to_string(), "CCC".to_string()),
                ("2019-07-01".to_string(), "BBB".to_string()),
                ("2019-07-01".to_string(), "ZZZ".to_string()),
                ("2019-08-01".to_string(), "AAA".to_string()),
            ]
        );
    }

    #[test]
    fn losses_carry_forward_across_years() {
        let matches = vec![
            // 2022: gain of 13100, 800 above the exemption
            pool_sale(3, "2021-06-01", "FOO", dec!(100), dec!(231), dec!(0), dec!(100)),
            // 2020: loss of 2000
            pool_sale(1, "2019-06-01", "FOO", dec!(100), dec!(10), dec!(0), dec!(30)),
            // 2021: gain of 13800, 1500 above the exemption
            pool_sale(2, "2020-06-01", "FOO", dec!(1000), dec!(20.8), dec!(0), dec!(7)),
        ];
        let summaries = summarise(matches, &rates()).unwrap();
        assert_eq!(summaries.len(), 3);

        let years: Vec<_> = summaries.iter().map(|s| s.tax_year).collect();
        assert_eq!(years, vec![TaxYear(2020), TaxYear(2021), TaxYear(2022)]);

        assert_eq!(summaries[0].gain, dec!(-2000));
        assert_eq!(summaries[0].taxable_gain, Decimal::ZERO);
        assert_eq!(summaries[0].carry_forward_loss, dec!(2000));

        assert_eq!(summaries[1].gain, dec!(13800));
        assert_eq!(summaries[1].taxable_gain, Decimal::ZERO);
        assert_eq!(summaries[1].carry_forward_loss, dec!(500));

        assert_eq!(summaries[2].gain, dec!(13100));
        assert_eq!(summaries[2].taxable_gain, dec!(300));
        assert_eq!(summaries[2].carry_forward_loss, Decimal::ZERO);
        assert_eq!(summaries[2].basic_rate_tax, dec!(30));
        assert_eq!(summaries[2].higher_rate_tax, dec!(60));
    }

    #[test]
    fn exemption_is_not_carried_forward() {
        assert_eq!(
            apply_exemption_and_losses(dec!(5000), dec!(12000), dec!(0)),
            (Decimal::ZERO, Decimal::ZERO)
        );
        assert_eq!(
            apply_exemption_and_losses(dec!(5000), dec!(12000), dec!(700)),
            (Decimal::ZERO, dec!(700))
        );
    }

    #[test]
    fn losses_used_only_above_exemption() {
        assert_eq!(
            apply_exemption_and_losses(dec!(3500), dec!(3000), dec!(2000)),
            (Decimal::ZERO, dec!(1500))
        );
        assert_eq!(
            apply_exemption_and_losses(dec!(8000), dec!(3000), dec!(2000)),
            (dec!(3000), Decimal::ZERO)
        );
    }

    #[test]
    fn carry_forward_never_negative() {
        let gains = [dec!(-500), dec!(20000), dec!(-1), dec!(0), dec!(15000), dec!(-30000)];
        let mut carry = Decimal::ZERO;
        for gain in gains {
            let (taxable, next) = apply_exemption_and_losses(gain, dec!(12300), carry);
            assert!(taxable >= Decimal::ZERO);
            assert!(next >= Decimal::ZERO);
            carry = next;
        }
        assert_eq!(carry, dec!(30000));
    }

    #[test]
    fn tax_rounded_down() {
        // 24355.55 gain rounds to 24355, leaving 12355 above the exemption
        let matches = vec![pool_sale(1, "2019-06-01", "FOO", dec!(1), dec!(24355.55), dec!(0), dec!(0))];
        let summaries = summarise(matches, &rates()).unwrap();
        let summary = &summaries[0];
        assert_eq!(summary.gain, dec!(24355));
        assert_eq!(summary.taxable_gain, dec!(12355));
        assert_eq!(summary.basic_rate_tax, dec!(1235));
        assert_eq!(summary.higher_rate_tax, dec!(2471));
    }

    #[test]
    fn proceeds_round_down_costs_round_up() {
        let matches = vec![pool_sale(1, "2019-06-01", "FOO", dec!(10), dec!(10.07), dec!(0.2), dec!(5))];
        let summaries = summarise(matches, &rates()).unwrap();
        assert_eq!(summaries[0].proceeds, dec!(100));
        assert_eq!(summaries[0].total_allowable_costs, dec!(51));
    }

    #[test]
    fn missing_rates_is_fatal() {
        let matches = vec![
            pool_sale(1, "2019-06-01", "FOO", dec!(1), dec!(2), dec!(0), dec!(1)),
            pool_sale(2, "2030-06-01", "FOO", dec!(1), dec!(2), dec!(0), dec!(1)),
        ];
        let err = summarise(matches, &rates()).unwrap_err();
        assert_eq!(err, CgtError::MissingTaxYearRates(TaxYear(2031)));
        assert_eq!(err.to_string(), "missing tax year rates for 2030/31");
    }

    #[test]
    fn resummarising_constituent_matches_is_stable() {
        let matches = vec![
            pool_sale(1, "2019-06-01", "FOO", dec!(100), dec!(10), dec!(3), dec!(30)),
            pool_sale(2, "2020-06-01", "BAR", dec!(1000), dec!(20.8), dec!(12.5), dec!(7)),
            pool_sale(3, "2020-09-01", "FOO", dec!(10), dec!(2), dec!(0), dec!(3)),
        ];
        let first = summarise(matches, &rates()).unwrap();
        let again: Vec<DisposalMatch> = first
            .iter()
            .flat_map(|s| s.disposal_results.iter())
            .flat_map(|d| d.disposal_matches.iter().cloned())
            .collect();
        let second = summarise(again, &rates()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_has_no_summaries() {
        let summaries = summarise(Vec::new(), &rates()).unwrap();
        assert!(summaries.is_empty());
    }
}
