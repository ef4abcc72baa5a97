//! Report command - full text report of every tax year and disposal

use crate::cmd::{format_gbp, format_gbp_dp, InputArgs};
use crate::core::{AssetEventKind, DisposalMatch, MatchKind, TransactionKind};
use crate::tax::{CalculatorResult, DisposalResult, TaxYear, TaxYearSummary};
use clap::Args;
use rust_decimal::Decimal;
use std::fmt::Write;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Args, Debug)]
pub struct ReportCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Only show details for this tax year (e.g., 2025 for 2024/25)
    #[arg(short, long)]
    year: Option<i32>,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let result = self.input.calculate()?;
        print!("{}", render(&result, self.year.map(TaxYear)));
        Ok(())
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Tax year")]
    tax_year: String,
    #[tabled(rename = "No. Disposals")]
    disposals: usize,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Allowable Costs")]
    allowable_costs: String,
    #[tabled(rename = "Gain b/f Losses")]
    gains_before_losses: String,
    #[tabled(rename = "Losses")]
    losses: String,
    #[tabled(rename = "Net Gain")]
    net_gain: String,
    #[tabled(rename = "Exemption")]
    exemption: String,
    #[tabled(rename = "Loss carry")]
    carry_forward_loss: String,
    #[tabled(rename = "Taxable gain")]
    taxable_gain: String,
    #[tabled(rename = "Tax (basic)")]
    basic_rate_tax: String,
    #[tabled(rename = "Tax (higher)")]
    higher_rate_tax: String,
}

impl From<&TaxYearSummary> for SummaryRow {
    fn from(summary: &TaxYearSummary) -> Self {
        SummaryRow {
            tax_year: summary.tax_year.display(),
            disposals: summary.number_of_disposals,
            proceeds: format_gbp(summary.proceeds),
            allowable_costs: format_gbp(summary.total_allowable_costs),
            gains_before_losses: format_gbp(summary.total_gains_before_losses),
            losses: format_gbp(summary.total_losses),
            net_gain: format_gbp(summary.gain),
            exemption: format_gbp(summary.exemption),
            carry_forward_loss: format_gbp(summary.carry_forward_loss),
            taxable_gain: format_gbp(summary.taxable_gain),
            basic_rate_tax: format_gbp(summary.basic_rate_tax),
            higher_rate_tax: format_gbp(summary.higher_rate_tax),
        }
    }
}

/// Render the report. Summaries are always shown in full; `year` limits the details.
pub fn render(result: &CalculatorResult, year: Option<TaxYear>) -> String {
    let mut out = String::new();
    out.push_str("# SUMMARY\n\n");
    out.push_str(&summary_table(&result.tax_year_summaries));
    out.push_str("\n\n# TAX YEAR DETAILS\n\n");
    for summary in result
        .tax_year_summaries
        .iter()
        .filter(|s| year.is_none_or(|y| s.tax_year == y))
    {
        write_tax_year(&mut out, summary);
    }
    out.push_str("# TRANSACTIONS\n\n");
    write_transactions(&mut out, result);
    out.push_str("\n# ASSET EVENTS\n\n");
    write_asset_events(&mut out, result);
    out
}

fn summary_table(summaries: &[TaxYearSummary]) -> String {
    if summaries.is_empty() {
        return "NONE".to_string();
    }
    let rows: Vec<SummaryRow> = summaries.iter().map(SummaryRow::from).collect();
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string()
}

fn write_tax_year(out: &mut String, summary: &TaxYearSummary) {
    let _ = writeln!(out, "## TAX YEAR {}\n", summary.tax_year);
    for (i, result) in summary.disposal_results.iter().enumerate() {
        let disposal = &result.disposal;
        let _ = write!(
            out,
            "{}) {} {} shares of {} at {} per share on {} for ",
            i + 1,
            disposal.kind,
            disposal.amount,
            disposal.asset,
            format_gbp_dp(result.disposal_unit_price(), 5),
            disposal.date.format(DATE_FORMAT)
        );
        if !result.loss().is_zero() {
            let _ = writeln!(out, "LOSS of {}", format_gbp(result.loss()));
        } else if !result.gain().is_zero() {
            let _ = writeln!(out, "GAIN of {}", format_gbp(result.gain()));
        } else {
            out.push_str("NO NET GAIN\n");
        }
        out.push_str("\nMatches with holding(s):\n");
        for m in &result.disposal_matches {
            let _ = writeln!(out, "  • {}", match_details(m));
        }
        let _ = writeln!(out, "\nCalculation: {}", calculation(result));
        out.push_str("\n________________________________________\n\n");
    }
}

fn match_details(m: &DisposalMatch) -> String {
    match &m.kind {
        MatchKind::SameDay(acquisition) | MatchKind::BedAndBreakfast(acquisition) => {
            let mut details = format!(
                "{}: {} shares bought on {} at {}",
                m.kind.display(),
                acquisition.amount,
                acquisition.date().format(DATE_FORMAT),
                format_gbp(acquisition.price)
            );
            if !acquisition.offset.is_zero() {
                let _ = write!(details, " with offset of {}", format_gbp(acquisition.offset));
            }
            if m.restructure_multiplier != Decimal::ONE {
                let _ = write!(
                    details,
                    " with restructure multiplier {}",
                    m.restructure_multiplier
                );
            }
            details
        }
        MatchKind::Section104 {
            pool_amount,
            cost_basis,
        } => format!(
            "{}: {} shares at cost basis of {}",
            m.kind.display(),
            pool_amount,
            format_gbp_dp(*cost_basis, 5)
        ),
    }
}

fn calculation(result: &DisposalResult) -> String {
    let disposal = &result.disposal;
    let mut out = format!(
        "\n • PROCEEDS:\n\t{} shares x {} = {}\n • COSTS:\n\tDisposal fees: {}\n",
        disposal.amount,
        format_gbp(result.disposal_unit_price()),
        format_gbp(result.gross_proceeds()),
        format_gbp(disposal.expenses)
    );
    let costs: Vec<String> = result
        .disposal_matches
        .iter()
        .map(|m| match &m.kind {
            MatchKind::SameDay(acquisition) | MatchKind::BedAndBreakfast(acquisition) => {
                let mut line = format!(
                    "\tAcquisition cost: ({} shares x {}) + {} fees = {}",
                    acquisition.amount,
                    acquisition.price,
                    format_gbp(acquisition.expenses),
                    format_gbp(m.acquisition_cost_including_expenses())
                );
                if !acquisition.offset.is_zero() {
                    let _ = write!(line, " (including offset {})", acquisition.offset);
                }
                line
            }
            MatchKind::Section104 { cost_basis, .. } => format!(
                "\tAcquisition cost: {} shares x {} = {}",
                m.disposal.amount,
                format_gbp_dp(*cost_basis, 5),
                format_gbp(m.acquisition_cost_including_expenses())
            ),
        })
        .collect();
    out.push_str(&costs.join("\n"));
    let _ = write!(
        out,
        "\n\nTotal proceeds = {}\nTotal costs    = {}\n\nTotal gain     = {}\nTotal loss     = {}",
        format_gbp(result.gross_proceeds()),
        format_gbp(result.allowable_costs()),
        format_gbp(result.gain()),
        format_gbp(result.loss())
    );
    out
}

fn write_transactions(out: &mut String, result: &CalculatorResult) {
    if result.input.transactions.is_empty() {
        out.push_str("NONE\n");
        return;
    }
    for tx in &result.input.transactions {
        let _ = write!(
            out,
            "{} {} {} of {}",
            tx.date.format(DATE_FORMAT),
            tx.kind,
            tx.amount,
            tx.asset
        );
        if tx.kind != TransactionKind::Gift {
            let _ = write!(out, " at £{} with £{} expenses", tx.price, tx.expenses);
        }
        out.push('\n');
    }
}

fn write_asset_events(out: &mut String, result: &CalculatorResult) {
    if result.input.asset_events.is_empty() {
        out.push_str("NONE\n");
        return;
    }
    for event in &result.input.asset_events {
        let _ = write!(out, "{} {} ", event.date.format(DATE_FORMAT), event.asset);
        let _ = match event.kind {
            AssetEventKind::CapitalReturn { amount, value } => {
                write!(out, "CAPITAL RETURN on {} for {}", amount, format_gbp(value))
            }
            AssetEventKind::Dividend { amount, value } => {
                write!(out, "DIVIDEND on {} for {}", amount, format_gbp(value))
            }
            AssetEventKind::Split { multiplier } => write!(out, "SPLIT by {}", multiplier),
            AssetEventKind::Unsplit { multiplier } => write!(out, "UNSPLIT by {}", multiplier),
        };
        out.push('\n');
    }
}
