//! Summary command - per tax year totals as a table, JSON or CSV

use crate::cmd::{format_gbp, InputArgs};
use crate::core::rounding::{round_expense, round_gain};
use crate::tax::{CalculatorResult, TaxYearSummary};
use clap::Args;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Output per tax year totals as JSON
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output one CSV row per disposal
    #[arg(long)]
    csv: bool,
}

impl SummaryCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let result = self.input.calculate()?;
        if self.json {
            println!("{}", to_json(&result)?);
        } else if self.csv {
            write_csv(&result, io::stdout().lock())?;
        } else {
            println!("{}", to_table(&result));
        }
        Ok(())
    }
}

/// Totals for one tax year, with amounts as plain decimal strings
#[derive(Debug, Serialize)]
struct YearData {
    tax_year: String,
    start_date: Option<String>,
    end_date: Option<String>,
    disposals: usize,
    proceeds: String,
    allowable_costs: String,
    gains_before_losses: String,
    losses: String,
    net_gain: String,
    exemption: String,
    carry_forward_loss: String,
    taxable_gain: String,
    basic_rate_tax: String,
    higher_rate_tax: String,
}

impl From<&TaxYearSummary> for YearData {
    fn from(summary: &TaxYearSummary) -> Self {
        YearData {
            tax_year: summary.tax_year.display(),
            start_date: summary.tax_year.start_date().map(|d| d.format(DATE_FORMAT).to_string()),
            end_date: summary.tax_year.end_date().map(|d| d.format(DATE_FORMAT).to_string()),
            disposals: summary.number_of_disposals,
            proceeds: summary.proceeds.to_string(),
            allowable_costs: summary.total_allowable_costs.to_string(),
            gains_before_losses: summary.total_gains_before_losses.to_string(),
            losses: summary.total_losses.to_string(),
            net_gain: summary.gain.to_string(),
            exemption: summary.exemption.to_string(),
            carry_forward_loss: summary.carry_forward_loss.to_string(),
            taxable_gain: summary.taxable_gain.to_string(),
            basic_rate_tax: summary.basic_rate_tax.to_string(),
            higher_rate_tax: summary.higher_rate_tax.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DisposalRecord {
    tax_year: String,
    date: String,
    kind: String,
    asset: String,
    amount: String,
    proceeds: String,
    allowable_costs: String,
    gain: String,
}

#[derive(Tabled)]
struct YearRow {
    #[tabled(rename = "Tax year")]
    tax_year: String,
    #[tabled(rename = "Disposals")]
    disposals: usize,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Costs")]
    allowable_costs: String,
    #[tabled(rename = "Net gain")]
    net_gain: String,
    #[tabled(rename = "Taxable")]
    taxable_gain: String,
    #[tabled(rename = "Loss c/f")]
    carry_forward_loss: String,
    #[tabled(rename = "Tax (basic)")]
    basic_rate_tax: String,
    #[tabled(rename = "Tax (higher)")]
    higher_rate_tax: String,
}

fn to_json(result: &CalculatorResult) -> serde_json::Result<String> {
    let years: Vec<YearData> = result.tax_year_summaries.iter().map(YearData::from).collect();
    serde_json::to_string_pretty(&years)
}

fn write_csv<W: io::Write>(result: &CalculatorResult, writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for summary in &result.tax_year_summaries {
        for disposal in &summary.disposal_results {
            let tx = &disposal.disposal;
            wtr.serialize(DisposalRecord {
                tax_year: summary.tax_year.display(),
                date: tx.date.format(DATE_FORMAT).to_string(),
                kind: tx.kind.display().to_string(),
                asset: tx.asset.clone(),
                amount: tx.amount.to_string(),
                proceeds: round_gain(disposal.gross_proceeds()).to_string(),
                allowable_costs: round_expense(disposal.allowable_costs()).to_string(),
                gain: disposal.net_gain().to_string(),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn to_table(result: &CalculatorResult) -> String {
    if result.tax_year_summaries.is_empty() {
        return "No disposals".to_string();
    }
    let rows: Vec<YearRow> = result
        .tax_year_summaries
        .iter()
        .map(|s| YearRow {
            tax_year: s.tax_year.display(),
            disposals: s.number_of_disposals,
            proceeds: format_gbp(s.proceeds),
            allowable_costs: format_gbp(s.total_allowable_costs),
            net_gain: format_gbp(s.gain),
            taxable_gain: format_gbp(s.taxable_gain),
            carry_forward_loss: format_gbp(s.carry_forward_loss),
            basic_rate_tax: format_gbp(s.basic_rate_tax),
            higher_rate_tax: format_gbp(s.higher_rate_tax),
        })
        .collect();
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CalculatorInput;
    use crate::tax::{calculate, RateTable};

    const INPUT: &str = "\
BUY 01/05/2019 FOO 100 5 0
SELL 01/06/2019 FOO 50 7 10
SELL 01/06/2020 FOO 50 4 0
";

    fn result() -> CalculatorResult {
        let input = CalculatorInput::parse(INPUT).unwrap();
        calculate(input, &RateTable::uk()).unwrap()
    }

    #[test]
    fn json_lists_each_year() {
        let json = to_json(&result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let years = value.as_array().unwrap();
        assert_eq!(years.len(), 2);
        assert_eq!(years[0]["tax_year"], "2019/20");
        assert_eq!(years[0]["start_date"], "2019-04-06");
        assert_eq!(years[0]["end_date"], "2020-04-05");
        assert_eq!(years[0]["net_gain"], "90");
        assert_eq!(years[1]["tax_year"], "2020/21");
        assert_eq!(years[1]["net_gain"], "-50");
        assert_eq!(years[1]["carry_forward_loss"], "50");
    }

    #[test]
    fn csv_has_row_per_disposal() {
        let mut out = Vec::new();
        write_csv(&result(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "tax_year,date,kind,asset,amount,proceeds,allowable_costs,gain"
        );
        assert_eq!(lines[1], "2019/20,2019-06-01,SELL,FOO,50,350,260,90");
        assert_eq!(lines[2], "2020/21,2020-06-01,SELL,FOO,50,200,250,-50");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn table_without_disposals() {
        let input = CalculatorInput::parse("BUY 01/05/2019 FOO 100 5 0\n").unwrap();
        let result = calculate(input, &RateTable::uk()).unwrap();
        assert_eq!(to_table(&result), "No disposals");
    }
}
