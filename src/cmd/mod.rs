pub mod report;
pub mod schema;
pub mod summary;

use crate::core::CalculatorInput;
use crate::tax::{calculate, CalculatorResult, RateTable};
use anyhow::Context;
use clap::Args;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Input options shared by the calculating commands
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Transactions file (line format, or JSON with a .json extension). Reads from stdin if "-".
    #[arg(default_value = "-")]
    file: PathBuf,

    /// JSON file of tax year rates, overriding the built-in UK rates
    #[arg(short, long)]
    rates: Option<PathBuf>,
}

impl InputArgs {
    /// Read the input and run the full calculation
    pub fn calculate(&self) -> anyhow::Result<CalculatorResult> {
        let input = read_input(&self.file)?;
        let rates = load_rates(self.rates.as_deref())?;
        let result = calculate(input, &rates)
            .with_context(|| format!("calculating gains for {}", self.file.display()))?;
        Ok(result)
    }
}

/// Read transactions (line format or JSON) from a file, or stdin with "-"
pub fn read_input(path: &Path) -> anyhow::Result<CalculatorInput> {
    if path.as_os_str() == "-" {
        let mut data = String::new();
        io::stdin().lock().read_to_string(&mut data)?;
        if data.trim().is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
        return Ok(parse_input(&data)?);
    }

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let input = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => CalculatorInput::from_json(reader),
        _ => {
            let mut data = String::new();
            reader.read_to_string(&mut data)?;
            CalculatorInput::parse(&data)
        }
    };
    input.with_context(|| format!("reading {}", path.display()))
}

/// Stdin has no extension to go by, so JSON is recognised by its opening brace
fn parse_input(data: &str) -> Result<CalculatorInput, crate::core::InputError> {
    if data.trim_start().starts_with('{') {
        CalculatorInput::from_json(data.as_bytes())
    } else {
        CalculatorInput::parse(data)
    }
}

/// Built-in UK rates, overlaid with any rates read from `path`
pub fn load_rates(path: Option<&Path>) -> anyhow::Result<RateTable> {
    let rates = RateTable::uk();
    let Some(path) = path else {
        return Ok(rates);
    };
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let custom = RateTable::from_json(BufReader::new(file))
        .with_context(|| format!("reading rates from {}", path.display()))?;
    Ok(rates.merge(custom))
}

/// Format a money amount as "£1234.56"
pub fn format_gbp(amount: rust_decimal::Decimal) -> String {
    format_gbp_dp(amount, 2)
}

pub fn format_gbp_dp(amount: rust_decimal::Decimal, dp: u32) -> String {
    format!("£{}", amount.round_dp(dp).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn stdin_json_detected_by_brace() {
        let input = parse_input(r#"  {"transactions": []}"#).unwrap();
        assert!(input.transactions.is_empty());
        let input = parse_input("BUY 01/01/2020 A 1 1 0").unwrap();
        assert_eq!(input.transactions.len(), 1);
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_gbp(dec!(190)), "£190");
        assert_eq!(format_gbp(dec!(12.345)), "£12.34");
        assert_eq!(format_gbp_dp(dec!(4.701234), 5), "£4.70123");
    }
}
