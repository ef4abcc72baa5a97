use crate::core::events::{AssetEvent, AssetEventKind};
use crate::core::transaction::{Transaction, TransactionKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Deserialize;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;

/// Where in the input a problem was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Line(usize),
    Transaction(usize),
    AssetEvent(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(n) => write!(f, "line {}", n),
            Location::Transaction(n) => write!(f, "transaction {}", n),
            Location::AssetEvent(n) => write!(f, "asset event {}", n),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("{at}: unknown record type '{kind}'")]
    UnknownKind { at: Location, kind: String },
    #[error("{at}: {kind} expects {expected} fields, found {found}")]
    FieldCount {
        at: Location,
        kind: String,
        expected: &'static str,
        found: usize,
    },
    #[error("{at}: invalid date '{value}', expected dd/mm/yyyy")]
    InvalidDate { at: Location, value: String },
    #[error("{at}: invalid number '{value}'")]
    InvalidNumber { at: Location, value: String },
    #[error("{at}: {field} must be positive")]
    NotPositive { at: Location, field: &'static str },
    #[error("{at}: {field} cannot be negative")]
    Negative { at: Location, field: &'static str },
    #[error("{at}: gifts cannot have expenses")]
    GiftExpenses { at: Location },
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
}

/// Transactions and corporate actions to calculate over
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculatorInput {
    pub transactions: Vec<Arc<Transaction>>,
    pub asset_events: Vec<AssetEvent>,
}

impl CalculatorInput {
    /// Parse the line format, one record per line:
    ///
    /// ```text
    /// BUY 05/12/2019 GB00B41YBW71 500 4.7012 2
    /// SELL 28/11/2019 GB00B41YBW71 2000 4.6702 12.5
    /// GIFT 01/02/2020 GB00B41YBW71 100
    /// CAPRETURN 10/05/2020 GB00B41YBW71 2000 100
    /// DIVIDEND 10/05/2020 GB00B41YBW71 2000 100
    /// SPLIT 10/05/2020 GB00B41YBW71 10
    /// UNSPLIT 10/05/2020 GB00B41YBW71 10
    /// ```
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn parse(data: &str) -> Result<Self, InputError> {
        let mut input = CalculatorInput::default();
        for (index, line) in data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            input.parse_line(Location::Line(index + 1), line)?;
        }
        log::debug!(
            "Parsed {} transactions and {} asset events",
            input.transactions.len(),
            input.asset_events.len()
        );
        Ok(input)
    }

    fn parse_line(&mut self, at: Location, line: &str) -> Result<(), InputError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let kind = fields[0].to_uppercase();
        let args = &fields[1..];
        let field_count = |expected: &'static str| InputError::FieldCount {
            at,
            kind: kind.clone(),
            expected,
            found: args.len(),
        };

        match kind.as_str() {
            "BUY" | "SELL" => {
                let [date, asset, amount, price, expenses] = args else {
                    return Err(field_count("5"));
                };
                let tx_kind = if kind == "BUY" {
                    TransactionKind::Buy
                } else {
                    TransactionKind::Sell
                };
                self.push_transaction(
                    at,
                    tx_kind,
                    parse_date(at, date)?,
                    asset,
                    parse_decimal(at, amount)?,
                    parse_decimal(at, price)?,
                    parse_decimal(at, expenses)?,
                )
            }
            "GIFT" => {
                let (date, asset, amount, price, expenses) = match args {
                    [date, asset, amount] => (date, asset, amount, None, None),
                    [date, asset, amount, price, expenses] => {
                        (date, asset, amount, Some(price), Some(expenses))
                    }
                    _ => return Err(field_count("3 or 5")),
                };
                let price = price.map(|p| parse_decimal(at, p)).transpose()?;
                let expenses = expenses.map(|e| parse_decimal(at, e)).transpose()?;
                self.push_transaction(
                    at,
                    TransactionKind::Gift,
                    parse_date(at, date)?,
                    asset,
                    parse_decimal(at, amount)?,
                    price.unwrap_or(Decimal::ZERO),
                    expenses.unwrap_or(Decimal::ZERO),
                )
            }
            "CAPRETURN" | "DIVIDEND" => {
                let [date, asset, amount, value] = args else {
                    return Err(field_count("4"));
                };
                let amount = parse_decimal(at, amount)?;
                let value = parse_decimal(at, value)?;
                let event_kind = if kind == "CAPRETURN" {
                    AssetEventKind::CapitalReturn { amount, value }
                } else {
                    AssetEventKind::Dividend { amount, value }
                };
                self.push_asset_event(at, event_kind, parse_date(at, date)?, asset)
            }
            "SPLIT" | "UNSPLIT" => {
                let [date, asset, multiplier] = args else {
                    return Err(field_count("3"));
                };
                let multiplier = parse_decimal(at, multiplier)?;
                let event_kind = if kind == "SPLIT" {
                    AssetEventKind::Split { multiplier }
                } else {
                    AssetEventKind::Unsplit { multiplier }
                };
                self.push_asset_event(at, event_kind, parse_date(at, date)?, asset)
            }
            _ => Err(InputError::UnknownKind {
                at,
                kind: fields[0].to_string(),
            }),
        }
    }

    /// Read the JSON input format described by [`InputFile`]
    pub fn from_json<R: Read>(reader: R) -> Result<Self, InputError> {
        let file: InputFile = serde_json::from_reader(reader)?;
        let mut input = CalculatorInput::default();
        for (index, record) in file.transactions.into_iter().enumerate() {
            input.push_transaction(
                Location::Transaction(index + 1),
                record.kind,
                record.date,
                &record.asset,
                record.amount,
                record.price,
                record.expenses,
            )?;
        }
        for (index, record) in file.asset_events.into_iter().enumerate() {
            input.push_asset_event(
                Location::AssetEvent(index + 1),
                record.kind,
                record.date,
                &record.asset,
            )?;
        }
        Ok(input)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_transaction(
        &mut self,
        at: Location,
        kind: TransactionKind,
        date: NaiveDate,
        asset: &str,
        amount: Decimal,
        price: Decimal,
        expenses: Decimal,
    ) -> Result<(), InputError> {
        require_positive(at, "amount", amount)?;
        require_non_negative(at, "price", price)?;
        require_non_negative(at, "expenses", expenses)?;
        if kind == TransactionKind::Gift && !expenses.is_zero() {
            return Err(InputError::GiftExpenses { at });
        }
        self.transactions.push(Arc::new(Transaction {
            id: self.transactions.len(),
            kind,
            date,
            asset: asset.to_string(),
            amount,
            price,
            expenses,
        }));
        Ok(())
    }

    fn push_asset_event(
        &mut self,
        at: Location,
        kind: AssetEventKind,
        date: NaiveDate,
        asset: &str,
    ) -> Result<(), InputError> {
        match kind {
            AssetEventKind::CapitalReturn { amount, value }
            | AssetEventKind::Dividend { amount, value } => {
                require_positive(at, "amount", amount)?;
                require_non_negative(at, "value", value)?;
            }
            AssetEventKind::Split { multiplier } | AssetEventKind::Unsplit { multiplier } => {
                require_positive(at, "multiplier", multiplier)?;
            }
        }
        self.asset_events.push(AssetEvent {
            kind,
            date,
            asset: asset.to_string(),
        });
        Ok(())
    }
}

/// JSON input: transactions plus optional corporate actions
#[derive(Debug, Deserialize, JsonSchema)]
pub struct InputFile {
    pub transactions: Vec<TransactionRecord>,
    #[serde(default)]
    pub asset_events: Vec<AssetEventRecord>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TransactionRecord {
    pub kind: TransactionKind,
    /// ISO 8601 date, e.g. 2024-01-31
    pub date: NaiveDate,
    pub asset: String,
    /// Number of shares
    #[schemars(with = "String")]
    pub amount: Decimal,
    /// Price per share; omitted for gifts
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub price: Decimal,
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub expenses: Decimal,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AssetEventRecord {
    pub date: NaiveDate,
    pub asset: String,
    #[serde(flatten)]
    pub kind: AssetEventKind,
}

fn parse_date(at: Location, value: &str) -> Result<NaiveDate, InputError> {
    NaiveDate::parse_from_str(value, "%d/%m/%Y").map_err(|_| InputError::InvalidDate {
        at,
        value: value.to_string(),
    })
}

fn parse_decimal(at: Location, value: &str) -> Result<Decimal, InputError> {
    Decimal::from_str(value).map_err(|_| InputError::InvalidNumber {
        at,
        value: value.to_string(),
    })
}

fn require_positive(at: Location, field: &'static str, value: Decimal) -> Result<(), InputError> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(InputError::NotPositive { at, field })
    }
}

fn require_non_negative(
    at: Location,
    field: &'static str,
    value: Decimal,
) -> Result<(), InputError> {
    if value < Decimal::ZERO {
        Err(InputError::Negative { at, field })
    } else {
        Ok(())
    }
}
