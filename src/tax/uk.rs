use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;

/// UK Tax Year (runs 6 April to 5 April)
/// The year value represents the end year (e.g., 2025 = 2024/25 tax year)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxYear(pub i32);

impl TaxYear {
    /// Create a tax year from a date
    pub fn from_date(date: NaiveDate) -> Self {
        let year = date.year();
        if (date.month(), date.day()) >= (4, 6) {
            TaxYear(year + 1)
        } else {
            TaxYear(year)
        }
    }

    /// Start date of the tax year (6 April of previous year)
    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0 - 1, 4, 6)
    }

    /// End date of the tax year (5 April)
    pub fn end_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 4, 5)
    }

    /// Display as "2024/25" format
    pub fn display(&self) -> String {
        format!("{}/{:02}", self.0 - 1, self.0 % 100)
    }
}

impl std::fmt::Display for TaxYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Statutory CGT figures for one tax year. Rates are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TaxYearRates {
    pub exemption: Decimal,
    pub basic_rate: Decimal,
    pub higher_rate: Decimal,
}

impl TaxYearRates {
    pub const fn new(exemption: Decimal, basic_rate: Decimal, higher_rate: Decimal) -> Self {
        TaxYearRates {
            exemption,
            basic_rate,
            higher_rate,
        }
    }
}

/// Rates keyed by tax year, passed explicitly into the calculation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateTable {
    rates: BTreeMap<TaxYear, TaxYearRates>,
}

impl RateTable {
    /// Rates for shares, 2013/14 onwards
    pub fn uk() -> Self {
        let rates = [
            (2014, TaxYearRates::new(dec!(10900), dec!(18), dec!(28))),
            (2015, TaxYearRates::new(dec!(11000), dec!(18), dec!(28))),
            (2016, TaxYearRates::new(dec!(11100), dec!(18), dec!(28))),
            (2017, TaxYearRates::new(dec!(11100), dec!(10), dec!(20))),
            (2018, TaxYearRates::new(dec!(11300), dec!(10), dec!(20))),
            (2019, TaxYearRates::new(dec!(11700), dec!(10), dec!(20))),
            (2020, TaxYearRates::new(dec!(12000), dec!(10), dec!(20))),
            (2021, TaxYearRates::new(dec!(12300), dec!(10), dec!(20))),
            (2022, TaxYearRates::new(dec!(12300), dec!(10), dec!(20))),
            (2023, TaxYearRates::new(dec!(12300), dec!(10), dec!(20))),
            (2024, TaxYearRates::new(dec!(6000), dec!(10), dec!(20))),
            // Rates changed to 18/24 on 30 October 2024; the later rates apply to the whole year
            (2025, TaxYearRates::new(dec!(3000), dec!(18), dec!(24))),
            (2026, TaxYearRates::new(dec!(3000), dec!(18), dec!(24))),
        ];
        rates
            .into_iter()
            .map(|(year, rates)| (TaxYear(year), rates))
            .collect()
    }

    /// Read a table from JSON keyed by tax year end, e.g.
    /// `{"2025": {"exemption": 3000, "basic_rate": 18, "higher_rate": 24}}`
    pub fn from_json<R: Read>(reader: R) -> serde_json::Result<Self> {
        let rates: BTreeMap<i32, TaxYearRates> = serde_json::from_reader(reader)?;
        Ok(rates
            .into_iter()
            .map(|(year, rates)| (TaxYear(year), rates))
            .collect())
    }

    pub fn get(&self, year: TaxYear) -> Option<&TaxYearRates> {
        self.rates.get(&year)
    }

    /// Overlay `other` on top of this table
    pub fn merge(mut self, other: RateTable) -> Self {
        self.rates.extend(other.rates);
        self
    }
}

impl FromIterator<(TaxYear, TaxYearRates)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (TaxYear, TaxYearRates)>>(iter: I) -> Self {
        RateTable {
            rates: iter.into_iter().collect(),
        }
    }
}
