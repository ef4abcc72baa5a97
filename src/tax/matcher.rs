use crate::core::disposal::{DisposalMatch, MatchKind};
use crate::core::events::{AssetEvent, AssetEventKind};
use crate::core::transaction::{Transaction, TransactionToMatch};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Days after a disposal within which a purchase is matched to it
const BED_AND_BREAKFAST_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("disposal of {required} {asset} on {date} but only {available} held")]
    InsufficientShares {
        asset: String,
        date: NaiveDate,
        required: Decimal,
        available: Decimal,
    },
    #[error("{event} for {asset} on {date} but no shares are held")]
    NoHolding {
        asset: String,
        date: NaiveDate,
        event: &'static str,
    },
}

/// Asset pool for share pooling (section 104 pool)
#[derive(Debug, Clone)]
pub struct Pool {
    pub asset: String,
    pub quantity: Decimal,
    pub cost: Decimal,
}

impl Pool {
    pub fn new(asset: String) -> Self {
        Pool {
            asset,
            quantity: Decimal::ZERO,
            cost: Decimal::ZERO,
        }
    }

    /// Add to the pool (acquisition)
    pub fn add(&mut self, quantity: Decimal, cost: Decimal) {
        self.quantity += quantity;
        self.cost += cost;
        log::debug!(
            "Pool {} ADD: qty={}, cost={}. New total: qty={}, cost={}",
            self.asset,
            quantity,
            cost,
            self.quantity,
            self.cost
        );
    }

    /// Remove from the pool (disposal), returns allowable cost
    pub fn remove(&mut self, quantity: Decimal) -> Decimal {
        if quantity >= self.quantity {
            let cost = self.cost;
            self.quantity = Decimal::ZERO;
            self.cost = Decimal::ZERO;
            log::debug!("Pool {} REMOVE ALL: qty={}, cost={}", self.asset, quantity, cost);
            cost
        } else {
            let cost = quantity * self.cost_basis();
            self.quantity -= quantity;
            self.cost -= cost;
            log::debug!(
                "Pool {} REMOVE: qty={}, cost={}. Remaining: qty={}, cost={}",
                self.asset,
                quantity,
                cost,
                self.quantity,
                self.cost
            );
            cost
        }
    }

    /// Cost per share
    pub fn cost_basis(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.cost / self.quantity
        }
    }

    /// Apply a corporate action; share count changes keep the total cost
    fn apply(&mut self, event: &AssetEvent) -> Result<(), MatchError> {
        match event.kind {
            AssetEventKind::Split { .. } | AssetEventKind::Unsplit { .. } => {
                self.quantity = event.kind.restructured(self.quantity);
            }
            AssetEventKind::CapitalReturn { amount, value } => {
                self.check_holding(event, amount, "capital return")?;
                self.cost -= value;
            }
            AssetEventKind::Dividend { amount, value } => {
                self.check_holding(event, amount, "dividend")?;
                self.cost += value;
            }
        }
        log::debug!(
            "Pool {} {:?} on {}: qty={}, cost={}",
            self.asset,
            event.kind,
            event.date,
            self.quantity,
            self.cost
        );
        Ok(())
    }

    fn check_holding(
        &self,
        event: &AssetEvent,
        amount: Decimal,
        name: &'static str,
    ) -> Result<(), MatchError> {
        if self.quantity.is_zero() {
            return Err(MatchError::NoHolding {
                asset: event.asset.clone(),
                date: event.date,
                event: name,
            });
        }
        if amount != self.quantity {
            log::warn!(
                "{} for {} on {} covers {} shares but the pool holds {}",
                name,
                event.asset,
                event.date,
                amount,
                self.quantity
            );
        }
        Ok(())
    }
}

/// Identify the shares of every disposal against acquisitions.
///
/// Implements HMRC share identification rules per asset:
/// 1. Same-day rule: acquisitions on the same day
/// 2. Bed & breakfast rule: acquisitions within 30 days after the disposal
/// 3. Section 104 pool: everything else, at the pooled cost basis
pub fn match_disposals(
    transactions: &[Arc<Transaction>],
    asset_events: &[AssetEvent],
) -> Result<Vec<DisposalMatch>, MatchError> {
    let mut by_asset: BTreeMap<&str, (Vec<Arc<Transaction>>, Vec<&AssetEvent>)> = BTreeMap::new();
    for tx in transactions {
        by_asset.entry(tx.asset.as_str()).or_default().0.push(Arc::clone(tx));
    }
    for event in asset_events {
        by_asset.entry(event.asset.as_str()).or_default().1.push(event);
    }

    let mut matches = Vec::new();
    for (asset, (transactions, events)) in by_asset {
        log::debug!(
            "Matching {}: {} transactions, {} events",
            asset,
            transactions.len(),
            events.len()
        );
        matches.extend(AssetMatcher::new(asset, transactions, events).run()?);
    }
    Ok(matches)
}

/// Matching state for a single asset
struct AssetMatcher<'a> {
    asset: &'a str,
    acquisitions: Vec<TransactionToMatch>,
    disposals: Vec<TransactionToMatch>,
    events: Vec<&'a AssetEvent>,
    matches: Vec<DisposalMatch>,
}

impl<'a> AssetMatcher<'a> {
    fn new(asset: &'a str, mut transactions: Vec<Arc<Transaction>>, mut events: Vec<&'a AssetEvent>) -> Self {
        transactions.sort_by_key(|tx| (tx.date, tx.id));
        events.sort_by_key(|event| event.date);
        let (disposals, acquisitions): (Vec<_>, Vec<_>) = transactions
            .into_iter()
            .map(TransactionToMatch::new)
            .partition(|tx| tx.kind().is_disposal());
        AssetMatcher {
            asset,
            acquisitions,
            disposals,
            events,
            matches: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<DisposalMatch>, MatchError> {
        self.match_same_day();
        self.match_bed_and_breakfast();
        self.match_pool()?;
        Ok(self.matches)
    }

    fn match_same_day(&mut self) {
        for disposal in self.disposals.iter_mut() {
            for acquisition in self.acquisitions.iter_mut() {
                if disposal.is_exhausted() {
                    break;
                }
                if acquisition.date() != disposal.date() || acquisition.is_exhausted() {
                    continue;
                }
                let quantity = disposal.amount.min(acquisition.amount);
                log::debug!(
                    "Same-day match: {} {} on {}",
                    quantity,
                    self.asset,
                    disposal.date()
                );
                self.matches.push(DisposalMatch::new(
                    MatchKind::SameDay(acquisition.split_off(quantity)),
                    disposal.split_off(quantity),
                ));
            }
        }
    }

    fn match_bed_and_breakfast(&mut self) {
        for disposal in self.disposals.iter_mut() {
            let window_end = disposal.date() + Duration::days(BED_AND_BREAKFAST_DAYS);
            for acquisition in self.acquisitions.iter_mut() {
                if disposal.is_exhausted() {
                    break;
                }
                if acquisition.date() <= disposal.date()
                    || acquisition.date() > window_end
                    || acquisition.is_exhausted()
                {
                    continue;
                }

                let (numerator, denominator) =
                    restructure_ratio(&self.events, disposal.date(), acquisition.date());
                let multiplier = numerator / denominator;
                let wanted = disposal.amount * numerator / denominator;
                let (acquired, disposed) = if acquisition.amount >= wanted {
                    (wanted, disposal.amount)
                } else {
                    (acquisition.amount, acquisition.amount * denominator / numerator)
                };
                log::debug!(
                    "B&B match: {} {} on {} against {} bought on {} (multiplier {})",
                    disposed,
                    self.asset,
                    disposal.date(),
                    acquired,
                    acquisition.date(),
                    multiplier
                );
                self.matches.push(
                    DisposalMatch::new(
                        MatchKind::BedAndBreakfast(acquisition.split_off(acquired)),
                        disposal.split_off(disposed),
                    )
                    .with_restructure_multiplier(multiplier),
                );
            }
        }
    }

    fn match_pool(&mut self) -> Result<(), MatchError> {
        // Same date: corporate actions, then acquisitions, then disposals
        let mut steps: Vec<(NaiveDate, u8, usize)> = Vec::new();
        steps.extend(self.events.iter().enumerate().map(|(i, e)| (e.date, 0, i)));
        steps.extend(self.acquisitions.iter().enumerate().map(|(i, a)| (a.date(), 1, i)));
        steps.extend(self.disposals.iter().enumerate().map(|(i, d)| (d.date(), 2, i)));
        steps.sort();

        let mut pool = Pool::new(self.asset.to_string());
        for (_, step, index) in steps {
            match step {
                0 => pool.apply(self.events[index])?,
                1 => {
                    let acquisition = &mut self.acquisitions[index];
                    if !acquisition.is_exhausted() {
                        let remaining = acquisition.split_off(acquisition.amount);
                        pool.add(remaining.amount, remaining.value() + remaining.expenses);
                    }
                }
                _ => {
                    let disposal = &mut self.disposals[index];
                    if disposal.is_exhausted() {
                        continue;
                    }
                    if disposal.amount > pool.quantity {
                        return Err(MatchError::InsufficientShares {
                            asset: self.asset.to_string(),
                            date: disposal.date(),
                            required: disposal.amount,
                            available: pool.quantity,
                        });
                    }
                    let pool_amount = pool.quantity;
                    let cost_basis = pool.cost_basis();
                    let remaining = disposal.split_off(disposal.amount);
                    let cost = pool.remove(remaining.amount);
                    log::debug!(
                        "Pool match: {} {} on {} at cost basis {}, allowable cost {}",
                        remaining.amount,
                        self.asset,
                        remaining.date(),
                        cost_basis,
                        cost
                    );
                    self.matches.push(DisposalMatch::new(
                        MatchKind::Section104 {
                            pool_amount,
                            cost_basis,
                        },
                        remaining,
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Cumulative share ratio of restructures after `from` up to and including `to`,
/// as (product of split multipliers, product of unsplit multipliers)
fn restructure_ratio(
    events: &[&AssetEvent],
    from: NaiveDate,
    to: NaiveDate,
) -> (Decimal, Decimal) {
    events
        .iter()
        .filter(|e| e.kind.is_restructure() && e.date > from && e.date <= to)
        .fold((Decimal::ONE, Decimal::ONE), |(numerator, denominator), e| {
            let (n, d) = e.kind.share_ratio();
            (numerator * n, denominator * d)
        })
}
