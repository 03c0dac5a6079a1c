//! Per-deal profit and the roll-ups built from it: calendar-month trend
//! buckets, custom date ranges, and product/lender categories.
//!
//! Deal profit is always recomputed from products plus finance reserve. Stored
//! totals on the raw record are carried for display but never summed here.

use crate::error::{DealEngineError, Result};
use crate::funding::{classify, FundingState, Severity, SeverityThresholds};
use crate::products::{product_count, product_display_name, product_profit, product_revenue};
use crate::reserve::deal_reserve;
use crate::schema::NormalizedDeal;
use crate::utils::{parse_period_string, round_currency, trailing_month_ranges};
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNKNOWN_LENDER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProfitBreakdown {
    pub product_profit: f64,
    pub product_revenue: f64,
    pub finance_reserve: f64,
    pub total_profit: f64,
    pub product_count: usize,
    /// Whatever total the record had stored. Shown, never trusted.
    pub stored_profit: f64,
}

pub fn total_profit(deal: &NormalizedDeal) -> f64 {
    product_profit(&deal.products) + deal_reserve(deal)
}

pub fn profit_breakdown(deal: &NormalizedDeal) -> ProfitBreakdown {
    let product_profit = product_profit(&deal.products);
    let finance_reserve = deal_reserve(deal);

    ProfitBreakdown {
        product_profit,
        product_revenue: product_revenue(&deal.products),
        finance_reserve,
        total_profit: product_profit + finance_reserve,
        product_count: product_count(&deal.products),
        stored_profit: deal.stored_profit,
    }
}

/// One aggregation window. Month buckets and custom ranges share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodBucket {
    pub label: String,
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
    pub deal_count: usize,
    pub total_profit: f64,
    pub avg_profit: f64,
    pub total_products: usize,
    pub products_per_deal: f64,
    pub goal: f64,
}

pub type MonthBucket = PeriodBucket;

fn sold_within(deal: &NormalizedDeal, start: NaiveDate, end: NaiveDate) -> bool {
    deal.date_sold
        .map(|sold| sold.date_naive())
        .is_some_and(|day| start <= day && day <= end)
}

fn build_bucket(
    deals: &[NormalizedDeal],
    label: String,
    start: NaiveDate,
    end: NaiveDate,
    goal: f64,
) -> PeriodBucket {
    let (deal_count, profit, products) = deals
        .iter()
        .filter(|deal| sold_within(deal, start, end))
        .fold((0usize, 0.0, 0usize), |(count, profit, products), deal| {
            (
                count + 1,
                profit + total_profit(deal),
                products + product_count(&deal.products),
            )
        });

    let per_deal = |value: f64| {
        if deal_count == 0 {
            0.0
        } else {
            value / deal_count as f64
        }
    };

    PeriodBucket {
        label,
        start,
        end,
        deal_count,
        total_profit: round_currency(profit),
        avg_profit: round_currency(per_deal(profit)),
        total_products: products,
        products_per_deal: per_deal(products as f64),
        goal,
    }
}

/// Exactly `months_back` buckets (at most [`crate::config::MAX_MONTHS_BACK`]), oldest first, ending
/// with the month containing `now`. Months without deals are still present with zeroed figures.
pub fn aggregate_by_month(
    deals: &[NormalizedDeal],
    months_back: u32,
    goal: f64,
    now: DateTime<Utc>,
) -> Vec<MonthBucket> {
    trailing_month_ranges(now.date_naive(), months_back)
        .into_iter()
        .map(|(start, end)| {
            build_bucket(deals, start.format("%b %Y").to_string(), start, end, goal)
        })
        .collect()
}

/// Single bucket over an inclusive custom date range.
pub fn aggregate_by_range(
    deals: &[NormalizedDeal],
    start: NaiveDate,
    end: NaiveDate,
    goal: f64,
) -> Result<PeriodBucket> {
    if end < start {
        return Err(DealEngineError::DateError(format!(
            "Range end {} precedes start {}",
            end, start
        )));
    }

    Ok(build_bucket(
        deals,
        format!("{} to {}", start, end),
        start,
        end,
        goal,
    ))
}

/// Like [`aggregate_by_range`] but takes a `YYYY-MM` or `YYYY-MM:YYYY-MM` period.
pub fn aggregate_by_period(
    deals: &[NormalizedDeal],
    period: &str,
    goal: f64,
) -> Result<PeriodBucket> {
    let (start, end) = parse_period_string(period)?;
    let mut bucket = aggregate_by_range(deals, start, end, goal)?;
    bucket.label = period.trim().to_string();
    Ok(bucket)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProductCount {
    pub name: String,
    pub count: usize,
}

/// How often each product was sold, most popular first. Ties keep first-seen order.
pub fn aggregate_by_product(deals: &[NormalizedDeal]) -> Vec<ProductCount> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<ProductCount> = Vec::new();

    for product in deals.iter().flat_map(|deal| deal.products.iter()) {
        let name = product_display_name(product);
        let slot = *index.entry(name.clone()).or_insert_with(|| {
            counts.push(ProductCount { name, count: 0 });
            counts.len() - 1
        });
        counts[slot].count += 1;
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LenderAggregate {
    pub name: String,
    pub deal_count: usize,
    pub total_profit: f64,
    pub avg_profit: f64,
}

pub fn lender_label(deal: &NormalizedDeal) -> &str {
    [deal.lender_name.trim(), deal.lender_id.trim()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_LENDER)
}

/// Deal volume and profit per lender, busiest first. Ties keep first-seen order.
pub fn aggregate_by_lender(deals: &[NormalizedDeal]) -> Vec<LenderAggregate> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut lenders: Vec<LenderAggregate> = Vec::new();

    for deal in deals {
        let name = lender_label(deal);
        let slot = *index.entry(name).or_insert_with(|| {
            lenders.push(LenderAggregate {
                name: name.to_string(),
                deal_count: 0,
                total_profit: 0.0,
                avg_profit: 0.0,
            });
            lenders.len() - 1
        });

        lenders[slot].deal_count += 1;
        lenders[slot].total_profit += total_profit(deal);
    }

    for lender in &mut lenders {
        lender.total_profit = round_currency(lender.total_profit);
        lender.avg_profit = round_currency(lender.total_profit / lender.deal_count as f64);
    }

    lenders.sort_by(|a, b| b.deal_count.cmp(&a.deal_count));
    lenders
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DealSummary {
    pub deal_count: usize,
    pub total_profit: f64,
    pub avg_profit: f64,
    pub total_reserve: f64,
    pub total_product_revenue: f64,
    pub total_products: usize,
    pub products_per_deal: f64,
    pub pending_count: usize,
    pub sent_to_business_office_count: usize,
    pub funded_count: usize,
    pub warning_count: usize,
    pub critical_count: usize,
    pub funded_before_sent_count: usize,
}

/// Portfolio-wide totals plus how many deals sit in each funding state and severity.
pub fn summarize(
    deals: &[NormalizedDeal],
    now: DateTime<Utc>,
    thresholds: &SeverityThresholds,
) -> DealSummary {
    let mut summary = DealSummary {
        deal_count: deals.len(),
        ..DealSummary::default()
    };

    for deal in deals {
        let breakdown = profit_breakdown(deal);
        summary.total_profit += breakdown.total_profit;
        summary.total_reserve += breakdown.finance_reserve;
        summary.total_product_revenue += breakdown.product_revenue;
        summary.total_products += breakdown.product_count;

        let status = classify(deal, now, thresholds);
        match status.state {
            FundingState::Pending => summary.pending_count += 1,
            FundingState::SentToBusinessOffice => summary.sent_to_business_office_count += 1,
            FundingState::Funded => summary.funded_count += 1,
        }
        match status.severity {
            Severity::Warning => summary.warning_count += 1,
            Severity::Critical => summary.critical_count += 1,
            Severity::Normal | Severity::Funded => {}
        }
        if status.funded_before_sent {
            summary.funded_before_sent_count += 1;
        }
    }

    summary.total_profit = round_currency(summary.total_profit);
    summary.total_reserve = round_currency(summary.total_reserve);
    summary.total_product_revenue = round_currency(summary.total_product_revenue);
    if summary.deal_count > 0 {
        summary.avg_profit = round_currency(summary.total_profit / summary.deal_count as f64);
        summary.products_per_deal = summary.total_products as f64 / summary.deal_count as f64;
    }

    summary
}
