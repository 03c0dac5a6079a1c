//! # Deal Funding Engine
//!
//! Turns raw dealership deal records, as a schema-less document store hands
//! them over, into profit figures, trend buckets and funding-lifecycle status.
//!
//! ## Core Concepts
//!
//! - **Normalization**: the same logical field lives under several names (`profit`,
//!   `backEndProfit`, `totalProfit`, `backend`) and dates arrive in five encodings.
//!   Everything is coerced into a [`NormalizedDeal`]; dirty fields become zero values.
//! - **Deal profit**: product profit plus finance reserve, always recomputed. Stored
//!   totals are never trusted.
//! - **Finance reserve**: 2:1 on the buy/sell rate spread, capped at 5% of the loan,
//!   unless a manual amount overrides it.
//! - **Funding lifecycle**: `Pending -> SentToBusinessOffice -> Funded`, with a severity
//!   tier that escalates with days since sale.
//!
//! Every function is pure. "Now" is always passed in, so a pass over the same
//! records at the same instant always produces the same report.
//!
//! ## Example
//!
//! ```rust,ignore
//! use deal_funding_engine::*;
//! use chrono::Utc;
//! use serde_json::json;
//!
//! let records = json!([
//!     {
//!         "id": "deal-1",
//!         "customer": {"name": "Dana Reyes"},
//!         "products": [{"name": "Service Contract", "soldPrice": 1000, "cost": 400}],
//!         "buyRate": 2.0,
//!         "sellRate": 6.0,
//!         "loanAmount": 30000,
//!         "term": 72,
//!         "dateSold": "2024-05-20"
//!     }
//! ]);
//!
//! let report = process_deals(&records, &EngineConfig::with_goal(10_000.0), Utc::now()).unwrap();
//! println!("{} deals, {} profit", report.summary.deal_count, report.summary.total_profit);
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod funding;
pub mod goal;
pub mod normalize;
pub mod products;
pub mod reserve;
pub mod schema;
pub mod sources;
pub mod subscriptions;
pub mod utils;

pub use aggregate::*;
pub use config::EngineConfig;
pub use error::{DealEngineError, Result};
pub use funding::*;
pub use goal::{goal_progress, GoalProgress};
pub use normalize::{coalesce_profit, coerce_date, coerce_number, normalize, normalize_batch};
pub use products::{product_count, product_profit, product_revenue};
pub use reserve::{finance_reserve, ReserveInput};
pub use schema::*;
pub use sources::{resolve_lender_names, DealSource, Lender, LenderDirectory};
pub use subscriptions::SubscriptionManager;

use chrono::{DateTime, Utc};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One deal as a list or detail screen shows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DealView {
    pub id: String,
    pub customer_name: String,
    pub vehicle: String,
    pub lender: String,
    pub date_sold: Option<DateTime<Utc>>,
    pub profit: ProfitBreakdown,
    pub funding: FundingStatus,
}

/// Everything a dashboard needs from one full pass over a user's deals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DealReport {
    pub generated_at: DateTime<Utc>,
    pub deals: Vec<DealView>,
    pub months: Vec<MonthBucket>,
    pub by_product: Vec<ProductCount>,
    pub by_lender: Vec<LenderAggregate>,
    pub summary: DealSummary,
    pub funding_queue: Vec<FundingQueueEntry>,
    /// Progress of the current calendar month against the monthly goal.
    pub current_month_goal: GoalProgress,
}

impl DealReport {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DealReport)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

pub struct DealFinanceProcessor;

impl DealFinanceProcessor {
    pub fn process(records: &Value, config: &EngineConfig, now: DateTime<Utc>) -> Result<DealReport> {
        config.validate()?;
        let deals = normalize_batch(records)?;
        Ok(Self::report(&deals, config, now))
    }

    pub fn process_with_lenders(
        records: &Value,
        directory: &dyn LenderDirectory,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<DealReport> {
        config.validate()?;
        let mut deals = normalize_batch(records)?;
        resolve_lender_names(&mut deals, directory);
        Ok(Self::report(&deals, config, now))
    }

    /// Builds the report from already-normalized deals. Assumes `config` is valid.
    pub fn report(deals: &[NormalizedDeal], config: &EngineConfig, now: DateTime<Utc>) -> DealReport {
        info!(
            "Aggregating {} deals over {} months",
            deals.len(),
            config.months_back
        );

        let thresholds = &config.thresholds;

        let views: Vec<DealView> = deals
            .iter()
            .map(|deal| DealView {
                id: deal.id.clone(),
                customer_name: deal.customer.name.clone(),
                vehicle: deal.vehicle_display(config.vehicle_format),
                lender: lender_label(deal).to_string(),
                date_sold: deal.date_sold,
                profit: profit_breakdown(deal),
                funding: classify(deal, now, thresholds),
            })
            .collect();

        let months = aggregate_by_month(deals, config.months_back, config.monthly_goal, now);
        let current_month_profit = months.last().map(|m| m.total_profit).unwrap_or(0.0);
        let current_month_goal = GoalProgress::evaluate(current_month_profit, config.monthly_goal);

        let summary = summarize(deals, now, thresholds);
        debug!(
            "Summary: {} pending, {} in business office, {} funded, {} critical",
            summary.pending_count,
            summary.sent_to_business_office_count,
            summary.funded_count,
            summary.critical_count
        );

        DealReport {
            generated_at: now,
            deals: views,
            months,
            by_product: aggregate_by_product(deals),
            by_lender: aggregate_by_lender(deals),
            summary,
            funding_queue: funding_pipeline(deals, now, thresholds),
            current_month_goal,
        }
    }
}

pub fn process_deals(records: &Value, config: &EngineConfig, now: DateTime<Utc>) -> Result<DealReport> {
    DealFinanceProcessor::process(records, config, now)
}

/// Loads the user's deals from `source` and runs a full pass over them.
///
/// A failed load comes back as [`DealEngineError::LoadFailed`] and the engine is
/// not run at all for that pass.
pub fn refresh(
    source: &dyn DealSource,
    user_id: &str,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<DealReport> {
    let records = source.load_deals(user_id).map_err(|e| match e {
        DealEngineError::LoadFailed(_) => e,
        other => DealEngineError::LoadFailed(other.to_string()),
    })?;

    DealFinanceProcessor::process(&records, config, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    struct FixedSource(Value);

    impl DealSource for FixedSource {
        fn load_deals(&self, _user_id: &str) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    impl DealSource for BrokenSource {
        fn load_deals(&self, user_id: &str) -> Result<Value> {
            Err(DealEngineError::IoError(std::io::Error::other(format!(
                "store unavailable for {}",
                user_id
            ))))
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let sold = (now() - Duration::days(25)).to_rfc3339();
        let records = json!([{
            "id": "deal-1",
            "customer": "Jordan Blake",
            "products": [{"soldPrice": 1000, "cost": 400}],
            "buyRate": 2,
            "sellRate": 6,
            "loanAmount": 30000,
            "term": 72,
            "dateSold": sold,
            "sentToBusinessOffice": null,
            "fundedDate": null
        }]);

        let report = process_deals(&records, &EngineConfig::with_goal(10000.0), now()).unwrap();
        let view = &report.deals[0];

        assert!((view.profit.product_profit - 600.0).abs() < 0.01);
        assert!((view.profit.finance_reserve - 1500.0).abs() < 0.01);
        assert!((view.profit.total_profit - 2100.0).abs() < 0.01);
        assert_eq!(view.funding.state, FundingState::Pending);
        assert_eq!(view.funding.severity, Severity::Critical);
        assert_eq!(report.funding_queue.len(), 1);
    }

    #[test]
    fn test_non_array_input_is_rejected() {
        let result = process_deals(&json!("deals"), &EngineConfig::default(), now());
        assert!(matches!(result, Err(DealEngineError::InputNotArray(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_processing() {
        let config = EngineConfig {
            months_back: 0,
            ..EngineConfig::default()
        };
        assert!(process_deals(&json!([]), &config, now()).is_err());
    }

    #[test]
    fn test_refresh_runs_full_pass() {
        let source = FixedSource(json!([{"id": "a", "dateSold": "2024-06-01"}]));
        let report = refresh(&source, "user-1", &EngineConfig::default(), now()).unwrap();
        assert_eq!(report.summary.deal_count, 1);
        assert_eq!(report.months.len(), 6);
    }

    #[test]
    fn test_refresh_surfaces_load_failure() {
        let result = refresh(&BrokenSource, "user-1", &EngineConfig::default(), now());
        match result {
            Err(DealEngineError::LoadFailed(msg)) => assert!(msg.contains("user-1")),
            other => panic!("expected LoadFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_report_schema_generation() {
        let schema_json = DealReport::schema_as_json().unwrap();
        assert!(schema_json.contains("funding_queue"));
        assert!(schema_json.contains("current_month_goal"));
    }
}
