//! Funding lifecycle: `Pending -> SentToBusinessOffice -> Funded`.
//!
//! The classifier keeps no memory. State and severity are re-derived from the
//! current date fields on every call, so a reverted deal (funded date cleared)
//! simply classifies differently next time.

use crate::error::{DealEngineError, Result};
use crate::schema::{DealRecord, NormalizedDeal};
use crate::utils::whole_days_between;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum FundingState {
    Pending,
    SentToBusinessOffice,
    Funded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
    Funded,
}

impl Severity {
    /// Higher is more urgent. Funded deals need no attention.
    pub fn urgency(self) -> u8 {
        match self {
            Severity::Critical => 3,
            Severity::Warning => 2,
            Severity::Normal => 1,
            Severity::Funded => 0,
        }
    }
}

/// Day counts at which an unfunded deal escalates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct SeverityThresholds {
    #[schemars(description = "Days since sale at or beyond which an unfunded deal is Critical")]
    pub critical_days: i64,

    #[schemars(description = "Days since sale at or beyond which an unfunded deal is Warning")]
    pub warning_days: i64,

    #[serde(default)]
    #[schemars(
        description = "Optional days in the business office at or beyond which the deal is flagged as overdue there. Independent of severity."
    )]
    pub business_office_warning_days: Option<i64>,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self::standard()
    }
}

impl SeverityThresholds {
    /// 7 days critical, 3 days warning, no business-office flag.
    pub const fn standard() -> Self {
        Self {
            critical_days: 7,
            warning_days: 3,
            business_office_warning_days: None,
        }
    }

    /// 10 days critical, 5 days warning, business office overdue after 3 days.
    pub const fn extended() -> Self {
        Self {
            critical_days: 10,
            warning_days: 5,
            business_office_warning_days: Some(3),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bo_ok = self.business_office_warning_days.map_or(true, |d| d >= 0);
        if self.warning_days < 0 || self.warning_days >= self.critical_days || !bo_ok {
            return Err(DealEngineError::InvalidThresholds {
                critical_days: self.critical_days,
                warning_days: self.warning_days,
            });
        }
        Ok(())
    }

    pub fn severity_for(&self, days_since_sold: i64) -> Severity {
        if days_since_sold >= self.critical_days {
            Severity::Critical
        } else if days_since_sold >= self.warning_days {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FundingStatus {
    pub state: FundingState,
    pub severity: Severity,
    /// 0 when the sold date is unknown or in the future.
    pub days_since_sold: i64,
    /// Only set while the deal sits in the business office unfunded.
    pub days_in_business_office: Option<i64>,
    pub business_office_overdue: bool,
    /// Both dates present and funding precedes the business-office hand-off.
    /// Tolerated; reported for review only.
    pub funded_before_sent: bool,
}

pub fn funding_state(deal: &NormalizedDeal) -> FundingState {
    if deal.funded_date.is_some() {
        FundingState::Funded
    } else if deal.sent_to_business_office.is_some() {
        FundingState::SentToBusinessOffice
    } else {
        FundingState::Pending
    }
}

pub fn classify(
    deal: &NormalizedDeal,
    now: DateTime<Utc>,
    thresholds: &SeverityThresholds,
) -> FundingStatus {
    let state = funding_state(deal);

    let days_since_sold = deal
        .date_sold
        .map(|sold| whole_days_between(sold, now).max(0))
        .unwrap_or(0);

    let days_in_business_office = match (state, deal.sent_to_business_office) {
        (FundingState::SentToBusinessOffice, Some(sent)) => {
            Some(whole_days_between(sent, now).max(0))
        }
        _ => None,
    };

    let severity = match state {
        FundingState::Funded => Severity::Funded,
        _ => thresholds.severity_for(days_since_sold),
    };

    let business_office_overdue = match (
        thresholds.business_office_warning_days,
        days_in_business_office,
    ) {
        (Some(limit), Some(days)) => days >= limit,
        _ => false,
    };

    let funded_before_sent = match (deal.funded_date, deal.sent_to_business_office) {
        (Some(funded), Some(sent)) => funded < sent,
        _ => false,
    };
    if funded_before_sent {
        debug!(
            "Deal {} funded ({:?}) before it was sent to the business office ({:?})",
            deal.id, deal.funded_date, deal.sent_to_business_office
        );
    }

    FundingStatus {
        state,
        severity,
        days_since_sold,
        days_in_business_office,
        business_office_overdue,
        funded_before_sent,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FundingQueueEntry {
    pub deal_id: String,
    pub customer_name: String,
    pub lender_name: String,
    pub status: FundingStatus,
}

/// Unfunded deals, most urgent first. Ties keep input order.
pub fn funding_pipeline(
    deals: &[NormalizedDeal],
    now: DateTime<Utc>,
    thresholds: &SeverityThresholds,
) -> Vec<FundingQueueEntry> {
    let mut queue: Vec<FundingQueueEntry> = deals
        .iter()
        .filter(|deal| funding_state(deal) != FundingState::Funded)
        .map(|deal| FundingQueueEntry {
            deal_id: deal.id.clone(),
            customer_name: deal.customer.name.clone(),
            lender_name: deal.lender_name.clone(),
            status: classify(deal, now, thresholds),
        })
        .collect();

    queue.sort_by(|a, b| {
        b.status
            .severity
            .urgency()
            .cmp(&a.status.severity.urgency())
            .then(b.status.days_since_sold.cmp(&a.status.days_since_sold))
    });

    queue
}

fn stamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Returns the record as it should be written back after the hand-off to the business office.
pub fn mark_sent_to_business_office(record: &DealRecord, at: DateTime<Utc>) -> DealRecord {
    let mut updated = record.clone();
    updated.set("sentToBusinessOffice", stamp(at));
    updated
}

pub fn mark_funded(record: &DealRecord, at: DateTime<Utc>) -> DealRecord {
    let mut updated = record.clone();
    updated.set("fundedDate", stamp(at));
    updated
}

/// Clears the funded date; the deal falls back to whichever earlier state its dates imply.
pub fn revert_funding(record: &DealRecord) -> DealRecord {
    let mut updated = record.clone();
    updated.set("fundedDate", Value::Null);
    updated
}

pub fn revert_business_office(record: &DealRecord) -> DealRecord {
    let mut updated = record.clone();
    updated.set("sentToBusinessOffice", Value::Null);
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn sold_days_ago(days: i64) -> NormalizedDeal {
        NormalizedDeal {
            id: format!("deal-{}", days),
            date_sold: Some(now() - Duration::days(days)),
            ..NormalizedDeal::default()
        }
    }

    #[test]
    fn test_funded_is_authoritative() {
        let deal = NormalizedDeal {
            funded_date: Some(now() - Duration::days(1)),
            sent_to_business_office: None,
            ..sold_days_ago(30)
        };

        let status = classify(&deal, now(), &SeverityThresholds::standard());
        assert_eq!(status.state, FundingState::Funded);
        assert_eq!(status.severity, Severity::Funded);
        assert_eq!(status.days_since_sold, 30);
        assert!(status.days_in_business_office.is_none());
    }

    #[test]
    fn test_sent_to_business_office_counts_days() {
        let deal = NormalizedDeal {
            sent_to_business_office: Some(now() - Duration::days(2)),
            ..sold_days_ago(4)
        };

        let status = classify(&deal, now(), &SeverityThresholds::standard());
        assert_eq!(status.state, FundingState::SentToBusinessOffice);
        assert_eq!(status.severity, Severity::Warning);
        assert_eq!(status.days_in_business_office, Some(2));
        assert!(!status.business_office_overdue);
    }

    #[test]
    fn test_standard_threshold_boundaries() {
        let thresholds = SeverityThresholds::standard();
        let severity = |days| classify(&sold_days_ago(days), now(), &thresholds).severity;

        assert_eq!(severity(0), Severity::Normal);
        assert_eq!(severity(2), Severity::Normal);
        assert_eq!(severity(3), Severity::Warning);
        assert_eq!(severity(6), Severity::Warning);
        assert_eq!(severity(7), Severity::Critical);
        assert_eq!(severity(45), Severity::Critical);
    }

    #[test]
    fn test_extended_thresholds_and_business_office_flag() {
        let thresholds = SeverityThresholds::extended();

        assert_eq!(
            classify(&sold_days_ago(7), now(), &thresholds).severity,
            Severity::Warning
        );
        assert_eq!(
            classify(&sold_days_ago(10), now(), &thresholds).severity,
            Severity::Critical
        );

        let deal = NormalizedDeal {
            sent_to_business_office: Some(now() - Duration::days(3)),
            ..sold_days_ago(4)
        };
        let status = classify(&deal, now(), &thresholds);
        assert_eq!(status.severity, Severity::Normal);
        assert!(status.business_office_overdue);
    }

    #[test]
    fn test_unknown_or_future_sold_date_is_zero_days() {
        let unknown = classify(&NormalizedDeal::default(), now(), &SeverityThresholds::default());
        assert_eq!(unknown.state, FundingState::Pending);
        assert_eq!(unknown.days_since_sold, 0);
        assert_eq!(unknown.severity, Severity::Normal);

        let future = NormalizedDeal {
            date_sold: Some(now() + Duration::days(5)),
            ..NormalizedDeal::default()
        };
        assert_eq!(
            classify(&future, now(), &SeverityThresholds::default()).days_since_sold,
            0
        );
    }

    #[test]
    fn test_partial_days_are_floored() {
        let deal = NormalizedDeal {
            date_sold: Some(now() - Duration::hours(71)),
            ..NormalizedDeal::default()
        };
        let status = classify(&deal, now(), &SeverityThresholds::standard());
        assert_eq!(status.days_since_sold, 2);
        assert_eq!(status.severity, Severity::Normal);
    }

    #[test]
    fn test_funded_before_sent_is_flagged_not_rejected() {
        let deal = NormalizedDeal {
            sent_to_business_office: Some(now() - Duration::days(1)),
            funded_date: Some(now() - Duration::days(3)),
            ..sold_days_ago(5)
        };

        let status = classify(&deal, now(), &SeverityThresholds::standard());
        assert_eq!(status.state, FundingState::Funded);
        assert!(status.funded_before_sent);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(SeverityThresholds::standard().validate().is_ok());
        assert!(SeverityThresholds::extended().validate().is_ok());

        let inverted = SeverityThresholds {
            critical_days: 3,
            warning_days: 7,
            business_office_warning_days: None,
        };
        assert!(matches!(
            inverted.validate(),
            Err(DealEngineError::InvalidThresholds { .. })
        ));

        let negative_bo = SeverityThresholds {
            business_office_warning_days: Some(-1),
            ..SeverityThresholds::standard()
        };
        assert!(negative_bo.validate().is_err());
    }

    #[test]
    fn test_pipeline_orders_by_urgency_and_skips_funded() {
        let funded = NormalizedDeal {
            funded_date: Some(now()),
            ..sold_days_ago(20)
        };
        let deals = vec![
            sold_days_ago(1),
            sold_days_ago(8),
            funded,
            sold_days_ago(4),
            sold_days_ago(12),
        ];

        let queue = funding_pipeline(&deals, now(), &SeverityThresholds::standard());
        let ids: Vec<&str> = queue.iter().map(|e| e.deal_id.as_str()).collect();
        assert_eq!(ids, vec!["deal-12", "deal-8", "deal-4", "deal-1"]);
    }

    #[test]
    fn test_transitions_round_trip_through_classifier() {
        let raw = DealRecord::from_value(json!({
            "id": "deal-77",
            "dateSold": "2024-06-01"
        }))
        .unwrap();
        let thresholds = SeverityThresholds::standard();

        let sent = mark_sent_to_business_office(&raw, now() - Duration::days(1));
        assert_eq!(
            classify(&normalize(&sent), now(), &thresholds).state,
            FundingState::SentToBusinessOffice
        );

        let funded = mark_funded(&sent, now());
        assert_eq!(
            classify(&normalize(&funded), now(), &thresholds).state,
            FundingState::Funded
        );

        let reverted = revert_funding(&funded);
        assert_eq!(reverted.get("fundedDate"), None);
        assert_eq!(
            classify(&normalize(&reverted), now(), &thresholds).state,
            FundingState::SentToBusinessOffice
        );

        let back_to_pending = revert_business_office(&reverted);
        let status = classify(&normalize(&back_to_pending), now(), &thresholds);
        assert_eq!(status.state, FundingState::Pending);
        assert_eq!(status.severity, Severity::Critical);
    }
}
