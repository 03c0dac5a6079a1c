use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reported progress never exceeds this, even when the goal is beaten.
pub const MAX_REPORTED_PROGRESS: u8 = 100;

/// Percentage of `monthly_goal` reached, rounded and capped at 100.
/// A goal of zero or less means "no goal set" and reports 0.
pub fn goal_progress(total_profit: f64, monthly_goal: f64) -> u8 {
    match raw_progress(total_profit, monthly_goal) {
        Some(pct) => pct.round().clamp(0.0, MAX_REPORTED_PROGRESS as f64) as u8,
        None => 0,
    }
}

fn raw_progress(total_profit: f64, monthly_goal: f64) -> Option<f64> {
    if !monthly_goal.is_finite() || monthly_goal <= 0.0 || !total_profit.is_finite() {
        return None;
    }
    Some(total_profit / monthly_goal * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GoalProgress {
    pub goal: f64,
    pub achieved: f64,
    /// Capped figure for display.
    pub percent: u8,
    /// Uncapped percentage; 0 when no goal is set.
    pub raw_percent: f64,
    /// Profit still needed to reach the goal, never negative.
    pub remaining: f64,
    pub goal_set: bool,
}

impl GoalProgress {
    pub fn evaluate(total_profit: f64, monthly_goal: f64) -> Self {
        let raw = raw_progress(total_profit, monthly_goal);
        let goal_set = raw.is_some();

        Self {
            goal: if goal_set { monthly_goal } else { 0.0 },
            achieved: total_profit,
            percent: goal_progress(total_profit, monthly_goal),
            raw_percent: raw.unwrap_or(0.0),
            remaining: if goal_set {
                (monthly_goal - total_profit).max(0.0)
            } else {
                0.0
            },
            goal_set,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_capped() {
        assert_eq!(goal_progress(15000.0, 10000.0), 100);
        assert_eq!(goal_progress(10000.0, 10000.0), 100);
    }

    #[test]
    fn test_progress_rounds() {
        assert_eq!(goal_progress(4567.0, 10000.0), 46);
        assert_eq!(goal_progress(4549.0, 10000.0), 45);
    }

    #[test]
    fn test_no_goal_reports_zero() {
        assert_eq!(goal_progress(100.0, 0.0), 0);
        assert_eq!(goal_progress(100.0, -50.0), 0);
        assert_eq!(goal_progress(100.0, f64::NAN), 0);
    }

    #[test]
    fn test_losses_floor_at_zero() {
        assert_eq!(goal_progress(-500.0, 10000.0), 0);
    }

    #[test]
    fn test_goal_progress_detail() {
        let over = GoalProgress::evaluate(15000.0, 10000.0);
        assert_eq!(over.percent, 100);
        assert!((over.raw_percent - 150.0).abs() < 0.001);
        assert_eq!(over.remaining, 0.0);
        assert!(over.goal_set);

        let under = GoalProgress::evaluate(2500.0, 10000.0);
        assert_eq!(under.percent, 25);
        assert!((under.remaining - 7500.0).abs() < 0.001);

        let unset = GoalProgress::evaluate(2500.0, 0.0);
        assert!(!unset.goal_set);
        assert_eq!(unset.percent, 0);
        assert_eq!(unset.raw_percent, 0.0);
    }
}
