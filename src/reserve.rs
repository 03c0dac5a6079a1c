//! Finance reserve: the dealer's share of the spread between the lender's buy
//! rate and the rate sold to the customer.

use crate::schema::NormalizedDeal;
use crate::utils::round_currency;
use serde::{Deserialize, Serialize};

/// Reserve percentage earned per point of rate spread.
pub const RESERVE_SPREAD_MULTIPLIER: f64 = 2.0;

/// Ceiling on the reserve percentage, regardless of spread.
pub const RESERVE_CAP_PERCENT: f64 = 5.0;

/// Rates are plain percentages: `4.99` means 4.99%.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReserveInput {
    pub use_manual_reserve: bool,
    pub manual_reserve_amount: f64,
    pub buy_rate: f64,
    pub sell_rate: f64,
    pub loan_amount: f64,
    pub term: f64,
}

impl From<&NormalizedDeal> for ReserveInput {
    fn from(deal: &NormalizedDeal) -> Self {
        Self {
            use_manual_reserve: deal.use_manual_reserve,
            manual_reserve_amount: deal.manual_reserve_amount,
            buy_rate: deal.buy_rate,
            sell_rate: deal.sell_rate,
            loan_amount: deal.loan_amount,
            term: deal.term,
        }
    }
}

pub fn finance_reserve(input: &ReserveInput) -> f64 {
    if input.use_manual_reserve
        && input.manual_reserve_amount.is_finite()
        && input.manual_reserve_amount > 0.0
    {
        return input.manual_reserve_amount;
    }

    let rate_spread = input.sell_rate - input.buy_rate;
    // Comparisons are written so NaN inputs also land here.
    let formula_applies = input.loan_amount > 0.0 && input.term > 0.0 && rate_spread >= 0.0;
    if !formula_applies {
        return 0.0;
    }

    let reserve_percentage = rate_spread * RESERVE_SPREAD_MULTIPLIER;
    let capped_percentage = reserve_percentage.min(RESERVE_CAP_PERCENT);

    round_currency(input.loan_amount * (capped_percentage / 100.0))
}

pub fn deal_reserve(deal: &NormalizedDeal) -> f64 {
    finance_reserve(&ReserveInput::from(deal))
}
