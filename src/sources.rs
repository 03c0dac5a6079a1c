//! Seams to the collaborators the engine reads from but never owns: the deal
//! record store and the lender directory.

use crate::error::Result;
use crate::schema::NormalizedDeal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The record store holding raw deals.
pub trait DealSource {
    /// Fetch every raw deal owned by `user_id`, as a JSON array.
    ///
    /// Scoping to the user happens here; the engine does no identity filtering.
    /// Any failure should come back as [`crate::DealEngineError::LoadFailed`].
    fn load_deals(&self, user_id: &str) -> Result<Value>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Lender {
    pub id: String,
    pub name: String,
    /// Free-form terms text as the directory stores it.
    #[serde(default)]
    pub terms: String,
}

/// Read-only lookup from lender id to lender details.
pub trait LenderDirectory {
    fn lender(&self, id: &str) -> Option<&Lender>;

    fn lender_name(&self, id: &str) -> Option<&str> {
        self.lender(id)
            .map(|l| l.name.as_str())
            .filter(|name| !name.trim().is_empty())
    }
}

impl LenderDirectory for HashMap<String, Lender> {
    fn lender(&self, id: &str) -> Option<&Lender> {
        self.get(id)
    }
}

/// Fills in missing lender names from the directory. Names already on the deal win.
pub fn resolve_lender_names(deals: &mut [NormalizedDeal], directory: &dyn LenderDirectory) {
    for deal in deals.iter_mut() {
        if !deal.lender_name.trim().is_empty() || deal.lender_id.is_empty() {
            continue;
        }
        if let Some(name) = directory.lender_name(&deal.lender_id) {
            deal.lender_name = name.to_string();
        }
    }
}
