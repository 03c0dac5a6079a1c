use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A deal exactly as the record store returned it.
///
/// Field names drift between screens (`profit` vs `backEndProfit`, `term` vs
/// `loanTerm`, ...), so the record is kept as an untyped JSON object and only
/// interpreted by the normalizer. A JSON `null` is treated the same as an absent key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealRecord(Map<String, Value>);

impl DealRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns `None` unless `value` is a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// First key in `keys` that is present and non-null.
    pub fn first_of(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.get(k))
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for DealRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// The closed set of encodings a lifecycle date can arrive in.
#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    /// A store-native timestamp that already carries a full instant.
    NativeTimestamp(DateTime<Utc>),
    /// A plain `{seconds, nanoseconds}` object.
    SecondsObject { seconds: i64, nanoseconds: u32 },
    /// A calendar date with no time component, taken as midnight UTC.
    NativeDate(NaiveDate),
    IsoString(String),
    EpochMillis(f64),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum VehicleFormat {
    #[default]
    #[schemars(description = "Year and model only, e.g. '2022 Civic'")]
    Simple,

    #[schemars(description = "Year and model followed by the VIN in parentheses when known")]
    Detailed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Vehicle {
    pub year: String,
    pub model: String,
    pub vin: String,
}

impl Vehicle {
    pub fn display(&self, format: VehicleFormat) -> String {
        let base = format!("{} {}", self.year, self.model).trim().to_string();
        match format {
            VehicleFormat::Detailed if !self.vin.is_empty() => {
                format!("{} ({})", base, self.vin).trim().to_string()
            }
            _ => base,
        }
    }
}

/// A back-end product sold with a deal (warranty, GAP, maintenance plan, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub sold_price: f64,
    pub cost: f64,
    /// Always `sold_price - cost`; never read from storage.
    pub profit: f64,
}

impl Product {
    pub fn priced(id: String, name: String, sold_price: f64, cost: f64) -> Self {
        Self {
            id,
            name,
            sold_price,
            cost,
            profit: sold_price - cost,
        }
    }

    /// A product known only by name, as legacy records stored them.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A deal with every field resolved to a fixed type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedDeal {
    pub id: String,
    pub user_id: String,
    pub customer: Customer,
    pub vehicle: Option<Vehicle>,
    pub lender_id: String,
    pub lender_name: String,

    /// Coalesced stored profit figure. Display only; aggregates recompute.
    pub stored_profit: f64,

    pub buy_rate: f64,
    pub sell_rate: f64,
    pub loan_amount: f64,
    /// Loan term in months.
    pub term: f64,
    pub use_manual_reserve: bool,
    pub manual_reserve_amount: f64,

    pub products: Vec<Product>,

    /// Resolved from `dateSold`, then `date`, then `createdAt`.
    pub date_sold: Option<DateTime<Utc>>,
    pub sent_to_business_office: Option<DateTime<Utc>>,
    pub funded_date: Option<DateTime<Utc>>,

    pub notes: String,
}

impl NormalizedDeal {
    pub fn vehicle_display(&self, format: VehicleFormat) -> String {
        self.vehicle
            .as_ref()
            .map(|v| v.display(format))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_treats_null_as_absent() {
        let record = DealRecord::from_value(json!({
            "profit": null,
            "backEndProfit": 9
        }))
        .unwrap();

        assert!(record.get("profit").is_none());
        assert_eq!(
            record.first_of(&["profit", "backEndProfit"]),
            Some(&json!(9))
        );
    }

    #[test]
    fn test_record_rejects_non_objects() {
        assert!(DealRecord::from_value(json!([1, 2])).is_none());
        assert!(DealRecord::from_value(json!("deal")).is_none());
    }

    #[test]
    fn test_vehicle_display_modes() {
        let vehicle = Vehicle {
            year: "2022".to_string(),
            model: "Civic".to_string(),
            vin: "1HGCM82633A004352".to_string(),
        };

        assert_eq!(vehicle.display(VehicleFormat::Simple), "2022 Civic");
        assert_eq!(
            vehicle.display(VehicleFormat::Detailed),
            "2022 Civic (1HGCM82633A004352)"
        );

        let no_year = Vehicle {
            model: "Tacoma".to_string(),
            ..Vehicle::default()
        };
        assert_eq!(no_year.display(VehicleFormat::Detailed), "Tacoma");
    }

    #[test]
    fn test_priced_product_recomputes_profit() {
        let product = Product::priced("vsc".into(), "Service Contract".into(), 1800.0, 700.0);
        assert!((product.profit - 1100.0).abs() < 0.01);
    }
}
