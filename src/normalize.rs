//! Coerces raw, schema-drifted deal records into [`NormalizedDeal`]s.
//!
//! Nothing in here fails on dirty data: unparseable fields resolve to their
//! zero value (`0`, `""`, `[]`, `None`). The only rejected input is a batch that
//! is not an array at all.

use crate::error::{DealEngineError, Result};
use crate::schema::{Customer, DateValue, DealRecord, NormalizedDeal, Product, Vehicle};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, warn};
use serde_json::Value;

/// Stored-profit field names, oldest schema first.
pub const PROFIT_ALIASES: [&str; 4] = ["profit", "backEndProfit", "totalProfit", "backend"];

pub const SOLD_DATE_ALIASES: [&str; 3] = ["dateSold", "date", "createdAt"];

pub const TERM_ALIASES: [&str; 2] = ["term", "loanTerm"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

impl DateValue {
    /// Recognises which encoding a stored JSON value uses.
    ///
    /// Richer encodings are checked first: a store timestamp object also carries
    /// numeric fields that would otherwise be misread.
    pub fn classify(value: &Value) -> Option<DateValue> {
        match value {
            Value::Object(fields) => {
                let native = ["timestampValue", "__time__"]
                    .iter()
                    .filter_map(|k| fields.get(*k).and_then(Value::as_str))
                    .find_map(|s| DateTime::parse_from_rfc3339(s.trim()).ok());
                if let Some(instant) = native {
                    return Some(DateValue::NativeTimestamp(instant.with_timezone(&Utc)));
                }

                let seconds = ["seconds", "_seconds"]
                    .iter()
                    .find_map(|k| fields.get(*k).and_then(coerce_number))?;
                let nanoseconds = ["nanoseconds", "_nanoseconds"]
                    .iter()
                    .find_map(|k| fields.get(*k).and_then(coerce_number))
                    .unwrap_or(0.0);

                Some(DateValue::SecondsObject {
                    seconds: seconds.trunc() as i64,
                    nanoseconds: nanoseconds.clamp(0.0, 999_999_999.0) as u32,
                })
            }
            Value::String(s) if !s.trim().is_empty() => Some(DateValue::IsoString(s.clone())),
            Value::Number(n) => n.as_f64().map(DateValue::EpochMillis),
            _ => None,
        }
    }

    pub fn to_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            DateValue::NativeTimestamp(instant) => Some(*instant),
            // Sub-second precision is dropped.
            DateValue::SecondsObject { seconds, .. } => {
                DateTime::from_timestamp_millis(seconds.checked_mul(1000)?)
            }
            DateValue::NativeDate(date) => Some(date.and_hms_opt(0, 0, 0)?.and_utc()),
            DateValue::IsoString(s) => parse_date_string(s),
            DateValue::EpochMillis(ms) if ms.is_finite() => {
                DateTime::from_timestamp_millis(ms.trunc() as i64)
            }
            DateValue::EpochMillis(_) => None,
        }
    }
}

/// Resolves any stored date encoding to a UTC instant.
pub fn coerce_date(value: &Value) -> Option<DateTime<Utc>> {
    DateValue::classify(value)?.to_instant()
}

fn parse_date_string(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return DateValue::NativeDate(date).to_instant();
        }
    }

    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Reads a finite number from a JSON number or a numeric string such as `"$1,250.50"`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };

    n.is_finite().then_some(n)
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn coerce_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn first_number(record: &DealRecord, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| record.get(k).and_then(coerce_number))
}

fn first_date(record: &DealRecord, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|k| record.get(k).and_then(coerce_date))
}

/// First stored profit alias that parses to a finite number, else `0`.
pub fn coalesce_profit(record: &DealRecord) -> f64 {
    first_number(record, &PROFIT_ALIASES).unwrap_or(0.0)
}

/// Accepts a product array (objects or legacy bare names) or a comma-separated string.
pub fn coerce_products(value: Option<&Value>) -> Vec<Product> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(coerce_product).collect(),
        Some(Value::String(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Product::named)
            .collect(),
        _ => Vec::new(),
    }
}

fn coerce_product(item: &Value) -> Option<Product> {
    match item {
        Value::String(name) => Some(Product::named(name.clone())),
        Value::Object(fields) => {
            let sold_price = ["soldPrice", "price"]
                .iter()
                .find_map(|k| fields.get(*k).and_then(coerce_number))
                .unwrap_or(0.0);
            let cost = fields.get("cost").and_then(coerce_number).unwrap_or(0.0);

            Some(Product::priced(
                coerce_text(fields.get("id")),
                coerce_text(fields.get("name")),
                sold_price,
                cost,
            ))
        }
        _ => None,
    }
}

pub fn coerce_customer(record: &DealRecord) -> Customer {
    match record.get("customer") {
        Some(Value::String(name)) => Customer {
            name: name.clone(),
            ..Customer::default()
        },
        Some(Value::Object(fields)) => Customer {
            name: coerce_text(fields.get("name")),
            phone: coerce_text(fields.get("phone")),
            email: coerce_text(fields.get("email")),
        },
        _ => Customer {
            name: coerce_text(record.get("customerName")),
            ..Customer::default()
        },
    }
}

pub fn coerce_vehicle(value: Option<&Value>) -> Option<Vehicle> {
    match value {
        Some(Value::String(description)) => Some(Vehicle {
            model: description.clone(),
            ..Vehicle::default()
        }),
        Some(Value::Object(fields)) => Some(Vehicle {
            year: coerce_text(fields.get("year")),
            model: coerce_text(fields.get("model")),
            vin: coerce_text(fields.get("vin")),
        }),
        _ => None,
    }
}

fn coerce_lender(record: &DealRecord) -> (String, String) {
    let lender_id = coerce_text(record.get("lenderId"));

    let lender_name = match record.first_of(&["lenderName", "lender"]) {
        Some(Value::Object(fields)) => coerce_text(fields.get("name")),
        other => coerce_text(other),
    };

    let lender_id = if lender_id.is_empty() {
        match record.get("lender") {
            Some(Value::Object(fields)) => coerce_text(fields.get("id")),
            _ => lender_id,
        }
    } else {
        lender_id
    };

    (lender_id, lender_name)
}

pub fn normalize(record: &DealRecord) -> NormalizedDeal {
    let (lender_id, lender_name) = coerce_lender(record);

    NormalizedDeal {
        id: coerce_text(record.get("id")),
        user_id: coerce_text(record.get("userId")),
        customer: coerce_customer(record),
        vehicle: coerce_vehicle(record.get("vehicle")),
        lender_id,
        lender_name,
        stored_profit: coalesce_profit(record),
        buy_rate: first_number(record, &["buyRate"]).unwrap_or(0.0),
        sell_rate: first_number(record, &["sellRate"]).unwrap_or(0.0),
        loan_amount: first_number(record, &["loanAmount"]).unwrap_or(0.0),
        term: first_number(record, &TERM_ALIASES).unwrap_or(0.0),
        use_manual_reserve: coerce_flag(record.get("useManualReserve")),
        manual_reserve_amount: first_number(record, &["manualReserveAmount"]).unwrap_or(0.0),
        products: coerce_products(record.get("products")),
        date_sold: first_date(record, &SOLD_DATE_ALIASES),
        sent_to_business_office: first_date(record, &["sentToBusinessOffice"]),
        funded_date: first_date(record, &["fundedDate"]),
        notes: coerce_text(record.get("notes")),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Splits a raw batch into records. Elements that are not objects are skipped.
pub fn records_from_value(batch: &Value) -> Result<Vec<DealRecord>> {
    let items = batch
        .as_array()
        .ok_or_else(|| DealEngineError::InputNotArray(json_type_name(batch).to_string()))?;

    let records: Vec<DealRecord> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let record = DealRecord::from_value(item.clone());
            if record.is_none() {
                warn!(
                    "Skipping deal #{}: expected an object, got {}",
                    idx,
                    json_type_name(item)
                );
            }
            record
        })
        .collect();

    debug!(
        "Accepted {} of {} raw deal records",
        records.len(),
        items.len()
    );

    Ok(records)
}

/// Normalizes a whole batch, rejecting input that is not a JSON array.
pub fn normalize_batch(batch: &Value) -> Result<Vec<NormalizedDeal>> {
    Ok(records_from_value(batch)?.iter().map(normalize).collect())
}
