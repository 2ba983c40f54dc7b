use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel meaning "this numeric filter is not applied".
///
/// The tool schema instructs the model to send `-1` for numeric fields it
/// does not want to constrain, so the filter type keeps that convention
/// instead of mapping to `Option` at the edge.
pub const NUMERIC_UNSET: i64 = -1;

/// One vehicle row from the dealership inventory. `price` is normalized to a
/// plain float and `created_at` to ISO-8601 for listing responses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub stock_number: String,
    pub vin: String,
    pub make: String,
    pub model: String,
    pub year: i64,
    pub price: f64,
    pub mileage: i64,
    pub color: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Loosely-typed filter the model supplies to the `fetch_cars` tool.
///
/// String fields filter when non-empty; `make`/`model`/`color` match as
/// case-insensitive substrings while `stock_number`/`vin` must match
/// exactly. Numeric fields filter when not equal to [`NUMERIC_UNSET`], with
/// inclusive bounds. Wire keys follow the tool schema (`year` = minimum
/// year, `max_year`, `price` = minimum price, `max_price`, `mileage` =
/// maximum mileage).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryFilter {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub stock_number: String,
    #[serde(default)]
    pub vin: String,
    #[serde(rename = "year", default = "unset_int")]
    pub year_min: i64,
    #[serde(rename = "max_year", default = "unset_int")]
    pub year_max: i64,
    #[serde(rename = "price", default = "unset_float")]
    pub price_min: f64,
    #[serde(rename = "max_price", default = "unset_float")]
    pub price_max: f64,
    #[serde(rename = "mileage", default = "unset_int")]
    pub mileage_max: i64,
}

fn unset_int() -> i64 {
    NUMERIC_UNSET
}

fn unset_float() -> f64 {
    NUMERIC_UNSET as f64
}

impl Default for InventoryFilter {
    fn default() -> Self {
        Self {
            make: String::new(),
            model: String::new(),
            color: String::new(),
            stock_number: String::new(),
            vin: String::new(),
            year_min: NUMERIC_UNSET,
            year_max: NUMERIC_UNSET,
            price_min: NUMERIC_UNSET as f64,
            price_max: NUMERIC_UNSET as f64,
            mileage_max: NUMERIC_UNSET,
        }
    }
}

impl InventoryFilter {
    pub fn has_year_min(&self) -> bool {
        self.year_min != NUMERIC_UNSET
    }

    pub fn has_year_max(&self) -> bool {
        self.year_max != NUMERIC_UNSET
    }

    pub fn has_price_min(&self) -> bool {
        self.price_min != NUMERIC_UNSET as f64
    }

    pub fn has_price_max(&self) -> bool {
        self.price_max != NUMERIC_UNSET as f64
    }

    pub fn has_mileage_max(&self) -> bool {
        self.mileage_max != NUMERIC_UNSET
    }

    /// True when no field constrains the listing at all.
    pub fn is_unfiltered(&self) -> bool {
        self.make.is_empty()
            && self.model.is_empty()
            && self.color.is_empty()
            && self.stock_number.is_empty()
            && self.vin.is_empty()
            && !self.has_year_min()
            && !self.has_year_max()
            && !self.has_price_min()
            && !self.has_price_max()
            && !self.has_mileage_max()
    }
}
