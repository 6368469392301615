use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::composer::AdjustmentBounds;

/// Caller-supplied pricing record, keyed by factor name.
pub type RawFactors = Map<String, Value>;

pub const BASE_PRICE_FIELD: &str = "BaseSellingPrice";
pub const TEMPERATURE_FIELD: &str = "Temperature";
pub const DEFAULT_TEMPERATURE: f64 = 20.0;

/// Categorical inputs recognised by the engine, one markup table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CategoryField {
    UserHistory,
    AgeGroup,
    DeviceType,
    #[serde(rename = "OSType")]
    OsType,
    ScreenSize,
    CompetitorPricing,
    RegionalDemand,
    CustomerRating,
    PaydayProximity,
    TourismLevel,
    ProductMarketingStatus,
    DayOfWeek,
    DemandIndex,
    SpecialOccasion,
    WeatherCondition,
    InventoryLevel,
    CityType,
    WeekdayType,
    DayType,
}

impl CategoryField {
    pub const ALL: [CategoryField; 19] = [
        CategoryField::UserHistory,
        CategoryField::AgeGroup,
        CategoryField::DeviceType,
        CategoryField::OsType,
        CategoryField::ScreenSize,
        CategoryField::CompetitorPricing,
        CategoryField::RegionalDemand,
        CategoryField::CustomerRating,
        CategoryField::PaydayProximity,
        CategoryField::TourismLevel,
        CategoryField::ProductMarketingStatus,
        CategoryField::DayOfWeek,
        CategoryField::DemandIndex,
        CategoryField::SpecialOccasion,
        CategoryField::WeatherCondition,
        CategoryField::InventoryLevel,
        CategoryField::CityType,
        CategoryField::WeekdayType,
        CategoryField::DayType,
    ];

    /// Field name as it appears in request payloads and CSV headers.
    pub fn name(self) -> &'static str {
        match self {
            CategoryField::UserHistory => "UserHistory",
            CategoryField::AgeGroup => "AgeGroup",
            CategoryField::DeviceType => "DeviceType",
            CategoryField::OsType => "OSType",
            CategoryField::ScreenSize => "ScreenSize",
            CategoryField::CompetitorPricing => "CompetitorPricing",
            CategoryField::RegionalDemand => "RegionalDemand",
            CategoryField::CustomerRating => "CustomerRating",
            CategoryField::PaydayProximity => "PaydayProximity",
            CategoryField::TourismLevel => "TourismLevel",
            CategoryField::ProductMarketingStatus => "ProductMarketingStatus",
            CategoryField::DayOfWeek => "DayOfWeek",
            CategoryField::DemandIndex => "DemandIndex",
            CategoryField::SpecialOccasion => "SpecialOccasion",
            CategoryField::WeatherCondition => "WeatherCondition",
            CategoryField::InventoryLevel => "InventoryLevel",
            CategoryField::CityType => "CityType",
            CategoryField::WeekdayType => "WeekdayType",
            CategoryField::DayType => "DayType",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// Value substituted when the caller omits the field. Spelled the way the
    /// standard tables spell their keys so exact matching still resolves.
    pub fn default_value(self) -> &'static str {
        match self {
            CategoryField::UserHistory => "Occasional",
            CategoryField::AgeGroup => "45-54",
            CategoryField::DeviceType => "Desktop",
            CategoryField::OsType => "Windows",
            CategoryField::ScreenSize => "Medium",
            CategoryField::CompetitorPricing => "Similar",
            CategoryField::RegionalDemand => "Medium",
            CategoryField::CustomerRating => "Medium",
            CategoryField::PaydayProximity => "Far",
            CategoryField::TourismLevel => "Medium",
            CategoryField::ProductMarketingStatus => "Medium",
            CategoryField::DayOfWeek => "Wednesday",
            CategoryField::DemandIndex => "Medium",
            CategoryField::SpecialOccasion => "None",
            CategoryField::WeatherCondition => "Clear",
            CategoryField::InventoryLevel => "Medium",
            CategoryField::CityType => "Suburban",
            CategoryField::WeekdayType => "Weekday",
            CategoryField::DayType => "Regular",
        }
    }
}

/// Input rejected before any markup is applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("BaseSellingPrice is missing")]
    MissingBasePrice,
    #[error("BaseSellingPrice must be a positive number (got {value})")]
    InvalidBasePrice { value: f64 },
    #[error("{field} must be numeric (got {value})")]
    NonNumeric { field: &'static str, value: String },
    #[error("{field} must be a category string, not {kind}")]
    UnsupportedValue {
        field: &'static str,
        kind: &'static str,
    },
    #[error("hour must be within 0..=23 (got {hour})")]
    HourOutOfRange { hour: u32 },
}

/// Fully populated record: every categorical field carries a value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFactors {
    pub base_price: f64,
    pub temperature: f64,
    categories: BTreeMap<CategoryField, String>,
}

impl ResolvedFactors {
    pub fn category(&self, field: CategoryField) -> &str {
        self.categories
            .get(&field)
            .map(String::as_str)
            .unwrap_or_else(|| field.default_value())
    }

    pub fn categories(&self) -> impl Iterator<Item = (CategoryField, &str)> {
        self.categories
            .iter()
            .map(|(field, value)| (*field, value.as_str()))
    }
}

/// Merges a raw record with the documented defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DefaultResolver {
    case_insensitive: bool,
    bounds: AdjustmentBounds,
}

impl DefaultResolver {
    pub fn new(case_insensitive: bool, bounds: AdjustmentBounds) -> Self {
        Self {
            case_insensitive,
            bounds,
        }
    }

    pub fn resolve(&self, raw: &RawFactors) -> Result<ResolvedFactors, ValidationError> {
        let base_price = match present(raw, BASE_PRICE_FIELD) {
            None => return Err(ValidationError::MissingBasePrice),
            Some(value) => numeric(BASE_PRICE_FIELD, value)?,
        };
        if !(base_price.is_finite() && base_price > 0.0) {
            return Err(ValidationError::InvalidBasePrice { value: base_price });
        }
        let (min_price, max_price) = self.bounds.price_range(base_price);
        if !(min_price.is_finite() && max_price.is_finite()) {
            return Err(ValidationError::InvalidBasePrice { value: base_price });
        }

        let temperature = match present(raw, TEMPERATURE_FIELD) {
            None => DEFAULT_TEMPERATURE,
            Some(value) => numeric(TEMPERATURE_FIELD, value)?,
        };

        let mut categories = BTreeMap::new();
        for field in CategoryField::ALL {
            let value = match present(raw, field.name()) {
                None => field.default_value().to_string(),
                Some(value) => category(field, value)?,
            };
            let value = if self.case_insensitive {
                value.to_lowercase()
            } else {
                value
            };
            categories.insert(field, value);
        }

        for key in raw.keys() {
            if key != BASE_PRICE_FIELD
                && key != TEMPERATURE_FIELD
                && CategoryField::from_name(key).is_none()
            {
                tracing::debug!(field = %key, "ignoring unrecognised pricing field");
            }
        }

        Ok(ResolvedFactors {
            base_price,
            temperature,
            categories,
        })
    }
}

fn present<'a>(raw: &'a RawFactors, field: &str) -> Option<&'a Value> {
    raw.get(field).filter(|value| !value.is_null())
}

fn numeric(field: &'static str, value: &Value) -> Result<f64, ValidationError> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(number) if number.is_finite() => Ok(number),
        _ => Err(ValidationError::NonNumeric {
            field,
            value: render(value),
        }),
    }
}

fn category(field: CategoryField, value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Array(_) => Err(ValidationError::UnsupportedValue {
            field: field.name(),
            kind: "an array",
        }),
        Value::Object(_) => Err(ValidationError::UnsupportedValue {
            field: field.name(),
            kind: "an object",
        }),
        Value::Null => Ok(field.default_value().to_string()),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{text}'"),
        other => other.to_string(),
    }
}
