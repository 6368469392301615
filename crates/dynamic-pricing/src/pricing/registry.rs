use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use super::factors::CategoryField;

pub const NEUTRAL_MULTIPLIER: f64 = 1.0;
pub const STANDARD_VERSION: &str = "standard-v1";

static STANDARD_REGISTRY: OnceLock<Arc<MarkupRegistry>> = OnceLock::new();

const STANDARD_TABLES: &[(CategoryField, &[(&str, f64)])] = &[
    // Behavioural
    (
        CategoryField::UserHistory,
        &[
            ("New", 0.98),
            ("Frequent", 1.02),
            ("Premium", 1.03),
            ("VIP", 1.04),
            ("Occasional", 1.00),
            ("Lapsed", 0.97),
        ],
    ),
    (
        CategoryField::AgeGroup,
        &[
            ("18-24", 1.02),
            ("25-34", 1.03),
            ("35-44", 1.02),
            ("45-54", 1.00),
            ("55+", 0.99),
        ],
    ),
    // Device
    (
        CategoryField::DeviceType,
        &[
            ("Mobile", 1.02),
            ("Desktop", 1.00),
            ("Tablet", 1.01),
            ("Smart TV", 1.00),
        ],
    ),
    (
        CategoryField::OsType,
        &[
            ("iOS", 1.03),
            ("Android", 1.02),
            ("Windows", 1.00),
            ("MacOS", 1.01),
        ],
    ),
    (
        CategoryField::ScreenSize,
        &[("Small", 0.98), ("Medium", 1.00), ("Large", 1.02)],
    ),
    // Market
    (
        CategoryField::CompetitorPricing,
        &[("Lower", 0.98), ("Similar", 1.00), ("Higher", 1.02)],
    ),
    (
        CategoryField::RegionalDemand,
        &[("Low", 0.98), ("Medium", 1.00), ("High", 1.04)],
    ),
    (
        CategoryField::CustomerRating,
        &[("Low", 0.97), ("Medium", 1.00), ("High", 1.03)],
    ),
    (
        CategoryField::PaydayProximity,
        &[("Far", 1.00), ("Near", 1.02)],
    ),
    (
        CategoryField::TourismLevel,
        &[("Low", 0.98), ("Medium", 1.00), ("High", 1.04)],
    ),
    (
        CategoryField::ProductMarketingStatus,
        &[("Low", 0.98), ("Medium", 1.00), ("High", 1.03)],
    ),
    // Calendar, consumed by the time/weekday composite
    (
        CategoryField::DayOfWeek,
        &[
            ("Monday", 0.98),
            ("Tuesday", 0.99),
            ("Wednesday", 1.00),
            ("Thursday", 1.01),
            ("Friday", 1.04),
            ("Saturday", 1.05),
            ("Sunday", 1.02),
        ],
    ),
    (
        CategoryField::DemandIndex,
        &[
            ("Very Low", 0.95),
            ("Low", 0.97),
            ("Medium", 1.00),
            ("High", 1.02),
            ("Very High", 1.04),
        ],
    ),
    (
        CategoryField::SpecialOccasion,
        &[
            ("None", 1.00),
            ("Sports Event", 1.05),
            ("Festival", 1.04),
            ("Holiday", 1.04),
            ("Concert", 1.06),
        ],
    ),
    // Weather, consumed by the temperature/condition composite
    (
        CategoryField::WeatherCondition,
        &[
            ("Sunny", 1.02),
            ("Rainy", 0.98),
            ("Cloudy", 0.99),
            ("Snow", 1.02),
            ("Clear", 1.00),
        ],
    ),
    (
        CategoryField::InventoryLevel,
        &[("Low", 1.04), ("Medium", 1.00), ("High", 0.98)],
    ),
    (
        CategoryField::CityType,
        &[("Urban", 1.03), ("Suburban", 1.00), ("Rural", 0.98)],
    ),
    (
        CategoryField::WeekdayType,
        &[("Weekday", 1.00), ("Weekend", 1.03)],
    ),
    (
        CategoryField::DayType,
        &[("Regular", 1.00), ("Holiday", 1.03)],
    ),
];

/// Errors raised while loading markup table overrides.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read markup tables: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid markup table document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown pricing factor '{0}' in markup tables")]
    UnknownFactor(String),
    #[error("multiplier for {factor} '{key}' must be a positive finite number (got {value})")]
    InvalidMultiplier {
        factor: &'static str,
        key: String,
        value: f64,
    },
    #[error("{factor} keys '{first}' and '{second}' collide when compared case-insensitively")]
    AmbiguousKey {
        factor: &'static str,
        first: String,
        second: String,
    },
}

/// Category value to multiplier mapping for a single factor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkupTable {
    entries: BTreeMap<String, f64>,
    folded: BTreeMap<String, (String, f64)>,
}

impl MarkupTable {
    pub fn build<I>(field: CategoryField, entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut table = MarkupTable::default();
        for (key, multiplier) in entries {
            if !(multiplier.is_finite() && multiplier > 0.0) {
                return Err(RegistryError::InvalidMultiplier {
                    factor: field.name(),
                    key,
                    value: multiplier,
                });
            }
            if let Some((existing, _)) = table.folded.get(&key.to_lowercase()) {
                return Err(RegistryError::AmbiguousKey {
                    factor: field.name(),
                    first: existing.clone(),
                    second: key,
                });
            }
            table.insert(key, multiplier);
        }
        Ok(table)
    }

    fn from_static(entries: &[(&str, f64)]) -> Self {
        let mut table = MarkupTable::default();
        for (key, multiplier) in entries {
            table.insert((*key).to_string(), *multiplier);
        }
        table
    }

    fn insert(&mut self, key: String, multiplier: f64) {
        self.folded
            .insert(key.to_lowercase(), (key.clone(), multiplier));
        self.entries.insert(key, multiplier);
    }

    /// Exact match first; the folded index is only consulted when asked to.
    pub fn get(&self, value: &str, case_insensitive: bool) -> Option<f64> {
        if case_insensitive {
            self.folded
                .get(&value.to_lowercase())
                .map(|(_, multiplier)| *multiplier)
        } else {
            self.entries.get(value).copied()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Table document accepted by [`MarkupRegistry::with_overrides`].
///
/// Each named factor's table is replaced wholesale; factors left out keep
/// the tables of the registry being overridden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkupOverrides {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tables: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Read-only markup configuration shared by every evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupRegistry {
    version: String,
    tables: BTreeMap<CategoryField, MarkupTable>,
}

impl MarkupRegistry {
    /// Built-in constant set, constructed once per process.
    pub fn standard() -> Arc<MarkupRegistry> {
        STANDARD_REGISTRY
            .get_or_init(|| {
                let tables = STANDARD_TABLES
                    .iter()
                    .map(|(field, entries)| (*field, MarkupTable::from_static(entries)))
                    .collect();
                Arc::new(MarkupRegistry {
                    version: STANDARD_VERSION.to_string(),
                    tables,
                })
            })
            .clone()
    }

    /// Standard tables with the overrides from a JSON document applied.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RegistryError> {
        let overrides: MarkupOverrides = serde_json::from_reader(reader)?;
        Self::standard().with_overrides(overrides)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn with_overrides(&self, overrides: MarkupOverrides) -> Result<Self, RegistryError> {
        let MarkupOverrides { version, tables } = overrides;
        let mut merged = self.tables.clone();

        for (name, entries) in tables {
            let field =
                CategoryField::from_name(&name).ok_or(RegistryError::UnknownFactor(name))?;
            merged.insert(field, MarkupTable::build(field, entries)?);
        }

        let version = version.unwrap_or_else(|| format!("{}+overrides", self.version));
        tracing::info!(%version, "markup tables loaded");

        Ok(Self {
            version,
            tables: merged,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn table(&self, field: CategoryField) -> Option<&MarkupTable> {
        self.tables.get(&field)
    }

    /// Multiplier for `value`, or [`NEUTRAL_MULTIPLIER`] when the value is not
    /// a key of the factor's table.
    pub fn lookup(&self, field: CategoryField, value: &str, case_insensitive: bool) -> f64 {
        self.tables
            .get(&field)
            .and_then(|table| table.get(value, case_insensitive))
            .unwrap_or(NEUTRAL_MULTIPLIER)
    }
}
