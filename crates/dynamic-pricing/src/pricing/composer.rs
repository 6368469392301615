use serde::{Deserialize, Serialize};

use super::factors::CategoryField;

pub const DEFAULT_MIN_ADJUSTMENT: f64 = -0.15;
pub const DEFAULT_MAX_ADJUSTMENT: f64 = 0.40;

/// Allowed deviation from the base price, as ratios of the base price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds")]
pub struct AdjustmentBounds {
    min_adjustment: f64,
    max_adjustment: f64,
}

#[derive(Deserialize)]
struct RawBounds {
    min_adjustment: f64,
    max_adjustment: f64,
}

impl TryFrom<RawBounds> for AdjustmentBounds {
    type Error = BoundsError;

    fn try_from(value: RawBounds) -> Result<Self, Self::Error> {
        Self::new(value.min_adjustment, value.max_adjustment)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoundsError {
    #[error("adjustment bounds must be finite (got {min}, {max})")]
    NonFinite { min: f64, max: f64 },
    #[error("min_adjustment {min} must be lower than max_adjustment {max}")]
    Inverted { min: f64, max: f64 },
    #[error("min_adjustment {min} would allow prices below zero")]
    BelowZero { min: f64 },
}

impl AdjustmentBounds {
    pub fn new(min_adjustment: f64, max_adjustment: f64) -> Result<Self, BoundsError> {
        if !(min_adjustment.is_finite() && max_adjustment.is_finite()) {
            return Err(BoundsError::NonFinite {
                min: min_adjustment,
                max: max_adjustment,
            });
        }
        if min_adjustment >= max_adjustment {
            return Err(BoundsError::Inverted {
                min: min_adjustment,
                max: max_adjustment,
            });
        }
        if min_adjustment < -1.0 {
            return Err(BoundsError::BelowZero {
                min: min_adjustment,
            });
        }

        Ok(Self {
            min_adjustment,
            max_adjustment,
        })
    }

    pub fn min_adjustment(&self) -> f64 {
        self.min_adjustment
    }

    pub fn max_adjustment(&self) -> f64 {
        self.max_adjustment
    }

    pub fn price_range(&self, base_price: f64) -> (f64, f64) {
        (
            base_price * (1.0 + self.min_adjustment),
            base_price * (1.0 + self.max_adjustment),
        )
    }
}

impl Default for AdjustmentBounds {
    fn default() -> Self {
        Self {
            min_adjustment: DEFAULT_MIN_ADJUSTMENT,
            max_adjustment: DEFAULT_MAX_ADJUSTMENT,
        }
    }
}

/// The nineteen multipliers folded into every price, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkupFactor {
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
    #[serde(rename = "TimeDayMarkup")]
    TimeDay,
    DemandIndex,
    SpecialOccasion,
    #[serde(rename = "WeatherMarkup")]
    Weather,
    InventoryLevel,
    CityType,
    WeekdayType,
    DayType,
}

impl MarkupFactor {
    pub const ALL: [MarkupFactor; 19] = [
        MarkupFactor::UserHistory,
        MarkupFactor::AgeGroup,
        MarkupFactor::DeviceType,
        MarkupFactor::OsType,
        MarkupFactor::ScreenSize,
        MarkupFactor::CompetitorPricing,
        MarkupFactor::RegionalDemand,
        MarkupFactor::CustomerRating,
        MarkupFactor::PaydayProximity,
        MarkupFactor::TourismLevel,
        MarkupFactor::ProductMarketingStatus,
        MarkupFactor::TimeDay,
        MarkupFactor::DemandIndex,
        MarkupFactor::SpecialOccasion,
        MarkupFactor::Weather,
        MarkupFactor::InventoryLevel,
        MarkupFactor::CityType,
        MarkupFactor::WeekdayType,
        MarkupFactor::DayType,
    ];

    /// Table backing a plain lookup factor; `None` for the two composites.
    pub fn table_field(self) -> Option<CategoryField> {
        let field = match self {
            MarkupFactor::UserHistory => CategoryField::UserHistory,
            MarkupFactor::AgeGroup => CategoryField::AgeGroup,
            MarkupFactor::DeviceType => CategoryField::DeviceType,
            MarkupFactor::OsType => CategoryField::OsType,
            MarkupFactor::ScreenSize => CategoryField::ScreenSize,
            MarkupFactor::CompetitorPricing => CategoryField::CompetitorPricing,
            MarkupFactor::RegionalDemand => CategoryField::RegionalDemand,
            MarkupFactor::CustomerRating => CategoryField::CustomerRating,
            MarkupFactor::PaydayProximity => CategoryField::PaydayProximity,
            MarkupFactor::TourismLevel => CategoryField::TourismLevel,
            MarkupFactor::ProductMarketingStatus => CategoryField::ProductMarketingStatus,
            MarkupFactor::DemandIndex => CategoryField::DemandIndex,
            MarkupFactor::SpecialOccasion => CategoryField::SpecialOccasion,
            MarkupFactor::InventoryLevel => CategoryField::InventoryLevel,
            MarkupFactor::CityType => CategoryField::CityType,
            MarkupFactor::WeekdayType => CategoryField::WeekdayType,
            MarkupFactor::DayType => CategoryField::DayType,
            MarkupFactor::TimeDay | MarkupFactor::Weather => return None,
        };
        Some(field)
    }

    pub fn label(self) -> &'static str {
        match self {
            MarkupFactor::TimeDay => "TimeDayMarkup",
            MarkupFactor::Weather => "WeatherMarkup",
            other => other
                .table_field()
                .map(CategoryField::name)
                .unwrap_or("Unknown"),
        }
    }
}

/// One multiplier applied to the base price, kept for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMarkup {
    pub factor: MarkupFactor,
    pub input: String,
    pub multiplier: f64,
}

pub struct PriceComposer;

impl PriceComposer {
    pub fn compose(base_price: f64, markups: &[AppliedMarkup]) -> f64 {
        markups
            .iter()
            .fold(base_price, |price, markup| price * markup.multiplier)
    }
}

/// Which bound, if any, replaced the composed price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampSide {
    Floor,
    Ceiling,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampOutcome {
    pub price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub clamped: Option<ClampSide>,
}

pub struct BoundsClamp;

impl BoundsClamp {
    pub fn apply(composed_price: f64, base_price: f64, bounds: &AdjustmentBounds) -> ClampOutcome {
        let (min_price, max_price) = bounds.price_range(base_price);

        let (clamped_price, clamped) = if composed_price.is_nan() || composed_price < min_price {
            (min_price, Some(ClampSide::Floor))
        } else if composed_price > max_price {
            (max_price, Some(ClampSide::Ceiling))
        } else {
            (composed_price, None)
        };

        ClampOutcome {
            price: round_to_cents(clamped_price),
            min_price,
            max_price,
            clamped,
        }
    }
}

/// Magnitude past which an `f64` carries no cent digits.
const CENT_PRECISION_LIMIT: f64 = 1e15;

pub fn round_to_cents(value: f64) -> f64 {
    if value.abs() >= CENT_PRECISION_LIMIT {
        return value;
    }
    (value * 100.0).round() / 100.0
}

/// Final quote with the trail of multipliers that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub price: f64,
    pub base_price: f64,
    pub composed_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clamped: Option<ClampSide>,
    pub adjustments: Vec<AppliedMarkup>,
}

impl PricingResult {
    pub fn total_multiplier(&self) -> f64 {
        self.composed_price / self.base_price
    }

    /// Percent change of the final price relative to the base price.
    pub fn change_pct(&self) -> f64 {
        (self.price / self.base_price - 1.0) * 100.0
    }
}
