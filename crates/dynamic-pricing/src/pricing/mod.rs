//! Contextual price composition: defaults, markup tables, composite factors,
//! clamping and batch evaluation.

pub mod batch;
pub mod composer;
pub mod composite;
pub mod factors;
pub mod registry;
mod settings;


pub use batch::{BatchEvaluator, BatchImportError, BatchOutcome, CsvBatch};
pub use composer::{
    AdjustmentBounds, AppliedMarkup, BoundsClamp, BoundsError, ClampSide, MarkupFactor,
    PriceComposer, PricingResult,
};
pub use composite::HourOfDay;
pub use factors::{CategoryField, DefaultResolver, RawFactors, ResolvedFactors, ValidationError};
pub use registry::{MarkupOverrides, MarkupRegistry, MarkupTable, RegistryError};
pub use settings::PricingSettings;

use std::sync::Arc;

use registry::NEUTRAL_MULTIPLIER;

/// Stateless evaluator combining the resolver, registry and bounds.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    registry: Arc<MarkupRegistry>,
    resolver: DefaultResolver,
    settings: PricingSettings,
}

impl PricingEngine {
    pub fn new(registry: Arc<MarkupRegistry>, settings: PricingSettings) -> Self {
        Self {
            registry,
            resolver: DefaultResolver::new(settings.case_insensitive, settings.bounds),
            settings,
        }
    }

    /// Engine over the built-in tables with default bounds.
    pub fn standard() -> Self {
        Self::new(MarkupRegistry::standard(), PricingSettings::default())
    }

    pub fn registry(&self) -> &MarkupRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &PricingSettings {
        &self.settings
    }

    pub fn quote(&self, raw: &RawFactors, hour: HourOfDay) -> Result<PricingResult, ValidationError> {
        let resolved = self.resolver.resolve(raw)?;
        Ok(self.quote_resolved(&resolved, hour))
    }

    pub fn price(&self, raw: &RawFactors, hour: HourOfDay) -> Result<f64, ValidationError> {
        self.quote(raw, hour).map(|result| result.price)
    }

    pub fn quote_resolved(&self, resolved: &ResolvedFactors, hour: HourOfDay) -> PricingResult {
        let adjustments = self.markups(resolved, hour);
        let composed_price = PriceComposer::compose(resolved.base_price, &adjustments);
        let outcome = BoundsClamp::apply(composed_price, resolved.base_price, &self.settings.bounds);

        PricingResult {
            price: outcome.price,
            base_price: resolved.base_price,
            composed_price,
            min_price: outcome.min_price,
            max_price: outcome.max_price,
            clamped: outcome.clamped,
            adjustments,
        }
    }

    pub fn batch(&self) -> BatchEvaluator<'_> {
        BatchEvaluator::new(self)
    }

    fn markups(&self, resolved: &ResolvedFactors, hour: HourOfDay) -> Vec<AppliedMarkup> {
        MarkupFactor::ALL
            .into_iter()
            .map(|factor| match factor {
                MarkupFactor::TimeDay => self.time_day(resolved, hour),
                MarkupFactor::Weather => self.weather(resolved),
                table => self.table_markup(table, resolved),
            })
            .collect()
    }

    fn lookup(&self, field: CategoryField, value: &str) -> f64 {
        self.registry
            .lookup(field, value, self.settings.case_insensitive)
    }

    fn table_markup(&self, factor: MarkupFactor, resolved: &ResolvedFactors) -> AppliedMarkup {
        let Some(field) = factor.table_field() else {
            return AppliedMarkup {
                factor,
                input: String::new(),
                multiplier: NEUTRAL_MULTIPLIER,
            };
        };

        let value = resolved.category(field);
        AppliedMarkup {
            factor,
            input: value.to_string(),
            multiplier: self.lookup(field, value),
        }
    }

    fn time_day(&self, resolved: &ResolvedFactors, hour: HourOfDay) -> AppliedMarkup {
        let day = resolved.category(CategoryField::DayOfWeek);
        let weekday_factor = self.lookup(CategoryField::DayOfWeek, day);

        AppliedMarkup {
            factor: MarkupFactor::TimeDay,
            input: format!("{day} @ {:02}:00", hour.get()),
            multiplier: composite::time_day_markup(hour, weekday_factor),
        }
    }

    fn weather(&self, resolved: &ResolvedFactors) -> AppliedMarkup {
        let condition = resolved.category(CategoryField::WeatherCondition);
        let condition_factor = self.lookup(CategoryField::WeatherCondition, condition);

        AppliedMarkup {
            factor: MarkupFactor::Weather,
            input: format!("{condition}, {}°", resolved.temperature),
            multiplier: composite::weather_markup(resolved.temperature, condition_factor),
        }
    }
}
