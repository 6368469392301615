use chrono::{FixedOffset, Local, Utc};
use dynamic_pricing::config::PricingConfig;
use dynamic_pricing::error::AppError;
use dynamic_pricing::pricing::{HourOfDay, MarkupRegistry, PricingEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Where the service reads the hour from when a request does not carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServiceClock {
    Local,
    Fixed(FixedOffset),
}

impl ServiceClock {
    pub(crate) fn from_config(config: &PricingConfig) -> Self {
        config.utc_offset.map_or(Self::Local, Self::Fixed)
    }

    pub(crate) fn current_hour(self) -> HourOfDay {
        match self {
            ServiceClock::Local => HourOfDay::from_datetime(&Local::now()),
            ServiceClock::Fixed(offset) => {
                HourOfDay::from_datetime(&Utc::now().with_timezone(&offset))
            }
        }
    }

    pub(crate) fn resolve(self, requested: Option<HourOfDay>) -> HourOfDay {
        requested.unwrap_or_else(|| self.current_hour())
    }
}

#[derive(Clone)]
pub(crate) struct PricingState {
    pub(crate) engine: Arc<PricingEngine>,
    pub(crate) clock: ServiceClock,
}

impl PricingState {
    pub(crate) fn new(engine: PricingEngine, clock: ServiceClock) -> Self {
        Self {
            engine: Arc::new(engine),
            clock,
        }
    }
}

pub(crate) fn build_engine(config: &PricingConfig) -> Result<PricingEngine, AppError> {
    let registry = match &config.markup_tables {
        Some(path) => Arc::new(MarkupRegistry::from_path(path)?),
        None => MarkupRegistry::standard(),
    };
    Ok(PricingEngine::new(registry, config.settings))
}

pub(crate) fn parse_hour(raw: &str) -> Result<HourOfDay, String> {
    let hour = raw
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("failed to parse '{raw}' as an hour ({err})"))?;
    HourOfDay::new(hour).map_err(|err| err.to_string())
}
