use serde::{Deserialize, Serialize};

use super::composer::AdjustmentBounds;

/// Engine knobs that callers may tune without touching the markup tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    #[serde(default)]
    pub bounds: AdjustmentBounds,
    #[serde(default)]
    pub case_insensitive: bool,
}
