//! Per-model token pricing.
//!
//! Rates come from the live LiteLLM price sheet when it is reachable and
//! from a static table otherwise. Every quote carries the label of the
//! source it was computed from.

use serde::Serialize;
use serde_json::Value;

use crate::ai::http_client::pricing_client;

/// Model used when a name is not in the static table
const FALLBACK_MODEL: &str = "gpt-4o-mini";

/// USD per 1K tokens: (model, input, output)
const STATIC_RATES: &[(&str, f64, f64)] = &[
    ("gpt-3.5-turbo", 0.0015, 0.002),
    ("gpt-4", 0.03, 0.06),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-4o", 0.005, 0.015),
    ("gpt-4o-mini", 0.00015, 0.0006),
];

/// Where a set of rates came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingSource {
    Live,
    StaticTable,
}

impl PricingSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Live => "litellm",
            Self::StaticTable => "config_fallback",
        }
    }
}

/// Input/output rates for one model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRates {
    pub model: String,
    /// USD per 1K input tokens
    pub input_per_1k: f64,
    /// USD per 1K output tokens
    pub output_per_1k: f64,
    pub source: PricingSource,
}

/// Cost of a given token count
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub source: String,
}

impl ModelRates {
    /// Static table lookup: exact name, then longest known prefix, then the fallback model
    pub fn from_table(model: &str) -> Self {
        let exact = STATIC_RATES.iter().find(|(name, _, _)| *name == model);
        let prefixed = || {
            STATIC_RATES
                .iter()
                .filter(|(name, _, _)| model.starts_with(name))
                .max_by_key(|(name, _, _)| name.len())
        };
        let fallback = || STATIC_RATES.iter().find(|(name, _, _)| *name == FALLBACK_MODEL);

        let (_, input, output) = exact
            .or_else(prefixed)
            .or_else(fallback)
            .copied()
            .unwrap_or((FALLBACK_MODEL, 0.00015, 0.0006));

        Self {
            model: model.to_string(),
            input_per_1k: input,
            output_per_1k: output,
            source: PricingSource::StaticTable,
        }
    }

    /// Rates from a LiteLLM-style price sheet (per-token USD costs)
    pub fn from_price_sheet(model: &str, sheet: &Value) -> Option<Self> {
        let entry = sheet
            .get(model)
            .or_else(|| sheet.get(format!("openai/{}", model)))?;

        let input = entry.get("input_cost_per_token")?.as_f64()?;
        let output = entry.get("output_cost_per_token")?.as_f64()?;
        if !(input.is_finite() && output.is_finite()) || input < 0.0 || output < 0.0 {
            return None;
        }

        Some(Self {
            model: model.to_string(),
            input_per_1k: input * 1000.0,
            output_per_1k: output * 1000.0,
            source: PricingSource::Live,
        })
    }

    pub fn quote(&self, input_tokens: u64, output_tokens: u64) -> PriceQuote {
        let input_cost = (input_tokens as f64 / 1000.0) * self.input_per_1k;
        let output_cost = (output_tokens as f64 / 1000.0) * self.output_per_1k;

        PriceQuote {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
            source: self.source.label().to_string(),
        }
    }
}

/// Live rates when `pricing_url` is given and reachable, static table otherwise
pub async fn resolve_rates(model: &str, pricing_url: Option<&str>) -> ModelRates {
    if let Some(url) = pricing_url {
        match fetch_price_sheet(url).await {
            Ok(sheet) => {
                if let Some(rates) = ModelRates::from_price_sheet(model, &sheet) {
                    tracing::debug!("[Pricing] Live rates for {}: {:?}", model, rates);
                    return rates;
                }
                tracing::warn!("[Pricing] {} not in live price sheet, using static table", model);
            }
            Err(e) => tracing::warn!("[Pricing] Live pricing unavailable ({}), using static table", e),
        }
    }

    ModelRates::from_table(model)
}

async fn fetch_price_sheet(url: &str) -> Result<Value, String> {
    let client = pricing_client().ok_or("no HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| format!("Failed to parse price sheet: {}", e))
}
