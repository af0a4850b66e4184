//! Token pricing and the pre-flight cost estimate.

pub mod estimator;
pub mod pricing;

pub use estimator::{
    estimate_input_tokens, estimate_request_tokens, CostEstimate, CostEstimator,
    OUTPUT_TOKEN_ALLOWANCE,
};
pub use pricing::{resolve_rates, ModelRates, PriceQuote, PricingSource};
