//! HTTP-facing recommendation service: catalog access, caching, rate
//! limiting and the axum routes that expose the eligibility engine.

pub mod cache;
pub mod catalog;
pub mod import;
pub mod rate_limit;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use cache::TtlCache;
pub use catalog::{merge_cutoffs, CatalogError, ProgramCatalog};
pub use import::{parse_cutoffs, CutoffBatch, ImportError};
pub use rate_limit::{client_identifier, RateLimitDecision, RateLimiter};
pub use router::recommendation_router;
pub use service::{
    DataQuality, EligibilityReport, EligibilityRequest, EligibilityResponse, ImportSummary,
    RecommendationError, RecommendationMeta, RecommendationRequest, RecommendationResponse,
    RecommendationService,
};
