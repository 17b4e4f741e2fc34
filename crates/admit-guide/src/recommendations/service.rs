use std::fmt::Write as _;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::TtlCache;
use super::catalog::{CatalogError, ProgramCatalog};
use super::import::{parse_cutoffs, ImportError};
use super::rate_limit::{RateLimitDecision, RateLimiter};
use crate::config::{CacheConfig, RateLimitConfig};
use crate::eligibility::{
    CandidateProfile, Category, DataConfidence, EligibilityEngine, EngineError, EstimateFeatures,
    EstimateModel, ProbabilityPoint, ProgramId, RecommendationFilter, RecommendedProgram,
};

const RECOMMENDATION_PREFIX: &str = "rec:";

/// Body of a recommendation request: the candidate profile plus listing controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(flatten)]
    pub profile: CandidateProfile,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: RecommendationFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationMeta {
    pub composite_score: f64,
    pub total_programs: usize,
    pub recommended: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub data: Vec<RecommendedProgram>,
    pub meta: RecommendationMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRequest {
    #[serde(flatten)]
    pub profile: CandidateProfile,
    pub program_id: ProgramId,
}

/// How much the cutoff data behind an estimate can be trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub years_of_data: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_confidence: Option<DataConfidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_verified_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub program_id: ProgramId,
    pub program_name: String,
    pub institution_name: String,
    pub composite_score: f64,
    pub probability: f64,
    pub confidence_interval: (f64, f64),
    pub category: Category,
    pub low_confidence: bool,
    pub rationale: String,
    pub model: EstimateModel,
    pub features: EstimateFeatures,
    pub data_quality: DataQuality,
    pub probability_curve: Vec<ProbabilityPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResponse {
    pub data: EligibilityReport,
}

/// Outcome of a bulk cutoff import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub rows: usize,
    pub programs_updated: usize,
    pub records_written: usize,
    pub unknown_programs: Vec<ProgramId>,
}

/// Error raised by the recommendation service.
#[derive(Debug, thiserror::Error)]
pub enum RecommendationError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("program {0} not found")]
    ProgramNotFound(ProgramId),
    #[error("rate limit exceeded; retry in {}s", .retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },
}

/// Service composing the catalog, the eligibility engine, a response cache
/// and a per-client rate limiter.
pub struct RecommendationService<C> {
    catalog: Arc<C>,
    engine: Arc<EligibilityEngine>,
    cache: Mutex<TtlCache<RecommendationResponse>>,
    limiter: RateLimiter,
}

impl<C> RecommendationService<C>
where
    C: ProgramCatalog + 'static,
{
    pub fn new(
        catalog: Arc<C>,
        engine: EligibilityEngine,
        cache: CacheConfig,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            catalog,
            engine: Arc::new(engine),
            cache: Mutex::new(TtlCache::new(cache.ttl, cache.capacity)),
            limiter: RateLimiter::new(rate_limit),
        }
    }

    pub fn engine(&self) -> &EligibilityEngine {
        &self.engine
    }

    /// Count one request against the client's budget.
    pub fn admit(
        &self,
        identifier: &str,
        now: Instant,
    ) -> Result<RateLimitDecision, RecommendationError> {
        let decision = self.limiter.check(identifier, now);
        if decision.allowed {
            Ok(decision)
        } else {
            warn!(client = identifier, "rate limit exceeded");
            Err(RecommendationError::RateLimited {
                retry_after: decision.reset_after,
            })
        }
    }

    /// Rank the catalog for one candidate, serving repeats from the cache.
    pub fn recommend(
        &self,
        request: &RecommendationRequest,
        now: Instant,
    ) -> Result<RecommendationResponse, RecommendationError> {
        let key = recommendation_key(request);
        if let Some(cached) = self.lock_cache().get(&key, now) {
            debug!(recommended = cached.meta.recommended, "recommendations served from cache");
            return Ok(cached);
        }

        let programs = self.catalog.programs()?;
        let ranked = self
            .engine
            .rank_filtered(&request.profile, &programs, &request.filters, request.limit)
            .map_err(|err| {
                warn!(kind = err.kind(), error = %err, "candidate profile rejected");
                err
            })?;

        let response = RecommendationResponse {
            meta: RecommendationMeta {
                composite_score: ranked.composite.value,
                total_programs: ranked.total_programs,
                recommended: ranked.items.len(),
            },
            data: ranked.items,
        };
        info!(
            composite_score = response.meta.composite_score,
            total_programs = response.meta.total_programs,
            recommended = response.meta.recommended,
            "recommendations generated"
        );

        self.lock_cache().insert(key, response.clone(), now);
        Ok(response)
    }

    /// Evaluate a single program in depth.
    pub fn eligibility(
        &self,
        request: &EligibilityRequest,
    ) -> Result<EligibilityResponse, RecommendationError> {
        let program = self
            .catalog
            .program(&request.program_id)?
            .ok_or_else(|| RecommendationError::ProgramNotFound(request.program_id.clone()))?;

        let evaluation = self.engine.evaluate(&request.profile, &program).map_err(|err| {
            warn!(kind = err.kind(), error = %err, "candidate profile rejected");
            err
        })?;

        info!(
            program_id = %program.id,
            probability = evaluation.eligibility.probability,
            category = evaluation.eligibility.category.label(),
            "eligibility calculated"
        );

        let data_quality = DataQuality {
            years_of_data: evaluation.estimate.features.years_of_data,
            latest_confidence: program.latest_cutoff().and_then(|record| record.confidence),
            last_verified_on: program.last_verified_on,
        };

        Ok(EligibilityResponse {
            data: EligibilityReport {
                program_id: program.id,
                program_name: program.name,
                institution_name: program.institution_name,
                composite_score: evaluation.composite.value,
                probability: evaluation.eligibility.probability,
                confidence_interval: evaluation.eligibility.confidence_interval,
                category: evaluation.eligibility.category,
                low_confidence: evaluation.eligibility.low_confidence,
                rationale: evaluation.rationale,
                model: evaluation.estimate.model,
                features: evaluation.estimate.features,
                data_quality,
                probability_curve: evaluation.probability_curve,
            },
        })
    }

    /// Import cutoffs from CSV and drop cached rankings built on the old data.
    pub fn import_cutoffs<R: Read>(&self, reader: R) -> Result<ImportSummary, RecommendationError> {
        let batch = parse_cutoffs(reader).map_err(|err| {
            warn!(error = %err, "cutoff import rejected");
            err
        })?;

        let mut summary = ImportSummary {
            rows: batch.rows,
            programs_updated: 0,
            records_written: 0,
            unknown_programs: Vec::new(),
        };

        for (program_id, records) in batch.by_program {
            match self.catalog.upsert_cutoffs(&program_id, records) {
                Ok(written) => {
                    summary.programs_updated += 1;
                    summary.records_written += written;
                }
                Err(CatalogError::NotFound(_)) => {
                    warn!(program_id = %program_id, "skipping cutoffs for unknown program");
                    summary.unknown_programs.push(program_id);
                }
                Err(err) => {
                    // Programs written before the failure already changed the catalog.
                    if summary.programs_updated > 0 {
                        let evicted = self.lock_cache().invalidate_prefix(RECOMMENDATION_PREFIX);
                        warn!(
                            programs_updated = summary.programs_updated,
                            evicted,
                            error = %err,
                            "cutoff import interrupted"
                        );
                    }
                    return Err(err.into());
                }
            }
        }

        let evicted = self.lock_cache().invalidate_prefix(RECOMMENDATION_PREFIX);
        info!(
            rows = summary.rows,
            programs_updated = summary.programs_updated,
            evicted,
            "cutoff import applied"
        );
        Ok(summary)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, TtlCache<RecommendationResponse>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cache key covering every input that can change a ranking.
///
/// Free-text fields are length-prefixed so no subject, grade or state name
/// can spill into a neighbouring field.
pub(crate) fn recommendation_key(request: &RecommendationRequest) -> String {
    let profile = &request.profile;
    let mut key = format!(
        "{RECOMMENDATION_PREFIX}{}|g{}",
        profile.utme_score,
        profile.o_level_grades.len()
    );

    for (subject, grade) in &profile.o_level_grades {
        push_text(&mut key, subject);
        push_text(&mut key, grade);
    }
    key.push_str("|post=");
    push_bits(&mut key, profile.post_utme_score);
    key.push_str("|state=");
    push_optional_text(&mut key, profile.state_of_origin.as_deref());
    let _ = write!(
        key,
        "|limit={}",
        request.limit.map(|limit| limit.to_string()).unwrap_or_default()
    );

    let filters = &request.filters;
    if !filters.is_empty() {
        key.push_str("|min=");
        push_bits(&mut key, filters.min_probability);
        let _ = write!(key, "|cat{}", filters.categories.len());
        for category in &filters.categories {
            push_text(&mut key, category.label());
        }
        key.push_str("|ist=");
        push_optional_text(&mut key, filters.institution_state.as_deref());
        key.push_str("|ity=");
        push_optional_text(&mut key, filters.institution_type.as_deref());
    }
    key
}

fn push_text(key: &mut String, text: &str) {
    let _ = write!(key, "{}:{text}", text.len());
}

fn push_optional_text(key: &mut String, text: Option<&str>) {
    match text {
        Some(text) => push_text(key, text),
        None => key.push('-'),
    }
}

fn push_bits(key: &mut String, value: Option<f64>) {
    match value {
        Some(value) => {
            let _ = write!(key, "{}", value.to_bits());
        }
        None => key.push('-'),
    }
}
