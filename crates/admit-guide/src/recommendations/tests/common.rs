use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::to_bytes;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::{CacheConfig, RateLimitConfig};
use crate::eligibility::{
    CandidateProfile, CutoffRecord, DataConfidence, EligibilityEngine, EngineConfig, Program,
    ProgramId, QuotaType, RecommendationFilter,
};
use crate::recommendations::{
    merge_cutoffs, CatalogError, EligibilityRequest, ProgramCatalog, RecommendationRequest,
    RecommendationService,
};

#[derive(Default)]
pub(super) struct MemoryCatalog {
    programs: Mutex<HashMap<ProgramId, Program>>,
}

impl MemoryCatalog {
    pub(super) fn with(programs: Vec<Program>) -> Self {
        let catalog = Self::default();
        {
            let mut guard = catalog.programs.lock().expect("catalog mutex poisoned");
            for program in programs {
                guard.insert(program.id.clone(), program);
            }
        }
        catalog
    }
}

impl ProgramCatalog for MemoryCatalog {
    fn programs(&self) -> Result<Vec<Program>, CatalogError> {
        let guard = self.programs.lock().expect("catalog mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn program(&self, id: &ProgramId) -> Result<Option<Program>, CatalogError> {
        let guard = self.programs.lock().expect("catalog mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn upsert_cutoffs(
        &self,
        id: &ProgramId,
        records: Vec<CutoffRecord>,
    ) -> Result<usize, CatalogError> {
        let mut guard = self.programs.lock().expect("catalog mutex poisoned");
        let program = guard
            .get_mut(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        Ok(merge_cutoffs(&mut program.cutoff_history, records))
    }
}

pub(super) struct UnavailableCatalog;

impl ProgramCatalog for UnavailableCatalog {
    fn programs(&self) -> Result<Vec<Program>, CatalogError> {
        Err(CatalogError::Unavailable("database offline".to_string()))
    }

    fn program(&self, _id: &ProgramId) -> Result<Option<Program>, CatalogError> {
        Err(CatalogError::Unavailable("database offline".to_string()))
    }

    fn upsert_cutoffs(
        &self,
        _id: &ProgramId,
        _records: Vec<CutoffRecord>,
    ) -> Result<usize, CatalogError> {
        Err(CatalogError::Unavailable("database offline".to_string()))
    }
}

/// Catalog that refuses writes to one program after the others succeed.
pub(super) struct FailingWriteCatalog {
    pub(super) inner: MemoryCatalog,
    pub(super) failing: ProgramId,
}

impl ProgramCatalog for FailingWriteCatalog {
    fn programs(&self) -> Result<Vec<Program>, CatalogError> {
        self.inner.programs()
    }

    fn program(&self, id: &ProgramId) -> Result<Option<Program>, CatalogError> {
        self.inner.program(id)
    }

    fn upsert_cutoffs(
        &self,
        id: &ProgramId,
        records: Vec<CutoffRecord>,
    ) -> Result<usize, CatalogError> {
        if *id == self.failing {
            return Err(CatalogError::Unavailable("write timed out".to_string()));
        }
        self.inner.upsert_cutoffs(id, records)
    }
}

pub(super) fn program(id: &str, name: &str, cutoffs: &[(u16, f64)]) -> Program {
    Program {
        id: ProgramId(id.to_string()),
        name: name.to_string(),
        institution_name: "University of Lagos".to_string(),
        institution_state: Some("Lagos".to_string()),
        institution_type: Some("federal".to_string()),
        catchment_states: vec!["Lagos".to_string(), "Ogun".to_string()],
        elds_states: Vec::new(),
        last_verified_on: NaiveDate::from_ymd_opt(2024, 9, 30),
        cutoff_history: cutoffs
            .iter()
            .map(|(year, cutoff)| CutoffRecord {
                confidence: Some(DataConfidence::Verified),
                ..CutoffRecord::new(*year, *cutoff).with_quota(QuotaType::Merit)
            })
            .collect(),
    }
}

pub(super) fn programs() -> Vec<Program> {
    vec![
        program("med-unilag", "Medicine and Surgery", &[(2024, 78.0), (2023, 76.5)]),
        program("law-unilag", "Law", &[(2024, 70.0), (2023, 69.0), (2022, 67.5)]),
        program("csc-unilag", "Computer Science", &[(2024, 64.0), (2023, 62.0)]),
        program("edu-unilag", "Education", &[(2024, 50.0), (2023, 49.5)]),
        program("new-unilag", "Data Science", &[]),
    ]
}

pub(super) fn profile(utme_score: u16) -> CandidateProfile {
    let grades: BTreeMap<String, String> = [
        ("English Language", "B2"),
        ("Mathematics", "A1"),
        ("Physics", "B3"),
        ("Chemistry", "B3"),
        ("Biology", "C4"),
        ("Civic Education", "C6"),
    ]
    .into_iter()
    .map(|(subject, grade)| (subject.to_string(), grade.to_string()))
    .collect();

    CandidateProfile {
        utme_score,
        o_level_grades: grades,
        post_utme_score: None,
        state_of_origin: Some("Kano".to_string()),
    }
}

pub(super) fn recommendation_request(utme_score: u16) -> RecommendationRequest {
    RecommendationRequest {
        profile: profile(utme_score),
        limit: None,
        filters: RecommendationFilter::default(),
    }
}

pub(super) fn eligibility_request(program_id: &str) -> EligibilityRequest {
    EligibilityRequest {
        profile: profile(280),
        program_id: ProgramId(program_id.to_string()),
    }
}

pub(super) fn rate_limit(max_requests: u64) -> RateLimitConfig {
    RateLimitConfig {
        max_requests,
        window: Duration::from_secs(60),
    }
}

pub(super) fn build_service_with<C: ProgramCatalog + 'static>(
    catalog: Arc<C>,
    rate_limit: RateLimitConfig,
) -> Arc<RecommendationService<C>> {
    let engine = EligibilityEngine::new(EngineConfig::default()).expect("default config is valid");
    Arc::new(RecommendationService::new(
        catalog,
        engine,
        CacheConfig::default(),
        rate_limit,
    ))
}

pub(super) fn build_service_with_cache(cache: CacheConfig) -> Arc<RecommendationService<MemoryCatalog>> {
    let engine = EligibilityEngine::new(EngineConfig::default()).expect("default config is valid");
    Arc::new(RecommendationService::new(
        Arc::new(MemoryCatalog::with(programs())),
        engine,
        cache,
        RateLimitConfig::default(),
    ))
}

pub(super) fn build_service() -> (Arc<RecommendationService<MemoryCatalog>>, Arc<MemoryCatalog>) {
    let catalog = Arc::new(MemoryCatalog::with(programs()));
    let service = build_service_with(catalog.clone(), RateLimitConfig::default());
    (service, catalog)
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
