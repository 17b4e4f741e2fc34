use admit_guide::eligibility::{CutoffRecord, DataConfidence, Program, ProgramId, QuotaType};
use admit_guide::error::AppError;
use admit_guide::recommendations::{merge_cutoffs, CatalogError, ProgramCatalog};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryProgramCatalog {
    programs: Arc<Mutex<HashMap<ProgramId, Program>>>,
}

impl InMemoryProgramCatalog {
    pub(crate) fn from_programs(programs: Vec<Program>) -> Self {
        let map = programs
            .into_iter()
            .map(|program| (program.id.clone(), program))
            .collect();
        Self {
            programs: Arc::new(Mutex::new(map)),
        }
    }

    /// Load a JSON array of programs, or the bundled sample catalog when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::from_programs(sample_programs()));
        };
        let raw = fs::read_to_string(path)?;
        let programs: Vec<Program> = serde_json::from_str(&raw)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        Ok(Self::from_programs(programs))
    }

    fn guard(&self) -> Result<MutexGuard<'_, HashMap<ProgramId, Program>>, CatalogError> {
        self.programs
            .lock()
            .map_err(|_| CatalogError::Unavailable("catalog mutex poisoned".to_string()))
    }
}

impl ProgramCatalog for InMemoryProgramCatalog {
    fn programs(&self) -> Result<Vec<Program>, CatalogError> {
        let guard = self.guard()?;
        let mut programs: Vec<Program> = guard.values().cloned().collect();
        programs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(programs)
    }

    fn program(&self, id: &ProgramId) -> Result<Option<Program>, CatalogError> {
        Ok(self.guard()?.get(id).cloned())
    }

    fn upsert_cutoffs(
        &self,
        id: &ProgramId,
        records: Vec<CutoffRecord>,
    ) -> Result<usize, CatalogError> {
        let mut guard = self.guard()?;
        let program = guard
            .get_mut(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        Ok(merge_cutoffs(&mut program.cutoff_history, records))
    }
}

fn verified(year: u16, cutoff: f64, quota: QuotaType) -> CutoffRecord {
    CutoffRecord {
        confidence: Some(DataConfidence::Verified),
        ..CutoffRecord::new(year, cutoff).with_quota(quota)
    }
}

fn sample_program(
    id: &str,
    name: &str,
    institution: &str,
    state: &str,
    institution_type: &str,
    catchment: &[&str],
    cutoff_history: Vec<CutoffRecord>,
) -> Program {
    Program {
        id: ProgramId(id.to_string()),
        name: name.to_string(),
        institution_name: institution.to_string(),
        institution_state: Some(state.to_string()),
        institution_type: Some(institution_type.to_string()),
        catchment_states: catchment.iter().map(|state| state.to_string()).collect(),
        elds_states: vec![
            "Bauchi".to_string(),
            "Jigawa".to_string(),
            "Kebbi".to_string(),
            "Yobe".to_string(),
            "Zamfara".to_string(),
        ],
        last_verified_on: NaiveDate::from_ymd_opt(2024, 10, 1),
        cutoff_history,
    }
}

/// Small catalog used when no catalog file is supplied.
pub(crate) fn sample_programs() -> Vec<Program> {
    use QuotaType::{Catchment, Elds, Merit};

    vec![
        sample_program(
            "medicine-ui",
            "Medicine and Surgery",
            "University of Ibadan",
            "Oyo",
            "federal",
            &["Oyo", "Osun", "Ogun"],
            vec![
                verified(2024, 78.5, Merit),
                verified(2023, 77.0, Merit),
                verified(2022, 76.2, Merit),
                verified(2024, 73.0, Catchment),
                verified(2024, 68.0, Elds),
            ],
        ),
        sample_program(
            "law-unilag",
            "Law",
            "University of Lagos",
            "Lagos",
            "federal",
            &["Lagos", "Ogun"],
            vec![
                verified(2024, 72.0, Merit),
                verified(2023, 71.5, Merit),
                verified(2024, 67.5, Catchment),
            ],
        ),
        sample_program(
            "computer-science-oau",
            "Computer Science",
            "Obafemi Awolowo University",
            "Osun",
            "federal",
            &["Osun", "Ondo", "Ekiti"],
            vec![
                verified(2024, 66.0, Merit),
                verified(2023, 63.5, Merit),
                verified(2022, 61.0, Merit),
            ],
        ),
        sample_program(
            "accounting-abu",
            "Accounting",
            "Ahmadu Bello University",
            "Kaduna",
            "federal",
            &["Kaduna", "Kano", "Katsina"],
            vec![
                verified(2024, 60.0, Merit),
                verified(2023, 59.0, Merit),
                verified(2024, 52.0, Elds),
            ],
        ),
        sample_program(
            "mass-comm-lasu",
            "Mass Communication",
            "Lagos State University",
            "Lagos",
            "state",
            &["Lagos"],
            vec![verified(2024, 58.0, Merit), verified(2022, 55.5, Merit)],
        ),
        sample_program(
            "agric-fuoye",
            "Agricultural Science",
            "Federal University Oye-Ekiti",
            "Ekiti",
            "federal",
            &["Ekiti"],
            vec![verified(2024, 47.0, Merit), verified(2023, 46.0, Merit)],
        ),
        sample_program(
            "nursing-covenant",
            "Nursing Science",
            "Covenant University",
            "Ogun",
            "private",
            &[],
            Vec::new(),
        ),
    ]
}

/// Parse a `SUBJECT=GRADE` pair supplied on the command line.
pub(crate) fn parse_grade(raw: &str) -> Result<(String, String), String> {
    let (subject, grade) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SUBJECT=GRADE, found '{raw}'"))?;
    let (subject, grade) = (subject.trim(), grade.trim());
    if subject.is_empty() || grade.is_empty() {
        return Err(format!("expected SUBJECT=GRADE, found '{raw}'"));
    }
    Ok((subject.to_string(), grade.to_string()))
}
