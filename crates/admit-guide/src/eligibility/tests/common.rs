use std::collections::BTreeMap;

use crate::eligibility::{
    CandidateProfile, CutoffRecord, EligibilityEngine, EngineConfig, Program, ProgramId,
};

pub(super) fn engine() -> EligibilityEngine {
    EligibilityEngine::new(EngineConfig::default()).expect("default config is valid")
}

pub(super) fn strong_grades() -> BTreeMap<String, String> {
    [
        ("English Language", "B3"),
        ("Mathematics", "A1"),
        ("Physics", "B2"),
        ("Chemistry", "C4"),
        ("Biology", "B3"),
    ]
    .into_iter()
    .map(|(subject, grade)| (subject.to_string(), grade.to_string()))
    .collect()
}

pub(super) fn candidate(utme_score: u16) -> CandidateProfile {
    CandidateProfile {
        utme_score,
        o_level_grades: strong_grades(),
        post_utme_score: None,
        state_of_origin: Some("Oyo".to_string()),
    }
}

pub(super) fn program(id: &str, history: &[(u16, f64)]) -> Program {
    Program {
        id: ProgramId(id.to_string()),
        name: format!("Program {id}"),
        institution_name: "University of Ibadan".to_string(),
        institution_state: Some("Oyo".to_string()),
        institution_type: Some("federal".to_string()),
        catchment_states: Vec::new(),
        elds_states: Vec::new(),
        last_verified_on: None,
        cutoff_history: history
            .iter()
            .map(|(year, cutoff)| CutoffRecord::new(*year, *cutoff))
            .collect(),
    }
}

/// Twelve programs with spread-out cutoffs, listed hardest first.
pub(super) fn catalog() -> Vec<Program> {
    (0..12u16)
        .map(|index| {
            let cutoff = 80.0 - f64::from(index) * 3.0;
            program(
                &format!("prog-{index:02}"),
                &[(2024, cutoff), (2023, cutoff - 1.0), (2022, cutoff - 2.5)],
            )
        })
        .collect()
}
