use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Highest attainable UTME score.
pub const UTME_MAX: u16 = 400;

/// Identifier wrapper for catalog programs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProgramId(pub String);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Applicant-supplied scores evaluated against the program catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub utme_score: u16,
    #[serde(default)]
    pub o_level_grades: BTreeMap<String, String>,
    #[serde(default)]
    pub post_utme_score: Option<f64>,
    #[serde(default)]
    pub state_of_origin: Option<String>,
}

/// WAEC/NECO ordinal grade, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A1,
    B2,
    B3,
    C4,
    C5,
    C6,
    D7,
    E8,
    F9,
}

impl Grade {
    pub const ALL: [Grade; 9] = [
        Grade::A1,
        Grade::B2,
        Grade::B3,
        Grade::C4,
        Grade::C5,
        Grade::C6,
        Grade::D7,
        Grade::E8,
        Grade::F9,
    ];

    /// Fixed point table. D7 and below never earn points.
    pub fn points(self) -> u8 {
        match self {
            Grade::A1 => 6,
            Grade::B2 => 5,
            Grade::B3 => 4,
            Grade::C4 => 3,
            Grade::C5 => 2,
            Grade::C6 => 1,
            Grade::D7 | Grade::E8 | Grade::F9 => 0,
        }
    }

    pub const MAX_POINTS: u8 = 6;

    /// True when this grade is at least as good as `threshold`.
    pub fn meets(self, threshold: Grade) -> bool {
        self <= threshold
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::A1 => "A1",
            Grade::B2 => "B2",
            Grade::B3 => "B3",
            Grade::C4 => "C4",
            Grade::C5 => "C5",
            Grade::C6 => "C6",
            Grade::D7 => "D7",
            Grade::E8 => "E8",
            Grade::F9 => "F9",
        }
    }
}

impl FromStr for Grade {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Grade::ALL
            .into_iter()
            .find(|grade| grade.label() == normalized)
            .ok_or(())
    }
}

/// Admission policy bucket a cutoff was published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaType {
    Merit,
    Catchment,
    Elds,
    #[serde(other)]
    Other,
}

impl QuotaType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "merit" => Some(Self::Merit),
            "catchment" => Some(Self::Catchment),
            "elds" => Some(Self::Elds),
            _ => Some(Self::Other),
        }
    }
}

/// How trustworthy a published cutoff is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataConfidence {
    Verified,
    Estimated,
    Unverified,
}

impl DataConfidence {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "verified" => Some(Self::Verified),
            "estimated" => Some(Self::Estimated),
            "unverified" => Some(Self::Unverified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    Utme,
    PostUtme,
    DirectEntry,
}

impl AdmissionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "utme" => Some(Self::Utme),
            "post_utme" => Some(Self::PostUtme),
            "direct_entry" => Some(Self::DirectEntry),
            _ => None,
        }
    }
}

/// Historical admission cutoff for one program and year, on the composite 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoffRecord {
    pub year: u16,
    pub cutoff_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_type: Option<QuotaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<DataConfidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_mode: Option<AdmissionMode>,
}

impl CutoffRecord {
    pub fn new(year: u16, cutoff_score: f64) -> Self {
        Self {
            year,
            cutoff_score,
            quota_type: None,
            confidence: None,
            admission_mode: None,
        }
    }

    pub fn with_quota(mut self, quota_type: QuotaType) -> Self {
        self.quota_type = Some(quota_type);
        self
    }

    pub(crate) fn is_usable(&self) -> bool {
        self.year > 0 && self.cutoff_score.is_finite() && self.cutoff_score > 0.0
    }
}

/// Catalog entry together with the cutoff history it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub institution_name: String,
    #[serde(default)]
    pub institution_state: Option<String>,
    #[serde(default)]
    pub institution_type: Option<String>,
    #[serde(default)]
    pub catchment_states: Vec<String>,
    #[serde(default)]
    pub elds_states: Vec<String>,
    #[serde(default)]
    pub last_verified_on: Option<NaiveDate>,
    #[serde(default)]
    pub cutoff_history: Vec<CutoffRecord>,
}

impl Program {
    /// Most recent usable cutoff record, regardless of quota.
    pub fn latest_cutoff(&self) -> Option<&CutoffRecord> {
        self.cutoff_history
            .iter()
            .filter(|record| record.is_usable())
            .max_by_key(|record| record.year)
    }
}

/// Safe/target/reach bucket derived from the admission probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Safe,
    Target,
    Reach,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Safe => "safe",
            Category::Target => "target",
            Category::Reach => "reach",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Eligibility of one candidate for one program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramEligibility {
    pub probability: f64,
    pub category: Category,
    pub composite_score: f64,
    pub confidence_interval: (f64, f64),
    pub low_confidence: bool,
}
