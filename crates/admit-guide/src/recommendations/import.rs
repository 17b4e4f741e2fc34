use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Deserializer};

use crate::eligibility::{AdmissionMode, CutoffRecord, DataConfidence, ProgramId, QuotaType};

/// Cutoff rows grouped by program, in file order within each program.
#[derive(Debug, Default)]
pub struct CutoffBatch {
    pub rows: usize,
    pub by_program: BTreeMap<ProgramId, Vec<CutoffRecord>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },
    #[error("import contained no cutoff rows")]
    Empty,
}

/// Parse a cutoff CSV with columns
/// `program_id,year,cutoff,quota_type,confidence,admission_mode`.
///
/// The last three columns are optional. Any invalid row rejects the whole
/// file so a partial import never reaches the catalog.
pub fn parse_cutoffs<R: Read>(reader: R) -> Result<CutoffBatch, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut record = csv::StringRecord::new();
    let mut batch = CutoffBatch::default();

    while csv_reader.read_record(&mut record)? {
        let row: CutoffRow = record.deserialize(Some(&headers))?;
        let line = record.position().map(|position| position.line()).unwrap_or_default();
        let (program_id, cutoff) = row
            .into_record()
            .map_err(|reason| ImportError::InvalidRow { line, reason })?;
        batch.by_program.entry(program_id).or_default().push(cutoff);
        batch.rows += 1;
    }

    if batch.rows == 0 {
        return Err(ImportError::Empty);
    }
    Ok(batch)
}

#[derive(Debug, Deserialize)]
struct CutoffRow {
    program_id: String,
    year: u16,
    cutoff: f64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    quota_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    confidence: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    admission_mode: Option<String>,
}

impl CutoffRow {
    fn into_record(self) -> Result<(ProgramId, CutoffRecord), String> {
        if self.program_id.is_empty() {
            return Err("program_id is required".to_string());
        }
        if self.year == 0 {
            return Err("year must be positive".to_string());
        }
        if !(self.cutoff > 0.0 && self.cutoff <= 100.0) {
            return Err(format!("cutoff must be within (0, 100], found {}", self.cutoff));
        }

        let confidence = match self.confidence.as_deref() {
            Some(value) => Some(
                DataConfidence::parse(value)
                    .ok_or_else(|| format!("unknown confidence '{value}'"))?,
            ),
            None => None,
        };
        let admission_mode = match self.admission_mode.as_deref() {
            Some(value) => Some(
                AdmissionMode::parse(value)
                    .ok_or_else(|| format!("unknown admission mode '{value}'"))?,
            ),
            None => None,
        };

        Ok((
            ProgramId(self.program_id),
            CutoffRecord {
                year: self.year,
                cutoff_score: self.cutoff,
                quota_type: self.quota_type.as_deref().and_then(QuotaType::parse),
                confidence,
                admission_mode,
            },
        ))
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
