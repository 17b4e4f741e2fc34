use crate::eligibility::{CutoffRecord, Program, ProgramId, QuotaType};

/// Read/write access to the program catalog and its cutoff histories.
pub trait ProgramCatalog: Send + Sync {
    fn programs(&self) -> Result<Vec<Program>, CatalogError>;
    fn program(&self, id: &ProgramId) -> Result<Option<Program>, CatalogError>;
    /// Merge `records` into the program's history, returning how many were written.
    fn upsert_cutoffs(
        &self,
        id: &ProgramId,
        records: Vec<CutoffRecord>,
    ) -> Result<usize, CatalogError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("program {0} not found")]
    NotFound(ProgramId),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Merge incoming cutoffs into an existing history.
///
/// A record replaces any existing record with the same year and quota type;
/// later incoming records win over earlier ones. The history is left sorted
/// newest year first.
pub fn merge_cutoffs(history: &mut Vec<CutoffRecord>, incoming: Vec<CutoffRecord>) -> usize {
    let mut written = 0;
    for record in incoming {
        match history
            .iter_mut()
            .find(|existing| existing.year == record.year && existing.quota_type == record.quota_type)
        {
            Some(existing) => *existing = record,
            None => history.push(record),
        }
        written += 1;
    }

    history.sort_by(|a, b| {
        b.year
            .cmp(&a.year)
            .then_with(|| quota_rank(a).cmp(&quota_rank(b)))
    });
    written
}

fn quota_rank(record: &CutoffRecord) -> u8 {
    match record.quota_type {
        None => 0,
        Some(QuotaType::Merit) => 1,
        Some(QuotaType::Catchment) => 2,
        Some(QuotaType::Elds) => 3,
        Some(QuotaType::Other) => 4,
    }
}
