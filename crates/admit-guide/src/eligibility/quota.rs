use super::domain::{CutoffRecord, Program, QuotaType};
use super::states::state_listed;

/// Pick the slice of a program's history that applies to this candidate.
///
/// Catchment and ELDS cutoffs only apply to candidates from the listed
/// states. Everyone else is measured against merit (or untyped) cutoffs,
/// and a program that only publishes quota cutoffs falls back to its full
/// history.
pub(crate) fn applicable_history(program: &Program, state_of_origin: Option<&str>) -> Vec<CutoffRecord> {
    if let Some(state) = state_of_origin {
        let preferences = [
            (QuotaType::Catchment, &program.catchment_states),
            (QuotaType::Elds, &program.elds_states),
        ];
        for (quota, states) in preferences {
            if !state_listed(state, states) {
                continue;
            }
            let records = with_quota(program, |record| record.quota_type == Some(quota));
            if !records.is_empty() {
                return records;
            }
        }
    }

    let merit = with_quota(program, |record| {
        matches!(record.quota_type, None | Some(QuotaType::Merit))
    });
    if merit.is_empty() {
        program.cutoff_history.clone()
    } else {
        merit
    }
}

fn with_quota<F>(program: &Program, keep: F) -> Vec<CutoffRecord>
where
    F: Fn(&CutoffRecord) -> bool,
{
    program
        .cutoff_history
        .iter()
        .filter(|record| keep(record))
        .cloned()
        .collect()
}
