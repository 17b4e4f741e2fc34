use crate::infra::{parse_grade, InMemoryProgramCatalog};
use admit_guide::config::AppConfig;
use admit_guide::eligibility::{CandidateProfile, EligibilityEngine, ProgramId, RecommendationFilter};
use admit_guide::error::AppError;
use admit_guide::recommendations::{
    EligibilityReport, EligibilityRequest, RecommendationRequest, RecommendationResponse,
    RecommendationService,
};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Args, Debug)]
pub(crate) struct CandidateArgs {
    /// UTME score (0-400)
    #[arg(long)]
    pub(crate) utme: u16,
    /// O-level result as SUBJECT=GRADE; repeat for each subject
    #[arg(long = "grade", value_parser = parse_grade)]
    pub(crate) grades: Vec<(String, String)>,
    /// Post-UTME screening score
    #[arg(long)]
    pub(crate) post_utme: Option<f64>,
    /// State of origin, used for catchment and ELDS quotas
    #[arg(long)]
    pub(crate) state: Option<String>,
    /// JSON program catalog (defaults to the bundled sample)
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

impl CandidateArgs {
    fn profile(&self) -> CandidateProfile {
        CandidateProfile {
            utme_score: self.utme,
            o_level_grades: self.grades.iter().cloned().collect(),
            post_utme_score: self.post_utme,
            state_of_origin: self.state.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct RecommendArgs {
    #[command(flatten)]
    pub(crate) candidate: CandidateArgs,
    /// Maximum number of programs to list
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    /// Drop programs below this admission probability (0-1)
    #[arg(long)]
    pub(crate) min_probability: Option<f64>,
    /// Only list programs at institutions in this state
    #[arg(long)]
    pub(crate) institution_state: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct EligibilityArgs {
    #[command(flatten)]
    pub(crate) candidate: CandidateArgs,
    /// Program identifier from the catalog
    #[arg(long)]
    pub(crate) program: String,
}

fn build_service(
    catalog: Option<&PathBuf>,
) -> Result<RecommendationService<InMemoryProgramCatalog>, AppError> {
    let config = AppConfig::load()?;
    let engine = EligibilityEngine::new(config.engine)?;
    let catalog = Arc::new(InMemoryProgramCatalog::load(catalog.map(PathBuf::as_path))?);
    Ok(RecommendationService::new(
        catalog,
        engine,
        config.cache,
        config.rate_limit,
    ))
}

pub(crate) fn run_recommend(args: RecommendArgs) -> Result<(), AppError> {
    let service = build_service(args.candidate.catalog.as_ref())?;
    let request = RecommendationRequest {
        profile: args.candidate.profile(),
        limit: args.limit,
        filters: RecommendationFilter {
            min_probability: args.min_probability,
            institution_state: args.institution_state,
            ..RecommendationFilter::default()
        },
    };

    let response = service.recommend(&request, Instant::now())?;
    render_recommendations(&response);
    Ok(())
}

pub(crate) fn run_eligibility(args: EligibilityArgs) -> Result<(), AppError> {
    let service = build_service(args.candidate.catalog.as_ref())?;
    let request = EligibilityRequest {
        profile: args.candidate.profile(),
        program_id: ProgramId(args.program),
    };

    let response = service.eligibility(&request)?;
    render_eligibility(&response.data);
    Ok(())
}

fn render_recommendations(response: &RecommendationResponse) {
    println!("Program recommendations");
    println!(
        "Composite score: {:.2} | {} of {} programs listed",
        response.meta.composite_score, response.meta.recommended, response.meta.total_programs
    );

    if response.data.is_empty() {
        println!("\nNo programs matched the requested filters.");
        return;
    }

    println!();
    for (position, item) in response.data.iter().enumerate() {
        let (low, high) = item.eligibility.confidence_interval;
        println!(
            "{:>2}. {} - {} [{}] {:.0}% ({:.0}-{:.0}%){}",
            position + 1,
            item.program_name,
            item.institution_name,
            item.eligibility.category.label().to_ascii_uppercase(),
            item.eligibility.probability * 100.0,
            low * 100.0,
            high * 100.0,
            if item.eligibility.low_confidence {
                " low confidence"
            } else {
                ""
            }
        );
    }
}

fn render_eligibility(report: &EligibilityReport) {
    let (low, high) = report.confidence_interval;
    println!("{} - {}", report.program_name, report.institution_name);
    println!("Composite score: {:.2}", report.composite_score);
    println!(
        "Admission probability: {:.0}% (range {:.0}-{:.0}%)",
        report.probability * 100.0,
        low * 100.0,
        high * 100.0
    );
    println!("Category: {}", report.category.label().to_ascii_uppercase());
    println!(
        "Data: {} year(s) of cutoffs{}",
        report.data_quality.years_of_data,
        report
            .data_quality
            .last_verified_on
            .map(|date| format!(", last verified {date}"))
            .unwrap_or_default()
    );
    if report.low_confidence {
        println!("Warning: limited cutoff history, treat this estimate with caution.");
    }
    println!("\n{}", report.rationale);
}
