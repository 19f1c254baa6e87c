use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use claims_service::{Claim, ClaimStatus, ClaimsEngine, ClaimsError};
use config_engine::{ConfigEngine, ConfigError, EngineSettings};
use error_common::{report_error, RustCareError};
use insurance_service::{InsuranceError, InsuranceService};

use crate::cli::OutputFormat;
use crate::scenario::Scenario;

const ACTOR: &str = "rustcare-claims";

/// Approval readiness of a scenario claim after it is submitted for vetting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalReport {
    pub claim_number: String,
    pub status: ClaimStatus,
    pub approvable: bool,
    pub blockers: Vec<String>,
}

/// Defaults, then the optional settings file, then `RUSTCARE_*` variables
pub fn load_settings(path: Option<&Path>) -> Result<EngineSettings> {
    let mut engine = ConfigEngine::new();
    if let Some(path) = path {
        engine = engine.with_file(path);
    }
    engine.load().context("cannot load engine settings")
}

/// Open the scenario claim on a fresh in-memory engine
pub async fn quote(settings: EngineSettings, scenario: &Scenario) -> Result<(ClaimsEngine, Claim)> {
    let insurance = Arc::new(InsuranceService::new());
    let loaded = scenario.install(&insurance)?;
    let engine = ClaimsEngine::new(settings, insurance);

    let claim = engine.create_claim(loaded.claim, ACTOR).await.map_err(|err| reported("quote", err))?;
    info!(
        claim_number = %claim.claim_number,
        items = claim.items.len(),
        grand_total = %claim.totals.grand_total,
        "Quoted scenario claim"
    );
    Ok((engine, claim))
}

pub async fn check_approval(settings: EngineSettings, scenario: &Scenario) -> Result<ApprovalReport> {
    let (engine, claim) = quote(settings, scenario).await?;
    let claim = engine
        .submit_for_vetting(claim.id, ACTOR)
        .await
        .map_err(|err| reported("check-approval", err))?;
    let blockers = engine
        .approval_blockers(claim.id)
        .await
        .map_err(|err| reported("check-approval", err))?;

    Ok(ApprovalReport {
        claim_number: claim.claim_number,
        status: claim.status,
        approvable: blockers.is_empty(),
        blockers: blockers.iter().map(ToString::to_string).collect(),
    })
}

pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).context("cannot render JSON"),
        OutputFormat::Yaml => serde_yaml::to_string(value).context("cannot render YAML"),
    }
}

/// Category and code of an engine error carried inside `err`, if any
pub fn classify(err: &anyhow::Error) -> Option<RustCareError> {
    if let Some(claims) = err.downcast_ref::<ClaimsError>() {
        return Some(RustCareError::from_categorized(claims));
    }
    if let Some(insurance) = err.downcast_ref::<InsuranceError>() {
        return Some(RustCareError::from_categorized(insurance));
    }
    err.downcast_ref::<ConfigError>().map(RustCareError::from_categorized)
}

fn reported(context: &str, err: ClaimsError) -> anyhow::Error {
    report_error(context, &err);
    err.into()
}
