use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::*;

/// Per-section rollup shown on the claim form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSummary {
    pub section: ClaimSection,
    pub item_count: usize,
    pub subtotal: Decimal,
    pub insurance_pays: Decimal,
    pub patient_pays: Decimal,
}

/// Claim read model for rendering and export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimSummary {
    pub claim_id: Uuid,
    pub claim_number: String,
    pub status: ClaimStatus,
    pub currency: String,
    pub patient_id: Uuid,
    pub plan_id: Uuid,
    pub primary_diagnosis: Option<String>,
    pub diagnosis_codes: Vec<String>,
    pub gdrg_code: Option<String>,
    pub item_count: usize,
    pub sections: Vec<SectionSummary>,
    pub totals: ClaimTotals,
    /// Lines needing preauthorization before the scheme will pay
    pub preauthorization_required: Vec<String>,
    pub batch_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

pub fn summarize_claim(claim: &Claim, currency: &str) -> ClaimSummary {
    let sections = [ClaimSection::Investigations, ClaimSection::Prescriptions, ClaimSection::Procedures]
        .into_iter()
        .map(|section| {
            let lines = claim.items.iter().filter(|item| item.section == section);
            let mut summary = SectionSummary {
                section,
                item_count: 0,
                subtotal: Decimal::ZERO,
                insurance_pays: Decimal::ZERO,
                patient_pays: Decimal::ZERO,
            };
            for item in lines {
                summary.item_count += 1;
                summary.subtotal += item.subtotal;
                summary.insurance_pays += item.insurance_pays;
                summary.patient_pays += item.patient_pays;
            }
            summary
        })
        .filter(|summary| summary.item_count > 0)
        .collect();

    ClaimSummary {
        claim_id: claim.id,
        claim_number: claim.claim_number.clone(),
        status: claim.status,
        currency: currency.to_string(),
        patient_id: claim.patient_id,
        plan_id: claim.plan_id,
        primary_diagnosis: claim.primary_diagnosis().map(|diagnosis| diagnosis.code.clone()),
        diagnosis_codes: claim.diagnoses.iter().map(|diagnosis| diagnosis.code.clone()).collect(),
        gdrg_code: claim.gdrg.as_ref().map(|gdrg| gdrg.code.clone()),
        item_count: claim.items.len(),
        sections,
        totals: claim.totals.clone(),
        preauthorization_required: claim
            .items
            .iter()
            .filter(|item| item.requires_preauthorization)
            .map(|item| item.code.clone())
            .collect(),
        batch_id: claim.batch_id,
        updated_at: claim.updated_at,
    }
}

/// One billed line as sent to the scheme
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedLine {
    pub code: String,
    pub description: String,
    pub section: ClaimSection,
    pub quantity: Decimal,
    pub unit_tariff: Decimal,
    pub subtotal: Decimal,
    pub insurance_pays: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedClaim {
    pub claim_number: String,
    pub membership_number: Option<String>,
    pub encounter_kind: EncounterKind,
    pub service_date: chrono::NaiveDate,
    /// Amount snapshotted when the claim joined the batch
    pub claim_amount: Decimal,
    pub status: BatchItemStatus,
    pub primary_diagnosis: Option<String>,
    pub diagnosis_codes: Vec<String>,
    pub gdrg_code: Option<String>,
    pub gdrg_amount: Decimal,
    pub lines: Vec<SubmittedLine>,
}

/// Batch read model for external submission packaging
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSubmissionPackage {
    pub batch_number: String,
    pub provider_id: Uuid,
    pub status: BatchStatus,
    pub currency: String,
    pub total_claims: usize,
    pub total_amount: Decimal,
    pub submitted_at: Option<DateTime<Utc>>,
    pub claims: Vec<SubmittedClaim>,
}

/// Build the package from a batch and its member claims. Members whose
/// claim is not in `claims` are skipped.
pub fn package_batch(batch: &ClaimBatch, claims: &[Claim], currency: &str) -> BatchSubmissionPackage {
    let submitted = batch
        .items
        .iter()
        .filter_map(|member| {
            let claim = claims.iter().find(|claim| claim.id == member.claim_id)?;
            Some(SubmittedClaim {
                claim_number: member.claim_number.clone(),
                membership_number: claim.membership_number.clone(),
                encounter_kind: claim.encounter.kind,
                service_date: claim.encounter.service_date,
                claim_amount: member.claim_amount,
                status: member.status,
                primary_diagnosis: claim.primary_diagnosis().map(|diagnosis| diagnosis.code.clone()),
                diagnosis_codes: claim.diagnoses.iter().map(|diagnosis| diagnosis.code.clone()).collect(),
                gdrg_code: claim.gdrg.as_ref().map(|gdrg| gdrg.code.clone()),
                gdrg_amount: claim.totals.gdrg_amount,
                lines: claim
                    .items
                    .iter()
                    .filter(|item| item.is_covered && item.rejection_reason.is_none())
                    .map(|item| SubmittedLine {
                        code: item.code.clone(),
                        description: item.description.clone(),
                        section: item.section,
                        quantity: item.quantity,
                        unit_tariff: item.unit_tariff,
                        subtotal: item.subtotal,
                        insurance_pays: item.insurance_pays,
                    })
                    .collect(),
            })
        })
        .collect();

    BatchSubmissionPackage {
        batch_number: batch.batch_number.clone(),
        provider_id: batch.provider_id,
        status: batch.status,
        currency: currency.to_string(),
        total_claims: batch.total_claims,
        total_amount: batch.total_amount,
        submitted_at: batch.submitted_at,
        claims: submitted,
    }
}
