//! Claim line construction and rollups.
//!
//! Totals are only ever produced by [`compute_totals`] from the current lines,
//! so recomputing from the same claim always yields the same figures.

use chrono::{NaiveDate, Utc};
use insurance_service::{CoverageDecision, CoverageRequest, InsurancePlan, InsuranceService};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ClaimsResult, ValidationError};
use crate::models::{BillableRecord, Claim, ClaimItem, ClaimSection, ClaimTotals};

pub struct ClaimAggregator<'a> {
    insurance: &'a InsuranceService,
}

impl<'a> ClaimAggregator<'a> {
    pub fn new(insurance: &'a InsuranceService) -> Self {
        Self { insurance }
    }

    /// Price and resolve one billable record into a claim line.
    ///
    /// Coverage is resolved as of `service_date`, the encounter date.
    pub fn build_item(
        &self,
        plan: &InsurancePlan,
        record: &BillableRecord,
        service_date: NaiveDate,
        is_approved: bool,
    ) -> ClaimsResult<ClaimItem> {
        validate_quantity(record.quantity)?;
        if record.unit_price.is_sign_negative() {
            return Err(ValidationError::NegativeAmount { field: "unit_price", value: record.unit_price }.into());
        }

        let quote = self.insurance.quote_item(
            plan,
            record.item,
            &record.code,
            record.quantity,
            record.unit_price,
            service_date,
        )?;
        let mut item = ClaimItem {
            id: Uuid::new_v4(),
            source: record.source,
            item: record.item,
            code: quote.rule_code.clone(),
            internal_code: record.code.clone(),
            description: record.description.clone(),
            section: ClaimSection::for_kind(record.item.kind),
            quantity: record.quantity,
            unit_tariff: quote.unit_tariff,
            subtotal: Decimal::ZERO,
            is_covered: false,
            coverage_percentage: Decimal::ZERO,
            insurance_pays: Decimal::ZERO,
            patient_pays: Decimal::ZERO,
            unmapped: quote.decision.unmapped,
            coverage_basis: quote.decision.basis.clone(),
            requires_preauthorization: false,
            nhis_tariff_id: quote.tariff.as_ref().map(|tariff| tariff.id),
            nhis_code: quote.tariff.as_ref().map(|tariff| tariff.code.clone()),
            nhis_price: quote.tariff.as_ref().map(|tariff| tariff.price),
            is_approved,
            rejection_reason: None,
            dose: record.dose.clone(),
            frequency: record.frequency.clone(),
            duration: record.duration.clone(),
            item_date: record.service_date,
            added_at: Utc::now(),
        };
        apply_decision(&mut item, quote.decision);
        Ok(item)
    }

    /// Re-resolve a line after its quantity changed. The unit tariff and the
    /// stored NHIS price snapshot stay as they were.
    pub fn requote_item(&self, plan: &InsurancePlan, item: &mut ClaimItem, service_date: NaiveDate) -> ClaimsResult<()> {
        let request = CoverageRequest {
            category: item.item.kind.category(),
            item_code: Some(item.code.clone()),
            quantity: item.quantity,
            unit_price: item.unit_tariff,
            service_date,
            mapped: !item.unmapped,
        };
        let decision = self.insurance.resolve(&request, plan)?;
        apply_decision(item, decision);
        Ok(())
    }

    /// Replace the claim's totals with ones derived from its current lines
    pub fn recompute(&self, claim: &mut Claim, plan: &InsurancePlan) {
        claim.totals = compute_totals(claim, plan);
        debug!(
            claim_id = %claim.id,
            grand_total = %claim.totals.grand_total,
            insurance_covered = %claim.totals.insurance_covered_amount,
            unmapped = claim.totals.unmapped_count,
            "Recomputed claim totals"
        );
    }
}

pub fn validate_quantity(quantity: Decimal) -> Result<(), ValidationError> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::InvalidQuantity(quantity));
    }
    Ok(())
}

fn apply_decision(item: &mut ClaimItem, decision: CoverageDecision) {
    item.subtotal = decision.subtotal;
    item.is_covered = decision.is_covered;
    item.coverage_percentage = decision.coverage_percentage;
    item.insurance_pays = decision.insurer_amount;
    item.patient_pays = decision.patient_amount;
    item.coverage_basis = decision.basis;
    item.requires_preauthorization = decision.requires_preauthorization;
}

/// Rollups of a claim from its lines and G-DRG selection.
///
/// `grand_total` is the G-DRG amount plus the subtotal of every covered
/// line; uncovered lines add nothing to it and are reported through
/// `uncovered_amount` for patient billing.
pub fn compute_totals(claim: &Claim, plan: &InsurancePlan) -> ClaimTotals {
    let gdrg_amount = claim.gdrg.as_ref().map_or(Decimal::ZERO, |gdrg| gdrg.amount);
    let mut totals = ClaimTotals {
        gdrg_amount,
        insurance_covered_amount: gdrg_amount,
        approved_amount: gdrg_amount,
        ..ClaimTotals::default()
    };

    for item in &claim.items {
        if item.unmapped {
            totals.unmapped_count += 1;
        }
        if !item.is_covered {
            totals.uncovered_count += 1;
            totals.uncovered_amount += item.patient_pays;
            continue;
        }

        match item.section {
            ClaimSection::Investigations => totals.investigations_total += item.subtotal,
            ClaimSection::Prescriptions => totals.prescriptions_total += item.insurance_pays + item.patient_pays,
            ClaimSection::Procedures => totals.procedures_total += item.subtotal,
        }
        totals.insurance_covered_amount += item.insurance_pays;
        totals.patient_copay_amount += item.patient_pays;
        if item.is_approved && item.rejection_reason.is_none() {
            totals.approved_amount += item.insurance_pays;
        }
    }

    totals.grand_total =
        gdrg_amount + totals.investigations_total + totals.prescriptions_total + totals.procedures_total;
    totals.visit_limit_exceeded = plan
        .visit_limit
        .is_some_and(|limit| totals.insurance_covered_amount > limit);
    totals
}
