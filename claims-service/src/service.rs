use chrono::Utc;
use config_engine::EngineSettings;
use events_bus::EventBus;
use insurance_service::{InsurancePlan, InsuranceService, TariffScheme};
use logger_redacted::{redacted_info, redacted_warn, PiiRedactor};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator::{validate_quantity, ClaimAggregator};
use crate::error::{ClaimsError, ClaimsResult, ValidationError};
use crate::events::TransitionPublisher;
use crate::history::{ClaimStatusHistory, InMemoryStatusHistoryLog, StatusHistoryLog};
use crate::lifecycle::{self, ClaimAction};
use crate::locks::LockTable;
use crate::models::*;
use crate::numbering::NumberSequence;
use crate::repository::{BatchRepository, ClaimRepository, InMemoryBatchRepository, InMemoryClaimRepository};
use crate::reporting::{summarize_claim, ClaimSummary};

/// Claims engine
///
/// Drives claims from draft to completion and groups vetted claims into
/// submission batches. Every mutation of a claim runs under that claim's
/// lock; totals are recomputed from the lines after every write.
pub struct ClaimsEngine {
    pub(crate) settings: EngineSettings,
    pub(crate) insurance: Arc<InsuranceService>,
    pub(crate) claims: Arc<dyn ClaimRepository>,
    pub(crate) batches: Arc<dyn BatchRepository>,
    pub(crate) history: Arc<dyn StatusHistoryLog>,
    pub(crate) publisher: TransitionPublisher,
    pub(crate) locks: LockTable,
    pub(crate) numbers: NumberSequence,
    pub(crate) redactor: PiiRedactor,
}

impl ClaimsEngine {
    /// Create an engine backed by in-memory repositories
    pub fn new(settings: EngineSettings, insurance: Arc<InsuranceService>) -> Self {
        let redactor = PiiRedactor::new(settings.logging.redaction());
        Self {
            settings,
            insurance,
            claims: Arc::new(InMemoryClaimRepository::new()),
            batches: Arc::new(InMemoryBatchRepository::new()),
            history: Arc::new(InMemoryStatusHistoryLog::new()),
            publisher: TransitionPublisher::new(Arc::new(EventBus::new())),
            locks: LockTable::new(),
            numbers: NumberSequence::new(),
            redactor,
        }
    }

    pub fn with_claim_repository(mut self, claims: Arc<dyn ClaimRepository>) -> Self {
        self.claims = claims;
        self
    }

    pub fn with_batch_repository(mut self, batches: Arc<dyn BatchRepository>) -> Self {
        self.batches = batches;
        self
    }

    pub fn with_history_log(mut self, history: Arc<dyn StatusHistoryLog>) -> Self {
        self.history = history;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.publisher = TransitionPublisher::new(bus);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn insurance(&self) -> &InsuranceService {
        &self.insurance
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        self.publisher.bus()
    }

    /// Open a draft claim on an encounter.
    ///
    /// All source records are attached or none are.
    pub async fn create_claim(&self, input: NewClaim, actor: &str) -> ClaimsResult<Claim> {
        let plan = self.insurance.get_plan(input.plan_id)?;
        let service_date = input.encounter.service_date;
        if !plan.is_effective_on(service_date) {
            return Err(ValidationError::PlanNotEffective { plan_id: plan.id, date: service_date }.into());
        }

        let now = Utc::now();
        let mut claim = Claim {
            id: Uuid::new_v4(),
            claim_number: String::new(),
            patient_id: input.patient_id,
            membership_number: input.membership_number,
            plan_id: plan.id,
            encounter: input.encounter,
            status: ClaimStatus::Draft,
            diagnoses: Vec::new(),
            items: Vec::new(),
            gdrg: None,
            totals: ClaimTotals::default(),
            rejection_reason: None,
            batch_id: None,
            cloned_from: None,
            vetted_by: None,
            vetted_at: None,
            created_at: now,
            updated_at: now,
        };

        for diagnosis in input.diagnoses {
            add_diagnosis_to(&mut claim, diagnosis)?;
        }
        if let Some(code) = input.gdrg_code.as_deref() {
            self.select_gdrg(&mut claim, code)?;
        }

        let aggregator = ClaimAggregator::new(&self.insurance);
        for record in &input.records {
            ensure_same_encounter(&claim, record)?;
            if claim.items.iter().any(|item| item.source == record.source) {
                return Err(ClaimsError::ItemAlreadyClaimed { record: record.source, claim_id: claim.id });
            }
            let item = aggregator.build_item(&plan, record, service_date, true)?;
            claim.items.push(item);
        }
        aggregator.recompute(&mut claim, &plan);

        self.reserve_all(&claim).await?;
        claim.claim_number = self.numbers.next(&self.settings.claim_number_prefix, now, 5);

        let entry = ClaimStatusHistory::new(claim.id, None, ClaimStatus::Draft, actor, None);
        let stored = match self.history.append_claim(entry).await {
            Ok(()) => self.claims.insert(claim.clone()).await,
            Err(err) => Err(err),
        };
        if let Err(err) = stored {
            self.release_all(&claim).await;
            return Err(err);
        }

        redacted_info!(
            self.redactor,
            "Opened claim {} for NHIS {} with {} items",
            claim.claim_number,
            claim.membership_number.as_deref().unwrap_or("-"),
            claim.items.len()
        );
        self.publisher.claim_status_changed(&claim, None, actor);
        Ok(claim)
    }

    pub async fn get_claim(&self, claim_id: Uuid) -> ClaimsResult<Claim> {
        self.claims.get(claim_id).await
    }

    pub async fn claims_with_status(&self, status: ClaimStatus) -> ClaimsResult<Vec<Claim>> {
        self.claims.list_by_status(status).await
    }

    pub async fn claim_history(&self, claim_id: Uuid) -> ClaimsResult<Vec<ClaimStatusHistory>> {
        self.history.claim_history(claim_id).await
    }

    pub async fn claim_summary(&self, claim_id: Uuid) -> ClaimsResult<ClaimSummary> {
        let claim = self.claims.get(claim_id).await?;
        Ok(summarize_claim(&claim, &self.settings.currency))
    }

    /// Attach a billable record to a claim as a new line
    pub async fn add_item(&self, claim_id: Uuid, record: BillableRecord) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        ensure_editable(&claim)?;
        ensure_same_encounter(&claim, &record)?;
        if claim.items.iter().any(|item| item.source == record.source) {
            return Err(ClaimsError::ItemAlreadyClaimed { record: record.source, claim_id });
        }

        let plan = self.plan_for(&claim)?;
        let aggregator = ClaimAggregator::new(&self.insurance);
        let approved = !plan.require_explicit_approval_for_new_items;
        let item = aggregator.build_item(&plan, &record, claim.encounter.service_date, approved)?;

        self.claims.reserve_source(record.source, claim_id).await?;
        if claim.status == ClaimStatus::Vetted {
            if let Some(tariff_id) = item.nhis_tariff_id {
                self.insurance.lock_tariff(tariff_id)?;
            }
        }
        claim.items.push(item);
        aggregator.recompute(&mut claim, &plan);
        claim.touch();

        if let Err(err) = self.claims.save(&claim).await {
            self.claims.release_source(record.source, claim_id).await?;
            return Err(err);
        }
        info!(claim_id = %claim_id, source = %record.source, approved, "Added claim item");
        Ok(claim)
    }

    /// Drop a line while the claim is in draft or pending vetting.
    /// The source record becomes claimable again.
    pub async fn remove_item(&self, claim_id: Uuid, item_id: Uuid) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        ensure_removable(&claim)?;
        let index = claim
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(ClaimsError::ItemNotFound { claim_id, item_id })?;

        let plan = self.plan_for(&claim)?;
        let removed = claim.items.remove(index);
        ClaimAggregator::new(&self.insurance).recompute(&mut claim, &plan);
        claim.touch();
        self.claims.save(&claim).await?;
        self.claims.release_source(removed.source, claim_id).await?;

        info!(claim_id = %claim_id, item_id = %item_id, "Removed claim item");
        Ok(claim)
    }

    /// Edit a line. A quantity change re-resolves coverage at the line's
    /// fixed unit tariff; the other fields are metadata.
    pub async fn update_item(&self, claim_id: Uuid, item_id: Uuid, update: ItemUpdate) -> ClaimsResult<Claim> {
        if let Some(quantity) = update.quantity {
            validate_quantity(quantity)?;
        }

        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        ensure_editable(&claim)?;
        let plan = self.plan_for(&claim)?;
        let service_date = claim.encounter.service_date;
        let aggregator = ClaimAggregator::new(&self.insurance);

        let item = claim.item_mut(item_id).ok_or(ClaimsError::ItemNotFound { claim_id, item_id })?;
        if let Some(dose) = update.dose {
            item.dose = Some(dose);
        }
        if let Some(frequency) = update.frequency {
            item.frequency = Some(frequency);
        }
        if let Some(duration) = update.duration {
            item.duration = Some(duration);
        }
        if let Some(item_date) = update.item_date {
            item.item_date = item_date;
        }
        if let Some(quantity) = update.quantity {
            item.quantity = quantity;
            aggregator.requote_item(&plan, item, service_date)?;
        }

        aggregator.recompute(&mut claim, &plan);
        claim.touch();
        self.claims.save(&claim).await?;
        Ok(claim)
    }

    /// Approve one line for payment
    pub async fn approve_item(&self, claim_id: Uuid, item_id: Uuid) -> ClaimsResult<Claim> {
        self.set_item_approval(claim_id, item_id, None).await
    }

    /// Exclude one line from the approved amount
    pub async fn reject_item(&self, claim_id: Uuid, item_id: Uuid, reason: &str) -> ClaimsResult<Claim> {
        let reason = lifecycle::require_reason(reason)?;
        self.set_item_approval(claim_id, item_id, Some(reason)).await
    }

    async fn set_item_approval(&self, claim_id: Uuid, item_id: Uuid, rejection: Option<String>) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        ensure_editable(&claim)?;
        let plan = self.plan_for(&claim)?;

        let item = claim.item_mut(item_id).ok_or(ClaimsError::ItemNotFound { claim_id, item_id })?;
        item.is_approved = rejection.is_none();
        item.rejection_reason = rejection;

        ClaimAggregator::new(&self.insurance).recompute(&mut claim, &plan);
        claim.touch();
        self.claims.save(&claim).await?;
        Ok(claim)
    }

    /// Vetted claims accept secondary diagnoses only
    pub async fn add_diagnosis(&self, claim_id: Uuid, diagnosis: NewDiagnosis) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        ensure_editable(&claim)?;
        if diagnosis.is_primary {
            ensure_removable(&claim)?;
        }
        add_diagnosis_to(&mut claim, diagnosis)?;
        claim.touch();
        self.claims.save(&claim).await?;
        Ok(claim)
    }

    pub async fn remove_diagnosis(&self, claim_id: Uuid, diagnosis_id: Uuid) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        ensure_removable(&claim)?;
        let index = claim
            .diagnoses
            .iter()
            .position(|diagnosis| diagnosis.id == diagnosis_id)
            .ok_or(ClaimsError::DiagnosisNotFound { claim_id, diagnosis_id })?;
        claim.diagnoses.remove(index);
        claim.touch();
        self.claims.save(&claim).await?;
        Ok(claim)
    }

    /// Make one diagnosis the primary, demoting any other
    pub async fn set_primary_diagnosis(&self, claim_id: Uuid, diagnosis_id: Uuid) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        ensure_removable(&claim)?;
        if !claim.diagnoses.iter().any(|diagnosis| diagnosis.id == diagnosis_id) {
            return Err(ClaimsError::DiagnosisNotFound { claim_id, diagnosis_id });
        }
        for diagnosis in &mut claim.diagnoses {
            diagnosis.is_primary = diagnosis.id == diagnosis_id;
        }
        claim.touch();
        self.claims.save(&claim).await?;
        Ok(claim)
    }

    /// Attach the G-DRG case rate for `code`, snapshotting its price
    pub async fn set_gdrg(&self, claim_id: Uuid, code: &str) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        ensure_editable(&claim)?;
        let plan = self.plan_for(&claim)?;

        let tariff_id = self.select_gdrg(&mut claim, code)?;
        if claim.status == ClaimStatus::Vetted {
            self.insurance.lock_tariff(tariff_id)?;
        }
        ClaimAggregator::new(&self.insurance).recompute(&mut claim, &plan);
        claim.touch();
        self.claims.save(&claim).await?;
        Ok(claim)
    }

    pub async fn clear_gdrg(&self, claim_id: Uuid) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        ensure_removable(&claim)?;
        let plan = self.plan_for(&claim)?;

        claim.gdrg = None;
        ClaimAggregator::new(&self.insurance).recompute(&mut claim, &plan);
        claim.touch();
        self.claims.save(&claim).await?;
        Ok(claim)
    }

    pub async fn submit_for_vetting(&self, claim_id: Uuid, actor: &str) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        let previous = lifecycle::transition(&mut claim, ClaimAction::SubmitForVetting, self.settings.batch_rejection_policy)?;
        self.commit_claim(&claim, previous, actor, None).await?;
        Ok(claim)
    }

    /// Approval guards the claim currently fails; empty when it can be approved
    pub async fn approval_blockers(&self, claim_id: Uuid) -> ClaimsResult<Vec<ValidationError>> {
        let claim = self.claims.get(claim_id).await?;
        let plan = self.plan_for(&claim)?;
        Ok(lifecycle::approval_blockers(&claim, &plan, self.settings.national_scheme_requires_gdrg))
    }

    /// Vet a claim. Tariffs priced into its lines are frozen from here on.
    pub async fn approve_claim(&self, claim_id: Uuid, actor: &str) -> ClaimsResult<Claim> {
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        let plan = self.plan_for(&claim)?;
        let policy = self.settings.batch_rejection_policy;

        if lifecycle::target_status(claim.status, ClaimAction::Approve, policy).is_some() {
            let blockers = lifecycle::approval_blockers(&claim, &plan, self.settings.national_scheme_requires_gdrg);
            if let Some(blocker) = blockers.into_iter().next() {
                warn!(claim_id = %claim_id, guard = %blocker, "Claim approval blocked");
                return Err(blocker.into());
            }
        }
        let previous = lifecycle::transition(&mut claim, ClaimAction::Approve, policy)?;

        for tariff_id in claim.items.iter().filter_map(|item| item.nhis_tariff_id) {
            self.insurance.lock_tariff(tariff_id)?;
        }
        if let Some(gdrg) = &claim.gdrg {
            self.insurance.lock_tariff(gdrg.tariff_id)?;
        }
        claim.vetted_by = Some(actor.to_string());
        claim.vetted_at = Some(Utc::now());

        self.commit_claim(&claim, previous, actor, None).await?;
        Ok(claim)
    }

    /// Reject a claim during vetting. Its source records become claimable again.
    pub async fn reject_claim(&self, claim_id: Uuid, reason: &str, actor: &str) -> ClaimsResult<Claim> {
        let reason = lifecycle::require_reason(reason)?;
        let _guard = self.locks.lock(claim_id).await;
        let mut claim = self.claims.get(claim_id).await?;
        let previous = lifecycle::transition(&mut claim, ClaimAction::Reject, self.settings.batch_rejection_policy)?;
        claim.rejection_reason = Some(reason.clone());

        self.commit_claim(&claim, previous, actor, Some(reason.clone())).await?;
        self.release_all(&claim).await;
        redacted_warn!(self.redactor, "Rejected claim {} during vetting: {}", claim.claim_number, reason);
        Ok(claim)
    }

    /// Copy a rejected claim into a new draft that can be corrected and
    /// vetted again. The rejected claim itself is left untouched.
    pub async fn clone_claim(&self, claim_id: Uuid, actor: &str) -> ClaimsResult<Claim> {
        let source = self.claims.get(claim_id).await?;
        if source.status != ClaimStatus::Rejected {
            return Err(ValidationError::CloneRequiresRejected.into());
        }
        let plan = self.plan_for(&source)?;

        let now = Utc::now();
        let mut claim = Claim {
            id: Uuid::new_v4(),
            status: ClaimStatus::Draft,
            diagnoses: source
                .diagnoses
                .iter()
                .map(|diagnosis| ClaimDiagnosis { id: Uuid::new_v4(), ..diagnosis.clone() })
                .collect(),
            items: source
                .items
                .iter()
                .map(|item| ClaimItem { id: Uuid::new_v4(), added_at: now, ..item.clone() })
                .collect(),
            rejection_reason: None,
            batch_id: None,
            cloned_from: Some(source.id),
            vetted_by: None,
            vetted_at: None,
            created_at: now,
            updated_at: now,
            ..source.clone()
        };
        ClaimAggregator::new(&self.insurance).recompute(&mut claim, &plan);

        self.reserve_all(&claim).await?;
        claim.claim_number = self.numbers.next(&self.settings.claim_number_prefix, now, 5);

        let notes = Some(format!("cloned from {}", source.claim_number));
        let entry = ClaimStatusHistory::new(claim.id, None, ClaimStatus::Draft, actor, notes);
        let stored = match self.history.append_claim(entry).await {
            Ok(()) => self.claims.insert(claim.clone()).await,
            Err(err) => Err(err),
        };
        if let Err(err) = stored {
            self.release_all(&claim).await;
            return Err(err);
        }

        info!(claim_id = %claim.id, cloned_from = %source.id, "Cloned rejected claim");
        self.publisher.claim_status_changed(&claim, None, actor);
        Ok(claim)
    }

    pub(crate) fn plan_for(&self, claim: &Claim) -> ClaimsResult<InsurancePlan> {
        Ok(self.insurance.get_plan(claim.plan_id)?)
    }

    /// Record the transition, then store the claim. Nothing is stored when
    /// the history append fails.
    pub(crate) async fn commit_claim(
        &self,
        claim: &Claim,
        previous: ClaimStatus,
        actor: &str,
        notes: Option<String>,
    ) -> ClaimsResult<()> {
        let entry = ClaimStatusHistory::new(claim.id, Some(previous), claim.status, actor, notes);
        self.history.append_claim(entry).await?;
        self.claims.save(claim).await?;
        info!(claim_id = %claim.id, from = %previous, to = %claim.status, actor = actor, "Claim status changed");
        self.publisher.claim_status_changed(claim, Some(previous), actor);
        Ok(())
    }

    /// Reserve every source record of `claim`, undoing on the first conflict
    async fn reserve_all(&self, claim: &Claim) -> ClaimsResult<()> {
        let mut reserved = Vec::new();
        for source in claim.sources() {
            if let Err(err) = self.claims.reserve_source(source, claim.id).await {
                for held in reserved {
                    // best effort: the in-memory release cannot fail
                    let _ = self.claims.release_source(held, claim.id).await;
                }
                return Err(err);
            }
            reserved.push(source);
        }
        Ok(())
    }

    pub(crate) async fn release_all(&self, claim: &Claim) {
        for source in claim.sources() {
            if let Err(err) = self.claims.release_source(source, claim.id).await {
                warn!(claim_id = %claim.id, source = %source, error = %err, "Failed to release source record");
            }
        }
    }

    /// Returns the selected tariff's id
    fn select_gdrg(&self, claim: &mut Claim, code: &str) -> ClaimsResult<Uuid> {
        let tariff = self.insurance.find_tariff(TariffScheme::Gdrg, code.trim())?;
        claim.gdrg = Some(GdrgSelection {
            tariff_id: tariff.id,
            code: tariff.code,
            name: tariff.name,
            amount: tariff.price,
            selected_at: Utc::now(),
        });
        Ok(tariff.id)
    }
}

fn ensure_editable(claim: &Claim) -> ClaimsResult<()> {
    if !claim.status.is_editable() {
        return Err(ClaimsError::ImmutableClaim { claim_id: claim.id, status: claim.status });
    }
    Ok(())
}

fn ensure_removable(claim: &Claim) -> ClaimsResult<()> {
    if !claim.status.allows_removal() {
        return Err(ClaimsError::ImmutableClaim { claim_id: claim.id, status: claim.status });
    }
    Ok(())
}

fn ensure_same_encounter(claim: &Claim, record: &BillableRecord) -> ClaimsResult<()> {
    if record.patient_id != claim.patient_id || record.encounter_id != claim.encounter.id {
        return Err(ValidationError::ForeignRecord(record.source).into());
    }
    Ok(())
}

fn add_diagnosis_to(claim: &mut Claim, diagnosis: NewDiagnosis) -> Result<(), ValidationError> {
    let code = diagnosis.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ValidationError::BlankDiagnosisCode);
    }
    if claim.diagnoses.iter().any(|existing| existing.code == code) {
        return Err(ValidationError::DuplicateDiagnosis(code));
    }
    if diagnosis.is_primary {
        for existing in &mut claim.diagnoses {
            existing.is_primary = false;
        }
    }
    claim.diagnoses.push(ClaimDiagnosis {
        id: Uuid::new_v4(),
        code,
        description: diagnosis.description,
        is_primary: diagnosis.is_primary,
    });
    Ok(())
}
