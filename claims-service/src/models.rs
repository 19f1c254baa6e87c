use chrono::{DateTime, NaiveDate, Utc};
use insurance_service::{CoverageBasis, ItemKind, ItemRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Draft,
    PendingVetting,
    Vetted,
    Submitted,
    Processing,
    Completed,
    Rejected,
}

impl ClaimStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ClaimStatus::Completed | ClaimStatus::Rejected)
    }

    /// Items, diagnoses and the G-DRG selection may change
    pub fn is_editable(self) -> bool {
        matches!(self, ClaimStatus::Draft | ClaimStatus::PendingVetting | ClaimStatus::Vetted)
    }

    /// Lines, diagnoses and the G-DRG selection may be removed, and the
    /// primary diagnosis may move. A vetted claim only gains detail.
    pub fn allows_removal(self) -> bool {
        matches!(self, ClaimStatus::Draft | ClaimStatus::PendingVetting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Draft => "draft",
            ClaimStatus::PendingVetting => "pending_vetting",
            ClaimStatus::Vetted => "vetted",
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::Processing => "processing",
            ClaimStatus::Completed => "completed",
            ClaimStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encounter a claim originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterKind {
    Consultation,
    Admission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: Uuid,
    pub kind: EncounterKind,
    pub service_date: NaiveDate,
    pub discharge_date: Option<NaiveDate>,
}

/// Identity of the upstream billable record (charge, prescription, order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub kind: ItemKind,
    pub record_id: Uuid,
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-record:{}", self.kind, self.record_id)
    }
}

/// Billable record handed over by clinical collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillableRecord {
    pub source: SourceRef,
    /// Catalogue item (drug, lab service, procedure, consumable) being billed
    pub item: ItemRef,
    pub code: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub patient_id: Uuid,
    pub encounter_id: Uuid,
    pub service_date: NaiveDate,
    pub dose: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
}

/// Claim form section a line is printed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSection {
    Investigations,
    Prescriptions,
    Procedures,
}

impl ClaimSection {
    pub fn for_kind(kind: ItemKind) -> Self {
        match kind {
            ItemKind::LabService => ClaimSection::Investigations,
            ItemKind::Drug => ClaimSection::Prescriptions,
            ItemKind::Procedure | ItemKind::Consumable | ItemKind::Consultation => ClaimSection::Procedures,
        }
    }
}

/// One billed line of a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimItem {
    pub id: Uuid,
    pub source: SourceRef,
    pub item: ItemRef,
    /// Code billed to the scheme: the tariff code when mapped
    pub code: String,
    /// Facility code of the record the line came from
    pub internal_code: String,
    pub description: String,
    pub section: ClaimSection,
    pub quantity: Decimal,
    /// Fixed for the life of the claim
    pub unit_tariff: Decimal,
    pub subtotal: Decimal,
    pub is_covered: bool,
    pub coverage_percentage: Decimal,
    pub insurance_pays: Decimal,
    pub patient_pays: Decimal,
    pub unmapped: bool,
    pub coverage_basis: CoverageBasis,
    pub requires_preauthorization: bool,
    pub nhis_tariff_id: Option<Uuid>,
    pub nhis_code: Option<String>,
    pub nhis_price: Option<Decimal>,
    pub is_approved: bool,
    pub rejection_reason: Option<String>,
    pub dose: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub item_date: NaiveDate,
    pub added_at: DateTime<Utc>,
}

/// Field-level edit of a claim line; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub quantity: Option<Decimal>,
    pub dose: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub item_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDiagnosis {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDiagnosis {
    pub code: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

impl NewDiagnosis {
    pub fn primary(code: &str) -> Self {
        Self { code: code.to_string(), description: None, is_primary: true }
    }

    pub fn secondary(code: &str) -> Self {
        Self { code: code.to_string(), description: None, is_primary: false }
    }
}

/// G-DRG case rate attached to a claim, price snapshotted at selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GdrgSelection {
    pub tariff_id: Uuid,
    pub code: String,
    pub name: String,
    pub amount: Decimal,
    pub selected_at: DateTime<Utc>,
}

/// Claim rollups. Always derived from the current lines, never edited directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimTotals {
    pub investigations_total: Decimal,
    pub prescriptions_total: Decimal,
    pub procedures_total: Decimal,
    pub gdrg_amount: Decimal,
    /// G-DRG plus every covered line
    pub grand_total: Decimal,
    pub insurance_covered_amount: Decimal,
    /// Patient share of covered lines
    pub patient_copay_amount: Decimal,
    /// Billed to the patient for uncovered lines
    pub uncovered_amount: Decimal,
    pub approved_amount: Decimal,
    pub unmapped_count: usize,
    pub uncovered_count: usize,
    pub visit_limit_exceeded: bool,
}

/// Insurance claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub claim_number: String,
    pub patient_id: Uuid,
    pub membership_number: Option<String>,
    pub plan_id: Uuid,
    pub encounter: Encounter,
    pub status: ClaimStatus,
    pub diagnoses: Vec<ClaimDiagnosis>,
    pub items: Vec<ClaimItem>,
    pub gdrg: Option<GdrgSelection>,
    pub totals: ClaimTotals,
    pub rejection_reason: Option<String>,
    pub batch_id: Option<Uuid>,
    pub cloned_from: Option<Uuid>,
    pub vetted_by: Option<String>,
    pub vetted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// Total the scheme is asked to pay
    pub fn total_claim_amount(&self) -> Decimal {
        self.totals.grand_total
    }

    pub fn primary_diagnosis(&self) -> Option<&ClaimDiagnosis> {
        self.diagnoses.iter().find(|diagnosis| diagnosis.is_primary)
    }

    pub fn item(&self, item_id: Uuid) -> Option<&ClaimItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: Uuid) -> Option<&mut ClaimItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    pub fn sources(&self) -> impl Iterator<Item = SourceRef> + '_ {
        self.items.iter().map(|item| item.source)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Input for opening a claim on an encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClaim {
    pub patient_id: Uuid,
    pub membership_number: Option<String>,
    pub plan_id: Uuid,
    pub encounter: Encounter,
    #[serde(default)]
    pub records: Vec<BillableRecord>,
    #[serde(default)]
    pub diagnoses: Vec<NewDiagnosis>,
    pub gdrg_code: Option<String>,
}

/// Batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Draft,
    Finalized,
    Submitted,
    Processing,
    Completed,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Draft => "draft",
            BatchStatus::Finalized => "finalized",
            BatchStatus::Submitted => "submitted",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adjudication state of one claim inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchItemStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimBatchItem {
    pub claim_id: Uuid,
    pub claim_number: String,
    /// Claim total when it joined the batch
    pub claim_amount: Decimal,
    pub approved_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: BatchItemStatus,
    pub rejection_reason: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Submission batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimBatch {
    pub id: Uuid,
    pub batch_number: String,
    /// Payer every member claim is billed to
    pub provider_id: Uuid,
    pub status: BatchStatus,
    pub items: Vec<ClaimBatchItem>,
    pub total_claims: usize,
    pub total_amount: Decimal,
    pub approved_amount: Decimal,
    pub paid_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub exported_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ClaimBatch {
    pub fn member(&self, claim_id: Uuid) -> Option<&ClaimBatchItem> {
        self.items.iter().find(|item| item.claim_id == claim_id)
    }

    pub fn member_mut(&mut self, claim_id: Uuid) -> Option<&mut ClaimBatchItem> {
        self.items.iter_mut().find(|item| item.claim_id == claim_id)
    }
}

/// Scheme decision on one claim of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Adjudication {
    Approved { amount: Decimal },
    Rejected { reason: String },
}
