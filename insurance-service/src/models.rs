use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Insurance provider (payer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceProvider {
    pub id: Uuid,
    pub name: String,
    /// National schemes price admissions and consultations through G-DRG
    pub is_national_scheme: bool,
}

/// Insurance plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurancePlan {
    pub id: Uuid,
    pub plan_code: String,
    pub name: String,
    pub provider: InsuranceProvider,
    /// Patient copay percentage per category, used when no rule matches
    #[serde(default)]
    pub default_copays: CategoryCopays,
    pub annual_limit: Option<Decimal>,
    pub visit_limit: Option<Decimal>,
    #[serde(default)]
    pub requires_referral: bool,
    /// Items added to a claim after creation start unapproved
    #[serde(default)]
    pub require_explicit_approval_for_new_items: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
    pub is_active: bool,
}

impl InsurancePlan {
    pub fn is_national_scheme(&self) -> bool {
        self.provider.is_national_scheme
    }

    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.effective_from.map_or(true, |from| from <= date)
            && self.effective_to.map_or(true, |to| date <= to)
    }
}

/// Plan-level default patient copay percentages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCopays {
    pub consultation: Option<Decimal>,
    pub drugs: Option<Decimal>,
    pub labs: Option<Decimal>,
    pub procedures: Option<Decimal>,
    pub consumables: Option<Decimal>,
}

impl CategoryCopays {
    pub fn for_category(&self, category: CoverageCategory) -> Option<Decimal> {
        match category {
            CoverageCategory::Consultation => self.consultation,
            CoverageCategory::Drugs => self.drugs,
            CoverageCategory::Labs => self.labs,
            CoverageCategory::Procedures => self.procedures,
            CoverageCategory::Consumables => self.consumables,
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (CoverageCategory, Decimal)> + '_ {
        CoverageCategory::ALL
            .into_iter()
            .filter_map(|category| self.for_category(category).map(|pct| (category, pct)))
    }
}

/// Category a coverage rule or plan default applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageCategory {
    Consultation,
    Drugs,
    Labs,
    Procedures,
    Consumables,
}

impl CoverageCategory {
    pub const ALL: [CoverageCategory; 5] = [
        CoverageCategory::Consultation,
        CoverageCategory::Drugs,
        CoverageCategory::Labs,
        CoverageCategory::Procedures,
        CoverageCategory::Consumables,
    ];
}

impl fmt::Display for CoverageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoverageCategory::Consultation => "consultation",
            CoverageCategory::Drugs => "drugs",
            CoverageCategory::Labs => "labs",
            CoverageCategory::Procedures => "procedures",
            CoverageCategory::Consumables => "consumables",
        };
        f.write_str(name)
    }
}

/// Kind of internal billable item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Consultation,
    Drug,
    LabService,
    Procedure,
    Consumable,
}

impl ItemKind {
    pub fn category(self) -> CoverageCategory {
        match self {
            ItemKind::Consultation => CoverageCategory::Consultation,
            ItemKind::Drug => CoverageCategory::Drugs,
            ItemKind::LabService => CoverageCategory::Labs,
            ItemKind::Procedure => CoverageCategory::Procedures,
            ItemKind::Consumable => CoverageCategory::Consumables,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemKind::Consultation => "consultation",
            ItemKind::Drug => "drug",
            ItemKind::LabService => "lab_service",
            ItemKind::Procedure => "procedure",
            ItemKind::Consumable => "consumable",
        };
        f.write_str(name)
    }
}

/// Identity of an internal item: `(kind, id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: Uuid,
}

impl ItemRef {
    pub fn new(kind: ItemKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// How a covered line is split between insurer and patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageType {
    /// Insurer pays `coverage_value` percent
    Percentage,
    /// Insurer pays `coverage_value` per unit
    Fixed,
    Full,
    Excluded,
}

/// Plan-scoped coverage rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRule {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub category: CoverageCategory,
    /// `None` only for the unmapped fallback rule of a category
    pub item_code: Option<String>,
    pub is_covered: bool,
    pub coverage_type: CoverageType,
    pub coverage_value: Decimal,
    pub patient_copay_percentage: Option<Decimal>,
    pub patient_copay_amount: Option<Decimal>,
    pub is_unmapped: bool,
    pub max_quantity_per_visit: Option<Decimal>,
    pub max_amount_per_visit: Option<Decimal>,
    #[serde(default)]
    pub requires_preauthorization: bool,
    pub is_active: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

impl CoverageRule {
    /// Active rule for one item code
    pub fn for_item(
        plan_id: Uuid,
        category: CoverageCategory,
        item_code: &str,
        coverage_type: CoverageType,
        coverage_value: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_id,
            category,
            item_code: Some(item_code.to_string()),
            is_covered: coverage_type != CoverageType::Excluded,
            coverage_type,
            coverage_value,
            patient_copay_percentage: None,
            patient_copay_amount: None,
            is_unmapped: false,
            max_quantity_per_visit: None,
            max_amount_per_visit: None,
            requires_preauthorization: false,
            is_active: true,
            effective_from: None,
            effective_to: None,
        }
    }

    /// Active fallback rule for items of `category` with no item-specific rule
    pub fn unmapped_fallback(
        plan_id: Uuid,
        category: CoverageCategory,
        coverage_type: CoverageType,
        coverage_value: Decimal,
    ) -> Self {
        Self {
            item_code: None,
            is_unmapped: true,
            ..Self::for_item(plan_id, category, "", coverage_type, coverage_value)
        }
    }

    pub fn with_copay_percentage(mut self, percent: Decimal) -> Self {
        self.patient_copay_percentage = Some(percent);
        self
    }

    pub fn with_copay_amount(mut self, amount: Decimal) -> Self {
        self.patient_copay_amount = Some(amount);
        self
    }

    pub fn with_max_quantity(mut self, quantity: Decimal) -> Self {
        self.max_quantity_per_visit = Some(quantity);
        self
    }

    pub fn with_max_amount(mut self, amount: Decimal) -> Self {
        self.max_amount_per_visit = Some(amount);
        self
    }

    pub fn with_window(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.effective_from = from;
        self.effective_to = to;
        self
    }

    /// Active and inside its effective window on `date`
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.effective_from.map_or(true, |from| from <= date)
            && self.effective_to.map_or(true, |to| date <= to)
    }

    /// Same plan, category and item code
    pub fn same_key(&self, other: &CoverageRule) -> bool {
        self.plan_id == other.plan_id
            && self.category == other.category
            && self.item_code == other.item_code
            && self.is_unmapped == other.is_unmapped
    }

    pub fn window_overlaps(&self, other: &CoverageRule) -> bool {
        let starts_before_other_ends = match (self.effective_from, other.effective_to) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        };
        let other_starts_before_self_ends = match (other.effective_from, self.effective_to) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        };
        starts_before_other_ends && other_starts_before_self_ends
    }
}

/// External price list a tariff belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TariffScheme {
    /// National scheme item price list (drugs, services, procedures)
    Nhis,
    /// Diagnosis-related-group case rates
    Gdrg,
}

impl fmt::Display for TariffScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TariffScheme::Nhis => f.write_str("NHIS"),
            TariffScheme::Gdrg => f.write_str("G-DRG"),
        }
    }
}

/// One priced entry of a scheme tariff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffEntry {
    pub id: Uuid,
    pub scheme: TariffScheme,
    pub code: String,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub is_active: bool,
    pub age_group: Option<String>,
    pub mdc_category: Option<String>,
    /// Replacement entry once this one has been superseded
    #[serde(default)]
    pub superseded_by: Option<Uuid>,
}

impl TariffEntry {
    pub fn new(scheme: TariffScheme, code: &str, name: &str, category: &str, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            scheme,
            code: code.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            price,
            is_active: true,
            age_group: None,
            mdc_category: None,
            superseded_by: None,
        }
    }
}

/// Link from an internal item to exactly one tariff entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMapping {
    pub item: ItemRef,
    pub item_code: String,
    pub tariff_id: Uuid,
    pub mapped_at: DateTime<Utc>,
}

/// Result of a tariff lookup for an internal item
#[derive(Debug, Clone, PartialEq)]
pub enum PriceLookup {
    Mapped(TariffEntry),
    NotMapped,
}

impl PriceLookup {
    pub fn is_mapped(&self) -> bool {
        matches!(self, PriceLookup::Mapped(_))
    }

    pub fn tariff(&self) -> Option<&TariffEntry> {
        match self {
            PriceLookup::Mapped(entry) => Some(entry),
            PriceLookup::NotMapped => None,
        }
    }
}
