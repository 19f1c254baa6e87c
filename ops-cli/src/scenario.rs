//! Scenario files: one plan, its price lists and rules, and one encounter.
//!
//! Items and plans are named by human-readable codes; ids are generated when
//! the scenario is installed into an [`InsuranceService`].

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use claims_service::{BillableRecord, Encounter, EncounterKind, NewClaim, NewDiagnosis, SourceRef};
use insurance_service::{
    CategoryCopays, CoverageCategory, CoverageRule, CoverageType, InsurancePlan, InsuranceProvider, InsuranceService,
    ItemKind, ItemRef, TariffEntry, TariffScheme,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub plan: PlanDef,
    #[serde(default)]
    pub tariffs: Vec<TariffDef>,
    #[serde(default)]
    pub mappings: Vec<MappingDef>,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
    pub claim: ClaimDef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanDef {
    pub code: String,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub national_scheme: bool,
    #[serde(default)]
    pub default_copays: CategoryCopays,
    pub annual_limit: Option<Decimal>,
    pub visit_limit: Option<Decimal>,
    #[serde(default)]
    pub require_explicit_approval_for_new_items: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TariffDef {
    pub scheme: TariffScheme,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub price: Decimal,
}

/// Internal item mapped onto an NHIS tariff code
#[derive(Debug, Clone, Deserialize)]
pub struct MappingDef {
    pub item: String,
    pub kind: ItemKind,
    pub internal_code: String,
    pub tariff: String,
}

/// Coverage rule; without `item_code` it is the category fallback
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDef {
    pub category: CoverageCategory,
    pub item_code: Option<String>,
    pub coverage_type: CoverageType,
    #[serde(default)]
    pub coverage_value: Decimal,
    pub patient_copay_percentage: Option<Decimal>,
    pub patient_copay_amount: Option<Decimal>,
    pub max_quantity_per_visit: Option<Decimal>,
    pub max_amount_per_visit: Option<Decimal>,
    #[serde(default)]
    pub requires_preauthorization: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimDef {
    pub membership_number: Option<String>,
    pub encounter: EncounterKind,
    pub service_date: NaiveDate,
    pub discharge_date: Option<NaiveDate>,
    #[serde(default)]
    pub diagnoses: Vec<NewDiagnosis>,
    pub gdrg_code: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineDef {
    pub item: String,
    pub kind: ItemKind,
    pub code: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub dose: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
}

/// A scenario registered in an insurance service, ready to open its claim
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    pub plan: InsurancePlan,
    pub claim: NewClaim,
}

impl Scenario {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context("invalid scenario file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("cannot read scenario {}", path.display()))?;
        Self::from_yaml(&contents).with_context(|| format!("in {}", path.display()))
    }

    /// Register the plan, tariffs, mappings and rules, and build the claim input
    pub fn install(&self, insurance: &InsuranceService) -> Result<LoadedScenario> {
        let plan = insurance.register_plan(self.plan.to_plan())?;

        for def in &self.tariffs {
            insurance.register_tariff(TariffEntry::new(def.scheme, &def.code, &def.name, &def.category, def.price))?;
        }

        let mut items = ItemNames::default();
        for def in &self.mappings {
            let item = items.resolve(&def.item, def.kind)?;
            let tariff = insurance
                .find_tariff(TariffScheme::Nhis, &def.tariff)
                .with_context(|| format!("mapping for item '{}'", def.item))?;
            insurance.map_item(item, &def.internal_code, tariff.id)?;
        }

        for def in &self.rules {
            insurance.add_rule(def.to_rule(plan.id))?;
        }

        let claim = self.claim.to_new_claim(plan.id, &mut items)?;
        Ok(LoadedScenario { plan, claim })
    }
}

impl PlanDef {
    fn to_plan(&self) -> InsurancePlan {
        InsurancePlan {
            id: Uuid::new_v4(),
            plan_code: self.code.clone(),
            name: self.name.clone(),
            provider: InsuranceProvider {
                id: Uuid::new_v4(),
                name: self.provider.clone(),
                is_national_scheme: self.national_scheme,
            },
            default_copays: self.default_copays.clone(),
            annual_limit: self.annual_limit,
            visit_limit: self.visit_limit,
            requires_referral: false,
            require_explicit_approval_for_new_items: self.require_explicit_approval_for_new_items,
            effective_from: self.effective_from,
            effective_to: self.effective_to,
            is_active: true,
        }
    }
}

impl RuleDef {
    fn to_rule(&self, plan_id: Uuid) -> CoverageRule {
        let mut rule = match &self.item_code {
            Some(code) => CoverageRule::for_item(plan_id, self.category, code, self.coverage_type, self.coverage_value),
            None => CoverageRule::unmapped_fallback(plan_id, self.category, self.coverage_type, self.coverage_value),
        }
        .with_window(self.effective_from, self.effective_to);
        rule.patient_copay_percentage = self.patient_copay_percentage;
        rule.patient_copay_amount = self.patient_copay_amount;
        rule.max_quantity_per_visit = self.max_quantity_per_visit;
        rule.max_amount_per_visit = self.max_amount_per_visit;
        rule.requires_preauthorization = self.requires_preauthorization;
        rule
    }
}

impl ClaimDef {
    fn to_new_claim(&self, plan_id: Uuid, items: &mut ItemNames) -> Result<NewClaim> {
        let patient_id = Uuid::new_v4();
        let encounter = Encounter {
            id: Uuid::new_v4(),
            kind: self.encounter,
            service_date: self.service_date,
            discharge_date: self.discharge_date,
        };

        let records = self
            .lines
            .iter()
            .map(|line| {
                let item = items.resolve(&line.item, line.kind)?;
                Ok(BillableRecord {
                    source: SourceRef { kind: line.kind, record_id: Uuid::new_v4() },
                    item,
                    code: line.code.clone(),
                    description: line.description.clone().unwrap_or_else(|| line.item.clone()),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    patient_id,
                    encounter_id: encounter.id,
                    service_date: self.service_date,
                    dose: line.dose.clone(),
                    frequency: line.frequency.clone(),
                    duration: line.duration.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(NewClaim {
            patient_id,
            membership_number: self.membership_number.clone(),
            plan_id,
            encounter,
            records,
            diagnoses: self.diagnoses.clone(),
            gdrg_code: self.gdrg_code.clone(),
        })
    }
}

/// Stable ids for the item names used across one scenario
#[derive(Default)]
struct ItemNames(HashMap<String, ItemRef>);

impl ItemNames {
    fn resolve(&mut self, name: &str, kind: ItemKind) -> Result<ItemRef> {
        let item = *self.0.entry(name.to_string()).or_insert_with(|| ItemRef::new(kind, Uuid::new_v4()));
        if item.kind != kind {
            bail!("item '{}' is used both as {} and {}", name, item.kind, kind);
        }
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
plan:
  code: PRIV
  name: Private basic
  provider: Acme Health
  default_copays:
    drugs: "10"
rules:
  - category: labs
    item_code: FBC
    coverage_type: percentage
    coverage_value: "80"
    max_quantity_per_visit: "1"
claim:
  encounter: consultation
  service_date: 2026-10-16
  diagnoses:
    - code: j06.9
      is_primary: true
  lines:
    - item: paracetamol
      kind: drug
      code: PARA-500
      quantity: "10"
      unit_price: "0.50"
    - item: paracetamol
      kind: drug
      code: PARA-500
      quantity: "4"
      unit_price: "0.50"
"#;

    #[test]
    fn test_install_builds_claim_input() {
        let insurance = InsuranceService::new();
        let loaded = Scenario::from_yaml(MINIMAL).unwrap().install(&insurance).unwrap();

        assert!(!loaded.plan.is_national_scheme());
        assert_eq!(loaded.claim.plan_id, loaded.plan.id);
        assert_eq!(loaded.claim.records.len(), 2);
        // same item name, same item, separate source records
        assert_eq!(loaded.claim.records[0].item, loaded.claim.records[1].item);
        assert_ne!(loaded.claim.records[0].source, loaded.claim.records[1].source);
        assert_eq!(loaded.claim.records[0].description, "paracetamol");

        let rules = insurance.rules_for_plan(loaded.plan.id);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].max_quantity_per_visit, Some(Decimal::ONE));
    }

    #[test]
    fn test_item_kind_must_be_consistent() {
        let mut names = ItemNames::default();
        names.resolve("dressing", ItemKind::Consumable).unwrap();
        assert!(names.resolve("dressing", ItemKind::Procedure).is_err());
    }

    #[test]
    fn test_mapping_to_unknown_tariff_fails() {
        let yaml = MINIMAL.replace(
            "rules:",
            "mappings:\n  - item: paracetamol\n    kind: drug\n    internal_code: PARA-500\n    tariff: PARACETA1\nrules:",
        );
        let insurance = InsuranceService::new();
        let err = Scenario::from_yaml(&yaml).unwrap().install(&insurance).unwrap_err();
        assert!(format!("{:#}", err).contains("paracetamol"));
    }
}
