#![allow(dead_code)]

use chrono::NaiveDate;
use claims_service::*;
use config_engine::EngineSettings;
use insurance_service::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const ACTOR: &str = "claims-officer";

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn service_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

/// Two plans over one insurance service:
/// - `nhis_plan`: national scheme, drugs fallback full, FBC full, G-DRG `OPDC06A`
/// - `private_plan`: procedures fallback full, drugs default copay 10%
pub struct Fixture {
    pub engine: Arc<ClaimsEngine>,
    pub insurance: Arc<InsuranceService>,
    pub nhis_plan: InsurancePlan,
    pub private_plan: InsurancePlan,
    pub patient_id: Uuid,
    pub encounter: Encounter,
    pub amoxicillin: ItemRef,
    pub amoxicillin_tariff: TariffEntry,
    pub fbc: ItemRef,
    pub fbc_tariff: TariffEntry,
}

pub fn plan(name: &str, national: bool) -> InsurancePlan {
    InsurancePlan {
        id: Uuid::new_v4(),
        plan_code: name.to_uppercase(),
        name: name.to_string(),
        provider: InsuranceProvider {
            id: Uuid::new_v4(),
            name: format!("{} provider", name),
            is_national_scheme: national,
        },
        default_copays: CategoryCopays::default(),
        annual_limit: None,
        visit_limit: None,
        requires_referral: false,
        require_explicit_approval_for_new_items: false,
        effective_from: NaiveDate::from_ymd_opt(2026, 1, 1),
        effective_to: NaiveDate::from_ymd_opt(2026, 12, 31),
        is_active: true,
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default(), |_| {})
    }

    pub fn with_settings(settings: EngineSettings, adjust_private: impl FnOnce(&mut InsurancePlan)) -> Self {
        let insurance = Arc::new(InsuranceService::new());

        let nhis_plan = insurance.register_plan(plan("nhis", true)).unwrap();
        let mut private = plan("private", false);
        private.default_copays.drugs = Some(d("10"));
        adjust_private(&mut private);
        let private_plan = insurance.register_plan(private).unwrap();

        let amoxicillin_tariff = insurance
            .register_tariff(TariffEntry::new(TariffScheme::Nhis, "AMOXICCA1", "Amoxicillin 500mg", "drugs", d("1.20")))
            .unwrap();
        let fbc_tariff = insurance
            .register_tariff(TariffEntry::new(TariffScheme::Nhis, "FBC", "Full blood count", "labs", d("25.00")))
            .unwrap();
        insurance
            .register_tariff(TariffEntry::new(TariffScheme::Gdrg, "OPDC06A", "General OPD consultation", "OPD", d("45.00")))
            .unwrap();

        let amoxicillin = ItemRef::new(ItemKind::Drug, Uuid::new_v4());
        let fbc = ItemRef::new(ItemKind::LabService, Uuid::new_v4());
        insurance.map_item(amoxicillin, "AMOX-500", amoxicillin_tariff.id).unwrap();
        insurance.map_item(fbc, "LAB-FBC", fbc_tariff.id).unwrap();

        insurance
            .add_rule(CoverageRule::unmapped_fallback(nhis_plan.id, CoverageCategory::Drugs, CoverageType::Full, Decimal::ZERO))
            .unwrap();
        insurance
            .add_rule(CoverageRule::for_item(nhis_plan.id, CoverageCategory::Labs, "FBC", CoverageType::Full, Decimal::ZERO))
            .unwrap();
        insurance
            .add_rule(CoverageRule::unmapped_fallback(
                private_plan.id,
                CoverageCategory::Procedures,
                CoverageType::Full,
                Decimal::ZERO,
            ))
            .unwrap();

        let engine = Arc::new(ClaimsEngine::new(settings, insurance.clone()));
        let patient_id = Uuid::new_v4();
        let encounter = Encounter {
            id: Uuid::new_v4(),
            kind: EncounterKind::Consultation,
            service_date: service_date(),
            discharge_date: None,
        };

        Self {
            engine,
            insurance,
            nhis_plan,
            private_plan,
            patient_id,
            encounter,
            amoxicillin,
            amoxicillin_tariff,
            fbc,
            fbc_tariff,
        }
    }

    pub fn record(&self, item: ItemRef, code: &str, quantity: &str, unit_price: &str) -> BillableRecord {
        BillableRecord {
            source: SourceRef { kind: item.kind, record_id: Uuid::new_v4() },
            item,
            code: code.to_string(),
            description: code.to_string(),
            quantity: d(quantity),
            unit_price: d(unit_price),
            patient_id: self.patient_id,
            encounter_id: self.encounter.id,
            service_date: service_date(),
            dose: None,
            frequency: None,
            duration: None,
        }
    }

    /// A facility procedure with no tariff mapping
    pub fn procedure(&self, quantity: &str, unit_price: &str) -> BillableRecord {
        self.record(ItemRef::new(ItemKind::Procedure, Uuid::new_v4()), "PROC-LOCAL", quantity, unit_price)
    }

    pub fn new_claim(&self, plan: &InsurancePlan, records: Vec<BillableRecord>) -> NewClaim {
        NewClaim {
            patient_id: self.patient_id,
            membership_number: Some("12345678".to_string()),
            plan_id: plan.id,
            encounter: self.encounter.clone(),
            records,
            diagnoses: vec![NewDiagnosis::primary("J06.9")],
            gdrg_code: None,
        }
    }

    /// Create, submit for vetting and approve a private-plan claim
    pub async fn vetted_claim(&self, records: Vec<BillableRecord>) -> Claim {
        let claim = self.engine.create_claim(self.new_claim(&self.private_plan, records), ACTOR).await.unwrap();
        self.engine.submit_for_vetting(claim.id, ACTOR).await.unwrap();
        self.engine.approve_claim(claim.id, ACTOR).await.unwrap()
    }
}
