use chrono::NaiveDate;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{InsuranceError, InsuranceResult};
use crate::mapping::ItemMappingTable;
use crate::models::*;
use crate::money::round_money;
use crate::resolver::{CoverageDecision, CoverageRequest, CoverageResolver};
use crate::rules::CoverageRuleSet;
use crate::tariffs::TariffRegistry;

/// Price and coverage of one item as it would be billed today
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemQuote {
    pub item: ItemRef,
    /// Code rules were matched on: the tariff code when mapped
    pub rule_code: String,
    pub tariff: Option<TariffEntry>,
    pub unit_tariff: Decimal,
    pub decision: CoverageDecision,
}

/// Insurance service
///
/// Owns plans, scheme tariffs, item mappings and coverage rules, and answers
/// coverage questions over them.
pub struct InsuranceService {
    plans: DashMap<Uuid, InsurancePlan>,
    tariffs: TariffRegistry,
    mappings: ItemMappingTable,
    rules: CoverageRuleSet,
}

impl InsuranceService {
    /// Create a new insurance service
    pub fn new() -> Self {
        Self {
            plans: DashMap::new(),
            tariffs: TariffRegistry::new(),
            mappings: ItemMappingTable::new(),
            rules: CoverageRuleSet::new(),
        }
    }

    /// Register an insurance plan
    pub fn register_plan(&self, plan: InsurancePlan) -> InsuranceResult<InsurancePlan> {
        validate_plan(&plan)?;
        info!(plan_id = %plan.id, plan_code = %plan.plan_code, provider = %plan.provider.name, "Registered insurance plan");
        self.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    /// Get insurance plan by ID
    pub fn get_plan(&self, plan_id: Uuid) -> InsuranceResult<InsurancePlan> {
        self.plans
            .get(&plan_id)
            .map(|plan| plan.value().clone())
            .ok_or(InsuranceError::PlanNotFound(plan_id))
    }

    pub fn register_tariff(&self, entry: TariffEntry) -> InsuranceResult<TariffEntry> {
        self.tariffs.register(entry)
    }

    pub fn get_tariff(&self, id: Uuid) -> InsuranceResult<TariffEntry> {
        self.tariffs.get(id)
    }

    pub fn find_tariff(&self, scheme: TariffScheme, code: &str) -> InsuranceResult<TariffEntry> {
        self.tariffs.find_active(scheme, code)
    }

    pub fn list_tariffs(&self, scheme: TariffScheme) -> Vec<TariffEntry> {
        self.tariffs.list(scheme)
    }

    pub fn update_tariff_price(&self, id: Uuid, price: Decimal) -> InsuranceResult<TariffEntry> {
        self.tariffs.update_price(id, price)
    }

    /// Replace a tariff with a new priced entry and move its mappings over
    pub fn supersede_tariff(&self, id: Uuid, price: Decimal) -> InsuranceResult<TariffEntry> {
        let replacement = self.tariffs.supersede(id, price)?;
        let moved = self.mappings.repoint(id, replacement.id);
        info!(old_id = %id, new_id = %replacement.id, mappings = moved, "Repointed item mappings");
        Ok(replacement)
    }

    pub fn deactivate_tariff(&self, id: Uuid) -> InsuranceResult<TariffEntry> {
        self.tariffs.deactivate(id)
    }

    /// Freeze a tariff's price once a finalized claim line points at it
    pub fn lock_tariff(&self, id: Uuid) -> InsuranceResult<()> {
        self.tariffs.mark_referenced(id)
    }

    pub fn is_tariff_locked(&self, id: Uuid) -> bool {
        self.tariffs.is_referenced(id)
    }

    /// Map an internal item to an active NHIS tariff, replacing any previous mapping
    pub fn map_item(&self, item: ItemRef, item_code: &str, tariff_id: Uuid) -> InsuranceResult<ItemMapping> {
        let tariff = self.tariffs.get(tariff_id)?;
        if tariff.scheme != TariffScheme::Nhis {
            return Err(InsuranceError::InvalidTariff(format!(
                "items map to NHIS tariffs, {} is {}",
                tariff.code, tariff.scheme
            )));
        }
        if !tariff.is_active {
            return Err(InsuranceError::InvalidTariff(format!("tariff {} is not active", tariff.code)));
        }
        if let Some(previous) = self.mappings.map_item(item, item_code, tariff_id) {
            info!(item = %item, previous_tariff = %previous.tariff_id, "Replaced item mapping");
        }
        self.mappings
            .get(item)
            .ok_or_else(|| InsuranceError::InvalidTariff(format!("mapping for {} vanished", item)))
    }

    pub fn unmap_item(&self, item: ItemRef) -> Option<ItemMapping> {
        self.mappings.unmap_item(item)
    }

    pub fn mapping_for(&self, item: ItemRef) -> Option<ItemMapping> {
        self.mappings.get(item)
    }

    pub fn price_for(&self, item: ItemRef) -> PriceLookup {
        self.mappings.price_for(item, &self.tariffs)
    }

    /// Add a coverage rule to an existing plan
    pub fn add_rule(&self, rule: CoverageRule) -> InsuranceResult<CoverageRule> {
        if !self.plans.contains_key(&rule.plan_id) {
            return Err(InsuranceError::PlanNotFound(rule.plan_id));
        }
        self.rules.add_rule(rule)
    }

    pub fn deactivate_rule(&self, rule_id: Uuid) -> InsuranceResult<CoverageRule> {
        self.rules.deactivate_rule(rule_id)
    }

    pub fn rules_for_plan(&self, plan_id: Uuid) -> Vec<CoverageRule> {
        self.rules.rules_for_plan(plan_id)
    }

    pub fn resolve(&self, request: &CoverageRequest, plan: &InsurancePlan) -> InsuranceResult<CoverageDecision> {
        CoverageResolver::new(&self.rules).resolve(request, plan)
    }

    /// Look the item up in the tariff registry and resolve its coverage.
    ///
    /// Mapped items are priced at the tariff and matched on the tariff code;
    /// unmapped items keep `fallback_unit_price` and their own code.
    pub fn quote_item(
        &self,
        plan: &InsurancePlan,
        item: ItemRef,
        item_code: &str,
        quantity: Decimal,
        fallback_unit_price: Decimal,
        service_date: NaiveDate,
    ) -> InsuranceResult<ItemQuote> {
        let lookup = self.price_for(item);
        let (tariff, unit_tariff, rule_code) = match lookup {
            PriceLookup::Mapped(entry) => {
                let price = entry.price;
                let code = entry.code.clone();
                (Some(entry), price, code)
            }
            PriceLookup::NotMapped => {
                warn!(item = %item, item_code = item_code, "Item has no tariff mapping, using fallback rules");
                (None, round_money(fallback_unit_price), item_code.to_string())
            }
        };

        let request = CoverageRequest {
            category: item.kind.category(),
            item_code: Some(rule_code.clone()),
            quantity,
            unit_price: unit_tariff,
            service_date,
            mapped: tariff.is_some(),
        };
        let decision = self.resolve(&request, plan)?;

        Ok(ItemQuote {
            item,
            rule_code,
            tariff,
            unit_tariff,
            decision,
        })
    }
}

impl Default for InsuranceService {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_plan(plan: &InsurancePlan) -> InsuranceResult<()> {
    if plan.plan_code.trim().is_empty() {
        return Err(InsuranceError::InvalidPlan("plan code must not be empty".to_string()));
    }
    if let (Some(from), Some(to)) = (plan.effective_from, plan.effective_to) {
        if from > to {
            return Err(InsuranceError::InvalidPlan(format!(
                "effective_from {} is after effective_to {}",
                from, to
            )));
        }
    }
    for (category, pct) in plan.default_copays.iter() {
        if pct.is_sign_negative() || pct > Decimal::ONE_HUNDRED {
            return Err(InsuranceError::InvalidPlan(format!(
                "{} default copay must be within 0..=100, got {}",
                category, pct
            )));
        }
    }
    for (name, limit) in [("annual_limit", plan.annual_limit), ("visit_limit", plan.visit_limit)] {
        if limit.is_some_and(|value| value.is_sign_negative()) {
            return Err(InsuranceError::InvalidPlan(format!("{} must not be negative", name)));
        }
    }
    Ok(())
}
