use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::error::{InsuranceError, InsuranceResult};
use crate::models::{CoverageCategory, CoverageRule, CoverageType};

/// Coverage rules for every plan.
///
/// Writes hold the lock for the whole check-then-insert, so two active rules
/// for the same key with overlapping windows can never coexist.
pub struct CoverageRuleSet {
    rules: RwLock<HashMap<Uuid, CoverageRule>>,
}

impl CoverageRuleSet {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_rule(&self, rule: CoverageRule) -> InsuranceResult<CoverageRule> {
        validate_rule(&rule)?;

        let mut rules = self.rules.write();
        if rules.contains_key(&rule.id) {
            return Err(InsuranceError::ConflictingRule(format!("rule {} already exists", rule.id)));
        }
        if rule.is_active {
            ensure_no_overlap(&rules, &rule)?;
        }

        info!(
            plan_id = %rule.plan_id,
            category = %rule.category,
            item_code = rule.item_code.as_deref().unwrap_or("<unmapped>"),
            coverage_type = ?rule.coverage_type,
            "Added coverage rule"
        );
        rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    pub fn deactivate_rule(&self, id: Uuid) -> InsuranceResult<CoverageRule> {
        let mut rules = self.rules.write();
        let rule = rules.get_mut(&id).ok_or(InsuranceError::RuleNotFound(id))?;
        rule.is_active = false;
        Ok(rule.clone())
    }

    pub fn activate_rule(&self, id: Uuid) -> InsuranceResult<CoverageRule> {
        let mut rules = self.rules.write();
        let mut candidate = rules.get(&id).cloned().ok_or(InsuranceError::RuleNotFound(id))?;
        candidate.is_active = true;
        ensure_no_overlap(&rules, &candidate)?;
        rules.insert(id, candidate.clone());
        Ok(candidate)
    }

    pub fn get(&self, id: Uuid) -> InsuranceResult<CoverageRule> {
        self.rules.read().get(&id).cloned().ok_or(InsuranceError::RuleNotFound(id))
    }

    /// Rules of a plan ordered by category, then item code (fallbacks first)
    pub fn rules_for_plan(&self, plan_id: Uuid) -> Vec<CoverageRule> {
        let mut rules: Vec<CoverageRule> = self.rules
            .read()
            .values()
            .filter(|rule| rule.plan_id == plan_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| {
            a.category.to_string()
                .cmp(&b.category.to_string())
                .then_with(|| a.item_code.cmp(&b.item_code))
        });
        rules
    }

    /// Item-specific rule applying on `date`
    pub fn exact_rule(
        &self,
        plan_id: Uuid,
        category: CoverageCategory,
        item_code: &str,
        date: NaiveDate,
    ) -> Option<CoverageRule> {
        self.rules
            .read()
            .values()
            .find(|rule| {
                rule.plan_id == plan_id
                    && rule.category == category
                    && !rule.is_unmapped
                    && rule.item_code.as_deref() == Some(item_code)
                    && rule.applies_on(date)
            })
            .cloned()
    }

    /// The category's unmapped fallback rule applying on `date`
    pub fn fallback_rule(
        &self,
        plan_id: Uuid,
        category: CoverageCategory,
        date: NaiveDate,
    ) -> Option<CoverageRule> {
        self.rules
            .read()
            .values()
            .find(|rule| {
                rule.plan_id == plan_id
                    && rule.category == category
                    && rule.is_unmapped
                    && rule.applies_on(date)
            })
            .cloned()
    }
}

impl Default for CoverageRuleSet {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_no_overlap(rules: &HashMap<Uuid, CoverageRule>, candidate: &CoverageRule) -> InsuranceResult<()> {
    let clash = rules.values().find(|existing| {
        existing.id != candidate.id
            && existing.is_active
            && existing.same_key(candidate)
            && existing.window_overlaps(candidate)
    });
    match clash {
        Some(existing) if candidate.is_unmapped => Err(InsuranceError::ConflictingRule(format!(
            "plan {} already has an active unmapped fallback for {} (rule {})",
            candidate.plan_id, candidate.category, existing.id
        ))),
        Some(existing) => Err(InsuranceError::ConflictingRule(format!(
            "plan {} already has an active {} rule for item {} (rule {})",
            candidate.plan_id,
            candidate.category,
            candidate.item_code.as_deref().unwrap_or_default(),
            existing.id
        ))),
        None => Ok(()),
    }
}

fn is_percentage(value: Decimal) -> bool {
    !value.is_sign_negative() && value <= Decimal::ONE_HUNDRED
}

pub fn validate_rule(rule: &CoverageRule) -> InsuranceResult<()> {
    match (&rule.item_code, rule.is_unmapped) {
        (Some(code), false) if code.trim().is_empty() => {
            return Err(InsuranceError::InvalidRule("item code must not be blank".to_string()));
        }
        (Some(_), true) => {
            return Err(InsuranceError::InvalidRule(
                "an unmapped fallback rule must not name an item code".to_string(),
            ));
        }
        (None, false) => {
            return Err(InsuranceError::InvalidRule(
                "a rule without an item code must be the unmapped fallback".to_string(),
            ));
        }
        _ => {}
    }

    match rule.coverage_type {
        CoverageType::Percentage if !is_percentage(rule.coverage_value) => {
            return Err(InsuranceError::InvalidRule(format!(
                "percentage coverage must be within 0..=100, got {}",
                rule.coverage_value
            )));
        }
        CoverageType::Fixed if rule.coverage_value.is_sign_negative() => {
            return Err(InsuranceError::InvalidRule("fixed coverage must not be negative".to_string()));
        }
        _ => {}
    }

    if let Some(pct) = rule.patient_copay_percentage {
        if !is_percentage(pct) {
            return Err(InsuranceError::InvalidRule(format!(
                "copay percentage must be within 0..=100, got {}",
                pct
            )));
        }
    }

    let non_negative = [
        ("patient_copay_amount", rule.patient_copay_amount),
        ("max_quantity_per_visit", rule.max_quantity_per_visit),
        ("max_amount_per_visit", rule.max_amount_per_visit),
    ];
    for (field, value) in non_negative {
        if value.is_some_and(|v| v.is_sign_negative()) {
            return Err(InsuranceError::InvalidRule(format!("{} must not be negative", field)));
        }
    }

    if let (Some(from), Some(to)) = (rule.effective_from, rule.effective_to) {
        if from > to {
            return Err(InsuranceError::InvalidRule(format!(
                "effective_from {} is after effective_to {}",
                from, to
            )));
        }
    }

    Ok(())
}
