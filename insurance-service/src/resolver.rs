//! Coverage resolution.
//!
//! Precedence is data: [`RESOLUTION_ORDER`] lists the strategies and the
//! first one that applies decides the split. Nothing here mutates state.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{InsuranceError, InsuranceResult};
use crate::models::{CoverageCategory, CoverageRule, CoverageType, InsurancePlan};
use crate::money::{apply_percentage, percentage_of, round_money};
use crate::rules::CoverageRuleSet;

/// One billed line to be split between insurer and patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRequest {
    pub category: CoverageCategory,
    /// Code used for item-specific rules; `None` skips straight to the fallback
    pub item_code: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub service_date: NaiveDate,
    /// Whether the tariff lookup found a mapping for the item
    pub mapped: bool,
}

impl CoverageRequest {
    /// Rounded line amount. Fails when the product, or that product as a
    /// percentage, does not fit in a `Decimal`.
    pub fn subtotal(&self) -> InsuranceResult<Decimal> {
        self.quantity
            .checked_mul(self.unit_price)
            .filter(|amount| amount.checked_mul(Decimal::ONE_HUNDRED).is_some())
            .map(round_money)
            .ok_or(InsuranceError::AmountOverflow {
                quantity: self.quantity,
                unit_price: self.unit_price,
            })
    }
}

/// Which strategy produced a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CoverageBasis {
    ExactRule { rule_id: Uuid },
    CategoryFallbackRule { rule_id: Uuid },
    PlanDefaultRule { category: CoverageCategory, copay_percentage: Decimal },
    Uncovered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageDecision {
    pub is_covered: bool,
    pub coverage_percentage: Decimal,
    pub subtotal: Decimal,
    pub insurer_amount: Decimal,
    pub patient_amount: Decimal,
    pub unmapped: bool,
    pub basis: CoverageBasis,
    pub requires_preauthorization: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    ExactRule,
    CategoryFallbackRule,
    PlanDefaultRule,
    Uncovered,
}

/// Evaluated front to back; the first strategy that applies wins
pub const RESOLUTION_ORDER: [ResolutionStrategy; 4] = [
    ResolutionStrategy::ExactRule,
    ResolutionStrategy::CategoryFallbackRule,
    ResolutionStrategy::PlanDefaultRule,
    ResolutionStrategy::Uncovered,
];

/// Terms picked by a strategy, before any amounts are computed
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageTerms {
    Rule(CoverageRule),
    PlanDefault { copay_percentage: Decimal },
    Uncovered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCoverage {
    pub basis: CoverageBasis,
    pub terms: CoverageTerms,
}

impl ResolutionStrategy {
    fn try_apply(
        self,
        rules: &CoverageRuleSet,
        request: &CoverageRequest,
        plan: &InsurancePlan,
    ) -> Option<AppliedCoverage> {
        match self {
            ResolutionStrategy::ExactRule => {
                let code = request.item_code.as_deref()?;
                let rule = rules.exact_rule(plan.id, request.category, code, request.service_date)?;
                Some(AppliedCoverage {
                    basis: CoverageBasis::ExactRule { rule_id: rule.id },
                    terms: CoverageTerms::Rule(rule),
                })
            }
            ResolutionStrategy::CategoryFallbackRule => {
                let rule = rules.fallback_rule(plan.id, request.category, request.service_date)?;
                Some(AppliedCoverage {
                    basis: CoverageBasis::CategoryFallbackRule { rule_id: rule.id },
                    terms: CoverageTerms::Rule(rule),
                })
            }
            ResolutionStrategy::PlanDefaultRule => {
                let copay_percentage = plan.default_copays.for_category(request.category)?;
                Some(AppliedCoverage {
                    basis: CoverageBasis::PlanDefaultRule {
                        category: request.category,
                        copay_percentage,
                    },
                    terms: CoverageTerms::PlanDefault { copay_percentage },
                })
            }
            ResolutionStrategy::Uncovered => Some(AppliedCoverage {
                basis: CoverageBasis::Uncovered,
                terms: CoverageTerms::Uncovered,
            }),
        }
    }
}

/// Walk [`RESOLUTION_ORDER`] and return the first strategy that applies
pub fn select(rules: &CoverageRuleSet, request: &CoverageRequest, plan: &InsurancePlan) -> AppliedCoverage {
    RESOLUTION_ORDER
        .iter()
        .find_map(|strategy| strategy.try_apply(rules, request, plan))
        .unwrap_or(AppliedCoverage {
            basis: CoverageBasis::Uncovered,
            terms: CoverageTerms::Uncovered,
        })
}

pub struct CoverageResolver<'a> {
    rules: &'a CoverageRuleSet,
}

impl<'a> CoverageResolver<'a> {
    pub fn new(rules: &'a CoverageRuleSet) -> Self {
        Self { rules }
    }

    pub fn resolve(&self, request: &CoverageRequest, plan: &InsurancePlan) -> InsuranceResult<CoverageDecision> {
        let applied = select(self.rules, request, plan);
        let decision = split(request, applied)?;
        debug!(
            plan_id = %plan.id,
            category = %request.category,
            item_code = request.item_code.as_deref().unwrap_or("-"),
            basis = ?decision.basis,
            insurer = %decision.insurer_amount,
            patient = %decision.patient_amount,
            "Resolved coverage"
        );
        Ok(decision)
    }
}

fn split(request: &CoverageRequest, applied: AppliedCoverage) -> InsuranceResult<CoverageDecision> {
    let subtotal = request.subtotal()?;
    let unmapped = !request.mapped;
    let requires_preauthorization = match &applied.terms {
        CoverageTerms::Rule(rule) => rule.requires_preauthorization,
        _ => false,
    };

    if subtotal.is_zero() {
        return Ok(CoverageDecision {
            is_covered: true,
            coverage_percentage: Decimal::ONE_HUNDRED,
            subtotal,
            insurer_amount: Decimal::ZERO,
            patient_amount: Decimal::ZERO,
            unmapped,
            basis: applied.basis,
            requires_preauthorization,
        });
    }

    let insurer = match &applied.terms {
        CoverageTerms::Rule(rule) => insurer_share(rule, request, subtotal),
        CoverageTerms::PlanDefault { copay_percentage } => {
            Some(subtotal - apply_percentage(subtotal, *copay_percentage))
        }
        CoverageTerms::Uncovered => None,
    };

    let decision = match insurer {
        Some(insurer_amount) => {
            let insurer_amount = insurer_amount.clamp(Decimal::ZERO, subtotal);
            CoverageDecision {
                is_covered: true,
                coverage_percentage: percentage_of(insurer_amount, subtotal),
                subtotal,
                insurer_amount,
                patient_amount: subtotal - insurer_amount,
                unmapped,
                basis: applied.basis,
                requires_preauthorization,
            }
        }
        None => CoverageDecision {
            is_covered: false,
            coverage_percentage: Decimal::ZERO,
            subtotal,
            insurer_amount: Decimal::ZERO,
            patient_amount: subtotal,
            unmapped,
            basis: applied.basis,
            requires_preauthorization,
        },
    };
    Ok(decision)
}

/// Insurer share under a rule, or `None` when the rule excludes the item.
/// Only the capped portion of the line is eligible; the excess stays with the patient.
fn insurer_share(rule: &CoverageRule, request: &CoverageRequest, subtotal: Decimal) -> Option<Decimal> {
    if !rule.is_covered || rule.coverage_type == CoverageType::Excluded {
        return None;
    }

    let covered_quantity = match rule.max_quantity_per_visit {
        Some(max) if request.quantity > max => max,
        _ => request.quantity,
    };
    // covered_quantity never exceeds the quantity, so this fits whenever the subtotal did
    let mut base = request
        .unit_price
        .checked_mul(covered_quantity)
        .map_or(subtotal, |amount| round_money(amount).min(subtotal));
    if let Some(max_amount) = rule.max_amount_per_visit {
        base = base.min(round_money(max_amount));
    }

    let insurer = match rule.coverage_type {
        CoverageType::Full => base,
        CoverageType::Percentage => {
            if let Some(copay_pct) = rule.patient_copay_percentage {
                base - apply_percentage(base, copay_pct)
            } else if let Some(copay_amount) = rule.patient_copay_amount {
                base - round_money(copay_amount).min(base)
            } else {
                apply_percentage(base, rule.coverage_value)
            }
        }
        CoverageType::Fixed => rule
            .coverage_value
            .checked_mul(covered_quantity)
            .map_or(base, |amount| round_money(amount).min(base)),
        CoverageType::Excluded => Decimal::ZERO,
    };
    Some(insurer)
}
