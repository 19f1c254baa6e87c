use dashmap::{DashMap, DashSet};
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::error::{InsuranceError, InsuranceResult};
use crate::models::{TariffEntry, TariffScheme};
use crate::money::round_money;

/// Scheme price lists keyed by id, with an index of active codes per scheme
pub struct TariffRegistry {
    entries: DashMap<Uuid, TariffEntry>,
    active_codes: DashMap<(TariffScheme, String), Uuid>,
    /// Entries priced into a finalized claim line; their price is frozen
    referenced: DashSet<Uuid>,
}

impl TariffRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            active_codes: DashMap::new(),
            referenced: DashSet::new(),
        }
    }

    pub fn register(&self, mut entry: TariffEntry) -> InsuranceResult<TariffEntry> {
        if entry.code.trim().is_empty() {
            return Err(InsuranceError::InvalidTariff("tariff code must not be empty".to_string()));
        }
        if entry.price.is_sign_negative() {
            return Err(InsuranceError::InvalidTariff(format!(
                "tariff {} has a negative price",
                entry.code
            )));
        }
        entry.price = round_money(entry.price);

        if entry.is_active {
            match self.active_codes.entry((entry.scheme, entry.code.clone())) {
                Entry::Occupied(_) => {
                    return Err(InsuranceError::DuplicateTariffCode {
                        scheme: entry.scheme,
                        code: entry.code,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.id);
                }
            }
        }

        info!(scheme = %entry.scheme, code = %entry.code, price = %entry.price, "Registered tariff");
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    pub fn get(&self, id: Uuid) -> InsuranceResult<TariffEntry> {
        self.entries
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(InsuranceError::TariffNotFound(id))
    }

    /// Active entry for `code` in `scheme`
    pub fn find_active(&self, scheme: TariffScheme, code: &str) -> InsuranceResult<TariffEntry> {
        let id = self.active_codes
            .get(&(scheme, code.to_string()))
            .map(|id| *id.value())
            .ok_or_else(|| InsuranceError::TariffCodeNotFound {
                scheme,
                code: code.to_string(),
            })?;
        self.get(id)
    }

    /// All entries of a scheme, active or not, ordered by code
    pub fn list(&self, scheme: TariffScheme) -> Vec<TariffEntry> {
        let mut entries: Vec<TariffEntry> = self.entries
            .iter()
            .filter(|entry| entry.scheme == scheme)
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| a.code.cmp(&b.code).then(b.is_active.cmp(&a.is_active)));
        entries
    }

    /// Reprice an entry in place. Only allowed while no finalized claim line
    /// references it.
    pub fn update_price(&self, id: Uuid, price: Decimal) -> InsuranceResult<TariffEntry> {
        if price.is_sign_negative() {
            return Err(InsuranceError::InvalidTariff("price must not be negative".to_string()));
        }
        // the entry guard excludes a concurrent mark_referenced until the write lands
        let mut entry = self.entries.get_mut(&id).ok_or(InsuranceError::TariffNotFound(id))?;
        if self.referenced.contains(&id) {
            return Err(InsuranceError::TariffLocked(id));
        }
        entry.price = round_money(price);
        Ok(entry.clone())
    }

    /// Retire `id` and register a replacement with the same code at `price`.
    /// Stored claim lines keep the old entry and its price.
    pub fn supersede(&self, id: Uuid, price: Decimal) -> InsuranceResult<TariffEntry> {
        if price.is_sign_negative() {
            return Err(InsuranceError::InvalidTariff("price must not be negative".to_string()));
        }

        let replacement = {
            let mut old = self.entries.get_mut(&id).ok_or(InsuranceError::TariffNotFound(id))?;
            if !old.is_active {
                return Err(InsuranceError::InvalidTariff(format!(
                    "tariff {} is already inactive",
                    old.code
                )));
            }
            let replacement = TariffEntry {
                id: Uuid::new_v4(),
                price: round_money(price),
                superseded_by: None,
                ..old.clone()
            };
            old.is_active = false;
            old.superseded_by = Some(replacement.id);
            replacement
        };

        self.entries.insert(replacement.id, replacement.clone());
        self.active_codes.insert((replacement.scheme, replacement.code.clone()), replacement.id);

        info!(
            scheme = %replacement.scheme,
            code = %replacement.code,
            old_id = %id,
            new_id = %replacement.id,
            price = %replacement.price,
            "Superseded tariff"
        );
        Ok(replacement)
    }

    pub fn deactivate(&self, id: Uuid) -> InsuranceResult<TariffEntry> {
        let deactivated = {
            let mut entry = self.entries.get_mut(&id).ok_or(InsuranceError::TariffNotFound(id))?;
            entry.is_active = false;
            entry.clone()
        };
        self.active_codes
            .remove_if(&(deactivated.scheme, deactivated.code.clone()), |_, active| *active == id);
        Ok(deactivated)
    }

    /// Freeze the price of an entry that a finalized claim line points at
    pub fn mark_referenced(&self, id: Uuid) -> InsuranceResult<()> {
        let _entry = self.entries.get(&id).ok_or(InsuranceError::TariffNotFound(id))?;
        self.referenced.insert(id);
        Ok(())
    }

    pub fn is_referenced(&self, id: Uuid) -> bool {
        self.referenced.contains(&id)
    }
}

impl Default for TariffRegistry {
    fn default() -> Self {
        Self::new()
    }
}
