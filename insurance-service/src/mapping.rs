use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{ItemMapping, ItemRef, PriceLookup};
use crate::tariffs::TariffRegistry;

/// Internal item → tariff entry, at most one mapping per `(kind, id)`
pub struct ItemMappingTable {
    mappings: DashMap<ItemRef, ItemMapping>,
}

impl ItemMappingTable {
    pub fn new() -> Self {
        Self {
            mappings: DashMap::new(),
        }
    }

    /// Insert or replace the mapping for `item`; returns the previous one
    pub fn map_item(&self, item: ItemRef, item_code: &str, tariff_id: Uuid) -> Option<ItemMapping> {
        let mapping = ItemMapping {
            item,
            item_code: item_code.to_string(),
            tariff_id,
            mapped_at: Utc::now(),
        };
        info!(item = %item, item_code = item_code, tariff_id = %tariff_id, "Mapped item to tariff");
        self.mappings.insert(item, mapping)
    }

    pub fn unmap_item(&self, item: ItemRef) -> Option<ItemMapping> {
        self.mappings.remove(&item).map(|(_, mapping)| mapping)
    }

    pub fn get(&self, item: ItemRef) -> Option<ItemMapping> {
        self.mappings.get(&item).map(|mapping| mapping.value().clone())
    }

    /// Point every mapping at `old` to `new`; returns how many moved
    pub fn repoint(&self, old: Uuid, new: Uuid) -> usize {
        let mut moved = 0;
        for mut mapping in self.mappings.iter_mut() {
            if mapping.tariff_id == old {
                mapping.tariff_id = new;
                mapping.mapped_at = Utc::now();
                moved += 1;
            }
        }
        moved
    }

    /// Single lookup through the mapping. A mapping whose tariff is missing
    /// or inactive counts as not mapped.
    pub fn price_for(&self, item: ItemRef, tariffs: &TariffRegistry) -> PriceLookup {
        let Some(tariff_id) = self.mappings.get(&item).map(|mapping| mapping.tariff_id) else {
            debug!(item = %item, "No tariff mapping");
            return PriceLookup::NotMapped;
        };
        match tariffs.get(tariff_id) {
            Ok(entry) if entry.is_active => PriceLookup::Mapped(entry),
            _ => {
                debug!(item = %item, tariff_id = %tariff_id, "Mapped tariff is not active");
                PriceLookup::NotMapped
            }
        }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl Default for ItemMappingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemKind, TariffEntry, TariffScheme};
    use rust_decimal::Decimal;

    #[test]
    fn test_one_mapping_per_item() {
        let tariffs = TariffRegistry::new();
        let fbc = tariffs
            .register(TariffEntry::new(TariffScheme::Nhis, "FBC01", "Full blood count", "investigation", Decimal::new(2500, 2)))
            .unwrap();
        let fbc_auto = tariffs
            .register(TariffEntry::new(TariffScheme::Nhis, "FBC02", "FBC automated", "investigation", Decimal::new(3000, 2)))
            .unwrap();

        let table = ItemMappingTable::new();
        let item = ItemRef::new(ItemKind::LabService, Uuid::new_v4());

        assert!(table.map_item(item, "LAB-FBC", fbc.id).is_none());
        let previous = table.map_item(item, "LAB-FBC", fbc_auto.id).unwrap();
        assert_eq!(previous.tariff_id, fbc.id);
        assert_eq!(table.len(), 1);

        match table.price_for(item, &tariffs) {
            PriceLookup::Mapped(entry) => assert_eq!(entry.code, "FBC02"),
            PriceLookup::NotMapped => panic!("expected a mapped tariff"),
        }
    }

    #[test]
    fn test_unmapped_and_inactive_lookups() {
        let tariffs = TariffRegistry::new();
        let table = ItemMappingTable::new();
        let item = ItemRef::new(ItemKind::Drug, Uuid::new_v4());

        assert_eq!(table.price_for(item, &tariffs), PriceLookup::NotMapped);

        let entry = tariffs
            .register(TariffEntry::new(TariffScheme::Nhis, "AMOXIC1", "Amoxicillin 250mg", "medicine", Decimal::new(120, 2)))
            .unwrap();
        table.map_item(item, "DRG-AMOX", entry.id);
        assert!(table.price_for(item, &tariffs).is_mapped());

        tariffs.deactivate(entry.id).unwrap();
        assert_eq!(table.price_for(item, &tariffs), PriceLookup::NotMapped);

        table.unmap_item(item);
        assert!(table.get(item).is_none());
    }

    #[test]
    fn test_repoint_after_supersede() {
        let tariffs = TariffRegistry::new();
        let old = tariffs
            .register(TariffEntry::new(TariffScheme::Nhis, "ORS01", "ORS sachet", "medicine", Decimal::new(80, 2)))
            .unwrap();
        let table = ItemMappingTable::new();
        let a = ItemRef::new(ItemKind::Drug, Uuid::new_v4());
        let b = ItemRef::new(ItemKind::Consumable, Uuid::new_v4());
        table.map_item(a, "DRG-ORS", old.id);
        table.map_item(b, "CNS-ORS", old.id);

        let new = tariffs.supersede(old.id, Decimal::new(95, 2)).unwrap();
        assert_eq!(table.repoint(old.id, new.id), 2);
        assert_eq!(table.price_for(a, &tariffs).tariff().map(|t| t.price), Some(Decimal::new(95, 2)));
    }
}
