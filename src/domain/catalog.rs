//! Static pricing catalog
//!
//! Maps `(category, item, work type)` to a unit price and a materials-cost
//! flag. The catalog is the only source of prices; caller-supplied prices
//! are never trusted. A missed lookup is a data-quality signal, not an
//! error: the normalizer keeps the item at price 0.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::assessment::{Category, WorkType};

/// One priced catalog line.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub category: Category,
    pub item: &'static str,
    pub work_type: WorkType,
    pub unit_price: f64,
    /// Whether the price includes materials (true) or is labor-only (false).
    pub materials_included: bool,
}

/// Resolved price for one work item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPrice {
    pub unit_price: f64,
    pub materials_included: bool,
}

/// Look up the unit price for `(category, item, work_type)`.
///
/// Item names are matched trimmed and case-insensitively; the extraction
/// model is not reliable about casing. Returns `None` on a miss.
pub fn resolve(category: Category, item: &str, work_type: WorkType) -> Option<ResolvedPrice> {
    let key = (category, item.trim().to_lowercase(), work_type);
    index().get(&key).copied()
}

type CatalogKey = (Category, String, WorkType);

fn index() -> &'static HashMap<CatalogKey, ResolvedPrice> {
    static INDEX: OnceLock<HashMap<CatalogKey, ResolvedPrice>> = OnceLock::new();
    INDEX.get_or_init(|| {
        ENTRIES
            .iter()
            .map(|e| {
                (
                    (e.category, e.item.to_lowercase(), e.work_type),
                    ResolvedPrice {
                        unit_price: e.unit_price,
                        materials_included: e.materials_included,
                    },
                )
            })
            .collect()
    })
}

use Category::*;
use WorkType::*;

/// Unit prices per the standard repair price book. Labor-only lines carry
/// `materials_included: false`.
const ENTRIES: &[CatalogEntry] = &[
    // Appliances
    entry(Appliances, "Refrigerator", Install, 185.0, false),
    entry(Appliances, "Refrigerator", RemoveAndInstall, 225.0, false),
    entry(Appliances, "Range", Install, 160.0, false),
    entry(Appliances, "Range", RemoveAndInstall, 195.0, false),
    entry(Appliances, "Range Hood", RemoveAndInstall, 145.0, true),
    entry(Appliances, "Dishwasher", RemoveAndInstall, 210.0, false),
    entry(Appliances, "Garbage Disposal", RemoveAndInstall, 165.0, true),
    // Cabinets
    entry(Cabinets, "Base Cabinet", RemoveAndInstall, 240.0, true),
    entry(Cabinets, "Wall Cabinet", RemoveAndInstall, 205.0, true),
    entry(Cabinets, "Cabinet Door", Repair, 55.0, false),
    entry(Cabinets, "Cabinet Door", RemoveAndInstall, 85.0, true),
    entry(Cabinets, "Cabinet Drawer", Repair, 48.0, false),
    entry(Cabinets, "Cabinets", Refinish, 38.0, true),
    entry(Cabinets, "Cabinets", Clean, 12.0, false),
    // Countertops
    entry(Countertops, "Laminate Countertop", RemoveAndInstall, 42.0, true),
    entry(Countertops, "Granite Countertop", RemoveAndInstall, 78.0, true),
    entry(Countertops, "Countertop", Repair, 35.0, false),
    entry(Countertops, "Backsplash", RemoveAndInstall, 18.0, true),
    // Doors
    entry(Doors, "Interior Door", RemoveAndInstall, 225.0, true),
    entry(Doors, "Entry Door", RemoveAndInstall, 485.0, true),
    entry(Doors, "Closet Door", RemoveAndInstall, 185.0, true),
    entry(Doors, "Door", Repair, 95.0, false),
    entry(Doors, "Door", Paint, 65.0, true),
    entry(Doors, "Door Hardware", RemoveAndInstall, 75.0, true),
    entry(Doors, "Door Frame", Repair, 110.0, false),
    // Electrical
    entry(Electrical, "Outlet", RemoveAndInstall, 28.0, true),
    entry(Electrical, "Switch", RemoveAndInstall, 26.0, true),
    entry(Electrical, "Light Fixture", RemoveAndInstall, 95.0, true),
    entry(Electrical, "Ceiling Fan", RemoveAndInstall, 165.0, true),
    entry(Electrical, "Smoke Detector", RemoveAndInstall, 55.0, true),
    entry(Electrical, "GFCI Outlet", RemoveAndInstall, 48.0, true),
    entry(Electrical, "Breaker", RemoveAndInstall, 85.0, true),
    // Flooring
    entry(Flooring, "Vinyl Plank", RemoveAndInstall, 5.25, true),
    entry(Flooring, "Vinyl Plank", Install, 3.75, true),
    entry(Flooring, "Carpet", RemoveAndInstall, 3.95, true),
    entry(Flooring, "Ceramic Tile", RemoveAndInstall, 8.5, true),
    entry(Flooring, "Ceramic Tile", Repair, 14.0, false),
    entry(Flooring, "Subfloor", Repair, 6.75, true),
    entry(Flooring, "Baseboard", RemoveAndInstall, 3.25, true),
    entry(Flooring, "Floor", Clean, 0.45, false),
    entry(Flooring, "Flooring", Demolition, 1.6, false),
    // Painting
    entry(Painting, "Walls", Paint, 1.1, true),
    entry(Painting, "Ceiling", Paint, 1.25, true),
    entry(Painting, "Trim", Paint, 2.1, true),
    entry(Painting, "Full Unit", Paint, 0.95, true),
    entry(Painting, "Touch Up", Paint, 0.65, true),
    // Plumbing
    entry(Plumbing, "Kitchen Faucet", RemoveAndInstall, 145.0, true),
    entry(Plumbing, "Bathroom Faucet", RemoveAndInstall, 125.0, true),
    entry(Plumbing, "Toilet", RemoveAndInstall, 265.0, true),
    entry(Plumbing, "Toilet", Repair, 95.0, false),
    entry(Plumbing, "Sink", RemoveAndInstall, 185.0, true),
    entry(Plumbing, "Shower Head", RemoveAndInstall, 65.0, true),
    entry(Plumbing, "P-Trap", Repair, 75.0, true),
    entry(Plumbing, "Tub", Refinish, 425.0, true),
    entry(Plumbing, "Water Heater", RemoveAndInstall, 850.0, true),
    // Walls
    entry(Walls, "Drywall", Repair, 12.5, true),
    entry(Walls, "Drywall", RemoveAndInstall, 9.25, true),
    entry(Walls, "Ceiling", Repair, 14.0, true),
    entry(Walls, "Wall Tile", RemoveAndInstall, 11.0, true),
    entry(Walls, "Texture", Repair, 4.5, true),
    // Windows
    entry(Windows, "Window", RemoveAndInstall, 385.0, true),
    entry(Windows, "Window", Repair, 125.0, false),
    entry(Windows, "Window Screen", RemoveAndInstall, 45.0, true),
    entry(Windows, "Blinds", RemoveAndInstall, 38.0, true),
    entry(Windows, "Window", Clean, 18.0, false),
];

const fn entry(
    category: Category,
    item: &'static str,
    work_type: WorkType,
    unit_price: f64,
    materials_included: bool,
) -> CatalogEntry {
    CatalogEntry {
        category,
        item,
        work_type,
        unit_price,
        materials_included,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_triple_resolves() {
        let price = resolve(Category::Flooring, "Vinyl Plank", WorkType::Install).unwrap();
        assert_eq!(price.unit_price, 3.75);
        assert!(price.materials_included);
    }

    #[test]
    fn item_match_ignores_case_and_whitespace() {
        let price = resolve(Category::Plumbing, "  toilet ", WorkType::Repair).unwrap();
        assert_eq!(price.unit_price, 95.0);
        assert!(!price.materials_included);
    }

    #[test]
    fn wrong_work_type_is_a_miss() {
        assert!(resolve(Category::Windows, "Blinds", WorkType::Paint).is_none());
    }

    #[test]
    fn no_duplicate_catalog_keys() {
        assert_eq!(index().len(), ENTRIES.len());
    }
}
