//! Line-item normalizer
//!
//! Validates the loosely typed items coming out of the extraction
//! conversation, resolves prices against the static catalog, recomputes
//! totals, and sorts by category. The sort is stable so that the assembler's
//! merge-run detection sees contiguous category blocks in input order.

use tracing::warn;

use crate::domain::assessment::{
    Category, RawWorkItem, SkippedItem, UnitOfMeasure, WorkItem, WorkType,
};
use crate::domain::catalog;

/// Result of normalizing one submission's raw items.
#[derive(Debug, Default)]
pub struct NormalizedItems {
    /// Valid items, category-sorted, prices resolved, totals recomputed.
    pub items: Vec<WorkItem>,
    /// Items rejected at the boundary, with the disqualifying field named.
    pub skipped: Vec<SkippedItem>,
}

/// Normalize raw extracted items into priced, sorted [`WorkItem`]s.
///
/// A catalog miss never drops an item: the line stays in the worksheet at
/// unit price 0 so a human reviewer can see it was not priced. Only items
/// with a missing category/item name or a non-positive quantity are
/// excluded, and those are reported in `skipped` rather than silently
/// discarded.
pub fn normalize(raw_items: &[RawWorkItem]) -> NormalizedItems {
    let mut out = NormalizedItems::default();

    for raw in raw_items {
        match validate(raw) {
            Ok(item) => out.items.push(item),
            Err(reason) => {
                warn!(item = %raw.item, reason = %reason, "skipping invalid work item");
                out.skipped.push(SkippedItem {
                    item: if raw.item.trim().is_empty() {
                        "(unnamed)".to_string()
                    } else {
                        raw.item.trim().to_string()
                    },
                    reason,
                });
            }
        }
    }

    // Stable: ties keep input order, which the merge-run detection relies on
    // for identical plans across re-submissions.
    out.items
        .sort_by(|a, b| a.category.as_str().cmp(b.category.as_str()));

    out
}

fn validate(raw: &RawWorkItem) -> Result<WorkItem, String> {
    let item_name = raw.item.trim();
    if item_name.is_empty() {
        return Err("missing item name".to_string());
    }

    if raw.category.trim().is_empty() {
        return Err("missing category".to_string());
    }
    let category = Category::parse(&raw.category)
        .ok_or_else(|| format!("unknown category '{}'", raw.category.trim()))?;

    if !(raw.quantity > 0.0) {
        return Err(format!("non-positive quantity {}", raw.quantity));
    }

    // Unknown work types and units degrade rather than reject: the item is
    // still real work, it just will not price.
    let work_type = WorkType::parse(&raw.description).unwrap_or(WorkType::Other);
    let unit = UnitOfMeasure::parse(&raw.unit).unwrap_or(UnitOfMeasure::Ea);

    let (unit_price, materials_included) = match catalog::resolve(category, item_name, work_type) {
        Some(price) => (price.unit_price, price.materials_included),
        None => {
            warn!(
                category = category.as_str(),
                item = item_name,
                work_type = work_type.as_str(),
                "no catalog price; keeping item at $0"
            );
            (0.0, false)
        }
    };

    Ok(WorkItem {
        category,
        item: item_name.to_string(),
        work_type,
        unit,
        quantity: raw.quantity,
        unit_price,
        total: raw.quantity * unit_price,
        notes: raw.notes.trim().to_string(),
        materials_included,
    })
}

/// Sum of all line totals, formatted into the worksheet's totals row.
pub fn grand_total(items: &[WorkItem]) -> f64 {
    items.iter().map(|i| i.total).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(category: &str, item: &str, description: &str, qty: f64) -> RawWorkItem {
        RawWorkItem {
            category: category.to_string(),
            item: item.to_string(),
            description: description.to_string(),
            unit: "EA".to_string(),
            quantity: qty,
            notes: String::new(),
        }
    }

    #[test]
    fn totals_are_recomputed_from_catalog_price() {
        let result = normalize(&[raw("Plumbing", "Toilet", "Remove & Install", 2.0)]);
        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_eq!(item.unit_price, 265.0);
        assert_eq!(item.total, 530.0);
        assert!(item.materials_included);
    }

    #[test]
    fn catalog_miss_keeps_item_at_zero() {
        let result = normalize(&[raw("Electrical", "Intercom Panel", "Install", 1.0)]);
        assert!(result.skipped.is_empty());
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].unit_price, 0.0);
        assert_eq!(result.items[0].total, 0.0);
        assert!(!result.items[0].materials_included);
    }

    #[test]
    fn invalid_items_are_skipped_and_reported() {
        let result = normalize(&[
            raw("Doors", "", "Repair", 1.0),
            raw("", "Door", "Repair", 1.0),
            raw("Doors", "Door", "Repair", 0.0),
            raw("Doors", "Door", "Repair", -3.0),
            raw("Landscaping", "Hedge", "Other", 1.0),
            raw("Doors", "Door", "Repair", 1.0),
        ]);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.skipped.len(), 5);
        assert!(result.skipped[0].reason.contains("item name"));
        assert!(result.skipped[1].reason.contains("category"));
        assert!(result.skipped[2].reason.contains("quantity"));
        assert!(result.skipped[4].reason.contains("Landscaping"));
    }

    #[test]
    fn sort_is_alphabetical_by_category_and_stable_within() {
        let result = normalize(&[
            raw("Windows", "Window", "Repair", 1.0),
            raw("Doors", "Interior Door", "Remove & Install", 1.0),
            raw("Windows", "Blinds", "Remove & Install", 2.0),
            raw("Doors", "Door", "Paint", 3.0),
        ]);
        let names: Vec<&str> = result.items.iter().map(|i| i.item.as_str()).collect();
        assert_eq!(names, vec!["Interior Door", "Door", "Window", "Blinds"]);
    }

    #[test]
    fn categories_are_contiguous_after_sort() {
        let result = normalize(&[
            raw("Painting", "Walls", "Paint", 400.0),
            raw("Flooring", "Carpet", "Remove & Install", 600.0),
            raw("Painting", "Ceiling", "Paint", 400.0),
            raw("Flooring", "Baseboard", "Remove & Install", 120.0),
            raw("Plumbing", "Toilet", "Repair", 1.0),
        ]);
        let cats: Vec<Category> = result.items.iter().map(|i| i.category).collect();
        for i in 0..cats.len() {
            for k in i + 1..cats.len() {
                if cats[i] == cats[k] {
                    for j in i..k {
                        assert_eq!(cats[j], cats[i], "category run interleaved at {j}");
                    }
                }
            }
        }
    }

    #[test]
    fn unknown_work_type_and_unit_degrade_to_defaults() {
        let mut item = raw("Walls", "Drywall", "Patch", 10.0);
        item.unit = "yards".to_string();

        let result = normalize(&[item]);
        assert_eq!(result.items[0].work_type, WorkType::Other);
        assert_eq!(result.items[0].unit, UnitOfMeasure::Ea);
    }

    #[test]
    fn grand_total_sums_line_totals() {
        let result = normalize(&[
            raw("Plumbing", "Toilet", "Remove & Install", 1.0), // 265
            raw("Windows", "Blinds", "Remove & Install", 2.0),  // 76
        ]);
        assert_eq!(grand_total(&result.items), 341.0);
    }
}
