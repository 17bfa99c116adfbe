//! Document assembler
//!
//! Pure layout computation: turns the normalized submission into a
//! [`LayoutPlan`] describing every region of the worksheet (ranges, values,
//! merges, row sizing, formats). No I/O happens here; the target writer
//! translates the plan into API directives.
//!
//! Page geometry is tracked in pixels. The photo gallery is pushed to the
//! top of a fresh printed page by a spacer row whose height is computed from
//! the heights this plan itself emitted, so header or sketch sizing changes
//! cannot drift out of sync with pagination.

use crate::domain::assessment::{ProjectHeader, ScopeText, UploadedAsset, WorkItem};
use crate::pipeline::normalize::grand_total;

/// Worksheet column count: Category, Item, Work, Qty, Unit, Unit Price,
/// Total, Notes.
pub const COLUMN_COUNT: u32 = 8;

/// Column pixel widths, index-aligned with the table columns.
pub const COLUMN_WIDTHS_PX: [u32; COLUMN_COUNT as usize] =
    [110, 170, 130, 60, 60, 100, 110, 230];

/// Usable pixel height of one printed page (letter portrait minus margins).
pub const PAGE_HEIGHT_PX: u32 = 940;
/// Extra pixels past the page boundary so the gallery header clears it.
pub const SPACER_BUFFER_PX: u32 = 20;
/// Minimum spacer height, for visual separation from the totals row.
pub const SPACER_MIN_PX: u32 = 50;

const HEADER_ROW_PX: u32 = 26;
const SCOPE_LABEL_ROW_PX: u32 = 26;
/// Estimated render height of an auto-fit scope row, used only for
/// pagination math; the actual height is decided by the target service.
const SCOPE_TEXT_EST_PX: u32 = 120;
const SKETCH_ROW_PX: u32 = 320;
const TABLE_HEADER_ROW_PX: u32 = 28;
const ITEM_ROW_PX: u32 = 22;
const TOTALS_ROW_PX: u32 = 26;
const GALLERY_HEADER_ROW_PX: u32 = 28;
const PHOTO_ROW_PX: u32 = 280;
const CAPTION_ROW_PX: u32 = 22;

const LABEL_FILL: &str = "#d9d9d9";
const TABLE_HEADER_FILL: &str = "#bfbfbf";

// ============================================================================
// Plan types
// ============================================================================

/// Half-open row/column range on the worksheet grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    pub start_row: u32,
    pub end_row: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl GridRange {
    pub fn cell(row: u32, col: u32) -> Self {
        Self {
            start_row: row,
            end_row: row + 1,
            start_col: col,
            end_col: col + 1,
        }
    }

    pub fn row_span(start_row: u32, end_row: u32, col: u32) -> Self {
        Self {
            start_row,
            end_row,
            start_col: col,
            end_col: col + 1,
        }
    }

    pub fn col_span(row: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            start_row: row,
            end_row: row + 1,
            start_col,
            end_col,
        }
    }

    /// More than one cell, i.e. worth a merge directive.
    pub fn is_span(&self) -> bool {
        self.end_row - self.start_row > 1 || self.end_col - self.start_col > 1
    }
}

/// Content written into a region's anchor cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Number(f64),
    /// Embedded via an image formula referencing an uploaded asset URL.
    Image(String),
    Blank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    Center,
    Right,
}

/// Format directive attached to a region. Defaults to plain text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellFormat {
    pub bold: bool,
    /// Background fill as a hex color.
    pub fill: Option<&'static str>,
    pub bordered: bool,
    pub wrap: bool,
    pub number_format: Option<NumberFormat>,
    pub align: Option<HorizontalAlign>,
}

impl CellFormat {
    fn label() -> Self {
        Self {
            bold: true,
            fill: Some(LABEL_FILL),
            ..Self::default()
        }
    }

    fn table_header() -> Self {
        Self {
            bold: true,
            fill: Some(TABLE_HEADER_FILL),
            bordered: true,
            align: Some(HorizontalAlign::Center),
            ..Self::default()
        }
    }

    fn table_cell() -> Self {
        Self {
            bordered: true,
            ..Self::default()
        }
    }

    fn currency_cell() -> Self {
        Self {
            bordered: true,
            number_format: Some(NumberFormat::Currency),
            ..Self::default()
        }
    }
}

/// How the target service should size one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowHeight {
    Fixed(u32),
    /// Grow to fit wrapped content; the service decides the final height.
    AutoFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpec {
    pub row: u32,
    pub height: RowHeight,
}

/// One addressed piece of worksheet content.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub range: GridRange,
    pub payload: Payload,
    pub format: CellFormat,
}

/// The assembler's sole output: a purely descriptive worksheet layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub regions: Vec<Region>,
    pub merges: Vec<GridRange>,
    pub row_specs: Vec<RowSpec>,
    pub column_widths: Vec<u32>,
}

impl LayoutPlan {
    pub fn row_count(&self) -> u32 {
        self.row_specs.iter().map(|s| s.row + 1).max().unwrap_or(0)
    }
}

// ============================================================================
// Assembler
// ============================================================================

/// Compute the complete worksheet layout for one submission.
///
/// `items` must already be category-sorted (the normalizer guarantees it);
/// `photos` are only the successfully uploaded ones, in upload order.
pub fn assemble(
    header: &ProjectHeader,
    scope: &ScopeText,
    sketch: Option<&UploadedAsset>,
    items: &[WorkItem],
    photos: &[UploadedAsset],
) -> LayoutPlan {
    let mut b = PlanBuilder::default();

    b.header_block(header);
    b.scope_block(&scope.cleaned());
    if let Some(sketch) = sketch {
        b.sketch_block(sketch);
    }
    b.item_table(items);
    if !photos.is_empty() {
        b.photo_gallery(photos);
    }

    LayoutPlan {
        regions: b.regions,
        merges: b.merges,
        row_specs: b.row_specs,
        column_widths: COLUMN_WIDTHS_PX.to_vec(),
    }
}

/// Spacer height that lands the next row at the top of a fresh page of
/// height `page_px`, overshooting by `buffer_px` and never shrinking below
/// `floor_px`.
fn spacer_px(used_px: u32, page_px: u32, buffer_px: u32, floor_px: u32) -> u32 {
    let used = used_px % page_px;
    (page_px - used + buffer_px).max(floor_px)
}

/// Gallery spacer for the standard page geometry.
pub fn page_break_spacer(used_px: u32) -> u32 {
    spacer_px(used_px, PAGE_HEIGHT_PX, SPACER_BUFFER_PX, SPACER_MIN_PX)
}

#[derive(Default)]
struct PlanBuilder {
    regions: Vec<Region>,
    merges: Vec<GridRange>,
    row_specs: Vec<RowSpec>,
    next_row: u32,
}

impl PlanBuilder {
    fn put(&mut self, range: GridRange, payload: Payload, format: CellFormat) {
        if range.is_span() {
            self.merges.push(range);
        }
        self.regions.push(Region {
            range,
            payload,
            format,
        });
    }

    fn row(&mut self, height: RowHeight) -> u32 {
        let row = self.next_row;
        self.row_specs.push(RowSpec { row, height });
        self.next_row += 1;
        row
    }

    /// Pixel height of everything emitted so far, using the auto-fit
    /// estimate for rows the service will size itself.
    fn emitted_height_px(&self) -> u32 {
        self.row_specs
            .iter()
            .map(|s| match s.height {
                RowHeight::Fixed(px) => px,
                RowHeight::AutoFit => SCOPE_TEXT_EST_PX,
            })
            .sum()
    }

    fn header_block(&mut self, header: &ProjectHeader) {
        let label = CellFormat::label;
        let value = CellFormat::default;

        let r = self.row(RowHeight::Fixed(HEADER_ROW_PX));
        self.put(GridRange::cell(r, 0), text("Work Order"), label());
        self.put(GridRange::cell(r, 1), text(&header.work_order), value());
        self.put(GridRange::cell(r, 2), text("Unit"), label());
        self.put(GridRange::cell(r, 3), text(&header.unit_id), value());
        self.put(GridRange::cell(r, 4), text("Address"), label());
        self.put(
            GridRange::col_span(r, 5, COLUMN_COUNT),
            text(&header.address),
            value(),
        );

        let r = self.row(RowHeight::Fixed(HEADER_ROW_PX));
        self.put(GridRange::cell(r, 0), text("Sq Ft"), label());
        self.put(GridRange::cell(r, 1), text(&header.square_footage), value());
        self.put(GridRange::cell(r, 2), text("Layout"), label());
        self.put(
            GridRange::col_span(r, 3, COLUMN_COUNT),
            text(&header.layout),
            value(),
        );
    }

    fn scope_block(&mut self, scope: &ScopeText) {
        let half = COLUMN_COUNT / 2;

        let r = self.row(RowHeight::Fixed(SCOPE_LABEL_ROW_PX));
        self.put(
            GridRange::col_span(r, 0, half),
            text("Scope of Work"),
            CellFormat::label(),
        );
        self.put(
            GridRange::col_span(r, half, COLUMN_COUNT),
            text("Alcance del Trabajo"),
            CellFormat::label(),
        );

        // Description length varies per submission, so this row auto-fits
        // instead of carrying a fixed height.
        let r = self.row(RowHeight::AutoFit);
        let wrapped = CellFormat {
            wrap: true,
            ..CellFormat::default()
        };
        self.put(
            GridRange::col_span(r, 0, half),
            text(&scope.source),
            wrapped.clone(),
        );
        self.put(
            GridRange::col_span(r, half, COLUMN_COUNT),
            text(&scope.translated),
            wrapped,
        );
    }

    fn sketch_block(&mut self, sketch: &UploadedAsset) {
        let r = self.row(RowHeight::Fixed(SKETCH_ROW_PX));
        self.put(
            GridRange::col_span(r, 0, COLUMN_COUNT),
            Payload::Image(sketch.url.clone()),
            CellFormat {
                align: Some(HorizontalAlign::Center),
                ..CellFormat::default()
            },
        );
    }

    fn item_table(&mut self, items: &[WorkItem]) {
        let r = self.row(RowHeight::Fixed(TABLE_HEADER_ROW_PX));
        let titles = [
            "Category", "Item", "Work", "Qty", "Unit", "Unit Price", "Total", "Notes",
        ];
        for (col, title) in titles.into_iter().enumerate() {
            self.put(
                GridRange::cell(r, col as u32),
                text(title),
                CellFormat::table_header(),
            );
        }

        let first_data_row = self.next_row;
        for item in items {
            let r = self.row(RowHeight::Fixed(ITEM_ROW_PX));
            self.put(GridRange::cell(r, 1), text(&item.item), CellFormat::table_cell());
            self.put(
                GridRange::cell(r, 2),
                text(item.work_type.as_str()),
                CellFormat::table_cell(),
            );
            self.put(
                GridRange::cell(r, 3),
                Payload::Number(item.quantity),
                CellFormat::table_cell(),
            );
            self.put(
                GridRange::cell(r, 4),
                text(item.unit.as_str()),
                CellFormat::table_cell(),
            );
            self.put(
                GridRange::cell(r, 5),
                Payload::Number(item.unit_price),
                CellFormat::currency_cell(),
            );
            self.put(
                GridRange::cell(r, 6),
                Payload::Number(item.total),
                CellFormat::currency_cell(),
            );
            // Labor-only pricing is called out so the reviewer knows the
            // line excludes materials.
            let notes = match (item.notes.is_empty(), item.materials_included) {
                (false, true) => item.notes.clone(),
                (false, false) => format!("{} (labor only)", item.notes),
                (true, false) if item.unit_price > 0.0 => "Labor only".to_string(),
                _ => String::new(),
            };
            let payload = if notes.is_empty() {
                Payload::Blank
            } else {
                Payload::Text(notes)
            };
            self.put(
                GridRange::cell(r, 7),
                payload,
                CellFormat {
                    bordered: true,
                    wrap: true,
                    ..CellFormat::default()
                },
            );
        }

        self.category_column(items, first_data_row);
        self.totals_row(items);
    }

    /// Merge-run detection over the sorted item list: a run of more than one
    /// row gets one vertically merged category cell; single rows get a plain
    /// cell. Stable input order makes re-assembly emit identical runs.
    fn category_column(&mut self, items: &[WorkItem], first_data_row: u32) {
        let mut run_start = 0usize;
        for i in 1..=items.len() {
            let run_ends = i == items.len() || items[i].category != items[run_start].category;
            if !run_ends {
                continue;
            }

            let range = GridRange {
                start_row: first_data_row + run_start as u32,
                end_row: first_data_row + i as u32,
                start_col: 0,
                end_col: 1,
            };
            self.put(
                range,
                text(items[run_start].category.as_str()),
                CellFormat {
                    bordered: true,
                    bold: true,
                    ..CellFormat::default()
                },
            );
            run_start = i;
        }
    }

    fn totals_row(&mut self, items: &[WorkItem]) {
        let r = self.row(RowHeight::Fixed(TOTALS_ROW_PX));
        self.put(
            GridRange::col_span(r, 0, 6),
            text("Total"),
            CellFormat {
                bold: true,
                bordered: true,
                align: Some(HorizontalAlign::Right),
                ..CellFormat::default()
            },
        );
        self.put(
            GridRange::cell(r, 6),
            Payload::Number(grand_total(items)),
            CellFormat {
                bold: true,
                bordered: true,
                number_format: Some(NumberFormat::Currency),
                ..CellFormat::default()
            },
        );
        self.put(GridRange::cell(r, 7), Payload::Blank, CellFormat::table_cell());
    }

    fn photo_gallery(&mut self, photos: &[UploadedAsset]) {
        let spacer = page_break_spacer(self.emitted_height_px());
        self.row(RowHeight::Fixed(spacer));

        let r = self.row(RowHeight::Fixed(GALLERY_HEADER_ROW_PX));
        self.put(
            GridRange::col_span(r, 0, COLUMN_COUNT),
            text("Photos"),
            CellFormat::label(),
        );

        for (idx, photo) in photos.iter().enumerate() {
            let r = self.row(RowHeight::Fixed(PHOTO_ROW_PX));
            self.put(
                GridRange::col_span(r, 0, COLUMN_COUNT),
                Payload::Image(photo.url.clone()),
                CellFormat {
                    align: Some(HorizontalAlign::Center),
                    ..CellFormat::default()
                },
            );

            let r = self.row(RowHeight::Fixed(CAPTION_ROW_PX));
            let caption = match photo.caption.as_deref() {
                Some(c) if !c.is_empty() => format!("Photo {}: {}", idx + 1, c),
                _ => format!("Photo {}", idx + 1),
            };
            self.put(
                GridRange::col_span(r, 0, COLUMN_COUNT),
                text(caption),
                CellFormat {
                    wrap: true,
                    ..CellFormat::default()
                },
            );
        }
    }
}

fn text(s: impl Into<String>) -> Payload {
    Payload::Text(s.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assessment::{Category, UnitOfMeasure, WorkType};

    fn header() -> ProjectHeader {
        ProjectHeader {
            work_order: "WO-4821".to_string(),
            unit_id: "204".to_string(),
            address: "1400 Maple Ave".to_string(),
            square_footage: "850".to_string(),
            layout: "2BR/1BA".to_string(),
        }
    }

    fn scope() -> ScopeText {
        ScopeText {
            source: "Repaint all walls.".to_string(),
            translated: "Pintar todas las paredes.".to_string(),
        }
    }

    fn item(category: Category, name: &str, qty: f64, price: f64) -> WorkItem {
        WorkItem {
            category,
            item: name.to_string(),
            work_type: WorkType::Repair,
            unit: UnitOfMeasure::Ea,
            quantity: qty,
            unit_price: price,
            total: qty * price,
            notes: String::new(),
            materials_included: true,
        }
    }

    fn photo(name: &str) -> UploadedAsset {
        UploadedAsset {
            name: name.to_string(),
            url: format!("https://assets.test/{name}"),
            caption: Some(format!("caption for {name}")),
        }
    }

    /// Category-column merges inside the item table, as (start_row, end_row)
    /// offsets from the first data row.
    fn category_merges(plan: &LayoutPlan, first_data_row: u32) -> Vec<(u32, u32)> {
        plan.merges
            .iter()
            .filter(|m| m.start_col == 0 && m.end_col == 1 && m.start_row >= first_data_row)
            .map(|m| (m.start_row - first_data_row, m.end_row - first_data_row))
            .collect()
    }

    #[test]
    fn merge_runs_for_contiguous_categories() {
        let items = vec![
            item(Category::Cabinets, "Base Cabinet", 2.0, 240.0),
            item(Category::Cabinets, "Wall Cabinet", 1.0, 205.0),
            item(Category::Cabinets, "Cabinet Door", 3.0, 85.0),
            item(Category::Doors, "Interior Door", 1.0, 225.0),
            item(Category::Plumbing, "Toilet", 1.0, 265.0),
            item(Category::Plumbing, "Sink", 1.0, 185.0),
        ];
        let plan = assemble(&header(), &scope(), None, &items, &[]);

        // Rows 0-1 header, 2-3 scope, 4 table header, data starts at 5.
        let merges = category_merges(&plan, 5);
        assert_eq!(merges, vec![(0, 3), (4, 6)]);

        // The single-row Doors run still gets its category cell, unmerged.
        let doors = plan
            .regions
            .iter()
            .find(|r| r.payload == Payload::Text("Doors".to_string()))
            .unwrap();
        assert_eq!(doors.range, GridRange::cell(8, 0));
        assert!(!doors.range.is_span());
    }

    #[test]
    fn zero_items_still_emit_table_header_and_zero_totals() {
        let plan = assemble(&header(), &scope(), None, &[], &[]);

        let header_cell = plan
            .regions
            .iter()
            .find(|r| r.payload == Payload::Text("Category".to_string()))
            .unwrap();
        let totals = plan
            .regions
            .iter()
            .find(|r| r.format.number_format == Some(NumberFormat::Currency))
            .unwrap();

        // Totals row immediately follows the table header row.
        assert_eq!(totals.range.start_row, header_cell.range.start_row + 1);
        assert_eq!(totals.payload, Payload::Number(0.0));
    }

    #[test]
    fn zero_photos_omit_gallery_and_spacer() {
        let plan = assemble(&header(), &scope(), None, &[], &[]);

        assert!(!plan
            .regions
            .iter()
            .any(|r| r.payload == Payload::Text("Photos".to_string())));
        // No spacer either: every row is one of the known fixed/auto heights.
        assert!(plan.row_specs.iter().all(|s| match s.height {
            RowHeight::Fixed(px) => px < SPACER_MIN_PX || px == SKETCH_ROW_PX,
            RowHeight::AutoFit => true,
        }));
        // Document ends at the totals row.
        assert_eq!(plan.row_count(), 6);
    }

    #[test]
    fn spacer_lands_on_page_boundary_plus_buffer() {
        for page in [400u32, 940, 1000] {
            for used in [0u32, 1, 150, 399, 400, 401, 2799, 5000] {
                let spacer = spacer_px(used, page, 20, 50);
                assert!(spacer >= 50);
                if spacer > 50 || (page - used % page + 20) == 50 {
                    assert_eq!(
                        (used + spacer) % page,
                        20,
                        "used={used} page={page} spacer={spacer}"
                    );
                }
            }
        }
    }

    #[test]
    fn spacer_is_clamped_to_floor() {
        // Content ends 10px short of the boundary: formula would give 30px.
        assert_eq!(spacer_px(930, 940, 20, 50), 50);
    }

    #[test]
    fn gallery_header_starts_a_fresh_page() {
        let items: Vec<WorkItem> = (0..25)
            .map(|i| item(Category::Painting, &format!("Wall {i}"), 1.0, 10.0))
            .collect();
        let plan = assemble(&header(), &scope(), None, &items, &[photo("p1.jpg")]);

        let gallery_row = plan
            .regions
            .iter()
            .find(|r| r.payload == Payload::Text("Photos".to_string()))
            .unwrap()
            .range
            .start_row;

        let before_gallery: u32 = plan
            .row_specs
            .iter()
            .filter(|s| s.row < gallery_row)
            .map(|s| match s.height {
                RowHeight::Fixed(px) => px,
                RowHeight::AutoFit => 120,
            })
            .sum();
        assert_eq!(before_gallery % PAGE_HEIGHT_PX, SPACER_BUFFER_PX);
    }

    #[test]
    fn photos_are_numbered_sequentially() {
        let plan = assemble(
            &header(),
            &scope(),
            None,
            &[],
            &[photo("a.jpg"), photo("b.jpg"), photo("c.jpg")],
        );

        let captions: Vec<String> = plan
            .regions
            .iter()
            .filter_map(|r| match &r.payload {
                Payload::Text(t) if t.starts_with("Photo ") => Some(t.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(captions.len(), 3);
        assert!(captions[0].starts_with("Photo 1:"));
        assert!(captions[1].starts_with("Photo 2:"));
        assert!(captions[2].starts_with("Photo 3:"));
    }

    #[test]
    fn money_columns_carry_currency_format() {
        let items = vec![item(Category::Flooring, "Carpet", 600.0, 3.95)];
        let plan = assemble(&header(), &scope(), None, &items, &[]);

        let currency_cols: Vec<u32> = plan
            .regions
            .iter()
            .filter(|r| r.format.number_format == Some(NumberFormat::Currency))
            .map(|r| r.range.start_col)
            .collect();
        // Unit price, line total, grand total.
        assert_eq!(currency_cols, vec![5, 6, 6]);
    }

    #[test]
    fn sketch_embeds_between_scope_and_table() {
        let sketch = UploadedAsset {
            name: "sketch.png".to_string(),
            url: "https://assets.test/sketch.png".to_string(),
            caption: None,
        };
        let plan = assemble(&header(), &scope(), Some(&sketch), &[], &[]);

        let sketch_region = plan
            .regions
            .iter()
            .find(|r| matches!(r.payload, Payload::Image(_)))
            .unwrap();
        assert_eq!(sketch_region.range.start_row, 4);
        assert_eq!(
            plan.row_specs[4],
            RowSpec {
                row: 4,
                height: RowHeight::Fixed(SKETCH_ROW_PX)
            }
        );
    }

    #[test]
    fn reassembly_is_deterministic() {
        let items = vec![
            item(Category::Walls, "Drywall", 40.0, 12.5),
            item(Category::Walls, "Texture", 40.0, 4.5),
            item(Category::Electrical, "Outlet", 6.0, 28.0),
        ];
        let photos = vec![photo("a.jpg"), photo("b.jpg")];
        let sketch = photo("sketch.png");

        let first = assemble(&header(), &scope(), Some(&sketch), &items, &photos);
        let second = assemble(&header(), &scope(), Some(&sketch), &items, &photos);
        assert_eq!(first, second);
    }
}
