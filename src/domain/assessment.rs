//! Assessment domain types
//!
//! Strongly typed forms of the conversation collaborator's final payload:
//! project header, bilingual scope text, work items, and uploaded assets.
//! Raw inputs are parsed and validated at the boundary so that layout math
//! never sees missing or loosely typed fields.

use serde::{Deserialize, Serialize};

// ============================================================================
// Project Header & Scope
// ============================================================================

/// Identifying metadata for one assessment. Immutable once assembly starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectHeader {
    /// Work-order identifier; doubles as the target document's unique name
    /// after sanitization.
    pub work_order: String,
    pub unit_id: String,
    pub address: String,
    pub square_footage: String,
    pub layout: String,
}

/// Bilingual long-form description of the work scope.
///
/// Stored as plain text; markdown the extraction model tends to emit is
/// stripped before the text reaches the worksheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeText {
    pub source: String,
    pub translated: String,
}

impl ScopeText {
    /// Both halves with markdown markers removed.
    pub fn cleaned(&self) -> ScopeText {
        ScopeText {
            source: strip_markdown(&self.source),
            translated: strip_markdown(&self.translated),
        }
    }
}

/// Remove the markdown the LLM sprinkles into scope text: emphasis markers,
/// heading hashes, backticks, and `[label](url)` links (label kept).
pub fn strip_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' | '_' | '`' => {}
            '#' => {
                // Heading hashes only count at the start of a line.
                if out.ends_with('\n') || out.is_empty() {
                    while chars.peek() == Some(&'#') {
                        chars.next();
                    }
                    if chars.peek() == Some(&' ') {
                        chars.next();
                    }
                } else {
                    out.push('#');
                }
            }
            '[' => {
                // [label](url) -> label; anything else passes through.
                let rest: String = chars.clone().collect();
                if let Some(close) = rest.find(']') {
                    if rest[close + 1..].starts_with('(') {
                        if let Some(paren) = rest[close + 1..].find(')') {
                            out.push_str(&rest[..close]);
                            // Byte offsets don't equal char counts; skip by
                            // chars so multi-byte labels stay aligned.
                            let consumed = rest[..close + 2 + paren].chars().count();
                            for _ in 0..consumed {
                                chars.next();
                            }
                            continue;
                        }
                    }
                }
                out.push('[');
            }
            _ => out.push(c),
        }
    }

    out
}

// ============================================================================
// Work Items
// ============================================================================

/// Fixed set of work categories understood by the pricing catalog.
///
/// Ordering of the table in the worksheet is alphabetical on `as_str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Appliances,
    Cabinets,
    Countertops,
    Doors,
    Electrical,
    Flooring,
    Painting,
    Plumbing,
    Walls,
    Windows,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appliances => "Appliances",
            Self::Cabinets => "Cabinets",
            Self::Countertops => "Countertops",
            Self::Doors => "Doors",
            Self::Electrical => "Electrical",
            Self::Flooring => "Flooring",
            Self::Painting => "Painting",
            Self::Plumbing => "Plumbing",
            Self::Walls => "Walls",
            Self::Windows => "Windows",
        }
    }

    /// Case-insensitive parse of the extraction model's category string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "appliances" | "appliance" => Some(Self::Appliances),
            "cabinets" | "cabinet" => Some(Self::Cabinets),
            "countertops" | "countertop" => Some(Self::Countertops),
            "doors" | "door" => Some(Self::Doors),
            "electrical" => Some(Self::Electrical),
            "flooring" | "floors" => Some(Self::Flooring),
            "painting" | "paint" => Some(Self::Painting),
            "plumbing" => Some(Self::Plumbing),
            "walls" | "walls/ceiling" | "ceiling" => Some(Self::Walls),
            "windows" | "window" => Some(Self::Windows),
            _ => None,
        }
    }
}

/// The kind of work performed on a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkType {
    Clean,
    Paint,
    Install,
    RemoveAndInstall,
    Demolition,
    Repair,
    Repairs,
    Refinish,
    Other,
}

impl WorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "Clean",
            Self::Paint => "Paint",
            Self::Install => "Install",
            Self::RemoveAndInstall => "Remove & Install",
            Self::Demolition => "Demolition",
            Self::Repair => "Repair",
            Self::Repairs => "Repairs",
            Self::Refinish => "Refinish",
            Self::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "clean" => Some(Self::Clean),
            "paint" => Some(Self::Paint),
            "install" => Some(Self::Install),
            "remove & install" | "remove and install" => Some(Self::RemoveAndInstall),
            "demolition" | "demo" => Some(Self::Demolition),
            "repair" => Some(Self::Repair),
            "repairs" => Some(Self::Repairs),
            "refinish" => Some(Self::Refinish),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Unit of measure for a line item quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitOfMeasure {
    /// Square feet
    Sf,
    /// Linear feet
    Lf,
    /// Each
    Ea,
    /// Set
    Set,
}

impl UnitOfMeasure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sf => "SF",
            Self::Lf => "LF",
            Self::Ea => "EA",
            Self::Set => "SET",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SF" => Some(Self::Sf),
            "LF" => Some(Self::Lf),
            "EA" => Some(Self::Ea),
            "SET" => Some(Self::Set),
            _ => None,
        }
    }
}

/// One raw line item as extracted by the conversation model. Loosely typed;
/// the normalizer validates it into a [`WorkItem`] or rejects it with a
/// reason. Any caller-supplied `total` is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkItem {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub notes: String,
}

/// One priced line of the worksheet. Created by the normalizer, read-only
/// afterward. `total` is always `quantity * unit_price` as resolved from the
/// catalog, never taken from input.
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    pub category: Category,
    pub item: String,
    pub work_type: WorkType,
    pub unit: UnitOfMeasure,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
    pub notes: String,
    pub materials_included: bool,
}

/// A raw item the normalizer refused, with the field that disqualified it.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    pub item: String,
    pub reason: String,
}

// ============================================================================
// Assets
// ============================================================================

/// One raster image in the inbound payload: base64 (optionally a data URL)
/// plus a display name and, for photos, a caption.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetUpload {
    pub name: String,
    /// Base64-encoded image bytes, with or without a `data:<mime>;base64,`
    /// prefix.
    pub data: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// One successfully persisted file in the asset store.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedAsset {
    pub name: String,
    /// Stable URL usable inside an image-embed formula, not just a browsing
    /// link.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Per-asset upload outcome. A failed upload is a normal result, not an
/// error path; the batch always reports one outcome per input asset.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetOutcome {
    Uploaded(UploadedAsset),
    Failed { name: String, error: String },
}

impl AssetOutcome {
    pub fn uploaded(&self) -> Option<&UploadedAsset> {
        match self {
            Self::Uploaded(asset) => Some(asset),
            Self::Failed { .. } => None,
        }
    }
}

// ============================================================================
// Submission envelope
// ============================================================================

/// The conversation collaborator's final, "complete" payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRequest {
    pub header: ProjectHeader,
    pub scope: ScopeText,
    pub items: Vec<RawWorkItem>,
    #[serde(default)]
    pub sketch: Option<AssetUpload>,
    #[serde(default)]
    pub photos: Vec<AssetUpload>,
}

/// Result contract back to the caller. Partial photo failures appear in
/// `photos`; they do not fail the submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub success: bool,
    pub document_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sketch: Option<AssetOutcome>,
    pub photos: Vec<AssetOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_items: Vec<SkippedItem>,
}
