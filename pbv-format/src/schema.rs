//! Entry classification and the schema descriptor registry.
//!
//! Every entry path maps to exactly one [`SchemaDescriptor`], which declares
//! the whole transform pair for that entry: its host encoding, the string
//! fields that hold nested JSON documents, the noise fields to suppress, and
//! the array fields to split into per-member files or to reorder. The rest of
//! the pipeline only ever consults this registry.

use crate::encoding::Encoding;

/// Transform family an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    /// `DataModelSchema` - the tabular model definition.
    DataModel,
    /// `Report/Layout` - report pages, visuals, bookmarks.
    ReportLayout,
    /// `DiagramLayout` / `DiagramState` - model diagram placement.
    DiagramLayout,
    /// Any other JSON entry.
    GenericJson,
    /// Opaque passthrough.
    Binary,
}

/// How a noise field behaves on the compress path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoisePolicy {
    /// Extraction removes the field; compression leaves it absent.
    Drop,
    /// Extraction replaces the value with [`NOISE_PLACEHOLDER`]; compression
    /// keeps the placeholder because the host requires the field to exist.
    Scrub,
}

/// A field whose value churns run-to-run without semantic meaning.
#[derive(Debug, Clone, Copy)]
pub struct NoiseField {
    /// Field name, matched at any depth against string-valued fields.
    pub name: &'static str,
    /// Compress-path behavior.
    pub policy: NoisePolicy,
}

/// Stable placeholder written for [`NoisePolicy::Scrub`] fields.
pub const NOISE_PLACEHOLDER: &str = "1699-12-31T00:00:00";

/// Static transform descriptor for one schema kind.
#[derive(Debug, Clone, Copy)]
pub struct SchemaDescriptor {
    /// Transform family.
    pub kind: SchemaKind,
    /// Byte encoding the host uses for this entry.
    pub encoding: Encoding,
    /// Field names whose string values hold nested JSON documents.
    pub embedded_json_fields: &'static [&'static str],
    /// Fields suppressed during extraction.
    pub noise_fields: &'static [NoiseField],
    /// Array fields decomposed into one file per member.
    pub split_groups: &'static [&'static str],
    /// Array fields reordered by identifier on extraction (never on compress).
    pub sorted_groups: &'static [&'static str],
}

/// `DataModelSchema` descriptor.
pub const DATA_MODEL: SchemaDescriptor = SchemaDescriptor {
    kind: SchemaKind::DataModel,
    encoding: Encoding::Utf16Le,
    embedded_json_fields: &[],
    noise_fields: &[
        NoiseField {
            name: "modifiedTime",
            policy: NoisePolicy::Drop,
        },
        NoiseField {
            name: "structureModifiedTime",
            policy: NoisePolicy::Drop,
        },
        NoiseField {
            name: "refreshedTime",
            policy: NoisePolicy::Drop,
        },
    ],
    split_groups: &["tables"],
    sorted_groups: &[],
};

/// `Report/Layout` descriptor.
pub const REPORT_LAYOUT: SchemaDescriptor = SchemaDescriptor {
    kind: SchemaKind::ReportLayout,
    encoding: Encoding::Utf16Le,
    embedded_json_fields: &["config", "filters", "query", "dataTransforms"],
    noise_fields: &[],
    split_groups: &["sections", "bookmarks"],
    sorted_groups: &["visualContainers"],
};

/// `DiagramLayout` / `DiagramState` descriptor.
pub const DIAGRAM_LAYOUT: SchemaDescriptor = SchemaDescriptor {
    kind: SchemaKind::DiagramLayout,
    encoding: Encoding::Utf16Le,
    embedded_json_fields: &[],
    noise_fields: &[],
    split_groups: &[],
    sorted_groups: &[],
};

/// `Metadata` descriptor: generic JSON, but UTF-16-LE on the host side.
pub const METADATA: SchemaDescriptor = SchemaDescriptor {
    kind: SchemaKind::GenericJson,
    encoding: Encoding::Utf16Le,
    embedded_json_fields: &[],
    noise_fields: &[],
    split_groups: &[],
    sorted_groups: &[],
};

/// Descriptor for loose `*.json` entries.
pub const GENERIC_JSON: SchemaDescriptor = SchemaDescriptor {
    kind: SchemaKind::GenericJson,
    encoding: Encoding::Utf8,
    embedded_json_fields: &[],
    noise_fields: &[],
    split_groups: &[],
    sorted_groups: &[],
};

/// Opaque passthrough descriptor.
pub const BINARY: SchemaDescriptor = SchemaDescriptor {
    kind: SchemaKind::Binary,
    encoding: Encoding::Utf8,
    embedded_json_fields: &[],
    noise_fields: &[],
    split_groups: &[],
    sorted_groups: &[],
};

/// Classify an entry path. Pure function of the path; unknown paths fall back
/// to binary passthrough (use [`is_registered`] to tell the two apart).
pub fn classify(path: &str) -> &'static SchemaDescriptor {
    match path {
        "DataModelSchema" => &DATA_MODEL,
        "Report/Layout" => &REPORT_LAYOUT,
        "DiagramLayout" | "DiagramState" => &DIAGRAM_LAYOUT,
        "Metadata" => &METADATA,
        "SecurityBindings" | "Settings" | "Version" => &BINARY,
        p if p.ends_with(".json") => &GENERIC_JSON,
        _ => &BINARY,
    }
}

/// Whether a classification rule explicitly matches this path.
pub fn is_registered(path: &str) -> bool {
    matches!(
        path,
        "DataModelSchema"
            | "Report/Layout"
            | "DiagramLayout"
            | "DiagramState"
            | "Metadata"
            | "SecurityBindings"
            | "Settings"
            | "Version"
    ) || path.ends_with(".json")
        || path.starts_with("Report/StaticResources/")
}
