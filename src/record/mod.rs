//! File records: the catalogued form of a physical file

mod export;
mod group;
mod types;

pub use export::{
    flatten_properties, record_from_properties, search_document, to_export_map, ExportMap,
};
pub use group::{parse_group_file, GroupEntry};
pub use types::{ExtractedFields, FieldValue, FileRecord, ReviewState};
