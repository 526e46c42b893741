//! Source file naming convention.
//!
//! Census extracts encode their identifiers in the file name, e.g.
//! `2016Census_G02_AUS_STE.csv`:
//!
//! ```text
//! 2016Census _ G02 _ AUS _ STE .csv
//!            segment[1]     last segment
//!            table id       geographic level
//! ```
//!
//! The file name is split on the delimiter, then the last segment loses
//! everything from its first `.` (the extension).
//! Segment 1 is the table/partition id. For geographically stratified
//! tables the last segment is the geographic level, and at least three
//! segments are required so it cannot alias the table id.

use std::path::Path;

use crate::error::InputError;
use crate::record::RecordVariant;

/// Default segment delimiter.
pub const DEFAULT_FILE_NAME_DELIMITER: char = '_';

/// Identifiers derived from a source file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub partition_id: String,
    /// `None` for [`RecordVariant::Single`].
    pub geo_level: Option<String>,
}

/// Parse `path`'s file name according to the naming convention.
pub fn parse_file_name(
    path: &Path,
    variant: RecordVariant,
    delimiter: char,
) -> Result<FileMetadata, InputError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| InputError::FileNaming {
            name: path.display().to_string(),
            reason: "path has no UTF-8 file name".into(),
        })?;

    let naming = |reason: String| InputError::FileNaming {
        name: name.to_string(),
        reason,
    };

    // Only the last segment carries the extension; dots elsewhere are data.
    let mut segments: Vec<&str> = name.split(delimiter).collect();
    if let Some(last) = segments.last_mut() {
        *last = last.split('.').next().unwrap_or_default();
    }

    let min_segments = match variant {
        RecordVariant::Single => 2,
        RecordVariant::GeoStratified => 3,
    };
    if segments.len() < min_segments {
        return Err(naming(format!(
            "expected at least {min_segments} '{delimiter}'-separated segments, found {}",
            segments.len()
        )));
    }

    let partition_id = segments[1];
    if partition_id.is_empty() {
        return Err(naming("table identifier segment is empty".into()));
    }

    let geo_level = match variant {
        RecordVariant::Single => None,
        RecordVariant::GeoStratified => {
            let last = segments[segments.len() - 1];
            if last.is_empty() {
                return Err(naming("geographic level segment is empty".into()));
            }
            Some(last.to_string())
        }
    };

    Ok(FileMetadata {
        partition_id: partition_id.to_string(),
        geo_level,
    })
}
