//! CSV → record transformer.
//!
//! Reads a delimited table whose first row is the header, turns every data
//! row into a [`Record`](crate::record::Record) and streams the serialized
//! records into a JSON array. Memory use is bounded by one row.
//!
//! Coercion rules:
//! - the configured sentinel token (default `..`) becomes the sentinel value
//!   (default `-1`);
//! - anything else must parse as a finite `f64`, otherwise the run aborts
//!   with [`InputError::NonNumeric`];
//! - a row whose length differs from the header aborts with
//!   [`InputError::RowLength`].
//!
//! On error the closing `]` is never written, so a truncated document can
//! never be mistaken for a complete one.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::TransformConfig;
use crate::error::{ConfigError, InputError};
use crate::metadata::{parse_file_name, FileMetadata};
use crate::record::{build_record, KvPairs};

/// Streams elements into a JSON array: `[`, elements separated by `,`, `]`.
pub struct JsonArrayWriter<W: Write> {
    inner: W,
    count: usize,
}

impl<W: Write> JsonArrayWriter<W> {
    /// Open the array (writes `[`).
    pub fn new(mut inner: W) -> std::io::Result<Self> {
        inner.write_all(b"[")?;
        Ok(Self { inner, count: 0 })
    }

    /// Append one pre-serialized element.
    pub fn write_element(&mut self, element: &[u8]) -> std::io::Result<()> {
        if self.count > 0 {
            self.inner.write_all(b",")?;
        }
        self.inner.write_all(element)?;
        self.count += 1;
        Ok(())
    }

    /// Number of elements written so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Close the array (writes `]`), flush and hand back the sink.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.inner.write_all(b"]")?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    /// Flush what was written without closing the array.
    ///
    /// A flush failure is logged; the caller is already handling the error
    /// that caused the abandon.
    pub fn abandon(mut self) -> W {
        if let Err(e) = self.inner.flush() {
            warn!(error = %e, written = self.count, "failed to flush partial output");
        }
        self.inner
    }
}

/// Result of a successful transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSummary {
    /// Data rows converted (= records written).
    pub rows: usize,
    /// Fields per record (header columns minus the region column).
    pub fields: usize,
    pub partition_id: String,
    pub geo_level: Option<String>,
}

/// Converts CSV tables into JSON record arrays.
pub struct CsvTransformer {
    config: TransformConfig,
    delimiter: u8,
}

impl CsvTransformer {
    pub fn new(config: TransformConfig) -> Result<Self, ConfigError> {
        let delimiter = config.delimiter_byte()?;
        Ok(Self { config, delimiter })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Derive the metadata for `path` under this transformer's naming rules.
    pub fn metadata_for(&self, path: &Path) -> Result<FileMetadata, InputError> {
        parse_file_name(path, self.config.variant, self.config.file_name_delimiter)
    }

    /// Transform the CSV file at `path`, taking identifiers from its name.
    pub fn transform_file<W: Write>(
        &self,
        path: &Path,
        writer: W,
    ) -> Result<TransformSummary, InputError> {
        let meta = self.metadata_for(path)?;
        info!(
            file = %path.display(),
            partition_id = %meta.partition_id,
            geo_level = ?meta.geo_level,
            "transforming CSV"
        );
        let file = File::open(path)?;
        self.transform(BufReader::new(file), writer, &meta)
    }

    /// Transform a CSV stream into a JSON array written to `writer`.
    pub fn transform<R: Read, W: Write>(
        &self,
        reader: R,
        writer: W,
        meta: &FileMetadata,
    ) -> Result<TransformSummary, InputError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let header = rdr.headers()?.clone();
        if header.is_empty() {
            return Err(InputError::MissingHeader);
        }
        let fields = field_names(&header)?;
        debug!(fields = fields.len(), "header parsed");

        let mut out = JsonArrayWriter::new(writer)?;
        match self.write_rows(&mut rdr, &fields, meta, &mut out) {
            Ok(rows) => {
                out.finish()?;
                info!(rows, fields = fields.len(), "transform complete");
                Ok(TransformSummary {
                    rows,
                    fields: fields.len(),
                    partition_id: meta.partition_id.clone(),
                    geo_level: meta.geo_level.clone(),
                })
            }
            Err(e) => {
                out.abandon();
                Err(e)
            }
        }
    }

    fn write_rows<R: Read, W: Write>(
        &self,
        rdr: &mut csv::Reader<R>,
        fields: &[String],
        meta: &FileMetadata,
        out: &mut JsonArrayWriter<W>,
    ) -> Result<usize, InputError> {
        let mut record = StringRecord::new();
        let mut row = 0usize;

        while rdr.read_record(&mut record)? {
            row += 1;
            if record.len() != fields.len() + 1 {
                return Err(InputError::RowLength {
                    row,
                    expected: fields.len() + 1,
                    got: record.len(),
                });
            }

            let region_id = &record[0];
            if region_id.is_empty() {
                return Err(InputError::EmptyRegionId { row });
            }

            let mut kv_pairs = KvPairs::with_capacity(fields.len());
            for (name, value) in fields.iter().zip(record.iter().skip(1)) {
                kv_pairs.insert(name.clone(), self.coerce(row, name, value)?);
            }

            let bytes = build_record(
                region_id,
                &meta.partition_id,
                meta.geo_level.as_deref(),
                kv_pairs,
            )?;
            out.write_element(&bytes)?;
        }

        Ok(row)
    }

    /// Coerce one cell to a number.
    fn coerce(&self, row: usize, column: &str, value: &str) -> Result<f64, InputError> {
        if value == self.config.sentinel_token {
            return Ok(self.config.sentinel_value);
        }
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(InputError::NonNumeric {
                row,
                column: column.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

/// Field names are header columns 1.., which must be unique.
fn field_names(header: &StringRecord) -> Result<Vec<String>, InputError> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(header.len().saturating_sub(1));
    for (i, name) in header.iter().enumerate().skip(1) {
        if !seen.insert(name) {
            return Err(InputError::DuplicateField {
                field: name.to_string(),
                column: i,
            });
        }
        names.push(name.to_string());
    }
    Ok(names)
}
