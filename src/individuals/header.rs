//! Header handling: mapping data columns to individual identifiers.

use std::path::Path;

use crate::common::io::read_lines;
use crate::err::Error;

/// Number of fixed metadata columns before the first individual column.
pub const FIXED_COLUMNS: usize = 9;

/// Ordered column-to-individual mapping parsed from the header line.
///
/// The first [`FIXED_COLUMNS`] columns are fixed metadata; every column from
/// there on holds the genotypes of one individual, so data column index
/// equals individual index plus [`FIXED_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    columns: Vec<String>,
}

impl ColumnIndex {
    /// Parse one tab-separated header line.
    pub fn parse(header_line: &str) -> Result<Self, Error> {
        let columns: Vec<String> = header_line
            .trim_end_matches(|c| c == '\n' || c == '\r')
            .split('\t')
            .map(String::from)
            .collect();
        if columns.len() < FIXED_COLUMNS {
            return Err(Error::MalformedHeader(columns.len()));
        }
        Ok(Self { columns })
    }

    /// Load the header from the first line of a columns file.
    pub fn load<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        if !path.as_ref().exists() {
            return Err(Error::NotFound(
                path.as_ref().to_string_lossy().into_owned(),
            ));
        }
        let lines = read_lines(path.as_ref()).map_err(|reason| Error::Read {
            path: path.as_ref().to_string_lossy().into_owned(),
            reason,
        })?;
        Self::parse(lines.first().map(String::as_str).unwrap_or_default())
    }

    /// Number of individuals addressable through this header.
    pub fn individual_count(&self) -> usize {
        self.columns.len() - FIXED_COLUMNS
    }

    /// Name of the individual with the given zero-based index.
    pub fn individual_name(&self, individual: usize) -> Option<&str> {
        self.columns.get(individual + FIXED_COLUMNS).map(|s| s.as_str())
    }

    /// Data column holding the genotype of the given individual.
    pub fn individual_column(&self, individual: usize) -> usize {
        individual + FIXED_COLUMNS
    }
}
