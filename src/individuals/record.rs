//! Parsing of one variant data line into core fields and a genotype.

use crate::individuals::header::FIXED_COLUMNS;

/// 0-based positions of the core fields within a data line.
const CORE_COLUMNS: [usize; 5] = [1, 2, 3, 4, 7];

/// 0-based position of the INFO-equivalent annotation field.
const INFO_COLUMN: usize = 7;

/// Reason for dropping one data line for one individual.
///
/// Skips are recovered locally: the line is dropped, the reason tallied, and
/// processing continues. They never terminate the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum SkipReason {
    /// Too few fields for the core columns or the requested genotype column.
    #[strum(serialize = "malformed-line")]
    MalformedLine,
    /// The annotation field holds no parseable allele-frequency value.
    #[strum(serialize = "unparsable-frequency")]
    UnparsableFrequency,
}

/// Core fields extracted from one variant line.
///
/// Field order follows source columns `[1, 2, 3, 4, 7]`. The `info` field is
/// rewritten to the decimal string form of the parsed allele frequency.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct VariantCore {
    pub position: String,
    pub id: String,
    pub reference: String,
    pub alternative: String,
    pub info: String,
}

impl VariantCore {
    /// The five fields in source-column order.
    pub fn fields(&self) -> [&str; 5] {
        [
            &self.position,
            &self.id,
            &self.reference,
            &self.alternative,
            &self.info,
        ]
    }
}

/// One data line parsed for one individual.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub core: VariantCore,
    /// Allele frequency extracted from the annotation field.
    pub allele_frequency: f64,
    /// The individual's raw genotype string, e.g. `0|1`.
    pub genotype: String,
}

/// Extract the raw allele-frequency token from the annotation field.
///
/// Prefers the `AF=<value>` component; falls back to the ninth
/// `;`-component, read as `key=value` or as a bare value.
fn frequency_token(info: &str) -> Option<&str> {
    if let Some(value) = info.split(';').find_map(|part| part.strip_prefix("AF=")) {
        return Some(value);
    }
    let part = info.split(';').nth(8)?;
    Some(part.split_once('=').map_or(part, |(_, value)| value))
}

/// Parse the allele frequency from the annotation field.
///
/// Only the first comma-segment of the value is used. Values outside
/// `[0, 1]` are accepted unchanged and still compared against the 0.5
/// threshold downstream.
pub fn parse_frequency(info: &str) -> Result<f64, SkipReason> {
    let token = frequency_token(info).ok_or(SkipReason::UnparsableFrequency)?;
    let token = token.split(',').next().unwrap_or(token);
    let value: f64 = token.parse().map_err(|_| SkipReason::UnparsableFrequency)?;
    if !(0.0..=1.0).contains(&value) {
        tracing::debug!("allele frequency {} outside [0, 1], keeping as-is", value);
    }
    Ok(value)
}

/// Parse one tab-separated data line for the individual at
/// `individual_column`.
pub fn parse_line(line: &str, individual_column: usize) -> Result<ParsedRecord, SkipReason> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < FIXED_COLUMNS || fields.len() <= individual_column {
        return Err(SkipReason::MalformedLine);
    }

    let genotype = fields[individual_column].to_string();
    let allele_frequency = parse_frequency(fields[INFO_COLUMN])?;
    let [position, id, reference, alternative, _] = CORE_COLUMNS.map(|column| fields[column]);

    Ok(ParsedRecord {
        core: VariantCore {
            position: position.to_string(),
            id: id.to_string(),
            reference: reference.to_string(),
            alternative: alternative.to_string(),
            info: allele_frequency.to_string(),
        },
        allele_frequency,
        genotype,
    })
}
