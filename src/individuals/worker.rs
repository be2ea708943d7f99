//! Worker role: filter one contiguous line range for every individual.

use std::path::Path;

use indexmap::IndexMap;
use thousands::Separable;

use crate::common::io::read_lines;
use crate::err::Error;
use crate::individuals::classify::classify;
use crate::individuals::header::ColumnIndex;
use crate::individuals::record::{parse_line, SkipReason, VariantCore};
use crate::individuals::transport::{Tag, Transport};

/// 1-based inclusive line range over the data lines of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    /// First data line to process.
    pub start: usize,
    /// Last data line to process.
    pub stop: usize,
    /// Upper bound on `stop`, from the orchestration layer's line count.
    pub total: usize,
}

impl LineRange {
    /// Clip to `[start, min(stop, total)]` intersected with the lines
    /// actually available, as a 0-based index range.
    ///
    /// A range reaching beyond EOF yields fewer lines, never an error.
    pub fn clip(&self, available: usize) -> std::ops::Range<usize> {
        let start = self.start.max(1) - 1;
        let stop = self.stop.min(self.total).min(available);
        start.min(stop)..stop
    }

    /// Split into `parts` contiguous, disjoint subranges covering the whole
    /// range; trailing subranges may come out empty when there are fewer
    /// lines than parts.
    pub fn split(&self, parts: usize) -> Vec<LineRange> {
        let stop = self.stop.min(self.total);
        let len = (stop + 1).saturating_sub(self.start);
        let base = len / parts.max(1);
        let remainder = len % parts.max(1);

        let mut ranges = Vec::with_capacity(parts);
        let mut start = self.start;
        for part in 0..parts {
            let size = base + usize::from(part < remainder);
            let part_stop = if size == 0 {
                start.saturating_sub(1)
            } else {
                start + size - 1
            };
            ranges.push(LineRange {
                start,
                stop: part_stop,
                total: self.total,
            });
            start = part_stop + 1;
        }
        ranges
    }
}

/// Tally of lines skipped per reason; kept for observability only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SkipCounts {
    pub malformed_line: usize,
    pub unparsable_frequency: usize,
}

impl SkipCounts {
    fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MalformedLine => self.malformed_line += 1,
            SkipReason::UnparsableFrequency => self.unparsable_frequency += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.malformed_line + self.unparsable_frequency
    }
}

/// Everything one worker hands to the aggregator.
///
/// Built incrementally while scanning the range, owned exclusively by the
/// worker until handoff, transmitted exactly once. The three collections
/// are parallel-indexed by individual.
#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
pub struct WorkerContribution {
    /// Output identifier per individual (`chr<chromosome>.<name>`).
    pub identifiers: Vec<String>,
    /// Number of kept records per individual.
    pub counts: Vec<usize>,
    /// Kept records per individual index, in line order within the range.
    pub records: IndexMap<usize, Vec<VariantCore>>,
}

/// Filter the assigned range of `path_in` for every individual of the
/// header.
///
/// Comment lines (starting with `#`) never count towards the line range.
/// Malformed data lines are skipped silently and tallied; a missing or
/// unreadable input file is fatal.
pub fn process_range(
    path_in: &str,
    columns: &ColumnIndex,
    chromosome: &str,
    range: LineRange,
) -> Result<(WorkerContribution, SkipCounts), Error> {
    if !Path::new(path_in).exists() {
        return Err(Error::NotFound(path_in.to_string()));
    }
    let raw = read_lines(path_in).map_err(|reason| Error::Read {
        path: path_in.to_string(),
        reason,
    })?;
    let data: Vec<&str> = raw
        .iter()
        .map(String::as_str)
        .filter(|line| !line.starts_with('#'))
        .collect();
    let window = &data[range.clip(data.len())];
    tracing::debug!(
        "{} of {} data lines fall into range {}..={}",
        window.len(),
        data.len(),
        range.start,
        range.stop
    );

    let mut contribution = WorkerContribution::default();
    let mut skips = SkipCounts::default();
    for individual in 0..columns.individual_count() {
        let Some(name) = columns.individual_name(individual) else {
            break;
        };
        let column = columns.individual_column(individual);
        let started = std::time::Instant::now();

        let mut kept = Vec::new();
        let mut count = 0;
        for line in window {
            match parse_line(line, column) {
                Ok(record) => {
                    if classify(&record.genotype, record.allele_frequency) {
                        kept.push(record.core);
                        count += 1;
                    }
                }
                Err(reason) => skips.record(reason),
            }
        }

        tracing::debug!(
            "individual {} ({}): kept {} records in {:?}",
            individual + 1,
            name,
            count.separate_with_commas(),
            started.elapsed()
        );
        contribution
            .identifiers
            .push(format!("chr{}.{}", chromosome, name));
        contribution.counts.push(count);
        contribution.records.insert(individual, kept);
    }

    if skips.total() > 0 {
        tracing::debug!(
            "skipped lines: {} malformed, {} without usable frequency",
            skips.malformed_line,
            skips.unparsable_frequency
        );
    }

    Ok((contribution, skips))
}

/// Run the worker role: process the range, then hand the contribution to
/// the aggregator as one ordered (identifiers, counts, records) triple.
///
/// Nothing is sent if processing fails; the contribution is complete or
/// absent from the aggregator's point of view.
pub fn run_worker(
    transport: &impl Transport,
    path_in: &str,
    columns: &ColumnIndex,
    chromosome: &str,
    range: LineRange,
) -> Result<(), Error> {
    let started = std::time::Instant::now();
    tracing::info!(
        "worker {}: processing chromosome {}, lines {}..={} of {}",
        transport.rank(),
        chromosome,
        range.start,
        range.stop,
        range.total
    );

    let (contribution, _skips) = process_range(path_in, columns, chromosome, range)?;

    let aggregator = transport.group_size() - 1;
    tracing::info!(
        "worker {}: sending {} individuals to aggregator (rank {})",
        transport.rank(),
        contribution.identifiers.len(),
        aggregator
    );
    transport.send(&contribution.identifiers, aggregator, Tag::Identifiers)?;
    transport.send(&contribution.counts, aggregator, Tag::Counts)?;
    transport.send(&contribution.records, aggregator, Tag::Records)?;

    tracing::info!(
        "worker {}: done, {} records kept in {:?}",
        transport.rank(),
        contribution
            .counts
            .iter()
            .sum::<usize>()
            .separate_with_commas(),
        started.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{process_range, LineRange};
    use crate::err::Error;
    use crate::individuals::header::ColumnIndex;

    #[rstest]
    // full range
    #[case(LineRange { start: 1, stop: 10, total: 10 }, 10, 0..10)]
    // stop bounded by total
    #[case(LineRange { start: 1, stop: 100, total: 10 }, 10, 0..10)]
    // stop bounded by available lines
    #[case(LineRange { start: 3, stop: 8, total: 100 }, 5, 2..5)]
    // range entirely beyond EOF collapses to empty
    #[case(LineRange { start: 8, stop: 20, total: 20 }, 5, 5..5)]
    fn clip_ranges(
        #[case] range: LineRange,
        #[case] available: usize,
        #[case] expected: std::ops::Range<usize>,
    ) {
        assert_eq!(range.clip(available), expected);
    }

    #[test]
    fn split_into_even_parts() {
        let range = LineRange {
            start: 1,
            stop: 10,
            total: 10,
        };

        let parts = range.split(3);

        assert_eq!(
            parts,
            vec![
                LineRange { start: 1, stop: 4, total: 10 },
                LineRange { start: 5, stop: 7, total: 10 },
                LineRange { start: 8, stop: 10, total: 10 },
            ]
        );
    }

    #[test]
    fn split_with_fewer_lines_than_parts() {
        let range = LineRange {
            start: 1,
            stop: 2,
            total: 2,
        };

        let parts = range.split(3);

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], LineRange { start: 1, stop: 1, total: 2 });
        assert_eq!(parts[1], LineRange { start: 2, stop: 2, total: 2 });
        // the trailing part is empty
        assert!(parts[2].clip(2).is_empty());
    }

    fn write_fixture(dir: &std::path::Path) -> (String, ColumnIndex) {
        let path_in = dir.join("chr22.vcf");
        std::fs::write(
            &path_in,
            concat!(
                "##fileformat=VCFv4.1\n",
                "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tHG1\tHG2\n",
                "22\t100\trs1\tA\tG\t.\tPASS\tAF=0.3\tGT\t0|1\t1|0\n",
                "22\t200\trs2\tC\tT\t.\tPASS\tAF=0.8\tGT\t0|0\t1|1\n",
                "22\t300\trs3\tG\tA\t.\tPASS\tAF=0.2,0.7\tGT\t1|1\t0|0\n",
                "22\t400\trs4\tT\tC\n",
                "22\t500\trs5\tA\tC\t.\tPASS\tAC=5;AN=10\tGT\t1|0\t0|1\n",
            ),
        )
        .expect("write fixture");
        let columns =
            ColumnIndex::parse("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tHG1\tHG2")
                .expect("fixture header");
        (path_in.to_string_lossy().into_owned(), columns)
    }

    #[test]
    fn process_full_range() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let (path_in, columns) = write_fixture(&tmp_dir);

        let (contribution, skips) = process_range(
            &path_in,
            &columns,
            "22",
            LineRange { start: 1, stop: 5, total: 5 },
        )?;

        assert_eq!(
            contribution.identifiers,
            vec!["chr22.HG1".to_string(), "chr22.HG2".to_string()]
        );
        // HG1: rs2 (AF 0.8, allele 0) and rs3 (AF 0.2, allele 1);
        // HG2: rs1 (AF 0.3, allele 1)
        assert_eq!(contribution.counts, vec![2, 1]);
        let hg1 = &contribution.records[&0];
        assert_eq!(hg1.len(), 2);
        assert_eq!(hg1[0].fields(), ["200", "rs2", "C", "T", "0.8"]);
        assert_eq!(hg1[1].fields(), ["300", "rs3", "G", "A", "0.2"]);
        let hg2 = &contribution.records[&1];
        assert_eq!(hg2[0].fields(), ["100", "rs1", "A", "G", "0.3"]);
        // per individual pass: rs4 malformed, rs5 without frequency
        assert_eq!(skips.malformed_line, 2);
        assert_eq!(skips.unparsable_frequency, 2);

        Ok(())
    }

    #[test]
    fn process_subrange_skips_other_lines() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let (path_in, columns) = write_fixture(&tmp_dir);

        let (contribution, _) = process_range(
            &path_in,
            &columns,
            "22",
            LineRange { start: 1, stop: 2, total: 5 },
        )?;

        // only rs1/rs2 are visible; HG1 keeps rs2, HG2 keeps rs1
        assert_eq!(contribution.counts, vec![1, 1]);
        assert_eq!(contribution.records[&0][0].id, "rs2");
        assert_eq!(contribution.records[&1][0].id, "rs1");

        Ok(())
    }

    #[test]
    fn range_beyond_eof_yields_empty_contribution() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let (path_in, columns) = write_fixture(&tmp_dir);

        let (contribution, _) = process_range(
            &path_in,
            &columns,
            "22",
            LineRange { start: 100, stop: 200, total: 200 },
        )?;

        assert_eq!(contribution.counts, vec![0, 0]);

        Ok(())
    }

    #[test]
    fn gzip_input_is_read_transparently() -> Result<(), anyhow::Error> {
        use std::io::Write;

        let tmp_dir = temp_testdir::TempDir::default();
        let (_, columns) = write_fixture(&tmp_dir);
        let path_gz = tmp_dir.join("chr22.vcf.gz");
        {
            let mut writer = crate::common::io::open_write_maybe_gz(&path_gz)?;
            writer.write_all(std::fs::read(tmp_dir.join("chr22.vcf"))?.as_slice())?;
            writer.flush()?;
        }

        let (contribution, _) = process_range(
            path_gz.to_str().expect("utf-8 path"),
            &columns,
            "22",
            LineRange { start: 1, stop: 5, total: 5 },
        )?;

        assert_eq!(contribution.counts, vec![2, 1]);

        Ok(())
    }

    #[test]
    fn missing_input_is_fatal() {
        let columns =
            ColumnIndex::parse("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tHG1")
                .expect("header");

        let result = process_range(
            "does/not/exist.vcf",
            &columns,
            "22",
            LineRange { start: 1, stop: 1, total: 1 },
        );

        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
