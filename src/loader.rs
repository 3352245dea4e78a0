use crate::error::{MutloadError, Result};
use crate::types::{VariantRecord, VariantTable};
use std::borrow::Cow;

/// Accepted spellings for each required column, in priority order.
///
/// Upstream table producers disagree on naming, so headers are matched
/// case-insensitively against these sets. The first synonym that matches
/// any header field wins.
const CHROM_SYNONYMS: &[&str] = &["chromosome", "chrom", "chr", "#chrom"];
const POSITION_SYNONYMS: &[&str] = &["position", "pos", "start"];
const FREQ_SYNONYMS: &[&str] = &["altallelefreq", "af", "alt_freq", "allele_freq"];

/// Field separators the loader knows how to infer, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Tab,
    Comma,
    Whitespace,
}

impl Delimiter {
    const CANDIDATES: [Delimiter; 3] = [Delimiter::Tab, Delimiter::Comma, Delimiter::Whitespace];

    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Tab => line.split('\t').collect(),
            Delimiter::Comma => line.split(',').collect(),
            Delimiter::Whitespace => line.split_whitespace().collect(),
        }
    }
}

/// Decode raw table bytes, preferring UTF-8.
///
/// Inputs that are not valid UTF-8 are re-read as Latin-1, which maps every
/// byte to a character and therefore cannot fail. This mirrors how exported
/// spreadsheets from older tooling tend to arrive.
fn decode_bytes(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Infer the field separator from the non-blank lines of the table.
///
/// A candidate is accepted only if it yields at least two fields on the
/// header line and the same field count on every line.
fn detect_delimiter(lines: &[&str]) -> Result<Delimiter> {
    for candidate in Delimiter::CANDIDATES {
        let width = candidate.split(lines[0]).len();
        if width < 2 {
            continue;
        }
        if lines.iter().all(|line| candidate.split(line).len() == width) {
            return Ok(candidate);
        }
    }
    Err(MutloadError::format(
        "could not infer a delimiter giving a consistent field count across all rows",
    ))
}

/// Find the header index for a required column, trying synonyms in priority order.
fn resolve_column(header: &[&str], synonyms: &[&str]) -> Option<usize> {
    synonyms.iter().find_map(|synonym| {
        header
            .iter()
            .position(|field| field.trim().eq_ignore_ascii_case(synonym))
    })
}

/// Parse raw bytes into a canonical variant table.
///
/// The loader decodes the bytes (UTF-8 with Latin-1 fallback), infers the
/// delimiter, reconciles header names against the column synonym sets, and
/// parses one record per data row. Row order is preserved; nothing is sorted
/// or deduplicated. Records gain no read-count provenance, only the three
/// core fields.
pub fn load_variant_table(bytes: &[u8]) -> Result<VariantTable> {
    let text = decode_bytes(bytes);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();

    if lines.is_empty() {
        return Err(MutloadError::format("input contains no non-blank lines"));
    }

    let delimiter = detect_delimiter(&lines)?;
    let header = delimiter.split(lines[0]);

    // Required columns, checked in a fixed order so the error always names
    // the first one that is missing.
    let chrom_col = resolve_column(&header, CHROM_SYNONYMS)
        .ok_or(MutloadError::MissingColumn { field: "chromosome" })?;
    let pos_col = resolve_column(&header, POSITION_SYNONYMS)
        .ok_or(MutloadError::MissingColumn { field: "position" })?;
    let freq_col = resolve_column(&header, FREQ_SYNONYMS).ok_or(MutloadError::MissingColumn {
        field: "allele frequency",
    })?;

    let mut records = Vec::with_capacity(lines.len() - 1);
    for (i, line) in lines[1..].iter().enumerate() {
        let fields = delimiter.split(line);
        records.push(parse_row(&fields, chrom_col, pos_col, freq_col, i + 1)?);
    }

    Ok(records)
}

fn parse_row(
    fields: &[&str],
    chrom_col: usize,
    pos_col: usize,
    freq_col: usize,
    row: usize,
) -> Result<VariantRecord> {
    let pos_field = fields[pos_col].trim();
    let pos: u64 = pos_field.parse().map_err(|_| {
        MutloadError::format(format!(
            "row {}: position '{}' is not a non-negative integer",
            row, pos_field
        ))
    })?;
    if pos == 0 {
        return Err(MutloadError::format(format!(
            "row {}: position must be 1-based, got 0",
            row
        )));
    }

    let freq_field = fields[freq_col].trim();
    let freq: f64 = freq_field.parse().map_err(|_| {
        MutloadError::format(format!(
            "row {}: allele frequency '{}' is not a number",
            row, freq_field
        ))
    })?;
    if !freq.is_finite() || !(0.0..=1.0).contains(&freq) {
        return Err(MutloadError::format(format!(
            "row {}: allele frequency {} is outside [0, 1]",
            row, freq_field
        )));
    }

    Ok(VariantRecord {
        chrom: fields[chrom_col].trim().to_string(),
        pos,
        alt_allele_freq: freq,
        reads_passing_mapq: None,
        alt_reads: None,
        multiallelic: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn load(text: &str) -> VariantTable {
        load_variant_table(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_tab_separated_round_trip() {
        let table = load("Chromosome\tPosition\tAltAlleleFreq\nV\t100\t0.1\nV\t105\t0.2\n");
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].chrom, "V");
        assert_eq!(table[0].pos, 100);
        assert_relative_eq!(table[0].alt_allele_freq, 0.1);
        assert_eq!(table[1].pos, 105);
        // Loaded records carry no provenance
        assert_eq!(table[0].reads_passing_mapq, None);
        assert_eq!(table[0].alt_reads, None);
        assert_eq!(table[0].multiallelic, None);
    }

    #[test]
    fn test_synonym_headers_are_equivalent() {
        let canonical = load("Chromosome\tPosition\tAltAlleleFreq\nV\t100\t0.1\nIV\t205\t0.3\n");
        let shorthand = load("chrom,pos,AF\nV,100,0.1\nIV,205,0.3\n");
        assert_eq!(canonical, shorthand);
    }

    #[test]
    fn test_header_match_is_case_insensitive() {
        let table = load("#CHROM\tPOS\tALT_FREQ\nII\t42\t0.25\n");
        assert_eq!(table[0].chrom, "II");
        assert_eq!(table[0].pos, 42);
    }

    #[test]
    fn test_synonym_priority_order_wins() {
        // Both "chr" and "Chromosome" are present; the higher-priority
        // synonym selects its column regardless of header order.
        let table = load("chr\tChromosome\tPosition\tAltAlleleFreq\nwrong\tright\t7\t0.5\n");
        assert_eq!(table[0].chrom, "right");
    }

    #[test]
    fn test_whitespace_delimited_input() {
        let table = load("Chromosome   Position  AltAlleleFreq\nX  1200   0.05\n");
        assert_eq!(table[0].chrom, "X");
        assert_eq!(table[0].pos, 1200);
        assert_relative_eq!(table[0].alt_allele_freq, 0.05);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let table =
            load("Chromosome\tPosition\tAltAlleleFreq\r\n\r\nV\t100\t0.1\r\n   \nV\t105\t0.2\r\n");
        assert_eq!(table.len(), 2);
        assert_eq!(table[1].pos, 105);
    }

    #[test]
    fn test_latin1_fallback() {
        // 0xE9 is 'é' in Latin-1 and invalid as a UTF-8 start byte
        let mut bytes = b"Chromosome\tPosition\tAltAlleleFreq\nscaffold_".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"\t100\t0.1\n");
        let table = load_variant_table(&bytes).unwrap();
        assert_eq!(table[0].chrom, "scaffold_\u{e9}");
        assert_eq!(table[0].pos, 100);
    }

    #[test]
    fn test_extra_columns_are_ignored() {
        let table = load("Chromosome\tPosition\tDepth\tAltAlleleFreq\nV\t100\t88\t0.1\n");
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].pos, 100);
    }

    #[test]
    fn test_missing_columns_reported_in_order() {
        let err = load_variant_table(b"Position\tAltAlleleFreq\n1\t0.1\n").unwrap_err();
        assert!(matches!(
            err,
            MutloadError::MissingColumn { field: "chromosome" }
        ));

        let err = load_variant_table(b"Chromosome\tAltAlleleFreq\nV\t0.1\n").unwrap_err();
        assert!(matches!(err, MutloadError::MissingColumn { field: "position" }));

        let err = load_variant_table(b"Chromosome\tPosition\nV\t1\n").unwrap_err();
        assert!(matches!(
            err,
            MutloadError::MissingColumn {
                field: "allele frequency"
            }
        ));
    }

    #[test]
    fn test_inconsistent_field_count_is_format_error() {
        let err = load_variant_table(b"Chromosome,Position,AltAlleleFreq\nV,100\n").unwrap_err();
        assert!(matches!(err, MutloadError::Format { .. }));
    }

    #[test]
    fn test_single_column_input_is_format_error() {
        let err = load_variant_table(b"Chromosome\nV\n").unwrap_err();
        assert!(matches!(err, MutloadError::Format { .. }));
    }

    #[test]
    fn test_empty_input_is_format_error() {
        let err = load_variant_table(b"").unwrap_err();
        assert!(matches!(err, MutloadError::Format { .. }));
        let err = load_variant_table(b"\n   \n\n").unwrap_err();
        assert!(matches!(err, MutloadError::Format { .. }));
    }

    #[test]
    fn test_bad_values_are_format_errors() {
        for text in [
            "Chromosome\tPosition\tAltAlleleFreq\nV\t12.5\t0.1\n", // fractional position
            "Chromosome\tPosition\tAltAlleleFreq\nV\t0\t0.1\n",    // positions are 1-based
            "Chromosome\tPosition\tAltAlleleFreq\nV\t100\tabc\n",  // non-numeric frequency
            "Chromosome\tPosition\tAltAlleleFreq\nV\t100\t1.5\n",  // frequency above 1
            "Chromosome\tPosition\tAltAlleleFreq\nV\t100\tNaN\n",  // NaN is never silently kept
        ] {
            let err = load_variant_table(text.as_bytes()).unwrap_err();
            assert!(matches!(err, MutloadError::Format { .. }), "input: {:?}", text);
        }
    }

    #[test]
    fn test_row_order_preserved_without_sorting() {
        let table = load("chrom,pos,AF\nV,500,0.1\nII,10,0.2\nV,100,0.3\n");
        let positions: Vec<u64> = table.iter().map(|r| r.pos).collect();
        assert_eq!(positions, vec![500, 10, 100]);
    }
}
