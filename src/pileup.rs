use crate::error::Result;
use crate::types::{CallerConfig, PileupColumn, VariantRecord};
use std::collections::HashMap;

/// Source of single reference bases, keyed by contig name and 1-based position.
///
/// The aggregator never opens files itself; it asks a lookup for the one base
/// it needs per emitted position. Implemented by [`FastaReference`] for real
/// assemblies and by any `FnMut(&str, u64) -> Result<char>` closure, which is
/// convenient in tests.
///
/// [`FastaReference`]: crate::reference::FastaReference
pub trait ReferenceLookup {
    fn base_at(&mut self, chrom: &str, pos: u64) -> Result<char>;
}

impl<F> ReferenceLookup for F
where
    F: FnMut(&str, u64) -> Result<char>,
{
    fn base_at(&mut self, chrom: &str, pos: u64) -> Result<char> {
        self(chrom, pos)
    }
}

/// Evaluate one pileup column against the caller thresholds.
///
/// Returns `Ok(None)` when the column fails the coverage or alt-read gates;
/// shallow or reference-matching positions are an expected outcome, not an
/// error. The reference base is fetched only after the coverage gate passes,
/// so thin columns never touch the assembly.
///
/// Base calls are folded to upper case before tallying, so soft-masked
/// (lowercase) calls count toward the reference rather than inflating the
/// alternate tally.
pub fn call_column<R: ReferenceLookup>(
    column: &PileupColumn,
    reference: &mut R,
    config: &CallerConfig,
) -> Result<Option<VariantRecord>> {
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut total: u32 = 0;
    for obs in &column.observations {
        if obs.is_del_or_refskip || obs.mapq < config.mapq_threshold {
            continue;
        }
        total += 1;
        *counts.entry(obs.base.to_ascii_uppercase()).or_insert(0) += 1;
    }

    // Zero surviving reads can never be called, even with min_coverage = 0
    if total < config.min_coverage || total == 0 {
        return Ok(None);
    }

    let ref_base = reference
        .base_at(&column.chrom, column.pos)?
        .to_ascii_uppercase();
    let ref_reads = counts.get(&ref_base).copied().unwrap_or(0);
    let alt_reads = total - ref_reads;
    if alt_reads < config.min_alt_reads {
        return Ok(None);
    }

    let distinct_alts = counts.keys().filter(|&&base| base != ref_base).count();

    Ok(Some(VariantRecord {
        chrom: column.chrom.clone(),
        pos: column.pos,
        alt_allele_freq: alt_reads as f64 / total as f64,
        reads_passing_mapq: Some(total),
        alt_reads: Some(alt_reads),
        multiallelic: Some(distinct_alts > 1),
    }))
}

/// Turn a stream of pileup columns into a stream of variant records.
///
/// Each column is evaluated independently with [`call_column`]; columns that
/// fail a threshold produce nothing, columns whose reference lookup fails
/// produce an `Err` item. The adaptor is lazy: no column is consumed until
/// the returned iterator is polled, so memory stays flat on arbitrarily long
/// intervals.
pub fn aggregate<I, R>(
    columns: I,
    mut reference: R,
    config: CallerConfig,
) -> impl Iterator<Item = Result<VariantRecord>>
where
    I: IntoIterator<Item = PileupColumn>,
    R: ReferenceLookup,
{
    columns
        .into_iter()
        .filter_map(move |column| call_column(&column, &mut reference, &config).transpose())
}
