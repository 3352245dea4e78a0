use crate::error::Result;
use crate::types::{VariantRecord, WindowScore};
use csv::WriterBuilder;
use std::fs::File;
use std::path::Path;

/// Column order of the tab-separated variant interchange table.
pub const VARIANT_TABLE_HEADER: [&str; 6] = [
    "Chromosome",
    "Position",
    "ReadsPassingMAPQ",
    "AltReads",
    "AltAlleleFreq",
    "Multiallelic",
];

/// Column order of the tab-separated load series table.
pub const LOAD_SERIES_HEADER: [&str; 3] = ["Chromosome", "WindowStart", "LoadScore"];

/// Incremental writer for the variant interchange table.
///
/// The caller streams records as they are emitted, so nothing is buffered
/// beyond the underlying CSV writer. Records without provenance write zero
/// read counts and `No` for the multiallelic flag.
pub struct VariantTableWriter {
    wtr: csv::Writer<File>,
}

impl VariantTableWriter {
    /// Create the output file and write the header line.
    pub fn create(path: &Path) -> Result<Self> {
        let mut wtr = WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        wtr.write_record(&VARIANT_TABLE_HEADER)?;
        Ok(VariantTableWriter { wtr })
    }

    pub fn write(&mut self, record: &VariantRecord) -> Result<()> {
        self.wtr.write_record(&[
            &record.chrom,
            &record.pos.to_string(),
            &record.reads_passing_mapq.unwrap_or(0).to_string(),
            &record.alt_reads.unwrap_or(0).to_string(),
            &format!("{:.4}", record.alt_allele_freq),
            &yes_no(record.multiallelic.unwrap_or(false)),
        ])?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

/// Write a whole variant table at once.
pub fn write_variant_table(records: &[VariantRecord], path: &Path) -> Result<()> {
    let mut writer = VariantTableWriter::create(path)?;
    for record in records {
        writer.write(record)?;
    }
    writer.finish()
}

/// Write a scored load series for one chromosome.
pub fn write_load_series(chrom: &str, series: &[WindowScore], path: &Path) -> Result<()> {
    let mut wtr = WriterBuilder::new().delimiter(b'\t').from_path(path)?;

    wtr.write_record(&LOAD_SERIES_HEADER)?;
    for window in series {
        wtr.write_record(&[
            &chrom.to_string(),
            &window.start.to_string(),
            &format!("{:.6}", window.score),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
