use crate::error::{MutloadError, Result};
use crate::pileup::ReferenceLookup;
use bio::io::fasta::{Index, IndexedReader};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Random-access reader over an indexed FASTA assembly.
///
/// Contig names and lengths are taken from the `.fai` index at open time, so
/// out-of-range requests are rejected up front with a typed error instead of
/// surfacing as htslib-style read failures. Bases are reported upper-case.
#[derive(Debug)]
pub struct FastaReference {
    reader: IndexedReader<File>,
    lengths: HashMap<String, u64>,
}

impl FastaReference {
    /// Open a FASTA file together with its `<name>.fai` index.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MutloadError::config(format!(
                "FASTA file not found: {}",
                path.display()
            )));
        }

        let index_path = PathBuf::from(format!("{}.fai", path.display()));
        if !index_path.exists() {
            return Err(MutloadError::config(format!(
                "FASTA index not found: {}. Create it with: samtools faidx {}",
                index_path.display(),
                path.display()
            )));
        }

        let index = Index::from_file(&index_path).map_err(|e| {
            MutloadError::config(format!(
                "failed to parse FASTA index {}: {}",
                index_path.display(),
                e
            ))
        })?;
        let lengths = index
            .sequences()
            .into_iter()
            .map(|seq| (seq.name, seq.len))
            .collect();

        let reader = IndexedReader::with_index(File::open(path)?, index);

        Ok(FastaReference { reader, lengths })
    }

    /// Number of contigs in the assembly.
    pub fn n_contigs(&self) -> usize {
        self.lengths.len()
    }
}

impl ReferenceLookup for FastaReference {
    fn base_at(&mut self, chrom: &str, pos: u64) -> Result<char> {
        let contig_len = *self
            .lengths
            .get(chrom)
            .ok_or_else(|| out_of_range(chrom, pos))?;
        if pos < 1 || pos > contig_len {
            return Err(out_of_range(chrom, pos));
        }

        // fetch takes 0-based half-open coordinates
        self.reader
            .fetch(chrom, pos - 1, pos)
            .map_err(|e| read_failure(chrom, pos, e))?;
        let mut sequence = Vec::with_capacity(1);
        self.reader
            .read(&mut sequence)
            .map_err(|e| read_failure(chrom, pos, e))?;

        match sequence.first() {
            Some(&base) => Ok((base as char).to_ascii_uppercase()),
            None => Err(out_of_range(chrom, pos)),
        }
    }
}

fn out_of_range(chrom: &str, pos: u64) -> MutloadError {
    MutloadError::ReferenceLookup {
        chrom: chrom.to_string(),
        pos,
    }
}

fn read_failure<E: std::fmt::Display>(chrom: &str, pos: u64, err: E) -> MutloadError {
    MutloadError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("reference read failed at {}:{}: {}", chrom, pos, err),
    ))
}
