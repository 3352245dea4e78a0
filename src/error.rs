use thiserror::Error;

/// Errors produced while loading variant tables, aggregating pileups, or
/// scoring windows.
///
/// The first four variants form the typed taxonomy that library callers can
/// match on; the remaining variants wrap errors bubbling up from I/O and the
/// underlying file-format crates.
#[derive(Error, Debug)]
pub enum MutloadError {
    /// Input bytes could not be interpreted as a variant table.
    #[error("invalid variant table: {message}")]
    Format { message: String },

    /// No header field matched any synonym for a required column.
    #[error("missing required column: {field}")]
    MissingColumn { field: &'static str },

    /// A reference base was requested outside the bounds of the assembly.
    #[error("reference lookup failed: position {pos} is not on contig '{chrom}'")]
    ReferenceLookup { chrom: String, pos: u64 },

    /// A scoring interval whose start exceeds its end.
    #[error("invalid scoring interval: start {start} is greater than end {end}")]
    InvalidRange { start: u64, end: u64 },

    /// A parameter combination that can never produce meaningful output.
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("alignment file error: {0}")]
    Bam(#[from] rust_htslib::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MutloadError {
    /// Shorthand for a [`MutloadError::Format`] with a formatted message.
    pub fn format<S: Into<String>>(message: S) -> Self {
        MutloadError::Format {
            message: message.into(),
        }
    }

    /// Shorthand for a [`MutloadError::Config`] with a formatted message.
    pub fn config<S: Into<String>>(message: S) -> Self {
        MutloadError::Config {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MutloadError>;
