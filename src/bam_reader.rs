use crate::error::{MutloadError, Result};
use crate::types::{BaseObservation, PileupColumn};
use rust_htslib::bam::{self, pileup::Pileups, FetchDefinition, HeaderView, Read};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A query interval: a whole contig, or a 1-based fully-closed span on one.
///
/// Parses from the usual `chrom` or `chrom:start-end` notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chrom: String,
    pub span: Option<(u64, u64)>,
}

impl FromStr for Region {
    type Err = MutloadError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            MutloadError::config(format!(
                "invalid region '{}'; expected chrom or chrom:start-end",
                s
            ))
        };

        let (chrom, range) = match s.split_once(':') {
            None if s.is_empty() => return Err(invalid()),
            None => {
                return Ok(Region {
                    chrom: s.to_string(),
                    span: None,
                })
            }
            Some(parts) => parts,
        };
        if chrom.is_empty() {
            return Err(invalid());
        }

        let (start, end) = range.split_once('-').ok_or_else(invalid)?;
        let start: u64 = start.parse().map_err(|_| invalid())?;
        let end: u64 = end.parse().map_err(|_| invalid())?;
        if start < 1 || start > end {
            return Err(invalid());
        }
        if end > i32::MAX as u64 {
            return Err(MutloadError::config(format!(
                "region '{}' exceeds the BAM coordinate limit",
                s
            )));
        }

        Ok(Region {
            chrom: chrom.to_string(),
            span: Some((start, end)),
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some((start, end)) => write!(f, "{}:{}-{}", self.chrom, start, end),
            None => f.write_str(&self.chrom),
        }
    }
}

/// Pull-based reader turning a sorted, indexed BAM into pileup columns.
pub struct PileupSource {
    reader: bam::IndexedReader,
}

impl PileupSource {
    /// Open a BAM file; its `.bai` index must already exist.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = bam::IndexedReader::from_path(path)?;
        Ok(PileupSource { reader })
    }

    /// Iterate pileup columns over the whole file or one region.
    ///
    /// Columns arrive in position order, restricted to the region when one is
    /// given. Unmapped, secondary, duplicate and QC-failed reads are masked
    /// out here; mapping-quality filtering is left to the caller thresholds.
    pub fn columns(&mut self, region: Option<&Region>) -> Result<PileupColumns<'_>> {
        let header = self.reader.header().to_owned();

        let clip = match region {
            Some(region) => {
                let tid = header.tid(region.chrom.as_bytes()).ok_or_else(|| {
                    MutloadError::config(format!(
                        "chromosome '{}' is not in the BAM header",
                        region.chrom
                    ))
                })?;
                match region.span {
                    Some((start, end)) => {
                        // htslib fetch takes 0-based half-open coordinates
                        self.reader.fetch((tid, (start - 1) as u32, end as u32))?;
                        Some((start, end))
                    }
                    None => {
                        self.reader.fetch(FetchDefinition::CompleteTid(tid as i32))?;
                        None
                    }
                }
            }
            None => {
                self.reader.fetch(FetchDefinition::All)?;
                None
            }
        };

        let mut pileups = self.reader.pileup();
        // htslib rejects depth caps above i32::MAX
        pileups.set_max_depth(i32::MAX as u32);

        Ok(PileupColumns {
            pileups,
            header,
            clip,
        })
    }
}

/// Iterator over the pileup columns of one fetch.
#[derive(Debug)]
pub struct PileupColumns<'a> {
    pileups: Pileups<'a, bam::IndexedReader>,
    header: HeaderView,
    clip: Option<(u64, u64)>,
}

impl Iterator for PileupColumns<'_> {
    type Item = Result<PileupColumn>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let pileup = match self.pileups.next()? {
                Ok(pileup) => pileup,
                Err(e) => return Some(Err(e.into())),
            };

            let pos = u64::from(pileup.pos()) + 1;
            if let Some((start, end)) = self.clip {
                // htslib pileups cover every position any fetched read
                // touches, so trim back to the requested span
                if pos < start {
                    continue;
                }
                if pos > end {
                    return None;
                }
            }

            let mut observations = Vec::with_capacity(pileup.depth() as usize);
            for alignment in pileup.alignments() {
                let record = alignment.record();
                if record.is_unmapped()
                    || record.is_secondary()
                    || record.is_duplicate()
                    || record.is_quality_check_failed()
                {
                    continue;
                }

                let mapq = record.mapq();
                if alignment.is_del() || alignment.is_refskip() {
                    observations.push(BaseObservation::gap(mapq));
                } else if let Some(qpos) = alignment.qpos() {
                    observations.push(BaseObservation::new(record.seq()[qpos] as char, mapq));
                }
            }
            if observations.is_empty() {
                continue;
            }

            let chrom = String::from_utf8_lossy(self.header.tid2name(pileup.tid())).into_owned();
            return Some(Ok(PileupColumn {
                chrom,
                pos,
                observations,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pileup::aggregate;
    use crate::types::CallerConfig;
    use rust_htslib::bam::header::{Header, HeaderRecord};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_region_parsing() {
        let region: Region = "chrV:100-200".parse().unwrap();
        assert_eq!(region.chrom, "chrV");
        assert_eq!(region.span, Some((100, 200)));
        assert_eq!(region.to_string(), "chrV:100-200");

        let whole: Region = "chrV".parse().unwrap();
        assert_eq!(whole.chrom, "chrV");
        assert_eq!(whole.span, None);
        assert_eq!(whole.to_string(), "chrV");
    }

    #[test]
    fn test_region_rejects_malformed_input() {
        for bad in ["", ":", "chrV:", "chrV:100", "chrV:abc-200", "chrV:0-10", "chrV:200-100"] {
            assert!(bad.parse::<Region>().is_err(), "{:?}", bad);
        }
    }

    fn sam_read(name: &str, pos: u64, seq: &str, flag: u16, mapq: u8) -> String {
        format!(
            "{}\t{}\tchrV\t{}\t{}\t{}M\t*\t0\t0\t{}\t{}",
            name,
            flag,
            pos,
            mapq,
            seq.len(),
            seq,
            "I".repeat(seq.len())
        )
    }

    // Thirty clean reads spanning chrV:91-120, all carrying T at position
    // 100, plus one duplicate-flagged read carrying G there.
    fn write_indexed_bam(dir: &Path) -> PathBuf {
        let path = dir.join("sample.bam");

        let mut header = Header::new();
        let mut sq = HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", &"chrV");
        sq.push_tag(b"LN", &10_000);
        header.push_record(&sq);
        let header_view = HeaderView::from_header(&header);

        let seq = "AAAAAAAAATAAAAAAAAAAAAAAAAAAAA";
        {
            let mut writer = bam::Writer::from_path(&path, &header, bam::Format::Bam).unwrap();
            for i in 0..30 {
                let line = sam_read(&format!("read{}", i), 91, seq, 0, 60);
                let record = bam::Record::from_sam(&header_view, line.as_bytes()).unwrap();
                writer.write(&record).unwrap();
            }
            let dup = sam_read("dup", 91, "AAAAAAAAAGAAAAAAAAAAAAAAAAAAAA", 1024, 60);
            let record = bam::Record::from_sam(&header_view, dup.as_bytes()).unwrap();
            writer.write(&record).unwrap();
        }
        bam::index::build(&path, None, bam::index::Type::Bai, 1).unwrap();

        path
    }

    #[test]
    fn test_columns_cover_read_span_and_mask_duplicates() {
        let dir = TempDir::new().unwrap();
        let bam_path = write_indexed_bam(dir.path());

        let mut source = PileupSource::open(&bam_path).unwrap();
        let columns: Vec<PileupColumn> = source
            .columns(None)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(columns.first().unwrap().pos, 91);
        assert_eq!(columns.last().unwrap().pos, 120);
        assert_eq!(columns.len(), 30);

        let column = columns.iter().find(|c| c.pos == 100).unwrap();
        assert_eq!(column.chrom, "chrV");
        // The duplicate read never becomes an observation
        assert_eq!(column.observations.len(), 30);
        assert!(column.observations.iter().all(|o| o.base == 'T'));
    }

    #[test]
    fn test_columns_clip_to_region() {
        let dir = TempDir::new().unwrap();
        let bam_path = write_indexed_bam(dir.path());

        let region: Region = "chrV:95-105".parse().unwrap();
        let mut source = PileupSource::open(&bam_path).unwrap();
        let columns: Vec<PileupColumn> = source
            .columns(Some(&region))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let positions: Vec<u64> = columns.iter().map(|c| c.pos).collect();
        assert_eq!(positions, (95..=105).collect::<Vec<u64>>());
    }

    #[test]
    fn test_unknown_chromosome_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let bam_path = write_indexed_bam(dir.path());

        let region: Region = "chrZ:1-10".parse().unwrap();
        let mut source = PileupSource::open(&bam_path).unwrap();
        let err = source.columns(Some(&region)).unwrap_err();
        assert!(matches!(err, MutloadError::Config { .. }));
    }

    #[test]
    fn test_bam_drives_the_aggregator() {
        let dir = TempDir::new().unwrap();
        let bam_path = write_indexed_bam(dir.path());

        let mut source = PileupSource::open(&bam_path).unwrap();
        let columns: Vec<PileupColumn> = source
            .columns(None)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let reference = |_: &str, _: u64| -> Result<char> { Ok('A') };
        let records: Vec<_> = aggregate(columns, reference, CallerConfig::default())
            .collect::<Result<_>>()
            .unwrap();

        // Only position 100 disagrees with the reference
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pos, 100);
        assert_eq!(records[0].reads_passing_mapq, Some(30));
        assert_eq!(records[0].alt_reads, Some(30));
        assert_eq!(records[0].multiallelic, Some(false));
    }
}
