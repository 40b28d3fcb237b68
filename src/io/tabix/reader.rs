//! Indexed random access to BGZF-compressed text files

use super::lines::LineAssembler;
use super::records::Records;
use crate::error::Result;
use crate::formats::index::{ColumnSpec, Index, TabixIndex};
use crate::formats::Region;
use crate::io::BgzfReader;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How a reference name missing from the index is rewritten.
///
/// Decided on the first query and kept for the reader's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChrAlias {
    Undecided,
    Exact,
    AddPrefix,
    StripPrefix,
}

impl ChrAlias {
    fn apply(self, name: &str) -> Option<String> {
        match self {
            ChrAlias::AddPrefix => Some(format!("chr{}", name)),
            ChrAlias::StripPrefix => name.strip_prefix("chr").map(str::to_string),
            ChrAlias::Undecided | ChrAlias::Exact => None,
        }
    }
}

/// Region queries over an indexed BGZF text file (VCF, BED, GFF, SAM, ...).
///
/// # Example
///
/// ```no_run
/// use biotabix::TabixReader;
///
/// # fn main() -> biotabix::Result<()> {
/// let mut reader = TabixReader::from_path("variants.vcf.gz")?;
/// for record in reader.query(&"chr1:10,001-20,000".parse()?)? {
///     let record = record?;
///     println!("{}", String::from_utf8_lossy(record.as_bytes()));
/// }
/// # Ok(())
/// # }
/// ```
pub struct TabixReader<R = BufReader<File>> {
    bgzf: BgzfReader<R>,
    index: Index,
    chr_fallback: bool,
    prune: bool,
    alias: ChrAlias,
}

impl TabixReader<BufReader<File>> {
    /// Open a container and discover its `.tbi` or `.csi` index
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        TabixReaderBuilder::default().open(path)
    }

    /// Builder for non-default settings
    pub fn builder() -> TabixReaderBuilder {
        TabixReaderBuilder::default()
    }
}

impl<R: Read + Seek> TabixReader<R> {
    /// Query a seekable container with an already loaded index
    pub fn new(inner: R, index: Index) -> Self {
        TabixReaderBuilder::default().build(inner, index)
    }

    /// The loaded index
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Column layout of the records
    pub fn columns(&self) -> &ColumnSpec {
        self.index.columns()
    }

    /// Indexed reference names (`tabix -l`)
    pub fn sequence_names(&self) -> Vec<&str> {
        self.index.sequence_names()
    }

    /// Leading header lines (`tabix -H`): lines starting with the meta
    /// character, plus the first `skip` lines whatever they hold.
    pub fn header_lines(&mut self) -> Result<Vec<Vec<u8>>> {
        let columns = *self.index.columns();
        let mut assembler = LineAssembler::new();
        let mut header = Vec::new();
        let mut lines = Vec::new();
        let mut line_no: u64 = 0;

        let mut blocks = self.bgzf.blocks();
        loop {
            lines.clear();
            let exhausted = match blocks.next() {
                Some(block) => {
                    assembler.push(&block?, 0, &mut lines);
                    false
                }
                None => {
                    lines.extend(assembler.finish());
                    true
                }
            };

            for line in lines.drain(..) {
                if line_no < u64::from(columns.skip_lines()) || columns.is_meta(line.as_bytes()) {
                    header.push(line.into_bytes());
                    line_no += 1;
                } else {
                    return Ok(header);
                }
            }
            if exhausted {
                return Ok(header);
            }
        }
    }

    /// Parse a region string, treating it as a bare reference name when the
    /// index knows the whole string (samtools behaviour for names with `:`).
    pub fn parse_region(&self, text: &str) -> Result<Region> {
        let trimmed = text.trim();
        if !trimmed.is_empty() && self.index.contains(trimmed) {
            return Ok(Region::whole(trimmed));
        }
        text.parse()
    }

    /// Records overlapping `[start, end)` on `name`
    pub fn fetch(&mut self, name: &str, start: u64, end: u64) -> Result<Records<'_, R>> {
        let region = Region::new(name, start, end)?;
        self.query(&region)
    }

    /// Records overlapping `region`.
    ///
    /// A reference the index does not know yields an empty iterator.
    pub fn query(&mut self, region: &Region) -> Result<Records<'_, R>> {
        let columns = *self.index.columns();
        let Some(name) = self.resolve_name(region.name()) else {
            debug!(region = %region, "reference not in index");
            return Ok(Records::empty(columns, region.clone()));
        };
        let region = region.renamed(&name);

        let chunks = self
            .index
            .resolve_chunks(&name, region.start(), region.end(), self.prune)?;
        debug!(region = %region, chunks = chunks.len(), "resolved chunks");

        Ok(Records::new(&mut self.bgzf, columns, region, chunks))
    }

    /// Name as the index spells it, applying the chr-prefix fallback
    fn resolve_name(&mut self, name: &str) -> Option<String> {
        if self.index.contains(name) {
            if self.alias == ChrAlias::Undecided {
                self.alias = ChrAlias::Exact;
            }
            return Some(name.to_string());
        }
        if !self.chr_fallback {
            return None;
        }

        if self.alias == ChrAlias::Undecided {
            let alias = [ChrAlias::AddPrefix, ChrAlias::StripPrefix]
                .into_iter()
                .find(|alias| {
                    alias
                        .apply(name)
                        .is_some_and(|candidate| self.index.contains(&candidate))
                });
            match alias {
                Some(alias) => {
                    info!(
                        requested = name,
                        "reference names differ by a 'chr' prefix; using {} for this index",
                        if alias == ChrAlias::AddPrefix { "chr-prefixed names" } else { "names without 'chr'" }
                    );
                    self.alias = alias;
                }
                None => return None,
            }
        }

        self.alias
            .apply(name)
            .filter(|candidate| self.index.contains(candidate))
    }
}

/// Settings for opening a [`TabixReader`]
#[derive(Debug, Clone)]
pub struct TabixReaderBuilder {
    index_path: Option<PathBuf>,
    chr_fallback: bool,
    prune: bool,
}

impl Default for TabixReaderBuilder {
    fn default() -> Self {
        TabixReaderBuilder {
            index_path: None,
            chr_fallback: true,
            prune: true,
        }
    }
}

impl TabixReaderBuilder {
    /// Use this index file instead of probing `<data>.tbi` and `<data>.csi`
    #[must_use]
    pub fn index_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Retry a missing reference with `chr` added or removed (default: on)
    #[must_use]
    pub fn chr_fallback(mut self, enabled: bool) -> Self {
        self.chr_fallback = enabled;
        self
    }

    /// Prune chunks with the linear index or `loffset` and merge them
    /// (default: on). Results are the same either way.
    #[must_use]
    pub fn prune_chunks(mut self, enabled: bool) -> Self {
        self.prune = enabled;
        self
    }

    /// Open a container file and its index
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<TabixReader<BufReader<File>>> {
        let path = path.as_ref();
        let (index_path, index) = match &self.index_path {
            Some(index_path) => (index_path.clone(), Index::from_path(index_path)?),
            None => Index::discover(path)?,
        };
        debug!(
            data = %path.display(),
            index = %index_path.display(),
            "opened indexed container"
        );
        let bgzf = BgzfReader::from_path(path)?;
        Ok(self.build_bgzf(bgzf, index))
    }

    /// Wrap a seekable container with an already loaded index
    pub fn build<R: Read + Seek>(self, inner: R, index: Index) -> TabixReader<R> {
        self.build_bgzf(BgzfReader::new(inner), index)
    }

    fn build_bgzf<R>(self, bgzf: BgzfReader<R>, index: Index) -> TabixReader<R> {
        TabixReader {
            bgzf,
            index,
            chr_fallback: self.chr_fallback,
            prune: self.prune,
            alias: ChrAlias::Undecided,
        }
    }
}
