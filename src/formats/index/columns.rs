//! Column layout of indexed text records
//!
//! Both index formats carry the same descriptor telling a reader which
//! tab-delimited columns hold the sequence name, start and end, which
//! character introduces header lines, and whether coordinates are zero-based.
//!
//! On disk (seven little-endian int32 values, then the names):
//! - format: preset in the low 16 bits (0=generic, 1=SAM, 2=VCF),
//!   `0x10000` set for zero-based half-open coordinates
//! - col_seq, col_beg, col_end: one-based column numbers (`col_end` 0 if absent)
//! - meta: comment character
//! - skip: number of leading lines to skip
//! - l_nm + names: NUL-terminated sequence names

use super::{read_count, read_i32};
use crate::error::{Result, TabixError};
use std::io::Read;

/// Zero-based coordinate flag of the format field
const FLAG_ZERO_BASED: i32 = 0x10000;

/// Record flavour, which decides how a missing end column is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Generic tab-delimited file (BED, GFF, ...)
    Generic,
    /// SAM: end comes from the CIGAR string
    Sam,
    /// VCF: end comes from the REF allele or `END=`
    Vcf,
}

impl Preset {
    fn from_i32(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Preset::Generic),
            1 => Ok(Preset::Sam),
            2 => Ok(Preset::Vcf),
            _ => Err(TabixError::index(format!("Unknown format preset: {}", value))),
        }
    }

    fn code(self) -> i32 {
        match self {
            Preset::Generic => 0,
            Preset::Sam => 1,
            Preset::Vcf => 2,
        }
    }
}

/// Interval of one record, normalised to zero-based half-open coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordInterval<'a> {
    /// Sequence name column
    pub name: &'a [u8],
    /// Start (0-based, inclusive)
    pub begin: u64,
    /// End (0-based, exclusive)
    pub end: u64,
}

/// Column mapping of an indexed file. Columns are stored zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    preset: Preset,
    zero_based: bool,
    seq_col: usize,
    begin_col: usize,
    end_col: Option<usize>,
    meta_char: u8,
    skip_lines: u32,
}

impl ColumnSpec {
    /// Build a column mapping from zero-based column indices
    pub fn new(
        preset: Preset,
        zero_based: bool,
        seq_col: usize,
        begin_col: usize,
        end_col: Option<usize>,
        meta_char: u8,
        skip_lines: u32,
    ) -> Self {
        ColumnSpec {
            preset,
            zero_based,
            seq_col,
            begin_col,
            end_col,
            meta_char,
            skip_lines,
        }
    }

    /// `tabix -p bed`
    pub fn bed() -> Self {
        Self::new(Preset::Generic, true, 0, 1, Some(2), b'#', 0)
    }

    /// `tabix -p vcf`
    pub fn vcf() -> Self {
        Self::new(Preset::Vcf, false, 0, 1, None, b'#', 0)
    }

    /// `tabix -p gff`
    pub fn gff() -> Self {
        Self::new(Preset::Generic, false, 0, 3, Some(4), b'#', 0)
    }

    /// `tabix -p sam`
    pub fn sam() -> Self {
        Self::new(Preset::Sam, false, 2, 3, None, b'@', 0)
    }

    /// Read the six descriptor fields (format through skip)
    pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let format = read_i32(reader)?;
        let col_seq = read_i32(reader)?;
        let col_beg = read_i32(reader)?;
        let col_end = read_i32(reader)?;
        let meta = read_i32(reader)?;
        let skip = read_i32(reader)?;

        let preset = Preset::from_i32(format & 0xffff)?;
        if col_seq < 1 || col_beg < 1 || col_end < 0 {
            return Err(TabixError::index(format!(
                "Invalid column numbers: seq={}, begin={}, end={}",
                col_seq, col_beg, col_end
            )));
        }
        if !(0..=255).contains(&meta) {
            return Err(TabixError::index(format!("Invalid meta character: {}", meta)));
        }

        Ok(ColumnSpec {
            preset,
            zero_based: format & FLAG_ZERO_BASED != 0,
            seq_col: col_seq as usize - 1,
            begin_col: col_beg as usize - 1,
            end_col: if col_end == 0 {
                None
            } else {
                Some(col_end as usize - 1)
            },
            meta_char: meta as u8,
            skip_lines: skip.max(0) as u32,
        })
    }

    /// Record flavour
    pub fn preset(&self) -> Preset {
        self.preset
    }

    /// The on-disk format field (preset plus coordinate flag)
    pub fn format_code(&self) -> i32 {
        let flag = if self.zero_based { FLAG_ZERO_BASED } else { 0 };
        self.preset.code() | flag
    }

    /// True if coordinates are zero-based half-open, false if one-based
    pub fn zero_based(&self) -> bool {
        self.zero_based
    }

    /// Column holding the sequence name (0-based)
    pub fn seq_col(&self) -> usize {
        self.seq_col
    }

    /// Column holding the start position (0-based)
    pub fn begin_col(&self) -> usize {
        self.begin_col
    }

    /// Column holding the end position (0-based), if any
    pub fn end_col(&self) -> Option<usize> {
        self.end_col
    }

    /// Comment character for header lines
    pub fn meta_char(&self) -> u8 {
        self.meta_char
    }

    /// Number of leading lines that are header regardless of content
    pub fn skip_lines(&self) -> u32 {
        self.skip_lines
    }

    /// True if `line` is a comment/header line
    pub fn is_meta(&self, line: &[u8]) -> bool {
        line.first() == Some(&self.meta_char)
    }

    /// Extract the record's sequence name and zero-based half-open interval.
    ///
    /// The returned error message is meant to be wrapped with the record's
    /// location by the caller.
    pub fn parse_interval<'a>(&self, line: &'a [u8]) -> std::result::Result<RecordInterval<'a>, String> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let fields: Vec<&[u8]> = line.split(|&b| b == b'\t').collect();

        let mut needed = self.seq_col.max(self.begin_col);
        if let Some(end_col) = self.end_col {
            needed = needed.max(end_col);
        }
        if fields.len() <= needed {
            return Err(format!(
                "expected at least {} columns, found {}",
                needed + 1,
                fields.len()
            ));
        }

        let name = fields[self.seq_col];
        let mut begin = parse_position(fields[self.begin_col], "start")?;
        if !self.zero_based {
            // SAM uses POS 0 for unplaced reads
            begin = match begin.checked_sub(1) {
                Some(begin) => begin,
                None if self.preset == Preset::Sam => 0,
                None => return Err("start is 0 in a 1-based file".to_string()),
            };
        }
        let one_past = begin
            .checked_add(1)
            .ok_or_else(|| format!("start {} is out of range", begin))?;

        let end = match self.end_col {
            Some(end_col) if self.preset == Preset::Generic => parse_position(fields[end_col], "end")?,
            _ => match self.preset {
                Preset::Vcf => vcf_end(&fields, begin)?,
                Preset::Sam => match fields.get(5) {
                    Some(cigar) => match cigar_reference_length(cigar)? {
                        Some(len) => begin
                            .checked_add(len)
                            .ok_or_else(|| "CIGAR span runs past the coordinate range".to_string())?,
                        None => one_past,
                    },
                    None => one_past,
                },
                Preset::Generic => one_past,
            },
        };

        Ok(RecordInterval {
            name,
            begin,
            end: end.max(one_past),
        })
    }
}

impl Default for ColumnSpec {
    fn default() -> Self {
        ColumnSpec::bed()
    }
}

fn parse_position(field: &[u8], what: &str) -> std::result::Result<u64, String> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            format!(
                "{} column is not an integer: '{}'",
                what,
                String::from_utf8_lossy(field)
            )
        })
}

/// REF length, overridden by a larger `END=` in INFO
fn vcf_end(fields: &[&[u8]], begin: u64) -> std::result::Result<u64, String> {
    let mut end = match fields.get(3) {
        Some(reference) => begin
            .checked_add(reference.len() as u64)
            .ok_or_else(|| "REF allele runs past the coordinate range".to_string())?,
        None => begin.saturating_add(1),
    };

    if let Some(info) = fields.get(7) {
        for entry in info.split(|&b| b == b';') {
            if let Some(value) = entry.strip_prefix(b"END=") {
                if let Ok(info_end) = parse_position(value, "END") {
                    if info_end > begin {
                        end = info_end;
                    }
                }
                break;
            }
        }
    }

    Ok(end)
}

/// Bases consumed on the reference by a CIGAR string (M, D, N, =, X).
///
/// `Ok(None)` for `*` or an unrecognised string; an operation length that
/// does not fit 64 bits is an error.
fn cigar_reference_length(cigar: &[u8]) -> std::result::Result<Option<u64>, String> {
    if cigar == b"*" {
        return Ok(None);
    }
    let overflow = || format!("CIGAR '{}' is too long", String::from_utf8_lossy(cigar));
    let mut total = 0u64;
    let mut len = 0u64;
    for &b in cigar {
        match b {
            b'0'..=b'9' => {
                len = len
                    .checked_mul(10)
                    .and_then(|len| len.checked_add(u64::from(b - b'0')))
                    .ok_or_else(overflow)?;
            }
            b'M' | b'D' | b'N' | b'=' | b'X' => {
                total = total.checked_add(len).ok_or_else(overflow)?;
                len = 0;
            }
            b'I' | b'S' | b'H' | b'P' => len = 0,
            _ => return Ok(None),
        }
    }
    Ok((total > 0).then_some(total))
}

/// Split a buffer of NUL-terminated names
pub(crate) fn parse_sequence_names(buf: &[u8]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for raw in buf.split(|&b| b == 0) {
        if raw.is_empty() {
            continue;
        }
        let name = std::str::from_utf8(raw).map_err(|e| {
            TabixError::index(format!("Invalid UTF-8 in sequence name: {}", e))
        })?;
        names.push(name.to_string());
    }
    Ok(names)
}

/// Read the full descriptor: columns, then `l_nm` and the name block
pub(crate) fn read_descriptor<R: Read>(reader: &mut R) -> Result<(ColumnSpec, Vec<String>)> {
    let columns = ColumnSpec::read_from(reader)?;
    let l_nm = read_count(reader, "name block length")?;
    let mut names_buf = Vec::new();
    reader.by_ref().take(l_nm as u64).read_to_end(&mut names_buf)?;
    if names_buf.len() != l_nm {
        return Err(TabixError::index("Unexpected end of index data in sequence names"));
    }
    let names = parse_sequence_names(&names_buf)?;
    Ok((columns, names))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(format: i32, seq: i32, beg: i32, end: i32) -> Vec<u8> {
        let mut data = Vec::new();
        for v in [format, seq, beg, end, b'#' as i32, 0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_read_bed_descriptor() {
        let data = descriptor(0x10000, 1, 2, 3);
        let spec = ColumnSpec::read_from(&mut &data[..]).unwrap();
        assert_eq!(spec, ColumnSpec::bed());
        assert_eq!(spec.format_code(), 0x10000);
    }

    #[test]
    fn test_read_vcf_descriptor() {
        let data = descriptor(2, 1, 2, 0);
        let spec = ColumnSpec::read_from(&mut &data[..]).unwrap();
        assert_eq!(spec.preset(), Preset::Vcf);
        assert!(!spec.zero_based());
        assert_eq!(spec.end_col(), None);
        assert_eq!(spec.meta_char(), b'#');
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let data = descriptor(7, 1, 2, 3);
        assert!(ColumnSpec::read_from(&mut &data[..]).is_err());
        let data = descriptor(0, 0, 2, 3);
        assert!(ColumnSpec::read_from(&mut &data[..]).is_err());
    }

    #[test]
    fn test_parse_sequence_names() {
        let names = parse_sequence_names(b"chr1\0chr2\0chr3\0").unwrap();
        assert_eq!(names, vec!["chr1", "chr2", "chr3"]);
        assert!(parse_sequence_names(b"").unwrap().is_empty());
    }

    #[test]
    fn test_bed_interval() {
        let spec = ColumnSpec::bed();
        let iv = spec.parse_interval(b"chr1\t100\t200\tname").unwrap();
        assert_eq!(iv.name, b"chr1");
        assert_eq!((iv.begin, iv.end), (100, 200));

        // zero-length feature widened to one base
        let iv = spec.parse_interval(b"chr1\t50\t50").unwrap();
        assert_eq!((iv.begin, iv.end), (50, 51));
    }

    #[test]
    fn test_one_based_interval() {
        let spec = ColumnSpec::gff();
        let iv = spec
            .parse_interval(b"chr1\tsrc\tgene\t101\t200\t.\t+\t.\tID=g1\r")
            .unwrap();
        assert_eq!((iv.begin, iv.end), (100, 200));
    }

    #[test]
    fn test_vcf_interval() {
        let spec = ColumnSpec::vcf();
        let iv = spec
            .parse_interval(b"chr1\t1000\t.\tACGT\tA\t50\tPASS\tDP=10")
            .unwrap();
        assert_eq!((iv.begin, iv.end), (999, 1003));

        let iv = spec
            .parse_interval(b"chr1\t1000\t.\tN\t<DEL>\t50\tPASS\tSVTYPE=DEL;END=5000")
            .unwrap();
        assert_eq!((iv.begin, iv.end), (999, 5000));
    }

    #[test]
    fn test_sam_interval() {
        let spec = ColumnSpec::sam();
        let iv = spec
            .parse_interval(b"read1\t0\tchr2\t11\t60\t5S10M2D3M4I\t*\t0\t0\tACGT\tIIII")
            .unwrap();
        assert_eq!(iv.name, b"chr2");
        assert_eq!((iv.begin, iv.end), (10, 25));

        let iv = spec
            .parse_interval(b"read2\t4\tchr2\t11\t0\t*\t*\t0\t0\tACGT\tIIII")
            .unwrap();
        assert_eq!((iv.begin, iv.end), (10, 11));
    }

    #[test]
    fn test_malformed_records() {
        let spec = ColumnSpec::bed();
        let err = spec.parse_interval(b"chr1\t100").unwrap_err();
        assert!(err.contains("columns"));
        let err = spec.parse_interval(b"chr1\tabc\t200").unwrap_err();
        assert!(err.contains("start"));
        let err = spec.parse_interval(b"chr1\t100\t2x0").unwrap_err();
        assert!(err.contains("end"));
    }

    #[test]
    fn test_out_of_range_positions_are_errors() {
        let err = ColumnSpec::bed()
            .parse_interval(b"chr1\t18446744073709551615\t18446744073709551615")
            .unwrap_err();
        assert!(err.contains("out of range"));

        let err = ColumnSpec::sam()
            .parse_interval(b"r\t0\tchr1\t10\t60\t99999999999999999999999M\t*\t0\t0\tA\tI")
            .unwrap_err();
        assert!(err.contains("CIGAR"));

        let err = ColumnSpec::sam()
            .parse_interval(b"r\t0\tchr1\t18446744073709551615\t60\t10M\t*\t0\t0\tA\tI")
            .unwrap_err();
        assert!(err.contains("CIGAR span"));

        let err = ColumnSpec::vcf()
            .parse_interval(b"chr1\t18446744073709551615\t.\tACGT\tA\t.\t.\t.")
            .unwrap_err();
        assert!(err.contains("REF"));
    }

    #[test]
    fn test_zero_start_in_one_based_file() {
        let err = ColumnSpec::gff()
            .parse_interval(b"chr1\tsrc\tgene\t0\t200\t.\t+\t.\tID=g1")
            .unwrap_err();
        assert!(err.contains("start is 0"));
        assert!(ColumnSpec::vcf()
            .parse_interval(b"chr1\t0\t.\tA\tG\t.\t.\t.")
            .is_err());

        // unplaced SAM reads carry POS 0
        let iv = ColumnSpec::sam()
            .parse_interval(b"r\t4\t*\t0\t0\t*\t*\t0\t0\tA\tI")
            .unwrap();
        assert_eq!((iv.begin, iv.end), (0, 1));
    }
}
