//! Shared fixtures: BGZF containers with known record offsets and a small
//! tabix-style indexer that writes TBI or CSI bytes for them.

#![allow(dead_code)]

use biotabix::{BgzfWriter, Binning, ColumnSpec, VirtualOffset};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A written record and where it landed
#[derive(Debug, Clone)]
pub struct Placed {
    pub line: String,
    pub name: String,
    pub begin: u64,
    pub end: u64,
    pub start: VirtualOffset,
    pub end_offset: VirtualOffset,
}

/// Write header lines and records into a BGZF container.
///
/// `flush_at` lists byte positions (inside the records) where a block
/// boundary is forced, so tests can place a boundary mid-record.
pub fn write_container(
    header: &[&str],
    records: &[&str],
    columns: &ColumnSpec,
    flush_at: &[(usize, usize)],
) -> (Vec<u8>, Vec<Placed>) {
    let mut writer = BgzfWriter::new(Vec::new());
    for line in header {
        writer.write_all(line.as_bytes()).unwrap();
        writer.write_all(b"\n").unwrap();
    }

    let mut placed = Vec::new();
    for (i, line) in records.iter().enumerate() {
        let start = writer.virtual_position();
        let text = format!("{}\n", line);
        let mut written = 0;
        for &(_, split) in flush_at.iter().filter(|(r, _)| *r == i) {
            writer.write_all(&text.as_bytes()[written..split]).unwrap();
            writer.flush().unwrap();
            written = split;
        }
        writer.write_all(&text.as_bytes()[written..]).unwrap();
        let end_offset = writer.virtual_position();

        let interval = columns.parse_interval(line.as_bytes()).unwrap();
        placed.push(Placed {
            line: line.to_string(),
            name: String::from_utf8(interval.name.to_vec()).unwrap(),
            begin: interval.begin,
            end: interval.end,
            start,
            end_offset,
        });
    }

    (writer.finish().unwrap(), placed)
}

/// One bin as it will be serialised
#[derive(Debug, Clone, Default)]
pub struct BinSpec {
    pub loffset: u64,
    pub chunks: Vec<(VirtualOffset, VirtualOffset)>,
}

/// One reference as it will be serialised
#[derive(Debug, Clone, Default)]
pub struct RefSpec {
    pub name: String,
    pub bins: BTreeMap<u32, BinSpec>,
    pub intervals: Vec<VirtualOffset>,
}

/// Bin records the way tabix does: one chunk per run of consecutive
/// records in a bin, a linear index of 2^min_shift windows, per-bin
/// `loffset` from that linear index and a metadata pseudo-bin.
pub fn build_index(placed: &[Placed], binning: Binning) -> Vec<RefSpec> {
    let mut refs: Vec<RefSpec> = Vec::new();
    for record in placed {
        if refs.last().map(|r| r.name != record.name).unwrap_or(true) {
            refs.push(RefSpec {
                name: record.name.clone(),
                ..RefSpec::default()
            });
        }
        let current = refs.last_mut().unwrap();

        let bin = binning.bin_of(record.begin, record.end);
        let entry = current.bins.entry(bin).or_default();
        match entry.chunks.last_mut() {
            Some(last) if last.1 == record.start => last.1 = record.end_offset,
            _ => entry.chunks.push((record.start, record.end_offset)),
        }

        let first = (record.begin >> binning.min_shift()) as usize;
        let last = ((record.end - 1) >> binning.min_shift()) as usize;
        if current.intervals.len() <= last {
            current.intervals.resize(last + 1, VirtualOffset::from_raw(u64::MAX));
        }
        for window in first..=last {
            if current.intervals[window].as_raw() == u64::MAX {
                current.intervals[window] = record.start;
            }
        }
    }

    for reference in &mut refs {
        let mut previous = VirtualOffset::default();
        for slot in reference.intervals.iter_mut() {
            if slot.as_raw() == u64::MAX {
                *slot = previous;
            }
            previous = *slot;
        }

        let intervals = reference.intervals.clone();
        for (&bin, spec) in reference.bins.iter_mut() {
            let window = (binning.bin_start(bin) >> binning.min_shift()) as usize;
            spec.loffset = intervals.get(window).map(|v| v.as_raw()).unwrap_or(0);
        }

        let records: Vec<&Placed> = placed.iter().filter(|p| p.name == reference.name).collect();
        if let (Some(first), Some(last)) = (records.first(), records.last()) {
            reference.bins.insert(
                binning.metadata_bin(),
                BinSpec {
                    loffset: 0,
                    chunks: vec![
                        (first.start, last.end_offset),
                        (
                            VirtualOffset::from_raw(records.len() as u64),
                            VirtualOffset::from_raw(0),
                        ),
                    ],
                },
            );
        }
    }

    refs
}

fn push_i32(data: &mut Vec<u8>, v: i32) {
    data.extend_from_slice(&v.to_le_bytes());
}

fn push_u64(data: &mut Vec<u8>, v: u64) {
    data.extend_from_slice(&v.to_le_bytes());
}

/// format, col_seq, col_beg, col_end, meta, skip, l_nm, names
fn descriptor(columns: &ColumnSpec, names: &[&str]) -> Vec<u8> {
    let mut data = Vec::new();
    push_i32(&mut data, columns.format_code());
    push_i32(&mut data, columns.seq_col() as i32 + 1);
    push_i32(&mut data, columns.begin_col() as i32 + 1);
    push_i32(&mut data, columns.end_col().map(|c| c as i32 + 1).unwrap_or(0));
    push_i32(&mut data, columns.meta_char() as i32);
    push_i32(&mut data, columns.skip_lines() as i32);
    let mut block = Vec::new();
    for name in names {
        block.extend_from_slice(name.as_bytes());
        block.push(0);
    }
    push_i32(&mut data, block.len() as i32);
    data.extend_from_slice(&block);
    data
}

fn push_bins(data: &mut Vec<u8>, reference: &RefSpec, with_loffset: bool) {
    push_i32(data, reference.bins.len() as i32);
    for (&bin, spec) in &reference.bins {
        data.extend_from_slice(&bin.to_le_bytes());
        if with_loffset {
            push_u64(data, spec.loffset);
        }
        push_i32(data, spec.chunks.len() as i32);
        for (start, end) in &spec.chunks {
            push_u64(data, start.as_raw());
            push_u64(data, end.as_raw());
        }
    }
}

/// Uncompressed TBI bytes
pub fn tbi_bytes(columns: &ColumnSpec, refs: &[RefSpec], n_no_coor: Option<u64>) -> Vec<u8> {
    let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
    let mut data = Vec::new();
    data.extend_from_slice(b"TBI\x01");
    push_i32(&mut data, refs.len() as i32);
    data.extend_from_slice(&descriptor(columns, &names));
    for reference in refs {
        push_bins(&mut data, reference, false);
        push_i32(&mut data, reference.intervals.len() as i32);
        for offset in &reference.intervals {
            push_u64(&mut data, offset.as_raw());
        }
    }
    if let Some(n) = n_no_coor {
        push_u64(&mut data, n);
    }
    data
}

/// Uncompressed CSI bytes
pub fn csi_bytes(
    binning: Binning,
    columns: &ColumnSpec,
    refs: &[RefSpec],
    n_no_coor: Option<u64>,
) -> Vec<u8> {
    let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
    let aux = descriptor(columns, &names);
    let mut data = Vec::new();
    data.extend_from_slice(b"CSI\x01");
    push_i32(&mut data, binning.min_shift() as i32);
    push_i32(&mut data, binning.depth() as i32);
    push_i32(&mut data, aux.len() as i32);
    data.extend_from_slice(&aux);
    push_i32(&mut data, refs.len() as i32);
    for reference in refs {
        push_bins(&mut data, reference, true);
    }
    if let Some(n) = n_no_coor {
        push_u64(&mut data, n);
    }
    data
}

/// BGZF-compress bytes the way bgzip writes index files
pub fn bgzip(bytes: &[u8]) -> Vec<u8> {
    let mut writer = BgzfWriter::new(Vec::new());
    writer.write_all(bytes).unwrap();
    writer.finish().unwrap()
}

/// Write `bytes` to `dir/name` and return the path
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Collect a query's records as strings, panicking on errors
pub fn lines<I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = biotabix::Result<biotabix::Record>>,
{
    records
        .into_iter()
        .map(|r| String::from_utf8(r.unwrap().into_bytes()).unwrap())
        .collect()
}

/// Records of `placed` overlapping `[begin, end)` on `name`, by brute force
pub fn expected(placed: &[Placed], name: &str, begin: u64, end: u64) -> Vec<String> {
    placed
        .iter()
        .filter(|p| p.name == name && p.begin < end && begin < p.end)
        .map(|p| p.line.clone())
        .collect()
}
