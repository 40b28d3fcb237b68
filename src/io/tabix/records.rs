//! Streaming region query over a BGZF container.
//!
//! [`Records`] walks the chunks resolved from an index one block at a time,
//! reassembles records across block boundaries, and yields those whose
//! interval overlaps the query region. Records reachable through more than
//! one chunk are emitted once, keyed by the virtual offset of their first
//! byte.

use super::lines::{LineAssembler, Record};
use crate::error::{Result, TabixError};
use crate::formats::index::ColumnSpec;
use crate::formats::Region;
use crate::io::{BgzfReader, Chunk, VirtualOffset};
use std::collections::{HashSet, VecDeque};
use std::io::{Read, Seek};
use std::iter::FusedIterator;
use std::vec;

/// Progress through the chunk currently being read
#[derive(Debug)]
struct ChunkCursor {
    start: VirtualOffset,
    end: VirtualOffset,
    next_block: u64,
}

impl ChunkCursor {
    fn new(chunk: Chunk) -> Self {
        ChunkCursor {
            start: chunk.start,
            end: chunk.end,
            next_block: chunk.start.compressed_offset(),
        }
    }
}

/// Lazy iterator over the records overlapping a region.
///
/// Records come out in chunk order, which is not necessarily coordinate
/// order. A malformed record ends the query: the error is yielded after any
/// records already accepted, and the iterator is exhausted afterwards.
pub struct Records<'r, R> {
    reader: Option<&'r mut BgzfReader<R>>,
    columns: ColumnSpec,
    region: Region,
    chunks: vec::IntoIter<Chunk>,
    cursor: Option<ChunkCursor>,
    assembler: LineAssembler,
    ready: VecDeque<Record>,
    seen: HashSet<VirtualOffset>,
    failed: Option<TabixError>,
    done: bool,
}

impl<'r, R: Read + Seek> Records<'r, R> {
    pub(crate) fn new(
        reader: &'r mut BgzfReader<R>,
        columns: ColumnSpec,
        region: Region,
        chunks: Vec<Chunk>,
    ) -> Self {
        Records {
            reader: Some(reader),
            columns,
            region,
            chunks: chunks.into_iter(),
            cursor: None,
            assembler: LineAssembler::new(),
            ready: VecDeque::new(),
            seen: HashSet::new(),
            failed: None,
            done: false,
        }
    }

    /// A query that matches nothing
    pub(crate) fn empty(columns: ColumnSpec, region: Region) -> Self {
        Records {
            reader: None,
            columns,
            region,
            chunks: Vec::new().into_iter(),
            cursor: None,
            assembler: LineAssembler::new(),
            ready: VecDeque::new(),
            seen: HashSet::new(),
            failed: None,
            done: true,
        }
    }

    /// The region being queried, with the reference name as found in the index
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Read one more block (or start the next chunk)
    fn advance(&mut self) -> Result<()> {
        let Some(reader) = self.reader.as_deref_mut() else {
            self.done = true;
            return Ok(());
        };

        let Some(cursor) = self.cursor.as_mut() else {
            match self.chunks.next() {
                Some(chunk) => self.cursor = Some(ChunkCursor::new(chunk)),
                None => self.done = true,
            }
            return Ok(());
        };

        let needs_block = cursor.next_block < cursor.end.compressed_offset()
            || (cursor.next_block == cursor.end.compressed_offset()
                && cursor.end.uncompressed_offset() > 0)
            || self
                .assembler
                .partial_start()
                .is_some_and(|start| start < cursor.end);

        let mut lines = Vec::new();
        let mut chunk_done = !needs_block;

        if needs_block {
            match reader.read_block_at(cursor.next_block)? {
                Some(block) => {
                    let from = if block.offset() == cursor.start.compressed_offset() {
                        usize::from(cursor.start.uncompressed_offset())
                    } else {
                        0
                    };
                    self.assembler.push(&block, from, &mut lines);
                    cursor.next_block = block.next_offset();
                }
                None => {
                    lines.extend(self.assembler.finish());
                    chunk_done = true;
                }
            }
        }

        let end = cursor.end;
        for line in lines {
            if line.offset() >= end {
                chunk_done = true;
                break;
            }
            if !self.accept(line)? {
                chunk_done = true;
                break;
            }
        }

        if chunk_done {
            self.cursor = None;
            self.assembler.clear();
        }
        Ok(())
    }

    /// Filter one record. Returns false once records are past the region.
    fn accept(&mut self, line: Record) -> Result<bool> {
        let bytes = line.as_bytes();
        if bytes.is_empty() || self.columns.is_meta(bytes) {
            return Ok(true);
        }

        let interval = self
            .columns
            .parse_interval(bytes)
            .map_err(|msg| TabixError::RecordParse {
                offset: line.offset(),
                msg,
            })?;

        if interval.name != self.region.name().as_bytes() {
            return Ok(true);
        }
        if interval.begin >= self.region.end() {
            return Ok(false);
        }
        if self.region.overlaps(interval.begin, interval.end) && self.seen.insert(line.offset()) {
            self.ready.push_back(line);
        }
        Ok(true)
    }
}

impl<R: Read + Seek> Iterator for Records<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(Ok(record));
            }
            if let Some(error) = self.failed.take() {
                return Some(Err(error));
            }
            if self.done {
                return None;
            }
            if let Err(error) = self.advance() {
                self.done = true;
                self.failed = Some(error);
            }
        }
    }
}

impl<R: Read + Seek> FusedIterator for Records<'_, R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BgzfWriter;
    use std::io::{Cursor, Write};

    /// Three BED records, the second straddling the block boundary
    fn container() -> (Vec<u8>, Vec<VirtualOffset>, VirtualOffset) {
        let mut writer = BgzfWriter::new(Vec::new());
        let first = writer.virtual_position();
        writer.write_all(b"#header\nchr1\t100\t200\ta\n").unwrap();
        let second = writer.virtual_position();
        writer.write_all(b"chr1\t300").unwrap();
        writer.flush().unwrap();
        writer.write_all(b"\t400\tb\n").unwrap();
        let third = writer.virtual_position();
        writer.write_all(b"chr1\t500\t600\tc\nchr2\t10\t20\td\n").unwrap();
        let end = writer.virtual_position();
        (
            writer.finish().unwrap(),
            vec![VirtualOffset::new(0, 8), second, third, first],
            end,
        )
    }

    fn run(region: Region, chunks: Vec<Chunk>) -> Vec<Result<Record>> {
        let (data, _, _) = container();
        let mut reader = BgzfReader::new(Cursor::new(data));
        Records::new(&mut reader, ColumnSpec::bed(), region, chunks).collect()
    }

    fn names(results: Vec<Result<Record>>) -> Vec<String> {
        results
            .into_iter()
            .map(|r| {
                let record = r.unwrap();
                String::from_utf8(record.into_bytes()).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_whole_chunk_overlap() {
        let (_, offsets, end) = container();
        let chunk = Chunk::new(offsets[3], end);
        let lines = names(run(Region::whole("chr1"), vec![chunk]));
        assert_eq!(
            lines,
            vec!["chr1\t100\t200\ta", "chr1\t300\t400\tb", "chr1\t500\t600\tc"]
        );
    }

    #[test]
    fn test_straddling_record_only() {
        let (_, offsets, end) = container();
        let chunk = Chunk::new(offsets[0], end);
        let lines = names(run(Region::new("chr1", 350, 360).unwrap(), vec![chunk]));
        assert_eq!(lines, vec!["chr1\t300\t400\tb"]);
    }

    #[test]
    fn test_chunk_end_completes_started_record() {
        // chunk ends right after the second record starts
        let (_, offsets, _) = container();
        let chunk = Chunk::new(offsets[1], VirtualOffset::from_raw(offsets[1].as_raw() + 1));
        let lines = names(run(Region::whole("chr1"), vec![chunk]));
        assert_eq!(lines, vec!["chr1\t300\t400\tb"]);
    }

    #[test]
    fn test_duplicate_chunks_emit_once() {
        let (_, offsets, end) = container();
        let chunk = Chunk::new(offsets[0], end);
        let inner = Chunk::new(offsets[1], offsets[2]);
        let lines = names(run(Region::whole("chr1"), vec![chunk, inner, chunk]));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_other_reference_skipped() {
        let (_, offsets, end) = container();
        let lines = names(run(Region::whole("chr2"), vec![Chunk::new(offsets[0], end)]));
        assert_eq!(lines, vec!["chr2\t10\t20\td"]);
    }

    #[test]
    fn test_malformed_record_aborts() {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_all(b"chr1\t1\t5\nchr1\tx\t9\nchr1\t10\t20\n").unwrap();
        let end = writer.virtual_position();
        let data = writer.finish().unwrap();

        let mut reader = BgzfReader::new(Cursor::new(data));
        let chunk = Chunk::new(VirtualOffset::default(), end);
        let mut records = Records::new(&mut reader, ColumnSpec::bed(), Region::whole("chr1"), vec![chunk]);
        assert_eq!(records.next().unwrap().unwrap().as_bytes(), b"chr1\t1\t5");
        match records.next() {
            Some(Err(TabixError::RecordParse { offset, .. })) => {
                assert_eq!(offset, VirtualOffset::new(0, 9));
            }
            other => panic!("expected parse error, got {:?}", other.map(|r| r.is_ok())),
        }
        assert!(records.next().is_none());
        assert!(records.next().is_none());
    }

    #[test]
    fn test_empty_query() {
        let mut records: Records<'_, Cursor<Vec<u8>>> =
            Records::empty(ColumnSpec::bed(), Region::whole("chrZ"));
        assert!(records.next().is_none());
    }
}
