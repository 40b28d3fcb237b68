//! I/O module: BGZF block codec and indexed region queries

pub mod compression;
pub mod tabix;
mod virtual_offset;

pub use compression::{
    compress_block, BgzfReader, BgzfWriter, Block, Blocks, BGZF_BLOCK_SIZE, BGZF_EOF,
    BGZF_MAX_BLOCK_SIZE,
};
pub use tabix::{Record, Records, TabixReader, TabixReaderBuilder};
pub use virtual_offset::{Chunk, VirtualOffset, MAX_COMPRESSED_OFFSET};

pub(crate) use virtual_offset::merge_chunks;
