//! Region files: 32×32 chunks behind an 8 KiB header.
//!
//! ## On-disk layout
//!
//! - `[0, 4096)`: 1024 location entries, `u24 sector_offset | u8
//!   sector_count`, big-endian. An all-zero entry marks an ungenerated
//!   chunk.
//! - `[4096, 8192)`: 1024 `u32` last-modified timestamps.
//! - `[8192, ..)`: chunk payload records, each padded to a 4096-byte
//!   sector boundary.
//!
//! ## Saving
//!
//! Save splices rewritten payloads into an in-memory copy of the
//! post-header bytes, shifting the offsets of every later chunk when a
//! payload grows or shrinks, then rewrites the whole file from offset 0.
//! Untouched chunks are carried over byte-for-byte. A crash mid-rewrite
//! can leave the file inconsistent; callers that need atomicity should
//! save to a scratch path and rename.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use basalt_utils::{BlockPos, ChunkPos, CHUNKS_PER_REGION, SECTOR_SIZE};
use rustc_hash::FxHashMap;

use crate::biome::Biome;
use crate::block::{Block, BlockState};
use crate::chunk::{COMPRESSION_ZLIB, Chunk};
use crate::error::{Result, WorldError};

/// Combined size of the location and timestamp tables.
const HEADER_SIZE: usize = 2 * SECTOR_SIZE;

/// A chunk's sector count is a single header byte.
const MAX_SECTORS_PER_CHUNK: usize = 255;

/// An open region file and its decoded header tables.
///
/// Chunks are decoded lazily on first access; their raw payload bytes are
/// held in memory from load so untouched chunks survive a save unchanged.
/// Dropping a dirty region flushes it best-effort; call [`Region::close`]
/// for the checked path.
#[derive(Debug)]
pub struct Region {
    path: PathBuf,
    file: File,
    /// Per-chunk `(byte_offset, byte_length)`, both multiples of 4096.
    locations: Vec<(u32, u32)>,
    timestamps: Vec<u32>,
    chunks: BTreeMap<usize, Chunk>,
    /// Raw payload records keyed by their file offset.
    raw_payloads: FxHashMap<u32, Vec<u8>>,
    dirty: bool,
}

impl Region {
    /// Opens a region file and eagerly decodes its header tables and
    /// payload bytes.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header = vec![0u8; HEADER_SIZE];
        file.read_exact(&mut header)?;

        let mut locations = Vec::with_capacity(CHUNKS_PER_REGION);
        for i in 0..CHUNKS_PER_REGION {
            let entry = &header[i * 4..i * 4 + 4];
            let sector = u32::from_be_bytes([0, entry[0], entry[1], entry[2]]);
            let offset = sector
                .checked_mul(SECTOR_SIZE as u32)
                .ok_or(WorldError::MalformedChunk("header offset overflows"))?;
            let length = u32::from(entry[3]) * SECTOR_SIZE as u32;
            if offset != 0 && (offset as usize) < HEADER_SIZE {
                return Err(WorldError::MalformedChunk(
                    "chunk offset overlaps region header",
                ));
            }
            locations.push((offset, length));
        }

        let mut timestamps = Vec::with_capacity(CHUNKS_PER_REGION);
        for i in 0..CHUNKS_PER_REGION {
            let entry = &header[SECTOR_SIZE + i * 4..SECTOR_SIZE + i * 4 + 4];
            timestamps.push(u32::from_be_bytes([entry[0], entry[1], entry[2], entry[3]]));
        }

        let mut raw_payloads = FxHashMap::default();
        for &(offset, length) in &locations {
            if offset == 0 || length == 0 {
                continue;
            }
            let mut record = vec![0u8; length as usize];
            file.seek(SeekFrom::Start(u64::from(offset)))?;
            file.read_exact(&mut record)?;
            raw_payloads.insert(offset, record);
        }

        tracing::debug!(
            path = %path.display(),
            chunks = raw_payloads.len(),
            "loaded region"
        );

        Ok(Self {
            path,
            file,
            locations,
            timestamps,
            chunks: BTreeMap::new(),
            raw_payloads,
            dirty: false,
        })
    }

    /// The file this region was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether any chunk in this region has unsaved mutations.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.chunks.values().any(Chunk::is_dirty)
    }

    /// The header location entry for a chunk index in `[0, 1024)`:
    /// `(byte_offset, byte_length)`. `(0, 0)` marks an ungenerated chunk.
    pub fn chunk_location(&self, index: usize) -> Result<(u32, u32)> {
        self.locations.get(index).copied().ok_or_else(|| {
            WorldError::CoordinateOutOfRange(format!("chunk index {index}"))
        })
    }

    /// The last-modified timestamp for a chunk index in `[0, 1024)`.
    pub fn timestamp(&self, index: usize) -> Result<u32> {
        self.timestamps.get(index).copied().ok_or_else(|| {
            WorldError::CoordinateOutOfRange(format!("chunk index {index}"))
        })
    }

    /// Shared access to the chunk at the given position, decoding it on
    /// first use.
    pub fn chunk(&mut self, pos: ChunkPos) -> Result<&Chunk> {
        self.chunk_mut(pos).map(|chunk| &*chunk)
    }

    /// Mutable access to the chunk at the given position, decoding it on
    /// first use. Fails with [`WorldError::UngeneratedChunkWrite`] when the
    /// chunk's header entry is `(0, 0)`.
    pub fn chunk_mut(&mut self, pos: ChunkPos) -> Result<&mut Chunk> {
        let index = pos.region_chunk_index();
        if !self.chunks.contains_key(&index) {
            let (offset, length) = self.chunk_location(index)?;
            if offset == 0 || length == 0 {
                return Err(WorldError::UngeneratedChunkWrite { x: pos.x, z: pos.z });
            }
            let record = self.raw_payloads.get(&offset).ok_or(
                WorldError::MalformedChunk("no payload cached for chunk offset"),
            )?;
            let chunk = Chunk::from_record(record)?;
            tracing::trace!(%pos, index, "decoded chunk");
            self.chunks.insert(index, chunk);
        }
        self.chunks.get_mut(&index).ok_or_else(|| {
            WorldError::CoordinateOutOfRange(format!("chunk index {index}"))
        })
    }

    /// The block at an absolute position inside this region.
    pub fn get_block(&mut self, pos: BlockPos) -> Result<&Block> {
        let chunk = self.chunk_mut(pos.to_chunk())?;
        chunk.block(local_x(pos), pos.y, local_z(pos))
    }

    /// Replaces the block state at an absolute position inside this
    /// region, marking the section, chunk, and region dirty.
    pub fn set_block_state(&mut self, pos: BlockPos, state: BlockState) -> Result<()> {
        let chunk = self.chunk_mut(pos.to_chunk())?;
        chunk.set_block_state(local_x(pos), pos.y, local_z(pos), state)?;
        self.dirty = true;
        Ok(())
    }

    /// The biome at an absolute position inside this region.
    pub fn get_biome(&mut self, pos: BlockPos) -> Result<&Biome> {
        let chunk = self.chunk_mut(pos.to_chunk())?;
        chunk.biome(local_x(pos), pos.y, local_z(pos))
    }

    /// Replaces the biome of the cell at an absolute position inside this
    /// region, marking the section, chunk, and region dirty.
    pub fn set_biome(&mut self, pos: BlockPos, biome: Biome) -> Result<()> {
        let chunk = self.chunk_mut(pos.to_chunk())?;
        chunk.set_biome(local_x(pos), pos.y, local_z(pos), biome)?;
        self.dirty = true;
        Ok(())
    }

    /// Writes every mutated chunk back to disk, shifting later chunks when
    /// a payload changes its sector count, and rewrites the header.
    ///
    /// The file is rewritten in place from offset 0; a crash mid-save can
    /// leave it inconsistent.
    pub fn save(&mut self) -> Result<()> {
        let mut buffer = self.read_after_header()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        let dirty_indices: Vec<usize> = self
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.is_dirty())
            .map(|(&index, _)| index)
            .collect();

        for index in dirty_indices {
            let Some(chunk) = self.chunks.get(&index) else {
                continue;
            };
            let (old_offset, old_length) = self.chunk_location(index)?;
            if old_offset == 0 || old_length == 0 {
                let pos = chunk.pos();
                return Err(WorldError::UngeneratedChunkWrite { x: pos.x, z: pos.z });
            }

            let data = chunk.package_and_compress()?;
            let data_len = data.len();
            let padded_len = (data_len + 5).div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
            if padded_len / SECTOR_SIZE > MAX_SECTORS_PER_CHUNK {
                return Err(WorldError::ChunkTooLarge {
                    sectors: padded_len / SECTOR_SIZE,
                });
            }

            let mut payload = Vec::with_capacity(padded_len);
            payload.extend_from_slice(&(data_len as u32 + 1).to_be_bytes());
            payload.push(COMPRESSION_ZLIB);
            payload.extend_from_slice(&data);
            payload.resize(padded_len, 0);

            let splice_start = old_offset as usize - HEADER_SIZE;
            let splice_end = splice_start + old_length as usize;
            if splice_end > buffer.len() {
                return Err(WorldError::MalformedChunk(
                    "chunk payload extends past end of file",
                ));
            }

            let delta = padded_len as i64 - i64::from(old_length);
            self.locations[index] = (old_offset, padded_len as u32);
            self.timestamps[index] = now;
            if delta != 0 {
                tracing::debug!(index, delta, "chunk changed size, shifting later chunks");
                for (i, location) in self.locations.iter_mut().enumerate() {
                    if i != index && location.0 > old_offset {
                        location.0 = (i64::from(location.0) + delta) as u32;
                    }
                }
            }

            buffer.splice(splice_start..splice_end, payload);
        }

        let header = self.encode_header();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.file.write_all(&buffer)?;
        let written = HEADER_SIZE + buffer.len();
        let padded = written.div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
        if padded > written {
            self.file.write_all(&vec![0u8; padded - written])?;
        }
        self.file.set_len(padded as u64)?;
        self.file.flush()?;

        // The payload cache is keyed by offset; rebuild it against the
        // shifted table so later loads see the saved bytes.
        self.raw_payloads.clear();
        for &(offset, length) in &self.locations {
            if offset == 0 || length == 0 {
                continue;
            }
            let start = offset as usize - HEADER_SIZE;
            self.raw_payloads
                .insert(offset, buffer[start..start + length as usize].to_vec());
        }
        for chunk in self.chunks.values_mut() {
            chunk.clear_dirty();
        }
        self.dirty = false;

        tracing::debug!(path = %self.path.display(), "saved region");
        Ok(())
    }

    /// Flushes the region if it is dirty and releases the file handle.
    pub fn close(mut self) -> Result<()> {
        if self.is_dirty() {
            self.save()?;
        }
        Ok(())
    }

    fn read_after_header(&mut self) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        let mut buffer = Vec::new();
        self.file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn encode_header(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(HEADER_SIZE);
        for &(offset, length) in &self.locations {
            let sector = offset / SECTOR_SIZE as u32;
            header.extend_from_slice(&sector.to_be_bytes()[1..4]);
            header.push((length / SECTOR_SIZE as u32) as u8);
        }
        for &timestamp in &self.timestamps {
            header.extend_from_slice(&timestamp.to_be_bytes());
        }
        header
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if self.is_dirty() {
            if let Err(error) = self.save() {
                tracing::warn!(
                    path = %self.path.display(),
                    %error,
                    "failed to flush dirty region on drop"
                );
            }
        }
    }
}

fn local_x(pos: BlockPos) -> i32 {
    pos.x.rem_euclid(16)
}

fn local_z(pos: BlockPos) -> i32 {
    pos.z.rem_euclid(16)
}
