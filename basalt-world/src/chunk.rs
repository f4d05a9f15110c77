//! Chunks: vertical stacks of sections at a fixed `(x, z)`.
//!
//! A chunk owns the compound it was parsed from and the decoded sections.
//! Serialization clones the stored compound and swaps in freshly encoded
//! sections, so chunk-level children the library does not model (heightmaps,
//! block entities, structure references) survive a load/save cycle.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use basalt_nbt::{Compound, Reader, Tag, TagId, Writer};
use basalt_utils::{BlockPos, ChunkPos, SECTION_WIDTH};
use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;

use crate::biome::Biome;
use crate::block::{Block, BlockState};
use crate::error::{Result, WorldError};
use crate::section::Section;

/// Payload scheme byte for gzip (read-only support).
pub const COMPRESSION_GZIP: u8 = 1;

/// Payload scheme byte for zlib, the scheme the library writes.
pub const COMPRESSION_ZLIB: u8 = 2;

/// A column of sections plus its raw chunk compound.
#[derive(Debug)]
pub struct Chunk {
    pos: ChunkPos,
    sections: BTreeMap<i32, Section>,
    root_name: String,
    raw: Compound,
    original_size: usize,
}

impl Chunk {
    /// Decodes a chunk from a region payload record:
    /// `u32 length | u8 scheme | length-1 compressed bytes`.
    pub(crate) fn from_record(record: &[u8]) -> Result<Self> {
        if record.len() < 5 {
            return Err(truncated());
        }
        let declared = u32::from_be_bytes([record[0], record[1], record[2], record[3]]) as usize;
        if declared == 0 || record.len() < 4 + declared {
            return Err(truncated());
        }
        let scheme = record[4];
        let data = decompress(scheme, &record[5..4 + declared])?;

        let mut reader = Reader::new(&data);
        let (root_name, root) = basalt_nbt::read_named(&mut reader)?;
        let Tag::Compound(raw) = root else {
            return Err(WorldError::MalformedChunk("root tag is not a compound"));
        };

        let x = raw
            .int("xPos")
            .ok_or(WorldError::MalformedChunk("missing xPos"))?;
        let z = raw
            .int("zPos")
            .ok_or(WorldError::MalformedChunk("missing zPos"))?;

        let mut sections = BTreeMap::new();
        if let Some(section_tags) = raw.list("sections") {
            for tag in section_tags {
                let compound = tag
                    .as_compound()
                    .ok_or(WorldError::MalformedChunk("section entry is not a compound"))?;
                let section = Section::from_compound(compound.clone())?;
                sections.insert(section.y(), section);
            }
        }

        Ok(Self {
            pos: ChunkPos::new(x, z),
            sections,
            root_name,
            raw,
            original_size: declared,
        })
    }

    /// Global chunk coordinates.
    #[must_use]
    pub const fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// The payload length this chunk declared when it was loaded.
    #[must_use]
    pub const fn original_size(&self) -> usize {
        self.original_size
    }

    /// Whether any resident section has been mutated since load.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.sections.values().any(Section::is_dirty)
    }

    /// Resident sections, in ascending vertical order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    /// The resident section at the given vertical index, if any.
    #[must_use]
    pub fn section(&self, y: i32) -> Option<&Section> {
        self.sections.get(&y)
    }

    /// The section at the given vertical index, created blank (and fully
    /// dirty) if the chunk does not have one yet.
    pub fn section_mut(&mut self, y: i32) -> &mut Section {
        self.sections.entry(y).or_insert_with(|| Section::blank(y))
    }

    /// The block at chunk-local `x`/`z` in `[0, 16)` and absolute world
    /// `y`. Sections are created on demand.
    pub fn block(&mut self, local_x: i32, y: i32, local_z: i32) -> Result<&Block> {
        let (section_y, x, sy, z) = locate(local_x, y, local_z)?;
        Ok(self.section_mut(section_y).block(x, sy, z))
    }

    /// Replaces the state of the block at chunk-local coordinates.
    pub fn set_block_state(
        &mut self,
        local_x: i32,
        y: i32,
        local_z: i32,
        state: BlockState,
    ) -> Result<()> {
        let (section_y, x, sy, z) = locate(local_x, y, local_z)?;
        self.section_mut(section_y).set_block_state(x, sy, z, state);
        Ok(())
    }

    /// Sets the block-emitted light level at chunk-local coordinates.
    pub fn set_block_light(&mut self, local_x: i32, y: i32, local_z: i32, level: u8) -> Result<()> {
        let (section_y, x, sy, z) = locate(local_x, y, local_z)?;
        self.section_mut(section_y).set_block_light(x, sy, z, level);
        Ok(())
    }

    /// Sets the sky light level at chunk-local coordinates.
    pub fn set_sky_light(&mut self, local_x: i32, y: i32, local_z: i32, level: u8) -> Result<()> {
        let (section_y, x, sy, z) = locate(local_x, y, local_z)?;
        self.section_mut(section_y).set_sky_light(x, sy, z, level);
        Ok(())
    }

    /// The biome of the cell containing the block at chunk-local
    /// coordinates.
    pub fn biome(&mut self, local_x: i32, y: i32, local_z: i32) -> Result<&Biome> {
        let (section_y, x, sy, z) = locate(local_x, y, local_z)?;
        Ok(self.section_mut(section_y).biome(x / 4, sy / 4, z / 4))
    }

    /// Replaces the biome of the cell containing the block at chunk-local
    /// coordinates.
    pub fn set_biome(&mut self, local_x: i32, y: i32, local_z: i32, biome: Biome) -> Result<()> {
        let (section_y, x, sy, z) = locate(local_x, y, local_z)?;
        self.section_mut(section_y).set_biome(x / 4, sy / 4, z / 4, biome);
        Ok(())
    }

    /// Scans resident sections for blocks whose state name contains
    /// `needle`, returning absolute positions.
    #[must_use]
    pub fn find_like(&self, needle: &str) -> Vec<(BlockPos, &Block)> {
        let width = SECTION_WIDTH;
        let mut results = Vec::new();
        for (&section_y, section) in &self.sections {
            for (i, block) in section.blocks().iter().enumerate() {
                if block.state().name().contains(needle) {
                    let i = i as i32;
                    results.push((
                        BlockPos::new(
                            self.pos.x * width + i % width,
                            section_y * width + i / (width * width),
                            self.pos.z * width + (i / width) % width,
                        ),
                        block,
                    ));
                }
            }
        }
        results
    }

    /// Clones the stored chunk compound and replaces its `sections` list
    /// with the current serialized sections.
    #[must_use]
    pub fn pack(&self) -> Tag {
        let mut out = self.raw.clone();
        out.insert(
            "sections",
            Tag::List {
                element: TagId::Compound,
                items: self
                    .sections
                    .values()
                    .map(|section| Tag::Compound(section.to_compound()))
                    .collect(),
            },
        );
        Tag::Compound(out)
    }

    /// Serializes [`Self::pack`] and zlib-compresses the result.
    pub fn package_and_compress(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new();
        basalt_nbt::write_named(&mut writer, &self.root_name, &self.pack());

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(writer.as_bytes())?;
        Ok(encoder.finish()?)
    }

    pub(crate) fn clear_dirty(&mut self) {
        for section in self.sections.values_mut() {
            section.clear_dirty();
        }
    }
}

/// Splits a chunk-local address into a section index and in-section
/// coordinates. Local `x`/`z` outside `[0, 16)` are rejected.
fn locate(local_x: i32, y: i32, local_z: i32) -> Result<(i32, usize, usize, usize)> {
    if !(0..SECTION_WIDTH).contains(&local_x) || !(0..SECTION_WIDTH).contains(&local_z) {
        return Err(WorldError::CoordinateOutOfRange(format!(
            "chunk-local ({local_x}, {local_z})"
        )));
    }
    Ok((
        y.div_euclid(SECTION_WIDTH),
        local_x as usize,
        y.rem_euclid(SECTION_WIDTH) as usize,
        local_z as usize,
    ))
}

fn decompress(scheme: u8, bytes: &[u8]) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    match scheme {
        COMPRESSION_ZLIB => ZlibDecoder::new(bytes)
            .read_to_end(&mut data)
            .map_err(WorldError::Decompression)?,
        COMPRESSION_GZIP => GzDecoder::new(bytes)
            .read_to_end(&mut data)
            .map_err(WorldError::Decompression)?,
        scheme => return Err(WorldError::UnsupportedCompression { scheme }),
    };
    Ok(data)
}

fn truncated() -> WorldError {
    WorldError::Decompression(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "chunk payload truncated",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_section_tag(y: i8, state: &str) -> Tag {
        let mut entry = Compound::new();
        entry.insert("Name", Tag::String(state.into()));

        let mut block_states = Compound::new();
        block_states.insert(
            "palette",
            Tag::List {
                element: TagId::Compound,
                items: vec![Tag::Compound(entry)],
            },
        );

        let mut biomes = Compound::new();
        biomes.insert(
            "palette",
            Tag::List {
                element: TagId::String,
                items: vec![Tag::String("minecraft:plains".into())],
            },
        );

        let mut section = Compound::new();
        section.insert("Y", Tag::Byte(y));
        section.insert("block_states", Tag::Compound(block_states));
        section.insert("biomes", Tag::Compound(biomes));
        Tag::Compound(section)
    }

    fn chunk_compound(x: i32, z: i32) -> Compound {
        let mut raw = Compound::new();
        raw.insert("DataVersion", Tag::Int(3465));
        raw.insert("xPos", Tag::Int(x));
        raw.insert("zPos", Tag::Int(z));
        raw.insert("Status", Tag::String("minecraft:full".into()));
        raw.insert(
            "sections",
            Tag::List {
                element: TagId::Compound,
                items: vec![uniform_section_tag(0, "minecraft:stone")],
            },
        );
        raw
    }

    fn record(compound: &Compound) -> Vec<u8> {
        let mut writer = Writer::new();
        basalt_nbt::write_named(&mut writer, "", &Tag::Compound(compound.clone()));

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(writer.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut out = Vec::new();
        out.extend_from_slice(&(compressed.len() as u32 + 1).to_be_bytes());
        out.push(COMPRESSION_ZLIB);
        out.extend_from_slice(&compressed);
        out
    }

    #[test]
    fn test_decode_record() {
        let mut chunk = Chunk::from_record(&record(&chunk_compound(4, -9))).unwrap();
        assert_eq!(chunk.pos(), ChunkPos::new(4, -9));
        assert!(!chunk.is_dirty());
        assert_eq!(
            chunk.block(0, 0, 0).unwrap().state().name(),
            "minecraft:stone"
        );
    }

    #[test]
    fn test_gzip_record_accepted() {
        let mut writer = Writer::new();
        basalt_nbt::write_named(&mut writer, "", &Tag::Compound(chunk_compound(0, 0)));

        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(writer.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(compressed.len() as u32 + 1).to_be_bytes());
        bytes.push(COMPRESSION_GZIP);
        bytes.extend_from_slice(&compressed);

        let chunk = Chunk::from_record(&bytes).unwrap();
        assert_eq!(chunk.pos(), ChunkPos::new(0, 0));
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let mut bytes = vec![0, 0, 0, 2, 9, 0];
        bytes.extend_from_slice(&[0; 8]);
        assert!(matches!(
            Chunk::from_record(&bytes),
            Err(WorldError::UnsupportedCompression { scheme: 9 })
        ));
    }

    #[test]
    fn test_truncated_record_rejected() {
        let record = record(&chunk_compound(0, 0));
        assert!(matches!(
            Chunk::from_record(&record[..record.len() - 10]),
            Err(WorldError::Decompression(_))
        ));
    }

    #[test]
    fn test_mutation_roundtrip() {
        let mut chunk = Chunk::from_record(&record(&chunk_compound(0, 0))).unwrap();
        chunk
            .set_block_state(15, 10, 9, BlockState::new("minecraft:iron_block"))
            .unwrap();
        assert!(chunk.is_dirty());

        let compressed = chunk.package_and_compress().unwrap();
        let mut framed = Vec::new();
        framed.extend_from_slice(&(compressed.len() as u32 + 1).to_be_bytes());
        framed.push(COMPRESSION_ZLIB);
        framed.extend_from_slice(&compressed);

        let mut reloaded = Chunk::from_record(&framed).unwrap();
        assert_eq!(
            reloaded.block(15, 10, 9).unwrap().state().name(),
            "minecraft:iron_block"
        );
        assert_eq!(
            reloaded.block(14, 10, 9).unwrap().state().name(),
            "minecraft:stone"
        );
        // Chunk-level children the library does not model survive.
        assert_eq!(reloaded.pack().as_compound().unwrap().int("DataVersion"), Some(3465));
    }

    #[test]
    fn test_negative_y_uses_floor_division() {
        let mut chunk = Chunk::from_record(&record(&chunk_compound(0, 0))).unwrap();
        chunk
            .set_block_state(0, -1, 0, BlockState::new("minecraft:bedrock"))
            .unwrap();
        assert_eq!(chunk.section(-1).unwrap().block(0, 15, 0).state().name(), "minecraft:bedrock");
    }

    #[test]
    fn test_local_coordinates_validated() {
        let mut chunk = Chunk::from_record(&record(&chunk_compound(0, 0))).unwrap();
        assert!(matches!(
            chunk.block(16, 0, 0),
            Err(WorldError::CoordinateOutOfRange(_))
        ));
        assert!(matches!(
            chunk.set_block_state(0, 0, -1, BlockState::air()),
            Err(WorldError::CoordinateOutOfRange(_))
        ));
    }

    #[test]
    fn test_find_like() {
        let mut chunk = Chunk::from_record(&record(&chunk_compound(2, 3))).unwrap();
        chunk
            .set_block_state(7, 12, 1, BlockState::new("minecraft:diamond_ore"))
            .unwrap();

        let hits = chunk.find_like("diamond");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, BlockPos::new(2 * 16 + 7, 12, 3 * 16 + 1));
    }
}
