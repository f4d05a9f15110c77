//! Chunk sections: a 16×16×16 block cube and its 4×4×4 biome grid.
//!
//! A section decodes the palette/bitpack on-disk form into dense per-cell
//! storage and encodes it back on save. The compound it was parsed from is
//! kept verbatim and used as the base of the serialized form, so children
//! the library does not model survive a load/save cycle untouched.

use std::collections::BTreeSet;

use basalt_nbt::{Compound, Tag, TagId};
use basalt_utils::{BIOME_CELL_WIDTH, SECTION_WIDTH};
use rustc_hash::FxHashMap;

use crate::biome::{Biome, BiomeRegion};
use crate::bit_pack::{self, bits_for_biome_palette, bits_for_block_palette, packed_len};
use crate::block::{Block, BlockState};
use crate::error::SectionError;

/// Blocks in one section (16³).
pub const BLOCKS_PER_SECTION: usize =
    (SECTION_WIDTH * SECTION_WIDTH * SECTION_WIDTH) as usize;

/// Biome cells in one section (4³).
pub const BIOME_CELLS_PER_SECTION: usize = {
    let cells = SECTION_WIDTH / BIOME_CELL_WIDTH;
    (cells * cells * cells) as usize
};

/// Biome cells along one section axis.
const BIOME_CELLS_PER_AXIS: usize = (SECTION_WIDTH / BIOME_CELL_WIDTH) as usize;

/// Bytes in a packed light array (two nibbles per byte).
const LIGHT_BYTES: usize = BLOCKS_PER_SECTION / 2;

/// A 16×16×16 cube of blocks at a fixed vertical index.
#[derive(Debug, Clone)]
pub struct Section {
    y: i32,
    blocks: Vec<Block>,
    biome_regions: Vec<BiomeRegion>,
    /// The compound this section was parsed from; base of the serialized
    /// form so unrecognised children survive.
    raw: Compound,
    blocks_dirty: bool,
    biomes_dirty: bool,
}

impl Section {
    /// Builds a blank section: all air, all default biome, everything
    /// marked dirty so the section is written out on save.
    #[must_use]
    pub fn blank(y: i32) -> Self {
        Self {
            y,
            blocks: vec![Block::new(BlockState::air(), 0, 0, true); BLOCKS_PER_SECTION],
            biome_regions: vec![BiomeRegion::new(Biome::default(), true); BIOME_CELLS_PER_SECTION],
            raw: Compound::new(),
            blocks_dirty: true,
            biomes_dirty: true,
        }
    }

    /// Decodes a section from its on-disk compound.
    pub fn from_compound(raw: Compound) -> Result<Self, SectionError> {
        let y = match raw.get("Y") {
            Some(Tag::Byte(b)) => i32::from(*b),
            Some(Tag::Int(i)) if i8::try_from(*i).is_ok() => *i,
            Some(Tag::Int(i)) => return Err(SectionError::YOutOfRange(*i)),
            _ => return Err(SectionError::MissingY),
        };

        let block_states = raw
            .compound("block_states")
            .ok_or(SectionError::MissingBlockStates)?;
        let palette_tags = block_states
            .list("palette")
            .ok_or(SectionError::MissingPalette {
                container: "block_states",
            })?;
        let palette = parse_block_palette(palette_tags)?;
        if palette.is_empty() {
            return Err(SectionError::MissingPalette {
                container: "block_states",
            });
        }

        let state_indices = match block_states.long_array("data") {
            None => vec![0u64; BLOCKS_PER_SECTION],
            Some(data) => {
                let bits = bits_for_block_palette(palette.len()).unwrap_or(4);
                let expected = packed_len(BLOCKS_PER_SECTION, bits);
                if data.len() != expected {
                    return Err(SectionError::DataLength {
                        container: "block_states",
                        expected,
                        actual: data.len(),
                    });
                }
                bit_pack::unpack(data, bits, BLOCKS_PER_SECTION)
            }
        };
        check_indices(&state_indices, palette.len(), "block_states")?;

        let block_light = match raw.byte_array("BlockLight") {
            Some(bytes) => unpack_nibbles("BlockLight", bytes)?,
            None => vec![0; BLOCKS_PER_SECTION],
        };
        let sky_light = match raw.byte_array("SkyLight") {
            Some(bytes) => unpack_nibbles("SkyLight", bytes)?,
            None => vec![0; BLOCKS_PER_SECTION],
        };

        let biomes = raw.compound("biomes").ok_or(SectionError::MissingPalette {
            container: "biomes",
        })?;
        let biome_palette_tags = biomes.list("palette").ok_or(SectionError::MissingPalette {
            container: "biomes",
        })?;
        let biome_palette = parse_biome_palette(biome_palette_tags)?;
        if biome_palette.is_empty() {
            return Err(SectionError::MissingPalette {
                container: "biomes",
            });
        }

        let biome_indices = match biomes.long_array("data") {
            None => vec![0u64; BIOME_CELLS_PER_SECTION],
            Some(data) => {
                let bits = bits_for_biome_palette(biome_palette.len()).unwrap_or(1);
                let expected = packed_len(BIOME_CELLS_PER_SECTION, bits);
                if data.len() != expected {
                    return Err(SectionError::DataLength {
                        container: "biomes",
                        expected,
                        actual: data.len(),
                    });
                }
                bit_pack::unpack(data, bits, BIOME_CELLS_PER_SECTION)
            }
        };
        check_indices(&biome_indices, biome_palette.len(), "biomes")?;

        let blocks = state_indices
            .iter()
            .enumerate()
            .map(|(i, &index)| {
                Block::new(
                    palette[index as usize].clone(),
                    block_light[i],
                    sky_light[i],
                    false,
                )
            })
            .collect();
        let biome_regions = biome_indices
            .iter()
            .map(|&index| BiomeRegion::new(biome_palette[index as usize].clone(), false))
            .collect();

        Ok(Self {
            y,
            blocks,
            biome_regions,
            raw,
            blocks_dirty: false,
            biomes_dirty: false,
        })
    }

    /// The vertical section index.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Whether any block or biome cell has been mutated since load.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.blocks_dirty || self.biomes_dirty
    }

    /// All 4096 blocks, indexed as `x + z·16 + y·256`.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// All 64 biome cells, indexed as `x + z·4 + y·16`.
    #[must_use]
    pub fn biome_regions(&self) -> &[BiomeRegion] {
        &self.biome_regions
    }

    /// The block at section-local coordinates, each in `[0, 16)`.
    #[must_use]
    pub fn block(&self, x: usize, y: usize, z: usize) -> &Block {
        &self.blocks[block_index(x, y, z)]
    }

    /// Replaces the state of the block at section-local coordinates.
    pub fn set_block_state(&mut self, x: usize, y: usize, z: usize, state: BlockState) {
        self.blocks[block_index(x, y, z)].set_state(state);
        self.blocks_dirty = true;
    }

    /// Sets the block-emitted light level at section-local coordinates.
    pub fn set_block_light(&mut self, x: usize, y: usize, z: usize, level: u8) {
        self.blocks[block_index(x, y, z)].set_block_light(level);
        self.blocks_dirty = true;
    }

    /// Sets the sky light level at section-local coordinates.
    pub fn set_sky_light(&mut self, x: usize, y: usize, z: usize, level: u8) {
        self.blocks[block_index(x, y, z)].set_sky_light(level);
        self.blocks_dirty = true;
    }

    /// The biome of the cell at cell coordinates, each in `[0, 4)`.
    #[must_use]
    pub fn biome(&self, x: usize, y: usize, z: usize) -> &Biome {
        self.biome_regions[biome_index(x, y, z)].biome()
    }

    /// Replaces the biome of the cell at cell coordinates.
    pub fn set_biome(&mut self, x: usize, y: usize, z: usize, biome: Biome) {
        self.biome_regions[biome_index(x, y, z)].set_biome(biome);
        self.biomes_dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.blocks_dirty = false;
        self.biomes_dirty = false;
        for block in &mut self.blocks {
            block.clear_dirty();
        }
        for cell in &mut self.biome_regions {
            cell.clear_dirty();
        }
    }

    /// Encodes the section. Palettes and packed arrays are rebuilt only for
    /// the grids that were mutated; everything else passes through from the
    /// parsed compound. Missing light arrays are synthesised as fully lit.
    #[must_use]
    pub fn to_compound(&self) -> Compound {
        let mut out = self.raw.clone();

        if self.blocks_dirty {
            out.insert("Y", Tag::Byte(self.y as i8));
            out.insert("block_states", self.serialize_block_states());
        }
        if self.biomes_dirty {
            out.insert("biomes", self.serialize_biomes());
        }

        // The game refuses sections without light data; -1 is "fully lit".
        if !out.contains("SkyLight") {
            out.insert("SkyLight", Tag::ByteArray(vec![-1; LIGHT_BYTES]));
        }
        if !out.contains("BlockLight") {
            out.insert("BlockLight", Tag::ByteArray(vec![-1; LIGHT_BYTES]));
        }

        out
    }

    fn serialize_block_states(&self) -> Tag {
        let air = BlockState::air();
        let mut distinct: BTreeSet<&BlockState> = self.blocks.iter().map(Block::state).collect();
        distinct.insert(&air);
        let palette: Vec<&BlockState> = distinct.into_iter().collect();

        let index_of: FxHashMap<&BlockState, u64> = palette
            .iter()
            .enumerate()
            .map(|(i, state)| (*state, i as u64))
            .collect();

        let mut container = Compound::new();
        container.insert(
            "palette",
            Tag::List {
                element: TagId::Compound,
                items: palette.iter().map(|state| serialize_state(state)).collect(),
            },
        );
        if let Some(bits) = bits_for_block_palette(palette.len()) {
            let indices: Vec<u64> = self
                .blocks
                .iter()
                .map(|block| index_of[block.state()])
                .collect();
            container.insert("data", Tag::LongArray(bit_pack::pack(&indices, bits)));
        }
        Tag::Compound(container)
    }

    fn serialize_biomes(&self) -> Tag {
        let distinct: BTreeSet<&Biome> = self.biome_regions.iter().map(BiomeRegion::biome).collect();
        let palette: Vec<&Biome> = distinct.into_iter().collect();

        let index_of: FxHashMap<&Biome, u64> = palette
            .iter()
            .enumerate()
            .map(|(i, biome)| (*biome, i as u64))
            .collect();

        let mut container = Compound::new();
        container.insert(
            "palette",
            Tag::List {
                element: TagId::String,
                items: palette
                    .iter()
                    .map(|biome| Tag::String(biome.name().to_owned()))
                    .collect(),
            },
        );
        if let Some(bits) = bits_for_biome_palette(palette.len()) {
            let indices: Vec<u64> = self
                .biome_regions
                .iter()
                .map(|cell| index_of[cell.biome()])
                .collect();
            container.insert("data", Tag::LongArray(bit_pack::pack(&indices, bits)));
        }
        Tag::Compound(container)
    }
}

const fn block_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < SECTION_WIDTH as usize);
    debug_assert!(y < SECTION_WIDTH as usize);
    debug_assert!(z < SECTION_WIDTH as usize);
    x + z * SECTION_WIDTH as usize + y * (SECTION_WIDTH * SECTION_WIDTH) as usize
}

const fn biome_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < BIOME_CELLS_PER_AXIS);
    debug_assert!(y < BIOME_CELLS_PER_AXIS);
    debug_assert!(z < BIOME_CELLS_PER_AXIS);
    x + z * BIOME_CELLS_PER_AXIS + y * BIOME_CELLS_PER_AXIS * BIOME_CELLS_PER_AXIS
}

fn parse_block_palette(tags: &[Tag]) -> Result<Vec<BlockState>, SectionError> {
    let bad = |index| SectionError::BadPaletteEntry {
        container: "block_states",
        index,
    };
    tags.iter()
        .enumerate()
        .map(|(index, tag)| {
            let entry = tag.as_compound().ok_or_else(|| bad(index))?;
            let name = entry.string("Name").ok_or_else(|| bad(index))?;
            let mut state = BlockState::new(name);
            if let Some(props) = entry.compound("Properties") {
                for (key, value) in props.iter() {
                    let value = value.as_string().ok_or_else(|| bad(index))?;
                    state.set_property(key, value);
                }
            }
            Ok(state)
        })
        .collect()
}

fn parse_biome_palette(tags: &[Tag]) -> Result<Vec<Biome>, SectionError> {
    tags.iter()
        .enumerate()
        .map(|(index, tag)| {
            tag.as_string()
                .map(Biome::new)
                .ok_or(SectionError::BadPaletteEntry {
                    container: "biomes",
                    index,
                })
        })
        .collect()
}

fn check_indices(
    indices: &[u64],
    palette_len: usize,
    container: &'static str,
) -> Result<(), SectionError> {
    match indices.iter().find(|&&index| index as usize >= palette_len) {
        None => Ok(()),
        Some(&index) => Err(SectionError::PaletteIndexOutOfRange {
            container,
            index: index as usize,
            palette_len,
        }),
    }
}

fn serialize_state(state: &BlockState) -> Tag {
    let mut entry = Compound::new();
    entry.insert("Name", Tag::String(state.name().to_owned()));
    if !state.properties().is_empty() {
        let props: Compound = state
            .properties()
            .iter()
            .map(|(key, value)| (key.clone(), Tag::String(value.clone())))
            .collect();
        entry.insert("Properties", Tag::Compound(props));
    }
    Tag::Compound(entry)
}

/// Splits packed nibble pairs into per-block light levels, low nibble
/// first.
fn unpack_nibbles(name: &'static str, bytes: &[i8]) -> Result<Vec<u8>, SectionError> {
    if bytes.len() != LIGHT_BYTES {
        return Err(SectionError::LightLength {
            name,
            actual: bytes.len(),
        });
    }
    let mut levels = Vec::with_capacity(BLOCKS_PER_SECTION);
    for &byte in bytes {
        let byte = byte as u8;
        levels.push(byte & 0x0F);
        levels.push(byte >> 4);
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn biomes_compound(names: &[&str]) -> Tag {
        let mut biomes = Compound::new();
        biomes.insert(
            "palette",
            Tag::List {
                element: TagId::String,
                items: names.iter().map(|n| Tag::String((*n).into())).collect(),
            },
        );
        Tag::Compound(biomes)
    }

    fn palette_entry(name: &str) -> Tag {
        let mut entry = Compound::new();
        entry.insert("Name", Tag::String(name.into()));
        Tag::Compound(entry)
    }

    /// A minimal valid section compound with a single-entry palette.
    fn uniform_section(y: i8, state: &str) -> Compound {
        let mut block_states = Compound::new();
        block_states.insert(
            "palette",
            Tag::List {
                element: TagId::Compound,
                items: vec![palette_entry(state)],
            },
        );

        let mut raw = Compound::new();
        raw.insert("Y", Tag::Byte(y));
        raw.insert("block_states", Tag::Compound(block_states));
        raw.insert("biomes", biomes_compound(&["minecraft:plains"]));
        raw
    }

    #[test]
    fn test_single_entry_palette_decodes_without_data() {
        let section = Section::from_compound(uniform_section(3, "minecraft:stone")).unwrap();
        assert_eq!(section.y(), 3);
        assert!(!section.is_dirty());
        assert!(
            section
                .blocks()
                .iter()
                .all(|b| b.state().name() == "minecraft:stone")
        );
        assert_eq!(section.biome(0, 0, 0).name(), "minecraft:plains");
    }

    #[test]
    fn test_packed_data_decodes() {
        let mut block_states = Compound::new();
        block_states.insert(
            "palette",
            Tag::List {
                element: TagId::Compound,
                items: vec![
                    palette_entry("minecraft:air"),
                    palette_entry("minecraft:stone"),
                ],
            },
        );
        // Index 0 -> stone, everything else air. Two entries pack at the
        // 4-bit floor: 256 longs.
        let mut indices = vec![0u64; BLOCKS_PER_SECTION];
        indices[0] = 1;
        block_states.insert("data", Tag::LongArray(bit_pack::pack(&indices, 4)));

        let mut raw = Compound::new();
        raw.insert("Y", Tag::Byte(0));
        raw.insert("block_states", Tag::Compound(block_states));
        raw.insert("biomes", biomes_compound(&["minecraft:plains"]));

        let section = Section::from_compound(raw).unwrap();
        assert_eq!(section.block(0, 0, 0).state().name(), "minecraft:stone");
        assert_eq!(section.block(1, 0, 0).state().name(), "minecraft:air");
        assert_eq!(section.block(15, 15, 15).state().name(), "minecraft:air");
    }

    #[test]
    fn test_data_length_mismatch_rejected() {
        let mut raw = uniform_section(0, "minecraft:stone");
        let block_states = raw.get_mut("block_states").unwrap().as_compound_mut().unwrap();
        block_states.insert(
            "palette",
            Tag::List {
                element: TagId::Compound,
                items: vec![
                    palette_entry("minecraft:air"),
                    palette_entry("minecraft:stone"),
                ],
            },
        );
        block_states.insert("data", Tag::LongArray(vec![0; 100]));

        assert!(matches!(
            Section::from_compound(raw),
            Err(SectionError::DataLength {
                container: "block_states",
                expected: 256,
                actual: 100,
            })
        ));
    }

    #[test]
    fn test_palette_index_out_of_range_rejected() {
        let mut raw = uniform_section(0, "minecraft:stone");
        let block_states = raw.get_mut("block_states").unwrap().as_compound_mut().unwrap();
        block_states.insert(
            "palette",
            Tag::List {
                element: TagId::Compound,
                items: vec![
                    palette_entry("minecraft:air"),
                    palette_entry("minecraft:stone"),
                ],
            },
        );
        let mut indices = vec![0u64; BLOCKS_PER_SECTION];
        indices[17] = 3;
        block_states.insert("data", Tag::LongArray(bit_pack::pack(&indices, 4)));

        assert!(matches!(
            Section::from_compound(raw),
            Err(SectionError::PaletteIndexOutOfRange {
                container: "block_states",
                index: 3,
                palette_len: 2,
            })
        ));
    }

    #[test]
    fn test_missing_block_states_rejected() {
        let mut raw = Compound::new();
        raw.insert("Y", Tag::Byte(0));
        raw.insert("biomes", biomes_compound(&["minecraft:plains"]));
        assert!(matches!(
            Section::from_compound(raw),
            Err(SectionError::MissingBlockStates)
        ));
    }

    #[test]
    fn test_light_nibbles_low_first() {
        let mut raw = uniform_section(0, "minecraft:stone");
        let mut light = vec![0i8; LIGHT_BYTES];
        // Block 0 gets level 5, block 1 gets level 12.
        light[0] = 0xC5u8 as i8;
        raw.insert("BlockLight", Tag::ByteArray(light));

        let section = Section::from_compound(raw).unwrap();
        assert_eq!(section.block(0, 0, 0).block_light(), 5);
        assert_eq!(section.block(1, 0, 0).block_light(), 12);
        assert_eq!(section.block(2, 0, 0).block_light(), 0);
        // SkyLight was absent entirely.
        assert_eq!(section.block(0, 0, 0).sky_light(), 0);
    }

    #[test]
    fn test_uniform_section_serializes_without_data() {
        let mut section = Section::blank(0);
        section.clear_dirty();
        // Touch one block with the state everything already has.
        section.set_block_state(4, 4, 4, BlockState::air());

        let out = section.to_compound();
        let block_states = out.compound("block_states").unwrap();
        assert_eq!(block_states.list("palette").unwrap().len(), 1);
        assert!(block_states.long_array("data").is_none());
    }

    #[test]
    fn test_two_state_section_packs_at_floor_width() {
        let mut section = Section::blank(-1);
        section.set_block_state(0, 0, 0, BlockState::new("minecraft:stone"));

        let out = section.to_compound();
        assert_eq!(out.byte("Y"), Some(-1));

        let block_states = out.compound("block_states").unwrap();
        let palette = block_states.list("palette").unwrap();
        // Sorted ascending by name: air before stone.
        assert_eq!(
            palette[0].as_compound().unwrap().string("Name"),
            Some("minecraft:air")
        );
        assert_eq!(
            palette[1].as_compound().unwrap().string("Name"),
            Some("minecraft:stone")
        );

        // Two entries pack at the 4-bit floor: 4096 * 4 / 64 = 256 longs,
        // with the stone index in the low nibble of the first long.
        let data = block_states.long_array("data").unwrap();
        assert_eq!(data.len(), 256);
        assert_eq!(data[0] & 0xF, 1);
        assert!(data[1..].iter().all(|&word| word == 0));
    }

    #[test]
    fn test_lights_synthesised_as_fully_lit() {
        let mut section = Section::blank(0);
        section.set_block_state(0, 0, 0, BlockState::new("minecraft:stone"));

        let out = section.to_compound();
        let sky = out.byte_array("SkyLight").unwrap();
        assert_eq!(sky.len(), LIGHT_BYTES);
        assert!(sky.iter().all(|&b| b == -1));
        let block = out.byte_array("BlockLight").unwrap();
        assert!(block.iter().all(|&b| b == -1));
    }

    #[test]
    fn test_unmodelled_children_survive() {
        let mut raw = uniform_section(2, "minecraft:stone");
        raw.insert("SomeModData", Tag::Int(99));

        let mut section = Section::from_compound(raw).unwrap();
        section.set_block_state(1, 2, 3, BlockState::new("minecraft:dirt"));

        let out = section.to_compound();
        assert_eq!(out.int("SomeModData"), Some(99));
    }

    #[test]
    fn test_serialize_decode_roundtrip() {
        let mut section = Section::blank(5);
        section.set_block_state(
            15,
            10,
            9,
            BlockState::new("minecraft:oak_log").with_property("axis", "x"),
        );
        section.set_biome(1, 2, 3, Biome::new("minecraft:desert"));

        let reloaded = Section::from_compound(section.to_compound()).unwrap();
        assert_eq!(reloaded.y(), 5);
        assert_eq!(
            reloaded.block(15, 10, 9).state(),
            &BlockState::new("minecraft:oak_log").with_property("axis", "x")
        );
        assert_eq!(
            reloaded.block(0, 0, 0).state().name(),
            "minecraft:air"
        );
        assert_eq!(reloaded.biome(1, 2, 3).name(), "minecraft:desert");
        assert_eq!(reloaded.biome(0, 0, 0).name(), "minecraft:plains");
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn test_mutation_marks_dirty() {
        let mut section =
            Section::from_compound(uniform_section(0, "minecraft:stone")).unwrap();
        assert!(!section.is_dirty());

        section.set_block_state(1, 1, 1, BlockState::new("minecraft:dirt"));
        assert!(section.is_dirty());
        assert!(section.block(1, 1, 1).is_dirty());
        assert!(!section.block(0, 0, 0).is_dirty());
    }
}
