//! Shared coordinate types and size constants for the Basalt world-storage
//! crates.

pub mod pos;

pub use pos::BiomePos;
pub use pos::BlockPos;
pub use pos::ChunkPos;
pub use pos::RegionPos;

/// Number of chunks per region side (32×32 = 1024 chunks per region).
pub const REGION_WIDTH: i32 = 32;

/// Number of blocks per section side (16×16×16 = 4096 blocks per section).
pub const SECTION_WIDTH: i32 = 16;

/// Number of blocks per biome cell side (4×4×4 blocks share one biome).
pub const BIOME_CELL_WIDTH: i32 = 4;

/// Alignment unit for chunk payloads inside a region file.
pub const SECTOR_SIZE: usize = 4096;

/// Total chunks in a region.
pub const CHUNKS_PER_REGION: usize = (REGION_WIDTH * REGION_WIDTH) as usize;
