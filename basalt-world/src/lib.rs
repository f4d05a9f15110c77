//! Read, edit, and write Minecraft-style (anvil) world storage.
//!
//! A world is stored as `.mca` region files, each holding a 32×32 grid of
//! chunks behind an 8 KiB header of sector offsets and timestamps. Chunks
//! are zlib-compressed tag trees whose sections compress 4096 block states
//! and 64 biome cells into palette-indexed bit arrays.
//!
//! [`Region`] is the entry point: open a file, read and mutate voxels
//! through its chunks, and save. Mutations propagate dirty flags up
//! through section, chunk, and region so saving skips anything untouched,
//! and payloads the library never decoded are written back byte-for-byte.
//!
//! ```no_run
//! use basalt_utils::BlockPos;
//! use basalt_world::{BlockState, Region};
//!
//! # fn main() -> basalt_world::Result<()> {
//! let mut region = Region::open("world/region/r.0.0.mca")?;
//! region.set_block_state(BlockPos::new(15, 10, 25), BlockState::new("minecraft:iron_block"))?;
//! region.save()?;
//! # Ok(())
//! # }
//! ```

pub mod biome;
pub mod bit_pack;
pub mod block;
pub mod chunk;
pub mod error;
pub mod region;
pub mod section;

pub use biome::Biome;
pub use biome::BiomeRegion;
pub use block::Block;
pub use block::BlockState;
pub use chunk::Chunk;
pub use error::Result;
pub use error::SectionError;
pub use error::WorldError;
pub use region::Region;
pub use section::Section;
