//! World-storage error types.

use basalt_nbt::NbtError;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WorldError>;

/// Errors produced while loading, editing, or saving world storage.
#[derive(Debug, Error)]
pub enum WorldError {
    /// File open / read / write / seek failed.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Compressed chunk data was rejected or truncated.
    #[error("failed to decompress chunk payload: {0}")]
    Decompression(#[source] std::io::Error),

    /// A chunk payload declared a compression scheme the library cannot
    /// decode.
    #[error("unsupported compression scheme {scheme}")]
    UnsupportedCompression {
        /// The scheme byte from the payload header.
        scheme: u8,
    },

    /// Binary tag data inside a chunk payload was malformed.
    #[error("malformed tag data: {0}")]
    MalformedTag(#[from] NbtError),

    /// A section compound violated the palette/bitpack format.
    #[error("malformed section: {0}")]
    MalformedSection(#[from] SectionError),

    /// The chunk root compound was structurally unusable.
    #[error("malformed chunk: {0}")]
    MalformedChunk(&'static str),

    /// The caller addressed a chunk whose region header entry is `(0, 0)`.
    /// Such chunks were never generated and must not be materialised or
    /// written.
    #[error("chunk ({x}, {z}) is not generated")]
    UngeneratedChunkWrite {
        /// Global chunk X coordinate.
        x: i32,
        /// Global chunk Z coordinate.
        z: i32,
    },

    /// A coordinate addressed a cell outside the addressed container.
    #[error("coordinate out of range: {0}")]
    CoordinateOutOfRange(String),

    /// A chunk compressed to more sectors than the header can describe.
    #[error("chunk spans {sectors} sectors, header limit is 255")]
    ChunkTooLarge {
        /// Sector count the chunk would need.
        sectors: usize,
    },
}

/// Ways a section compound can violate the palette/bitpack format.
#[derive(Debug, Error)]
pub enum SectionError {
    /// The section has no `block_states` child.
    #[error("missing block_states compound")]
    MissingBlockStates,

    /// The `block_states` (or `biomes`) compound has no `palette` list.
    #[error("missing {container} palette")]
    MissingPalette {
        /// Which container lacked its palette.
        container: &'static str,
    },

    /// A palette entry was not of the expected shape.
    #[error("malformed {container} palette entry at index {index}")]
    BadPaletteEntry {
        /// Which container held the entry.
        container: &'static str,
        /// Index of the offending entry.
        index: usize,
    },

    /// The packed `data` array length disagrees with the bit width derived
    /// from the palette size.
    #[error("{container} data holds {actual} longs, expected {expected}")]
    DataLength {
        /// Which container held the array.
        container: &'static str,
        /// Long count implied by the palette size.
        expected: usize,
        /// Long count actually present.
        actual: usize,
    },

    /// A decoded cell referenced a palette index past the palette end.
    #[error("{container} index {index} out of range for palette of {palette_len}")]
    PaletteIndexOutOfRange {
        /// Which container held the index.
        container: &'static str,
        /// The decoded index.
        index: usize,
        /// The palette length.
        palette_len: usize,
    },

    /// The section has no `Y` tag.
    #[error("missing Y index")]
    MissingY,

    /// The section's `Y` value does not fit a byte.
    #[error("section Y index {0} out of range")]
    YOutOfRange(i32),

    /// A light array was not exactly 2048 bytes.
    #[error("{name} array holds {actual} bytes, expected 2048")]
    LightLength {
        /// `BlockLight` or `SkyLight`.
        name: &'static str,
        /// Byte count actually present.
        actual: usize,
    },
}
