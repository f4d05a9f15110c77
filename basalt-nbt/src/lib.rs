//! Binary tag ("NBT") codec for Minecraft-style world storage.
//!
//! The format is a self-describing tree of twelve tag kinds with nested
//! compounds, typed arrays, and homogeneous lists, all big-endian on the
//! wire. Parsing and serialization are exact inverses: a reserialized tree
//! keeps child order and empty-list element kinds, so chunk payloads the
//! library did not touch survive a load/save cycle byte-identical in
//! structure.

mod codec;
pub mod error;
mod stream;
pub mod tag;

pub use codec::read_named;
pub use codec::write_named;
pub use error::NbtError;
pub use stream::Reader;
pub use stream::Writer;
pub use tag::Compound;
pub use tag::Tag;
pub use tag::TagId;
