//! Block states and per-voxel block data.

use std::collections::BTreeMap;
use std::fmt;

/// The reserved default block state name.
pub const AIR: &str = "minecraft:air";

/// A block's identity: a namespaced name plus named string properties
/// such as orientation or waterlogging. The library does not interpret
/// them.
///
/// Ordering is by name, then properties, which makes palette order total
/// and deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockState {
    name: String,
    properties: BTreeMap<String, String>,
}

impl BlockState {
    /// Creates a state with no properties.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// The reserved default state, `minecraft:air`.
    #[must_use]
    pub fn air() -> Self {
        Self::new(AIR)
    }

    /// Adds a property, builder style.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets a property.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// The namespaced name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the reserved default state.
    #[must_use]
    pub fn is_air(&self) -> bool {
        self.name == AIR && self.properties.is_empty()
    }

    /// The properties, sorted by key.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::air()
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            write!(f, "[")?;
            for (i, (key, value)) in self.properties.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// One voxel: a state plus its two light levels in `[0, 15]`.
///
/// Blocks are plain data; mutation goes through the owning section so the
/// dirty flags propagate.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    state: BlockState,
    block_light: u8,
    sky_light: u8,
    dirty: bool,
}

impl Block {
    pub(crate) const fn new(state: BlockState, block_light: u8, sky_light: u8, dirty: bool) -> Self {
        Self {
            state,
            block_light,
            sky_light,
            dirty,
        }
    }

    /// The block's state.
    #[must_use]
    pub const fn state(&self) -> &BlockState {
        &self.state
    }

    /// Light emitted by blocks, `[0, 15]`.
    #[must_use]
    pub const fn block_light(&self) -> u8 {
        self.block_light
    }

    /// Light from the sky, `[0, 15]`.
    #[must_use]
    pub const fn sky_light(&self) -> u8 {
        self.sky_light
    }

    /// Whether this block has been mutated since load.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_state(&mut self, state: BlockState) {
        self.state = state;
        self.dirty = true;
    }

    pub(crate) fn set_block_light(&mut self, level: u8) {
        debug_assert!(level <= 15);
        self.block_light = level & 0x0F;
        self.dirty = true;
    }

    pub(crate) fn set_sky_light(&mut self, level: u8) {
        debug_assert!(level <= 15);
        self.sky_light = level & 0x0F;
        self.dirty = true;
    }

    pub(crate) const fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new(BlockState::air(), 0, 0, false)
    }
}
