//! Tile map loading
//!
//! Reads the compact binary world-map format into an in-memory cell grid
//! that renderers and game logic can query.

pub mod codec;
pub mod error;
pub mod map;

pub use error::{Error, Result};
pub use codec::{Primitive, SerializationBuffer};
pub use map::{
    decode_map, CellFlags, CellRecord, DecodeStats, DecodedMap, GameMap, LayerEntry,
    MapCell, MapCellStore, MapLoadListener, MapWriter, TextureRef,
};
