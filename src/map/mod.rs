//! Tile map model and the binary map format.

pub mod decoder;
pub mod encoder;
pub mod game_map;
pub mod listener;
pub mod store;
pub mod types;

pub use decoder::{decode_map, DecodePhase, DecodeStats, DecodedMap, MapDecoder};
pub use encoder::{CellRecord, MapWriter};
pub use game_map::GameMap;
pub use listener::{MapLoadListener, NullListener};
pub use store::MapCellStore;
pub use types::{
    compute_cell_id, compute_cell_pos, AreaAssociation, CellFlags, Dictionary, LayerEntry,
    MapCell, TerrainAssociation, TextureRef, ZoneAssociation, MAX_MAP_SIZE, NUM_LAYERS,
};
