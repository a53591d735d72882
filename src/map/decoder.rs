//! Binary map decoder.
//!
//! The file is a fixed sequence of sections read strictly in order:
//!
//! ```text
//! i32 map_size
//! i32 texture_count          { i32 len, u8[len] }*
//! i32 cell_count             { i32 cell_id, u8 flags, NUM_LAYERS x layer }*
//!                            layer = bool has_texture [i32 tex_index, f32 scale]
//! i32 terrain_texture_count  { i32 len, u8[len] }*
//! i32 terrain_count          { i32 terrain_id, i32 tex_index }*
//! -- only if bytes remain --
//! i32 zone_count             { i32 terrain_id, i32 zone_id }*
//! i32 area_count             { i32 terrain_id, i32 area_id }*
//! ```
//!
//! Only an invalid header fails a load. Every later record is consumed in full
//! even when it references something that does not exist, so one bad record
//! never shifts the ones after it.
//!
//! The two trailing sections are detected by probing for leftover bytes. A
//! writer that ever adds a section ahead of them will be misread by this
//! decoder; new sections must be appended after the area section.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::SerializationBuffer;
use crate::error::{Error, Result};

use super::listener::MapLoadListener;
use super::store::MapCellStore;
use super::types::{Dictionary, MapCell, TextureRef, MAX_MAP_SIZE, NUM_LAYERS};

/// Length prefix of a dictionary string.
const STRING_PREFIX_SIZE: usize = 4;
/// Cell id, flags and one presence byte per layer.
const MIN_CELL_RECORD_SIZE: usize = 4 + 1 + NUM_LAYERS;
/// Terrain, zone and area records: two i32s.
const PAIR_RECORD_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodePhase {
    Header,
    TextureDict,
    CellRecords,
    TerrainDict,
    TerrainRecords,
    OptionalZones,
    OptionalAreas,
    Done,
    Failed,
}

/// Counters collected during a decode. Anything in here other than the
/// section sizes means the file had records that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    pub map_size: i32,
    pub textures: usize,
    pub terrain_textures: usize,
    pub cells_loaded: usize,
    pub dropped_cells: usize,
    pub dropped_layer_textures: usize,
    pub terrain_records: usize,
    pub dropped_terrain_records: usize,
    pub zones: usize,
    pub areas: usize,
    pub has_zone_section: bool,
    pub has_area_section: bool,
    pub malformed_strings: usize,
    pub negative_counts: usize,
    pub truncated_records: usize,
    pub trailing_bytes: usize,
}

impl DecodeStats {
    pub fn anomalies(&self) -> usize {
        self.dropped_cells
            + self.dropped_layer_textures
            + self.dropped_terrain_records
            + self.malformed_strings
            + self.negative_counts
            + self.truncated_records
    }
}

/// Everything a successful decode produces.
#[derive(Debug, Clone)]
pub struct DecodedMap {
    pub store: MapCellStore,
    pub textures: Dictionary,
    pub terrain_textures: Dictionary,
    pub stats: DecodeStats,
}

pub struct MapDecoder<'a, L: MapLoadListener + ?Sized> {
    buf: &'a mut SerializationBuffer,
    listener: &'a mut L,
    phase: DecodePhase,
    stats: DecodeStats,
}

impl<'a, L: MapLoadListener + ?Sized> MapDecoder<'a, L> {
    /// Decoding starts at the buffer's current cursor.
    pub fn new(buf: &'a mut SerializationBuffer, listener: &'a mut L) -> Self {
        Self {
            buf,
            listener,
            phase: DecodePhase::Header,
            stats: DecodeStats::default(),
        }
    }

    pub fn phase(&self) -> DecodePhase {
        self.phase
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Decode the whole map. A decoder runs once; later calls fail.
    pub fn run(&mut self) -> Result<DecodedMap> {
        if self.phase != DecodePhase::Header {
            return Err(Error::AlreadyDecoded);
        }

        self.listener.started_loading();

        let mut store = match self.read_header() {
            Ok(store) => store,
            Err(e) => {
                self.phase = DecodePhase::Failed;
                warn!(error = %e, "map header rejected");
                return Err(e);
            }
        };

        self.phase = DecodePhase::TextureDict;
        let textures = self.read_dictionary("texture");
        self.stats.textures = textures.len();

        self.phase = DecodePhase::CellRecords;
        self.read_cells(&mut store, &textures);
        self.listener.on_finished_loading_cells();

        self.phase = DecodePhase::TerrainDict;
        let terrain_textures = self.read_dictionary("terrain texture");
        self.stats.terrain_textures = terrain_textures.len();

        self.phase = DecodePhase::TerrainRecords;
        self.read_terrains(&terrain_textures);

        self.phase = DecodePhase::OptionalZones;
        if !self.buf.at_end() {
            self.stats.has_zone_section = true;
            self.stats.zones = self.read_pairs("zone", |l, terrain_id, zone_id| {
                l.on_terrain_zone_loaded(terrain_id, zone_id)
            });
        }

        self.phase = DecodePhase::OptionalAreas;
        if !self.buf.at_end() {
            self.stats.has_area_section = true;
            self.stats.areas = self.read_pairs("area", |l, terrain_id, area_id| {
                l.on_terrain_area_loaded(terrain_id, area_id)
            });
        }

        self.stats.trailing_bytes = self.buf.remaining();
        if self.stats.trailing_bytes > 0 {
            warn!(bytes = self.stats.trailing_bytes, "unread bytes after the last map section");
        }

        self.phase = DecodePhase::Done;
        self.listener.finished_loading();

        let anomalies = self.stats.anomalies();
        if anomalies > 0 {
            warn!(
                anomalies,
                dropped_cells = self.stats.dropped_cells,
                dropped_layer_textures = self.stats.dropped_layer_textures,
                dropped_terrain_records = self.stats.dropped_terrain_records,
                truncated_records = self.stats.truncated_records,
                "map decoded with skipped records"
            );
        }
        info!(
            map_size = self.stats.map_size,
            textures = self.stats.textures,
            cells = self.stats.cells_loaded,
            terrain_records = self.stats.terrain_records,
            zones = self.stats.zones,
            areas = self.stats.areas,
            "map decoded"
        );

        Ok(DecodedMap {
            store,
            textures,
            terrain_textures,
            stats: self.stats.clone(),
        })
    }

    fn read_header(&mut self) -> Result<MapCellStore> {
        let map_size = self.buf.get::<i32>();
        self.stats.map_size = map_size;
        let store = MapCellStore::new(map_size).ok_or(Error::InvalidMapSize {
            size: map_size,
            max: MAX_MAP_SIZE,
        })?;
        self.listener.on_resize(store.width(), store.height());
        Ok(store)
    }

    fn read_count(&mut self, section: &'static str) -> usize {
        let count = self.buf.get::<i32>();
        if count < 0 {
            debug!(section, count, "negative record count, treating as empty");
            self.stats.negative_counts += 1;
            return 0;
        }
        count as usize
    }

    /// Returns true when fewer than `min_size` bytes are left for record
    /// `index` of `count`. Leftover bytes are not read as a record.
    fn check_truncated(
        &mut self,
        section: &'static str,
        index: usize,
        count: usize,
        min_size: usize,
    ) -> bool {
        let remaining = self.buf.remaining();
        if remaining >= min_size {
            return false;
        }
        let missing = count - index;
        warn!(section, expected = count, missing, remaining, "map data ends mid-section");
        // a partial record is discarded, not read as the next section
        self.buf.skip(remaining);
        self.stats.truncated_records += missing;
        true
    }

    fn read_dictionary(&mut self, section: &'static str) -> Dictionary {
        let count = self.read_count(section);
        let capacity = count.min(self.buf.remaining() / STRING_PREFIX_SIZE);
        let mut dict = Dictionary::with_capacity(capacity);
        for i in 0..count {
            if self.check_truncated(section, i, count, STRING_PREFIX_SIZE) {
                break;
            }
            match self.buf.get_string_checked() {
                Some(name) => dict.push(name),
                None => {
                    debug!(section, index = i, "malformed string length, entry left empty");
                    self.stats.malformed_strings += 1;
                    dict.push("");
                }
            }
        }
        dict
    }

    fn read_cells(&mut self, store: &mut MapCellStore, textures: &Dictionary) {
        let count = self.read_count("cell");
        for i in 0..count {
            if self.check_truncated("cell", i, count, MIN_CELL_RECORD_SIZE) {
                break;
            }
            self.read_cell_record(store, textures);
        }
    }

    fn read_cell_record(&mut self, store: &mut MapCellStore, textures: &Dictionary) {
        let cell_id = self.buf.get::<i32>();
        let flags = self.buf.get::<u8>();

        let mut layer_textures: [Option<TextureRef>; NUM_LAYERS] = Default::default();
        let mut layer_scales = [1.0f32; NUM_LAYERS];

        // Layer fields are read even for an invalid cell id to keep the cursor aligned.
        let slots = layer_textures.iter_mut().zip(layer_scales.iter_mut());
        for (layer, (texture, scale)) in slots.enumerate() {
            if !self.buf.get::<bool>() {
                continue;
            }
            let tex_index = self.buf.get::<i32>();
            let tex_scale = self.buf.get::<f32>();
            match textures.get(tex_index) {
                Some(name) => {
                    *texture = Some(name.clone());
                    *scale = tex_scale;
                }
                None => {
                    debug!(cell_id, layer, tex_index, "layer texture index out of range");
                    self.stats.dropped_layer_textures += 1;
                }
            }
        }

        let Some(cell) = store.cell_mut(cell_id) else {
            debug!(cell_id, "cell id out of range, record skipped");
            self.stats.dropped_cells += 1;
            return;
        };
        *cell = MapCell::from_layers(flags, &layer_textures, &layer_scales);
        self.stats.cells_loaded += 1;
        self.listener.on_cell_data_loaded(cell_id, flags, &layer_textures, &layer_scales);
    }

    fn read_terrains(&mut self, terrain_textures: &Dictionary) {
        let count = self.read_count("terrain");
        for i in 0..count {
            if self.check_truncated("terrain", i, count, PAIR_RECORD_SIZE) {
                break;
            }
            let terrain_id = self.buf.get::<i32>();
            let tex_index = self.buf.get::<i32>();
            match terrain_textures.get(tex_index) {
                Some(name) => {
                    self.listener.on_terrain_texture_loaded(terrain_id, name);
                    self.stats.terrain_records += 1;
                }
                None => {
                    debug!(terrain_id, tex_index, "terrain texture index out of range");
                    self.stats.dropped_terrain_records += 1;
                }
            }
        }
    }

    fn read_pairs(
        &mut self,
        section: &'static str,
        mut emit: impl FnMut(&mut L, i32, i32),
    ) -> usize {
        let count = self.read_count(section);
        let mut read = 0;
        for i in 0..count {
            if self.check_truncated(section, i, count, PAIR_RECORD_SIZE) {
                break;
            }
            let terrain_id = self.buf.get::<i32>();
            let value = self.buf.get::<i32>();
            emit(&mut *self.listener, terrain_id, value);
            read += 1;
        }
        read
    }
}

/// Decode a map from `buf`, reporting progress to `listener`.
pub fn decode_map<L: MapLoadListener + ?Sized>(
    buf: &mut SerializationBuffer,
    listener: &mut L,
) -> Result<DecodedMap> {
    MapDecoder::new(buf, listener).run()
}
