use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::codec::SerializationBuffer;
use crate::error::Result;

use super::decoder::{decode_map, DecodeStats};
use super::listener::MapLoadListener;
use super::store::MapCellStore;
use super::types::{
    AreaAssociation, MapCell, TerrainAssociation, TextureRef, ZoneAssociation, NUM_LAYERS,
};

/// Terrain associations gathered while a load is in flight. Published into
/// the map only if the whole decode succeeds. A repeated terrain id replaces
/// the earlier association.
#[derive(Default)]
struct PendingTerrain<'a> {
    textures: HashMap<i32, String>,
    zones: HashMap<i32, i32>,
    areas: HashMap<i32, i32>,
    downstream: Option<&'a mut dyn MapLoadListener>,
}

impl MapLoadListener for PendingTerrain<'_> {
    fn started_loading(&mut self) {
        if let Some(l) = self.downstream.as_mut() {
            l.started_loading();
        }
    }

    fn on_resize(&mut self, width: i32, height: i32) {
        if let Some(l) = self.downstream.as_mut() {
            l.on_resize(width, height);
        }
    }

    fn on_cell_data_loaded(
        &mut self,
        cell_id: i32,
        flags: u8,
        textures: &[Option<TextureRef>; NUM_LAYERS],
        scales: &[f32; NUM_LAYERS],
    ) {
        if let Some(l) = self.downstream.as_mut() {
            l.on_cell_data_loaded(cell_id, flags, textures, scales);
        }
    }

    fn on_finished_loading_cells(&mut self) {
        if let Some(l) = self.downstream.as_mut() {
            l.on_finished_loading_cells();
        }
    }

    fn on_terrain_texture_loaded(&mut self, terrain_id: i32, name: &str) {
        if let Some(prev) = self.textures.insert(terrain_id, name.to_string()) {
            debug!(terrain_id, previous = %prev, texture = name, "terrain texture replaced");
        }
        if let Some(l) = self.downstream.as_mut() {
            l.on_terrain_texture_loaded(terrain_id, name);
        }
    }

    fn on_terrain_zone_loaded(&mut self, terrain_id: i32, zone_id: i32) {
        if let Some(prev) = self.zones.insert(terrain_id, zone_id) {
            debug!(terrain_id, previous = prev, zone_id, "terrain zone replaced");
        }
        if let Some(l) = self.downstream.as_mut() {
            l.on_terrain_zone_loaded(terrain_id, zone_id);
        }
    }

    fn on_terrain_area_loaded(&mut self, terrain_id: i32, area_id: i32) {
        if let Some(prev) = self.areas.insert(terrain_id, area_id) {
            debug!(terrain_id, previous = prev, area_id, "terrain area replaced");
        }
        if let Some(l) = self.downstream.as_mut() {
            l.on_terrain_area_loaded(terrain_id, area_id);
        }
    }

    fn finished_loading(&mut self) {
        if let Some(l) = self.downstream.as_mut() {
            l.finished_loading();
        }
    }
}

/// A loaded world map: the cell grid plus per-terrain lookups.
///
/// Until a load succeeds every query answers "nothing here". A failed load
/// also clears whatever was loaded before, so a caller that ignores the
/// result never sees stale or half-built data.
#[derive(Debug, Default)]
pub struct GameMap {
    store: Option<MapCellStore>,
    terrain_textures: HashMap<i32, String>,
    terrain_zones: HashMap<i32, i32>,
    terrain_areas: HashMap<i32, i32>,
    last_stats: Option<DecodeStats>,
}

impl GameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<DecodeStats> {
        self.load_inner(path.as_ref(), None)
    }

    /// Like [`GameMap::load`], also forwarding every notification to `listener`.
    pub fn load_with_listener(
        &mut self,
        path: impl AsRef<Path>,
        listener: &mut dyn MapLoadListener,
    ) -> Result<DecodeStats> {
        self.load_inner(path.as_ref(), Some(listener))
    }

    pub fn load_from_bytes(&mut self, bytes: impl Into<Vec<u8>>) -> Result<DecodeStats> {
        let mut buf = SerializationBuffer::from_vec(bytes.into());
        self.load_buffer(&mut buf, None)
    }

    fn load_inner(
        &mut self,
        path: &Path,
        listener: Option<&mut dyn MapLoadListener>,
    ) -> Result<DecodeStats> {
        debug!(path = %path.display(), "loading map");
        let mut buf = match SerializationBuffer::read_file(path) {
            Ok(buf) => buf,
            Err(e) => {
                self.unload();
                return Err(e);
            }
        };
        let stats = self.load_buffer(&mut buf, listener)?;
        info!(path = %path.display(), size = stats.map_size, "map loaded");
        Ok(stats)
    }

    fn load_buffer(
        &mut self,
        buf: &mut SerializationBuffer,
        listener: Option<&mut dyn MapLoadListener>,
    ) -> Result<DecodeStats> {
        self.unload();

        let mut pending = PendingTerrain { downstream: listener, ..Default::default() };
        let decoded = decode_map(buf, &mut pending)?;

        self.store = Some(decoded.store);
        self.terrain_textures = pending.textures;
        self.terrain_zones = pending.zones;
        self.terrain_areas = pending.areas;
        self.last_stats = Some(decoded.stats.clone());
        Ok(decoded.stats)
    }

    /// Drop the loaded map, returning to the empty state.
    pub fn unload(&mut self) {
        *self = Self::default();
    }

    pub fn is_loaded(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&MapCellStore> {
        self.store.as_ref()
    }

    pub fn width(&self) -> i32 {
        self.store.as_ref().map_or(0, MapCellStore::width)
    }

    pub fn height(&self) -> i32 {
        self.store.as_ref().map_or(0, MapCellStore::height)
    }

    pub fn cell_at(&self, x: i32, y: i32) -> Option<&MapCell> {
        self.store.as_ref()?.cell_at(x, y)
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.store.as_ref().is_some_and(|s| s.is_walkable(x, y))
    }

    pub fn terrain_texture(&self, terrain_id: i32) -> Option<&str> {
        self.terrain_textures.get(&terrain_id).map(String::as_str)
    }

    pub fn terrain_zone(&self, terrain_id: i32) -> Option<i32> {
        self.terrain_zones.get(&terrain_id).copied()
    }

    pub fn terrain_area(&self, terrain_id: i32) -> Option<i32> {
        self.terrain_areas.get(&terrain_id).copied()
    }

    pub fn terrain_count(&self) -> usize {
        self.terrain_textures.len()
    }

    pub fn last_stats(&self) -> Option<&DecodeStats> {
        self.last_stats.as_ref()
    }

    /// Terrain texture associations ordered by terrain id.
    pub fn terrain_associations(&self) -> Vec<TerrainAssociation> {
        let mut out: Vec<_> = self
            .terrain_textures
            .iter()
            .map(|(&terrain_id, name)| TerrainAssociation {
                terrain_id,
                texture_name: name.clone(),
            })
            .collect();
        out.sort_by_key(|a| a.terrain_id);
        out
    }

    pub fn zone_associations(&self) -> Vec<ZoneAssociation> {
        let mut out: Vec<_> = self
            .terrain_zones
            .iter()
            .map(|(&terrain_id, &zone_id)| ZoneAssociation { terrain_id, zone_id })
            .collect();
        out.sort_by_key(|a| a.terrain_id);
        out
    }

    pub fn area_associations(&self) -> Vec<AreaAssociation> {
        let mut out: Vec<_> = self
            .terrain_areas
            .iter()
            .map(|(&terrain_id, &area_id)| AreaAssociation { terrain_id, area_id })
            .collect();
        out.sort_by_key(|a| a.terrain_id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::map::encoder::{CellRecord, MapWriter};

    fn sample_writer() -> MapWriter {
        let mut writer = MapWriter::new(2);
        let grass = writer.texture("grass");
        writer.cell(CellRecord::new(0, 0).with_layer(0, grass, 1.0));
        writer.cell(CellRecord::new(3, 1));
        let sand = writer.terrain_texture("sand");
        writer.terrain(1, sand);
        writer.zone(1, 40);
        writer.area(1, 41);
        writer
    }

    #[derive(Default)]
    struct Counter {
        cells: usize,
        finished: bool,
    }

    impl MapLoadListener for Counter {
        fn on_cell_data_loaded(
            &mut self,
            _cell_id: i32,
            _flags: u8,
            _textures: &[Option<TextureRef>; NUM_LAYERS],
            _scales: &[f32; NUM_LAYERS],
        ) {
            self.cells += 1;
        }

        fn finished_loading(&mut self) {
            self.finished = true;
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.map");
        sample_writer().write_file(&path).unwrap();

        let mut map = GameMap::new();
        let stats = map.load(&path).unwrap();
        assert_eq!(stats.cells_loaded, 2);
        assert!(map.is_loaded());
        assert_eq!(map.width(), 2);
        assert_eq!(map.height(), 2);
        assert!(map.is_walkable(0, 0));
        assert!(!map.is_walkable(1, 1));
        assert_eq!(map.cell_at(0, 0).unwrap().layer(0).unwrap().name(), "grass");
        assert_eq!(map.terrain_texture(1), Some("sand"));
        assert_eq!(map.terrain_zone(1), Some(40));
        assert_eq!(map.terrain_area(1), Some(41));
        assert_eq!(map.terrain_texture(2), None);
        assert_eq!(map.last_stats(), Some(&stats));
        assert_eq!(
            map.terrain_associations(),
            vec![TerrainAssociation { terrain_id: 1, texture_name: "sand".into() }]
        );
        assert_eq!(map.zone_associations(), vec![ZoneAssociation { terrain_id: 1, zone_id: 40 }]);
        assert_eq!(map.area_associations(), vec![AreaAssociation { terrain_id: 1, area_id: 41 }]);
    }

    #[test]
    fn test_missing_file_fires_no_notifications() {
        let dir = tempfile::tempdir().unwrap();
        let mut counter = Counter::default();
        let mut map = GameMap::new();
        let err = map
            .load_with_listener(dir.path().join("missing.map"), &mut counter)
            .unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
        assert_eq!(counter.cells, 0);
        assert!(!counter.finished);
        assert!(!map.is_loaded());
    }

    #[test]
    fn test_listener_receives_forwarded_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.map");
        sample_writer().write_file(&path).unwrap();

        let mut counter = Counter::default();
        let mut map = GameMap::new();
        map.load_with_listener(&path, &mut counter).unwrap();
        assert_eq!(counter.cells, 2);
        assert!(counter.finished);
        assert_eq!(map.terrain_count(), 1);
    }

    #[test]
    fn test_failed_load_clears_previous_map() {
        let mut map = GameMap::new();
        map.load_from_bytes(sample_writer().encode().unwrap().into_vec()).unwrap();
        assert!(map.is_loaded());

        let err = map.load_from_bytes(MapWriter::new(0).encode().unwrap().into_vec()).unwrap_err();
        assert!(matches!(err, Error::InvalidMapSize { size: 0, .. }));
        assert!(!map.is_loaded());
        assert!(map.cell_at(0, 0).is_none());
        assert!(!map.is_walkable(0, 0));
        assert_eq!(map.terrain_texture(1), None);
        assert_eq!(map.width(), 0);
        assert!(map.last_stats().is_none());
    }

    #[test]
    fn test_oversized_header_leaves_no_store() {
        let mut map = GameMap::new();
        let bytes = MapWriter::new(crate::map::MAX_MAP_SIZE + 1).encode().unwrap();
        assert!(map.load_from_bytes(bytes.into_vec()).is_err());
        assert!(map.store().is_none());
    }

    #[test]
    fn test_repeated_terrain_id_keeps_last() {
        let mut writer = MapWriter::new(1);
        let sand = writer.terrain_texture("sand");
        let mud = writer.terrain_texture("mud");
        writer.terrain(3, sand).terrain(3, mud);
        writer.zone(3, 1).zone(3, 2);
        writer.area(3, 5).area(3, 6);

        let mut map = GameMap::new();
        let stats = map.load_from_bytes(writer.encode().unwrap().into_vec()).unwrap();
        assert_eq!(stats.terrain_records, 2);
        assert_eq!(stats.zones, 2);
        assert_eq!(map.terrain_count(), 1);
        assert_eq!(map.terrain_texture(3), Some("mud"));
        assert_eq!(map.terrain_zone(3), Some(2));
        assert_eq!(map.terrain_area(3), Some(6));
        assert_eq!(map.zone_associations(), vec![ZoneAssociation { terrain_id: 3, zone_id: 2 }]);
    }

    #[test]
    fn test_single_cell_map() {
        let mut map = GameMap::new();
        map.load_from_bytes(MapWriter::new(1).encode().unwrap().into_vec()).unwrap();
        assert_eq!(map.width(), 1);
        assert!(map.is_walkable(0, 0));
        assert!(!map.is_walkable(1, 0));
    }
}
