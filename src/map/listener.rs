use super::types::{TextureRef, NUM_LAYERS};

/// Callbacks fired by the decoder while a map is being read.
///
/// Calls arrive synchronously in file order:
/// `started_loading`, `on_resize`, `on_cell_data_loaded`*,
/// `on_finished_loading_cells`, `on_terrain_texture_loaded`*,
/// `on_terrain_zone_loaded`*, `on_terrain_area_loaded`*, `finished_loading`.
///
/// A load that fails on the header stops after `started_loading`.
/// All methods default to no-ops.
pub trait MapLoadListener {
    fn started_loading(&mut self) {}

    fn on_resize(&mut self, _width: i32, _height: i32) {}

    /// `scales` holds 1.0 for layers without a texture.
    fn on_cell_data_loaded(
        &mut self,
        _cell_id: i32,
        _flags: u8,
        _textures: &[Option<TextureRef>; NUM_LAYERS],
        _scales: &[f32; NUM_LAYERS],
    ) {
    }

    fn on_finished_loading_cells(&mut self) {}

    fn on_terrain_texture_loaded(&mut self, _terrain_id: i32, _name: &str) {}

    fn on_terrain_zone_loaded(&mut self, _terrain_id: i32, _zone_id: i32) {}

    fn on_terrain_area_loaded(&mut self, _terrain_id: i32, _area_id: i32) {}

    fn finished_loading(&mut self) {}
}

/// Listener that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl MapLoadListener for NullListener {}
