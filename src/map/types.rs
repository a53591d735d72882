use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::Serialize;

/// Texture slots stacked on every cell.
pub const NUM_LAYERS: usize = 4;

/// Largest accepted edge length; maps are always square.
///
/// The cell grid is allocated in full when the header is read. A `MapCell`
/// is about 104 bytes on 64-bit targets, so a map at this size takes roughly
/// 110 MB before any record is decoded.
pub const MAX_MAP_SIZE: i32 = 1024;

/// Shared texture name. Every layer referencing the same dictionary entry
/// holds a clone of the same allocation.
pub type TextureRef = Arc<str>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        const BLOCKED = 0x01;
    }
}

impl CellFlags {
    pub fn is_blocked(self) -> bool {
        self.contains(CellFlags::BLOCKED)
    }
}

/// One textured layer of a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    pub texture: TextureRef,
    pub scale: f32,
}

impl LayerEntry {
    pub fn new(texture: TextureRef, scale: f32) -> Self {
        Self { texture, scale }
    }

    pub fn name(&self) -> &str {
        &self.texture
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapCell {
    pub flags: CellFlags,
    pub layers: [Option<LayerEntry>; NUM_LAYERS],
}

impl MapCell {
    pub fn is_walkable(&self) -> bool {
        !self.flags.is_blocked()
    }

    pub fn layer(&self, index: usize) -> Option<&LayerEntry> {
        self.layers.get(index).and_then(Option::as_ref)
    }

    pub fn has_texture(&self) -> bool {
        self.layers.iter().any(Option::is_some)
    }

    /// Build a cell from the per-layer arrays handed to listeners.
    pub fn from_layers(
        flags: u8,
        textures: &[Option<TextureRef>; NUM_LAYERS],
        scales: &[f32; NUM_LAYERS],
    ) -> Self {
        let mut cell = MapCell {
            flags: CellFlags::from_bits_retain(flags),
            ..Default::default()
        };
        for (slot, (texture, &scale)) in cell.layers.iter_mut().zip(textures.iter().zip(scales)) {
            *slot = texture.clone().map(|texture| LayerEntry::new(texture, scale));
        }
        cell
    }
}

impl fmt::Display for MapCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flags={:#04x}", self.flags.bits())?;
        for (i, layer) in self.layers.iter().enumerate() {
            if let Some(layer) = layer {
                write!(f, " L{}={}x{}", i, layer.name(), layer.scale)?;
            }
        }
        Ok(())
    }
}

/// Ordered string table referenced by index from later records.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: Vec<TextureRef>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, name: impl Into<TextureRef>) {
        self.entries.push(name.into());
    }

    /// Look up an entry; negative and past-the-end indices yield `None`.
    pub fn get(&self, index: i32) -> Option<&TextureRef> {
        usize::try_from(index).ok().and_then(|i| self.entries.get(i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureRef> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerrainAssociation {
    pub terrain_id: i32,
    pub texture_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneAssociation {
    pub terrain_id: i32,
    pub zone_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AreaAssociation {
    pub terrain_id: i32,
    pub area_id: i32,
}

/// Linear cell id for `(x, y)` on a grid `width` cells wide, or `None` if
/// the id does not fit in an `i32`.
pub fn compute_cell_id(x: i32, y: i32, width: i32) -> Option<i32> {
    y.checked_mul(width)?.checked_add(x)
}

/// Inverse of [`compute_cell_id`]. Returns `(0, 0)` for a non-positive width.
pub fn compute_cell_pos(id: i32, width: i32) -> (i32, i32) {
    if width <= 0 {
        return (0, 0);
    }
    (id % width, id / width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_id_inverse() {
        for width in [1, 2, 7, 64] {
            for y in 0..width {
                for x in 0..width {
                    let id = compute_cell_id(x, y, width).unwrap();
                    assert_eq!(compute_cell_pos(id, width), (x, y));
                }
            }
        }
    }

    #[test]
    fn test_cell_id_inverse_wide_grid() {
        let width = 46_340;
        for (x, y) in [(0, 0), (width - 1, 0), (0, width - 1), (width - 1, width - 1)] {
            let id = compute_cell_id(x, y, width).unwrap();
            assert_eq!(compute_cell_pos(id, width), (x, y));
        }
    }

    #[test]
    fn test_cell_id_overflow() {
        let width = 50_000;
        assert_eq!(compute_cell_id(width - 1, width - 1, width), None);
        assert_eq!(compute_cell_id(i32::MAX, 0, 1), Some(i32::MAX));
        assert_eq!(compute_cell_id(1, i32::MAX, 1), None);
    }

    #[test]
    fn test_cell_pos_zero_width() {
        assert_eq!(compute_cell_pos(17, 0), (0, 0));
        assert_eq!(compute_cell_pos(17, -3), (0, 0));
    }

    #[test]
    fn test_walkable_flags() {
        let open = MapCell::default();
        assert!(open.is_walkable());

        let blocked = MapCell { flags: CellFlags::from_bits_retain(0x01), ..Default::default() };
        assert!(!blocked.is_walkable());

        // unknown bits are kept but do not block
        let other = MapCell { flags: CellFlags::from_bits_retain(0x80), ..Default::default() };
        assert!(other.is_walkable());
        assert_eq!(other.flags.bits(), 0x80);
    }

    #[test]
    fn test_dictionary_bounds() {
        let mut dict = Dictionary::new();
        dict.push("grass");
        dict.push("sand");
        assert_eq!(dict.get(0).map(|s| &**s), Some("grass"));
        assert_eq!(dict.get(1).map(|s| &**s), Some("sand"));
        assert!(dict.get(2).is_none());
        assert!(dict.get(-1).is_none());
    }

    #[test]
    fn test_from_layers_shares_texture() {
        let grass: TextureRef = Arc::from("grass");
        let textures = [Some(grass.clone()), None, Some(grass.clone()), None];
        let scales = [1.0, 1.0, 0.5, 1.0];
        let cell = MapCell::from_layers(0x01, &textures, &scales);

        assert!(!cell.is_walkable());
        assert_eq!(cell.layer(0).map(LayerEntry::name), Some("grass"));
        assert!(cell.layer(1).is_none());
        assert_eq!(cell.layer(2).map(|l| l.scale), Some(0.5));
        assert!(Arc::ptr_eq(&cell.layer(0).unwrap().texture, &grass));
        assert!(cell.layer(NUM_LAYERS).is_none());
    }
}
