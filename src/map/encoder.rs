use std::path::Path;

use crate::codec::SerializationBuffer;
use crate::error::Result;

use super::types::NUM_LAYERS;

/// One cell record exactly as it is written to disk. Indices are not
/// validated, so malformed files can be produced on purpose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellRecord {
    pub cell_id: i32,
    pub flags: u8,
    pub layers: [Option<(i32, f32)>; NUM_LAYERS],
}

impl CellRecord {
    pub fn new(cell_id: i32, flags: u8) -> Self {
        Self { cell_id, flags, layers: [None; NUM_LAYERS] }
    }

    /// Set `layer` to reference texture `tex_index`. Layers past
    /// `NUM_LAYERS` are ignored.
    pub fn with_layer(mut self, layer: usize, tex_index: i32, scale: f32) -> Self {
        if let Some(slot) = self.layers.get_mut(layer) {
            *slot = Some((tex_index, scale));
        }
        self
    }
}

/// Builds a map file section by section.
#[derive(Debug, Clone, Default)]
pub struct MapWriter {
    map_size: i32,
    textures: Vec<String>,
    cells: Vec<CellRecord>,
    terrain_textures: Vec<String>,
    terrains: Vec<(i32, i32)>,
    zones: Vec<(i32, i32)>,
    areas: Vec<(i32, i32)>,
}

impl MapWriter {
    pub fn new(map_size: i32) -> Self {
        Self { map_size, ..Default::default() }
    }

    /// Add a texture name and return its dictionary index.
    pub fn texture(&mut self, name: impl Into<String>) -> i32 {
        self.textures.push(name.into());
        self.textures.len() as i32 - 1
    }

    pub fn cell(&mut self, record: CellRecord) -> &mut Self {
        self.cells.push(record);
        self
    }

    /// Add a terrain texture name and return its dictionary index.
    pub fn terrain_texture(&mut self, name: impl Into<String>) -> i32 {
        self.terrain_textures.push(name.into());
        self.terrain_textures.len() as i32 - 1
    }

    pub fn terrain(&mut self, terrain_id: i32, tex_index: i32) -> &mut Self {
        self.terrains.push((terrain_id, tex_index));
        self
    }

    pub fn zone(&mut self, terrain_id: i32, zone_id: i32) -> &mut Self {
        self.zones.push((terrain_id, zone_id));
        self
    }

    pub fn area(&mut self, terrain_id: i32, area_id: i32) -> &mut Self {
        self.areas.push((terrain_id, area_id));
        self
    }

    /// Serialize the map. The zone section is written whenever zones or
    /// areas exist (areas can only follow it); the area section only when
    /// areas exist.
    pub fn encode(&self) -> Result<SerializationBuffer> {
        let mut buf = SerializationBuffer::new();
        buf.put(self.map_size);

        write_strings(&mut buf, &self.textures)?;

        buf.put(self.cells.len() as i32);
        for cell in &self.cells {
            buf.put(cell.cell_id);
            buf.put(cell.flags);
            for layer in &cell.layers {
                match *layer {
                    Some((tex_index, scale)) => {
                        buf.put(true);
                        buf.put(tex_index);
                        buf.put(scale);
                    }
                    None => buf.put(false),
                }
            }
        }

        write_strings(&mut buf, &self.terrain_textures)?;
        write_pairs(&mut buf, &self.terrains);

        if !self.zones.is_empty() || !self.areas.is_empty() {
            write_pairs(&mut buf, &self.zones);
        }
        if !self.areas.is_empty() {
            write_pairs(&mut buf, &self.areas);
        }

        Ok(buf)
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.encode()?.write_file(path)
    }
}

fn write_strings(buf: &mut SerializationBuffer, strings: &[String]) -> Result<()> {
    buf.put(strings.len() as i32);
    for s in strings {
        buf.put_string(s)?;
    }
    Ok(())
}

fn write_pairs(buf: &mut SerializationBuffer, pairs: &[(i32, i32)]) {
    buf.put(pairs.len() as i32);
    for &(a, b) in pairs {
        buf.put(a);
        buf.put(b);
    }
}
