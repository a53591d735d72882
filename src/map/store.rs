use super::types::{compute_cell_id, MapCell, MAX_MAP_SIZE};

/// Square grid of decoded cells, stored row-major.
#[derive(Debug, Clone, Default)]
pub struct MapCellStore {
    width: i32,
    height: i32,
    cells: Vec<MapCell>,
}

impl MapCellStore {
    /// Allocate an empty `size` x `size` grid. Returns `None` if the size is
    /// outside `1..=MAX_MAP_SIZE`. Every cell is allocated up front; see
    /// [`MAX_MAP_SIZE`] for the cost at the upper bound.
    pub fn new(size: i32) -> Option<Self> {
        if size <= 0 || size > MAX_MAP_SIZE {
            return None;
        }
        let count = (size as usize) * (size as usize);
        Some(Self {
            width: size,
            height: size,
            cells: vec![MapCell::default(); count],
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn cell(&self, cell_id: i32) -> Option<&MapCell> {
        usize::try_from(cell_id).ok().and_then(|i| self.cells.get(i))
    }

    pub fn cell_mut(&mut self, cell_id: i32) -> Option<&mut MapCell> {
        usize::try_from(cell_id).ok().and_then(move |i| self.cells.get_mut(i))
    }

    pub fn cell_at(&self, x: i32, y: i32) -> Option<&MapCell> {
        if !self.contains(x, y) {
            return None;
        }
        self.cell(compute_cell_id(x, y, self.width)?)
    }

    pub fn cell_at_mut(&mut self, x: i32, y: i32) -> Option<&mut MapCell> {
        if !self.contains(x, y) {
            return None;
        }
        let id = compute_cell_id(x, y, self.width)?;
        self.cell_mut(id)
    }

    /// True iff the cell exists and is not flagged as blocked.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.cell_at(x, y).is_some_and(MapCell::is_walkable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &MapCell)> {
        self.cells.iter().enumerate().map(|(i, c)| (i as i32, c))
    }

    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_walkable()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::types::{compute_cell_pos, CellFlags};

    #[test]
    fn test_store_bounds() {
        assert!(MapCellStore::new(0).is_none());
        assert!(MapCellStore::new(-4).is_none());
        assert!(MapCellStore::new(MAX_MAP_SIZE + 1).is_none());

        let store = MapCellStore::new(1).unwrap();
        assert_eq!(store.width(), 1);
        assert_eq!(store.height(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_cell_at_out_of_range() {
        let store = MapCellStore::new(3).unwrap();
        assert!(store.cell_at(0, 0).is_some());
        assert!(store.cell_at(2, 2).is_some());
        assert!(store.cell_at(3, 0).is_none());
        assert!(store.cell_at(0, 3).is_none());
        assert!(store.cell_at(-1, 1).is_none());
        assert!(!store.is_walkable(-1, 0));
        assert!(!store.is_walkable(5, 5));
    }

    #[test]
    fn test_cell_size_matches_documented_cost() {
        assert!(std::mem::size_of::<MapCell>() <= 112);
    }

    #[test]
    fn test_walkability() {
        let mut store = MapCellStore::new(4).unwrap();
        store.cell_at_mut(1, 2).unwrap().flags = CellFlags::BLOCKED;

        assert!(!store.is_walkable(1, 2));
        assert!(store.is_walkable(2, 1));
        assert_eq!(store.blocked_count(), 1);

        let (id, _) = store.iter().find(|(_, c)| !c.is_walkable()).unwrap();
        assert_eq!(compute_cell_pos(id, store.width()), (1, 2));
    }
}
