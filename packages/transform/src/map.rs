//! # Position Maps
//!
//! A [`StepMap`] records exactly which ranges one step deleted and
//! inserted, as `(start, old size, new size)` triples. A [`Mapping`]
//! composes the maps of many steps and tracks mirrored inverse pairs so
//! that positions survive a delete-then-reinsert round trip (the shape
//! undo/redo and rebasing produce) without collapsing to the deletion
//! point.

use std::fmt;
use std::sync::Arc;

const DEL_BEFORE: u8 = 1;
const DEL_AFTER: u8 = 2;
const DEL_ACROSS: u8 = 4;
const DEL_SIDE: u8 = 8;

/// An exact pre-image of a mapped position: which triple it fell into and
/// the offset from that range's start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recover {
    index: usize,
    offset: usize,
}

impl Recover {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// The result of mapping a position, with deletion details and an
/// optional recovery value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapResult {
    pos: usize,
    del_info: u8,
    recover: Option<Recover>,
}

impl MapResult {
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Whether content on the associated side of the position was deleted
    pub fn deleted(&self) -> bool {
        self.del_info & DEL_SIDE > 0
    }

    pub fn deleted_before(&self) -> bool {
        self.del_info & (DEL_BEFORE | DEL_ACROSS) > 0
    }

    pub fn deleted_after(&self) -> bool {
        self.del_info & (DEL_AFTER | DEL_ACROSS) > 0
    }

    /// Whether the position sat strictly inside a deleted range
    pub fn deleted_across(&self) -> bool {
        self.del_info & DEL_ACROSS > 0
    }

    pub fn recover(&self) -> Option<Recover> {
        self.recover
    }
}

/// The positional delta induced by one step: an ordered list of
/// `(start, old size, new size)` triples. The `inverted` flag flips which
/// size is which, turning the map into its own inverse.
#[derive(Clone, PartialEq, Eq)]
pub struct StepMap {
    ranges: Arc<[usize]>,
    inverted: bool,
}

impl StepMap {
    /// Build a step map from flattened `(start, old, new)` triples sorted
    /// by start
    pub fn new(ranges: Vec<usize>) -> StepMap {
        debug_assert!(ranges.len() % 3 == 0, "ranges come in triples");
        StepMap {
            ranges: ranges.into(),
            inverted: false,
        }
    }

    pub fn empty() -> StepMap {
        StepMap::new(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn invert(&self) -> StepMap {
        StepMap {
            ranges: self.ranges.clone(),
            inverted: !self.inverted,
        }
    }

    fn old_index(&self) -> usize {
        if self.inverted {
            2
        } else {
            1
        }
    }

    fn new_index(&self) -> usize {
        if self.inverted {
            1
        } else {
            2
        }
    }

    /// Map a position through this step's changes. `assoc` (-1 or 1)
    /// decides which side the position sticks to when content is inserted
    /// or deleted around it.
    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        self.map_inner(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        self.map_inner(pos, assoc)
    }

    fn map_inner(&self, pos: usize, assoc: i8) -> MapResult {
        let mut diff: isize = 0;
        let (old_index, new_index) = (self.old_index(), self.new_index());
        let mut i = 0;
        while i < self.ranges.len() {
            let raw_start = self.ranges[i] as isize;
            let start = raw_start - if self.inverted { diff } else { 0 };
            if start > pos as isize {
                break;
            }
            let old_size = self.ranges[i + old_index];
            let new_size = self.ranges[i + new_index];
            let end = start + old_size as isize;
            if pos as isize <= end {
                let side = if old_size == 0 {
                    assoc
                } else if pos as isize == start {
                    -1
                } else if pos as isize == end {
                    1
                } else {
                    assoc
                };
                let result = start
                    + diff
                    + if side < 0 { 0 } else { new_size as isize };
                let recover_edge = if assoc < 0 { start } else { end };
                let recover = if pos as isize == recover_edge {
                    None
                } else {
                    Some(Recover {
                        index: i / 3,
                        offset: (pos as isize - start) as usize,
                    })
                };
                let mut del = if pos as isize == start {
                    DEL_AFTER
                } else if pos as isize == end {
                    DEL_BEFORE
                } else {
                    DEL_ACROSS
                };
                let off_edge = if assoc < 0 {
                    pos as isize != start
                } else {
                    pos as isize != end
                };
                if off_edge {
                    del |= DEL_SIDE;
                }
                return MapResult {
                    pos: result.max(0) as usize,
                    del_info: del,
                    recover,
                };
            }
            diff += new_size as isize - old_size as isize;
            i += 3;
        }
        MapResult {
            pos: (pos as isize + diff).max(0) as usize,
            del_info: 0,
            recover: None,
        }
    }

    /// Translate a recovery value back into a position in this map's
    /// output space
    pub fn recover(&self, recover: Recover) -> usize {
        let mut diff: isize = 0;
        if !self.inverted {
            for i in 0..recover.index {
                diff += self.ranges[i * 3 + 2] as isize - self.ranges[i * 3 + 1] as isize;
            }
        }
        (self.ranges[recover.index * 3] as isize + diff + recover.offset as isize) as usize
    }

    /// Whether the given position touches the range the recovery value
    /// points at
    pub fn touches(&self, pos: usize, recover: Recover) -> bool {
        let mut diff: isize = 0;
        let old_index = self.old_index();
        let mut i = 0;
        while i < self.ranges.len() {
            let start =
                self.ranges[i] as isize - if self.inverted { diff } else { 0 };
            if start > pos as isize {
                break;
            }
            let old_size = self.ranges[i + old_index];
            let end = start + old_size as isize;
            if pos as isize <= end && i == recover.index * 3 {
                return true;
            }
            diff += self.ranges[i + self.new_index()] as isize - old_size as isize;
            i += 3;
        }
        false
    }

    /// Call a function for each changed range, in pre- and post-step
    /// coordinates
    pub fn for_each(&self, mut f: impl FnMut(usize, usize, usize, usize)) {
        let (old_index, new_index) = (self.old_index(), self.new_index());
        let mut diff: isize = 0;
        let mut i = 0;
        while i < self.ranges.len() {
            let start = self.ranges[i] as isize;
            let old_start = start - if self.inverted { diff } else { 0 };
            let new_start = start + if self.inverted { 0 } else { diff };
            let old_size = self.ranges[i + old_index];
            let new_size = self.ranges[i + new_index];
            f(
                old_start as usize,
                (old_start + old_size as isize) as usize,
                new_start as usize,
                (new_start + new_size as isize) as usize,
            );
            diff += new_size as isize - old_size as isize;
            i += 3;
        }
    }
}

impl fmt::Debug for StepMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:?}",
            if self.inverted { "-" } else { "" },
            self.ranges
        )
    }
}

/// A composed sequence of step maps, optionally annotated with mirrored
/// inverse pairs. Maps positions across a whole span of edits.
#[derive(Clone, Debug, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
    mirror: Vec<(usize, usize)>,
    from: usize,
    to: usize,
}

impl Mapping {
    pub fn new() -> Mapping {
        Mapping::default()
    }

    pub fn from_maps(maps: Vec<StepMap>) -> Mapping {
        let to = maps.len();
        Mapping {
            maps,
            mirror: Vec::new(),
            from: 0,
            to,
        }
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// A view of this mapping restricted to a window of its maps
    pub fn slice(&self, from: usize, to: usize) -> Mapping {
        Mapping {
            maps: self.maps.clone(),
            mirror: self.mirror.clone(),
            from,
            to,
        }
    }

    /// A view starting at the given map index
    pub fn slice_from(&self, from: usize) -> Mapping {
        self.slice(from, self.maps.len())
    }

    /// Append a step map; returns its index
    pub fn append_map(&mut self, map: StepMap) -> usize {
        self.maps.push(map);
        self.to = self.maps.len();
        self.to - 1
    }

    /// Record that the maps at two indices are each other's inverse
    pub fn set_mirror(&mut self, n: usize, m: usize) {
        self.mirror.push((n, m));
    }

    pub fn get_mirror(&self, n: usize) -> Option<usize> {
        for &(a, b) in &self.mirror {
            if a == n {
                return Some(b);
            }
            if b == n {
                return Some(a);
            }
        }
        None
    }

    /// Append all maps of another mapping, preserving its mirror pairs
    pub fn append_mapping(&mut self, other: &Mapping) {
        let start_size = self.maps.len();
        for i in 0..other.maps.len() {
            let mirror = other.get_mirror(i);
            let index = self.append_map(other.maps[i].clone());
            if let Some(m) = mirror {
                if m < i {
                    self.set_mirror(index, start_size + m);
                }
            }
        }
    }

    /// Append the inverse of another mapping, mirroring its maps in
    /// reverse order
    pub fn append_mapping_inverted(&mut self, other: &Mapping) {
        let total_size = self.maps.len() + other.maps.len();
        for i in (0..other.maps.len()).rev() {
            let mirror = other.get_mirror(i);
            let index = self.append_map(other.maps[i].invert());
            if let Some(m) = mirror {
                if m > i {
                    self.set_mirror(index, total_size - m - 1);
                }
            }
        }
    }

    /// The inverse of this mapping
    pub fn invert(&self) -> Mapping {
        let mut inverse = Mapping::new();
        inverse.append_mapping_inverted(self);
        inverse
    }

    /// Map a position through every step map in the window
    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        if self.mirror.is_empty() {
            let mut pos = pos;
            for map in &self.maps[self.from..self.to] {
                pos = map.map(pos, assoc);
            }
            return pos;
        }
        self.map_inner(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        self.map_inner(pos, assoc)
    }

    fn map_inner(&self, pos: usize, assoc: i8) -> MapResult {
        let mut del_info = 0;
        let mut pos = pos;
        let mut i = self.from;
        while i < self.to {
            let map = &self.maps[i];
            let result = map.map_result(pos, assoc);
            if let Some(recover) = result.recover {
                // a deleted range whose deleting map has a mirrored
                // re-insertion later: jump straight to the recovered
                // position instead of collapsing to the deletion point
                if let Some(corr) = self.get_mirror(i) {
                    if corr > i && corr < self.to {
                        pos = self.maps[corr].recover(recover);
                        i = corr + 1;
                        continue;
                    }
                }
            }
            del_info |= result.del_info;
            pos = result.pos;
            i += 1;
        }
        MapResult {
            pos,
            del_info,
            recover: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Mapping, StepMap};

    #[test]
    fn maps_through_an_insertion() {
        // two characters inserted at position 2
        let map = StepMap::new(vec![2, 0, 2]);
        assert_eq!(map.map(0, 1), 0);
        assert_eq!(map.map(4, 1), 6);
        assert_eq!(map.map(2, -1), 2);
        assert_eq!(map.map(2, 1), 4);
    }

    #[test]
    fn maps_through_a_deletion() {
        // two characters deleted at position 2
        let map = StepMap::new(vec![2, 2, 0]);
        assert_eq!(map.map(1, 1), 1);
        assert_eq!(map.map(3, 1), 2);
        assert_eq!(map.map(3, -1), 2);
        assert_eq!(map.map(6, 1), 4);
        let result = map.map_result(3, 1);
        assert!(result.deleted());
        assert!(result.deleted_across());
        let edge = map.map_result(2, -1);
        assert!(!edge.deleted());
    }

    #[test]
    fn inverted_map_undoes_mapping() {
        let map = StepMap::new(vec![2, 2, 4]);
        let inverse = map.invert();
        assert_eq!(inverse.map(map.map(1, 1), 1), 1);
        assert_eq!(inverse.map(map.map(2, -1), -1), 2);
        assert_eq!(inverse.map(map.map(7, 1), 1), 7);
    }

    #[test]
    fn recover_restores_exact_preimage() {
        let map = StepMap::new(vec![2, 4, 0]);
        let result = map.map_result(4, 1);
        let recover = result.recover().expect("position inside deleted range");
        assert_eq!(map.invert().recover(recover), 4);
    }

    #[test]
    fn mirror_jump_preserves_deleted_positions() {
        // a deletion followed by its exact inverse: mapping through both
        // must round-trip positions inside the deleted range
        let del = StepMap::new(vec![2, 4, 0]);
        let ins = del.invert();
        let mut mapping = Mapping::new();
        let a = mapping.append_map(del);
        let b = mapping.append_map(ins);
        mapping.set_mirror(a, b);
        for pos in 0..=8 {
            assert_eq!(mapping.map(pos, 1), pos);
        }
    }

    #[test]
    fn mapping_composition_matches_sequential_mapping() {
        let m1 = vec![StepMap::new(vec![1, 0, 3]), StepMap::new(vec![4, 2, 0])];
        let m2 = vec![StepMap::new(vec![0, 1, 1]), StepMap::new(vec![3, 0, 2])];

        let mut first = Mapping::from_maps(m1.clone());
        let second = Mapping::from_maps(m2.clone());
        let mut composed = first.clone();
        composed.append_mapping(&second);

        for assoc in [-1i8, 1] {
            for pos in 0..=10 {
                let mut sequential = pos;
                for map in m1.iter().chain(m2.iter()) {
                    sequential = map.map(sequential, assoc);
                }
                assert_eq!(composed.map(pos, assoc), sequential);
            }
        }
        // appending to the original leaves earlier maps untouched
        first.append_mapping(&second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn invert_round_trips_positions() {
        let mut mapping = Mapping::new();
        mapping.append_map(StepMap::new(vec![2, 0, 4]));
        mapping.append_map(StepMap::new(vec![8, 2, 0]));
        let inverse = mapping.invert();
        // positions that survive both changes round-trip exactly
        for pos in [0, 1, 2, 7] {
            let there = mapping.map(pos, 1);
            assert_eq!(inverse.map(there, 1), pos);
        }
    }
}
