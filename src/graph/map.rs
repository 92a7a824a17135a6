use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::VertexIds;
use crate::model::sorted_set::{Keyed, SortedSet};

/// A map vertex. Vertices with a non-empty `city` label seed a city when the
/// map is instantiated into a region.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vertex {
    pub id: u64,
    #[serde(default)]
    pub x: u64,
    #[serde(default)]
    pub y: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub city: String,
}

impl Keyed for Vertex {
    type Key = u64;

    fn key(&self) -> &u64 {
        &self.id
    }
}

/// A directed edge, ordered by `(src, dst)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Road {
    pub src: u64,
    pub dst: u64,
}

impl Road {
    pub fn new(src: u64, dst: u64) -> Self {
        Self { src, dst }
    }
}

impl Keyed for Road {
    type Key = Road;

    fn key(&self) -> &Road {
        self
    }
}

/// A directed transport graph with its all-pairs next-hop index.
///
/// The index is rebuilt by [`Map::rehash`] after every structural change, so
/// `path_next_step` is a single lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Map {
    #[serde(rename = "id")]
    pub name: String,
    #[serde(default)]
    pub sites: SortedSet<Vertex>,
    #[serde(default)]
    pub roads: SortedSet<Road>,
    #[serde(skip)]
    next: BTreeMap<(u64, u64), u64>,
}

impl Keyed for Map {
    type Key = String;

    fn key(&self) -> &String {
        &self.name
    }
}

impl Map {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a map description, sort it, index it and validate it.
    pub fn from_reader(reader: impl Read) -> std::result::Result<Map, serde_json::Error> {
        let mut map: Map = serde_json::from_reader(reader)?;
        map.sites.sort();
        map.roads.sort();
        map.rehash();
        Ok(map)
    }

    pub fn cell_get(&self, id: u64) -> Option<&Vertex> {
        self.sites.get(&id)
    }

    pub fn cell_has(&self, id: u64) -> bool {
        self.sites.has(&id)
    }

    pub fn road_has(&self, src: u64, dst: u64) -> bool {
        self.roads.has(&Road::new(src, dst))
    }

    /// Every `w` such that `(v, w)` is a road, in ascending order.
    pub fn cell_adjacency(&self, v: u64) -> Vec<u64> {
        self.roads
            .slice(&Road::new(v, 0), usize::MAX)
            .iter()
            .take_while(|r| r.src == v)
            .map(|r| r.dst)
            .collect()
    }

    /// Vertices carrying a city label, in vertex order.
    pub fn seed_cities(&self) -> Vec<(u64, String)> {
        self.sites
            .iter()
            .filter(|v| !v.city.is_empty())
            .map(|v| (v.id, v.city.clone()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    /// First hop of a shortest path from `src` to `dst`.
    pub fn path_next_step(&self, src: u64, dst: u64) -> Result<u64> {
        if src == 0 || dst == 0 {
            return Err(Error::InvalidArgument(format!(
                "zero cell in route request {src} -> {dst}"
            )));
        }
        if src == dst {
            return Err(Error::InvalidArgument(format!(
                "route request from {src} to itself"
            )));
        }
        self.next.get(&(src, dst)).copied().ok_or_else(|| Error::NoRoute {
            map: self.name.clone(),
            src,
            dst,
        })
    }

    /// Full path from `src` (excluded) to `dst` (included), following the index.
    pub fn path(&self, src: u64, dst: u64) -> Result<Vec<u64>> {
        let mut out = Vec::new();
        let mut cur = src;
        while cur != dst {
            cur = self.path_next_step(cur, dst)?;
            out.push(cur);
            if out.len() > self.sites.len() {
                return Err(Error::Internal(format!(
                    "next-hop loop on map '{}' between {src} and {dst}",
                    self.name
                )));
            }
        }
        Ok(out)
    }

    /// Rebuild the next-hop index. Ties resolve in ascending adjacency order.
    pub fn rehash(&mut self) {
        let adjacency = self.adjacency_lists();
        self.next = index_from(&adjacency);
    }

    fn adjacency_lists(&self) -> BTreeMap<u64, Vec<u64>> {
        let mut adjacency: BTreeMap<u64, Vec<u64>> =
            self.sites.keys().map(|id| (*id, Vec::new())).collect();
        for road in self.roads.iter() {
            adjacency.entry(road.src).or_default().push(road.dst);
        }
        adjacency
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Structural checks plus strong connectivity when there is more than one
    /// vertex. Reports the first failure.
    pub fn check(&self) -> Result<()> {
        let invalid = |msg: String| Error::NotValid(format!("map '{}': {msg}", self.name));
        if self.name.is_empty() {
            return Err(Error::NotValid("map without a name".to_string()));
        }
        self.sites.check().map_err(|e| invalid(e.to_string()))?;
        self.roads.check().map_err(|e| invalid(e.to_string()))?;
        if self.sites.has(&0) {
            return Err(invalid("vertex with id 0".to_string()));
        }
        for road in self.roads.iter() {
            if road.src == road.dst {
                return Err(invalid(format!("loop on {}", road.src)));
            }
            if !self.cell_has(road.src) || !self.cell_has(road.dst) {
                return Err(invalid(format!(
                    "dangling road {} -> {}",
                    road.src, road.dst
                )));
            }
        }
        if self.sites.len() > 1 {
            for src in self.sites.keys() {
                for dst in self.sites.keys() {
                    if src != dst && !self.next.contains_key(&(*src, *dst)) {
                        return Err(invalid(format!("no route {src} -> {dst}")));
                    }
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    pub fn cell_add(&mut self, vertex: Vertex) -> Result<()> {
        if vertex.id == 0 {
            return Err(Error::InvalidArgument("vertex id must be non-zero".to_string()));
        }
        if self.cell_has(vertex.id) {
            return Err(Error::already_exists("vertex", vertex.id));
        }
        self.sites.add(vertex);
        self.rehash();
        Ok(())
    }

    pub fn road_add(&mut self, src: u64, dst: u64) -> Result<()> {
        if src == dst {
            return Err(Error::InvalidArgument(format!("loop on {src}")));
        }
        for cell in [src, dst] {
            if !self.cell_has(cell) {
                return Err(Error::not_found("vertex", cell));
            }
        }
        if self.road_has(src, dst) {
            return Err(Error::already_exists("road", format!("{src}->{dst}")));
        }
        self.roads.add(Road::new(src, dst));
        self.rehash();
        Ok(())
    }

    pub fn road_remove(&mut self, src: u64, dst: u64) -> Result<()> {
        self.roads
            .remove(&Road::new(src, dst))
            .ok_or_else(|| Error::not_found("road", format!("{src}->{dst}")))?;
        self.rehash();
        Ok(())
    }

    /// Replace the road `src -> dst` by a chain of `segments` roads through
    /// freshly allocated vertices placed along the segment. Returns the new
    /// vertex IDs in path order.
    ///
    /// # Panics
    ///
    /// Panics if `segments < 2`.
    pub fn split_road(&mut self, src: u64, dst: u64, segments: usize) -> Result<Vec<u64>> {
        assert!(segments >= 2, "split_road needs at least 2 segments, got {segments}");
        let (a, b) = match (self.cell_get(src), self.cell_get(dst)) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => return Err(Error::not_found("road", format!("{src}->{dst}"))),
        };
        if self.roads.remove(&Road::new(src, dst)).is_none() {
            return Err(Error::not_found("road", format!("{src}->{dst}")));
        }

        let mut ids = VertexIds::above(self.sites.keys().copied());
        let mut created = Vec::with_capacity(segments - 1);
        let lerp = |from: u64, to: u64, i: usize| -> u64 {
            let t = i as f64 / segments as f64;
            (from as f64 + (to as f64 - from as f64) * t).round() as u64
        };
        let mut prev = src;
        for i in 1..segments {
            let id = ids.take();
            self.sites.add(Vertex {
                id,
                x: lerp(a.x, b.x, i),
                y: lerp(a.y, b.y, i),
                city: String::new(),
            });
            self.roads.add(Road::new(prev, id));
            created.push(id);
            prev = id;
        }
        self.roads.add(Road::new(prev, dst));
        self.rehash();
        Ok(created)
    }
}

/// BFS from every vertex, recording the first hop out of the source for
/// each vertex the first time it is reached.
fn index_from(adjacency: &BTreeMap<u64, Vec<u64>>) -> BTreeMap<(u64, u64), u64> {
    let mut next = BTreeMap::new();
    let empty = Vec::new();
    for &start in adjacency.keys() {
        let mut visited = BTreeSet::new();
        visited.insert(start);
        let mut queue: VecDeque<(u64, u64)> = VecDeque::new(); // (current, first_step)
        for &adj in adjacency.get(&start).unwrap_or(&empty) {
            if visited.insert(adj) {
                next.insert((start, adj), adj);
                queue.push_back((adj, adj));
            }
        }
        while let Some((current, first_step)) = queue.pop_front() {
            for &adj in adjacency.get(&current).unwrap_or(&empty) {
                if visited.insert(adj) {
                    next.insert((start, adj), first_step);
                    queue.push_back((adj, first_step));
                }
            }
        }
    }
    next
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::error::ErrorKind;

    // -- helpers --

    fn vertex(id: u64, city: &str) -> Vertex {
        Vertex {
            id,
            x: id * 10,
            y: 0,
            city: city.to_string(),
        }
    }

    /// 1 <-> 2 <-> 3, plus a shortcut 1 -> 3 when `shortcut` is set.
    fn line(shortcut: bool) -> Map {
        let mut map = Map::new("line");
        for id in 1..=3 {
            map.sites.add(vertex(id, if id == 2 { "" } else { "town" }));
        }
        for (s, d) in [(1, 2), (2, 1), (2, 3), (3, 2)] {
            map.roads.add(Road::new(s, d));
        }
        if shortcut {
            map.roads.add(Road::new(1, 3));
        }
        map.rehash();
        map
    }

    #[test]
    fn next_step_follows_shortest_path() {
        let map = line(false);
        assert_eq!(map.path_next_step(1, 3).unwrap(), 2);
        assert_eq!(map.path_next_step(3, 1).unwrap(), 2);
        assert_eq!(map.path_next_step(2, 3).unwrap(), 3);
        assert_eq!(map.path(1, 3).unwrap(), vec![2, 3]);
        assert_eq!(line(true).path_next_step(1, 3).unwrap(), 3);
    }

    #[test]
    fn next_step_rejects_degenerate_requests() {
        let map = line(false);
        assert_eq!(map.path_next_step(1, 1).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(map.path_next_step(0, 1).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(map.path_next_step(1, 9).unwrap_err().kind(), ErrorKind::NoRoute);
    }

    #[test]
    fn adjacency_is_sorted_by_destination() {
        let map = line(true);
        assert_eq!(map.cell_adjacency(1), vec![2, 3]);
        assert_eq!(map.cell_adjacency(2), vec![1, 3]);
        assert!(map.cell_adjacency(7).is_empty());
    }

    #[test]
    fn check_accepts_strongly_connected_map() {
        assert!(line(false).check().is_ok());
    }

    #[test]
    fn check_reports_unreachable_pair() {
        let mut map = line(false);
        map.road_remove(2, 3).unwrap();
        let err = map.check().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotValid);
        assert!(err.to_string().contains("no route 1 -> 3"), "{err}");
    }

    #[test]
    fn check_reports_structural_faults() {
        let mut unnamed = line(false);
        unnamed.name.clear();
        assert!(unnamed.check().is_err());

        let mut dangling = line(false);
        dangling.roads.add(Road::new(3, 8));
        assert!(dangling.check().unwrap_err().to_string().contains("dangling"));

        let mut looped = line(false);
        looped.roads.add(Road::new(2, 2));
        assert!(looped.check().unwrap_err().to_string().contains("loop"));

        let mut dup = line(false);
        dup.roads.add(Road::new(1, 2));
        assert!(dup.check().is_err());
    }

    #[test]
    fn single_vertex_map_is_valid() {
        let mut map = Map::new("solo");
        map.cell_add(vertex(1, "capital")).unwrap();
        assert!(map.check().is_ok());
    }

    #[test]
    fn editing_rebuilds_the_index() {
        let mut map = line(false);
        map.cell_add(vertex(4, "")).unwrap();
        assert!(map.path_next_step(1, 4).is_err());
        map.road_add(3, 4).unwrap();
        assert_eq!(map.path(1, 4).unwrap(), vec![2, 3, 4]);
        assert_eq!(map.road_add(3, 4).unwrap_err().kind(), ErrorKind::AlreadyExists);
        assert_eq!(map.road_add(3, 3).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(map.road_add(3, 99).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(map.cell_add(vertex(4, "")).unwrap_err().kind(), ErrorKind::AlreadyExists);
        assert_eq!(map.road_remove(4, 3).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn split_road_inserts_a_chain() {
        let mut map = line(false);
        let created = map.split_road(1, 2, 3).unwrap();
        assert_eq!(created, vec![4, 5]);
        assert!(!map.road_has(1, 2));
        assert!(map.road_has(1, 4) && map.road_has(4, 5) && map.road_has(5, 2));
        assert_eq!(map.path(1, 2).unwrap(), vec![4, 5, 2]);
        // back road untouched
        assert_eq!(map.path(2, 1).unwrap(), vec![1]);
        assert_eq!(map.cell_get(4).unwrap().x, 13);
        assert!(map.check().is_ok());
    }

    #[test]
    #[should_panic(expected = "at least 2 segments")]
    fn split_road_panics_below_two_segments() {
        let mut map = line(false);
        let _ = map.split_road(1, 2, 1);
    }

    #[test]
    fn ties_go_to_the_lowest_neighbour() {
        let mut map = Map::new("diamond");
        for id in 1..=4 {
            map.sites.add(vertex(id, ""));
        }
        for (s, d) in [(1, 2), (1, 3), (2, 4), (3, 4), (4, 1)] {
            map.roads.add(Road::new(s, d));
        }
        map.rehash();
        assert_eq!(map.path_next_step(1, 4).unwrap(), 2);
        assert_eq!(map.path(1, 4).unwrap().len(), 2);
    }

    #[test]
    fn loads_from_json_description() {
        let json = r#"{
            "id": "calaquyr",
            "sites": [{"id": 2, "x": 5, "y": 5}, {"id": 1, "x": 0, "y": 0, "city": "Alpha"}],
            "roads": [{"src": 2, "dst": 1}, {"src": 1, "dst": 2}]
        }"#;
        let map = Map::from_reader(json.as_bytes()).unwrap();
        assert_eq!(map.name, "calaquyr");
        assert!(map.check().is_ok());
        assert_eq!(map.seed_cities(), vec![(1, "Alpha".to_string())]);
        assert_eq!(map.path_next_step(2, 1).unwrap(), 1);
    }
}
