/*
Routing Graph
=============

A small directed graph over a fixed node id space:

    0           the input node
    1 ..= 12    delay bands
    13          the output node

Only bands in the active set participate; inactive bands are neither
scheduled nor connectable. The processing order is a Kahn topological sort,
rebuilt eagerly on every mutation so the audio thread can walk a ready-made
order without ever sorting mid-block. Cycle detection is a colored DFS usable
both on the live graph and on a hypothetical graph with one extra edge, which
is how editors veto a connection before committing it.

The per-band internal feedback loop is an intentional cycle inside one node
and is invisible to this graph; only inter-node routing is checked.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::NUM_BANDS;

/// Id of the input node.
pub const INPUT_NODE: usize = 0;
/// Id of the output node, one past the last band.
pub const OUTPUT_NODE: usize = NUM_BANDS + 1;

/// A directed edge between two nodes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub source: usize,
    pub dest: usize,
}

/// Serializable snapshot of the full routing topology.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutingState {
    pub connections: Vec<Connection>,
    pub active_bands: Vec<usize>,
}

/// Connection topology with eager topological scheduling.
pub struct RoutingGraph {
    connections: Vec<Connection>,
    processing_order: Vec<usize>,
    active_bands: BTreeSet<usize>,
}

impl RoutingGraph {
    /// A fresh graph: all bands active, a single Input -> Output edge.
    pub fn new() -> Self {
        let mut graph = Self {
            connections: vec![Connection {
                source: INPUT_NODE,
                dest: OUTPUT_NODE,
            }],
            processing_order: Vec::new(),
            active_bands: (1..=NUM_BANDS).collect(),
        };
        graph.rebuild_processing_order();
        graph
    }

    /// Add an edge. Returns false on a self-loop, an invalid endpoint, an
    /// inactive band, or a duplicate. Cycles are NOT rejected here; callers
    /// check [`would_create_cycle`](Self::would_create_cycle) first.
    pub fn connect(&mut self, source: usize, dest: usize) -> bool {
        if source == dest {
            return false;
        }
        if dest == INPUT_NODE || source == OUTPUT_NODE {
            return false;
        }
        if !self.is_valid_endpoint(source) || !self.is_valid_endpoint(dest) {
            return false;
        }
        if self.connections.iter().any(|c| c.source == source && c.dest == dest) {
            return false;
        }

        self.connections.push(Connection { source, dest });
        self.rebuild_processing_order();
        true
    }

    /// Remove an edge. Returns false if it was not present.
    pub fn disconnect(&mut self, source: usize, dest: usize) -> bool {
        let before = self.connections.len();
        self.connections
            .retain(|c| !(c.source == source && c.dest == dest));

        if self.connections.len() != before {
            self.rebuild_processing_order();
            true
        } else {
            false
        }
    }

    /// Remove every edge touching a node.
    pub fn disconnect_all(&mut self, node: usize) {
        self.connections
            .retain(|c| c.source != node && c.dest != node);
        self.rebuild_processing_order();
    }

    /// Reset to the default state: all bands active, Input -> Output only.
    pub fn clear(&mut self) {
        self.connections.clear();
        self.connections.push(Connection {
            source: INPUT_NODE,
            dest: OUTPUT_NODE,
        });
        self.active_bands = (1..=NUM_BANDS).collect();
        self.rebuild_processing_order();
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Sources feeding into a node.
    pub fn inputs_for(&self, node: usize) -> Vec<usize> {
        self.connections
            .iter()
            .filter(|c| c.dest == node)
            .map(|c| c.source)
            .collect()
    }

    /// Destinations a node feeds into.
    pub fn outputs_for(&self, node: usize) -> Vec<usize> {
        self.connections
            .iter()
            .filter(|c| c.source == node)
            .map(|c| c.dest)
            .collect()
    }

    /// Topologically sorted node ids, rebuilt on every mutation.
    pub fn processing_order(&self) -> &[usize] {
        &self.processing_order
    }

    /// True if adding `source -> dest` would close a directed loop.
    pub fn would_create_cycle(&self, source: usize, dest: usize) -> bool {
        let mut adjacency = self.adjacency();
        adjacency.entry(source).or_default().push(dest);
        has_cycle(&adjacency)
    }

    pub fn has_cycles(&self) -> bool {
        has_cycle(&self.adjacency())
    }

    // ---- active-band management ----

    /// Activate a band id. False if out of range or already active.
    pub fn add_band(&mut self, band: usize) -> bool {
        if !(1..=NUM_BANDS).contains(&band) {
            return false;
        }
        self.active_bands.insert(band)
    }

    /// Deactivate a band, disconnecting every edge that touches it.
    pub fn remove_band(&mut self, band: usize) -> bool {
        if !self.active_bands.remove(&band) {
            return false;
        }
        self.disconnect_all(band);
        true
    }

    pub fn is_band_active(&self, band: usize) -> bool {
        self.active_bands.contains(&band)
    }

    pub fn active_band_count(&self) -> usize {
        self.active_bands.len()
    }

    /// Active band ids in ascending order.
    pub fn active_bands(&self) -> Vec<usize> {
        self.active_bands.iter().copied().collect()
    }

    /// Replace the active set wholesale. Out-of-range ids are dropped and
    /// edges touching newly inactive bands are removed.
    pub fn set_active_bands(&mut self, bands: &[usize]) {
        self.active_bands = bands
            .iter()
            .copied()
            .filter(|band| (1..=NUM_BANDS).contains(band))
            .collect();

        let active = &self.active_bands;
        let valid =
            |node: usize| node == INPUT_NODE || node == OUTPUT_NODE || active.contains(&node);
        self.connections.retain(|c| valid(c.source) && valid(c.dest));
        self.rebuild_processing_order();
    }

    // ---- routing templates ----

    /// Input -> each active band -> Output.
    pub fn set_default_parallel_routing(&mut self) {
        self.connections.clear();
        for &band in &self.active_bands {
            self.connections.push(Connection {
                source: INPUT_NODE,
                dest: band,
            });
            self.connections.push(Connection {
                source: band,
                dest: OUTPUT_NODE,
            });
        }
        self.rebuild_processing_order();
    }

    /// Input -> band -> band -> ... -> Output, bands in ascending id order.
    pub fn set_series_routing(&mut self) {
        self.connections.clear();

        let bands: Vec<usize> = self.active_bands.iter().copied().collect();
        if bands.is_empty() {
            self.rebuild_processing_order();
            return;
        }

        self.connections.push(Connection {
            source: INPUT_NODE,
            dest: bands[0],
        });
        for pair in bands.windows(2) {
            self.connections.push(Connection {
                source: pair[0],
                dest: pair[1],
            });
        }
        self.connections.push(Connection {
            source: bands[bands.len() - 1],
            dest: OUTPUT_NODE,
        });
        self.rebuild_processing_order();
    }

    /// Batch edge replacement for preset load. Edges touching an unknown or
    /// inactive node are dropped; callers validate acyclicity with
    /// [`has_cycles`](Self::has_cycles) afterwards.
    pub fn set_connections(&mut self, connections: &[Connection]) {
        let active = &self.active_bands;
        let valid =
            |node: usize| node == INPUT_NODE || node == OUTPUT_NODE || active.contains(&node);
        self.connections = connections
            .iter()
            .copied()
            .filter(|c| valid(c.source) && valid(c.dest))
            .collect();
        self.rebuild_processing_order();
    }

    // ---- persistence ----

    /// Snapshot of connections and active bands for serialization.
    pub fn state(&self) -> RoutingState {
        RoutingState {
            connections: self.connections.clone(),
            active_bands: self.active_bands(),
        }
    }

    /// Wholesale replacement from a snapshot. Out-of-range band ids and
    /// edges touching an unknown or inactive node are dropped, so a
    /// malformed snapshot can never schedule a nonexistent node.
    pub fn set_state(&mut self, state: &RoutingState) {
        self.active_bands = state
            .active_bands
            .iter()
            .copied()
            .filter(|band| (1..=NUM_BANDS).contains(band))
            .collect();

        let active = &self.active_bands;
        let valid =
            |node: usize| node == INPUT_NODE || node == OUTPUT_NODE || active.contains(&node);
        self.connections = state
            .connections
            .iter()
            .copied()
            .filter(|c| valid(c.source) && valid(c.dest))
            .collect();
        self.rebuild_processing_order();
    }

    // ---- internals ----

    fn is_valid_endpoint(&self, node: usize) -> bool {
        node == INPUT_NODE || node == OUTPUT_NODE || self.active_bands.contains(&node)
    }

    fn adjacency(&self) -> HashMap<usize, Vec<usize>> {
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        for c in &self.connections {
            adjacency.entry(c.source).or_default().push(c.dest);
        }
        adjacency
    }

    fn rebuild_processing_order(&mut self) {
        self.processing_order.clear();

        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut in_degree: HashMap<usize, usize> = HashMap::new();

        for c in &self.connections {
            adjacency.entry(c.source).or_default().push(c.dest);
            in_degree.entry(c.source).or_insert(0);
            *in_degree.entry(c.dest).or_insert(0) += 1;
        }

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&node, _)| node)
            .collect();

        while let Some(node) = queue.pop_front() {
            self.processing_order.push(node);
            if let Some(neighbors) = adjacency.get(&node) {
                for &next in neighbors {
                    let deg = in_degree
                        .get_mut(&next)
                        .map(|d| {
                            *d -= 1;
                            *d
                        })
                        .unwrap_or(0);
                    if deg == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
        // On a cyclic graph the order is truncated; has_cycles() is how
        // callers find out, and they must not commit such a graph.
    }
}

impl Default for RoutingGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn has_cycle(adjacency: &HashMap<usize, Vec<usize>>) -> bool {
    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    fn dfs(
        node: usize,
        adjacency: &HashMap<usize, Vec<usize>>,
        visited: &mut HashSet<usize>,
        in_stack: &mut HashSet<usize>,
    ) -> bool {
        visited.insert(node);
        in_stack.insert(node);
        if let Some(neighbors) = adjacency.get(&node) {
            for &next in neighbors {
                if in_stack.contains(&next) {
                    return true;
                }
                if !visited.contains(&next) && dfs(next, adjacency, visited, in_stack) {
                    return true;
                }
            }
        }
        in_stack.remove(&node);
        false
    }

    adjacency
        .keys()
        .any(|&node| !visited.contains(&node) && dfs(node, adjacency, &mut visited, &mut in_stack))
}
