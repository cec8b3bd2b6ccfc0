use std::collections::HashMap;
use std::fmt::Write;

use crate::RouterId;

/// Dense snapshot of the known graph: a square weight matrix plus the mapping
/// between router identities and matrix indices. Rebuilt from scratch on every
/// recomputation.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    ids: Vec<RouterId>,
    index: HashMap<RouterId, usize>,
    /// `None` is "no edge", distinct from a zero-cost edge.
    weights: Vec<Vec<Option<u16>>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(ids: impl IntoIterator<Item = RouterId>) -> Self {
        let mut topology = Self::new();
        for id in ids {
            topology.add_node(&id);
        }
        topology
    }

    /// Index of `id`, assigning the next dense index on first sight.
    pub fn add_node(&mut self, id: &str) -> usize {
        if let Some(&i) = self.index.get(id) {
            return i;
        }
        let i = self.ids.len();
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), i);
        for row in &mut self.weights {
            row.push(None);
        }
        let mut row = vec![None; i + 1];
        row[i] = Some(0);
        self.weights.push(row);
        i
    }

    /// Sets the weight in both directions. Nodes are added when unseen.
    pub fn set_edge(&mut self, a: &str, b: &str, weight: u16) {
        let ia = self.add_node(a);
        let ib = self.add_node(b);
        self.weights[ia][ib] = Some(weight);
        self.weights[ib][ia] = Some(weight);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id_of(&self, index: usize) -> &str {
        &self.ids[index]
    }

    /// Weight of the direct edge between two distinct nodes.
    pub fn weight(&self, a: usize, b: usize) -> Option<u16> {
        if a == b {
            return None;
        }
        self.weights.get(a).and_then(|row| row.get(b).copied().flatten())
    }

    pub fn render(&self) -> String {
        let mut output = String::new();
        write!(output, "{:<16}", "").unwrap();
        for id in &self.ids {
            write!(output, "{:<16}", id).unwrap();
        }
        writeln!(output).unwrap();
        for (i, id) in self.ids.iter().enumerate() {
            write!(output, "{:<16}", id).unwrap();
            for w in &self.weights[i] {
                let cell = w.map(|w| w.to_string()).unwrap_or_else(|| "-".to_string());
                write!(output, "{:<16}", cell).unwrap();
            }
            writeln!(output).unwrap();
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_are_symmetric() {
        let mut topology = Topology::new();
        topology.set_edge("A", "B", 3);
        let a = topology.index_of("A").unwrap();
        let b = topology.index_of("B").unwrap();
        assert_eq!(topology.weight(a, b), Some(3));
        assert_eq!(topology.weight(b, a), Some(3));
    }

    #[test]
    fn test_missing_edge_differs_from_zero() {
        let mut topology = Topology::with_nodes(["A".to_string(), "B".to_string(), "C".to_string()]);
        topology.set_edge("A", "B", 0);
        assert_eq!(topology.weight(0, 1), Some(0));
        assert_eq!(topology.weight(0, 2), None);
        assert_eq!(topology.weight(1, 1), None);
    }

    #[test]
    fn test_dense_indices_in_order_of_appearance() {
        let mut topology = Topology::new();
        topology.set_edge("X", "Y", 1);
        topology.set_edge("Y", "Z", 1);
        assert_eq!(topology.add_node("X"), 0);
        assert_eq!(topology.index_of("Z"), Some(2));
        assert_eq!(topology.id_of(1), "Y");
        assert_eq!(topology.len(), 3);
    }
}
