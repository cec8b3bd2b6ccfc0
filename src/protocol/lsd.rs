use std::collections::BTreeMap;
use std::fmt::Write;

use crate::algorithms::dijkstra::calculate_shortest_paths;
use crate::network::Topology;
use crate::protocol::RoutingTable;
use crate::types::{LinkDescription, Lsa};
use crate::RouterId;

/// Link-state database. The local router's own advertisement lives in its own
/// field so it can never go missing; every other router is keyed by its
/// simulated address.
#[derive(Debug, Clone)]
pub struct LinkStateDatabase {
    self_id: RouterId,
    self_lsa: Lsa,
    store: BTreeMap<RouterId, Lsa>,
}

impl LinkStateDatabase {
    pub fn new(self_id: impl Into<RouterId>) -> Self {
        let self_id = self_id.into();
        Self {
            self_lsa: Lsa::initial(self_id.clone()),
            self_id,
            store: BTreeMap::new(),
        }
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn self_lsa(&self) -> &Lsa {
        &self.self_lsa
    }

    pub fn get(&self, id: &str) -> Option<&Lsa> {
        if id == self.self_id {
            Some(&self.self_lsa)
        } else {
            self.store.get(id)
        }
    }

    /// Stores a remote advertisement. Our own entry is only changed through the
    /// `*_self_link` methods, so a `put` naming ourselves is ignored.
    pub fn put(&mut self, id: &str, lsa: Lsa) {
        if id != self.self_id {
            self.store.insert(id.to_string(), lsa);
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Lsa> {
        self.store.remove(id)
    }

    /// Every advertisement, ours first, the rest ordered by origin.
    pub fn all_entries(&self) -> Vec<Lsa> {
        std::iter::once(&self.self_lsa)
            .chain(self.store.values())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.store.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn add_self_link(&mut self, link: LinkDescription) {
        self.self_lsa.neighbor_links.push(link);
        self.self_lsa.bump_sequence();
    }

    pub fn remove_self_link(&mut self, neighbor_id: &str) -> bool {
        let before = self.self_lsa.neighbor_links.len();
        self.self_lsa.neighbor_links.retain(|l| l.neighbor_id != neighbor_id);
        let removed = self.self_lsa.neighbor_links.len() != before;
        if removed {
            self.self_lsa.bump_sequence();
        }
        removed
    }

    /// Changes the advertised weight towards a neighbor; the sequence number
    /// only moves when the weight actually differs.
    pub fn set_self_link_weight(&mut self, neighbor_id: &str, weight: u16) -> bool {
        let changed = match self
            .self_lsa
            .neighbor_links
            .iter_mut()
            .find(|l| l.neighbor_id == neighbor_id)
        {
            Some(link) if link.weight != weight => {
                link.weight = weight;
                true
            }
            _ => false,
        };
        if changed {
            self.self_lsa.bump_sequence();
        }
        changed
    }

    pub fn build_topology(&self) -> Topology {
        let entries = self.all_entries();
        let mut topology = Topology::new();

        for lsa in &entries {
            topology.add_node(&lsa.origin_id);
            for link in &lsa.neighbor_links {
                topology.add_node(&link.neighbor_id);
            }
        }
        for lsa in &entries {
            let remote = lsa.origin_id != self.self_id;
            for link in &lsa.neighbor_links {
                if link.neighbor_id == lsa.origin_id {
                    continue;
                }
                // Edges touching us come from our own LSA only; a peer we
                // disconnected from still advertises its stale back-link.
                if remote && link.neighbor_id == self.self_id {
                    continue;
                }
                topology.set_edge(&lsa.origin_id, &link.neighbor_id, link.weight);
            }
        }
        topology
    }

    pub fn recompute_topology(&self) -> RoutingTable {
        let topology = self.build_topology();
        let known = (0..topology.len()).map(|i| topology.id_of(i).to_string()).collect();
        let rows = match topology.index_of(&self.self_id) {
            Some(source) => calculate_shortest_paths(&topology, source),
            None => Vec::new(),
        };
        RoutingTable::from_rows(self.self_id.clone(), rows, known)
    }

    pub fn render(&self) -> String {
        let mut output = String::new();
        for lsa in self.all_entries() {
            writeln!(output, "{} (seq {}):", lsa.origin_id, lsa.sequence_number).unwrap();
            for link in &lsa.neighbor_links {
                let port = link
                    .neighbor_port
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    output,
                    "    link {:<16} port {:<6} weight {}",
                    link.neighbor_id, port, link.weight
                )
                .unwrap();
            }
        }
        output
    }
}
