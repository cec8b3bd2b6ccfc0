use crate::network::Topology;
use crate::protocol::RouteRow;

/// Distance of a node not (yet) reachable. Larger than any sum of link weights
/// a simulated topology can produce.
pub const INFINITY: u32 = u32::MAX;

/// Shortest-path tree from `source` over the dense weight matrix.
///
/// Predecessors are only replaced on strict improvement, so between equal-cost
/// paths the first one found wins. Stops as soon as no unvisited node is
/// reachable. Returns one row per reachable node, the source included.
pub fn calculate_shortest_paths(topology: &Topology, source: usize) -> Vec<RouteRow> {
    let n = topology.len();
    if source >= n {
        return Vec::new();
    }

    let mut distance = vec![INFINITY; n];
    let mut previous: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    distance[source] = 0;

    let mut current = source;
    loop {
        visited[current] = true;

        for neighbor in 0..n {
            if visited[neighbor] {
                continue;
            }
            if let Some(weight) = topology.weight(current, neighbor) {
                let candidate = distance[current].saturating_add(weight as u32);
                if candidate < distance[neighbor] {
                    distance[neighbor] = candidate;
                    previous[neighbor] = Some(current);
                }
            }
        }

        let next = (0..n)
            .filter(|&i| !visited[i] && distance[i] < INFINITY)
            .min_by_key(|&i| distance[i]);

        match next {
            Some(i) => current = i,
            None => break,
        }
    }

    (0..n)
        .filter(|&i| distance[i] < INFINITY)
        .map(|i| RouteRow {
            target_id: topology.id_of(i).to_string(),
            distance: distance[i],
            previous_hop: previous[i].map(|p| topology.id_of(p).to_string()),
        })
        .collect()
}
