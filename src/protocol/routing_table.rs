use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, RouterError};
use crate::RouterId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRow {
    pub target_id: RouterId,
    pub distance: u32,
    pub previous_hop: Option<RouterId>,
}

/// Output of the last shortest-path run, plus the set of every identity the
/// LSD mentioned at that time (reachable or not).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingTable {
    source: RouterId,
    rows: BTreeMap<RouterId, RouteRow>,
    known: Vec<RouterId>,
}

impl RoutingTable {
    pub fn from_rows(source: impl Into<RouterId>, rows: Vec<RouteRow>, known: Vec<RouterId>) -> Self {
        Self {
            source: source.into(),
            rows: rows.into_iter().map(|r| (r.target_id.clone(), r)).collect(),
            known,
        }
    }

    pub fn get_route(&self, target: &str) -> Option<&RouteRow> {
        self.rows.get(target)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteRow> {
        self.rows.values()
    }

    /// Node sequence from the source to `target`, both ends included.
    pub fn path_to(&self, target: &str) -> Result<Vec<RouteRow>> {
        if !self.known.iter().any(|k| k == target) {
            return Err(RouterError::UnknownDestination(target.to_string()));
        }
        let mut path = Vec::new();
        let mut current = self
            .rows
            .get(target)
            .ok_or_else(|| RouterError::NoPath(target.to_string()))?;
        loop {
            path.push(current.clone());
            match &current.previous_hop {
                Some(prev) => {
                    current = self
                        .rows
                        .get(prev)
                        .ok_or_else(|| RouterError::NoPath(target.to_string()))?;
                }
                None => break,
            }
            // A predecessor chain longer than the table means it is corrupt.
            if path.len() > self.rows.len() {
                return Err(RouterError::NoPath(target.to_string()));
            }
        }
        path.reverse();
        if path.first().map(|r| r.target_id.as_str()) != Some(self.source.as_str()) {
            return Err(RouterError::NoPath(target.to_string()));
        }
        Ok(path)
    }
}
