use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::RouterId;

/// A router as seen by the rest of the network: where its process listens and
/// which simulated address it answers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterIdentity {
    pub process_host: String,
    pub process_port: u16,
    pub simulated_address: RouterId,
}

impl RouterIdentity {
    pub fn new(process_host: impl Into<String>, process_port: u16, simulated_address: impl Into<RouterId>) -> Self {
        Self {
            process_host: process_host.into(),
            process_port,
            simulated_address: simulated_address.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.process_host, self.process_port)
    }
}

impl fmt::Display for RouterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.simulated_address, self.endpoint())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescription {
    pub neighbor_id: RouterId,
    /// Process port of the neighbor, `None` for the self placeholder entry.
    pub neighbor_port: Option<u16>,
    pub weight: u16,
}

/// Link-state advertisement: one router's view of its direct links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lsa {
    pub origin_id: RouterId,
    pub sequence_number: i32,
    pub has_withdrawn: bool,
    pub neighbor_links: Vec<LinkDescription>,
}

impl Lsa {
    /// The advertisement a router starts with: lowest sequence number and a
    /// zero-cost placeholder link to itself.
    pub fn initial(origin_id: impl Into<RouterId>) -> Self {
        let origin_id = origin_id.into();
        Self {
            neighbor_links: vec![LinkDescription {
                neighbor_id: origin_id.clone(),
                neighbor_port: None,
                weight: 0,
            }],
            origin_id,
            sequence_number: i32::MIN,
            has_withdrawn: false,
        }
    }

    /// Withdrawal notice derived from the last advertisement we held for a router.
    pub fn withdrawal_of(last_known: Option<Lsa>, origin_id: &str) -> Self {
        let mut lsa = last_known.unwrap_or_else(|| Self {
            origin_id: origin_id.to_string(),
            sequence_number: i32::MIN,
            has_withdrawn: false,
            neighbor_links: Vec::new(),
        });
        lsa.bump_sequence();
        lsa.has_withdrawn = true;
        lsa
    }

    pub fn bump_sequence(&mut self) {
        if self.sequence_number == i32::MAX {
            warn!("Sequence number of {} is exhausted, peers will ignore further changes", self.origin_id);
            return;
        }
        self.sequence_number += 1;
    }

    pub fn is_newer_than(&self, other: &Lsa) -> bool {
        self.sequence_number > other.sequence_number
    }

    pub fn link_to(&self, neighbor_id: &str) -> Option<&LinkDescription> {
        self.neighbor_links.iter().find(|l| l.neighbor_id == neighbor_id)
    }
}
