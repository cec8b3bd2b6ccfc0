pub mod algorithms;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod router;
pub mod shell;
pub mod types;

use std::sync::Arc;
use tokio::sync::Mutex;

use error::Result;
use protocol::{Link, LinkSelector, LinkStateDatabase, LinkTable, RoutingTable};
use types::{LinkDescription, RouterIdentity};

pub use router::Router;

/// Simulated address: the stable protocol-level identity of a router.
pub type RouterId = String;

/// Everything the router mutates. Lives behind one lock so that local link
/// changes and inbound flood updates never interleave.
#[derive(Debug, Clone)]
pub struct RouterState {
    pub identity: RouterIdentity,
    pub links: LinkTable,
    pub lsd: LinkStateDatabase,
    pub routing_table: RoutingTable,
}

impl RouterState {
    pub fn new(identity: RouterIdentity) -> Self {
        let lsd = LinkStateDatabase::new(identity.simulated_address.clone());
        let routing_table = lsd.recompute_topology();
        Self {
            identity,
            links: LinkTable::new(),
            lsd,
            routing_table,
        }
    }

    pub fn self_id(&self) -> &str {
        &self.identity.simulated_address
    }

    /// Records a new port and advertises it in the self-LSA. No I/O.
    pub fn attach_link(&mut self, peer: RouterIdentity, weight: u16) -> Result<usize> {
        let description = LinkDescription {
            neighbor_id: peer.simulated_address.clone(),
            neighbor_port: Some(peer.process_port),
            weight,
        };
        let slot = self.links.insert(Link::new(peer, weight))?;
        self.lsd.add_self_link(description);
        self.recompute();
        Ok(slot)
    }

    /// Frees the port and withdraws it from the self-LSA.
    pub fn detach_link(&mut self, selector: &LinkSelector) -> Result<Link> {
        let slot = self.links.resolve(selector)?;
        let link = self
            .links
            .remove(slot)
            .ok_or(error::RouterError::NoSuchPort(slot))?;
        self.lsd.remove_self_link(link.peer_id());
        self.recompute();
        Ok(link)
    }

    pub fn recompute(&mut self) {
        self.routing_table = self.lsd.recompute_topology();
    }
}

pub type SharedRouterState = Arc<Mutex<RouterState>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RouterError;

    fn peer(n: u8) -> RouterIdentity {
        RouterIdentity::new("127.0.0.1", 50000 + n as u16, format!("10.0.0.{}", n))
    }

    #[test]
    fn test_attach_link_updates_self_lsa() {
        let mut state = RouterState::new(peer(0));
        let seq = state.lsd.self_lsa().sequence_number;

        let slot = state.attach_link(peer(1), 3).unwrap();
        assert_eq!(slot, 0);
        assert_eq!(state.lsd.self_lsa().sequence_number, seq + 1);
        let advertised = state.lsd.self_lsa().link_to("10.0.0.1").unwrap();
        assert_eq!(advertised.weight, 3);
        assert_eq!(advertised.neighbor_port, Some(50001));
    }

    #[test]
    fn test_fifth_attach_fails_and_keeps_existing_links() {
        let mut state = RouterState::new(peer(0));
        for n in 1..=4 {
            state.attach_link(peer(n), n as u16).unwrap();
        }
        let seq = state.lsd.self_lsa().sequence_number;

        let err = state.attach_link(peer(5), 1).unwrap_err();
        assert!(matches!(err, RouterError::LinkTableFull(_)));
        assert_eq!(state.links.len(), 4);
        assert_eq!(state.lsd.self_lsa().sequence_number, seq);
        assert!(state.lsd.self_lsa().link_to("10.0.0.5").is_none());
    }

    #[test]
    fn test_detach_link_by_peer() {
        let mut state = RouterState::new(peer(0));
        state.attach_link(peer(1), 1).unwrap();
        state.attach_link(peer(2), 1).unwrap();
        let seq = state.lsd.self_lsa().sequence_number;

        let link = state.detach_link(&LinkSelector::Peer("10.0.0.1".into())).unwrap();
        assert_eq!(link.peer_id(), "10.0.0.1");
        assert!(state.lsd.self_lsa().sequence_number > seq);
        assert!(state.lsd.self_lsa().link_to("10.0.0.1").is_none());
        assert_eq!(state.links.slot_of("10.0.0.2"), Some(1));
        assert!(matches!(
            state.detach_link(&LinkSelector::Slot(0)),
            Err(RouterError::NoSuchPort(0))
        ));
    }
}
