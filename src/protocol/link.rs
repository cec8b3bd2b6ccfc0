use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RouterError};
use crate::types::RouterIdentity;
use crate::RouterId;

pub const MAX_PORTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    None,
    Init,
    TwoWay,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkStatus::None => "NONE",
            LinkStatus::Init => "INIT",
            LinkStatus::TwoWay => "TWO_WAY",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub peer: RouterIdentity,
    pub weight: u16,
    pub status: LinkStatus,
}

impl Link {
    pub fn new(peer: RouterIdentity, weight: u16) -> Self {
        Self {
            peer,
            weight,
            status: LinkStatus::Init,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer.simulated_address
    }

    pub fn is_two_way(&self) -> bool {
        self.status == LinkStatus::TwoWay
    }
}

/// How an operator or handler names a link: by its port slot or by the
/// simulated address at the other end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSelector {
    Slot(usize),
    Peer(RouterId),
}

impl FromStr for LinkSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<usize>() {
            Ok(slot) => LinkSelector::Slot(slot),
            Err(_) => LinkSelector::Peer(s.to_string()),
        })
    }
}

/// Fixed arena of router ports. Slots are stable: removing a link frees its
/// slot without shifting the others, and a new link takes the lowest free slot.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    slots: [Option<Link>; MAX_PORTS],
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == MAX_PORTS
    }

    pub fn insert(&mut self, link: Link) -> Result<usize> {
        if self.slot_of(link.peer_id()).is_some() {
            return Err(RouterError::DuplicateLink(link.peer_id().to_string()));
        }
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RouterError::LinkTableFull(MAX_PORTS))?;
        self.slots[slot] = Some(link);
        Ok(slot)
    }

    pub fn slot_of(&self, peer_id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|l| l.peer_id() == peer_id))
    }

    pub fn resolve(&self, selector: &LinkSelector) -> Result<usize> {
        match selector {
            LinkSelector::Slot(slot) => match self.slots.get(*slot) {
                Some(Some(_)) => Ok(*slot),
                _ => Err(RouterError::NoSuchPort(*slot)),
            },
            LinkSelector::Peer(peer_id) => self
                .slot_of(peer_id)
                .ok_or_else(|| RouterError::NoSuchLink(peer_id.clone())),
        }
    }

    pub fn get(&self, slot: usize) -> Option<&Link> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_by_peer(&self, peer_id: &str) -> Option<&Link> {
        self.slot_of(peer_id).and_then(|slot| self.get(slot))
    }

    pub fn get_by_peer_mut(&mut self, peer_id: &str) -> Option<&mut Link> {
        let slot = self.slot_of(peer_id)?;
        self.slots[slot].as_mut()
    }

    pub fn remove(&mut self, slot: usize) -> Option<Link> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub fn set_status(&mut self, peer_id: &str, status: LinkStatus) -> bool {
        match self.get_by_peer_mut(peer_id) {
            Some(link) => {
                link.status = status;
                true
            }
            None => false,
        }
    }

    /// Occupied slots in port order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Link)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, link)| link.as_ref().map(|l| (slot, l)))
    }

    pub fn two_way_peers(&self) -> Vec<RouterIdentity> {
        self.iter()
            .filter(|(_, l)| l.is_two_way())
            .map(|(_, l)| l.peer.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(n: u8) -> Link {
        Link::new(
            RouterIdentity::new("127.0.0.1", 50000 + n as u16, format!("10.0.0.{}", n)),
            n as u16,
        )
    }

    #[test]
    fn test_capacity_enforcement() {
        let mut table = LinkTable::new();
        for n in 1..=4 {
            assert_eq!(table.insert(link(n)).unwrap(), (n - 1) as usize);
        }
        assert!(table.is_full());

        let err = table.insert(link(5)).unwrap_err();
        assert!(matches!(err, RouterError::LinkTableFull(4)));
        let peers: Vec<_> = table.iter().map(|(_, l)| l.peer_id().to_string()).collect();
        assert_eq!(peers, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]);
    }

    #[test]
    fn test_duplicate_peer_rejected() {
        let mut table = LinkTable::new();
        table.insert(link(1)).unwrap();
        assert!(matches!(table.insert(link(1)), Err(RouterError::DuplicateLink(_))));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_slots_stay_stable_after_removal() {
        let mut table = LinkTable::new();
        for n in 1..=3 {
            table.insert(link(n)).unwrap();
        }
        let removed = table.remove(0).unwrap();
        assert_eq!(removed.peer_id(), "10.0.0.1");
        assert_eq!(table.slot_of("10.0.0.3"), Some(2));

        assert_eq!(table.insert(link(4)).unwrap(), 0);
        assert_eq!(table.resolve(&LinkSelector::Peer("10.0.0.4".into())).unwrap(), 0);
        assert!(matches!(table.resolve(&LinkSelector::Slot(3)), Err(RouterError::NoSuchPort(3))));
        assert!(matches!(table.resolve(&LinkSelector::Slot(9)), Err(RouterError::NoSuchPort(9))));
    }

    #[test]
    fn test_status_and_flood_targets() {
        let mut table = LinkTable::new();
        table.insert(link(1)).unwrap();
        table.insert(link(2)).unwrap();
        assert_eq!(table.get(0).unwrap().status, LinkStatus::Init);
        assert!(table.two_way_peers().is_empty());

        assert!(table.set_status("10.0.0.2", LinkStatus::TwoWay));
        assert!(!table.set_status("10.0.0.9", LinkStatus::TwoWay));
        let targets = table.two_way_peers();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].simulated_address, "10.0.0.2");
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!("2".parse::<LinkSelector>().unwrap(), LinkSelector::Slot(2));
        assert_eq!(
            "10.0.0.2".parse::<LinkSelector>().unwrap(),
            LinkSelector::Peer("10.0.0.2".into())
        );
    }
}
