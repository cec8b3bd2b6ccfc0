use log::debug;

use crate::protocol::Packet;
use crate::RouterState;

/// What inbound LSUPDATE processing decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Our own broadcast came back around.
    Echo,
    /// The TTL budget ran out before the update reached us.
    Expired { overdue_ms: i64 },
    Applied {
        accepted: usize,
        withdrawn: usize,
        weights_resynced: usize,
    },
}

impl UpdateOutcome {
    /// Only updates that taught us something travel further.
    pub fn should_relay(&self) -> bool {
        matches!(self, UpdateOutcome::Applied { accepted, .. } if *accepted > 0)
    }
}

/// Budget left on an update at `now_ms`, negative once expired.
pub fn remaining_ttl_ms(packet: &Packet, now_ms: i64) -> i64 {
    let elapsed = now_ms.saturating_sub(packet.created_at_ms);
    i64::try_from(packet.ttl_budget_ms)
        .unwrap_or(i64::MAX)
        .saturating_sub(elapsed)
}

impl RouterState {
    /// Applies an inbound flood update to the LSD. Advertisements that are not
    /// strictly newer than what we hold are dropped without comment.
    pub fn apply_update(&mut self, packet: &Packet, now_ms: i64) -> UpdateOutcome {
        if packet.origin_router_id == self.self_id() {
            return UpdateOutcome::Echo;
        }
        let remaining = remaining_ttl_ms(packet, now_ms);
        if remaining <= 0 {
            return UpdateOutcome::Expired { overdue_ms: -remaining };
        }

        let self_id = self.self_id().to_string();
        let mut accepted = 0;
        let mut withdrawn = 0;
        let mut weights_resynced = 0;

        for lsa in &packet.advertisements {
            if lsa.origin_id == self_id {
                continue;
            }
            let newer = self
                .lsd
                .get(&lsa.origin_id)
                .is_none_or(|stored| lsa.is_newer_than(stored));
            if !newer {
                debug!(
                    "Stale LSA for {} (seq {}) discarded",
                    lsa.origin_id, lsa.sequence_number
                );
                continue;
            }

            if lsa.has_withdrawn {
                // Withdrawals of routers we never held change nothing here.
                if self.lsd.remove(&lsa.origin_id).is_some() {
                    accepted += 1;
                    withdrawn += 1;
                }
                continue;
            }
            accepted += 1;

            // The advertiser's weight for our shared link is authoritative.
            if let Some(back) = lsa.link_to(&self_id) {
                if let Some(link) = self.links.get_by_peer_mut(&lsa.origin_id) {
                    if link.weight != back.weight {
                        link.weight = back.weight;
                        self.lsd.set_self_link_weight(&lsa.origin_id, back.weight);
                        weights_resynced += 1;
                    }
                }
            }
            self.lsd.put(&lsa.origin_id, lsa.clone());
        }

        if accepted > 0 {
            self.recompute();
        }

        UpdateOutcome::Applied {
            accepted,
            withdrawn,
            weights_resynced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PacketKind;
    use crate::types::{LinkDescription, Lsa, RouterIdentity};

    fn identity(n: u8) -> RouterIdentity {
        RouterIdentity::new("127.0.0.1", 50000 + n as u16, format!("10.0.0.{}", n))
    }

    fn lsa(origin: u8, seq: i32, links: &[(u8, u16)]) -> Lsa {
        Lsa {
            origin_id: format!("10.0.0.{}", origin),
            sequence_number: seq,
            has_withdrawn: false,
            neighbor_links: links
                .iter()
                .map(|(n, w)| LinkDescription {
                    neighbor_id: format!("10.0.0.{}", n),
                    neighbor_port: Some(50000 + *n as u16),
                    weight: *w,
                })
                .collect(),
        }
    }

    fn update(from: u8, lsas: Vec<Lsa>) -> Packet {
        Packet::ls_update(&identity(from), 5_000, lsas)
    }

    fn now(packet: &Packet) -> i64 {
        packet.created_at_ms + 10
    }

    #[test]
    fn test_echo_is_discarded() {
        let mut state = RouterState::new(identity(1));
        let packet = update(1, vec![lsa(2, 0, &[])]);
        assert_eq!(state.apply_update(&packet, now(&packet)), UpdateOutcome::Echo);
        assert!(state.lsd.get("10.0.0.2").is_none());
    }

    #[test]
    fn test_expired_update_is_discarded() {
        let mut state = RouterState::new(identity(1));
        let packet = update(2, vec![lsa(2, 0, &[])]);
        let late = packet.created_at_ms + 5_001;

        let outcome = state.apply_update(&packet, late);
        assert_eq!(outcome, UpdateOutcome::Expired { overdue_ms: 1 });
        assert!(!outcome.should_relay());
        assert!(state.lsd.get("10.0.0.2").is_none());
    }

    #[test]
    fn test_redelivery_is_idempotent() {
        let mut state = RouterState::new(identity(1));
        let packet = update(2, vec![lsa(2, 3, &[(1, 4)]), lsa(3, 1, &[(2, 1)])]);

        let first = state.apply_update(&packet, now(&packet));
        assert!(first.should_relay());
        let snapshot = state.lsd.all_entries();

        let second = state.apply_update(&packet, now(&packet));
        assert_eq!(
            second,
            UpdateOutcome::Applied { accepted: 0, withdrawn: 0, weights_resynced: 0 }
        );
        assert!(!second.should_relay());
        assert_eq!(state.lsd.all_entries(), snapshot);
    }

    #[test]
    fn test_lower_or_equal_sequence_rejected() {
        let mut state = RouterState::new(identity(1));
        let newer = update(2, vec![lsa(2, 5, &[(3, 1)])]);
        state.apply_update(&newer, now(&newer));

        let older = update(2, vec![lsa(2, 4, &[(3, 9)])]);
        state.apply_update(&older, now(&older));
        let same = update(2, vec![lsa(2, 5, &[(3, 7)])]);
        state.apply_update(&same, now(&same));

        let stored = state.lsd.get("10.0.0.2").unwrap();
        assert_eq!(stored.sequence_number, 5);
        assert_eq!(stored.neighbor_links[0].weight, 1);
    }

    #[test]
    fn test_advertisement_about_self_is_ignored() {
        let mut state = RouterState::new(identity(1));
        let packet = update(2, vec![lsa(1, 100, &[(9, 1)])]);
        let outcome = state.apply_update(&packet, now(&packet));
        assert!(!outcome.should_relay());
        assert_eq!(state.lsd.self_lsa().sequence_number, i32::MIN);
    }

    #[test]
    fn test_withdrawal_removes_entry_and_relays() {
        let mut state = RouterState::new(identity(1));
        state.attach_link(identity(2), 1).unwrap();
        let packet = update(2, vec![lsa(2, 1, &[(1, 1), (3, 1)]), lsa(3, 1, &[(2, 1)])]);
        state.apply_update(&packet, now(&packet));
        assert!(state.routing_table.path_to("10.0.0.3").is_ok());

        let mut withdrawal = Lsa::withdrawal_of(state.lsd.get("10.0.0.3").cloned(), "10.0.0.3");
        withdrawal.neighbor_links.clear();
        let gone = update(2, vec![lsa(2, 2, &[(1, 1)]), withdrawal]);
        let outcome = state.apply_update(&gone, now(&gone));

        assert!(outcome.should_relay());
        assert!(matches!(outcome, UpdateOutcome::Applied { withdrawn: 1, .. }));
        assert!(state.lsd.get("10.0.0.3").is_none());
        assert!(state.routing_table.path_to("10.0.0.3").is_err());
    }

    #[test]
    fn test_weight_resync_from_advertiser() {
        let mut state = RouterState::new(identity(1));
        state.attach_link(identity(2), 8).unwrap();
        let seq = state.lsd.self_lsa().sequence_number;

        let packet = update(2, vec![lsa(2, 1, &[(1, 3)])]);
        let outcome = state.apply_update(&packet, now(&packet));

        assert!(matches!(outcome, UpdateOutcome::Applied { weights_resynced: 1, .. }));
        assert_eq!(state.links.get_by_peer("10.0.0.2").unwrap().weight, 3);
        assert_eq!(state.lsd.self_lsa().link_to("10.0.0.2").unwrap().weight, 3);
        assert!(state.lsd.self_lsa().sequence_number > seq);
        assert_eq!(state.routing_table.get_route("10.0.0.2").unwrap().distance, 3);
    }

    #[test]
    fn test_remaining_ttl() {
        let mut packet = update(2, vec![]);
        packet.kind = PacketKind::LsUpdate;
        packet.created_at_ms = 1_000;
        packet.ttl_budget_ms = 500;
        assert_eq!(remaining_ttl_ms(&packet, 1_200), 300);
        assert_eq!(remaining_ttl_ms(&packet, 1_500), 0);
        assert_eq!(remaining_ttl_ms(&packet, 1_600), -100);
    }

    #[test]
    fn test_huge_ttl_budget_does_not_wrap() {
        let mut packet = update(2, vec![lsa(2, 0, &[])]);
        packet.ttl_budget_ms = u64::MAX;
        assert!(remaining_ttl_ms(&packet, now(&packet)) > 0);

        let mut state = RouterState::new(identity(1));
        assert!(state.apply_update(&packet, now(&packet)).should_relay());
    }
}
