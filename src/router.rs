use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{ProtocolSettings, RouterConfig};
use crate::error::{Result, RouterError};
use crate::network::transport::{deliver, PeerConnection};
use crate::protocol::{
    AttachRejection, Link, LinkSelector, LinkStatus, Packet, PacketKind, RouteRow, UpdateOutcome,
};
use crate::types::{Lsa, RouterIdentity};
use crate::{RouterId, RouterState, SharedRouterState};

/// Result of one link's HELLO exchange during `start`.
#[derive(Debug)]
pub struct HandshakeOutcome {
    pub peer: RouterId,
    pub result: Result<()>,
}

/// The routing engine. Operator commands and inbound packets both end up here;
/// all mutable state sits behind a single lock that is never held across I/O.
pub struct Router {
    identity: RouterIdentity,
    settings: ProtocolSettings,
    state: SharedRouterState,
}

impl Router {
    pub fn new(identity: RouterIdentity, settings: ProtocolSettings) -> Arc<Self> {
        info!("Router {} starting on {}", identity.simulated_address, identity.endpoint());
        Arc::new(Self {
            state: Arc::new(Mutex::new(RouterState::new(identity.clone()))),
            identity,
            settings,
        })
    }

    pub fn from_config(config: &RouterConfig) -> Arc<Self> {
        Self::new(config.identity(), config.protocol.clone())
    }

    pub fn identity(&self) -> &RouterIdentity {
        &self.identity
    }

    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    /// Consistent copy of the whole state, for display and inspection.
    pub async fn snapshot(&self) -> RouterState {
        self.state.lock().await.clone()
    }

    // ---- operator commands ----

    /// Local half of `attach`: records the link without telling anyone.
    pub async fn attach_link(&self, peer: RouterIdentity, weight: u16) -> Result<usize> {
        if peer.simulated_address == self.identity.simulated_address {
            return Err(RouterError::SelfLink(peer.simulated_address));
        }
        let slot = self.state.lock().await.attach_link(peer.clone(), weight)?;
        info!("Attached {} ({}) on port {} with weight {}", peer.simulated_address, peer.endpoint(), slot, weight);
        Ok(slot)
    }

    /// Attaches a link and asks the peer to mirror it. The local link is
    /// rolled back if the peer is unreachable or out of ports.
    pub async fn attach(&self, process_host: &str, process_port: u16, simulated_address: &str, weight: u16) -> Result<usize> {
        let peer = RouterIdentity::new(process_host, process_port, simulated_address);
        let slot = self.attach_link(peer.clone(), weight).await?;

        let request = Packet::attach(&self.identity, simulated_address, weight);
        let reply = match PeerConnection::connect(process_host, process_port, self.settings.io_timeout()).await {
            Ok(mut conn) => {
                conn.request(&request, &[PacketKind::AttachAck, PacketKind::AttachReject])
                    .await
            }
            Err(e) => Err(e),
        };

        let failure = match reply {
            Ok(reply) if reply.src_simulated_addr != simulated_address => RouterError::IdentityMismatch {
                expected: simulated_address.to_string(),
                actual: reply.src_simulated_addr,
            },
            Ok(reply) if reply.kind == PacketKind::AttachAck => return Ok(slot),
            Ok(reply) => match reply.rejection {
                Some(AttachRejection::Duplicate) => {
                    info!("{} already had a link to us", simulated_address);
                    return Ok(slot);
                }
                rejection => RouterError::AttachRejected {
                    peer: simulated_address.to_string(),
                    reason: rejection.unwrap_or(AttachRejection::Full),
                },
            },
            Err(e) => e,
        };

        warn!("Attach to {} failed, releasing port {}: {}", simulated_address, slot, failure);
        let mut state = self.state.lock().await;
        if let Err(e) = state.detach_link(&LinkSelector::Peer(simulated_address.to_string())) {
            debug!("Rollback of {} found nothing to remove: {}", simulated_address, e);
        }
        Err(failure)
    }

    /// Runs the HELLO exchange on every attached link concurrently, then
    /// floods once all of them have resolved.
    pub async fn start_handshakes(self: &Arc<Self>) -> Vec<HandshakeOutcome> {
        let links: Vec<Link> = {
            let state = self.state.lock().await;
            state.links.iter().map(|(_, link)| link.clone()).collect()
        };

        let (peers, tasks): (Vec<RouterId>, Vec<_>) = links
            .into_iter()
            .map(|link| {
                let router = Arc::clone(self);
                let peer = link.peer_id().to_string();
                let task = tokio::spawn(async move { router.hello_exchange(&link.peer, link.weight).await });
                (peer, task)
            })
            .unzip();

        let outcomes: Vec<HandshakeOutcome> = peers
            .into_iter()
            .zip(join_all(tasks).await)
            .map(|(peer, joined)| {
                let result = joined.unwrap_or_else(|e| {
                    Err(RouterError::TaskFailed {
                        peer: peer.clone(),
                        reason: e.to_string(),
                    })
                });
                if let Err(e) = &result {
                    warn!("Handshake with {} failed: {}", peer, e);
                }
                HandshakeOutcome { peer, result }
            })
            .collect();

        self.broadcast_update(Vec::new()).await;
        outcomes
    }

    /// `attach` followed by a handshake on that one link. The link is torn
    /// down again when the handshake fails so the command can be retried.
    pub async fn connect_to(
        self: &Arc<Self>,
        process_host: &str,
        process_port: u16,
        simulated_address: &str,
        weight: u16,
    ) -> Result<usize> {
        if self.state.lock().await.links.get_by_peer(simulated_address).is_some() {
            return Err(RouterError::DuplicateLink(simulated_address.to_string()));
        }
        let slot = self.attach(process_host, process_port, simulated_address, weight).await?;
        let peer = RouterIdentity::new(process_host, process_port, simulated_address);

        match self.hello_exchange(&peer, weight).await {
            Ok(()) => {
                self.broadcast_update(Vec::new()).await;
                Ok(slot)
            }
            Err(e) => {
                warn!("Handshake with {} failed, detaching: {}", simulated_address, e);
                if self.disconnect(LinkSelector::Peer(simulated_address.to_string())).await.is_err() {
                    debug!("{} was already gone", simulated_address);
                }
                Err(e)
            }
        }
    }

    /// Removes a link, tells the peer, and floods the shrunken self-LSA.
    pub async fn disconnect(self: &Arc<Self>, selector: LinkSelector) -> Result<Link> {
        let link = self.state.lock().await.detach_link(&selector)?;
        info!("Detached {} from the link table", link.peer_id());

        let notice = Packet::new(PacketKind::Disconnect, &self.identity, link.peer_id());
        if let Err(e) = deliver(&link.peer.process_host, link.peer.process_port, &notice, self.settings.io_timeout()).await {
            warn!("Could not notify {} of the disconnect: {}", link.peer_id(), e);
        }

        self.broadcast_update(Vec::new()).await;
        Ok(link)
    }

    /// Sends EXIT to every attached peer and waits for the sends to finish.
    /// Returns how many peers were notified.
    pub async fn quit(&self) -> usize {
        let peers: Vec<RouterIdentity> = {
            let state = self.state.lock().await;
            state.links.iter().map(|(_, link)| link.peer.clone()).collect()
        };
        info!("Quitting, notifying {} neighbor(s)", peers.len());

        let timeout = self.settings.io_timeout();
        let sends = peers.iter().map(|peer| {
            let packet = Packet::new(PacketKind::Exit, &self.identity, &peer.simulated_address);
            async move {
                deliver(&peer.process_host, peer.process_port, &packet, timeout)
                    .await
                    .map_err(|e| warn!("EXIT to {} failed: {}", peer.simulated_address, e))
            }
        });
        join_all(sends).await.into_iter().filter(|r| r.is_ok()).count()
    }

    /// Established neighbors, in port order.
    pub async fn neighbors(&self) -> Vec<RouterId> {
        let state = self.state.lock().await;
        state
            .links
            .iter()
            .filter(|(_, link)| link.is_two_way())
            .map(|(_, link)| link.peer_id().to_string())
            .collect()
    }

    pub async fn port_status(&self) -> Vec<(usize, Link)> {
        let state = self.state.lock().await;
        state.links.iter().map(|(slot, link)| (slot, link.clone())).collect()
    }

    /// Shortest path from this router to `destination`, as hops.
    pub async fn detect(&self, destination: &str) -> Result<Vec<RouteRow>> {
        self.state.lock().await.routing_table.path_to(destination)
    }

    // ---- flooding ----

    /// Floods the current LSD snapshot, plus `extra` advertisements, to every
    /// TWO_WAY neighbor. Returns the number of sends started.
    pub async fn broadcast_update(self: &Arc<Self>, extra: Vec<Lsa>) -> usize {
        let packet = {
            let state = self.state.lock().await;
            let mut advertisements = state.lsd.all_entries();
            advertisements.extend(extra);
            Packet::ls_update(&self.identity, self.settings.ttl_budget_ms, advertisements)
        };
        self.flood(packet, None).await
    }

    /// Sends `packet` to each TWO_WAY neighbor except `exclude`. Fire and
    /// forget: failures are only logged.
    async fn flood(self: &Arc<Self>, packet: Packet, exclude: Option<&str>) -> usize {
        let targets: Vec<RouterIdentity> = {
            let state = self.state.lock().await;
            state
                .links
                .two_way_peers()
                .into_iter()
                .filter(|peer| exclude != Some(peer.simulated_address.as_str()))
                .collect()
        };

        let timeout = self.settings.io_timeout();
        for target in &targets {
            let outbound = packet.relayed(&self.identity, &target.simulated_address);
            let target = target.clone();
            tokio::spawn(async move {
                if let Err(e) = deliver(&target.process_host, target.process_port, &outbound, timeout).await {
                    error!("LSUPDATE to {} failed: {}", target.simulated_address, e);
                }
            });
        }
        debug!("Flooded update from {} to {} neighbor(s)", packet.origin_router_id, targets.len());
        targets.len()
    }

    // ---- handshake ----

    /// Client side of the HELLO exchange on an existing link.
    async fn hello_exchange(&self, peer: &RouterIdentity, weight: u16) -> Result<()> {
        let peer_id = peer.simulated_address.as_str();
        self.state.lock().await.links.set_status(peer_id, LinkStatus::Init);

        let hello = Packet::hello(&self.identity, peer_id, weight);
        let mut conn = PeerConnection::connect(&peer.process_host, peer.process_port, self.settings.io_timeout()).await?;
        let reply = conn.request(&hello, &[PacketKind::Hello]).await?;
        info!("received HELLO from {};", reply.src_simulated_addr);

        if reply.src_simulated_addr != peer_id {
            self.state.lock().await.links.set_status(peer_id, LinkStatus::None);
            return Err(RouterError::IdentityMismatch {
                expected: peer_id.to_string(),
                actual: reply.src_simulated_addr,
            });
        }

        if !self.state.lock().await.links.set_status(peer_id, LinkStatus::TwoWay) {
            return Err(RouterError::NoSuchLink(peer_id.to_string()));
        }
        info!("set {} state to TWO_WAY;", peer_id);

        if let Err(e) = conn.send(&hello).await {
            self.state.lock().await.links.set_status(peer_id, LinkStatus::Init);
            return Err(e);
        }
        Ok(())
    }

    // ---- inbound packets ----

    /// Mirrors an operator attach made on the sending router.
    pub async fn handle_attach(&self, conn: &mut PeerConnection, packet: Packet) -> Result<()> {
        let sender = packet.sender();
        let rejection = {
            let mut state = self.state.lock().await;
            match state.attach_link(sender.clone(), packet.link_weight) {
                Ok(slot) => {
                    info!("Attached {} on port {} at its request", sender.simulated_address, slot);
                    None
                }
                Err(RouterError::DuplicateLink(_)) => {
                    if let Some(link) = state.links.get_by_peer_mut(&sender.simulated_address) {
                        link.peer = sender.clone();
                    }
                    Some(AttachRejection::Duplicate)
                }
                Err(e) => {
                    warn!("Refusing attach from {}: {}", sender.simulated_address, e);
                    Some(AttachRejection::Full)
                }
            }
        };
        let reply = Packet::attach_reply(&self.identity, &sender.simulated_address, rejection);
        conn.send(&reply).await
    }

    /// Server side of the HELLO exchange. An unknown sender gets a link of its
    /// own if a port is free.
    pub async fn handle_hello(self: &Arc<Self>, conn: &mut PeerConnection, packet: Packet) -> Result<()> {
        let sender = packet.sender();
        let peer_id = sender.simulated_address.clone();
        info!("received HELLO from {};", peer_id);

        let weight = {
            let mut state = self.state.lock().await;
            match state.links.get_by_peer_mut(&peer_id) {
                Some(link) => {
                    link.peer = sender.clone();
                    link.status = LinkStatus::Init;
                    link.weight
                }
                None => {
                    let slot = state.attach_link(sender.clone(), packet.link_weight).inspect_err(|e| {
                        warn!("Ignoring HELLO from {}: {}", peer_id, e);
                    })?;
                    info!("Attached {} on port {} on first HELLO", peer_id, slot);
                    packet.link_weight
                }
            }
        };
        info!("set {} state to INIT;", peer_id);

        conn.send(&Packet::hello(&self.identity, &peer_id, weight)).await?;
        let ack = conn.recv_kind(&[PacketKind::Hello]).await?;
        info!("received HELLO from {};", ack.src_simulated_addr);
        if ack.src_simulated_addr != peer_id {
            return Err(RouterError::IdentityMismatch {
                expected: peer_id,
                actual: ack.src_simulated_addr,
            });
        }

        if !self.state.lock().await.links.set_status(&peer_id, LinkStatus::TwoWay) {
            return Err(RouterError::NoSuchLink(peer_id));
        }
        info!("set {} state to TWO_WAY;", peer_id);

        self.broadcast_update(Vec::new()).await;
        Ok(())
    }

    pub async fn handle_ls_update(self: &Arc<Self>, packet: Packet) {
        let now_ms = Utc::now().timestamp_millis();
        let outcome = self.state.lock().await.apply_update(&packet, now_ms);
        match &outcome {
            UpdateOutcome::Echo => debug!("Dropping our own update relayed by {}", packet.src_simulated_addr),
            UpdateOutcome::Expired { overdue_ms } => {
                debug!("Dropping update from {}: TTL exceeded by {} ms", packet.origin_router_id, overdue_ms)
            }
            UpdateOutcome::Applied {
                accepted,
                withdrawn,
                weights_resynced,
            } => {
                debug!(
                    "Update from {} via {}: {} accepted, {} withdrawn, {} weight(s) resynced",
                    packet.origin_router_id, packet.src_simulated_addr, accepted, withdrawn, weights_resynced
                );
            }
        }
        if outcome.should_relay() {
            let sender = packet.src_simulated_addr.clone();
            self.flood(packet, Some(&sender)).await;
        }
    }

    /// The peer removed its end of our link.
    pub async fn handle_disconnect(self: &Arc<Self>, packet: Packet) -> Result<()> {
        let peer_id = packet.src_simulated_addr;
        self.state.lock().await.detach_link(&LinkSelector::Peer(peer_id.clone()))?;
        info!("{} disconnected from us", peer_id);
        self.broadcast_update(Vec::new()).await;
        Ok(())
    }

    /// The peer is shutting down: drop the link, forget its LSA and tell
    /// everyone else it is gone.
    pub async fn handle_exit(self: &Arc<Self>, packet: Packet) -> Result<()> {
        let peer_id = packet.src_simulated_addr;
        let withdrawal = {
            let mut state = self.state.lock().await;
            if let Err(e) = state.detach_link(&LinkSelector::Peer(peer_id.clone())) {
                debug!("EXIT from {} without a link: {}", peer_id, e);
            }
            let last_known = state.lsd.remove(&peer_id);
            state.recompute();
            Lsa::withdrawal_of(last_known, &peer_id)
        };
        info!("{} has quit, withdrawing it", peer_id);
        self.broadcast_update(vec![withdrawal]).await;
        Ok(())
    }
}
