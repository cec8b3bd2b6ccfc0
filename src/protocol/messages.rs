use serde::{Deserialize, Serialize};

use crate::types::{Lsa, RouterIdentity};
use crate::RouterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketKind {
    Hello,
    LsUpdate,
    Attach,
    AttachAck,
    AttachReject,
    Disconnect,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachRejection {
    Duplicate,
    Full,
}

/// The single wire message. Every field is present whatever the kind;
/// `advertisements` is only filled for LSUPDATE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub kind: PacketKind,
    pub src_process_host: String,
    pub src_process_port: u16,
    pub src_simulated_addr: RouterId,
    pub dst_simulated_addr: RouterId,
    pub origin_router_id: RouterId,
    pub ttl_budget_ms: u64,
    pub created_at_ms: i64,
    pub link_weight: u16,
    pub rejection: Option<AttachRejection>,
    pub advertisements: Vec<Lsa>,
}

impl Packet {
    pub fn new(kind: PacketKind, src: &RouterIdentity, dst: &str) -> Self {
        Self {
            kind,
            src_process_host: src.process_host.clone(),
            src_process_port: src.process_port,
            src_simulated_addr: src.simulated_address.clone(),
            dst_simulated_addr: dst.to_string(),
            origin_router_id: src.simulated_address.clone(),
            ttl_budget_ms: 0,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
            link_weight: 0,
            rejection: None,
            advertisements: Vec::new(),
        }
    }

    pub fn hello(src: &RouterIdentity, dst: &str, link_weight: u16) -> Self {
        Self {
            link_weight,
            ..Self::new(PacketKind::Hello, src, dst)
        }
    }

    pub fn attach(src: &RouterIdentity, dst: &str, link_weight: u16) -> Self {
        Self {
            link_weight,
            ..Self::new(PacketKind::Attach, src, dst)
        }
    }

    pub fn attach_reply(src: &RouterIdentity, dst: &str, rejection: Option<AttachRejection>) -> Self {
        let kind = match rejection {
            None => PacketKind::AttachAck,
            Some(_) => PacketKind::AttachReject,
        };
        Self {
            rejection,
            ..Self::new(kind, src, dst)
        }
    }

    pub fn ls_update(src: &RouterIdentity, ttl_budget_ms: u64, advertisements: Vec<Lsa>) -> Self {
        Self {
            ttl_budget_ms,
            advertisements,
            ..Self::new(PacketKind::LsUpdate, src, "")
        }
    }

    /// Copy of a received update re-addressed for the next hop. Origin, budget
    /// and creation time are carried unchanged so the TTL keeps running.
    pub fn relayed(&self, via: &RouterIdentity, dst: &str) -> Self {
        Self {
            src_process_host: via.process_host.clone(),
            src_process_port: via.process_port,
            src_simulated_addr: via.simulated_address.clone(),
            dst_simulated_addr: dst.to_string(),
            ..self.clone()
        }
    }

    /// Identity of whoever sent this packet on the last hop.
    pub fn sender(&self) -> RouterIdentity {
        RouterIdentity::new(
            self.src_process_host.clone(),
            self.src_process_port,
            self.src_simulated_addr.clone(),
        )
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> RouterIdentity {
        RouterIdentity::new("127.0.0.1", 50001, "192.168.1.1")
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&PacketKind::LsUpdate).unwrap();
        assert_eq!(json, "\"LS_UPDATE\"");
        let json = serde_json::to_string(&PacketKind::Hello).unwrap();
        assert_eq!(json, "\"HELLO\"");
    }

    #[test]
    fn test_relayed_keeps_origin_and_clock() {
        let origin = identity();
        let update = Packet::ls_update(&origin, 5000, vec![Lsa::initial("192.168.1.1")]);
        let via = RouterIdentity::new("127.0.0.1", 50002, "192.168.1.2");

        let relay = update.relayed(&via, "192.168.1.3");
        assert_eq!(relay.origin_router_id, "192.168.1.1");
        assert_eq!(relay.src_simulated_addr, "192.168.1.2");
        assert_eq!(relay.dst_simulated_addr, "192.168.1.3");
        assert_eq!(relay.created_at_ms, update.created_at_ms);
        assert_eq!(relay.ttl_budget_ms, 5000);
        assert_eq!(relay.advertisements, update.advertisements);
    }

    #[test]
    fn test_line_framing() {
        let hello = Packet::hello(&identity(), "192.168.1.2", 7);
        let line = hello.to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let parsed = Packet::from_line(&line).unwrap();
        assert_eq!(parsed.kind, PacketKind::Hello);
        assert_eq!(parsed.link_weight, 7);
        assert!(Packet::from_line("{\"kind\":\"HELLO\"}").is_err());
    }

    #[test]
    fn test_attach_reply_kinds() {
        let ack = Packet::attach_reply(&identity(), "192.168.1.2", None);
        assert_eq!(ack.kind, PacketKind::AttachAck);
        let reject = Packet::attach_reply(&identity(), "192.168.1.2", Some(AttachRejection::Full));
        assert_eq!(reject.kind, PacketKind::AttachReject);
        assert_eq!(reject.rejection, Some(AttachRejection::Full));
    }
}
