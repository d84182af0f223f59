//! Host-driven node: the host passes inbound frames in and sends whatever frame comes back.
//!
//! A node starts with no role. It becomes a slave when a master answers its detection
//! broadcast, or a master when the host decides nobody answered in time. The role never
//! changes afterwards. Only the master keeps a [`PeerRegistry`].

use std::fmt;

use tracing::{debug, error, info, trace, warn};

use crate::address::HardwareAddress;
use crate::protocol::{BuoyId, Frame, MessageKind, BROADCAST_ID, MASTER_ID, UNASSIGNED_ID};
use crate::registry::{PeerRegistry, RegistryError};
use crate::wire::{self, FrameEncodeError};

/// Role of a node in the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Unknown,
    Slave,
    Master,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Unknown => "Unattributed",
            Role::Slave => "Slave",
            Role::Master => "Master",
        })
    }
}

/// Frame for the host to put on the air.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Hardware address the host should send to.
    pub destination: HardwareAddress,
    pub frame: Frame,
    pub bytes: [u8; wire::FRAME_LEN],
}

/// Protocol state of one buoy.
#[derive(Debug)]
pub struct BuoyNode {
    own_address: HardwareAddress,
    role: Role,
    assigned_id: Option<BuoyId>,
    peer_address: HardwareAddress,
    registry: Option<PeerRegistry>,
}

impl BuoyNode {
    pub fn new(own_address: HardwareAddress) -> Self {
        Self {
            own_address,
            role: Role::Unknown,
            assigned_id: None,
            peer_address: HardwareAddress::BROADCAST,
            registry: None,
        }
    }

    pub fn own_address(&self) -> HardwareAddress {
        self.own_address
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn assigned_id(&self) -> Option<BuoyId> {
        self.assigned_id
    }

    /// Current communication target: broadcast until a slave learns its master.
    pub fn peer_address(&self) -> HardwareAddress {
        self.peer_address
    }

    /// Registry of known slaves. `None` unless this node is the master.
    pub fn registry(&self) -> Option<&PeerRegistry> {
        self.registry.as_ref()
    }

    /// Identifier this node uses on the wire.
    pub fn wire_id(&self) -> BuoyId {
        self.assigned_id.unwrap_or(UNASSIGNED_ID)
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.assigned_id,
            role: self.role,
            address: self.own_address,
        }
    }

    /// Take the master role. Only legal while the role is undecided.
    pub fn declare_master(&mut self) -> Result<(), NodeError> {
        self.ensure_undecided()?;
        self.role = Role::Master;
        self.assigned_id = Some(MASTER_ID);
        self.peer_address = HardwareAddress::BROADCAST;
        self.registry = Some(PeerRegistry::new());
        info!(address = %self.own_address, "declared master");
        Ok(())
    }

    /// Take the slave role with a known master address. Only legal while the role is undecided.
    pub fn declare_slave(&mut self, master: HardwareAddress) -> Result<(), NodeError> {
        self.ensure_undecided()?;
        self.become_slave(master);
        Ok(())
    }

    /// MASTER_DETECTION broadcast, sent while looking for a master.
    pub fn master_detection(&self) -> Result<OutboundFrame, NodeError> {
        self.ensure_role(Role::Unknown)?;
        let frame = Frame::master_detection(self.wire_id());
        Ok(self.encode(frame, HardwareAddress::BROADCAST)?)
    }

    /// ID_REQUEST to the discovered master.
    pub fn id_request(&self) -> Result<OutboundFrame, NodeError> {
        self.ensure_role(Role::Slave)?;
        let frame = Frame::id_request(self.wire_id(), self.own_address);
        Ok(self.encode(frame, self.peer_address)?)
    }

    /// Process one raw inbound frame. Never fails: undecodable, unknown or
    /// mis-addressed frames are dropped.
    pub fn handle_inbound(&mut self, bytes: &[u8]) -> Option<OutboundFrame> {
        match wire::decode_frame(bytes) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => {
                debug!(error = %e, len = bytes.len(), "dropping undecodable frame");
                None
            }
        }
    }

    /// Process one decoded frame.
    pub fn handle_frame(&mut self, frame: Frame) -> Option<OutboundFrame> {
        if !self.is_addressed_to_me(frame.receiver_id) {
            trace!(receiver_id = frame.receiver_id, "frame addressed elsewhere");
            return None;
        }
        match (self.role, frame.kind) {
            (Role::Unknown, MessageKind::MasterReply) => {
                self.accept_master(&frame);
                None
            }
            (Role::Slave, MessageKind::IdReply) => {
                self.accept_id(&frame);
                None
            }
            (Role::Master, MessageKind::MasterDetection) => self.reply(Frame::master_reply(
                self.wire_id(),
                self.own_address,
            )),
            (Role::Master, MessageKind::IdRequest) => self.assign_id(&frame),
            (role, kind) => {
                trace!(%role, %kind, "no transition");
                None
            }
        }
    }

    fn is_addressed_to_me(&self, receiver_id: BuoyId) -> bool {
        receiver_id == BROADCAST_ID || receiver_id == self.wire_id()
    }

    fn accept_master(&mut self, frame: &Frame) {
        match frame.advertised_address() {
            Some(master) => self.become_slave(master),
            None => debug!(payload = %frame.payload, "MASTER_REPLY without a valid address"),
        }
    }

    fn become_slave(&mut self, master: HardwareAddress) {
        self.role = Role::Slave;
        self.peer_address = master;
        info!(%master, "master found, acting as slave");
    }

    fn accept_id(&mut self, frame: &Frame) {
        let Some((address, id)) = frame.id_assignment() else {
            debug!(payload = %frame.payload, "malformed ID_REPLY");
            return;
        };
        if address != self.own_address {
            trace!(%address, "ID_REPLY for another buoy");
            return;
        }
        if let Some(old) = self.assigned_id.filter(|&old| old != id) {
            warn!(old, new = id, "master reassigned our id");
        }
        self.assigned_id = Some(id);
        info!(id, "my new ID");
    }

    fn assign_id(&mut self, frame: &Frame) -> Option<OutboundFrame> {
        let Some(requester) = frame.advertised_address() else {
            debug!(payload = %frame.payload, "ID_REQUEST without a valid address");
            return None;
        };
        let Some(registry) = self.registry.as_mut() else {
            error!("master without a registry");
            return None;
        };
        let id = match registry.lookup_or_register(requester) {
            Ok((id, true)) => {
                info!(id, address = %requester, "new buoy registered\n{}", registry);
                id
            }
            Ok((id, false)) => {
                info!(id, address = %requester, "buoy known");
                id
            }
            Err(e @ RegistryError::AlreadyRegistered { .. }) => {
                error!(error = %e, "registry invariant violated");
                return None;
            }
            Err(e) => {
                error!(error = %e, address = %requester, "cannot assign id");
                return None;
            }
        };
        self.reply(Frame::id_reply(self.wire_id(), requester, id))
    }

    fn reply(&self, frame: Frame) -> Option<OutboundFrame> {
        match self.encode(frame, self.peer_address) {
            Ok(out) => Some(out),
            Err(e) => {
                error!(error = %e, "cannot encode reply");
                None
            }
        }
    }

    fn encode(
        &self,
        frame: Frame,
        destination: HardwareAddress,
    ) -> Result<OutboundFrame, FrameEncodeError> {
        let bytes = wire::encode_frame(&frame)?;
        Ok(OutboundFrame {
            destination,
            frame,
            bytes,
        })
    }

    fn ensure_undecided(&self) -> Result<(), NodeError> {
        match self.role {
            Role::Unknown => Ok(()),
            decided => Err(NodeError::RoleDecided(decided)),
        }
    }

    fn ensure_role(&self, expected: Role) -> Result<(), NodeError> {
        if self.role == expected {
            Ok(())
        } else {
            Err(NodeError::WrongRole {
                expected,
                actual: self.role,
            })
        }
    }
}

/// Snapshot of a node for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: Option<BuoyId>,
    pub role: Role,
    pub address: HardwareAddress,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "------ new board informations ------")?;
        match self.id {
            Some(id) => writeln!(f, "myID : {}", id)?,
            None => writeln!(f, "myID : Unattributed")?,
        }
        writeln!(f, "ESPstatus : {}", self.role)?;
        writeln!(f, "MAC address : {}", self.address)?;
        write!(f, "------------------------------------")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    #[error("role already decided: {0}")]
    RoleDecided(Role),
    #[error("requires role {expected}, node is {actual}")]
    WrongRole { expected: Role, actual: Role },
    #[error("encode failed: {0}")]
    Encode(#[from] FrameEncodeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode_frame;

    fn addr(s: &str) -> HardwareAddress {
        s.parse().unwrap()
    }

    fn master() -> BuoyNode {
        let mut node = BuoyNode::new(addr("24:6F:28:00:00:01"));
        node.declare_master().unwrap();
        node
    }

    fn id_request_bytes(requester: &str) -> [u8; wire::FRAME_LEN] {
        encode_frame(&Frame::id_request(UNASSIGNED_ID, addr(requester))).unwrap()
    }

    #[test]
    fn starts_unknown_without_registry() {
        let node = BuoyNode::new(addr("24:6F:28:00:00:01"));
        assert_eq!(node.role(), Role::Unknown);
        assert_eq!(node.assigned_id(), None);
        assert_eq!(node.wire_id(), UNASSIGNED_ID);
        assert!(node.peer_address().is_broadcast());
        assert!(node.registry().is_none());
    }

    #[test]
    fn declare_master_starts_empty_registry() {
        let node = master();
        assert_eq!(node.role(), Role::Master);
        assert_eq!(node.assigned_id(), Some(MASTER_ID));
        assert_eq!(node.registry().map(|r| r.count()), Some(0));
    }

    #[test]
    fn master_answers_detection() {
        let mut node = master();
        let bytes = encode_frame(&Frame::master_detection(UNASSIGNED_ID)).unwrap();
        let out = node.handle_inbound(&bytes).expect("MASTER_REPLY");
        assert_eq!(out.frame.kind, MessageKind::MasterReply);
        assert_eq!(out.frame.sender_id, MASTER_ID);
        assert_eq!(out.frame.receiver_id, BROADCAST_ID);
        assert_eq!(out.frame.payload, "24:6F:28:00:00:01");
        assert!(out.destination.is_broadcast());
        assert_eq!(wire::decode_frame(&out.bytes).unwrap(), out.frame);
    }

    #[test]
    fn master_assigns_first_id() {
        let mut node = master();
        let out = node
            .handle_inbound(&id_request_bytes("AA:BB:CC:DD:EE:FF"))
            .expect("ID_REPLY");
        assert_eq!(out.frame.kind, MessageKind::IdReply);
        assert_eq!(out.frame.receiver_id, BROADCAST_ID);
        assert_eq!(out.frame.payload, "AA:BB:CC:DD:EE:FF : 0");
        let reg = node.registry().unwrap();
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.find(&addr("AA:BB:CC:DD:EE:FF")), Some(0));
    }

    #[test]
    fn repeated_request_reuses_id() {
        let mut node = master();
        node.handle_inbound(&id_request_bytes("AA:BB:CC:DD:EE:FF"));
        let out = node
            .handle_inbound(&id_request_bytes("AA:BB:CC:DD:EE:FF"))
            .expect("ID_REPLY");
        assert_eq!(out.frame.payload, "AA:BB:CC:DD:EE:FF : 0");
        assert_eq!(node.registry().unwrap().count(), 1);
    }

    #[test]
    fn lowercase_request_matches_known_address() {
        let mut node = master();
        node.handle_inbound(&id_request_bytes("AA:BB:CC:DD:EE:FF"));
        let mut frame = Frame::id_request(UNASSIGNED_ID, addr("AA:BB:CC:DD:EE:FF"));
        frame.payload = "aa:bb:cc:dd:ee:ff".into();
        let out = node.handle_frame(frame).expect("ID_REPLY");
        assert_eq!(out.frame.payload, "AA:BB:CC:DD:EE:FF : 0");
        assert_eq!(node.registry().unwrap().count(), 1);
    }

    #[test]
    fn second_address_gets_next_id() {
        let mut node = master();
        node.handle_inbound(&id_request_bytes("AA:BB:CC:DD:EE:FF"));
        let out = node
            .handle_inbound(&id_request_bytes("11:22:33:44:55:66"))
            .expect("ID_REPLY");
        assert_eq!(out.frame.payload, "11:22:33:44:55:66 : 1");
        assert_eq!(node.registry().unwrap().count(), 2);
    }

    #[test]
    fn request_with_bad_address_is_dropped() {
        let mut node = master();
        let mut frame = Frame::id_request(UNASSIGNED_ID, addr("AA:BB:CC:DD:EE:FF"));
        frame.payload = "garbage".into();
        assert!(node.handle_frame(frame).is_none());
        assert_eq!(node.registry().unwrap().count(), 0);
    }

    #[test]
    fn master_reply_makes_unknown_a_slave() {
        let mut node = BuoyNode::new(addr("24:6F:28:00:00:02"));
        let reply = Frame::master_reply(MASTER_ID, addr("24:6F:28:00:00:01"));
        assert!(node.handle_frame(reply).is_none());
        assert_eq!(node.role(), Role::Slave);
        assert_eq!(node.peer_address(), addr("24:6F:28:00:00:01"));
        assert_eq!(node.assigned_id(), None);
        assert!(node.registry().is_none());
    }

    #[test]
    fn slave_takes_id_from_reply() {
        let own = addr("24:6F:28:00:00:02");
        let mut node = BuoyNode::new(own);
        node.declare_slave(addr("24:6F:28:00:00:01")).unwrap();
        let reply = Frame::id_reply(MASTER_ID, own, 3);
        assert!(node.handle_frame(reply).is_none());
        assert_eq!(node.assigned_id(), Some(3));
        assert_eq!(node.wire_id(), 3);
    }

    #[test]
    fn slave_ignores_reply_for_other_buoy() {
        let mut node = BuoyNode::new(addr("24:6F:28:00:00:02"));
        node.declare_slave(addr("24:6F:28:00:00:01")).unwrap();
        node.handle_frame(Frame::id_reply(MASTER_ID, addr("24:6F:28:00:00:03"), 5));
        assert_eq!(node.assigned_id(), None);
    }

    #[test]
    fn misaddressed_frame_is_dropped() {
        let own = addr("24:6F:28:00:00:02");
        let mut node = BuoyNode::new(own);
        node.declare_slave(addr("24:6F:28:00:00:01")).unwrap();
        let mut reply = Frame::id_reply(MASTER_ID, own, 3);
        reply.receiver_id = 7;
        assert!(node.handle_frame(reply).is_none());
        assert_eq!(node.assigned_id(), None);

        let mut m = master();
        let mut request = Frame::id_request(UNASSIGNED_ID, addr("AA:BB:CC:DD:EE:FF"));
        request.receiver_id = 4;
        assert!(m.handle_frame(request).is_none());
        assert_eq!(m.registry().unwrap().count(), 0);
    }

    #[test]
    fn unknown_kind_is_dropped() {
        let mut node = master();
        let mut bytes = id_request_bytes("AA:BB:CC:DD:EE:FF");
        bytes[8..48].fill(0);
        bytes[8..17].copy_from_slice(b"HEARTBEAT");
        assert!(node.handle_inbound(&bytes).is_none());
        assert_eq!(node.registry().unwrap().count(), 0);
    }

    #[test]
    fn undecodable_bytes_are_dropped() {
        let mut node = master();
        assert!(node.handle_inbound(&[1, 2, 3]).is_none());
        assert_eq!(node.role(), Role::Master);
    }

    #[test]
    fn role_is_decided_once() {
        let mut node = master();
        assert_eq!(
            node.declare_slave(addr("24:6F:28:00:00:09")),
            Err(NodeError::RoleDecided(Role::Master))
        );
        assert_eq!(node.declare_master(), Err(NodeError::RoleDecided(Role::Master)));
        node.handle_frame(Frame::master_reply(MASTER_ID, addr("24:6F:28:00:00:09")));
        assert_eq!(node.role(), Role::Master);

        let mut slave = BuoyNode::new(addr("24:6F:28:00:00:02"));
        slave.handle_frame(Frame::master_reply(MASTER_ID, addr("24:6F:28:00:00:01")));
        assert_eq!(slave.declare_master(), Err(NodeError::RoleDecided(Role::Slave)));
        slave.handle_frame(Frame::master_reply(MASTER_ID, addr("24:6F:28:00:00:09")));
        assert_eq!(slave.role(), Role::Slave);
        assert_eq!(slave.peer_address(), addr("24:6F:28:00:00:01"));
    }

    #[test]
    fn builders_check_role() {
        let own = addr("24:6F:28:00:00:02");
        let mut node = BuoyNode::new(own);
        let detect = node.master_detection().unwrap();
        assert_eq!(detect.frame, Frame::master_detection(UNASSIGNED_ID));
        assert!(detect.destination.is_broadcast());
        assert!(matches!(
            node.id_request(),
            Err(NodeError::WrongRole {
                expected: Role::Slave,
                ..
            })
        ));

        node.declare_slave(addr("24:6F:28:00:00:01")).unwrap();
        let request = node.id_request().unwrap();
        assert_eq!(request.frame.payload, own.to_string());
        assert_eq!(request.destination, addr("24:6F:28:00:00:01"));
        assert!(node.master_detection().is_err());
    }

    #[test]
    fn info_renders_board_block() {
        let node = master();
        let text = node.info().to_string();
        assert!(text.contains("myID : 0"));
        assert!(text.contains("ESPstatus : Master"));
        assert!(text.contains("MAC address : 24:6F:28:00:00:01"));
        let fresh = BuoyNode::new(addr("24:6F:28:00:00:02")).info().to_string();
        assert!(fresh.contains("myID : Unattributed"));
        assert!(fresh.contains("ESPstatus : Unattributed"));
    }
}
