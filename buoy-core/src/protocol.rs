//! Buoy wire protocol: message kinds, frame type, identifiers.

use std::fmt;
use std::str::FromStr;

use crate::address::HardwareAddress;

/// Wire identifier of a node. Masters use 0; unidentified slaves use -1.
pub type BuoyId = i32;

/// Receiver id meaning "whichever role expects this kind".
pub const BROADCAST_ID: BuoyId = -1;

/// Identifier a node uses on the wire while it has none assigned.
pub const UNASSIGNED_ID: BuoyId = -1;

/// Identifier the master uses for itself.
pub const MASTER_ID: BuoyId = 0;

/// Capacity of each text field on the wire, terminator included.
pub const TEXT_FIELD_LEN: usize = 40;

/// Longest payload that fits a text field with its terminator.
pub const MAX_PAYLOAD_LEN: usize = TEXT_FIELD_LEN - 1;

/// Separator between address and id in an ID_REPLY payload.
pub const ID_REPLY_SEPARATOR: &str = " : ";

/// The four message kinds of the election protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Unidentified node asking whether a master exists. Empty payload.
    MasterDetection,
    /// Master announcing itself. Payload: master address.
    MasterReply,
    /// Slave asking for an id. Payload: slave address.
    IdRequest,
    /// Master assigning an id. Payload: `<slave address> : <id>`.
    IdReply,
}

impl MessageKind {
    pub const ALL: [MessageKind; 4] = [
        MessageKind::MasterDetection,
        MessageKind::MasterReply,
        MessageKind::IdRequest,
        MessageKind::IdReply,
    ];

    /// Name carried in the kind field of a frame.
    pub fn wire_name(self) -> &'static str {
        match self {
            MessageKind::MasterDetection => "MASTER_DETECTION",
            MessageKind::MasterReply => "MASTER_REPLY",
            MessageKind::IdRequest => "ID_REQUEST",
            MessageKind::IdReply => "ID_REPLY",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for MessageKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageKind::ALL
            .into_iter()
            .find(|k| k.wire_name() == s)
            .ok_or(())
    }
}

/// One message exchanged over the radio link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sender_id: BuoyId,
    pub receiver_id: BuoyId,
    pub kind: MessageKind,
    pub payload: String,
}

impl Frame {
    pub fn master_detection(sender_id: BuoyId) -> Self {
        Frame {
            sender_id,
            receiver_id: BROADCAST_ID,
            kind: MessageKind::MasterDetection,
            payload: String::new(),
        }
    }

    pub fn master_reply(sender_id: BuoyId, master: HardwareAddress) -> Self {
        Frame {
            sender_id,
            receiver_id: BROADCAST_ID,
            kind: MessageKind::MasterReply,
            payload: master.to_string(),
        }
    }

    pub fn id_request(sender_id: BuoyId, requester: HardwareAddress) -> Self {
        Frame {
            sender_id,
            receiver_id: BROADCAST_ID,
            kind: MessageKind::IdRequest,
            payload: requester.to_string(),
        }
    }

    pub fn id_reply(sender_id: BuoyId, requester: HardwareAddress, id: BuoyId) -> Self {
        Frame {
            sender_id,
            receiver_id: BROADCAST_ID,
            kind: MessageKind::IdReply,
            payload: format!("{}{}{}", requester, ID_REPLY_SEPARATOR, id),
        }
    }

    /// Address carried by a MASTER_REPLY or ID_REQUEST payload.
    pub fn advertised_address(&self) -> Option<HardwareAddress> {
        self.payload.parse().ok()
    }

    /// Split an ID_REPLY payload into the requester address and the assigned id.
    pub fn id_assignment(&self) -> Option<(HardwareAddress, BuoyId)> {
        let (addr, id) = self.payload.split_once(ID_REPLY_SEPARATOR)?;
        Some((addr.parse().ok()?, id.trim().parse().ok()?))
    }
}
