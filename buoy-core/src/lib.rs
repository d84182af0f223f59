//! Buoy election protocol reference implementation.
//! Host-driven: no I/O; host passes inbound frames and sends the frames it gets back.

pub mod address;
pub mod core;
pub mod protocol;
pub mod registry;
pub mod wire;

pub use address::{AddressParseError, HardwareAddress, ADDRESS_LEN};
pub use core::{BuoyNode, NodeError, NodeInfo, OutboundFrame, Role};
pub use protocol::{BuoyId, Frame, MessageKind, BROADCAST_ID, MASTER_ID, UNASSIGNED_ID};
pub use registry::{PeerRegistry, RegistryEntry, RegistryError};
pub use wire::{decode_frame, encode_frame, FrameDecodeError, FrameEncodeError, FRAME_LEN};
