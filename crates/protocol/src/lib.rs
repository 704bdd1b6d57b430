//! whispr-protocol – wire formats for the control plane and audio relay
//!
//! `control` defines the JSON control envelope (§4.1, §6); `wire` frames it
//! over TCP with a length prefix; `audio` parses the fixed 16-byte header
//! that precedes every UDP audio datagram.

pub mod audio;
pub mod control;
pub mod wire;

pub use control::{ControlMessage, ControlPayload, ErrorCode, PermissionState};
pub use wire::FrameCodec;
