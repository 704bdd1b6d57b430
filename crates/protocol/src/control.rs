//! Control-plane message types (§6)
//!
//! Every message on the wire is `{ "type": <string>, "payload": <object> }`.
//! `ControlPayload` is the adjacently-tagged enum that realizes this; the
//! `type` string selects the variant, `payload` carries its fields.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error codes returned to clients (§6, §7). Never leaks internal error
/// text — only one of these fixed strings plus a human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidPayload,
    InvalidMessage,
    Unauthorized,
    InvalidToken,
    Forbidden,
    AccessDenied,
    JoinFailed,
    CreateFailed,
    NotInRoom,
    AlreadyLoggedIn,
    RateLimited,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPayload => "invalid_payload",
            Self::InvalidMessage => "invalid_message",
            Self::Unauthorized => "unauthorized",
            Self::InvalidToken => "invalid_token",
            Self::Forbidden => "forbidden",
            Self::AccessDenied => "access_denied",
            Self::JoinFailed => "join_failed",
            Self::CreateFailed => "create_failed",
            Self::NotInRoom => "not_in_room",
            Self::AlreadyLoggedIn => "already_logged_in",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// Three-valued permission state (§3, §4.5). Encoding matches the
/// persistence layout in §6: 0=Allow, 1=Deny, 2=Neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Allow,
    Deny,
    Neutral,
}

impl PermissionState {
    pub fn as_db_int(&self) -> i64 {
        match self {
            Self::Allow => 0,
            Self::Deny => 1,
            Self::Neutral => 2,
        }
    }

    pub fn from_db_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Allow),
            1 => Some(Self::Deny),
            2 => Some(Self::Neutral),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared view types embedded in several payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberView {
    pub user_id: Uuid,
    pub username: String,
    pub client_id: Option<u32>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStateView {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub member_ids: Vec<Uuid>,
    pub members: Vec<MemberView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub id: Uuid,
    pub name: String,
    pub member_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionView {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermissionEntry {
    pub permission_id: String,
    pub state: PermissionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleView {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<RolePermissionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRoleStateEntry {
    pub role_id: Uuid,
    pub permission_id: String,
    pub state: PermissionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelUserStateEntry {
    pub user_id: Uuid,
    pub permission_id: String,
    pub state: PermissionState,
}

// ---------------------------------------------------------------------------
// Payload structs, one per message type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUdpResponse {
    pub client_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoined {
    pub room_id: Uuid,
    pub room_name: String,
    #[serde(rename = "type")]
    pub room_type: String,
    pub member_ids: Vec<Uuid>,
    pub members: Vec<MemberView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_material: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerState {
    pub channels: Vec<ChannelStateView>,
    pub can_create_channel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoom {
    pub room_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoom {
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomLeft {
    pub room_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomList {
    pub rooms: Vec<ChannelSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberEvent {
    pub user_id: Uuid,
    pub username: String,
    pub client_id: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessage {
    pub channel_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceived {
    #[serde(flatten)]
    pub message: MessageView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMessageHistory {
    pub channel_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHistory {
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditMessage {
    pub channel_id: Uuid,
    pub message_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageUpdated {
    #[serde(flatten)]
    pub message: MessageView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMessage {
    pub channel_id: Uuid,
    pub message_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeleted {
    pub channel_id: Uuid,
    pub message_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsList {
    pub permissions: Vec<PermissionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesList {
    pub roles: Vec<RoleView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUserPermissions {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPermissions {
    pub user_id: Uuid,
    pub permissions: Vec<RolePermissionEntry>,
    pub role_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUserPermission {
    pub user_id: Uuid,
    pub permission_id: String,
    pub state: Option<PermissionState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub assign: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChannelPermissions {
    pub channel_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPermissions {
    pub channel_id: Uuid,
    pub role_states: Vec<ChannelRoleStateEntry>,
    pub user_states: Vec<ChannelUserStateEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetChannelRolePermission {
    pub channel_id: Uuid,
    pub role_id: Uuid,
    pub permission_id: String,
    pub state: Option<PermissionState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetChannelUserPermission {
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub permission_id: String,
    pub state: Option<PermissionState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// The envelope
// ---------------------------------------------------------------------------

/// The full set of control-plane message types (§6). Serializes as
/// `{ "type": "<snake_case variant>", "payload": <struct|null> }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlPayload {
    LoginRequest(LoginRequest),
    LoginResponse(LoginResponse),
    RegisterUdp,
    RegisterUdpResponse(RegisterUdpResponse),
    RoomJoined(RoomJoined),
    ServerState(ServerState),
    JoinRoom(JoinRoom),
    CreateRoom(CreateRoom),
    LeaveRoom,
    RoomLeft(RoomLeft),
    RequestRoomList,
    RoomList(RoomList),
    RequestServerState,
    MemberJoined(MemberEvent),
    MemberLeft(MemberEvent),
    MemberUdpRegistered(MemberEvent),
    SendMessage(SendMessage),
    MessageReceived(MessageReceived),
    GetMessageHistory(GetMessageHistory),
    MessageHistory(MessageHistory),
    EditMessage(EditMessage),
    MessageUpdated(MessageUpdated),
    DeleteMessage(DeleteMessage),
    MessageDeleted(MessageDeleted),
    ListPermissions,
    PermissionsList(PermissionsList),
    ListRoles,
    RolesList(RolesList),
    GetUserPermissions(GetUserPermissions),
    UserPermissions(UserPermissions),
    SetUserPermission(SetUserPermission),
    SetUserRole(SetUserRole),
    GetChannelPermissions(GetChannelPermissions),
    ChannelPermissions(ChannelPermissions),
    SetChannelRolePermission(SetChannelRolePermission),
    SetChannelUserPermission(SetChannelUserPermission),
    Ping,
    Pong,
    Error(ErrorPayload),
}

impl ControlPayload {
    /// The wire `type` string for this payload, used for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::LoginRequest(_) => "login_request",
            Self::LoginResponse(_) => "login_response",
            Self::RegisterUdp => "register_udp",
            Self::RegisterUdpResponse(_) => "register_udp_response",
            Self::RoomJoined(_) => "room_joined",
            Self::ServerState(_) => "server_state",
            Self::JoinRoom(_) => "join_room",
            Self::CreateRoom(_) => "create_room",
            Self::LeaveRoom => "leave_room",
            Self::RoomLeft(_) => "room_left",
            Self::RequestRoomList => "request_room_list",
            Self::RoomList(_) => "room_list",
            Self::RequestServerState => "request_server_state",
            Self::MemberJoined(_) => "member_joined",
            Self::MemberLeft(_) => "member_left",
            Self::MemberUdpRegistered(_) => "member_udp_registered",
            Self::SendMessage(_) => "send_message",
            Self::MessageReceived(_) => "message_received",
            Self::GetMessageHistory(_) => "get_message_history",
            Self::MessageHistory(_) => "message_history",
            Self::EditMessage(_) => "edit_message",
            Self::MessageUpdated(_) => "message_updated",
            Self::DeleteMessage(_) => "delete_message",
            Self::MessageDeleted(_) => "message_deleted",
            Self::ListPermissions => "list_permissions",
            Self::PermissionsList(_) => "permissions_list",
            Self::ListRoles => "list_roles",
            Self::RolesList(_) => "roles_list",
            Self::GetUserPermissions(_) => "get_user_permissions",
            Self::UserPermissions(_) => "user_permissions",
            Self::SetUserPermission(_) => "set_user_permission",
            Self::SetUserRole(_) => "set_user_role",
            Self::GetChannelPermissions(_) => "get_channel_permissions",
            Self::ChannelPermissions(_) => "channel_permissions",
            Self::SetChannelRolePermission(_) => "set_channel_role_permission",
            Self::SetChannelUserPermission(_) => "set_channel_user_permission",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error(_) => "error",
        }
    }
}

/// A full control message: the client-assigned `request_id` (echoed back on
/// responses so clients can correlate; 0 for server-initiated fan-out) plus
/// the typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    pub request_id: u32,
    #[serde(flatten)]
    pub payload: ControlPayload,
}

impl ControlMessage {
    pub fn new(request_id: u32, payload: ControlPayload) -> Self {
        Self { request_id, payload }
    }

    pub fn ping(request_id: u32) -> Self {
        Self::new(request_id, ControlPayload::Ping)
    }

    pub fn pong(request_id: u32) -> Self {
        Self::new(request_id, ControlPayload::Pong)
    }

    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            ControlPayload::Error(ErrorPayload {
                code,
                message: message.into(),
            }),
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_round_trips_with_tagged_envelope() {
        let msg = ControlMessage::new(
            1,
            ControlPayload::LoginRequest(LoginRequest {
                username: "admin".into(),
                password: "admin".into(),
            }),
        );
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"login_request\""));
        assert!(json.contains("\"payload\":{"));

        let decoded = ControlMessage::from_json(&json).unwrap();
        match decoded.payload {
            ControlPayload::LoginRequest(req) => {
                assert_eq!(req.username, "admin");
                assert_eq!(req.password, "admin");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn unit_variants_round_trip_without_payload_fields() {
        let msg = ControlMessage::ping(7);
        let json = msg.to_json().unwrap();
        let decoded = ControlMessage::from_json(&json).unwrap();
        assert!(matches!(decoded.payload, ControlPayload::Ping));
        assert_eq!(decoded.request_id, 7);
    }

    #[test]
    fn error_payload_carries_code_and_message() {
        let msg = ControlMessage::error(3, ErrorCode::AccessDenied, "no access");
        let json = msg.to_json().unwrap();
        let decoded = ControlMessage::from_json(&json).unwrap();
        match decoded.payload {
            ControlPayload::Error(e) => {
                assert_eq!(e.code, ErrorCode::AccessDenied);
                assert_eq!(e.message, "no access");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn permission_state_db_encoding_matches_spec() {
        assert_eq!(PermissionState::Allow.as_db_int(), 0);
        assert_eq!(PermissionState::Deny.as_db_int(), 1);
        assert_eq!(PermissionState::Neutral.as_db_int(), 2);
        assert_eq!(PermissionState::from_db_int(0), Some(PermissionState::Allow));
        assert_eq!(PermissionState::from_db_int(2), Some(PermissionState::Neutral));
        assert_eq!(PermissionState::from_db_int(9), None);
    }

    #[test]
    fn error_code_strings_match_spec_table() {
        assert_eq!(ErrorCode::InvalidPayload.as_str(), "invalid_payload");
        assert_eq!(ErrorCode::AlreadyLoggedIn.as_str(), "already_logged_in");
        assert_eq!(ErrorCode::RateLimited.as_str(), "rate_limited");
    }
}
