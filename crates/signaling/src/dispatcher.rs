//! Routes incoming control messages to handlers (§4.2, §4.3)
//!
//! `LoginRequest`, `Ping` and `Pong` are accepted before authentication;
//! everything else requires [`SessionContext::user_id`] to already be set.
//! Admin-only operations are gated a layer further down, inside their
//! handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use whispr_core::types::UserId;
use whispr_db::{ChannelRepository, MessageRepository, PermissionRepository, UserRepository};
use whispr_protocol::control::{ControlMessage, ControlPayload, ErrorCode, MemberEvent};

use crate::handlers::auth_handler::LoginOutcome;
use crate::handlers::{auth_handler, channel_handler, chat_handler, permission_handler, udp_handler};
use crate::server_state::SignalingState;

/// Per-connection state the dispatcher reads and updates across calls.
pub struct SessionContext {
    pub peer_addr: SocketAddr,
    pub user_id: Option<UserId>,
    pub session_token: Option<String>,
    pub is_admin: bool,
}

impl SessionContext {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self { peer_addr, user_id: None, session_token: None, is_admin: false }
    }
}

pub struct MessageDispatcher<R>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    state: Arc<SignalingState<R>>,
}

impl<R> MessageDispatcher<R>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    pub fn new(state: Arc<SignalingState<R>>) -> Self {
        Self { state }
    }

    /// Dispatches one inbound message, returning every message that goes
    /// back on this same connection, in order. Fan-out to other connections
    /// happens inside the handlers via `state.broadcaster`, not here.
    pub async fn dispatch(&self, message: ControlMessage, ctx: &mut SessionContext) -> Vec<ControlMessage> {
        let request_id = message.request_id;

        match message.payload {
            ControlPayload::LoginRequest(req) => {
                if ctx.user_id.is_some() {
                    return vec![ControlMessage::error(request_id, ErrorCode::AlreadyLoggedIn, "already logged in")];
                }

                match auth_handler::handle_login(request_id, req, &self.state).await {
                    LoginOutcome::Success { user_id, token, is_admin, messages } => {
                        ctx.user_id = Some(user_id);
                        ctx.session_token = Some(token);
                        ctx.is_admin = is_admin;
                        messages
                    }
                    LoginOutcome::Failure { message } => vec![message],
                }
            }

            ControlPayload::Ping => vec![ControlMessage::pong(request_id)],
            ControlPayload::Pong => {
                tracing::trace!("pong received");
                Vec::new()
            }

            payload => {
                let Some(user_id) = ctx.user_id else {
                    return vec![ControlMessage::error(request_id, ErrorCode::Unauthorized, "login required")];
                };
                self.dispatch_authenticated(payload, request_id, user_id, ctx.is_admin).await
            }
        }
    }

    async fn dispatch_authenticated(&self, payload: ControlPayload, request_id: u32, user_id: UserId, is_admin: bool) -> Vec<ControlMessage> {
        let result = match payload {
            ControlPayload::RegisterUdp => udp_handler::handle_register_udp(request_id, user_id, &self.state).await,

            ControlPayload::JoinRoom(req) => channel_handler::handle_join_room(request_id, user_id, is_admin, req, &self.state).await,
            ControlPayload::CreateRoom(req) => channel_handler::handle_create_room(request_id, user_id, is_admin, req, &self.state).await,
            ControlPayload::LeaveRoom => channel_handler::handle_leave_room(request_id, user_id, &self.state).await,
            ControlPayload::RequestRoomList => channel_handler::handle_request_room_list(request_id, user_id, is_admin, &self.state).await,
            ControlPayload::RequestServerState => channel_handler::handle_request_server_state(request_id, user_id, is_admin, &self.state).await,

            ControlPayload::SendMessage(req) => chat_handler::handle_send_message(request_id, user_id, is_admin, req, &self.state).await,
            ControlPayload::GetMessageHistory(req) => chat_handler::handle_get_message_history(request_id, user_id, is_admin, req, &self.state).await,
            ControlPayload::EditMessage(req) => chat_handler::handle_edit_message(request_id, user_id, req, &self.state).await,
            ControlPayload::DeleteMessage(req) => chat_handler::handle_delete_message(request_id, user_id, is_admin, req, &self.state).await,

            ControlPayload::ListPermissions => permission_handler::handle_list_permissions(request_id, is_admin, &self.state).await,
            ControlPayload::ListRoles => permission_handler::handle_list_roles(request_id, is_admin, &self.state).await,
            ControlPayload::GetUserPermissions(req) => permission_handler::handle_get_user_permissions(request_id, is_admin, req, &self.state).await,
            ControlPayload::SetUserPermission(req) => permission_handler::handle_set_user_permission(request_id, is_admin, req, &self.state).await,
            ControlPayload::SetUserRole(req) => permission_handler::handle_set_user_role(request_id, is_admin, req, &self.state).await,
            ControlPayload::GetChannelPermissions(req) => permission_handler::handle_get_channel_permissions(request_id, is_admin, req, &self.state).await,
            ControlPayload::SetChannelRolePermission(req) => permission_handler::handle_set_channel_role_permission(request_id, is_admin, req, &self.state).await,
            ControlPayload::SetChannelUserPermission(req) => permission_handler::handle_set_channel_user_permission(request_id, is_admin, req, &self.state).await,

            // Every remaining variant is either server-to-client only
            // (responses, events) or handled one level up (Login/Ping/Pong).
            _ => {
                tracing::warn!(request_id, "unexpected message from client");
                return vec![ControlMessage::error(request_id, ErrorCode::InvalidMessage, "unexpected message")];
            }
        };

        match result {
            Ok(messages) => messages,
            Err(err) => {
                let code = err.to_error_code();
                tracing::warn!(request_id, error = %err, code = ?code, "handler error");
                vec![ControlMessage::error(request_id, code, err.to_string())]
            }
        }
    }

    /// Tears down a disconnecting session (§5): revoke the session token,
    /// leave the room and fan `MemberLeft`, free the UDP client id, and
    /// drop the mailbox registration.
    pub async fn client_cleanup(&self, user_id: UserId, session_token: Option<&str>) {
        if let Some(token) = session_token {
            if let Err(e) = self.state.auth_service.logout(token).await {
                tracing::debug!(error = %e, "logout during cleanup failed, session likely already gone");
            }
        }

        if let Some(channel_id) = self.state.channels.leave_channel(user_id) {
            let remaining = self.state.channels.get_other_members(channel_id, user_id);
            let username = self.state.presence.get(user_id).map(|p| p.username).unwrap_or_default();
            let event = ControlMessage::new(
                0,
                ControlPayload::MemberLeft(MemberEvent { user_id: user_id.inner(), username, client_id: None }),
            );
            self.state.broadcaster.send_to_many(&remaining, &event, None);
        }

        self.state.udp_registry.unregister_by_user_id(user_id);
        self.state.broadcaster.unregister(user_id);
        self.state.presence.disconnect(user_id);

        tracing::debug!(user_id = %user_id, "session cleaned up");
    }
}
