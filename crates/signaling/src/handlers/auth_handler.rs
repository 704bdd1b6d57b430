//! Login handling (§4.3)
//!
//! Validates credentials, opens a session, auto-joins the default channel,
//! and builds the three-message reply sequence a successful login sends:
//! `LoginResponse`, `RoomJoined`, `ServerState`.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use whispr_db::{ChannelRepository, MessageRepository, PermissionRepository, UserRepository};
use whispr_core::types::UserId;
use whispr_protocol::control::{
    ControlMessage, ControlPayload, LoginRequest, LoginResponse, MemberEvent, RoomJoined,
    ServerState,
};

use crate::error::SignalingError;
use crate::presence::ClientPresence;
use crate::server_state::SignalingState;
use crate::views;

/// Outcome of a login attempt, distinguishing a rejected login (reported to
/// the caller as an ordinary `LoginResponse`) from an internal failure.
pub enum LoginOutcome {
    Success { user_id: UserId, token: String, is_admin: bool, messages: Vec<ControlMessage> },
    Failure { message: ControlMessage },
}

pub async fn handle_login<R>(
    request_id: u32,
    request: LoginRequest,
    state: &Arc<SignalingState<R>>,
) -> LoginOutcome
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let (user, session) = match state.auth_service.login(&request.username, &request.password).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(username = %request.username, error = %e, "login rejected");
            let code = SignalingError::from(e).to_error_code();
            return LoginOutcome::Failure {
                message: ControlMessage::new(
                    request_id,
                    ControlPayload::LoginResponse(LoginResponse {
                        success: false,
                        error: Some(code.as_str().to_string()),
                        ..Default::default()
                    }),
                ),
            };
        }
    };

    let user_id = UserId(user.id);

    state.presence.connect(ClientPresence {
        user_id,
        username: user.username.clone(),
        is_admin: user.is_admin,
        client_id: None,
    });

    let mut messages = vec![ControlMessage::new(
        request_id,
        ControlPayload::LoginResponse(LoginResponse {
            success: true,
            token: Some(session.token.clone()),
            user_id: Some(user.id),
            username: Some(user.username.clone()),
            role: Some(if user.is_admin { "admin" } else { "user" }.to_string()),
            is_admin: Some(user.is_admin),
            error: None,
        }),
    )];

    if let Some(default_channel) = state.channels.default_channel() {
        if let Some((info, key)) = state.channels.join_channel(user_id, default_channel.id) {
            let members = views::member_views(&state.presence, &state.channels, info.id);
            messages.push(ControlMessage::new(
                request_id,
                ControlPayload::RoomJoined(RoomJoined {
                    room_id: info.id.inner(),
                    room_name: info.name.clone(),
                    room_type: views::channel_type_str(info.channel_type).to_string(),
                    member_ids: members.iter().map(|m| m.user_id).collect(),
                    members,
                    key_material: key.map(|k| BASE64.encode(k)),
                }),
            ));

            let others = state.channels.get_other_members(info.id, user_id);
            let event = ControlMessage::new(
                0,
                ControlPayload::MemberJoined(MemberEvent {
                    user_id: user_id.inner(),
                    username: user.username.clone(),
                    client_id: None,
                }),
            );
            state.broadcaster.send_to_many(&others, &event, None);
        }
    }

    let mut channels = Vec::new();
    for info in state.channels.list_channels() {
        match state.permission_service.can_access_channel(user.id, info.id.inner(), user.is_admin).await {
            Ok(true) => {
                if let Some(view) = views::channel_state_view(&state.presence, &state.channels, info.id) {
                    channels.push(view);
                }
            }
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "permission check failed building server state"),
        }
    }

    let can_create_channel = state
        .permission_service
        .resolve(user.id, "create_channel", user.is_admin)
        .await
        .unwrap_or(false)
        && state.channels.can_create_more();

    messages.push(ControlMessage::new(
        request_id,
        ControlPayload::ServerState(ServerState { channels, can_create_channel }),
    ));

    tracing::info!(user_id = %user_id, username = %user.username, "login succeeded");

    LoginOutcome::Success { user_id, token: session.token, is_admin: user.is_admin, messages }
}
