//! Text message handling (§4.3, §4.8)
//!
//! `SendMessage`/`MessageUpdated`/`MessageDeleted` fan out to every connected
//! user who independently passes `can_access_channel`, not just the channel's
//! current member list — a user can read a public text channel's traffic
//! without having "joined" it.

use std::sync::Arc;

use uuid::Uuid;

use whispr_core::types::{ChannelId, UserId};
use whispr_db::{ChannelRepository, MessageRepository, PermissionRepository, UserRepository};
use whispr_protocol::control::{
    ControlMessage, ControlPayload, DeleteMessage, EditMessage, GetMessageHistory, MessageDeleted,
    MessageHistory, MessageReceived, MessageUpdated, SendMessage,
};

use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

fn to_wire_view(view: whispr_chat::MessageView, sender_username: String) -> whispr_protocol::control::MessageView {
    whispr_protocol::control::MessageView {
        id: view.id,
        channel_id: view.channel_id,
        sender_id: view.sender_id,
        sender_username,
        content: view.content,
        created_at: view.created_at,
        updated_at: view.updated_at,
    }
}

async fn resolve_username<R>(state: &Arc<SignalingState<R>>, user_id: Uuid) -> String
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    if let Some(presence) = state.presence.get(UserId(user_id)) {
        return presence.username;
    }
    match UserRepository::get_by_id(&*state.db, user_id).await {
        Ok(Some(record)) => record.username,
        _ => "unknown".to_string(),
    }
}

async fn fan_out_to_authorized<R>(state: &Arc<SignalingState<R>>, channel_id: ChannelId, event: &ControlMessage)
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    for client in state.presence.all() {
        match state.permission_service.can_access_channel(client.user_id.inner(), channel_id.inner(), client.is_admin).await {
            Ok(true) => {
                state.broadcaster.send_to_user(client.user_id, event);
            }
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "permission check failed during chat fan-out"),
        }
    }
}

pub async fn handle_send_message<R>(
    request_id: u32,
    user_id: UserId,
    is_admin: bool,
    request: SendMessage,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let channel_id = ChannelId(request.channel_id);
    let info = state.channels.get_channel(channel_id).ok_or_else(|| SignalingError::not_found("room does not exist"))?;
    if info.channel_type != whispr_core::ChannelType::Text {
        return Err(SignalingError::protocol("messages can only be sent to text rooms"));
    }
    if !state.permission_service.can_access_channel(user_id.inner(), channel_id.inner(), is_admin).await? {
        return Err(SignalingError::access_denied("no access to this room"));
    }

    let view = state.chat_service.send_message(channel_id.inner(), user_id.inner(), &request.content).await?;
    let sender_username = state.presence.get(user_id).map(|p| p.username.clone()).unwrap_or_default();
    let message_view = to_wire_view(view, sender_username);

    let event = ControlMessage::new(0, ControlPayload::MessageReceived(MessageReceived { message: message_view.clone() }));
    fan_out_to_authorized(state, channel_id, &event).await;

    Ok(vec![ControlMessage::new(request_id, ControlPayload::MessageReceived(MessageReceived { message: message_view }))])
}

pub async fn handle_get_message_history<R>(
    request_id: u32,
    user_id: UserId,
    is_admin: bool,
    request: GetMessageHistory,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let channel_id = ChannelId(request.channel_id);
    if !state.permission_service.can_access_channel(user_id.inner(), channel_id.inner(), is_admin).await? {
        return Err(SignalingError::access_denied("no access to this room"));
    }

    let history_request = whispr_chat::HistoryRequest {
        channel_id: request.channel_id,
        since: request.since,
        before: request.before,
        limit: request.limit,
    };
    let views = state.chat_service.get_history(history_request).await?;

    let mut messages = Vec::with_capacity(views.len());
    for view in views {
        let username = resolve_username(state, view.sender_id).await;
        messages.push(to_wire_view(view, username));
    }

    Ok(vec![ControlMessage::new(request_id, ControlPayload::MessageHistory(MessageHistory { messages }))])
}

pub async fn handle_edit_message<R>(
    request_id: u32,
    user_id: UserId,
    request: EditMessage,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let view = state.chat_service.edit_message(request.message_id, user_id.inner(), &request.content).await?;
    let username = resolve_username(state, view.sender_id).await;
    let message_view = to_wire_view(view, username);

    let channel_id = ChannelId(request.channel_id);
    let event = ControlMessage::new(0, ControlPayload::MessageUpdated(MessageUpdated { message: message_view.clone() }));
    fan_out_to_authorized(state, channel_id, &event).await;

    Ok(vec![ControlMessage::new(request_id, ControlPayload::MessageUpdated(MessageUpdated { message: message_view }))])
}

pub async fn handle_delete_message<R>(
    request_id: u32,
    user_id: UserId,
    is_admin: bool,
    request: DeleteMessage,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    state.chat_service.delete_message(request.message_id, user_id.inner(), is_admin).await?;

    let channel_id = ChannelId(request.channel_id);
    let event = ControlMessage::new(
        0,
        ControlPayload::MessageDeleted(MessageDeleted { channel_id: request.channel_id, message_id: request.message_id }),
    );
    fan_out_to_authorized(state, channel_id, &event).await;

    Ok(vec![ControlMessage::new(
        request_id,
        ControlPayload::MessageDeleted(MessageDeleted { channel_id: request.channel_id, message_id: request.message_id }),
    )])
}
