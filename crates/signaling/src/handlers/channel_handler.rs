//! Room handling: join, create, leave, list, server state (§4.3)

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use whispr_core::types::{ChannelId, UserId};
use whispr_db::models::NewChannel;
use whispr_db::{ChannelRepository, MessageRepository, PermissionRepository, UserRepository};
use whispr_protocol::control::{
    ControlMessage, ControlPayload, CreateRoom, JoinRoom, MemberEvent, RoomJoined, RoomLeft,
    RoomList, ServerState,
};

use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;
use crate::views;

pub async fn handle_join_room<R>(
    request_id: u32,
    user_id: UserId,
    is_admin: bool,
    request: JoinRoom,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let channel_id = ChannelId(request.room_id);

    if state.channels.get_channel(channel_id).is_none() {
        return Err(SignalingError::not_found("room does not exist"));
    }

    let allowed = state
        .permission_service
        .can_access_channel(user_id.inner(), channel_id.inner(), is_admin)
        .await?;
    if !allowed {
        return Err(SignalingError::access_denied("no access to this room"));
    }

    let old_channel = state.channels.get_user_channel(user_id);

    if old_channel == Some(channel_id) {
        return Ok(vec![ControlMessage::new(request_id, ControlPayload::RoomJoined(room_joined_view(state, channel_id)?))]);
    }

    let (_info, _key) = state
        .channels
        .join_channel(user_id, channel_id)
        .ok_or_else(|| SignalingError::internal("join failed after access check"))?;

    let username = state.presence.get(user_id).map(|p| p.username).unwrap_or_default();

    if let Some(old) = old_channel {
        let remaining = state.channels.get_other_members(old, user_id);
        let left_event = ControlMessage::new(
            0,
            ControlPayload::MemberLeft(MemberEvent { user_id: user_id.inner(), username: username.clone(), client_id: None }),
        );
        state.broadcaster.send_to_many(&remaining, &left_event, None);
    }

    let client_id = state.presence.get(user_id).and_then(|p| p.client_id).map(|c| c.inner());
    let others = state.channels.get_other_members(channel_id, user_id);
    let joined_event = ControlMessage::new(
        0,
        ControlPayload::MemberJoined(MemberEvent { user_id: user_id.inner(), username, client_id }),
    );
    state.broadcaster.send_to_many(&others, &joined_event, None);

    Ok(vec![ControlMessage::new(request_id, ControlPayload::RoomJoined(room_joined_view(state, channel_id)?))])
}

fn room_joined_view<R>(state: &Arc<SignalingState<R>>, channel_id: ChannelId) -> SignalingResult<RoomJoined>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let info = state
        .channels
        .get_channel(channel_id)
        .ok_or_else(|| SignalingError::internal("channel vanished mid-join"))?;
    let members = views::member_views(&state.presence, &state.channels, channel_id);
    let key = state.channels.get_channel_key_material(channel_id);
    Ok(RoomJoined {
        room_id: info.id.inner(),
        room_name: info.name,
        room_type: views::channel_type_str(info.channel_type).to_string(),
        member_ids: members.iter().map(|m| m.user_id).collect(),
        members,
        key_material: key.map(|k| BASE64.encode(k)),
    })
}

pub async fn handle_create_room<R>(
    request_id: u32,
    user_id: UserId,
    is_admin: bool,
    request: CreateRoom,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let allowed = state
        .permission_service
        .resolve(user_id.inner(), "create_channel", is_admin)
        .await?;
    if !allowed {
        return Err(SignalingError::access_denied("not permitted to create rooms"));
    }

    if !state.channels.can_create_more() {
        return Err(SignalingError::Channel(whispr_channels::ChannelError::CapacityReached(whispr_channels::MAX_CHANNELS)));
    }

    let channel_type = views::parse_channel_type(&request.room_type)
        .ok_or_else(|| SignalingError::protocol(format!("unknown room type '{}'", request.room_type)))?;

    let key_material = match channel_type {
        whispr_core::ChannelType::Voice => Some(whispr_channels::generate_voice_key()),
        whispr_core::ChannelType::Text => None,
    };

    let record = whispr_db::ChannelRepository::create(
        &*state.db,
        NewChannel {
            name: &request.name,
            channel_type,
            is_default: false,
            key_material: key_material.clone(),
        },
    )
    .await?;

    state
        .channels
        .adopt_channel(ChannelId(record.id), &record.name, channel_type, false, key_material)?;

    tracing::info!(user_id = %user_id, channel_id = %record.id, "room created");

    Ok(vec![ControlMessage::new(request_id, ControlPayload::RoomList(list_rooms(state)))])
}

pub async fn handle_leave_room<R>(
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let channel_id = state.channels.leave_channel(user_id).ok_or(SignalingError::NotInRoom)?;

    let remaining = state.channels.get_other_members(channel_id, user_id);
    let username = state.presence.get(user_id).map(|p| p.username).unwrap_or_default();
    let event = ControlMessage::new(
        0,
        ControlPayload::MemberLeft(MemberEvent { user_id: user_id.inner(), username, client_id: None }),
    );
    state.broadcaster.send_to_many(&remaining, &event, None);

    Ok(vec![ControlMessage::new(request_id, ControlPayload::RoomLeft(RoomLeft { room_id: channel_id.inner() }))])
}

fn list_rooms<R>(state: &Arc<SignalingState<R>>) -> RoomList
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    RoomList {
        rooms: state
            .channels
            .list_channels()
            .into_iter()
            .filter_map(|c| views::channel_summary(&state.channels, c.id))
            .collect(),
    }
}

pub async fn handle_request_room_list<R>(
    request_id: u32,
    user_id: UserId,
    is_admin: bool,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let mut rooms = Vec::new();
    for info in state.channels.list_channels() {
        if state
            .permission_service
            .can_access_channel(user_id.inner(), info.id.inner(), is_admin)
            .await?
        {
            if let Some(summary) = views::channel_summary(&state.channels, info.id) {
                rooms.push(summary);
            }
        }
    }
    Ok(vec![ControlMessage::new(request_id, ControlPayload::RoomList(RoomList { rooms }))])
}

pub async fn handle_request_server_state<R>(
    request_id: u32,
    user_id: UserId,
    is_admin: bool,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let mut channels = Vec::new();
    for info in state.channels.list_channels() {
        if state
            .permission_service
            .can_access_channel(user_id.inner(), info.id.inner(), is_admin)
            .await?
        {
            if let Some(view) = views::channel_state_view(&state.presence, &state.channels, info.id) {
                channels.push(view);
            }
        }
    }

    let can_create_channel =
        state.permission_service.resolve(user_id.inner(), "create_channel", is_admin).await? && state.channels.can_create_more();

    Ok(vec![ControlMessage::new(request_id, ControlPayload::ServerState(ServerState { channels, can_create_channel }))])
}
