//! UDP client-id registration (§4.3, §4.6)

use std::sync::Arc;

use whispr_core::types::UserId;
use whispr_db::{ChannelRepository, MessageRepository, PermissionRepository, UserRepository};
use whispr_protocol::control::{ControlMessage, ControlPayload, MemberEvent, RegisterUdpResponse};

use crate::error::SignalingResult;
use crate::server_state::SignalingState;

pub async fn handle_register_udp<R>(
    request_id: u32,
    user_id: UserId,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let client_id = state.udp_registry.allocate(user_id);
    state.presence.set_client_id(user_id, client_id);

    if let Some(channel_id) = state.channels.get_user_channel(user_id) {
        let others = state.channels.get_other_members(channel_id, user_id);
        let username = state.presence.get(user_id).map(|p| p.username).unwrap_or_default();
        let event = ControlMessage::new(
            0,
            ControlPayload::MemberUdpRegistered(MemberEvent {
                user_id: user_id.inner(),
                username,
                client_id: Some(client_id.inner()),
            }),
        );
        state.broadcaster.send_to_many(&others, &event, None);
    }

    tracing::debug!(user_id = %user_id, client_id = %client_id, "udp client registered");

    Ok(vec![ControlMessage::new(request_id, ControlPayload::RegisterUdpResponse(RegisterUdpResponse { client_id: client_id.inner() }))])
}
