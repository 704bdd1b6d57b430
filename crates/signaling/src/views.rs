//! Wire-view builders shared by more than one handler.

use whispr_channels::ChannelManager;
use whispr_core::types::ChannelId;
use whispr_core::ChannelType;
use whispr_protocol::control::{ChannelStateView, ChannelSummary, MemberView};

use crate::presence::PresenceManager;

pub(crate) fn channel_type_str(channel_type: ChannelType) -> &'static str {
    match channel_type {
        ChannelType::Voice => "voice",
        ChannelType::Text => "text",
    }
}

pub(crate) fn parse_channel_type(raw: &str) -> Option<ChannelType> {
    match raw {
        "voice" => Some(ChannelType::Voice),
        "text" => Some(ChannelType::Text),
        _ => None,
    }
}

pub(crate) fn member_views(presence: &PresenceManager, channels: &ChannelManager, channel_id: ChannelId) -> Vec<MemberView> {
    channels
        .members_of(channel_id)
        .into_iter()
        .filter_map(|user_id| presence.get(user_id))
        .map(|p| MemberView {
            user_id: p.user_id.inner(),
            username: p.username,
            client_id: p.client_id.map(|c| c.inner()),
            is_admin: p.is_admin,
        })
        .collect()
}

pub(crate) fn channel_state_view(presence: &PresenceManager, channels: &ChannelManager, channel_id: ChannelId) -> Option<ChannelStateView> {
    let info = channels.get_channel(channel_id)?;
    let members = member_views(presence, channels, channel_id);
    Some(ChannelStateView {
        id: info.id.inner(),
        name: info.name,
        channel_type: channel_type_str(info.channel_type).to_string(),
        member_ids: members.iter().map(|m| m.user_id).collect(),
        members,
    })
}

pub(crate) fn channel_summary(channels: &ChannelManager, channel_id: ChannelId) -> Option<ChannelSummary> {
    let info = channels.get_channel(channel_id)?;
    Some(ChannelSummary {
        id: info.id.inner(),
        name: info.name,
        member_count: channels.members_of(channel_id).len() as u32,
    })
}
