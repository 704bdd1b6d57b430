//! Admin permission-catalogue management (§4.3, §4.5)
//!
//! Every mutation is followed by a full re-read of the affected record, per
//! spec. Wire-level `permission_id` fields carry the permission's symbolic
//! `name` (e.g. `"send_message"`), never the database row's opaque uuid —
//! resolving one to the other goes straight through `whispr_db`'s
//! `PermissionRepository`, since `PermissionService` doesn't expose a public
//! name-to-id lookup.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use whispr_db::models::{PermissionRecord, RolePermissionRecord};
use whispr_db::{ChannelRepository, MessageRepository, PermissionRepository, UserRepository};
use whispr_protocol::control::{
    ChannelPermissions, ChannelRoleStateEntry, ChannelUserStateEntry, ControlMessage,
    ControlPayload, GetChannelPermissions, GetUserPermissions, PermissionState, PermissionView,
    PermissionsList, RolePermissionEntry, RoleView, RolesList, SetChannelRolePermission,
    SetChannelUserPermission, SetUserPermission, SetUserRole, UserPermissions,
};

use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

fn require_admin(is_admin: bool) -> SignalingResult<()> {
    if is_admin {
        Ok(())
    } else {
        Err(SignalingError::access_denied("admin privileges required"))
    }
}

fn permission_view(record: PermissionRecord) -> PermissionView {
    PermissionView { id: record.name.clone(), name: record.name, description: record.description }
}

fn db_state_to_wire(state: i64) -> PermissionState {
    PermissionState::from_db_int(state).unwrap_or(PermissionState::Neutral)
}

async fn permission_name_map<R>(state: &Arc<SignalingState<R>>) -> SignalingResult<HashMap<Uuid, String>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    Ok(state.db.list_permissions().await?.into_iter().map(|p| (p.id, p.name)).collect())
}

async fn permission_record_id<R>(state: &Arc<SignalingState<R>>, permission_name: &str) -> SignalingResult<Uuid>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    state
        .db
        .get_permission_by_name(permission_name)
        .await?
        .map(|record| record.id)
        .ok_or_else(|| SignalingError::not_found(format!("unknown permission '{permission_name}'")))
}

fn resolve_role_permission_entries(records: Vec<RolePermissionRecord>, names: &HashMap<Uuid, String>) -> Vec<RolePermissionEntry> {
    records
        .into_iter()
        .filter_map(|r| names.get(&r.permission_id).map(|name| RolePermissionEntry { permission_id: name.clone(), state: db_state_to_wire(r.state) }))
        .collect()
}

async fn build_user_permissions<R>(user_id: Uuid, state: &Arc<SignalingState<R>>) -> SignalingResult<UserPermissions>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let names = permission_name_map(state).await?;
    let overrides = state.db.user_permission_overrides(user_id).await?;
    let permissions = overrides
        .into_iter()
        .filter_map(|o| names.get(&o.permission_id).map(|name| RolePermissionEntry { permission_id: name.clone(), state: db_state_to_wire(o.state) }))
        .collect();
    let role_ids = state.db.roles_for_user(user_id).await?.into_iter().map(|r| r.id).collect();
    Ok(UserPermissions { user_id, permissions, role_ids })
}

async fn build_channel_permissions<R>(channel_id: Uuid, state: &Arc<SignalingState<R>>) -> SignalingResult<ChannelPermissions>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    let names = permission_name_map(state).await?;
    let role_states = state
        .db
        .channel_role_states(channel_id)
        .await?
        .into_iter()
        .filter_map(|r| names.get(&r.permission_id).map(|name| ChannelRoleStateEntry { role_id: r.role_id, permission_id: name.clone(), state: db_state_to_wire(r.state) }))
        .collect();
    let user_states = state
        .db
        .channel_user_states(channel_id)
        .await?
        .into_iter()
        .filter_map(|u| names.get(&u.permission_id).map(|name| ChannelUserStateEntry { user_id: u.user_id, permission_id: name.clone(), state: db_state_to_wire(u.state) }))
        .collect();
    Ok(ChannelPermissions { channel_id, role_states, user_states })
}

pub async fn handle_list_permissions<R>(request_id: u32, is_admin: bool, state: &Arc<SignalingState<R>>) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    require_admin(is_admin)?;
    let permissions = state.db.list_permissions().await?.into_iter().map(permission_view).collect();
    Ok(vec![ControlMessage::new(request_id, ControlPayload::PermissionsList(PermissionsList { permissions }))])
}

pub async fn handle_list_roles<R>(request_id: u32, is_admin: bool, state: &Arc<SignalingState<R>>) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    require_admin(is_admin)?;
    let names = permission_name_map(state).await?;
    let mut roles = Vec::new();
    for role in state.db.list_roles().await? {
        let states = state.db.role_permission_states(role.id).await?;
        roles.push(RoleView { id: role.id, name: role.name, permissions: resolve_role_permission_entries(states, &names) });
    }
    Ok(vec![ControlMessage::new(request_id, ControlPayload::RolesList(RolesList { roles }))])
}

pub async fn handle_get_user_permissions<R>(
    request_id: u32,
    is_admin: bool,
    request: GetUserPermissions,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    require_admin(is_admin)?;
    let payload = build_user_permissions(request.user_id, state).await?;
    Ok(vec![ControlMessage::new(request_id, ControlPayload::UserPermissions(payload))])
}

pub async fn handle_set_user_permission<R>(
    request_id: u32,
    is_admin: bool,
    request: SetUserPermission,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    require_admin(is_admin)?;
    let permission_id = permission_record_id(state, &request.permission_id).await?;
    state.db.set_user_permission(request.user_id, permission_id, request.state.map(|s| s.as_db_int())).await?;

    tracing::info!(user_id = %request.user_id, permission = %request.permission_id, "user permission updated");

    let payload = build_user_permissions(request.user_id, state).await?;
    Ok(vec![ControlMessage::new(request_id, ControlPayload::UserPermissions(payload))])
}

pub async fn handle_set_user_role<R>(
    request_id: u32,
    is_admin: bool,
    request: SetUserRole,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    require_admin(is_admin)?;
    if request.assign {
        state.db.assign_role(request.user_id, request.role_id).await?;
    } else {
        state.db.unassign_role(request.user_id, request.role_id).await?;
    }

    tracing::info!(user_id = %request.user_id, role_id = %request.role_id, assign = request.assign, "user role updated");

    let payload = build_user_permissions(request.user_id, state).await?;
    Ok(vec![ControlMessage::new(request_id, ControlPayload::UserPermissions(payload))])
}

pub async fn handle_get_channel_permissions<R>(
    request_id: u32,
    is_admin: bool,
    request: GetChannelPermissions,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    require_admin(is_admin)?;
    let payload = build_channel_permissions(request.channel_id, state).await?;
    Ok(vec![ControlMessage::new(request_id, ControlPayload::ChannelPermissions(payload))])
}

pub async fn handle_set_channel_role_permission<R>(
    request_id: u32,
    is_admin: bool,
    request: SetChannelRolePermission,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    require_admin(is_admin)?;
    let permission_id = permission_record_id(state, &request.permission_id).await?;
    state
        .db
        .set_channel_role_permission(request.channel_id, request.role_id, permission_id, request.state.map(|s| s.as_db_int()))
        .await?;

    tracing::info!(channel_id = %request.channel_id, role_id = %request.role_id, permission = %request.permission_id, "channel role permission updated");

    let payload = build_channel_permissions(request.channel_id, state).await?;
    Ok(vec![ControlMessage::new(request_id, ControlPayload::ChannelPermissions(payload))])
}

pub async fn handle_set_channel_user_permission<R>(
    request_id: u32,
    is_admin: bool,
    request: SetChannelUserPermission,
    state: &Arc<SignalingState<R>>,
) -> SignalingResult<Vec<ControlMessage>>
where
    R: UserRepository + ChannelRepository + PermissionRepository + MessageRepository + 'static,
{
    require_admin(is_admin)?;
    let permission_id = permission_record_id(state, &request.permission_id).await?;
    state
        .db
        .set_channel_user_permission(request.channel_id, request.user_id, permission_id, request.state.map(|s| s.as_db_int()))
        .await?;

    tracing::info!(channel_id = %request.channel_id, user_id = %request.user_id, permission = %request.permission_id, "channel user permission updated");

    let payload = build_channel_permissions(request.channel_id, state).await?;
    Ok(vec![ControlMessage::new(request_id, ControlPayload::ChannelPermissions(payload))])
}
