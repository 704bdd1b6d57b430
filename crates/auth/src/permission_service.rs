//! Permission resolution (§4.5)
//!
//! Three-valued (Allow/Deny/Neutral) resolution with Deny dominating. A
//! small cache maps permission names to their catalogue ids so handlers can
//! call `resolve("send_message")` without looking up a `Uuid` themselves;
//! the catalogue rarely changes so the cache is refreshed lazily and never
//! explicitly invalidated.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use uuid::Uuid;
use whispr_db::repository::PermissionRepository;

use crate::error::AuthResult;

/// One state entry gathered from either a direct user override or a role default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Allow,
    Deny,
    Neutral,
}

impl State {
    fn from_db_int(value: i64) -> Self {
        match value {
            0 => State::Allow,
            1 => State::Deny,
            _ => State::Neutral,
        }
    }
}

pub const CHANNEL_ACCESS_PERMISSION: &str = "channel_access";

pub struct PermissionService<P: PermissionRepository> {
    repo: Arc<P>,
    permission_ids: RwLock<HashMap<String, Uuid>>,
}

impl<P: PermissionRepository> PermissionService<P> {
    pub fn new(repo: Arc<P>) -> Arc<Self> {
        Arc::new(Self { repo, permission_ids: RwLock::new(HashMap::new()) })
    }

    /// Implements §4.5's `resolve()`. `is_admin` covers the "permission ==
    /// admin and user.role == Admin" fallback — callers pass `permission ==
    /// "admin"` explicitly rather than special-casing it here.
    pub async fn resolve(&self, user_id: Uuid, permission: &str, is_admin: bool) -> AuthResult<bool> {
        let Some(permission_id) = self.permission_id(permission).await? else {
            return Ok(permission == "admin" && is_admin);
        };

        let mut states = Vec::new();

        for o in self.repo.user_permission_overrides(user_id).await? {
            if o.permission_id == permission_id {
                states.push(State::from_db_int(o.state));
            }
        }

        for role in self.repo.roles_for_user(user_id).await? {
            for rp in self.repo.role_permission_states(role.id).await? {
                if rp.permission_id == permission_id {
                    states.push(State::from_db_int(rp.state));
                }
            }
        }

        if states.contains(&State::Deny) {
            return Ok(false);
        }
        if states.contains(&State::Allow) {
            return Ok(true);
        }

        Ok(permission == "admin" && is_admin)
    }

    /// Implements §4.5's `can_access_channel`: gathers channel-scoped states
    /// for the user and each of their roles; an empty set means the channel
    /// is public. Admins bypass the ACL entirely.
    pub async fn can_access_channel(&self, user_id: Uuid, channel_id: Uuid, is_admin: bool) -> AuthResult<bool> {
        if is_admin {
            return Ok(true);
        }

        let Some(permission_id) = self.permission_id(CHANNEL_ACCESS_PERMISSION).await? else {
            return Ok(true);
        };

        let mut states = Vec::new();

        for u in self.repo.channel_user_states(channel_id).await? {
            if u.user_id == user_id && u.permission_id == permission_id {
                states.push(State::from_db_int(u.state));
            }
        }

        let roles = self.repo.roles_for_user(user_id).await?;
        for r in self.repo.channel_role_states(channel_id).await? {
            if r.permission_id == permission_id && roles.iter().any(|role| role.id == r.role_id) {
                states.push(State::from_db_int(r.state));
            }
        }

        if states.is_empty() {
            return Ok(true);
        }
        if states.contains(&State::Deny) {
            return Ok(false);
        }
        if states.contains(&State::Allow) {
            return Ok(true);
        }
        Ok(true)
    }

    async fn permission_id(&self, name: &str) -> AuthResult<Option<Uuid>> {
        if let Some(id) = self.permission_ids.read().await.get(name) {
            return Ok(Some(*id));
        }

        let Some(record) = self.repo.get_permission_by_name(name).await? else {
            return Ok(None);
        };

        self.permission_ids.write().await.insert(name.to_string(), record.id);
        Ok(Some(record.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use whispr_db::models::{
        ChannelRolePermissionRecord, ChannelUserPermissionRecord, PermissionRecord,
        RolePermissionRecord, RoleRecord, UserPermissionOverrideRecord,
    };
    use whispr_db::DbResult;

    #[derive(Default)]
    struct FakeRepo {
        permissions: Mutex<Vec<PermissionRecord>>,
        roles: Mutex<Vec<RoleRecord>>,
        user_roles: Mutex<Vec<(Uuid, Uuid)>>,
        role_states: Mutex<Vec<RolePermissionRecord>>,
        user_overrides: Mutex<Vec<UserPermissionOverrideRecord>>,
        channel_role_states: Mutex<Vec<ChannelRolePermissionRecord>>,
        channel_user_states: Mutex<Vec<ChannelUserPermissionRecord>>,
    }

    impl FakeRepo {
        fn add_permission(&self, name: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.permissions.lock().unwrap().push(PermissionRecord { id, name: name.into(), description: String::new() });
            id
        }
    }

    impl PermissionRepository for FakeRepo {
        async fn list_permissions(&self) -> DbResult<Vec<PermissionRecord>> {
            Ok(self.permissions.lock().unwrap().clone())
        }
        async fn get_permission_by_name(&self, name: &str) -> DbResult<Option<PermissionRecord>> {
            Ok(self.permissions.lock().unwrap().iter().find(|p| p.name == name).cloned())
        }
        async fn list_roles(&self) -> DbResult<Vec<RoleRecord>> {
            Ok(self.roles.lock().unwrap().clone())
        }
        async fn get_role_by_name(&self, name: &str) -> DbResult<Option<RoleRecord>> {
            Ok(self.roles.lock().unwrap().iter().find(|r| r.name == name).cloned())
        }
        async fn roles_for_user(&self, user_id: Uuid) -> DbResult<Vec<RoleRecord>> {
            let role_ids: Vec<Uuid> = self.user_roles.lock().unwrap().iter().filter(|(u, _)| *u == user_id).map(|(_, r)| *r).collect();
            Ok(self.roles.lock().unwrap().iter().filter(|r| role_ids.contains(&r.id)).cloned().collect())
        }
        async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> DbResult<()> {
            self.user_roles.lock().unwrap().push((user_id, role_id));
            Ok(())
        }
        async fn unassign_role(&self, user_id: Uuid, role_id: Uuid) -> DbResult<()> {
            self.user_roles.lock().unwrap().retain(|(u, r)| !(*u == user_id && *r == role_id));
            Ok(())
        }
        async fn role_permission_states(&self, role_id: Uuid) -> DbResult<Vec<RolePermissionRecord>> {
            Ok(self.role_states.lock().unwrap().iter().filter(|s| s.role_id == role_id).cloned().collect())
        }
        async fn set_role_permission(&self, role_id: Uuid, permission_id: Uuid, state: i64) -> DbResult<()> {
            self.role_states.lock().unwrap().push(RolePermissionRecord { role_id, permission_id, state });
            Ok(())
        }
        async fn user_permission_overrides(&self, user_id: Uuid) -> DbResult<Vec<UserPermissionOverrideRecord>> {
            Ok(self.user_overrides.lock().unwrap().iter().filter(|o| o.user_id == user_id).cloned().collect())
        }
        async fn set_user_permission(&self, user_id: Uuid, permission_id: Uuid, state: Option<i64>) -> DbResult<()> {
            let mut overrides = self.user_overrides.lock().unwrap();
            overrides.retain(|o| !(o.user_id == user_id && o.permission_id == permission_id));
            if let Some(state) = state {
                overrides.push(UserPermissionOverrideRecord { user_id, permission_id, state });
            }
            Ok(())
        }
        async fn channel_role_states(&self, channel_id: Uuid) -> DbResult<Vec<ChannelRolePermissionRecord>> {
            Ok(self.channel_role_states.lock().unwrap().iter().filter(|s| s.channel_id == channel_id).cloned().collect())
        }
        async fn set_channel_role_permission(&self, channel_id: Uuid, role_id: Uuid, permission_id: Uuid, state: Option<i64>) -> DbResult<()> {
            let mut states = self.channel_role_states.lock().unwrap();
            states.retain(|s| !(s.channel_id == channel_id && s.role_id == role_id && s.permission_id == permission_id));
            if let Some(state) = state {
                states.push(ChannelRolePermissionRecord { channel_id, role_id, permission_id, state });
            }
            Ok(())
        }
        async fn channel_user_states(&self, channel_id: Uuid) -> DbResult<Vec<ChannelUserPermissionRecord>> {
            Ok(self.channel_user_states.lock().unwrap().iter().filter(|s| s.channel_id == channel_id).cloned().collect())
        }
        async fn set_channel_user_permission(&self, channel_id: Uuid, user_id: Uuid, permission_id: Uuid, state: Option<i64>) -> DbResult<()> {
            let mut states = self.channel_user_states.lock().unwrap();
            states.retain(|s| !(s.channel_id == channel_id && s.user_id == user_id && s.permission_id == permission_id));
            if let Some(state) = state {
                states.push(ChannelUserPermissionRecord { channel_id, user_id, permission_id, state });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn absent_permission_defaults_to_not_granted() {
        let repo = Arc::new(FakeRepo::default());
        let service = PermissionService::new(repo);
        let granted = service.resolve(Uuid::new_v4(), "send_message", false).await.unwrap();
        assert!(!granted);
    }

    #[tokio::test]
    async fn role_allow_grants_permission() {
        let repo = Arc::new(FakeRepo::default());
        let perm = repo.add_permission("send_message");
        let role_id = Uuid::new_v4();
        repo.roles.lock().unwrap().push(RoleRecord { id: role_id, name: "General".into() });
        let user_id = Uuid::new_v4();
        repo.assign_role(user_id, role_id).await.unwrap();
        repo.set_role_permission(role_id, perm, 0).await.unwrap();

        let service = PermissionService::new(repo);
        assert!(service.resolve(user_id, "send_message", false).await.unwrap());
    }

    #[tokio::test]
    async fn user_deny_overrides_role_allow() {
        let repo = Arc::new(FakeRepo::default());
        let perm = repo.add_permission("send_message");
        let role_id = Uuid::new_v4();
        repo.roles.lock().unwrap().push(RoleRecord { id: role_id, name: "General".into() });
        let user_id = Uuid::new_v4();
        repo.assign_role(user_id, role_id).await.unwrap();
        repo.set_role_permission(role_id, perm, 0).await.unwrap();
        repo.set_user_permission(user_id, perm, Some(1)).await.unwrap();

        let service = PermissionService::new(repo);
        assert!(!service.resolve(user_id, "send_message", false).await.unwrap());
    }

    #[tokio::test]
    async fn admin_role_fallback_grants_admin_permission() {
        let repo = Arc::new(FakeRepo::default());
        let service = PermissionService::new(repo);
        assert!(service.resolve(Uuid::new_v4(), "admin", true).await.unwrap());
        assert!(!service.resolve(Uuid::new_v4(), "admin", false).await.unwrap());
    }

    #[tokio::test]
    async fn channel_with_no_acl_entries_is_public() {
        let repo = Arc::new(FakeRepo::default());
        repo.add_permission(CHANNEL_ACCESS_PERMISSION);
        let service = PermissionService::new(repo);
        assert!(service.can_access_channel(Uuid::new_v4(), Uuid::new_v4(), false).await.unwrap());
    }

    #[tokio::test]
    async fn channel_deny_hides_channel() {
        let repo = Arc::new(FakeRepo::default());
        let perm = repo.add_permission(CHANNEL_ACCESS_PERMISSION);
        let user_id = Uuid::new_v4();
        let channel_id = Uuid::new_v4();
        repo.set_channel_user_permission(channel_id, user_id, perm, Some(1)).await.unwrap();

        let service = PermissionService::new(repo);
        assert!(!service.can_access_channel(user_id, channel_id, false).await.unwrap());
    }

    #[tokio::test]
    async fn admins_bypass_channel_acl() {
        let repo = Arc::new(FakeRepo::default());
        let perm = repo.add_permission(CHANNEL_ACCESS_PERMISSION);
        let user_id = Uuid::new_v4();
        let channel_id = Uuid::new_v4();
        repo.set_channel_user_permission(channel_id, user_id, perm, Some(1)).await.unwrap();

        let service = PermissionService::new(repo);
        assert!(service.can_access_channel(user_id, channel_id, true).await.unwrap());
    }
}
