//! whispr-channels – Channel Manager (§4.4)
//!
//! Authoritative in-memory channel membership, per-channel voice key
//! material, and the global channel capacity limit. The whole manager is
//! guarded by a single coarse mutex (§5: "single coarse mutex; all
//! mutations under one critical section") rather than the lock-free,
//! per-entry concurrency a media-routing hot path would use — channel
//! membership changes are rare (login, explicit join/leave) compared to
//! the audio relay's per-packet hot path, so a short critical section over
//! a handful of channels is simpler and fast enough. Callers must never
//! hold the returned data across I/O; every method here returns owned
//! values and releases the lock before returning.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::RngCore;
use thiserror::Error;
use whispr_core::types::{ChannelId, ChannelType, UserId};

/// Global channel count cap (§3).
pub const MAX_CHANNELS: usize = 10;
/// Channel names are 1–256 chars, trimmed (§3).
pub const MIN_CHANNEL_NAME_LEN: usize = 1;
pub const MAX_CHANNEL_NAME_LEN: usize = 256;
/// Voice channels carry a 32-byte random key generated on creation (§3).
pub const VOICE_KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel capacity ({0}) reached")]
    CapacityReached(usize),
    #[error("channel name must be between {0} and {1} characters")]
    InvalidName(usize, usize),
}

/// Public view of a channel, with no membership or key details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub channel_type: ChannelType,
    pub is_default: bool,
}

/// A channel to load into the manager at startup, e.g. from persisted rows.
pub struct SeedChannel {
    pub id: ChannelId,
    pub name: String,
    pub channel_type: ChannelType,
    pub is_default: bool,
    pub key_material: Option<Vec<u8>>,
}

struct ChannelEntry {
    info: ChannelInfo,
    key_material: Option<Vec<u8>>,
    members: Vec<UserId>,
}

struct Inner {
    channels: Vec<ChannelEntry>,
    member_of: HashMap<UserId, ChannelId>,
}

impl Inner {
    fn find(&self, channel_id: ChannelId) -> Option<&ChannelEntry> {
        self.channels.iter().find(|c| c.info.id == channel_id)
    }

    fn find_mut(&mut self, channel_id: ChannelId) -> Option<&mut ChannelEntry> {
        self.channels.iter_mut().find(|c| c.info.id == channel_id)
    }
}

/// Authoritative channel membership and key-material table.
///
/// Cheaply `Clone`-free: wrap in an `Arc` at the call site the way the rest
/// of the router state is shared.
pub struct ChannelManager {
    inner: Mutex<Inner>,
}

impl ChannelManager {
    /// Builds a manager pre-populated from persisted channel rows.
    pub fn new(seed: Vec<SeedChannel>) -> Self {
        let channels = seed
            .into_iter()
            .map(|s| ChannelEntry {
                info: ChannelInfo {
                    id: s.id,
                    name: s.name,
                    channel_type: s.channel_type,
                    is_default: s.is_default,
                },
                key_material: s.key_material,
                members: Vec::new(),
            })
            .collect();

        Self {
            inner: Mutex::new(Inner {
                channels,
                member_of: HashMap::new(),
            }),
        }
    }

    pub fn list_channels(&self) -> Vec<ChannelInfo> {
        let inner = self.inner.lock().unwrap();
        inner.channels.iter().map(|c| c.info.clone()).collect()
    }

    pub fn get_channel(&self, channel_id: ChannelId) -> Option<ChannelInfo> {
        let inner = self.inner.lock().unwrap();
        inner.find(channel_id).map(|c| c.info.clone())
    }

    pub fn default_channel(&self) -> Option<ChannelInfo> {
        let inner = self.inner.lock().unwrap();
        inner.channels.iter().find(|c| c.info.is_default).map(|c| c.info.clone())
    }

    pub fn get_user_channel(&self, user_id: UserId) -> Option<ChannelId> {
        let inner = self.inner.lock().unwrap();
        inner.member_of.get(&user_id).copied()
    }

    /// Members of `channel_id` other than `exclude`, for `MemberJoined`/
    /// `MemberLeft`/relay fan-out.
    pub fn get_other_members(&self, channel_id: ChannelId, exclude: UserId) -> Vec<UserId> {
        let inner = self.inner.lock().unwrap();
        match inner.find(channel_id) {
            Some(entry) => entry.members.iter().filter(|m| **m != exclude).copied().collect(),
            None => Vec::new(),
        }
    }

    /// All members of `channel_id`, including the caller — for building the
    /// roster a client receives in `RoomJoined`/`ServerState`.
    pub fn members_of(&self, channel_id: ChannelId) -> Vec<UserId> {
        let inner = self.inner.lock().unwrap();
        match inner.find(channel_id) {
            Some(entry) => entry.members.clone(),
            None => Vec::new(),
        }
    }

    pub fn get_channel_key_material(&self, channel_id: ChannelId) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.find(channel_id).and_then(|c| c.key_material.clone())
    }

    pub fn can_create_more(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.channels.len() < MAX_CHANNELS
    }

    /// Creates a channel. Fails on capacity or an empty/oversize name.
    /// Voice channels get a fresh 32-byte key; text channels carry none.
    pub fn create_channel(
        &self,
        name: &str,
        channel_type: ChannelType,
        is_default: bool,
    ) -> Result<ChannelInfo, ChannelError> {
        let trimmed = name.trim();
        if trimmed.len() < MIN_CHANNEL_NAME_LEN || trimmed.len() > MAX_CHANNEL_NAME_LEN {
            return Err(ChannelError::InvalidName(MIN_CHANNEL_NAME_LEN, MAX_CHANNEL_NAME_LEN));
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.channels.len() >= MAX_CHANNELS {
            return Err(ChannelError::CapacityReached(MAX_CHANNELS));
        }

        let key_material = match channel_type {
            ChannelType::Voice => Some(generate_voice_key()),
            ChannelType::Text => None,
        };

        let info = ChannelInfo {
            id: ChannelId::new(),
            name: trimmed.to_string(),
            channel_type,
            is_default,
        };

        inner.channels.push(ChannelEntry {
            info: info.clone(),
            key_material,
            members: Vec::new(),
        });

        tracing::info!(channel_id = %info.id, name = %info.name, "channel created");
        Ok(info)
    }

    /// Atomically leaves the current channel (if any) and joins
    /// `channel_id`. Returns `None` for a no-op (already in that channel),
    /// an unknown channel, or a detected membership conflict; callers treat
    /// `None` as "nothing changed, do not fan out".
    pub fn join_channel(&self, user_id: UserId, channel_id: ChannelId) -> Option<(ChannelInfo, Option<Vec<u8>>)> {
        let mut inner = self.inner.lock().unwrap();

        if inner.member_of.get(&user_id) == Some(&channel_id) {
            return None;
        }
        if inner.find(channel_id).is_none() {
            return None;
        }

        if let Some(old_id) = inner.member_of.get(&user_id).copied() {
            if let Some(old) = inner.find_mut(old_id) {
                old.members.retain(|m| *m != user_id);
            }
        }

        let entry = inner.find_mut(channel_id)?;
        if entry.members.contains(&user_id) {
            // Already recorded as a member without member_of pointing here: conflict.
            return None;
        }
        entry.members.push(user_id);
        let info = entry.info.clone();
        let key = entry.key_material.clone();

        inner.member_of.insert(user_id, channel_id);

        tracing::info!(user_id = %user_id, channel_id = %channel_id, "user joined channel");
        Some((info, key))
    }

    /// Registers a channel that was already assigned an id elsewhere (a row
    /// just written by the caller to the repository), instead of minting a
    /// fresh one. Same capacity/name validation as [`Self::create_channel`].
    pub fn adopt_channel(
        &self,
        id: ChannelId,
        name: &str,
        channel_type: ChannelType,
        is_default: bool,
        key_material: Option<Vec<u8>>,
    ) -> Result<ChannelInfo, ChannelError> {
        let trimmed = name.trim();
        if trimmed.len() < MIN_CHANNEL_NAME_LEN || trimmed.len() > MAX_CHANNEL_NAME_LEN {
            return Err(ChannelError::InvalidName(MIN_CHANNEL_NAME_LEN, MAX_CHANNEL_NAME_LEN));
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.channels.len() >= MAX_CHANNELS {
            return Err(ChannelError::CapacityReached(MAX_CHANNELS));
        }

        let info = ChannelInfo { id, name: trimmed.to_string(), channel_type, is_default };
        inner.channels.push(ChannelEntry { info: info.clone(), key_material, members: Vec::new() });

        tracing::info!(channel_id = %info.id, name = %info.name, "channel created");
        Ok(info)
    }

    /// Removes `user_id` from whatever channel they are in. Returns the
    /// channel they left, for `MemberLeft` fan-out.
    pub fn leave_channel(&self, user_id: UserId) -> Option<ChannelId> {
        let mut inner = self.inner.lock().unwrap();
        let channel_id = inner.member_of.remove(&user_id)?;
        if let Some(entry) = inner.find_mut(channel_id) {
            entry.members.retain(|m| *m != user_id);
        }
        tracing::info!(user_id = %user_id, channel_id = %channel_id, "user left channel");
        Some(channel_id)
    }
}

/// Generates a fresh 32-byte voice channel key (§3).
pub fn generate_voice_key() -> Vec<u8> {
    let mut key = vec![0u8; VOICE_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ChannelManager {
        ChannelManager::new(Vec::new())
    }

    #[test]
    fn create_voice_channel_gets_a_key() {
        let mgr = manager();
        let channel = mgr.create_channel("General", ChannelType::Voice, true).unwrap();
        let key = mgr.get_channel_key_material(channel.id);
        assert_eq!(key.map(|k| k.len()), Some(VOICE_KEY_LEN));
    }

    #[test]
    fn create_text_channel_has_no_key() {
        let mgr = manager();
        let channel = mgr.create_channel("chat", ChannelType::Text, false).unwrap();
        assert_eq!(mgr.get_channel_key_material(channel.id), None);
    }

    #[test]
    fn empty_name_is_rejected() {
        let mgr = manager();
        let result = mgr.create_channel("   ", ChannelType::Voice, false);
        assert!(matches!(result, Err(ChannelError::InvalidName(_, _))));
    }

    #[test]
    fn oversize_name_is_rejected() {
        let mgr = manager();
        let name = "x".repeat(MAX_CHANNEL_NAME_LEN + 1);
        let result = mgr.create_channel(&name, ChannelType::Voice, false);
        assert!(matches!(result, Err(ChannelError::InvalidName(_, _))));
    }

    #[test]
    fn capacity_is_enforced() {
        let mgr = manager();
        for i in 0..MAX_CHANNELS {
            mgr.create_channel(&format!("chan-{i}"), ChannelType::Text, false).unwrap();
        }
        assert!(!mgr.can_create_more());
        let result = mgr.create_channel("one-too-many", ChannelType::Text, false);
        assert!(matches!(result, Err(ChannelError::CapacityReached(MAX_CHANNELS))));
    }

    #[test]
    fn join_and_fan_out_membership() {
        let mgr = manager();
        let channel = mgr.create_channel("General", ChannelType::Voice, true).unwrap();
        let alice = UserId::new();
        let bob = UserId::new();

        let joined = mgr.join_channel(alice, channel.id).unwrap();
        assert_eq!(joined.0.id, channel.id);
        mgr.join_channel(bob, channel.id).unwrap();

        assert_eq!(mgr.get_user_channel(alice), Some(channel.id));
        let others = mgr.get_other_members(channel.id, alice);
        assert_eq!(others, vec![bob]);
    }

    #[test]
    fn rejoining_same_channel_is_a_noop() {
        let mgr = manager();
        let channel = mgr.create_channel("General", ChannelType::Voice, true).unwrap();
        let user = UserId::new();

        mgr.join_channel(user, channel.id).unwrap();
        assert!(mgr.join_channel(user, channel.id).is_none());
    }

    #[test]
    fn joining_unknown_channel_returns_none() {
        let mgr = manager();
        let result = mgr.join_channel(UserId::new(), ChannelId::new());
        assert!(result.is_none());
    }

    #[test]
    fn switching_channels_leaves_the_old_one() {
        let mgr = manager();
        let a = mgr.create_channel("a", ChannelType::Voice, false).unwrap();
        let b = mgr.create_channel("b", ChannelType::Voice, false).unwrap();
        let user = UserId::new();

        mgr.join_channel(user, a.id).unwrap();
        mgr.join_channel(user, b.id).unwrap();

        assert_eq!(mgr.get_user_channel(user), Some(b.id));
        assert!(mgr.get_other_members(a.id, UserId::new()).is_empty());
    }

    #[test]
    fn leave_channel_clears_membership() {
        let mgr = manager();
        let channel = mgr.create_channel("General", ChannelType::Voice, true).unwrap();
        let user = UserId::new();
        mgr.join_channel(user, channel.id).unwrap();

        let left = mgr.leave_channel(user);
        assert_eq!(left, Some(channel.id));
        assert_eq!(mgr.get_user_channel(user), None);
        assert!(mgr.get_other_members(channel.id, UserId::new()).is_empty());
    }

    #[test]
    fn leaving_without_a_channel_is_none() {
        let mgr = manager();
        assert_eq!(mgr.leave_channel(UserId::new()), None);
    }

    #[test]
    fn default_channel_is_found_by_flag() {
        let mgr = manager();
        mgr.create_channel("lobby-is-not-default", ChannelType::Text, false).unwrap();
        let general = mgr.create_channel("General", ChannelType::Voice, true).unwrap();
        assert_eq!(mgr.default_channel().map(|c| c.id), Some(general.id));
    }

    #[test]
    fn members_of_includes_the_caller() {
        let mgr = manager();
        let channel = mgr.create_channel("General", ChannelType::Voice, true).unwrap();
        let alice = UserId::new();
        let bob = UserId::new();
        mgr.join_channel(alice, channel.id).unwrap();
        mgr.join_channel(bob, channel.id).unwrap();

        let members = mgr.members_of(channel.id);
        assert_eq!(members.len(), 2);
        assert!(members.contains(&alice));
        assert!(members.contains(&bob));
    }

    #[test]
    fn adopt_channel_uses_the_given_id() {
        let mgr = manager();
        let id = ChannelId::new();
        let info = mgr.adopt_channel(id, "adopted", ChannelType::Text, false, None).unwrap();
        assert_eq!(info.id, id);
        assert_eq!(mgr.get_channel(id).map(|c| c.id), Some(id));
    }

    #[test]
    fn seeded_channels_start_with_no_members() {
        let seed = vec![SeedChannel {
            id: ChannelId::new(),
            name: "General".to_string(),
            channel_type: ChannelType::Voice,
            is_default: true,
            key_material: Some(vec![1; VOICE_KEY_LEN]),
        }];
        let mgr = ChannelManager::new(seed);
        assert_eq!(mgr.list_channels().len(), 1);
        assert!(mgr.default_channel().is_some());
    }
}
