//! Client-side view of the other avatars in the session

use log::debug;
use shared::AvatarUpdate;
use std::collections::BTreeMap;

/// Latest known update for every remote avatar, keyed by client id
#[derive(Debug, Default)]
pub struct RemoteAvatars {
    local_id: Option<u16>,
    avatars: BTreeMap<u16, AvatarUpdate>,
}

impl RemoteAvatars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local_id(&self) -> Option<u16> {
        self.local_id
    }

    /// Handles a connect announcement
    ///
    /// The first announcement a client receives names the client itself.
    /// Returns `true` when this announcement assigned the local id.
    pub fn apply_connect(&mut self, id: u16) -> bool {
        match self.local_id {
            None => {
                self.local_id = Some(id);
                self.avatars.remove(&id);
                true
            }
            Some(local) if local == id => false,
            Some(_) => {
                self.avatars.entry(id).or_insert_with(|| AvatarUpdate::idle(id));
                false
            }
        }
    }

    /// Forgets a departed avatar; returns whether it was known
    pub fn apply_disconnect(&mut self, id: u16) -> bool {
        self.avatars.remove(&id).is_some()
    }

    /// Stores a decoded frame, ignoring echoes of the local avatar
    ///
    /// Frames that arrive before the local id is known are kept: catch-up
    /// frames never describe the newcomer itself.
    pub fn apply_update(&mut self, update: AvatarUpdate) -> bool {
        if self.local_id == Some(update.id) {
            return false;
        }

        if self.avatars.insert(update.id, update).is_none() {
            debug!("Avatar {} appeared", update.id);
        }
        true
    }

    pub fn get(&self, id: u16) -> Option<&AvatarUpdate> {
        self.avatars.get(&id)
    }

    /// Remote avatars in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &AvatarUpdate> + '_ {
        self.avatars.values()
    }

    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }
}
