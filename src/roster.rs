//! Collaboration roster
//!
//! Which users are attached to the repository and which branch each one
//! has checked out. Presence broadcasting lives elsewhere.
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commit::User;

/// A user attached to the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user: User,
    pub branch: String,
    pub joined_at: DateTime<Utc>,
}

/// Participants keyed by user id
#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: BTreeMap<String, Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a user on `branch`. A user already present keeps their
    /// original join time; profile and branch are refreshed.
    pub fn join(&mut self, user: User, branch: &str) -> &Participant {
        let now = Utc::now();
        let participant = self
            .participants
            .entry(user.id.clone())
            .or_insert_with(|| Participant {
                user: user.clone(),
                branch: String::from(branch),
                joined_at: now,
            });
        participant.user = user;
        participant.branch = String::from(branch);
        participant
    }

    pub fn leave(&mut self, user_id: &str) -> Option<Participant> {
        self.participants.remove(user_id)
    }

    /// Record that a user switched branch. Returns `false` for unknown users.
    pub fn move_to(&mut self, user_id: &str, branch: &str) -> bool {
        match self.participants.get_mut(user_id) {
            Some(p) => {
                p.branch = String::from(branch);
                true
            }
            None => false,
        }
    }

    /// Move everyone on `from` to `to`; returns how many moved
    pub fn reassign(&mut self, from: &str, to: &str) -> usize {
        let mut moved = 0;
        for p in self.participants.values_mut().filter(|p| p.branch == from) {
            p.branch = String::from(to);
            moved += 1;
        }
        moved
    }

    pub fn get(&self, user_id: &str) -> Option<&Participant> {
        self.participants.get(user_id)
    }

    pub fn participants(&self) -> Vec<&Participant> {
        self.participants.values().collect()
    }

    pub fn on_branch(&self, branch: &str) -> Vec<&Participant> {
        self.participants
            .values()
            .filter(|p| p.branch == branch)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
