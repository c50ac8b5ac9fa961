//! Owner resolution.
//!
//! Exactly one account is privileged: the owner, whose id is fixed at
//! startup. Owner and admin are the same role. When no owner id is
//! configured the check fails closed and nobody is the owner.

use serde::Serialize;

use missive_shared::UserId;

/// A viewer's role. Decides which messages they may load and who their
/// messages go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Regular,
}

#[derive(Debug, Clone, Default)]
pub struct OwnerResolver {
    owner: Option<UserId>,
}

impl OwnerResolver {
    /// A blank id is treated the same as no id at all.
    pub fn new(owner: Option<UserId>) -> Self {
        let owner = owner.filter(|id| !id.is_empty());
        if owner.is_none() {
            tracing::warn!("owner id not configured; owner features are disabled");
        }
        Self { owner }
    }

    pub fn owner_id(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    /// `false` for `None`, for an empty id, and whenever no owner is
    /// configured.
    pub fn is_owner(&self, user: Option<&UserId>) -> bool {
        match (user, &self.owner) {
            (Some(user), Some(owner)) => !user.is_empty() && user == owner,
            _ => false,
        }
    }

    pub fn role_of(&self, user: &UserId) -> Role {
        if self.is_owner(Some(user)) {
            Role::Owner
        } else {
            Role::Regular
        }
    }
}
