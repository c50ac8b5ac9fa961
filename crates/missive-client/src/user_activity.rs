//! Owner-only user activity: every account with its sign-in history.
//!
//! Sign-ins come from the auth provider's audit log, which the hosted
//! backend only exposes to elevated credentials. When the log cannot be
//! read the report still lists every user, with no sign-in data.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use missive_shared::constants::AUDIT_LOG_LIMIT;
use missive_shared::rows::AuthLogRow;
use missive_shared::{User, UserId};

use crate::backend::BackendDataService;
use crate::identity::{OwnerResolver, Role};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActivityError {
    #[error("user activity is only available to the owner")]
    NotOwner,
}

/// Sign-ins of `user` in `logs`.
pub fn login_count(user: &UserId, logs: &[AuthLogRow]) -> usize {
    sign_ins(user, logs).count()
}

/// Most recent sign-in of `user` in `logs`.
pub fn last_login(user: &UserId, logs: &[AuthLogRow]) -> Option<DateTime<Utc>> {
    sign_ins(user, logs).map(|log| log.created_at).max()
}

fn sign_ins<'a>(user: &'a UserId, logs: &'a [AuthLogRow]) -> impl Iterator<Item = &'a AuthLogRow> {
    logs.iter().filter(move |log| log.is_sign_in() && log.concerns(user))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserActivity {
    pub user: User,
    pub login_count: usize,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityReport {
    /// Newest account first.
    pub users: Vec<UserActivity>,
    /// Audit entries the report was computed from, newest first.
    pub logs: Vec<AuthLogRow>,
    /// False when the audit log could not be read.
    pub logs_available: bool,
}

impl ActivityReport {
    fn build(users: Vec<User>, logs: Option<Vec<AuthLogRow>>) -> Self {
        let logs_available = logs.is_some();
        let logs = logs.unwrap_or_default();
        let users = users
            .into_iter()
            .map(|user| UserActivity {
                login_count: login_count(&user.id, &logs),
                last_login: last_login(&user.id, &logs),
                user,
            })
            .collect();
        Self {
            users,
            logs,
            logs_available,
        }
    }

    /// Every audit entry about `user`, sign-in or not, newest first.
    pub fn logs_for<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a AuthLogRow> {
        self.logs.iter().filter(move |log| log.concerns(user))
    }
}

#[derive(Clone)]
pub struct UserActivityLoader {
    backend: Arc<dyn BackendDataService>,
    resolver: OwnerResolver,
}

impl UserActivityLoader {
    pub fn new(backend: Arc<dyn BackendDataService>, resolver: OwnerResolver) -> Self {
        Self { backend, resolver }
    }

    /// Build the report for `viewer`, who must be the owner. A failed user
    /// query yields an empty report.
    pub async fn load(&self, viewer: &UserId) -> Result<ActivityReport, ActivityError> {
        if self.resolver.role_of(viewer) != Role::Owner {
            tracing::warn!(viewer = %viewer.short(), "user activity requested by a non-owner");
            return Err(ActivityError::NotOwner);
        }

        let users = match self.backend.select_users().await {
            Ok(rows) => rows.into_iter().map(User::from).collect::<Vec<_>>(),
            Err(e) => {
                tracing::error!(error = %e, "failed to load users");
                return Ok(ActivityReport::default());
            }
        };

        let logs = match self.backend.select_auth_logs(AUDIT_LOG_LIMIT).await {
            Ok(logs) => Some(logs),
            Err(e) => {
                tracing::warn!(error = %e, "auth audit log unavailable, sign-in data omitted");
                None
            }
        };

        let report = ActivityReport::build(users, logs);
        tracing::debug!(
            users = report.users.len(),
            logs = report.logs.len(),
            "user activity loaded"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use missive_shared::rows::AuthLogPayload;

    use crate::test_support::{resolver, FlakyBackend, OWNER};

    fn entry(id: &str, action: &str, user: Option<&str>, actor: Option<&str>, hour: u32) -> AuthLogRow {
        AuthLogRow {
            id: id.to_string(),
            payload: Some(AuthLogPayload {
                action: Some(action.to_string()),
                user_id: user.map(str::to_string),
                actor_id: actor.map(str::to_string),
            }),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap(),
            ip_address: None,
        }
    }

    fn sample_logs() -> Vec<AuthLogRow> {
        vec![
            entry("4", "user_signedin", None, Some("alice"), 12),
            entry("3", "token_refreshed", None, Some("alice"), 11),
            entry("2", "user_signedin", Some("alice"), None, 9),
            entry("1", "user_signedin", None, Some("owner"), 8),
        ]
    }

    #[test]
    fn sign_ins_match_subject_or_actor() {
        let logs = sample_logs();
        let alice = UserId::new("alice");

        assert_eq!(login_count(&alice, &logs), 2);
        assert_eq!(
            last_login(&alice, &logs),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(login_count(&UserId::new("bob"), &logs), 0);
        assert_eq!(last_login(&UserId::new("bob"), &logs), None);
    }

    #[tokio::test]
    async fn owner_sees_every_user_with_sign_ins() {
        let backend = FlakyBackend::new();
        let owner = backend.seed_user(OWNER).await;
        let alice = backend.seed_user("alice").await;
        let bob = backend.seed_user("bob").await;
        backend.set_auth_logs(sample_logs());

        let report = UserActivityLoader::new(backend.clone(), resolver())
            .load(&owner)
            .await
            .unwrap();

        assert!(report.logs_available);
        let ids: Vec<&UserId> = report.users.iter().map(|a| &a.user.id).collect();
        assert_eq!(ids, vec![&bob, &alice, &owner]);

        let counts: Vec<usize> = report.users.iter().map(|a| a.login_count).collect();
        assert_eq!(counts, vec![0, 2, 1]);
        assert_eq!(report.logs_for(&alice).count(), 3);
    }

    #[tokio::test]
    async fn refused_audit_log_falls_back_to_plain_users() {
        let backend = FlakyBackend::new();
        let owner = backend.seed_user(OWNER).await;
        backend.seed_user("alice").await;

        let report = UserActivityLoader::new(backend.clone(), resolver())
            .load(&owner)
            .await
            .unwrap();

        assert!(!report.logs_available);
        assert_eq!(report.users.len(), 2);
        assert!(report
            .users
            .iter()
            .all(|a| a.login_count == 0 && a.last_login.is_none()));
    }

    #[tokio::test]
    async fn regular_users_are_refused() {
        let backend = FlakyBackend::new();
        backend.seed_user(OWNER).await;
        let alice = backend.seed_user("alice").await;

        let result = UserActivityLoader::new(backend.clone(), resolver())
            .load(&alice)
            .await;
        assert_eq!(result.unwrap_err(), ActivityError::NotOwner);
    }

    #[tokio::test]
    async fn failed_user_query_gives_an_empty_report() {
        let backend = FlakyBackend::new();
        backend.set_failing(true);

        let report = UserActivityLoader::new(backend.clone(), resolver())
            .load(&UserId::new(OWNER))
            .await
            .unwrap();
        assert!(report.users.is_empty());
        assert!(!report.logs_available);
    }
}
