//! User profile rows: lazy creation after first sign-in, explicit creation
//! at signup, and lookup by username.

use thiserror::Error;

use missive_shared::constants::{DEFAULT_USERNAME, EMAIL_PROVIDER};
use missive_shared::{AuthIdentity, NewUser, Session, User, UserId};

use crate::backend::{BackendDataService, BackendError};

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Username and email are required")]
    MissingFields,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Display name for a new profile: full name, then name, then the local
/// part of the email, then a fixed fallback.
pub fn username_from_identity(identity: &AuthIdentity) -> String {
    let non_blank = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    non_blank(&identity.full_name)
        .or_else(|| non_blank(&identity.name))
        .or_else(|| {
            identity
                .email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .map(str::trim)
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_USERNAME.to_string())
}

/// Fetch the session user's profile, creating it on first sign-in.
pub async fn ensure_profile(
    backend: &dyn BackendDataService,
    session: &Session,
) -> Result<User, ProfileError> {
    if let Some(row) = backend.select_user(&session.user_id).await? {
        return Ok(row.into());
    }

    let identity = &session.identity;
    let new_user = NewUser {
        id: session.user_id.clone(),
        username: username_from_identity(identity),
        profile_img: identity.avatar_url.clone().unwrap_or_default(),
        email: identity.email.clone().unwrap_or_default(),
        provider: identity
            .provider
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| EMAIL_PROVIDER.to_string()),
    };

    let row = backend.insert_user(&new_user).await?;
    tracing::info!(
        user = %session.user_id.short(),
        provider = %new_user.provider,
        "profile created on first sign-in"
    );
    Ok(row.into())
}

/// Create the profile row for an email/password signup.
pub async fn create_profile(
    backend: &dyn BackendDataService,
    user_id: &UserId,
    username: &str,
    email: &str,
    profile_img: Option<&str>,
) -> Result<User, ProfileError> {
    let username = username.trim();
    let email = email.trim();
    if user_id.is_empty() || username.is_empty() || email.is_empty() {
        return Err(ProfileError::MissingFields);
    }

    let row = backend
        .insert_user(&NewUser {
            id: user_id.clone(),
            username: username.to_string(),
            profile_img: profile_img.unwrap_or_default().to_string(),
            email: email.to_string(),
            provider: EMAIL_PROVIDER.to_string(),
        })
        .await?;
    Ok(row.into())
}

pub async fn find_by_username(
    backend: &dyn BackendDataService,
    username: &str,
) -> Result<Option<User>, ProfileError> {
    Ok(backend
        .select_user_by_username(username)
        .await?
        .map(User::from))
}
