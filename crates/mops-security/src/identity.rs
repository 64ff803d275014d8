//! ---
//! mops_section: "06-security-access-control"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Access policy, identity, and activity auditing."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::rbac::{AccessPolicy, Action, Role};

/// Identifier for a user profile.
pub type UserId = String;

/// Identity record owned by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// Stable opaque identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Contact email.
    pub email: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
    /// Assigned role.
    pub role: Role,
    /// Whether a client account has paid.
    pub is_client_paid: bool,
    /// Subscription plan name.
    pub subscription_plan: Option<String>,
    /// Subscription start date.
    pub subscription_start: Option<NaiveDate>,
    /// Subscription end date.
    pub subscription_end: Option<NaiveDate>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Short helper for constructing a new profile with a fresh id.
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: None,
            phone: None,
            role,
            is_client_paid: false,
            subscription_plan: None,
            subscription_start: None,
            subscription_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Session for this profile.
    pub fn session(&self) -> Session {
        Session::new(self.id.clone(), self.role)
    }
}

/// Explicit per-request caller context.
///
/// `role` is `None` when the identity provider reported a role name outside the
/// closed set; such a session holds no permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Current user id.
    pub user_id: UserId,
    /// Current role.
    pub role: Option<Role>,
    /// Site the session is scoped to, if any.
    pub site_id: Option<String>,
}

impl Session {
    /// Session with a known role.
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role: Some(role),
            site_id: None,
        }
    }

    /// Session from untyped identity claims.
    pub fn from_claims(user_id: impl Into<UserId>, role: &str) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::parse(role),
            site_id: None,
        }
    }

    /// Scope the session to a site.
    pub fn with_site(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    /// Role name for logging; `unknown` for unrecognised roles.
    pub fn role_name(&self) -> &str {
        self.role.map(|role| role.as_str()).unwrap_or("unknown")
    }
}

/// Errors returned by the identity subsystem.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Attempted to register a username that already exists.
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    /// Username was blank.
    #[error("username cannot be empty")]
    EmptyUsername,
    /// Profile not found.
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    /// The caller may not change roles.
    #[error("session {0} is not permitted to manage users")]
    Forbidden(UserId),
}

/// In-memory profile directory.
///
/// The first profile ever registered becomes [`Role::Admin`]; every later one
/// becomes [`Role::Client`]. The emptiness check and the insert happen under a
/// single write lock, so concurrent first registrations serialise and exactly
/// one of them is bootstrapped as admin.
#[derive(Debug, Default, Clone)]
pub struct IdentityProvider {
    profiles: Arc<RwLock<IndexMap<UserId, Profile>>>,
}

impl IdentityProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new account, applying the first-user bootstrap rule.
    pub fn register(
        &self,
        username: &str,
        email: Option<String>,
    ) -> Result<Profile, IdentityError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(IdentityError::EmptyUsername);
        }
        let mut profiles = self.profiles.write();
        if profiles.values().any(|p| p.username == username) {
            return Err(IdentityError::UsernameTaken(username.to_owned()));
        }
        let role = if profiles.is_empty() {
            Role::Admin
        } else {
            Role::Client
        };
        let mut profile = Profile::new(username, role);
        profile.email = email;
        profiles.insert(profile.id.clone(), profile.clone());
        drop(profiles);

        info!(
            user_id = %profile.id,
            username = %profile.username,
            role = %role,
            "profile registered"
        );
        Ok(profile)
    }

    /// Create or replace a profile verbatim (seeding, imports).
    pub fn upsert_profile(&self, profile: Profile) {
        self.profiles.write().insert(profile.id.clone(), profile);
    }

    /// Retrieve a profile by id.
    pub fn get_profile(&self, user_id: &str) -> Option<Profile> {
        self.profiles.read().get(user_id).cloned()
    }

    /// Retrieve a profile by username.
    pub fn find_by_username(&self, username: &str) -> Option<Profile> {
        self.profiles
            .read()
            .values()
            .find(|p| p.username == username)
            .cloned()
    }

    /// Session for an existing user, optionally scoped to a site.
    pub fn session_for(
        &self,
        user_id: &str,
        site_id: Option<&str>,
    ) -> Result<Session, IdentityError> {
        let profile = self
            .get_profile(user_id)
            .ok_or_else(|| IdentityError::UserNotFound(user_id.to_owned()))?;
        let mut session = profile.session();
        session.site_id = site_id.map(str::to_owned);
        Ok(session)
    }

    /// Change a user's role. Only sessions holding `users:write` may do this.
    pub fn set_role(
        &self,
        actor: &Session,
        policy: &AccessPolicy,
        user_id: &str,
        role: Role,
    ) -> Result<Profile, IdentityError> {
        if !policy.can_opt(actor.role, "users", Action::Write) {
            return Err(IdentityError::Forbidden(actor.user_id.clone()));
        }
        let mut profiles = self.profiles.write();
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| IdentityError::UserNotFound(user_id.to_owned()))?;
        profile.role = role;
        profile.updated_at = Utc::now();
        let updated = profile.clone();
        drop(profiles);

        info!(actor = %actor.user_id, user_id = %updated.id, role = %role, "role changed");
        Ok(updated)
    }

    /// Remove a profile, returning it if it existed.
    pub fn remove_profile(&self, user_id: &str) -> Option<Profile> {
        self.profiles.write().shift_remove(user_id)
    }

    /// Ids of every admin-class profile, in registration order.
    pub fn admin_ids(&self) -> Vec<UserId> {
        self.profiles
            .read()
            .values()
            .filter(|p| p.role.is_admin())
            .map(|p| p.id.clone())
            .collect()
    }

    /// Number of known profiles.
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// Whether no profile has been registered.
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}
