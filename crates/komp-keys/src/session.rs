// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Session establishment and scoped release.
//!
//! A run logs in once, either directly as the annotating user or through an
//! administrator ("sudo") account that opens a session on the user's behalf,
//! and releases that session exactly once when the run ends, whether it
//! succeeded or not.
//!
//! # Examples
//!
//! ```rust
//! use komp_keys::{
//!     ConnectOptions, MemoryRepository, StaticCredentials, open_session, with_session,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), komp_keys::Error> {
//! let repo = MemoryRepository::new();
//! repo.add_user("mpk", "secret");
//! repo.add_group("KOMP_eye");
//!
//! let options = ConnectOptions::new("mpk", "KOMP_eye");
//! let session = open_session(&repo, &StaticCredentials::new("secret"), &options).await?;
//! let user = with_session(&repo, session, async |session| Ok(session.user().to_string())).await?;
//! assert_eq!(user, "mpk");
//! assert_eq!(repo.open_sessions(), 0);
//! # Ok(())
//! # }
//! ```

use crate::{Credentials, Error, Repository, Session};
use log::{debug, warn};
use std::time::Duration;

/// Lifetime requested for sessions opened on another user's behalf.
pub const DEFAULT_SUDO_TTL: Duration = Duration::from_millis(600_000);

/// Source of passwords for repository logins.
///
/// The command line tool prompts on the terminal; tests and scripted runs
/// supply a fixed password with [`StaticCredentials`].
pub trait CredentialProvider {
    /// Return the password of `principal`.
    fn password(&self, principal: &str) -> Result<String, Error>;
}

/// Credential provider returning the same password for every principal.
#[derive(Clone)]
pub struct StaticCredentials {
    password: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials").finish_non_exhaustive()
    }
}

impl StaticCredentials {
    pub fn new(password: impl Into<String>) -> Self {
        StaticCredentials {
            password: password.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn password(&self, _principal: &str) -> Result<String, Error> {
        Ok(self.password.clone())
    }
}

/// Who to act as, in which group, and through which account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectOptions {
    /// User that will own the annotations.
    pub user: String,
    /// Name of the group the targets live in.
    pub group: String,
    /// Administrator account to log in with, when acting for `user`.
    pub sudo: Option<String>,
    /// Lifetime of the elevated session.
    pub ttl: Duration,
}

impl ConnectOptions {
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        ConnectOptions {
            user: user.into(),
            group: group.into(),
            sudo: None,
            ttl: DEFAULT_SUDO_TTL,
        }
    }

    pub fn with_sudo(self, sudo: impl Into<String>) -> Self {
        ConnectOptions {
            sudo: Some(sudo.into()),
            ..self
        }
    }

    pub fn with_ttl(self, ttl: Duration) -> Self {
        ConnectOptions { ttl, ..self }
    }
}

/// Open the session a run works in.
///
/// With `options.sudo` set, the password is requested for the sudo account,
/// which is used only to open a session for `options.user` in
/// `options.group`; the sudo session is closed again before this returns.
/// Otherwise the password is requested for `options.user`, and the group is
/// looked up by name and made active.
///
/// Any session opened here is closed before an error is returned.
pub async fn open_session<R, C>(
    repo: &R,
    credentials: &C,
    options: &ConnectOptions,
) -> Result<Session, Error>
where
    R: Repository,
    C: CredentialProvider + ?Sized,
{
    match &options.sudo {
        Some(sudo) => {
            let password = credentials.password(sudo)?;
            let admin = repo.connect(&Credentials::new(sudo.as_str(), password)).await?;
            let elevated = repo
                .elevate(&admin, &options.user, &options.group, options.ttl)
                .await;
            release(repo, admin).await;
            let session = elevated?;
            debug!(
                "Acting as {} in group {} via {}",
                options.user, options.group, sudo
            );
            Ok(session)
        }
        None => {
            let password = credentials.password(&options.user)?;
            let session = repo
                .connect(&Credentials::new(options.user.as_str(), password))
                .await?;
            match select_group(repo, &session, &options.group).await {
                Ok(()) => Ok(session),
                Err(e) => {
                    release(repo, session).await;
                    Err(e)
                }
            }
        }
    }
}

async fn select_group<R: Repository>(
    repo: &R,
    session: &Session,
    group: &str,
) -> Result<(), Error> {
    let group_id = repo.resolve_group_id(session, group).await?;
    debug!("Group {} resolved to {}", group, group_id);
    repo.set_active_group(session, group_id).await
}

/// Close a session, logging a close failure instead of returning it.
async fn release<R: Repository>(repo: &R, session: Session) {
    let user = session.user().to_string();
    if let Err(e) = repo.close(session).await {
        warn!("Failed to close session for {}: {}", user, e);
    }
}

/// Run `body` in `session`, then close the session.
///
/// The session is closed exactly once whatever `body` returns.  When `body`
/// fails its error is returned and a close failure is only logged; when
/// `body` succeeds a close failure is returned.
pub async fn with_session<R, F, T>(repo: &R, session: Session, body: F) -> Result<T, Error>
where
    R: Repository,
    F: AsyncFnOnce(&Session) -> Result<T, Error>,
{
    let result = body(&session).await;
    match result {
        Ok(value) => {
            repo.close(session).await?;
            Ok(value)
        }
        Err(e) => {
            release(repo, session).await;
            Err(e)
        }
    }
}
