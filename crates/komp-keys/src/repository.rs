// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Repository abstraction for the image-data server.
//!
//! Everything the tool does remotely goes through the [`Repository`] trait:
//! logging in, impersonation, group selection, walking the
//! Project/Dataset/Image hierarchy, and reading and writing map annotations.
//!
//! # Implementations
//!
//! - [`Client`]: JSON-RPC client for the repository gateway
//! - [`MemoryRepository`]: in-process repository (no network)
//!
//! # Examples
//!
//! ```rust
//! use komp_keys::{Credentials, MemoryRepository, ObjectType, Repository};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), komp_keys::Error> {
//! let repo = MemoryRepository::new();
//! repo.add_user("mpk", "secret");
//! let dataset = repo.add_dataset("EyeBatch1");
//! repo.add_image(dataset, "A.tif");
//!
//! let session = repo.connect(&Credentials::new("mpk", "secret")).await?;
//! let found = repo
//!     .list_objects(&session, ObjectType::Dataset, "EyeBatch1")
//!     .await?;
//! assert_eq!(found.len(), 1);
//! repo.close(session).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Client`]: crate::Client

use crate::{
    AnnotationID, Credentials, Error, GroupID, MapAnnotation, ObjectID, ObjectType,
    RemoteObject, Session,
};
use log::debug;
use std::{
    collections::HashMap,
    future::Future,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

/// Operations consumed from the remote image repository.
///
/// Every call after [`connect`][Self::connect] takes the [`Session`] it acts
/// in.  Errors are returned as-is; implementations do not retry.
pub trait Repository {
    /// Log in and open a new session.
    fn connect(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// Open a session for `target_user` in `target_group` on behalf of the
    /// administrator owning `session`.
    ///
    /// The returned session is independent of `session`, which should be
    /// closed by the caller once it is no longer needed.
    fn elevate(
        &self,
        session: &Session,
        target_user: &str,
        target_group: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<Session, Error>> + Send;

    /// Look up the ID of the experimenter group named `group_name`.
    fn resolve_group_id(
        &self,
        session: &Session,
        group_name: &str,
    ) -> impl Future<Output = Result<GroupID, Error>> + Send;

    /// Make `group_id` the active group of `session`.
    fn set_active_group(
        &self,
        session: &Session,
        group_id: GroupID,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// List all objects of `object_type` whose name equals `name`.
    fn list_objects(
        &self,
        session: &Session,
        object_type: ObjectType,
        name: &str,
    ) -> impl Future<Output = Result<Vec<RemoteObject>, Error>> + Send;

    /// List the direct children of the container `id` of `object_type`.
    fn list_children(
        &self,
        session: &Session,
        object_type: ObjectType,
        id: ObjectID,
    ) -> impl Future<Output = Result<Vec<RemoteObject>, Error>> + Send;

    /// List the IDs of the map annotations linked to an object under
    /// `namespace`.
    fn list_annotations(
        &self,
        session: &Session,
        object_type: ObjectType,
        id: ObjectID,
        namespace: &str,
    ) -> impl Future<Output = Result<Vec<AnnotationID>, Error>> + Send;

    /// Fetch a map annotation.
    fn get_annotation(
        &self,
        session: &Session,
        id: AnnotationID,
    ) -> impl Future<Output = Result<MapAnnotation, Error>> + Send;

    /// Create a map annotation and link it to an object.
    fn post_annotation(
        &self,
        session: &Session,
        object_type: ObjectType,
        id: ObjectID,
        annotation: &MapAnnotation,
    ) -> impl Future<Output = Result<AnnotationID, Error>> + Send;

    /// Release the session.
    fn close(&self, session: Session) -> impl Future<Output = Result<(), Error>> + Send;
}

#[derive(Debug)]
struct Account {
    password: String,
    admin: bool,
}

#[derive(Debug)]
struct OpenSession {
    user: String,
    group: Option<GroupID>,
    ttl: Option<Duration>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    accounts: HashMap<String, Account>,
    groups: Vec<(GroupID, String)>,
    objects: Vec<(ObjectType, RemoteObject)>,
    children: HashMap<(ObjectType, ObjectID), Vec<ObjectID>>,
    annotations: HashMap<AnnotationID, MapAnnotation>,
    links: HashMap<(ObjectType, ObjectID), Vec<AnnotationID>>,
    sessions: HashMap<String, OpenSession>,
    closed: usize,
    posts: usize,
    fail_posts_after: Option<usize>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn session(&self, session: &Session) -> Result<&OpenSession, Error> {
        self.sessions
            .get(session.key())
            .ok_or(Error::InvalidSession)
    }

    fn object(&self, object_type: ObjectType, id: ObjectID) -> Option<&RemoteObject> {
        self.objects
            .iter()
            .find(|(kind, obj)| *kind == object_type && obj.id() == id)
            .map(|(_, obj)| obj)
    }

    fn open(&mut self, user: &str, group: Option<GroupID>, ttl: Option<Duration>) -> Session {
        let key = format!("memory-session-{}", self.next_id());
        self.sessions.insert(
            key.clone(),
            OpenSession {
                user: user.to_string(),
                group,
                ttl,
            },
        );
        Session::new(key, user)
    }
}

/// In-memory repository (no network).
///
/// Holds accounts, groups, the Project/Dataset/Image hierarchy and the map
/// annotations linked to objects.  Listings return objects in insertion
/// order.  Useful for:
///
/// - Testing the resolve and annotate passes
/// - Rehearsing a run against a hand-built hierarchy
///
/// Objects are global and visible from any group.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    /// Create an empty `MemoryRepository`.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a regular account.
    pub fn add_user(&self, username: &str, password: &str) {
        self.write().accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                admin: false,
            },
        );
    }

    /// Add an account allowed to open sessions for other users.
    pub fn add_admin(&self, username: &str, password: &str) {
        self.write().accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                admin: true,
            },
        );
    }

    pub fn add_group(&self, name: &str) -> GroupID {
        let mut state = self.write();
        let id = GroupID::from(state.next_id());
        state.groups.push((id, name.to_string()));
        id
    }

    pub fn add_project(&self, name: &str) -> ObjectID {
        self.insert(ObjectType::Project, name)
    }

    /// Add a dataset without a parent project.
    pub fn add_dataset(&self, name: &str) -> ObjectID {
        self.insert(ObjectType::Dataset, name)
    }

    /// Add a dataset linked under `project`.
    pub fn add_project_dataset(&self, project: ObjectID, name: &str) -> ObjectID {
        let id = self.insert(ObjectType::Dataset, name);
        self.link(ObjectType::Project, project, id);
        id
    }

    /// Add an image linked under `dataset`.
    pub fn add_image(&self, dataset: ObjectID, name: &str) -> ObjectID {
        let id = self.insert(ObjectType::Image, name);
        self.link(ObjectType::Dataset, dataset, id);
        id
    }

    /// Add an image outside of any dataset.
    pub fn add_orphan_image(&self, name: &str) -> ObjectID {
        self.insert(ObjectType::Image, name)
    }

    /// Link an existing child under `parent` of `parent_type`.
    pub fn link(&self, parent_type: ObjectType, parent: ObjectID, child: ObjectID) {
        self.write()
            .children
            .entry((parent_type, parent))
            .or_default()
            .push(child);
    }

    fn insert(&self, object_type: ObjectType, name: &str) -> ObjectID {
        let mut state = self.write();
        let id = ObjectID::from(state.next_id());
        state.objects.push((object_type, RemoteObject::new(id, name)));
        id
    }

    /// Link an annotation to an object directly, bypassing sessions.
    pub fn attach(
        &self,
        object_type: ObjectType,
        id: ObjectID,
        annotation: MapAnnotation,
    ) -> AnnotationID {
        let mut state = self.write();
        let ann_id = AnnotationID::from(state.next_id());
        state.annotations.insert(ann_id, annotation);
        state
            .links
            .entry((object_type, id))
            .or_default()
            .push(ann_id);
        ann_id
    }

    /// All annotations linked to an object, in link order, any namespace.
    pub fn annotations_of(&self, object_type: ObjectType, id: ObjectID) -> Vec<MapAnnotation> {
        let state = self.read();
        state
            .links
            .get(&(object_type, id))
            .map(|ids| {
                ids.iter()
                    .filter_map(|ann_id| state.annotations.get(ann_id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Make every post after the first `count` successful ones fail.
    pub fn fail_posts_after(&self, count: usize) {
        self.write().fail_posts_after = Some(count);
    }

    /// Stop failing posts.
    pub fn restore_posts(&self) {
        self.write().fail_posts_after = None;
    }

    /// Number of successful annotation posts.
    pub fn posts(&self) -> usize {
        self.read().posts
    }

    /// Number of sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.read().sessions.len()
    }

    /// Number of sessions released with [`Repository::close`].
    pub fn closed_sessions(&self) -> usize {
        self.read().closed
    }

    /// Active group of an open session.
    pub fn active_group(&self, session: &Session) -> Option<GroupID> {
        self.read()
            .sessions
            .get(session.key())
            .and_then(|s| s.group)
    }

    /// Lifetime requested for an elevated session.
    pub fn session_ttl(&self, session: &Session) -> Option<Duration> {
        self.read().sessions.get(session.key()).and_then(|s| s.ttl)
    }

    fn group_id(state: &State, name: &str) -> Result<GroupID, Error> {
        state
            .groups
            .iter()
            .find(|(_, group)| group == name)
            .map(|(id, _)| *id)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }
}

impl Repository for MemoryRepository {
    async fn connect(&self, credentials: &Credentials) -> Result<Session, Error> {
        let mut state = self.write();
        match state.accounts.get(credentials.username()) {
            Some(account) if account.password == credentials.password() => {}
            _ => return Err(Error::AuthenticationFailed(credentials.username().to_string())),
        }
        let session = state.open(credentials.username(), None, None);
        debug!("memory session opened for {}", credentials.username());
        Ok(session)
    }

    async fn elevate(
        &self,
        session: &Session,
        target_user: &str,
        target_group: &str,
        ttl: Duration,
    ) -> Result<Session, Error> {
        let mut state = self.write();
        let owner = state.session(session)?.user.clone();
        if !state.accounts.get(&owner).is_some_and(|a| a.admin) {
            return Err(Error::Unauthorized);
        }
        if !state.accounts.contains_key(target_user) {
            return Err(Error::NotFound(format!("user {}", target_user)));
        }
        let group = Self::group_id(&state, target_group)?;
        Ok(state.open(target_user, Some(group), Some(ttl)))
    }

    async fn resolve_group_id(
        &self,
        session: &Session,
        group_name: &str,
    ) -> Result<GroupID, Error> {
        let state = self.read();
        state.session(session)?;
        Self::group_id(&state, group_name)
    }

    async fn set_active_group(&self, session: &Session, group_id: GroupID) -> Result<(), Error> {
        let mut state = self.write();
        if !state.groups.iter().any(|(id, _)| *id == group_id) {
            return Err(Error::GroupNotFound(group_id.to_string()));
        }
        let open = state
            .sessions
            .get_mut(session.key())
            .ok_or(Error::InvalidSession)?;
        open.group = Some(group_id);
        Ok(())
    }

    async fn list_objects(
        &self,
        session: &Session,
        object_type: ObjectType,
        name: &str,
    ) -> Result<Vec<RemoteObject>, Error> {
        let state = self.read();
        state.session(session)?;
        Ok(state
            .objects
            .iter()
            .filter(|(kind, obj)| *kind == object_type && obj.name() == name)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn list_children(
        &self,
        session: &Session,
        object_type: ObjectType,
        id: ObjectID,
    ) -> Result<Vec<RemoteObject>, Error> {
        let state = self.read();
        state.session(session)?;
        let child_type = object_type
            .child()
            .ok_or_else(|| Error::InvalidParameters(format!("{} has no children", object_type)))?;
        if state.object(object_type, id).is_none() {
            return Err(Error::NotFound(format!("{}:{}", object_type, id)));
        }
        let children = state
            .children
            .get(&(object_type, id))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(children
            .iter()
            .filter_map(|child| state.object(child_type, *child).cloned())
            .collect())
    }

    async fn list_annotations(
        &self,
        session: &Session,
        object_type: ObjectType,
        id: ObjectID,
        namespace: &str,
    ) -> Result<Vec<AnnotationID>, Error> {
        let state = self.read();
        state.session(session)?;
        let linked = state
            .links
            .get(&(object_type, id))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(linked
            .iter()
            .filter(|ann_id| {
                state
                    .annotations
                    .get(ann_id)
                    .is_some_and(|ann| ann.namespace() == namespace)
            })
            .copied()
            .collect())
    }

    async fn get_annotation(
        &self,
        session: &Session,
        id: AnnotationID,
    ) -> Result<MapAnnotation, Error> {
        let state = self.read();
        state.session(session)?;
        state
            .annotations
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("MapAnnotation:{}", id)))
    }

    async fn post_annotation(
        &self,
        session: &Session,
        object_type: ObjectType,
        id: ObjectID,
        annotation: &MapAnnotation,
    ) -> Result<AnnotationID, Error> {
        let mut state = self.write();
        state.session(session)?;
        if state.object(object_type, id).is_none() {
            return Err(Error::NotFound(format!("{}:{}", object_type, id)));
        }
        if state.fail_posts_after.is_some_and(|limit| state.posts >= limit) {
            return Err(Error::WriteFailure(format!(
                "injected failure linking to {}:{}",
                object_type, id
            )));
        }
        let ann_id = AnnotationID::from(state.next_id());
        state.annotations.insert(ann_id, annotation.clone());
        state
            .links
            .entry((object_type, id))
            .or_default()
            .push(ann_id);
        state.posts += 1;
        Ok(ann_id)
    }

    async fn close(&self, session: Session) -> Result<(), Error> {
        let mut state = self.write();
        state
            .sessions
            .remove(session.key())
            .ok_or(Error::InvalidSession)?;
        state.closed += 1;
        debug!("memory session closed for {}", session.user());
        Ok(())
    }
}
