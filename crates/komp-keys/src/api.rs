// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

#[derive(Deserialize)]
pub(crate) struct LoginResult {
    pub(crate) session: String,
}

/// Unique identifier of a Project, Dataset or Image in the repository.
///
/// Object IDs are plain integers on the server.  They are only unique within
/// an object type, so an ID is always paired with an [`ObjectType`] when it
/// is sent to the repository.
///
/// # Examples
///
/// ```rust
/// use komp_keys::ObjectID;
/// use std::str::FromStr;
///
/// let id = ObjectID::from(1234);
/// assert_eq!(id.to_string(), "1234");
/// assert_eq!(ObjectID::from_str("1234").unwrap(), id);
/// ```
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectID(u64);

impl Display for ObjectID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ObjectID {
    fn from(id: u64) -> Self {
        ObjectID(id)
    }
}

impl From<ObjectID> for u64 {
    fn from(val: ObjectID) -> Self {
        val.0
    }
}

impl ObjectID {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl FromStr for ObjectID {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ObjectID(s.trim().parse()?))
    }
}

/// Unique identifier of a map annotation.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnnotationID(u64);

impl Display for AnnotationID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AnnotationID {
    fn from(id: u64) -> Self {
        AnnotationID(id)
    }
}

/// Unique identifier of an experimenter group.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupID(u64);

impl Display for GroupID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GroupID {
    fn from(id: u64) -> Self {
        GroupID(id)
    }
}

/// Object types of the repository container hierarchy.
///
/// Serialized with the exact capitalisation the repository expects
/// (`"Project"`, `"Dataset"`, `"Image"`).
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Project,
    Dataset,
    Image,
}

impl ObjectType {
    /// The object type one level below this one, `None` for images.
    pub fn child(&self) -> Option<ObjectType> {
        match self {
            ObjectType::Project => Some(ObjectType::Dataset),
            ObjectType::Dataset => Some(ObjectType::Image),
            ObjectType::Image => None,
        }
    }
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ObjectType::Project => "Project",
            ObjectType::Dataset => "Dataset",
            ObjectType::Image => "Image",
        };
        write!(f, "{}", name)
    }
}

/// A named object returned by a repository listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RemoteObject {
    id: ObjectID,
    name: String,
}

impl Display for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}] {}", self.id, self.name)
    }
}

impl RemoteObject {
    pub fn new(id: ObjectID, name: impl Into<String>) -> Self {
        RemoteObject {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> ObjectID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Handle to an image owned by the repository.
///
/// The tool never creates or deletes images; it reads the identity and the
/// display name, and links new annotations to the image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    id: ObjectID,
    name: String,
}

impl Display for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Image:{} {}", self.id, self.name)
    }
}

impl From<RemoteObject> for Image {
    fn from(obj: RemoteObject) -> Self {
        Image {
            id: obj.id,
            name: obj.name,
        }
    }
}

impl Image {
    pub fn id(&self) -> ObjectID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Key-value annotation attached to a repository object.
///
/// Values are kept as an ordered list of pairs, which is how the repository
/// stores them: keys may repeat and their order is shown to users as-is.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MapAnnotation {
    #[serde(rename = "ns")]
    namespace: String,
    values: Vec<(String, String)>,
}

impl MapAnnotation {
    pub fn new(namespace: impl Into<String>, values: Vec<(String, String)>) -> Self {
        MapAnnotation {
            namespace: namespace.into(),
            values,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn values(&self) -> &[(String, String)] {
        &self.values
    }

    /// Keys in stored order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys().any(|k| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Username and password for a repository login.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

/// An open repository session.
///
/// Every repository operation takes the session explicitly.  A session is
/// released by passing it by value to [`Repository::close`], which makes a
/// second release impossible without cloning.
///
/// [`Repository::close`]: crate::Repository::close
#[derive(PartialEq, Eq)]
pub struct Session {
    key: String,
    user: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("has_key", &!self.key.is_empty())
            .finish()
    }
}

impl Session {
    pub fn new(key: impl Into<String>, user: impl Into<String>) -> Self {
        Session {
            key: key.into(),
            user: user.into(),
        }
    }

    /// Session key sent with every request.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// User the session acts as.
    pub fn user(&self) -> &str {
        &self.user
    }
}
