// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{Error, Image, ObjectType, RemoteObject, Repository, Session};
use log::{debug, warn};
use std::{collections::HashSet, convert::Infallible, fmt::Display, str::FromStr};

/// Kind of object a run starts from.
///
/// Parsing is exact: `"Project"`, `"Dataset"` and `"Image"` map to their
/// variants, anything else (including other capitalisations) is kept as
/// [`TargetKind::Other`] and resolves to no images.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetKind {
    Project,
    Dataset,
    Image,
    Other(String),
}

impl FromStr for TargetKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Project" => TargetKind::Project,
            "Dataset" => TargetKind::Dataset,
            "Image" => TargetKind::Image,
            other => TargetKind::Other(other.to_string()),
        })
    }
}

impl Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TargetKind::Project => write!(f, "Project"),
            TargetKind::Dataset => write!(f, "Dataset"),
            TargetKind::Image => write!(f, "Image"),
            TargetKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

impl TargetKind {
    /// Repository object type for the known kinds.
    pub fn object_type(&self) -> Option<ObjectType> {
        match self {
            TargetKind::Project => Some(ObjectType::Project),
            TargetKind::Dataset => Some(ObjectType::Dataset),
            TargetKind::Image => Some(ObjectType::Image),
            TargetKind::Other(_) => None,
        }
    }
}

/// Starting point of a run: every object of `kind` named `name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    kind: TargetKind,
    name: String,
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {:?}", self.kind, self.name)
    }
}

impl Target {
    pub fn new(kind: TargetKind, name: impl Into<String>) -> Self {
        Target {
            kind,
            name: name.into(),
        }
    }

    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Resolve a target into the images reachable from it.
///
/// Every object of the target's kind whose name matches is traversed:
/// images are returned as-is, datasets contribute their images, projects the
/// images of each of their datasets.  The result is the union of those
/// images: an image linked under several matching containers is returned
/// once, at its first position in the repository's listing order.  A name
/// that matches nothing yields an empty list.
#[cfg_attr(feature = "profiling", tracing::instrument(skip(repo, session)))]
pub async fn resolve_images<R: Repository>(
    repo: &R,
    session: &Session,
    target: &Target,
) -> Result<Vec<Image>, Error> {
    let Some(object_type) = target.kind.object_type() else {
        warn!(
            "Unknown target type {:?}, expected Project, Dataset or Image",
            target.kind.to_string()
        );
        return Ok(Vec::new());
    };

    let roots = repo.list_objects(session, object_type, &target.name).await?;
    debug!("{} matched {} object(s)", target, roots.len());

    let images = match object_type {
        ObjectType::Image => roots,
        ObjectType::Dataset => dataset_images(repo, session, &roots).await?,
        ObjectType::Project => {
            let mut datasets = Vec::new();
            for project in &roots {
                datasets.extend(
                    repo.list_children(session, ObjectType::Project, project.id())
                        .await?,
                );
            }
            dataset_images(repo, session, &datasets).await?
        }
    };

    let mut seen = HashSet::new();
    let images: Vec<Image> = images
        .into_iter()
        .filter(|image| seen.insert(image.id()))
        .map(Image::from)
        .collect();
    debug!("{} resolved to {} image(s)", target, images.len());
    Ok(images)
}

async fn dataset_images<R: Repository>(
    repo: &R,
    session: &Session,
    datasets: &[RemoteObject],
) -> Result<Vec<RemoteObject>, Error> {
    let mut images = Vec::new();
    for dataset in datasets {
        images.extend(
            repo.list_children(session, ObjectType::Dataset, dataset.id())
                .await?,
        );
    }
    Ok(images)
}
