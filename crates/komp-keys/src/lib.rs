// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # KOMP Keys
//!
//! Attaches the KOMP eye phenotyping key-value templates to images in an
//! image repository, so annotators find empty fields ready to fill in.
//!
//! A run has three steps:
//!
//! - **Session**: log in as the annotating user, or through an administrator
//!   account acting on the user's behalf, and select the working group
//! - **Targets**: resolve a Project, Dataset or Image name into the images
//!   below it
//! - **Annotation**: give every image that is not yet marked the template
//!   matching its filename suffix
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use komp_keys::{
//!     Client, ConnectOptions, Error, StaticCredentials, Target, TargetKind, annotate_images,
//!     open_session, resolve_images, with_session,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let client = Client::new("bhomero01lp.jax.org", 4064)?;
//!     let options = ConnectOptions::new("mpk", "KOMP_eye");
//!     let session = open_session(&client, &StaticCredentials::new("password"), &options).await?;
//!
//!     let target = Target::new(TargetKind::Dataset, "EyeBatch1");
//!     let summary = with_session(&client, session, async |session| {
//!         let images = resolve_images(&client, session, &target).await?;
//!         annotate_images(&client, session, &images, |image, outcome| {
//!             println!("{}: {:?}", image.name(), outcome);
//!         })
//!         .await
//!     })
//!     .await?;
//!     println!("{}", summary);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `profiling`: `tracing` spans around target resolution and per-image
//!   annotation

mod annotate;
mod api;
mod client;
mod config;
mod error;
mod repository;
mod session;
mod target;

pub use crate::{
    annotate::{
        COMPLETION_KEY, Classification, NSCLIENTMAPANNOTATION, Outcome, Summary, Template,
        annotate_image, annotate_images, classify,
    },
    api::{
        AnnotationID, Credentials, GroupID, Image, MapAnnotation, ObjectID, ObjectType,
        RemoteObject, Session,
    },
    client::Client,
    config::{
        CONFIG_ENV, DEFAULT_GROUP, DEFAULT_PORT, DEFAULT_SERVER, DEFAULT_USER, Settings,
        default_path,
    },
    error::Error,
    repository::{MemoryRepository, Repository},
    session::{
        ConnectOptions, CredentialProvider, DEFAULT_SUDO_TTL, StaticCredentials, open_session,
        with_session,
    },
    target::{Target, TargetKind, resolve_images},
};
