// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Key-value templates and the annotation pass.
//!
//! Each image gets at most one template, chosen by filename suffix:
//!
//! | Suffix      | Template                  | Keys |
//! |-------------|---------------------------|------|
//! | `.ndpi [0]` | [`Template::Histology`]   | ocular tissues, `comments`, `annotation_status` |
//! | `.tif`      | [`Template::Fundus`]      | `fundus`, `comments`, `annotation_status` |
//!
//! An image that already has a map annotation under
//! [`NSCLIENTMAPANNOTATION`] containing [`COMPLETION_KEY`] is left alone, so
//! running the pass again over the same images writes nothing new.

use crate::{AnnotationID, Error, Image, MapAnnotation, ObjectType, Repository, Session};
use log::{debug, warn};
use std::fmt::Display;

/// Namespace of key-value annotations editable in the repository clients.
pub const NSCLIENTMAPANNOTATION: &str = "openmicroscopy.org/omero/client/mapAnnotation";

/// Key whose presence marks an image as already set up for annotation.
pub const COMPLETION_KEY: &str = "annotation_status";

const FUNDUS_KEYS: &[&str] = &["fundus", "comments", COMPLETION_KEY];

const HISTOLOGY_KEYS: &[&str] = &[
    "cornea",
    "iris",
    "ciliary_body",
    "lens",
    "retina",
    "RPE",
    "choroid",
    "sclera",
    "optic_nerve_head",
    "comments",
    COMPLETION_KEY,
];

/// The two annotation shapes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Template {
    /// Fundus photographs (`.tif`).
    Fundus,
    /// Whole-slide scans of ocular sections (`.ndpi [0]`).
    Histology,
}

impl Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Template::Fundus => write!(f, "fundus"),
            Template::Histology => write!(f, "histology"),
        }
    }
}

impl Template {
    /// Keys in the order they are shown to annotators.
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            Template::Fundus => FUNDUS_KEYS,
            Template::Histology => HISTOLOGY_KEYS,
        }
    }

    /// A fresh annotation with every key present and every value empty.
    pub fn to_annotation(&self) -> MapAnnotation {
        MapAnnotation::new(
            NSCLIENTMAPANNOTATION,
            self.keys()
                .iter()
                .map(|key| (key.to_string(), String::new()))
                .collect(),
        )
    }
}

/// Template choice for an image name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Template(Template),
    NoMatch,
}

/// Pick the template for an image display name.
///
/// Suffixes are literal and case-sensitive; `.ndpi [0]` is checked before
/// `.tif`.
///
/// ```rust
/// use komp_keys::{Classification, Template, classify};
///
/// assert_eq!(classify("A.tif"), Classification::Template(Template::Fundus));
/// assert_eq!(classify("B.ndpi [0]"), Classification::Template(Template::Histology));
/// assert_eq!(classify("C.png"), Classification::NoMatch);
/// ```
pub fn classify(name: &str) -> Classification {
    if name.ends_with(".ndpi [0]") {
        Classification::Template(Template::Histology)
    } else if name.ends_with(".tif") {
        Classification::Template(Template::Fundus)
    } else {
        Classification::NoMatch
    }
}

/// What happened to one image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// An annotation with [`COMPLETION_KEY`] was already present.
    AlreadyAnnotated,
    /// The template was posted as a new annotation.
    Applied {
        template: Template,
        annotation: AnnotationID,
    },
    /// The name matched no template; nothing was written.
    Unmatched,
}

/// Counts over a pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub applied: usize,
    pub skipped: usize,
    pub unmatched: usize,
}

impl Summary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::AlreadyAnnotated => self.skipped += 1,
            Outcome::Applied { .. } => self.applied += 1,
            Outcome::Unmatched => self.unmatched += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.unmatched
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} image(s): {} annotated, {} already annotated, {} unmatched",
            self.total(),
            self.applied,
            self.skipped,
            self.unmatched
        )
    }
}

/// Whether any of the image's client map annotations carries the marker.
///
/// Every annotation is fetched, even after a match.
async fn is_annotated<R: Repository>(
    repo: &R,
    session: &Session,
    image: &Image,
) -> Result<bool, Error> {
    let ids = repo
        .list_annotations(session, ObjectType::Image, image.id(), NSCLIENTMAPANNOTATION)
        .await?;

    let mut annotated = false;
    for id in ids {
        let annotation = repo.get_annotation(session, id).await?;
        if annotation.contains_key(COMPLETION_KEY) {
            debug!("{} carries {} in annotation {}", image, COMPLETION_KEY, id);
            annotated = true;
        }
    }
    Ok(annotated)
}

/// Annotate one image: skip it if already marked, else post the template
/// matching its name.
#[cfg_attr(feature = "profiling", tracing::instrument(skip(repo, session)))]
pub async fn annotate_image<R: Repository>(
    repo: &R,
    session: &Session,
    image: &Image,
) -> Result<Outcome, Error> {
    if is_annotated(repo, session, image).await? {
        return Ok(Outcome::AlreadyAnnotated);
    }

    let template = match classify(image.name()) {
        Classification::Template(template) => template,
        Classification::NoMatch => {
            warn!("No template for {}, leaving it untouched", image);
            return Ok(Outcome::Unmatched);
        }
    };

    let annotation = repo
        .post_annotation(
            session,
            ObjectType::Image,
            image.id(),
            &template.to_annotation(),
        )
        .await?;
    debug!("Linked {} annotation {} to {}", template, annotation, image);

    Ok(Outcome::Applied {
        template,
        annotation,
    })
}

/// Annotate a list of images in order.
///
/// `on_outcome` is called after each image, before the next one is
/// touched.  The first error stops the pass: images already annotated keep
/// their annotation and later images are not visited.
pub async fn annotate_images<R, F>(
    repo: &R,
    session: &Session,
    images: &[Image],
    mut on_outcome: F,
) -> Result<Summary, Error>
where
    R: Repository,
    F: FnMut(&Image, &Outcome),
{
    let mut summary = Summary::default();
    for image in images {
        let outcome = annotate_image(repo, session, image).await?;
        summary.record(&outcome);
        on_outcome(image, &outcome);
    }
    debug!("{}", summary);
    Ok(summary)
}
