// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! End-to-end runs against an in-memory repository: login, target
//! resolution, annotation and session release, as the command line tool
//! sequences them.

use komp_keys::{
    COMPLETION_KEY, ConnectOptions, Error, Image, MapAnnotation, MemoryRepository,
    NSCLIENTMAPANNOTATION, ObjectID, ObjectType, Outcome, StaticCredentials, Summary, Target,
    TargetKind, Template, annotate_images, open_session, resolve_images, with_session,
};

struct Batch {
    repo: MemoryRepository,
    a: ObjectID,
    b: ObjectID,
    c: ObjectID,
}

/// Dataset `EyeBatch1` holding a fundus image, a histology slide and a
/// picture no template applies to.
fn eye_batch() -> Batch {
    let repo = MemoryRepository::new();
    repo.add_user("mpk", "mpk-pw");
    repo.add_admin("root", "root-pw");
    repo.add_group("KOMP_eye");
    let dataset = repo.add_dataset("EyeBatch1");
    let a = repo.add_image(dataset, "A.tif");
    let b = repo.add_image(dataset, "B.ndpi [0]");
    let c = repo.add_image(dataset, "C.png");
    Batch { repo, a, b, c }
}

/// One full run, collecting the per-image outcomes.
async fn run(
    repo: &MemoryRepository,
    options: &ConnectOptions,
    password: &str,
    target: &Target,
) -> Result<(Summary, Vec<(String, Outcome)>), Error> {
    let session = open_session(repo, &StaticCredentials::new(password), options).await?;
    with_session(repo, session, async |session| {
        let images = resolve_images(repo, session, target).await?;
        let mut outcomes = Vec::new();
        let summary = annotate_images(repo, session, &images, |image: &Image, outcome| {
            outcomes.push((image.name().to_string(), *outcome));
        })
        .await?;
        Ok((summary, outcomes))
    })
    .await
}

fn keys(repo: &MemoryRepository, id: ObjectID) -> Vec<Vec<String>> {
    repo.annotations_of(ObjectType::Image, id)
        .iter()
        .map(|a| a.keys().map(str::to_string).collect())
        .collect()
}

fn template_keys(template: Template) -> Vec<String> {
    template.keys().iter().map(|k| k.to_string()).collect()
}

#[tokio::test]
async fn test_dataset_run_is_idempotent() {
    let batch = eye_batch();
    let options = ConnectOptions::new("mpk", "KOMP_eye");
    let target = Target::new(TargetKind::Dataset, "EyeBatch1");

    let (summary, outcomes) = run(&batch.repo, &options, "mpk-pw", &target)
        .await
        .unwrap();
    assert_eq!(
        summary,
        Summary {
            applied: 2,
            skipped: 0,
            unmatched: 1
        }
    );
    let names: Vec<&str> = outcomes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["A.tif", "B.ndpi [0]", "C.png"]);
    assert_eq!(outcomes[2].1, Outcome::Unmatched);

    assert_eq!(keys(&batch.repo, batch.a), vec![template_keys(Template::Fundus)]);
    assert_eq!(
        keys(&batch.repo, batch.b),
        vec![template_keys(Template::Histology)]
    );
    assert!(keys(&batch.repo, batch.c).is_empty());

    for annotation in batch.repo.annotations_of(ObjectType::Image, batch.a) {
        assert_eq!(annotation.namespace(), NSCLIENTMAPANNOTATION);
        assert!(annotation.values().iter().all(|(_, value)| value.is_empty()));
    }

    // Second run finds the marker on both and writes nothing
    let (summary, outcomes) = run(&batch.repo, &options, "mpk-pw", &target)
        .await
        .unwrap();
    assert_eq!(
        summary,
        Summary {
            applied: 0,
            skipped: 2,
            unmatched: 1
        }
    );
    assert_eq!(outcomes[0].1, Outcome::AlreadyAnnotated);
    assert_eq!(outcomes[1].1, Outcome::AlreadyAnnotated);
    assert_eq!(batch.repo.posts(), 2);
    assert_eq!(batch.repo.open_sessions(), 0);
    assert_eq!(batch.repo.closed_sessions(), 2);
}

#[tokio::test]
async fn test_existing_marker_in_client_namespace_is_respected() {
    let batch = eye_batch();
    batch.repo.attach(
        ObjectType::Image,
        batch.a,
        MapAnnotation::new(
            NSCLIENTMAPANNOTATION,
            vec![
                ("fundus".to_string(), "normal".to_string()),
                (COMPLETION_KEY.to_string(), "done".to_string()),
            ],
        ),
    );
    // Marker under another namespace does not count
    batch.repo.attach(
        ObjectType::Image,
        batch.b,
        MapAnnotation::new(
            "example.org/other",
            vec![(COMPLETION_KEY.to_string(), "done".to_string())],
        ),
    );

    let options = ConnectOptions::new("mpk", "KOMP_eye");
    let target = Target::new(TargetKind::Dataset, "EyeBatch1");
    let (summary, _) = run(&batch.repo, &options, "mpk-pw", &target)
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.applied, 1);
    assert_eq!(batch.repo.annotations_of(ObjectType::Image, batch.a).len(), 1);
    assert_eq!(batch.repo.annotations_of(ObjectType::Image, batch.b).len(), 2);
}

#[tokio::test]
async fn test_project_run_covers_every_dataset() {
    let repo = MemoryRepository::new();
    repo.add_user("mpk", "mpk-pw");
    repo.add_group("KOMP_eye");
    let project = repo.add_project("KOMP");
    let left = repo.add_project_dataset(project, "Left");
    let right = repo.add_project_dataset(project, "Right");
    let l1 = repo.add_image(left, "L1.tif");
    let r1 = repo.add_image(right, "R1.ndpi [0]");
    let shared = repo.add_image(right, "S.tif");
    repo.link(ObjectType::Dataset, left, shared);

    let options = ConnectOptions::new("mpk", "KOMP_eye");
    let target = Target::new(TargetKind::Project, "KOMP");
    let (summary, outcomes) = run(&repo, &options, "mpk-pw", &target).await.unwrap();

    // The shared image is visited once
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.applied, 3);
    assert_eq!(summary.skipped, 0);
    let names: Vec<&str> = outcomes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["L1.tif", "S.tif", "R1.ndpi [0]"]);
    for id in [l1, r1, shared] {
        assert_eq!(repo.annotations_of(ObjectType::Image, id).len(), 1);
    }
}

#[tokio::test]
async fn test_partial_failure_recovers_on_rerun() {
    let batch = eye_batch();
    batch.repo.fail_posts_after(1);
    let options = ConnectOptions::new("mpk", "KOMP_eye");
    let target = Target::new(TargetKind::Dataset, "EyeBatch1");

    let err = run(&batch.repo, &options, "mpk-pw", &target)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WriteFailure(_)));
    assert_eq!(keys(&batch.repo, batch.a).len(), 1);
    assert!(keys(&batch.repo, batch.b).is_empty());
    // Session released despite the failure
    assert_eq!(batch.repo.open_sessions(), 0);

    batch.repo.restore_posts();
    let (summary, _) = run(&batch.repo, &options, "mpk-pw", &target)
        .await
        .unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.applied, 1);
    assert_eq!(keys(&batch.repo, batch.a).len(), 1);
    assert_eq!(keys(&batch.repo, batch.b).len(), 1);
}

#[tokio::test]
async fn test_sudo_run_annotates_as_target_user() {
    let batch = eye_batch();
    let options = ConnectOptions::new("mpk", "KOMP_eye").with_sudo("root");
    let target = Target::new(TargetKind::Image, "A.tif");

    let (summary, outcomes) = run(&batch.repo, &options, "root-pw", &target)
        .await
        .unwrap();
    assert_eq!(summary.applied, 1);
    assert!(matches!(
        outcomes[0].1,
        Outcome::Applied {
            template: Template::Fundus,
            ..
        }
    ));
    // Administrator session plus the elevated one
    assert_eq!(batch.repo.closed_sessions(), 2);
    assert_eq!(batch.repo.open_sessions(), 0);
}

#[tokio::test]
async fn test_unknown_target_kind_writes_nothing() {
    let batch = eye_batch();
    let options = ConnectOptions::new("mpk", "KOMP_eye");
    let target = Target::new("Plate".parse().unwrap(), "EyeBatch1");

    let (summary, outcomes) = run(&batch.repo, &options, "mpk-pw", &target)
        .await
        .unwrap();
    assert_eq!(summary.total(), 0);
    assert!(outcomes.is_empty());
    assert_eq!(batch.repo.posts(), 0);
    assert_eq!(batch.repo.closed_sessions(), 1);
}

#[tokio::test]
async fn test_login_failure_touches_nothing() {
    let batch = eye_batch();
    let options = ConnectOptions::new("mpk", "KOMP_eye");
    let target = Target::new(TargetKind::Dataset, "EyeBatch1");

    let err = run(&batch.repo, &options, "wrong", &target)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed(_)));
    assert_eq!(batch.repo.posts(), 0);
    assert_eq!(batch.repo.closed_sessions(), 0);
}
