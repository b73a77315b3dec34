use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use artifact_publish_core::context::CiContext;
use artifact_publish_core::contract::{
    BuildError, MockArtifactStore, MockBuildInvoker, MockStepReporter, UploadError,
    UploadOptions, UploadResponse, UploadedItem,
};
use artifact_publish_core::local_store::LocalArtifactStore;
use artifact_publish_core::naming::NamingError;
use artifact_publish_core::publish::{
    output_dir_for, publish, report_outcome, PublishError, PublishReport, PublishRequest,
    ROOT_DIR_OUTPUT,
};
use mockall::predicate::eq;
use tempfile::tempdir;

fn request(work_dir: &Path, git_ref: &str) -> PublishRequest {
    PublishRequest {
        context: CiContext::new("abc123", git_ref, "proj"),
        work_dir: work_dir.to_path_buf(),
        extra_options: vec!["-Pci".to_string()],
        upload: UploadOptions::default(),
    }
}

/// A build that deploys a small Maven repository layout into the output directory.
fn deploying_invoker() -> MockBuildInvoker {
    let mut invoker = MockBuildInvoker::new();
    invoker
        .expect_run()
        .times(1)
        .returning(|output_dir: &Path, options: &[String]| {
            assert_eq!(options, ["-Pci".to_string()]);
            let dir = output_dir.join("com/example/app/1.0");
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("app-1.0.jar"), b"jar-bytes").unwrap();
            fs::write(dir.join("app-1.0.pom"), b"<project/>").unwrap();
            Ok(0)
        });
    invoker
}

fn ok_response(name: &str, root: &Path, files: &artifact_publish_core::walker::FileSet) -> UploadResponse {
    let uploaded_items: Vec<_> = files
        .iter()
        .map(|p| UploadedItem {
            path: p.strip_prefix(root).unwrap().to_path_buf(),
            size: fs::metadata(p).unwrap().len(),
        })
        .collect();
    UploadResponse {
        artifact_name: name.to_string(),
        size: uploaded_items.iter().map(|i| i.size).sum(),
        uploaded_items,
        failed_items: vec![],
    }
}

#[tokio::test]
async fn publishes_every_built_file_under_branch_name() {
    let tmp = tempdir().unwrap();
    let req = request(tmp.path(), "refs/heads/main");
    let invoker = deploying_invoker();

    let mut store = MockArtifactStore::new();
    store
        .expect_upload_artifact()
        .times(1)
        .returning(|name, files, root, opts| {
            assert_eq!(name, "proj-main-abc123");
            assert_eq!(files.len(), 2);
            assert_eq!(files.root(), root);
            assert!(!opts.continue_on_error);
            Ok(ok_response(name, root, files))
        });

    let report = publish(&req, &invoker, &store).await.expect("publish should succeed");
    assert_eq!(report.artifact_name, "proj-main-abc123");
    assert_eq!(report.root_dir, output_dir_for(tmp.path(), "abc123"));
    assert_eq!(report.file_count, 2);
    assert_eq!(report.size, ("jar-bytes".len() + "<project/>".len()) as u64);
}

#[tokio::test]
async fn tag_builds_are_named_without_commit() {
    let tmp = tempdir().unwrap();
    let req = request(tmp.path(), "refs/tags/v1.2.0");
    let invoker = deploying_invoker();

    let mut store = MockArtifactStore::new();
    store
        .expect_upload_artifact()
        .returning(|name, files, root, _| {
            assert_eq!(name, "proj-v1.2.0");
            Ok(ok_response(name, root, files))
        });

    let report = publish(&req, &invoker, &store).await.unwrap();
    assert_eq!(report.artifact_name, "proj-v1.2.0");
}

#[tokio::test]
async fn failed_build_uploads_nothing() {
    let tmp = tempdir().unwrap();
    let req = request(tmp.path(), "refs/heads/main");

    let mut invoker = MockBuildInvoker::new();
    invoker.expect_run().times(1).returning(|_, _| Ok(1));
    let mut store = MockArtifactStore::new();
    store.expect_upload_artifact().never();

    let err = publish(&req, &invoker, &store).await.unwrap_err();
    assert!(matches!(err, PublishError::Build(BuildError::Failed { code: 1 })));
    assert_eq!(err.to_string(), "Maven failed with error: 1");
}

#[tokio::test]
async fn build_spawn_error_is_propagated() {
    let tmp = tempdir().unwrap();
    let req = request(tmp.path(), "refs/heads/main");

    let mut invoker = MockBuildInvoker::new();
    invoker.expect_run().returning(|_, _| {
        Err(BuildError::Spawn {
            program: "mvn".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        })
    });
    let mut store = MockArtifactStore::new();
    store.expect_upload_artifact().never();

    let err = publish(&req, &invoker, &store).await.unwrap_err();
    assert!(matches!(err, PublishError::Build(BuildError::Spawn { .. })));
}

#[tokio::test]
async fn invalid_ref_fails_before_building() {
    let tmp = tempdir().unwrap();
    let req = request(tmp.path(), "refs/bogus/main");

    let mut invoker = MockBuildInvoker::new();
    invoker.expect_run().never();
    let mut store = MockArtifactStore::new();
    store.expect_upload_artifact().never();

    let err = publish(&req, &invoker, &store).await.unwrap_err();
    assert!(matches!(err, PublishError::Naming(NamingError::InvalidRef { .. })));
}

#[tokio::test]
async fn partial_upload_failure_names_every_failed_file() {
    let tmp = tempdir().unwrap();
    let req = request(tmp.path(), "refs/heads/main");
    let invoker = deploying_invoker();

    let mut store = MockArtifactStore::new();
    store.expect_upload_artifact().returning(|name, files, _, _| {
        Ok(UploadResponse {
            artifact_name: name.to_string(),
            failed_items: files.iter().map(Path::to_path_buf).collect(),
            ..Default::default()
        })
    });

    let err = publish(&req, &invoker, &store).await.unwrap_err();
    match &err {
        PublishError::Upload(UploadError::PartialFailure { failed }) => {
            assert_eq!(failed.len(), 2);
        }
        other => panic!("expected PartialFailure, got {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("app-1.0.jar") && msg.contains("app-1.0.pom"), "{msg}");
}

#[tokio::test]
async fn stale_output_is_removed_before_the_build() {
    let tmp = tempdir().unwrap();
    let req = request(tmp.path(), "refs/heads/main");
    let stale = req.output_dir().join("old/leftover.jar");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, b"old").unwrap();

    let invoker = deploying_invoker();
    let mut store = MockArtifactStore::new();
    store.expect_upload_artifact().returning(|name, files, root, _| {
        assert!(files.iter().all(|p| !p.ends_with("leftover.jar")));
        Ok(ok_response(name, root, files))
    });

    let report = publish(&req, &invoker, &store).await.unwrap();
    assert_eq!(report.file_count, 2);
}

#[tokio::test]
async fn publishes_into_local_store_end_to_end() {
    let tmp = tempdir().unwrap();
    let work = tmp.path().join("work");
    let store_dir = tmp.path().join("store");
    let req = request(&work, "refs/heads/feature/x");
    let invoker = deploying_invoker();
    let store = LocalArtifactStore::new(&store_dir);

    let report = publish(&req, &invoker, &store).await.unwrap();
    assert_eq!(report.artifact_name, "proj-feature/x-abc123");

    let bundle = store.bundle_dir(&report.artifact_name);
    assert!(bundle.join("com/example/app/1.0/app-1.0.jar").is_file());
    assert!(store.manifest_path(&report.artifact_name).is_file());
}

#[test]
fn success_reports_root_dir_output() {
    let report = PublishReport {
        artifact_name: "proj-main-abc123".into(),
        root_dir: PathBuf::from("/tmp/artifacts-maven-abc123"),
        file_count: 2,
        size: 10,
    };
    let mut reporter = MockStepReporter::new();
    reporter
        .expect_set_output()
        .with(eq(ROOT_DIR_OUTPUT), eq("/tmp/artifacts-maven-abc123"))
        .times(1)
        .returning(|_, _| Ok(()));
    reporter.expect_set_failed().never();

    let out = report_outcome(Ok(report.clone()), &reporter).unwrap();
    assert_eq!(out, report);
}

#[test]
fn failure_reports_message_and_no_output() {
    let mut reporter = MockStepReporter::new();
    reporter.expect_set_output().never();
    reporter
        .expect_set_failed()
        .with(eq("Maven failed with error: 3"))
        .times(1)
        .return_const(());

    let err = report_outcome(
        Err(PublishError::Build(BuildError::Failed { code: 3 })),
        &reporter,
    )
    .unwrap_err();
    assert!(matches!(err, PublishError::Build(_)));
}

#[test]
fn unwritable_output_turns_into_failure() {
    let report = PublishReport {
        artifact_name: "a".into(),
        root_dir: PathBuf::from("/tmp/x"),
        file_count: 0,
        size: 0,
    };
    let mut reporter = MockStepReporter::new();
    reporter
        .expect_set_output()
        .returning(|_, _| Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")));
    reporter.expect_set_failed().times(1).return_const(());

    let err = report_outcome(Ok(report), &reporter).unwrap_err();
    assert!(matches!(err, PublishError::Report(_)));
}
