use std::env;

use artifact_publish_core::context::{CiContext, ContextError};
use serial_test::serial;

fn set_github_env(sha: &str, git_ref: &str, repo: &str) {
    env::set_var("GITHUB_SHA", sha);
    env::set_var("GITHUB_REF", git_ref);
    env::set_var("GITHUB_REPOSITORY", repo);
}

#[test]
#[serial]
fn reads_context_and_strips_owner() {
    set_github_env("0123abcd", "refs/heads/main", "kasbuunk/artifact-publish");

    let ctx = CiContext::from_env().expect("context should load");
    assert_eq!(ctx, CiContext::new("0123abcd", "refs/heads/main", "artifact-publish"));
    assert_eq!(
        ctx.artifact_name().unwrap().as_str(),
        "artifact-publish-main-0123abcd"
    );
}

#[test]
#[serial]
fn missing_sha_is_reported_by_name() {
    set_github_env("x", "refs/tags/v1", "o/r");
    env::remove_var("GITHUB_SHA");

    assert_eq!(
        CiContext::from_env().unwrap_err(),
        ContextError::Missing("GITHUB_SHA")
    );
}

#[test]
#[serial]
fn repository_without_name_is_malformed() {
    set_github_env("x", "refs/tags/v1", "owner/");

    assert!(matches!(
        CiContext::from_env().unwrap_err(),
        ContextError::Malformed { var: "GITHUB_REPOSITORY", .. }
    ));
}
