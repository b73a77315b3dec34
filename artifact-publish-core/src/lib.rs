#![doc = "artifact-publish-core: core logic library for artifact-publish."]

//! This crate holds the logic of the publish step: collecting a build's output files,
//! naming the artifact from the git ref, the collaborator contracts (build, store, step
//! reporting) and the pipeline tying them together.
//! The GitHub Actions transport lives in the `artifact-publish` binary crate.
//!
//! # Usage
//! Depend on this crate for the walker, the namer and [`publish::publish`]; plug in any
//! [`contract::ArtifactStore`] and [`contract::BuildInvoker`].

pub mod build;
pub mod config;
pub mod context;
pub mod contract;
pub mod local_store;
pub mod naming;
pub mod publish;
pub mod walker;
