#![doc = "sdk-automation-core: generation, versioning and release-report logic for sdk-automation."]

//! This crate holds everything the `sdk-automation` binary does apart from
//! argument parsing and configuration loading: classifying spec pointers,
//! driving the code generators, wiring new modules into the monorepo build,
//! maintaining the version ledger, building, comparing against published
//! releases and writing the per-package report.
//!
//! # Usage
//! Build an [`orchestrate::Orchestrator`] from an [`config::AutomationConfig`],
//! a [`contract::CommandRunner`] and a [`contract::Registry`], then call
//! `run_single` or `run_batch`.

pub mod build;
pub mod changelog;
pub mod compare;
pub mod config;
pub mod contract;
pub mod error;
pub mod generate;
pub mod git;
pub mod integrate;
pub mod markers;
pub mod model;
pub mod orchestrate;
pub mod premium;
pub mod process;
pub mod registry;
pub mod report;
pub mod spec;
pub mod version;
