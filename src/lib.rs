//! # robotdev Library
//!
//! This library provides the core functionality of the `robotdev`
//! development environment: resolving components, building and pushing
//! their container images, running them on local or remote robots, and
//! releasing repositories. It is designed to be used by the `robotdev`
//! command-line tool.
//!
//! ## Quick Example
//!
//! ```
//! use robotdev::version::{dev_version, parse_version, validate_next_version};
//!
//! let last = parse_version("1.2").unwrap();
//! let next = validate_next_version(&last, "1.3.beta").unwrap();
//! assert_eq!(next.to_string(), "1.3.beta");
//! assert_eq!(dev_version("1.3.beta", false), "1.3.dev");
//! assert!(validate_next_version(&last, "1.5").is_err());
//! ```
//!
//! ## Core Concepts
//!
//! - **Environment (`config`, `defaults`)**: the environment root, holding
//!   one git working copy per repository under `src/`, and its optional
//!   `robotdev.yaml` settings.
//! - **Components (`component`, `dependencies`)**: independently buildable
//!   container units declared by a YAML descriptor inside a repository.
//! - **Repositories (`git`, `manifest`, `package`, `version`)**: live git
//!   state behind the [`git::RepositoryHandle`] trait, the repository
//!   manifest, package metadata, and the release version rules.
//! - **Images (`docker`)**: the [`docker::ContainerEngine`] trait and the
//!   build orchestration on top of it.
//! - **Hosts (`robot`, `ssh`, `run`, `sync`)**: robots from `robots.yaml`,
//!   and running and synchronising components on them.
//! - **Deploy (`deploy`)**: the release state machine.
//!
//! Every external tool (`git`, `docker`, `ssh`, `rsync`) is invoked through
//! [`process::CommandLine`] and a [`process::CommandRunner`], so no shell
//! is involved and each invocation can be asserted on in tests.

pub mod component;
pub mod config;
pub mod defaults;
pub mod dependencies;
pub mod deploy;
pub mod docker;
pub mod error;
pub mod git;
pub mod manifest;
pub mod output;
pub mod package;
pub mod process;
pub mod robot;
pub mod run;
pub mod ssh;
pub mod sync;
pub mod version;
