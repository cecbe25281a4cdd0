// src/lib.rs

//! plugfetch: remote plugin acquisition and activation
//!
//! Given a URL or a search keyword for a third-party plugin, plugfetch
//! materializes the plugin under a plugins directory, installs its runtime
//! dependencies, builds it when it is compiled, picks the file to run and
//! asks the host process to start it.
//!
//! # Architecture
//!
//! - Explicit configuration: one [`Config`] value threaded through every call
//! - Trait seams for everything external: [`RemoteApi`], [`CommandRunner`],
//!   [`PackageEnvironment`], [`Host`]
//! - Transcript, not exceptions: [`Installer::install`] always returns an
//!   [`InstallationReport`] whose [`Outcome`] names how it ended
//! - Deterministic resolution: directory scans are sorted and candidate
//!   lists evaluated in a fixed order

pub mod archive;
pub mod build;
pub mod config;
pub mod deps;
pub mod entry;
mod error;
pub mod fetch;
pub mod filesystem;
pub mod host;
pub mod install;
pub mod locator;
pub mod lock;
pub mod process;
pub mod remote;
pub mod report;
pub mod search;
pub mod target;
pub mod testing;

pub use config::{Config, HostConfig};
pub use deps::{PackageEnvironment, PipEnvironment};
pub use error::{Error, ErrorClass, Result};
pub use host::{Activation, CliHost, Host};
pub use install::{InstallOptions, Installer};
pub use locator::Locator;
pub use process::{CommandRunner, SystemRunner};
pub use remote::{HttpRemote, RemoteApi};
pub use report::{InstallationReport, Outcome};
pub use search::SearchHit;
pub use target::InstallationTarget;
