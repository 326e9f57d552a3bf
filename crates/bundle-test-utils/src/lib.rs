//! Shared test utilities for the bundle deployer workspace.
//!
//! This crate provides standardised fixtures so crate test suites do not
//! each build their own archives and scratch directories. It is a
//! dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`archive`] builds zip archives from in-memory entries
//! - [`scenario`] provides [`TestDeployment`], a source/destination pair in a temp dir

pub mod archive;
pub mod scenario;

pub use archive::create_zip;
pub use scenario::TestDeployment;
