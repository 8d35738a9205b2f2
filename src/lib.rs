//! Core library for serving trained inference artifacts.
//!
//! This crate provides:
//! - Loading of prediction pipelines, recommenders, and extensions
//! - REST and gRPC serving of a loaded artifact
//! - An optional fixed-size cache client pool for recommendation lookups
//! - Service assembly with graceful lifecycle management

pub mod artifact;
pub mod cache;
pub mod config;
pub mod error;
pub mod factory;
pub mod rpc;
pub mod server;

pub use artifact::{ArtifactHandle, ArtifactLoader, FsLoader};
pub use cache::{CachePool, CacheStore};
pub use config::Settings;
pub use error::{Error, Result};
pub use factory::{Service, ServiceFactory, ServiceKind};
