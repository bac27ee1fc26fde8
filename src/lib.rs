//! DummySite Kubernetes Controller
//!
//! Mirrors the content of external websites into the cluster: every
//! `DummySite` custom resource gets a ConfigMap with the fetched page and an
//! nginx Deployment, Service and Ingress serving it.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;

pub use error::{Error, Result};
