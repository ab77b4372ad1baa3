//! exhume - forensic recovery and chaos churn for a storage-cluster store
//!
//! - `entries`: persisted entity model and its record codec
//! - `exhume`: scrape entities out of a raw store dump
//! - `orchestrator`: collaborator traits and an in-memory reference cluster
//! - `churn`: randomized lifecycle workload driver

pub mod churn;
pub mod cli;
pub mod entries;
pub mod exhume;
pub mod observability;
pub mod orchestrator;
