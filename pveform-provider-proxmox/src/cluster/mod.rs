//! Cluster-level data sources

pub mod ha;
