// Library for tests to access modules

pub mod aggregator;
pub mod alerts;
pub mod config;
pub mod docker_repo;
pub mod error;
pub mod fanout;
pub mod hub;
pub mod ledger;
pub mod metric_repo;
pub mod models;
pub mod readers;
pub mod retention_worker;
pub mod routes;
pub mod sampler;
pub mod stats;
pub mod sysinfo_repo;
pub mod version;
