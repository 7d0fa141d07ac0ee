pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod location;
pub mod logging;
pub mod normalize;
pub mod query;
pub mod record;
pub mod report;
pub mod session;
