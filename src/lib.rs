pub mod baseline;
pub mod bias;
pub mod classify;
pub mod cli_args;
pub mod config;
pub mod corpus;
pub mod correlator;
pub mod export;
pub mod index;
pub mod linalg;
pub mod logging;
pub mod pipeline;
pub mod race;
pub mod stats;
pub mod store;
pub mod synthetic;
