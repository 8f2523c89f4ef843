// Conduit Infrastructure - System Adapters
// Implements: ConnectorRunner (container runtime subprocess)

pub mod docker_runner;
pub mod log_parser;
pub mod process;
pub mod workdir;

pub use docker_runner::{DockerRunner, DockerRunnerConfig};
