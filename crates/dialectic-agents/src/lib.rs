//! External collaborators for the `dialectic` core: an OpenAI-compatible
//! generation port, layered configuration and the `dialectic` CLI.

pub mod config;
pub mod openai;

pub use config::{AgentsConfig, EndpointConfig};
pub use openai::{check_endpoint, OpenAiCompatPort};
