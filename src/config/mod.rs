mod env_overrides;
mod loader;
pub mod schema;
#[cfg(test)]
mod test_env;

pub use loader::CONFIG_ENV_VAR;
pub use schema::{EngineConfig, LOG_LEVELS, MAX_REPLANS_CEILING};
