pub mod config_load;
pub mod config_types;
pub mod runtime;

pub use config_load::{Config, CONFIG_FILE_NAME};
pub use config_types::{
    coerce_args, ClientConfig, DispatchConfig, MessageConfig, RuntimeConfig, ServerConfig,
};
