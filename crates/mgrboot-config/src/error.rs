use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "configuration file not found. Looked in:\n\
        - current directory: mgrboot.local.yaml, mgrboot.yaml\n\
        - ./.mgrboot/ directory\n\
        - ~/.config/mgrboot/mgrboot.yaml\n\
        Pass --config or set MGRBOOT_CONFIG to point at a file directly"
    )]
    NotFound,

    #[error("configuration file does not exist: {0}")]
    MissingFile(PathBuf),

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
