use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("Invalid strategy configuration: {0}")]
    InvalidConfig(String),

    #[error("Strategy file parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Common(#[from] common::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
