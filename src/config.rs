mod commandline;
mod defaults;
mod file;
mod primitives;

use std::path::{Path, PathBuf};

use ::config::Config;
use clap::Parser;

use commandline::Args;
use defaults::Defaults;

pub(crate) use file::{ConfigFile as Configuration, Media, Repo, Sled, Tracing};
pub(crate) use primitives::{Filesystem, LogFormat, ObjectStorage, Store};

/// Where tubely loads its configuration from when run as a library
pub enum ConfigSource<P, T> {
    /// A toml, json, or yaml file on disk
    File { path: P },
    /// Any serializable value shaped like the configuration file
    Memory { value: T },
    /// Only defaults and environment variables
    Empty,
}

/// A fully resolved tubely configuration, ready to install tracing and run the server
pub struct TubelyConfiguration {
    pub(crate) config: Configuration,
}

impl ConfigSource<PathBuf, ()> {
    /// Load configuration from a file
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        ConfigSource::File { path: path.into() }
    }
}

impl<T: serde::Serialize> ConfigSource<&'static str, T> {
    /// Load configuration from a serializable value
    pub fn memory(value: T) -> Self {
        ConfigSource::Memory { value }
    }
}

impl ConfigSource<&'static str, ()> {
    /// Load configuration only from defaults and the environment
    pub fn empty() -> Self {
        ConfigSource::Empty
    }
}

impl<P: AsRef<Path>, T: serde::Serialize> ConfigSource<P, T> {
    /// Initialize the tubely configuration
    ///
    /// Defaults are layered under the provided source, and `TUBELY__`-prefixed environment
    /// variables are layered over it. When `save_to` is set, the resolved configuration is written
    /// there as toml.
    ///
    /// ```rust
    /// fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     tubely::ConfigSource::memory(serde_json::json!({
    ///         "server": {
    ///             "address": "127.0.0.1:8091",
    ///             "jwt_secret": "a-long-secret"
    ///         },
    ///         "store": {
    ///             "type": "filesystem",
    ///             "path": "./files",
    ///             "namespace": "tubely"
    ///         }
    ///     }))
    ///     .init::<&str>(None)?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn init<Q: AsRef<Path>>(self, save_to: Option<Q>) -> color_eyre::Result<TubelyConfiguration> {
        configure_without_clap(self, save_to)
    }
}

pub(crate) fn configure_without_clap<P: AsRef<Path>, T: serde::Serialize, Q: AsRef<Path>>(
    source: ConfigSource<P, T>,
    save_to: Option<Q>,
) -> color_eyre::Result<TubelyConfiguration> {
    let config = Config::builder().add_source(Config::try_from(&Defaults::default())?);

    let config = match source {
        ConfigSource::Memory { value } => config.add_source(Config::try_from(&value)?),
        ConfigSource::File { path } => config.add_source(::config::File::from(path.as_ref())),
        ConfigSource::Empty => config,
    };

    let built = config
        .add_source(
            ::config::Environment::with_prefix("TUBELY")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(TubelyConfiguration { config })
}

pub(crate) fn configure() -> color_eyre::Result<TubelyConfiguration> {
    let commandline::Output {
        config_format,
        save_to,
        config_file,
    } = Args::parse().into_output();

    let config = Config::builder().add_source(Config::try_from(&Defaults::default())?);

    let config = if let Some(config_file) = config_file {
        config.add_source(::config::File::from(config_file))
    } else {
        config
    };

    let built = config
        .add_source(
            ::config::Environment::with_prefix("TUBELY")
                .separator("__")
                .try_parsing(true),
        )
        .add_source(Config::try_from(&config_format)?)
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    if let Some(save_to) = save_to {
        let output = toml::to_string_pretty(&config)?;
        std::fs::write(save_to, output)?;
    }

    Ok(TubelyConfiguration { config })
}
