use crate::{
    config::primitives::{LogFormat, ObjectStorage, Targets},
    serde_str::Serde,
};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf};
use url::Url;

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            log_format,
            log_targets,
            log_spans,
            opentelemetry_url,
            opentelemetry_service_name,
            opentelemetry_targets,
            save_to,
            command,
        } = self;

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets.map(Serde::new),
                log_spans,
            },
            opentelemetry: OpenTelemetry {
                url: opentelemetry_url,
                service_name: opentelemetry_service_name,
                targets: opentelemetry_targets.map(Serde::new),
            },
        };

        let Command::Run(Run {
            address,
            public_url,
            jwt_secret,
            temporary_directory,
            metrics_prometheus_address,
            media_max_file_size,
            media_max_thumbnail_size,
            media_process_timeout,
            media_ffprobe_path,
            media_ffmpeg_path,
            media_signature_duration,
            media_assets_path,
            repo_path,
            repo_cache_capacity,
            store,
        }) = command;

        let server = Server {
            address,
            public_url,
            jwt_secret,
            temporary_directory,
        };

        let metrics = Metrics {
            prometheus_address: metrics_prometheus_address,
        };

        let media = Media {
            max_file_size: media_max_file_size,
            max_thumbnail_size: media_max_thumbnail_size,
            process_timeout: media_process_timeout,
            ffprobe_path: media_ffprobe_path,
            ffmpeg_path: media_ffmpeg_path,
            signature_duration: media_signature_duration,
            assets_path: media_assets_path,
        };

        let repo = Sled {
            path: repo_path,
            cache_capacity: repo_cache_capacity,
        }
        .set()
        .map(Repo::Sled);

        let store = store.map(|store| match store {
            RunStore::Filesystem(filesystem) => Store::Filesystem(filesystem),
            RunStore::ObjectStorage(storage) => Store::ObjectStorage(storage),
        });

        Output {
            config_format: ConfigFormat {
                server,
                tracing,
                metrics,
                media,
                repo,
                store,
            },
            save_to,
            config_file,
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) save_to: Option<PathBuf>,
    pub(super) config_file: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    server: Server,
    tracing: Tracing,
    metrics: Metrics,
    media: Media,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<Repo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<Store>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Server {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwt_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_directory: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    logging: Logging,
    opentelemetry: OpenTelemetry,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    log_spans: bool,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Serde<Targets>>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_address: Option<SocketAddr>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_file_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_thumbnail_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ffprobe_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ffmpeg_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assets_path: Option<PathBuf>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum Repo {
    Sled(Sled),
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Sled {
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_capacity: Option<u64>,
}

impl Sled {
    fn set(self) -> Option<Self> {
        let any_set = self.path.is_some() || self.cache_capacity.is_some();

        if any_set {
            Some(self)
        } else {
            None
        }
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum Store {
    Filesystem(Filesystem),
    ObjectStorage(ObjectStorage),
}

/// Run the tubely video service
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Args {
    /// Path to the tubely configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Format of logs printed to stdout
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Log levels to print to stdout, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<Targets>,
    /// Whether to log openning and closing of tracing spans to stdout
    #[arg(long)]
    log_spans: bool,

    /// URL to send OpenTelemetry metrics
    #[arg(long)]
    opentelemetry_url: Option<Url>,
    /// Service Name to use for OpenTelemetry
    #[arg(long)]
    opentelemetry_service_name: Option<String>,
    /// Log levels to use for OpenTelemetry, respects RUST_LOG formatting
    #[arg(long)]
    opentelemetry_targets: Option<Targets>,

    /// File to save the current configuration for reproducible runs
    #[arg(long)]
    save_to: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the tubely web server
    Run(Run),
}

#[derive(Debug, Parser)]
struct Run {
    /// The address and port to bind the tubely web server
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// The URL clients reach this server at, used to build thumbnail and file links
    #[arg(long)]
    public_url: Option<Url>,

    /// The secret access tokens are signed with
    #[arg(long)]
    jwt_secret: Option<String>,

    /// The temporary directory tubely should use when processing uploads
    #[arg(long)]
    temporary_directory: Option<PathBuf>,

    /// Whether to enable the prometheus scrape endpoint
    #[arg(long)]
    metrics_prometheus_address: Option<SocketAddr>,

    /// The maximum size, in megabytes, of an uploaded video
    ///
    /// This number defaults to 1024
    #[arg(long)]
    media_max_file_size: Option<usize>,

    /// The maximum size, in megabytes, of an uploaded thumbnail
    ///
    /// This number defaults to 10
    #[arg(long)]
    media_max_thumbnail_size: Option<usize>,

    /// How long, in seconds, ffprobe and ffmpeg may run before they are killed
    #[arg(long)]
    media_process_timeout: Option<u64>,

    /// The ffprobe binary used to classify uploads
    #[arg(long)]
    media_ffprobe_path: Option<String>,

    /// The ffmpeg binary used to remux uploads
    #[arg(long)]
    media_ffmpeg_path: Option<String>,

    /// How long, in seconds, signed video URLs remain valid
    ///
    /// This number defaults to 300
    #[arg(long)]
    media_signature_duration: Option<u64>,

    /// The directory thumbnails are saved in
    #[arg(long)]
    media_assets_path: Option<PathBuf>,

    /// The path to store the sled database
    #[arg(long)]
    repo_path: Option<PathBuf>,

    /// The cache capacity, in bytes, allowed to sled for in-memory operations
    #[arg(long)]
    repo_cache_capacity: Option<u64>,

    #[command(subcommand)]
    store: Option<RunStore>,
}

/// Configure the provided storage
#[derive(Clone, Debug, Subcommand)]
enum RunStore {
    /// run tubely with filesystem storage
    Filesystem(Filesystem),

    /// run tubely with object storage
    ObjectStorage(ObjectStorage),
}

/// Configuration for filesystem media storage
#[derive(Clone, Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Filesystem {
    /// The path to store uploaded media
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,

    /// The namespace recorded on stored videos
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,

    /// The key used to sign file URLs
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    signing_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Args;

    #[test]
    fn run_with_filesystem() {
        let args = Args::try_parse_from([
            "tubely",
            "run",
            "--jwt-secret",
            "secret",
            "--media-max-file-size",
            "64",
            "filesystem",
            "--path",
            "/tmp/files",
        ])
        .expect("Parsed args");

        let output = args.into_output();
        let value = serde_json::to_value(&output.config_format).expect("Serialized");

        assert_eq!(value["server"]["jwt_secret"], "secret");
        assert_eq!(value["media"]["max_file_size"], 64);
        assert_eq!(value["store"]["type"], "filesystem");
        assert_eq!(value["store"]["path"], "/tmp/files");
        assert!(value["store"].get("namespace").is_none());
        assert!(value.get("repo").is_none());
    }
}
