#[cfg(test)]
mod tests;

use std::{ffi::OsStr, path::Path};

use crate::{config::Media, process::Process};

use super::{DiscoverError, Discovery};

#[derive(Debug, serde::Deserialize)]
struct FfMpegDiscovery {
    #[serde(default)]
    streams: Vec<FfMpegStream>,
}

#[derive(Debug, serde::Deserialize)]
struct FfMpegStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[tracing::instrument(level = "debug", skip(media))]
pub(super) async fn discover_file(media: &Media, path: &Path) -> Result<Discovery, DiscoverError> {
    let output = Process::run(
        &media.ffprobe_path,
        &[
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-print_format"),
            OsStr::new("json"),
            OsStr::new("-show_streams"),
            path.as_os_str(),
        ],
        media.process_timeout,
    )?
    .read()
    .await?;

    let output: FfMpegDiscovery = serde_json::from_slice(&output).map_err(DiscoverError::Json)?;

    parse_discovery(output)
}

fn parse_discovery(discovery: FfMpegDiscovery) -> Result<Discovery, DiscoverError> {
    let FfMpegDiscovery { streams } = discovery;

    let stream = streams
        .into_iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"))
        .ok_or(DiscoverError::NoStreams)?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) => Ok(Discovery { width, height }),
        _ => Err(DiscoverError::MissingDimensions),
    }
}
