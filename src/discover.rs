mod ffmpeg;

use std::{ops::RangeInclusive, path::Path};

use crate::{config::Media, error_code::ErrorCode, process::ProcessError};

/// Width over height for 16:9 with a 5% margin on either side
const LANDSCAPE_RATIOS: RangeInclusive<f64> = 1.688888889..=1.866666667;
/// Width over height for 9:16 with a 5% margin on either side
const PORTRAIT_RATIOS: RangeInclusive<f64> = 0.534375..=0.590625;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Discovery {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

/// The shape of a video, used only to pick the prefix its object is stored under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Orientation {
    Landscape,
    Portrait,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum DiscoverError {
    #[error("Error running ffprobe")]
    Process(#[from] ProcessError),

    #[error("Error parsing ffprobe output")]
    Json(#[source] serde_json::Error),

    #[error("No video streams present in uploaded media")]
    NoStreams,

    #[error("Video stream is missing its dimensions")]
    MissingDimensions,

    #[error("Video stream has invalid dimensions {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
}

impl DiscoverError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Json(_) | Self::MissingDimensions => ErrorCode::PROBE_INVALID_OUTPUT,
            Self::NoStreams => ErrorCode::PROBE_NO_STREAMS,
            Self::ZeroDimension { .. } => ErrorCode::PROBE_ZERO_DIMENSION,
        }
    }
}

impl Orientation {
    pub(crate) fn from_ratio(ratio: f64) -> Self {
        if LANDSCAPE_RATIOS.contains(&ratio) {
            Self::Landscape
        } else if PORTRAIT_RATIOS.contains(&ratio) {
            Self::Portrait
        } else {
            Self::Other
        }
    }

    pub(crate) const fn as_prefix(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_prefix())
    }
}

impl Discovery {
    pub(crate) fn orientation(&self) -> Result<Orientation, DiscoverError> {
        if self.width == 0 || self.height == 0 {
            return Err(DiscoverError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }

        Ok(Orientation::from_ratio(
            f64::from(self.width) / f64::from(self.height),
        ))
    }
}

#[tracing::instrument(level = "debug", skip(media))]
pub(crate) async fn classify(media: &Media, path: &Path) -> Result<Orientation, DiscoverError> {
    let discovery = ffmpeg::discover_file(media, path).await?;

    let orientation = discovery.orientation()?;

    tracing::debug!(
        "{}x{} classified as {orientation}",
        discovery.width,
        discovery.height
    );

    Ok(orientation)
}

#[cfg(test)]
mod tests {
    use super::{DiscoverError, Discovery, Orientation};

    #[test]
    fn band_edges_are_inclusive() {
        assert_eq!(Orientation::from_ratio(1.688888889), Orientation::Landscape);
        assert_eq!(Orientation::from_ratio(1.866666667), Orientation::Landscape);
        assert_eq!(Orientation::from_ratio(0.534375), Orientation::Portrait);
        assert_eq!(Orientation::from_ratio(0.590625), Orientation::Portrait);
    }

    #[test]
    fn outside_both_bands_is_other() {
        for ratio in [1.0, 1.6888, 1.8667, 0.5343, 0.5907, 4.0 / 3.0, 2.39] {
            assert_eq!(Orientation::from_ratio(ratio), Orientation::Other, "{ratio}");
        }
    }

    #[test]
    fn common_resolutions() {
        let cases = [
            (1920, 1080, Orientation::Landscape),
            (1280, 720, Orientation::Landscape),
            (1080, 1920, Orientation::Portrait),
            (720, 1280, Orientation::Portrait),
            (1080, 1080, Orientation::Other),
            (640, 480, Orientation::Other),
        ];

        for (width, height, expected) in cases {
            let discovery = Discovery { width, height };

            assert_eq!(
                discovery.orientation().expect("Valid dimensions"),
                expected,
                "{width}x{height}"
            );
        }
    }

    #[test]
    fn zero_height_is_rejected() {
        let discovery = Discovery {
            width: 1920,
            height: 0,
        };

        assert!(matches!(
            discovery.orientation(),
            Err(DiscoverError::ZeroDimension { .. })
        ));
    }

    #[test]
    fn prefixes() {
        assert_eq!(Orientation::Landscape.as_prefix(), "landscape");
        assert_eq!(Orientation::Portrait.as_prefix(), "portrait");
        assert_eq!(Orientation::Other.as_prefix(), "other");
    }
}
