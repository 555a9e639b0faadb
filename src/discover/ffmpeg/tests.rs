use crate::discover::{DiscoverError, Discovery};

use super::FfMpegDiscovery;

fn details_tests() -> [(&'static str, Option<Discovery>); 5] {
    [
        (
            "landscape",
            Some(Discovery {
                width: 1920,
                height: 1080,
            }),
        ),
        (
            "portrait",
            Some(Discovery {
                width: 1080,
                height: 1920,
            }),
        ),
        (
            "audio_first",
            Some(Discovery {
                width: 1280,
                height: 720,
            }),
        ),
        ("audio_only", None),
        ("no_streams", None),
    ]
}

fn read_case(case: &str) -> FfMpegDiscovery {
    let string = std::fs::read_to_string(format!("./src/discover/ffmpeg/ffprobe_{case}.json"))
        .expect("Read file");

    serde_json::from_str(&string).expect("Valid json")
}

#[test]
fn parse_discovery() {
    for (case, expected) in details_tests() {
        let output = super::parse_discovery(read_case(case));

        match expected {
            Some(expected) => assert_eq!(output.expect("Parsed details"), expected, "{case}"),
            None => assert!(
                matches!(output, Err(DiscoverError::NoStreams)),
                "{case}: {output:?}"
            ),
        }
    }
}

#[test]
fn empty_output_has_no_streams() {
    let json: FfMpegDiscovery = serde_json::from_str("{}").expect("Valid json");

    assert!(matches!(
        super::parse_discovery(json),
        Err(DiscoverError::NoStreams)
    ));
}

#[test]
fn video_stream_without_dimensions() {
    let json: FfMpegDiscovery =
        serde_json::from_str(r#"{"streams":[{"index":0,"codec_type":"video"}]}"#)
            .expect("Valid json");

    assert!(matches!(
        super::parse_discovery(json),
        Err(DiscoverError::MissingDimensions)
    ));
}

#[test]
fn malformed_output_is_rejected() {
    assert!(serde_json::from_str::<FfMpegDiscovery>("Invalid data found").is_err());
}
