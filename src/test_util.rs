use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    config::{ConfigSource, Media},
    repo::Repo,
    state::State,
    store::file_store::FileStore,
    thumbnail::memory::MemoryThumbnails,
    tmp_file::TmpDir,
};

pub(crate) const LANDSCAPE_PROBE: &str = include_str!("discover/ffmpeg/ffprobe_landscape.json");
pub(crate) const PORTRAIT_PROBE: &str = include_str!("discover/ffmpeg/ffprobe_portrait.json");
pub(crate) const NO_STREAMS_PROBE: &str = include_str!("discover/ffmpeg/ffprobe_no_streams.json");

pub(crate) const JWT_SECRET: &str = "test-jwt-secret";
pub(crate) const NAMESPACE: &str = "tubely-test";
pub(crate) const PUBLIC_URL: &str = "http://localhost:8091";

/// What the fake ffmpeg writes for `input`
pub(crate) fn remuxed(input: &[u8]) -> Vec<u8> {
    let mut output = b"moov".to_vec();
    output.extend_from_slice(input);
    output
}

fn write_tool(dir: &Path, name: &str, script: &str) -> String {
    let path = dir.join(name);

    std::fs::write(&path, script).expect("Wrote tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Made tool executable");

    path.to_string_lossy().into_owned()
}

/// An ffprobe that prints `probe` no matter what it's asked
pub(crate) fn fake_ffprobe(dir: &Path, probe: &str) -> String {
    let output = dir.join("probe.json");
    std::fs::write(&output, probe).expect("Wrote probe output");

    write_tool(
        dir,
        "ffprobe",
        &format!("#!/bin/sh\ncat '{}'\n", output.display()),
    )
}

/// An ffmpeg that writes `moov` followed by its `-i` input to its last argument
pub(crate) fn fake_ffmpeg(dir: &Path) -> String {
    write_tool(
        dir,
        "ffmpeg",
        r#"#!/bin/sh
input=""
while [ "$#" -gt 1 ]; do
    if [ "$1" = "-i" ]; then
        input="$2"
    fi
    shift
done
{ printf 'moov'; cat "$input"; } > "$1"
"#,
    )
}

/// A tool that leaves a partial `.processing` output behind and exits non-zero
pub(crate) fn failing_tool(dir: &Path, name: &str) -> String {
    write_tool(
        dir,
        &format!("failing-{name}"),
        r#"#!/bin/sh
for last; do :; done
case "$last" in
    *.processing) touch "$last" ;;
esac
echo "failed on purpose" >&2
exit 1
"#,
    )
}

pub(crate) fn media(dir: &Path, probe: &str) -> Media {
    Media {
        max_file_size: 1,
        max_thumbnail_size: 1,
        process_timeout: 10,
        ffprobe_path: fake_ffprobe(dir, probe),
        ffmpeg_path: fake_ffmpeg(dir),
        signature_duration: 300,
        assets_path: dir.join("assets"),
    }
}

pub(crate) fn count_entries(path: impl AsRef<Path>) -> usize {
    std::fs::read_dir(path).map(|dir| dir.count()).unwrap_or(0)
}

/// Where `FileStore` keeps the object behind `key`
pub(crate) fn stored_path(dir: &Path, key: &str) -> PathBuf {
    dir.join("files").join(key)
}

/// A full set of services rooted in `dir`, with fake tools that report `probe`
pub(crate) async fn state(dir: &Path, probe: &str) -> (State<FileStore>, MemoryThumbnails) {
    let mut config = ConfigSource::memory(serde_json::json!({
        "server": {
            "public_url": PUBLIC_URL,
            "jwt_secret": JWT_SECRET,
            "temporary_directory": dir.join("tmp"),
        },
        "repo": {
            "type": "sled",
            "path": dir.join("sled"),
        },
        "store": {
            "type": "filesystem",
            "path": dir.join("files"),
            "namespace": NAMESPACE,
            "signing_key": "test-signing-key",
        },
    }))
    .init::<&str>(None)
    .expect("Configured")
    .config;

    config.media = media(dir, probe);

    let repo = Repo::open(config.repo.clone()).expect("Opened repo").to_arc();

    let store = FileStore::build(
        dir.join("files"),
        String::from(NAMESPACE),
        config.server.public_url.clone(),
        Some(String::from("test-signing-key")),
    )
    .await
    .expect("Built store");

    let tmp_dir = TmpDir::init(&config.server.temporary_directory)
        .await
        .expect("Created tmp dir");

    let thumbnails = MemoryThumbnails::default();

    let state = State {
        config,
        tmp_dir,
        repo,
        store,
        thumbnails: Arc::new(thumbnails.clone()),
    };

    (state, thumbnails)
}
