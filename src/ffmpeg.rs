use std::ffi::OsStr;

use crate::{
    config::Media,
    error_code::ErrorCode,
    process::{Process, ProcessError},
    tmp_file::TmpFile,
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum FfMpegError {
    #[error("Error in ffmpeg process")]
    Process(#[source] ProcessError),

    #[error("ffmpeg exited without writing its output")]
    MissingOutput(#[source] std::io::Error),
}

impl From<ProcessError> for FfMpegError {
    fn from(value: ProcessError) -> Self {
        Self::Process(value)
    }
}

impl FfMpegError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::MissingOutput(_) => ErrorCode::FILE_IO_ERROR,
        }
    }
}

/// Copy every stream of `input` into a new mp4 with the moov atom moved to the front, so players
/// can start before the whole file has downloaded
#[tracing::instrument(level = "debug", skip(media))]
pub(crate) async fn fast_start(media: &Media, input: &TmpFile) -> Result<TmpFile, FfMpegError> {
    let output = input.sibling(".processing");

    Process::run(
        &media.ffmpeg_path,
        &[
            OsStr::new("-v"),
            OsStr::new("error"),
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-c"),
            OsStr::new("copy"),
            OsStr::new("-movflags"),
            OsStr::new("faststart"),
            OsStr::new("-f"),
            OsStr::new("mp4"),
            output.as_os_str(),
        ],
        media.process_timeout,
    )?
    .wait()
    .await?;

    tokio::fs::metadata(&output)
        .await
        .map_err(FfMpegError::MissingOutput)?;

    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use crate::{test_util, tmp_file::TmpDir};

    use super::FfMpegError;

    #[tokio::test]
    async fn remuxes_next_to_input() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let media = test_util::media(dir.path(), test_util::LANDSCAPE_PROBE);
        let tmp_dir = TmpDir::init(dir.path().join("tmp")).await.expect("Created tmp dir");

        let input = tmp_dir.tmp_file(Some(".mp4"));
        std::fs::write(&input, b"video").expect("Wrote input");

        let output = super::fast_start(&media, &input).await.expect("Remuxed");

        assert_eq!(
            output.as_os_str().to_string_lossy(),
            format!("{}.processing", input.display())
        );
        assert_eq!(
            std::fs::read(&output).expect("Read output"),
            test_util::remuxed(b"video")
        );
    }

    #[tokio::test]
    async fn failed_remux_leaves_nothing_behind() {
        let dir = tempfile::tempdir().expect("Created tempdir");
        let mut media = test_util::media(dir.path(), test_util::LANDSCAPE_PROBE);
        media.ffmpeg_path = test_util::failing_tool(dir.path(), "ffmpeg");
        let tmp_dir = TmpDir::init(dir.path().join("tmp")).await.expect("Created tmp dir");

        let input = tmp_dir.tmp_file(Some(".mp4"));
        std::fs::write(&input, b"video").expect("Wrote input");

        let res = super::fast_start(&media, &input).await;
        assert!(matches!(res, Err(FfMpegError::Process(_))));

        drop(input);
        assert_eq!(test_util::count_entries(&*tmp_dir), 0);
    }
}
