use std::{
    ffi::OsString,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use uuid::Uuid;

pub(crate) type ArcTmpDir = Arc<TmpDir>;

/// A per-process scratch directory that every staged upload lives in
#[derive(Debug)]
pub(crate) struct TmpDir {
    path: Option<PathBuf>,
}

impl TmpDir {
    pub(crate) async fn init<P: AsRef<Path>>(path: P) -> std::io::Result<Arc<Self>> {
        let path = path.as_ref().join(Uuid::now_v7().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Arc::new(TmpDir { path: Some(path) }))
    }

    fn build_tmp_file(&self, ext: Option<&str>) -> PathBuf {
        let root = self.path.as_deref().unwrap_or_else(|| Path::new("."));

        if let Some(ext) = ext {
            root.join(format!("{}{}", Uuid::now_v7(), ext))
        } else {
            root.join(Uuid::now_v7().to_string())
        }
    }

    pub(crate) fn tmp_file(&self, ext: Option<&str>) -> TmpFile {
        TmpFile(Some(self.build_tmp_file(ext)))
    }

    pub(crate) async fn cleanup(self: Arc<Self>) -> std::io::Result<()> {
        if let Some(path) = Arc::into_inner(self).and_then(|mut this| this.path.take()) {
            tokio::fs::remove_dir_all(path).await?;
        }

        Ok(())
    }
}

impl AsRef<Path> for TmpDir {
    fn as_ref(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new("."))
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}

/// A path that is removed from disk when dropped, whether or not anything was ever written to it
#[must_use]
#[derive(Debug)]
pub(crate) struct TmpFile(Option<PathBuf>);

impl TmpFile {
    /// Reserve `<this path><suffix>` next to this file
    pub(crate) fn sibling(&self, suffix: &str) -> TmpFile {
        let mut path = OsString::from(self.as_os_str());
        path.push(suffix);

        TmpFile(Some(PathBuf::from(path)))
    }

    pub(crate) async fn cleanup(mut self) -> std::io::Result<()> {
        if let Some(path) = self.0.as_deref() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        self.0.take();
        Ok(())
    }
}

impl AsRef<Path> for TmpFile {
    fn as_ref(&self) -> &Path {
        self
    }
}

impl Deref for TmpFile {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.0.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TmpDir;

    #[tokio::test]
    async fn dropped_files_are_removed() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let tmp_dir = TmpDir::init(root.path()).await.expect("Created tmp dir");

        let file = tmp_dir.tmp_file(Some(".mp4"));
        let sibling = file.sibling(".processing");
        std::fs::write(&file, b"staged").expect("Wrote file");
        std::fs::write(&sibling, b"optimized").expect("Wrote sibling");

        assert!(sibling.to_string_lossy().ends_with(".mp4.processing"));

        let (file_path, sibling_path) = (file.to_path_buf(), sibling.to_path_buf());
        drop(file);
        drop(sibling);

        assert!(!file_path.exists());
        assert!(!sibling_path.exists());
    }

    #[tokio::test]
    async fn cleanup_tolerates_unwritten_files() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let tmp_dir = TmpDir::init(root.path()).await.expect("Created tmp dir");

        let file = tmp_dir.tmp_file(None);
        file.cleanup().await.expect("Cleaned up");

        tmp_dir.cleanup().await.expect("Cleaned up dir");
        assert_eq!(std::fs::read_dir(root.path()).expect("Read root").count(), 0);
    }
}
