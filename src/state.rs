use crate::{
    config::Configuration, repo::ArcRepo, thumbnail::ArcThumbnails, tmp_file::ArcTmpDir,
};

#[derive(Clone)]
pub(crate) struct State<S> {
    pub(super) config: Configuration,
    pub(super) tmp_dir: ArcTmpDir,
    pub(super) repo: ArcRepo,
    pub(super) store: S,
    pub(super) thumbnails: ArcThumbnails,
}
