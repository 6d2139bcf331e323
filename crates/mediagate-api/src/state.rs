//! Shared handler state

use mediagate_db::UnitOfWork;
use mediagate_services::{FileService, TagService};

pub struct AppState<U> {
    pub files: FileService<U>,
    pub tags: TagService<U>,
}

impl<U: UnitOfWork> AppState<U> {
    pub fn new(files: FileService<U>, tags: TagService<U>) -> Self {
        Self { files, tags }
    }
}
