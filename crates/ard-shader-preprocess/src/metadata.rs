use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use ard_shader_core::prelude::ContentHash;

use crate::include::IncludeRecord;

/// Identity of a single preprocessed stage. Two stages compare equal only if their content
/// hashes and their header sets are equal, which is the sole trigger for recompiling a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageMetadata {
    /// Hash of the fully preprocessed stage source.
    pub hash: ContentHash,
    /// Headers included by the stage, unique by path.
    headers: BTreeMap<PathBuf, IncludeRecord>,
}

impl StageMetadata {
    pub fn new(hash: ContentHash, headers: impl IntoIterator<Item = IncludeRecord>) -> Self {
        let mut metadata = StageMetadata {
            hash,
            headers: BTreeMap::default(),
        };
        headers
            .into_iter()
            .for_each(|header| metadata.insert_header(header));
        metadata
    }

    /// Records a header. If the header was already recorded, the record closest to the root
    /// file is kept.
    pub fn insert_header(&mut self, record: IncludeRecord) {
        match self.headers.get(&record.path) {
            Some(existing) if existing.depth <= record.depth => {}
            _ => {
                self.headers.insert(record.path.clone(), record);
            }
        }
    }

    #[inline]
    pub fn header(&self, path: &Path) -> Option<&IncludeRecord> {
        self.headers.get(path)
    }

    /// Headers ordered by path.
    #[inline]
    pub fn headers(&self) -> impl ExactSizeIterator<Item = &IncludeRecord> {
        self.headers.values()
    }
}
