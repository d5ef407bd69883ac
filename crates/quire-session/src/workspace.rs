use crate::document::Document;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lookup of open documents, used to route backward sync in multi-file projects.
pub trait Workspace: Send + Sync {
    fn find_open_document(&self, filename: &Path) -> Option<Arc<Document>>;
}

#[derive(Debug, Default)]
pub struct OpenDocuments {
    documents: DashMap<PathBuf, Arc<Document>>,
}

impl OpenDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, document: Arc<Document>) {
        self.documents
            .insert(document.filename().to_path_buf(), document);
    }

    pub fn close(&self, filename: &Path) -> Option<Arc<Document>> {
        self.documents.remove(filename).map(|(_, doc)| doc)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Workspace for OpenDocuments {
    fn find_open_document(&self, filename: &Path) -> Option<Arc<Document>> {
        self.documents.get(filename).map(|entry| entry.value().clone())
    }
}
