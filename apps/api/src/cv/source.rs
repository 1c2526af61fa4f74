//! Read-only access to the content store that holds CVs and job applications.
//!
//! Filesystem layout under the content directory:
//! - `cv/{locale}.json`                  a `CvDocument`
//! - `applications/{id}.md` or `.txt`    the job posting text

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use super::identity::ensure_ids;
use super::models::CvDocument;
use crate::errors::AppError;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid name '{0}'")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CV document: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(what) => AppError::NotFound(what),
            SourceError::InvalidName(name) => AppError::Validation(format!("Invalid name '{name}'")),
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Loads the CV for `locale`, with ids assigned.
    async fn load_cv(&self, locale: &str) -> Result<CvDocument, SourceError>;
    async fn load_job_posting_text(&self, application_id: &str) -> Result<String, SourceError>;
}

#[derive(Debug, Clone)]
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn load_cv(&self, locale: &str) -> Result<CvDocument, SourceError> {
        check_name(locale)?;
        let path = self.root.join("cv").join(format!("{locale}.json"));
        let raw = read_existing(&path, || format!("CV for locale '{locale}'")).await?;
        let doc: CvDocument = serde_json::from_str(&raw)?;
        Ok(ensure_ids(&doc))
    }

    async fn load_job_posting_text(&self, application_id: &str) -> Result<String, SourceError> {
        check_name(application_id)?;
        let dir = self.root.join("applications");
        for ext in ["md", "txt"] {
            let path = dir.join(format!("{application_id}.{ext}"));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => return Ok(text),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(SourceError::NotFound(format!(
            "Job application '{application_id}'"
        )))
    }
}

async fn read_existing(path: &Path, what: impl FnOnce() -> String) -> Result<String, SourceError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SourceError::NotFound(what())),
        Err(e) => Err(e.into()),
    }
}

/// Names become file names; only `[A-Za-z0-9_-]` is allowed.
fn check_name(name: &str) -> Result<(), SourceError> {
    let ok = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(SourceError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (tempfile::TempDir, FsDocumentSource) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("cv")).unwrap();
        std::fs::create_dir_all(dir.path().join("applications")).unwrap();
        std::fs::write(
            dir.path().join("cv/en.json"),
            r#"{"main": [{"title": "Work Experience", "bulletPoints": [{"text": "Built"}]}], "side": []}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("applications/acme-2024.md"), "# Rust Engineer").unwrap();
        let source = FsDocumentSource::new(dir.path());
        (dir, source)
    }

    #[tokio::test]
    async fn test_load_cv_assigns_ids() {
        let (_dir, source) = seeded();
        let cv = source.load_cv("en").await.unwrap();
        assert_eq!(cv.main[0].id.as_deref(), Some("main-work-experience"));
        assert_eq!(
            cv.main[0].bullet_points[0].id.as_deref(),
            Some("main-work-experience-bullet-0")
        );
    }

    #[tokio::test]
    async fn test_missing_locale_is_not_found() {
        let (_dir, source) = seeded();
        assert!(matches!(
            source.load_cv("fr").await,
            Err(SourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_job_posting_text_is_read() {
        let (_dir, source) = seeded();
        let text = source.load_job_posting_text("acme-2024").await.unwrap();
        assert_eq!(text, "# Rust Engineer");
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let (_dir, source) = seeded();
        assert!(matches!(
            source.load_job_posting_text("../secrets").await,
            Err(SourceError::InvalidName(_))
        ));
        assert!(matches!(
            source.load_cv("").await,
            Err(SourceError::InvalidName(_))
        ));
    }
}
