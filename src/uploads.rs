use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::{body::Bytes, extract::Multipart};

use crate::{AppError, AppResult};

/// One file part of a multipart form.
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// File and text parts of a multipart form, keyed by field name.
#[derive(Debug, Default)]
pub struct Form {
    pub files: Vec<(String, UploadedFile)>,
    pub fields: Vec<(String, String)>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Form::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            match field.file_name().map(str::to_owned) {
                Some(filename) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_owned();
                    let bytes = field.bytes().await?;
                    form.files.push((name, UploadedFile { filename, content_type, bytes }));
                }
                None => form.fields.push((name, field.text().await?)),
            }
        }
        Ok(form)
    }

    pub fn take_file(&mut self, name: &str) -> AppResult<UploadedFile> {
        let position = self
            .files
            .iter()
            .position(|(field, _)| field == name)
            .ok_or_else(|| AppError::bad_request(format!("missing file field {name:?}")))?;
        Ok(self.files.swap_remove(position).1)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}

pub async fn store(dir: &Path, name: &str, bytes: &[u8]) -> AppResult<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("unable to create {}", dir.display()))?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("unable to write {}", path.display()))?;
    Ok(path)
}

pub async fn load(path: &Path) -> AppResult<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AppError::not_found("file")),
        Err(err) => Err(err.into()),
    }
}

pub async fn remove(path: &Path) -> AppResult<()> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

/// Lower-cased extension of a client-supplied file name, if any.
pub fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "odt" => "application/vnd.oasis.opendocument.text",
        "txt" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_lowercased() {
        assert_eq!(extension("Report.DOCX").as_deref(), Some("docx"));
        assert_eq!(extension("no_extension"), None);
    }

    #[test]
    fn content_types_fall_back_to_octet_stream() {
        assert_eq!(content_type_for("pdf"), "application/pdf");
        assert_eq!(content_type_for("exe"), "application/octet-stream");
    }

    #[tokio::test]
    async fn store_then_load_and_remove() {
        let dir = std::env::temp_dir().join(format!("clubhouse-test-{}", uuid::Uuid::now_v7()));
        let path = store(&dir, "hello.txt", b"hello").await.unwrap();
        assert_eq!(load(&path).await.unwrap(), b"hello");
        remove(&path).await.unwrap();
        remove(&path).await.unwrap();
        assert!(matches!(load(&path).await, Err(AppError::NotFound(_))));
    }
}
