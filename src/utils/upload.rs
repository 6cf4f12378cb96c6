use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use actix_multipart::{Field, Multipart};
use chrono::NaiveDateTime;
use futures_util::TryStreamExt;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub category: &'static str,
    pub allowed_extensions: &'static [&'static str],
    pub max_bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    /// Relative to the upload root, `/`-separated.
    pub relative_path: String,
    pub original_name: String,
    pub size: usize,
}

/// Text fields plus at most one stored file from a multipart body.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<StoredFile>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

/// `<category>/<YYYY>/<MM>/<YYYYmmddHHMMSS>_<random hex>.<ext>`
pub fn unique_relative_path(category: &str, now: NaiveDateTime, extension: &str) -> String {
    format!(
        "{}/{}/{}_{}.{}",
        category,
        now.format("%Y/%m"),
        now.format("%Y%m%d%H%M%S"),
        Uuid::new_v4().to_simple(),
        extension
    )
}

/// Maps a stored relative path back under `root`; anything that could escape it is refused.
pub fn resolve_stored(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !safe || relative.as_os_str().is_empty() {
        return None;
    }
    Some(root.join(relative))
}

pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

async fn read_text(mut field: Field) -> AppResult<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if buf.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::PayloadTooLarge("Form field too large".into()));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(|_| AppError::Validation("Form fields must be UTF-8".into()))
}

async fn write_chunks(field: &mut Field, dest: &Path, max_bytes: usize) -> AppResult<usize> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0usize;

    while let Some(chunk) = field.try_next().await? {
        written += chunk.len();
        if written > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the {max_bytes} byte limit"
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if written == 0 {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }
    Ok(written)
}

async fn store_file(
    mut field: Field,
    original_name: String,
    root: &Path,
    policy: &UploadPolicy,
    now: NaiveDateTime,
) -> AppResult<StoredFile> {
    let extension = extension_of(&original_name)
        .filter(|ext| policy.allowed_extensions.contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Allowed file types: {}",
                policy.allowed_extensions.join(", ")
            ))
        })?;

    let relative_path = unique_relative_path(policy.category, now, &extension);
    let dest = root.join(&relative_path);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    match write_chunks(&mut field, &dest, policy.max_bytes).await {
        Ok(size) => {
            tracing::info!(path = %relative_path, size, "Stored upload");
            Ok(StoredFile {
                relative_path,
                original_name,
                size,
            })
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&dest).await;
            Err(e)
        }
    }
}

/// Reads every text field and stores the part named `file_field`, if present.
/// A stored file is removed again when a later part of the body is rejected.
pub async fn read_upload_form(
    mut payload: Multipart,
    file_field: &str,
    root: &Path,
    policy: &UploadPolicy,
    now: NaiveDateTime,
) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    match read_parts(&mut payload, &mut form, file_field, root, policy, now).await {
        Ok(()) => Ok(form),
        Err(e) => {
            if let Some(file) = &form.file {
                discard(root, file).await;
            }
            Err(e)
        }
    }
}

async fn read_parts(
    payload: &mut Multipart,
    form: &mut UploadForm,
    file_field: &str,
    root: &Path,
    policy: &UploadPolicy,
    now: NaiveDateTime,
) -> AppResult<()> {
    while let Some(field) = payload.try_next().await? {
        let (name, file_name) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().unwrap_or_default().to_string(),
                cd.get_filename().map(str::to_string),
            ),
            None => continue,
        };

        match file_name {
            Some(original) if name == file_field => {
                if form.file.is_some() {
                    return Err(AppError::Validation("Only one file may be uploaded".into()));
                }
                // browsers send an empty part when no file was chosen
                if original.is_empty() {
                    continue;
                }
                form.file = Some(store_file(field, original, root, policy, now).await?);
            }
            Some(_) => {
                return Err(AppError::Validation(format!("Unexpected file field `{name}`")));
            }
            None => {
                let value = read_text(field).await?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(())
}

/// Removes a stored file after a failed insert; failures are only logged.
pub async fn discard(root: &Path, file: &StoredFile) {
    if let Some(path) = resolve_stored(root, &file.relative_path) {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(error = %e, path = %file.relative_path, "Failed to discard upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{error::PayloadError, http::header, web::Bytes};
    use chrono::NaiveDate;

    const BOUNDARY: &str = "XyZ0boundary";

    fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Multipart {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_str(&format!("multipart/form-data; boundary={BOUNDARY}"))
                .unwrap(),
        );
        let stream = futures_util::stream::iter(vec![Ok::<_, PayloadError>(Bytes::from(body))]);
        Multipart::new(&headers, stream)
    }

    fn files_under(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .map(|path| if path.is_dir() { files_under(&path) } else { 1 })
            .sum()
    }

    const POLICY: UploadPolicy = UploadPolicy {
        category: "activities",
        allowed_extensions: &["pdf"],
        max_bytes: 1024,
    };

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    #[test]
    fn relative_paths_are_dated_and_unique() {
        let a = unique_relative_path("activities", now(), "pdf");
        let b = unique_relative_path("activities", now(), "pdf");
        assert!(a.starts_with("activities/2024/03/20240307091500_"));
        assert!(a.ends_with(".pdf"));
        assert_ne!(a, b);
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("Receipt.PDF"), Some("pdf".into()));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".into()));
    }

    #[test]
    fn stored_paths_cannot_escape_root() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            resolve_stored(root, "proofs/2024/03/a.pdf"),
            Some(PathBuf::from("/srv/uploads/proofs/2024/03/a.pdf"))
        );
        assert_eq!(resolve_stored(root, "../etc/passwd"), None);
        assert_eq!(resolve_stored(root, "/etc/passwd"), None);
        assert_eq!(resolve_stored(root, ""), None);
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for(Path::new("a.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.exe")), "application/octet-stream");
    }

    #[actix_web::test]
    async fn discard_removes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let relative = unique_relative_path("proofs", now(), "png");
        let path = dir.path().join(&relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"png").unwrap();

        let stored = StoredFile {
            relative_path: relative,
            original_name: "proof.png".into(),
            size: 3,
        };
        discard(dir.path(), &stored).await;
        assert!(!path.exists());
    }

    #[actix_web::test]
    async fn form_keeps_text_and_stores_file() {
        let dir = tempfile::tempdir().unwrap();
        let payload = multipart(&[
            ("title", None, "Field trip"),
            ("attachment", Some("notes.PDF"), "%PDF-1.4 notes"),
        ]);

        let form = read_upload_form(payload, "attachment", dir.path(), &POLICY, now())
            .await
            .unwrap();

        assert_eq!(form.text("title"), Some("Field trip"));
        let file = form.file.expect("stored file");
        assert_eq!(file.original_name, "notes.PDF");
        assert_eq!(file.size, "%PDF-1.4 notes".len());
        assert!(file.relative_path.ends_with(".pdf"));
        assert_eq!(files_under(dir.path()), 1);
    }

    #[actix_web::test]
    async fn stored_file_is_removed_when_a_later_part_fails() {
        let dir = tempfile::tempdir().unwrap();
        let payload = multipart(&[
            ("attachment", Some("a.pdf"), "%PDF-1.4 first"),
            ("other", Some("b.pdf"), "%PDF-1.4 second"),
        ]);

        let result = read_upload_form(payload, "attachment", dir.path(), &POLICY, now()).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(files_under(dir.path()), 0);
    }

    #[actix_web::test]
    async fn second_file_is_rejected_and_first_removed() {
        let dir = tempfile::tempdir().unwrap();
        let payload = multipart(&[
            ("attachment", Some("a.pdf"), "%PDF-1.4 first"),
            ("attachment", Some("c.pdf"), "%PDF-1.4 again"),
        ]);

        let result = read_upload_form(payload, "attachment", dir.path(), &POLICY, now()).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(files_under(dir.path()), 0);
    }
}
