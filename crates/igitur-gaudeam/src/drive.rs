//! Drive endpoints
//!
//! Wire types and requests for the instance drive: folder properties,
//! paginated listings, folder creation, file download and the three-step
//! upload (sign, store, register).

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::client::GaudeamClient;
use crate::GaudeamError;

// ============================================================================
// Wire types
// ============================================================================

/// Accepts ids sent either as JSON numbers or strings
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// Properties of a folder (`GET /api/v1/drive/folders/{id}`)
#[derive(Debug, Clone, Deserialize)]
pub struct FolderProperties {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub owner_type: Option<String>,
    #[serde(default)]
    pub owner_id: Value,
    pub restrict_to: Option<RestrictTo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestrictTo {
    #[serde(default)]
    pub id: Value,
}

/// One page of a folder listing
#[derive(Debug, Deserialize)]
pub struct InodePage {
    #[serde(default)]
    pub results: Vec<Inode>,
}

/// A listed child of a folder
#[derive(Debug, Clone, Deserialize)]
pub struct Inode {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name; files usually have no extension here
    pub name: Option<String>,
    /// Original file name including the extension
    pub download_name: Option<String>,
    pub file_size: Option<u64>,
}

/// Classification of an inode type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeClass {
    Folder,
    File,
    Other,
}

impl Inode {
    pub fn class(&self) -> InodeClass {
        classify_type(&self.kind)
    }

    /// Name the entry is matched by: folder name, or download name for files
    pub fn entry_name(&self) -> Option<&str> {
        match self.class() {
            InodeClass::Folder => self.name.as_deref(),
            InodeClass::File => self.download_name.as_deref().or(self.name.as_deref()),
            InodeClass::Other => None,
        }
    }
}

pub fn classify_type(kind: &str) -> InodeClass {
    match kind {
        "Folder" | "Gallery" => InodeClass::Folder,
        "Photo" | "DriveFile" => InodeClass::File,
        _ => InodeClass::Other,
    }
}

#[derive(Debug, Deserialize)]
struct CreatedInode {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
}

/// Response of `POST /api/v1/drive/sign`
#[derive(Debug, Deserialize)]
struct UploadSignature {
    #[serde(rename = "postEndpoint")]
    post_endpoint: String,
    /// Form fields the storage endpoint expects alongside the file
    signature: serde_json::Map<String, Value>,
}

// ============================================================================
// Request bodies
// ============================================================================

/// Body for creating `name` under `parent`, copying the parent's ownership
///
/// # Errors
/// Returns `GaudeamError::UnsupportedOwner` for owner types other than
/// `Group`, `GroupMember` or none
pub fn create_folder_body(parent: &FolderProperties, name: &str) -> Result<Value, GaudeamError> {
    let (owner_type, restrict_to_id) = match parent.owner_type.as_deref() {
        Some("Group") => {
            let restrict = parent
                .restrict_to
                .as_ref()
                .map(|r| r.id.clone())
                .unwrap_or(Value::Null);
            (json!("Group"), restrict)
        }
        Some("GroupMember") => (json!("GroupMember"), Value::Null),
        None => (Value::Null, Value::Null),
        Some(other) => return Err(GaudeamError::UnsupportedOwner(other.to_string())),
    };

    Ok(json!({
        "inode": {
            "description": "",
            "name": name,
            "ordering": ["<name"],
            "owner_id": parent.owner_id,
            "owner_type": owner_type,
            "parent_id": parent.id,
            "restrict_to_id": restrict_to_id,
            "type": "Folder",
        }
    }))
}

/// Body registering a stored upload as a file of `parent_id`
pub fn register_upload_body(parent_id: &str, file_name: &str, storage_key: &str) -> Value {
    json!({
        "inode": {
            "content_type": mime_type_for(file_name),
            "name": display_name(file_name),
            "parent_id": parent_id,
            "physically_created_at": "",
            "stored_file": storage_key,
        }
    })
}

/// File name without its last extension; the drive shows files this way
pub fn display_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// MIME type by extension, `application/octet-stream` when unknown
pub fn mime_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Extracts the object key from the storage endpoint's XML reply
pub fn parse_storage_key(xml: &str) -> Option<String> {
    let re = Regex::new(r"<Key>\s*([^<]+?)\s*</Key>").ok()?;
    re.captures(xml).map(|c| c[1].to_string())
}

// ============================================================================
// Requests
// ============================================================================

impl GaudeamClient {
    /// Fetches the properties of a folder
    #[instrument(skip(self))]
    pub async fn folder_properties(&self, folder_id: &str) -> Result<FolderProperties> {
        self.get_json(&format!("/api/v1/drive/folders/{folder_id}"))
            .await
            .with_context(|| format!("Failed to fetch properties of folder {folder_id}"))
    }

    /// Fetches one page of a folder listing, ordered by name
    pub async fn list_folder_page(
        &self,
        folder_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Inode>> {
        let path = format!(
            "/api/v1/drive/folders?parent_id={folder_id}&order=%3Ename&offset={offset}&limit={limit}"
        );
        let page: InodePage = self.get_json(&path).await?;
        Ok(page.results)
    }

    /// Fetches all children of a folder, page by page
    #[instrument(skip(self))]
    pub async fn list_folder_all(&self, folder_id: &str, page_size: u32) -> Result<Vec<Inode>> {
        let page_size = page_size.max(1);
        let mut offset = 0;
        let mut all = Vec::new();

        loop {
            let batch = self
                .list_folder_page(folder_id, offset, page_size)
                .await
                .with_context(|| format!("Failed to list folder {folder_id} at offset {offset}"))?;
            let len = batch.len();
            all.extend(batch);

            if len < page_size as usize {
                break;
            }
            offset += page_size;
        }

        debug!(folder_id, count = all.len(), "Listed folder");
        Ok(all)
    }

    /// Creates a folder and returns its id
    #[instrument(skip(self, parent), fields(parent = %parent.id))]
    pub async fn create_folder(&self, parent: &FolderProperties, name: &str) -> Result<String> {
        let body = create_folder_body(parent, name)?;
        let created: CreatedInode = self
            .post_json("/api/v1/drive/folders", &body)
            .await
            .with_context(|| format!("Failed to create folder {name:?} in {}", parent.id))?;
        debug!(name, id = %created.id, "Created folder");
        Ok(created.id)
    }

    /// Deletes a folder including all of its content
    #[instrument(skip(self))]
    pub async fn delete_folder(&self, folder_id: &str) -> Result<()> {
        self.delete(&format!("/api/v1/drive/folders/{folder_id}"))
            .await
            .with_context(|| format!("Failed to delete folder {folder_id}"))
    }

    /// Deletes an uploaded file
    #[instrument(skip(self))]
    pub async fn delete_uploaded_file(&self, file_id: &str) -> Result<()> {
        self.delete(&format!("/api/v1/drive/uploaded_files/{file_id}"))
            .await
            .with_context(|| format!("Failed to delete file {file_id}"))
    }

    /// Downloads a drive file
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.get_bytes(&format!("/drive/uploaded_files/{file_id}/download"))
            .await
            .with_context(|| format!("Failed to download file {file_id}"))
    }

    /// Uploads `data` as `file_name` into folder `parent_id`
    ///
    /// The file becomes visible in the folder only with the final
    /// registration request.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_file(
        &self,
        parent_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<String> {
        let signature: UploadSignature = self
            .post_json("/api/v1/drive/sign", &json!({}))
            .await
            .context("Failed to request upload signature")?;

        let key = self
            .store_upload(&signature, file_name, data)
            .await
            .with_context(|| format!("Failed to store {file_name:?}"))?;

        let body = register_upload_body(parent_id, file_name, &key);
        let created: CreatedInode = self
            .post_json("/api/v1/drive/uploaded_files", &body)
            .await
            .with_context(|| format!("Failed to register upload of {file_name:?}"))?;

        debug!(file_name, id = %created.id, "Uploaded file");
        Ok(created.id)
    }

    /// Posts the file to the signed storage endpoint and returns its key
    async fn store_upload(
        &self,
        signature: &UploadSignature,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<String> {
        let mut form = Form::new();
        for (field, value) in &signature.signature {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            form = form.text(field.clone(), value);
        }
        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_type_for(file_name))
            .context("Invalid MIME type")?;
        form = form.part("file", part);

        let response = self
            .http_client()
            .post(&signature.post_endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(GaudeamError::NetworkError)?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status != StatusCode::CREATED {
            let err = if status.is_server_error() {
                GaudeamError::ServerError(format!("storage upload returned {status}"))
            } else {
                GaudeamError::InvalidResponse(format!("storage upload returned {status}"))
            };
            return Err(err.into());
        }

        parse_storage_key(&text).ok_or_else(|| {
            GaudeamError::InvalidResponse("storage reply has no <Key>".to_string()).into()
        })
    }
}
