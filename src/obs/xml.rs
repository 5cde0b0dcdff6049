//! XML documents exchanged with the multipart endpoints

use serde::{Deserialize, Serialize};

/// Response to `POST /<key>?uploads`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateMultipartUploadResult {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    pub upload_id: String,
}

/// One page of `GET /<key>?uploadId=`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListPartsResult {
    #[serde(default)]
    pub is_truncated: Option<String>,
    #[serde(default)]
    pub next_part_number_marker: Option<String>,
    #[serde(default, rename = "Part")]
    pub parts: Vec<ListedPart>,
}

impl ListPartsResult {
    pub fn is_truncated(&self) -> bool {
        self.is_truncated
            .as_deref()
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn next_marker(&self) -> Option<u32> {
        self.next_part_number_marker
            .as_deref()
            .and_then(|value| value.trim().parse().ok())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListedPart {
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Request body of `POST /<key>?uploadId=`
#[derive(Debug, Serialize)]
pub struct CompleteMultipartUpload {
    #[serde(rename = "Part")]
    pub parts: Vec<CompletePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompletePart {
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Response to a successful completion
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompleteMultipartUploadResult {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, rename = "ETag")]
    pub etag: Option<String>,
}

/// Error document returned with non-2xx responses
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl CompleteMultipartUpload {
    /// Serialize with the `<CompleteMultipartUpload>` root element
    pub fn to_xml(&self) -> Result<String, String> {
        quick_xml::se::to_string_with_root("CompleteMultipartUpload", self).map_err(|e| e.to_string())
    }
}
