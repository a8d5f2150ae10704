//! Attachment preparation: validation and base64 encoding of file uploads.
//!
//! Validation failures are reported back as data ([`PreparedAttachments::rejected`])
//! rather than errors: a bad file in a batch never prevents the good ones
//! from being sent.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::domain::{FileUpload, OutgoingAttachment};

/// Default per-file size limit (4 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 4 * 1024 * 1024;

/// Default number of files accepted in one message.
pub const DEFAULT_MAX_FILES: usize = 5;

/// Limits applied to a batch of uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPolicy {
    pub max_files: usize,
    pub max_file_bytes: usize,
    /// Allowed MIME types. A trailing `/*` allows a whole family.
    pub allowed_types: Vec<String>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            allowed_types: vec![
                "image/*".to_string(),
                "application/pdf".to_string(),
                "text/plain".to_string(),
            ],
        }
    }
}

impl AttachmentPolicy {
    /// Whether `content_type` matches the allow-list (case-insensitive,
    /// parameters such as `; charset=utf-8` ignored).
    #[must_use]
    pub fn allows(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        self.allowed_types.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            allowed.strip_suffix("/*").map_or_else(
                || allowed == essence,
                |family| {
                    essence
                        .split_once('/')
                        .is_some_and(|(top, _)| top == family)
                },
            )
        })
    }
}

/// Why a file was not attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum RejectionReason {
    TooManyFiles { max: usize },
    TooLarge { size: usize, max: usize },
    Empty,
    DisallowedType { content_type: String },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooManyFiles { max } => write!(f, "at most {max} files can be attached"),
            Self::TooLarge { size, max } => {
                write!(f, "file is {size} bytes, the limit is {max} bytes")
            }
            Self::Empty => write!(f, "file is empty"),
            Self::DisallowedType { content_type } => {
                write!(f, "files of type '{content_type}' are not allowed")
            }
        }
    }
}

/// A rejected upload and the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedFile {
    pub name: String,
    pub reason: RejectionReason,
}

/// Outcome of [`prepare_attachments`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedAttachments {
    pub accepted: Vec<OutgoingAttachment>,
    pub rejected: Vec<RejectedFile>,
}

impl PreparedAttachments {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Validate a batch of uploads against `policy` and encode the accepted ones.
///
/// Files beyond `max_files` are rejected in order; the first `max_files`
/// are still validated individually.
#[must_use]
pub fn prepare_attachments(files: Vec<FileUpload>, policy: &AttachmentPolicy) -> PreparedAttachments {
    let mut prepared = PreparedAttachments::default();

    for (index, file) in files.into_iter().enumerate() {
        let rejection = if index >= policy.max_files {
            Some(RejectionReason::TooManyFiles {
                max: policy.max_files,
            })
        } else if file.bytes.is_empty() {
            Some(RejectionReason::Empty)
        } else if file.bytes.len() > policy.max_file_bytes {
            Some(RejectionReason::TooLarge {
                size: file.bytes.len(),
                max: policy.max_file_bytes,
            })
        } else if !policy.allows(&file.content_type) {
            Some(RejectionReason::DisallowedType {
                content_type: file.content_type.clone(),
            })
        } else {
            None
        };

        match rejection {
            Some(reason) => {
                tracing::debug!(file = %file.name, %reason, "Attachment rejected");
                prepared.rejected.push(RejectedFile {
                    name: file.name,
                    reason,
                });
            }
            None => prepared.accepted.push(encode(file)),
        }
    }

    prepared
}

fn encode(file: FileUpload) -> OutgoingAttachment {
    let content_url = format!(
        "data:{};base64,{}",
        file.content_type,
        STANDARD.encode(&file.bytes)
    );
    OutgoingAttachment {
        content_type: file.content_type,
        content_url,
        name: file.name,
    }
}
