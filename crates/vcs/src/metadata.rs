//! Embedded-metadata wire format.
//!
//! Tracked-object bodies double as the durable store: a hidden HTML-comment
//! block carries the project directory and the object kind, and re-reading
//! open objects recovers the state of previous runs. This module is the
//! single point of truth for that format.
//!
//! Layout inside a body:
//! `<!--PROJECT_JSON_START--><!--{"project":{"dir":"..."},"kind":"drift"}--><!--PROJECT_JSON_END-->`

use serde::{Deserialize, Serialize};
use tracing::debug;

const PROJECT_JSON_START: &str = "<!--PROJECT_JSON_START-->";
const PROJECT_JSON_END: &str = "<!--PROJECT_JSON_END-->";

/// Classification of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Drift,
    Error,
}

impl IssueKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drift => "drift",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project reference stored in a tracked-object body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub dir: String,
}

/// The metadata block stored in a tracked-object body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project: ProjectRef,
    pub kind: IssueKind,
}

impl ProjectMetadata {
    pub fn new(dir: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            project: ProjectRef { dir: dir.into() },
            kind,
        }
    }
}

/// Render the delimited metadata block for inclusion in a body.
pub fn embed(metadata: &ProjectMetadata) -> String {
    // Serialization of this struct cannot fail.
    let json = serde_json::to_string(metadata).unwrap_or_default();
    format!("{PROJECT_JSON_START}<!--{json}-->{PROJECT_JSON_END}")
}

/// Recover the metadata block from a body.
///
/// Bodies without the block, or with malformed JSON inside it, belong to
/// objects driftive does not manage; both yield `None`.
pub fn extract(body: &str) -> Option<ProjectMetadata> {
    let start = body.find(PROJECT_JSON_START)? + PROJECT_JSON_START.len();
    let end = body[start..].find(PROJECT_JSON_END)?;
    let tagged = &body[start..start + end];
    let json = tagged.replace("<!--", "").replace("-->", "");
    match serde_json::from_str(&json) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            debug!("Failed to parse project metadata from body: {err}. Ignoring object.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_then_extract_round_trips() {
        let metadata = ProjectMetadata::new("gcp/myproject/app1", IssueKind::Drift);
        let block = embed(&metadata);
        assert!(block.starts_with(PROJECT_JSON_START));
        assert!(block.ends_with(PROJECT_JSON_END));

        let body = format!("{block}\n\n## Drift detected\nsome markdown");
        assert_eq!(extract(&body), Some(metadata));
    }

    #[test]
    fn extract_recognizes_error_kind() {
        let body = concat!(
            "<!--PROJECT_JSON_START-->",
            "<!--{\"project\":{\"dir\":\"infra/b\"},\"kind\":\"error\"}-->",
            "<!--PROJECT_JSON_END-->",
        );
        let metadata = extract(body).unwrap();
        assert_eq!(metadata.kind, IssueKind::Error);
        assert_eq!(metadata.project.dir, "infra/b");
    }

    #[test]
    fn bodies_without_block_are_ignored() {
        assert_eq!(extract("just a human-written issue"), None);
        assert_eq!(extract(""), None);
    }

    #[test]
    fn malformed_json_is_ignored() {
        let body = "<!--PROJECT_JSON_START--><!--{not json}--><!--PROJECT_JSON_END-->";
        assert_eq!(extract(body), None);
    }

    #[test]
    fn unknown_kind_is_ignored() {
        let body = concat!(
            "<!--PROJECT_JSON_START-->",
            "<!--{\"project\":{\"dir\":\"x\"},\"kind\":\"wat\"}-->",
            "<!--PROJECT_JSON_END-->",
        );
        assert_eq!(extract(body), None);
    }
}
