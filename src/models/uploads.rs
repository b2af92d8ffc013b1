use serde::{Deserialize, Serialize};

/// Metadata returned by the object store for a stored document, with the
/// URL already rewritten to its previewable https form.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub url: String,
    pub public_id: String,
    pub bytes: i64,
    pub format: Option<String>,
}
