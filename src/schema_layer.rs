use std::path::Path;

use serde_json::json;

use crate::schema_store::SchemaStore;
use crate::types::{
    failure_result, success_result, LayerName, LayerResult, ValidationContext, ValidationError,
};

/// Layer 1: structural validation of the parsed document against its schema.
pub async fn run(ctx: &ValidationContext) -> LayerResult {
    let store = match SchemaStore::shared() {
        Ok(store) => store,
        Err(err) => {
            let error = ValidationError::new("SCHEMA_INTERNAL_ERROR", "Schema engine failure")
                .with_details(json!({ "error": err.to_string() }));
            return failure_result(LayerName::Schema, vec![error], Vec::new(), None);
        }
    };

    let (valid, errors) = store.validate(ctx.file_type, &ctx.data);
    if valid {
        success_result(LayerName::Schema, None)
    } else {
        failure_result(LayerName::Schema, errors, Vec::new(), None)
    }
}

/// Result the runner injects when a document cannot be read from disk.
pub fn file_read_failure(file_path: &Path, detail: &str) -> LayerResult {
    let error = ValidationError::new(
        "SCHEMA_FILE_READ_ERROR",
        format!("Failed to read {}", file_path.display()),
    )
    .with_details(json!({
        "filePath": file_path.display().to_string(),
        "error": detail,
    }));
    failure_result(LayerName::Schema, vec![error], Vec::new(), None)
}

/// Result the runner injects when a document is not valid JSON.
pub fn parse_failure(file_path: &Path, detail: &str) -> LayerResult {
    let error = ValidationError::new(
        "SCHEMA_PARSE_ERROR",
        format!("Failed to parse JSON from {}", file_path.display()),
    )
    .with_details(json!({
        "filePath": file_path.display().to_string(),
        "error": detail,
    }));
    failure_result(LayerName::Schema, vec![error], Vec::new(), None)
}
