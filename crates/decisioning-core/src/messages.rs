//! Fixed, human-readable messages surfaced to callers.

pub const ARTIFACT_NOT_AVAILABLE: &str = "The decisioning artifact is not available";
pub const CONTEXT_UNDEFINED: &str = "Undefined context.";
pub const ENGINE_STOPPED: &str = "The decisioning engine has been stopped";

pub const REQUEST_REQUIRED: &str = "Request object is required";
pub const EXECUTE_OR_PREFETCH_REQUIRED: &str = "Either execute or prefetch is required in request";
pub const EXECUTE_FIELDS_REQUIRED: &str = "Either pageLoad or mboxes is required in execute";
pub const PREFETCH_FIELDS_REQUIRED: &str =
    "Either views, pageLoad or mboxes is required in prefetch";

pub const CLIENT_REQUIRED: &str = "Client is required";
pub const ORG_ID_REQUIRED: &str = "Organization Id is required";

pub fn error_max_retry(num_retries: u32, reason: &str) -> String {
    format!("Unable to retrieve artifact after {num_retries} retries: {reason}")
}

pub fn artifact_version_unsupported(artifact_version: &str, supported_major_version: u64) -> String {
    format!(
        "The decisioning artifact version ({artifact_version}) is not supported. \
         This library is compatible with this major version: {supported_major_version}"
    )
}

pub fn artifact_fetch_error(reason: &str) -> String {
    format!("Failed to retrieve artifact: {reason}")
}
