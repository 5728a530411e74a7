//! Request Normalizer: validates an inbound request once, at the boundary,
//! and produces the canonical form the resolver relies on.

use std::collections::HashSet;

use uuid::Uuid;

use decisioning_core::delivery::{ExecuteRequest, MboxRequest, PrefetchRequest};
use decisioning_core::{DeliveryRequest, ValidationError};

/// A validated request with every mbox indexed and a request id assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRequest {
    pub request: DeliveryRequest,
    pub request_id: String,
    pub location_hint: Option<String>,
}

impl NormalizedRequest {
    pub fn execute(&self) -> Option<&ExecuteRequest> {
        self.request.execute.as_ref()
    }

    pub fn prefetch(&self) -> Option<&PrefetchRequest> {
        self.request.prefetch.as_ref()
    }
}

/// Validate and canonicalize a request. Fails on the first violation.
///
/// The caller's request is cloned, never modified.
pub fn valid_delivery_request(
    request: Option<&DeliveryRequest>,
    location_hint: Option<&str>,
) -> Result<NormalizedRequest, ValidationError> {
    let request = request.ok_or(ValidationError::RequestRequired)?;

    if request.execute.is_none() && request.prefetch.is_none() {
        return Err(ValidationError::ExecuteOrPrefetchRequired);
    }
    if let Some(execute) = &request.execute {
        validate_execute(execute)?;
    }
    if let Some(prefetch) = &request.prefetch {
        validate_prefetch(prefetch)?;
    }

    let mut normalized = request.clone();
    if let Some(execute) = normalized.execute.as_mut() {
        assign_indexes(execute.mboxes.as_mut());
    }
    if let Some(prefetch) = normalized.prefetch.as_mut() {
        assign_indexes(prefetch.mboxes.as_mut());
    }

    let request_id = normalized
        .request_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    normalized.request_id = Some(request_id.clone());

    Ok(NormalizedRequest {
        request: normalized,
        request_id,
        location_hint: location_hint
            .filter(|hint| !hint.is_empty())
            .map(str::to_string),
    })
}

fn validate_execute(execute: &ExecuteRequest) -> Result<(), ValidationError> {
    let has_mboxes = execute.mboxes.as_ref().is_some_and(|m| !m.is_empty());
    if execute.page_load.is_none() && !has_mboxes {
        return Err(ValidationError::ExecuteFieldsRequired);
    }
    validate_mboxes(execute.mboxes.as_deref())
}

fn validate_prefetch(prefetch: &PrefetchRequest) -> Result<(), ValidationError> {
    let has_mboxes = prefetch.mboxes.as_ref().is_some_and(|m| !m.is_empty());
    let has_views = prefetch.views.as_ref().is_some_and(|v| !v.is_empty());
    if prefetch.page_load.is_none() && !has_mboxes && !has_views {
        return Err(ValidationError::PrefetchFieldsRequired);
    }
    validate_mboxes(prefetch.mboxes.as_deref())
}

/// Names must be present and unique within one section.
fn validate_mboxes(mboxes: Option<&[MboxRequest]>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for (position, mbox) in mboxes.unwrap_or_default().iter().enumerate() {
        let name = mbox.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MboxInvalid(format!("mboxes[{position}]")));
        }
        if !seen.insert(name) {
            return Err(ValidationError::MboxInvalid(name.to_string()));
        }
    }
    Ok(())
}

fn assign_indexes(mboxes: Option<&mut Vec<MboxRequest>>) {
    for (position, mbox) in mboxes.into_iter().flatten().enumerate() {
        if mbox.index.is_none() {
            mbox.index = Some(i32::try_from(position).unwrap_or(i32::MAX));
        }
    }
}
