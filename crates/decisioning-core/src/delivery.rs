//! Delivery request and response shapes.
//!
//! These mirror the remote delivery API so that a locally evaluated response
//! is indistinguishable from one returned by the decision service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::{Metric, OfferOption};

/// Request/response key-value parameters.
pub type Parameters = BTreeMap<String, String>;

/// Inbound decision request as supplied by the caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impression_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<VisitorId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<DeliveryContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execute: Option<ExecuteRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefetch: Option<PrefetchRequest>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitorId {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tnt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub third_party_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketing_cloud_visitor_id: Option<String>,
}

/// Raw material for the decisioning context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Accept-Language style locale supplied by the host, e.g. `en-US,en;q=0.9`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_offset_in_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beacon: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referring_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecuteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_load: Option<RequestDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mboxes: Option<Vec<MboxRequest>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrefetchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<Vec<ViewRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_load: Option<RequestDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mboxes: Option<Vec<MboxRequest>>,
}

/// Parameters shared by page-load and view requests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestDetails {
    #[serde(skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
    #[serde(skip_serializing_if = "Parameters::is_empty")]
    pub profile_parameters: Parameters,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MboxRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i32>,
    #[serde(skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
    #[serde(skip_serializing_if = "Parameters::is_empty")]
    pub profile_parameters: Parameters,
}

impl MboxRequest {
    pub fn new(name: impl Into<String>, index: i32) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
    #[serde(skip_serializing_if = "Parameters::is_empty")]
    pub profile_parameters: Parameters,
}

/// Aggregated decision response, same shape as a remote delivery call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub status: u16,
    pub request_id: String,
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<VisitorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<ExecuteResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch: Option<PrefetchResponse>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecuteResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_load: Option<PageLoadResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mboxes: Vec<MboxResponse>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrefetchResponse {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub views: Vec<ViewResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_load: Option<PageLoadResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mboxes: Vec<MboxResponse>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MboxResponse {
    pub index: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OfferOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
}

impl MboxResponse {
    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.metrics.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewResponse {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OfferOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageLoadResponse {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OfferOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<Metric>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_camel_case_wire_format() {
        let request: DeliveryRequest = serde_json::from_value(json!({
            "context": {
                "channel": "web",
                "address": {"url": "http://local-target-test:8080/", "referringUrl": null},
                "userAgent": "Mozilla/5.0",
                "beacon": false
            },
            "prefetch": {"mboxes": [{"name": "mbox-something", "index": 1}]}
        }))
        .unwrap();

        let context = request.context.unwrap();
        assert_eq!(context.user_agent.as_deref(), Some("Mozilla/5.0"));
        let address = context.address.unwrap();
        assert!(address.referring_url.is_none());
        let mboxes = request.prefetch.unwrap().mboxes.unwrap();
        assert_eq!(mboxes[0], MboxRequest::new("mbox-something", 1));
    }

    #[test]
    fn empty_sections_are_omitted_from_response_json() {
        let response = DeliveryResponse {
            status: 200,
            request_id: "req-1".into(),
            client: "client".into(),
            prefetch: Some(PrefetchResponse {
                mboxes: vec![MboxResponse {
                    index: 1,
                    name: "box".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "status": 200,
                "requestId": "req-1",
                "client": "client",
                "prefetch": {"mboxes": [{"index": 1, "name": "box"}]}
            })
        );
    }
}
