//! Decision Resolver: matches a normalized request against one artifact
//! snapshot.
//!
//! Resolution is a pure function of its inputs. Notifications are returned
//! alongside the response for the caller to dispatch.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use decisioning_core::delivery::{
    ExecuteResponse, MboxRequest, MboxResponse, PageLoadResponse, Parameters, PrefetchResponse,
    RequestDetails, ViewRequest, ViewResponse,
};
use decisioning_core::notification::{
    Notification, NotificationMbox, NotificationType, NotificationView,
};
use decisioning_core::{
    Consequence, DecisioningArtifact, DeliveryResponse, NotificationBatch, Rule,
};

use crate::context::DecisioningContext;
use crate::logic;
use crate::request::NormalizedRequest;

/// Response plus the notifications its matches produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub response: DeliveryResponse,
    pub notifications: NotificationBatch,
}

/// Target a notification refers to.
enum Target<'a> {
    Mbox(&'a str),
    View(&'a str, Option<&'a str>),
}

pub fn resolve(
    client: &str,
    request: &NormalizedRequest,
    context: &DecisioningContext,
    artifact: &DecisioningArtifact,
    session_id: Option<&str>,
) -> Resolution {
    let mut resolver = Resolver {
        artifact,
        context,
        impression_id: request.request.impression_id.clone(),
        timestamp: Utc::now().timestamp_millis(),
        notifications: Vec::new(),
    };

    let prefetch = request.prefetch().map(|prefetch| PrefetchResponse {
        page_load: prefetch
            .page_load
            .as_ref()
            .map(|details| resolver.page_load(details)),
        views: prefetch
            .views
            .as_deref()
            .map(|views| resolver.views(views))
            .unwrap_or_default(),
        mboxes: resolver.mboxes(prefetch.mboxes.as_deref()),
    });

    let execute = request.execute().map(|execute| ExecuteResponse {
        page_load: execute
            .page_load
            .as_ref()
            .map(|details| resolver.page_load(details)),
        mboxes: resolver.mboxes(execute.mboxes.as_deref()),
    });

    let response = DeliveryResponse {
        status: 200,
        request_id: request.request_id.clone(),
        client: client.to_string(),
        id: request.request.id.clone(),
        edge_host: None,
        execute,
        prefetch,
    };

    let notifications = NotificationBatch {
        client: client.to_string(),
        request_id: request.request_id.clone(),
        session_id: session_id.map(str::to_string),
        location_hint: request.location_hint.clone(),
        id: request.request.id.clone(),
        notifications: resolver.notifications,
    };

    Resolution {
        response,
        notifications,
    }
}

struct Resolver<'a> {
    artifact: &'a DecisioningArtifact,
    context: &'a DecisioningContext,
    impression_id: Option<String>,
    timestamp: i64,
    notifications: Vec<Notification>,
}

impl Resolver<'_> {
    fn mboxes(&mut self, mboxes: Option<&[MboxRequest]>) -> Vec<MboxResponse> {
        mboxes
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(position, mbox)| self.mbox(position, mbox))
            .collect()
    }

    fn mbox(&mut self, position: usize, mbox: &MboxRequest) -> MboxResponse {
        let index = mbox
            .index
            .unwrap_or_else(|| i32::try_from(position).unwrap_or(i32::MAX));
        let mut response = MboxResponse {
            index,
            name: mbox.name.clone(),
            ..Default::default()
        };

        let artifact = self.artifact;
        if let Some(rule) = self.first_match(artifact.mbox_rules(&mbox.name), &mbox.parameters) {
            self.notify(rule, Target::Mbox(&mbox.name));
            response.options = rule.consequence.options.clone();
            response.metrics = rule.consequence.metrics.clone();
        }
        response
    }

    /// Page load is served from the global mbox rules.
    fn page_load(&mut self, details: &RequestDetails) -> PageLoadResponse {
        let artifact = self.artifact;
        let mut response = PageLoadResponse::default();
        if let Some(rule) = self.first_match(artifact.global_mbox_rules(), &details.parameters) {
            self.notify(rule, Target::Mbox(&artifact.meta.global_mbox));
            response.options = rule.consequence.options.clone();
            response.metrics = rule.consequence.metrics.clone();
        }
        response
    }

    /// A named view always gets a response, empty when nothing matches. An
    /// unnamed request selects every view in name order and returns only the
    /// matched ones.
    fn views(&mut self, requests: &[ViewRequest]) -> Vec<ViewResponse> {
        let artifact = self.artifact;
        let mut responses = Vec::new();
        for request in requests {
            let key = request.key.as_deref();
            match request.name.as_deref() {
                Some(name) => {
                    let response = self
                        .view(name, key, &request.parameters)
                        .unwrap_or_else(|| ViewResponse {
                            name: name.to_string(),
                            key: key.map(str::to_string),
                            ..Default::default()
                        });
                    responses.push(response);
                }
                None => {
                    for name in artifact.rules.views.keys() {
                        responses.extend(self.view(name, key, &request.parameters));
                    }
                }
            }
        }
        responses
    }

    fn view(
        &mut self,
        name: &str,
        key: Option<&str>,
        parameters: &Parameters,
    ) -> Option<ViewResponse> {
        let artifact = self.artifact;
        let rule = self.first_match(artifact.view_rules(name), parameters)?;
        self.notify(rule, Target::View(name, key));
        Some(view_response(name, key.map(str::to_string), &rule.consequence))
    }

    /// First rule, in artifact order, whose condition holds.
    fn first_match<'r>(&self, rules: &'r [Rule], parameters: &Parameters) -> Option<&'r Rule> {
        if rules.is_empty() {
            return None;
        }
        let data = self.context.rule_data(parameters);
        rules.iter().find(|rule| {
            if rule.condition.is_null() {
                return true;
            }
            logic::matches(&rule.condition, &data).unwrap_or_else(|e| {
                debug!(
                    activity_id = rule.meta.activity_id,
                    error = %e,
                    "rule condition could not be evaluated, treating as no match"
                );
                false
            })
        })
    }

    fn notify(&mut self, rule: &Rule, target: Target<'_>) {
        let (mbox, view) = match target {
            Target::Mbox(name) => (
                Some(NotificationMbox {
                    name: name.to_string(),
                }),
                None,
            ),
            Target::View(name, key) => (
                None,
                Some(NotificationView {
                    name: name.to_string(),
                    key: key.map(str::to_string),
                }),
            ),
        };
        self.notifications.push(Notification {
            id: Uuid::now_v7().to_string(),
            notification_type: NotificationType::Display,
            timestamp: self.timestamp,
            impression_id: self.impression_id.clone(),
            tokens: rule.consequence.event_tokens(),
            mbox,
            view,
            activity_id: rule.meta.activity_id,
            experience_id: rule.meta.experience_id,
        });
    }
}

fn view_response(name: &str, key: Option<String>, consequence: &Consequence) -> ViewResponse {
    ViewResponse {
        name: name.to_string(),
        key,
        options: consequence.options.clone(),
        metrics: consequence.metrics.clone(),
    }
}
