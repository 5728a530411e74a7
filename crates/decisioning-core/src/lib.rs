//! Shared data model for local decisioning: artifacts, delivery
//! requests/responses, notifications and the error taxonomy.

pub mod artifact;
pub mod delivery;
pub mod errors;
pub mod messages;
pub mod notification;

pub use artifact::{
    match_major_version, Consequence, DecisioningArtifact, Rule, RuleMeta,
    SUPPORTED_ARTIFACT_MAJOR_VERSION,
};
pub use delivery::{DeliveryRequest, DeliveryResponse};
pub use errors::{FetchError, ValidationError};
pub use notification::{Notification, NotificationBatch};
