//! Local decisioning engine.
//!
//! Turns a delivery request into offers without a network round trip:
//! the request is validated, a matching context is derived from it, and the
//! rules of the current artifact are evaluated in order. Matches produce
//! notifications that are delivered in the background.

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod logic;
pub mod notifications;
pub mod request;
pub mod resolver;

pub use config::EngineConfig;
pub use context::{create_decisioning_context, DecisioningContext};
pub use engine::{DecisioningEngine, EngineState, GetOffersOptions, RemoteDependency};
pub use error::{EngineError, ErrorKind, Result};
pub use notifications::{NotificationSender, SendError};
pub use request::{valid_delivery_request, NormalizedRequest};
pub use resolver::{resolve, Resolution};
