pub mod catalog;
pub mod error;
pub mod lifecycle;
pub mod service;
pub mod stripe;
pub mod webhook;

pub use catalog::PriceCatalog;
pub use error::{BillingError, Result};
pub use lifecycle::{plan_transition, PlanTransition, SubscriptionState};
pub use service::{BillingService, WebhookOutcome};
pub use stripe::{PortalSession, StripeClient, StripeGateway};
pub use webhook::{verify_signature, StripeEvent, WebhookEvent};
