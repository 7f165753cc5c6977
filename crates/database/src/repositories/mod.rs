pub mod accounts;
pub mod backup_codes;
pub mod billing_events;
pub mod invitations;
pub mod members;
pub mod sessions;
pub mod subscriptions;
pub mod tenants;
pub mod users;
