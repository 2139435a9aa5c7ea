/// Wayfare - Purchase & Entitlement Ledger
///
/// The commerce core of the Wayfare platform: converts payment-gateway
/// transactions into durable grants of content access, keeps the
/// creator/platform revenue split consistent, and handles refunds,
/// reviews, and email-bound access keys.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod context;
pub mod db;
pub mod directory;
pub mod entitlement;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod mailer;
pub mod metrics;
pub mod refunds;
pub mod reviews;
pub mod server;
pub mod webhooks;
