pub use super::blocked_email::Entity as BlockedEmail;
pub use super::email_address::Entity as EmailAddress;
pub use super::email_delivery_event::Entity as EmailDeliveryEvent;
pub use super::email_domain::Entity as EmailDomain;
pub use super::email_thread::Entity as EmailThread;
pub use super::endpoint::Entity as Endpoint;
pub use super::endpoint_delivery::Entity as EndpointDelivery;
pub use super::guard_rule::Entity as GuardRule;
pub use super::sent_email::Entity as SentEmail;
pub use super::structured_email::Entity as StructuredEmail;
pub use super::webhook::Entity as Webhook;
