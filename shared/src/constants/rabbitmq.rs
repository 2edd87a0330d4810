/// RabbitMQ default exchange (yes, its a empty string)
pub static DEFAULT_EXCHANGE: &str = "";

/// RabbitMQ queue the router service consumes, carrying `RouteEmailJob` messages
pub static INBOUND_ROUTING_QUEUE: &str = "inbound_routing";

/// RabbitMQ exchange routing events (delivery outcomes, spike alerts) are published to
pub static ROUTING_EVENTS_EXCHANGE: &str = "routing_events";

/// RPC operation carried on a `inbound_routing` delivery to route a single email
pub static OP_ROUTE_EMAIL: &str = "routeEmail";

/// RPC operation carried on a `inbound_routing` delivery to record a DSN
pub static OP_INGEST_DSN: &str = "ingestDsn";
