pub mod controller;

use crate::{config::app_config, utils::errors::ResultExt};
use lapin::{
    message::Delivery,
    options::{
        BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions,
        QueueDeclareOptions,
    },
    publisher_confirm::PublisherConfirm,
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind,
};
use serde::Serialize;
use std::{thread, time};
use tokio::sync::{mpsc::UnboundedSender, RwLock};
use tokio_stream::StreamExt;
use tracing::{event, Level};

pub trait Routable {
    /// Creates a routing key to publish a routing event with
    fn routing_key(&self) -> String;
}

/// RabbitMQ client for the router service: consumes `routeEmail`/`ingestDsn`
/// jobs from a single queue and publishes routing events (delivery
/// outcomes, spike alerts) to a topic exchange.
pub struct RouterRabbitmq {
    uri: String,
    routing_queue: String,
    consumer_tag: String,
    routing_events_exchange: String,

    consume_channel: RwLock<Option<Channel>>,
    publish_channel: RwLock<Option<Channel>>,
    connection: RwLock<Option<Connection>>,

    delivery_sender: UnboundedSender<Delivery>,
}

impl RouterRabbitmq {
    pub fn new(delivery_sender: UnboundedSender<Delivery>) -> RouterRabbitmq {
        let cfg = app_config();

        RouterRabbitmq {
            uri: cfg.rmq_uri.clone(),
            routing_queue: cfg.rmq_queue.clone(),
            consumer_tag: cfg.rmq_consumer_tag.clone(),
            routing_events_exchange: cfg.rmq_routing_events_exchange.clone(),

            delivery_sender,

            connection: RwLock::new(None),
            consume_channel: RwLock::new(None),
            publish_channel: RwLock::new(None),
        }
    }

    /// Runs the routing queue consumer, attempting to reconnect endlessly if
    /// the RabbitMQ connection is dropped.
    pub async fn start_consumer(&self) {
        let mut reconnect_delay = 2;
        let max_reconnect_delay = 60 * 10;

        loop {
            if let Err(err) = self.connect_and_consume().await {
                eprintln!("[RMQ] connection error: {}", err)
            }

            thread::sleep(time::Duration::from_secs(reconnect_delay));
            println!("[RMQ] reconnecting, next attempt in: {} seconds", reconnect_delay);

            if reconnect_delay < max_reconnect_delay {
                reconnect_delay *= 2
            }
        }
    }

    async fn connect_and_consume(&self) -> Result<(), lapin::Error> {
        let props = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        let connection = Connection::connect(&self.uri, props).await?;
        println!("[RMQ] connected");

        let publish_channel = connection.create_channel().await?;
        let mut consume_channel = connection.create_channel().await?;

        // A spike in inbound volume should not translate into unbounded
        // concurrent routing attempts against the database.
        consume_channel.basic_qos(10, BasicQosOptions::default()).await?;

        let mut consumer = self.declare_exchanges_and_queues(&mut consume_channel).await;

        *self.connection.write().await = Some(connection);
        *self.consume_channel.write().await = Some(consume_channel);
        *self.publish_channel.write().await = Some(publish_channel);

        self.consume_messages_until_error(&mut consumer).await
    }

    async fn declare_exchanges_and_queues(&self, channel: &mut Channel) -> Consumer {
        channel
            .exchange_declare(
                &self.routing_events_exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    passive: false,
                    durable: true,
                    auto_delete: false,
                    internal: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
            .unwrap_or_exit_process();
        println!("[RMQ] routing events exchange declared");

        channel
            .queue_declare(
                &self.routing_queue,
                QueueDeclareOptions {
                    nowait: false,
                    passive: false,
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                },
                FieldTable::default(),
            )
            .await
            .unwrap_or_exit_process();
        println!("[RMQ] routing queue declared");

        let consumer = channel
            .basic_consume(
                &self.routing_queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .unwrap_or_exit_process();
        println!("[RMQ] routing queue consumer started");

        consumer
    }

    async fn consume_messages_until_error(&self, consumer: &mut Consumer) -> Result<(), lapin::Error> {
        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => {
                    self.delivery_sender
                        .send(delivery)
                        .expect("sender channel closed");
                }
                Err(err) => {
                    println!("[RMQ] routing queue consumer error: {}", err);
                    return Err(err);
                }
            }
        }

        println!("[RMQ] routing queue consumer stopped, stream ended");
        Ok(())
    }

    #[tracing::instrument(skip(self, payload, properties))]
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<PublisherConfirm, String> {
        self.publish_channel
            .read()
            .await
            .as_ref()
            .ok_or("failed to publish, RMQ publishing channel is not available")?
            .basic_publish(exchange, routing_key, BasicPublishOptions::default(), payload, properties)
            .await
            .or(Err(String::from("failed to confirm publishing")))
    }

    #[tracing::instrument(skip_all)]
    pub async fn publish_event<T>(&self, event: T) -> Result<PublisherConfirm, String>
    where
        T: Serialize + Routable,
    {
        let routing_key = event.routing_key();
        event!(Level::INFO, routing_key);

        let json = serde_json::to_string(&event).or(Err("failed to serialize event".to_owned()))?;

        self.publish(
            &self.routing_events_exchange,
            routing_key.as_str(),
            json.as_bytes(),
            BasicProperties::default().with_content_type("application/json".into()),
        )
        .await
    }

    /// Publishes `payload` onto the routing queue itself (default
    /// exchange, routing key = queue name) with `operation` as the
    /// message's `type` property, so it dispatches through
    /// [`QueueRouter::handle_delivery`] identically to a job produced by
    /// any other upstream publisher. Used by the HTTP ingestion surface to
    /// hand a DSN off to the same `ingestDsn` handler the queue consumer
    /// uses.
    #[tracing::instrument(skip_all)]
    pub async fn enqueue_job(&self, operation: &str, payload: &[u8]) -> Result<PublisherConfirm, String> {
        event!(Level::INFO, operation);

        self.publish(
            shared::constants::rabbitmq::DEFAULT_EXCHANGE,
            &self.routing_queue,
            payload,
            BasicProperties::default()
                .with_content_type("application/json".into())
                .with_kind(operation.into()),
        )
        .await
    }

    pub async fn shutdown(&self) {
        println!("[RMQ] closing publish channel");
        if let Some(chan) = self.publish_channel.read().await.as_ref() {
            if let Err(chan_close_err) = chan.close(200, "user shutdown").await {
                eprintln!("[RMQ] failed to close channel: {}", chan_close_err)
            }
        }

        println!("[RMQ] closing consume channel");
        if let Some(chan) = self.consume_channel.read().await.as_ref() {
            if let Err(chan_close_err) = chan.close(200, "user shutdown").await {
                eprintln!("[RMQ] failed to close channel: {}", chan_close_err)
            }
        }

        println!("[RMQ] closing connection");
        if let Some(conn) = self.connection.read().await.as_ref() {
            if let Err(conn_close_err) = conn.close(200, "user shutdown").await {
                eprintln!("[RMQ] failed to close connection: {}", conn_close_err)
            }
        }

        *self.connection.write().await = None;
        *self.consume_channel.write().await = None;
        *self.publish_channel.write().await = None;
    }
}
