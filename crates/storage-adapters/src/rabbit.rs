//! RabbitMQ publisher. One connection and channel suffice on the publish
//! side; the topic exchange is declared durable up front so publishes and
//! the consumer agree on topology regardless of start order.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use domains::{AppError, MessagePublisher, QueueMessage, Result};

pub struct RabbitPublisher {
    channel: Channel,
    exchange: String,
}

impl RabbitPublisher {
    pub async fn connect(url: &str, exchange: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(AppError::internal)?;
        let channel = connection.create_channel().await.map_err(AppError::internal)?;
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(AppError::internal)?;
        tracing::info!(exchange, "rabbitmq publisher ready");
        Ok(Self {
            channel,
            exchange: exchange.to_string(),
        })
    }
}

#[async_trait]
impl MessagePublisher for RabbitPublisher {
    async fn publish(&self, message: &QueueMessage) -> Result<()> {
        let payload = serde_json::to_vec(message).map_err(AppError::internal)?;
        self.channel
            .basic_publish(
                &self.exchange,
                message.routing_key(),
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(AppError::internal)?
            .await
            .map(|_| ())
            .map_err(AppError::internal)
    }
}
