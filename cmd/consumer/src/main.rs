//! # relay consumer
//!
//! Drains the notification queue and re-posts each delivery to the server's
//! `/internal/messages` endpoint. Delivery outcome maps to the response:
//! 2xx acks, 4xx acks (a bad message never improves on retry), 5xx and
//! transport errors nack with requeue.

use anyhow::Context as _;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties, ExchangeKind};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use configs::Settings;

const PREFETCH: u16 = 10;

#[derive(Serialize)]
struct MessagePayload {
    routing_key: String,
    body: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::load().context("loading configuration")?;

    let connection = Connection::connect(&settings.rabbitmq.url, ConnectionProperties::default())
        .await
        .context("connecting to rabbitmq")?;
    let channel = connection.create_channel().await?;
    channel.basic_qos(PREFETCH, BasicQosOptions::default()).await?;

    channel
        .exchange_declare(
            &settings.rabbitmq.exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_declare(
            &settings.consumer.queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_bind(
            &settings.consumer.queue,
            &settings.rabbitmq.exchange,
            &settings.consumer.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut deliveries = channel
        .basic_consume(
            &settings.consumer.queue,
            "pinboard-consumer",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(
        exchange = %settings.rabbitmq.exchange,
        queue = %settings.consumer.queue,
        routing_key = %settings.consumer.routing_key,
        "consumer started"
    );

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let endpoint = format!("{}/internal/messages", settings.consumer.server_url);

    while let Some(delivery) = deliveries.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(err) => {
                error!(%err, "delivery stream error");
                continue;
            }
        };
        if let Err(err) = relay(&client, &endpoint, delivery).await {
            error!(%err, "relaying delivery failed");
        }
    }

    info!("consumer stopped");
    Ok(())
}

async fn relay(client: &reqwest::Client, endpoint: &str, delivery: Delivery) -> anyhow::Result<()> {
    let routing_key = delivery.routing_key.to_string();
    let payload = MessagePayload {
        routing_key: routing_key.clone(),
        body: String::from_utf8_lossy(&delivery.data).into_owned(),
    };

    let response = client.post(endpoint).json(&payload).send().await;

    match response {
        Ok(response) if response.status().is_server_error() => {
            warn!(%routing_key, status = %response.status(), "server error, requeueing");
            delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..BasicNackOptions::default()
                })
                .await?;
        }
        Ok(response) => {
            if response.status().is_client_error() {
                warn!(%routing_key, status = %response.status(), "message rejected, dropping");
            } else {
                info!(%routing_key, "message processed");
            }
            delivery.ack(BasicAckOptions::default()).await?;
        }
        Err(err) => {
            warn!(%routing_key, %err, "server unreachable, requeueing");
            delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..BasicNackOptions::default()
                })
                .await?;
        }
    }
    Ok(())
}
