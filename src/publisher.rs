// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! This module provides functionality for publishing messages to RabbitMQ.
//! Publishing is fire-and-forget: no delivery confirmation is requested or
//! awaited, matching the push loop's best-effort contract.

use crate::errors::AmqpError;
use async_trait::async_trait;
use lapin::{
    options::BasicPublishOptions, types::ShortString, BasicProperties, Channel,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Publishing seam used by the push loop.
///
/// The push loop only needs a single primitive, which keeps it testable
/// without a broker.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Publish: Send + Sync {
    /// Sends one message to the given exchange and routing key.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), AmqpError>;
}

/// RabbitMQ implementation of the [`Publish`] trait.
///
/// Messages are published with a JSON content type and a fresh message id.
pub struct RabbitMQPublisher {
    channel: Arc<Channel>,
}

impl RabbitMQPublisher {
    /// Creates a new RabbitMQ publisher over an open channel.
    pub fn new(channel: Arc<Channel>) -> RabbitMQPublisher {
        RabbitMQPublisher { channel }
    }
}

#[async_trait]
impl Publish for RabbitMQPublisher {
    /// Publishes a message to RabbitMQ.
    ///
    /// # Parameters
    /// * `exchange` - Exchange to publish to; empty for the default exchange
    /// * `routing_key` - Routing key; the queue name when using the default exchange
    /// * `body` - Serialized message payload
    ///
    /// # Returns
    /// Ok(()) on success or AmqpError on failure
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
    ) -> Result<(), AmqpError> {
        match self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                body,
                BasicProperties::default()
                    .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string())),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(AmqpError::PublishingError)
            }
            _ => Ok(()),
        }
    }
}
