// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation and teardown of the AMQP connection and
//! channel. It establishes a single connection to the RabbitMQ server under a
//! short connect timeout and creates one channel on it; both are held for the
//! lifetime of a dump or push run and released on every exit path.

use crate::{config::Config, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error};

/// Socket-level timeout for the initial connection attempt, in seconds
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// AMQP reply code for a normal close
const REPLY_SUCCESS: u16 = 200;

/// Creates a new AMQP channel for communication with RabbitMQ.
///
/// This function establishes a connection to RabbitMQ using the connection
/// parameters of the given configuration, then creates a channel on that
/// connection. Both the connection and channel are wrapped in Arc.
///
/// The connection attempt is bounded by [`CONNECT_TIMEOUT_SECS`]; an attempt
/// that does not complete in time fails with
/// [`AmqpError::ConnectionTimeout`].
///
/// # Parameters
/// * `cfg` - Configuration containing RabbitMQ connection details like host, port, credentials, etc.
///
/// # Returns
/// * `Result<(Arc<Connection>, Arc<Channel>), AmqpError>` -
///   A tuple containing the connection and channel on success, or an error on failure.
pub async fn new_amqp_channel(cfg: &Config) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(env!("CARGO_PKG_NAME").to_owned()));

    let uri = cfg.amqp_uri();

    let connect = Connection::connect(&uri, options);
    let conn = match tokio::time::timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), connect).await
    {
        Err(_) => {
            error!("connection attempt timed out after {CONNECT_TIMEOUT_SECS} seconds");
            Err(AmqpError::ConnectionTimeout(CONNECT_TIMEOUT_SECS))
        }
        Ok(Err(err)) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError)
        }
        Ok(Ok(c)) => Ok(c),
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError)
        }
    }
}

/// Closes the channel and then the connection.
///
/// Failures are logged and swallowed so the teardown can run on every exit
/// path, including interruption.
pub async fn close_amqp_channel(connection: &Connection, channel: &Channel) {
    debug!("closing amqp channel...");
    if let Err(err) = channel.close(REPLY_SUCCESS, "bye").await {
        error!(error = err.to_string(), "error to close the channel");
    }

    if let Err(err) = connection.close(REPLY_SUCCESS, "bye").await {
        error!(error = err.to_string(), "error to close the connection");
    }
    debug!("amqp connection closed");
}
