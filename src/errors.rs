// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types
//!
//! This module provides the error types for the tool. `AmqpError` covers the
//! RabbitMQ side (connection, channel, consumer and publishing failures),
//! `ConfigError` covers loading and validating the configuration file, and
//! `PushError` covers the failures that abort a push run.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Each variant provides specific context about what operation failed. The
/// details of the underlying failure are logged at the site where it is
/// detected.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// The broker did not answer within the connect timeout
    #[error("connection timed out after {0} seconds")]
    ConnectionTimeout(u64),

    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring a consumer on the configured queue
    #[error("failure to declare a consumer on queue `{0}`")]
    ConsumerDeclarationError(String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,
}

/// Represents errors that can occur while loading the configuration file.
///
/// The `Display` implementation carries the specific violation so the binary
/// can print it before terminating.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file is missing or unreadable
    #[error("failure to read the configuration file `{path}`: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The configuration file is not a valid JSON object of the expected shape
    #[error("failure to parse the configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required field is absent or empty
    #[error("`{0}` is required and must be a non-empty string")]
    MissingField(&'static str),

    /// A field holds a value outside its enumerated set
    #[error("`{field}` must be one of {allowed}, got `{value}`")]
    InvalidValue {
        field: &'static str,
        value: String,
        allowed: &'static str,
    },

    /// An integer field is outside its allowed range
    #[error("`{field}` must be an integer between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
    },
}

/// Represents errors that abort a push run.
///
/// Any of these terminates the remaining batch; the caller logs the error
/// and the process still exits through the normal code path.
#[derive(Error, Debug)]
pub enum PushError {
    /// Error reading the data file
    #[error("failure to read the data file: {0}")]
    Io(#[from] std::io::Error),

    /// A line of the data file is not valid JSON
    #[error("failure to parse a line of the data file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The broker rejected or dropped a publish
    #[error(transparent)]
    Publish(#[from] AmqpError),
}
