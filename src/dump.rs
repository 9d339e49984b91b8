// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Dump Mode
//!
//! This module consumes messages from the configured queue and appends each
//! one to the data file as a JSON line. Acknowledgment is manual: every
//! message is acked after it was recorded, except the one that reaches a
//! configured message limit, which stops the consumer instead. Per-message
//! failures are logged and the message still counts toward the limit.

use crate::{
    channel::{close_amqp_channel, new_amqp_channel},
    config::Config,
    errors::AmqpError,
};
use futures_util::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions},
    types::FieldTable,
    Channel,
};
use serde_json::Value;
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::signal;
use tracing::{error, info};

/// Consumer tag announced to the broker
const CONSUMER_TAG: &str = "rmq-tool-dump";

/// Runs dump mode until the limit is reached or the process is interrupted.
///
/// The connection is opened at the start of the run and released on every
/// exit path.
///
/// # Returns
/// Ok(()) on a normal stop or AmqpError when the connection phase fails
pub async fn run(cfg: &Config) -> Result<(), AmqpError> {
    let (connection, channel) = new_amqp_channel(cfg).await?;

    let result = consume_queue(cfg, &channel).await;

    close_amqp_channel(&connection, &channel).await;
    result
}

async fn consume_queue(cfg: &Config, channel: &Channel) -> Result<(), AmqpError> {
    let mut consumer = match channel
        .basic_consume(
            &cfg.queue,
            CONSUMER_TAG,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
    {
        Ok(consumer) => consumer,
        Err(err) => {
            error!(error = err.to_string(), "error to create the consumer");
            return Err(AmqpError::ConsumerDeclarationError(cfg.queue.clone()));
        }
    };

    let mut sink = DumpSink::new(&cfg.data_file, cfg.limit_messages);

    info!("waiting for messages, press CTRL+C to exit");

    let interrupt = signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                info!("interrupted by the user");
                break;
            }
            next = consumer.next() => {
                let Some(result) = next else {
                    error!("consumer stream closed by the broker");
                    break;
                };

                let delivery = match result {
                    Ok(delivery) => delivery,
                    Err(err) => {
                        error!(error = err.to_string(), "errors consume msg");
                        continue;
                    }
                };

                match sink.record(&delivery.data) {
                    AckAction::Ack => {
                        if let Err(err) = delivery.ack(BasicAckOptions { multiple: false }).await {
                            error!(error = err.to_string(), "error whiling ack msg");
                        }
                    }
                    AckAction::Stop => {
                        info!("received {} messages, stopping", sink.counter());
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// What to do with a delivery after it was processed.
#[derive(Debug, PartialEq, Eq)]
enum AckAction {
    /// Acknowledge the delivery and keep consuming
    Ack,
    /// Stop consuming without acknowledging the delivery
    Stop,
}

/// Per-run dump context: the data file, the message counter and the limit.
struct DumpSink {
    data_file: PathBuf,
    limit: u64,
    counter: u64,
}

impl DumpSink {
    fn new(data_file: &Path, limit: u64) -> DumpSink {
        DumpSink {
            data_file: data_file.to_owned(),
            limit,
            counter: 0,
        }
    }

    fn counter(&self) -> u64 {
        self.counter
    }

    /// Processes one delivered message body.
    ///
    /// The body is parsed as JSON and appended to the data file as one line.
    /// Parse and write failures are logged, and the message still counts
    /// toward the limit. The message that reaches the limit is not
    /// acknowledged; the consumer stops instead.
    fn record(&mut self, body: &[u8]) -> AckAction {
        if let Err(err) = self.append_line(body) {
            error!(
                error = err.to_string(),
                "failure while processing the message"
            );
        }

        self.counter += 1;
        info!("recorded {} messages", self.counter);

        if self.limit != 0 && self.counter >= self.limit {
            AckAction::Stop
        } else {
            AckAction::Ack
        }
    }

    fn append_line(&self, body: &[u8]) -> Result<(), RecordError> {
        let message: Value = serde_json::from_slice(body)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.data_file)?;

        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        file.write_all(&line)?;

        Ok(())
    }
}

#[derive(Error, Debug)]
enum RecordError {
    #[error("not a JSON message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failure to write the data file: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn records_every_message_without_a_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut sink = DumpSink::new(&path, 0);

        for i in 1..=3 {
            let body = format!(r#"{{"a": {i}}}"#);
            assert_eq!(sink.record(body.as_bytes()), AckAction::Ack);
        }

        assert_eq!(sink.counter(), 3);
        assert_eq!(lines(&path), vec![r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#]);
    }

    #[test]
    fn stops_without_acking_the_message_that_reaches_the_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut sink = DumpSink::new(&path, 3);

        assert_eq!(sink.record(br#"{"a":1}"#), AckAction::Ack);
        assert_eq!(sink.record(br#"{"a":2}"#), AckAction::Ack);
        assert_eq!(sink.record(br#"{"a":3}"#), AckAction::Stop);

        assert_eq!(sink.counter(), 3);
        assert_eq!(lines(&path).len(), 3);
    }

    #[test]
    fn malformed_bodies_are_counted_but_not_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut sink = DumpSink::new(&path, 2);

        assert_eq!(sink.record(b"not json"), AckAction::Ack);
        assert_eq!(sink.record(br#"{"a":1}"#), AckAction::Stop);

        assert_eq!(sink.counter(), 2);
        assert_eq!(lines(&path), vec![r#"{"a":1}"#]);
    }

    #[test]
    fn non_ascii_text_is_preserved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let mut sink = DumpSink::new(&path, 0);

        sink.record("{\"msg\": \"привет\"}".as_bytes());

        assert_eq!(lines(&path), vec![r#"{"msg":"привет"}"#]);
    }

    #[test]
    fn repeated_runs_append_without_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        let mut first = DumpSink::new(&path, 0);
        first.record(br#"{"run":1}"#);
        drop(first);

        let mut second = DumpSink::new(&path, 0);
        second.record(br#"{"run":2}"#);

        assert_eq!(lines(&path), vec![r#"{"run":1}"#, r#"{"run":2}"#]);
    }
}
