// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Push Mode
//!
//! This module reads the data file in chunks and publishes each line to the
//! configured exchange, with the queue name as the routing key. The chunk
//! size is a byte-size read hint, not a line count. Any failure while reading
//! or publishing terminates the push run; the error is logged and the process
//! exits through the normal code path.

use crate::{
    channel::{close_amqp_channel, new_amqp_channel},
    config::Config,
    errors::{AmqpError, PushError},
    publisher::{Publish, RabbitMQPublisher},
};
use serde_json::Value;
use std::{
    fs::File,
    io::{BufRead, BufReader},
};
use tracing::{error, info};

/// Runs push mode until the data file is exhausted or the limit is reached.
///
/// The connection is opened at the start of the run and released on every
/// exit path. Failures inside the publishing loop are logged and swallowed;
/// only connection-phase failures are returned.
pub async fn run(cfg: &Config) -> Result<(), AmqpError> {
    let (connection, channel) = new_amqp_channel(cfg).await?;
    let publisher = RabbitMQPublisher::new(channel.clone());

    if let Err(err) = publish_data_file(cfg, &publisher).await {
        error!(
            error = err.to_string(),
            "failure while reading or publishing messages"
        );
    }

    close_amqp_channel(&connection, &channel).await;
    Ok(())
}

async fn publish_data_file<P: Publish>(cfg: &Config, publisher: &P) -> Result<u64, PushError> {
    let file = File::open(&cfg.data_file)?;
    let mut reader = BufReader::new(file);

    publish_lines(cfg, &mut reader, publisher).await
}

/// Publishes the lines of `reader` chunk by chunk.
///
/// Each non-empty line is parsed as JSON and published. A nonzero message
/// limit stops the loop before the line that would exceed it is parsed.
/// Cumulative progress is logged after each chunk.
///
/// # Returns
/// The number of messages published, or the error that aborted the run.
async fn publish_lines<P, R>(cfg: &Config, reader: &mut R, publisher: &P) -> Result<u64, PushError>
where
    P: Publish,
    R: BufRead,
{
    let mut counter: u64 = 0;

    loop {
        let chunk = read_chunk(reader, cfg.chunk_size)?;
        if chunk.is_empty() || (cfg.limit_messages != 0 && counter >= cfg.limit_messages) {
            break;
        }

        let mut limit_reached = false;
        for line in &chunk {
            if cfg.limit_messages != 0 && counter >= cfg.limit_messages {
                limit_reached = true;
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: Value = serde_json::from_str(line)?;
            let body = serde_json::to_vec(&message)?;

            publisher
                .publish(cfg.exchange.as_str(), &cfg.queue, &body)
                .await?;
            counter += 1;
        }

        info!(
            queue = %cfg.queue,
            host = %cfg.host,
            "published {counter} messages"
        );

        if limit_reached {
            break;
        }
    }

    Ok(counter)
}

/// Reads whole lines until the cumulative byte count reaches `size_hint`.
///
/// The hint bounds bytes, not lines, so a chunk may carry more or fewer
/// messages than expected for a given line length. A hint of zero reads the
/// remainder of the input as one chunk. An empty result means end of input.
fn read_chunk<R: BufRead>(reader: &mut R, size_hint: usize) -> std::io::Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut bytes = 0;

    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }

        bytes += read;
        lines.push(line);

        if size_hint != 0 && bytes >= size_hint {
            break;
        }
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Exchange, Mode};
    use crate::publisher::MockPublish;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn push_config(limit: u64, chunk_size: usize) -> Config {
        Config {
            username: "guest".to_owned(),
            password: "guest".to_owned(),
            host: "localhost".to_owned(),
            port: 5672,
            vhost: "/".to_owned(),
            exchange: Exchange::Default,
            queue: "events".to_owned(),
            data_file: PathBuf::from("in.jsonl"),
            mode: Mode::Push,
            limit_messages: limit,
            chunk_size,
        }
    }

    #[test]
    fn chunks_are_bounded_by_bytes_not_lines() {
        let mut reader = Cursor::new("{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n");

        let chunk = read_chunk(&mut reader, 10).unwrap();
        assert_eq!(chunk, vec!["{\"a\":1}\n", "{\"a\":2}\n"]);

        let chunk = read_chunk(&mut reader, 10).unwrap();
        assert_eq!(chunk, vec!["{\"a\":3}\n"]);

        assert!(read_chunk(&mut reader, 10).unwrap().is_empty());
    }

    #[test]
    fn zero_hint_reads_the_remainder_as_one_chunk() {
        let mut reader = Cursor::new("{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n");

        let chunk = read_chunk(&mut reader, 0).unwrap();
        assert_eq!(chunk.len(), 3);
    }

    #[tokio::test]
    async fn publishes_until_the_limit_is_reached() {
        let cfg = push_config(2, 100);
        let mut reader = Cursor::new("{\"a\": 1}\n{\"a\": 2}\n{\"a\": 3}\n");

        let mut publisher = MockPublish::new();
        publisher
            .expect_publish()
            .withf(|exchange, key, body| {
                exchange.is_empty() && key == "events" && body == br#"{"a":1}"#.as_slice()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        publisher
            .expect_publish()
            .withf(|exchange, key, body| {
                exchange.is_empty() && key == "events" && body == br#"{"a":2}"#.as_slice()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let published = publish_lines(&cfg, &mut reader, &publisher).await.unwrap();
        assert_eq!(published, 2);
    }

    #[tokio::test]
    async fn publishes_every_line_across_multiple_chunks() {
        let cfg = push_config(0, 10);
        let input: String = (1..=7).map(|i| format!("{{\"a\":{i}}}\n")).collect();
        let mut reader = Cursor::new(input);

        let mut publisher = MockPublish::new();
        publisher
            .expect_publish()
            .times(7)
            .returning(|_, _, _| Ok(()));

        let published = publish_lines(&cfg, &mut reader, &publisher).await.unwrap();
        assert_eq!(published, 7);
    }

    #[tokio::test]
    async fn empty_lines_are_skipped() {
        let cfg = push_config(0, 100);
        let mut reader = Cursor::new("{\"a\":1}\n\n{\"a\":2}\n");

        let mut publisher = MockPublish::new();
        publisher
            .expect_publish()
            .times(2)
            .returning(|_, _, _| Ok(()));

        let published = publish_lines(&cfg, &mut reader, &publisher).await.unwrap();
        assert_eq!(published, 2);
    }

    #[tokio::test]
    async fn a_malformed_line_aborts_the_run() {
        let cfg = push_config(0, 100);
        let mut reader = Cursor::new("{\"a\":1}\nnot json\n{\"a\":3}\n");

        let mut publisher = MockPublish::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let err = publish_lines(&cfg, &mut reader, &publisher)
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Parse(_)));
    }

    #[tokio::test]
    async fn a_publish_failure_aborts_the_run() {
        let cfg = push_config(0, 100);
        let mut reader = Cursor::new("{\"a\":1}\n{\"a\":2}\n");

        let mut publisher = MockPublish::new();
        publisher
            .expect_publish()
            .times(1)
            .returning(|_, _, _| Err(AmqpError::PublishingError));

        let err = publish_lines(&cfg, &mut reader, &publisher)
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Publish(AmqpError::PublishingError)));
    }

    #[tokio::test]
    async fn a_missing_data_file_is_an_io_error() {
        let mut cfg = push_config(0, 100);
        cfg.data_file = PathBuf::from("no-such-data-file.jsonl");

        let publisher = MockPublish::new();

        let err = publish_data_file(&cfg, &publisher).await.unwrap_err();
        assert!(matches!(err, PushError::Io(_)));
    }
}
