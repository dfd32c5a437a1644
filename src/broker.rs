/// MQTT publishing.
///
/// A batch goes out over a single broker connection: connect, queue every
/// message, disconnect, and drive the event loop until the disconnect has
/// been written. The caller only needs pass/fail, so any failure collapses to
/// the `MQTT ERROR` status in the run summary; the detail is logged.

use crate::config::MqttConfig;
use crate::payload::PublishBatch;
use rumqttc::{Client, ConnectionError, Event, MqttOptions, Outgoing, QoS, RecvTimeoutError};
use std::fmt;
use std::time::{Duration, Instant};

/// How long a whole batch may take, connection included.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Errors and status
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("failed to queue message for {topic}: {source}")]
    Queue {
        topic: String,
        source: rumqttc::ClientError,
    },

    #[error("failed to queue disconnect: {0}")]
    Disconnect(rumqttc::ClientError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("timed out after {0:?} waiting for the broker")]
    Timeout(Duration),

    #[error("connection closed before the batch was sent")]
    Closed,
}

/// Aggregate result of publishing a batch, as shown in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Ok,
    BrokerError,
}

impl PublishStatus {
    pub fn from_result(result: &Result<(), BrokerError>) -> Self {
        match result {
            Ok(()) => PublishStatus::Ok,
            Err(_) => PublishStatus::BrokerError,
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStatus::Ok => write!(f, "OK"),
            PublishStatus::BrokerError => write!(f, "MQTT ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Sends a whole batch to a broker in one operation.
pub trait Publisher {
    fn publish(&self, batch: &PublishBatch) -> Result<(), BrokerError>;
}

/// MQTT 3.1.1 publisher using username/password authentication.
pub struct MqttPublisher {
    host: String,
    port: u16,
    username: String,
    password: String,
    timeout: Duration,
}

impl MqttPublisher {
    pub fn new(config: &MqttConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn options(&self) -> MqttOptions {
        let client_id = format!("bwcheck-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options
            .set_credentials(self.username.clone(), self.password.clone())
            .set_keep_alive(Duration::from_secs(10));
        options
    }
}

impl Publisher for MqttPublisher {
    fn publish(&self, batch: &PublishBatch) -> Result<(), BrokerError> {
        log::debug!(
            "Publishing {} messages to {}:{}",
            batch.len(),
            self.host,
            self.port
        );

        // Room for every publish plus the disconnect.
        let (client, mut connection) = Client::new(self.options(), batch.len() + 1);

        for message in batch.iter() {
            client
                .publish(
                    message.topic.as_str(),
                    qos(message.qos),
                    message.retain,
                    message.payload.as_bytes(),
                )
                .map_err(|source| BrokerError::Queue {
                    topic: message.topic.clone(),
                    source,
                })?;
        }
        client.disconnect().map_err(BrokerError::Disconnect)?;

        let deadline = Instant::now() + self.timeout;
        let mut sent = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BrokerError::Timeout(self.timeout));
            }

            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Outgoing(Outgoing::Publish(_)))) => sent += 1,
                Ok(Ok(Event::Outgoing(Outgoing::Disconnect))) => break,
                Ok(Ok(event)) => log::trace!("MQTT event: {:?}", event),
                Ok(Err(e)) => return Err(BrokerError::Connection(e)),
                Err(RecvTimeoutError::Timeout) => return Err(BrokerError::Timeout(self.timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(BrokerError::Closed),
            }
        }

        log::debug!("MQTT messages sent ({} of {})", sent, batch.len());
        if sent < batch.len() {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}

fn qos(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}
