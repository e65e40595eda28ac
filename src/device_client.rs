use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::cipher;
use crate::device_schema::HardwareVariant;
use crate::error::Hs110Error;
use crate::retry_budget::RetryBudget;
use crate::sample::{Sample, SampleReader};

/// TCP port the HS110 listens on, for both hardware revisions.
pub const DEFAULT_DEVICE_PORT: u16 = 9999;

/// Applied separately to connect, send and receive.
pub const IO_TIMEOUT: Duration = Duration::from_secs(2);

/// A realtime reply fits comfortably in one read of this size.
pub const REPLY_BUFFER_SIZE: usize = 2048;

const REALTIME_COMMAND: &str = r#"{"emeter":{"get_realtime":{}}}"#;

/// What a single non-fatal `refresh` did.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new sample replaced the previous one.
    Updated(Sample),
    /// The device could not be reached; the previous sample is kept.
    TransportFailed { error: Hs110Error, retries_left: u32 },
    /// The device answered with something unreadable; the sample was reset.
    DecodeFailed(Hs110Error),
}

/// Polls one HS110 smart plug for its realtime energy readout.
///
/// Every `refresh` opens a fresh TCP session, sends the realtime command and
/// reads one reply. Consecutive transport failures drain a retry budget;
/// draining it completely is reported as `Hs110Error::RetryBudgetExhausted`.
pub struct DeviceClient {
    target: SocketAddr,
    sample: SampleReader,
    retry: RetryBudget,
    variant: HardwareVariant,
    io_timeout: Duration,
}

impl DeviceClient {
    pub fn new(target: SocketAddr, variant: HardwareVariant) -> Self {
        Self {
            target,
            sample: SampleReader::default(),
            retry: RetryBudget::default(),
            variant,
            io_timeout: IO_TIMEOUT,
        }
    }

    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry = RetryBudget::new(limit);
        self
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Hardware revision seen in the last good reply, or the configured one.
    pub fn hardware_variant(&self) -> HardwareVariant {
        self.variant
    }

    pub fn retries_left(&self) -> u32 {
        self.retry.remaining()
    }

    pub fn current_sample(&self) -> Sample {
        self.sample.snapshot()
    }

    /// Handle for readers outside the polling loop, such as a metrics scrape.
    pub fn reader(&self) -> SampleReader {
        self.sample.clone()
    }

    pub fn connection_description(&self) -> String {
        format!("HS110 connection: {}:{}", self.target.ip(), self.target.port())
    }

    /// Encrypted realtime readout command.
    pub fn build_request_frame(&self) -> Result<Vec<u8>, Hs110Error> {
        cipher::encode(REALTIME_COMMAND)
    }

    /// Asks the device for a new readout and updates the sample.
    ///
    /// Recoverable failures are logged and returned as an outcome. The call
    /// only fails when the retry budget runs out, which callers should treat
    /// as fatal.
    pub async fn refresh(&mut self) -> Result<RefreshOutcome, Hs110Error> {
        let request = self.build_request_frame()?;

        let reply = match self.exchange(&request).await {
            Ok(reply) => reply,
            Err(error) => return self.transport_failed(error),
        };
        self.retry.reset();

        match decode_reply(&reply) {
            Ok((sample, variant)) => {
                if variant != self.variant {
                    debug!(from = %self.variant, to = %variant, "hardware version changed");
                }
                self.variant = variant;
                self.sample.replace(sample);
                Ok(RefreshOutcome::Updated(sample))
            }
            Err(error) => {
                warn!(
                    target_addr = %self.target,
                    %error,
                    "could not decrypt data from hs110, resetting values"
                );
                self.sample.replace(Sample::empty());
                Ok(RefreshOutcome::DecodeFailed(error))
            }
        }
    }

    fn transport_failed(&mut self, error: Hs110Error) -> Result<RefreshOutcome, Hs110Error> {
        let exhausted = self.retry.record_failure();
        let retries_left = self.retry.remaining();
        error!(
            target_addr = %self.target,
            %error,
            retries_left,
            "could not connect to the host, keeping last values"
        );
        if exhausted {
            return Err(Hs110Error::RetryBudgetExhausted {
                limit: self.retry.limit(),
            });
        }
        Ok(RefreshOutcome::TransportFailed {
            error,
            retries_left,
        })
    }

    /// One request/reply round trip. The stream is closed when this returns.
    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, Hs110Error> {
        let mut stream = self
            .with_timeout("connect", TcpStream::connect(self.target))
            .await?;
        self.with_timeout("send", stream.write_all(request)).await?;

        let mut reply = vec![0u8; REPLY_BUFFER_SIZE];
        let received = self.with_timeout("receive", stream.read(&mut reply)).await?;
        if received == 0 {
            return Err(self.transport_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before a reply was received",
            )));
        }
        reply.truncate(received);
        Ok(reply)
    }

    async fn with_timeout<T>(
        &self,
        operation: &str,
        future: impl Future<Output = io::Result<T>>,
    ) -> Result<T, Hs110Error> {
        match timeout(self.io_timeout, future).await {
            Ok(result) => result.map_err(|source| self.transport_error(source)),
            Err(_) => Err(self.transport_error(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{operation} timed out after {:?}", self.io_timeout),
            ))),
        }
    }

    fn transport_error(&self, source: io::Error) -> Hs110Error {
        Hs110Error::Transport {
            target: self.target.to_string(),
            source,
        }
    }
}

fn decode_reply(reply: &[u8]) -> Result<(Sample, HardwareVariant), Hs110Error> {
    let text = cipher::decode(reply).map_err(|e| Hs110Error::Decode(e.to_string()))?;
    Sample::from_reply(&text)
}
