//! Hardware sensor source
//!
//! Reads the newline-delimited JSON protocol from any async byte stream. In
//! production that stream is a serial port opened at the configured baud
//! rate. Lines longer than [`MAX_LINE_LENGTH`] are discarded up to the next
//! newline so a board that never terminates a frame cannot grow the buffer.

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tracing::{debug, instrument, trace, warn};

use super::frame::{ActuatorCommand, HardwareFrame, parse_line};
use super::{SensorError, SensorSource, SourceEvent, SourceKind};

/// Longest accepted protocol line in bytes
pub const MAX_LINE_LENGTH: usize = 4096;

type LineReader = Box<dyn AsyncRead + Send + Unpin>;
type CommandWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct HardwareSource {
    device: String,
    reader: LineReader,
    buffer: BytesMut,
    codec: LinesCodec,
    writer: Option<CommandWriter>,
    /// Set once the read side hit EOF or an I/O error
    closed: bool,
}

impl std::fmt::Debug for HardwareSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareSource")
            .field("device", &self.device)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl HardwareSource {
    pub fn new<R>(device: impl Into<String>, reader: R, writer: Option<CommandWriter>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            device: device.into(),
            reader: Box::new(reader),
            buffer: BytesMut::with_capacity(512),
            codec: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
            writer,
            closed: false,
        }
    }

    /// Open a serial port for reading frames and writing actuator commands
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SensorError> {
        let port = tokio_serial::new(path, baud_rate).open_native_async()?;

        let (reader, writer) = tokio::io::split(port);
        debug!("opened serial port {path} at {baud_rate} baud");

        Ok(Self::new(path, reader, Some(Box::new(writer))))
    }

    /// Next complete line, `None` at end of stream
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let mut eof = false;

        loop {
            let decoded = if eof {
                self.codec.decode_eof(&mut self.buffer)
            } else {
                self.codec.decode(&mut self.buffer)
            };

            match decoded {
                Ok(Some(line)) => return Ok(Some(line)),
                Ok(None) if eof => return Ok(None),
                Ok(None) => {}
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(device = %self.device, "dropping line longer than {MAX_LINE_LENGTH} bytes");
                    continue;
                }
                Err(LinesCodecError::Io(e)) => {
                    warn!(device = %self.device, "dropping unreadable line: {e}");
                    continue;
                }
            }

            if self.reader.read_buf(&mut self.buffer).await? == 0 {
                eof = true;
            }
        }
    }

    fn decode(&self, line: &str) -> Option<SourceEvent> {
        if line.trim().is_empty() {
            return None;
        }

        let frame = match parse_line(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(device = %self.device, "dropping frame: {e}");
                return None;
            }
        };

        match frame {
            HardwareFrame::Telemetry(telemetry) => match telemetry.into_reading(Utc::now()) {
                Ok(reading) => Some(SourceEvent::Reading(reading)),
                Err(e) => {
                    warn!(device = %self.device, "rejecting telemetry: {e}");
                    None
                }
            },
            HardwareFrame::Ack {
                command,
                success,
                message,
            } => Some(SourceEvent::Ack {
                command,
                success,
                message,
            }),
            HardwareFrame::Error { message, code } => Some(SourceEvent::Fault { message, code }),
        }
    }
}

#[async_trait]
impl SensorSource for HardwareSource {
    #[instrument(skip(self), fields(device = %self.device))]
    async fn next_event(&mut self) -> Option<SourceEvent> {
        if self.closed {
            return None;
        }

        loop {
            match self.next_line().await {
                Ok(Some(line)) => {
                    trace!("received {} bytes", line.len());
                    if let Some(event) = self.decode(&line) {
                        return Some(event);
                    }
                }
                Ok(None) => {
                    warn!("hardware stream closed");
                    self.closed = true;
                    return None;
                }
                Err(e) => {
                    warn!("hardware read failed: {e}");
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Hardware
    }

    fn device(&self) -> Option<&str> {
        Some(&self.device)
    }

    async fn send_command(&mut self, command: &ActuatorCommand) -> Result<bool, SensorError> {
        if self.closed {
            return Ok(false);
        }

        let Some(writer) = self.writer.as_mut() else {
            return Ok(false);
        };

        let line = command.to_line()?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        debug!(device = %self.device, "sent actuator command '{}'", command.command);
        Ok(true)
    }
}
