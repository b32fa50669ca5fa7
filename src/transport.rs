//! Owns the serial port, serializes writes under a mutex, and runs a
//! background reader task that feeds decoded frames into a receive queue.
//!
//! The read and write halves of the port are split (`tokio::io::split`)
//! rather than shared behind one lock: each half is physically
//! independent, so the foreground writer and the background reader can
//! never tear each other's bytes without any additional read-side
//! locking. See DESIGN.md for the corresponding Open Question.

use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_serial::{DataBits, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::codec::{FrameCodec, OutboundFrame};
use crate::protocol::{Address, ReceiveRecord};
use crate::tracing_prelude::*;

/// Backoff applied by the reader loop after a transient I/O error.
const READER_IO_BACKOFF: Duration = Duration::from_millis(10);

type Writer = FramedWrite<WriteHalf<SerialStream>, FrameCodec>;

/// Full-duplex transport for the bootloader bus.
pub struct Transport {
    writer: Arc<Mutex<Writer>>,
    rx: mpsc::UnboundedReceiver<ReceiveRecord>,
    shutdown: CancellationToken,
    reader_task: Option<JoinHandle<()>>,
}

impl Transport {
    /// Open the serial port at `port`/`baud` (8-N-2, DTR/RTS held low) and
    /// spawn the background reader task.
    pub async fn open(port: &str, baud: u32) -> Result<Self> {
        let mut stream = tokio_serial::new(port, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .open_native_async()
            .map_err(|source| Error::SerialOpenFailed {
                port: port.to_string(),
                source,
            })?;

        stream
            .write_data_terminal_ready(false)
            .map_err(Error::Io)?;
        stream.write_request_to_send(false).map_err(Error::Io)?;

        let (read_half, write_half): (ReadHalf<SerialStream>, WriteHalf<SerialStream>) =
            tokio::io::split(stream);

        let writer = Arc::new(Mutex::new(FramedWrite::new(write_half, FrameCodec::default())));
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let reader_task = tokio::spawn(reader_loop(
            FramedRead::new(read_half, FrameCodec::default()),
            tx,
            shutdown.clone(),
        ));

        Ok(Self {
            writer,
            rx,
            shutdown,
            reader_task: Some(reader_task),
        })
    }

    /// Drain any unconsumed responses, then write and flush the encoded
    /// frame. The protocol is strictly request/response per call, so any
    /// response still sitting in the queue from a prior exchange is stale.
    pub async fn send(&mut self, address: Address, cmd: u8, payload: &[u8]) -> Result<()> {
        while self.rx.try_recv().is_ok() {}

        let frame = OutboundFrame {
            address,
            cmd,
            payload: payload.to_vec(),
        };

        let mut writer = self.writer.lock().await;
        writer.send(frame).await.map_err(Error::Io)?;
        Ok(())
    }

    /// Block up to `timeout` for the next queued response.
    pub async fn get_response(&mut self, timeout: Duration) -> Option<ReceiveRecord> {
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }

    /// Write raw bytes directly to the port, bypassing frame encoding.
    /// Used only to stream the sustained 0x7F preamble that drives nodes
    /// into bootloader mode (spec §4.5, enter bootloader).
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.get_mut().write_all(bytes).await.map_err(Error::Io)?;
        writer.get_mut().flush().await.map_err(Error::Io)?;
        Ok(())
    }

    /// Signal the reader to stop, join it, then drop the port.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.reader_task.take() {
            let _ = task.await;
        }
    }
}

async fn reader_loop(
    mut framed: FramedRead<ReadHalf<SerialStream>, FrameCodec>,
    tx: mpsc::UnboundedSender<ReceiveRecord>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                trace!("transport reader stopping");
                break;
            }
            item = framed.next() => {
                match item {
                    Some(Ok(record)) => {
                        if tx.send(record).is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("transient I/O error on reader, backing off: {e}");
                        tokio::time::sleep(READER_IO_BACKOFF).await;
                    }
                    None => {
                        warn!("serial reader stream closed");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_backoff_is_sub_50ms() {
        assert!(READER_IO_BACKOFF < Duration::from_millis(50));
    }
}
