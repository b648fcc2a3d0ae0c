//! COMPRESS=DEFLATE (RFC 4978) support.
//!
//! Both directions are raw DEFLATE streams (no zlib header) that live for the
//! rest of the connection. Every chunk is sync-flushed so the peer can decode
//! it immediately. Results are delivered on a channel as [`CodecOutput`], so
//! the in-thread and worker-thread strategies look the same to the driver.

use std::sync::mpsc as std_mpsc;
use std::thread;

use bytes::Bytes;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use tokio::sync::mpsc;

use super::config::CompressionMode;
use crate::{Error, Result};

/// Output buffer growth step.
const CHUNK: usize = 16 * 1024;

/// Result of a compression job.
#[derive(Debug)]
pub enum CodecOutput {
    /// Inflated inbound bytes, ready for the frame decoder.
    InflatedReady(Bytes),
    /// Deflated outbound bytes, ready for the socket.
    DeflatedReady(Bytes),
    /// The codec failed; the connection can't continue.
    Failed(Error),
}

/// A streaming inflate/deflate pair.
pub trait CompressionStrategy: Send {
    /// Queues inbound compressed bytes for inflation.
    fn inflate(&mut self, data: Bytes) -> Result<()>;

    /// Queues outbound bytes for deflation.
    fn deflate(&mut self, data: Bytes) -> Result<()>;
}

/// Creates the strategy selected by configuration.
///
/// # Errors
///
/// Returns [`Error::Compression`] if the worker thread can't be started.
pub fn strategy(
    mode: CompressionMode,
    output: mpsc::UnboundedSender<CodecOutput>,
) -> Result<Box<dyn CompressionStrategy>> {
    Ok(match mode {
        CompressionMode::Inline => Box::new(InlineCompressor::new(output)),
        CompressionMode::Worker => Box::new(WorkerCompressor::spawn(output)?),
    })
}

/// Raw DEFLATE codec state for one connection.
struct Codec {
    deflater: Compress,
    inflater: Decompress,
}

impl Codec {
    fn new() -> Self {
        Self {
            deflater: Compress::new(Compression::default(), false),
            inflater: Decompress::new(false),
        }
    }

    fn deflate(&mut self, input: &[u8]) -> Result<Bytes> {
        let mut out = Vec::with_capacity(input.len() / 2 + 64);
        let mut consumed = 0;
        loop {
            out.reserve(CHUNK);
            let before = self.deflater.total_in();
            self.deflater
                .compress_vec(&input[consumed..], &mut out, FlushCompress::Sync)
                .map_err(|e| Error::Compression(e.to_string()))?;
            consumed += progress(before, self.deflater.total_in())?;
            if consumed >= input.len() && out.len() < out.capacity() {
                return Ok(Bytes::from(out));
            }
        }
    }

    fn inflate(&mut self, input: &[u8]) -> Result<Bytes> {
        let mut out = Vec::with_capacity(input.len() * 2 + 64);
        let mut consumed = 0;
        loop {
            out.reserve(CHUNK);
            let before_in = self.inflater.total_in();
            let before_out = self.inflater.total_out();
            let status = self
                .inflater
                .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Sync)
                .map_err(|e| Error::Compression(e.to_string()))?;
            consumed += progress(before_in, self.inflater.total_in())?;
            let stalled = before_out == self.inflater.total_out() && consumed < input.len();
            match status {
                Status::StreamEnd => return Ok(Bytes::from(out)),
                Status::BufError if stalled => {
                    return Err(Error::Compression("inflate made no progress".to_string()));
                }
                _ => {}
            }
            if consumed >= input.len() && out.len() < out.capacity() {
                return Ok(Bytes::from(out));
            }
        }
    }
}

fn progress(before: u64, after: u64) -> Result<usize> {
    usize::try_from(after - before).map_err(|e| Error::Compression(e.to_string()))
}

/// Runs the codec on the calling task.
pub struct InlineCompressor {
    codec: Codec,
    output: mpsc::UnboundedSender<CodecOutput>,
}

impl InlineCompressor {
    /// Creates the codec.
    #[must_use]
    pub fn new(output: mpsc::UnboundedSender<CodecOutput>) -> Self {
        Self {
            codec: Codec::new(),
            output,
        }
    }

    fn emit(&self, result: Result<CodecOutput>) -> Result<()> {
        let message = result.unwrap_or_else(CodecOutput::Failed);
        self.output
            .send(message)
            .map_err(|_| Error::ConnectionClosed("compression output dropped".to_string()))
    }
}

impl CompressionStrategy for InlineCompressor {
    fn inflate(&mut self, data: Bytes) -> Result<()> {
        let result = self.codec.inflate(&data).map(CodecOutput::InflatedReady);
        self.emit(result)
    }

    fn deflate(&mut self, data: Bytes) -> Result<()> {
        let result = self.codec.deflate(&data).map(CodecOutput::DeflatedReady);
        self.emit(result)
    }
}

/// Messages to the worker thread.
enum WorkerMessage {
    Start,
    Inflate(Bytes),
    Deflate(Bytes),
}

/// Runs the codec on a dedicated thread.
///
/// The thread exits when this handle is dropped.
pub struct WorkerCompressor {
    sender: std_mpsc::Sender<WorkerMessage>,
}

impl WorkerCompressor {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Compression`] if the thread can't be spawned.
    pub fn spawn(output: mpsc::UnboundedSender<CodecOutput>) -> Result<Self> {
        let (sender, receiver) = std_mpsc::channel();
        thread::Builder::new()
            .name("imap-compress".to_string())
            .spawn(move || run_worker(&receiver, &output))
            .map_err(|e| Error::Compression(e.to_string()))?;
        sender
            .send(WorkerMessage::Start)
            .map_err(|_| Error::Compression("worker exited".to_string()))?;
        Ok(Self { sender })
    }

    fn post(&self, message: WorkerMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| Error::Compression("worker exited".to_string()))
    }
}

impl CompressionStrategy for WorkerCompressor {
    fn inflate(&mut self, data: Bytes) -> Result<()> {
        self.post(WorkerMessage::Inflate(data))
    }

    fn deflate(&mut self, data: Bytes) -> Result<()> {
        self.post(WorkerMessage::Deflate(data))
    }
}

fn run_worker(
    receiver: &std_mpsc::Receiver<WorkerMessage>,
    output: &mpsc::UnboundedSender<CodecOutput>,
) {
    let mut codec: Option<Codec> = None;
    while let Ok(message) = receiver.recv() {
        if matches!(message, WorkerMessage::Start) {
            codec = Some(Codec::new());
            continue;
        }
        let reply = match (message, codec.as_mut()) {
            (WorkerMessage::Inflate(data), Some(codec)) => codec
                .inflate(&data)
                .map_or_else(CodecOutput::Failed, CodecOutput::InflatedReady),
            (WorkerMessage::Deflate(data), Some(codec)) => codec
                .deflate(&data)
                .map_or_else(CodecOutput::Failed, CodecOutput::DeflatedReady),
            _ => CodecOutput::Failed(Error::Compression("worker not started".to_string())),
        };
        let failed = matches!(reply, CodecOutput::Failed(_));
        if output.send(reply).is_err() || failed {
            break;
        }
    }
    tracing::trace!("compression worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A peer codec to check we speak plain raw DEFLATE.
    fn peer() -> Codec {
        Codec::new()
    }

    #[test]
    fn test_deflate_is_raw_and_flushed() {
        let mut ours = Codec::new();
        let mut theirs = peer();
        let compressed = ours.deflate(b"W1 NOOP\r\n").unwrap();
        // Sync flush ends with an empty stored block.
        assert!(compressed.ends_with(&[0x00, 0x00, 0xff, 0xff]));
        assert_eq!(&theirs.inflate(&compressed).unwrap()[..], b"W1 NOOP\r\n");
    }

    #[test]
    fn test_stream_state_carries_over() {
        let mut ours = Codec::new();
        let mut theirs = peer();
        for line in [&b"W1 NOOP\r\n"[..], b"W2 NOOP\r\n", b"W3 CAPABILITY\r\n"] {
            let compressed = ours.deflate(line).unwrap();
            assert_eq!(&theirs.inflate(&compressed).unwrap()[..], line);
        }
    }

    #[test]
    fn test_large_payload() {
        let mut ours = Codec::new();
        let mut theirs = peer();
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = ours.deflate(&data).unwrap();
        assert_eq!(theirs.inflate(&compressed).unwrap().len(), data.len());
    }

    #[test]
    fn test_split_input_inflates_incrementally() {
        let mut ours = Codec::new();
        let mut theirs = peer();
        let compressed = ours.deflate(b"* OK still here\r\n").unwrap();
        let (a, b) = compressed.split_at(compressed.len() / 2);
        let mut inflated = theirs.inflate(a).unwrap().to_vec();
        inflated.extend_from_slice(&theirs.inflate(b).unwrap());
        assert_eq!(inflated, b"* OK still here\r\n");
    }

    #[test]
    fn test_garbage_fails() {
        let mut theirs = peer();
        assert!(matches!(
            theirs.inflate(&[0xff; 32]),
            Err(Error::Compression(_))
        ));
    }

    #[tokio::test]
    async fn test_inline_strategy_emits() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut strategy = strategy(CompressionMode::Inline, tx).unwrap();
        strategy.deflate(Bytes::from_static(b"hello")).unwrap();
        let Some(CodecOutput::DeflatedReady(data)) = rx.recv().await else {
            panic!("expected deflated output");
        };
        assert_eq!(&peer().inflate(&data).unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn test_worker_strategy_roundtrip() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut strategy = strategy(CompressionMode::Worker, tx).unwrap();

        let compressed = peer().deflate(b"* 3 EXISTS\r\n").unwrap();
        strategy.inflate(compressed).unwrap();
        let Some(CodecOutput::InflatedReady(data)) = rx.recv().await else {
            panic!("expected inflated output");
        };
        assert_eq!(&data[..], b"* 3 EXISTS\r\n");
    }
}
