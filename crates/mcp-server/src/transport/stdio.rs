use crate::error::Result;
use mcp_types::{ErrorObject, Inbound, JsonRpcResponse, MalformedMessage, RequestId};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One decoded input line.
pub type Frame = std::result::Result<Inbound, MalformedMessage>;

/// Reader and writer bound to the process's stdin/stdout.
pub fn stdio() -> (FrameReader<Stdin>, FrameWriter<Stdout>) {
    (
        FrameReader::new(tokio::io::stdin()),
        FrameWriter::new(tokio::io::stdout()),
    )
}

/// Lines longer than this are answered with `parse_error` and skipped.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Splits a byte stream into newline-terminated frames.
pub struct FrameReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    max_frame_bytes: usize,
    // Inside an oversized line; bytes are dropped up to the next newline.
    discarding: bool,
    lines: u64,
    done: bool,
}

enum Fill {
    Line,
    Eof,
    Oversized,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            discarding: false,
            lines: 0,
            done: false,
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Next frame, or `None` once the stream is closed.
    ///
    /// Cancel safe: a partially received line stays buffered and is completed
    /// by the next call, so this can sit in a `tokio::select!` branch.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if self.done {
                return None;
            }

            match self.fill_line().await {
                Ok(Fill::Eof) if self.buf.is_empty() => {
                    debug!("End of input after {} lines", self.lines);
                    self.done = true;
                    return None;
                }
                Ok(Fill::Line) | Ok(Fill::Eof) => {}
                Ok(Fill::Oversized) => {
                    self.lines += 1;
                    warn!("Dropping input line longer than {} bytes", self.max_frame_bytes);
                    return Some(Err(MalformedMessage::parse_error(format!(
                        "Line exceeds {} bytes",
                        self.max_frame_bytes
                    ))));
                }
                Err(e) => {
                    warn!("Failed to read from input: {}", e);
                    self.done = true;
                    return None;
                }
            }

            // Either a full line, or an unterminated fragment at end of input.
            let line = std::mem::take(&mut self.buf);
            self.lines += 1;

            let line = strip_line_ending(&line);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Some(decode_frame(line));
        }
    }

    /// Move bytes from the reader into `buf` until a newline, end of input or
    /// the size limit. State only changes between awaits, which keeps this
    /// cancel safe.
    async fn fill_line(&mut self) -> std::io::Result<Fill> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                self.discarding = false;
                return Ok(Fill::Eof);
            }

            let newline = available.iter().position(|b| *b == b'\n');
            let used = newline.map_or(available.len(), |at| at + 1);
            let content = newline.unwrap_or(available.len());

            if self.discarding {
                self.reader.consume(used);
                if newline.is_some() {
                    self.discarding = false;
                }
                continue;
            }

            if self.buf.len() + content > self.max_frame_bytes {
                self.reader.consume(used);
                self.buf = Vec::new();
                self.discarding = newline.is_none();
                return Ok(Fill::Oversized);
            }

            self.buf.extend_from_slice(&available[..used]);
            self.reader.consume(used);
            if newline.is_some() {
                return Ok(Fill::Line);
            }
        }
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Decode a single line into a message.
pub fn decode_frame(line: &[u8]) -> Frame {
    let text = std::str::from_utf8(line)
        .map_err(|e| MalformedMessage::parse_error(format!("Invalid UTF-8: {}", e)))?;

    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| MalformedMessage::parse_error(format!("Invalid JSON: {}", e)))?;

    Inbound::from_value(value)
}

/// Line-oriented writer shared by every in-flight request.
///
/// Each response is encoded up front and written with a single `write_all`
/// while holding the lock, so lines from concurrent completions never
/// interleave.
pub struct FrameWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub async fn write_response(&self, response: &JsonRpcResponse) -> Result<()> {
        let mut line = serde_json::to_vec(response)?;
        line.push(b'\n');

        let mut out = self.inner.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }

    pub async fn write_error(
        &self,
        jsonrpc: Option<String>,
        id: Option<RequestId>,
        error: ErrorObject,
    ) -> Result<()> {
        self.write_response(&JsonRpcResponse::failure(jsonrpc, id, error))
            .await
    }

    /// Flush and close the underlying stream.
    pub async fn shutdown(&self) -> Result<()> {
        let mut out = self.inner.lock().await;
        out.shutdown().await?;
        Ok(())
    }
}
