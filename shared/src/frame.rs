//! Newline-delimited text framing used on every chat connection.
//!
//! TCP carries no message boundaries, so each payload travels as a single
//! `\n`-terminated line. Reading is done with `fill_buf`/`consume` against a
//! buffer owned by the reader, which keeps [`FrameReader::next_frame`] safe to
//! use as a `tokio::select!` branch: a cancelled call loses no bytes.

use crate::MAX_FRAME_LEN;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Splits an inbound byte stream into text frames
pub struct FrameReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    max_len: usize,
    // The previous frame was cut at `max_len` and nothing followed it yet
    after_split: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_len(inner, MAX_FRAME_LEN)
    }

    /// Frame reader that splits unterminated lines at `max_len` bytes
    pub fn with_max_len(inner: R, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
            max_len: max_len.max(4),
            after_split: false,
        }
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` once the peer has closed its side and nothing is
    /// pending. An unterminated partial frame left at end of stream is handed
    /// out once before that. Lines longer than the reader's limit are split
    /// on a UTF-8 character boundary; a terminator right after such a split
    /// ends the line without producing an empty frame.
    pub async fn next_frame(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;

            if available.is_empty() {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_frame()));
            }

            if self.after_split && self.pending.is_empty() && available[0] == b'\n' {
                self.after_split = false;
                self.reader.consume(1);
                continue;
            }
            self.after_split = false;

            let room = self.max_len.saturating_sub(self.pending.len());
            let window = &available[..available.len().min(room)];

            match window.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.pending.extend_from_slice(&window[..pos]);
                    self.reader.consume(pos + 1);
                    return Ok(Some(self.take_frame()));
                }
                None => {
                    let n = window.len();
                    self.pending.extend_from_slice(window);
                    self.reader.consume(n);

                    if self.pending.len() >= self.max_len {
                        return Ok(Some(self.split_frame()));
                    }
                }
            }
        }
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn take_frame(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Hands out the longest prefix of a full buffer that does not end in
    /// the middle of a character and keeps the rest for the next frame.
    fn split_frame(&mut self) -> String {
        let cut = match std::str::from_utf8(&self.pending) {
            Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => e.valid_up_to(),
            _ => self.pending.len(),
        };

        let rest = self.pending.split_off(cut);
        let frame = String::from_utf8_lossy(&self.pending).into_owned();
        self.after_split = rest.is_empty();
        self.pending = rest;
        frame
    }
}

/// Writes `line` followed by the frame terminator and flushes
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    write_frames(writer, &[line]).await
}

/// Writes several frames with a single write and flushes
pub async fn write_frames<W, S>(writer: &mut W, lines: &[S]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    S: AsRef<str>,
{
    let len = lines.iter().map(|l| l.as_ref().len() + 1).sum();
    let mut bytes = Vec::with_capacity(len);
    for line in lines {
        bytes.extend_from_slice(line.as_ref().as_bytes());
        bytes.push(b'\n');
    }
    writer.write_all(&bytes).await?;
    writer.flush().await
}
