//! Byte-level terminal handling for the fake login and shell.
//!
//! The peer is treated as a raw terminal: nothing is line-buffered on the
//! client side, so every keystroke arrives as a byte and is interpreted here.

use std::io::ErrorKind;
use std::mem;
use std::time::Duration;

use log::trace;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::time::{timeout, timeout_at, Instant};

use crate::error_handling::types::SessionError;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const BELL: u8 = 0x07;
/// Longest line the editor buffers, as a tty's canonical mode allows.
pub const MAX_LINE: usize = 4096;
const HELLO_BUFFER: usize = 4096;

/// What a single input byte asks the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// A completed line, without its terminator
    Submit(String),
    /// Write this byte back to the peer
    Echo(u8),
    /// The last buffered character was removed
    Erase,
    /// Ctrl-C: the buffer was discarded
    Interrupt,
    /// Ctrl-D
    EndOfTransmission,
    Ignore,
}

/// Line buffer fed one byte at a time.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
    after_cr: bool,
}

impl LineEditor {
    pub fn feed(&mut self, byte: u8) -> KeyAction {
        let after_cr = mem::replace(&mut self.after_cr, byte == b'\r');
        match byte {
            // CRLF is one line ending
            b'\n' if after_cr => KeyAction::Ignore,
            b'\r' | b'\n' => KeyAction::Submit(mem::take(&mut self.buffer)),
            BACKSPACE | DELETE => match self.buffer.pop() {
                Some(_) => KeyAction::Erase,
                None => KeyAction::Ignore,
            },
            CTRL_C => {
                self.buffer.clear();
                KeyAction::Interrupt
            }
            CTRL_D => KeyAction::EndOfTransmission,
            b'\t' => KeyAction::Echo(byte),
            0x20..=0x7e if self.buffer.len() >= MAX_LINE => KeyAction::Echo(BELL),
            0x20..=0x7e => {
                self.buffer.push(char::from(byte));
                KeyAction::Echo(byte)
            }
            _ => KeyAction::Ignore,
        }
    }
}

/// Split stream plus the line editor shared by the login and shell phases.
pub struct Terminal<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    editor: LineEditor,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Terminal<S> {
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
            editor: LineEditor::default(),
        }
    }

    pub async fn send(&mut self, data: impl AsRef<[u8]>) -> Result<(), SessionError> {
        self.writer.write_all(data.as_ref()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Whatever the client sends first, within `wait`.
    ///
    /// Silence, EOF and read errors all yield `None`; the session carries on
    /// to the login prompt either way.
    pub async fn read_hello(&mut self, wait: Duration) -> Option<String> {
        let mut buf = vec![0u8; HELLO_BUFFER];
        match timeout(wait, self.reader.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => {
                let hello = String::from_utf8_lossy(&buf[..n]).trim().to_string();
                Some(hello).filter(|h| !h.is_empty())
            }
            _ => None,
        }
    }

    /// Next input byte, or the reason there is none before `deadline`.
    pub async fn next_byte(
        &mut self,
        deadline: Instant,
        phase: &'static str,
    ) -> Result<u8, SessionError> {
        match timeout_at(deadline, self.reader.read_u8()).await {
            Err(_) => Err(SessionError::Timeout(phase)),
            Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                Err(SessionError::ConnectionClosed)
            }
            Ok(Err(e)) => Err(SessionError::Transport(e)),
            Ok(Ok(byte)) => {
                trace!("input byte {:#04x} during {}", byte, phase);
                Ok(byte)
            }
        }
    }

    /// One trimmed line, without echo, bounded by `wait`.
    pub async fn read_line(&mut self, wait: Duration) -> Result<String, SessionError> {
        let deadline = Instant::now() + wait;
        loop {
            let byte = self.next_byte(deadline, "login").await?;
            match self.editor.feed(byte) {
                KeyAction::Submit(line) => return Ok(line.trim().to_string()),
                KeyAction::EndOfTransmission => return Err(SessionError::ConnectionClosed),
                _ => {}
            }
        }
    }

    pub fn feed(&mut self, byte: u8) -> KeyAction {
        self.editor.feed(byte)
    }

    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}
