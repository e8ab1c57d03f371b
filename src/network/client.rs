//! Framed line I/O over one TCP connection.
//!
//! A [`LineClient`] owns both halves of an accepted socket behind async
//! locks so that the connection's own worker reads from it while any other
//! worker (channel fan-out, whispers, forced disconnects) may write to it.
//! Inbound data is framed on `\r\n` with a hard 64 KiB buffer cap; outbound
//! text is normalized so no lone `\r` or `\n` ever reaches the wire.

use crate::error::{HandlerError, HandlerResult};
use crate::state::Account;
use bytes::BytesMut;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Line separator on the wire.
pub const SEPARATOR: &[u8] = b"\r\n";

const RECEIVE_SIZE: usize = 1 << 12;
const BUFF_SIZE: usize = 1 << 16;

/// Who the connection is logged in as. Set by the outside menu on login,
/// cleared when the inside menu pops.
#[derive(Clone)]
pub struct Identity {
    pub name: String,
    pub account: Arc<Account>,
}

/// One connected client with buffered line framing.
pub struct LineClient {
    id: u64,
    addr: SocketAddr,
    reader: Mutex<Reader>,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
    halt: CancellationToken,
    identity: RwLock<Option<Identity>>,
}

struct Reader {
    half: OwnedReadHalf,
    buffer: BytesMut,
}

impl LineClient {
    /// Wrap an accepted stream.
    pub fn new(id: u64, stream: TcpStream, addr: SocketAddr) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        Arc::new(Self {
            id,
            addr,
            reader: Mutex::new(Reader {
                half: read_half,
                buffer: BytesMut::with_capacity(RECEIVE_SIZE),
            }),
            writer: Mutex::new(write_half),
            closed: AtomicBool::new(false),
            halt: CancellationToken::new(),
            identity: RwLock::new(None),
        })
    }

    /// Connection identity assigned by the gateway.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Account name once logged in.
    pub fn name(&self) -> Option<String> {
        self.identity.read().as_ref().map(|i| i.name.clone())
    }

    /// Account reference once logged in.
    pub fn account(&self) -> Option<Arc<Account>> {
        self.identity.read().as_ref().map(|i| Arc::clone(&i.account))
    }

    pub fn set_identity(&self, name: String, account: Arc<Account>) {
        *self.identity.write() = Some(Identity { name, account });
    }

    pub fn clear_identity(&self) {
        *self.identity.write() = None;
    }

    /// Read one line including its trailing separator.
    ///
    /// Residual bytes past the separator stay buffered for the next call.
    /// EOF, transport errors and an over-full buffer all close the client
    /// and surface as [`HandlerError::Disconnect`].
    pub async fn read_line(&self) -> HandlerResult<Vec<u8>> {
        if self.is_closed() {
            return Err(HandlerError::Disconnect);
        }
        let mut reader = self.reader.lock().await;
        loop {
            if let Some(index) = find_separator(&reader.buffer) {
                let line = reader.buffer.split_to(index + SEPARATOR.len());
                return Ok(line.to_vec());
            }
            if reader.buffer.len() > BUFF_SIZE {
                drop(reader);
                self.abort().await;
                return Err(HandlerError::Disconnect);
            }
            let Reader { half, buffer } = &mut *reader;
            buffer.reserve(RECEIVE_SIZE);
            let received = tokio::select! {
                _ = self.halt.cancelled() => None,
                read = half.read_buf(buffer) => match read {
                    Ok(0) | Err(_) => None,
                    Ok(n) => Some(n),
                },
            };
            if received.is_none() {
                drop(reader);
                self.abort().await;
                return Err(HandlerError::Disconnect);
            }
        }
    }

    /// Print an optional prompt, then read one line without its terminator.
    pub async fn input(&self, prompt: Option<&str>) -> HandlerResult<String> {
        if let Some(prompt) = prompt {
            self.print(prompt).await?;
        }
        let mut line = self.read_line().await?;
        line.truncate(line.len() - SEPARATOR.len());
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Send one line of text, normalizing embedded newlines.
    pub async fn print(&self, text: &str) -> HandlerResult<()> {
        let mut data = String::with_capacity(text.len() + SEPARATOR.len());
        data.push_str(text);
        data.push('\n');
        self.send(normalize(&data).as_bytes()).await
    }

    /// Close both halves of the socket. The first call succeeds (raising
    /// the disconnect signal unless suppressed); later calls always raise.
    pub async fn close(&self, suppress_exit: bool) -> HandlerResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(HandlerError::Disconnect);
        }
        self.halt.cancel();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        if suppress_exit {
            Ok(())
        } else {
            Err(HandlerError::Disconnect)
        }
    }

    async fn send(&self, data: &[u8]) -> HandlerResult<()> {
        if self.is_closed() {
            return Err(HandlerError::Disconnect);
        }
        let mut writer = self.writer.lock().await;
        let written = tokio::select! {
            _ = self.halt.cancelled() => Err(HandlerError::Disconnect),
            written = writer.write_all(data) => written.map_err(|_| HandlerError::Disconnect),
        };
        if written.is_err() {
            drop(writer);
            self.abort().await;
        }
        written
    }

    /// Terminal-failure path shared by reads and writes.
    async fn abort(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.halt.cancel();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

/// Collapse every run of `\r`/`\n` characters into exactly one `\r\n`.
///
/// The transform is idempotent and its output never contains a lone EOL
/// character.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' || c == '\n' {
            while matches!(chars.peek(), Some('\r' | '\n')) {
                chars.next();
            }
            out.push_str("\r\n");
        } else {
            out.push(c);
        }
    }
    out
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer.windows(SEPARATOR.len()).position(|w| w == SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn pair() -> (Arc<LineClient>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, peer) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        let (stream, remote) = accepted.unwrap();
        (LineClient::new(1, stream, remote), peer.unwrap())
    }

    #[test]
    fn normalize_collapses_runs() {
        assert_eq!(normalize("a\r\r\n\nb"), "a\r\nb");
        assert_eq!(normalize("a\nb\rc"), "a\r\nb\r\nc");
        assert_eq!(normalize("plain"), "plain");
    }

    #[test]
    fn normalize_is_idempotent_and_paired() {
        let cases = ["x\n", "\r\r\r", "a\r\nb\n\nc", "", "mixed\n\rtail"];
        for case in cases {
            let once = normalize(case);
            assert_eq!(normalize(&once), once);
            let stripped = once.replace("\r\n", "");
            assert!(!stripped.contains('\r') && !stripped.contains('\n'));
        }
    }

    #[tokio::test]
    async fn read_line_keeps_residual_bytes() {
        let (client, mut peer) = pair().await;
        peer.write_all(b"first\r\nsecond\r\n").await.unwrap();
        assert_eq!(client.read_line().await.unwrap(), b"first\r\n");
        assert_eq!(client.read_line().await.unwrap(), b"second\r\n");
    }

    #[tokio::test]
    async fn oversized_buffer_disconnects() {
        let (client, mut peer) = pair().await;
        let feeder = tokio::spawn(async move {
            let blob = vec![b'a'; BUFF_SIZE + 1024];
            let _ = peer.write_all(&blob).await;
            peer
        });
        assert!(matches!(
            client.read_line().await,
            Err(HandlerError::Disconnect)
        ));
        assert!(client.is_closed());
        drop(feeder);
    }

    #[tokio::test]
    async fn print_normalizes_on_the_wire() {
        let (client, mut peer) = pair().await;
        client.print("one\ntwo").await.unwrap();
        let mut buffer = vec![0u8; 64];
        let n = peer.read(&mut buffer).await.unwrap();
        assert_eq!(&buffer[..n], b"one\r\ntwo\r\n");
    }

    #[tokio::test]
    async fn closed_client_raises_on_use() {
        let (client, _peer) = pair().await;
        assert!(client.close(true).await.is_ok());
        assert!(matches!(
            client.close(true).await,
            Err(HandlerError::Disconnect)
        ));
        assert!(matches!(
            client.print("hello").await,
            Err(HandlerError::Disconnect)
        ));
        assert!(matches!(
            client.read_line().await,
            Err(HandlerError::Disconnect)
        ));
    }

    #[tokio::test]
    async fn close_wakes_a_blocked_reader() {
        let (client, _peer) = pair().await;
        let reader = Arc::clone(&client);
        let blocked = tokio::spawn(async move { reader.read_line().await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let _ = client.close(true).await;
        let result = blocked.await.unwrap();
        assert!(matches!(result, Err(HandlerError::Disconnect)));
    }
}
