//! Test client for the line protocol.
//!
//! Sends `\r\n`-terminated lines and reads server output line by line with
//! timeouts, plus helpers for the register/login handshakes.

#![allow(dead_code)]

use anyhow::{Context, bail};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A test client speaking the wire protocol.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Send one line, appending the separator.
    pub async fn send_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive a single line without its terminator.
    pub async fn recv_line(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let read = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .context("timed out waiting for a line")??;
        if read == 0 {
            bail!("connection closed");
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    /// Read lines until one contains `needle`; returns that line.
    pub async fn expect_contains(&mut self, needle: &str) -> anyhow::Result<String> {
        loop {
            let line = self
                .recv_line()
                .await
                .with_context(|| format!("while waiting for {needle:?}"))?;
            if line.contains(needle) {
                return Ok(line);
            }
        }
    }

    /// True when the server has closed the connection (EOF or error).
    pub async fn wait_closed(&mut self) -> bool {
        loop {
            let mut line = String::new();
            match timeout(RECV_TIMEOUT, self.reader.read_line(&mut line)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }

    /// Run the register flow (terms of service included) and wait for the
    /// inside-menu greeting.
    pub async fn register(&mut self, name: &str, password: &str) -> anyhow::Result<()> {
        self.send_line(&format!("register {name} {password}")).await?;
        self.expect_contains("Do you agree?").await?;
        self.send_line("yes").await?;
        self.expect_contains("new message").await?;
        Ok(())
    }

    /// Run the login flow and wait for the inside-menu greeting.
    pub async fn login(&mut self, name: &str, password: &str) -> anyhow::Result<()> {
        self.send_line(&format!("login {name} {password}")).await?;
        self.expect_contains("new message").await?;
        Ok(())
    }

    /// Open a channel, answering the three setup prompts with defaults.
    pub async fn open_channel_fresh(&mut self, name: &str) -> anyhow::Result<()> {
        self.send_line(&format!("channel {name}")).await?;
        self.expect_contains("Password protect this channel?").await?;
        self.send_line("no").await?;
        self.expect_contains("buffer size?").await?;
        self.send_line("no").await?;
        self.expect_contains("replay size?").await?;
        self.send_line("no").await?;
        self.expect_contains("connected.").await?;
        Ok(())
    }
}
