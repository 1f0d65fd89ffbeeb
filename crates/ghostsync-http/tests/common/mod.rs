//! Test helpers: a running server and a minimal WebSocket client.
//!
//! The client speaks just enough RFC 6455 for these tests: the opening
//! handshake, masked single-frame text messages out, unmasked frames in.

#![allow(dead_code)]

use ghostsync_core::host::DocumentId;
use ghostsync_core::{DiscoveryResponse, MemoryEditorHost};
use ghostsync_http::{DiscoveryServerHandle, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const WAIT: Duration = Duration::from_secs(5);

pub const OPCODE_TEXT: u8 = 0x1;
pub const OPCODE_CLOSE: u8 = 0x8;

pub async fn start_server(host: Arc<MemoryEditorHost>) -> DiscoveryServerHandle {
    start_server_with(host, ServerConfig::default().channel_idle_timeout).await
}

pub async fn start_server_with(
    host: Arc<MemoryEditorHost>,
    channel_idle_timeout: Duration,
) -> DiscoveryServerHandle {
    let config = ServerConfig {
        port: 0,
        channel_idle_timeout,
        ..ServerConfig::default()
    };
    ghostsync_http::start(config, host).await.unwrap()
}

pub async fn discover(server: &DiscoveryServerHandle) -> DiscoveryResponse {
    let url = format!("http://{}/", server.local_addr());
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

pub fn sync_frame(title: &str, text: &str) -> String {
    serde_json::json!({"title": title, "text": text, "syntax": "", "selections": []}).to_string()
}

/// Poll until the host has at least `count` documents.
pub async fn wait_for_documents(host: &MemoryEditorHost, count: usize) -> Vec<DocumentId> {
    tokio::time::timeout(WAIT, async {
        loop {
            let docs = host.documents();
            if docs.len() >= count {
                return docs;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("documents opened")
}

/// Poll until `document` holds `expected`.
pub async fn wait_for_text(host: &MemoryEditorHost, document: DocumentId, expected: &str) {
    tokio::time::timeout(WAIT, async {
        while host.text_of(document).as_deref() != Some(expected) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("document never held {:?}", expected));
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition met");
}

pub struct WsClient {
    stream: TcpStream,
}

impl WsClient {
    pub async fn connect(port: u16) -> WsClient {
        let (head, stream) = upgrade(port).await.unwrap();
        assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {}", head);
        WsClient { stream }
    }

    pub async fn send_text(&mut self, text: &str) {
        let payload = text.as_bytes();
        let mask = [0x12, 0x34, 0x56, 0x78];
        let mut frame = vec![0x80 | OPCODE_TEXT];
        if payload.len() < 126 {
            frame.push(0x80 | payload.len() as u8);
        } else {
            frame.push(0x80 | 126);
            frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        frame.extend_from_slice(&mask);
        frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
        self.stream.write_all(&frame).await.unwrap();
    }

    /// Read one frame: (opcode, payload).
    pub async fn read_frame(&mut self) -> (u8, Vec<u8>) {
        tokio::time::timeout(WAIT, async {
            let mut header = [0u8; 2];
            self.stream.read_exact(&mut header).await.unwrap();
            let opcode = header[0] & 0x0f;
            let len = match header[1] & 0x7f {
                126 => {
                    let mut ext = [0u8; 2];
                    self.stream.read_exact(&mut ext).await.unwrap();
                    u16::from_be_bytes(ext) as usize
                }
                127 => {
                    let mut ext = [0u8; 8];
                    self.stream.read_exact(&mut ext).await.unwrap();
                    u64::from_be_bytes(ext) as usize
                }
                n => n as usize,
            };
            let mut payload = vec![0u8; len];
            self.stream.read_exact(&mut payload).await.unwrap();
            (opcode, payload)
        })
        .await
        .expect("frame received")
    }

    pub async fn read_text(&mut self) -> String {
        let (opcode, payload) = self.read_frame().await;
        assert_eq!(opcode, OPCODE_TEXT, "expected a text frame");
        String::from_utf8(payload).unwrap()
    }

    pub async fn expect_close(&mut self) {
        let (opcode, _) = self.read_frame().await;
        assert_eq!(opcode, OPCODE_CLOSE, "expected a close frame");
    }
}

/// Send a WebSocket upgrade request and return the response head.
pub async fn upgrade(port: u16) -> std::io::Result<(String, TcpStream)> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await?;
    let request = format!(
        "GET / HTTP/1.1\r\n\
         Host: 127.0.0.1:{}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n",
        port
    );
    stream.write_all(request.as_bytes()).await?;

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await? == 0 {
            break;
        }
        head.push(byte[0]);
    }
    Ok((String::from_utf8_lossy(&head).into_owned(), stream))
}
