//! Local WebSocket server helpers

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub type ServerSocket = WebSocketStream<TcpStream>;

/// Bind a listener on a free port and return it with its ws:// base URL
pub async fn ws_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Accept one client and return the socket with its first text frame
pub async fn accept(listener: &TcpListener) -> (ServerSocket, String) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
    let first = next_text(&mut socket).await.expect("subscription frame");
    (socket, first)
}

/// Next text frame that is not a heartbeat
pub async fn next_text(socket: &mut ServerSocket) -> Option<String> {
    while let Some(msg) = socket.next().await {
        match msg {
            Ok(Message::Text(text)) if text == "PING" => {
                let _ = socket.send(Message::Text("PONG".into())).await;
            }
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

/// Next text frame, heartbeats included
pub async fn next_raw_text(socket: &mut ServerSocket) -> Option<String> {
    while let Some(msg) = socket.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

pub fn trade_frame(id: &str) -> String {
    serde_json::json!([{
        "event_type": "trade",
        "id": id,
        "asset_id": "111",
        "side": "BUY",
        "price": "0.46",
        "size": "10",
        "status": "MATCHED",
    }])
    .to_string()
}

pub async fn send_text(socket: &mut ServerSocket, text: &str) {
    socket.send(Message::Text(text.to_string())).await.unwrap();
}

pub fn book_frame(asset_id: &str, bid: &str, ask: &str) -> String {
    serde_json::json!([{
        "event_type": "book",
        "asset_id": asset_id,
        "market": "0xcond",
        "timestamp": "1700000000000",
        "hash": "0xhash",
        "bids": [{"price": bid, "size": "100"}],
        "asks": [{"price": ask, "size": "100"}],
    }])
    .to_string()
}

/// Receive from `rx` until `pred` matches, failing after `wait`
pub async fn wait_for<T, F>(rx: &mut tokio::sync::mpsc::Receiver<T>, wait: Duration, mut pred: F) -> T
where
    T: std::fmt::Debug,
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(wait, async {
        loop {
            let item = rx.recv().await.expect("channel closed");
            if pred(&item) {
                return item;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
