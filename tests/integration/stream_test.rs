//! Stream session against a local WebSocket server

use crate::support::{
    accept, book_frame, next_raw_text, next_text, send_text, trade_frame, wait_for, ws_listener,
};
use futures_util::SinkExt;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use updown_hedge::auth::ApiCredentials;
use updown_hedge::ws::{
    Channel, MarketEvent, SessionState, StreamEvent, StreamSession, Subscription, UserEvent,
    WsConfig, WsError,
};

const WAIT: Duration = Duration::from_secs(5);

fn config(base: &str) -> WsConfig {
    WsConfig::new(base)
        .reconnect_delay(Duration::from_millis(50))
        .max_reconnects(2)
        .ping_interval(Duration::from_secs(30))
}

#[tokio::test]
async fn test_subscribe_and_receive_book() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        let (mut socket, subscription) = accept(&listener).await;
        send_text(&mut socket, &book_frame("111", "0.45", "0.48")).await;
        // hold the socket open until the client leaves
        while next_text(&mut socket).await.is_some() {}
        subscription
    });

    let (session, mut events) =
        StreamSession::connect(config(&url), Subscription::market(vec!["111".into(), "222".into()]))
            .await
            .unwrap();

    assert_eq!(events.recv().await, Some(StreamEvent::Connected));
    let event = wait_for(&mut events, WAIT, |e| matches!(e, StreamEvent::Market(_))).await;
    match event {
        StreamEvent::Market(MarketEvent::Book(book)) => {
            assert_eq!(book.asset_id, "111");
            assert_eq!(book.bids[0].price, "0.45");
            assert_eq!(book.asks[0].price, "0.48");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Active);

    session.close().await;
    assert!(session.is_closed());

    let subscription: serde_json::Value =
        serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(subscription["type"], "market");
    assert_eq!(subscription["assets_ids"], serde_json::json!(["111", "222"]));
}

#[tokio::test]
async fn test_dynamic_subscribe_sends_control_frame() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        let (mut socket, _) = accept(&listener).await;
        next_text(&mut socket).await
    });

    let (session, mut events) =
        StreamSession::connect(config(&url), Subscription::market(vec!["111".into()]))
            .await
            .unwrap();
    assert_eq!(events.recv().await, Some(StreamEvent::Connected));

    session.subscribe(vec!["333".into()]).await.unwrap();

    let frame = tokio::time::timeout(WAIT, server).await.unwrap().unwrap().unwrap();
    let control: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(control["assets_ids"], serde_json::json!(["333"]));
    assert_eq!(control["operation"], "subscribe");

    session.close().await;
}

#[tokio::test]
async fn test_reconnect_after_server_close() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        let (mut first, _) = accept(&listener).await;
        first.send(Message::Close(None)).await.unwrap();

        let (mut second, resubscription) = accept(&listener).await;
        send_text(&mut second, &book_frame("111", "0.50", "0.52")).await;
        while next_text(&mut second).await.is_some() {}
        resubscription
    });

    let (session, mut events) =
        StreamSession::connect(config(&url), Subscription::market(vec!["111".into()]))
            .await
            .unwrap();

    assert_eq!(events.recv().await, Some(StreamEvent::Connected));
    let event = wait_for(&mut events, WAIT, |e| {
        matches!(e, StreamEvent::Disconnected { .. })
    })
    .await;
    assert!(matches!(event, StreamEvent::Disconnected { .. }));
    assert_eq!(
        wait_for(&mut events, WAIT, |_| true).await,
        StreamEvent::Reconnecting {
            attempt: 1,
            delay: Duration::from_millis(50),
        }
    );
    assert_eq!(wait_for(&mut events, WAIT, |_| true).await, StreamEvent::Connected);
    wait_for(&mut events, WAIT, |e| matches!(e, StreamEvent::Market(_))).await;

    session.close().await;
    let resubscription: serde_json::Value =
        serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(resubscription["assets_ids"], serde_json::json!(["111"]));
}

#[tokio::test]
async fn test_gives_up_after_max_reconnects() {
    let (listener, url) = ws_listener().await;
    tokio::spawn(async move {
        let (mut socket, _) = accept(&listener).await;
        drop(listener);
        socket.send(Message::Close(None)).await.unwrap();
    });

    let (session, mut events) =
        StreamSession::connect(config(&url), Subscription::market(vec!["111".into()]))
            .await
            .unwrap();

    let mut delays = Vec::new();
    let terminal = tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(StreamEvent::Reconnecting { attempt, delay }) => delays.push((attempt, delay)),
                Some(StreamEvent::Failed(e)) => return e,
                Some(_) => {}
                None => panic!("channel closed before failure"),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(terminal, WsError::MaxReconnectsExceeded(2));
    assert_eq!(
        delays,
        vec![
            (1, Duration::from_millis(50)),
            (2, Duration::from_millis(100)),
        ]
    );
    assert_eq!(events.recv().await, Some(StreamEvent::Closed));
    assert!(session.is_closed());

    session.close().await;
    session.close().await;
    assert!(session.is_closed());
    assert_eq!(
        session.subscribe(vec!["222".into()]).await,
        Err(WsError::NotActive(SessionState::Closed))
    );
}

#[tokio::test]
async fn test_text_heartbeat() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        let (mut socket, _) = accept(&listener).await;
        let client_ping = next_raw_text(&mut socket).await;

        send_text(&mut socket, "PING").await;
        let mut reply = None;
        while let Some(text) = next_raw_text(&mut socket).await {
            if text != "PING" {
                reply = Some(text);
                break;
            }
        }

        send_text(&mut socket, &book_frame("111", "0.45", "0.48")).await;
        while next_text(&mut socket).await.is_some() {}
        (client_ping, reply)
    });

    let (session, mut events) = StreamSession::connect(
        config(&url).ping_interval(Duration::from_millis(50)),
        Subscription::market(vec!["111".into()]),
    )
    .await
    .unwrap();
    assert_eq!(events.recv().await, Some(StreamEvent::Connected));

    // the server PING is answered, never forwarded
    let next = tokio::time::timeout(WAIT, events.recv()).await.unwrap();
    assert!(matches!(next, Some(StreamEvent::Market(MarketEvent::Book(_)))), "{next:?}");

    session.close().await;
    let (client_ping, reply) = server.await.unwrap();
    assert_eq!(client_ping.as_deref(), Some("PING"));
    assert_eq!(reply.as_deref(), Some("PONG"));
}

#[tokio::test]
async fn test_close_twice() {
    let (listener, url) = ws_listener().await;
    tokio::spawn(async move {
        let (mut socket, _) = accept(&listener).await;
        while next_text(&mut socket).await.is_some() {}
    });

    let (session, mut events) =
        StreamSession::connect(config(&url), Subscription::market(vec!["111".into()]))
            .await
            .unwrap();
    assert_eq!(events.recv().await, Some(StreamEvent::Connected));

    session.close().await;
    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(events.recv().await, Some(StreamEvent::Closed));
    assert_eq!(events.recv().await, None);
    assert_eq!(
        session.unsubscribe(vec!["111".into()]).await,
        Err(WsError::NotActive(SessionState::Closed))
    );
}

fn credentials() -> ApiCredentials {
    ApiCredentials {
        api_key: "key".into(),
        secret: "c2VjcmV0".into(),
        passphrase: "pass".into(),
    }
}

#[tokio::test]
async fn test_user_channel_drops_duplicate_trades() {
    let (listener, url) = ws_listener().await;
    let server = tokio::spawn(async move {
        let (mut socket, subscription) = accept(&listener).await;
        for id in ["t-1", "t-1", "t-2"] {
            send_text(&mut socket, &trade_frame(id)).await;
        }
        while next_text(&mut socket).await.is_some() {}
        subscription
    });

    let (session, mut events) = StreamSession::connect(
        config(&url),
        Subscription::user(credentials(), vec!["0xcond".into()]),
    )
    .await
    .unwrap();
    assert_eq!(session.channel(), Channel::User);
    assert_eq!(events.recv().await, Some(StreamEvent::Connected));

    let mut trades = Vec::new();
    while trades.len() < 2 {
        let event = wait_for(&mut events, WAIT, |e| matches!(e, StreamEvent::User(_))).await;
        if let StreamEvent::User(UserEvent::Trade(trade)) = event {
            trades.push(trade.id);
        }
    }
    assert_eq!(trades, vec!["t-1", "t-2"]);

    assert_eq!(
        session.subscribe(vec!["111".into()]).await,
        Err(WsError::UnsupportedChannel(Channel::User))
    );

    session.close().await;
    let subscription: serde_json::Value =
        serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(subscription["type"], "user");
    assert_eq!(subscription["auth"]["apiKey"], "key");
}
