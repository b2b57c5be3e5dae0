#![allow(clippy::unwrap_used)]
// Integration tests for `Transport` against an in-process WebSocket peer.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use htp1_api::transport::controller_url;
use htp1_api::{ConnectionStatus, Error, ReconnectConfig, SessionHandler, SessionOptions, Transport};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Open,
    Frame(String),
    Lost,
}

struct Recorder {
    events: mpsc::UnboundedSender<Event>,
}

impl SessionHandler for Recorder {
    fn on_open(&self) -> Vec<String> {
        let _ = self.events.send(Event::Open);
        vec!["getmso".into()]
    }

    fn on_frame(&self, frame: &str) {
        let _ = self.events.send(Event::Frame(frame.to_owned()));
    }

    fn on_link_lost(&self, _error: &Error) {
        let _ = self.events.send(Event::Lost);
    }
}

fn recorder() -> (Arc<Recorder>, mpsc::UnboundedReceiver<Event>) {
    let (events, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder { events }), rx)
}

fn status_cell() -> Arc<watch::Sender<ConnectionStatus>> {
    Arc::new(watch::channel(ConnectionStatus::Disconnected).0)
}

fn fast_options() -> SessionOptions {
    SessionOptions {
        connect_timeout: Duration::from_secs(2),
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            max_retries: None,
        },
    }
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn read_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Close(_) => panic!("peer closed"),
            _ => {}
        }
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for session event")
        .unwrap()
}

// ── Session lifecycle ───────────────────────────────────────────────

#[tokio::test]
async fn test_connect_greets_and_forwards_frames() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let greeting = read_text(&mut ws).await;
        ws.send(Message::text(r#"mso {"volume": -30}"#)).await.unwrap();
        let command = read_text(&mut ws).await;
        (greeting, command)
    });

    let (handler, mut events) = recorder();
    let status = status_cell();
    let transport = Transport::connect(
        controller_url("127.0.0.1", port).unwrap(),
        fast_options(),
        Arc::clone(&status),
        handler,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(transport.status(), ConnectionStatus::Connected);
    assert_eq!(next_event(&mut events).await, Event::Open);
    assert_eq!(
        next_event(&mut events).await,
        Event::Frame(r#"mso {"volume": -30}"#.into())
    );

    transport.send(r#"avcui "up""#.into()).unwrap();
    let (greeting, command) = server.await.unwrap();
    assert_eq!(greeting, "getmso");
    assert_eq!(command, r#"avcui "up""#);

    let outbox = transport.outbox();
    transport.disconnect().await;
    assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
    assert!(matches!(
        outbox.send("getmso".into()),
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn test_connect_refused_when_nothing_listens() {
    let (listener, port) = bind().await;
    drop(listener);

    let (handler, _events) = recorder();
    let status = status_cell();
    let result = Transport::connect(
        controller_url("127.0.0.1", port).unwrap(),
        fast_options(),
        Arc::clone(&status),
        handler,
        CancellationToken::new(),
    )
    .await;

    assert!(
        matches!(result, Err(Error::ConnectionRefused { .. })),
        "expected ConnectionRefused, got: {:?}",
        result.err()
    );
    assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_connect_times_out_on_silent_peer() {
    // Accepts TCP but never answers the upgrade request.
    let (listener, port) = bind().await;
    let hold = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(stream);
    });

    let (handler, _events) = recorder();
    let options = SessionOptions {
        connect_timeout: Duration::from_millis(200),
        ..fast_options()
    };
    let status = status_cell();
    let result = Transport::connect(
        controller_url("127.0.0.1", port).unwrap(),
        options,
        Arc::clone(&status),
        handler,
        CancellationToken::new(),
    )
    .await;

    assert!(
        matches!(result, Err(Error::ConnectionTimeout { .. })),
        "expected ConnectionTimeout, got: {:?}",
        result.err()
    );
    assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
    hold.abort();
}

#[tokio::test]
async fn test_cancelled_before_connect_returns_cancelled() {
    let (_listener, port) = bind().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let (handler, _events) = recorder();
    let result = Transport::connect(
        controller_url("127.0.0.1", port).unwrap(),
        fast_options(),
        status_cell(),
        handler,
        cancel,
    )
    .await;

    assert!(matches!(result, Err(Error::Cancelled)));
}

// ── Reconnection ────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnects_and_greets_again_after_drop() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        assert_eq!(read_text(&mut first).await, "getmso");
        drop(first);

        let mut second = accept(&listener).await;
        assert_eq!(read_text(&mut second).await, "getmso");
        second.send(Message::text("mso {}")).await.unwrap();
        // Keep the session open until the client hangs up.
        while let Some(Ok(message)) = second.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let (handler, mut events) = recorder();
    let status = status_cell();
    let transport = Transport::connect(
        controller_url("127.0.0.1", port).unwrap(),
        fast_options(),
        Arc::clone(&status),
        handler,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(next_event(&mut events).await, Event::Open);
    assert_eq!(next_event(&mut events).await, Event::Lost);
    assert_eq!(next_event(&mut events).await, Event::Open);
    assert_eq!(next_event(&mut events).await, Event::Frame("mso {}".into()));
    assert_eq!(transport.status(), ConnectionStatus::Connected);

    transport.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_disconnect_interrupts_backoff() {
    let (listener, port) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        read_text(&mut ws).await;
        // Drop both the session and the listener: no reconnect can succeed.
    });

    let (handler, mut events) = recorder();
    let status = status_cell();
    let options = SessionOptions {
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        },
        ..fast_options()
    };
    let transport = Transport::connect(
        controller_url("127.0.0.1", port).unwrap(),
        options,
        Arc::clone(&status),
        handler,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(next_event(&mut events).await, Event::Open);
    server.await.unwrap();
    assert_eq!(next_event(&mut events).await, Event::Lost);
    assert!(matches!(
        *status.borrow(),
        ConnectionStatus::Reconnecting { .. }
    ));

    tokio::time::timeout(Duration::from_secs(2), transport.disconnect())
        .await
        .expect("disconnect should not wait out the backoff");
    assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
}
