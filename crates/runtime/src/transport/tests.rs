use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use super::*;

const TIMEOUT: Duration = Duration::from_secs(5);

type HandshakeResult = std::result::Result<Response, ErrorResponse>;

#[derive(Debug)]
enum Delivered {
	Frame(Value),
	Error(String),
	Closed(CloseReason),
}

struct ChannelListener(mpsc::UnboundedSender<Delivered>);

impl FrameListener for ChannelListener {
	fn on_frame(&self, frame: Value) {
		let _ = self.0.send(Delivered::Frame(frame));
	}

	fn on_transport_error(&self, error: Error) {
		let _ = self.0.send(Delivered::Error(error.to_string()));
	}

	fn on_closed(&self, reason: CloseReason) {
		let _ = self.0.send(Delivered::Closed(reason));
	}
}

fn listener() -> (Arc<dyn FrameListener>, mpsc::UnboundedReceiver<Delivered>) {
	let (tx, rx) = mpsc::unbounded_channel();
	(Arc::new(ChannelListener(tx)), rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Delivered>) -> Delivered {
	tokio::time::timeout(TIMEOUT, rx.recv())
		.await
		.expect("timed out waiting for delivery")
		.expect("listener channel closed")
}

fn request(endpoint: String) -> OpenRequest {
	OpenRequest {
		endpoint,
		player_name: "Alice".to_string(),
		secret: Some("s3cret".to_string()),
	}
}

/// Binds a one-shot WebSocket server and returns its endpoint plus the
/// accepted socket.
async fn server() -> (
	String,
	tokio::task::JoinHandle<tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>>,
) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let accept = tokio::spawn(async move {
		let (socket, _) = listener.accept().await.unwrap();
		tokio_tungstenite::accept_async(socket).await.unwrap()
	});
	(format!("ws://{addr}/connect"), accept)
}

#[tokio::test]
async fn test_handshake_sends_identity_headers() {
	let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = tcp.local_addr().unwrap();
	let (header_tx, mut header_rx) = mpsc::unbounded_channel();

	tokio::spawn(async move {
		let (socket, _) = tcp.accept().await.unwrap();
		let callback = move |req: &Request, resp: Response| -> HandshakeResult {
			let header = |name: &str| {
				req.headers()
					.get(name)
					.and_then(|v| v.to_str().ok())
					.map(str::to_string)
			};
			let _ = header_tx.send((header(PLAYER_NAME_HEADER), header(SECRET_TOKEN_HEADER)));
			Ok(resp)
		};
		let _ws = tokio_tungstenite::accept_hdr_async(socket, callback).await.unwrap();
		tokio::time::sleep(TIMEOUT).await;
	});

	let (listener, _rx) = listener();
	WebSocketTransport::new()
		.open(request(format!("ws://{addr}/connect")), listener)
		.await
		.unwrap();

	let (name, secret) = header_rx.recv().await.unwrap();
	assert_eq!(name.as_deref(), Some("Alice"));
	assert_eq!(secret.as_deref(), Some("s3cret"));
}

#[tokio::test]
async fn test_frames_delivered_in_order() {
	let (endpoint, accept) = server().await;
	let (listener, mut rx) = listener();

	let _sender = WebSocketTransport::new().open(request(endpoint), listener).await.unwrap();
	let mut ws = accept.await.unwrap();

	for i in 0..3 {
		ws.send(Message::Text(json!({"seq": i}).to_string())).await.unwrap();
	}

	for i in 0..3 {
		match next(&mut rx).await {
			Delivered::Frame(frame) => assert_eq!(frame["seq"], i),
			other => panic!("Expected frame {i}, got {other:?}"),
		}
	}
}

#[tokio::test]
async fn test_malformed_frame_reported_and_delivery_continues() {
	let (endpoint, accept) = server().await;
	let (listener, mut rx) = listener();

	let _sender = WebSocketTransport::new().open(request(endpoint), listener).await.unwrap();
	let mut ws = accept.await.unwrap();

	ws.send(Message::Text("not json".to_string())).await.unwrap();
	ws.send(Message::Text(r#"{"ok": true}"#.to_string())).await.unwrap();

	match next(&mut rx).await {
		Delivered::Error(message) => assert!(message.contains("malformed frame"), "{message}"),
		other => panic!("Expected error, got {other:?}"),
	}
	match next(&mut rx).await {
		Delivered::Frame(frame) => assert_eq!(frame["ok"], true),
		other => panic!("Expected frame, got {other:?}"),
	}
}

#[tokio::test]
async fn test_send_reaches_server() {
	let (endpoint, accept) = server().await;
	let (listener, _rx) = listener();

	let sender = WebSocketTransport::new().open(request(endpoint), listener).await.unwrap();
	let mut ws = accept.await.unwrap();

	sender.send(json!({"type": "leave_game", "goodbye": "bye"})).unwrap();

	let received = tokio::time::timeout(TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
	let Message::Text(text) = received else {
		panic!("Expected text message, got {received:?}");
	};
	let value: Value = serde_json::from_str(&text).unwrap();
	assert_eq!(value["type"], "leave_game");
}

#[tokio::test]
async fn test_remote_close_reported() {
	let (endpoint, accept) = server().await;
	let (listener, mut rx) = listener();

	let _sender = WebSocketTransport::new().open(request(endpoint), listener).await.unwrap();
	let mut ws = accept.await.unwrap();
	ws.close(None).await.unwrap();

	match next(&mut rx).await {
		Delivered::Closed(CloseReason::Remote(_)) => {}
		other => panic!("Expected remote close, got {other:?}"),
	}
}

#[tokio::test]
async fn test_local_close_reported_as_local() {
	let (endpoint, accept) = server().await;
	let (listener, mut rx) = listener();

	let sender = WebSocketTransport::new().open(request(endpoint), listener).await.unwrap();
	let mut ws = accept.await.unwrap();

	sender.close();
	assert!(matches!(sender.send(json!({})), Err(Error::ChannelClosed)));

	// Drive the server side so the close handshake completes.
	while let Some(Ok(_)) = ws.next().await {}

	match next(&mut rx).await {
		Delivered::Closed(reason) => assert_eq!(reason, CloseReason::Local),
		other => panic!("Expected local close, got {other:?}"),
	}
}

#[tokio::test]
async fn test_refused_connection_fails() {
	// Bind then drop to obtain a port nobody listens on.
	let addr = {
		let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
		tcp.local_addr().unwrap()
	};
	let (listener, _rx) = listener();

	let result = WebSocketTransport::new()
		.open(request(format!("ws://{addr}/connect")), listener)
		.await;

	match result {
		Err(err) => assert!(err.is_transport(), "unexpected error: {err}"),
		Ok(_) => panic!("Expected connection failure"),
	}
}

#[tokio::test]
async fn test_invalid_endpoint_fails() {
	let (listener, _rx) = listener();

	let result = WebSocketTransport::new()
		.open(request("not a url".to_string()), listener)
		.await;

	match result {
		Err(Error::ConnectionFailed(message)) => assert!(message.contains("invalid endpoint")),
		Err(other) => panic!("Expected ConnectionFailed, got {other}"),
		Ok(_) => panic!("Expected failure"),
	}
}
