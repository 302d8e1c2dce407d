use std::sync::Arc;

use futures_util::{SinkExt as _, StreamExt as _};
use hyper::upgrade::Upgraded;
use hyper::{header, Body, Request, Response, StatusCode};
use tokio::sync::broadcast;
use tokio_tungstenite::WebSocketStream;
use tungstenite::handshake::derive_accept_key;
use tungstenite::protocol::Role;
use tungstenite::{Error, Message};

use tw_engine::{Engine, Snapshot};
use tw_types::StreamEvent;

use crate::http::error_response;

/// Answer the handshake and hand the connection over to a subscriber task.
pub fn upgrade(mut req: Request<Body>, engine: Arc<Engine>) -> Response<Body> {
    let Some(key) = req.headers().get(header::SEC_WEBSOCKET_KEY) else {
        return error_response(StatusCode::BAD_REQUEST, "missing Sec-WebSocket-Key");
    };
    let accept_key = derive_accept_key(key.as_bytes());

    tokio::spawn(async move {
        match hyper::upgrade::on(&mut req).await {
            Ok(upgraded) => {
                let socket = WebSocketStream::from_raw_socket(upgraded, Role::Server, None).await;
                log::debug!("new stream subscriber");
                if let Err(err) = serve_subscriber(socket, engine).await {
                    match err {
                        Error::ConnectionClosed | Error::Protocol(_) | Error::Utf8 => (),
                        err => log::warn!("subscriber connection error: {err}"),
                    }
                }
                log::debug!("stream subscriber left");
            }
            Err(err) => log::warn!("websocket upgrade failed: {err}"),
        }
    });

    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_ACCEPT, accept_key)
        .body(Body::empty())
        .unwrap()
}

/// One connected viewer: snapshot first, then the live feed, until either
/// side hangs up. Clients send us nothing meaningful.
async fn serve_subscriber(
    socket: WebSocketStream<Upgraded>,
    engine: Arc<Engine>,
) -> tungstenite::Result<()> {
    let Snapshot {
        cursor,
        hits,
        mut events,
    } = engine.subscribe();

    let (mut sink, mut stream) = socket.split();
    sink.send(frame(&StreamEvent::Cursor { index: cursor })).await?;
    sink.send(frame(&StreamEvent::InitWords { words: hits })).await?;

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ignore chatter; pongs are handled below us
                    Some(Err(err)) => return Err(err),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => sink.send(frame(&event)).await?,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // The client can back-fill the gap over `/v1/chars`.
                        log::warn!("subscriber too slow; dropped {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

fn frame(event: &StreamEvent) -> Message {
    Message::Text(serde_json::to_string(event).unwrap())
}
