// WebSocket upgrade and per-socket event loop.
//
// Each accepted socket gets one task owning the transport. Everything else
// (heartbeat, dispatch, signaling relays) reaches the socket through its
// registry entry's command channel, so a closed channel doubles as the
// open-state check after any await.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{
        header::{COOKIE, HOST, ORIGIN},
        HeaderMap,
    },
    response::IntoResponse,
};
use serde_json::Value;
use squadlink_common::protocol::ws::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::registry::SocketCommand;
use super::RealtimeState;
use crate::error::{
    request_id_from_headers_or_generate, with_request_id_scope, ErrorCode, RealtimeError,
};
use crate::signaling::SignalKind;

pub async fn ws_upgrade(
    State(state): State<RealtimeState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if !origin_matches_host(&headers) {
        warn!(
            origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok()).unwrap_or("<missing>"),
            host = headers.get(HOST).and_then(|v| v.to_str().ok()).unwrap_or("<missing>"),
            "websocket handshake rejected: origin does not match host"
        );
        return RealtimeError::new(ErrorCode::AuthForbidden, "origin does not match host")
            .into_response();
    }

    let cookie_header =
        headers.get(COOKIE).and_then(|value| value.to_str().ok()).map(ToOwned::to_owned);
    let request_id = request_id_from_headers_or_generate(&headers);

    ws.on_upgrade(move |socket| async move {
        with_request_id_scope(request_id, handle_socket(state, cookie_header, socket)).await;
    })
}

/// Cross-site socket hijacking guard: the `Origin` header must be a
/// well-formed URL whose authority exactly equals the `Host` header. Absent
/// headers fail the check.
pub(crate) fn origin_matches_host(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(ORIGIN).and_then(|value| value.to_str().ok()) else {
        return false;
    };
    let Some(host) = headers.get(HOST).and_then(|value| value.to_str().ok()) else {
        return false;
    };
    let Ok(origin_url) = Url::parse(origin) else {
        return false;
    };
    let Some(origin_host) = origin_url.host_str() else {
        return false;
    };

    let origin_authority = match origin_url.port() {
        Some(port) => format!("{origin_host}:{port}"),
        None => origin_host.to_string(),
    };

    origin_authority == host
}

async fn handle_socket(state: RealtimeState, cookie_header: Option<String>, mut socket: WebSocket) {
    // The handshake reuses the HTTP session store; auth failure leaves the
    // socket open but unbound.
    let auth = state.sessions.resolve(cookie_header.as_deref()).await;
    let user_id = auth.user_id().map(ToOwned::to_owned);

    let (outbound_sender, mut outbound_receiver) = mpsc::unbounded_channel::<SocketCommand>();
    let session_id = state.registry.register(outbound_sender, user_id.clone()).await;

    let welcome = ServerMessage::Welcome { message: "connected to squadlink realtime".to_string() };
    if send_message(&mut socket, &welcome).await.is_err() {
        state.registry.remove(session_id).await;
        return;
    }

    let auth_frame = match &user_id {
        Some(user_id) => ServerMessage::AuthSuccess { user_id: user_id.clone() },
        None => ServerMessage::AuthFailed { message: "no valid session".to_string() },
    };
    if send_message(&mut socket, &auth_frame).await.is_err() {
        state.registry.remove(session_id).await;
        return;
    }

    loop {
        tokio::select! {
            maybe_command = outbound_receiver.recv() => {
                match maybe_command {
                    Some(SocketCommand::Frame(message)) => {
                        if send_message(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    Some(SocketCommand::Ping) => {
                        if socket.send(Message::Ping(vec![].into())).await.is_err() {
                            break;
                        }
                    }
                    Some(SocketCommand::Close) | None => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            maybe_message = socket.recv() => {
                let Some(message) = maybe_message else {
                    break;
                };

                match message {
                    Ok(Message::Text(raw_message)) => {
                        let inbound = match serde_json::from_str::<ClientMessage>(&raw_message) {
                            Ok(inbound) => inbound,
                            Err(parse_error) => {
                                // Malformed frames are dropped without a reply.
                                debug!(
                                    session_id = %session_id,
                                    error = %parse_error,
                                    "dropping malformed websocket frame"
                                );
                                continue;
                            }
                        };

                        if handle_client_message(
                            &state,
                            session_id,
                            user_id.as_deref(),
                            &mut socket,
                            inbound,
                        )
                        .await
                        .is_err()
                        {
                            break;
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Pong(_)) => {
                        state.registry.touch(session_id).await;
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        }
    }

    state.registry.remove(session_id).await;
}

async fn handle_client_message(
    state: &RealtimeState,
    session_id: Uuid,
    sender_user_id: Option<&str>,
    socket: &mut WebSocket,
    inbound: ClientMessage,
) -> Result<(), ()> {
    match inbound {
        ClientMessage::Ping => send_message(socket, &ServerMessage::Pong).await,
        ClientMessage::WebrtcOffer { target_user_id, connection_id, offer } => {
            relay_signal(
                state,
                session_id,
                sender_user_id,
                socket,
                SignalKind::Offer,
                target_user_id,
                connection_id,
                offer,
            )
            .await
        }
        ClientMessage::WebrtcAnswer { target_user_id, connection_id, answer } => {
            relay_signal(
                state,
                session_id,
                sender_user_id,
                socket,
                SignalKind::Answer,
                target_user_id,
                connection_id,
                answer,
            )
            .await
        }
        ClientMessage::WebrtcIceCandidate { target_user_id, connection_id, candidate } => {
            relay_signal(
                state,
                session_id,
                sender_user_id,
                socket,
                SignalKind::IceCandidate,
                target_user_id,
                connection_id,
                candidate,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn relay_signal(
    state: &RealtimeState,
    session_id: Uuid,
    sender_user_id: Option<&str>,
    socket: &mut WebSocket,
    kind: SignalKind,
    target_user_id: Option<String>,
    connection_id: Option<Uuid>,
    payload: Value,
) -> Result<(), ()> {
    // The authorize call awaits storage; the socket may close underneath it.
    // Delivery below goes through command channels, which detect that.
    match state
        .signaling
        .authorize(sender_user_id, target_user_id.as_deref(), connection_id)
        .await
    {
        Ok(grant) => {
            let relayed = kind.relayed(&grant, payload);
            let delivered = state
                .dispatcher
                .to_users(std::slice::from_ref(&grant.target_user_id), relayed)
                .await;
            debug!(
                session_id = %session_id,
                target_user_id = %grant.target_user_id,
                connection_id = %grant.connection_id,
                delivered,
                "signaling frame relayed"
            );
            Ok(())
        }
        Err(reject) => {
            debug!(
                session_id = %session_id,
                reason = reject.message(),
                "signaling frame rejected"
            );
            send_message(socket, &ServerMessage::Error { message: reject.message().to_string() })
                .await
        }
    }
}

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), ()> {
    let encoded = serde_json::to_string(message).map_err(|_| ())?;
    socket.send(Message::Text(encoded.into())).await.map_err(|_| ())
}
