//! HTTP/WebSocket transport (spec §4.A, §4.E): warp routes for `POST /`,
//! `GET /` (query-string convenience form), `OPTIONS /`, and `GET /ws`.
//! Ported from the reference node's `rpc_server.rs::build_rpc_routes` /
//! `handle_post_request` / `handle_get_request` / `process_body` /
//! `process_array` / `process_object` / `verify_basic_auth` / `apply_cors`
//! / `build_http_response`, generalized onto the `Dispatcher`/
//! `HandlerContext` pair instead of a concrete `RpcServer::handler_lookup`.

use std::convert::Infallible;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::Value;
use subtle::ConstantTimeEq;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use warp::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, WWW_AUTHENTICATE,
};
use warp::http::StatusCode;
use warp::reply::Response as HttpResponse;
use warp::{Filter, Reply};

use crate::chain::Chain;
use crate::codec::{decode_get_query, decode_request, error_response, success_response, RpcQueryParams, WireRequest};
use crate::config::RpcServerConfig;
use crate::dispatcher::{Dispatcher, HandlerContext};
use crate::error::RpcError;
use crate::hub::event_loop::SubscriptionHub;
use crate::hub::ws::{admit, handle_connection, WsDeps};
use crate::oracle::Oracle;
use crate::p2p::P2PServer;
use crate::state_module::StateModule;

#[derive(Clone)]
struct BasicAuth {
    user: Vec<u8>,
    pass: Vec<u8>,
}

impl BasicAuth {
    fn from_config(config: &RpcServerConfig) -> Option<Self> {
        if config.rpc_user.trim().is_empty() {
            return None;
        }
        Some(Self {
            user: config.rpc_user.as_bytes().to_vec(),
            pass: config.rpc_pass.as_bytes().to_vec(),
        })
    }
}

#[derive(Clone)]
struct CorsConfig {
    allow_any: bool,
    origins: Vec<HeaderValue>,
}

impl CorsConfig {
    fn from_config(config: &RpcServerConfig) -> Option<Self> {
        if !config.enable_cors_workaround {
            return None;
        }
        let origins = config
            .allow_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>();
        Some(Self {
            allow_any: config.allow_origins.is_empty(),
            origins,
        })
    }

    fn origin_header(&self) -> Option<HeaderValue> {
        if self.allow_any {
            Some(HeaderValue::from_static("*"))
        } else {
            self.origins.first().cloned()
        }
    }
}

/// Everything the route handlers need, held behind one `Clone`-able struct
/// so warp's filter combinators can pass it through each request.
#[derive(Clone)]
pub struct RpcTransport {
    dispatcher: Arc<Dispatcher>,
    config: Arc<RpcServerConfig>,
    chain: Arc<dyn Chain>,
    p2p: Arc<dyn P2PServer>,
    oracle: Arc<dyn Oracle>,
    state_module: Arc<dyn StateModule>,
    hub: Arc<SubscriptionHub>,
    auth: Arc<Option<BasicAuth>>,
    cors: Option<CorsConfig>,
    semaphore: Arc<Semaphore>,
}

impl RpcTransport {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        config: Arc<RpcServerConfig>,
        chain: Arc<dyn Chain>,
        p2p: Arc<dyn P2PServer>,
        oracle: Arc<dyn Oracle>,
        state_module: Arc<dyn StateModule>,
        hub: Arc<SubscriptionHub>,
    ) -> Self {
        let auth = Arc::new(BasicAuth::from_config(&config));
        let cors = CorsConfig::from_config(&config);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_connections.max(1)));
        Self {
            dispatcher,
            config,
            chain,
            p2p,
            oracle,
            state_module,
            hub,
            auth,
            cors,
            semaphore,
        }
    }

    fn http_context(&self) -> HandlerContext<'_> {
        HandlerContext {
            chain: self.chain.as_ref(),
            p2p: self.p2p.as_ref(),
            oracle: self.oracle.as_ref(),
            state_module: self.state_module.as_ref(),
            config: self.config.as_ref(),
            subscriber: None,
            hub: None,
        }
    }

    fn dispatch_one(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let ctx = self.http_context();
        self.dispatcher.dispatch(method, params, &ctx, false)
    }
}

pub fn build_routes(transport: RpcTransport) -> impl Filter<Extract = (HttpResponse,), Error = warp::Rejection> + Clone {
    let max_body = transport.config.max_request_body_size as u64;

    let post_route = warp::path::end()
        .and(warp::post())
        .and(with_transport(transport.clone()))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::body::content_length_limit(max_body.max(1)))
        .and(warp::body::bytes())
        .and_then(handle_post_request);

    let get_route = warp::path::end()
        .and(warp::get())
        .and(with_transport(transport.clone()))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::query::<RpcQueryParams>())
        .and_then(handle_get_request);

    let options_route = warp::path::end()
        .and(warp::options())
        .and(with_transport(transport.clone()))
        .map(|transport: RpcTransport| {
            let mut response = HttpResponse::new(Vec::new().into());
            *response.status_mut() = StatusCode::NO_CONTENT;
            apply_cors(&mut response, transport.cors.as_ref());
            response
        });

    let read_limit = transport.config.websocket_read_limit() as u64;
    let ws_route = warp::path("ws")
        .and(warp::ws())
        .and(with_transport(transport.clone()))
        .map(move |ws: warp::ws::Ws, transport: RpcTransport| {
            let ws = ws.max_message_size(read_limit as usize);
            if !admit(transport.hub.subscriber_count(), transport.config.max_subscribers) {
                return warp::reply::with_status(warp::reply(), StatusCode::SERVICE_UNAVAILABLE).into_response();
            }
            let response = ws.on_upgrade(move |socket| {
                let deps = Arc::new(WsDeps {
                    hub: transport.hub.clone(),
                    dispatcher: transport.dispatcher.clone(),
                    config: transport.config.clone(),
                    chain: transport.chain.clone(),
                    p2p: transport.p2p.clone(),
                    oracle: transport.oracle.clone(),
                    state_module: transport.state_module.clone(),
                });
                handle_connection(socket, deps)
            });
            response.into_response()
        });

    let fallback = warp::any()
        .and(with_transport(transport))
        .map(|transport: RpcTransport| {
            let error = RpcError::invalid_params().with_data("please retry with POST");
            let mut response = build_http_response(RequestOutcome::single_error(None, &error));
            apply_cors(&mut response, transport.cors.as_ref());
            response
        });

    post_route
        .or(get_route)
        .unify()
        .or(options_route)
        .unify()
        .or(ws_route)
        .unify()
        .or(fallback)
        .unify()
}

fn with_transport(transport: RpcTransport) -> impl Filter<Extract = (RpcTransport,), Error = Infallible> + Clone {
    warp::any().map(move || transport.clone())
}

/// Mirrors the reference node's `RequestOutcome`: a decoded body plus the HTTP
/// status it should be served under. Single-invocation errors carry their
/// own `RpcErrorKind::http_status()` (spec §4.A); batches and successes are
/// always 200, since a batch's per-entry errors ride inside the array.
struct RequestOutcome {
    body: Option<Value>,
    status: StatusCode,
    challenge: bool,
}

impl RequestOutcome {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            body: Some(success_response(id, result)),
            status: StatusCode::OK,
            challenge: false,
        }
    }

    fn single_error(id: Option<Value>, error: &RpcError) -> Self {
        Self {
            body: Some(error_response(id, error)),
            status: error.http_status(),
            challenge: false,
        }
    }

    fn batch(responses: Vec<Value>) -> Self {
        Self {
            body: Some(Value::Array(responses)),
            status: StatusCode::OK,
            challenge: false,
        }
    }

    fn unauthorized(id: Option<Value>) -> Self {
        Self {
            body: Some(error_response(id, &RpcError::access_denied())),
            status: StatusCode::UNAUTHORIZED,
            challenge: true,
        }
    }

    fn internal_error() -> Self {
        let error = RpcError::internal_server_error();
        Self {
            status: error.http_status(),
            body: Some(error_response(None, &error)),
            challenge: false,
        }
    }

    /// A request with no `id` is a JSON-RPC notification: the handler still
    /// runs for its side effect, but the caller gets no body (spec §4.A).
    fn notification() -> Self {
        Self {
            body: None,
            status: StatusCode::NO_CONTENT,
            challenge: false,
        }
    }
}

async fn handle_post_request(
    transport: RpcTransport,
    auth_header: Option<String>,
    body: Bytes,
) -> Result<HttpResponse, Infallible> {
    let permit = acquire_permit(transport.semaphore.clone()).await;
    let outcome = if permit.is_some() {
        process_body(&transport, auth_header.as_deref(), body.as_ref())
    } else {
        RequestOutcome::internal_error()
    };
    drop(permit);

    let mut http_response = build_http_response(outcome);
    apply_cors(&mut http_response, transport.cors.as_ref());
    Ok(http_response)
}

async fn handle_get_request(
    transport: RpcTransport,
    auth_header: Option<String>,
    query: RpcQueryParams,
) -> Result<HttpResponse, Infallible> {
    let permit = acquire_permit(transport.semaphore.clone()).await;
    let outcome = if permit.is_some() {
        match decode_get_query(&query) {
            Ok(invocation) => {
                if let Some(auth) = transport.auth.as_ref() {
                    if !verify_basic_auth(auth_header.as_deref(), auth) {
                        RequestOutcome::unauthorized(invocation.id)
                    } else {
                        let outcome = transport.dispatch_one(&invocation.method, &invocation.params);
                        render(invocation.id, outcome)
                    }
                } else {
                    let outcome = transport.dispatch_one(&invocation.method, &invocation.params);
                    render(invocation.id, outcome)
                }
            }
            Err(error) => RequestOutcome::single_error(None, &error),
        }
    } else {
        RequestOutcome::internal_error()
    };
    drop(permit);

    let mut http_response = build_http_response(outcome);
    apply_cors(&mut http_response, transport.cors.as_ref());
    Ok(http_response)
}

async fn acquire_permit(semaphore: Arc<Semaphore>) -> Option<OwnedSemaphorePermit> {
    semaphore.acquire_owned().await.ok()
}

fn render(id: Option<Value>, outcome: Result<Value, RpcError>) -> RequestOutcome {
    if id.is_none() {
        return RequestOutcome::notification();
    }
    match outcome {
        Ok(result) => RequestOutcome::success(id, result),
        Err(error) => RequestOutcome::single_error(id, &error),
    }
}

fn process_body(transport: &RpcTransport, auth_header: Option<&str>, body: &[u8]) -> RequestOutcome {
    if let Some(auth) = transport.auth.as_ref() {
        if !verify_basic_auth(auth_header, auth) {
            return RequestOutcome::unauthorized(None);
        }
    }

    match decode_request(body) {
        Ok(WireRequest::Single(invocation)) => {
            let outcome = transport.dispatch_one(&invocation.method, &invocation.params);
            render(invocation.id, outcome)
        }
        Ok(WireRequest::Batch(entries)) => {
            let responses: Vec<Value> = entries
                .into_iter()
                .map(|entry| match entry {
                    Ok(invocation) => {
                        let outcome = transport.dispatch_one(&invocation.method, &invocation.params);
                        match outcome {
                            Ok(result) => success_response(invocation.id, result),
                            Err(error) => error_response(invocation.id, &error),
                        }
                    }
                    Err((id, error)) => error_response(id, &error),
                })
                .collect();
            RequestOutcome::batch(responses)
        }
        Err(error) => RequestOutcome::single_error(None, &error),
    }
}

fn verify_basic_auth(header: Option<&str>, auth: &BasicAuth) -> bool {
    let header = match header {
        Some(value) => value.trim(),
        None => return false,
    };

    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("basic") {
        return false;
    }

    let value = parts.next().unwrap_or("").trim();
    let decoded = match BASE64_STANDARD.decode(value) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let Some(index) = decoded.iter().position(|byte| *byte == b':') else {
        return false;
    };
    let (user, pass) = decoded.split_at(index);
    let pass = &pass[1..];

    constant_time_equals(user, &auth.user) && constant_time_equals(pass, &auth.pass)
}

fn constant_time_equals(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len() && left.ct_eq(right).into()
}

fn apply_cors(response: &mut HttpResponse, cors: Option<&CorsConfig>) {
    if let Some(cors) = cors {
        if let Some(origin) = cors.origin_header() {
            response.headers_mut().insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        response.headers_mut().insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, GET, OPTIONS"),
        );
        response.headers_mut().insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type, authorization"),
        );
    }
}

fn build_http_response(outcome: RequestOutcome) -> HttpResponse {
    let mut response = match outcome.body {
        Some(body) => {
            let json = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());
            let mut response = HttpResponse::new(json.into());
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            *response.status_mut() = outcome.status;
            response
        }
        // A request the codec recognized as a notification (no `id`) gets
        // no body at all (spec §4.A): 204 regardless of handler outcome.
        None => {
            let mut response = HttpResponse::new(Vec::new().into());
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
        }
    };

    if outcome.challenge {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"Restricted\""));
    }

    response
}
