use std::sync::Arc;

use hyper::{header, Body, Method, Request, Response, StatusCode};

use tw_engine::Engine;
use tw_types::MAX_READ_LEN;

use crate::ws;

/// Route one request. Infallible by construction: every failure mode has an
/// HTTP shape.
pub async fn handle(req: Request<Body>, engine: Arc<Engine>) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/ws") => ws::upgrade(req, engine),
        (&Method::GET, "/v1/status") => status(&engine),
        (&Method::GET, "/v1/stats") => stats(&engine),
        (&Method::GET, "/v1/chars") => chars(req.uri().query(), &engine).await,
        _ => error_response(StatusCode::NOT_FOUND, "no such endpoint"),
    }
}

// ---

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    cursor: u64,
    chunks: u64,
    dictionary_size: usize,
    users: u64,
    chars_per_minute: u64,
    uptime_sec: u64,
    healthy: bool,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    users: u64,
    chars_per_minute: u64,
}

#[derive(serde::Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

fn status(engine: &Engine) -> Response<Body> {
    json_response(
        StatusCode::OK,
        &StatusResponse {
            cursor: engine.store().cursor(),
            chunks: engine.store().chunk_count(),
            dictionary_size: engine.dictionary_size(),
            users: engine.users_online(),
            chars_per_minute: engine.chars_per_minute(),
            uptime_sec: engine.uptime().as_secs(),
            healthy: engine.healthy(),
        },
    )
}

fn stats(engine: &Engine) -> Response<Body> {
    json_response(
        StatusCode::OK,
        &StatsResponse {
            users: engine.users_online(),
            chars_per_minute: engine.chars_per_minute(),
        },
    )
}

async fn chars(query: Option<&str>, engine: &Engine) -> Response<Body> {
    let (start, len) = match parse_chars_query(query) {
        Ok(range) => range,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    match engine.store().read_slice(start, len).await {
        Ok(text) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(text))
            .unwrap(),
        Err(err) => {
            log::warn!("stream read [{start}, {start}+{len}) failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "stream read failed")
        }
    }
}

/// Validate `?start=<u64>&len=<u32>`. The error string is user-facing.
fn parse_chars_query(query: Option<&str>) -> Result<(u64, u64), String> {
    let mut start = None;
    let mut len = None;
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        match key.as_ref() {
            "start" => start = Some(value.into_owned()),
            "len" => len = Some(value.into_owned()),
            _ => {}
        }
    }

    let start: u64 = start
        .ok_or("missing query parameter `start`")?
        .parse()
        .map_err(|_| "`start` must be a non-negative integer")?;
    let len: u64 = len
        .ok_or("missing query parameter `len`")?
        .parse()
        .map_err(|_| "`len` must be a positive integer")?;

    if len == 0 {
        return Err("`len` must be positive".to_owned());
    }
    if len > MAX_READ_LEN {
        return Err(format!("`len` must be at most {MAX_READ_LEN}"));
    }
    Ok((start, len))
}

pub(crate) fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let json = serde_json::to_string(body).unwrap();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json))
        .unwrap()
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &ErrorResponse { error: message })
}

// ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chars_query_validation() {
        assert_eq!(parse_chars_query(Some("start=0&len=10")), Ok((0, 10)));
        assert_eq!(
            parse_chars_query(Some("len=131072&start=8")),
            Ok((8, 131_072))
        );

        for bad in [
            None,
            Some(""),
            Some("start=0"),             // missing len
            Some("len=10"),              // missing start
            Some("start=-1&len=10"),     // negative
            Some("start=abc&len=10"),    // not a number
            Some("start=1.5&len=10"),    // not an integer
            Some("start=0&len=0"),       // empty read
            Some("start=0&len=131073"),  // over the cap
            Some("start=0&len=nan"),
        ] {
            assert!(parse_chars_query(bad).is_err(), "accepted {bad:?}");
        }
    }
}
