use std::time::{Duration, Instant};

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use codecollab_core::{AppError, ErrorBody};
use maud::{Markup, PreEscaped, html};
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

pub fn timeago(value: OffsetDateTime) -> String {
    let Ok(duration) = Duration::try_from(OffsetDateTime::now_utc() - value) else {
        return "just now".to_string();
    };
    timeago::Formatter::new().convert(duration)
}

/// Format a size in bytes to a human-readable string.
/// Uses SI (kilo = 1000) units, formatted to two decimal places.
pub fn size(value: u64) -> String {
    let units = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
    let mut value = value as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < units.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", value, units[unit])
    } else {
        format!("{:.2} {}", value, units[unit])
    }
}

const STYLE: &str = r#"
body{font-family:system-ui,sans-serif;margin:0;background:#eef2f7;color:#333}
header nav{display:flex;justify-content:space-between;align-items:center;padding:1rem 2rem;background:linear-gradient(90deg,#4a00e0,#8e2de2)}
header nav ul{display:flex;gap:1.5rem;list-style:none;margin:0;padding:0}
header nav a{color:#fff;text-decoration:none}
main{padding:2rem 3rem}
.cards{display:grid;grid-template-columns:1fr 1fr;gap:2rem;margin-bottom:2rem}
.grid{display:grid;grid-template-columns:repeat(3,1fr);gap:2rem}
article{background:#fff;border-radius:16px;box-shadow:0 6px 20px rgba(0,0,0,.1);padding:1.25rem;min-height:10rem}
article h5{margin:0 0 .75rem;font-size:1.1rem}
.empty{text-align:center;padding:2.5rem;color:#555}
.badge{display:inline-block;padding:.35rem .75rem;border-radius:12px;margin:.3rem .3rem 0 0;color:#fff;font-weight:600;font-size:.9rem}
.status{display:inline-block;padding:.1rem .5rem;border-radius:8px;background:#ddd;font-size:.85rem}
.status.Active{background:#c8f7c5}.status.Completed{background:#c5d8f7}
.legend{list-style:none;padding:0;font-size:.85rem}
.swatch{display:inline-block;width:.8rem;height:.8rem;border-radius:2px;margin-right:.4rem}
footer{padding:1rem 3rem;color:#777}
"#;

pub fn header() -> Markup {
    html! {
        meta name="viewport" content="width=device-width, initial-scale=1.0";
        meta name="color-scheme" content="light";
        style { (PreEscaped(STYLE)) }
    }
}

pub fn nav() -> Markup {
    html! {
        header {
            nav {
                ul {
                    li { a href="/" { strong { "CodeCollab" } } }
                    li { a href="/dashboard" { "Analytics" } }
                    li { a href="/projects" { "Projects API" } }
                }
            }
        }
    }
}

pub fn footer(start: Instant) -> Markup {
    let elapsed = start.elapsed();
    html! {
        footer {
            small { "Generated in " (elapsed.as_millis()) "ms" }
        }
    }
}

pub async fn ping() -> &'static str { "PONG" }

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody { error: "Route not found" })).into_response()
}

/// JSON request body whose rejections are reported as `400 {"error": ...}`.
///
/// A request without a JSON content type or with an empty body is read as
/// `{}`, so handlers report their own missing-field errors.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = if is_json(req.headers()) {
            Bytes::from_request(req, state)
                .await
                .map_err(|rejection| AppError::validation(rejection.body_text()))?
        } else {
            Bytes::new()
        };
        let bytes: &[u8] =
            if bytes.iter().all(u8::is_ascii_whitespace) { b"{}" } else { &bytes };
        match Json::<T>::from_bytes(bytes) {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::validation(rejection.body_text())),
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json")
        || essence.to_ascii_lowercase().ends_with("+json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        assert_eq!(size(0), "0 B");
        assert_eq!(size(999), "999 B");
        assert_eq!(size(1200), "1.20 kB");
        assert_eq!(size(3_456_789), "3.46 MB");
    }

    #[test]
    fn test_is_json() {
        let cases = [
            (Some("application/json"), true),
            (Some("application/json; charset=utf-8"), true),
            (Some("application/merge-patch+json"), true),
            (Some("text/plain"), false),
            (None, false),
        ];
        for (content_type, expected) in cases {
            let mut headers = HeaderMap::new();
            if let Some(value) = content_type {
                headers.insert(header::CONTENT_TYPE, value.parse().unwrap());
            }
            assert_eq!(is_json(&headers), expected, "{content_type:?}");
        }
    }

    #[test]
    fn test_timeago() {
        let an_hour_ago = OffsetDateTime::now_utc() - time::Duration::hours(1);
        assert_eq!(timeago(an_hour_ago), "1 hour ago");
        assert_eq!(timeago(OffsetDateTime::now_utc() + time::Duration::hours(1)), "just now");
    }
}
