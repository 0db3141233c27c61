use std::io::SeekFrom;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use satchel_media::{now_millis, FileDescriptor, MediaReader};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::Envelope;

/// Resolution of a `Range` request header against the blob size.
#[derive(Debug, PartialEq, Eq)]
enum ByteRange {
    /// No usable range: serve the whole blob. Malformed and multi-part
    /// ranges land here too.
    Full,
    /// One satisfiable inclusive slice.
    Slice { start: u64, end: u64 },
    Unsatisfiable,
}

fn parse_range(value: Option<&str>, size: u64) -> ByteRange {
    let Some(value) = value else {
        return ByteRange::Full;
    };
    let Some(spec) = value.strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    if spec.contains(',') {
        return ByteRange::Full;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return ByteRange::Full;
    };

    if first.is_empty() {
        // Suffix form: the last n bytes.
        let Ok(n) = last.parse::<u64>() else {
            return ByteRange::Full;
        };
        if n == 0 || size == 0 {
            return ByteRange::Unsatisfiable;
        }
        return ByteRange::Slice {
            start: size.saturating_sub(n),
            end: size - 1,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return ByteRange::Full;
    };
    if start >= size {
        return ByteRange::Unsatisfiable;
    }
    let end = if last.is_empty() {
        size - 1
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(size - 1),
            _ => return ByteRange::Full,
        }
    };
    ByteRange::Slice { start, end }
}

fn http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Stream a downloaded blob with range and conditional-request support.
///
/// The reader moves into the response body, so it is released exactly once
/// when the body is dropped - complete transfer, partial read and client
/// disconnect alike. `updated_at` drives `Last-Modified` and
/// `If-Modified-Since`.
pub async fn serve_content(
    req_headers: &HeaderMap,
    descriptor: &FileDescriptor,
    mut content: MediaReader,
) -> Response {
    let size = match content.seek(SeekFrom::End(0)).await {
        Ok(size) => size,
        Err(_) => return Envelope::err_unknown("", now_millis()).into_response(),
    };

    let mut headers = HeaderMap::new();
    let mime = if descriptor.mime_type.is_empty() {
        "application/octet-stream"
    } else {
        descriptor.mime_type.as_str()
    };
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    // Never render inline, whatever the sniffed type claims.
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment"),
    );
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Ok(value) = HeaderValue::from_str(&http_date(&descriptor.updated_at)) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    let since = req_headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok());
    if let Some(since) = since {
        // Last-Modified carries second resolution; compare at that grain.
        if descriptor.updated_at.timestamp() <= since.timestamp() {
            return (StatusCode::NOT_MODIFIED, headers).into_response();
        }
    }

    let range = req_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());
    match parse_range(range, size) {
        ByteRange::Unsatisfiable => {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response()
        }
        ByteRange::Slice { start, end } => {
            if content.seek(SeekFrom::Start(start)).await.is_err() {
                return Envelope::err_unknown("", now_millis()).into_response();
            }
            let len = end - start + 1;
            if let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{size}")) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
            let body = Body::from_stream(ReaderStream::new(content.take(len)));
            (StatusCode::PARTIAL_CONTENT, headers, body).into_response()
        }
        ByteRange::Full => {
            if content.seek(SeekFrom::Start(0)).await.is_err() {
                return Envelope::err_unknown("", now_millis()).into_response();
            }
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            let body = Body::from_stream(ReaderStream::new(content));
            (StatusCode::OK, headers, body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::io::Cursor;

    fn descriptor() -> FileDescriptor {
        FileDescriptor::new("usr-1").with_mime_type("image/png")
    }

    fn reader(data: &[u8]) -> MediaReader {
        Box::pin(Cursor::new(data.to_vec()))
    }

    async fn body_bytes(res: Response) -> Vec<u8> {
        res.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[test]
    fn range_parsing_covers_the_single_range_forms() {
        assert_eq!(parse_range(None, 10), ByteRange::Full);
        assert_eq!(
            parse_range(Some("bytes=2-4"), 10),
            ByteRange::Slice { start: 2, end: 4 }
        );
        assert_eq!(
            parse_range(Some("bytes=7-"), 10),
            ByteRange::Slice { start: 7, end: 9 }
        );
        assert_eq!(
            parse_range(Some("bytes=-3"), 10),
            ByteRange::Slice { start: 7, end: 9 }
        );
        assert_eq!(
            parse_range(Some("bytes=0-999"), 10),
            ByteRange::Slice { start: 0, end: 9 }
        );
        assert_eq!(parse_range(Some("bytes=10-"), 10), ByteRange::Unsatisfiable);
        // Multi-part and malformed specs are ignored.
        assert_eq!(parse_range(Some("bytes=0-1,3-4"), 10), ByteRange::Full);
        assert_eq!(parse_range(Some("items=0-1"), 10), ByteRange::Full);
        assert_eq!(parse_range(Some("bytes=x-y"), 10), ByteRange::Full);
    }

    #[tokio::test]
    async fn full_serve_sets_download_headers() {
        let res = serve_content(&HeaderMap::new(), &descriptor(), reader(b"0123456789")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(res.headers()[header::CONTENT_DISPOSITION], "attachment");
        assert_eq!(res.headers()[header::ACCEPT_RANGES], "bytes");
        assert!(res.headers().contains_key(header::LAST_MODIFIED));
        assert_eq!(body_bytes(res).await, b"0123456789");
    }

    #[tokio::test]
    async fn ranged_serve_returns_partial_content() {
        let mut req = HeaderMap::new();
        req.insert(header::RANGE, HeaderValue::from_static("bytes=2-4"));
        let res = serve_content(&req, &descriptor(), reader(b"0123456789")).await;
        assert_eq!(res.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(res.headers()[header::CONTENT_RANGE], "bytes 2-4/10");
        assert_eq!(res.headers()[header::CONTENT_LENGTH], "3");
        assert_eq!(body_bytes(res).await, b"234");
    }

    #[tokio::test]
    async fn out_of_bounds_range_is_416() {
        let mut req = HeaderMap::new();
        req.insert(header::RANGE, HeaderValue::from_static("bytes=99-"));
        let res = serve_content(&req, &descriptor(), reader(b"0123456789")).await;
        assert_eq!(res.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(res.headers()[header::CONTENT_RANGE], "bytes */10");
    }

    #[tokio::test]
    async fn if_modified_since_yields_304() {
        let fd = descriptor();
        let mut req = HeaderMap::new();
        let since = (fd.updated_at + chrono::TimeDelta::seconds(5))
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        req.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_str(&since).unwrap(),
        );
        let res = serve_content(&req, &fd, reader(b"0123456789")).await;
        assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn stale_if_modified_since_still_serves() {
        let fd = descriptor();
        let mut req = HeaderMap::new();
        let since = (fd.updated_at - chrono::TimeDelta::hours(1))
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        req.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_str(&since).unwrap(),
        );
        let res = serve_content(&req, &fd, reader(b"0123456789")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
