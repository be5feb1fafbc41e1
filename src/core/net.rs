// src/core/net.rs
// Blocking HTTP(S) GET for the page holding the table.

use std::error::Error as StdError;
use std::io::{self, Read};
use std::time::Duration;

use encoding_rs::{DecoderResult, Encoding, UTF_8};
use thiserror::Error;

use crate::config::consts::{MAX_BODY_BYTES, USER_AGENT};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} timed out after {}s", timeout.as_secs_f64())]
    Timeout { url: String, timeout: Duration },

    #[error("failed to download {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP error {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("response from {url} is larger than {limit} bytes")]
    TooLarge { url: String, limit: u64 },
}

/// GET `url` and return the body decoded to text.
///
/// * `timeout` bounds the whole request (connect, headers and body).
/// * Non-2xx responses are errors; the parser never sees their bodies.
/// * The body is decoded with the `Content-Type` charset (UTF-8 when absent);
///   bytes that do not decode are dropped.
/// * Bodies over [`MAX_BODY_BYTES`] fail with `TooLarge` instead of being cut off.
pub fn fetch_page(url: &str, timeout: Duration) -> Result<String, FetchError> {
    fetch_limited(url, timeout, MAX_BODY_BYTES)
}

fn fetch_limited(url: &str, timeout: Duration, limit: u64) -> Result<String, FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: s!(url),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl {
            url: s!(url),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    let agent = ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build();

    let t = std::time::Instant::now();
    let response = match agent.get(parsed.as_str()).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(status, _)) => {
            return Err(FetchError::Status { url: s!(url), status });
        }
        Err(ureq::Error::Transport(transport)) => {
            if is_timeout(&transport) {
                return Err(FetchError::Timeout { url: s!(url), timeout });
            }
            return Err(FetchError::Transport { url: s!(url), message: transport.to_string() });
        }
    };

    let charset = s!(response.charset());
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(limit + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| {
            if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                FetchError::Timeout { url: s!(url), timeout }
            } else {
                FetchError::Body { url: s!(url), source: e }
            }
        })?;
    if bytes.len() as u64 > limit {
        loge!("GET {url}: body exceeds {limit} bytes");
        return Err(FetchError::TooLarge { url: s!(url), limit });
    }
    logf!("GET {url}: {} bytes ({charset}) in {:?}", bytes.len(), t.elapsed());

    Ok(decode_body(&bytes, &charset))
}

/// Decode with the labelled charset, falling back to UTF-8 for unknown labels.
/// A byte-order mark overrides the label. Malformed byte sequences are skipped;
/// U+FFFD characters present in the source are kept.
pub fn decode_body(bytes: &[u8], charset: &str) -> String {
    let labelled = Encoding::for_label(charset.trim().as_bytes()).unwrap_or(UTF_8);
    let (encoding, bom_len) = Encoding::for_bom(bytes).unwrap_or((labelled, 0));
    let mut decoder = encoding.new_decoder_without_bom_handling();

    let mut input = &bytes[bom_len..];
    let mut out = String::new();
    let mut dropped = 0usize;
    loop {
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(input.len())
            .unwrap_or(input.len() * 3 + 16);
        out.reserve(needed);
        let (result, read) = decoder.decode_to_string_without_replacement(input, &mut out, true);
        input = &input[read..];
        match result {
            DecoderResult::InputEmpty => break,
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(bad, _) => dropped += bad as usize,
        }
    }
    if dropped > 0 {
        logw!("Dropped {dropped} undecodable bytes while reading the page as {}", encoding.name());
    }
    out
}

fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut cur = Some(err);
    while let Some(e) = cur {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            if matches!(io.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        cur = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_declared_charset() {
        let latin1 = [0x43, 0x61, 0x66, 0xE9];
        assert_eq!(decode_body(&latin1, "ISO-8859-1"), "Café");
    }

    #[test]
    fn unknown_charset_falls_back_to_utf8() {
        assert_eq!(decode_body("Haikou ✈".as_bytes(), "x-made-up"), "Haikou ✈");
    }

    #[test]
    fn invalid_bytes_are_dropped() {
        assert_eq!(decode_body(b"A\xffB", "utf-8"), "AB");
    }

    #[test]
    fn non_http_urls_are_rejected_without_io() {
        let err = fetch_page("ftp://example.com/table", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        let err = fetch_page("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn timeout_is_detected_through_source_chain() {
        let io = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(is_timeout(&io));
        let io = io::Error::new(io::ErrorKind::ConnectionRefused, "nope");
        assert!(!is_timeout(&io));
    }

    #[test]
    fn source_replacement_characters_survive_bad_bytes() {
        let mut bytes = "A\u{fffd}B".as_bytes().to_vec();
        bytes.extend_from_slice(b"\xffC");
        assert_eq!(decode_body(&bytes, "utf-8"), "A\u{fffd}BC");
    }

    #[test]
    fn bom_overrides_label() {
        let bytes = b"\xEF\xBB\xBFCaf\xC3\xA9";
        assert_eq!(decode_body(bytes, "ISO-8859-1"), "Café");
    }

    /* ---------------- Loopback server ---------------- */

    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn read_request(stream: &mut TcpStream) {
        let mut buf = [0u8; 1024];
        let mut seen = Vec::new();
        while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => seen.extend_from_slice(&buf[..n]),
            }
        }
    }

    /// Serve one connection with `handler`; returns the URL to hit.
    fn serve_once<F>(handler: F) -> (String, thread::JoinHandle<()>)
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                handler(stream);
            }
        });
        (url, handle)
    }

    fn respond(status: &str, body: Vec<u8>) -> impl FnOnce(TcpStream) + Send + 'static {
        let status = s!(status);
        move |mut stream| {
            read_request(&mut stream);
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
        }
    }

    #[test]
    fn ok_response_is_decoded() {
        let (url, server) = serve_once(respond("200 OK", "<p>Haikou ✈</p>".as_bytes().to_vec()));
        let body = fetch_page(&url, Duration::from_secs(5)).unwrap();
        assert_eq!(body, "<p>Haikou ✈</p>");
        server.join().unwrap();
    }

    #[test]
    fn non_2xx_is_a_status_error() {
        let (url, server) = serve_once(respond("404 Not Found", b"missing".to_vec()));
        let err = fetch_page(&url, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }), "{err:?}");
        server.join().unwrap();
    }

    #[test]
    fn silent_server_times_out() {
        let (url, server) = serve_once(|mut stream| {
            read_request(&mut stream);
            thread::sleep(Duration::from_secs(2));
        });
        let err = fetch_page(&url, Duration::from_millis(300)).unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "{err:?}");
        server.join().unwrap();
    }

    #[test]
    fn closed_port_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);
        let err = fetch_page(&url, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }), "{err:?}");
    }

    #[test]
    fn body_over_the_limit_is_rejected() {
        let mut page = b"<table>".to_vec();
        page.extend(std::iter::repeat_n(b'x', 4096));
        page.extend_from_slice(b"<tr><td>LAST</td></tr></table>");
        let (url, server) = serve_once(respond("200 OK", page));
        let err = fetch_limited(&url, Duration::from_secs(5), 1024).unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 1024, .. }), "{err:?}");
        server.join().unwrap();
    }

    #[test]
    fn body_at_the_limit_is_accepted() {
        let page = vec![b'x'; 1024];
        let (url, server) = serve_once(respond("200 OK", page));
        let body = fetch_limited(&url, Duration::from_secs(5), 1024).unwrap();
        assert_eq!(body.len(), 1024);
        server.join().unwrap();
    }
}
