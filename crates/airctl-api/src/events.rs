//! Server-sent event stream with auto-reconnect.
//!
//! Opens `GET {base}/api/bgh/events` as `text/event-stream`, decodes the
//! body incrementally and fans events out through a
//! [`tokio::sync::broadcast`] channel. Link status changes are delivered on
//! the same channel so consumers can react to outages. Reconnection uses
//! exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use airctl_api::{ApiClient, TransportConfig};
//! use airctl_api::events::{EventStreamHandle, ReconnectConfig, StreamEvent};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = ApiClient::new("https://api.example.com", TransportConfig::default())?;
//! let handle = EventStreamHandle::connect(client, ReconnectConfig::default(), CancellationToken::new())?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(StreamEvent::Message(event)) = rx.recv().await {
//!     println!("{}: {}", event.event, event.data);
//! }
//! ```

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use secrecy::ExposeSecret;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

const DEFAULT_EVENT_NAME: &str = "message";

/// Upper bound on bytes held for an event that has not been terminated.
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

// ── Stream items ─────────────────────────────────────────────────────

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Event name (`event:` field), `"message"` when absent.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
    /// Last seen `id:` value.
    pub id: Option<String>,
}

/// Connectivity of the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

/// Item delivered to subscribers.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Message(Arc<RawEvent>),
    Link(LinkStatus),
}

// ── Decoder ──────────────────────────────────────────────────────────

/// Incremental `text/event-stream` decoder.
///
/// Feed raw body chunks in any split; complete events come out as soon
/// as their terminating blank line has been seen. A peer that keeps
/// sending without ever completing an event is cut off once
/// [`MAX_PENDING_BYTES`] are buffered.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the current unterminated line. Never contains `\n`.
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_len: usize,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every event it completed.
    ///
    /// Fails with [`Error::EventStream`] when the unterminated event grows
    /// past [`MAX_PENDING_BYTES`]; the decoder is reset in that case.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<RawEvent>, Error> {
        // Earlier bytes hold no newline, so only the new chunk is scanned.
        let mut cursor = self.buf.len();
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[cursor..].iter().position(|b| *b == b'\n') {
            let end = cursor + offset;
            let mut line = &self.buf[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(event) = self.process_line(&line) {
                out.push(event);
            }
            start = end + 1;
            cursor = start;
        }
        self.buf.drain(..start);

        let pending = self.buf.len() + self.data_len;
        if pending > MAX_PENDING_BYTES {
            *self = Self {
                last_id: self.last_id.take(),
                ..Self::default()
            };
            return Err(Error::EventStream(format!(
                "unterminated event exceeds {MAX_PENDING_BYTES} bytes"
            )));
        }
        Ok(out)
    }

    fn process_line(&mut self, line: &str) -> Option<RawEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => {
                self.data_len += value.len() + 1;
                self.data.push(value.to_owned());
            }
            "id" => self.last_id = Some(value.to_owned()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        self.data_len = 0;

        Some(RawEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_owned()),
            data,
            id: self.last_id.clone(),
        })
    }
}

/// Decode a byte stream into server-sent events.
pub fn decode_events<S>(bytes: S) -> impl Stream<Item = Result<RawEvent, Error>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        for await chunk in bytes {
            let chunk = chunk.map_err(|e| Error::EventStream(e.to_string()))?;
            for event in decoder.feed(&chunk)? {
                yield event;
            }
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for event stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running event stream.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct EventStreamHandle {
    event_rx: broadcast::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Spawn the reconnection loop for `client`'s event stream.
    ///
    /// Returns as soon as the task is spawned; the first connection
    /// attempt happens in the background. The bearer token is re-read on
    /// every connection attempt.
    pub fn connect(
        client: ApiClient,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let http = client.transport().build_streaming_client()?;
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            sse_loop(http, client, event_tx, reconnect, task_cancel).await;
        });

        Ok(Self { event_rx, cancel })
    }

    /// Get a new receiver for the event stream.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// connect → read → on end or error, report disconnect, backoff → reconnect.
/// A rejected session ends the loop; retrying cannot succeed without a new
/// login.
async fn sse_loop(
    http: reqwest::Client,
    client: ApiClient,
    event_tx: broadcast::Sender<StreamEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&http, &client, &event_tx, &cancel) => result,
        };
        if cancel.is_cancelled() {
            break;
        }

        // No subscribers is fine.
        let _ = event_tx.send(StreamEvent::Link(LinkStatus::Disconnected));

        let delay = match result {
            Ok(()) => {
                tracing::info!("Event stream ended, reconnecting");
                attempt = 0;
                reconnect.initial_delay
            }
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(error = %e, "Event stream rejected the session, not reconnecting");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "Event stream error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "Event stream reconnection limit reached, giving up"
                        );
                        break;
                    }
                }
                let delay = calculate_backoff(attempt, &reconnect);
                attempt = attempt.saturating_add(1);
                delay
            }
        };

        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "Waiting before reconnect"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    tracing::debug!("Event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one stream and read it until it ends, errors, or is cancelled.
async fn connect_and_read(
    http: &reqwest::Client,
    client: &ApiClient,
    event_tx: &broadcast::Sender<StreamEvent>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let url = client.events_url()?;
    // The query string may carry the token.
    tracing::info!(path = url.path(), "Connecting to event stream");

    let mut req = http.get(url).header(ACCEPT, "text/event-stream");
    if let Some(token) = client.token() {
        req = req.bearer_auth(token.expose_secret());
    }

    let resp = req.send().await?;
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized {
            message: "event stream rejected the session".into(),
        });
    }
    if !status.is_success() {
        return Err(Error::EventStream(format!(
            "event stream returned HTTP {}",
            status.as_u16()
        )));
    }

    tracing::info!("Event stream connected");
    let _ = event_tx.send(StreamEvent::Link(LinkStatus::Connected));

    let mut events = pin!(decode_events(resp.bytes_stream()));
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            next = events.next() => match next {
                Some(Ok(event)) => {
                    tracing::trace!(event = %event.event, "Event received");
                    let _ = event_tx.send(StreamEvent::Message(Arc::new(event)));
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert_eq!(d0, Duration::from_secs(1));
        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig::default();
        for attempt in [10, 31, 64, u32::MAX] {
            let delay = calculate_backoff(attempt, &config);
            // Jitter factor tops out at 1.25.
            assert!(
                delay <= Duration::from_millis(37_500),
                "delay at attempt {attempt} ({delay:?}) should be capped near max_delay"
            );
        }
    }

    #[test]
    fn decoder_dispatches_named_events_on_blank_line() {
        let mut decoder = SseDecoder::new();
        let events =
            decoder.feed(b"event: device-update\ndata: {\"deviceId\":1}\n\nevent: ping\n").unwrap();
        assert_eq!(
            events,
            vec![RawEvent {
                event: "device-update".into(),
                data: "{\"deviceId\":1}".into(),
                id: None,
            }]
        );
        // The second event is not terminated yet.
        assert!(decoder.feed(b"data: x\n").unwrap().is_empty());
        let events = decoder.feed(b"\n").unwrap();
        assert_eq!(events[0].event, "ping");
    }

    #[test]
    fn decoder_handles_arbitrary_chunk_splits_and_crlf() {
        let body = b"id: 7\r\nevent: command-error\r\ndata: line one\r\ndata: line two\r\n\r\n";
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        for chunk in body.chunks(3) {
            events.extend(decoder.feed(chunk).unwrap());
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "command-error");
        assert_eq!(events[0].data, "line one\nline two");
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn decoder_ignores_comments_and_dataless_blocks() {
        let mut decoder = SseDecoder::new();
        let events = decoder
            .feed(b": keep-alive\n\nevent: lonely\n\ndata: plain\n\n")
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, DEFAULT_EVENT_NAME);
        assert_eq!(events[0].data, "plain");
    }

    #[test]
    fn decoder_keeps_multibyte_characters_split_across_chunks() {
        let body = "data: 24°C\n\n".as_bytes();
        let split = body.iter().position(|b| *b == 0xC2).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&body[..split]).unwrap().is_empty());
        let events = decoder.feed(&body[split..]).unwrap();
        assert_eq!(events[0].data, "24°C");
    }

    #[test]
    fn decoder_drains_many_events_from_one_chunk() {
        let body = "data: tick\n\n".repeat(20_000);
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(body.as_bytes()).unwrap();
        assert_eq!(events.len(), 20_000);
        assert!(decoder.buf.is_empty());
    }

    #[test]
    fn decoder_rejects_unterminated_line_past_limit() {
        let mut decoder = SseDecoder::new();
        let chunk = vec![b'a'; 64 * 1024];
        for _ in 0..(MAX_PENDING_BYTES / chunk.len()) {
            decoder.feed(&chunk).unwrap();
        }
        let err = decoder.feed(b"a").unwrap_err();
        assert!(matches!(err, Error::EventStream(_)), "got: {err:?}");

        // The decoder starts clean afterwards.
        let events = decoder.feed(b"data: ok\n\n").unwrap();
        assert_eq!(events[0].data, "ok");
    }

    #[test]
    fn decoder_rejects_event_with_endless_data_lines() {
        let mut decoder = SseDecoder::new();
        let line = format!("data: {}\n", "x".repeat(1023));
        // Each line adds 1024 bytes of pending data.
        let result = (0..=MAX_PENDING_BYTES / 1024)
            .map(|_| decoder.feed(line.as_bytes()))
            .find(Result::is_err);
        assert!(matches!(result, Some(Err(Error::EventStream(_)))));
    }

    #[tokio::test]
    async fn decode_events_surfaces_stream_in_order() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"event: a\ndata: 1\n")),
            Ok(Bytes::from_static(b"\nevent: b\ndata: 2\n\n")),
        ];
        let events: Vec<_> = decode_events(futures_util::stream::iter(chunks))
            .collect()
            .await;
        let names: Vec<_> = events
            .into_iter()
            .map(|e| e.unwrap().event)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
