// Async HTTP client for the device-control service.
//
// Base path: {api_base_url}/api/bgh/
// Auth: session cookie (browser-style) and/or `Authorization: Bearer`

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::models::{
    CommandReceipt, DeviceResponse, DeviceStatusDto, DevicesResponse, ErrorBody, HomeSummary,
    HomesResponse, UpdateModePayload, UpdateModeResponse,
};
use crate::transport::TransportConfig;

const DEVICE_PATH: &str = "api/bgh";
const AUTH_PATH: &str = "api/auth";

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the device-control REST API.
///
/// Cheap to clone: the HTTP pool and the bearer token slot are shared,
/// so a token installed by [`login`](Self::login) is seen by every clone,
/// including the event stream.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    transport: TransportConfig,
    token: Arc<RwLock<Option<SecretString>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("has_token", &self.token().is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client for `base_url` (e.g. `https://api.example.com`).
    ///
    /// A trailing slash on the base URL is ignored. A cookie jar is
    /// attached when the transport config doesn't carry one already.
    pub fn new(base_url: &str, transport: TransportConfig) -> Result<Self, Error> {
        let transport = if transport.cookie_jar.is_some() {
            transport
        } else {
            transport.with_cookie_jar()
        };
        let http = transport.build_client()?;
        let base_url = Self::normalize_base_url(base_url)?;

        Ok(Self {
            http,
            base_url,
            transport,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Parse the base URL and force a single trailing slash so relative
    /// joins land under it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let trimmed = raw.trim().trim_end_matches('/');
        let url = Url::parse(&format!("{trimmed}/"))?;
        Ok(url)
    }

    /// The normalized base URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    // ── Bearer token ─────────────────────────────────────────────────

    /// Install (or clear) the bearer token used on every request.
    pub fn set_token(&self, token: Option<SecretString>) {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = token;
    }

    /// Current bearer token, if one is installed.
    pub fn token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/api/bgh/{path}`
    pub(crate) fn device_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("{DEVICE_PATH}/{path}"))?)
    }

    /// `{base}/api/auth/{path}`
    pub(crate) fn auth_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("{AUTH_PATH}/{path}"))?)
    }

    /// URL of the server-sent event stream, with the bearer token (if
    /// any) appended as the `token` query parameter.
    pub fn events_url(&self) -> Result<Url, Error> {
        let mut url = self.device_url("events")?;
        if let Some(token) = self.token() {
            url.query_pairs_mut()
                .append_pair("token", token.expose_secret());
        }
        Ok(url)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!(method = "GET", url = %url, "request:start");
        let resp = self.authorize(self.http.get(url.clone())).send().await;
        finish(url, resp).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, Error> {
        debug!(method = "POST", url = %url, "request:start");
        let resp = self
            .authorize(self.http.post(url.clone()).json(body))
            .send()
            .await;
        finish(url, resp).await
    }

    pub(crate) async fn post_empty(&self, url: Url) -> Result<(), Error> {
        debug!(method = "POST", url = %url, "request:start");
        let resp = match self.authorize(self.http.post(url.clone())).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = %url, error = %e, "request:failure");
                return Err(e.into());
            }
        };
        let status = resp.status();
        debug!(url = %url, status = status.as_u16(), "request:response");
        if status.is_success() {
            debug!(url = %url, "request:success");
            Ok(())
        } else {
            let err = parse_error(status, resp).await;
            warn!(url = %url, error = %err, "request:failure");
            Err(err)
        }
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Homes ────────────────────────────────────────────────────────

    pub async fn fetch_homes(&self) -> Result<Vec<HomeSummary>, Error> {
        let resp: HomesResponse = self.get(self.device_url("homes")?).await?;
        Ok(resp.homes.unwrap_or_default())
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// All devices of a home, in the order the service keyed them.
    pub async fn fetch_devices(&self, home_id: i64) -> Result<Vec<DeviceStatusDto>, Error> {
        let url = self.device_url(&format!("homes/{home_id}/devices"))?;
        let resp: DevicesResponse = self.get(url).await?;
        Ok(resp
            .devices
            .map(|devices| devices.into_values().collect())
            .unwrap_or_default())
    }

    /// Status of a single device; `None` when the service doesn't know it.
    pub async fn fetch_device_status(
        &self,
        home_id: i64,
        device_id: i64,
    ) -> Result<Option<DeviceStatusDto>, Error> {
        let url = self.device_url(&format!("homes/{home_id}/devices/{device_id}"))?;
        let resp: DeviceResponse = self.get(url).await?;
        Ok(resp.device)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Queue a mode/fan/temperature command. The returned job id comes
    /// back on the `device-update` or `command-error` event it produces.
    pub async fn update_device_mode(
        &self,
        device_id: i64,
        payload: &UpdateModePayload,
    ) -> Result<CommandReceipt, Error> {
        let url = self.device_url(&format!("devices/{device_id}/mode"))?;
        let resp: UpdateModeResponse = self.post(url, payload).await?;

        let job_id = resp
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingCorrelationId)?;

        Ok(CommandReceipt {
            job_id,
            position: resp.position.unwrap_or(0),
        })
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn finish<T: DeserializeOwned>(
    url: Url,
    resp: Result<reqwest::Response, reqwest::Error>,
) -> Result<T, Error> {
    let resp = match resp {
        Ok(resp) => resp,
        Err(e) => {
            warn!(url = %url, error = %e, "request:failure");
            return Err(e.into());
        }
    };
    debug!(url = %url, status = resp.status().as_u16(), "request:response");

    match handle_response(resp).await {
        Ok(value) => {
            debug!(url = %url, "request:success");
            Ok(value)
        }
        Err(err) => {
            warn!(url = %url, error = %err, "request:failure");
            Err(err)
        }
    }
}

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    if !status.is_success() {
        return Err(parse_error(status, resp).await);
    }

    let is_json = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if !is_json {
        return Err(Error::UnexpectedResponse {
            message: format!("expected JSON from server (HTTP {})", status.as_u16()),
        });
    }

    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
    let raw = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&raw)
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.trim().is_empty());

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Error::Unauthorized {
            message: message.unwrap_or_else(|| "session expired".into()),
        };
    }

    Error::Api {
        status: status.as_u16(),
        message: message
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let a = ApiClient::new("https://api.example.com/", TransportConfig::default()).unwrap();
        let b = ApiClient::new("https://api.example.com", TransportConfig::default()).unwrap();
        assert_eq!(a.base_url(), b.base_url());
        assert_eq!(
            a.device_url("homes").unwrap().as_str(),
            "https://api.example.com/api/bgh/homes"
        );
    }

    #[test]
    fn base_url_with_path_prefix_is_kept() {
        let client =
            ApiClient::new("https://example.com/backend//", TransportConfig::default()).unwrap();
        assert_eq!(
            client.auth_url("me").unwrap().as_str(),
            "https://example.com/backend/api/auth/me"
        );
    }

    #[test]
    fn events_url_carries_token_only_when_set() {
        let client = ApiClient::new("https://api.example.com", TransportConfig::default()).unwrap();
        assert_eq!(
            client.events_url().unwrap().as_str(),
            "https://api.example.com/api/bgh/events"
        );

        client.set_token(Some(SecretString::from("abc def")));
        assert_eq!(
            client.events_url().unwrap().as_str(),
            "https://api.example.com/api/bgh/events?token=abc+def"
        );

        let clone = client.clone();
        clone.set_token(None);
        assert!(client.token().is_none());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ApiClient::new("not a url", TransportConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
