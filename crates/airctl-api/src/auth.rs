// Session endpoints under `/api/auth`.
//
// Browser-style clients keep the session in a cookie; desktop clients get
// a bearer token back from `login` as well. Both paths are supported: the
// cookie lands in the shared jar, the token in the client's token slot.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{AuthUser, LoginResponse, MeResponse};

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: AuthUser,
    /// Bearer token, present only when the service issues one.
    pub token: Option<SecretString>,
}

impl ApiClient {
    /// Authenticate with email and password.
    ///
    /// A returned bearer token is installed on the client immediately.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Session, Error> {
        let url = self.auth_url("login")?;
        let body = LoginRequest {
            email,
            password: password.expose_secret(),
        };
        let resp: LoginResponse = self.post(url, &body).await?;

        let token = resp
            .token
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        if token.is_some() {
            self.set_token(token.clone());
        }
        debug!(email = %resp.user.email, has_token = token.is_some(), "logged in");

        Ok(Session {
            user: resp.user,
            token,
        })
    }

    /// The user the current session belongs to.
    pub async fn me(&self) -> Result<AuthUser, Error> {
        let resp: MeResponse = self.get(self.auth_url("me")?).await?;
        Ok(resp.user)
    }

    /// End the session on the server and drop the local bearer token.
    ///
    /// The token is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.auth_url("logout")?;
        let result = self.post_empty(url).await;
        self.set_token(None);
        result
    }
}
