//! OAuth2 Authorization Code flow (with PKCE) for installed apps.
//!
//! 1. Opens the browser to the authorization URL
//! 2. Accepts a single callback on a localhost port
//! 3. Verifies `state` and exchanges the code for tokens
//! 4. Hands the tokens back to the caller for storage

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::error::OAuthError;

/// How long `authorize` waits for the browser to come back.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Tokens are treated as expired this many seconds early.
const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>, // Unix timestamp
    pub token_type: String,
    pub scope: Option<String>,
}

impl OAuthTokens {
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(exp) => now > exp - EXPIRY_BUFFER_SECS,
            None => false,
        }
    }

    /// Check if the access token is expired (with 60s buffer).
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub service_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub redirect_port: u16,
}

impl OAuthConfig {
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.redirect_port)
    }

    pub fn auth_url_full(&self, pkce: &Pkce, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}\
             &access_type=offline&prompt=consent\
             &code_challenge={}&code_challenge_method=S256&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri()),
            urlencoding::encode(&scopes),
            pkce.challenge,
            urlencoding::encode(state),
        )
    }
}

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        Self::from_verifier(random_token(32))
    }

    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// URL-safe random string from `len` random bytes.
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Run the full flow: open browser -> wait for callback -> exchange code.
pub async fn authorize(config: &OAuthConfig) -> Result<OAuthTokens, OAuthError> {
    if config.client_id.is_empty() {
        return Err(OAuthError::CredentialsNotConfigured {
            service: config.service_name.clone(),
        });
    }

    let pkce = Pkce::generate();
    let state = random_token(16);

    let listener = TcpListener::bind(("127.0.0.1", config.redirect_port))
        .await
        .map_err(|e| {
            OAuthError::AuthorizationFailed(format!(
                "cannot listen on port {}: {e}",
                config.redirect_port
            ))
        })?;

    let auth_url = config.auth_url_full(&pkce, &state);
    if let Err(err) = open::that(&auth_url) {
        tracing::warn!(error = %err, "could not open a browser");
    }
    tracing::info!(url = %auth_url, "waiting for authorization in the browser");

    let code = tokio::time::timeout(CALLBACK_TIMEOUT, accept_callback(&listener, &state)).await??;
    drop(listener);

    exchange_code(config, &code, &pkce.verifier).await
}

async fn accept_callback(listener: &TcpListener, expected_state: &str) -> Result<String, OAuthError> {
    let (mut stream, peer) = listener
        .accept()
        .await
        .map_err(|e| OAuthError::AuthorizationFailed(e.to_string()))?;
    tracing::debug!(%peer, "oauth callback connection");

    let mut buf = [0u8; 4096];
    let n = stream
        .read(&mut buf)
        .await
        .map_err(|e| OAuthError::InvalidCallback(e.to_string()))?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let result = parse_callback(&request, expected_state);
    let page = match &result {
        Ok(_) => "<h2>Authentication successful!</h2><p>You can close this tab.</p>",
        Err(_) => "<h2>Authentication failed.</h2><p>Return to the terminal for details.</p>",
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body>{page}</body></html>"
    );
    if let Err(err) = stream.write_all(response.as_bytes()).await {
        tracing::debug!(error = %err, "failed to answer oauth callback");
    }

    result
}

/// Pull the authorization code out of the callback request line,
/// checking `state` and any `error` the provider reported.
pub fn parse_callback(request: &str, expected_state: &str) -> Result<String, OAuthError> {
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| OAuthError::InvalidCallback("empty request".to_string()))?;
    let url = url::Url::parse(&format!("http://localhost{path}"))
        .map_err(|e| OAuthError::InvalidCallback(e.to_string()))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(OAuthError::AuthorizationFailed(value.into_owned())),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(OAuthError::InvalidCallback("state mismatch".to_string()));
    }
    code.ok_or_else(|| OAuthError::InvalidCallback("no code in callback".to_string()))
}

/// Exchange authorization code for tokens.
pub async fn exchange_code(
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<OAuthTokens, OAuthError> {
    let redirect_uri = config.redirect_uri();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("code_verifier", verifier),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri.as_str()),
    ];

    let body: serde_json::Value = Client::new()
        .post(&config.token_url)
        .form(&params)
        .send()
        .await?
        .json()
        .await?;

    parse_token_response(&body, None).map_err(OAuthError::TokenExchangeFailed)
}

/// Refresh an access token. A response without a new refresh token keeps
/// the old one.
pub async fn refresh_token(config: &OAuthConfig, refresh: &str) -> Result<OAuthTokens, OAuthError> {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh),
        ("grant_type", "refresh_token"),
    ];

    let body: serde_json::Value = Client::new()
        .post(&config.token_url)
        .form(&params)
        .send()
        .await?
        .json()
        .await?;

    parse_token_response(&body, Some(refresh)).map_err(OAuthError::TokenRefreshFailed)
}

fn parse_token_response(
    body: &serde_json::Value,
    previous_refresh: Option<&str>,
) -> Result<OAuthTokens, String> {
    if let Some(error) = body.get("error") {
        let error = error.as_str().unwrap_or("unknown_error");
        let detail = body
            .get("error_description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        return Err(format!("{error} {detail}").trim().to_string());
    }

    let access_token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "response has no access_token".to_string())?;

    let expires_at = body
        .get("expires_in")
        .and_then(|v| v.as_i64())
        .map(|ei| chrono::Utc::now().timestamp() + ei);

    Ok(OAuthTokens {
        access_token: access_token.to_string(),
        refresh_token: body
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| previous_refresh.map(String::from)),
        expires_at,
        token_type: body
            .get("token_type")
            .and_then(|v| v.as_str())
            .unwrap_or("Bearer")
            .to_string(),
        scope: body.get("scope").and_then(|v| v.as_str()).map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token_url: String) -> OAuthConfig {
        OAuthConfig {
            service_name: "google".to_string(),
            client_id: "client-id".to_string(),
            client_secret: "secret".to_string(),
            auth_url: "https://accounts.example.com/auth".to_string(),
            token_url,
            scopes: vec!["scope.a".to_string(), "scope.b".to_string()],
            redirect_port: 19821,
        }
    }

    #[test]
    fn pkce_challenge_matches_rfc7636_vector() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn random_tokens_differ() {
        assert_ne!(random_token(16), random_token(16));
    }

    #[test]
    fn auth_url_carries_pkce_and_state() {
        let pkce = Pkce::from_verifier("verifier");
        let url = config(String::new()).auth_url_full(&pkce, "xyz");
        assert!(url.starts_with("https://accounts.example.com/auth?client_id=client-id"));
        assert!(url.contains("scope=scope.a%20scope.b"));
        assert!(url.contains(&format!("code_challenge={}", pkce.challenge)));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("state=xyz"));
    }

    #[test]
    fn callback_with_matching_state() {
        let request = "GET /callback?code=4%2Fabc&state=s1 HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n";
        assert_eq!(parse_callback(request, "s1").unwrap(), "4/abc");
    }

    #[test]
    fn callback_state_mismatch() {
        let request = "GET /callback?code=abc&state=other HTTP/1.1\r\n\r\n";
        assert!(matches!(
            parse_callback(request, "s1"),
            Err(OAuthError::InvalidCallback(_))
        ));
    }

    #[test]
    fn callback_reports_provider_error() {
        let request = "GET /callback?error=access_denied&state=s1 HTTP/1.1\r\n\r\n";
        assert!(matches!(
            parse_callback(request, "s1"),
            Err(OAuthError::AuthorizationFailed(msg)) if msg == "access_denied"
        ));
    }

    #[test]
    fn expiry_has_buffer() {
        let tokens = OAuthTokens {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: Some(1_000),
            token_type: "Bearer".to_string(),
            scope: None,
        };
        assert!(!tokens.is_expired_at(939));
        assert!(tokens.is_expired_at(941));
    }

    #[tokio::test]
    async fn refresh_keeps_previous_refresh_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "refresh_token".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"new","expires_in":3600,"token_type":"Bearer"}"#)
            .create_async()
            .await;

        let tokens = refresh_token(&config(format!("{}/token", server.url())), "old-refresh")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(tokens.access_token, "new");
        assert_eq!(tokens.refresh_token.as_deref(), Some("old-refresh"));
        assert!(!tokens.is_expired());
    }

    #[tokio::test]
    async fn refresh_error_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Token has been revoked."}"#)
            .create_async()
            .await;

        let err = refresh_token(&config(format!("{}/token", server.url())), "r")
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::TokenRefreshFailed(msg) if msg.contains("invalid_grant")));
    }
}
