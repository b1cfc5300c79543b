use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use color_eyre::Result;
use color_eyre::eyre::{OptionExt, WrapErr, bail};
use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;

use crate::spotify_rs::types::{OAuthSession, SpotifyTokenResponse};

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Read the saved library, read private playlists, write private playlists.
pub const SPOTIFY_SCOPES: [&str; 3] = [
    "user-library-read",
    "playlist-read-private",
    "playlist-modify-private",
];

const VERIFIER_LENGTH: usize = 128;
const STATE_LENGTH: usize = 16;
const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Random string over the RFC 7636 unreserved alphabet.
fn random_token(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| UNRESERVED[rng.random_range(0..UNRESERVED.len())] as char)
        .collect()
}

/// S256 challenge for a PKCE verifier.
fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{client_secret}")))
}

/// Build the authorization URL the user has to open, together with the
/// session needed to finish the flow once they are redirected back.
pub fn initiate_oauth(client_id: &str, redirect_uri: &str) -> (String, OAuthSession) {
    let session = OAuthSession {
        code_verifier: random_token(VERIFIER_LENGTH),
        state: random_token(STATE_LENGTH),
    };

    let query = [
        ("client_id", client_id.to_string()),
        ("response_type", "code".to_string()),
        ("redirect_uri", redirect_uri.to_string()),
        ("state", session.state.clone()),
        ("scope", SPOTIFY_SCOPES.join(" ")),
        ("code_challenge_method", "S256".to_string()),
        ("code_challenge", code_challenge(&session.code_verifier)),
    ]
    .iter()
    .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
    .collect::<Vec<_>>()
    .join("&");

    (format!("{SPOTIFY_AUTH_URL}?{query}"), session)
}

/// Pull `code` out of the URL the browser was redirected to, checking `state`
/// against the session that started the flow.
pub fn parse_redirect(redirected_to: &str, session: &OAuthSession) -> Result<String> {
    let url = Url::parse(redirected_to.trim()).wrap_err("Redirect URL is not a valid URL")?;
    let params: HashMap<_, _> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        bail!("Authorization was denied: {}", error);
    }

    let state = params
        .get("state")
        .ok_or_eyre("Redirect URL has no state parameter")?;
    if state != &session.state {
        bail!("State mismatch in redirect URL");
    }

    params
        .get("code")
        .cloned()
        .ok_or_eyre("Redirect URL has no code parameter")
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Spotify rejected the token request: {reason}")]
    Rejected { reason: String },
    #[error("Failed to send token request: {0}")]
    Send(reqwest::Error),
    #[error("Failed to parse token response: {0}")]
    Parse(reqwest::Error),
}

/// POST a grant to the accounts service with client credentials in the
/// `Authorization` header.
async fn request_token(
    client_id: &str,
    client_secret: &str,
    form: &[(&str, &str)],
) -> Result<SpotifyTokenResponse, TokenError> {
    let response = reqwest::Client::new()
        .post(SPOTIFY_TOKEN_URL)
        .form(form)
        .header("Authorization", basic_auth_header(client_id, client_secret))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(TokenError::Send)?;

    if !response.status().is_success() {
        let reason = match response.text().await {
            Ok(text) => text,
            Err(error) => error.to_string(),
        };
        return Err(TokenError::Rejected { reason });
    }

    response.json().await.map_err(TokenError::Parse)
}

/// Trade the authorization code for tokens.
/// `redirect_uri` must match the one used in [`initiate_oauth`].
pub async fn exchange_code_for_token(
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> Result<SpotifyTokenResponse, TokenError> {
    request_token(
        client_id,
        client_secret,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ],
    )
    .await
}

pub async fn refresh_access_token(
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<SpotifyTokenResponse, TokenError> {
    request_token(
        client_id,
        client_secret,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
        ],
    )
    .await
}
