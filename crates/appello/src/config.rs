//! Session configuration loaded from environment variables.

use anyhow::{Context, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Authenticated session handed to the API client.
///
/// The token is obtained at login by the portal and stored outside this
/// tool; we only read it.
#[derive(Clone)]
pub struct Session {
    pub api_url: String,
    pub teacher_id: i64,
    pub token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api_url", &self.api_url)
            .field("teacher_id", &self.teacher_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Session {
    /// Load the session from environment variables.
    ///
    /// Expects `APPELLO_TEACHER_ID` and `APPELLO_TOKEN` to be set, either in
    /// the environment or in a `.env` file. `APPELLO_API_URL` defaults to
    /// the local development server.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url =
            std::env::var("APPELLO_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let teacher_id = std::env::var("APPELLO_TEACHER_ID")
            .context("APPELLO_TEACHER_ID environment variable not set")?
            .trim()
            .parse::<i64>()
            .context("APPELLO_TEACHER_ID must be an integer")?;

        let token =
            std::env::var("APPELLO_TOKEN").context("APPELLO_TOKEN environment variable not set")?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            teacher_id,
            token,
        })
    }
}
