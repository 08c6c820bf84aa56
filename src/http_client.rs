use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

/// Generative replies with search grounding can take a while.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared blocking client for the store, auth and generative-text calls.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("sensei_hub/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")
    })
}
