use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use url::Url;

use crate::error::{PhytoError, Result};

/// HTTP client bound to one search backend.
/// Every route the client talks to is resolved against `base_url`, so a
/// deployment behind a path prefix (`https://host/phyto`) works unchanged.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
}

impl BackendClient {
    /// Creates a client for `base_url`. `request_timeout` bounds each whole
    /// request; `None` leaves requests unbounded.
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(PhytoError::Config(format!(
                "backend URL cannot carry routes: {}",
                base_url
            )));
        }

        let mut builder = ClientBuilder::new().connect_timeout(connect_timeout);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a route such as `/search` below the base URL's path.
    pub fn endpoint(&self, route: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let route = route.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, route))?)
    }

    pub fn get(&self, route: &str) -> Result<reqwest::RequestBuilder> {
        Ok(self.client.get(self.endpoint(route)?))
    }

    pub fn post(&self, route: &str) -> Result<reqwest::RequestBuilder> {
        Ok(self.client.post(self.endpoint(route)?))
    }
}
