//! HTTP search executor.
//!
//! Two wire styles are observed across backend deployments:
//!   json_post:    POST /search  {"module", "compound_name", "mzml_file"?}
//!   query_string: GET  /search?compound_name=&file_path=&db_name=

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

use phytodiscover_common::{BackendClient, SearchQuery};
use phytodiscover_config::{Config, ModulesConfig, SearchStyle};

use super::{ExecuteError, SearchExecutor};

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    module: &'a str,
    compound_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mzml_file: Option<&'a str>,
}

pub struct HttpSearchExecutor {
    client: BackendClient,
    style: SearchStyle,
    path: String,
    modules: ModulesConfig,
}

impl HttpSearchExecutor {
    pub fn new(
        client: BackendClient,
        style: SearchStyle,
        path: impl Into<String>,
        modules: ModulesConfig,
    ) -> Self {
        Self { client, style, path: path.into(), modules }
    }

    pub fn from_config(client: BackendClient, config: &Config) -> Self {
        Self::new(
            client,
            config.search.style,
            config.search.path.clone(),
            config.modules.clone(),
        )
    }

    pub fn style(&self) -> SearchStyle {
        self.style
    }

    fn request(&self, query: &SearchQuery) -> Result<reqwest::RequestBuilder, ExecuteError> {
        let request = match self.style {
            SearchStyle::JsonPost => self.client.post(&self.path),
            SearchStyle::QueryString => self.client.get(&self.path),
        }
        .map_err(|e| ExecuteError::Network(e.to_string()))?;

        Ok(match self.style {
            SearchStyle::JsonPost => request.json(&SearchBody {
                module: query.module().display_name(),
                compound_name: query.compound_name(),
                mzml_file: query.data_file(),
            }),
            SearchStyle::QueryString => {
                let mut params = vec![("compound_name", query.compound_name())];
                if let Some(file) = query.data_file() {
                    params.push(("file_path", file));
                }
                params.push(("db_name", self.modules.db_name(query.module())));
                request.query(&params)
            }
        })
    }
}

#[async_trait]
impl SearchExecutor for HttpSearchExecutor {
    #[instrument(skip(self), fields(style = ?self.style))]
    async fn execute(&self, query: &SearchQuery) -> Result<String, ExecuteError> {
        let resp = self
            .request(query)?
            .send()
            .await
            .map_err(ExecuteError::from_reqwest)?;

        let status = resp.status();
        let body = resp.text().await.map_err(ExecuteError::from_reqwest)?;
        debug!(status = status.as_u16(), bytes = body.len(), "Search backend responded");

        if !status.is_success() {
            return Err(ExecuteError::Http { status: status.as_u16(), body });
        }
        Ok(body)
    }
}
