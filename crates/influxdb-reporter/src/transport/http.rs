//! Blocking HTTP writes to an InfluxDB endpoint.

use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use reqwest::blocking::Client as BlockingClient;
use reqwest::header::CONNECTION;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::Transport;
use crate::batch::Batch;
use crate::batch::Series;
use crate::encoders::create_encoder;
use crate::encoders::BatchEncoder;
use crate::encoders::WireFormat;
use crate::error::ReportError;
use crate::error::ReportResult;

/// Where and how an [`HttpTransport`] writes.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub format: WireFormat,
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            username: None,
            password: None,
            format: WireFormat::Json,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Write endpoint for the configured format.
    ///
    /// JSON goes to `{url}/db/{database}/series?time_precision=ms`, line protocol to
    /// `{url}/write?db={database}&precision=ms`. Credentials are passed as `u` and `p`.
    pub fn write_url(&self) -> ReportResult<Url> {
        let mut url = Url::parse(&self.url)
            .change_context_lazy(|| ReportError::Configuration {
                message: format!("Invalid InfluxDB URL: {}", self.url),
            })?;

        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                Report::new(ReportError::Configuration {
                    message: format!("InfluxDB URL cannot be a base: {}", self.url),
                })
            })?;
            segments.pop_if_empty();
            match self.format {
                WireFormat::Json => {
                    segments.extend(["db", self.database.as_str(), "series"]);
                }
                WireFormat::Line => {
                    segments.push("write");
                }
            }
        }

        {
            let mut query = url.query_pairs_mut();
            match self.format {
                WireFormat::Json => {
                    query.append_pair("time_precision", "ms");
                }
                WireFormat::Line => {
                    query.append_pair("db", &self.database);
                    query.append_pair("precision", "ms");
                }
            }
            if let Some(username) = &self.username {
                query.append_pair("u", username);
            }
            if let Some(password) = &self.password {
                query.append_pair("p", password);
            }
        }

        Ok(url)
    }
}

/// Posts every batch to InfluxDB over blocking HTTP.
///
/// The client is created on first send, so a transport can be built from async code and
/// used from the blocking pool.
pub struct HttpTransport {
    config: HttpConfig,
    endpoint: Url,
    encoder: Box<dyn BatchEncoder>,
    client: Option<BlockingClient>,
    batch: Batch,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> ReportResult<Self> {
        if config.database.trim().is_empty() {
            return Err(Report::new(ReportError::Configuration {
                message: "InfluxDB database name is empty".into(),
            }));
        }

        let endpoint = config.write_url()?;
        Ok(Self {
            encoder: create_encoder(config.format),
            endpoint,
            config,
            client: None,
            batch: Batch::new(),
        })
    }

    fn client(&mut self) -> ReportResult<BlockingClient> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let client = BlockingClient::builder()
            .timeout(self.config.timeout)
            .build()
            .change_context(ReportError::Configuration {
                message: "Failed to create HTTP client".into(),
            })?;
        self.client = Some(client.clone());
        Ok(client)
    }

    // the endpoint without credentials, for error messages
    fn target(&self) -> String {
        format!("{}{}", self.endpoint.origin().ascii_serialization(), self.endpoint.path())
    }
}

impl Transport for HttpTransport {
    fn batch(&self) -> &Batch {
        &self.batch
    }

    fn batch_mut(&mut self) -> &mut Batch {
        &mut self.batch
    }

    fn submit(&mut self, series: &[Series], keep_alive: bool) -> ReportResult<()> {
        let body = self.encoder.encode(series)?;
        let client = self.client()?;

        let mut request = client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, self.encoder.content_type())
            .body(body);
        if !keep_alive {
            request = request.header(CONNECTION, "close");
        }

        let response = request
            .send()
            .change_context_lazy(|| ReportError::Network {
                message: format!("Failed to POST to {}", self.target()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(Report::new(ReportError::Http {
                status: status.as_u16(),
                message,
            })
            .attach_printable(format!("endpoint: {}", self.target())));
        }

        tracing::debug!(
            series = series.len(),
            status = status.as_u16(),
            "Wrote batch to InfluxDB"
        );
        Ok(())
    }
}
