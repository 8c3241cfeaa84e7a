use crate::config::InverterConfig;
use crate::error::FetchError;
use reqwest::StatusCode;

/// HTTP client for the inverter's `inverter.cgi` status page.
pub struct InverterClient {
    endpoint_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl InverterClient {
    pub fn new(config: &InverterConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            endpoint_url: config.endpoint_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            client,
        })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Fetches the raw status page. The body is returned undecoded; it is
    /// Latin-1 text and decoding is left to the parser.
    pub async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url = %self.endpoint_url, "Polling inverter");

        let response = self
            .client
            .get(&self.endpoint_url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        tracing::debug!(bytes = body.len(), "Received inverter reply");
        Ok(body.to_vec())
    }

    /// Checks that the device answers at all, used before a new entry is
    /// accepted.
    pub async fn probe(&self) -> Result<(), FetchError> {
        self.fetch().await.map(|_| ())
    }
}
