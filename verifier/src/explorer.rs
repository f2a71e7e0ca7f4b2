//! Claimed-source retrieval from a block explorer.
//!
//! Provides a trait-based abstraction over the explorer's `getsourcecode`
//! endpoint so the batch runner can be tested without network access. The
//! HTTP implementation uses a `ureq` agent with a global timeout; timeouts,
//! HTTP errors, API-level errors, and empty source fields are all reported
//! as [`FetchError`] and leave the artifact unresolved.

use log::debug;
use provenance_engine::identity::ArtifactIdentity;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Default network timeout for explorer requests.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The raw explorer answer for one artifact, before payload decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    /// The contract name the explorer reports.
    pub contract_name: String,
    /// The encoded source payload.
    pub source_code: String,
}

/// Errors arising from fetching an artifact's claimed source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request failed at the transport or HTTP level.
    #[error("request for {identity} failed: {reason}")]
    Http {
        /// The artifact being fetched.
        identity: ArtifactIdentity,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The explorer endpoint returned HTTP 404.
    #[error("explorer endpoint not found while fetching {identity}")]
    NotFound {
        /// The artifact being fetched.
        identity: ArtifactIdentity,
    },

    /// The explorer answered with a non-success status.
    #[error("explorer rejected {identity}: {message}")]
    Api {
        /// The artifact being fetched.
        identity: ArtifactIdentity,
        /// The explorer's message and result text.
        message: String,
    },

    /// The explorer has no verified source for the artifact.
    #[error("explorer has no verified source for {identity}")]
    EmptySource {
        /// The artifact being fetched.
        identity: ArtifactIdentity,
    },

    /// The response body is not the expected JSON envelope.
    #[error("unexpected explorer response for {identity}: {reason}")]
    Malformed {
        /// The artifact being fetched.
        identity: ArtifactIdentity,
        /// Description of the decoding failure.
        reason: String,
    },
}

/// Trait for fetching the claimed source of an artifact.
///
/// Abstractions allow tests to mock HTTP behaviour without network access.
#[cfg_attr(test, mockall::automock)]
pub trait BundleSource {
    /// Fetch the claimed source for `identity`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the source cannot be obtained.
    fn fetch(&self, identity: &ArtifactIdentity) -> Result<RawSource, FetchError>;
}

/// HTTP client for an Etherscan-compatible explorer API.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use provenance_verifier::explorer::ExplorerClient;
///
/// let client = ExplorerClient::new("https://api.arbiscan.io/api", "secret", Duration::from_secs(30));
/// assert!(!format!("{client:?}").contains("secret"));
/// ```
pub struct ExplorerClient {
    api_url: String,
    api_key: String,
    agent: ureq::Agent,
}

impl ExplorerClient {
    /// Create a client for `api_url` authenticating with `api_key`.
    #[must_use]
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// Return the API endpoint this client queries.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn redact(&self, text: &str) -> String {
        if self.api_key.is_empty() {
            text.to_owned()
        } else {
            text.replace(&self.api_key, "<redacted>")
        }
    }

    /// Map a ureq error to a [`FetchError`], keeping the API key out of the
    /// message.
    fn map_ureq_error(&self, identity: &ArtifactIdentity, err: &ureq::Error) -> FetchError {
        match err {
            ureq::Error::StatusCode(404) => FetchError::NotFound {
                identity: identity.clone(),
            },
            other => FetchError::Http {
                identity: identity.clone(),
                reason: self.redact(&other.to_string()),
            },
        }
    }
}

impl fmt::Debug for ExplorerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplorerClient")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl BundleSource for ExplorerClient {
    fn fetch(&self, identity: &ArtifactIdentity) -> Result<RawSource, FetchError> {
        debug!("fetching claimed source for {identity} from {}", self.api_url);
        let response = self
            .agent
            .get(&self.api_url)
            .query("module", "contract")
            .query("action", "getsourcecode")
            .query("address", identity.as_str())
            .query("apikey", &self.api_key)
            .call()
            .map_err(|e| self.map_ureq_error(identity, &e))?;
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| FetchError::Http {
                identity: identity.clone(),
                reason: self.redact(&e.to_string()),
            })?;
        parse_response(identity, &body)
    }
}

#[derive(Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

#[derive(Deserialize)]
struct SourceRecord {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
    #[serde(rename = "ContractName", default)]
    contract_name: String,
}

/// Decode an explorer `getsourcecode` response body.
///
/// # Errors
///
/// Returns a [`FetchError`] when the body is not the expected envelope, the
/// status is not `"1"`, or the first result has an empty source field.
///
/// # Examples
///
/// ```
/// use provenance_engine::identity::ArtifactIdentity;
/// use provenance_verifier::explorer::parse_response;
///
/// let id = ArtifactIdentity::try_from("0xabc").expect("valid identity");
/// let body = r#"{"status":"1","message":"OK","result":[{"SourceCode":"{}","ContractName":"Vault"}]}"#;
/// let source = parse_response(&id, body).expect("parses");
/// assert_eq!(source.contract_name, "Vault");
/// ```
pub fn parse_response(identity: &ArtifactIdentity, body: &str) -> Result<RawSource, FetchError> {
    let malformed = |reason: String| FetchError::Malformed {
        identity: identity.clone(),
        reason,
    };
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;

    if envelope.status != "1" {
        let detail = match &envelope.result {
            serde_json::Value::String(text) if !text.is_empty() => {
                format!("{}: {text}", envelope.message)
            }
            _ => envelope.message,
        };
        return Err(FetchError::Api {
            identity: identity.clone(),
            message: detail,
        });
    }

    let records: Vec<SourceRecord> =
        serde_json::from_value(envelope.result).map_err(|e| malformed(e.to_string()))?;
    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| malformed("result list is empty".to_owned()))?;
    if record.source_code.trim().is_empty() {
        return Err(FetchError::EmptySource {
            identity: identity.clone(),
        });
    }
    Ok(RawSource {
        contract_name: record.contract_name,
        source_code: record.source_code,
    })
}
