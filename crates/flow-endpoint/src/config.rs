//! Configuration loading and validation for the flow endpoint.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::{CodecOptions, DerivedIv, IvPolicy, ResponseFraming};

/// Reply framing names accepted in `RESPONSE_FRAMING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramingMode {
    #[default]
    Envelope,
    Concatenated,
}

/// Validated service configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// RSA private key, PKCS#8 PEM. **Required.**
    pub private_key_pem: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Reply framing: `envelope` or `concatenated`.
    #[serde(default)]
    pub response_framing: FramingMode,

    /// Reply IV derivation for the `concatenated` framing: `flipped` or `reversed`.
    #[serde(default)]
    pub response_iv: Option<DerivedIv>,

    /// Accepted request IV lengths: `strict` (12) or `extended` (12 or 16).
    #[serde(default)]
    pub iv_policy: IvPolicy,

    /// Process undecryptable bodies as plain JSON.
    #[serde(default)]
    pub allow_plaintext_fallback: bool,

    /// Open every encoded reply again before sending it.
    #[serde(default)]
    pub self_check_responses: bool,

    /// Screen a successful form submission navigates to.
    #[serde(default = "default_success_screen")]
    pub success_screen: String,

    /// OTLP endpoint for span export. Logs only when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8080
}
fn default_success_screen() -> String {
    "SERVICE_SUCCESS".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.private_key_pem, "PRIVATE_KEY_PEM")?;
        ensure_non_empty(&self.success_screen, "SUCCESS_SCREEN")?;
        if self.port == 0 {
            anyhow::bail!("PORT must be > 0");
        }
        self.response_framing()?;
        Ok(())
    }

    /// Combine `RESPONSE_FRAMING` and `RESPONSE_IV` into a [`ResponseFraming`].
    ///
    /// The `envelope` framing always uses a fresh random IV, so a derivation is
    /// rejected there; the `concatenated` framing carries no IV and needs one.
    pub fn response_framing(&self) -> Result<ResponseFraming> {
        match (self.response_framing, self.response_iv) {
            (FramingMode::Envelope, None) => Ok(ResponseFraming::Envelope),
            (FramingMode::Envelope, Some(_)) => anyhow::bail!(
                "RESPONSE_IV is only valid with RESPONSE_FRAMING=concatenated; \
                 the envelope framing always uses a fresh random IV"
            ),
            (FramingMode::Concatenated, Some(iv)) => Ok(ResponseFraming::Concatenated(iv)),
            (FramingMode::Concatenated, None) => anyhow::bail!(
                "RESPONSE_FRAMING=concatenated requires RESPONSE_IV (flipped or reversed)"
            ),
        }
    }

    /// Codec options derived from this configuration.
    pub fn codec_options(&self) -> Result<CodecOptions> {
        Ok(CodecOptions {
            framing: self.response_framing()?,
            iv_policy: self.iv_policy,
            allow_plaintext_fallback: self.allow_plaintext_fallback,
            self_check: self.self_check_responses,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("private_key_pem", &"[REDACTED]")
            .field("port", &self.port)
            .field("response_framing", &self.response_framing)
            .field("response_iv", &self.response_iv)
            .field("iv_policy", &self.iv_policy)
            .field("allow_plaintext_fallback", &self.allow_plaintext_fallback)
            .field("self_check_responses", &self.self_check_responses)
            .field("success_screen", &self.success_screen)
            .field("otel_exporter_otlp_endpoint", &self.otel_exporter_otlp_endpoint)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
