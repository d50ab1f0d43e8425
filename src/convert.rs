//! Conversion Client: external format rendering with ordered fallback
//!
//! Target formats other than the native node list are rendered by external
//! subscription-converter backends. Candidates are tried strictly in order
//! (primary first, then the fixed fallbacks); a backend address without a
//! scheme expands to an https attempt followed by an http attempt. The
//! first 2xx response wins. When every variant fails, the error names each
//! endpoint attempted so the operator can see the whole sequence.
//!
//! The in-process fallback renderer covers only the base64 subscription
//! format; it exists so a total backend outage still yields a usable
//! payload for clients that accept raw node lists.

use crate::config::ConvertConfig;
use crate::error::{ConvertError, Error, Result};
use base64::Engine as _;

/// Target format rendered by the in-process fallback
const FALLBACK_TARGET: &str = "base64";

/// A successful conversion
#[derive(Clone, Debug)]
pub struct Conversion {
    /// The rendered configuration text, passed through verbatim
    pub rendered_text: String,

    /// The endpoint variant that produced it
    pub backend_used: String,
}

/// Renders node lists into client formats through external backends
pub struct ConversionClient {
    client: reqwest::Client,
    config: ConvertConfig,
}

impl ConversionClient {
    /// Create a client with its own HTTP client
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(config: ConvertConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client, config })
    }

    /// Convert the subscription at `callback_url` into `target` format
    ///
    /// `callback_url` is the address a backend fetches the native node list
    /// from; it is percent-encoded into the backend query string.
    ///
    /// # Errors
    /// Returns [`ConvertError::AllBackendsFailed`] when every endpoint
    /// variant fails, and a configuration error when no backend is set.
    pub async fn convert(&self, target: &str, callback_url: &str) -> Result<Conversion> {
        let candidates = self.config.candidates()?;
        let mut attempted = Vec::new();

        for base in &candidates {
            for endpoint in endpoint_variants(base) {
                let url = format!(
                    "{endpoint}/sub?target={target}&url={}",
                    urlencoding::encode(callback_url)
                );
                attempted.push(url.clone());
                match self.attempt(&url).await {
                    Ok(rendered_text) => {
                        tracing::info!(backend = %endpoint, target, "conversion succeeded");
                        return Ok(Conversion {
                            rendered_text,
                            backend_used: endpoint,
                        });
                    }
                    Err(error) => {
                        tracing::warn!(backend = %endpoint, target, error = %error, "conversion attempt failed");
                    }
                }
            }
        }

        Err(ConvertError::AllBackendsFailed { attempted }.into())
    }

    /// Convert, falling back to a locally rendered payload when every
    /// backend fails
    ///
    /// The base64 target never leaves the process. Other targets get the
    /// local base64 payload only as a last resort, labelled with the
    /// backend name `"local"` so callers can tell it apart.
    ///
    /// # Errors
    /// Returns a configuration error when no backend is set for a
    /// non-base64 target.
    pub async fn convert_or_fallback(
        &self,
        target: &str,
        callback_url: &str,
        node_text: &str,
    ) -> Result<Conversion> {
        if target.eq_ignore_ascii_case(FALLBACK_TARGET) {
            return Ok(local_conversion(node_text));
        }
        match self.convert(target, callback_url).await {
            Ok(conversion) => Ok(conversion),
            Err(Error::Convert(ConvertError::AllBackendsFailed { attempted })) => {
                tracing::warn!(
                    target,
                    backends = attempted.len(),
                    "all backends failed, serving local base64 payload"
                );
                Ok(local_conversion(node_text))
            }
            Err(Error::Config { .. }) => Err(ConvertError::NoBackend {
                target: target.to_string(),
            }
            .into()),
            Err(other) => Err(other),
        }
    }

    async fn attempt(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        let response = tokio::time::timeout(self.config.timeout, self.client.get(url).send())
            .await
            .map_err(|_| FetchFailure::Timeout)?
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }
        tokio::time::timeout(self.config.timeout, response.text())
            .await
            .map_err(|_| FetchFailure::Timeout)?
            .map_err(|e| FetchFailure::Transport(e.to_string()))
    }
}

/// Per-attempt failure, only ever logged; the caller sees the aggregate
#[derive(Debug)]
enum FetchFailure {
    Timeout,
    Status(u16),
    Transport(String),
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out"),
            Self::Status(status) => write!(f, "status {status}"),
            Self::Transport(message) => f.write_str(message),
        }
    }
}

/// Expand one configured backend address into endpoint attempts
///
/// An address that already carries a scheme is used as-is; a bare host
/// tries https first, then http.
fn endpoint_variants(base: &str) -> Vec<String> {
    let base = base.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        vec![base.to_string()]
    } else {
        vec![format!("https://{base}"), format!("http://{base}")]
    }
}

/// Render `node_text` locally for `target`
///
/// # Errors
/// Returns [`ConvertError::UnsupportedFallbackTarget`] for any target other
/// than base64; the in-process renderer covers nothing else.
pub fn render_fallback(target: &str, node_text: &str) -> Result<String> {
    if target.eq_ignore_ascii_case(FALLBACK_TARGET) {
        Ok(render_base64(node_text))
    } else {
        Err(ConvertError::UnsupportedFallbackTarget {
            target: target.to_string(),
        }
        .into())
    }
}

fn local_conversion(node_text: &str) -> Conversion {
    Conversion {
        rendered_text: render_base64(node_text),
        backend_used: "local".to_string(),
    }
}

/// Render the base64 subscription format from combined node text
///
/// Control bytes below 0x20 (other than `\n`, `\r`, `\t`) and DEL are
/// stripped before encoding; multi-byte characters pass through untouched.
/// Some client parsers reject payloads whose decoded form contains them.
pub fn render_base64(node_text: &str) -> String {
    let sanitized: String = node_text
        .chars()
        .filter(|&c| !(c < '\u{20}' && !matches!(c, '\n' | '\r' | '\t')) && c != '\u{7f}')
        .collect();
    base64::engine::general_purpose::STANDARD.encode(sanitized.as_bytes())
}
