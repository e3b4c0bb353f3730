//! Shared-key authentication
//!
//! Callers identify themselves with an access key sent in a configurable
//! header (`Access-Key` by default). The key is looked up in the settings'
//! service → key table and the matching service name becomes the call's
//! [`ServiceIdentity`].
//!
//! Keys are compared in constant time and every configured key is checked,
//! so response timing does not reveal how much of a key matched or which
//! entry it matched.

use rpcgate_core::{Error, Result, ServiceIdentity};
use subtle::ConstantTimeEq;
use warp::http::header::{HeaderMap, HeaderName};

use crate::settings::Settings;

/// Validates the access-key header of a request
#[derive(Debug, Clone)]
pub struct Authenticator {
    header: HeaderName,
    keys: Vec<(String, String)>,
}

impl Authenticator {
    /// Create an authenticator for a header and a service → key table
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the header name is not a valid HTTP header.
    pub fn new<I>(header: &str, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid access header name '{}': {}", header, e)))?;

        let mut keys: Vec<_> = keys.into_iter().collect();
        // Stable iteration order keeps the first-match rule deterministic.
        keys.sort();

        Ok(Self { header, keys })
    }

    /// Build an authenticator from process-wide settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.access_header_name,
            settings
                .keys
                .iter()
                .map(|(service, key)| (service.clone(), key.clone())),
        )
    }

    /// The header this authenticator reads
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Resolve the calling service from the request headers
    ///
    /// # Errors
    ///
    /// Returns `Error::Unauthorized` when the header is missing, is not valid
    /// UTF-8, or does not exactly match a configured key.
    #[tracing::instrument(skip_all, fields(header = %self.header))]
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<ServiceIdentity> {
        let presented = headers
            .get(&self.header)
            .ok_or_else(|| Error::Unauthorized(format!("Missing {} header", self.header)))?
            .to_str()
            .map_err(|_| Error::Unauthorized(format!("Malformed {} header", self.header)))?;

        if presented.is_empty() {
            return Err(Error::Unauthorized(format!("Empty {} header", self.header)));
        }

        let mut matched: Option<&str> = None;
        for (service, key) in &self.keys {
            if constant_time_compare(presented, key) && matched.is_none() {
                matched = Some(service.as_str());
            }
        }

        match matched {
            Some(service) => {
                tracing::debug!(service = %service, "Access key accepted");
                Ok(ServiceIdentity::new(service))
            }
            None => {
                tracing::warn!("Unknown access key");
                Err(Error::Unauthorized("Unknown access key".to_string()))
            }
        }
    }
}

/// Compare two strings without short-circuiting on the first mismatch
///
/// Both inputs are padded to the longer length with different filler bytes,
/// so a length difference is still a mismatch.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let max_len = a.len().max(b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
