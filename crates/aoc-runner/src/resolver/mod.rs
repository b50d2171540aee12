//! Identity resolution: turn a session credential into an identity record.
//!
//! The resolver fetches the account settings page with the credential as
//! the session cookie. The site redirects dead credentials to the landing
//! page, so anything other than `200` means the credential is unusable.
//!
//! # Modules
//!
//! - [`transport`]: the `Transport` trait and the rate-limited `HttpClient`.
//! - [`scrape`]: extraction of the id code and provider spans from markup.

pub mod scrape;
pub mod transport;

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::{mask_credential, AuthError, Result};
use crate::identity::{IdentityRecord, UNKNOWN};

pub use scrape::{SettingsPage, Span};
pub use transport::{HttpClient, HttpResponse, RateLimiter, Transport};

/// Provider link prefixes, matched against `Link to ...` span text.
const PROVIDER_LINKS: [(&str, &str); 3] = [
    ("https://github.com/", "github"),
    ("https://twitter.com/", "twitter"),
    ("https://www.reddit.com/u/", "reddit"),
];

const LINK_MARKER: &str = "Link to ";
const GOOGLE_AVATAR_HOST: &str = "googleusercontent.com";

/// Identity fields scraped from a settings page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub identity_id: i64,
    pub source: String,
    pub display_name: String,
}

/// Pull the identity out of a parsed settings page.
///
/// Missing provider information degrades to `unknown`/`unknown`; only a
/// missing or malformed id is an error.
///
/// # Errors
///
/// Returns `AuthError::UnexpectedResponse` if the id code is absent or
/// not numeric.
pub fn extract_profile(page: &SettingsPage) -> Result<Profile> {
    let id_field = page.code_field(1).ok_or_else(|| {
        AuthError::UnexpectedResponse("no user id code found on settings page".to_string())
    })?;
    let identity_id: i64 = id_field.parse().map_err(|_| {
        AuthError::UnexpectedResponse(format!("user id {id_field:?} is not numeric"))
    })?;

    let mut source = UNKNOWN.to_string();
    let mut display_name = UNKNOWN.to_string();

    for span in page.spans() {
        if let Some(link) = span.text.strip_prefix(LINK_MARKER) {
            match PROVIDER_LINKS
                .iter()
                .find_map(|(prefix, name)| link.strip_prefix(prefix).map(|rest| (*name, rest)))
            {
                Some((name, rest)) => {
                    source = name.to_string();
                    display_name = rest.trim_end_matches('/').to_string();
                }
                None => {
                    warn!("problem in parsing {:?}", span.text);
                    source = UNKNOWN.to_string();
                    display_name = UNKNOWN.to_string();
                }
            }
            debug!("found {:?}", span.text);
        } else if span
            .img_src
            .as_deref()
            .is_some_and(|src| src.contains(GOOGLE_AVATAR_HOST))
        {
            debug!("found google user content img, getting google username");
            source = "google".to_string();
            display_name = span.text.clone();
            break;
        }
    }

    Ok(Profile {
        identity_id,
        source,
        display_name,
    })
}

/// Resolves credentials against the settings endpoint.
pub struct IdentityResolver<T> {
    transport: T,
    settings_url: String,
}

impl<T: Transport> IdentityResolver<T> {
    /// Create a resolver for the site configured in `config`.
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            settings_url: config.settings_url(),
        }
    }

    /// The transport requests go through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Find the owner of `credential`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidArgument` for an empty or malformed
    /// credential, `AuthError::DeadCredential` if the site rejects it,
    /// `AuthError::UnexpectedResponse` if the page carries no id, and
    /// `AuthError::Validation` if the scraped identity is not a valid record
    /// (for example an unrecognised login provider).
    pub fn resolve(&self, credential: &str) -> Result<IdentityRecord> {
        check_credential(credential)?;

        let response = self
            .transport
            .get(&self.settings_url, Some(credential), false)?;
        if response.status != 200 {
            info!(
                "Session ...{} is dead - status_code={}",
                mask_credential(credential),
                response.status
            );
            return Err(AuthError::DeadCredential {
                suffix: mask_credential(credential),
                status: response.status,
            });
        }

        let page = SettingsPage::parse(&response.body);
        let profile = extract_profile(&page)?;

        let record = IdentityRecord::new(
            profile.display_name,
            profile.identity_id,
            profile.source,
            crate::time::now(),
            credential,
        )?;
        debug!(
            "Created user {} for token ...{}",
            record.key(),
            record.masked_credential()
        );
        Ok(record)
    }
}

/// Reject credentials that could never be a session cookie.
pub fn check_credential(credential: &str) -> Result<()> {
    if credential.is_empty() {
        return Err(AuthError::InvalidArgument(
            "token must not be empty".to_string(),
        ));
    }
    if credential
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == ';')
    {
        return Err(AuthError::InvalidArgument(format!(
            "token ...{} contains whitespace or separator characters",
            mask_credential(credential)
        )));
    }
    Ok(())
}
