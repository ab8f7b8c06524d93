//! Sender origin policy for incoming reports

use std::collections::HashSet;
use url::{Origin, Url};

use crate::error::{Error, Result};

/// Which sender origins the receiver accepts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    /// Accept any sender (the behaviour being demonstrated)
    #[default]
    Permissive,
    /// Accept only these origins (normalised `scheme://host[:port]`)
    Trusted(HashSet<String>),
}

impl OriginPolicy {
    /// Empty list means permissive
    pub fn from_origins<I, S>(origins: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let trusted = origins
            .into_iter()
            .map(|origin| normalize_origin(origin.as_ref()))
            .collect::<Result<HashSet<_>>>()?;

        if trusted.is_empty() {
            Ok(OriginPolicy::Permissive)
        } else {
            Ok(OriginPolicy::Trusted(trusted))
        }
    }

    pub fn is_permissive(&self) -> bool {
        matches!(self, OriginPolicy::Permissive)
    }

    pub fn allows(&self, sender_origin: &str) -> bool {
        match self {
            OriginPolicy::Permissive => true,
            OriginPolicy::Trusted(trusted) => normalize_origin(sender_origin)
                .map(|origin| trusted.contains(&origin))
                .unwrap_or(false),
        }
    }
}

/// Serialise an origin the way browsers report it
pub fn normalize_origin(origin: &str) -> Result<String> {
    let url = Url::parse(origin.trim())?;
    match url.origin() {
        origin @ Origin::Tuple(..) => Ok(origin.ascii_serialization()),
        Origin::Opaque(_) => Err(Error::InvalidOrigin(format!("opaque origin: {}", url))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_permissive() {
        let policy = OriginPolicy::from_origins(Vec::<String>::new()).unwrap();
        assert!(policy.is_permissive());
        assert!(policy.allows("https://anyone.example"));
        assert!(policy.allows("null"));
    }

    #[test]
    fn test_trusted_matches_normalised_origins() {
        let policy = OriginPolicy::from_origins(["https://Tracker.Example:443/"]).unwrap();

        assert!(policy.allows("https://tracker.example"));
        assert!(!policy.allows("https://evil.example"));
        assert!(!policy.allows("http://tracker.example"));
        assert!(!policy.allows("null"));
    }

    #[test]
    fn test_rejects_opaque_configuration() {
        assert!(OriginPolicy::from_origins(["data:text/plain,hi"]).is_err());
        assert!(OriginPolicy::from_origins(["not a url"]).is_err());
    }
}
