use std::fmt::Display;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Invalid {
    Empty,
    Whitespace,
    Tag,
    Digest,
}

impl std::error::Error for Invalid {}
impl Display for Invalid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invalid::Empty => f.write_str("empty image reference"),
            Invalid::Whitespace => f.write_str("image reference contains whitespace"),
            Invalid::Tag => f.write_str("invalid image tag"),
            Invalid::Digest => f.write_str("invalid image digest"),
        }
    }
}

/// Whether a string satisfies the registry tag grammar
pub(crate) fn valid_tag(tag: &str) -> bool {
    if tag.is_empty() || tag.len() > 128 {
        return false;
    }

    let mut bytes = tag.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphanumeric() || b == b'_' => (),
        _ => return false,
    }

    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-')
}

/// A parsed container image reference
///
/// Parsing follows the usual client conventions: a missing registry becomes
/// `docker.io`, a bare single-segment name gets the `library/` prefix and a
/// missing tag becomes `latest`. The registry host is stored in its wire
/// form; `Display` renders the conventional short form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    host: String,
    path: String,
    tag: String,
    digest: Option<String>,
}

impl Reference {
    const DEFAULT_REGISTRY: &'static str = "docker.io";
    const DEFAULT_PREFIX: &'static str = "library";
    const DEFAULT_TAG: &'static str = "latest";

    const LOCALHOST: &'static str = "localhost";
    const ALIASES: &'static [(&'static str, &'static str)] =
        &[("docker.io", "registry.hub.docker.com")];

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The repository without tag or digest (format: host/name)
    pub fn repository(&self) -> String {
        format!("{}/{}", self.shortname_host(), self.path)
    }

    /// The same repository under a different tag
    pub fn with_tag(&self, tag: &str) -> Result<Self, Invalid> {
        if !valid_tag(tag) {
            return Err(Invalid::Tag);
        }

        Ok(Self {
            host: self.host.clone(),
            path: self.path.clone(),
            tag: tag.into(),
            digest: None,
        })
    }

    fn shortname_host(&self) -> &str {
        for (into, from) in Self::ALIASES {
            if self.host == *from && from.len() > into.len() {
                return into;
            }
        }

        &self.host
    }
}

impl FromStr for Reference {
    type Err = Invalid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Invalid::Empty);
        }

        if s.contains(char::is_whitespace) {
            return Err(Invalid::Whitespace);
        }

        // Split off a digest pin.
        let mut rest = s;
        let mut digest = None;
        let sep = rest.rfind('/').unwrap_or_default();
        if let Some(at) = rest.rfind('@') {
            if at > sep {
                let (lhs, rhs) = rest.split_at(at);
                if rhs[1..].is_empty() {
                    return Err(Invalid::Digest);
                }

                digest = Some(rhs[1..].to_string());
                rest = lhs;
            }
        }

        // Split off the tag. A colon before the last slash is a port.
        let sep = rest.rfind('/').unwrap_or_default();
        let lbl = rest.rfind(':').unwrap_or_default();
        let mut tag = Self::DEFAULT_TAG;
        if lbl > sep {
            let (lhs, rhs) = rest.split_at(lbl);
            rest = lhs;
            tag = &rhs[1..];
        }

        if !valid_tag(tag) {
            return Err(Invalid::Tag);
        }

        // Extract the registry.
        let mut host = Self::DEFAULT_REGISTRY;
        if let Some((lhs, rhs)) = rest.find('/').map(|n| rest.split_at(n)) {
            if lhs.contains('.') || lhs.contains(':') || lhs == Self::LOCALHOST {
                rest = &rhs[1..];
                host = lhs;
            }
        }

        if rest.is_empty() {
            return Err(Invalid::Empty);
        }

        // Add the default prefix if necessary.
        let path = match (host, rest.find('/')) {
            (Self::DEFAULT_REGISTRY, None) => format!("{}/{}", Self::DEFAULT_PREFIX, rest),
            _ => rest.into(),
        };

        // Substitute the aliases.
        for (from, into) in Self::ALIASES {
            if host == *from {
                host = *into;
                break;
            }
        }

        Ok(Self {
            host: host.into(),
            path,
            tag: tag.into(),
            digest,
        })
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.shortname_host(), self.path)?;

        match &self.digest {
            Some(digest) => write!(f, "@{}", digest),
            None => write!(f, ":{}", self.tag),
        }
    }
}
