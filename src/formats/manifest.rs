// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2021 Profian, Inc.

use super::reference::valid_tag;

use regex::Regex;

// Indentation, an optional list dash, the key, an optional opening quote,
// the reference itself, then the rest of the line verbatim.
const LINE: &str = r#"^(\s*(?:-\s+)?image:\s+["']?)([^\s"'#]+)(.*)"#;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    NotFound,
    Ambiguous(Vec<String>),
    Repository,
    Tag,
}

impl std::error::Error for Error {}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound => f.write_str("no matching image line"),
            Error::Ambiguous(repos) => write!(f, "matches several repositories: {}", repos.join(", ")),
            Error::Repository => f.write_str("invalid repository"),
            Error::Tag => f.write_str("invalid image tag"),
        }
    }
}

// Splits an image value into its repository and an optional digest pin,
// discarding any tag.
fn split(value: &str) -> (&str, Option<&str>) {
    let (value, digest) = match value.rfind('@') {
        Some(n) => (&value[..n], Some(&value[n + 1..])),
        None => (value, None),
    };

    let sep = value.rfind('/').unwrap_or_default();
    match value.rfind(':') {
        Some(n) if n > sep => (&value[..n], digest),
        _ => (value, digest),
    }
}

// A repository matches the query exactly or by its trailing path segments,
// the same shortname convention registries apply.
fn matches(repo: &str, query: &str) -> bool {
    if repo == query {
        return true;
    }

    repo.len() > query.len()
        && repo.ends_with(query)
        && repo.as_bytes()[repo.len() - query.len() - 1] == b'/'
}

/// A deployment manifest held as raw text
///
/// The document is never deserialized and reserialized as a whole. Patching
/// rewrites the tag substring of the matching `image:` lines and leaves
/// every other byte of the document alone, so formatting, comments and line
/// endings survive untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest(String);

impl Manifest {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every image reference in the document, with its line number
    pub fn images(&self) -> Vec<(usize, &str)> {
        let re = Regex::new(LINE).unwrap();

        self.0
            .lines()
            .enumerate()
            .filter_map(|(n, line)| {
                let caps = re.captures(line)?;
                Some((n + 1, caps.get(2).unwrap().as_str()))
            })
            .collect()
    }

    /// Checks that every document in the manifest parses as YAML
    pub fn validate(&self) -> Result<(), serde_yaml::Error> {
        for doc in self.documents() {
            let blank = doc.lines().all(|l| {
                let l = l.trim();
                l.is_empty() || l.starts_with('#')
            });

            if !blank {
                serde_yaml::from_str::<serde_yaml::Value>(doc)?;
            }
        }

        Ok(())
    }

    /// Rewrites the tag of every image line matching the repository
    ///
    /// The query may be a full repository (`registry.example.com/app`) or a
    /// shortname (`app`). When the query hits lines naming more than one
    /// distinct repository the patch is refused rather than guessed at.
    /// Digest-pinned lines never match a tag query.
    ///
    /// Patching is idempotent and touches nothing but the tag portion of
    /// the matching lines.
    pub fn retag(&self, repository: &str, tag: &str) -> Result<Self, Error> {
        if repository.is_empty() || repository.contains(char::is_whitespace) {
            return Err(Error::Repository);
        }

        if !valid_tag(tag) {
            return Err(Error::Tag);
        }

        let re = Regex::new(LINE).unwrap();

        // Which repositories does the query hit?
        let mut repos: Vec<&str> = Vec::new();
        for line in self.0.lines() {
            if let Some(caps) = re.captures(line) {
                let (repo, digest) = split(caps.get(2).unwrap().as_str());
                if digest.is_none() && matches(repo, repository) && !repos.contains(&repo) {
                    repos.push(repo);
                }
            }
        }

        match repos.len() {
            0 => return Err(Error::NotFound),
            1 => (),
            _ => {
                let repos = repos.into_iter().map(String::from).collect();
                return Err(Error::Ambiguous(repos));
            }
        }

        // Rewrite the tag on every hit.
        let mut out = String::with_capacity(self.0.len());
        for line in self.0.split_inclusive('\n') {
            let caps = match re.captures(line) {
                Some(caps) => caps,
                None => {
                    out.push_str(line);
                    continue;
                }
            };

            let value = caps.get(2).unwrap();
            let (repo, digest) = split(value.as_str());
            if digest.is_some() || !matches(repo, repository) {
                out.push_str(line);
                continue;
            }

            out.push_str(&line[..value.start() + repo.len()]);
            out.push(':');
            out.push_str(tag);
            out.push_str(&line[value.end()..]);
        }

        Ok(Self(out))
    }

    // Byte ranges of the YAML documents, split on `---` lines.
    fn documents(&self) -> Vec<&str> {
        let mut docs = Vec::new();
        let mut start = 0;
        let mut offset = 0;

        for line in self.0.split_inclusive('\n') {
            if line.trim_end() == "---" {
                docs.push(&self.0[start..offset]);
                start = offset + line.len();
            }

            offset += line.len();
        }

        docs.push(&self.0[start..]);
        docs
    }
}

#[cfg(test)]
mod test {
    use super::{Error, Manifest};

    const DEPLOYMENT: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
        - name: web
          image: registry.example.com/app:42-abc123
          ports:
            - containerPort: 8080
";

    #[test]
    fn retag() {
        let patched = Manifest::new(DEPLOYMENT)
            .retag("registry.example.com/app", "43-def456")
            .unwrap();

        assert_eq!(
            patched.as_str(),
            DEPLOYMENT.replace(
                "image: registry.example.com/app:42-abc123",
                "image: registry.example.com/app:43-def456"
            )
        );
    }

    #[test]
    fn only_the_tag_changes() {
        let manifest = Manifest::new(DEPLOYMENT);
        let patched = manifest.retag("registry.example.com/app", "43-def456").unwrap();

        for (old, new) in manifest.as_str().lines().zip(patched.as_str().lines()) {
            if old.contains("image:") {
                assert_eq!(new.trim(), "image: registry.example.com/app:43-def456");
            } else {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn idempotent() {
        let once = Manifest::new(DEPLOYMENT)
            .retag("registry.example.com/app", "43-def456")
            .unwrap();
        let twice = once.retag("registry.example.com/app", "43-def456").unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn shortname_query() {
        let patched = Manifest::new(DEPLOYMENT).retag("app", "43-def456").unwrap();
        assert!(patched
            .as_str()
            .contains("image: registry.example.com/app:43-def456"));
    }

    #[test]
    fn every_occurrence() {
        let text = "\
initContainers:
  - name: migrate
    image: registry.example.com/app:42-abc123
containers:
  - name: web
    image: registry.example.com/app:42-abc123
";

        let patched = Manifest::new(text)
            .retag("registry.example.com/app", "43-def456")
            .unwrap();

        assert_eq!(patched.as_str().matches(":43-def456").count(), 2);
        assert_eq!(patched.as_str().matches(":42-abc123").count(), 0);
    }

    #[test]
    fn not_found() {
        let err = Manifest::new(DEPLOYMENT)
            .retag("registry.example.com/other", "1")
            .unwrap_err();
        assert_eq!(err, Error::NotFound);

        let err = Manifest::new("kind: Service\n").retag("app", "1").unwrap_err();
        assert_eq!(err, Error::NotFound);
    }

    #[test]
    fn ambiguous() {
        let text = "\
containers:
  - name: web
    image: registry.example.com/app:1
  - name: sidecar
    image: mirror.example.org/app:7
";

        let err = Manifest::new(text).retag("app", "2").unwrap_err();
        match err {
            Error::Ambiguous(repos) => {
                assert_eq!(repos.len(), 2);
                assert!(repos.contains(&"registry.example.com/app".to_string()));
                assert!(repos.contains(&"mirror.example.org/app".to_string()));
            }
            err => panic!("expected an ambiguous match: {:?}", err),
        }
    }

    #[test]
    fn preserves_bytes() {
        let text = "kind: Pod\r\nspec:\r\n  containers:\r\n    - image: \"app:1\" # pinned by ci\r\n  restartPolicy: Never\r\n";
        let patched = Manifest::new(text).retag("app", "2").unwrap();

        assert_eq!(
            patched.as_str(),
            "kind: Pod\r\nspec:\r\n  containers:\r\n    - image: \"app:2\" # pinned by ci\r\n  restartPolicy: Never\r\n"
        );
    }

    #[test]
    fn untagged_line_gains_a_tag() {
        let patched = Manifest::new("image: registry.example.com/app\n")
            .retag("registry.example.com/app", "1")
            .unwrap();

        assert_eq!(patched.as_str(), "image: registry.example.com/app:1\n");
    }

    #[test]
    fn pinned_lines_never_match() {
        let text = "image: registry.example.com/app@sha256:0a1b2c\n";

        let err = Manifest::new(text)
            .retag("registry.example.com/app", "1")
            .unwrap_err();
        assert_eq!(err, Error::NotFound);
    }

    #[test]
    fn substrings_are_not_shortnames() {
        let text = "image: registry.example.com/my-app:1\n";

        let err = Manifest::new(text).retag("app", "2").unwrap_err();
        assert_eq!(err, Error::NotFound);
    }

    #[test]
    fn bad_inputs() {
        let manifest = Manifest::new(DEPLOYMENT);

        assert_eq!(manifest.retag("", "1").unwrap_err(), Error::Repository);
        assert_eq!(manifest.retag("two words", "1").unwrap_err(), Error::Repository);
        assert_eq!(manifest.retag("app", "").unwrap_err(), Error::Tag);
        assert_eq!(manifest.retag("app", "a tag").unwrap_err(), Error::Tag);
        assert_eq!(manifest.retag("app", "-x").unwrap_err(), Error::Tag);
    }

    #[test]
    fn images() {
        let text = "\
containers:
  - image: registry.example.com/app:1
  - image: quay.io/other/web@sha256:0a1b2c
";

        let manifest = Manifest::new(text);
        assert_eq!(
            manifest.images(),
            vec![
                (2, "registry.example.com/app:1"),
                (3, "quay.io/other/web@sha256:0a1b2c"),
            ]
        );
    }

    #[test]
    fn validate() {
        let multi = format!("# release manifests\n---\n{}---\nkind: Service\n", DEPLOYMENT);
        assert!(Manifest::new(multi).validate().is_ok());

        assert!(Manifest::new("key: [unterminated\n").validate().is_err());
    }
}
