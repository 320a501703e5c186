use crate::formats::Reference;

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Deserialize;

/// A remote repository on a registry speaking the HTTP v2 protocol
#[derive(Clone, Debug)]
pub struct Repository {
    agent: ureq::Agent,
    host: String,
    path: String,
}

impl Repository {
    pub fn new(reference: &Reference) -> Self {
        Self {
            agent: ureq::Agent::new(),
            host: reference.host().into(),
            path: reference.path().into(),
        }
    }

    // Fetches an anonymous bearer token for the challenge parameters.
    fn auth(&self, wwwauth: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Auth {
            token: String,
        }

        const RE: &str = "([a-z]+)=\"([^\"]+)\"";

        let mut map = HashMap::new();
        let re = Regex::new(RE).unwrap();
        for caps in re.captures_iter(wwwauth) {
            let k = caps.get(1).unwrap().as_str();
            let v = caps.get(2).unwrap().as_str();
            map.insert(k, v);
        }

        let base = match map.remove("realm") {
            Some(realm) => realm,
            None => return Err(anyhow!("challenge has no realm: {}", wwwauth)),
        };

        let join: Vec<String> = map.iter().map(|(k, v)| [*k, *v].join("=")).collect();
        let args = join.join("&");
        let url = format!("{}?{}", base, args);

        let auth: Auth = self.agent.get(&url).call()?.into_json()?;
        Ok(format!("Bearer {}", auth.token))
    }

    fn get(&self, path: &str, token: Option<&str>) -> Result<ureq::Response> {
        let url = format!("https://{}/v2/{}/{}", self.host, self.path, path);

        let mut req = self.agent.get(&url);
        if let Some(token) = token {
            req = req.set("Authorization", token);
        }

        match req.call() {
            Ok(rep) => Ok(rep),
            Err(ureq::Error::Status(401, rep)) if token.is_none() => {
                match rep.header("Www-Authenticate") {
                    Some(hdr) => {
                        let token = self.auth(hdr)?;
                        self.get(path, Some(&token))
                    }
                    None => Err(anyhow!("received status: 401")),
                }
            }
            Err(ureq::Error::Status(code, ..)) => Err(anyhow!("received status: {}", code)),
            Err(err) => Err(err.into()),
        }
    }

    pub fn tags(&self) -> Result<Vec<String>> {
        #[derive(Debug, Deserialize)]
        struct Tags {
            #[allow(dead_code)]
            name: String,
            tags: Vec<String>,
        }

        let rep = self.get("tags/list", None)?;
        let tags: Tags = rep.into_json()?;
        Ok(tags.tags)
    }

    pub fn has_tag(&self, tag: &str) -> Result<bool> {
        Ok(self.tags()?.iter().any(|t| t == tag))
    }
}
