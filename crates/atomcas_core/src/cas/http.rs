//! Blocking HTTP client for the CAS daemon's `/api/v0` surface.
//!
//! # Responsibility
//! - Speak the daemon's RPC conventions: POST everywhere, repeated `arg`
//!   query parameters, JSON responses, multipart upload for `dag/put`.
//! - Classify daemon errors into `NotFound` vs transport failure by sniffing
//!   the error body.
//!
//! # Invariants
//! - No call retries here; retry policy belongs to the daemon client
//!   configuration, not this layer.

use super::{CasClient, CasConnector, CasError, CasResult, ObjectLink};
use serde_json::Value;
use std::time::Duration;

const MULTIPART_BOUNDARY: &str = "atomcas-object-boundary";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One HTTP connection to the CAS daemon.
pub struct HttpCasClient {
    agent: ureq::Agent,
    api_base: String,
}

/// Connector producing [`HttpCasClient`] handles for one daemon address.
pub struct HttpConnector {
    host: String,
    port: u16,
}

impl HttpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl CasConnector for HttpConnector {
    fn connect(&self) -> CasResult<Box<dyn CasClient>> {
        Ok(Box::new(HttpCasClient::new(&self.host, self.port)))
    }
}

impl HttpCasClient {
    pub fn new(host: &str, port: u16) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();
        Self {
            agent,
            api_base: format!("http://{host}:{port}/api/v0"),
        }
    }

    fn call(&self, endpoint: &str, args: &[(&str, &str)], hint: &str) -> CasResult<Value> {
        let url = format!("{}/{endpoint}", self.api_base);
        let mut request = self.agent.post(&url);
        for (key, value) in args {
            request = request.query(key, value);
        }
        let response = request.call().map_err(|err| classify(err, hint))?;
        response
            .into_json::<Value>()
            .map_err(|err| CasError::Protocol(format!("{endpoint}: {err}")))
    }
}

impl CasClient for HttpCasClient {
    fn dag_put(&self, object: &Value) -> CasResult<String> {
        let payload = serde_json::to_vec(object)
            .map_err(|err| CasError::Protocol(format!("dag/put payload: {err}")))?;
        let body = multipart_file(&payload);
        let url = format!("{}/dag/put", self.api_base);
        let response = self
            .agent
            .post(&url)
            .query("store-codec", "dag-json")
            .query("input-codec", "json")
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .send_bytes(&body)
            .map_err(|err| classify(err, "dag/put"))?;
        let json = response
            .into_json::<Value>()
            .map_err(|err| CasError::Protocol(format!("dag/put: {err}")))?;
        cid_of(&json["Cid"]).ok_or_else(|| CasError::Protocol("dag/put returned no Cid".into()))
    }

    fn dag_get(&self, path: &str) -> CasResult<Value> {
        self.call("dag/get", &[("arg", path)], path)
    }

    fn object_new(&self) -> CasResult<String> {
        let json = self.call("object/new", &[], "object/new")?;
        hash_of(&json).ok_or_else(|| CasError::Protocol("object/new returned no Hash".into()))
    }

    fn patch_add_link(&self, base: &str, name: &str, target: &str) -> CasResult<String> {
        let json = self.call(
            "object/patch/add-link",
            &[("arg", base), ("arg", name), ("arg", target)],
            name,
        )?;
        hash_of(&json).ok_or_else(|| CasError::Protocol("add-link returned no Hash".into()))
    }

    fn patch_rm_link(&self, base: &str, name: &str) -> CasResult<String> {
        let json = self.call(
            "object/patch/rm-link",
            &[("arg", base), ("arg", name)],
            name,
        )?;
        hash_of(&json).ok_or_else(|| CasError::Protocol("rm-link returned no Hash".into()))
    }

    fn list_links(&self, cid: &str) -> CasResult<Vec<ObjectLink>> {
        let json = self.call("object/links", &[("arg", cid)], cid)?;
        let mut links = Vec::new();
        if let Some(entries) = json["Links"].as_array() {
            for entry in entries {
                let name = entry["Name"].as_str().unwrap_or_default().to_string();
                let target = entry["Hash"]
                    .as_str()
                    .map(str::to_string)
                    .or_else(|| cid_of(&entry["Cid"]))
                    .ok_or_else(|| {
                        CasError::Protocol(format!("link `{name}` carries no target CID"))
                    })?;
                links.push(ObjectLink { name, cid: target });
            }
        }
        Ok(links)
    }

    fn key_find(&self, name: &str) -> CasResult<Option<String>> {
        let json = self.call("key/list", &[], "key/list")?;
        if let Some(keys) = json["Keys"].as_array() {
            for key in keys {
                if key["Name"].as_str() == Some(name) {
                    return Ok(key["Id"].as_str().map(str::to_string));
                }
            }
        }
        Ok(None)
    }

    fn key_create(&self, name: &str) -> CasResult<String> {
        let json = self.call("key/gen", &[("arg", name)], name)?;
        json["Id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CasError::Protocol("key/gen returned no Id".into()))
    }

    fn name_publish(&self, key: &str, cid: &str, lifetime: &str, ttl: &str) -> CasResult<()> {
        let target = format!("/cas/{cid}");
        self.call(
            "name/publish",
            &[
                ("arg", target.as_str()),
                ("key", key),
                ("lifetime", lifetime),
                ("ttl", ttl),
            ],
            key,
        )?;
        Ok(())
    }

    fn name_resolve(&self, name: &str) -> CasResult<String> {
        let json = self.call("name/resolve", &[("arg", name)], name)?;
        let path = json["Path"]
            .as_str()
            .ok_or_else(|| CasError::Protocol("name/resolve returned no Path".into()))?;
        let cid = path.rsplit('/').next().unwrap_or(path);
        if cid.is_empty() {
            return Err(CasError::Protocol(format!("unusable resolve path `{path}`")));
        }
        Ok(cid.to_string())
    }
}

fn multipart_file(payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 256);
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"object.json\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

fn cid_of(value: &Value) -> Option<String> {
    value["/"]
        .as_str()
        .or_else(|| value.as_str())
        .map(str::to_string)
}

fn hash_of(value: &Value) -> Option<String> {
    value["Hash"]
        .as_str()
        .map(str::to_string)
        .or_else(|| cid_of(&value["Cid"]))
}

fn classify(err: ureq::Error, hint: &str) -> CasError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            if looks_absent(&body) {
                CasError::NotFound(hint.to_string())
            } else {
                let snippet: String = body.chars().take(200).collect();
                CasError::Transport(format!("HTTP {code} for {hint}: {snippet}"))
            }
        }
        ureq::Error::Transport(transport) => CasError::Transport(transport.to_string()),
    }
}

fn looks_absent(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("not found")
        || lower.contains("no link named")
        || lower.contains("could not resolve")
        || lower.contains("no such")
}
