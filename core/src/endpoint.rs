//! Endpoint name + parameters -> absolute URL.

use std::collections::BTreeMap;
use std::fmt::Display;

use crate::error::EndpointError;
use crate::schema::Schema;

/// Named arguments for a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Display) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    /// Like `with`, skipping `None`.
    pub fn with_opt(self, name: &str, value: Option<impl Display>) -> Self {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Resolves endpoint names against one schema under one base URL.
///
/// URLs have the form `<scheme>://<host>:<port>/<version>/<path>[?query]`.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    base_url: String,
    schema: Schema,
}

impl EndpointResolver {
    pub fn new(host: &str, port: u16, schema: Schema) -> Self {
        let scheme = if port == 443 { "https" } else { "http" };
        let host = host.trim_end_matches('/');
        Self {
            base_url: format!("{scheme}://{host}:{port}/{}", schema.version),
            schema,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn resolve(&self, name: &str, params: &Params) -> Result<String, EndpointError> {
        let template = self
            .schema
            .endpoint(name)
            .ok_or_else(|| EndpointError::Unknown(name.to_string()))?;

        let mut url = format!("{}/{}", self.base_url, fill(name, &template.path, params)?);

        let query: Vec<String> = template
            .query
            .iter()
            .filter_map(|q| {
                params
                    .get(&q.param)
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{}={}", urlencoding::encode(q.wire_name()), urlencoding::encode(v)))
            })
            .collect();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }
        Ok(url)
    }
}

fn fill(endpoint: &str, template: &str, params: &Params) -> Result<String, EndpointError> {
    let malformed = || EndpointError::Malformed {
        endpoint: endpoint.to_string(),
        template: template.to_string(),
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(malformed)?;
        let name = &after[..close];
        if name.is_empty() || name.contains('{') {
            return Err(malformed());
        }
        let value = params.get(name).ok_or_else(|| EndpointError::MissingArgument {
            endpoint: endpoint.to_string(),
            argument: name.to_string(),
        })?;
        out.push_str(&encode_path_value(value));
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(malformed());
    }
    out.push_str(rest);
    Ok(out)
}

// Coordinates and handles pass through readable.
fn encode_path_value(value: &str) -> String {
    urlencoding::encode(value).replace("%40", "@").replace("%2C", ",")
}
