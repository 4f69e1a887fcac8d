//! # Runtime Configuration
//!
//! Loads the network settings from layered JSON files:
//!
//! 1. `network.global.json`
//! 2. `network.<mode>.json`, where mode is the `RUNNING_MODE` variable
//!
//! Later files override earlier ones; both are optional. After the files,
//! `NETWORK_BASE_URL`, `NETWORK_BEARER_TOKEN` and `NETWORK_MOCK_DATA`
//! override their keys. Keys live under the `Network` section and are matched
//! case-insensitively:
//!
//! ```json
//! {
//!   "Network": {
//!     "BaseUrl": "https://api.stackexchange.com/2.3",
//!     "BearerToken": "...",
//!     "PinnedCertificates": ["certs/api.pem"],
//!     "EmbeddedErrorsTakePrecedence": true,
//!     "TrustFallback": "expired,hostname_mismatch,not_trusted",
//!     "QueryItems": { "site": "stackoverflow" }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{ext::*, *};
use thiserror::Error;

use crate::retrieve::apicall::{ApiCall, PipelinePolicy};
use crate::retrieve::endpoint::{CustomHost, EndpointError, QueryItem};
use crate::retrieve::errors::ServiceError;
use crate::retrieve::mock::{decode_mock_data, NetworkMockData};
use crate::retrieve::transport::NetworkService;
use crate::retrieve::trust::{TrustFailureClass, TrustPolicy};

const CONFIG_GLOBAL_NAME: &str = "network.global.json";
const RUNNING_MODE_VAR: &str = "RUNNING_MODE";

const KEY_BASE_URL: &str = "Network:BaseUrl";
const KEY_API: &str = "Network:Api";
const KEY_QUERY_ITEMS: &str = "Network:QueryItems:";
const KEY_BEARER_TOKEN: &str = "Network:BearerToken";
const KEY_PINNED_CERTIFICATES: &str = "Network:PinnedCertificates:";
const KEY_EMBEDDED_ERRORS: &str = "Network:EmbeddedErrorsTakePrecedence";
const KEY_TRUST_FALLBACK: &str = "Network:TrustFallback";
const KEY_MOCK_DATA: &str = "Network:MockData";

#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("configuration could not be loaded: {0}")]
    Build(String),

    #[error("required key {0} is not set")]
    MissingKey(String),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Resolved network settings.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub running_mode: Option<String>,
    pub config_dir: PathBuf,
    pub custom_host: CustomHost,
    pub bearer_token: Option<String>,
    /// Certificate files, relative paths resolved against `config_dir`.
    pub pinned_certificates: Vec<PathBuf>,
    pub pipeline_policy: PipelinePolicy,
    pub trust_policy: TrustPolicy,
    /// Fixture mappings; when present, callers serve requests from files.
    pub mock_data: Option<Vec<NetworkMockData>>,
    /// Every flattened key/value pair that was read.
    pub options: BTreeMap<String, String>,
}

impl NetworkConfig {
    /// Loads from `config_dir` using `RUNNING_MODE` and the environment.
    pub fn load(config_dir: impl AsRef<Path>) -> Result<Self, RuntimeConfigError> {
        let running_mode = env::var(RUNNING_MODE_VAR).ok().filter(|m| !m.is_empty());
        Self::load_with_mode(config_dir, running_mode.as_deref())
    }

    /// Loads from `config_dir` with an explicit running mode.
    pub fn load_with_mode(config_dir: impl AsRef<Path>, running_mode: Option<&str>) -> Result<Self, RuntimeConfigError> {
        let config_dir = config_dir.as_ref();
        let options = read_options(config_dir, running_mode)?;
        Self::from_options(config_dir, running_mode, options, |name| env::var(name).ok())
    }

    /// Builds the settings from flattened options. `env_lookup` supplies the
    /// environment overrides.
    pub fn from_options<F>(
        config_dir: &Path,
        running_mode: Option<&str>,
        options: BTreeMap<String, String>,
        env_lookup: F,
    ) -> Result<Self, RuntimeConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str, var: Option<&str>| -> Option<String> {
            var.and_then(|name| env_lookup(name))
                .or_else(|| option(&options, key).map(str::to_string))
                .filter(|v| !v.is_empty())
        };

        let base_url = lookup(KEY_BASE_URL, Some("NETWORK_BASE_URL"))
            .ok_or_else(|| RuntimeConfigError::MissingKey(KEY_BASE_URL.to_string()))?;
        let mut custom_host = CustomHost::from_base_url(&base_url)?;

        if let Some(api) = lookup(KEY_API, None) {
            custom_host = custom_host.with_api(api);
        }
        let query_items: Vec<QueryItem> = section(&options, KEY_QUERY_ITEMS)
            .map(|(name, value)| QueryItem::new(name, value))
            .collect();
        if !query_items.is_empty() {
            custom_host = custom_host.with_query_items(query_items);
        }

        let bearer_token = lookup(KEY_BEARER_TOKEN, Some("NETWORK_BEARER_TOKEN"));

        let mut pinned: Vec<(usize, PathBuf)> = Vec::new();
        for (index, value) in section(&options, KEY_PINNED_CERTIFICATES) {
            let index = index.parse::<usize>().map_err(|_| invalid(KEY_PINNED_CERTIFICATES, index))?;
            pinned.push((index, config_dir.join(value)));
        }
        pinned.sort_by_key(|(index, _)| *index);
        let pinned_certificates = pinned.into_iter().map(|(_, path)| path).collect();

        let pipeline_policy = match lookup(KEY_EMBEDDED_ERRORS, None) {
            Some(value) => PipelinePolicy {
                embedded_errors_take_precedence: parse_bool(&value).ok_or_else(|| invalid(KEY_EMBEDDED_ERRORS, &value))?,
            },
            None => PipelinePolicy::default(),
        };

        let trust_policy = match option(&options, KEY_TRUST_FALLBACK) {
            Some(value) => parse_trust_fallback(value).ok_or_else(|| invalid(KEY_TRUST_FALLBACK, value))?,
            None => TrustPolicy::default(),
        };

        let mock_data = match lookup(KEY_MOCK_DATA, Some("NETWORK_MOCK_DATA")) {
            Some(value) => Some(decode_mock_data(&value).ok_or_else(|| invalid(KEY_MOCK_DATA, &value))?),
            None => None,
        };

        Ok(Self {
            running_mode: running_mode.map(str::to_string),
            config_dir: config_dir.to_path_buf(),
            custom_host,
            bearer_token,
            pinned_certificates,
            pipeline_policy,
            trust_policy,
            mock_data,
            options,
        })
    }

    /// A response pipeline over `service` with this configuration's host,
    /// token and policy.
    pub fn api_call(&self, service: Arc<dyn NetworkService>) -> Result<ApiCall, ServiceError> {
        let call = ApiCall::new(service, self.custom_host.clone()).with_policy(self.pipeline_policy);
        match &self.bearer_token {
            Some(token) => call.with_bearer_token(token),
            None => Ok(call),
        }
    }
}

/// Flattens the JSON layers into `key -> value` pairs.
fn read_options(config_dir: &Path, running_mode: Option<&str>) -> Result<BTreeMap<String, String>, RuntimeConfigError> {
    let global_file = config_dir.join(CONFIG_GLOBAL_NAME).to_string_lossy().to_string();
    let mode_file = running_mode
        .map(|mode| config_dir.join(format!("network.{mode}.json")))
        .filter(|path| path.is_file())
        .map(|path| path.to_string_lossy().to_string());

    let mut builder = DefaultConfigurationBuilder::new();
    builder.add_json_file(&global_file.is().optional());
    if let Some(mode_file) = &mode_file {
        builder.add_json_file(&mode_file.is().optional());
    }
    let root = builder
        .build()
        .map_err(|e| RuntimeConfigError::Build(format!("{e:?}")))?;

    let mut options = BTreeMap::new();
    for (key, value) in root.iter(None) {
        let value = value.to_string();
        if !value.is_empty() {
            options.insert(key.to_string(), value);
        }
    }
    tracing::debug!("Read {} configuration keys from {}", options.len(), config_dir.display());
    Ok(options)
}

fn option<'a>(options: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

/// Children of `prefix` (which ends with `:`), as `(child name, value)`.
fn section<'a>(options: &'a BTreeMap<String, String>, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    options.iter().filter_map(move |(key, value)| {
        let head = key.get(..prefix.len())?;
        let name = &key[prefix.len()..];
        (head.eq_ignore_ascii_case(prefix) && !name.is_empty() && !name.contains(':'))
            .then_some((name, value.as_str()))
    })
}

fn invalid(key: &str, value: &str) -> RuntimeConfigError {
    RuntimeConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Comma list of failure classes; `none` or an empty list means strict pinning.
fn parse_trust_fallback(value: &str) -> Option<TrustPolicy> {
    if value.trim().eq_ignore_ascii_case("none") {
        return Some(TrustPolicy::strict());
    }
    let fallback_on = value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(TrustFailureClass::from_name)
        .collect::<Option<BTreeSet<_>>>()?;
    Some(TrustPolicy { fallback_on })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::mock::encode_mock_data;

    fn options(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn minimal_configuration_uses_defaults() {
        let config = NetworkConfig::from_options(
            Path::new("/etc/app"),
            None,
            options(&[("Network:BaseUrl", "https://api.stackexchange.com/2.3")]),
            no_env,
        )
        .unwrap();

        assert_eq!(config.custom_host.host, "api.stackexchange.com");
        assert_eq!(config.custom_host.path.as_deref(), Some("/2.3"));
        assert_eq!(config.pipeline_policy, PipelinePolicy::default());
        assert_eq!(config.trust_policy, TrustPolicy::default());
        assert!(config.pinned_certificates.is_empty());
        assert!(config.mock_data.is_none());
    }

    #[test]
    fn keys_are_case_insensitive_and_sections_collected() {
        let config = NetworkConfig::from_options(
            Path::new("/etc/app"),
            Some("qa"),
            options(&[
                ("network:baseurl", "http://localhost:8080"),
                ("NETWORK:PINNEDCERTIFICATES:1", "b.pem"),
                ("Network:PinnedCertificates:0", "/abs/a.der"),
                ("Network:QueryItems:site", "stackoverflow"),
                ("Network:EmbeddedErrorsTakePrecedence", "false"),
                ("Network:TrustFallback", "expired, not_trusted"),
            ]),
            no_env,
        )
        .unwrap();

        assert!(!config.custom_host.secure);
        assert_eq!(
            config.pinned_certificates,
            vec![PathBuf::from("/abs/a.der"), PathBuf::from("/etc/app/b.pem")]
        );
        assert_eq!(
            config.custom_host.query_items,
            Some(vec![QueryItem::new("site", "stackoverflow")])
        );
        assert!(!config.pipeline_policy.embedded_errors_take_precedence);
        assert_eq!(
            config.trust_policy.fallback_on,
            BTreeSet::from([TrustFailureClass::Expired, TrustFailureClass::NotTrusted])
        );
    }

    #[test]
    fn environment_overrides_files() {
        let mock = encode_mock_data(&[NetworkMockData::new("/2.3/users", "users")]).unwrap();
        let env = move |name: &str| match name {
            "NETWORK_BASE_URL" => Some("https://staging.example.com/v2".to_string()),
            "NETWORK_BEARER_TOKEN" => Some("from-env".to_string()),
            "NETWORK_MOCK_DATA" => Some(mock.clone()),
            _ => None,
        };
        let config = NetworkConfig::from_options(
            Path::new("."),
            None,
            options(&[
                ("Network:BaseUrl", "https://api.example.com"),
                ("Network:BearerToken", "from-file"),
            ]),
            env,
        )
        .unwrap();

        assert_eq!(config.custom_host.host, "staging.example.com");
        assert_eq!(config.bearer_token.as_deref(), Some("from-env"));
        assert_eq!(config.mock_data.unwrap()[0].filename, "users");
    }

    #[test]
    fn missing_and_invalid_values_are_reported() {
        let result = NetworkConfig::from_options(Path::new("."), None, BTreeMap::new(), no_env);
        assert!(matches!(result, Err(RuntimeConfigError::MissingKey(_))));

        let result = NetworkConfig::from_options(
            Path::new("."),
            None,
            options(&[
                ("Network:BaseUrl", "https://api.example.com"),
                ("Network:TrustFallback", "expired,revoked"),
            ]),
            no_env,
        );
        assert!(matches!(result, Err(RuntimeConfigError::InvalidValue { .. })));
    }

    #[test]
    fn strict_trust_fallback() {
        assert_eq!(parse_trust_fallback("none"), Some(TrustPolicy::strict()));
        assert_eq!(parse_trust_fallback(""), Some(TrustPolicy::strict()));
    }

    #[test]
    fn json_layers_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("network.global.json"),
            r#"{"Network":{"BaseUrl":"https://api.example.com/2.3","BearerToken":"global"}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("network.qa.json"),
            r#"{"Network":{"BearerToken":"qa"}}"#,
        )
        .unwrap();

        let options = read_options(dir.path(), Some("qa")).unwrap();
        assert_eq!(option(&options, KEY_BASE_URL), Some("https://api.example.com/2.3"));
        assert_eq!(option(&options, KEY_BEARER_TOKEN), Some("qa"));

        let options = read_options(dir.path(), None).unwrap();
        assert_eq!(option(&options, KEY_BEARER_TOKEN), Some("global"));
    }
}
