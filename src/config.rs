//! Export configuration
//!
//! Loaded from `--config <path>` or `~/.iacport/config.yaml` when present.
//! Every field has a default; command-line flags override what is loaded.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

use crate::export::catalog;
use crate::export::pipeline::DEFAULT_PARALLELISM;
use crate::export::{Layout, ProviderPin, RegistryOverride, SkipRules};
use crate::traits::FileSystem;

const CONFIG_DIR: &str = ".iacport";
const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_TOKEN_ENV: &str = "CRIBL_BEARER_TOKEN";
pub const DEFAULT_OUTPUT_DIR: &str = "cribl-export";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub base_url: Option<String>,
    /// Name of the environment variable holding the bearer token
    pub token_env: String,
    /// Products whose groups are listed as scopes
    pub products: Vec<String>,
    /// Scope allow-list, matched by id or label
    pub groups: Vec<String>,
    /// Type allow-list; empty exports every registered type
    pub types: Vec<String>,
    pub lakes: Vec<String>,
    pub parallelism: usize,
    pub layout: Layout,
    pub output_dir: PathBuf,
    pub provider: ProviderConfig,
    pub skip: SkipConfig,
    /// Per-type replacement of registry fields
    pub overrides: BTreeMap<String, RegistryOverride>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            products: vec!["stream".to_string(), "edge".to_string()],
            groups: Vec::new(),
            types: Vec::new(),
            lakes: vec!["default".to_string()],
            parallelism: DEFAULT_PARALLELISM,
            layout: Layout::Flat,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            provider: ProviderConfig::default(),
            skip: SkipConfig::default(),
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub source: String,
    /// Terraform-style constraint, e.g. `~> 1.0`
    pub version: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            source: catalog::PROVIDER_SOURCE.to_string(),
            version: catalog::PROVIDER_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipConfig {
    pub deny: Vec<DenyEntry>,
    pub packs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenyEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
}

/// Where to reach the management API
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub base_url: String,
    pub token: Option<String>,
}

impl ExportConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path (which must exist) or the default location
    /// (which may be absent)
    pub fn load(fs: &dyn FileSystem, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !fs.exists(path) {
                    bail!("Config file not found: {:?}", path);
                }
                path.to_path_buf()
            }
            None => match Self::default_path() {
                Some(path) if fs.exists(&path) => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs.read_to_string(&path)?;
        Self::parse(&content).with_context(|| format!("Failed to load config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: ExportConfig =
            serde_yaml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url {
            validate_base_url(base_url)?;
        }
        if self.parallelism == 0 {
            bail!("parallelism must be at least 1");
        }
        validate_version_constraint(&self.provider.version)?;
        Ok(())
    }

    pub fn skip_rules(&self) -> SkipRules {
        let rules = self
            .skip
            .deny
            .iter()
            .fold(SkipRules::new(), |rules, entry| rules.deny(&entry.type_name, &entry.id));
        self.skip
            .packs
            .iter()
            .fold(rules, |rules, pack| rules.deny_pack(pack))
    }

    pub fn provider_pin(&self) -> ProviderPin {
        ProviderPin {
            source: self.provider.source.clone(),
            version: self.provider.version.clone(),
        }
    }

    /// Resolve the connection, reading the token through `lookup`
    pub fn connection(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Connection> {
        let base_url = self
            .base_url
            .clone()
            .context("No base URL configured (use --base-url or set base_url in the config file)")?;
        validate_base_url(&base_url)?;

        Ok(Connection {
            base_url,
            token: lookup(&self.token_env).filter(|t| !t.is_empty()),
        })
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let url = Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Base URL must use http or https: {}", base_url);
    }
    Ok(())
}

/// Accept the `~>` pessimistic operator by checking it as a semver tilde
fn validate_version_constraint(version: &str) -> Result<()> {
    let normalized = version
        .split(',')
        .map(|part| part.replace("~>", "~").replace(' ', ""))
        .collect::<Vec<_>>()
        .join(",");
    semver::VersionReq::parse(&normalized)
        .with_context(|| format!("Invalid provider version constraint: {}", version))?;
    Ok(())
}
