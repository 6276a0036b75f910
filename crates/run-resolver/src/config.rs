//! Resolver configuration loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file) gives the
//! built-in behaviour. Per-family overrides patch the built-in profile table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use wx_common::{
    FamilyProfile, LeadHours, LonConvention, ModelFamily, ResolveError, ResolveResult,
    VariableRequest,
};

use crate::stitch::StitchMode;
use crate::transport::HttpTransportConfig;

fn default_attempt_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("wx-resolver")
}

fn default_user_agent() -> String {
    format!("wx-resolver/{}", env!("CARGO_PKG_VERSION"))
}

/// Top-level resolver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Deadline for one candidate run (all of its transfers and decodes).
    /// Also the HTTP client request timeout.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Root of the per-family staging directories
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    #[serde(default)]
    pub stitch_mode: StitchMode,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub families: BTreeMap<ModelFamily, FamilyOverride>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: default_attempt_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            staging_dir: default_staging_dir(),
            stitch_mode: StitchMode::default(),
            user_agent: default_user_agent(),
            families: BTreeMap::new(),
        }
    }
}

/// Optional changes to one built-in family profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyOverride {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_candidates: Option<usize>,
    #[serde(default)]
    pub lookback_hours: Option<u32>,
    #[serde(default)]
    pub min_age_minutes: Option<u32>,
    #[serde(default)]
    pub convention: Option<LonConvention>,
    #[serde(default)]
    pub short: Option<LeadHours>,
    #[serde(default)]
    pub extended: Option<LeadHours>,
    #[serde(default)]
    pub variables: Option<Vec<VariableRequest>>,
}

impl FamilyOverride {
    fn apply(&self, profile: &mut FamilyProfile) {
        if let Some(url) = &self.base_url {
            profile.source.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(n) = self.max_candidates {
            profile.max_candidates = n;
        }
        if let Some(h) = self.lookback_hours {
            profile.lookback_hours = h;
        }
        if let Some(m) = self.min_age_minutes {
            profile.min_age_minutes = m;
        }
        if let Some(c) = self.convention {
            profile.convention = c;
        }
        if let Some(short) = self.short {
            profile.short = short;
        }
        if let Some(extended) = self.extended {
            profile.extended = Some(extended);
        }
        if let Some(vars) = &self.variables {
            profile.source.variables = vars.clone();
        }
    }
}

impl ResolverConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> ResolveResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ResolveError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml(&content)
            .map_err(|e| ResolveError::Config(format!("{}: {e}", path.display())))?;
        info!(
            path = %path.display(),
            overrides = config.families.len(),
            "Loaded resolver configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> ResolveResult<Self> {
        let config: ResolverConfig = serde_yaml::from_str(content)
            .map_err(|e| ResolveError::Config(format!("invalid resolver config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ResolveResult<()> {
        if self.attempt_timeout_secs == 0 {
            return Err(ResolveError::Config(
                "attempt_timeout_secs must be positive".to_string(),
            ));
        }
        for profile in self.profiles() {
            profile.validate()?;
        }
        Ok(())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn transport(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            request_timeout: self.attempt_timeout(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Built-in profiles with overrides applied.
    pub fn profiles(&self) -> Vec<FamilyProfile> {
        ModelFamily::all()
            .iter()
            .map(|family| {
                let mut profile = FamilyProfile::builtin(*family);
                if let Some(patch) = self.families.get(family) {
                    patch.apply(&mut profile);
                    debug!(family = %family, "Applied family override");
                }
                profile
            })
            .collect()
    }
}
