use std::fs;
use std::path::Path;
use std::time::Duration;

use creditgate_core::{AccessOptions, GenerationConfig, MaterializerConfig, PaymentsConfig};

/// Payment plan that unlocks the generation tools
pub const DEFAULT_PLAN_DID: &str =
    "did:nv:0d2a6b6a1b7f4d09a0f2cbb7d1d7c3a8e54c3f64a8b1b2d9c07e6f5a4b3c2d1e";
/// Agent whose access grants authorize generation calls
pub const DEFAULT_AGENT_DID: &str =
    "did:nv:9f8e7d6c5b4a39281706f5e4d3c2b1a0918f7e6d5c4b3a29180f7e6d5c4b3a2f";

/// Bridge configuration: defaults, then environment, then the TOML overlay
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub payments: PaymentsConfig,
    pub generation: GenerationConfig,
    pub access: AccessOptions,
    pub materializer: MaterializerConfig,
    pub plan_did: String,
    pub agent_did: String,
    /// Upper bound on a single tools/call; `None` leaves it to the HTTP timeouts
    pub call_timeout: Option<Duration>,
    pub server_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            payments: PaymentsConfig::default(),
            generation: GenerationConfig::default(),
            access: access_from_env(),
            materializer: MaterializerConfig::default(),
            plan_did: DEFAULT_PLAN_DID.to_string(),
            agent_did: DEFAULT_AGENT_DID.to_string(),
            call_timeout: None,
            server_name: "creditgate".to_string(),
        }
    }
}

fn access_from_env() -> AccessOptions {
    AccessOptions {
        force_insecure_scheme: std::env::var("FORCE_INSECURE_SCHEME")
            .ok()
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false),
        grant_ttl: std::env::var("GRANT_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file (path via CREDITGATE_CONFIG or ./creditgate.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path =
            std::env::var("CREDITGATE_CONFIG").unwrap_or_else(|_| "creditgate.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Self {
        let default = Self::default();
        if !path.exists() {
            tracing::info!(target: "bridge_config", path = %path.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(path) {
            Ok(s) => match Self::overlay_str(&s, default.clone()) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(target: "bridge_config", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "bridge_config", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Apply a TOML document on top of `base`
    pub fn overlay_str(s: &str, base: Self) -> Result<Self, toml::de::Error> {
        toml::from_str::<BridgeToml>(s).map(|t| t.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct BridgeToml {
    pub plan_did: Option<String>,
    pub agent_did: Option<String>,
    pub call_timeout_ms: Option<u64>,
    pub server_name: Option<String>,
    pub payments: Option<PaymentsToml>,
    pub generation: Option<GenerationToml>,
    pub access: Option<AccessToml>,
    pub materializer: Option<MaterializerToml>,
}

impl BridgeToml {
    fn overlay(self, mut base: BridgeConfig) -> BridgeConfig {
        if let Some(v) = self.plan_did.filter(|s| !s.is_empty()) {
            base.plan_did = v;
        }
        if let Some(v) = self.agent_did.filter(|s| !s.is_empty()) {
            base.agent_did = v;
        }
        if let Some(ms) = self.call_timeout_ms {
            base.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(v) = self.server_name {
            base.server_name = v;
        }
        if let Some(p) = self.payments {
            p.apply(&mut base.payments);
        }
        if let Some(g) = self.generation {
            g.apply(&mut base.generation);
        }
        if let Some(a) = self.access {
            a.apply(&mut base.access);
        }
        if let Some(m) = self.materializer {
            m.apply(&mut base.materializer);
        }
        base
    }
}

// api_key is deliberately absent: the secret only comes from the environment
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PaymentsToml {
    pub environment: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
}
impl PaymentsToml {
    fn apply(self, p: &mut PaymentsConfig) {
        if let Some(v) = self.environment {
            match v.parse() {
                Ok(env) => p.environment = env,
                Err(e) => {
                    tracing::warn!(target: "bridge_config", error = %e, "Ignoring payments.environment")
                }
            }
        }
        if let Some(v) = self.base_url.filter(|s| !s.is_empty()) {
            p.base_url = Some(v);
        }
        if let Some(v) = self.timeout_ms {
            p.timeout_ms = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct GenerationToml {
    pub request_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub text2image_path: Option<String>,
    pub image2image_path: Option<String>,
    pub text2video_path: Option<String>,
}
impl GenerationToml {
    fn apply(self, g: &mut GenerationConfig) {
        if let Some(v) = self.request_timeout_ms {
            g.request_timeout_ms = v;
        }
        if let Some(v) = self.max_retries {
            g.retry.max_retries = v;
        }
        if let Some(v) = self.text2image_path {
            g.endpoints.text2image = v;
        }
        if let Some(v) = self.image2image_path {
            g.endpoints.image2image = v;
        }
        if let Some(v) = self.text2video_path {
            g.endpoints.text2video = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct AccessToml {
    pub force_insecure_scheme: Option<bool>,
    pub grant_cache_ttl_secs: Option<u64>,
}
impl AccessToml {
    fn apply(self, a: &mut AccessOptions) {
        if let Some(v) = self.force_insecure_scheme {
            a.force_insecure_scheme = v;
        }
        if let Some(secs) = self.grant_cache_ttl_secs {
            a.grant_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct MaterializerToml {
    pub timeout_ms: Option<u64>,
}
impl MaterializerToml {
    fn apply(self, m: &mut MaterializerConfig) {
        if let Some(v) = self.timeout_ms {
            m.timeout_ms = v;
        }
    }
}
