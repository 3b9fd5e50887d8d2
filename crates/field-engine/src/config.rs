//! Configuration for the field server.
//!
//! Loaded once at startup from YAML, optionally overridden from the
//! environment, validated, then shared read-only by every request.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use field_common::FieldResult;

use crate::derived::{DerivedFieldConfig, DerivedFieldSpec};
use crate::router::{DomainDescriptor, DomainRouter, SourcePlan};

/// Process-wide server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Archive URL used when a request does not name one.
    pub url: String,

    /// Nested domains, ascending by extent. Empty disables domain routing.
    pub domains: Vec<DomainDescriptor>,

    pub failover: FailoverConfig,

    pub derived_fields: Vec<DerivedFieldConfig>,

    pub rhi: RhiConfig,

    pub vsection: VsectionConfig,

    /// Climatology mode. When set, request URLs are replaced by the
    /// archive covering the search time.
    pub climo: Option<ClimoConfig>,
}

/// Source failover settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Walk outer (then inner) domains when the matched one fails.
    pub auto_failover: bool,

    /// Explicit ordered source list; replaces domain routing when set.
    pub urls: Vec<String>,

    /// Also fall back into the innermost domain when walking inward.
    pub inward_includes_innermost: bool,
}

/// Measured-RHI selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RhiConfig {
    pub enabled: bool,

    /// Archive holding the RHI scans.
    pub url: String,

    /// Scans within this many seconds of the requested time are candidates.
    pub time_margin_secs: i64,

    /// Largest accepted difference between the best scan azimuth and the
    /// requested azimuth.
    pub max_azimuth_error_deg: f64,

    /// Largest accepted difference between the path azimuth and the
    /// radar-to-endpoint azimuth.
    pub azimuth_tolerance_deg: f64,

    /// Weight of the normalized time error when scoring scans.
    pub time_weight: f64,

    /// Largest distance, km, of the first waypoint from the radar.
    pub max_radar_offset: f64,

    /// Fraction of the requested range that must lie inside the scan.
    pub min_range_coverage: f64,

    /// Stop the rewritten section at the user's own end point.
    pub respect_user_distance: bool,

    /// Radar position; taken from the scan's projection origin when unset.
    pub radar_lat: Option<f64>,
    pub radar_lon: Option<f64>,
}

impl Default for RhiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            time_margin_secs: 300,
            max_azimuth_error_deg: 2.0,
            azimuth_tolerance_deg: 5.0,
            time_weight: 2.0,
            max_radar_offset: 20.0,
            min_range_coverage: 0.8,
            respect_user_distance: true,
            radar_lat: None,
            radar_lon: None,
        }
    }
}

impl RhiConfig {
    pub fn radar_position(&self) -> Option<(f64, f64)> {
        self.radar_lat.zip(self.radar_lon)
    }
}

/// Vertical-section geometry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VsectionConfig {
    /// Spacing of resampled points along the path, km.
    pub sample_spacing_km: f64,
}

impl Default for VsectionConfig {
    fn default() -> Self {
        Self {
            sample_spacing_km: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimoConfig {
    pub base_url: String,
}

fn env_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

impl ServerConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse server configuration")
    }

    /// Load a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read: {:?}", path))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse: {:?}", path))
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `FIELD_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("FIELD_SERVER_URL") {
            self.url = val;
        }

        if let Ok(val) = std::env::var("FIELD_AUTO_FAILOVER") {
            self.failover.auto_failover = env_flag(&val);
        }

        if let Ok(val) = std::env::var("FIELD_FAILOVER_URLS") {
            self.failover.urls = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Ok(val) = std::env::var("FIELD_RHI_ENABLED") {
            self.rhi.enabled = env_flag(&val);
        }

        if let Ok(val) = std::env::var("FIELD_RHI_URL") {
            self.rhi.url = val;
        }

        if let Ok(val) = std::env::var("FIELD_RHI_TIME_MARGIN_SECS") {
            if let Ok(secs) = val.parse() {
                self.rhi.time_margin_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("FIELD_VSECTION_SPACING_KM") {
            if let Ok(km) = val.parse() {
                self.vsection.sample_spacing_km = km;
            }
        }

        if let Ok(val) = std::env::var("FIELD_CLIMO_BASE_URL") {
            self.climo = Some(ClimoConfig { base_url: val });
        }

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        for pair in self.domains.windows(2) {
            if pair[0].bbox().area() > pair[1].bbox().area() {
                return Err(format!(
                    "domains must be ordered by increasing extent: '{}' is larger than '{}'",
                    pair[0].url, pair[1].url
                ));
            }
        }

        if let Some(d) = self.domains.iter().find(|d| d.url.is_empty()) {
            return Err(format!(
                "domain [{}, {}, {}, {}] has no url",
                d.min_lat, d.min_lon, d.max_lat, d.max_lon
            ));
        }

        if !self.domains.is_empty() && !self.failover.urls.is_empty() {
            return Err("configure either domains or failover.urls, not both".to_string());
        }

        if self.rhi.enabled && self.rhi.url.is_empty() {
            return Err("rhi.url must be set when rhi.enabled".to_string());
        }

        if self.rhi.time_margin_secs < 0 {
            return Err("rhi.time_margin_secs must be >= 0".to_string());
        }

        if !(self.rhi.min_range_coverage > 0.0 && self.rhi.min_range_coverage <= 1.0) {
            return Err("rhi.min_range_coverage must be in (0, 1]".to_string());
        }

        if self.vsection.sample_spacing_km <= 0.0 {
            return Err("vsection.sample_spacing_km must be > 0".to_string());
        }

        let mut names = HashSet::new();
        for field in &self.derived_fields {
            if !names.insert(field.name.as_str()) {
                return Err(format!("derived field '{}' defined twice", field.name));
            }
        }

        self.derived_specs().map_err(|e| e.to_string())?;

        Ok(())
    }

    /// Validated derived-field specs.
    pub fn derived_specs(&self) -> FieldResult<Vec<DerivedFieldSpec>> {
        self.derived_fields
            .iter()
            .cloned()
            .map(DerivedFieldSpec::try_from)
            .collect()
    }

    /// Where request candidates come from under this configuration.
    pub fn source_plan(&self) -> SourcePlan {
        if !self.failover.urls.is_empty() {
            SourcePlan::Failover {
                urls: self.failover.urls.clone(),
            }
        } else if !self.domains.is_empty() {
            SourcePlan::Domains {
                domains: self.domains.clone(),
                auto_failover: self.failover.auto_failover,
                inward_includes_innermost: self.failover.inward_includes_innermost,
            }
        } else {
            SourcePlan::Direct
        }
    }

    pub fn router(&self) -> DomainRouter {
        DomainRouter::new(self.source_plan())
    }
}
