//! Multi-source request routing.
//!
//! A request is answered by one archive URL picked from either a list of
//! nested domains (ascending by extent) or an explicit failover list.
//! Candidates are tried strictly in order, one at a time, so the source that
//! answers is deterministic.

use std::future::Future;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use field_common::{FieldError, FieldResult, LatLonBox};

/// A configured rectangular region served by one archive URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDescriptor {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
    pub url: String,
}

impl DomainDescriptor {
    pub fn new(
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
        url: impl Into<String>,
    ) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
            url: url.into(),
        }
    }

    pub fn bbox(&self) -> LatLonBox {
        LatLonBox::new(self.min_lat, self.min_lon, self.max_lat, self.max_lon)
    }
}

/// True if `domain` contains `region` as given, or with the region's
/// longitudes shifted by -360 or +360 degrees.
pub fn within_domain(region: &LatLonBox, domain: &DomainDescriptor) -> bool {
    let bounds = domain.bbox();
    [0.0, -360.0, 360.0]
        .iter()
        .any(|shift| bounds.contains_box(&region.lon_shifted(*shift)))
}

/// Candidate URLs for `region` over `domains` (ascending by extent).
///
/// Only the inner domains are searched; a region none of them contains, or
/// no region at all, goes to the outermost domain alone. With auto failover
/// a match at index `i` is followed by every outer domain, then the inner
/// ones from `i - 1` down. Index 0 is only revisited on the way in when
/// `inward_includes_innermost` is set.
pub fn build_candidates(
    region: Option<&LatLonBox>,
    domains: &[DomainDescriptor],
    auto_failover: bool,
    inward_includes_innermost: bool,
) -> Vec<String> {
    let Some(last) = domains.len().checked_sub(1) else {
        return Vec::new();
    };

    let matched = region.and_then(|r| domains[..last].iter().position(|d| within_domain(r, d)));
    let Some(start) = matched else {
        return vec![domains[last].url.clone()];
    };

    if !auto_failover {
        return vec![domains[start].url.clone()];
    }

    let innermost = if inward_includes_innermost { 0 } else { 1 };
    let outward = start..=last;
    let inward = (innermost..start).rev();

    outward
        .chain(inward)
        .map(|i| domains[i].url.clone())
        .collect()
}

/// Where a request's candidate sources come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePlan {
    /// The request's own URL only.
    Direct,
    /// Nested domains, ascending by extent.
    Domains {
        domains: Vec<DomainDescriptor>,
        auto_failover: bool,
        inward_includes_innermost: bool,
    },
    /// An explicit ordered URL list, used verbatim.
    Failover { urls: Vec<String> },
}

/// Builds per-request candidate lists from a fixed source plan.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRouter {
    plan: SourcePlan,
}

impl DomainRouter {
    pub fn new(plan: SourcePlan) -> Self {
        Self { plan }
    }

    pub fn direct() -> Self {
        Self::new(SourcePlan::Direct)
    }

    pub fn plan(&self) -> &SourcePlan {
        &self.plan
    }

    /// Ordered candidate URLs for one request.
    pub fn candidates(&self, region: Option<&LatLonBox>, request_url: &str) -> Vec<String> {
        let urls = match &self.plan {
            SourcePlan::Direct => vec![request_url.to_string()],
            SourcePlan::Failover { urls } => urls.clone(),
            SourcePlan::Domains {
                domains,
                auto_failover,
                inward_includes_innermost,
            } => build_candidates(region, domains, *auto_failover, *inward_includes_innermost),
        };
        debug!(candidates = ?urls, "Built candidate source list");
        urls
    }
}

/// Run `attempt` against each URL in order, returning the first success
/// together with the URL that produced it.
///
/// With a single candidate its error is returned as-is. When several
/// candidates all fail, only the last error is kept, wrapped in
/// `AllSourcesExhausted`.
pub async fn try_each<T, F, Fut>(urls: &[String], mut attempt: F) -> FieldResult<(String, T)>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = FieldResult<T>>,
{
    let mut last_error = None;

    for (i, url) in urls.iter().enumerate() {
        match attempt(url.clone()).await {
            Ok(value) => {
                if i > 0 {
                    debug!(url = %url, attempt = i + 1, "Candidate source succeeded after failover");
                }
                return Ok((url.clone(), value));
            }
            Err(e) => {
                warn!(url = %url, attempt = i + 1, of = urls.len(), error = %e, "Candidate source failed");
                if i + 1 < urls.len() {
                    counter!("source_failover_total").increment(1);
                }
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if urls.len() == 1 => Err(e),
        Some(e) => Err(FieldError::AllSourcesExhausted {
            attempted: urls.len(),
            last: Box::new(e),
        }),
        None => Err(FieldError::AllSourcesExhausted {
            attempted: 0,
            last: Box::new(FieldError::not_found("no candidate sources configured")),
        }),
    }
}
