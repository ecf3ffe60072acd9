//! Directory aggregation.
//!
//! Turns the raw records of the directory sources into a
//! [`RankedDirectory`]: names are sanitised so they cannot break the
//! Markdown link syntax, and hosts are ordered by load, least loaded
//! first.  Hosts without load metrics come before every monitored host.

use std::cmp::Ordering;
use std::ops::Deref;

use crate::types::{LoadMetrics, RawInstance, ServiceInstance, ServiceKind};

/// Servers ordered for display.  Built fresh for every listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedDirectory(Vec<ServiceInstance>);

impl Deref for RankedDirectory {
    type Target = [ServiceInstance];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Sanitises and ranks `raw`.  Pure; an empty input gives an empty directory.
pub fn rank(raw: Vec<RawInstance>) -> RankedDirectory {
    let mut instances: Vec<ServiceInstance> = raw.into_iter().map(normalize).collect();
    // `sort_by` is stable: equal or missing loads keep source order.
    instances.sort_by(|a, b| compare_load(a.load_metrics, b.load_metrics));
    RankedDirectory(instances)
}

fn normalize(raw: RawInstance) -> ServiceInstance {
    let load_metrics = raw.cpu_usage.map(|cpu_usage| LoadMetrics {
        cpu_usage,
        user_count: raw.user_count.unwrap_or(0),
    });
    ServiceInstance {
        name: sanitize(&raw.name),
        url: raw.url,
        sponsor_name: sanitize(&raw.by),
        sponsor_url: raw.by_url,
        kind: ServiceKind::from_tag(raw.kind.as_deref()),
        load_metrics,
    }
}

/// Square brackets delimit link text in Markdown; swap them for parentheses.
/// Legacy Markdown has no escaping, so entity markers are dropped.
fn sanitize(text: &str) -> String {
    text.replace('[', "(")
        .replace(']', ")")
        .replace(['*', '_', '`'], "")
}

fn compare_load(a: Option<LoadMetrics>, b: Option<LoadMetrics>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cpu_usage.total_cmp(&b.cpu_usage),
    }
}
