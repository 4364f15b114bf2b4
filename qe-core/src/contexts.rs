//! The contexts listing endpoint (§6): full-text search walk and the
//! response shapes around it. The catalog itself — storage, label
//! dictionaries, alert definitions — is the external collaborator this
//! crate calls out to via [`ContextCatalog`]; this module only owns the
//! match algorithm and the response DTOs, exactly as `qe_core::plan` only
//! owns tier selection and not tier storage itself.

use std::collections::BTreeMap;

/// Where a full-text needle was found, in search-walk priority order
/// (§6, "first hit per context"). A closed enum, not a bitset: at most one
/// kind of hit is ever reported per context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtsMatch {
    Host,
    Context,
    Instance,
    Dimension,
    Label,
    Alert,
    AlertInfo,
    Family,
    Title,
    Units,
    None,
}

impl FtsMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            FtsMatch::Host => "host",
            FtsMatch::Context => "context",
            FtsMatch::Instance => "instance",
            FtsMatch::Dimension => "dimension",
            FtsMatch::Label => "label",
            FtsMatch::Alert => "alert",
            FtsMatch::AlertInfo => "alert_info",
            FtsMatch::Family => "family",
            FtsMatch::Title => "title",
            FtsMatch::Units => "units",
            FtsMatch::None => "none",
        }
    }
}

/// Everything the full-text search walk needs to know about one context,
/// gathered from the catalog (§6). Instances/metrics/labels/alerts are
/// flattened here since the walk only cares about string content, not the
/// catalog's own object graph.
#[derive(Debug, Clone, Default)]
pub struct ContextSearchable {
    pub context_id: String,
    pub family: String,
    pub title: String,
    pub units: String,
    pub instances: Vec<InstanceSearchable>,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceSearchable {
    pub id: String,
    pub name: String,
    pub metrics: Vec<MetricSearchable>,
    pub labels: Vec<(String, String)>,
    pub alerts: Vec<AlertSearchable>,
}

#[derive(Debug, Clone, Default)]
pub struct MetricSearchable {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct AlertSearchable {
    pub name: String,
    pub info: String,
}

/// The external collaborator this crate queries for everything it doesn't
/// itself store: which contexts exist, and the strings attached to each.
pub trait ContextCatalog {
    fn contexts(&self) -> Vec<ContextSearchable>;
}

/// Running counters over one full-text search (§6 "searches" object).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchCounters {
    /// Number of distinct strings compared against the needle.
    pub strings: u64,
    /// Total characters compared.
    pub char: u64,
    /// Total contexts walked.
    pub total: u64,
}

/// Case-insensitive substring match, counting the comparison into `counters`.
fn needle_matches(counters: &mut SearchCounters, haystack: &str, needle: &str) -> bool {
    counters.strings += 1;
    counters.char += haystack.len() as u64;
    !haystack.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Walks one context's searchable strings in the fixed order `context.id →
/// family → title → units → instance.id/name → metric.id/name → labels →
/// alert.name/info`, returning the first hit (§6). Label matching compares
/// against `key:value` joined by `:`.
pub fn full_text_match(context: &ContextSearchable, needle: &str, counters: &mut SearchCounters) -> FtsMatch {
    counters.total += 1;

    if needle_matches(counters, &context.context_id, needle) {
        return FtsMatch::Context;
    }
    if needle_matches(counters, &context.family, needle) {
        return FtsMatch::Family;
    }
    if needle_matches(counters, &context.title, needle) {
        return FtsMatch::Title;
    }
    if needle_matches(counters, &context.units, needle) {
        return FtsMatch::Units;
    }

    for instance in &context.instances {
        if needle_matches(counters, &instance.id, needle) || needle_matches(counters, &instance.name, needle) {
            return FtsMatch::Instance;
        }
        for metric in &instance.metrics {
            if needle_matches(counters, &metric.id, needle) || needle_matches(counters, &metric.name, needle) {
                return FtsMatch::Dimension;
            }
        }
        for (key, value) in &instance.labels {
            let joined = format!("{key}:{value}");
            if needle_matches(counters, &joined, needle) {
                return FtsMatch::Label;
            }
        }
        for alert in &instance.alerts {
            if needle_matches(counters, &alert.name, needle) {
                return FtsMatch::Alert;
            }
            if needle_matches(counters, &alert.info, needle) {
                return FtsMatch::AlertInfo;
            }
        }
    }

    FtsMatch::None
}

/// One matched context entry in the response's `contexts` object (§6).
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub family: String,
    pub priority: u32,
    pub first_entry: i64,
    pub last_entry: i64,
    pub live: bool,
    pub r#match: FtsMatch,
}

/// A matched node entry in the response's `nodes` array (§6).
#[derive(Debug, Clone, Default)]
pub struct NodeEntry {
    pub machine_guid: String,
    pub node_id: String,
    pub hostname: String,
}

/// Millisecond timing breakdown for one contexts request (§6).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestTimings {
    pub prep_ms: f64,
    pub query_ms: f64,
    pub output_ms: f64,
    pub total_ms: f64,
}

/// The full `/api/v2/contexts` response shape (§6), minus the `agent`/
/// `request` echo objects, which belong to the embedder's transport layer.
#[derive(Debug, Clone, Default)]
pub struct ContextsResponse {
    pub nodes: Vec<NodeEntry>,
    pub contexts: BTreeMap<String, ContextEntry>,
    pub searches: SearchCounters,
    pub contexts_hard_hash: u64,
    pub contexts_soft_hash: u64,
    pub timings: RequestTimings,
}

impl Default for ContextEntry {
    fn default() -> Self {
        ContextEntry {
            family: String::new(),
            priority: 0,
            first_entry: 0,
            last_entry: 0,
            live: false,
            r#match: FtsMatch::None,
        }
    }
}
