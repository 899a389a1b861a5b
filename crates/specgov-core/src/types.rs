use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const STATUS_IMPLEMENTED: &str = "implemented";
pub const STATUS_PROPOSED: &str = "proposed";
pub const STATUS_APPLIED: &str = "applied";

// ---------------------------------------------------------------------------
// SpecKind
// ---------------------------------------------------------------------------

/// Kind of a governed document under `specs/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpecKind {
    #[serde(rename = "BV")]
    Bv,
    #[serde(rename = "CAP")]
    Cap,
    #[serde(rename = "BR")]
    Br,
    #[serde(rename = "NFR")]
    Nfr,
    #[serde(rename = "TRACE")]
    Trace,
    #[serde(rename = "DELTA")]
    Delta,
}

impl SpecKind {
    /// Requirement kinds in collection order.
    pub fn requirements() -> &'static [SpecKind] {
        &[SpecKind::Bv, SpecKind::Cap, SpecKind::Br, SpecKind::Nfr]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpecKind::Bv => "BV",
            SpecKind::Cap => "CAP",
            SpecKind::Br => "BR",
            SpecKind::Nfr => "NFR",
            SpecKind::Trace => "TRACE",
            SpecKind::Delta => "DELTA",
        }
    }

    pub fn is_requirement(self) -> bool {
        !matches!(self, SpecKind::Trace | SpecKind::Delta)
    }

    /// Folder name under `specs/requirements/`.
    pub fn folder(self) -> Option<&'static str> {
        match self {
            SpecKind::Bv => Some("business-values"),
            SpecKind::Cap => Some("capabilities"),
            SpecKind::Br => Some("business-rules"),
            SpecKind::Nfr => Some("nfr"),
            SpecKind::Trace | SpecKind::Delta => None,
        }
    }

    pub fn schema_file(self) -> &'static str {
        match self {
            SpecKind::Bv => "bv.schema.json",
            SpecKind::Cap => "cap.schema.json",
            SpecKind::Br => "br.schema.json",
            SpecKind::Nfr => "nfr.schema.json",
            SpecKind::Trace => "trace-links.schema.json",
            SpecKind::Delta => "delta.schema.json",
        }
    }

    /// Requirement kind owning an ID, judged by its `<KIND>-` prefix.
    pub fn from_id(id: &str) -> Option<SpecKind> {
        let (prefix, _) = id.split_once('-')?;
        Self::from_prefix(prefix)
    }

    pub fn from_prefix(prefix: &str) -> Option<SpecKind> {
        match prefix.to_ascii_uppercase().as_str() {
            "BV" => Some(SpecKind::Bv),
            "CAP" => Some(SpecKind::Cap),
            "BR" => Some(SpecKind::Br),
            "NFR" => Some(SpecKind::Nfr),
            _ => None,
        }
    }
}

impl fmt::Display for SpecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LinkType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Realizes,
    Satisfies,
    Verifies,
    TracesTo,
    Implements,
}

impl LinkType {
    pub fn all() -> &'static [LinkType] {
        &[
            LinkType::Realizes,
            LinkType::Satisfies,
            LinkType::Verifies,
            LinkType::TracesTo,
            LinkType::Implements,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::Realizes => "realizes",
            LinkType::Satisfies => "satisfies",
            LinkType::Verifies => "verifies",
            LinkType::TracesTo => "traces_to",
            LinkType::Implements => "implements",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LinkType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = LinkType::all().iter().map(|t| t.as_str()).collect();
                format!("unknown link type '{s}' (expected one of {})", valid.join(", "))
            })
    }
}

// ---------------------------------------------------------------------------
// DomainRefKind
// ---------------------------------------------------------------------------

/// Command or event section in the domain markdown files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainRefKind {
    #[serde(rename = "CMD")]
    Command,
    #[serde(rename = "EVT")]
    Event,
}

impl DomainRefKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DomainRefKind::Command => "CMD",
            DomainRefKind::Event => "EVT",
        }
    }
}

// ---------------------------------------------------------------------------
// KnownIds
// ---------------------------------------------------------------------------

/// Requirement IDs seen on disk, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnownIds {
    by_kind: BTreeMap<SpecKind, BTreeSet<String>>,
}

impl KnownIds {
    pub fn insert(&mut self, kind: SpecKind, id: impl Into<String>) {
        self.by_kind.entry(kind).or_default().insert(id.into());
    }

    /// Sorted IDs of one kind.
    pub fn of(&self, kind: SpecKind) -> impl Iterator<Item = &String> {
        self.by_kind.get(&kind).into_iter().flatten()
    }

    /// True when any kind holds `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.by_kind.values().any(|ids| ids.contains(id))
    }

    pub fn count(&self, kind: SpecKind) -> usize {
        self.by_kind.get(&kind).map_or(0, BTreeSet::len)
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
