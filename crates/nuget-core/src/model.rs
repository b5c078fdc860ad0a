//! Analysis result data model.
//!
//! These records are populated by the resolver and serialized by the
//! analyzer binary. They are intentionally plain data: all behavior lives
//! in the crates that produce them.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Ecosystem tag used in every identifier produced for NuGet packages.
pub const NUGET_ECOSYSTEM: &str = "NuGet";

/// Unique identifier of a package (or project) in the dependency graph.
///
/// Equality and ordering consider all four fields. The namespace is unused
/// for NuGet and always empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PackageIdentifier {
    pub ecosystem: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
}

impl PackageIdentifier {
    /// Creates a NuGet identifier with an empty namespace.
    pub fn nuget(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            ecosystem: NUGET_ECOSYSTEM.to_string(),
            namespace: String::new(),
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.ecosystem, self.namespace, self.name, self.version
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Hint,
    Warning,
    Error,
}

/// A non-fatal problem found during analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub source: String,
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// A node in a scope's dependency forest.
///
/// A reference that could not be resolved carries the unresolved range as
/// its version, no children, and the issues explaining why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReference {
    pub id: PackageIdentifier,
    pub dependencies: Vec<PackageReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl PackageReference {
    pub fn new(id: PackageIdentifier, dependencies: Vec<PackageReference>) -> Self {
        Self {
            id,
            dependencies,
            issues: Vec::new(),
        }
    }

    pub fn with_issues(id: PackageIdentifier, issues: Vec<Issue>) -> Self {
        Self {
            id,
            dependencies: Vec::new(),
            issues,
        }
    }

    /// Visits this reference and all transitive children, depth first.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a PackageReference)) {
        f(self);
        for child in &self.dependencies {
            child.visit(f);
        }
    }
}

/// A named bucket of dependencies with its own forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub name: String,
    pub dependencies: Vec<PackageReference>,
}

impl Scope {
    /// Every issue attached anywhere in this scope's forest.
    pub fn collect_issues(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        for root in &self.dependencies {
            root.visit(&mut |reference| issues.extend(reference.issues.iter().cloned()));
        }
        issues
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Hash {
    pub value: String,
    pub algorithm: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteArtifact {
    pub url: String,
    pub hash: Hash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VcsInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub revision: String,
    pub path: String,
}

impl VcsInfo {
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty() && self.url.is_empty() && self.revision.is_empty()
    }
}

/// Metadata record of a resolved package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub id: PackageIdentifier,
    pub authors: BTreeSet<String>,
    pub declared_licenses: BTreeSet<String>,
    pub description: String,
    pub homepage_url: String,
    pub binary_artifact: RemoteArtifact,
    pub source_artifact: RemoteArtifact,
    pub vcs: VcsInfo,
}

/// The analyzed project: its definition file and dependency scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: PackageIdentifier,
    pub definition_file_path: String,
    pub authors: BTreeSet<String>,
    pub declared_licenses: BTreeSet<String>,
    pub vcs: VcsInfo,
    pub homepage_url: String,
    pub scopes: Vec<Scope>,
}

/// Terminal output of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub project: Project,
    pub packages: Vec<Package>,
    pub issues: Vec<Issue>,
}
