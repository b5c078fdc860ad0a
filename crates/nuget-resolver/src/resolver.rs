//! Greedy version selection for one level of dependency requests.
//!
//! For every distinct package name in a batch the resolver picks the lowest
//! available version satisfying all sibling ranges at once. A name that an
//! outer level already resolved keeps its version; requests it does not
//! satisfy become issues on their requesters.
//!
//! Choices are never revisited. A version picked at a shallow level stays
//! fixed even if a deeper requirement would have preferred another one.

use crate::error::Result;
use crate::registry::PackageSource;
use crate::version::{Version, VersionRange};
use futures::future::join_all;
use nuget_core::{Issue, NUGET_ECOSYSTEM, PackageIdentifier};
use std::collections::BTreeMap;

/// Who asked for a dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Requester {
    /// The analyzed project itself.
    Project,
    /// A resolved package, through its manifest.
    Package(PackageIdentifier),
}

/// A request for some version of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequest {
    pub requester: Requester,
    pub name: String,
    pub range: String,
    pub framework: Option<String>,
    pub dev_only: bool,
}

impl DependencyRequest {
    /// A direct dependency of the project.
    pub fn direct(
        name: impl Into<String>,
        range: impl Into<String>,
        framework: Option<String>,
        dev_only: bool,
    ) -> Self {
        Self {
            requester: Requester::Project,
            name: name.into(),
            range: range.into(),
            framework,
            dev_only,
        }
    }

    pub(crate) fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Package names (case-insensitive) mapped to their resolved identifier.
///
/// Entries are only ever added: once a name is resolved its version is fixed
/// for the rest of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSet {
    by_name: BTreeMap<String, PackageIdentifier>,
}

impl ResolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PackageIdentifier> {
        self.by_name.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&name.to_lowercase())
    }

    /// Adds `id` unless its name is already resolved. Returns whether it was added.
    pub fn insert(&mut self, id: PackageIdentifier) -> bool {
        let key = id.name.to_lowercase();
        if self.by_name.contains_key(&key) {
            return false;
        }
        self.by_name.insert(key, id);
        true
    }

    /// Merges every entry of `other` whose name is not yet resolved.
    pub fn extend(&mut self, other: &ResolvedSet) {
        for id in other.iter() {
            self.insert(id.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageIdentifier> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl FromIterator<PackageIdentifier> for ResolvedSet {
    fn from_iter<I: IntoIterator<Item = PackageIdentifier>>(iter: I) -> Self {
        let mut set = ResolvedSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// An unsatisfied request, recorded against its requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionIssue {
    /// Requested package name, as spelled by the requester.
    pub package: String,
    /// The range that could not be satisfied.
    pub range: String,
    pub issue: Issue,
}

/// Outcome of resolving one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Names resolved by this batch; names resolved earlier are not repeated.
    pub resolved: ResolvedSet,
    pub issues: BTreeMap<Requester, Vec<ResolutionIssue>>,
}

impl Resolution {
    /// Issues recorded for `requester` about the package `name`.
    pub fn issues_for(&self, requester: &Requester, name: &str) -> Vec<&ResolutionIssue> {
        self.issues
            .get(requester)
            .into_iter()
            .flatten()
            .filter(|issue| issue.package.eq_ignore_ascii_case(name))
            .collect()
    }

    fn record(&mut self, request: &DependencyRequest, message: String) {
        self.issues
            .entry(request.requester.clone())
            .or_default()
            .push(ResolutionIssue {
                package: request.name.clone(),
                range: request.range.clone(),
                issue: Issue::error(NUGET_ECOSYSTEM, message),
            });
    }
}

/// Picks versions for batches of requests.
pub struct VersionResolver<'a> {
    source: &'a dyn PackageSource,
}

struct NameGroup<'r> {
    requests: Vec<&'r DependencyRequest>,
    ranges: Vec<VersionRange>,
}

impl<'a> VersionResolver<'a> {
    pub fn new(source: &'a dyn PackageSource) -> Self {
        Self { source }
    }

    /// Resolves every distinct package name of `requests`.
    ///
    /// Conflicts and unsatisfiable ranges are recorded in the returned
    /// [`Resolution`]; available-version lookup failures behave like a
    /// package without versions.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::MalformedRange` if any request carries range
    /// text that cannot be parsed.
    pub async fn resolve(
        &self,
        requests: &[DependencyRequest],
        already: &ResolvedSet,
    ) -> Result<Resolution> {
        let groups = group_by_name(requests)?;
        let mut resolution = Resolution::default();

        let mut pending = Vec::new();
        for (name, group) in &groups {
            match already.get(name) {
                Some(existing) => record_conflicts(&mut resolution, existing, group),
                None => pending.push((name, group)),
            }
        }

        let available = join_all(pending.iter().map(|(_, group)| {
            let name = group.requests[0].name.as_str();
            self.source.available_versions(name)
        }))
        .await;

        for ((_, group), versions) in pending.into_iter().zip(available) {
            let first = group.requests[0];
            let chosen = versions
                .iter()
                .find(|version| group.ranges.iter().all(|range| range.contains(version)));

            match chosen {
                Some(version) => {
                    tracing::debug!("resolved {} to {}", first.name, version);
                    resolution
                        .resolved
                        .insert(PackageIdentifier::nuget(&first.name, version.as_str()));
                }
                None => {
                    tracing::debug!(
                        "no version of {} satisfies {:?}",
                        first.name,
                        group.requests.iter().map(|r| &r.range).collect::<Vec<_>>()
                    );
                    for request in &group.requests {
                        resolution.record(
                            request,
                            format!(
                                "Cannot find a version of {} satisfying {} and all sibling requirements.",
                                request.name, request.range
                            ),
                        );
                    }
                }
            }
        }

        Ok(resolution)
    }
}

/// Groups requests by lowercased name, dropping exact duplicate variants.
fn group_by_name(requests: &[DependencyRequest]) -> Result<BTreeMap<String, NameGroup<'_>>> {
    let mut groups: BTreeMap<String, NameGroup<'_>> = BTreeMap::new();

    for request in requests {
        let range = VersionRange::parse(&request.range)?;
        let group = groups.entry(request.key()).or_insert_with(|| NameGroup {
            requests: Vec::new(),
            ranges: Vec::new(),
        });

        let duplicate = group
            .requests
            .iter()
            .any(|seen| seen.requester == request.requester && seen.range == request.range);
        if !duplicate {
            group.requests.push(request);
            group.ranges.push(range);
        }
    }

    Ok(groups)
}

fn record_conflicts(resolution: &mut Resolution, existing: &PackageIdentifier, group: &NameGroup<'_>) {
    let version = match Version::parse(&existing.version) {
        Ok(version) => version,
        Err(e) => {
            tracing::warn!("resolved version of {} is unparseable: {}", existing.name, e);
            return;
        }
    };

    for (request, range) in group.requests.iter().zip(&group.ranges) {
        if !range.contains(&version) {
            resolution.record(
                request,
                format!(
                    "Already resolved version {} of {} does not satisfy {}.",
                    existing.version, existing.name, request.range
                ),
            );
        }
    }
}
