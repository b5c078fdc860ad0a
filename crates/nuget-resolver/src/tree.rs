//! Recursive expansion of dependency requests into a reference forest.
//!
//! Each level resolves its batch of requests, fetches the manifests of the
//! packages it resolved, derives their own requests (filtered by the nearest
//! target framework) and recurses with the grown resolved set. Trees are
//! assembled bottom-up when the recursion unwinds.
//!
//! A name resolved by an outer level is never expanded again, which also
//! terminates cyclic manifest graphs.

use crate::error::Result;
use crate::framework::FrameworkCompatibility;
use crate::registry::PackageSource;
use crate::resolver::{DependencyRequest, Requester, Resolution, ResolvedSet, VersionResolver};
use crate::types::PackageManifest;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use nuget_core::{Issue, NUGET_ECOSYSTEM, PackageIdentifier, PackageReference};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Result of building one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyTree {
    /// One reference per distinct direct dependency, in request order.
    pub roots: Vec<PackageReference>,
    /// Every package resolved while building, including the starting set.
    pub resolved: ResolvedSet,
    /// Resolved packages whose manifest could not be fetched.
    pub unfetched: BTreeSet<PackageIdentifier>,
}

/// One recursion level after it has been fully expanded.
struct Level {
    /// References of the packages this level resolved, with their subtrees.
    forest: Vec<PackageReference>,
    resolution: Resolution,
    /// Resolved set after this level and all deeper ones.
    resolved: ResolvedSet,
    unfetched: BTreeSet<PackageIdentifier>,
}

pub struct DependencyTreeBuilder<'a> {
    source: &'a dyn PackageSource,
    frameworks: &'a dyn FrameworkCompatibility,
}

impl<'a> DependencyTreeBuilder<'a> {
    pub fn new(source: &'a dyn PackageSource, frameworks: &'a dyn FrameworkCompatibility) -> Self {
        Self { source, frameworks }
    }

    /// Builds the forest of `requests` starting from an empty resolved set.
    pub async fn build(
        &self,
        requests: Vec<DependencyRequest>,
        framework: Option<&str>,
    ) -> Result<DependencyTree> {
        self.build_from(requests, framework, ResolvedSet::new()).await
    }

    /// Builds the forest of `requests` on top of an existing resolved set.
    ///
    /// # Errors
    ///
    /// Fails only on malformed range text; unresolvable requests and missing
    /// manifests are reported as issues in the forest.
    pub async fn build_from(
        &self,
        requests: Vec<DependencyRequest>,
        framework: Option<&str>,
        resolved: ResolvedSet,
    ) -> Result<DependencyTree> {
        let roots_requested = requests.clone();
        let level = self
            .expand(requests, framework.map(str::to_string), resolved)
            .await?;

        let mut roots = Vec::new();
        let mut seen = HashSet::new();
        for request in &roots_requested {
            if !seen.insert(request.name.to_lowercase()) {
                continue;
            }
            if let Some(reference) = reference_for(&request.requester, &request.name, &level) {
                roots.push(reference);
            }
        }

        Ok(DependencyTree {
            roots,
            resolved: level.resolved,
            unfetched: level.unfetched,
        })
    }

    fn expand(
        &self,
        requests: Vec<DependencyRequest>,
        framework: Option<String>,
        resolved: ResolvedSet,
    ) -> BoxFuture<'_, Result<Level>> {
        async move {
            if requests.is_empty() {
                return Ok(Level {
                    forest: Vec::new(),
                    resolution: Resolution::default(),
                    resolved,
                    unfetched: BTreeSet::new(),
                });
            }

            let resolution = VersionResolver::new(self.source)
                .resolve(&requests, &resolved)
                .await?;

            let new_ids: Vec<PackageIdentifier> = resolution.resolved.iter().cloned().collect();
            let mut all = resolved;
            all.extend(&resolution.resolved);

            let manifests = join_all(
                new_ids
                    .iter()
                    .map(|id| self.source.manifest(&id.name, &id.version)),
            )
            .await;

            let outgoing = join_all(new_ids.iter().zip(&manifests).map(|(id, manifest)| {
                let dev_only = requests
                    .iter()
                    .filter(|request| request.name.eq_ignore_ascii_case(&id.name))
                    .all(|request| request.dev_only);
                let framework = framework.as_deref();
                async move {
                    match manifest {
                        Ok(manifest) => {
                            self.outgoing_requests(id, manifest, framework, dev_only)
                                .await
                        }
                        Err(_) => Vec::new(),
                    }
                }
            }))
            .await;

            let child_requests: Vec<DependencyRequest> =
                outgoing.iter().flatten().cloned().collect();
            let child = self.expand(child_requests, framework.clone(), all).await?;
            let mut unfetched = child.unfetched.clone();

            let forest = new_ids
                .into_iter()
                .zip(manifests)
                .zip(&outgoing)
                .map(|((id, manifest), requested)| match manifest {
                    Ok(_) => {
                        let requester = Requester::Package(id.clone());
                        let mut seen = HashSet::new();
                        let dependencies = requested
                            .iter()
                            .filter(|request| seen.insert(request.name.to_lowercase()))
                            .filter_map(|request| reference_for(&requester, &request.name, &child))
                            .collect();
                        PackageReference::new(id, dependencies)
                    }
                    Err(e) => {
                        tracing::warn!("failed to fetch manifest of {}: {}", id, e);
                        unfetched.insert(id.clone());
                        let issue = Issue::error(
                            NUGET_ECOSYSTEM,
                            format!("Cannot fetch the manifest of {} {}: {}", id.name, id.version, e),
                        );
                        PackageReference {
                            id,
                            dependencies: Vec::new(),
                            issues: vec![issue],
                        }
                    }
                })
                .collect();

            Ok(Level {
                forest,
                resolution,
                resolved: child.resolved,
                unfetched,
            })
        }
        .boxed()
    }

    /// The requests a resolved package makes through its manifest.
    ///
    /// Groups without a framework always apply. Framework groups apply only
    /// when they are the nearest one to the scope's target framework.
    async fn outgoing_requests(
        &self,
        id: &PackageIdentifier,
        manifest: &Arc<PackageManifest>,
        framework: Option<&str>,
        dev_only: bool,
    ) -> Vec<DependencyRequest> {
        let mut candidates: Vec<String> = Vec::new();
        for group in &manifest.dependency_groups {
            if let Some(declared) = group.framework()
                && !candidates.iter().any(|c| c == declared)
            {
                candidates.push(declared.to_string());
            }
        }

        let nearest = match framework {
            Some(target) if !candidates.is_empty() => {
                self.frameworks.nearest(target, &candidates).await
            }
            _ => None,
        };

        manifest
            .dependency_groups
            .iter()
            .filter(|group| match group.framework() {
                None => true,
                Some(declared) => nearest
                    .as_deref()
                    .is_some_and(|nearest| nearest.eq_ignore_ascii_case(declared)),
            })
            .flat_map(|group| &group.dependencies)
            .map(|dependency| DependencyRequest {
                requester: Requester::Package(id.clone()),
                name: dependency.id.clone(),
                range: dependency.range().to_string(),
                framework: framework.map(str::to_string),
                dev_only,
            })
            .collect()
    }
}

/// The reference `requester` gets for its request of `name` at `level`.
///
/// An issue recorded for the request wins; otherwise the subtree resolved at
/// this level, or a leaf for a package resolved by an outer level.
fn reference_for(requester: &Requester, name: &str, level: &Level) -> Option<PackageReference> {
    let issues = level.resolution.issues_for(requester, name);
    if let Some(first) = issues.first() {
        let id = PackageIdentifier::nuget(&first.package, &first.range);
        return Some(PackageReference::with_issues(
            id,
            issues.iter().map(|issue| issue.issue.clone()).collect(),
        ));
    }

    if let Some(subtree) = level
        .forest
        .iter()
        .find(|reference| reference.id.name.eq_ignore_ascii_case(name))
    {
        return Some(subtree.clone());
    }

    level
        .resolved
        .get(name)
        .map(|id| PackageReference::new(id.clone(), Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::ExactFrameworkMatch;
    use crate::resolver::tests::StaticSource;
    use crate::types::{DependencyGroup, ManifestDependency};

    fn manifest(id: &str, version: &str, groups: Vec<(Option<&str>, Vec<(&str, &str)>)>) -> PackageManifest {
        PackageManifest {
            id: id.into(),
            version: version.into(),
            dependency_groups: groups
                .into_iter()
                .map(|(framework, deps)| DependencyGroup {
                    target_framework: framework.map(String::from),
                    dependencies: deps
                        .into_iter()
                        .map(|(id, range)| ManifestDependency {
                            id: id.into(),
                            range: Some(range.into()),
                        })
                        .collect(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn names(references: &[PackageReference]) -> Vec<String> {
        references
            .iter()
            .map(|r| format!("{}@{}", r.id.name, r.id.version))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_requests_give_empty_forest() {
        let source = StaticSource::default();
        let builder = DependencyTreeBuilder::new(&source, &ExactFrameworkMatch);

        let tree = builder.build(Vec::new(), None).await.unwrap();
        assert!(tree.roots.is_empty());
        assert!(tree.resolved.is_empty());
    }

    #[tokio::test]
    async fn test_lowest_version_is_expanded_only() {
        let source = StaticSource::default()
            .with_versions("A", &["1.0.0", "1.5.0"])
            .with_versions("B", &["1.0.0"])
            .with_manifest(manifest("A", "1.0.0", vec![]))
            .with_manifest(manifest("A", "1.5.0", vec![(None, vec![("B", "[1.0.0]")])]))
            .with_manifest(manifest("B", "1.0.0", vec![]));
        let builder = DependencyTreeBuilder::new(&source, &ExactFrameworkMatch);

        let tree = builder
            .build(vec![DependencyRequest::direct("A", "[1.0.0,2.0.0)", None, false)], None)
            .await
            .unwrap();

        assert_eq!(names(&tree.roots), vec!["A@1.0.0"]);
        assert!(tree.roots[0].dependencies.is_empty());
        assert_eq!(tree.resolved.len(), 1);
        assert_eq!(*source.manifest_calls.lock().unwrap(), vec!["a:1.0.0".to_string()]);
    }

    #[tokio::test]
    async fn test_transitive_tree_with_shared_dependency() {
        let source = StaticSource::default()
            .with_versions("App.Core", &["2.0.0"])
            .with_versions("Logging", &["1.0.0", "1.1.0"])
            .with_versions("Json", &["3.0.0"])
            .with_manifest(manifest(
                "App.Core",
                "2.0.0",
                vec![(None, vec![("Logging", "[1.1.0,)"), ("Json", "[3.0.0]")])],
            ))
            .with_manifest(manifest("Logging", "1.0.0", vec![(None, vec![("Json", "[3.0.0,)")])]))
            .with_manifest(manifest("Json", "3.0.0", vec![]));
        let builder = DependencyTreeBuilder::new(&source, &ExactFrameworkMatch);

        let tree = builder
            .build(
                vec![
                    DependencyRequest::direct("App.Core", "[2.0.0]", None, false),
                    DependencyRequest::direct("Logging", "[1.0.0,)", None, false),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(names(&tree.roots), vec!["App.Core@2.0.0", "Logging@1.0.0"]);

        // Logging was fixed at 1.0.0 by the project; App.Core's [1.1.0,) conflicts.
        let core = &tree.roots[0];
        assert_eq!(names(&core.dependencies), vec!["Logging@[1.1.0,)", "Json@3.0.0"]);
        assert_eq!(core.dependencies[0].issues.len(), 1);
        assert!(core.dependencies[0].dependencies.is_empty());

        let logging = &tree.roots[1];
        assert_eq!(names(&logging.dependencies), vec!["Json@3.0.0"]);
        assert_eq!(tree.resolved.len(), 3);
    }

    #[tokio::test]
    async fn test_resolved_version_is_never_revisited() {
        let source = StaticSource::default()
            .with_versions("A", &["1.0.0"])
            .with_versions("B", &["1.0.0", "2.0.0"])
            .with_manifest(manifest("A", "1.0.0", vec![(None, vec![("B", "[2.0.0]")])]))
            .with_manifest(manifest("B", "1.0.0", vec![]));
        let builder = DependencyTreeBuilder::new(&source, &ExactFrameworkMatch);

        let tree = builder
            .build(
                vec![
                    DependencyRequest::direct("A", "1.0.0", None, false),
                    DependencyRequest::direct("B", "[1.0.0,)", None, false),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(tree.resolved.get("B").map(|id| id.version.as_str()), Some("1.0.0"));
        let issues: Vec<&Issue> = tree.roots[0].dependencies.iter().flat_map(|r| &r.issues).collect();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("Already resolved version 1.0.0"));
    }

    #[tokio::test]
    async fn test_framework_groups_filtered_by_nearest() {
        let source = StaticSource::default()
            .with_versions("A", &["1.0.0"])
            .with_versions("Common", &["1.0.0"])
            .with_versions("ForNet472", &["1.0.0"])
            .with_versions("ForStandard", &["1.0.0"])
            .with_manifest(manifest(
                "A",
                "1.0.0",
                vec![
                    (None, vec![("Common", "[1.0.0,)")]),
                    (Some(".NETFramework4.7.2"), vec![("ForNet472", "[1.0.0,)")]),
                    (Some(".NETStandard2.0"), vec![("ForStandard", "[1.0.0,)")]),
                ],
            ))
            .with_manifest(manifest("Common", "1.0.0", vec![]))
            .with_manifest(manifest("ForNet472", "1.0.0", vec![]))
            .with_manifest(manifest("ForStandard", "1.0.0", vec![]));
        let builder = DependencyTreeBuilder::new(&source, &ExactFrameworkMatch);

        let tree = builder
            .build(
                vec![DependencyRequest::direct("A", "[1.0.0,)", Some("net472".into()), false)],
                Some("net472"),
            )
            .await
            .unwrap();

        assert_eq!(
            names(&tree.roots[0].dependencies),
            vec!["Common@1.0.0", "ForNet472@1.0.0"]
        );
        assert!(!tree.resolved.contains("ForStandard"));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_issue_on_package() {
        let source = StaticSource::default().with_versions("A", &["1.0.0"]);
        let builder = DependencyTreeBuilder::new(&source, &ExactFrameworkMatch);

        let tree = builder
            .build(vec![DependencyRequest::direct("A", "(,)", None, false)], None)
            .await
            .unwrap();

        assert_eq!(names(&tree.roots), vec!["A@1.0.0"]);
        assert_eq!(tree.roots[0].issues.len(), 1);
        assert!(tree.roots[0].issues[0].message.contains("Cannot fetch the manifest"));
        assert_eq!(
            tree.unfetched,
            BTreeSet::from([PackageIdentifier::nuget("A", "1.0.0")])
        );
    }

    #[tokio::test]
    async fn test_cyclic_manifests_terminate() {
        let source = StaticSource::default()
            .with_versions("A", &["1.0.0"])
            .with_versions("B", &["1.0.0"])
            .with_manifest(manifest("A", "1.0.0", vec![(None, vec![("B", "(,)")])]))
            .with_manifest(manifest("B", "1.0.0", vec![(None, vec![("A", "(,)")])]));
        let builder = DependencyTreeBuilder::new(&source, &ExactFrameworkMatch);

        let tree = builder
            .build(vec![DependencyRequest::direct("A", "(,)", None, false)], None)
            .await
            .unwrap();

        let a = &tree.roots[0];
        assert_eq!(names(&a.dependencies), vec!["B@1.0.0"]);
        assert_eq!(names(&a.dependencies[0].dependencies), vec!["A@1.0.0"]);
        assert!(a.dependencies[0].dependencies[0].dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_root_carries_range() {
        let source = StaticSource::default().with_versions("A", &["1.0.0"]);
        let builder = DependencyTreeBuilder::new(&source, &ExactFrameworkMatch);

        let tree = builder
            .build(vec![DependencyRequest::direct("A", "[5.0.0]", None, false)], None)
            .await
            .unwrap();

        assert_eq!(names(&tree.roots), vec!["A@[5.0.0]"]);
        assert_eq!(tree.roots[0].issues.len(), 1);
        assert!(tree.resolved.is_empty());
    }
}
