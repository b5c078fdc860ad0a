//! End-to-end analysis of one definition file.

use crate::assembler::{assemble_package, assemble_project};
use crate::definition::read_definition_file;
use crate::error::Result;
use crate::framework::FrameworkCompatibility;
use crate::registry::RegistryClient;
use crate::resolver::DependencyRequest;
use crate::tree::DependencyTreeBuilder;
use futures::future::join_all;
use nuget_core::{AnalysisResult, Issue, NUGET_ECOSYSTEM, Package, PackageIdentifier, Scope};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Scope holding requests without a target framework.
pub const ALL_DEPENDENCIES_SCOPE: &str = "allDependencies";

/// Suffix of scopes holding development-only requests.
pub const DEV_SCOPE_SUFFIX: &str = "-dev";

/// Name of the scope a direct request belongs to.
pub fn scope_name(request: &DependencyRequest) -> String {
    let base = request.framework.as_deref().unwrap_or(ALL_DEPENDENCIES_SCOPE);
    if request.dev_only {
        format!("{}{}", base, DEV_SCOPE_SUFFIX)
    } else {
        base.to_string()
    }
}

pub struct Analyzer {
    registry: Arc<RegistryClient>,
    frameworks: Arc<dyn FrameworkCompatibility>,
    include_dev: bool,
}

impl Analyzer {
    pub fn new(registry: Arc<RegistryClient>, frameworks: Arc<dyn FrameworkCompatibility>) -> Self {
        Self {
            registry,
            frameworks,
            include_dev: true,
        }
    }

    /// Whether development-only scopes are analyzed.
    pub fn include_dev_dependencies(mut self, include: bool) -> Self {
        self.include_dev = include;
        self
    }

    /// Reads `definition_file` and resolves its dependencies.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or carries a malformed
    /// version range. Everything else is reported as issues.
    pub async fn analyze(&self, definition_file: &Path) -> Result<AnalysisResult> {
        let requests = read_definition_file(definition_file).await?;
        self.analyze_requests(definition_file, requests).await
    }

    /// Resolves already parsed direct requests of `definition_file`.
    pub async fn analyze_requests(
        &self,
        definition_file: &Path,
        requests: Vec<DependencyRequest>,
    ) -> Result<AnalysisResult> {
        let mut by_scope: BTreeMap<String, Vec<DependencyRequest>> = BTreeMap::new();
        for request in requests {
            if request.dev_only && !self.include_dev {
                continue;
            }
            by_scope.entry(scope_name(&request)).or_default().push(request);
        }

        let builder = DependencyTreeBuilder::new(self.registry.as_ref(), self.frameworks.as_ref());
        let mut scopes = Vec::with_capacity(by_scope.len());
        let mut resolved: BTreeSet<PackageIdentifier> = BTreeSet::new();
        let mut unfetched: BTreeSet<PackageIdentifier> = BTreeSet::new();

        for (name, requests) in by_scope {
            let framework = requests.first().and_then(|request| request.framework.clone());
            tracing::info!("resolving scope {} ({} direct dependencies)", name, requests.len());

            let tree = builder.build(requests, framework.as_deref()).await?;
            resolved.extend(tree.resolved.iter().cloned());
            unfetched.extend(tree.unfetched);
            scopes.push(Scope {
                name,
                dependencies: tree.roots,
            });
        }

        let mut issues: Vec<Issue> = scopes.iter().flat_map(Scope::collect_issues).collect();

        // Manifest failures are already reported on their references.
        let assembled = join_all(
            resolved
                .into_iter()
                .filter(|id| !unfetched.contains(id))
                .map(|id| self.package(id)),
        )
        .await;
        let mut packages = Vec::with_capacity(assembled.len());
        for outcome in assembled {
            match outcome {
                Ok(package) => packages.push(package),
                Err(issue) => issues.push(issue),
            }
        }

        Ok(AnalysisResult {
            project: assemble_project(definition_file, scopes),
            packages,
            issues,
        })
    }

    /// Fetches the metadata of a resolved package and builds its record.
    ///
    /// A package that cannot be assembled is dropped; the returned warning
    /// explains its absence.
    async fn package(&self, id: PackageIdentifier) -> std::result::Result<Package, Issue> {
        let fetched = async {
            let entry = self.registry.get_entry(&id.name, &id.version).await?;
            let manifest = self.registry.get_manifest(&id.name, &id.version).await?;
            let spec = self.registry.get_spec(&id.name, &id.version).await?;
            Ok::<_, crate::error::ResolverError>((entry, manifest, spec))
        }
        .await;

        match fetched {
            Ok((entry, manifest, spec)) => Ok(assemble_package(id, &entry, &manifest, &spec)),
            Err(e) => {
                tracing::warn!("dropping package {}: {}", id, e);
                Err(Issue::warning(
                    NUGET_ECOSYSTEM,
                    format!("Cannot assemble package {} {}: {}", id.name, id.version, e),
                ))
            }
        }
    }
}
