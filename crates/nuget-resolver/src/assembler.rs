//! Mapping of resolved packages and analyzed projects to result records.

use crate::types::{CatalogEntry, PackageManifest, PackageSpec};
use nuget_core::{
    Hash, NUGET_ECOSYSTEM, Package, PackageIdentifier, Project, RemoteArtifact, Scope, VcsInfo,
};
use std::collections::BTreeSet;
use std::path::Path;

/// Placeholder `licenseUrl` written by NuGet clients for packages that
/// declare a license expression or file instead.
pub const DEPRECATED_LICENSE_URL: &str = "https://aka.ms/deprecateLicenseUrl";

/// Builds the package record of a resolved identifier.
pub fn assemble_package(
    id: PackageIdentifier,
    entry: &CatalogEntry,
    manifest: &PackageManifest,
    spec: &PackageSpec,
) -> Package {
    let mut authors = split_authors(&spec.authors);
    if authors.is_empty() {
        authors = entry
            .authors
            .iter()
            .flat_map(split_authors)
            .collect();
    }

    let description = first_non_empty(&[
        manifest.description.as_deref(),
        Some(spec.description.as_str()),
        entry.description.as_deref(),
    ]);
    let homepage_url = first_non_empty(&[
        manifest.project_url.as_deref(),
        Some(spec.project_url.as_str()),
        entry.project_url.as_deref(),
    ]);

    Package {
        declared_licenses: declared_licenses(entry, spec),
        authors,
        description,
        homepage_url,
        binary_artifact: RemoteArtifact {
            url: entry.package_content.clone(),
            hash: Hash {
                value: manifest.package_hash.clone().unwrap_or_default(),
                algorithm: manifest.package_hash_algorithm.clone().unwrap_or_default(),
            },
        },
        source_artifact: RemoteArtifact::default(),
        vcs: vcs_info(spec),
        id,
    }
}

/// Builds the project record of an analyzed definition file.
///
/// The project is named after the file stem and has no version.
pub fn assemble_project(definition_file: &Path, scopes: Vec<Scope>) -> Project {
    let name = definition_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    Project {
        id: PackageIdentifier {
            ecosystem: NUGET_ECOSYSTEM.to_string(),
            namespace: String::new(),
            name,
            version: String::new(),
        },
        definition_file_path: definition_file.to_string_lossy().into_owned(),
        authors: BTreeSet::new(),
        declared_licenses: BTreeSet::new(),
        vcs: VcsInfo::default(),
        homepage_url: String::new(),
        scopes,
    }
}

/// The structured `license` element wins over `licenseUrl`, which is
/// ignored when it is the deprecation placeholder.
fn declared_licenses(entry: &CatalogEntry, spec: &PackageSpec) -> BTreeSet<String> {
    let from_spec = spec
        .license
        .as_ref()
        .map(|license| license.value.trim())
        .filter(|value| !value.is_empty())
        .or_else(|| usable_license_url(&spec.license_url));

    let from_catalog = || {
        entry
            .license_expression
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or_else(|| entry.license_url.as_deref().and_then(usable_license_url))
    };

    from_spec
        .or_else(from_catalog)
        .map(|license| BTreeSet::from([license.to_string()]))
        .unwrap_or_default()
}

fn usable_license_url(url: &str) -> Option<&str> {
    let url = url.trim();
    (!url.is_empty() && url != DEPRECATED_LICENSE_URL).then_some(url)
}

fn split_authors(authors: &str) -> BTreeSet<String> {
    authors
        .split([',', ';'])
        .map(str::trim)
        .filter(|author| !author.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_non_empty(candidates: &[Option<&str>]) -> String {
    candidates
        .iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn vcs_info(spec: &PackageSpec) -> VcsInfo {
    let Some(repository) = &spec.repository else {
        return VcsInfo::default();
    };

    let revision = if repository.commit.is_empty() {
        repository.branch.clone()
    } else {
        repository.commit.clone()
    };

    VcsInfo {
        kind: repository.kind.clone(),
        url: repository.url.clone(),
        revision,
        path: String::new(),
    }
}
