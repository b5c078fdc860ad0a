//! Wire types of the NuGet V3 registry protocol.
//!
//! - Service index: `{ "resources": [{ "@id": ..., "@type": ... }] }`
//! - Registration index: `{ "items": [{ "@id": ..., "items": [{ "catalogEntry": {...} }] }] }`
//! - Catalog leaf ("manifest"): per-version metadata with `dependencyGroups`
//! - Package spec (`.nuspec`): XML metadata, see [`PackageSpec`]

use crate::error::{ResolverError, Result};
use crate::xml::{XmlEvent, XmlWalker};
use serde::Deserialize;

/// Either a single string or a list of strings.
///
/// Several registry fields (`@type`, `authors`) use both shapes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            OneOrMany::One(value) => std::slice::from_ref(value),
            OneOrMany::Many(values) => values,
        };
        slice.iter().map(String::as_str)
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceIndex {
    #[serde(default)]
    pub resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceResource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type", default)]
    pub kind: OneOrMany,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationIndex {
    #[serde(default)]
    pub items: Vec<RegistrationPage>,
}

/// A registration page; large packages only link to it by `@id`.
#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationPage {
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(default)]
    pub items: Option<Vec<RegistrationLeaf>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegistrationLeaf {
    pub catalog_entry: CatalogEntry,
    #[serde(default)]
    pub package_content: Option<String>,
}

/// One published version of a package as listed in its registration catalog.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// URL of the catalog leaf, i.e. the package manifest.
    #[serde(rename = "@id")]
    pub manifest_url: String,
    pub version: String,
    #[serde(default)]
    pub package_content: String,
    #[serde(default)]
    pub authors: OneOrMany,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license_expression: Option<String>,
    #[serde(default)]
    pub license_url: Option<String>,
    #[serde(default)]
    pub project_url: Option<String>,
}

/// Catalog entries of one registration page, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogPage {
    pub entries: Vec<CatalogEntry>,
}

/// All published versions of one package, grouped in registration pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryCatalog {
    pub package: String,
    pub pages: Vec<CatalogPage>,
}

impl RegistryCatalog {
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.pages.iter().flat_map(|page| page.entries.iter())
    }

    /// Looks up the entry of an exact version (build metadata and case ignored).
    pub fn find(&self, version: &str) -> Option<&CatalogEntry> {
        let wanted = strip_metadata(version);
        self.entries()
            .find(|entry| strip_metadata(&entry.version).eq_ignore_ascii_case(wanted))
    }
}

fn strip_metadata(version: &str) -> &str {
    version.split('+').next().unwrap_or_default().trim()
}

/// Per-version package metadata, including dependency groups.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub package_hash_algorithm: Option<String>,
    #[serde(default)]
    pub package_hash: Option<String>,
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
}

/// Dependencies declared for one target framework, or for all of them.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGroup {
    #[serde(default)]
    pub target_framework: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<ManifestDependency>,
}

impl DependencyGroup {
    /// The declared framework, treating an empty string as "any framework".
    pub fn framework(&self) -> Option<&str> {
        self.target_framework
            .as_deref()
            .map(str::trim)
            .filter(|framework| !framework.is_empty())
    }
}

/// Range used for manifest dependencies that declare none.
pub const ANY_VERSION_RANGE: &str = "(,)";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ManifestDependency {
    pub id: String,
    #[serde(default)]
    pub range: Option<String>,
}

impl ManifestDependency {
    pub fn range(&self) -> &str {
        self.range
            .as_deref()
            .map(str::trim)
            .filter(|range| !range.is_empty())
            .unwrap_or(ANY_VERSION_RANGE)
    }
}

/// `<license type="expression">MIT</license>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecLicense {
    pub kind: String,
    pub value: String,
}

/// `<repository type="git" url="..." branch="..." commit="..." />`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecRepository {
    pub kind: String,
    pub url: String,
    pub branch: String,
    pub commit: String,
}

/// Metadata of a `.nuspec` document used to assemble package records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSpec {
    pub id: String,
    pub version: String,
    pub title: String,
    pub authors: String,
    pub owners: String,
    pub description: String,
    pub project_url: String,
    pub license: Option<SpecLicense>,
    pub license_url: String,
    pub repository: Option<SpecRepository>,
    pub copyright: String,
    pub tags: String,
}

impl PackageSpec {
    /// Parses a `.nuspec` document.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::Xml` if the document is not well-formed.
    pub fn parse(document: &str, xml: &str) -> Result<Self> {
        let mut spec = PackageSpec::default();
        let mut walker = XmlWalker::new(document, xml);

        while let Some(event) = walker.next_event()? {
            match event {
                XmlEvent::Element { path, attributes } => match path.as_slice() {
                    [_, metadata, license] if metadata == "metadata" && license == "license" => {
                        spec.license = Some(SpecLicense {
                            kind: attributes.get("type").cloned().unwrap_or_default(),
                            value: String::new(),
                        });
                    }
                    [_, metadata, repository]
                        if metadata == "metadata" && repository == "repository" =>
                    {
                        let attr = |name: &str| attributes.get(name).cloned().unwrap_or_default();
                        spec.repository = Some(SpecRepository {
                            kind: attr("type"),
                            url: attr("url"),
                            branch: attr("branch"),
                            commit: attr("commit"),
                        });
                    }
                    _ => {}
                },
                XmlEvent::Text { path, text } => {
                    let [_, metadata, field] = path.as_slice() else {
                        continue;
                    };
                    if metadata != "metadata" {
                        continue;
                    }
                    let target = match field.as_str() {
                        "id" => &mut spec.id,
                        "version" => &mut spec.version,
                        "title" => &mut spec.title,
                        "authors" => &mut spec.authors,
                        "owners" => &mut spec.owners,
                        "description" => &mut spec.description,
                        "projecturl" => &mut spec.project_url,
                        "licenseurl" => &mut spec.license_url,
                        "copyright" => &mut spec.copyright,
                        "tags" => &mut spec.tags,
                        "license" => match spec.license.as_mut() {
                            Some(license) => &mut license.value,
                            None => continue,
                        },
                        _ => continue,
                    };
                    target.push_str(&text);
                }
                XmlEvent::End { .. } => {}
            }
        }

        if spec.id.is_empty() {
            return Err(ResolverError::xml(document, "missing <metadata><id>"));
        }

        Ok(spec)
    }
}
