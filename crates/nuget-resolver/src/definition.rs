//! Readers for the files that declare a project's direct NuGet dependencies.
//!
//! - `packages.config`: legacy per-project package list
//! - `*.csproj`, `*.fsproj`, `*.vbproj`: SDK-style `PackageReference` items

use crate::error::{ResolverError, Result};
use crate::resolver::DependencyRequest;
use crate::xml::{XmlEvent, XmlWalker};
use async_trait::async_trait;
use std::path::Path;

/// Extracts direct dependency requests from one kind of definition file.
#[async_trait]
pub trait DefinitionReader: Send + Sync {
    /// Parses definition file content; `document` names it in errors.
    fn parse(&self, document: &str, content: &str) -> Result<Vec<DependencyRequest>>;

    /// Reads and parses a definition file.
    async fn read(&self, path: &Path) -> Result<Vec<DependencyRequest>> {
        let content = tokio::fs::read_to_string(path).await?;
        self.parse(&path.to_string_lossy(), &content)
    }
}

/// Reader for `packages.config`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackagesConfigReader;

impl DefinitionReader for PackagesConfigReader {
    fn parse(&self, document: &str, content: &str) -> Result<Vec<DependencyRequest>> {
        let mut requests = Vec::new();
        let mut walker = XmlWalker::new(document, content);

        while let Some(event) = walker.next_event()? {
            let XmlEvent::Element { path, attributes } = event else {
                continue;
            };
            if !matches!(path.as_slice(), [root, package] if root == "packages" && package == "package")
            {
                continue;
            }

            let (Some(id), Some(version)) = (attributes.get("id"), attributes.get("version")) else {
                tracing::warn!("skipping <package> without id or version in {}", document);
                continue;
            };

            let framework = attributes
                .get("targetframework")
                .map(|framework| framework.trim().to_string())
                .filter(|framework| !framework.is_empty());
            let dev_only = attributes
                .get("developmentdependency")
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));

            requests.push(DependencyRequest::direct(id.trim(), version.trim(), framework, dev_only));
        }

        Ok(requests)
    }
}

/// Reader for SDK-style MSBuild project files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectFileReader;

#[derive(Debug, Default)]
struct PendingReference {
    name: String,
    version: Option<String>,
    private_assets: Option<String>,
    development: Option<String>,
}

impl PendingReference {
    fn dev_only(&self) -> bool {
        let all_private = self.private_assets.as_deref().is_some_and(|assets| {
            assets
                .split(';')
                .any(|asset| asset.trim().eq_ignore_ascii_case("all"))
        });
        let development = self
            .development
            .as_deref()
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));
        all_private || development
    }
}

impl DefinitionReader for ProjectFileReader {
    fn parse(&self, document: &str, content: &str) -> Result<Vec<DependencyRequest>> {
        let mut frameworks: Vec<String> = Vec::new();
        let mut references: Vec<PendingReference> = Vec::new();
        let mut current: Option<PendingReference> = None;
        let mut walker = XmlWalker::new(document, content);

        while let Some(event) = walker.next_event()? {
            match event {
                XmlEvent::Element { path, attributes } => {
                    if path.last().map(String::as_str) != Some("packagereference") {
                        continue;
                    }
                    let Some(name) = attributes.get("include").map(|name| name.trim()) else {
                        continue;
                    };
                    current = Some(PendingReference {
                        name: name.to_string(),
                        version: attributes.get("version").cloned(),
                        private_assets: attributes.get("privateassets").cloned(),
                        development: attributes.get("developmentdependency").cloned(),
                    });
                }
                XmlEvent::Text { path, text } => {
                    let Some(field) = path.last().map(String::as_str) else {
                        continue;
                    };
                    match field {
                        "targetframework" | "targetframeworks" => {
                            for framework in text.split(';').map(str::trim) {
                                if !framework.is_empty() && !frameworks.iter().any(|f| f == framework) {
                                    frameworks.push(framework.to_string());
                                }
                            }
                        }
                        "version" | "privateassets" | "developmentdependency" => {
                            let in_reference = path.len() >= 2
                                && path[path.len() - 2] == "packagereference";
                            let Some(reference) = current.as_mut().filter(|_| in_reference) else {
                                continue;
                            };
                            let slot = match field {
                                "version" => &mut reference.version,
                                "privateassets" => &mut reference.private_assets,
                                _ => &mut reference.development,
                            };
                            *slot = Some(text);
                        }
                        _ => {}
                    }
                }
                XmlEvent::End { path } => {
                    if path.last().map(String::as_str) == Some("packagereference") {
                        references.extend(current.take());
                    }
                }
            }
        }

        let targets: Vec<Option<String>> = if frameworks.is_empty() {
            vec![None]
        } else {
            frameworks.into_iter().map(Some).collect()
        };

        let mut requests = Vec::new();
        for reference in references {
            let Some(version) = reference
                .version
                .as_deref()
                .map(str::trim)
                .filter(|version| !version.is_empty())
            else {
                tracing::warn!(
                    "skipping PackageReference '{}' without version in {}",
                    reference.name,
                    document
                );
                continue;
            };
            let dev_only = reference.dev_only();
            for target in &targets {
                requests.push(DependencyRequest::direct(
                    reference.name.as_str(),
                    version,
                    target.clone(),
                    dev_only,
                ));
            }
        }

        Ok(requests)
    }
}

/// Selects the reader for a definition file by its name.
///
/// # Errors
///
/// Returns `ResolverError::UnsupportedDefinitionFile` for unknown files.
pub fn reader_for(path: &Path) -> Result<Box<dyn DefinitionReader>> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if file_name == "packages.config" {
        return Ok(Box::new(PackagesConfigReader));
    }

    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("csproj" | "fsproj" | "vbproj") => Ok(Box::new(ProjectFileReader)),
        _ => Err(ResolverError::UnsupportedDefinitionFile(
            path.to_string_lossy().into_owned(),
        )),
    }
}

/// Reads the direct dependency requests of a definition file.
pub async fn read_definition_file(path: &Path) -> Result<Vec<DependencyRequest>> {
    let reader = reader_for(path)?;
    let requests = reader.read(path).await?;
    tracing::debug!("read {} direct requests from {}", requests.len(), path.display());
    Ok(requests)
}
