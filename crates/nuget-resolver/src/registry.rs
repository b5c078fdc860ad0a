//! NuGet V3 registry client.
//!
//! Provides access to a NuGet feed via:
//! - Service index (`/v3/index.json`) to discover registrations base URLs
//! - Registration index (`{base}/{id}/index.json`) listing every version
//! - Catalog leaf (the entry's `@id`) with the dependency groups of a version
//! - Package spec (`.nuspec`) next to the package content
//!
//! Every document is memoized for the lifetime of the client, and the
//! underlying [`HttpCache`] keeps registry responses fresh for seven days.
//!
//! # Examples
//!
//! ```no_run
//! use nuget_core::HttpCache;
//! use nuget_resolver::registry::{DEFAULT_SERVICE_INDEX_URL, RegistryClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = Arc::new(HttpCache::new());
//!     let client = RegistryClient::initialize(cache, &[DEFAULT_SERVICE_INDEX_URL.to_string()])
//!         .await
//!         .unwrap();
//!
//!     let versions = client.get_available_versions("Newtonsoft.Json").await;
//!     println!("oldest: {}", versions[0]);
//! }
//! ```

use crate::error::{ResolverError, Result};
use crate::types::{
    CatalogEntry, CatalogPage, PackageManifest, PackageSpec, RegistrationIndex, RegistrationPage,
    RegistryCatalog, ServiceIndex,
};
use crate::version::Version;
use async_trait::async_trait;
use futures::future::try_join_all;
use nuget_core::{HttpCache, MemoCache};
use std::sync::Arc;

/// The public nuget.org feed.
pub const DEFAULT_SERVICE_INDEX_URL: &str = "https://api.nuget.org/v3/index.json";

/// Service index resource type of registration hives with SemVer 2.0.0 packages.
pub const REGISTRATIONS_BASE_URL_TYPE: &str = "RegistrationsBaseUrl/3.6.0";

/// Read access to package versions and manifests.
///
/// The version resolver and the tree builder only depend on this trait,
/// so they can run against any source of registry data.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// All known versions of a package, sorted ascending.
    ///
    /// Lookup failures yield an empty list: available versions are advisory.
    async fn available_versions(&self, name: &str) -> Vec<Version>;

    /// The manifest of one exact version.
    async fn manifest(&self, name: &str, version: &str) -> Result<Arc<PackageManifest>>;
}

/// Client for a set of NuGet V3 feeds.
pub struct RegistryClient {
    cache: Arc<HttpCache>,
    base_urls: Vec<String>,
    catalogs: MemoCache<String, Arc<RegistryCatalog>>,
    manifests: MemoCache<String, Arc<PackageManifest>>,
    specs: MemoCache<String, Arc<PackageSpec>>,
}

impl RegistryClient {
    /// Fetches all service indexes in parallel and collects their
    /// registrations base URLs in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::RegistryUnavailable` if any service index
    /// cannot be fetched or decoded, and
    /// `ResolverError::NoRegistrationsBaseUrl` if none declares a
    /// registrations base URL.
    pub async fn initialize(cache: Arc<HttpCache>, service_index_urls: &[String]) -> Result<Self> {
        let per_index = try_join_all(
            service_index_urls
                .iter()
                .map(|url| fetch_registrations_base_urls(&cache, url)),
        )
        .await?;

        let base_urls: Vec<String> = per_index.into_iter().flatten().collect();
        if base_urls.is_empty() {
            return Err(ResolverError::NoRegistrationsBaseUrl {
                urls: service_index_urls.to_vec(),
            });
        }

        tracing::debug!("registrations base URLs: {:?}", base_urls);
        Ok(Self::with_base_urls(cache, base_urls))
    }

    /// Creates a client for already known registrations base URLs.
    pub fn with_base_urls(cache: Arc<HttpCache>, base_urls: Vec<String>) -> Self {
        Self {
            cache,
            base_urls: base_urls
                .into_iter()
                .map(|url| url.trim_end_matches('/').to_string())
                .collect(),
            catalogs: MemoCache::new(),
            manifests: MemoCache::new(),
            specs: MemoCache::new(),
        }
    }

    pub fn base_urls(&self) -> &[String] {
        &self.base_urls
    }

    /// Returns the registration catalog of a package.
    ///
    /// Base URLs are tried in order; the first success is cached under the
    /// lowercased package name.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::CatalogNotFound` naming every tried URL if all
    /// base URLs fail.
    pub async fn get_catalog(&self, name: &str) -> Result<Arc<RegistryCatalog>> {
        let key = name.to_lowercase();
        self.catalogs
            .get_or_try_init(key.clone(), || async {
                let mut tried = Vec::with_capacity(self.base_urls.len());
                for base_url in &self.base_urls {
                    let url = format!("{}/{}/index.json", base_url, key);
                    match self.fetch_catalog(name, &url).await {
                        Ok(catalog) => return Ok(Arc::new(catalog)),
                        Err(e) => {
                            tracing::debug!("no catalog for '{}' at {}: {}", name, url, e);
                            tried.push(url);
                        }
                    }
                }
                Err(ResolverError::CatalogNotFound {
                    package: name.to_string(),
                    tried,
                })
            })
            .await
    }

    async fn fetch_catalog(&self, name: &str, url: &str) -> Result<RegistryCatalog> {
        let data = self.cache.get_cached(url).await?;
        let index: RegistrationIndex =
            serde_json::from_slice(&data).map_err(|e| ResolverError::json(url, e))?;

        let mut pages = Vec::with_capacity(index.items.len());
        for page in index.items {
            pages.push(self.resolve_page(page).await?);
        }

        Ok(RegistryCatalog {
            package: name.to_string(),
            pages,
        })
    }

    /// Pages of large packages do not inline their items and are fetched by `@id`.
    async fn resolve_page(&self, page: RegistrationPage) -> Result<CatalogPage> {
        let leaves = match page.items {
            Some(items) => items,
            None => {
                let data = self.cache.get_cached(&page.id).await?;
                let full: RegistrationPage =
                    serde_json::from_slice(&data).map_err(|e| ResolverError::json(&page.id, e))?;
                full.items.unwrap_or_default()
            }
        };

        Ok(CatalogPage {
            entries: leaves
                .into_iter()
                .map(|leaf| {
                    let mut entry = leaf.catalog_entry;
                    if entry.package_content.is_empty() {
                        entry.package_content = leaf.package_content.unwrap_or_default();
                    }
                    entry
                })
                .collect(),
        })
    }

    /// Returns the catalog entry of an exact version.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::VersionNotFound` if the catalog does not list it.
    pub async fn get_entry(&self, name: &str, version: &str) -> Result<CatalogEntry> {
        let catalog = self.get_catalog(name).await?;
        catalog
            .find(version)
            .cloned()
            .ok_or_else(|| ResolverError::VersionNotFound {
                package: name.to_string(),
                version: version.to_string(),
            })
    }

    /// Returns the manifest (catalog leaf) of an exact version.
    pub async fn get_manifest(&self, name: &str, version: &str) -> Result<Arc<PackageManifest>> {
        self.manifests
            .get_or_try_init(document_key(name, version), || async {
                let entry = self.get_entry(name, version).await?;
                let data = self.cache.get_cached(&entry.manifest_url).await?;
                let manifest: PackageManifest = serde_json::from_slice(&data)
                    .map_err(|e| ResolverError::json(&entry.manifest_url, e))?;
                Ok(Arc::new(manifest))
            })
            .await
    }

    /// Returns the parsed `.nuspec` of an exact version.
    pub async fn get_spec(&self, name: &str, version: &str) -> Result<Arc<PackageSpec>> {
        self.specs
            .get_or_try_init(document_key(name, version), || async {
                let entry = self.get_entry(name, version).await?;
                let url = spec_url(&entry.package_content, &entry.version);
                let data = self.cache.get_cached(&url).await?;
                let xml = String::from_utf8_lossy(&data);
                Ok(Arc::new(PackageSpec::parse(&url, &xml)?))
            })
            .await
    }

    /// Returns every published version of a package, sorted ascending.
    ///
    /// Failures are logged and yield an empty list.
    pub async fn get_available_versions(&self, name: &str) -> Vec<Version> {
        let catalog = match self.get_catalog(name).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!("failed to get available versions of '{}': {}", name, e);
                return Vec::new();
            }
        };

        let mut versions: Vec<Version> = catalog
            .entries()
            .filter_map(|entry| match Version::parse(&entry.version) {
                Ok(version) => Some(version),
                Err(e) => {
                    tracing::debug!("skipping version of '{}': {}", name, e);
                    None
                }
            })
            .collect();
        versions.sort();
        versions
    }
}

#[async_trait]
impl PackageSource for RegistryClient {
    async fn available_versions(&self, name: &str) -> Vec<Version> {
        self.get_available_versions(name).await
    }

    async fn manifest(&self, name: &str, version: &str) -> Result<Arc<PackageManifest>> {
        self.get_manifest(name, version).await
    }
}

async fn fetch_registrations_base_urls(cache: &HttpCache, url: &str) -> Result<Vec<String>> {
    let unavailable = |source: nuget_core::NugetError| ResolverError::RegistryUnavailable {
        url: url.to_string(),
        source: Box::new(source),
    };

    let data = cache.get_cached(url).await.map_err(unavailable)?;
    let index: ServiceIndex = serde_json::from_slice(&data)
        .map_err(|e| unavailable(nuget_core::NugetError::Json(e)))?;

    Ok(index
        .resources
        .into_iter()
        .filter(|resource| resource.kind.iter().any(|kind| kind == REGISTRATIONS_BASE_URL_TYPE))
        .map(|resource| resource.id.trim_end_matches('/').to_string())
        .collect())
}

fn document_key(name: &str, version: &str) -> String {
    format!("{}:{}", name.to_lowercase(), version.to_lowercase())
}

/// Derives the `.nuspec` URL from a package content URL.
///
/// `.../newtonsoft.json/13.0.1/newtonsoft.json.13.0.1.nupkg` becomes
/// `.../newtonsoft.json/13.0.1/newtonsoft.json.nuspec`. The version in the
/// file name is the normalized one, without build metadata.
pub fn spec_url(package_content: &str, version: &str) -> String {
    let normalized = version.split('+').next().unwrap_or_default();
    let suffix = format!(".{}.nupkg", normalized.to_ascii_lowercase());
    let lowered = package_content.to_ascii_lowercase();

    if lowered.ends_with(&suffix) {
        format!(
            "{}.nuspec",
            &package_content[..package_content.len() - suffix.len()]
        )
    } else {
        package_content.replace(".nupkg", ".nuspec")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_index(base: &str) -> String {
        format!(
            r#"{{
  "version": "3.0.0",
  "resources": [
    {{ "@id": "{base}/query", "@type": "SearchQueryService" }},
    {{ "@id": "{base}/registration-gz/", "@type": "RegistrationsBaseUrl/3.4.0" }},
    {{ "@id": "{base}/registration-semver2/", "@type": "RegistrationsBaseUrl/3.6.0" }}
  ]
}}"#
        )
    }

    fn catalog(base: &str, name: &str, versions: &[&str]) -> String {
        let items: Vec<String> = versions
            .iter()
            .map(|version| {
                format!(
                    r#"{{ "catalogEntry": {{
                        "@id": "{base}/catalog/{name}.{version}.json",
                        "version": "{version}",
                        "authors": "Someone",
                        "packageContent": "{base}/flat/{name}/{version}/{name}.{version}.nupkg"
                    }} }}"#
                )
            })
            .collect();
        format!(r#"{{ "items": [{{ "@id": "{base}/page", "items": [{}] }}] }}"#, items.join(","))
    }

    #[tokio::test]
    async fn test_initialize_selects_registration_base_urls() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let _m = server
            .mock("GET", "/v3/index.json")
            .with_status(200)
            .with_body(service_index(&base))
            .create_async()
            .await;

        let client = RegistryClient::initialize(
            Arc::new(HttpCache::new()),
            &[format!("{}/v3/index.json", base)],
        )
        .await
        .unwrap();

        assert_eq!(
            client.base_urls(),
            &[format!("{}/registration-semver2", base)]
        );
    }

    #[tokio::test]
    async fn test_initialize_fails_without_registrations() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/v3/index.json")
            .with_status(200)
            .with_body(r#"{ "resources": [] }"#)
            .create_async()
            .await;

        let result = RegistryClient::initialize(
            Arc::new(HttpCache::new()),
            &[format!("{}/v3/index.json", server.url())],
        )
        .await;

        assert!(matches!(
            result,
            Err(ResolverError::NoRegistrationsBaseUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_initialize_fails_if_any_index_fails() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _ok = server
            .mock("GET", "/ok/index.json")
            .with_status(200)
            .with_body(service_index(&base))
            .create_async()
            .await;
        let _down = server
            .mock("GET", "/down/index.json")
            .with_status(503)
            .create_async()
            .await;

        let result = RegistryClient::initialize(
            Arc::new(HttpCache::new()),
            &[
                format!("{}/ok/index.json", base),
                format!("{}/down/index.json", base),
            ],
        )
        .await;

        match result {
            Err(ResolverError::RegistryUnavailable { url, .. }) => {
                assert!(url.ends_with("/down/index.json"));
            }
            _ => panic!("expected RegistryUnavailable"),
        }
    }

    #[tokio::test]
    async fn test_catalog_falls_back_and_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let first = server
            .mock("GET", "/primary/some.package/index.json")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/secondary/some.package/index.json")
            .with_status(200)
            .with_body(catalog(&base, "some.package", &["1.0.0", "2.0.0"]))
            .expect(1)
            .create_async()
            .await;

        let client = RegistryClient::with_base_urls(
            Arc::new(HttpCache::new()),
            vec![format!("{}/primary/", base), format!("{}/secondary", base)],
        );

        let catalog = client.get_catalog("Some.Package").await.unwrap();
        assert_eq!(catalog.entries().count(), 2);

        let again = client.get_catalog("SOME.PACKAGE").await.unwrap();
        assert!(Arc::ptr_eq(&catalog, &again));

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_catalog_not_found_names_tried_urls() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = RegistryClient::with_base_urls(
            Arc::new(HttpCache::new()),
            vec![format!("{}/a", server.url()), format!("{}/b", server.url())],
        );

        match client.get_catalog("missing").await {
            Err(ResolverError::CatalogNotFound { package, tried }) => {
                assert_eq!(package, "missing");
                assert_eq!(tried.len(), 2);
            }
            _ => panic!("expected CatalogNotFound"),
        }
    }

    #[tokio::test]
    async fn test_catalog_fetches_non_inlined_pages() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let _index = server
            .mock("GET", "/reg/big/index.json")
            .with_status(200)
            .with_body(format!(r#"{{ "items": [{{ "@id": "{base}/reg/big/page/1.json" }}] }}"#))
            .create_async()
            .await;
        let _page = server
            .mock("GET", "/reg/big/page/1.json")
            .with_status(200)
            .with_body(format!(
                r#"{{ "@id": "{base}/reg/big/page/1.json", "items": [{{ "catalogEntry": {{ "@id": "{base}/leaf.json", "version": "3.1.0" }}, "packageContent": "{base}/big.3.1.0.nupkg" }}] }}"#
            ))
            .create_async()
            .await;

        let client =
            RegistryClient::with_base_urls(Arc::new(HttpCache::new()), vec![format!("{}/reg", base)]);

        let entry = client.get_entry("big", "3.1.0").await.unwrap();
        assert_eq!(entry.package_content, format!("{}/big.3.1.0.nupkg", base));
    }

    #[tokio::test]
    async fn test_available_versions_sorted_and_lenient() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _m = server
            .mock("GET", "/reg/pkg/index.json")
            .with_status(200)
            .with_body(catalog(&base, "pkg", &["2.0.0", "1.0.0", "1.10.0", "1.5.0-beta"]))
            .create_async()
            .await;

        let client =
            RegistryClient::with_base_urls(Arc::new(HttpCache::new()), vec![format!("{}/reg", base)]);

        let versions: Vec<String> = client
            .get_available_versions("pkg")
            .await
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(versions, vec!["1.0.0", "1.5.0-beta", "1.10.0", "2.0.0"]);

        assert!(client.get_available_versions("unknown").await.is_empty());
    }

    #[tokio::test]
    async fn test_manifest_and_spec_are_fetched_once() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let _catalog = server
            .mock("GET", "/reg/pkg/index.json")
            .with_status(200)
            .with_body(catalog(&base, "pkg", &["1.0.0"]))
            .create_async()
            .await;
        let manifest = server
            .mock("GET", "/catalog/pkg.1.0.0.json")
            .with_status(200)
            .with_body(r#"{ "id": "pkg", "version": "1.0.0", "dependencyGroups": [] }"#)
            .expect(1)
            .create_async()
            .await;
        let spec = server
            .mock("GET", "/flat/pkg/1.0.0/pkg.nuspec")
            .with_status(200)
            .with_body("<package><metadata><id>pkg</id><version>1.0.0</version></metadata></package>")
            .expect(1)
            .create_async()
            .await;

        let client =
            RegistryClient::with_base_urls(Arc::new(HttpCache::new()), vec![format!("{}/reg", base)]);

        for _ in 0..2 {
            let m = client.get_manifest("pkg", "1.0.0").await.unwrap();
            assert_eq!(m.id, "pkg");
            let s = client.get_spec("PKG", "1.0.0").await.unwrap();
            assert_eq!(s.version, "1.0.0");
        }

        manifest.assert_async().await;
        spec.assert_async().await;
    }

    #[tokio::test]
    async fn test_manifest_for_unknown_version() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _m = server
            .mock("GET", "/reg/pkg/index.json")
            .with_status(200)
            .with_body(catalog(&base, "pkg", &["1.0.0"]))
            .create_async()
            .await;

        let client =
            RegistryClient::with_base_urls(Arc::new(HttpCache::new()), vec![format!("{}/reg", base)]);

        assert!(matches!(
            client.get_manifest("pkg", "9.9.9").await,
            Err(ResolverError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn test_spec_url_strips_normalized_version() {
        assert_eq!(
            spec_url(
                "https://api.nuget.org/v3-flatcontainer/newtonsoft.json/13.0.1/newtonsoft.json.13.0.1.nupkg",
                "13.0.1"
            ),
            "https://api.nuget.org/v3-flatcontainer/newtonsoft.json/13.0.1/newtonsoft.json.nuspec"
        );
    }

    #[test]
    fn test_spec_url_ignores_build_metadata_and_case() {
        assert_eq!(
            spec_url(
                "https://feed/flat/foo/1.0.0-rc.1/foo.1.0.0-rc.1.nupkg",
                "1.0.0-RC.1+sha.abc"
            ),
            "https://feed/flat/foo/1.0.0-rc.1/foo.nuspec"
        );
    }
}
