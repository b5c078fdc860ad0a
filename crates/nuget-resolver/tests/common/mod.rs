//! Shared fixtures for integration tests.
//!
//! [`MockFeed`] serves a complete NuGet V3 feed from a mockito server:
//! service index, registration catalogs, catalog leaves and `.nuspec` files.

use mockito::{Mock, ServerGuard};
use serde_json::{Value, json};

/// One published package version.
pub(crate) struct FeedPackage {
    pub id: &'static str,
    pub version: &'static str,
    /// `(target framework, [(dependency id, range)])`
    pub groups: Vec<(Option<&'static str>, Vec<(&'static str, &'static str)>)>,
    pub license: Option<&'static str>,
    pub has_manifest: bool,
    pub has_nuspec: bool,
}

impl FeedPackage {
    pub(crate) fn new(id: &'static str, version: &'static str) -> Self {
        Self {
            id,
            version,
            groups: Vec::new(),
            license: Some("MIT"),
            has_manifest: true,
            has_nuspec: true,
        }
    }

    /// The catalog leaf answers 404.
    pub(crate) fn without_manifest(mut self) -> Self {
        self.has_manifest = false;
        self
    }

    /// The `.nuspec` file answers 404.
    pub(crate) fn without_nuspec(mut self) -> Self {
        self.has_nuspec = false;
        self
    }

    pub(crate) fn depends_on(mut self, id: &'static str, range: &'static str) -> Self {
        self.groups.push((None, vec![(id, range)]));
        self
    }

    pub(crate) fn depends_for(
        mut self,
        framework: &'static str,
        id: &'static str,
        range: &'static str,
    ) -> Self {
        self.groups.push((Some(framework), vec![(id, range)]));
        self
    }
}

pub(crate) struct MockFeed {
    pub server: ServerGuard,
    mocks: Vec<Mock>,
}

impl MockFeed {
    pub(crate) async fn start() -> Self {
        Self {
            server: mockito::Server::new_async().await,
            mocks: Vec::new(),
        }
    }

    pub(crate) fn url(&self) -> String {
        self.server.url()
    }

    pub(crate) fn service_index_url(&self) -> String {
        format!("{}/v3/index.json", self.url())
    }

    pub(crate) fn registration_base(&self) -> String {
        format!("{}/v3/registration", self.url())
    }

    /// Serves the service index and every document of `packages`.
    pub(crate) async fn publish(&mut self, packages: &[FeedPackage]) {
        let base = self.url();

        let index = json!({
            "version": "3.0.0",
            "resources": [
                { "@id": format!("{base}/v3/query"), "@type": "SearchQueryService" },
                { "@id": format!("{base}/v3/registration/"), "@type": ["RegistrationsBaseUrl/3.6.0", "RegistrationsBaseUrl/Versioned"] }
            ]
        });
        self.serve("/v3/index.json", index.to_string()).await;

        let mut ids: Vec<&str> = packages.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();

        for id in ids {
            let lower = id.to_lowercase();
            let items: Vec<Value> = packages
                .iter()
                .filter(|p| p.id == id)
                .map(|p| {
                    json!({
                        "catalogEntry": {
                            "@id": format!("{base}/catalog/{lower}.{}.json", p.version),
                            "version": p.version,
                            "authors": "Test Author",
                            "packageContent": format!("{base}/flat/{lower}/{v}/{lower}.{v}.nupkg", v = p.version)
                        }
                    })
                })
                .collect();
            let catalog = json!({ "items": [{ "@id": format!("{base}/v3/registration/{lower}/page.json"), "items": items }] });
            self.serve(&format!("/v3/registration/{lower}/index.json"), catalog.to_string())
                .await;
        }

        for package in packages {
            let lower = package.id.to_lowercase();
            let groups: Vec<Value> = package
                .groups
                .iter()
                .map(|(framework, deps)| {
                    let dependencies: Vec<Value> = deps
                        .iter()
                        .map(|(id, range)| json!({ "id": id, "range": range }))
                        .collect();
                    match framework {
                        Some(framework) => {
                            json!({ "targetFramework": framework, "dependencies": dependencies })
                        }
                        None => json!({ "dependencies": dependencies }),
                    }
                })
                .collect();
            let manifest = json!({
                "id": package.id,
                "version": package.version,
                "description": format!("{} package", package.id),
                "packageHash": "c2hhNTEy",
                "packageHashAlgorithm": "SHA512",
                "dependencyGroups": groups
            });
            let manifest_path = format!("/catalog/{lower}.{}.json", package.version);
            if package.has_manifest {
                self.serve(&manifest_path, manifest.to_string()).await;
            } else {
                self.serve_missing(&manifest_path).await;
            }

            let license = package
                .license
                .map(|license| format!(r#"<license type="expression">{license}</license>"#))
                .unwrap_or_default();
            let nuspec = format!(
                r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>{}</id>
    <version>{}</version>
    <authors>Test Author; Second Author</authors>
    {license}
    <repository type="git" url="https://example.com/{lower}.git" commit="abc123" />
  </metadata>
</package>"#,
                package.id, package.version
            );
            let nuspec_path = format!("/flat/{lower}/{v}/{lower}.nuspec", v = package.version);
            if package.has_nuspec {
                self.serve(&nuspec_path, nuspec).await;
            } else {
                self.serve_missing(&nuspec_path).await;
            }
        }
    }

    async fn serve(&mut self, path: &str, body: String) {
        let mock = self
            .server
            .mock("GET", path)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        self.mocks.push(mock);
    }

    async fn serve_missing(&mut self, path: &str) {
        let mock = self
            .server
            .mock("GET", path)
            .with_status(404)
            .create_async()
            .await;
        self.mocks.push(mock);
    }
}
