//! NuGet registry client and transitive dependency resolution.
//!
//! Given the direct dependencies of a .NET project, this crate discovers the
//! available versions of every referenced package from a NuGet V3 feed,
//! picks one version per package name, expands the manifests of the chosen
//! versions until the graph closes and assembles a dependency forest per
//! scope. Unsatisfiable constraints are reported as issues on the requesting
//! package rather than aborting the run.
//!
//! # Features
//!
//! - Bracket-notation version ranges (`[1.0,2.0)`, pinned `1.0`)
//! - Service index, registration catalog, catalog leaf and `.nuspec` access
//!   with per-client memoization
//! - Nearest target framework lookup, remote or local
//! - Greedy lowest-satisfying-version resolution without backtracking
//! - `packages.config` and SDK-style project file readers
//!
//! # Examples
//!
//! ```
//! use nuget_resolver::{Version, VersionRange};
//!
//! let range: VersionRange = "[1.0.0,2.0.0)".parse().unwrap();
//! assert!(range.contains(&Version::parse("1.9.9").unwrap()));
//! ```

pub mod analyzer;
pub mod assembler;
pub mod definition;
pub mod error;
pub mod framework;
pub mod registry;
pub mod resolver;
pub mod tree;
pub mod types;
pub mod version;

mod xml;

// Re-export commonly used types
pub use analyzer::{ALL_DEPENDENCIES_SCOPE, Analyzer, DEV_SCOPE_SUFFIX, scope_name};
pub use assembler::{assemble_package, assemble_project};
pub use definition::{
    DefinitionReader, PackagesConfigReader, ProjectFileReader, read_definition_file, reader_for,
};
pub use error::{ResolverError, Result};
pub use framework::{
    DEFAULT_FRAMEWORK_SERVICE_URL, ExactFrameworkMatch, FrameworkCompatibility, FrameworkService,
};
pub use registry::{DEFAULT_SERVICE_INDEX_URL, PackageSource, RegistryClient};
pub use resolver::{
    DependencyRequest, Requester, Resolution, ResolutionIssue, ResolvedSet, VersionResolver,
};
pub use tree::{DependencyTree, DependencyTreeBuilder};
pub use types::{CatalogEntry, PackageManifest, PackageSpec, RegistryCatalog};
pub use version::{Version, VersionRange};
