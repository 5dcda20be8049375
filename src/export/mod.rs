//! Live-configuration export
//!
//! Reads the live configuration of a Cribl deployment through its management
//! API and writes it out as declarative infrastructure code with re-adoption
//! directives, so existing objects can be brought under management without
//! recreating them.
//!
//! - Discovering which resource types exist and how many of each
//! - Converting each resource into a provider-shaped value tree
//! - Resolving discriminated unions into the provider's named blocks
//! - Rendering modules, root wiring and `import` blocks
//!
//! # Usage
//!
//! ```bash
//! # Count what is there
//! iacport discover --base-url https://cribl.example.com
//!
//! # Export everything into ./cribl-export
//! iacport export --base-url https://cribl.example.com -o cribl-export
//!
//! # Export offline from recorded responses
//! iacport export --snapshot recorded.yaml -o cribl-export
//! ```
//!
//! # Workflow
//!
//! 1. `tofu init` in the output directory
//! 2. `tofu plan` shows one import per exported resource and no changes
//! 3. `tofu apply` adopts the resources into state

pub mod cache;
pub mod catalog;
pub mod client;
pub mod converter;
pub mod discovery;
pub mod error;
pub mod hcl;
pub mod identifiers;
pub mod naming;
pub mod oneof;
pub mod pipeline;
pub mod registry;
pub mod rest;
pub mod schema;
pub mod secrets;
pub mod skip;
pub mod snapshot;
pub mod summary;
pub mod value;
pub mod writer;

// Re-export commonly used types
pub use client::ApiClient;
pub use discovery::{DiscoveryEngine, ScopeFilter};
pub use pipeline::ExportPipeline;
pub use registry::{Registry, RegistryOverride};
pub use rest::RestClient;
pub use skip::SkipRules;
pub use snapshot::SnapshotClient;
pub use writer::{Generator, Layout, ProviderPin};
