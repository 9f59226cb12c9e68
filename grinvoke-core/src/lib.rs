//! # Grinvoke Core
//!
//! `grinvoke-core` lets a caller invoke unary methods of any gRPC server it has never compiled
//! client code against. Interfaces are discovered at runtime through server reflection.
//!
//! ## Key Components
//!
//! * **[`Workbench`]:** The main entry point. It registers endpoints, lists their catalogs,
//!   compiles method schemas and invokes methods with JSON payloads.
//! * **[Connection Manager](manager):** One live channel and one immutable [`ServiceCatalog`]
//!   per `(host, port)`.
//! * **[Descriptor Resolver](reflection::resolver):** Pulls the full type graph of an endpoint
//!   via `grpc.reflection.v1` and keeps only unary methods.
//! * **[Schema Compiler](schema):** Turns message descriptors into JSON-Schema-like trees,
//!   terminating on recursive types.
//! * **[Dynamic Invoker](invoke):** JSON in, JSON out, with response header and trailer
//!   metadata captured separately.
//!
//! ## Internal clients
//!
//! The clients used internally are exposed as well:
//!
//! * **[`GrpcClient`]:** A dynamic unary client built on a `DynamicMessage` codec.
//! * **[`ReflectionClient`]:** A gRPC Reflection client offering only the functionality needed
//!   to resolve an endpoint's services.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod catalog;
pub mod config;
pub mod grpc;
pub mod invoke;
pub mod json;
pub mod manager;
pub mod reflection;
pub mod schema;
pub mod workbench;

pub use catalog::ServiceCatalog;
pub use config::Config;
pub use grpc::client::GrpcClient;
pub use invoke::{InvokeError, InvokeRequest, InvokeResult};
pub use reflection::client::ReflectionClient;
pub use workbench::Workbench;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
