//! # Server Reflection
//!
//! This module contains the logic necessary to interact with the gRPC Server Reflection Protocol.
//!
//! It enables the core to query a remote endpoint for its own Protobuf schema at runtime and to
//! turn that schema into a [`crate::catalog::ServiceCatalog`], without any pre-compiled descriptors.
//!
//! * [`client::ReflectionClient`]: the low-level `grpc.reflection.v1` client.
//! * [`resolver`]: the Descriptor Resolver, which walks every service of an endpoint and builds its catalog.
pub mod client;
pub mod resolver;
