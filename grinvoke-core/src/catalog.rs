//! # Service Catalog
//!
//! The in-memory view of everything an endpoint lets us call.
//!
//! A [`ServiceCatalog`] is built exactly once by the [`crate::reflection::resolver`] right after an
//! endpoint is connected, and it is never mutated afterwards. Only unary methods are admitted:
//! a [`MethodEntry`] can't be constructed from a client-streaming or server-streaming descriptor.
use prost_reflect::{DescriptorPool, MessageDescriptor, MethodDescriptor};
use serde::Serialize;

/// A callable unary method and the descriptors of its request and response messages.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    descriptor: MethodDescriptor,
}

impl MethodEntry {
    /// Wraps a method descriptor, refusing any streaming method.
    pub fn unary(descriptor: MethodDescriptor) -> Option<Self> {
        if descriptor.is_client_streaming() || descriptor.is_server_streaming() {
            return None;
        }
        Some(Self { descriptor })
    }

    /// Short method name (e.g. `SayHello`).
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Fully qualified name (e.g. `helloworld.Greeter.SayHello`).
    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    /// Fully qualified name of the owning service.
    pub fn service_name(&self) -> &str {
        self.descriptor.parent_service().full_name()
    }

    pub fn input(&self) -> MessageDescriptor {
        self.descriptor.input()
    }

    pub fn output(&self) -> MessageDescriptor {
        self.descriptor.output()
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }
}

/// A service and its admitted (unary) methods, in declaration order.
#[derive(Debug, Clone)]
pub struct ServiceEntry {
    name: String,
    methods: Vec<MethodEntry>,
}

impl ServiceEntry {
    pub fn new(name: impl Into<String>, methods: Vec<MethodEntry>) -> Self {
        Self {
            name: name.into(),
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodEntry] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.iter().find(|m| m.name() == name)
    }
}

/// All services of one endpoint, together with the descriptor pool they were resolved into.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    pool: DescriptorPool,
    services: Vec<ServiceEntry>,
}

impl ServiceCatalog {
    pub fn new(pool: DescriptorPool, services: Vec<ServiceEntry>) -> Self {
        Self { pool, services }
    }

    pub fn services(&self) -> &[ServiceEntry] {
        &self.services
    }

    /// The type graph every method entry of this catalog points into.
    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Looks up a method by fully qualified service name and short method name.
    pub fn find_method(&self, service: &str, method: &str) -> Option<&MethodEntry> {
        self.services
            .iter()
            .find(|s| s.name() == service)
            .and_then(|s| s.method(method))
    }

    pub fn summaries(&self) -> impl Iterator<Item = ServiceSummary> + '_ {
        self.services.iter().map(ServiceSummary::from)
    }
}

/// Serializable listing of a service, as handed out by `list_catalogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSummary {
    #[serde(rename = "service_name")]
    pub name: String,
    pub methods: Vec<MethodSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodSummary {
    #[serde(rename = "method_name")]
    pub name: String,
    /// Fully qualified name of the request message.
    pub request: String,
    /// Fully qualified name of the response message.
    pub response: String,
}

impl From<&ServiceEntry> for ServiceSummary {
    fn from(service: &ServiceEntry) -> Self {
        Self {
            name: service.name().to_string(),
            methods: service
                .methods()
                .iter()
                .map(|m| MethodSummary {
                    name: m.name().to_string(),
                    request: m.input().full_name().to_string(),
                    response: m.output().full_name().to_string(),
                })
                .collect(),
        }
    }
}
