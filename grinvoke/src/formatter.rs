use colored::*;
use grinvoke_core::{
    InvokeError, InvokeResult,
    catalog::ServiceSummary,
    grpc::metadata::MetadataEntries,
    manager::{EndpointSummary, MethodNotFound, RegisterError},
    schema::MethodSchema,
    tonic::Status,
};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct Catalogs(pub Vec<ServiceSummary>);

pub struct Endpoints(pub Vec<EndpointSummary>);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| err.to_string())
}

impl From<Status> for FormattedString {
    fn from(status: Status) -> Self {
        FormattedString(format!(
            "{} code={:?} message={:?}",
            "gRPC Failed:".red().bold(),
            status.code(),
            status.message()
        ))
    }
}

impl From<RegisterError> for FormattedString {
    fn from(err: RegisterError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Registration Failed:".red().bold(), err))
    }
}

impl From<MethodNotFound> for FormattedString {
    fn from(err: MethodNotFound) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Lookup Failed:".red().bold(), err))
    }
}

impl From<InvokeError> for FormattedString {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Rpc(status) => FormattedString::from(status),
            err => FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err)),
        }
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        FormattedString(format!("{}\n\n'{:#}'", "Error:".red().bold(), err))
    }
}

impl From<Catalogs> for FormattedString {
    fn from(Catalogs(services): Catalogs) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        for service in services {
            out.push_str(&format!(
                "{} {} {{\n",
                "service".cyan(),
                service.name.green()
            ));
            for method in service.methods {
                out.push_str(&format!(
                    "  {} {}({}) {} ({});\n",
                    "rpc".cyan(),
                    method.name.green(),
                    method.request.yellow(),
                    "returns".cyan(),
                    method.response.yellow()
                ));
            }
            out.push_str("}\n\n");
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<Endpoints> for FormattedString {
    fn from(Endpoints(endpoints): Endpoints) -> Self {
        if endpoints.is_empty() {
            return FormattedString("No endpoints registered.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Registered Endpoints:\n");
        for endpoint in endpoints {
            out.push_str(&format!(
                "  - {} ({}:{})\n",
                endpoint.name.green(),
                endpoint.host,
                endpoint.port
            ));
            for service in endpoint.services {
                out.push_str(&format!("      {}\n", service.yellow()));
            }
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<MethodSchema> for FormattedString {
    fn from(schema: MethodSchema) -> Self {
        FormattedString(pretty(&schema))
    }
}

impl From<InvokeResult> for FormattedString {
    fn from(result: InvokeResult) -> Self {
        let mut out = String::new();
        push_metadata(&mut out, "Header", &result.header);
        out.push_str(&pretty(&result.data));
        push_metadata(&mut out, "\nTrailer", &result.trailer);
        FormattedString(out)
    }
}

fn push_metadata(out: &mut String, title: &str, entries: &MetadataEntries) {
    if entries.is_empty() {
        return;
    }

    out.push_str(&format!("{}\n", title.cyan()));
    for (key, values) in entries {
        for value in values {
            out.push_str(&format!("  {}: {}\n", key.purple(), value));
        }
    }
    out.push('\n');
}
