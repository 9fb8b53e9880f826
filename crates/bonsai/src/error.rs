use thiserror::Error;

/// Graph-consistency violations. These are programmer/build-environment
/// errors: the resolver hands this stage a consistent graph, so a miss here
/// aborts the whole serialization.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error(r#"no dependency edge matches specifier "{specifier}" in module "{module}""#)]
    UnresolvedSpecifier { specifier: String, module: String },
    #[error(r#"module "{module}" is not present in the graph"#)]
    MissingModule { module: String },
}
