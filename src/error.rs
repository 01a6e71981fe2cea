/// Coarse classification callers use to map failures onto user-facing
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    TypeMismatch,
    /// A record written a moment ago could not be read back. Operators
    /// should be alerted; the operation must not be retried.
    StorageInconsistency,
    NotExists,
    Unexpected,
}

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
