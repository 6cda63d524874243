//! Redaction wrapper for secrets in logs.
//!
//! Private keys and backend signatures go through [`Redacted`] whenever they are
//! formatted, so `Debug`, `Display` and `Serialize` all print `"<redacted>"`.

use std::fmt::{self, Debug, Display};

/// Formats and serializes as `<redacted>` regardless of the inner value.
///
/// ```ignore
/// tracing::debug!(signature = %Redacted(&auth.signature), "Authorization created");
/// ```
#[derive(Clone, Copy)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// Access the wrapped secret
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}
