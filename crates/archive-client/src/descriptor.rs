//! Fully-parameterized archive resource descriptors.

use std::time::Duration;

/// A concrete, fully-rendered request understood by the remote archive.
///
/// Multiple descriptors may map to the same logical key because resource
/// naming conventions have drifted over time; candidates are tried in
/// priority order, newest convention first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Archive base URL (scheme + host + root prefix)
    pub archive_root: String,
    /// Naming convention this descriptor was rendered from
    pub convention: String,
    /// Remote path relative to the archive root
    pub path: String,
    /// Hard timeout for one transfer of this resource
    pub timeout: Duration,
}

impl ResourceDescriptor {
    /// Full remote URL for this resource.
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.archive_root.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

impl std::fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.url(), self.convention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_slashes() {
        let desc = ResourceDescriptor {
            archive_root: "https://archive.example.org/nwp/".to_string(),
            convention: "2020".to_string(),
            path: "/arome/2024031500/f006.grib".to_string(),
            timeout: Duration::from_secs(600),
        };
        assert_eq!(
            desc.url(),
            "https://archive.example.org/nwp/arome/2024031500/f006.grib"
        );
    }
}
