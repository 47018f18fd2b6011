//! Origin allow-list applied to subscriber handshakes.

/// Wildcard entry that admits any origin
pub const ANY_ORIGIN: &str = "*";

/// Allow-list of browser origins
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Build a policy from configured origins. Trailing slashes are ignored.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: origins
                .into_iter()
                .map(|o| normalize(o.as_ref()).to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }

    /// Configured origins
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Decide whether a request with this `Origin` header may connect.
    ///
    /// Requests without an `Origin` header come from non-browser clients
    /// and are admitted; CORS only constrains browsers.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        let origin = normalize(origin);
        self.allowed
            .iter()
            .any(|allowed| allowed == ANY_ORIGIN || allowed.eq_ignore_ascii_case(origin))
    }
}

fn normalize(origin: &str) -> &str {
    origin.trim().trim_end_matches('/')
}
