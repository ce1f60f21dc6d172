use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use spectrum_poll::{Diagnostic, Error, ErrorMessage, PollOutcome, Poller, Result};
use tracing::debug;

/// One read-only observation of a remote system.
///
/// `observe` looks exactly once; [`wait_for`] turns it into "eventually".
#[async_trait]
pub trait Check: Send + Sync {
    type Query: Send + Sync;
    type Found: Send;

    /// What is being waited for, used as the timeout message.
    fn describe(&self, query: &Self::Query) -> String;

    async fn observe(&self, query: &Self::Query) -> Result<PollOutcome<Self::Found>>;
}

/// Poll `check` until it finds what `query` describes.
pub async fn wait_for<C: Check>(check: &C, poller: &Poller, query: &C::Query) -> Result<C::Found> {
    poller
        .poll(
            || check.observe(query),
            ErrorMessage::deferred(|| check.describe(query)),
        )
        .await
}

/// Named values substituted into `{name}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.0.insert(name.into(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

/// Substitute `{name}` placeholders. `{{` and `}}` stand for literal braces,
/// so regex quantifiers like `[0-9]{{12}}` survive.
pub fn fill_template(template: &str, fields: &Fields) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(Error::Config(format!(
                                "Unterminated placeholder in template {template}"
                            )))
                        }
                    }
                }
                let value = fields.get(&name).ok_or_else(|| {
                    Error::Config(format!("Template {template} needs field `{name}`"))
                })?;
                out.push_str(value);
            }
            '}' => {
                return Err(Error::Config(format!(
                    "Single `}}` in template {template}"
                )))
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Connection-level failures are presumed transient: log and keep polling.
pub(crate) fn transport_pending<T>(url: &str, err: impl fmt::Display) -> PollOutcome<T> {
    debug!(url, error = %err, "Connection error, will retry");
    PollOutcome::pending_with(Diagnostic::transport(url, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_placeholders_and_keeps_escaped_braces() {
        let fields = Fields::new().with("id", "06847").with("version", 1);
        let filled = fill_template(
            "elife-{id}-(poa|vor)-v{version}-20[0-9]{{12}}.zip",
            &fields,
        )
        .unwrap();
        assert_eq!(filled, "elife-06847-(poa|vor)-v1-20[0-9]{12}.zip");
    }

    #[test]
    fn missing_field_is_a_configuration_error() {
        let err = fill_template("{vendor}/outbox/elife{id}.xml", &Fields::new().with("id", 1))
            .unwrap_err();
        assert!(matches!(err, Error::Config(message) if message.contains("`vendor`")));
    }
}
