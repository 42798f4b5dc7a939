//! String formats checked by the `format` keyword.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, NaiveDate, NaiveTime};
use regex::Regex;
use url::Url;

use crate::pointer::JsonPath;

static DATE_TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])[Tt]([01]\d|2[0-3]):[0-5]\d:([0-5]\d|60)(\.\d+)?([Zz]|[+-]([01]\d|2[0-3]):[0-5]\d)$",
    )
    .expect("date-time regex is valid")
});

static DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("date regex is valid")
});

static TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):[0-5]\d:([0-5]\d|60)$").expect("time regex is valid")
});

static HOSTNAME_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$")
        .expect("hostname label regex is valid")
});

/// Checks one string format.
///
/// Closures of type `Fn(&str) -> Result<(), String>` are validators too.
pub trait FormatValidator: Send + Sync {
    /// `Err` carries a message describing why the value does not match.
    fn validate(&self, value: &str) -> Result<(), String>;
}

impl<F> FormatValidator for F
where
    F: Fn(&str) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, value: &str) -> Result<(), String> {
        self(value)
    }
}

/// Format name → validator lookup.
///
/// [`FormatRegistry::new`] starts with the formats of drafts 3, 4 and 6;
/// [`FormatRegistry::empty`] starts with none. Unknown formats are ignored
/// during validation.
#[derive(Clone)]
pub struct FormatRegistry {
    validators: HashMap<String, Arc<dyn FormatValidator>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    pub fn empty() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry
            .register("date-time", date_time)
            .register("date", date)
            .register("time", time)
            .register("email", email)
            .register("hostname", hostname)
            .register("host-name", hostname)
            .register("ipv4", ipv4)
            .register("ip-address", ipv4)
            .register("ipv6", ipv6)
            .register("uri", uri)
            .register("uri-reference", uri_reference)
            .register("json-pointer", json_pointer)
            .register("regex", regex);
        registry
    }

    /// Add or replace the validator for `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        validator: impl FormatValidator + 'static,
    ) -> &mut Self {
        self.validators.insert(name.into(), Arc::new(validator));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, validator: impl FormatValidator + 'static) -> Self {
        self.register(name, validator);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FormatValidator>> {
        self.validators.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Registered format names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.validators
            .keys()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.names())
            .finish()
    }
}

fn invalid(value: &str, format: &str) -> String {
    format!("{:?} is not a valid {}", value, format)
}

fn date_time(value: &str) -> Result<(), String> {
    if !DATE_TIME_REGEX.is_match(value) {
        return Err(invalid(value, "date-time"));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|e| format!("{}: {}", invalid(value, "date-time"), e))
}

fn date(value: &str) -> Result<(), String> {
    if !DATE_REGEX.is_match(value) {
        return Err(invalid(value, "date"));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|e| format!("{}: {}", invalid(value, "date"), e))
}

fn time(value: &str) -> Result<(), String> {
    if !TIME_REGEX.is_match(value) {
        return Err(invalid(value, "time"));
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .map(|_| ())
        .map_err(|e| format!("{}: {}", invalid(value, "time"), e))
}

fn email(value: &str) -> Result<(), String> {
    match value.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !local.contains(char::is_whitespace) => {
            hostname(domain).map_err(|_| invalid(value, "email"))
        }
        _ => Err(invalid(value, "email")),
    }
}

fn hostname(value: &str) -> Result<(), String> {
    let trimmed = value.strip_suffix('.').unwrap_or(value);
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 253
        && trimmed.split('.').all(|label| HOSTNAME_LABEL_REGEX.is_match(label));
    if valid {
        Ok(())
    } else {
        Err(invalid(value, "hostname"))
    }
}

fn ipv4(value: &str) -> Result<(), String> {
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| invalid(value, "ipv4 address"))
}

fn ipv6(value: &str) -> Result<(), String> {
    value
        .parse::<Ipv6Addr>()
        .map(|_| ())
        .map_err(|_| invalid(value, "ipv6 address"))
}

fn uri(value: &str) -> Result<(), String> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| format!("{}: {}", invalid(value, "uri"), e))
}

fn uri_reference(value: &str) -> Result<(), String> {
    Url::parse("http://example.com/")
        .and_then(|base| base.join(value))
        .map(|_| ())
        .map_err(|e| format!("{}: {}", invalid(value, "uri-reference"), e))
}

fn json_pointer(value: &str) -> Result<(), String> {
    if !value.is_empty() && !value.starts_with('/') {
        return Err(invalid(value, "json-pointer"));
    }
    JsonPath::from_pointer(value).map(|_| ())
}

fn regex(value: &str) -> Result<(), String> {
    Regex::new(value)
        .map(|_| ())
        .map_err(|e| format!("{}: {}", invalid(value, "regex"), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(format: &str, value: &str) -> bool {
        FormatRegistry::new()
            .get(format)
            .unwrap()
            .validate(value)
            .is_ok()
    }

    #[test]
    fn date_time_format() {
        assert!(check("date-time", "2024-01-15T10:30:00Z"));
        assert!(check("date-time", "2024-01-15T10:30:00.123+02:00"));
        assert!(!check("date-time", "2024-13-15T10:30:00Z"));
        assert!(!check("date-time", "2024-01-15 10:30:00"));
        assert!(!check("date-time", "2023-02-31T10:00:00Z"));
    }

    #[test]
    fn calendar_dates_must_exist() {
        assert!(check("date", "2024-02-29"));
        assert!(!check("date", "2023-02-29"));
        assert!(!check("date", "2023-02-30"));
        assert!(!check("date", "2023-04-31"));
        assert!(check("time", "23:59:59"));
        assert!(!check("time", "24:00:00"));
    }

    #[test]
    fn network_formats() {
        assert!(check("ipv4", "192.168.1.1"));
        assert!(!check("ipv4", "256.1.1.1"));
        assert!(check("ip-address", "10.0.0.1"));
        assert!(check("ipv6", "::1"));
        assert!(!check("ipv6", "12345::"));
        assert!(check("hostname", "example.com"));
        assert!(!check("hostname", "-bad.example.com"));
        assert!(check("email", "joe@example.com"));
        assert!(!check("email", "joe.example.com"));
    }

    #[test]
    fn uri_formats() {
        assert!(check("uri", "http://example.com/a?b#c"));
        assert!(!check("uri", "relative/path"));
        assert!(check("uri-reference", "relative/path"));
        assert!(check("json-pointer", "/a/b~1c"));
        assert!(!check("json-pointer", "a/b"));
    }

    #[test]
    fn regex_format() {
        assert!(check("regex", "^[a-z]+$"));
        assert!(!check("regex", "(unclosed"));
    }

    #[test]
    fn custom_validators_replace_defaults() {
        let registry = FormatRegistry::new().with("hostname", |v: &str| {
            if v == "localhost" {
                Ok(())
            } else {
                Err("only localhost".to_string())
            }
        });
        assert!(registry.get("hostname").unwrap().validate("example.com").is_err());
        assert!(registry.contains("email"));
        assert!(!FormatRegistry::empty().contains("email"));
    }
}
