// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helper functions exposed to workflow templates.

use minijinja::value::Value;
use minijinja::{Environment, Error, ErrorKind};

/// Register the fixed helper set on a template environment.
pub fn register(env: &mut Environment<'_>) {
    env.add_function("lowercase", lowercase);
    env.add_function("uppercase", uppercase);
    env.add_function("contains", contains);
    env.add_function("containsKey", contains_key);
    env.add_function("hasPrefix", has_prefix);
    env.add_function("hasSuffix", has_suffix);
    env.add_function("formatMAC", format_mac);
    env.add_function("formatIP", format_ip);
}

fn lowercase(s: &str) -> String {
    s.to_lowercase()
}

fn uppercase(s: &str) -> String {
    s.to_uppercase()
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.contains(needle)
}

fn contains_key(map: Value, key: &str) -> bool {
    map.get_attr(key).map(|v| !v.is_undefined()).unwrap_or(false)
        || map
            .get_item(&Value::from(key))
            .map(|v| !v.is_undefined())
            .unwrap_or(false)
}

fn has_prefix(s: &str, prefix: &str) -> bool {
    s.starts_with(prefix)
}

fn has_suffix(s: &str, suffix: &str) -> bool {
    s.ends_with(suffix)
}

/// Canonicalise a MAC address to lowercase colon-separated hex pairs.
/// Accepts colon, hyphen, and dot separated forms.
fn format_mac(s: &str) -> Result<String, Error> {
    let hex: String = s
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("formatMAC: {:?} is not a MAC address", s),
        ));
    }
    let lower = hex.to_lowercase();
    let pairs: Vec<&str> = (0..6).map(|i| &lower[i * 2..i * 2 + 2]).collect();
    Ok(pairs.join(":"))
}

/// Parse and canonically format an IP address. Accepts an optional
/// `/prefix` or `:port`-free address in either family.
fn format_ip(s: &str) -> Result<String, Error> {
    let addr = s.split('/').next().unwrap_or(s);
    addr.parse::<std::net::IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("formatIP: {:?} is not an IP address", s),
            )
        })
}

#[cfg(test)]
#[path = "functions_tests.rs"]
mod tests;
