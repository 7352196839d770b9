//! Upstream adapters
//!
//! `upstream` groups and the `server` entries inside them:
//!
//! ```text
//! upstream backend {
//!     server 127.0.0.1:8080 weight=5 max_fails=3 fail_timeout=30s;
//!     server 127.0.0.1:8081 backup;
//! }
//! ```

use super::{expect_name, AdapterError, DirectiveAdapter, DuplicateKeys};
use crate::parser::ast::Directive;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One `server` entry of an upstream group
///
/// Address, flags and `key=value` parameters are derived views. Rendering
/// always replays the wrapped directive's parameters in their original
/// order, whatever the views contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamServer<'a> {
    directive: &'a Directive,
    address: &'a str,
    flags: Vec<&'a str>,
    parameters: HashMap<&'a str, &'a str>,
}

impl<'a> UpstreamServer<'a> {
    /// Adapt `directive` using `policy` for repeated keys
    pub fn with_policy(directive: &'a Directive, policy: DuplicateKeys) -> Result<Self, AdapterError> {
        expect_name(directive, Self::NAME)?;

        let (address, rest) = directive
            .parameters
            .split_first()
            .ok_or_else(|| AdapterError::InvalidUpstreamServer {
                reason: "missing address".to_string(),
            })?;

        let mut flags = Vec::new();
        let mut parameters = HashMap::new();

        for parameter in rest {
            let Some((key, value)) = parameter.split_once('=') else {
                flags.push(parameter.as_str());
                continue;
            };
            match policy {
                DuplicateKeys::LastWins => {
                    parameters.insert(key, value);
                }
                DuplicateKeys::FirstWins => {
                    parameters.entry(key).or_insert(value);
                }
                DuplicateKeys::Reject => {
                    if parameters.insert(key, value).is_some() {
                        return Err(AdapterError::DuplicateParameter {
                            directive: Self::NAME.to_string(),
                            key: key.to_string(),
                        });
                    }
                }
            }
        }

        tracing::trace!(address = address.as_str(), flags = flags.len(), "adapted upstream server");

        Ok(Self {
            directive,
            address,
            flags,
            parameters,
        })
    }

    /// First parameter: `host:port`, `unix:/path` or a hostname
    pub fn address(&self) -> &'a str {
        self.address
    }

    /// Bare parameters (`down`, `backup`, `resolve`, ...) in source order
    pub fn flags(&self) -> &[&'a str] {
        &self.flags
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| *f == flag)
    }

    /// `key=value` parameters
    pub fn parameters(&self) -> &HashMap<&'a str, &'a str> {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&'a str> {
        self.parameters.get(key).copied()
    }

    pub fn weight(&self) -> Result<Option<u32>, AdapterError> {
        self.parsed("weight")
    }

    pub fn max_fails(&self) -> Result<Option<u32>, AdapterError> {
        self.parsed("max_fails")
    }

    pub fn max_conns(&self) -> Result<Option<u32>, AdapterError> {
        self.parsed("max_conns")
    }

    pub fn fail_timeout(&self) -> Result<Option<Duration>, AdapterError> {
        self.parameter("fail_timeout")
            .map(|value| {
                parse_duration(value).ok_or_else(|| AdapterError::InvalidParameter {
                    key: "fail_timeout".to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    pub fn is_down(&self) -> bool {
        self.has_flag("down")
    }

    pub fn is_backup(&self) -> bool {
        self.has_flag("backup")
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, AdapterError> {
        self.parameter(key)
            .map(|value| {
                value.parse().map_err(|_| AdapterError::InvalidParameter {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }
}

impl<'a> TryFrom<&'a Directive> for UpstreamServer<'a> {
    type Error = AdapterError;

    fn try_from(directive: &'a Directive) -> Result<Self, Self::Error> {
        Self::with_policy(directive, DuplicateKeys::default())
    }
}

impl<'a> DirectiveAdapter<'a> for UpstreamServer<'a> {
    const NAME: &'static str = "server";

    fn directive(&self) -> &'a Directive {
        self.directive
    }
}

impl fmt::Display for UpstreamServer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAME)?;
        for parameter in &self.directive.parameters {
            write!(f, " {}", parameter)?;
        }
        f.write_str(";")
    }
}

/// An `upstream name { ... }` group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream<'a> {
    directive: &'a Directive,
    name: &'a str,
    servers: Vec<UpstreamServer<'a>>,
}

impl<'a> Upstream<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// `server` entries in source order; other children are not part of the view
    pub fn servers(&self) -> &[UpstreamServer<'a>] {
        &self.servers
    }

    /// Servers that are neither `down` nor `backup`
    pub fn primary_servers(&self) -> impl Iterator<Item = &UpstreamServer<'a>> {
        self.servers.iter().filter(|s| !s.is_down() && !s.is_backup())
    }
}

impl<'a> TryFrom<&'a Directive> for Upstream<'a> {
    type Error = AdapterError;

    fn try_from(directive: &'a Directive) -> Result<Self, Self::Error> {
        expect_name(directive, Self::NAME)?;

        let name = match directive.parameters.as_slice() {
            [name] => name.as_str(),
            [] => {
                return Err(AdapterError::InvalidUpstream {
                    reason: "missing group name".to_string(),
                })
            }
            _ => {
                return Err(AdapterError::InvalidUpstream {
                    reason: format!("expected one name, found {}", directive.parameters.len()),
                })
            }
        };

        let block = directive.block.as_ref().ok_or_else(|| AdapterError::InvalidUpstream {
            reason: format!("'{}' has no block", name),
        })?;

        let servers = block
            .directives()
            .filter(|d| d.name == UpstreamServer::NAME)
            .map(UpstreamServer::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::trace!(group = name, servers = servers.len(), "adapted upstream");

        Ok(Self {
            directive,
            name,
            servers,
        })
    }
}

impl<'a> DirectiveAdapter<'a> for Upstream<'a> {
    const NAME: &'static str = "upstream";

    fn directive(&self) -> &'a Directive {
        self.directive
    }
}

impl fmt::Display for Upstream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.directive, f)
    }
}

/// Parse an nginx time value such as `30`, `10s`, `1m30s` or `500ms`
///
/// A bare number is seconds.
fn parse_duration(value: &str) -> Option<Duration> {
    if value.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    let mut rest = value;

    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let amount: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let millis_per_unit = match &rest[..unit_len] {
            "ms" => 1,
            "" | "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            "w" => 604_800_000,
            _ => return None,
        };
        rest = &rest[unit_len..];

        total = total.checked_add(Duration::from_millis(amount.checked_mul(millis_per_unit)?))?;
    }

    Some(total)
}
