//! Deployment properties and their `key=value` file encoding

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bundle_fs::io;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const KEY_DEPLOYMENT_ID: &str = "deployment.id";
const KEY_BUNDLE_NAME: &str = "bundle.name";
const KEY_BUNDLE_VERSION: &str = "bundle.version";
const KEY_DESCRIPTION: &str = "bundle.description";
const KEY_COMPLIANCE: &str = "destination.compliance";

/// How much of the destination a deployment owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DestinationComplianceMode {
    /// The whole destination directory belongs to the deployment
    #[default]
    Full,
    /// Only the files and directories the deployment lays down belong to it
    FilesAndDirectories,
}

impl DestinationComplianceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::FilesAndDirectories => "filesAndDirectories",
        }
    }
}

impl FromStr for DestinationComplianceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Self::Full),
            "filesAndDirectories" => Ok(Self::FilesAndDirectories),
            other => Err(Error::InvalidProperties {
                message: format!("unknown destination compliance mode '{other}'"),
            }),
        }
    }
}

impl fmt::Display for DestinationComplianceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one deployment revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeploymentProperties {
    pub deployment_id: i32,
    pub bundle_name: String,
    pub bundle_version: String,
    pub description: Option<String>,
    pub destination_compliance: DestinationComplianceMode,
}

impl DeploymentProperties {
    pub fn new(deployment_id: i32, bundle_name: impl Into<String>, bundle_version: impl Into<String>) -> Self {
        Self {
            deployment_id,
            bundle_name: bundle_name.into(),
            bundle_version: bundle_version.into(),
            description: None,
            destination_compliance: DestinationComplianceMode::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_compliance(mut self, mode: DestinationComplianceMode) -> Self {
        self.destination_compliance = mode;
        self
    }

    /// Fail if a required field is empty.
    pub fn validate(&self) -> Result<()> {
        if self.bundle_name.trim().is_empty() {
            return Err(missing(KEY_BUNDLE_NAME));
        }
        if self.bundle_version.trim().is_empty() {
            return Err(missing(KEY_BUNDLE_VERSION));
        }
        Ok(())
    }

    /// Encode as properties text, one key per line in a fixed order.
    pub fn to_properties_string(&self) -> String {
        let mut entries = vec![
            (KEY_DEPLOYMENT_ID, self.deployment_id.to_string()),
            (KEY_BUNDLE_NAME, self.bundle_name.clone()),
            (KEY_BUNDLE_VERSION, self.bundle_version.clone()),
        ];
        if let Some(description) = &self.description {
            entries.push((KEY_DESCRIPTION, description.clone()));
        }
        entries.push((KEY_COMPLIANCE, self.destination_compliance.as_str().to_string()));

        let mut out = String::new();
        for (key, value) in entries {
            out.push_str(&escape(key));
            out.push('=');
            out.push_str(&escape(&value));
            out.push('\n');
        }
        out
    }

    pub fn from_properties_str(text: &str) -> Result<Self> {
        let mut values = parse_properties(text);

        let id_text = values.remove(KEY_DEPLOYMENT_ID).ok_or_else(|| missing(KEY_DEPLOYMENT_ID))?;
        let deployment_id = id_text.trim().parse::<i32>().map_err(|_| Error::InvalidProperties {
            message: format!("{KEY_DEPLOYMENT_ID} is not an integer: '{id_text}'"),
        })?;
        let bundle_name = values.remove(KEY_BUNDLE_NAME).ok_or_else(|| missing(KEY_BUNDLE_NAME))?;
        let bundle_version = values
            .remove(KEY_BUNDLE_VERSION)
            .ok_or_else(|| missing(KEY_BUNDLE_VERSION))?;
        let destination_compliance = match values.remove(KEY_COMPLIANCE) {
            Some(mode) => mode.trim().parse()?,
            None => DestinationComplianceMode::default(),
        };

        let props = Self {
            deployment_id,
            bundle_name,
            bundle_version,
            description: values.remove(KEY_DESCRIPTION),
            destination_compliance,
        };
        props.validate()?;
        Ok(props)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = io::read_text(path)?;
        Self::from_properties_str(&text)
    }

    /// Validate, then write atomically.
    pub fn store(&self, path: &Path) -> Result<()> {
        self.validate()?;
        io::write_text(path, &self.to_properties_string())?;
        Ok(())
    }
}

impl fmt::Display for DeploymentProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (deployment {})",
            self.bundle_name, self.bundle_version, self.deployment_id
        )
    }
}

fn missing(key: &str) -> Error {
    Error::InvalidProperties {
        message: format!("missing required property '{key}'"),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' ' if index == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..index], line[index + 1..].trim_start()),
            ' ' | '\t' => {
                let rest = line[index..].trim_start();
                let rest = rest.strip_prefix(['=', ':']).map(str::trim_start).unwrap_or(rest);
                return (&line[..index], rest);
            }
            _ => {}
        }
    }
    (line, "")
}

fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    let mut lines = text.lines();
    while let Some(raw) = lines.next() {
        let mut line = raw.trim_start().to_string();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        while ends_with_continuation(&line) {
            line.pop();
            match lines.next() {
                Some(next) => line.push_str(next.trim_start()),
                None => break,
            }
        }
        let (key, value) = split_key_value(&line);
        values.insert(unescape(key), unescape(value));
    }
    values
}
