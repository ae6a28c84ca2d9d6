//! Front-matter parsing

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors raised while reading a post's metadata block
#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("missing front-matter block")]
    Missing,

    #[error("front-matter block is not closed with ---")]
    Unclosed,

    #[error("front-matter is not a key/value mapping")]
    NotAMapping,

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Custom deserializer that accepts any YAML scalar as a string.
///
/// `created: 2024` and `created: 2024-01-15` should both end up as text.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct Scalar;

    impl<'de> Visitor<'de> for Scalar {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number or boolean")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Scalar)
}

/// Metadata of a post
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    #[serde(deserialize_with = "scalar_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_string", alias = "date")]
    pub created: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub excerpt: Option<String>,
    /// Markdown body, when the whole post lives in one YAML document
    #[serde(deserialize_with = "scalar_string")]
    pub content: Option<String>,
}

impl FrontMatter {
    /// Parse a post written entirely as a YAML document
    pub fn from_yaml(content: &str) -> Result<Self, FrontMatterError> {
        if content.trim().is_empty() {
            return Err(FrontMatterError::Missing);
        }

        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if !value.is_mapping() {
            return Err(FrontMatterError::NotAMapping);
        }

        Ok(serde_yaml::from_value(value)?)
    }

    /// Parse `---` delimited front-matter from a markdown file.
    /// Returns (front_matter, remaining_content)
    pub fn parse(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let content = content.trim_start_matches('\u{feff}').trim_start();

        let rest = content
            .strip_prefix("---")
            .ok_or(FrontMatterError::Missing)?;
        let rest = rest.trim_start_matches(['\n', '\r']);

        // An empty block closes immediately
        let (yaml_content, remaining) = if let Some(after) = rest.strip_prefix("---") {
            ("", after)
        } else {
            let end_pos = rest.find("\n---").ok_or(FrontMatterError::Unclosed)?;
            (&rest[..end_pos], &rest[end_pos + 4..]) // Skip \n---
        };
        let remaining = remaining.trim_start_matches(['\n', '\r']);

        let fm = Self::from_yaml(yaml_content)?;
        Ok((fm, remaining))
    }

    /// Parse the creation date string into a DateTime
    pub fn parse_created(&self) -> Option<DateTime<Local>> {
        self.created.as_deref().and_then(parse_date_string)
    }
}

/// Parse a date string in various formats
pub fn parse_date_string(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();

    // RFC 3339 / ISO 8601 with offset
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Local.from_local_datetime(&dt).earliest();
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
    for fmt in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            let dt = d.and_hms_opt(0, 0, 0)?;
            return Local.from_local_datetime(&dt).earliest();
        }
    }

    None
}
