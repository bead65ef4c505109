// src/models/selectors.rs

//! Declarative field-to-selector mapping for DOM extraction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A field of a job posting that a selector can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobField {
    Title,
    Company,
    Location,
    Description,
    Url,
}

impl JobField {
    /// All fields, in the order they are reported.
    pub const ALL: [JobField; 5] = [
        JobField::Title,
        JobField::Company,
        JobField::Location,
        JobField::Description,
        JobField::Url,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobField::Title => "title",
            JobField::Company => "company",
            JobField::Location => "location",
            JobField::Description => "description",
            JobField::Url => "url",
        }
    }
}

impl fmt::Display for JobField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a value is read out of a matched element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Extract {
    /// Concatenated text nodes
    #[default]
    Text,
    /// Inner HTML (markup is stripped later by the normalizer)
    Html,
    /// Value of the named attribute
    Attr(String),
}

impl TryFrom<String> for Extract {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim() {
            "text" => Ok(Extract::Text),
            "html" => Ok(Extract::Html),
            other => match other.strip_prefix("attr:") {
                Some(name) if !name.trim().is_empty() => Ok(Extract::Attr(name.trim().to_string())),
                _ => Err(format!(
                    "unknown extract mode '{other}' (expected text, html or attr:<name>)"
                )),
            },
        }
    }
}

impl From<Extract> for String {
    fn from(value: Extract) -> Self {
        match value {
            Extract::Text => "text".to_string(),
            Extract::Html => "html".to_string(),
            Extract::Attr(name) => format!("attr:{name}"),
        }
    }
}

/// One entry of the field mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSelector {
    /// Field populated by this selector
    pub field: JobField,

    /// CSS selector, evaluated inside a card or the whole document
    pub selector: String,

    /// Read mode for the matched element(s)
    #[serde(default)]
    pub extract: Extract,

    /// Join every match instead of taking the first
    #[serde(default)]
    pub multiple: bool,

    /// Separator used when `multiple` is set
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    ", ".to_string()
}

impl FieldSelector {
    pub fn new(field: JobField, selector: impl Into<String>) -> Self {
        Self {
            field,
            selector: selector.into(),
            extract: Extract::Text,
            multiple: false,
            separator: default_separator(),
        }
    }

    pub fn extract(mut self, extract: Extract) -> Self {
        self.extract = extract;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// Selectors used by the DOM fallback extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Selector for each repeated result card on a listing page
    #[serde(default = "default_card")]
    pub card: Option<String>,

    /// Field mapping applied within each card (or the whole document)
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldSelector>,
}

fn default_card() -> Option<String> {
    Some("div.srpResultCardContainer".to_string())
}

fn default_fields() -> Vec<FieldSelector> {
    vec![
        FieldSelector::new(JobField::Title, "div.text-content-primary.md\\!text-2xl"),
        FieldSelector::new(
            JobField::Company,
            "div.text-content-secondary.md\\!text-content-primary span",
        ),
        FieldSelector::new(JobField::Location, "div.text-content-primary.flex.gap-4 a").multiple(),
        FieldSelector::new(JobField::Description, "#jobDescription").extract(Extract::Html),
        FieldSelector::new(JobField::Url, "a[href]").extract(Extract::Attr("href".to_string())),
    ]
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: default_card(),
            fields: default_fields(),
        }
    }
}

impl SelectorConfig {
    /// Selectors configured for a field, in declaration order.
    #[cfg(test)]
    pub(crate) fn for_field(&self, field: JobField) -> impl Iterator<Item = &FieldSelector> {
        self.fields.iter().filter(move |f| f.field == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_parse() {
        assert_eq!(Extract::try_from("text".to_string()), Ok(Extract::Text));
        assert_eq!(Extract::try_from("html".to_string()), Ok(Extract::Html));
        assert_eq!(
            Extract::try_from("attr:href".to_string()),
            Ok(Extract::Attr("href".to_string()))
        );
        assert!(Extract::try_from("attr:".to_string()).is_err());
        assert!(Extract::try_from("inner".to_string()).is_err());
    }

    #[test]
    fn test_field_mapping_from_toml() {
        let toml_str = r#"
            card = "li.result"

            [[fields]]
            field = "title"
            selector = "h2"

            [[fields]]
            field = "location"
            selector = "span.loc"
            multiple = true
            separator = " / "

            [[fields]]
            field = "url"
            selector = "a"
            extract = "attr:data-href"
        "#;
        let config: SelectorConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.card.as_deref(), Some("li.result"));
        assert_eq!(config.fields.len(), 3);
        let loc = config.for_field(JobField::Location).next().unwrap();
        assert!(loc.multiple);
        assert_eq!(loc.separator, " / ");
        let url = config.for_field(JobField::Url).next().unwrap();
        assert_eq!(url.extract, Extract::Attr("data-href".to_string()));
    }

    #[test]
    fn test_default_maps_title() {
        let config = SelectorConfig::default();
        assert!(config.for_field(JobField::Title).next().is_some());
    }
}
