use std::fmt::{Display, Formatter};

use super::matcher;

/// A selectable `{label, value}` pair.
///
/// `value` identifies the option and is expected to be unique within one load
/// result; `label` is the text shown to the user.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SelectOption {
    label: String,
    value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// Builds an option whose value is the trimmed, lower-cased label.
    pub fn from_label(label: impl Into<String>) -> Self {
        let label = label.into();
        let value = derive_value(&label);
        Self { label, value }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for SelectOption {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

pub fn make_option(label: &str, value: Option<&str>) -> SelectOption {
    match value {
        Some(value) => SelectOption::new(label, value),
        None => SelectOption::from_label(label),
    }
}

fn derive_value(label: &str) -> String {
    label.trim().to_lowercase()
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OptionGroup {
    pub label: String,
    pub options: Vec<SelectOption>,
}

impl OptionGroup {
    pub fn new(label: impl Into<String>, options: Vec<SelectOption>) -> Self {
        Self {
            label: label.into(),
            options,
        }
    }

    /// Returns the group restricted to options matching `query`, or `None`
    /// when nothing in the group matches.
    pub fn filtered(&self, query: &str) -> Option<Self> {
        let options = matcher::filter_options(&self.options, query);
        (!options.is_empty()).then(|| Self {
            label: self.label.clone(),
            options,
        })
    }
}

pub fn flatten_groups(groups: &[OptionGroup]) -> Vec<SelectOption> {
    groups
        .iter()
        .flat_map(|group| group.options.iter().cloned())
        .collect()
}
