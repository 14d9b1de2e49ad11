use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::classifier::ClassifierError;

/// The 36 disaster-response categories in the column order shared by
/// training, evaluation and inference.
pub const CATEGORY_NAMES: [&str; 36] = [
    "related",
    "request",
    "offer",
    "aid_related",
    "medical_help",
    "medical_products",
    "search_and_rescue",
    "security",
    "military",
    "child_alone",
    "water",
    "food",
    "shelter",
    "clothing",
    "money",
    "missing_people",
    "refugees",
    "death",
    "other_aid",
    "infrastructure_related",
    "transport",
    "buildings",
    "electricity",
    "tools",
    "hospitals",
    "shops",
    "aid_centers",
    "other_infrastructure",
    "weather_related",
    "floods",
    "storm",
    "fire",
    "earthquake",
    "cold",
    "other_weather",
    "direct_report",
];

/// Ordered, duplicate-free list of category names. Column `i` of every label
/// and prediction matrix belongs to `names()[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Categories {
    names: Vec<String>,
}

impl TryFrom<Vec<String>> for Categories {
    type Error = ClassifierError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<Categories> for Vec<String> {
    fn from(categories: Categories) -> Self {
        categories.names
    }
}

impl Categories {
    pub fn new(names: Vec<impl Into<String>>) -> Result<Self, ClassifierError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ClassifierError::configuration("Category list cannot be empty"));
        }
        if let Some(pos) = names.iter().position(|n| n.trim().is_empty()) {
            return Err(ClassifierError::configuration(format!(
                "Category name at column {} cannot be empty",
                pos
            )));
        }
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ClassifierError::configuration(format!(
                    "Duplicate category name '{}'",
                    name
                )));
            }
        }
        Ok(Self { names })
    }

    /// The fixed disaster-response category list.
    pub fn disaster_response() -> Self {
        Self {
            names: CATEGORY_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Fails fast when `other` differs in content or order.
    pub fn ensure_matches(&self, other: &Categories) -> Result<(), ClassifierError> {
        if self == other {
            return Ok(());
        }
        if self.len() != other.len() {
            return Err(ClassifierError::configuration(format!(
                "Category count mismatch: expected {}, found {}",
                self.len(),
                other.len()
            )));
        }
        let (pos, (expected, found)) = self
            .names
            .iter()
            .zip(other.names.iter())
            .enumerate()
            .find(|(_, (a, b))| a != b)
            .ok_or_else(|| ClassifierError::configuration("Category lists differ"))?;
        Err(ClassifierError::configuration(format!(
            "Category mismatch at column {}: expected '{}', found '{}'",
            pos, expected, found
        )))
    }
}

impl Default for Categories {
    fn default() -> Self {
        Self::disaster_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_applies_name_checks() {
        let names: Categories = serde_json::from_str(r#"["water", "food"]"#).unwrap();
        assert_eq!(names.names(), ["water", "food"]);
        assert_eq!(serde_json::to_string(&names).unwrap(), r#"["water","food"]"#);

        assert!(serde_json::from_str::<Categories>(r#"["water", "water"]"#).is_err());
        assert!(serde_json::from_str::<Categories>(r#"["water", " "]"#).is_err());
        assert!(serde_json::from_str::<Categories>("[]").is_err());
    }

    #[test]
    fn test_disaster_response_order() {
        let categories = Categories::disaster_response();
        assert_eq!(categories.len(), 36);
        assert_eq!(categories.index_of("related"), Some(0));
        assert_eq!(categories.index_of("water"), Some(10));
        assert_eq!(categories.name(35), Some("direct_report"));
        assert_eq!(categories.index_of("unknown"), None);
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(Categories::new(vec!["water", "water"]).is_err());
        assert!(Categories::new(vec!["water", ""]).is_err());
        assert!(Categories::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_ensure_matches_reports_first_difference() {
        let expected = Categories::new(vec!["water", "food"]).unwrap();
        let swapped = Categories::new(vec!["food", "water"]).unwrap();
        let err = expected.ensure_matches(&swapped).unwrap_err();
        assert!(err.to_string().contains("column 0"));
        assert!(expected.ensure_matches(&expected.clone()).is_ok());
    }
}
