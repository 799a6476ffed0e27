//! Apps, their variants, and the testsets they are evaluated against.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// An LLM application owned by a project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct App {
    pub id: Uuid,
    pub project_id: String,
    pub app_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    pub fn new(project_id: &str, app_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            app_name: app_name.into(),
            modified_by_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A specific configuration of an app under test.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Variant {
    pub id: Uuid,
    pub app_id: Uuid,
    pub project_id: String,
    pub variant_name: String,
    /// Names of the inputs the variant's prompt expects.
    pub input_names: Vec<String>,
    pub revision: i64,
}

impl Variant {
    pub fn new(app: &App, variant_name: impl Into<String>, input_names: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_id: app.id,
            project_id: app.project_id.clone(),
            variant_name: variant_name.into(),
            input_names,
            revision: 1,
        }
    }
}

/// A testset: rows of column → value.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Testset {
    pub id: Uuid,
    pub project_id: String,
    pub name: String,
    pub csvdata: Vec<HashMap<String, String>>,
}

impl Testset {
    pub fn new(
        project_id: &str,
        name: impl Into<String>,
        csvdata: Vec<HashMap<String, String>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            name: name.into(),
            csvdata,
        }
    }

    /// First input name that some row does not provide, if any.
    pub fn missing_column<'a>(&self, input_names: &'a [String]) -> Option<&'a str> {
        input_names
            .iter()
            .find(|name| self.csvdata.iter().any(|row| !row.contains_key(name.as_str())))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_column() {
        let testset = Testset::new(
            "proj",
            "capitals",
            vec![
                row(&[("country", "France"), ("correct_answer", "Paris")]),
                row(&[("country", "Spain")]),
            ],
        );

        assert_eq!(testset.missing_column(&["country".to_string()]), None);
        assert_eq!(
            testset.missing_column(&["country".to_string(), "language".to_string()]),
            Some("language")
        );
    }

    #[test]
    fn test_variant_inherits_app_project() {
        let app = App::new("proj", "qa-bot");
        let variant = Variant::new(&app, "v1", vec!["question".to_string()]);
        assert_eq!(variant.app_id, app.id);
        assert_eq!(variant.project_id, "proj");
    }
}
