//! Project membership and permission types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An action that requires authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewEvaluation,
    CreateEvaluation,
    EditEvaluation,
    DeleteEvaluation,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::ViewEvaluation => write!(f, "view_evaluation"),
            Permission::CreateEvaluation => write!(f, "create_evaluation"),
            Permission::EditEvaluation => write!(f, "edit_evaluation"),
            Permission::DeleteEvaluation => write!(f, "delete_evaluation"),
        }
    }
}

/// Role within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    /// Full access to the project.
    Owner,
    /// Everything an editor can do, plus deletes.
    Admin,
    /// Can run and edit evaluations.
    Editor,
    /// Read-only access.
    Viewer,
}

impl ProjectRole {
    /// Whether this role grants the given permission.
    pub fn grants(&self, permission: Permission) -> bool {
        match self {
            ProjectRole::Owner | ProjectRole::Admin => true,
            ProjectRole::Editor => !matches!(permission, Permission::DeleteEvaluation),
            ProjectRole::Viewer => matches!(permission, Permission::ViewEvaluation),
        }
    }
}

impl std::fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectRole::Owner => write!(f, "owner"),
            ProjectRole::Admin => write!(f, "admin"),
            ProjectRole::Editor => write!(f, "editor"),
            ProjectRole::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for ProjectRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(ProjectRole::Owner),
            "admin" => Ok(ProjectRole::Admin),
            "editor" => Ok(ProjectRole::Editor),
            "viewer" => Ok(ProjectRole::Viewer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Kind of object an audit stamp or access check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    App,
    Variant,
    Testset,
    Evaluation,
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectType::App => write!(f, "app"),
            ObjectType::Variant => write!(f, "variant"),
            ObjectType::Testset => write!(f, "testset"),
            ObjectType::Evaluation => write!(f, "evaluation"),
        }
    }
}

impl std::str::FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "app" => Ok(ObjectType::App),
            "variant" => Ok(ObjectType::Variant),
            "testset" => Ok(ObjectType::Testset),
            "evaluation" => Ok(ObjectType::Evaluation),
            _ => Err(format!("Unknown object type: {}", s)),
        }
    }
}

/// A specific object an access check is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub object_type: ObjectType,
    pub object_id: String,
}

impl ObjectRef {
    pub fn app(id: impl ToString) -> Self {
        Self {
            object_type: ObjectType::App,
            object_id: id.to_string(),
        }
    }

    pub fn evaluation(id: impl ToString) -> Self {
        Self {
            object_type: ObjectType::Evaluation,
            object_id: id.to_string(),
        }
    }
}

/// A user's role in a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMember {
    pub project_id: String,
    pub user_id: String,
    pub role: ProjectRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_grants() {
        assert!(ProjectRole::Viewer.grants(Permission::ViewEvaluation));
        assert!(!ProjectRole::Viewer.grants(Permission::CreateEvaluation));
        assert!(ProjectRole::Editor.grants(Permission::CreateEvaluation));
        assert!(!ProjectRole::Editor.grants(Permission::DeleteEvaluation));
        assert!(ProjectRole::Admin.grants(Permission::DeleteEvaluation));
        assert!(ProjectRole::Owner.grants(Permission::EditEvaluation));
    }

    #[test]
    fn test_object_type_parsing() {
        assert_eq!("Evaluation".parse::<ObjectType>().unwrap(), ObjectType::Evaluation);
        assert!("deployment".parse::<ObjectType>().is_err());
        assert_eq!(ObjectType::Testset.to_string(), "testset");
    }
}
