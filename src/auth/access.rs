//! Per-action authorization.
//!
//! Handlers never decide permissions themselves. They ask an [`AccessChecker`]
//! through an [`AccessGate`], which is a no-op unless enforcement is enabled.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::RequestContext;
use crate::domain::{ObjectRef, Permission};
use crate::error::{ApiError, ApiResult};
use crate::storage::EvaluationRepository;

/// Decides whether an actor may perform an action.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    /// `Ok(false)` is a denial; `Err` means the decision itself failed.
    async fn check_action_access(
        &self,
        user_id: &str,
        project_id: &str,
        permission: Permission,
        object: Option<&ObjectRef>,
    ) -> ApiResult<bool>;
}

/// Grants permissions from the actor's role in the project.
pub struct ProjectRoleAccessChecker {
    repository: EvaluationRepository,
}

impl ProjectRoleAccessChecker {
    pub fn new(repository: EvaluationRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AccessChecker for ProjectRoleAccessChecker {
    async fn check_action_access(
        &self,
        user_id: &str,
        project_id: &str,
        permission: Permission,
        object: Option<&ObjectRef>,
    ) -> ApiResult<bool> {
        // Unknown objects are judged against the request project; the handler reports the 404.
        if let Some(object) = object {
            if let Some(owner) = self.repository.fetch_object_project(object).await? {
                if owner != project_id {
                    return Ok(false);
                }
            }
        }

        let member = self
            .repository
            .fetch_project_member(project_id, user_id)
            .await?;

        Ok(member.is_some_and(|m| m.role.grants(permission)))
    }
}

/// Runs access checks when enforcement is on.
#[derive(Clone)]
pub struct AccessGate {
    enforce: bool,
    checker: Arc<dyn AccessChecker>,
}

impl AccessGate {
    pub fn new(enforce: bool, checker: Arc<dyn AccessChecker>) -> Self {
        Self { enforce, checker }
    }

    /// Fail with 403 unless the actor holds `permission` on `object` (or the project).
    pub async fn require(
        &self,
        context: &RequestContext,
        permission: Permission,
        object: Option<&ObjectRef>,
    ) -> ApiResult<()> {
        if !self.enforce {
            return Ok(());
        }

        let has_permission = self
            .checker
            .check_action_access(&context.user_id, &context.project_id, permission, object)
            .await
            .map_err(|e| match e {
                ApiError::Forbidden(_) => e,
                other => ApiError::Internal(other.to_string()),
            })?;

        tracing::debug!(
            user_id = %context.user_id,
            project_id = %context.project_id,
            permission = %permission,
            object = ?object,
            has_permission,
            "Access check"
        );

        if has_permission {
            Ok(())
        } else {
            Err(ApiError::permission_denied())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{App, ProjectMember, ProjectRole};
    use crate::storage::test_support::setup_test_db;

    struct FailingChecker;

    #[async_trait]
    impl AccessChecker for FailingChecker {
        async fn check_action_access(
            &self,
            _user_id: &str,
            _project_id: &str,
            _permission: Permission,
            _object: Option<&ObjectRef>,
        ) -> ApiResult<bool> {
            Err(ApiError::Queue("authorization backend unreachable".to_string()))
        }
    }

    async fn checker_with_member(role: ProjectRole) -> (ProjectRoleAccessChecker, EvaluationRepository) {
        let repo = setup_test_db().await;
        repo.upsert_project_member(&ProjectMember {
            project_id: "proj".to_string(),
            user_id: "alice".to_string(),
            role,
        })
        .await
        .unwrap();
        (ProjectRoleAccessChecker::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_role_based_decisions() {
        let (checker, _) = checker_with_member(ProjectRole::Editor).await;

        assert!(checker
            .check_action_access("alice", "proj", Permission::CreateEvaluation, None)
            .await
            .unwrap());
        assert!(!checker
            .check_action_access("alice", "proj", Permission::DeleteEvaluation, None)
            .await
            .unwrap());
        assert!(!checker
            .check_action_access("mallory", "proj", Permission::ViewEvaluation, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_object_in_other_project_is_denied() {
        let (checker, repo) = checker_with_member(ProjectRole::Owner).await;
        let foreign = App::new("other-proj", "theirs");
        repo.insert_app(&foreign).await.unwrap();

        let allowed = checker
            .check_action_access(
                "alice",
                "proj",
                Permission::ViewEvaluation,
                Some(&ObjectRef::app(foreign.id)),
            )
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_gate_skips_checks_when_not_enforced() {
        let gate = AccessGate::new(false, Arc::new(FailingChecker));
        let context = RequestContext::new("alice", "proj");

        assert!(gate
            .require(&context, Permission::DeleteEvaluation, None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_gate_maps_checker_failure_to_internal() {
        let gate = AccessGate::new(true, Arc::new(FailingChecker));
        let context = RequestContext::new("alice", "proj");

        let err = gate
            .require(&context, Permission::ViewEvaluation, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(ref msg) if msg.contains("unreachable")));
    }

    #[tokio::test]
    async fn test_gate_denial_is_forbidden() {
        let (checker, _) = checker_with_member(ProjectRole::Viewer).await;
        let gate = AccessGate::new(true, Arc::new(checker));
        let context = RequestContext::new("alice", "proj");

        let err = gate
            .require(&context, Permission::CreateEvaluation, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), crate::error::PERMISSION_DENIED_MESSAGE);
    }
}
