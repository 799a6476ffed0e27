//! "Last modified by" stamps on the objects users touch.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::ObjectType;
use crate::error::{ApiError, ApiResult};
use crate::storage::EvaluationRepository;

/// Record `user_id` as the last modifier of an object.
///
/// Evaluations and variants stamp the app they belong to.
pub async fn update_last_modified_by(
    repository: &EvaluationRepository,
    user_id: &str,
    object_id: &str,
    object_type: ObjectType,
    project_id: &str,
) -> ApiResult<()> {
    let id = Uuid::parse_str(object_id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid {} id: {}", object_type, object_id)))?;
    let now = Utc::now();

    let touched = match object_type {
        ObjectType::App => repository.touch_app(project_id, id, user_id, now).await?,
        ObjectType::Testset => repository.touch_testset(project_id, id, user_id, now).await?,
        ObjectType::Evaluation => {
            match repository.fetch_evaluation_by_id(project_id, id).await? {
                Some(evaluation) => {
                    repository
                        .touch_app(project_id, evaluation.app_id, user_id, now)
                        .await?
                }
                None => false,
            }
        }
        ObjectType::Variant => match repository.fetch_variant_by_id(project_id, id).await? {
            Some(variant) => {
                repository
                    .touch_app(project_id, variant.app_id, user_id, now)
                    .await?
            }
            None => false,
        },
    };

    if !touched {
        return Err(ApiError::NotFound(format!(
            "{} with id {} not found",
            object_type, object_id
        )));
    }

    tracing::debug!(
        user_id,
        object_id,
        object_type = %object_type,
        "Updated last modified by"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{App, EvaluationRecord, Testset};
    use crate::storage::test_support::setup_test_db;

    #[tokio::test]
    async fn test_evaluation_stamps_its_app() {
        let repo = setup_test_db().await;
        let app = App::new("proj", "qa-bot");
        repo.insert_app(&app).await.unwrap();
        let record = EvaluationRecord::initialized(
            "proj",
            app.id,
            Uuid::new_v4(),
            "v1".to_string(),
            Uuid::new_v4(),
            "golden".to_string(),
            vec![],
        );
        repo.insert_evaluation(&record).await.unwrap();

        update_last_modified_by(
            &repo,
            "alice",
            &record.id.to_string(),
            ObjectType::Evaluation,
            "proj",
        )
        .await
        .unwrap();

        let app = repo.fetch_app_by_id("proj", app.id).await.unwrap().unwrap();
        assert_eq!(app.modified_by_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_testset_is_stamped_directly() {
        let repo = setup_test_db().await;
        let testset = Testset::new("proj", "golden", vec![]);
        repo.insert_testset(&testset).await.unwrap();

        update_last_modified_by(&repo, "bob", &testset.id.to_string(), ObjectType::Testset, "proj")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_and_malformed_ids() {
        let repo = setup_test_db().await;

        let err = update_last_modified_by(
            &repo,
            "alice",
            &Uuid::new_v4().to_string(),
            ObjectType::App,
            "proj",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = update_last_modified_by(&repo, "alice", "nope", ObjectType::Evaluation, "proj")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
