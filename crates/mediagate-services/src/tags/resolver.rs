use mediagate_core::AppError;
use mediagate_db::TagRepository;
use uuid::Uuid;

/// Lowercases names and drops duplicates, keeping first-seen order.
pub fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !normalized.contains(&name) {
            normalized.push(name);
        }
    }
    normalized
}

/// Resolves tag names to ids in one lookup. All names must exist: otherwise the call
/// fails with `TagNotFound` listing every missing name, and nothing is returned.
pub async fn resolve_tag_ids(
    tags: &mut dyn TagRepository,
    names: &[String],
) -> Result<Vec<Uuid>, AppError> {
    let names = normalize_tag_names(names);
    let found = tags.find_by_names(&names).await?;

    let mut ids = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in &names {
        match found.get(name) {
            Some(id) => ids.push(*id),
            None => missing.push(name.as_str()),
        }
    }

    if !missing.is_empty() {
        return Err(AppError::TagNotFound(missing.join(", ")));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediagate_db::{MemoryUnitOfWork, UnitOfWork};

    #[test]
    fn test_normalize_lowercases_and_dedups() {
        let names = vec!["Sport".to_string(), "sport".to_string(), " Messi ".to_string()];
        assert_eq!(normalize_tag_names(&names), vec!["sport", "messi"]);
    }

    #[tokio::test]
    async fn test_resolve_is_case_insensitive() {
        let uow = MemoryUnitOfWork::new();
        let ids = uow.seed_tags(&["nature", "sport"]).await;

        let resolved = uow
            .execute(|repos| {
                Box::pin(async move {
                    let names = vec!["SPORT".to_string(), "Nature".to_string()];
                    resolve_tag_ids(repos.tags(), &names).await
                })
            })
            .await
            .unwrap();

        assert_eq!(resolved, vec![ids[1], ids[0]]);
    }

    #[tokio::test]
    async fn test_resolve_reports_every_missing_name() {
        let uow = MemoryUnitOfWork::new();
        uow.seed_tags(&["nature"]).await;

        let err = uow
            .execute(|repos| {
                Box::pin(async move {
                    let names = vec![
                        "nature".to_string(),
                        "Beach".to_string(),
                        "night".to_string(),
                    ];
                    resolve_tag_ids(repos.tags(), &names).await
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TagNotFound(missing) if missing == "beach, night"));
    }
}
