//! Catalog route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use gundam_store_core::Grade;

use super::ProductView;
use crate::error::{AppError, Result};
use crate::middleware::Caller;
use crate::services::CatalogReader;
use crate::state::AppState;

/// Catalog query parameters.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    /// Grade code; empty or `all` means no filter.
    pub grade: Option<String>,
}

impl ProductQuery {
    fn grade(&self) -> Result<Option<Grade>> {
        self.grade
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty() && !g.eq_ignore_ascii_case("all"))
            .map(str::parse::<Grade>)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))
    }
}

/// A grade filter option.
#[derive(Debug, Serialize)]
pub struct GradeOption {
    pub code: &'static str,
    pub name: &'static str,
    pub label: String,
}

/// Product listing, newest first.
#[instrument(skip(state, caller))]
pub async fn index(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductView>>> {
    let grade = query.grade()?;

    let products = CatalogReader::new(caller.data(), state.cache())
        .list_by_grade(caller.user(), grade)
        .await?;

    Ok(Json(products.into_iter().map(ProductView::from).collect()))
}

/// Every grade with its badge label.
pub async fn grades() -> Json<Vec<GradeOption>> {
    Json(
        Grade::ALL
            .into_iter()
            .map(|grade| GradeOption {
                code: grade.code(),
                name: grade.full_name(),
                label: grade.badge_label(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(grade: Option<&str>) -> ProductQuery {
        ProductQuery {
            grade: grade.map(str::to_string),
        }
    }

    #[test]
    fn test_grade_query_parsing() {
        assert_eq!(query(None).grade().ok().flatten(), None);
        assert_eq!(query(Some("")).grade().ok().flatten(), None);
        assert_eq!(query(Some("ALL")).grade().ok().flatten(), None);
        assert_eq!(query(Some("mg")).grade().ok().flatten(), Some(Grade::MG));
        assert!(matches!(
            query(Some("EG")).grade(),
            Err(AppError::BadRequest(_))
        ));
    }
}
