use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{error, instrument};

use super::dto::{DeletedMealResponse, MealDetails, MealForm};
use super::services::{self, MealSubmission, SavedMeal};
use crate::error::MealError;
use crate::images::Upload;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals", post(create_meal))
        .route(
            "/meals/:id",
            get(get_meal).put(update_meal).delete(delete_meal),
        )
        .route("/meals/:id/ingredients/:ingredient_id", delete(remove_ingredient))
        .layer(DefaultBodyLimit::max(4 * 1024 * 1024))
}

/// Multipart body: a `meal` part holding [`MealForm`] JSON and an optional `file` part.
async fn read_submission(mut mp: Multipart) -> Result<MealSubmission, (StatusCode, String)> {
    let mut form: Option<MealForm> = None;
    let mut upload = None;
    while let Some(field) = mp.next_field().await.map_err(bad_request)? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("meal") => {
                let text = field.text().await.map_err(bad_request)?;
                form = Some(serde_json::from_str(&text).map_err(bad_request)?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let body = field.bytes().await.map_err(bad_request)?;
                if !file_name.is_empty() {
                    upload = Some(Upload { file_name, body });
                }
            }
            _ => {}
        }
    }
    let form = form.ok_or((StatusCode::BAD_REQUEST, "meal part is required".to_string()))?;
    Ok(MealSubmission {
        fields: form.fields,
        ingredients: form.ingredients,
        upload,
    })
}

#[instrument(skip(state, mp))]
pub async fn create_meal(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<SavedMeal>), (StatusCode, String)> {
    let sub = read_submission(mp).await?;
    let saved = services::create_meal(&state, sub).await.map_err(reject)?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::try_from(format!("/api/v1/meals/{}", saved.meal.meal_id))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    headers.insert(header::LOCATION, location);
    Ok((StatusCode::CREATED, headers, Json(saved)))
}

#[instrument(skip(state, mp))]
pub async fn update_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    mp: Multipart,
) -> Result<Json<SavedMeal>, (StatusCode, String)> {
    let sub = read_submission(mp).await?;
    let saved = services::update_meal(&state, id, sub).await.map_err(reject)?;
    Ok(Json(saved))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MealDetails>, (StatusCode, String)> {
    let details = services::meal_details(&state, id).await.map_err(reject)?;
    Ok(Json(details))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeletedMealResponse>, (StatusCode, String)> {
    let deleted = services::delete_meal(&state, id).await.map_err(reject)?;
    Ok(Json(deleted.into()))
}

#[instrument(skip(state))]
pub async fn remove_ingredient(
    State(state): State<AppState>,
    Path((id, ingredient_id)): Path<(i64, i64)>,
) -> Result<StatusCode, (StatusCode, String)> {
    match services::remove_ingredient(&state, id, ingredient_id).await.map_err(reject)? {
        0 => Err((StatusCode::NOT_FOUND, "Ingredient not linked to meal".into())),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

fn reject(e: MealError) -> (StatusCode, String) {
    let status = e.status();
    if status.is_server_error() {
        error!(error = %e, "meal request failed");
    }
    (status, e.message())
}

fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}
