//! Phrase collection handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::extract::{AppJson, AppPath, AppQuery};
use crate::AppState;
use phrasebank_common::{
    errors::Result,
    phrase::{ListQuery, NewPhrase, Phrase, PhrasePatch},
};

/// Add a new phrase
pub async fn create_phrase(
    State(state): State<AppState>,
    AppJson(input): AppJson<NewPhrase>,
) -> Result<(StatusCode, Json<Phrase>)> {
    let phrase = state.phrases.create(input).await?;
    Ok((StatusCode::CREATED, Json(phrase)))
}

/// List phrases
pub async fn list_phrases(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<Vec<Phrase>>> {
    Ok(Json(state.phrases.list(query).await?))
}

/// Get a single phrase
pub async fn get_phrase(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Phrase>> {
    Ok(Json(state.phrases.get(id).await?))
}

/// Update a phrase with the supplied attributes
pub async fn update_phrase(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(patch): AppJson<PhrasePatch>,
) -> Result<Json<Phrase>> {
    Ok(Json(state.phrases.update(id, patch).await?))
}

/// Delete a phrase
pub async fn delete_phrase(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode> {
    state.phrases.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
