//! Response post-processing.
//!
//! Steps run in declaration order, each on the previous step's output.
//! The phase is all-or-nothing: the first step that cannot apply aborts it
//! and the caller keeps the untouched backend response.

use axum::body::Bytes;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::PostProcessingStep;
use crate::dispatch::BackendResponse;

#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("invalid header name '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid value for header '{0}'")]
    InvalidHeaderValue(String),

    #[error("response body is not valid JSON: {0}")]
    BodyNotJson(#[source] serde_json::Error),

    #[error("response body is not a JSON object")]
    BodyNotObject,
}

/// Failure of one step, with its position in the list.
#[derive(Debug, Error)]
#[error("post-processing step #{index} failed: {source}")]
pub struct StepFailure {
    pub index: usize,
    #[source]
    pub source: PostProcessError,
}

/// Apply every step to a copy of the response.
pub fn apply_steps(
    response: &BackendResponse,
    steps: &[PostProcessingStep],
) -> Result<BackendResponse, StepFailure> {
    let mut current = response.clone();
    for (index, step) in steps.iter().enumerate() {
        current = apply_step(current, step).map_err(|source| StepFailure { index, source })?;
    }
    Ok(current)
}

fn apply_step(
    mut response: BackendResponse,
    step: &PostProcessingStep,
) -> Result<BackendResponse, PostProcessError> {
    match step {
        PostProcessingStep::SetStatus { code } => {
            response.status =
                StatusCode::from_u16(*code).map_err(|_| PostProcessError::InvalidStatus(*code))?;
        }
        PostProcessingStep::RemoveHeader { name } => {
            let name = header_name(name)?;
            response.headers.remove(&name);
        }
        PostProcessingStep::RenameHeader { from, to } => {
            let from = header_name(from)?;
            let to = header_name(to)?;
            let values: Vec<HeaderValue> = response.headers.get_all(&from).iter().cloned().collect();
            if !values.is_empty() {
                response.headers.remove(&from);
                response.headers.remove(&to);
                for value in values {
                    response.headers.append(to.clone(), value);
                }
            }
        }
        PostProcessingStep::SetHeader { name, value } => {
            let header = header_name(name)?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| PostProcessError::InvalidHeaderValue(name.clone()))?;
            response.headers.insert(header, value);
        }
        PostProcessingStep::SetBodyField { field, value } => {
            let mut object = body_object(&response.body)?;
            object.insert(field.clone(), value.clone());
            set_body(&mut response, object)?;
        }
        PostProcessingStep::RemoveBodyField { field } => {
            let mut object = body_object(&response.body)?;
            object.remove(field);
            set_body(&mut response, object)?;
        }
    }
    Ok(response)
}

fn header_name(name: &str) -> Result<HeaderName, PostProcessError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| PostProcessError::InvalidHeaderName(name.to_string()))
}

fn body_object(body: &[u8]) -> Result<Map<String, Value>, PostProcessError> {
    match serde_json::from_slice(body).map_err(PostProcessError::BodyNotJson)? {
        Value::Object(object) => Ok(object),
        _ => Err(PostProcessError::BodyNotObject),
    }
}

fn set_body(
    response: &mut BackendResponse,
    object: Map<String, Value>,
) -> Result<(), PostProcessError> {
    let body = serde_json::to_vec(&Value::Object(object)).map_err(PostProcessError::BodyNotJson)?;
    response.headers.insert(header::CONTENT_LENGTH, body.len().into());
    response.body = Bytes::from(body);
    Ok(())
}
