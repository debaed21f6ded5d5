//! Response conversion back to the client.

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::dispatch::BackendResponse;

impl IntoResponse for BackendResponse {
    fn into_response(self) -> Response {
        let mut headers = self.headers;
        // Post-processing may have changed the body; hyper recomputes it.
        headers.remove(header::CONTENT_LENGTH);

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}
