//! Per-request state threaded through the pipeline.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};

use crate::dispatch::{BackendResponse, OutboundRequest};
use crate::error::GatewayError;
use crate::routing::rule::RuleDefinition;

/// Pipeline states. `Errored` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Matched,
    Authorized,
    RateLimited,
    Rewritten,
    Dispatched,
    PostProcessed,
    Completed,
    Errored,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Errored)
    }
}

/// The request as received from the client, body fully buffered.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Everything one request accumulates on its way through the pipeline.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    inbound: InboundRequest,
    stage: Stage,
    rule: Option<Arc<RuleDefinition>>,
    outbound: Option<OutboundRequest>,
    response: Option<BackendResponse>,
    error: Option<GatewayError>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, inbound: InboundRequest) -> Self {
        Self {
            request_id: request_id.into(),
            inbound,
            stage: Stage::Received,
            rule: None,
            outbound: None,
            response: None,
            error: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn inbound(&self) -> &InboundRequest {
        &self.inbound
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn rule(&self) -> Option<&Arc<RuleDefinition>> {
        self.rule.as_ref()
    }

    pub fn outbound(&self) -> Option<&OutboundRequest> {
        self.outbound.as_ref()
    }

    pub fn response(&self) -> Option<&BackendResponse> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&GatewayError> {
        self.error.as_ref()
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(!self.stage.is_terminal(), "advance from terminal stage {:?}", self.stage);
        debug_assert!(next > self.stage, "stage {:?} -> {:?} goes backwards", self.stage, next);
        self.stage = next;
    }

    /// Bind the matched rule. A context holds at most one rule.
    pub(crate) fn bind_rule(&mut self, rule: Arc<RuleDefinition>) {
        debug_assert!(self.rule.is_none(), "rule already bound");
        self.rule = Some(rule);
        self.advance(Stage::Matched);
    }

    pub(crate) fn mark(&mut self, stage: Stage) {
        self.advance(stage);
    }

    pub(crate) fn set_outbound(&mut self, outbound: OutboundRequest) {
        self.outbound = Some(outbound);
        self.advance(Stage::Rewritten);
    }

    pub(crate) fn set_response(&mut self, response: BackendResponse) {
        self.response = Some(response);
        self.advance(Stage::Dispatched);
    }

    pub(crate) fn replace_response(&mut self, response: BackendResponse) {
        self.response = Some(response);
    }

    pub(crate) fn fail(&mut self, error: GatewayError) {
        debug_assert!(!self.stage.is_terminal());
        self.error = Some(error);
        self.stage = Stage::Errored;
    }

    /// Final outcome: the response to send, or the error to render.
    pub fn into_result(self) -> Result<BackendResponse, GatewayError> {
        match (self.error, self.response) {
            (Some(error), _) => Err(error),
            (None, Some(response)) if self.stage == Stage::Completed => Ok(response),
            (None, _) => Err(GatewayError::Unknown(format!(
                "pipeline stopped in stage {:?} without a result",
                self.stage
            ))),
        }
    }
}
