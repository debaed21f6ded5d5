//! Pipeline orchestration.
//!
//! # State Machine
//! ```text
//! Received → Matched → Authorized → RateLimited → Rewritten → Dispatched
//!          → PostProcessed → Completed
//!
//! Any non-terminal state → Errored
//! ```
//!
//! # Design Decisions
//! - One snapshot is loaded per request; reloads never tear a request
//! - Authorization precedes rate limiting, so denied callers spend no tokens
//! - Caller identity is read only for rules that require an authority
//! - Tokens are never refunded, even when dispatch fails or is cancelled
//! - Post-processing failures degrade to the unmodified backend response
//! - Terminal errors are logged once, here

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::config::loader::ConfigError;
use crate::config::schema::GatewayConfig;
use crate::discovery::{ServiceResolver, StaticServiceRegistry};
use crate::dispatch::{DispatchError, Dispatcher, HttpDispatcher};
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::pipeline::context::{RequestContext, Stage};
use crate::pipeline::snapshot::RuleSnapshot;
use crate::rewrite::{apply_steps, RequestRewriter, RewriteError};
use crate::security::{Authorizer, Caller, RoleAuthorizer};

/// External capabilities the engine calls but does not implement.
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn ServiceResolver>,
    pub authorizer: Arc<dyn Authorizer>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

impl Collaborators {
    /// Static service map, role-header authorization and a hyper dispatcher.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            resolver: Arc::new(StaticServiceRegistry::from_config(&config.services)),
            authorizer: Arc::new(RoleAuthorizer),
            dispatcher: Arc::new(HttpDispatcher::new(
                Duration::from_secs(config.timeouts.connect_secs),
                config.gateway.max_response_bytes,
            )),
        }
    }
}

pub struct Pipeline {
    snapshot: ArcSwap<RuleSnapshot>,
    generation: AtomicU64,
    authorizer: Arc<dyn Authorizer>,
    rewriter: RequestRewriter,
    dispatcher: Arc<dyn Dispatcher>,
    dispatch_timeout: Duration,
}

impl Pipeline {
    /// Build the engine. Refuses to start on any configuration error.
    pub fn new(config: &GatewayConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        let snapshot = RuleSnapshot::build(config, 1)?;

        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            generation: AtomicU64::new(1),
            authorizer: collaborators.authorizer,
            rewriter: RequestRewriter::new(collaborators.resolver),
            dispatcher: collaborators.dispatcher,
            dispatch_timeout: Duration::from_secs(config.timeouts.request_secs),
        })
    }

    /// Override the dispatch timeout (default: `timeouts.request_secs`).
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// The rule snapshot currently serving requests.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.snapshot.load_full()
    }

    /// Compile a new rule set and swap it in. On error the current rules stay.
    pub fn reload(&self, config: &GatewayConfig) -> Result<u64, ConfigError> {
        let generation = self.generation.load(Ordering::SeqCst) + 1;
        match RuleSnapshot::build(config, generation) {
            Ok(snapshot) => {
                let rules = snapshot.rules.len();
                self.snapshot.store(Arc::new(snapshot));
                self.generation.store(generation, Ordering::SeqCst);
                metrics::record_reload(true);
                tracing::info!(generation, rules, "Rule set reloaded");
                Ok(generation)
            }
            Err(e) => {
                metrics::record_reload(false);
                tracing::error!(error = %e, "Rule reload rejected; keeping current rules");
                Err(e)
            }
        }
    }

    /// Run one request through every stage.
    pub async fn execute(&self, mut ctx: RequestContext) -> RequestContext {
        let snapshot = self.snapshot.load_full();
        let start = Instant::now();

        if let Err(err) = self.run_stages(&snapshot, &mut ctx).await {
            log_failure(&snapshot, &ctx, &err);
            metrics::record_error(err.kind());
            ctx.fail(err);
        }

        let rule_label = ctx
            .rule()
            .map(|r| r.id().to_string())
            .unwrap_or_else(|| "none".to_string());
        let status = match (ctx.error(), ctx.response()) {
            (Some(err), _) => err.status().as_u16(),
            (None, Some(response)) => response.status.as_u16(),
            (None, None) => 500,
        };
        metrics::record_request(&rule_label, ctx.inbound().method.as_str(), status, start);

        ctx
    }

    async fn run_stages(
        &self,
        snapshot: &RuleSnapshot,
        ctx: &mut RequestContext,
    ) -> Result<(), GatewayError> {
        let method = ctx.inbound().method.clone();
        let path = ctx.inbound().uri.path().to_string();

        let rule = snapshot
            .rules
            .match_request(&method, &path)
            .ok_or_else(|| GatewayError::RouteNotFound {
                method: method.to_string(),
                path: path.clone(),
            })?;
        ctx.bind_rule(rule.clone());

        if !rule.authority().is_empty() {
            let caller = Caller::from_headers(&ctx.inbound().headers, &snapshot.authorization)?;
            if !self.authorizer.authorize(&caller, rule.authority()) {
                return Err(GatewayError::Forbidden {
                    required: rule.authority().iter().cloned().collect(),
                });
            }
        }
        ctx.mark(Stage::Authorized);

        if !snapshot.limiters.acquire(&rule) {
            return Err(GatewayError::RateLimited { rule: rule.id().0 });
        }
        ctx.mark(Stage::RateLimited);

        let outbound = self
            .rewriter
            .rewrite(&rule, ctx.inbound())
            .map_err(rewrite_failure)?;
        ctx.set_outbound(outbound.clone());

        tracing::debug!(
            request_id = %ctx.request_id(),
            rule = %rule.id(),
            target = %outbound.url,
            "Dispatching request"
        );

        let response = match tokio::time::timeout(
            self.dispatch_timeout,
            self.dispatcher.dispatch(outbound),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(dispatch_failure(e)),
            Err(_) => return Err(dispatch_failure(DispatchError::Timeout(self.dispatch_timeout))),
        };

        let processed = if rule.post_processing().is_empty() {
            None
        } else {
            match apply_steps(&response, rule.post_processing()) {
                Ok(processed) => Some(processed),
                Err(failure) => {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        rule = %rule.id(),
                        step = failure.index,
                        error = %failure.source,
                        "Post-processing aborted; returning backend response unmodified"
                    );
                    metrics::record_degraded(&rule.id().to_string());
                    None
                }
            }
        };

        ctx.set_response(response);
        if let Some(processed) = processed {
            ctx.replace_response(processed);
        }
        ctx.mark(Stage::PostProcessed);
        ctx.mark(Stage::Completed);
        Ok(())
    }
}

fn rewrite_failure(err: RewriteError) -> GatewayError {
    match err {
        RewriteError::UnresolvedService(service) => GatewayError::BackendUnavailable {
            reason: format!("service '{service}' could not be resolved"),
            timed_out: false,
        },
        other => GatewayError::RewriteFailed(other.to_string()),
    }
}

fn dispatch_failure(err: DispatchError) -> GatewayError {
    match err {
        DispatchError::Unavailable(reason) => GatewayError::BackendUnavailable {
            reason,
            timed_out: false,
        },
        DispatchError::Timeout(_) => GatewayError::BackendUnavailable {
            reason: err.to_string(),
            timed_out: true,
        },
        DispatchError::InvalidResponse(reason) => GatewayError::BackendError(reason),
    }
}

fn log_failure(snapshot: &RuleSnapshot, ctx: &RequestContext, err: &GatewayError) {
    let inbound = ctx.inbound();
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(
            request_id = %ctx.request_id(),
            method = %inbound.method,
            path = %inbound.uri.path(),
            stage = ?ctx.stage(),
            code = err.kind().code(),
            status = status.as_u16(),
            error = %err,
            "Request failed"
        );
    } else {
        tracing::warn!(
            request_id = %ctx.request_id(),
            method = %inbound.method,
            path = %inbound.uri.path(),
            stage = ?ctx.stage(),
            code = err.kind().code(),
            status = status.as_u16(),
            principal = ?inbound
                .headers
                .get(snapshot.authorization.principal_header.as_str())
                .and_then(|v| v.to_str().ok()),
            "Request rejected"
        );
    }
}
