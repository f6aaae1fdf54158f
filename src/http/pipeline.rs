//! Ordered ingress stages.
//!
//! # Data Flow
//! ```text
//! RequestContext + Admission::default()
//!     → OriginStage     (deny unlisted origins, answer preflights)
//!     → RateLimitStage  (fixed-window budget per client identity)
//!     → Verdict::Continue  → body decoding, telemetry, dispatch
//!       Verdict::Respond   → answered by the ingress (preflight)
//!       Verdict::Reject    → client error, no dispatch
//! ```
//!
//! Each stage is a function from the request context and the admission
//! accumulated so far to a new verdict. Stages run strictly in the order they
//! were added; the first non-`Continue` verdict ends evaluation.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::error::IngressError;
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::security::origin::{CorsGrant, OriginDecision, OriginPolicy};
use crate::security::rate_limit::{FixedWindowLimiter, Quota, RateDecision};

/// Decisions accumulated while a request passes the ingress stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    pub cors: Option<CorsGrant>,
    pub quota: Option<Quota>,
}

impl Admission {
    /// Write every granted header onto a response.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(cors) = &self.cors {
            cors.apply(headers);
        }
        if let Some(quota) = &self.quota {
            quota.apply(headers);
        }
    }
}

/// Result of one stage or of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Proceed to the next stage.
    Continue(Admission),
    /// Answer now without dispatching (CORS preflight).
    Respond(Admission),
    /// Short-circuit with a client error. Headers already granted still apply.
    Reject {
        error: IngressError,
        admission: Admission,
    },
}

/// A single ingress policy step.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &RequestContext, admission: Admission) -> Verdict;
}

/// Origin allow-list enforcement.
pub struct OriginStage {
    policy: OriginPolicy,
}

impl OriginStage {
    pub fn new(policy: OriginPolicy) -> Self {
        Self { policy }
    }
}

impl Stage for OriginStage {
    fn name(&self) -> &'static str {
        "origin"
    }

    fn evaluate(&self, ctx: &RequestContext, mut admission: Admission) -> Verdict {
        match self.policy.evaluate(ctx.origin.as_deref()) {
            OriginDecision::Deny(origin) => {
                tracing::warn!(
                    origin = %origin,
                    client = %ctx.client_identity,
                    path = %ctx.path,
                    "Origin rejected"
                );
                let error = IngressError::OriginRejected { origin };
                metrics::record_rejection(error.kind());
                Verdict::Reject { error, admission }
            }
            OriginDecision::AllowWithCredentials(origin) => {
                admission.cors = Some(CorsGrant { origin });
                if ctx.is_preflight() {
                    Verdict::Respond(admission)
                } else {
                    Verdict::Continue(admission)
                }
            }
            OriginDecision::AllowWithoutCredentials => Verdict::Continue(admission),
        }
    }
}

/// Fixed-window admission control.
pub struct RateLimitStage {
    limiter: Arc<FixedWindowLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<FixedWindowLimiter>) -> Self {
        Self { limiter }
    }
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn evaluate(&self, ctx: &RequestContext, mut admission: Admission) -> Verdict {
        match self.limiter.check(&ctx.client_identity) {
            RateDecision::Admit(quota) => {
                admission.quota = Some(quota);
                Verdict::Continue(admission)
            }
            RateDecision::Reject(quota) => {
                tracing::warn!(
                    client = %ctx.client_identity,
                    limit = quota.limit,
                    "Rate limit exceeded"
                );
                let error = self.limiter.rejection(&quota);
                metrics::record_rejection(error.kind());
                admission.quota = Some(quota);
                Verdict::Reject { error, admission }
            }
        }
    }
}

/// Stages evaluated in insertion order.
#[derive(Clone, Default)]
pub struct IngressPipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl IngressPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Stage names in evaluation order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn evaluate(&self, ctx: &RequestContext) -> Verdict {
        let mut admission = Admission::default();
        for stage in &self.stages {
            match stage.evaluate(ctx, admission) {
                Verdict::Continue(next) => admission = next,
                terminal => {
                    tracing::trace!(stage = stage.name(), "Ingress evaluation ended early");
                    return terminal;
                }
            }
        }
        Verdict::Continue(admission)
    }
}
