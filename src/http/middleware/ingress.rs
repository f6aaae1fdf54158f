//! Ingress policy middleware.
//! Runs the origin and rate-limit stages and writes their headers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::pipeline::{IngressPipeline, Verdict};
use crate::http::request::RequestContext;
use crate::security::origin::apply_preflight;

/// State required for ingress evaluation.
#[derive(Clone)]
pub struct IngressState {
    pub pipeline: Arc<IngressPipeline>,
    pub trust_forwarded_for: bool,
    pub preflight_max_age_secs: u64,
}

pub async fn ingress_middleware(
    State(state): State<IngressState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_request(&req, state.trust_forwarded_for);

    match state.pipeline.evaluate(&ctx) {
        Verdict::Continue(admission) => {
            req.extensions_mut().insert(ctx);
            let mut response = next.run(req).await;
            admission.apply(response.headers_mut());
            response
        }
        Verdict::Respond(admission) => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            admission.apply(response.headers_mut());
            apply_preflight(
                response.headers_mut(),
                ctx.preflight.as_ref().and_then(|p| p.headers.as_deref()),
                state.preflight_max_age_secs,
            );
            response
        }
        Verdict::Reject { error, admission } => {
            let mut response = error.into_response();
            admission.apply(response.headers_mut());
            response
        }
    }
}
