//! The Interceptor Chain (§4.2): global QPS → auth → per-user RPM, in that
//! order (auth must run before the per-user filter, since user identity
//! comes from the verified token).
//!
//! Realized as a `tower::Layer`/`Service` pair operating on the raw
//! `http::Request`/`Response` the `tonic` transport hands to it, rather
//! than `tonic::service::Interceptor` — a generated service's `Interceptor`
//! runs before gRPC method routing and has no reliable access to the
//! target method name, but §4.2's skip-list and §4.9's auth-exemption for
//! `GetServerInfo` are both per-method. Operating one layer down, at the
//! HTTP/2 request, gives direct access to `req.uri().path()` (the fully
//! qualified gRPC method name) while still running for every call shape
//! (unary-unary, unary-stream) uniformly, which is the property §4.2
//! actually requires of this stage.

use std::sync::Arc;
use std::task::{Context, Poll};

use tonic::body::Body as TonicBody;
use tonic::Status;
use tower::{Layer, Service};

use crate::auth::{Authenticator, Identity};
use crate::ratelimit::RateLimiters;

#[derive(Clone)]
pub struct GatewayLayer {
    pub auth: Arc<Authenticator>,
    pub limiters: Arc<RateLimiters>,
    pub enable_global_limit: bool,
    pub enable_per_user_limit: bool,
}

impl<S> Layer<S> for GatewayLayer {
    type Service = GatewayMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GatewayMiddleware { inner, layer: self.clone() }
    }
}

#[derive(Clone)]
pub struct GatewayMiddleware<S> {
    inner: S,
    layer: GatewayLayer,
}

impl<S> Service<http::Request<TonicBody>> for GatewayMiddleware<S>
where
    S: Service<http::Request<TonicBody>, Response = http::Response<TonicBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    type Response = http::Response<TonicBody>;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<TonicBody>) -> Self::Future {
        let layer = self.layer.clone();
        let mut inner = self.inner.clone();
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let method = req.uri().path().to_string();
            let exempt = layer.auth.is_exempt(&method);

            if layer.enable_global_limit && !exempt && !layer.limiters.global.try_admit() {
                return Ok(reject(Status::resource_exhausted("rate limit exceeded (global)")));
            }

            let identity: Option<Identity> = if exempt {
                None
            } else {
                let header = req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                match layer.auth.verify(header) {
                    Ok(id) => Some(id),
                    Err(e) => return Ok(reject(Status::unauthenticated(e.to_string()))),
                }
            };

            if let Some(id) = &identity {
                if layer.enable_per_user_limit && !layer.limiters.per_user.try_admit(&id.user_id) {
                    return Ok(reject(Status::resource_exhausted("rate limit exceeded (per-user)")));
                }
                req.extensions_mut().insert(id.clone());
            }

            inner.call(req).await
        })
    }
}

fn reject(status: Status) -> http::Response<TonicBody> {
    status.to_http()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentd_domain::config::{AuthConfig, RateLimitConfig};

    fn test_layer(global_burst: u64) -> GatewayLayer {
        let auth_cfg = AuthConfig { enabled: false, ..AuthConfig::default() };
        let rl_cfg = RateLimitConfig { global_rate_per_sec: 1.0, global_burst, ..RateLimitConfig::default() };
        GatewayLayer {
            auth: Arc::new(Authenticator::new(&auth_cfg, "s".to_string())),
            limiters: Arc::new(RateLimiters::new(&rl_cfg)),
            enable_global_limit: true,
            enable_per_user_limit: true,
        }
    }

    #[test]
    fn exempt_method_bypasses_auth_check_when_auth_is_disabled() {
        let layer = test_layer(10);
        assert!(layer.auth.is_exempt("/agentd.agent.v1.AgentService/GetServerInfo"));
    }

    // §4.9: GetServerInfo must be exempt even with auth enabled and no
    // custom skip_methods override — the default config, not just a
    // disabled-auth deployment, has to carry this.
    #[test]
    fn get_server_info_is_exempt_by_default_with_auth_enabled() {
        let auth = Authenticator::new(&AuthConfig::default(), "s".to_string());
        assert!(auth.is_exempt("agentd.agent.v1.AgentService/GetServerInfo"));
        assert!(!auth.is_exempt("agentd.agent.v1.AgentService/Chat"));
    }

    #[test]
    fn global_limiter_is_shared_across_calls() {
        let layer = test_layer(1);
        assert!(layer.limiters.global.try_admit());
        assert!(!layer.limiters.global.try_admit());
    }
}
