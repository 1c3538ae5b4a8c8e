use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use tracing::{debug, warn};

use rhea_protocol::{ErrorShape, RegisterParams, ResponseFrame, error_codes, methods};

use crate::{
    registry::{ShardDescriptor, ShardRegistry},
    session::ShardSession,
};

// ── Types ────────────────────────────────────────────────────────────────────

/// Context passed to every method handler.
pub struct MethodContext {
    pub request_id: u64,
    pub method: String,
    pub params: serde_json::Value,
    pub session: Arc<ShardSession>,
    pub registry: Arc<ShardRegistry>,
}

/// The result a method handler produces.
pub type MethodResult = Result<serde_json::Value, ErrorShape>;

/// A boxed async method handler.
pub type HandlerFn =
    Box<dyn Fn(MethodContext) -> Pin<Box<dyn Future<Output = MethodResult> + Send>> + Send + Sync>;

// ── Method registry ──────────────────────────────────────────────────────────

/// Methods exposed on the inter-server endpoint.
pub struct MethodRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            handlers: HashMap::new(),
        };
        reg.register_char_server_methods();
        reg
    }

    pub fn register(&mut self, method: impl Into<String>, handler: HandlerFn) {
        self.handlers.insert(method.into(), handler);
    }

    pub async fn dispatch(&self, ctx: MethodContext) -> ResponseFrame {
        let method = ctx.method.clone();
        let request_id = ctx.request_id;
        let session_id = ctx.session.id;

        let Some(handler) = self.handlers.get(&method) else {
            warn!(method, session_id, "unknown method");
            return ResponseFrame::err(
                request_id,
                ErrorShape::new(
                    error_codes::UNKNOWN_METHOD,
                    format!("unknown method: {method}"),
                ),
            );
        };

        debug!(method, request_id, session_id, "dispatching method");
        match handler(ctx).await {
            Ok(payload) => ResponseFrame::ok(request_id, payload),
            Err(err) => {
                warn!(method, request_id, code = %err.code, msg = %err.message, "method error");
                ResponseFrame::err(request_id, err)
            },
        }
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    // ── CharServer endpoint ──────────────────────────────────────────────

    fn register_char_server_methods(&mut self) {
        // register: one registration per session; calling again replaces it.
        self.register(
            methods::REGISTER,
            Box::new(|ctx| {
                Box::pin(async move {
                    let params: RegisterParams = serde_json::from_value(ctx.params)
                        .map_err(|e| ErrorShape::new(error_codes::INVALID_REQUEST, e.to_string()))?;
                    if params.name.trim().is_empty() {
                        return Err(ErrorShape::new(
                            error_codes::INVALID_REQUEST,
                            "missing shard name",
                        ));
                    }
                    let descriptor = ShardDescriptor::new(params.name, params.address, params.port);

                    let mut current = ctx.session.registration.lock().await;
                    if let Some(id) = *current
                        && ctx.registry.reregister(id, descriptor.clone()).await
                    {
                        return Ok(serde_json::json!(true));
                    }
                    *current = Some(ctx.registry.register(descriptor).await);
                    Ok(serde_json::json!(true))
                })
            }),
        );

        // unregister: drop the caller's own registration, if any.
        self.register(
            methods::UNREGISTER,
            Box::new(|ctx| {
                Box::pin(async move {
                    let taken = ctx.session.registration.lock().await.take();
                    if let Some(id) = taken {
                        ctx.registry.unregister(id).await;
                    }
                    Ok(serde_json::Value::Null)
                })
            }),
        );

        // list: current snapshot, for diagnostics.
        self.register(
            methods::LIST,
            Box::new(|ctx| {
                Box::pin(async move {
                    let shards = ctx.registry.snapshot().await;
                    serde_json::to_value(shards)
                        .map_err(|e| ErrorShape::new(error_codes::UNAVAILABLE, e.to_string()))
                })
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(
        session: &Arc<ShardSession>,
        registry: &Arc<ShardRegistry>,
        method: &str,
        params: serde_json::Value,
    ) -> MethodContext {
        MethodContext {
            request_id: 1,
            method: method.into(),
            params,
            session: Arc::clone(session),
            registry: Arc::clone(registry),
        }
    }

    fn session(id: u64) -> Arc<ShardSession> {
        Arc::new(ShardSession::new(id, ([127, 0, 0, 1], 40000).into()))
    }

    #[tokio::test]
    async fn register_and_unregister_through_session() {
        let reg = MethodRegistry::new();
        let registry = Arc::new(ShardRegistry::new());
        let s = session(1);

        let resp = reg.dispatch(ctx(
                &s,
                &registry,
                methods::REGISTER,
                serde_json::json!({"name": "char01", "address": "10.0.0.5", "port": 6121}),
            ))
            .await;
        assert!(resp.ok);
        assert_eq!(resp.payload, Some(serde_json::json!(true)));
        assert_eq!(registry.snapshot().await, vec![ShardDescriptor::new(
            "char01", "10.0.0.5", 6121
        )]);

        let resp = reg.dispatch(ctx(&s, &registry, methods::UNREGISTER, serde_json::Value::Null))
            .await;
        assert!(resp.ok);
        assert!(registry.snapshot().await.is_empty());

        // Second unregister is a no-op.
        let resp = reg.dispatch(ctx(&s, &registry, methods::UNREGISTER, serde_json::Value::Null))
            .await;
        assert!(resp.ok);
    }

    #[tokio::test]
    async fn repeated_register_in_one_session_replaces() {
        let reg = MethodRegistry::new();
        let registry = Arc::new(ShardRegistry::new());
        let s = session(1);

        for port in [6121, 6122] {
            reg.dispatch(ctx(
                    &s,
                    &registry,
                    methods::REGISTER,
                    serde_json::json!({"name": "char01", "address": "10.0.0.5", "port": port}),
                ))
                .await;
        }
        let shards = registry.snapshot().await;
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].port, 6122);
    }

    #[tokio::test]
    async fn sessions_do_not_touch_each_other() {
        let reg = MethodRegistry::new();
        let registry = Arc::new(ShardRegistry::new());
        let (a, b) = (session(1), session(2));
        let params = serde_json::json!({"name": "char01", "address": "10.0.0.5", "port": 6121});

        reg.dispatch(ctx(&a, &registry, methods::REGISTER, params.clone()))
            .await;
        reg.dispatch(ctx(&b, &registry, methods::REGISTER, params))
            .await;
        assert_eq!(registry.count().await, 2);

        reg.dispatch(ctx(&a, &registry, methods::UNREGISTER, serde_json::Value::Null))
            .await;
        assert_eq!(registry.count().await, 1);
        assert!(b.registration.lock().await.is_some());
    }

    #[tokio::test]
    async fn invalid_params_are_structured_errors() {
        let reg = MethodRegistry::new();
        let registry = Arc::new(ShardRegistry::new());
        let s = session(1);

        let resp = reg.dispatch(ctx(&s, &registry, methods::REGISTER, serde_json::json!({"name": "x"})))
            .await;
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_REQUEST);

        let resp = reg.dispatch(ctx(
                &s,
                &registry,
                methods::REGISTER,
                serde_json::json!({"name": " ", "address": "h", "port": 1}),
            ))
            .await;
        assert!(!resp.ok);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn unknown_method() {
        let reg = MethodRegistry::new();
        let registry = Arc::new(ShardRegistry::new());
        let resp = reg.dispatch(ctx(&session(1), &registry, "CharServer.shutdown", serde_json::Value::Null))
            .await;
        assert_eq!(resp.error.unwrap().code, error_codes::UNKNOWN_METHOD);
    }

    #[tokio::test]
    async fn list_returns_snapshot() {
        let reg = MethodRegistry::new();
        let registry = Arc::new(ShardRegistry::new());
        registry.register(ShardDescriptor::new("char01", "10.0.0.5", 6121)).await;

        let resp = reg.dispatch(ctx(&session(1), &registry, methods::LIST, serde_json::Value::Null))
            .await;
        let shards: Vec<ShardDescriptor> = serde_json::from_value(resp.payload.unwrap()).unwrap();
        assert_eq!(shards, vec![ShardDescriptor::new("char01", "10.0.0.5", 6121)]);
        assert_eq!(reg.method_names(), [
            methods::LIST,
            methods::REGISTER,
            methods::UNREGISTER
        ]);
    }
}
