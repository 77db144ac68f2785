//! Backing services behind the gateway, modeled as an explicit
//! external-collaborator interface (request in, response out) so the
//! pipeline can be tested without real services. The only in-tree
//! implementation is the development stub, which echoes the request the
//! way the original mock proxy does.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

/// One request forwarded to a backing service.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Value,
}

/// The service's answer, rendered into the response envelope by the gateway.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub data: Value,
}

#[async_trait]
pub trait BackingService: Send + Sync {
    /// Key used in the /api/health services map.
    fn name(&self) -> &'static str;

    /// Current reported health of the service.
    async fn health(&self) -> &'static str;

    /// Forward one request and return the service's response.
    async fn dispatch(&self, req: ProxyRequest) -> ProxyResponse;
}

/// Development stub standing in for a real backing service.
pub struct StubService {
    name: &'static str,
    target: &'static str,
}

impl StubService {
    pub fn new(name: &'static str, target: &'static str) -> Self {
        Self { name, target }
    }
}

#[async_trait]
impl BackingService for StubService {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn health(&self) -> &'static str {
        "healthy"
    }

    async fn dispatch(&self, req: ProxyRequest) -> ProxyResponse {
        ProxyResponse {
            data: json!({
                "message": format!("Mock response from {}", self.target),
                "method": req.method,
                "path": req.path,
                "query": req.query,
                "body": req.body,
            }),
        }
    }
}

/// One mounted path prefix and the service it forwards to.
#[derive(Clone)]
pub struct ServiceRoute {
    /// First path segment under /api, e.g. "punch-lists"
    pub prefix: &'static str,
    /// Whether a valid bearer credential is required
    pub requires_auth: bool,
    pub service: Arc<dyn BackingService>,
}

/// Directory of every backing service and the prefixes routed to them.
pub struct ServiceDirectory {
    services: Vec<Arc<dyn BackingService>>,
    routes: Vec<ServiceRoute>,
}

impl ServiceDirectory {
    /// Directory with the development stubs, mirroring the deployed
    /// service topology. Only /api/auth is reachable unauthenticated.
    pub fn with_stubs() -> Self {
        let auth: Arc<dyn BackingService> =
            Arc::new(StubService::new("auth", "http://auth-service:3001"));
        let projects: Arc<dyn BackingService> =
            Arc::new(StubService::new("projects", "http://project-service:3002"));
        let knowledge: Arc<dyn BackingService> =
            Arc::new(StubService::new("knowledge", "http://knowledge-service:3003"));
        let punchlist: Arc<dyn BackingService> =
            Arc::new(StubService::new("punchlist", "http://punch-list-service:3004"));
        let search: Arc<dyn BackingService> =
            Arc::new(StubService::new("search", "http://search-service:3005"));
        let integrations: Arc<dyn BackingService> =
            Arc::new(StubService::new("integrations", "http://integration-service:3006"));
        let ai: Arc<dyn BackingService> =
            Arc::new(StubService::new("ai", "http://ai-assistant:3007"));

        let services = vec![
            auth.clone(),
            projects.clone(),
            knowledge.clone(),
            punchlist.clone(),
            search.clone(),
            integrations.clone(),
            ai.clone(),
        ];

        let route = |prefix, requires_auth, service: &Arc<dyn BackingService>| ServiceRoute {
            prefix,
            requires_auth,
            service: service.clone(),
        };

        let routes = vec![
            route("auth", false, &auth),
            route("users", true, &auth),
            route("organizations", true, &auth),
            route("projects", true, &projects),
            route("tasks", true, &projects),
            route("knowledge", true, &knowledge),
            route("punch-lists", true, &punchlist),
            route("search", true, &search),
            route("integrations", true, &integrations),
            route("ai-assistant", true, &ai),
            route("files", true, &punchlist),
        ];

        Self { services, routes }
    }

    pub fn routes(&self) -> &[ServiceRoute] {
        &self.routes
    }

    pub fn find_route(&self, prefix: &str) -> Option<&ServiceRoute> {
        self.routes.iter().find(|r| r.prefix == prefix)
    }

    /// Mounted path prefixes, for the /api index endpoint.
    pub fn mounted_prefixes(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| format!("/api/{}", r.prefix))
            .collect()
    }

    /// Health of every backing service, keyed by service name.
    pub async fn service_health(&self) -> BTreeMap<&'static str, &'static str> {
        let mut map = BTreeMap::new();
        for service in &self.services {
            map.insert(service.name(), service.health().await);
        }
        map
    }
}
