//! Method name to handler routing.
//!
//! The dispatcher knows nothing about tenants or collections. It decodes a
//! JSON request into the route's request type, calls the handler and
//! encodes the response.

use crate::error::{ServerError, ServerResult};
use crate::handler::{CallContext, RequestHandler};
use crate::messages::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

type Route = Box<dyn Fn(&RequestHandler, Value, &CallContext) -> ServerResult<Value> + Send + Sync>;

/// Routes RPCs by method name.
#[derive(Default)]
pub struct Dispatcher {
    routes: BTreeMap<Method, Route>,
}

impl Dispatcher {
    /// Creates a dispatcher with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher routing every coordinator RPC.
    pub fn coordinator() -> Self {
        let mut d = Self::new();
        d.route(Method::CreateDatabase, RequestHandler::create_database)
            .route(Method::GetDatabase, RequestHandler::get_database)
            .route(Method::CreateTenant, RequestHandler::create_tenant)
            .route(Method::GetTenant, RequestHandler::get_tenant)
            .route(Method::CreateSegment, RequestHandler::create_segment)
            .route(Method::DeleteSegment, RequestHandler::delete_segment)
            .route(Method::GetSegments, RequestHandler::get_segments)
            .route(Method::UpdateSegment, RequestHandler::update_segment)
            .route(Method::CreateCollection, RequestHandler::create_collection)
            .route(Method::DeleteCollection, RequestHandler::delete_collection)
            .route(Method::GetCollections, RequestHandler::get_collections)
            .route(Method::UpdateCollection, RequestHandler::update_collection)
            .route(Method::ResetState, RequestHandler::reset_state)
            .route(
                Method::GetLastCompactionTimeForTenant,
                RequestHandler::get_last_compaction_time,
            )
            .route(
                Method::SetLastCompactionTimeForTenant,
                RequestHandler::set_last_compaction_time,
            );
        d
    }

    /// Registers `handler` for `method`, replacing any earlier route.
    pub fn route<Req, Resp>(
        &mut self,
        method: Method,
        handler: fn(&RequestHandler, Req, &CallContext) -> ServerResult<Resp>,
    ) -> &mut Self
    where
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
    {
        let route: Route = Box::new(move |h, request, ctx| {
            let request: Req = serde_json::from_value(request)?;
            let response = handler(h, request, ctx)?;
            serde_json::to_value(response)
                .map_err(|e| ServerError::Internal(format!("encoding response: {e}")))
        });
        self.routes.insert(method, route);
        self
    }

    /// Returns the routed methods.
    pub fn methods(&self) -> Vec<Method> {
        self.routes.keys().copied().collect()
    }

    /// Decodes `request`, runs the route for `method` and encodes the response.
    ///
    /// A `null` request is treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMethod` for an unrouted method, `InvalidRequest` if
    /// the request does not decode, or the handler's error.
    pub fn dispatch(
        &self,
        handler: &RequestHandler,
        method: &str,
        request: Value,
        ctx: &CallContext,
    ) -> ServerResult<Value> {
        let route = method
            .parse::<Method>()
            .ok()
            .and_then(|m| self.routes.get(&m))
            .ok_or_else(|| ServerError::UnknownMethod(method.to_string()))?;
        let request = match request {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };
        route(handler, request, ctx)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("methods", &self.methods())
            .finish()
    }
}
