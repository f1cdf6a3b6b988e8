//! The gateway's static route table.
//!
//! Every inbound path the gateway serves is listed in [`gateway_routes`]. The
//! table is compiled once into a [`RouteTable`], which rejects duplicate or
//! conflicting patterns and requires each backend [`Operation`] to be bound by
//! exactly one route. Nothing is registered at runtime.
use std::collections::HashMap;

use axum::http::Method;
use thiserror::Error;

use crate::core::error::GatewayError;

/// Backend domain a proxied route is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Vehicles,
    Accounts,
}

/// A single backend capability the gateway can forward to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListCars,
    ListCarsLimited,
    SearchCars,
    CreateCar,
    UpdateCar,
    DeleteCar,
    AuthCheck,
    Register,
    Login,
    ResetPassword,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::ListCars,
        Operation::ListCarsLimited,
        Operation::SearchCars,
        Operation::CreateCar,
        Operation::UpdateCar,
        Operation::DeleteCar,
        Operation::AuthCheck,
        Operation::Register,
        Operation::Login,
        Operation::ResetPassword,
    ];

    pub const fn domain(self) -> Domain {
        match self {
            Self::ListCars
            | Self::ListCarsLimited
            | Self::SearchCars
            | Self::CreateCar
            | Self::UpdateCar
            | Self::DeleteCar => Domain::Vehicles,
            Self::AuthCheck | Self::Register | Self::Login | Self::ResetPassword => {
                Domain::Accounts
            }
        }
    }

    /// Path on the backend, relative to the domain's base URL.
    /// `{name}` segments are filled from the inbound path parameters.
    pub const fn backend_path(self) -> &'static str {
        match self {
            Self::ListCars => "/api/read/cars",
            Self::ListCarsLimited => "/api/read/cars/{limit}",
            Self::SearchCars => "/api/search/cars",
            Self::CreateCar => "/api/create/car",
            Self::UpdateCar => "/api/update/car/{idCar}",
            Self::DeleteCar => "/api/delete/car/{idCar}",
            Self::AuthCheck => "/api/isAuth",
            Self::Register => "/api/register",
            Self::Login => "/api/login",
            Self::ResetPassword => "/api/user/reset-password",
        }
    }

    /// Whether the inbound body (and its Content-Type) is forwarded.
    pub const fn forwards_body(self) -> bool {
        matches!(
            self,
            Self::CreateCar | Self::UpdateCar | Self::Register | Self::Login | Self::ResetPassword
        )
    }

    /// Whether the inbound query string is copied to the backend.
    pub const fn forwards_query(self) -> bool {
        matches!(self, Self::SearchCars)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ListCars => "vehicles.read_all",
            Self::ListCarsLimited => "vehicles.read_limited",
            Self::SearchCars => "vehicles.search",
            Self::CreateCar => "vehicles.create",
            Self::UpdateCar => "vehicles.update",
            Self::DeleteCar => "vehicles.delete",
            Self::AuthCheck => "accounts.auth_check",
            Self::Register => "accounts.register",
            Self::Login => "accounts.login",
            Self::ResetPassword => "accounts.reset_password",
        }
    }

    /// Client-facing message used when the backend cannot be reached.
    pub const fn failure_message(self) -> &'static str {
        match self {
            Self::ListCars | Self::ListCarsLimited => "Failed to retrieve cars",
            Self::SearchCars => "Failed to search cars",
            Self::CreateCar => "Failed to create car",
            Self::UpdateCar => "Failed to update car",
            Self::DeleteCar => "Failed to delete car",
            Self::AuthCheck => "Failed to verify authentication",
            Self::Register => "Failed to register user",
            Self::Login => "Failed to log in",
            Self::ResetPassword => "Failed to send password reset email",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pages the gateway answers itself without a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalPage {
    /// HTML page linking to a freshly generated item
    Index,
    /// HTML echo of the item slug
    Item,
    /// JSON liveness probe
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    Proxy(Operation),
    Local(LocalPage),
}

/// One entry of the route table. Patterns use `{name}` for path parameters.
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub method: Method,
    pub pattern: &'static str,
    pub protected: bool,
    pub action: RouteAction,
}

impl RouteDefinition {
    fn open(method: Method, pattern: &'static str, action: RouteAction) -> Self {
        Self {
            method,
            pattern,
            protected: false,
            action,
        }
    }

    fn protected(method: Method, pattern: &'static str, action: RouteAction) -> Self {
        Self {
            method,
            pattern,
            protected: true,
            action,
        }
    }
}

/// The complete public surface of the gateway.
pub fn gateway_routes() -> Vec<RouteDefinition> {
    use LocalPage::*;
    use Operation::*;
    use RouteAction::{Local, Proxy};

    vec![
        RouteDefinition::open(Method::GET, "/mostrar/autos", Proxy(ListCars)),
        RouteDefinition::open(
            Method::GET,
            "/mostrar/autoslimite/{limit}",
            Proxy(ListCarsLimited),
        ),
        RouteDefinition::open(Method::GET, "/api/search/cars", Proxy(SearchCars)),
        RouteDefinition::protected(Method::POST, "/crear", Proxy(CreateCar)),
        RouteDefinition::protected(Method::PUT, "/actualizar/{idCar}", Proxy(UpdateCar)),
        RouteDefinition::protected(Method::DELETE, "/eliminar/{idCar}", Proxy(DeleteCar)),
        RouteDefinition::protected(Method::GET, "/api/isAuth", Proxy(AuthCheck)),
        RouteDefinition::open(Method::POST, "/api/register", Proxy(Register)),
        RouteDefinition::open(Method::POST, "/api/login", Proxy(Login)),
        RouteDefinition::open(Method::POST, "/api/user/reset-password", Proxy(ResetPassword)),
        RouteDefinition::open(Method::GET, "/api", Local(Index)),
        RouteDefinition::open(Method::GET, "/api/item/{slug}", Local(Item)),
        RouteDefinition::open(Method::GET, "/health", Local(Health)),
    ]
}

#[derive(Error, Debug)]
pub enum RouteTableError {
    #[error("Route {method} {pattern} is defined more than once")]
    DuplicateRoute { method: Method, pattern: String },

    #[error("Route pattern '{pattern}' conflicts with another route: {reason}")]
    Conflict { pattern: String, reason: String },

    #[error("Backend operation {operation} has no route")]
    UnroutedOperation { operation: Operation },

    #[error("Backend operation {operation} is bound to more than one route")]
    DuplicateOperation { operation: Operation },
}

/// A route resolved for one request. Path parameters are kept as they appeared
/// in the request path until [`RouteMatch::decode_params`] is called.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a RouteDefinition,
    raw_params: Vec<(String, String)>,
}

impl RouteMatch<'_> {
    /// Percent-decode the path parameters.
    pub fn decode_params(&self) -> Result<HashMap<String, String>, GatewayError> {
        let mut params = HashMap::with_capacity(self.raw_params.len());
        for (name, raw) in &self.raw_params {
            let value = urlencoding::decode(raw).map_err(|_| {
                GatewayError::BadRequest(format!("Path parameter '{name}' is not valid UTF-8"))
            })?;
            params.insert(name.clone(), value.into_owned());
        }
        Ok(params)
    }
}

/// Compiled, immutable route table.
pub struct RouteTable {
    routes: Vec<RouteDefinition>,
    /// Route indexes per method, keyed by the pattern's slot in `matcher`
    methods: Vec<Vec<(Method, usize)>>,
    matcher: matchit::Router<usize>,
}

impl RouteTable {
    /// Compile and check a set of route definitions.
    pub fn new(routes: Vec<RouteDefinition>) -> Result<Self, RouteTableError> {
        let mut matcher = matchit::Router::new();
        let mut methods: Vec<Vec<(Method, usize)>> = Vec::new();
        let mut slots: HashMap<&'static str, usize> = HashMap::new();
        let mut bound: HashMap<Operation, usize> = HashMap::new();

        for (index, route) in routes.iter().enumerate() {
            let slot = match slots.get(route.pattern) {
                Some(&slot) => slot,
                None => {
                    let slot = methods.len();
                    matcher
                        .insert(route.pattern, slot)
                        .map_err(|e| RouteTableError::Conflict {
                            pattern: route.pattern.to_string(),
                            reason: e.to_string(),
                        })?;
                    methods.push(Vec::new());
                    slots.insert(route.pattern, slot);
                    slot
                }
            };

            if methods[slot].iter().any(|(m, _)| *m == route.method) {
                return Err(RouteTableError::DuplicateRoute {
                    method: route.method.clone(),
                    pattern: route.pattern.to_string(),
                });
            }
            methods[slot].push((route.method.clone(), index));

            if let RouteAction::Proxy(operation) = route.action {
                *bound.entry(operation).or_default() += 1;
            }
        }

        for operation in Operation::ALL {
            match bound.get(&operation).copied().unwrap_or(0) {
                0 => return Err(RouteTableError::UnroutedOperation { operation }),
                1 => {}
                _ => return Err(RouteTableError::DuplicateOperation { operation }),
            }
        }

        Ok(Self {
            routes,
            methods,
            matcher,
        })
    }

    /// The default gateway table.
    pub fn gateway() -> Result<Self, RouteTableError> {
        Self::new(gateway_routes())
    }

    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    /// Find the route for a method and path.
    ///
    /// Unknown paths yield `NotFound`; a known path with another method yields
    /// `MethodNotAllowed`. Path parameters are not decoded here.
    pub fn lookup(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>, GatewayError> {
        let matched = self
            .matcher
            .at(path)
            .map_err(|_| GatewayError::NotFound(path.to_string()))?;
        let candidates = &self.methods[*matched.value];

        let Some(&(_, index)) = candidates.iter().find(|(m, _)| m == method) else {
            return Err(GatewayError::MethodNotAllowed {
                method: method.clone(),
                allowed: candidates.iter().map(|(m, _)| m.clone()).collect(),
            });
        };

        Ok(RouteMatch {
            route: &self.routes[index],
            raw_params: matched
                .params
                .iter()
                .map(|(name, raw)| (name.to_string(), raw.to_string()))
                .collect(),
        })
    }
}
