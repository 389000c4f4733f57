//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Look up the first matching route for a request
//! - Return the matched route plus the stripped path, or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order; overlapping prefixes resolve by order,
//!   not by specificity
//! - Explicit NoMatch rather than silent default

use std::sync::Arc;

use axum::http::Method;

use crate::config::RouteConfig;
use crate::routing::matcher::{InvalidMethodPattern, Matcher, MethodMatcher, PathPrefixMatcher};

/// A compiled route rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Position in the route table, used for logging and metrics labels.
    pub index: usize,
    pub method: MethodMatcher,
    pub path: PathPrefixMatcher,
    /// Target base URL. Parsed at forward time.
    pub target: String,
}

impl Route {
    pub fn new(
        index: usize,
        method: MethodMatcher,
        path_prefix: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            index,
            method,
            path: PathPrefixMatcher::new(path_prefix),
            target: target.into(),
        }
    }

    pub fn path_prefix(&self) -> &str {
        self.path.prefix()
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.matches(method, path) && self.path.matches(method, path)
    }
}

/// Ordered, immutable collection of route rules.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Arc<[Route]>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: routes.into(),
        }
    }

    /// Compile route configs, preserving declaration order.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, InvalidMethodPattern> {
        let routes = configs
            .iter()
            .enumerate()
            .map(|(index, config)| {
                Ok(Route::new(
                    index,
                    MethodMatcher::parse(&config.method)?,
                    config.path_prefix.clone(),
                    config.target.clone(),
                ))
            })
            .collect::<Result<Vec<_>, InvalidMethodPattern>>()?;
        Ok(Self::new(routes))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// The matched route plus the request path with its prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardDecision {
    pub route: Route,
    pub remainder: String,
}

/// Matches requests against a [`RouteTable`].
#[derive(Debug, Clone)]
pub struct Router {
    table: RouteTable,
}

impl Router {
    pub fn new(table: RouteTable) -> Self {
        tracing::info!(routes = table.len(), "Route table compiled");
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Return the first rule matching `method` and `path`, or `None`.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<ForwardDecision> {
        let route = self
            .table
            .routes()
            .iter()
            .find(|route| route.matches(method, path))?;

        let remainder = route.path.strip(path)?;
        Some(ForwardDecision {
            route: route.clone(),
            remainder,
        })
    }
}
