//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Explicit no-match rather than silent default

use std::collections::HashMap;

use url::Url;

use crate::config::{RouteConfig, UpstreamConfig};
use crate::routing::matcher::{Matcher, PathPrefixMatcher};

#[derive(Debug, Clone)]
struct CompiledRoute {
    name: String,
    matcher: PathPrefixMatcher,
    upstream: String,
    base_url: Url,
    require_auth: bool,
    priority: u32,
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub route: String,
    pub upstream: String,
    pub require_auth: bool,
    /// Upstream base URL joined with the original request path.
    pub target_url: Url,
}

/// Frozen route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Compile routes against the configured upstreams.
    ///
    /// Routes naming an unknown upstream are skipped; validation normally
    /// rejects such configs before this point.
    pub fn compile(routes: &[RouteConfig], upstreams: &[UpstreamConfig]) -> Self {
        let bases: HashMap<&str, &str> = upstreams
            .iter()
            .map(|u| (u.name.as_str(), u.base_url.as_str()))
            .collect();

        let mut compiled = Vec::with_capacity(routes.len());
        for route in routes {
            let Some(base) = bases.get(route.upstream.as_str()) else {
                tracing::warn!(route = %route.name, upstream = %route.upstream, "Skipping route with unknown upstream");
                continue;
            };
            let base_url = match Url::parse(base) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(route = %route.name, error = %e, "Skipping route with invalid upstream URL");
                    continue;
                }
            };
            compiled.push(CompiledRoute {
                name: route.name.clone(),
                matcher: PathPrefixMatcher::new(route.path_prefix.clone()),
                upstream: route.upstream.clone(),
                base_url,
                require_auth: route.require_auth,
                priority: route.priority,
            });
        }

        // Higher priority first, then the longest prefix.
        compiled.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.matcher.specificity().cmp(&a.matcher.specificity()))
        });

        tracing::debug!(routes = compiled.len(), "Route table compiled");
        Self { routes: compiled }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route whose prefix matches `path`.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
        let route = self.routes.iter().find(|r| r.matcher.matches(path))?;
        Some(RouteMatch {
            route: route.name.clone(),
            upstream: route.upstream.clone(),
            require_auth: route.require_auth,
            target_url: join(&route.base_url, path),
        })
    }
}

fn join(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let base_path = base.path().trim_end_matches('/');
    url.set_path(&format!("{}{}", base_path, path));
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;

    fn default_table() -> RouteTable {
        let config = GatewayConfig::default();
        RouteTable::compile(&config.routes, &config.upstreams)
    }

    #[test]
    fn public_routes_win_over_protected_prefix() {
        let table = default_table();

        let login = table.match_path("/v1/users/login").unwrap();
        assert_eq!(login.upstream, "users");
        assert!(!login.require_auth);

        let profile = table.match_path("/v1/users/me").unwrap();
        assert_eq!(profile.upstream, "users");
        assert!(profile.require_auth);
    }

    #[test]
    fn target_url_keeps_original_path() {
        let table = default_table();
        let m = table.match_path("/v1/orders/17").unwrap();
        assert_eq!(m.upstream, "orders");
        assert_eq!(m.target_url.as_str(), "http://service_orders:8002/v1/orders/17");
    }

    #[test]
    fn longer_prefix_wins_at_equal_priority() {
        let upstreams = vec![
            UpstreamConfig::new("a", "http://a:1"),
            UpstreamConfig::new("b", "http://b:2/base/"),
        ];
        let routes = vec![
            RouteConfig::protected("short", "/v1", "a"),
            RouteConfig::protected("long", "/v1/reports", "b"),
        ];
        let table = RouteTable::compile(&routes, &upstreams);

        let m = table.match_path("/v1/reports/daily").unwrap();
        assert_eq!(m.route, "long");
        assert_eq!(m.target_url.as_str(), "http://b:2/base/v1/reports/daily");
        assert_eq!(table.match_path("/v1/other").unwrap().route, "short");
    }

    #[test]
    fn unmatched_and_unknown_upstreams() {
        let table = default_table();
        assert!(table.match_path("/v2/anything").is_none());
        assert!(table.match_path("/v1/usersx").is_none());

        let routes = vec![RouteConfig::protected("ghost", "/ghost", "missing")];
        let table = RouteTable::compile(&routes, &[]);
        assert!(table.is_empty());
    }
}
