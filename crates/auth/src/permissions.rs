use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use f1api_core::PermissionGroupId;

/// Grant to invoke one route with one HTTP method.
///
/// The endpoint is a route template relative to the API base path (e.g.
/// `/users/:id`). Two permissions are the same permission when both the
/// endpoint and the method are equal; stores keep that pair unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    endpoint: Cow<'static, str>,
    method: Cow<'static, str>,
}

impl Permission {
    pub fn new(
        endpoint: impl Into<Cow<'static, str>>,
        method: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Whether this permission covers `method` on `route`.
    ///
    /// Methods compare case-sensitively; routes compare with [`route_matches`].
    pub fn allows(&self, route: &str, method: &str) -> bool {
        self.method() == method && route_matches(self.endpoint(), route)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.method, self.endpoint)
    }
}

/// Literal route comparison tolerating exactly one trailing slash on either side.
///
/// `/users` matches `/users` and `/users/`; `/users/` matches `/users`.
/// Path parameters are not expanded: `/users/:id` only matches the template
/// `/users/:id`, never a concrete `/users/42`.
pub fn route_matches(template: &str, route: &str) -> bool {
    template == route
        || route.strip_suffix('/') == Some(template)
        || template.strip_suffix('/') == Some(route)
}

/// Named collection of permissions.
///
/// Stored for administration only; the authorization decision never consults
/// groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGroup {
    pub id: PermissionGroupId,
    pub name: String,
    pub permissions: Vec<Permission>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_route_matches() {
        assert!(route_matches("/users", "/users"));
        assert!(route_matches("/users/:id", "/users/:id"));
    }

    #[test]
    fn single_trailing_slash_is_tolerated_both_ways() {
        assert!(route_matches("/users", "/users/"));
        assert!(route_matches("/users/", "/users"));
    }

    #[test]
    fn double_trailing_slash_is_not_tolerated() {
        assert!(!route_matches("/users", "/users//"));
        assert!(!route_matches("/users//", "/users"));
    }

    #[test]
    fn path_parameters_are_not_wildcards() {
        assert!(!route_matches("/users/:id", "/users/42"));
        assert!(!route_matches("/users", "/users/42"));
    }

    #[test]
    fn method_comparison_is_case_sensitive() {
        let perm = Permission::new("/users", "GET");
        assert!(perm.allows("/users", "GET"));
        assert!(!perm.allows("/users", "get"));
        assert!(!perm.allows("/users", "DELETE"));
    }

    #[test]
    fn display_reads_method_then_endpoint() {
        assert_eq!(Permission::new("/users/:id", "PUT").to_string(), "PUT /users/:id");
    }

    proptest! {
        #[test]
        fn matches_iff_equal_modulo_one_trailing_slash(
            template in "/[a-z:]{0,6}(/[a-z:]{1,6}){0,2}/?",
            route in "/[a-z:]{0,6}(/[a-z:]{1,6}){0,2}/?",
        ) {
            let expected = template == route
                || format!("{template}/") == route
                || template == format!("{route}/");
            prop_assert_eq!(route_matches(&template, &route), expected);
        }
    }
}
