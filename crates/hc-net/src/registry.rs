//! Request-to-connection bindings for in-flight and unfinished requests.

use crate::connection::Connection;
use crate::http::RequestId;
use hc_core::ClientError;
use hc_core::ClientResult;
use hc_core::ErrorKind;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Registry {
    bindings: HashMap<RequestId, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the pair. A previous binding for the same request is replaced
    /// and handed back.
    pub fn bind(&mut self, request: RequestId, connection: Connection) -> Option<Connection> {
        self.bindings.insert(request, connection)
    }

    pub fn lookup(&self, request: RequestId) -> ClientResult<Connection> {
        self.bindings
            .get(&request)
            .cloned()
            .ok_or_else(|| not_bound(request))
    }

    pub fn contains(&self, request: RequestId) -> bool {
        self.bindings.contains_key(&request)
    }

    /// Whether `request` is bound to exactly `connection`.
    pub fn is_bound_to(&self, request: RequestId, connection: &Connection) -> bool {
        self.bindings
            .get(&request)
            .is_some_and(|bound| bound.id() == connection.id())
    }

    pub fn unbind(&mut self, request: RequestId) -> Option<Connection> {
        self.bindings.remove(&request)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

pub(crate) fn not_bound(request: RequestId) -> ClientError {
    ClientError::new(
        ErrorKind::NotBound,
        "net.registry.not_bound",
        format!("no connection is bound to {request}"),
    )
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::connection::test_support::loopback_connection;
    use crate::http::HttpRequest;
    use hc_core::ErrorKind;

    #[test]
    fn bind_lookup_unbind() {
        let request = match HttpRequest::get("http://a.test/") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let (connection, _server) = loopback_connection("a.test");
        let mut registry = Registry::new();

        let missing = registry.lookup(request.id());
        assert!(matches!(missing, Err(ref error) if error.kind() == ErrorKind::NotBound));

        assert!(registry.bind(request.id(), connection.clone()).is_none());
        assert!(matches!(registry.lookup(request.id()), Ok(ref c) if c.id() == connection.id()));
        assert!(registry.contains(request.id()));
        assert!(registry.is_bound_to(request.id(), &connection));
        assert_eq!(registry.len(), 1);

        assert!(registry.unbind(request.id()).is_some());
        assert!(registry.unbind(request.id()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn rebinding_replaces_previous_connection() {
        let request = match HttpRequest::get("http://a.test/") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let (first, _s1) = loopback_connection("a.test");
        let (second, _s2) = loopback_connection("a.test");
        let mut registry = Registry::new();

        registry.bind(request.id(), first.clone());
        let replaced = registry.bind(request.id(), second.clone());
        assert!(matches!(replaced, Some(ref c) if c.id() == first.id()));
        assert!(matches!(registry.lookup(request.id()), Ok(ref c) if c.id() == second.id()));
        assert!(!registry.is_bound_to(request.id(), &first));
    }
}
