//! Route manager (spec §4.7): the fluent surface for installing and
//! toggling routes, kept separate from [`Router`] itself so application
//! code depends on a narrow capability rather than the full resolution API.

use crate::routing::route::{Criteria, Route};
use crate::routing::router::Router;

/// A thin, borrowed fluent front-end over a [`Router`]'s mutation methods.
#[derive(Debug)]
pub struct RouteManager<'r, R> {
    router: &'r Router<R>,
}

impl<'r, R> RouteManager<'r, R> {
    pub fn new(router: &'r Router<R>) -> Self {
        RouteManager { router }
    }

    /// Installs `resource` under `criteria`, returning the new route's id.
    pub fn set(&self, resource: R, criteria: Criteria) -> u64
    where
        R: Clone,
    {
        self.router.insert(resource, criteria)
    }

    /// Enables every route matching `predicate`.
    pub fn enable(&self, predicate: impl Fn(&Route<R>) -> bool)
    where
        R: Clone,
    {
        self.router.set_enabled(predicate, true);
    }

    /// Disables every route matching `predicate`.
    pub fn disable(&self, predicate: impl Fn(&Route<R>) -> bool)
    where
        R: Clone,
    {
        self.router.set_enabled(predicate, false);
    }

    /// Removes every route matching `predicate`, returning how many were
    /// removed.
    pub fn remove(&self, predicate: impl Fn(&Route<R>) -> bool) -> usize
    where
        R: Clone,
    {
        self.router.remove(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn enable_disable_remove_round_trip() {
        let router: Router<&'static str> = Router::new(false);
        let manager = RouteManager::new(&router);
        let id = manager.set("handler", Criteria::new().path("/a").unwrap().method(Method::GET));

        manager.disable(|r| r.id() == id);
        assert!(!router.snapshot()[0].enabled);

        manager.enable(|r| r.id() == id);
        assert!(router.snapshot()[0].enabled);

        let removed = manager.remove(|r| r.id() == id);
        assert_eq!(removed, 1);
        assert!(router.snapshot().is_empty());
    }
}
