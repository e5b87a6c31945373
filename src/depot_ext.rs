//! Extension trait for Depot to easily access sessions

use salvo_core::Depot;
use crate::session::Session;

pub(crate) const SESSION_KEY: &str = "salvo.session.store";

/// Extension trait for Salvo's Depot to provide easy session access
pub trait SessionDepotExt {
    /// Get a reference to the session
    fn session(&self) -> Option<&Session>;

    /// Get the session for reading and writing
    fn session_mut(&mut self) -> Option<&mut Session>;
}

impl SessionDepotExt for Depot {
    fn session(&self) -> Option<&Session> {
        self.get::<Session>(SESSION_KEY).ok()
    }

    fn session_mut(&mut self) -> Option<&mut Session> {
        self.get_mut::<Session>(SESSION_KEY).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Manager;

    #[tokio::test]
    async fn test_depot_access() {
        let mut depot = Depot::new();
        assert!(depot.session().is_none());

        depot.insert(SESSION_KEY, Manager::default().new_session(""));
        let session = depot.session_mut().unwrap();
        session.set("a", 1).await.unwrap();
        assert!(depot.session().unwrap().is_dirty());
    }
}
