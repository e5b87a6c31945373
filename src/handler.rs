//! Session middleware handler for Salvo

use salvo_core::http::cookie::{self, Cookie};
use salvo_core::prelude::*;

use crate::config::{SameSite, SessionConfig};
use crate::depot_ext::SESSION_KEY;
use crate::id::is_valid_id;
use crate::manager::Manager;
use crate::session::Session;

/// Session middleware for Salvo
///
/// Puts a [`Session`] bound to the client's session id into the depot, runs
/// the rest of the chain, then closes the session. The cookie is sent with
/// every response whose session was used, so its max-age follows the TTL the
/// store just extended.
pub struct SessionHandler {
    manager: Manager,
    config: SessionConfig,
}

impl SessionHandler {
    /// Create a new session handler
    pub fn new(manager: Manager, config: SessionConfig) -> Self {
        Self { manager, config }
    }

    /// Get session ID from cookie, or from the configured header
    fn session_id_from_request(&self, req: &Request) -> Option<String> {
        let from_cookie = req
            .cookie(&self.config.cookie_name)
            .map(|c| c.value().to_string());
        let from_header = || {
            let name = self.config.header_name.as_deref()?;
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let id = from_cookie.or_else(from_header)?;
        if is_valid_id(&id) {
            Some(id)
        } else {
            tracing::debug!(session_id = %id, "ignoring malformed session id");
            None
        }
    }

    /// Set session cookie on response
    fn set_session_cookie(&self, res: &mut Response, session_id: &str) {
        let mut cookie_builder = Cookie::build((self.config.cookie_name.clone(), session_id.to_string()))
            .path(self.config.cookie_path.clone())
            .http_only(self.config.cookie_http_only)
            .secure(self.config.cookie_secure)
            .max_age(cookie::time::Duration::seconds(
                self.manager.ttl().as_secs() as i64,
            ));

        if let Some(domain) = self.config.cookie_domain.clone() {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder = match self.config.cookie_same_site {
            SameSite::Strict => cookie_builder.same_site(cookie::SameSite::Strict),
            SameSite::Lax => cookie_builder.same_site(cookie::SameSite::Lax),
            SameSite::None => cookie_builder.same_site(cookie::SameSite::None),
        };

        res.add_cookie(cookie_builder.build());
    }
}

impl Clone for SessionHandler {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            config: self.config.clone(),
        }
    }
}

#[async_trait]
impl Handler for SessionHandler {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        let incoming = self.session_id_from_request(req);
        let session = self
            .manager
            .new_session(incoming.clone().unwrap_or_default());
        depot.insert(SESSION_KEY, session);

        ctrl.call_next(req, depot, res).await;

        let Ok(mut session) = depot.remove::<Session>(SESSION_KEY) else {
            tracing::warn!("session removed from depot by a downstream handler");
            return;
        };
        if !session.is_started() {
            return;
        }
        if let Err(e) = session.close().await {
            tracing::error!(session_id = %session.current_id(), error = %e, "failed to save session");
            // never hand out an id that was not saved
            if incoming.as_deref() != Some(session.current_id()) {
                return;
            }
        }

        // the server side slid its TTL on close, so slide the cookie with it
        self.set_session_cookie(res, session.current_id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depot_ext::SessionDepotExt;
    use crate::store::testing::{Call, RecordingStore};
    use crate::store::MemoryStore;
    use salvo::http::header::SET_COOKIE;
    use salvo::test::{ResponseExt, TestClient};
    use std::sync::Arc;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(3600);

    #[handler]
    async fn count(depot: &mut Depot) -> String {
        let session = depot.session_mut().unwrap();
        let views: i64 = session.get("views").await.unwrap().unwrap_or(0);
        session.set("views", views + 1).await.unwrap();
        (views + 1).to_string()
    }

    #[handler]
    async fn idle() -> &'static str {
        "idle"
    }

    fn service(manager: Manager, config: SessionConfig) -> Service {
        let router = Router::new()
            .hoop(SessionHandler::new(manager, config))
            .push(Router::with_path("count").get(count))
            .push(Router::with_path("idle").get(idle));
        Service::new(router)
    }

    /// Value and max-age of the session cookie set on the response, if any
    fn session_cookie(res: &Response, name: &str) -> Option<(String, i64)> {
        let header = res.headers().get(SET_COOKIE)?.to_str().ok()?;
        let cookie = Cookie::parse(header.to_string()).ok()?;
        if cookie.name() != name {
            return None;
        }
        let max_age = cookie.max_age().map_or(-1, |d| d.whole_seconds());
        Some((cookie.value().to_string(), max_age))
    }

    async fn get(service: &Service, path: &str, cookie: Option<&str>) -> (String, Option<(String, i64)>) {
        let mut req = TestClient::get(format!("http://127.0.0.1:5800/{}", path));
        if let Some(id) = cookie {
            req = req.add_header("cookie", format!("sessionid={}", id), true);
        }
        let mut res = req.send(service).await;
        let cookie = session_cookie(&res, "sessionid");
        (res.take_string().await.unwrap(), cookie)
    }

    #[tokio::test]
    async fn test_new_session_sets_cookie() {
        let service = service(Manager::new(MemoryStore::new(), TTL), SessionConfig::new());

        let (body, cookie) = get(&service, "count", None).await;
        assert_eq!(body, "1");
        let (id, max_age) = cookie.expect("session cookie");
        assert_eq!(id.len(), 32);
        assert_eq!(max_age, 3600);
    }

    #[tokio::test]
    async fn test_returning_session_sees_data_and_slides_cookie() {
        let service = service(Manager::new(MemoryStore::new(), TTL), SessionConfig::new());
        let (_, cookie) = get(&service, "count", None).await;
        let (id, _) = cookie.unwrap();

        let (body, cookie) = get(&service, "count", Some(&id)).await;
        assert_eq!(body, "2");
        // re-sent with a fresh max-age even though the id is unchanged
        assert_eq!(cookie, Some((id.clone(), 3600)));

        let (body, _) = get(&service, "count", Some(&id)).await;
        assert_eq!(body, "3");
    }

    #[tokio::test]
    async fn test_malformed_cookie_is_ignored() {
        let store = Arc::new(RecordingStore::new(MemoryStore::new()));
        let service = service(Manager::with_store(store.clone(), TTL), SessionConfig::new());

        let (body, cookie) = get(&service, "count", Some("..%2F..%2Fetc")).await;
        assert_eq!(body, "1");
        let (id, _) = cookie.unwrap();
        assert_eq!(id.len(), 32);
        // never looked up
        assert_eq!(store.count(|c| matches!(c, Call::GetSession(..))), 0);
    }

    #[tokio::test]
    async fn test_untouched_session_sends_no_cookie() {
        let store = Arc::new(RecordingStore::new(MemoryStore::new()));
        let service = service(Manager::with_store(store.clone(), TTL), SessionConfig::new());

        let (body, cookie) = get(&service, "idle", Some("abc")).await;
        assert_eq!(body, "idle");
        assert!(cookie.is_none());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_session_id_from_header() {
        let manager = Manager::new(MemoryStore::new(), TTL);
        let config = SessionConfig::new().with_header_name("x-session-id");
        let service = service(manager, config);
        let (_, cookie) = get(&service, "count", None).await;
        let (id, _) = cookie.unwrap();

        let mut res = TestClient::get("http://127.0.0.1:5800/count")
            .add_header("x-session-id", id.as_str(), true)
            .send(&service)
            .await;
        assert_eq!(res.take_string().await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_failed_save_of_new_session_sets_no_cookie() {
        let store = Arc::new(RecordingStore::new(MemoryStore::new()));
        store.fail_writes(true);
        let service = service(Manager::with_store(store.clone(), TTL), SessionConfig::new());

        let (body, cookie) = get(&service, "count", None).await;
        assert_eq!(body, "1");
        assert!(cookie.is_none());
    }
}
