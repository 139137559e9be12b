// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket request guards binding the session store to the request

use std::sync::Arc;

use base64::Engine;
use log::debug;
use rand::Rng;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome, Request};

use crate::auth::claims::Claims;
use crate::auth::{AuthFlow, Session, SessionStore};
use crate::error::AuthError;

/// Name of the private cookie carrying the session id
pub const SESSION_COOKIE: &str = "webauth_session";

fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn managed_flow<'r>(request: &'r Request<'_>) -> Result<&'r AuthFlow, AuthError> {
    request
        .rocket()
        .state::<AuthFlow>()
        .ok_or_else(|| AuthError::SessionStore("authentication flow is not managed".into()))
}

/// The session of the current request
///
/// The session is loaded from the store using the id in the private
/// [`SESSION_COOKIE`]. A request without a cookie, or whose id is unknown to
/// the store, gets a fresh session under a new id. Changes are only persisted
/// by [`SessionHandle::commit`].
pub struct SessionHandle<'r> {
    id: String,
    session: Session,
    fresh: bool,
    cookies: &'r CookieJar<'r>,
    store: Arc<dyn SessionStore>,
}

impl<'r> SessionHandle<'r> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the session was minted for this request rather than loaded
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Persist the session and (re)issue the session cookie
    pub async fn commit(&self) -> Result<(), AuthError> {
        self.store.save(&self.id, &self.session).await?;
        // Lax so the cookie survives the top-level redirect back from the provider
        let cookie = Cookie::build((SESSION_COOKIE, self.id.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        self.cookies.add_private(cookie);
        Ok(())
    }

    /// Drop the session cookie
    pub fn forget(&self) {
        self.cookies.remove_private(Cookie::from(SESSION_COOKIE));
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionHandle<'r> {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let flow = match managed_flow(request) {
            Ok(flow) => flow,
            Err(e) => return Outcome::Error((Status::InternalServerError, e)),
        };
        let store = flow.sessions().clone();
        let cookies = request.cookies();

        if let Some(id) = cookies
            .get_private(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
        {
            match store.load(&id).await {
                Ok(Some(session)) => {
                    return Outcome::Success(SessionHandle {
                        id,
                        session,
                        fresh: false,
                        cookies,
                        store,
                    })
                }
                Ok(None) => debug!("Session cookie refers to an unknown session, starting over"),
                Err(e) => return Outcome::Error((e.status(), e)),
            }
        }

        Outcome::Success(SessionHandle {
            id: new_session_id(),
            session: Session::new(),
            fresh: true,
            cookies,
            store,
        })
    }
}

/// Request guard succeeding only for signed-in sessions
///
/// Carries the ID-token claims recorded at sign-in.
pub struct Authenticated(pub Claims);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Authenticated {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let handle = match SessionHandle::from_request(request).await {
            Outcome::Success(handle) => handle,
            Outcome::Error(failure) => return Outcome::Error(failure),
            Outcome::Forward(status) => return Outcome::Forward(status),
        };
        let flow = match managed_flow(request) {
            Ok(flow) => flow,
            Err(e) => return Outcome::Error((Status::InternalServerError, e)),
        };

        match flow.require_authentication(Some(handle.session())) {
            Ok(()) => Outcome::Success(Authenticated(handle.session().id_token_claims().clone())),
            Err(e) => Outcome::Error((e.status(), e)),
        }
    }
}
