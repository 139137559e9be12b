// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Statically routed handlers: sign-in, callback, sign-out, home and `/id`

use log::debug;
use rocket::http::Status;
use rocket::response::{self, Redirect, Responder};
use rocket::serde::json::Json;
use rocket::{get, Request, State};
use serde::Serialize;

use super::guards::{Authenticated, SessionHandle};
use crate::auth::claims::Claims;
use crate::auth::{AuthFlow, CallbackParams, FlowOutcome};
use crate::error::AuthError;

/// Rocket rendering of a [`FlowOutcome`]
///
/// Redirects become `302 Found`, continuations with a resource response are
/// returned as JSON and empty continuations as `204 No Content`.
#[derive(Debug)]
pub struct FlowResponse(pub FlowOutcome);

impl<'r> Responder<'r, 'static> for FlowResponse {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        match self.0 {
            FlowOutcome::Redirect(url) => Redirect::found(url).respond_to(request),
            FlowOutcome::Continue(Some(body)) => Json(body).respond_to(request),
            FlowOutcome::Continue(None) => Status::NoContent.respond_to(request),
        }
    }
}

/// Commit the session, then surface the outcome
///
/// A session minted for a request that failed is dropped instead, so
/// rejected anonymous requests leave nothing in the store.
pub(super) async fn finish(
    handle: &SessionHandle<'_>,
    outcome: Result<FlowOutcome, AuthError>,
) -> Result<FlowResponse, AuthError> {
    if outcome.is_ok() || !handle.is_fresh() {
        handle.commit().await?;
    } else {
        debug!("Not persisting fresh session {} after a failed request", handle.id());
    }
    outcome.map(FlowResponse)
}

#[get("/signin?<state>")]
pub async fn sign_in(
    state: Option<String>,
    handle: Result<SessionHandle<'_>, AuthError>,
    flow: &State<AuthFlow>,
) -> Result<FlowResponse, AuthError> {
    let mut handle = handle?;
    let path = flow.config().settings.sign_in_route();
    let outcome = flow
        .initiate_sign_in(handle.session_mut(), state.as_deref(), &path)
        .await;
    finish(&handle, outcome).await
}

#[get("/redirect?<code>&<state>&<error>&<error_description>")]
pub async fn redirect(
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    handle: Result<SessionHandle<'_>, AuthError>,
    flow: &State<AuthFlow>,
) -> Result<FlowResponse, AuthError> {
    let mut handle = handle?;
    let params = CallbackParams {
        code,
        state,
        error,
        error_description,
    };
    let outcome = flow.handle_callback(handle.session_mut(), &params).await;
    finish(&handle, outcome).await
}

#[get("/signout")]
pub async fn sign_out(
    handle: Result<SessionHandle<'_>, AuthError>,
    flow: &State<AuthFlow>,
) -> Result<FlowResponse, AuthError> {
    let mut handle = handle?;
    let id = handle.id().to_string();
    let outcome = flow.sign_out(&id, handle.session_mut()).await?;
    handle.forget();
    Ok(FlowResponse(outcome))
}

/// Session status reported by the home page
#[derive(Debug, Serialize)]
pub struct HomeStatus {
    pub authenticated: bool,
    pub authorized: bool,
    pub username: Option<String>,
    pub sign_in: String,
}

#[get("/")]
pub async fn home(
    handle: Result<SessionHandle<'_>, AuthError>,
    flow: &State<AuthFlow>,
) -> Result<Json<HomeStatus>, AuthError> {
    let handle = handle?;
    let session = handle.session();
    debug!("Home page, authenticated: {}", session.is_authenticated());
    Ok(Json(HomeStatus {
        authenticated: session.is_authenticated(),
        authorized: session.is_authorized(),
        username: session.account().and_then(|account| account.username.clone()),
        sign_in: flow.config().settings.sign_in_route(),
    }))
}

/// ID-token claims of the signed-in user
#[get("/id")]
pub async fn id(user: Result<Authenticated, AuthError>) -> Result<Json<Claims>, AuthError> {
    Ok(Json(user?.0))
}
