// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-webauth project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Handlers for the routes named in the configuration
//!
//! Resource and protected routes are only known at startup, so they are not
//! declared with route attributes. Each one is a [`Handler`] mounted with
//! [`Route::new`] by [`routes_for`].
//!
//! | Handler            | Configured by                           | Guard                   |
//! |--------------------|-----------------------------------------|-------------------------|
//! | [`ResourceGate`]   | `resources.*` with `on_behalf_of: false` | signed-in session      |
//! | [`OnBehalfOfGate`] | `resources.*` with `on_behalf_of: true`  | bearer token + exchange |
//! | [`ProtectedGate`]  | `protected_routes`                       | bearer token           |

use std::borrow::Cow;

use log::debug;
use rocket::http::{Method, Status};
use rocket::request::Outcome;
use rocket::route::{self, Handler, Route};
use rocket::serde::json::Json;
use rocket::{Data, Request};

use super::guards::SessionHandle;
use super::handlers::{finish, FlowResponse};
use crate::auth::claims::Claims;
use crate::auth::AuthFlow;
use crate::config::Config;
use crate::error::AuthError;

fn managed_flow<'r>(request: &'r Request<'_>) -> Option<&'r AuthFlow> {
    request.rocket().state::<AuthFlow>()
}

fn authorization<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    request.headers().get_one("Authorization")
}

/// Calling page of a resource acquired with the signed-in session
#[derive(Clone)]
pub struct ResourceGate {
    route: String,
}

impl ResourceGate {
    async fn respond(
        &self,
        flow: &AuthFlow,
        handle: &mut SessionHandle<'_>,
    ) -> Result<FlowResponse, AuthError> {
        flow.require_authentication(Some(handle.session()))?;
        let outcome = flow
            .acquire_resource_token(handle.session_mut(), &self.route)
            .await;
        finish(handle, outcome).await
    }
}

#[rocket::async_trait]
impl Handler for ResourceGate {
    async fn handle<'r>(&self, request: &'r Request<'_>, data: Data<'r>) -> route::Outcome<'r> {
        let Some(flow) = managed_flow(request) else {
            return route::Outcome::Error(Status::InternalServerError);
        };
        let mut handle = match request.guard::<SessionHandle<'_>>().await {
            Outcome::Success(handle) => handle,
            Outcome::Error((_, e)) => return route::Outcome::from(request, e),
            Outcome::Forward(status) => return route::Outcome::forward(data, status),
        };
        let response = self.respond(flow, &mut handle).await;
        route::Outcome::from(request, response)
    }
}

/// Calling page of a resource acquired by exchanging the caller's bearer token
#[derive(Clone)]
pub struct OnBehalfOfGate {
    route: String,
}

#[rocket::async_trait]
impl Handler for OnBehalfOfGate {
    async fn handle<'r>(&self, request: &'r Request<'_>, _data: Data<'r>) -> route::Outcome<'r> {
        let Some(flow) = managed_flow(request) else {
            return route::Outcome::Error(Status::InternalServerError);
        };
        let header = authorization(request);
        let response = match flow.require_authorization(header, &self.route).await {
            Ok(_) => flow
                .acquire_on_behalf_of(header, &self.route)
                .await
                .map(Json),
            Err(e) => Err(e),
        };
        route::Outcome::from(request, response)
    }
}

/// Bearer-protected API route answering with the validated claims
#[derive(Clone)]
pub struct ProtectedGate {
    route: String,
}

#[rocket::async_trait]
impl Handler for ProtectedGate {
    async fn handle<'r>(&self, request: &'r Request<'_>, _data: Data<'r>) -> route::Outcome<'r> {
        let Some(flow) = managed_flow(request) else {
            return route::Outcome::Error(Status::InternalServerError);
        };
        let response: Result<Json<Claims>, AuthError> = flow
            .require_authorization(authorization(request), &self.route)
            .await
            .map(|token| Json(token.into_claims()));
        route::Outcome::from(request, response)
    }
}

fn named(mut route: Route, name: String) -> Route {
    route.name = Some(Cow::Owned(name));
    route
}

/// Routes for every configured resource and protected route
pub fn routes_for(config: &Config) -> Vec<Route> {
    let mut routes = Vec::new();

    for (name, resource) in &config.resources {
        let path = resource.calling_page_route.clone();
        let route = if resource.on_behalf_of {
            debug!("Mounting on-behalf-of resource {} at {}", name, path);
            Route::new(Method::Get, &path, OnBehalfOfGate { route: path.clone() })
        } else {
            debug!("Mounting session resource {} at {}", name, path);
            Route::new(Method::Get, &path, ResourceGate { route: path.clone() })
        };
        routes.push(named(route, format!("resource:{}", name)));
    }

    for path in config.protected_routes.keys() {
        debug!("Mounting protected route {}", path);
        let route = Route::new(Method::Get, path, ProtectedGate { route: path.clone() });
        routes.push(named(route, format!("protected:{}", path)));
    }

    routes
}
