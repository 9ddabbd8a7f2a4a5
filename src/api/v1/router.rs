use super::cookie::REFRESH_COOKIE;
use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::domain_model::*;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Rejection, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cookie_policy = Arc::new(server.cookie_policy.clone());

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let verify_otp = warp::post()
        .and(warp::path("verify-otp"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with(cookie_policy.clone()))
        .and_then(handler::verify_otp);

    let resend_otp = warp::post()
        .and(warp::path("resend-otp"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::resend_otp);

    let refresh_token = warp::post()
        .and(warp::path("refresh-token"))
        .and(warp::path::end())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh_token);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.auth_service.clone()))
        .and(with(cookie_policy))
        .and_then(handler::logout);

    let update_credentials = warp::put()
        .and(warp::path("update-credentials"))
        .and(warp::path::end())
        .and(with_session(server.session_verifier.clone()))
        .and(warp::body::json())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.credential_service.clone()))
        .and_then(handler::update_credentials);

    let me = warp::get()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_session(server.session_verifier.clone()))
        .and_then(handler::me);

    let subject_sessions = warp::get()
        .and(warp::path!("admin" / "subjects" / SubjectId / "sessions"))
        .and(with_admin(server.session_verifier.clone()))
        .and(with(server.refresh_store.clone()))
        .and_then(handler::subject_sessions);

    login
        .or(verify_otp)
        .or(resend_otp)
        .or(refresh_token)
        .or(logout)
        .or(update_credentials)
        .or(me)
        .or(subject_sessions)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Runs the session pipeline on the `Authorization` header.
pub fn with_session(
    session_verifier: Arc<dyn SessionVerifier>,
) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str()).and_then(
        move |authorization: Option<String>| {
            let session_verifier = session_verifier.clone();
            async move {
                session_verifier
                    .verify(authorization.as_deref())
                    .await
                    .map_err(ApiError::from)
                    .map_err(reject::custom)
            }
        },
    )
}

pub fn with_permission(
    session_verifier: Arc<dyn SessionVerifier>,
    permission: &'static str,
) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone {
    with_session(session_verifier).and_then(move |ctx: AuthContext| async move {
        require_permission(&ctx, permission)
            .map(|()| ctx)
            .map_err(ApiError::from)
            .map_err(reject::custom)
    })
}

pub fn with_permissions(
    session_verifier: Arc<dyn SessionVerifier>,
    permissions: &'static [&'static str],
) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone {
    with_session(session_verifier).and_then(move |ctx: AuthContext| async move {
        require_permissions(&ctx, permissions)
            .map(|()| ctx)
            .map_err(ApiError::from)
            .map_err(reject::custom)
    })
}

pub fn with_any_permission(
    session_verifier: Arc<dyn SessionVerifier>,
    permissions: &'static [&'static str],
) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone {
    with_session(session_verifier).and_then(move |ctx: AuthContext| async move {
        require_any_permission(&ctx, permissions)
            .map(|()| ctx)
            .map_err(ApiError::from)
            .map_err(reject::custom)
    })
}

pub fn with_admin(
    session_verifier: Arc<dyn SessionVerifier>,
) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone {
    with_session(session_verifier).and_then(|ctx: AuthContext| async move {
        require_admin(&ctx)
            .map(|()| ctx)
            .map_err(ApiError::from)
            .map_err(reject::custom)
    })
}
