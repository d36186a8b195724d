//! HTTP request handlers.

use super::types::{
    ConfirmedResponse, EmailLinkQuery, HealthResponse, PhoneLinkQuery, RedirectResponse,
    ResendSmsRequest, SmsCodeRequest, StepResponse, UsernameQuery, UsernameResponse,
};
use super::AppState;
use crate::error::ServerError;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use registration::{
    Reason, RegistrationError, RegistrationForm, ResendRequest, ValidateInfoRequest,
};
use session_store::RegistrationSession;
use tracing::{debug, info};
use validation::ValidationError;

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let sms_gateway_healthy = match &state.sms_gateway {
        Some(gateway) => Some(gateway.health_check().await),
        None => None,
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        active_sessions: state.sessions.session_count().await,
        sms_gateway_healthy,
    })
}

/// Open (or create) the registration session so the client gets a cookie.
pub async fn show_registration_form(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let mut session = state.open_session(&headers).await?;
    let result = match state.orchestrator.show_registration_form(&mut session).await {
        Ok(()) => state.orchestrator.current_step(&session).await,
        Err(e) => Err(e),
    };
    Ok(state.respond(&session, result.map(|step| Json(StepResponse { step }))))
}

/// Current step of the registration behind the cookie.
pub async fn registration_step(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StepResponse>, ServerError> {
    let session = state.open_session(&headers).await?;
    let step = state.orchestrator.current_step(&session).await?;
    Ok(Json(StepResponse { step }))
}

/// Accept personal details and issue the validations they need.
pub async fn validate_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ValidateInfoRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(request) = body.map_err(malformed)?;
    let mut session = state.open_session(&headers).await?;

    let result = state
        .orchestrator
        .validate_info(&mut session, &request)
        .await;
    Ok(state.respond(&session, result.map(|()| StatusCode::CREATED)))
}

/// Final submission of the registration form.
pub async fn process_registration_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RegistrationForm>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(form) = body.map_err(malformed)?;
    let mut session = state.open_session(&headers).await?;

    let result = state
        .orchestrator
        .process_registration_form(&mut session, &form)
        .await;
    Ok(state.respond(
        &session,
        result.map(|redirecturl| Json(RedirectResponse { redirecturl })),
    ))
}

/// Send the pending validations again.
pub async fn resend_validation_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ResendRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(request) = body.map_err(malformed)?;
    let mut session = state.open_session(&headers).await?;

    let result = state
        .orchestrator
        .resend_validation_info(&mut session, &request)
        .await;
    Ok(state.respond(&session, result.map(|()| StatusCode::OK)))
}

/// Poll for the phone confirmation.
pub async fn check_sms_confirmation(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConfirmedResponse>, ServerError> {
    let session = state.open_session(&headers).await?;
    let confirmed = state.orchestrator.check_phone_confirmation(&session).await?;
    Ok(Json(ConfirmedResponse { confirmed }))
}

/// Poll for the email confirmation.
pub async fn check_email_confirmation(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConfirmedResponse>, ServerError> {
    let session = state.open_session(&headers).await?;
    let confirmed = state.orchestrator.check_email_confirmation(&session).await?;
    Ok(Json(ConfirmedResponse { confirmed }))
}

/// SMS code form of the phone confirmation step.
pub async fn confirm_sms_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SmsCodeRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(request) = body.map_err(malformed)?;
    let mut session = state.open_session(&headers).await?;

    let result = state
        .orchestrator
        .confirm_phone(&mut session, &request.smscode)
        .await;
    Ok(state.respond(
        &session,
        result.map(|confirmed| Json(ConfirmedResponse { confirmed })),
    ))
}

/// Send a new SMS code, possibly to a corrected number.
pub async fn resend_sms(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ResendSmsRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(request) = body.map_err(malformed)?;
    let mut session = state.open_session(&headers).await?;

    let result = state
        .orchestrator
        .resend_phone_confirmation(&mut session, &request.phonenumber, &request.langkey)
        .await;
    Ok(state.respond(
        &session,
        result.map(|redirecturl| Json(RedirectResponse { redirecturl })),
    ))
}

/// Check whether a username can be taken.
pub async fn validate_username(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UsernameResponse>, ServerError> {
    let error = state.orchestrator.validate_username(&query.username).await?;
    Ok(Json(UsernameResponse {
        valid: error.is_none(),
        error,
    }))
}

/// Target of the link in the validation SMS.
pub async fn phone_link(
    State(state): State<AppState>,
    Query(query): Query<PhoneLinkQuery>,
) -> Result<Json<ConfirmedResponse>, ServerError> {
    state
        .orchestrator
        .phone_validation()
        .confirm_validation(&query.k, &query.c)
        .await
        .map_err(link_error)?;

    info!("Phone number confirmed through SMS link");
    Ok(Json(ConfirmedResponse { confirmed: true }))
}

/// Target of the link in the validation email.
pub async fn email_link(
    State(state): State<AppState>,
    Query(query): Query<EmailLinkQuery>,
) -> Result<Json<ConfirmedResponse>, ServerError> {
    let username = state
        .orchestrator
        .email_validation()
        .confirm_validation(&query.k)
        .await
        .map_err(link_error)?;

    info!(username = %username, "Email address confirmed through link");
    Ok(Json(ConfirmedResponse { confirmed: true }))
}

fn malformed(rejection: JsonRejection) -> ServerError {
    debug!("Failed to decode request body: {}", rejection);
    ServerError::BadRequest(rejection.body_text())
}

fn link_error(e: ValidationError) -> ServerError {
    match e {
        ValidationError::InvalidCode => RegistrationError::Rejected(Reason::InvalidSmsCode).into(),
        ValidationError::InvalidOrExpiredKey => {
            debug!("Confirmation link with unknown or expired key");
            ServerError::InvalidLink
        }
        other => RegistrationError::Validation(other).into(),
    }
}

impl AppState {
    async fn open_session(&self, headers: &HeaderMap) -> Result<RegistrationSession, ServerError> {
        Ok(self
            .orchestrator
            .open_session(self.cookie.read(headers))
            .await?)
    }

    /// Render `result` and attach the session cookie, on success and failure.
    fn respond<T: IntoResponse>(
        &self,
        session: &RegistrationSession,
        result: Result<T, RegistrationError>,
    ) -> Response {
        let mut response = match result {
            Ok(body) => body.into_response(),
            Err(e) => ServerError::from(e).into_response(),
        };
        if let Some(cookie) = self.cookie.header(&session.key) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        response
    }
}
