//! Typed binding and validation of request input.

use {
    crate::{
        routing::{Middleware, Next},
        state::{ANY_KEY, PATH_KEY, RequestState, WILDCARD_KEY, request_state},
    },
    axum::{
        Json,
        body::Body,
        response::{IntoResponse, Response},
    },
    http::{Request, StatusCode},
    serde::{Serialize, de::DeserializeOwned},
    serde_json::{Map, Value, json},
    validator::{Validate, ValidationError, ValidationErrors},
};

/// One failed rule, as reported in a 422 body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub rule: String,
    pub message: String,
}

/// Binds the buffered JSON body and the path parameters into a `T`, checks
/// it with [`Validate`] and stores it as a request extension for the links
/// inside, where [`validated`] reads it back.
///
/// Path parameters are laid over the body's top-level fields as strings and
/// win over body values. The wildcard mirrors (`*`, `path`, `any`) only fill
/// fields the body leaves out.
///
/// - Malformed JSON, or input that does not deserialize into `T`, answers
///   `400 {"error":"Invalid JSON format"}`.
/// - Failed rules answer `422 {"status":"error","errors":[{field, rule, message}]}`.
///
/// ```rust
/// use serde::Deserialize;
/// use switchyard::{MatchitEngine, Request, Router, validate, validated};
/// use validator::Validate;
///
/// #[derive(Clone, Deserialize, Validate)]
/// struct NewUser {
///     #[validate(length(min = 3))]
///     name: String,
///     #[serde(default)]
///     org: String,
/// }
///
/// let router = Router::new(MatchitEngine::new());
/// router.post(
///     "/orgs/:org/users",
///     |req: Request| async move {
///         let user = validated::<NewUser, _>(&req).cloned();
///         user.map(|u| format!("{} joined {}", u.name, u.org)).unwrap_or_default()
///     },
///     [validate::<NewUser>()],
/// );
/// ```
pub fn validate<T>() -> Middleware
where
    T: DeserializeOwned + Validate + Clone + Send + Sync + 'static,
{
    Middleware::from_fn(|mut req: Request<Body>, next: Next| async move {
        let state = request_state(&req).cloned().unwrap_or_default();
        match bind::<T>(&state) {
            Ok(value) => {
                req.extensions_mut().insert(value);
                next.run(req).await
            }
            Err(response) => response,
        }
    })
}

/// The value stored by [`validate`] for `T`, if that middleware ran.
pub fn validated<T, B>(req: &Request<B>) -> Option<&T>
where
    T: Send + Sync + 'static,
{
    req.extensions().get::<T>()
}

fn bind<T>(state: &RequestState) -> Result<T, Response>
where
    T: DeserializeOwned + Validate,
{
    let mut document = match state.body() {
        Some(body) if !body.is_empty() => {
            serde_json::from_slice::<Value>(body).map_err(|_| invalid_json())?
        }
        _ => Value::Object(Map::new()),
    };

    if let Value::Object(fields) = &mut document {
        for (key, value) in state.params() {
            let mirror = [WILDCARD_KEY, PATH_KEY, ANY_KEY].contains(&key.as_str());
            if mirror && fields.contains_key(key) {
                continue;
            }
            fields.insert(key.clone(), Value::String(value.clone()));
        }
    }

    let value: T = serde_json::from_value(document).map_err(|err| {
        tracing::debug!(error = %err, "Request input does not bind to the target type");
        invalid_json()
    })?;
    value.validate().map_err(|errors| unprocessable(&errors))?;
    Ok(value)
}

fn invalid_json() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid JSON format" })),
    )
        .into_response()
}

fn unprocessable(errors: &ValidationErrors) -> Response {
    let mut details: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, failures)| {
            let field = field.to_lowercase();
            failures.iter().map(move |failure| FieldError {
                field: field.clone(),
                rule: failure.code.to_string(),
                message: describe(failure),
            })
        })
        .collect();
    details.sort_by(|a, b| (&a.field, &a.rule).cmp(&(&b.field, &b.rule)));

    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "status": "error", "errors": details })),
    )
        .into_response()
}

fn describe(failure: &ValidationError) -> String {
    if let Some(message) = &failure.message {
        return message.to_string();
    }
    match failure.code.as_ref() {
        "required" => "This field is required".to_owned(),
        "email" => "Invalid email format".to_owned(),
        "length" | "range" => match (failure.params.get("min"), failure.params.get("max")) {
            (Some(min), Some(max)) => format!("Length/value must be between {min} and {max}"),
            (Some(min), None) => format!("Minimum length/value is {min}"),
            (None, Some(max)) => format!("Maximum length/value is {max}"),
            (None, None) => format!("Validation failed on rule: {}", failure.code),
        },
        code => format!("Validation failed on rule: {code}"),
    }
}
