//! Model mapping utilities between azure_devops_rust_api types and our wire models.
//!
//! The generated SDK models mirror the REST contract field for field, so the
//! bridge goes through `serde_json::Value` instead of hand-written `From`
//! impls for every nested type. Both sides serialize with the service's
//! camelCase names.

use azure_core::http::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::error::ApiError;

/// Converts one of our models into the SDK's generated equivalent.
pub(crate) fn to_sdk<S, T>(model: &'static str, value: &S) -> Result<T, ApiError>
where
    S: Serialize,
    T: DeserializeOwned,
{
    convert(model, value)
}

/// Converts an SDK model into our wire model.
pub(crate) fn from_sdk<S, T>(model: &'static str, value: &S) -> Result<T, ApiError>
where
    S: Serialize,
    T: DeserializeOwned,
{
    convert(model, value)
}

fn convert<S, T>(model: &'static str, value: &S) -> Result<T, ApiError>
where
    S: Serialize,
    T: DeserializeOwned,
{
    let json = serde_json::to_value(value).map_err(|e| ApiError::Conversion {
        model,
        message: e.to_string(),
    })?;
    serde_json::from_value(json).map_err(|e| ApiError::Conversion {
        model,
        message: e.to_string(),
    })
}

/// Whether an SDK error is the service's 404 answer.
pub(crate) fn is_not_found(err: &azure_core::Error) -> bool {
    err.http_status() == Some(StatusCode::NotFound)
}

/// Extracts the organization name from an organization service URL.
///
/// Accepts `https://dev.azure.com/<org>[/...]` and the legacy
/// `https://<org>.visualstudio.com[/...]` form.
pub fn organization_from_url(org_service_url: &str) -> Result<String, ApiError> {
    let invalid = || ApiError::InvalidOrganizationUrl {
        url: org_service_url.to_string(),
    };

    let url = Url::parse(org_service_url.trim()).map_err(|_| invalid())?;
    let host = url.host_str().ok_or_else(invalid)?.to_ascii_lowercase();

    let organization = if host == "dev.azure.com" {
        url.path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string)
            .unwrap_or_default()
    } else if let Some(org) = host.strip_suffix(".visualstudio.com") {
        org.to_string()
    } else {
        return Err(invalid());
    };

    if organization.is_empty() {
        return Err(invalid());
    }
    Ok(organization)
}
