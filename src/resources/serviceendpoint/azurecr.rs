//! Azure Container Registry service endpoint (`azuredevops_serviceendpoint_azurecr`).

use serde_json::json;
use std::collections::BTreeMap;

use super::{
    ServiceEndpointCrudArgs, ServiceEndpointResource, base_expand, base_flatten,
    gen_base_service_endpoint_resource,
};
use crate::error::MappingError;
use crate::models::{EndpointAuthorization, ServiceEndpoint};
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeType, Schema, Validator};

pub const RESOURCE_TYPE: &str = "azuredevops_serviceendpoint_azurecr";

const ENDPOINT_TYPE: &str = "dockerregistry";
const REGISTRY_TYPE: &str = "ACR";

const AUTH_SCHEME: &str = "service_endpoint_authentication_scheme";
const TENANT_ID: &str = "azurecr_spn_tenantid";
const SUBSCRIPTION_ID: &str = "azurecr_subscription_id";
const SUBSCRIPTION_NAME: &str = "azurecr_subscription_name";
const RESOURCE_GROUP: &str = "resource_group";
const REGISTRY_NAME: &str = "azurecr_name";
const SERVICE_PRINCIPAL_ID: &str = "service_principal_id";
const WIF_ISSUER: &str = "workload_identity_federation_issuer";
const WIF_SUBJECT: &str = "workload_identity_federation_subject";

const SCHEME_SERVICE_PRINCIPAL: &str = "ServicePrincipal";
const SCHEME_WORKLOAD_IDENTITY: &str = "WorkloadIdentityFederation";
const SCHEME_MANAGED_IDENTITY: &str = "ManagedServiceIdentity";

pub fn resource() -> ServiceEndpointResource {
    gen_base_service_endpoint_resource(
        RESOURCE_TYPE,
        ServiceEndpointCrudArgs {
            flatten_func: flatten,
            expand_func: expand,
        },
    )
    .with_attributes(schema())
}

fn schema() -> Schema {
    let required = || Attribute::required(AttributeType::String).validate(Validator::StringIsNotEmpty);

    Schema::new()
        .with(
            AUTH_SCHEME,
            Attribute::optional(AttributeType::String)
                .with_default(json!(SCHEME_SERVICE_PRINCIPAL))
                .validate(Validator::one_of(&[
                    SCHEME_SERVICE_PRINCIPAL,
                    SCHEME_WORKLOAD_IDENTITY,
                    SCHEME_MANAGED_IDENTITY,
                ]))
                .force_new(),
        )
        .with(TENANT_ID, required().force_new())
        .with(SUBSCRIPTION_ID, required().force_new())
        .with(SUBSCRIPTION_NAME, required().force_new())
        .with(RESOURCE_GROUP, required().force_new())
        .with(REGISTRY_NAME, required().force_new())
        .with(SERVICE_PRINCIPAL_ID, Attribute::computed(AttributeType::String))
        .with(WIF_ISSUER, Attribute::computed(AttributeType::String))
        .with(WIF_SUBJECT, Attribute::computed(AttributeType::String))
}

fn registry_scope(subscription_id: &str, resource_group: &str, registry: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.ContainerRegistry/registries/{registry}"
    )
}

/// Pulls the resource group and registry name back out of a registry scope.
fn parse_registry_scope(scope: &str) -> Result<(String, String), MappingError> {
    let segments: Vec<&str> = scope.split('/').collect();
    let after = |key: &str| {
        segments
            .iter()
            .position(|s| s.eq_ignore_ascii_case(key))
            .and_then(|i| segments.get(i + 1))
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    };

    match (after("resourceGroups"), after("registries")) {
        (Some(group), Some(registry)) => Ok((group, registry)),
        _ => Err(MappingError::InvalidPayload {
            model: "container registry scope",
            message: format!("cannot parse '{scope}'"),
        }),
    }
}

/// Configuration → API.
pub fn expand(d: &ResourceData) -> Result<(ServiceEndpoint, String), MappingError> {
    let (mut endpoint, project_id) = base_expand(d)?;

    let scheme = d
        .get_str(AUTH_SCHEME)
        .filter(|s| !s.is_empty())
        .unwrap_or(SCHEME_SERVICE_PRINCIPAL);
    let registry = d.require_str(REGISTRY_NAME)?;
    let subscription_id = d.require_str(SUBSCRIPTION_ID)?;
    let scope = registry_scope(subscription_id, d.require_str(RESOURCE_GROUP)?, registry);
    let login_server = format!("{}.azurecr.io", registry.to_lowercase());

    let mut parameters = BTreeMap::from([
        ("tenantId".to_string(), d.require_str(TENANT_ID)?.to_string()),
        ("loginServer".to_string(), login_server.clone()),
        ("scope".to_string(), scope.clone()),
    ]);
    if scheme != SCHEME_MANAGED_IDENTITY {
        // Filled in by the service when it creates the principal.
        parameters.insert(
            "serviceprincipalid".to_string(),
            d.get_str(SERVICE_PRINCIPAL_ID).unwrap_or_default().to_string(),
        );
    }

    endpoint.endpoint_type = Some(ENDPOINT_TYPE.to_string());
    endpoint.url = Some(format!("https://{login_server}"));
    endpoint.authorization = Some(EndpointAuthorization {
        scheme: scheme.to_string(),
        parameters,
    });
    endpoint.data = BTreeMap::from([
        ("registryId".to_string(), scope),
        ("registrytype".to_string(), REGISTRY_TYPE.to_string()),
        ("subscriptionId".to_string(), subscription_id.to_string()),
        (
            "subscriptionName".to_string(),
            d.require_str(SUBSCRIPTION_NAME)?.to_string(),
        ),
    ]);

    Ok((endpoint, project_id))
}

/// API → configuration.
pub fn flatten(
    d: &mut ResourceData,
    endpoint: &ServiceEndpoint,
    project_id: &str,
) -> Result<(), MappingError> {
    base_flatten(d, endpoint, project_id)?;

    let data = |key: &str| endpoint.data.get(key).cloned().unwrap_or_default();
    let auth = endpoint.authorization.as_ref();

    let scope = auth
        .and_then(|auth| auth.parameters.get("scope"))
        .or_else(|| endpoint.data.get("registryId"))
        .cloned()
        .unwrap_or_default();
    let (resource_group, registry) = parse_registry_scope(&scope)?;

    d.set(SUBSCRIPTION_ID, data("subscriptionId"));
    d.set(SUBSCRIPTION_NAME, data("subscriptionName"));
    d.set(RESOURCE_GROUP, resource_group);
    d.set(REGISTRY_NAME, registry);

    // Without authorization the service said nothing about these; keep state.
    if let Some(auth) = auth {
        let param = |key: &str| auth.parameters.get(key).cloned().unwrap_or_default();
        d.set(AUTH_SCHEME, auth.scheme.as_str());
        d.set(TENANT_ID, param("tenantId"));
        d.set(SERVICE_PRINCIPAL_ID, param("serviceprincipalid"));
        d.set(WIF_ISSUER, param("workloadIdentityFederationIssuer"));
        d.set(WIF_SUBJECT, param("workloadIdentityFederationSubject"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Resource;
    use serde_json::Value;

    fn configured(overrides: Value) -> ResourceData {
        let mut attrs = json!({
            "project_id": "5a0f1bb1-9c0b-4c8d-8d8e-6f7c1f2b3a4d",
            "service_endpoint_name": "acr",
            "azurecr_spn_tenantid": "tenant",
            "azurecr_subscription_id": "sub",
            "azurecr_subscription_name": "Subscription",
            "resource_group": "rg",
            "azurecr_name": "MyRegistry"
        })
        .as_object()
        .cloned()
        .unwrap();
        if let Value::Object(extra) = overrides {
            attrs.extend(extra);
        }
        resource().schema().apply_defaults(&mut attrs);
        ResourceData::from_attributes(attrs)
    }

    /// # Expand Registry Endpoint
    ///
    /// Tests the configuration to API mapping.
    ///
    /// ## Test Scenario
    /// - Expands a service principal configuration with a mixed case registry name
    ///
    /// ## Expected Outcome
    /// - Docker registry type with a lower case azurecr.io url
    /// - Scope, tenant and data keys are set; service principal id left for the service
    #[test]
    fn test_expand() {
        let (endpoint, project_id) = expand(&configured(json!({}))).unwrap();
        let scope = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.ContainerRegistry/registries/MyRegistry";

        assert_eq!(project_id, "5a0f1bb1-9c0b-4c8d-8d8e-6f7c1f2b3a4d");
        assert_eq!(endpoint.endpoint_type.as_deref(), Some("dockerregistry"));
        assert_eq!(endpoint.url.as_deref(), Some("https://myregistry.azurecr.io"));
        assert_eq!(endpoint.owner.as_deref(), Some("library"));
        assert_eq!(endpoint.description.as_deref(), Some("Managed by Terraform"));

        let auth = endpoint.authorization.unwrap();
        assert_eq!(auth.scheme, "ServicePrincipal");
        assert_eq!(auth.parameters["tenantId"], "tenant");
        assert_eq!(auth.parameters["loginServer"], "myregistry.azurecr.io");
        assert_eq!(auth.parameters["scope"], scope);
        assert_eq!(auth.parameters["serviceprincipalid"], "");

        assert_eq!(endpoint.data["registryId"], scope);
        assert_eq!(endpoint.data["registrytype"], "ACR");
        assert_eq!(endpoint.data["subscriptionId"], "sub");
        assert_eq!(endpoint.data["subscriptionName"], "Subscription");
        assert_eq!(
            endpoint.service_endpoint_project_references[0].project_reference.id,
            project_id
        );
    }

    /// # Flatten Registry Endpoint
    ///
    /// Tests that flatten restores the configuration from an expanded endpoint.
    ///
    /// ## Test Scenario
    /// - Expands a workload identity configuration, fills the server fields,
    ///   and flattens into fresh data
    ///
    /// ## Expected Outcome
    /// - Resource group and registry name are parsed back from the scope
    /// - Computed attributes carry the server values
    #[test]
    fn test_flatten() {
        let config = configured(json!({ "service_endpoint_authentication_scheme": "WorkloadIdentityFederation" }));
        let (mut endpoint, project_id) = expand(&config).unwrap();
        endpoint.id = Some("e1".to_string());
        if let Some(auth) = endpoint.authorization.as_mut() {
            auth.parameters.insert("serviceprincipalid".into(), "spn".into());
            auth.parameters.insert("workloadIdentityFederationIssuer".into(), "issuer".into());
            auth.parameters.insert("workloadIdentityFederationSubject".into(), "subject".into());
        }

        let mut d = ResourceData::new();
        flatten(&mut d, &endpoint, &project_id).unwrap();

        assert_eq!(d.id(), Some("e1"));
        assert_eq!(d.get_str(RESOURCE_GROUP), Some("rg"));
        assert_eq!(d.get_str(REGISTRY_NAME), Some("MyRegistry"));
        assert_eq!(d.get_str(AUTH_SCHEME), Some("WorkloadIdentityFederation"));
        assert_eq!(d.get_str(SERVICE_PRINCIPAL_ID), Some("spn"));
        assert_eq!(d.get_str(WIF_ISSUER), Some("issuer"));
        assert_eq!(d.get_str(WIF_SUBJECT), Some("subject"));
        assert_eq!(d.get("authorization"), Some(&json!({ "scheme": "WorkloadIdentityFederation" })));

        for key in [
            "project_id",
            "service_endpoint_name",
            "description",
            TENANT_ID,
            SUBSCRIPTION_ID,
            SUBSCRIPTION_NAME,
        ] {
            assert_eq!(d.get(key), config.get(key), "{key}");
        }
    }

    /// # Flatten Without Authorization
    ///
    /// Tests reading back an endpoint the service returned without its
    /// authorization block.
    ///
    /// ## Test Scenario
    /// - Expands a service principal configuration and drops the authorization
    /// - Flattens into the configured data
    ///
    /// ## Expected Outcome
    /// - The authentication scheme and tenant keep their configured values
    /// - Registry fields still come from the endpoint data
    #[test]
    fn test_flatten_without_authorization_keeps_scheme() {
        let mut d = configured(json!({}));
        let (mut endpoint, project_id) = expand(&d).unwrap();
        endpoint.id = Some("e1".to_string());
        endpoint.authorization = None;

        flatten(&mut d, &endpoint, &project_id).unwrap();

        assert_eq!(d.get_str(AUTH_SCHEME), Some(SCHEME_SERVICE_PRINCIPAL));
        assert_eq!(d.get_str(TENANT_ID), Some("tenant"));
        assert_eq!(d.get_str(RESOURCE_GROUP), Some("rg"));
        assert_eq!(d.get_str(REGISTRY_NAME), Some("MyRegistry"));
        assert_eq!(d.get_str(SUBSCRIPTION_ID), Some("sub"));
    }

    /// # Scope Parsing
    ///
    /// Tests registry scope parsing failures.
    ///
    /// ## Test Scenario
    /// - Parses a scope without a registries segment
    ///
    /// ## Expected Outcome
    /// - A mapping error naming the scope
    #[test]
    fn test_parse_registry_scope() {
        assert_eq!(
            parse_registry_scope(&registry_scope("s", "rg", "reg")).unwrap(),
            ("rg".to_string(), "reg".to_string())
        );
        assert!(parse_registry_scope("/subscriptions/s/resourceGroups/rg").is_err());
    }

    /// # Schema Validation
    ///
    /// Tests the registry schema constraints.
    ///
    /// ## Test Scenario
    /// - Validates a configuration with an unknown scheme, an empty tenant,
    ///   and a configured computed attribute
    ///
    /// ## Expected Outcome
    /// - Each problem is reported
    #[test]
    fn test_schema_validation() {
        let d = configured(json!({
            "service_endpoint_authentication_scheme": "Basic",
            "azurecr_spn_tenantid": "",
            "service_principal_id": "x"
        }));
        let err = resource().schema().validate(d.attributes()).unwrap_err();
        let paths: Vec<&str> = err.diagnostics.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "azurecr_spn_tenantid",
                "service_endpoint_authentication_scheme",
                "service_principal_id"
            ]
        );
    }
}
