//! Integration tests for the azdo-provider library
//!
//! These drive both resources through the public [`Provider`] API against the
//! in-memory backend, covering the lifecycle end to end.

use azdo_provider::api::{PolicyOperations, ServiceEndpointOperations};
use azdo_provider::error::{ApiError, ProviderError};
use azdo_provider::{ApplyAction, AzureDevOpsClients, InMemoryBackend, Provider};
use serde_json::{Map, Value, json};

const STATUS_CHECK: &str = "azuredevops_branch_policy_status_check";
const AZURECR: &str = "azuredevops_serviceendpoint_azurecr";
const ORG: &str = "acme";

struct Fixture {
    provider: Provider,
    backend: InMemoryBackend,
    project_id: String,
}

fn fixture() -> Fixture {
    let backend = InMemoryBackend::new();
    let project = backend.add_project("Fabrikam").unwrap();
    Fixture {
        provider: Provider::new(AzureDevOpsClients::in_memory(ORG, backend.clone())),
        backend,
        project_id: project.id,
    }
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn azurecr_config(project_id: &str, name: &str) -> Map<String, Value> {
    object(json!({
        "project_id": project_id,
        "service_endpoint_name": name,
        "azurecr_spn_tenantid": "72f988bf-86f1-41af-91ab-2d7cd011db47",
        "azurecr_subscription_id": "3b4f5c6d-1111-2222-3333-444455556666",
        "azurecr_subscription_name": "Engineering",
        "resource_group": "rg-containers",
        "azurecr_name": "FabrikamRegistry"
    }))
}

fn status_check_config(project_id: &str, settings: Value) -> Map<String, Value> {
    object(json!({
        "project_id": project_id,
        "blocking": false,
        "settings": [settings]
    }))
}

/// # Container Registry Endpoint Basic Lifecycle
///
/// Tests creating a container registry endpoint and importing it back.
///
/// ## Test Scenario
/// - Creates an endpoint with the service principal scheme
/// - Imports it by project name and endpoint id
///
/// ## Expected Outcome
/// - The stored endpoint is a docker registry pointing at the lowercase login server
/// - The imported state equals the created state
#[tokio::test]
async fn test_azurecr_basic_lifecycle() {
    let f = fixture();
    let state = f
        .provider
        .create(AZURECR, azurecr_config(&f.project_id, "registry"))
        .await
        .unwrap();
    let id = state.id().unwrap().to_string();

    let stored = f.backend.endpoint(&id).unwrap();
    assert_eq!(stored.endpoint_type.as_deref(), Some("dockerregistry"));
    assert_eq!(
        stored.url.as_deref(),
        Some("https://fabrikamregistry.azurecr.io")
    );
    assert_eq!(stored.data.get("registrytype").map(String::as_str), Some("ACR"));
    assert_eq!(
        state.get("service_endpoint_authentication_scheme"),
        Some(&json!("ServicePrincipal"))
    );
    assert_eq!(state.get("description"), Some(&json!("Managed by Terraform")));

    let imported = f
        .provider
        .import(AZURECR, &format!("Fabrikam/{id}"))
        .await
        .unwrap();
    assert_eq!(imported, state);
}

/// # Container Registry Endpoint Update
///
/// Tests renaming an endpoint in place through apply.
///
/// ## Test Scenario
/// - Applies an endpoint named "registry", then the same with "registry-renamed"
///
/// ## Expected Outcome
/// - The second apply updates in place with the same id
/// - The service reports the new name
#[tokio::test]
async fn test_azurecr_update_name() {
    let f = fixture();
    let created = f
        .provider
        .apply(AZURECR, None, azurecr_config(&f.project_id, "registry"))
        .await
        .unwrap();

    let updated = f
        .provider
        .apply(
            AZURECR,
            Some(created.state.clone()),
            azurecr_config(&f.project_id, "registry-renamed"),
        )
        .await
        .unwrap();

    assert_eq!(updated.action, ApplyAction::Updated);
    assert_eq!(updated.state.id(), created.state.id());
    assert_eq!(
        updated.state.get("service_endpoint_name"),
        Some(&json!("registry-renamed"))
    );

    let refreshed = f.provider.read(AZURECR, updated.state.clone()).await.unwrap();
    assert_eq!(refreshed, updated.state);
}

/// # Workload Identity Endpoint
///
/// Tests the server-filled fields of a workload identity federation endpoint.
///
/// ## Test Scenario
/// - Creates an endpoint with the WorkloadIdentityFederation scheme
///
/// ## Expected Outcome
/// - Issuer and subject are computed from organization, project and name
#[tokio::test]
async fn test_azurecr_workload_identity() {
    let f = fixture();
    let mut config = azurecr_config(&f.project_id, "wif-registry");
    config.insert(
        "service_endpoint_authentication_scheme".to_string(),
        json!("WorkloadIdentityFederation"),
    );

    let state = f.provider.create(AZURECR, config).await.unwrap();

    assert_eq!(
        state.get("workload_identity_federation_issuer"),
        Some(&json!("https://vstoken.dev.azure.com/acme"))
    );
    assert_eq!(
        state.get("workload_identity_federation_subject"),
        Some(&json!(format!("sc://acme/{}/wif-registry", f.project_id)))
    );
}

/// # Status Check Round Trip
///
/// Tests that a conditional status check survives create and read unchanged.
///
/// ## Test Scenario
/// - Creates a status check with every setting configured
/// - Reads it back and applies the same configuration again
///
/// ## Expected Outcome
/// - The payload sends policyApplicability 1 and the patterns in order
/// - The refreshed state equals the created one and apply reports Unchanged
#[tokio::test]
async fn test_status_check_round_trip() {
    let f = fixture();
    let config = status_check_config(
        &f.project_id,
        json!({
            "name": "ci/lint",
            "genre": "pipelines",
            "author_id": "6f1c2b3a-1234-4cde-8f00-0123456789ab",
            "invalidate_on_update": true,
            "applicability": "conditional",
            "display_name": "Lint",
            "filename_patterns": ["/src/*", "!/src/generated/*", "/Cargo.toml"],
            "scope": [
                { "repository_id": "repo-1", "repository_ref": "refs/heads/main" },
                { "repository_id": "repo-2", "repository_ref": "refs/heads/release", "match_type": "Prefix" }
            ]
        }),
    );

    let state = f.provider.create(STATUS_CHECK, config.clone()).await.unwrap();
    let stored = f.backend.policy(1).unwrap();
    assert_eq!(stored.settings["policyApplicability"], json!(1));
    assert_eq!(
        stored.settings["filenamePatterns"],
        json!(["/src/*", "!/src/generated/*", "/Cargo.toml"])
    );
    assert_eq!(stored.settings["scope"][1]["matchKind"], json!("Prefix"));
    assert!(!stored.is_blocking);

    let refreshed = f.provider.read(STATUS_CHECK, state.clone()).await.unwrap();
    assert_eq!(refreshed, state);

    let again = f
        .provider
        .apply(STATUS_CHECK, Some(state), config)
        .await
        .unwrap();
    assert_eq!(again.action, ApplyAction::Unchanged);
}

/// # Status Check Default Applicability
///
/// Tests that the default applicability is omitted from the payload.
///
/// ## Test Scenario
/// - Creates a status check without applicability
///
/// ## Expected Outcome
/// - policyApplicability is absent and the state reads "default"
#[tokio::test]
async fn test_status_check_default_applicability() {
    let f = fixture();
    let config = status_check_config(
        &f.project_id,
        json!({ "name": "ci/build", "scope": [{ "repository_id": "repo-1" }] }),
    );

    let state = f.provider.create(STATUS_CHECK, config).await.unwrap();

    assert!(!f.backend.policy(1).unwrap().settings.contains_key("policyApplicability"));
    assert_eq!(state.get("settings").unwrap()[0]["applicability"], json!("default"));
}

/// # Invalid Applicability Rejected
///
/// Tests that an unknown applicability fails before any request.
///
/// ## Test Scenario
/// - Applies a status check with applicability "always"
///
/// ## Expected Outcome
/// - The error is a schema error and nothing is stored
#[tokio::test]
async fn test_invalid_applicability_rejected() {
    let f = fixture();
    let config = status_check_config(
        &f.project_id,
        json!({ "name": "ci", "applicability": "always", "scope": [{ "repository_id": "r" }] }),
    );

    let err = f.provider.apply(STATUS_CHECK, None, config).await.unwrap_err();

    assert!(matches!(err, ProviderError::Schema(_)));
    assert!(f.backend.policy(1).is_none());
}

/// # Empty Project Id Rejected
///
/// Tests that a required UUID attribute cannot be left empty.
///
/// ## Test Scenario
/// - Applies a status check with project_id ""
///
/// ## Expected Outcome
/// - A schema error with a project_id diagnostic and nothing stored
#[tokio::test]
async fn test_empty_project_id_rejected() {
    let f = fixture();
    let config = status_check_config("", json!({ "name": "ci", "scope": [{ "repository_id": "r" }] }));

    let err = f.provider.apply(STATUS_CHECK, None, config).await.unwrap_err();

    let ProviderError::Schema(schema_err) = err else {
        panic!("expected a schema error, got {err:?}");
    };
    assert!(schema_err.diagnostics.iter().any(|d| d.path == "project_id"));
    assert!(f.backend.policy(1).is_none());
}

/// # Status Check Import By Project Name
///
/// Tests importing a status check as `<project name>/<policy id>`.
///
/// ## Test Scenario
/// - Creates a conditional status check with patterns
/// - Imports it as "Fabrikam/1", then imports the unknown id 999
///
/// ## Expected Outcome
/// - The imported state equals the created state
/// - The unknown id reports NotFound
#[tokio::test]
async fn test_status_check_import_by_project_name() {
    let f = fixture();
    let config = status_check_config(
        &f.project_id,
        json!({
            "name": "ci/test",
            "applicability": "conditional",
            "filename_patterns": ["/src/*"],
            "scope": [{ "repository_id": "repo-1", "repository_ref": "refs/heads/main" }]
        }),
    );
    let created = f.provider.create(STATUS_CHECK, config).await.unwrap();
    assert_eq!(created.id(), Some("1"));

    let imported = f.provider.import(STATUS_CHECK, "Fabrikam/1").await.unwrap();
    assert_eq!(imported, created);

    let err = f
        .provider
        .import(STATUS_CHECK, "Fabrikam/999")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Api(ApiError::NotFound { .. })));
}

/// # Deleted Entities Leave State
///
/// Tests that entities removed outside the provider read as gone.
///
/// ## Test Scenario
/// - Creates a policy and an endpoint
/// - Deletes both directly through the backend
/// - Reads both, then imports the endpoint
///
/// ## Expected Outcome
/// - Both reads return state without an id
/// - Import of the deleted endpoint reports NotFound
#[tokio::test]
async fn test_deleted_entities_leave_state() {
    let f = fixture();
    let policy = f
        .provider
        .create(
            STATUS_CHECK,
            status_check_config(&f.project_id, json!({ "name": "ci", "scope": [{ "repository_id": "r" }] })),
        )
        .await
        .unwrap();
    let endpoint = f
        .provider
        .create(AZURECR, azurecr_config(&f.project_id, "registry"))
        .await
        .unwrap();
    let endpoint_id = endpoint.id().unwrap().to_string();

    PolicyOperations::delete_policy_configuration(&f.backend, ORG, &f.project_id, 1)
        .await
        .unwrap();
    ServiceEndpointOperations::delete_service_endpoint(
        &f.backend,
        ORG,
        &[f.project_id.clone()],
        &endpoint_id,
    )
    .await
    .unwrap();

    assert!(f.provider.read(STATUS_CHECK, policy).await.unwrap().id().is_none());
    assert!(f.provider.read(AZURECR, endpoint).await.unwrap().id().is_none());

    let err = f
        .provider
        .import(AZURECR, &format!("{}/{endpoint_id}", f.project_id))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Api(ApiError::NotFound { .. })));
}

/// # Destroy And Replace
///
/// Tests deletion and force_new replacement of an endpoint.
///
/// ## Test Scenario
/// - Applies an endpoint, then changes its resource group
/// - Deletes the replacement
///
/// ## Expected Outcome
/// - The change is a replacement and the first endpoint is deleted
/// - After delete, neither endpoint remains
#[tokio::test]
async fn test_destroy_and_replace() {
    let f = fixture();
    let first = f
        .provider
        .apply(AZURECR, None, azurecr_config(&f.project_id, "registry"))
        .await
        .unwrap();
    let first_id = first.state.id().unwrap().to_string();

    let mut moved = azurecr_config(&f.project_id, "registry");
    moved.insert("resource_group".to_string(), json!("rg-moved"));
    let second = f
        .provider
        .apply(AZURECR, Some(first.state), moved)
        .await
        .unwrap();
    assert_eq!(second.action, ApplyAction::Replaced);
    let second_id = second.state.id().unwrap().to_string();
    assert!(f.backend.endpoint(&first_id).is_none());

    f.provider.delete(AZURECR, second.state).await.unwrap();
    assert!(f.backend.endpoint(&second_id).is_none());
    assert_eq!(f.backend.deleted_endpoints(), vec![first_id, second_id]);
}

/// # Library Version
///
/// Tests that the version constant is accessible.
///
/// ## Test Scenario
/// - Reads VERSION
///
/// ## Expected Outcome
/// - A non-empty dotted version
#[test]
fn test_library_version() {
    let version = azdo_provider::VERSION;
    assert!(!version.is_empty());
    assert!(version.contains('.'));
}
