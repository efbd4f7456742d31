//! Acceptance tests against a real Azure DevOps organization.
//!
//! Skipped unless every variable in [`REQUIRED`] is set. The container
//! registry named by `TEST_ARM_ACR_NAME` must exist in the given subscription
//! and resource group, and `AZDO_TEST_PROJECT` must name an existing project.

use azdo_provider::{ApplyAction, AzureDevOpsClients, Provider};
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use std::env;

const AZURECR: &str = "azuredevops_serviceendpoint_azurecr";

const REQUIRED: [&str; 8] = [
    "AZDO_ORG_SERVICE_URL",
    "AZDO_PERSONAL_ACCESS_TOKEN",
    "AZDO_TEST_PROJECT",
    "TEST_ARM_SUBSCRIPTION_ID",
    "TEST_ARM_SUBSCRIPTION_NAME",
    "TEST_ARM_TENANT_ID",
    "TEST_ARM_RESOURCE_GROUP",
    "TEST_ARM_ACR_NAME",
];

struct Acceptance {
    provider: Provider,
    project_id: String,
    vars: Map<String, Value>,
}

/// Connects when the environment is complete, `None` otherwise.
async fn acceptance() -> Option<Acceptance> {
    let mut vars = Map::new();
    for name in REQUIRED {
        match env::var(name) {
            Ok(value) if !value.is_empty() => {
                vars.insert(name.to_string(), json!(value));
            }
            _ => {
                eprintln!("skipping acceptance test: {name} is not set");
                return None;
            }
        }
    }
    let var = |name: &str| vars[name].as_str().unwrap_or_default().to_string();

    let pat = SecretString::from(var("AZDO_PERSONAL_ACCESS_TOKEN"));
    let clients = AzureDevOpsClients::connect(&var("AZDO_ORG_SERVICE_URL"), &pat).unwrap();
    let project_id = clients
        .resolve_project_id(&var("AZDO_TEST_PROJECT"))
        .await
        .unwrap();

    Some(Acceptance {
        provider: Provider::new(clients),
        project_id,
        vars,
    })
}

impl Acceptance {
    fn var(&self, name: &str) -> Value {
        self.vars[name].clone()
    }

    fn config(&self, endpoint_name: &str) -> Map<String, Value> {
        json!({
            "project_id": self.project_id,
            "service_endpoint_name": endpoint_name,
            "azurecr_spn_tenantid": self.var("TEST_ARM_TENANT_ID"),
            "azurecr_subscription_id": self.var("TEST_ARM_SUBSCRIPTION_ID"),
            "azurecr_subscription_name": self.var("TEST_ARM_SUBSCRIPTION_NAME"),
            "resource_group": self.var("TEST_ARM_RESOURCE_GROUP"),
            "azurecr_name": self.var("TEST_ARM_ACR_NAME")
        })
        .as_object()
        .cloned()
        .unwrap()
    }
}

fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

/// # Container Registry Endpoint Basic
///
/// Tests creating a container registry endpoint and importing it.
///
/// ## Test Scenario
/// - Creates an endpoint with a random name
/// - Imports it as `<project>/<id>`
/// - Deletes it
///
/// ## Expected Outcome
/// - The import matches the created state
/// - After delete the endpoint reads as gone
#[tokio::test]
async fn test_acc_azurecr_basic() {
    let Some(acc) = acceptance().await else {
        return;
    };
    let name = unique_name("acc-acr");

    let state = acc.provider.create(AZURECR, acc.config(&name)).await.unwrap();
    let id = state.id().unwrap().to_string();
    assert_eq!(state.get("service_endpoint_name"), Some(&json!(name)));

    let imported = acc
        .provider
        .import(AZURECR, &format!("{}/{id}", acc.project_id))
        .await
        .unwrap();
    assert_eq!(imported.get("azurecr_name"), state.get("azurecr_name"));
    assert_eq!(imported.get("resource_group"), state.get("resource_group"));

    acc.provider.delete(AZURECR, state.clone()).await.unwrap();
    assert!(acc.provider.read(AZURECR, state).await.unwrap().id().is_none());
}

/// # Container Registry Endpoint Update
///
/// Tests renaming an endpoint in place.
///
/// ## Test Scenario
/// - Applies an endpoint, then applies it again with a new name
///
/// ## Expected Outcome
/// - The second apply is an in-place update keeping the id
#[tokio::test]
async fn test_acc_azurecr_update() {
    let Some(acc) = acceptance().await else {
        return;
    };
    let first_name = unique_name("acc-acr");
    let second_name = unique_name("acc-acr-updated");

    let created = acc
        .provider
        .apply(AZURECR, None, acc.config(&first_name))
        .await
        .unwrap();
    let updated = acc
        .provider
        .apply(AZURECR, Some(created.state.clone()), acc.config(&second_name))
        .await
        .unwrap();

    assert_eq!(updated.action, ApplyAction::Updated);
    assert_eq!(updated.state.id(), created.state.id());
    assert_eq!(
        updated.state.get("service_endpoint_name"),
        Some(&json!(second_name))
    );

    acc.provider.delete(AZURECR, updated.state).await.unwrap();
}
