mod common;

use std::time::Duration;

use serde_json::json;
use stratus_core::acctest::{TestCase, TestStep};
use stratus_core::provider::{ErrorKind, Provider};
use stratus_core::resource::{Resource, ResourceAddress, State, Value};
use stratus_provider_azurerm::client::ApiError;
use stratus_provider_azurerm::client::memory::{Family, Method};
use stratus_provider_azurerm::{AzureRmProvider, Timeouts};

use common::{arm, document, provider, resource_group, ri};

fn group(ri: u32) -> Resource {
    Resource::new("azurerm_resource_group", "test")
        .with_attribute("name", Value::String(format!("acctestRG-{}", ri)))
        .with_attribute("location", Value::String("West US".into()))
}

#[tokio::test]
async fn read_after_create_returns_written_identifier() {
    let arm = arm();
    let provider = provider(&arm);

    let created = provider.create_or_update(&group(ri()), None).await.unwrap();
    assert!(created.exists);
    assert_eq!(created.attributes["location"], Value::String("westus".into()));

    let read = provider.read(&created).await.unwrap();
    assert!(read.exists);
    assert_eq!(read.identifier, created.identifier);
    assert_eq!(read, created);
}

#[tokio::test]
async fn delete_then_read_is_absent() {
    let arm = arm();
    let provider = provider(&arm);

    let created = provider.create_or_update(&group(ri()), None).await.unwrap();
    provider.delete(&created).await.unwrap();

    let read = provider.read(&created).await.unwrap();
    assert!(!read.exists);
    assert_eq!(read.identifier, None);
}

#[tokio::test]
async fn deleting_an_already_deleted_resource_succeeds() {
    let arm = arm();
    let provider = provider(&arm);

    let created = provider.create_or_update(&group(ri()), None).await.unwrap();
    let id = created.identifier.clone().unwrap();
    assert!(arm.remove_out_of_band(&id));

    provider.delete(&created).await.unwrap();
}

#[tokio::test]
async fn import_adopts_the_identifier() {
    let arm = arm();
    let provider = provider(&arm);
    let created = provider.create_or_update(&group(ri()), None).await.unwrap();
    let id = created.identifier.clone().unwrap();

    let address = ResourceAddress::new("azurerm_resource_group", "imported");
    let imported = provider.import(&address, &id).await.unwrap();
    assert_eq!(imported.address, address);
    assert_eq!(imported.identifier.as_deref(), Some(id.as_str()));
    assert_eq!(imported.attributes, created.attributes);
}

#[tokio::test]
async fn import_of_missing_object_fails() {
    let provider = provider(&arm());
    let err = provider
        .import(
            &ResourceAddress::new("azurerm_app_service", "test"),
            "/subscriptions/0000/resourceGroups/nope/providers/Microsoft.Web/sites/nope",
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn malformed_identifier_is_fatal() {
    let provider = provider(&arm());
    let state = State::existing(
        ResourceAddress::new("azurerm_managed_disk", "test"),
        Default::default(),
    )
    .with_identifier("/subscriptions/0000/resourceGroups");

    let err = provider.read(&state).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidIdentifier);

    let wrong_type = state
        .clone()
        .with_identifier("/subscriptions/0000/resourceGroups/rg/providers/Microsoft.Web/sites/a");
    let err = provider.read(&wrong_type).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidIdentifier);
}

#[tokio::test]
async fn unknown_resource_type_is_rejected() {
    let provider = provider(&arm());
    let err = provider
        .create_or_update(&Resource::new("azurerm_virtual_network", "test"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownResourceType);
}

#[tokio::test]
async fn invalid_attributes_are_rejected_before_any_call() {
    let arm = arm();
    let provider = provider(&arm);
    let disk = Resource::new("azurerm_managed_disk", "test")
        .with_attribute("name", Value::String("acctestd".into()))
        .with_attribute("resource_group_name", Value::String("acctestRG".into()))
        .with_attribute("location", Value::String("West US".into()))
        .with_attribute("storage_account_type", Value::String("Ultra_LRS".into()))
        .with_attribute("create_option", Value::String("Empty".into()))
        .with_attribute("disk_size_gb", Value::Int(1));

    let err = provider.create_or_update(&disk, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidConfig);
    assert!(arm.requests().is_empty());
}

#[tokio::test]
async fn hung_call_times_out() {
    let arm = arm();
    arm.set_latency(Duration::from_millis(200));
    let provider = AzureRmProvider::in_memory(
        &arm,
        Timeouts {
            create: Duration::from_millis(20),
            ..Timeouts::default()
        },
    );

    let err = provider
        .create_or_update(&group(ri()), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn api_errors_surface_verbatim_and_teardown_still_runs() {
    let arm = arm();
    arm.fail_next(
        Method::Put,
        Family::Disks,
        ApiError::Status {
            status: 409,
            code: "OperationNotAllowed".into(),
            message: "Disk quota exceeded".into(),
        },
    );

    let ri = ri();
    let config = document(json!({
        "azurerm_resource_group": {"test": resource_group(ri)},
        "azurerm_managed_disk": {"test": {
            "name": format!("acctestd-{}", ri),
            "location": "West US",
            "resource_group_name": "${azurerm_resource_group.test.name}",
            "storage_account_type": "Standard_LRS",
            "create_option": "Empty",
            "disk_size_gb": 1
        }}
    }));

    let err = TestCase::new(provider(&arm))
        .step(TestStep::new(config))
        .run()
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("[azurerm_managed_disk.test]"), "{}", message);
    assert!(message.contains("Status=409"), "{}", message);
    assert!(message.contains("Disk quota exceeded"), "{}", message);
    assert_eq!(arm.resource_count(), 0);
}

#[tokio::test]
async fn resource_group_read_errors_name_the_group() {
    let arm = arm();
    let provider = provider(&arm);
    let created = provider.create_or_update(&group(ri()), None).await.unwrap();

    arm.fail_next(
        Method::Get,
        Family::ResourceGroups,
        ApiError::Transport("connection reset".into()),
    );
    let err = provider.read(&created).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Api);
    assert!(
        err.to_string()
            .contains("Error making Read request on AzureRM Resource Group acctestRG-"),
        "{}",
        err
    );
}

#[tokio::test]
async fn disk_and_site_read_errors_name_the_resource_and_its_group() {
    let arm = arm();
    let provider = provider(&arm);
    let ri = ri();
    provider.create_or_update(&group(ri), None).await.unwrap();

    let disk = Resource::new("azurerm_managed_disk", "test")
        .with_attribute("name", Value::String(format!("acctestd-{}", ri)))
        .with_attribute("resource_group_name", Value::String(format!("acctestRG-{}", ri)))
        .with_attribute("location", Value::String("West US".into()))
        .with_attribute("storage_account_type", Value::String("Standard_LRS".into()))
        .with_attribute("create_option", Value::String("Empty".into()))
        .with_attribute("disk_size_gb", Value::Int(1));
    let disk = provider.create_or_update(&disk, None).await.unwrap();

    let site = Resource::new("azurerm_app_service", "test")
        .with_attribute("name", Value::String(format!("acctestAS-{}", ri)))
        .with_attribute("resource_group_name", Value::String(format!("acctestRG-{}", ri)))
        .with_attribute("location", Value::String("West US".into()));
    let site = provider.create_or_update(&site, None).await.unwrap();

    arm.clear_requests();
    arm.fail_next(
        Method::Get,
        Family::Disks,
        ApiError::Transport("connection reset".into()),
    );
    let err = provider.read(&disk).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Api);
    let message = err.to_string();
    assert!(
        message.contains(&format!(
            "Managed Disk acctestd-{} (resource group acctestRG-{})",
            ri, ri
        )),
        "{}",
        message
    );
    assert!(message.contains("connection reset"), "{}", message);
    assert_eq!(arm.requests().len(), 1);

    arm.fail_next(
        Method::Get,
        Family::Sites,
        ApiError::Transport("connection reset".into()),
    );
    let err = provider.read(&site).await.unwrap_err();
    assert!(
        err.to_string().contains(&format!(
            "App Service acctestAS-{} (resource group acctestRG-{})",
            ri, ri
        )),
        "{}",
        err
    );
}
