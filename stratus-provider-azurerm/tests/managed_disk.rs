mod common;

use serde_json::json;
use stratus_core::acctest::{TestCase, TestStep, attr_absent, attr_equals, attr_set, check, compose};
use stratus_core::resource::StateMap;

use common::{arm, check_destroyed, document, provider, resource_group, ri};

fn empty_disk(ri: u32, storage_account_type: &str, size: &str, tags: serde_json::Value) -> String {
    document(json!({
        "azurerm_resource_group": {"test": resource_group(ri)},
        "azurerm_managed_disk": {"test": {
            "name": format!("acctestd-{}", ri),
            "location": "West US",
            "resource_group_name": "${azurerm_resource_group.test.name}",
            "storage_account_type": storage_account_type,
            "create_option": "Empty",
            "disk_size_gb": size,
            "tags": tags
        }}
    }))
}

#[tokio::test]
async fn managed_disk_empty_then_update() {
    let arm = arm();
    let ri = ri();

    let created = empty_disk(
        ri,
        "Standard_LRS",
        "1",
        json!({"environment": "acctest", "cost-center": "ops"}),
    );
    let updated = empty_disk(ri, "Premium_LRS", "2", json!({"environment": "acctest"}));

    TestCase::new(provider(&arm))
        .step(TestStep::new(created).with_check(compose(vec![
            attr_set("azurerm_managed_disk.test", "id"),
            attr_equals("azurerm_managed_disk.test", "tags.%", "2"),
            attr_equals("azurerm_managed_disk.test", "tags.environment", "acctest"),
            attr_equals("azurerm_managed_disk.test", "tags.cost-center", "ops"),
            attr_equals("azurerm_managed_disk.test", "disk_size_gb", "1"),
            attr_equals("azurerm_managed_disk.test", "storage_account_type", "Standard_LRS"),
        ])))
        .step(TestStep::new(updated).with_check(compose(vec![
            attr_equals("azurerm_managed_disk.test", "tags.%", "1"),
            attr_equals("azurerm_managed_disk.test", "tags.environment", "acctest"),
            attr_absent("azurerm_managed_disk.test", "tags.cost-center"),
            attr_equals("azurerm_managed_disk.test", "disk_size_gb", "2"),
            attr_equals("azurerm_managed_disk.test", "storage_account_type", "Premium_LRS"),
        ])))
        .check_destroy(check_destroyed(&arm, "azurerm_managed_disk"))
        .run()
        .await
        .unwrap();

    assert_eq!(arm.resource_count(), 0);
}

#[tokio::test]
async fn managed_disk_non_standard_casing() {
    let arm = arm();
    let ri = ri();
    let config = empty_disk(ri, "standard_lrs", "1", json!({"environment": "acctest"}));

    TestCase::new(provider(&arm))
        .step(TestStep::new(config.clone()))
        .step(TestStep::new(config).plan_only())
        .check_destroy(check_destroyed(&arm, "azurerm_managed_disk"))
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn managed_disk_copy() {
    let arm = arm();
    let ri = ri();
    let config = document(json!({
        "azurerm_resource_group": {"test": resource_group(ri)},
        "azurerm_managed_disk": {
            "source": {
                "name": format!("acctestd1-{}", ri),
                "location": "${azurerm_resource_group.test.location}",
                "resource_group_name": "${azurerm_resource_group.test.name}",
                "storage_account_type": "Standard_LRS",
                "create_option": "Empty",
                "disk_size_gb": "1",
                "tags": {"environment": "acctest", "cost-center": "ops"}
            },
            "test": {
                "name": format!("acctestd2-{}", ri),
                "location": "${azurerm_resource_group.test.location}",
                "resource_group_name": "${azurerm_resource_group.test.name}",
                "storage_account_type": "Standard_LRS",
                "create_option": "Copy",
                "source_resource_id": "${azurerm_managed_disk.source.id}",
                "tags": {"environment": "acctest", "cost-center": "ops"}
            }
        }
    }));

    TestCase::new(provider(&arm))
        .step(TestStep::new(config).with_check(compose(vec![
            attr_equals("azurerm_managed_disk.test", "create_option", "Copy"),
            attr_equals("azurerm_managed_disk.test", "disk_size_gb", "1"),
            attr_equals("azurerm_managed_disk.test", "location", "westus"),
            check(|states: StateMap| async move {
                let source = states
                    .values()
                    .find(|s| s.address.label == "source")
                    .and_then(|s| s.identifier.clone());
                let copied = states
                    .values()
                    .find(|s| s.address.label == "test")
                    .and_then(|s| s.flat_attribute("source_resource_id"));
                if source.is_some() && source == copied {
                    Ok(())
                } else {
                    Err(format!("copy points at {:?}, source is {:?}", copied, source))
                }
            }),
        ])))
        .check_destroy(check_destroyed(&arm, "azurerm_managed_disk"))
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn managed_disk_import() {
    let arm = arm();
    let ri = ri();
    let source_uri = format!("https://acctestsa{}.blob.core.windows.net/vhds/acctestvm.vhd", ri);
    let config = document(json!({
        "azurerm_resource_group": {"test": resource_group(ri)},
        "azurerm_managed_disk": {"test": {
            "name": format!("acctestd-{}", ri),
            "location": "West US",
            "resource_group_name": "${azurerm_resource_group.test.name}",
            "storage_account_type": "Standard_LRS",
            "create_option": "Import",
            "source_uri": source_uri,
            "os_type": "Linux",
            "disk_size_gb": "45",
            "tags": {"environment": "acctest"}
        }}
    }));

    TestCase::new(provider(&arm))
        .step(TestStep::new(config).with_check(compose(vec![
            attr_equals("azurerm_managed_disk.test", "create_option", "Import"),
            attr_equals("azurerm_managed_disk.test", "source_uri", &source_uri),
            attr_equals("azurerm_managed_disk.test", "disk_size_gb", "45"),
            attr_equals("azurerm_managed_disk.test", "os_type", "Linux"),
        ])))
        .check_destroy(check_destroyed(&arm, "azurerm_managed_disk"))
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn managed_disk_disappears() {
    let arm = arm();
    let ri = ri();
    let config = empty_disk(ri, "Standard_LRS", "1", json!({}));

    let remote = arm.clone();
    let delete_out_of_band = check(move |states: StateMap| {
        let remote = remote.clone();
        async move {
            let id = states
                .values()
                .find(|s| s.address.resource_type == "azurerm_managed_disk")
                .and_then(|s| s.identifier.clone())
                .ok_or("disk not in state")?;
            if remote.remove_out_of_band(&id) {
                Ok(())
            } else {
                Err(format!("{} did not exist", id))
            }
        }
    });

    TestCase::new(provider(&arm))
        .step(
            TestStep::new(config.clone())
                .with_check(delete_out_of_band)
                .expect_non_empty_plan(),
        )
        .step(TestStep::new(config).with_check(attr_set("azurerm_managed_disk.test", "id")))
        .check_destroy(check_destroyed(&arm, "azurerm_managed_disk"))
        .run()
        .await
        .unwrap();
}
