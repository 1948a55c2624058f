mod common;

use serde_json::json;
use stratus_core::acctest::{ImportStep, TestCase, TestStep, attr_equals, compose};
use stratus_core::resource::ResourceAddress;

use common::{arm, check_destroyed, document, provider, resource_group, ri};

fn sql_server(ri: u32, tags: serde_json::Value) -> String {
    document(json!({
        "azurerm_resource_group": {"test": resource_group(ri)},
        "azurerm_sql_server": {"test": {
            "name": format!("acctestsqlserver{}", ri),
            "resource_group_name": "${azurerm_resource_group.test.name}",
            "location": "West US",
            "version": "12.0",
            "administrator_login": "mradministrator",
            "administrator_login_password": "thisIsDog11",
            "tags": tags
        }}
    }))
}

#[tokio::test]
async fn sql_server_with_tags() {
    let arm = arm();
    let ri = ri();

    TestCase::new(provider(&arm))
        .step(
            TestStep::new(sql_server(
                ri,
                json!({"environment": "staging", "database": "test"}),
            ))
            .with_check(compose(vec![
                attr_equals("azurerm_sql_server.test", "tags.%", "2"),
                attr_equals(
                    "azurerm_sql_server.test",
                    "fully_qualified_domain_name",
                    &format!("acctestsqlserver{}.database.windows.net", ri),
                ),
                attr_equals(
                    "azurerm_sql_server.test",
                    "administrator_login_password",
                    "thisIsDog11",
                ),
            ])),
        )
        .step(
            TestStep::new(sql_server(ri, json!({"environment": "production"})))
                .with_check(compose(vec![
                    attr_equals("azurerm_sql_server.test", "tags.%", "1"),
                    attr_equals("azurerm_sql_server.test", "tags.environment", "production"),
                ])),
        )
        .check_destroy(check_destroyed(&arm, "azurerm_sql_server"))
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn sql_server_import() {
    let arm = arm();
    let ri = ri();
    let config = sql_server(ri, json!({"environment": "staging"}));

    TestCase::new(provider(&arm))
        .step(TestStep::new(config.clone()))
        .step(
            TestStep::new(config).import(
                ImportStep::new(ResourceAddress::new("azurerm_sql_server", "test"))
                    .ignore("administrator_login_password"),
            ),
        )
        .check_destroy(check_destroyed(&arm, "azurerm_sql_server"))
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn sql_server_import_checks_password_unless_ignored() {
    let arm = arm();
    let ri = ri();
    let config = sql_server(ri, json!({}));

    let err = TestCase::new(provider(&arm))
        .step(TestStep::new(config.clone()))
        .step(
            TestStep::new(config)
                .import(ImportStep::new(ResourceAddress::new("azurerm_sql_server", "test"))),
        )
        .run()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("administrator_login_password"), "{}", err);
    assert_eq!(arm.resource_count(), 0);
}
