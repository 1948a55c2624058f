#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::json;
use stratus_core::acctest::{CheckFn, check};
use stratus_core::provider::Provider;
use stratus_core::resource::StateMap;
use stratus_provider_azurerm::{AzureRmProvider, InMemoryArm, Timeouts};

pub const SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Suffix that keeps names unique across tests
pub fn ri() -> u32 {
    static NEXT: AtomicU32 = AtomicU32::new(1000);
    NEXT.fetch_add(1, Ordering::SeqCst)
}

pub fn arm() -> InMemoryArm {
    InMemoryArm::new(SUBSCRIPTION_ID)
}

pub fn provider(arm: &InMemoryArm) -> AzureRmProvider {
    AzureRmProvider::in_memory(arm, Timeouts::default())
}

pub fn resource_group(ri: u32) -> serde_json::Value {
    json!({"name": format!("acctestRG-{}", ri), "location": "West US"})
}

/// JSON document declaring `resources` (`{type: {label: attributes}}`)
pub fn document(resources: serde_json::Value) -> String {
    json!({ "resource": resources }).to_string()
}

/// Every resource of `resource_type` in the snapshot must be gone remotely
pub fn check_destroyed(arm: &InMemoryArm, resource_type: &'static str) -> CheckFn {
    let provider = Arc::new(provider(arm));
    check(move |states: StateMap| {
        let provider = provider.clone();
        async move {
            let mut checked = 0;
            for state in states
                .values()
                .filter(|s| s.address.resource_type == resource_type)
            {
                let current = provider.read(state).await.map_err(|e| e.to_string())?;
                if current.exists {
                    return Err(format!("{} still exists", state.address));
                }
                checked += 1;
            }
            if checked == 0 {
                return Err(format!("no {} in state to check", resource_type));
            }
            Ok(())
        }
    })
}
