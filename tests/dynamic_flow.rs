use serde_json::{json, Value};

use relayflow_core::flow::RegisteredFlow;
use relayflow_core::signal::show_widget;
use relayflow_core::types::{FlowConfig, RequestMeta, UiResource};
use relayflow_dynamic::{field, Completion, DynamicFlow};
use relayflow_tools::ToolRegistry;

fn signup() -> RegisteredFlow {
    DynamicFlow::builder(FlowConfig::new("signup", "Signup", "Sign a user up"))
        .field("name", field::text("name"))
        .field("plan", field::select("plan", ["a", "b"]))
        .field("email", field::text("email").optional())
        .field("company", field::text("company").depends_on(["email"]))
        .on_complete(|state, _meta| async move {
            Ok(Completion::Done(json!({"accounts": 1, "plan": state.get("plan").cloned()})))
        })
        .compile()
        .expect("valid field set")
}

async fn submit(registry: &ToolRegistry, data: Value, state: Value) -> Value {
    registry
        .execute(
            "signup",
            json!({"action": "submit", "data": data, "state": state}),
            RequestMeta::new(),
        )
        .await
        .expect("tool registered")
        .json()
        .expect("json text")
}

fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    signup().register(&mut registry);
    registry
}

#[tokio::test]
async fn test_invalid_select_is_dropped() {
    let registry = registry();
    let doc = submit(&registry, json!({"plan": "z"}), json!({})).await;
    assert_eq!(doc["status"], json!("gathering"));
    assert_eq!(doc["missing"], json!(["name", "plan"]));
    assert_eq!(doc["errors"], json!({"plan": "plan must be one of: a, b"}));
    assert_eq!(doc["gathered"], json!({}));
    assert!(doc["state"].get("plan").is_none());
}

#[tokio::test]
async fn test_dependent_field_appears_after_its_dependency() {
    let registry = registry();

    let doc = submit(&registry, json!({"name": "Ava", "plan": "a"}), json!({})).await;
    // email is optional and company waits on it, so the form completes
    assert_eq!(doc["status"], json!("complete"));

    let doc = submit(&registry, json!({"name": "Ava"}), json!({})).await;
    assert_eq!(doc["missing"], json!(["plan"]));
    assert!(doc["fields"].get("company").is_none());

    let doc = submit(&registry, json!({"email": "a@x.com"}), doc["state"].clone()).await;
    assert_eq!(doc["missing"], json!(["plan", "company"]));
    assert_eq!(doc["fields"]["company"]["dependsOn"], json!(["email"]));
    assert_eq!(doc["gathered"], json!({"name": "Ava", "email": "a@x.com"}));
}

#[tokio::test]
async fn test_resubmission_is_idempotent() {
    let registry = registry();
    let state = json!({"name": "Ava"});
    let data = json!({"plan": "nope", "email": ""});

    let first = submit(&registry, data.clone(), state.clone()).await;
    let second = submit(&registry, data, state).await;
    assert_eq!(first["status"], second["status"]);
    assert_eq!(first["missing"], second["missing"]);
    assert_eq!(first["errors"], second["errors"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_empty_submission_reports_schema() {
    let registry = registry();
    let doc = submit(&registry, json!({}), json!({})).await;
    assert_eq!(
        doc["fields"]["plan"],
        json!({"type": "select", "label": "plan", "required": true, "options": ["a", "b"]})
    );
    assert_eq!(doc["fields"]["email"]["required"], json!(false));
}

#[tokio::test]
async fn test_completion_result() {
    let registry = registry();
    let doc = submit(&registry, json!({"name": "Ava", "plan": "b"}), json!({})).await;
    assert_eq!(
        doc,
        json!({
            "status": "complete",
            "result": {"accounts": 1, "plan": "b"},
            "state": {"name": "Ava", "plan": "b"}
        })
    );
}

#[tokio::test]
async fn test_completion_widget_hand_off() {
    let flow = DynamicFlow::builder(FlowConfig::new("checkout", "Checkout", "Pay for an order"))
        .field("sku", field::text("SKU"))
        .field("qty", field::number("Quantity").min(1.0))
        .on_complete(|state, _meta| async move {
            let qty = state.get("qty").and_then(Value::as_i64).unwrap_or(0);
            Ok(Completion::Widget(show_widget(
                UiResource::new("payment", "Payment"),
                json!({"total": qty * 5}),
            )))
        })
        .compile()
        .expect("valid field set");
    let mut registry = ToolRegistry::new();
    registry.register_flow(&flow);

    let resp = registry
        .execute(
            "checkout",
            json!({"action": "start", "data": {"sku": "A-1", "qty": "3"}}),
            RequestMeta::new(),
        )
        .await
        .expect("tool registered");
    let doc = resp.json().expect("json");
    assert_eq!(doc["status"], json!("widget"));
    assert_eq!(doc["field"], json!("__complete"));
    assert_eq!(resp.structured_content["total"], json!(15));
    assert_eq!(
        resp.structured_content["__flow"],
        json!({"flowId": "checkout", "step": "__complete", "state": {"sku": "A-1", "qty": 3}})
    );
    assert_eq!(resp.meta["ui"]["resourceUri"], json!("ui://widgets/ext-apps/payment.html"));
}
