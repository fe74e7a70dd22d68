//! Flows bundled with the CLI.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use relayflow_core::config::EngineConfig;
use relayflow_core::error::Result;
use relayflow_core::flow::RegisteredFlow;
use relayflow_core::signal::{interrupt, show_widget, update, StepOutput};
use relayflow_core::types::{FlowConfig, FlowState, ToolAnnotations, UiResource};
use relayflow_dynamic::{field, Completion, DynamicFlow};
use relayflow_graph::{StateGraph, END, START};

/// Every demo flow, compiled against the given engine settings.
pub fn flows(engine: &EngineConfig) -> Result<Vec<RegisteredFlow>> {
    Ok(vec![
        onboarding(engine)?,
        plan_picker(engine)?,
        qualify_lead()?,
    ])
}

fn text<'a>(state: &'a FlowState, key: &str) -> &'a str {
    state.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Two questions, then done.
pub fn onboarding(engine: &EngineConfig) -> Result<RegisteredFlow> {
    StateGraph::new(
        FlowConfig::new(
            "onboarding",
            "User Onboarding",
            "Collects a new user's name and email address.",
        )
        .with_annotations(ToolAnnotations {
            read_only_hint: Some(true),
            ..Default::default()
        }),
    )
    .with_engine(engine.clone())
    .add_node("ask_name", |_state, _meta| async {
        Ok(StepOutput::Interrupt(interrupt("What's your name?", "name")))
    })
    .add_node("ask_email", |state: FlowState, _meta| async move {
        let question = format!("Thanks {}! What's your email address?", text(&state, "name"));
        Ok(StepOutput::Interrupt(interrupt(question, "email")))
    })
    .add_edge(START, "ask_name")
    .add_edge("ask_name", "ask_email")
    .add_edge("ask_email", END)
    .compile()
}

/// Branches on company size; small teams choose a plan in a widget.
pub fn plan_picker(engine: &EngineConfig) -> Result<RegisteredFlow> {
    StateGraph::new(FlowConfig::new(
        "plan_picker",
        "Plan Picker",
        "Helps a customer choose a subscription plan.",
    ))
    .with_engine(engine.clone())
    .add_node("ask_team_size", |_state, _meta| async {
        Ok(StepOutput::Interrupt(
            interrupt("How many people are on your team?", "team_size")
                .with_suggestions(["1-10", "11-50", "51+"]),
        ))
    })
    .add_node("pick_plan", |state: FlowState, _meta| async move {
        let plans = if text(&state, "team_size") == "1-10" {
            json!(["free", "starter"])
        } else {
            json!(["starter", "pro"])
        };
        Ok(StepOutput::Widget(
            show_widget(
                UiResource::new("plan_picker", "Plan picker").with_auto_height(true),
                json!({ "plans": plans }),
            )
            .with_description("Shows the plans available for this team size"),
        ))
    })
    .add_node("enterprise", |_state, _meta| async {
        update(json!({ "plan": "enterprise", "sales_contact": true }))
    })
    .add_node("confirm", |state: FlowState, _meta| async move {
        let summary = format!(
            "Plan {} for a team of {}",
            text(&state, "plan"),
            text(&state, "team_size")
        );
        update(json!({ "summary": summary }))
    })
    .add_edge(START, "ask_team_size")
    .add_conditional_edge("ask_team_size", |state: &FlowState| {
        if text(state, "team_size") == "51+" {
            "enterprise"
        } else {
            "pick_plan"
        }
    })
    .add_edge("pick_plan", "confirm")
    .add_edge("enterprise", "confirm")
    .add_edge("confirm", END)
    .compile()
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Free-form lead qualification.
pub fn qualify_lead() -> Result<RegisteredFlow> {
    DynamicFlow::builder(FlowConfig::new(
        "qualify_lead",
        "Qualify Lead",
        "Gathers what sales needs to qualify an inbound lead.",
    ))
    .field(
        "email",
        field::text("Work email").validate(|value| {
            if email_pattern().is_match(value) {
                Ok(())
            } else {
                Err("Work email must be a valid email address".to_string())
            }
        }),
    )
    .field(
        "company",
        field::text("Company")
            .depends_on(["email"])
            .hint("Skip this if the email domain already names the company"),
    )
    .field(
        "plan",
        field::select("Plan of interest", ["starter", "pro", "enterprise"]),
    )
    .field(
        "seats",
        field::number("Seats")
            .min(1.0)
            .max(10_000.0)
            .when(|state| state.get("plan") == Some(&json!("enterprise"))),
    )
    .field(
        "newsletter",
        field::boolean("Newsletter opt-in").optional(),
    )
    .on_complete(|state, _meta| async move {
        let seats = state.get("seats").and_then(Value::as_f64).unwrap_or(0.0);
        let plan = text(&state, "plan");
        Ok(Completion::Done(json!({
            "qualified": plan != "starter" || seats >= 50.0,
            "route_to": if plan == "enterprise" { "sales" } else { "self_serve" },
        })))
    })
    .compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayflow_test_utils::{continue_request, response_json, submit_request, widget_result_request};
    use relayflow_core::types::RequestMeta;

    #[tokio::test]
    async fn test_onboarding_round_trip() {
        let flow = onboarding(&EngineConfig::default()).unwrap();
        let doc = response_json(&flow.call(json!({"action": "start"}), RequestMeta::new()).await);
        assert_eq!(doc["field"], json!("name"));

        let doc = response_json(
            &flow
                .call(continue_request("ask_name", "name", json!("Ava"), &doc["state"]), RequestMeta::new())
                .await,
        );
        assert_eq!(doc["question"], json!("Thanks Ava! What's your email address?"));

        let doc = response_json(
            &flow
                .call(
                    continue_request("ask_email", "email", json!("ava@example.com"), &doc["state"]),
                    RequestMeta::new(),
                )
                .await,
        );
        assert_eq!(
            doc,
            json!({"status": "complete", "state": {"name": "Ava", "email": "ava@example.com"}})
        );
    }

    #[tokio::test]
    async fn test_plan_picker_branches() {
        let flow = plan_picker(&EngineConfig::default()).unwrap();

        let doc = response_json(
            &flow
                .call(continue_request("ask_team_size", "team_size", json!("51+"), &json!({})), RequestMeta::new())
                .await,
        );
        assert_eq!(doc["status"], json!("complete"));
        assert_eq!(doc["state"]["plan"], json!("enterprise"));

        let resp = flow
            .call(continue_request("ask_team_size", "team_size", json!("1-10"), &json!({})), RequestMeta::new())
            .await;
        let doc = response_json(&resp);
        assert_eq!(doc["status"], json!("widget"));
        assert_eq!(resp.structured_content["plans"], json!(["free", "starter"]));
        assert_eq!(resp.meta["ui"]["autoHeight"], json!(true));

        let doc = response_json(
            &flow
                .call(
                    widget_result_request("pick_plan", json!({"plan": "starter"}), &doc["state"]),
                    RequestMeta::new(),
                )
                .await,
        );
        assert_eq!(doc["state"]["summary"], json!("Plan starter for a team of 1-10"));
    }

    #[tokio::test]
    async fn test_qualify_lead_gathers() {
        let flow = qualify_lead().unwrap();

        let doc = response_json(
            &flow
                .call(submit_request(json!({"email": "nope", "plan": "enterprise"}), &json!({})), RequestMeta::new())
                .await,
        );
        assert_eq!(doc["status"], json!("gathering"));
        assert_eq!(doc["errors"]["email"], json!("Work email must be a valid email address"));
        // company became active while the bad email was still in place
        assert_eq!(doc["missing"], json!(["email", "company", "seats"]));

        let doc = response_json(
            &flow
                .call(
                    submit_request(json!({"email": "ava@acme.io", "company": "Acme", "seats": "120"}), &doc["state"]),
                    RequestMeta::new(),
                )
                .await,
        );
        assert_eq!(doc["status"], json!("complete"));
        assert_eq!(doc["result"], json!({"qualified": true, "route_to": "sales"}));
        assert_eq!(doc["state"]["seats"], json!(120));
    }

    #[test]
    fn test_all_flows_compile() {
        let ids: Vec<String> = flows(&EngineConfig::default())
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["onboarding", "plan_picker", "qualify_lead"]);
    }
}
