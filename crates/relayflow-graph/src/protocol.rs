use serde_json::json;

/// Calling protocol appended to the flow description.
pub(crate) fn flow_protocol() -> String {
    [
        "",
        "## FLOW EXECUTION PROTOCOL",
        "",
        "This tool implements a multi-step conversational flow. Follow this protocol exactly:",
        "",
        "1. Call with `action: \"start\"` to begin.",
        "2. The response JSON `status` field tells you what to do next:",
        "   - `\"interrupt\"`: Ask the user the `question`. Then call again with:",
        "     `action: \"continue\"`, `step` = the returned `step`, `field` = the returned `field`,",
        "     `state` = the returned `state`, `answer` = the user's answer.",
        "   - `\"widget\"`: A widget UI is being shown. Do NOT call this tool again; the widget handles the callback.",
        "   - `\"complete\"`: The flow is done. Present the result to the user.",
        "   - `\"error\"`: Something went wrong. Show the `error` message.",
        "",
        "3. ALWAYS pass back the `state` object exactly as received.",
        "4. Do NOT skip steps or invent state values.",
    ]
    .join("\n")
}

pub(crate) fn input_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["start", "continue", "widget_result"],
                "description": "\"start\" to begin the flow, \"continue\" after the user answers a question, \"widget_result\" when a widget returns data"
            },
            "step": {
                "type": "string",
                "description": "Current step name (from the previous response)"
            },
            "field": {
                "type": "string",
                "description": "Field name from the previous interrupt response"
            },
            "state": {
                "type": "object",
                "description": "Flow state - pass back exactly as received"
            },
            "answer": {
                "type": "string",
                "description": "The user's answer (for interrupt steps)"
            },
            "widgetResult": {
                "type": "object",
                "description": "Data returned by a widget callback"
            }
        },
        "required": ["action"]
    })
}
