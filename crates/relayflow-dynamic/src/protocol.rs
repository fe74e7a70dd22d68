use serde_json::json;

/// Calling protocol appended to the form description.
pub(crate) fn form_protocol() -> String {
    [
        "",
        "## DYNAMIC FORM PROTOCOL",
        "",
        "This tool uses an AI-driven form. You gather information through natural",
        "conversation instead of following rigid steps.",
        "",
        "1. Call with `action: \"start\"` to get the field requirements.",
        "2. The response tells you what information is needed:",
        "   - `fields`: Schema of all active fields (type, label, options, hints)",
        "   - `gathered`: What has already been collected",
        "   - `missing`: Required fields still needed",
        "   - `errors`: Validation errors for previously submitted values",
        "3. Gather the missing information through natural conversation:",
        "   - Ask about multiple related fields in one message when appropriate",
        "   - If the user already provided information, include it; don't re-ask",
        "   - Follow field `hint` values for questioning style guidance",
        "   - Respect `dependsOn`: gather dependency fields first",
        "   - For `select` fields, present the available options",
        "   - Fields with type `widget` are handled automatically; do NOT gather them",
        "4. Call with `action: \"submit\"` and `data` containing gathered values.",
        "5. Check the response `status`:",
        "   - `\"gathering\"`: More fields needed, see `missing` and `errors`",
        "   - `\"widget\"`: A widget UI is being shown; do NOT call again until callback",
        "   - `\"complete\"`: Done, present the `result` to the user",
        "",
        "Important:",
        "- Partial submissions are encouraged; submit what you have so far",
        "- ALWAYS pass back `state` exactly as received",
        "- Combine related questions naturally instead of asking one at a time",
        "- If a field has an error, explain the issue and ask for correction",
    ]
    .join("\n")
}

pub(crate) fn input_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["start", "submit", "widget_result"],
                "description": "\"start\" to begin, \"submit\" to send gathered data, \"widget_result\" when a widget returns data"
            },
            "data": {
                "type": "object",
                "description": "Gathered field values to submit"
            },
            "step": {
                "type": "string",
                "description": "The widget field name (for widget_result action)"
            },
            "state": {
                "type": "object",
                "description": "Flow state - pass back exactly as received"
            },
            "widgetResult": {
                "type": "object",
                "description": "Data returned by a widget callback"
            }
        },
        "required": ["action"]
    })
}
