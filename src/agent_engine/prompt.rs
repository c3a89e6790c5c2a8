use crate::agent_engine::action::ActionProtocol;
use crate::agent_engine::history::ActionHistory;
use crate::perception::types::UIElement;

const PREAMBLE: &str = "\
You are an AI assistant controlling a computer. Your goal is to complete the user's instruction.";

const COORDINATE_VOCABULARY: &str = "\
You will be given a screenshot of the current screen. Based on the screenshot and the instruction, decide the next single action to perform.
Respond with a JSON object describing the next single action. The possible actions are:
- `TYPE`: type a string of text. `text` property is required.
- `CLICK`: click the mouse at a specific screen coordinate. `x` and `y` properties are required.
- `DONE`: the instruction is complete.
Example for typing: {\"action\": \"TYPE\", \"text\": \"hello world\"}
Example for clicking: {\"action\": \"CLICK\", \"x\": 123, \"y\": 456}
Example for finishing: {\"action\": \"DONE\"}";

const ACCESSIBILITY_VOCABULARY: &str = "\
You will be given a screenshot of the current screen and a list of the interactive controls of the foreground window.
Respond with a JSON object describing the next single action. The possible actions are:
- `INVOKE`: activate a control (press a button, follow a link, select an item). `control` is required.
- `SET_VALUE`: replace the text of an editable control. `control` and `value` are required.
- `DONE`: the instruction is complete.
`control` identifies one control from the list by any of `name`, `type` and `automationId`; every field you give must match exactly.
Example for invoking: {\"action\": \"INVOKE\", \"control\": {\"name\": \"Save\", \"type\": \"Button\"}}
Example for setting a value: {\"action\": \"SET_VALUE\", \"control\": {\"automationId\": \"SearchBox\"}, \"value\": \"quarterly report\"}
Example for finishing: {\"action\": \"DONE\"}";

/// Assembles the per-step prompt: instruction, vocabulary with examples,
/// history so far and, in accessibility mode, the element snapshot.
pub fn build_prompt(
    instruction: &str,
    protocol: ActionProtocol,
    history: &ActionHistory,
    elements: &[UIElement],
) -> String {
    let mut out = String::new();
    out.push_str(PREAMBLE);
    out.push('\n');
    out.push_str(&format!("The user's instruction is: '{instruction}'.\n"));

    if !history.is_empty() {
        out.push_str("So far, you have performed these actions:\n");
        for line in history.render() {
            out.push_str(&line);
            out.push('\n');
        }
    }

    match protocol {
        ActionProtocol::Coordinate => {
            out.push_str(COORDINATE_VOCABULARY);
            out.push('\n');
        }
        ActionProtocol::Accessibility => {
            out.push_str(ACCESSIBILITY_VOCABULARY);
            out.push('\n');
            out.push_str("Interactive controls currently on screen:\n");
            if elements.is_empty() {
                out.push_str("(none found)\n");
            }
            for el in elements {
                let line = serde_json::to_string(el).unwrap_or_else(|_| el.name.clone());
                out.push_str(&line);
                out.push('\n');
            }
        }
    }

    out.push_str("Analyze the screen and provide only the JSON for the very next action to take.");
    out
}
