use once_cell::sync::Lazy;

use crate::schema::SmellSchema;

const TEMPLATE_PREAMBLE: &str = "You are a computer science professor who analyzes your students' source code looking for code smells, SOLID principle violations, tell dont ask principle violations and demeter law violation, and generates a JSON report marking `true` for the problems identified in the provided snippet and `false` for those not present in the provided snippet. The answer must contain only the JSON object, without any additional text. The JSON object must contain the following keys: ";
const TEMPLATE_SNIPPET_LEAD: &str = ". This is the code snippet: ";

static DEFAULT_TEMPLATE: Lazy<String> =
    Lazy::new(|| instruction_template(SmellSchema::default_schema()));

/// Render the instruction template asking for a JSON report over `schema`'s keys.
pub fn instruction_template(schema: &SmellSchema) -> String {
    let keys = schema
        .iter()
        .map(|key| format!("'{key}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{TEMPLATE_PREAMBLE}{keys}{TEMPLATE_SNIPPET_LEAD}")
}

/// Instruction template for the default schema, rendered once per process.
pub fn default_template() -> &'static str {
    &DEFAULT_TEMPLATE
}

/// Concatenate the instruction template and the snippet, exactly as sent to the model.
pub fn build_prompt(template: &str, snippet: &str) -> String {
    let mut prompt = String::with_capacity(template.len() + snippet.len());
    prompt.push_str(template);
    prompt.push_str(snippet);
    prompt
}
