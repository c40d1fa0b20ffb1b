/// Combine the notebook context block and the user's question into one prompt.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("{}\n\nQuestion: {}\n\nAnswer:", context, question)
}
