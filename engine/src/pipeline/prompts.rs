//! Prompt builders for the generation stages.

/// Build the answer-generation prompt: grounding context first, then any
/// past dissatisfaction feedback so the model adapts its style, then the
/// question.
pub fn answer_prompt(question: &str, context: &str, feedbacks: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str("Answer the user's question using the context below.\n");
    prompt.push_str("If the context is empty or insufficient, answer from general knowledge and say so.\n\n");
    prompt.push_str("Context:\n");
    prompt.push_str(context);
    prompt.push('\n');

    if !feedbacks.is_empty() {
        prompt.push_str("\nThe user was dissatisfied with earlier answers for these reasons. Adapt your style accordingly:\n");
        for feedback in feedbacks {
            prompt.push_str("- ");
            prompt.push_str(feedback);
            prompt.push('\n');
        }
    }

    prompt.push_str("\nQuestion: ");
    prompt.push_str(question);
    prompt.push('\n');
    prompt
}

/// Build the intent-inference prompt. The model is asked for strict JSON so
/// the structured output can be parsed into a list of predicted follow-up
/// questions.
pub fn intent_prompt(question: &str, answer: &str, context: &str) -> String {
    format!(
        "The user asked: {question}\n\
         The previous answer was: {answer}\n\
         Context: {context}\n\n\
         Infer the user's deeper intent and predict their next likely questions (1 to 3).\n\
         Respond with JSON only, in the form {{\"intents\": [\"question 1\", \"question 2\"]}}.\n"
    )
}
