//! Prompt construction for grounded answers and file briefs.
//!
//! Grounding is enforced only by the instructions in the prompt text. The
//! engine guarantees that the prompt contains nothing but the retrieved
//! chunk texts and the question.

/// Separator placed between retrieved chunks in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Context text used when retrieval returned nothing.
pub const NO_CONTEXT: &str = "No context available.";

/// Build the answer prompt from retrieved chunk texts and the question.
///
/// The question is always included, even when `context_docs` is empty.
pub fn build_grounding_prompt(query: &str, context_docs: &[String]) -> String {
    let context = if context_docs.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        context_docs.join(CONTEXT_SEPARATOR)
    };

    format!(
        "You are an assistant explaining code and repository contents.\n\
         Answer using only the context below. If the context does not contain \
         the answer, say so.\n\
         Give a short summary and a beginner-friendly explanation, and mention \
         the file paths you relied on.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question:\n\
         {query}\n\
         \n\
         Answer:\n"
    )
}

/// Build the prompt asking for a short description of one file.
pub fn build_brief_prompt(content: &str) -> String {
    format!(
        "You are a helpful assistant. Read the following file content and give a \
         short, beginner-friendly summary covering the purpose of the file and \
         its main components. Be concise.\n\
         \n\
         File content:\n\
         {content}\n\
         \n\
         Summary:\n"
    )
}
