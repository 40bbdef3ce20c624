//! Prompt construction for SOAP note generation. Pure and deterministic.

pub const SYSTEM_PROMPT: &str = "You are a clinical documentation assistant. Generate a structured \
SOAP note from the given doctor-patient conversation. Be concise, factual, and avoid hallucinations.";

const USER_TEMPLATE_HEAD: &str = "You will be given a transcript of a patient-provider conversation.
Produce a SOAP note with **four** sections, each starting on its own line with the exact headings:
S: ...
O: ...
A: ...
P: ...

Constraints:
- Use professional clinical language.
- Do not invent tests or facts absent from the transcript.
- If information is missing for a section, write \"None reported\".
- Keep each section under 5 bullet points; use short phrases.

Conversation:
";

#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn render_prompt(dialogue: &str) -> Prompt {
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!("{USER_TEMPLATE_HEAD}{}\n", dialogue.trim()),
    }
}
