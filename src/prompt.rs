//! Prompt templates shared by every query generator backend.
//!
//! The system prompt is fixed; the user prompt has two slots, filled with the
//! schema description and the user's question, in that order.

/// Instruction sent as the system message to every backend.
pub const SYSTEM_PROMPT: &str = "
You are an expert in generating SQL queries based on the Natural Language Query from the user.
You will be provided with the Database Schema below (delimited by <db_schema></db_schema>) and the user's query (delimited by <user_query></user_query>).

VERY IMPORTANT:
- Only output the SQL query as plain text. No explanations, no prefixes, and no suffixes.
- The SQL query should be ready to execute directly.
- Do not format the SQL query in markdown, code blocks, or any other style.
";

/// User message template. `{}` slots: schema, then question.
pub const USER_PROMPT: &str = "
<db_schema>
{}
</db_schema>
--------
<user_query>
{}
</user_query>
";

const SLOT: &str = "{}";

/// A system instruction paired with a two-slot user template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user: USER_PROMPT.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Fill the user template with the schema and question.
    ///
    /// Slots are filled left to right. Substituted text is never rescanned,
    /// so braces inside the schema or question come through untouched.
    /// Missing slots leave the remaining arguments unused; extra slots are
    /// left as-is.
    pub fn render_user(&self, schema: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.user.len() + schema.len() + question.len());
        let mut args = [schema, question].into_iter();
        let mut rest = self.user.as_str();

        while let Some(idx) = rest.find(SLOT) {
            out.push_str(&rest[..idx]);
            match args.next() {
                Some(arg) => out.push_str(arg),
                None => out.push_str(SLOT),
            }
            rest = &rest[idx + SLOT.len()..];
        }
        out.push_str(rest);
        out
    }
}
