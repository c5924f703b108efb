//! Bounded conversation history and prompt assembly.

use mica_llm::provider::{Message, Role};

/// Estimate token count using the chars/4 heuristic.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Cumulative token accounting for a session, fed by estimates or by
/// provider-reported usage when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl UsageTotals {
    pub fn record(&mut self, prompt_tokens: usize, completion_tokens: usize) {
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Trimming bounds for one conversation.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Turns (user + assistant pairs) to keep.
    pub max_turns: usize,
    /// Optional character budget across all stored entries.
    pub max_chars: Option<usize>,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_turns: 10,
            max_chars: Some(8000),
        }
    }
}

/// An explicit, caller-owned dialogue log.
///
/// Stores user/assistant turns; system instructions live only in
/// [`assemble_prompt`](Self::assemble_prompt), so trimming never evicts them.
#[derive(Debug, Default)]
pub struct ConversationSession {
    entries: Vec<Message>,
    usage: UsageTotals,
}

impl ConversationSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.entries.push(message);
    }

    #[must_use]
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn total_chars(&self) -> usize {
        self.entries.iter().map(|m| m.content.chars().count()).sum()
    }

    #[must_use]
    pub fn usage(&self) -> UsageTotals {
        self.usage
    }

    pub fn record_usage(&mut self, prompt_tokens: usize, completion_tokens: usize) {
        self.usage.record(prompt_tokens, completion_tokens);
    }

    /// Record the assistant's reply for the current turn.
    pub fn commit_reply(&mut self, text: impl Into<String>) {
        self.entries.push(Message::assistant(text));
    }

    /// Bound the history: keep the most recent `max_turns * 2` entries, then
    /// drop the oldest non-system entry while the character budget is
    /// exceeded and more than one exchange remains.
    pub fn trim(&mut self, max_turns: usize, max_chars: Option<usize>) {
        let max_entries = max_turns * 2;
        if self.entries.len() > max_entries {
            self.entries.drain(..self.entries.len() - max_entries);
        }

        let Some(budget) = max_chars else { return };
        while self.total_chars() > budget && self.entries.len() > 2 {
            let Some(oldest) = self
                .entries
                .iter()
                .position(|m| m.role != Role::System)
            else {
                break;
            };
            self.entries.remove(oldest);
        }
    }

    /// Build the prompt for a generation call: system instructions first,
    /// retrieved context as a second system entry when non-empty, then the
    /// stored history. Read-only.
    #[must_use]
    pub fn assemble_prompt(
        &self,
        system_instructions: &str,
        retrieved_context: &str,
    ) -> Vec<Message> {
        let mut prompt = Vec::with_capacity(self.entries.len() + 2);
        prompt.push(Message::system(system_instructions));
        if !retrieved_context.is_empty() {
            prompt.push(Message::system(retrieved_context));
        }
        prompt.extend(self.entries.iter().cloned());
        prompt
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_turns(turns: usize) -> ConversationSession {
        let mut session = ConversationSession::new();
        for i in 0..turns {
            session.append(Message::user(format!("question {i}")));
            session.append(Message::assistant(format!("answer {i}")));
        }
        session
    }

    #[test]
    fn trim_keeps_last_two_turns() {
        let mut session = session_with_turns(5);
        assert_eq!(session.len(), 10);

        session.trim(2, None);
        assert_eq!(session.len(), 4);
        assert_eq!(session.entries()[0].content, "question 3");
        assert_eq!(session.entries()[3].content, "answer 4");
    }

    #[test]
    fn trim_noop_when_under_limit() {
        let mut session = session_with_turns(2);
        session.trim(10, None);
        assert_eq!(session.len(), 4);
    }

    #[test]
    fn char_budget_drops_oldest_first() {
        let mut session = ConversationSession::new();
        session.append(Message::user("aaaaaaaaaa"));
        session.append(Message::assistant("bbbbbbbbbb"));
        session.append(Message::user("cccccccccc"));
        session.append(Message::assistant("dddddddddd"));

        session.trim(10, Some(25));
        assert_eq!(session.len(), 2);
        assert_eq!(session.entries()[0].content, "cccccccccc");
    }

    #[test]
    fn char_budget_never_drops_below_one_exchange() {
        let mut session = ConversationSession::new();
        session.append(Message::user("a very long user message indeed"));
        session.append(Message::assistant("a very long assistant reply too"));

        session.trim(10, Some(4));
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn char_budget_skips_system_entries() {
        let mut session = ConversationSession::new();
        session.append(Message::system("pinned note"));
        session.append(Message::user("aaaaaaaaaaaaaaaaaaaa"));
        session.append(Message::assistant("bbbbbbbbbbbbbbbbbbbb"));
        session.append(Message::user("c"));

        session.trim(10, Some(15));
        assert!(session.entries().iter().any(|m| m.role == Role::System));
        assert!(session.entries().iter().all(|m| m.content != "aaaaaaaaaaaaaaaaaaaa"));
    }

    #[test]
    fn assemble_prompt_prepends_system() {
        let mut session = ConversationSession::new();
        session.append(Message::user("hi"));

        let prompt = session.assemble_prompt("be helpful", "");
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, Role::System);
        assert_eq!(prompt[0].content, "be helpful");
        assert_eq!(prompt[1].content, "hi");
    }

    #[test]
    fn assemble_prompt_adds_context_entry() {
        let mut session = ConversationSession::new();
        session.append(Message::user("hi"));

        let prompt = session.assemble_prompt("be helpful", "excerpt one");
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[1].role, Role::System);
        assert_eq!(prompt[1].content, "excerpt one");
    }

    #[test]
    fn assemble_prompt_is_pure() {
        let mut session = ConversationSession::new();
        session.append(Message::user("hi"));
        let _ = session.assemble_prompt("sys", "ctx");
        assert_eq!(session.len(), 1);
        assert_eq!(session.entries()[0].content, "hi");
    }

    #[test]
    fn commit_reply_appends_assistant() {
        let mut session = ConversationSession::new();
        session.append(Message::user("hi"));
        session.commit_reply("hello!");
        assert_eq!(session.entries()[1].role, Role::Assistant);
        assert_eq!(session.entries()[1].content, "hello!");
    }

    #[test]
    fn reset_clears_entries() {
        let mut session = session_with_turns(3);
        session.reset();
        assert!(session.is_empty());
    }

    #[test]
    fn usage_accumulates() {
        let mut session = ConversationSession::new();
        session.record_usage(100, 20);
        session.record_usage(50, 10);
        assert_eq!(session.usage().prompt_tokens, 150);
        assert_eq!(session.usage().completion_tokens, 30);
        assert_eq!(session.usage().total(), 180);
    }

    #[test]
    fn estimate_tokens_heuristic() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("word"), 1);
        assert_eq!(estimate_tokens("Hello world"), 2);
        assert_eq!(estimate_tokens(&"a".repeat(100)), 25);
    }

    #[test]
    fn estimate_tokens_counts_chars_not_bytes() {
        assert_eq!(estimate_tokens("가나다라"), 1);
    }

    #[test]
    fn total_chars_counts_all_entries() {
        let mut session = ConversationSession::new();
        session.append(Message::user("abc"));
        session.append(Message::assistant("defg"));
        assert_eq!(session.total_chars(), 7);
    }
}
