//! Prompt text for perspective legs and the synthesis call

use crate::types::{Message, PerspectiveResult};

/// Instruction appended to each leg's conversation
pub(crate) fn perspective_instruction(word_cap: u32) -> String {
    format!(
        "Give your own independent answer to the user's last message. \
         Be specific: name concrete numbers, options or actions where they apply. \
         Commit to a clear recommendation instead of hedging or listing every possibility. \
         Keep it under {} words.",
        word_cap
    )
}

/// Leg conversation: the original messages plus the perspective instruction
pub(crate) fn perspective_messages(messages: &[Message], word_cap: u32) -> Vec<Message> {
    let mut leg = Vec::with_capacity(messages.len() + 1);
    leg.extend_from_slice(messages);
    leg.push(Message::system(perspective_instruction(word_cap)));
    leg
}

/// Synthesis conversation: the original messages plus one block carrying
/// every labeled perspective and the fusion rules.
pub(crate) fn synthesis_messages(messages: &[Message], perspectives: &[PerspectiveResult]) -> Vec<Message> {
    let mut synthesis = Vec::with_capacity(messages.len() + 1);
    synthesis.extend_from_slice(messages);
    synthesis.push(Message::system(synthesis_instruction(perspectives)));
    synthesis
}

fn synthesis_instruction(perspectives: &[PerspectiveResult]) -> String {
    let mut prompt = String::from(
        "Several independent analyses of the user's last message are below. \
         Write the single best answer to the user, in one voice.\n\n",
    );
    for p in perspectives {
        prompt.push_str(&format!("### {}\n{}\n\n", p.display_name, p.text.trim()));
    }
    prompt.push_str(
        "## Rules\n\
         - Never mention analyses, perspectives, models, AI systems or sources. Answer as yourself.\n\
         - Where the analyses agree, state the conclusion with confidence.\n\
         - Where they disagree, weigh the arguments and take a side, saying briefly what would change your mind.\n\
         - Add your own judgment: at least one insight or recommendation that goes beyond what is written above.\n\
         - Be direct and specific. No preamble.",
    );
    prompt
}

/// Perspective with the most characters; the first one wins ties
pub(crate) fn longest_perspective(perspectives: &[PerspectiveResult]) -> Option<&PerspectiveResult> {
    perspectives.iter().fold(None, |best: Option<&PerspectiveResult>, p| match best {
        Some(b) if b.text.chars().count() >= p.text.chars().count() => Some(b),
        _ => Some(p),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn perspective(id: &str, name: &str, text: &str) -> PerspectiveResult {
        PerspectiveResult {
            provider_id: id.to_string(),
            display_name: name.to_string(),
            text: text.to_string(),
            elapsed_ms: 100,
        }
    }

    #[test]
    fn test_perspective_messages_append_instruction() {
        let original = vec![Message::system("Identity."), Message::user("Hold or sell?")];
        let leg = perspective_messages(&original, 150);
        assert_eq!(leg.len(), 3);
        assert_eq!(&leg[..2], &original[..]);
        assert_eq!(leg[2].role, Role::System);
        assert!(leg[2].content.contains("under 150 words"));
    }

    #[test]
    fn test_synthesis_labels_each_perspective() {
        let perspectives = vec![
            perspective("anthropic", "Claude", "Hold until Q4."),
            perspective("openai", "GPT", "Sell half now."),
        ];
        let messages = synthesis_messages(&[Message::user("Hold or sell?")], &perspectives);
        let block = &messages.last().unwrap().content;
        assert!(block.contains("### Claude\nHold until Q4."));
        assert!(block.contains("### GPT\nSell half now."));
        assert!(block.contains("Never mention"));
        assert!(block.contains("disagree"));
        assert_eq!(messages[0], Message::user("Hold or sell?"));
    }

    #[test]
    fn test_longest_perspective() {
        let perspectives = vec![
            perspective("a", "A", "short"),
            perspective("b", "B", "the longest answer"),
            perspective("c", "C", "medium one"),
        ];
        assert_eq!(longest_perspective(&perspectives).unwrap().provider_id, "b");
    }

    #[test]
    fn test_longest_perspective_tie_keeps_first() {
        let perspectives = vec![perspective("a", "A", "same"), perspective("b", "B", "four")];
        assert_eq!(longest_perspective(&perspectives).unwrap().provider_id, "a");
        assert!(longest_perspective(&[]).is_none());
    }
}
