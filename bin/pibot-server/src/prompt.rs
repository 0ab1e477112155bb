//! Final prompt composition.
//!
//! Two fixed templates: one that embeds a formatted web-search block with
//! citation instructions, and a plain formatting template. Both start with
//! the configured system prompt followed by a blank line when one is set.

/// Compose the prompt sent to the generation backend.
pub fn build(system_prompt: &str, user_message: &str, search_block: Option<&str>) -> String {
    let base = if system_prompt.is_empty() {
        String::new()
    } else {
        format!("{system_prompt}\n\n")
    };

    match search_block {
        Some(context) => format!(
            "{base}You are a helpful AI assistant. A user has asked: \"{user_message}\"\n\
             \n\
             {context}\n\
             \n\
             Please provide a well-structured, comprehensive answer following these formatting guidelines:\n\
             \n\
             1. Start with a clear, direct answer to the question\n\
             2. Use bullet points or numbered lists when appropriate\n\
             3. Add line breaks between different topics or sections\n\
             4. When referencing web sources, mention them clearly\n\
             5. Use clear headings or separators for different sections\n\
             6. Keep paragraphs concise and readable\n\
             7. End with a brief summary if the answer is long\n\
             \n\
             User's question: {user_message}\n\
             \n\
             Please format your response clearly with proper spacing and structure."
        ),
        None => format!(
            "{base}You are a helpful AI assistant. Please provide a well-structured response to the following question.\n\
             \n\
             Use clear formatting with:\n\
             - Bullet points or numbered lists when appropriate\n\
             - Line breaks between different topics\n\
             - Clear, concise paragraphs\n\
             - Proper spacing for readability\n\
             \n\
             User's question: {user_message}\n\
             \n\
             Please provide a comprehensive, well-formatted answer:"
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_template_without_system_prompt() {
        let prompt = build("", "Why is the sky blue?", None);
        assert!(prompt.starts_with("You are a helpful AI assistant. Please provide"));
        assert!(prompt.contains("\n\nUse clear formatting with:\n- Bullet points"));
        assert!(prompt.contains("User's question: Why is the sky blue?\n\n"));
        assert!(prompt.ends_with("Please provide a comprehensive, well-formatted answer:"));
    }

    #[test]
    fn system_prompt_is_followed_by_a_blank_line() {
        let prompt = build("Be brief.", "hi", None);
        assert!(prompt.starts_with("Be brief.\n\nYou are a helpful AI assistant."));
    }

    #[test]
    fn augmented_template_embeds_block_and_question_twice() {
        let block = "[WEB_SEARCH_START]ctx[WEB_SEARCH_END]\n";
        let prompt = build("SYS", "latest news?", Some(block));
        assert!(prompt.starts_with(
            "SYS\n\nYou are a helpful AI assistant. A user has asked: \"latest news?\"\n\n[WEB_SEARCH_START]ctx"
        ));
        assert!(prompt.contains("7. End with a brief summary if the answer is long\n\nUser's question: latest news?"));
        assert!(prompt.ends_with("proper spacing and structure."));
    }

    #[test]
    fn build_is_deterministic() {
        assert_eq!(build("a", "b", Some("c")), build("a", "b", Some("c")));
    }
}
