//! Fixed prompts for the outfit critique call.

/// The six critique dimensions every analysis must cover. Kept stable so
/// responses stay comparable across checks.
pub const SYSTEM_PROMPT: &str = "You are an expert fashion consultant analyzing outfit images.
Provide detailed feedback on the outfit in the image including:
1. Style identification (casual, formal, business, etc.)
2. Color coordination analysis
3. Fit assessment
4. Occasion appropriateness
5. Suggestions for improvements or alternatives
6. Accessory recommendations";

/// Text prompt used when the caller supplies none.
pub const DEFAULT_USER_PROMPT: &str =
    "Please analyze this outfit and provide detailed fashion advice.";

/// Concatenate the fixed system prompt with any caller-supplied additional
/// instructions.
pub fn build_system_prompt(additional_instructions: Option<&str>) -> String {
    match additional_instructions {
        Some(extra) if !extra.trim().is_empty() => format!("{}\n\n{}", SYSTEM_PROMPT, extra),
        _ => SYSTEM_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_names_all_six_dimensions() {
        assert!(SYSTEM_PROMPT.contains("Style identification"));
        assert!(SYSTEM_PROMPT.contains("Color coordination"));
        assert!(SYSTEM_PROMPT.contains("Fit assessment"));
        assert!(SYSTEM_PROMPT.contains("Occasion appropriateness"));
        assert!(SYSTEM_PROMPT.contains("improvements or alternatives"));
        assert!(SYSTEM_PROMPT.contains("Accessory recommendations"));
    }

    #[test]
    fn test_build_system_prompt_without_extra() {
        assert_eq!(build_system_prompt(None), SYSTEM_PROMPT);
        assert_eq!(build_system_prompt(Some("   ")), SYSTEM_PROMPT);
    }

    #[test]
    fn test_build_system_prompt_appends_extra() {
        let prompt = build_system_prompt(Some("Format your response in sections."));
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with("Format your response in sections."));
    }
}
