use crate::errors::ConfigError;

/// Prompt wire encodings understood by the backend pool.
///
/// ChatML (`<|im_start|>role` / `<|im_end|>`) is the canonical dialect the
/// client speaks; Granite backends expect `<|start_of_role|>role<|end_of_role|>`
/// / `<|end_of_text|>` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptFormat {
    ChatMl,
    Granite,
}

/// Marker pairs, canonical on the left. Substitution is marker-for-marker and
/// never touches surrounding whitespace, so translating there and back is
/// lossless whether or not a newline follows the role marker.
const MARKER_PAIRS: [(&str, &str); 4] = [
    ("<|im_start|>system", "<|start_of_role|>system<|end_of_role|>"),
    ("<|im_start|>user", "<|start_of_role|>user<|end_of_role|>"),
    ("<|im_start|>assistant", "<|start_of_role|>assistant<|end_of_role|>"),
    ("<|im_end|>", "<|end_of_text|>"),
];

impl PromptFormat {
    /// Parses a configured format name. Unknown names are rejected here, at
    /// startup, never at request time.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "raw" | "chatml" => Ok(Self::ChatMl),
            "granite" => Ok(Self::Granite),
            other => Err(ConfigError::InvalidFormat(other.to_owned())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatMl => "chatml",
            Self::Granite => "granite",
        }
    }

    /// Canonical prompt → this backend's on-wire encoding.
    pub fn to_wire(&self, prompt: &str) -> String {
        match self {
            Self::ChatMl => prompt.to_owned(),
            Self::Granite => MARKER_PAIRS
                .iter()
                .fold(prompt.to_owned(), |text, (canonical, wire)| {
                    text.replace(canonical, wire)
                }),
        }
    }

    /// This backend's on-wire encoding → canonical prompt.
    pub fn to_canonical(&self, wire: &str) -> String {
        match self {
            Self::ChatMl => wire.to_owned(),
            Self::Granite => MARKER_PAIRS
                .iter()
                .fold(wire.to_owned(), |text, (canonical, marker)| {
                    text.replace(marker, canonical)
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_and_chatml_are_identity() {
        let prompt = "<|im_start|>user\nhello<|im_end|>\n";
        assert_eq!(PromptFormat::ChatMl.to_wire(prompt), prompt);
        assert_eq!(PromptFormat::ChatMl.to_canonical(prompt), prompt);
    }

    #[test]
    fn granite_wire_uses_role_tags() {
        let prompt = "<|im_start|>system\nYou are terse.<|im_end|>\n<|im_start|>user\nhi<|im_end|>\n<|im_start|>assistant\n";
        let wire = PromptFormat::Granite.to_wire(prompt);
        assert!(wire.contains("<|start_of_role|>system<|end_of_role|>"));
        assert!(wire.contains("<|start_of_role|>user<|end_of_role|>"));
        assert!(wire.contains("<|start_of_role|>assistant<|end_of_role|>"));
        assert!(wire.contains("<|end_of_text|>"));
        assert!(!wire.contains("<|im_start|>"));
        assert!(!wire.contains("<|im_end|>"));
    }

    #[test]
    fn round_trips_with_trailing_newline_after_markers() {
        let prompt = "<|im_start|>system\nYou are terse.<|im_end|>\n<|im_start|>user\nhi<|im_end|>\n<|im_start|>assistant\n";
        let wire = PromptFormat::Granite.to_wire(prompt);
        assert_eq!(PromptFormat::Granite.to_canonical(&wire), prompt);
    }

    #[test]
    fn round_trips_without_trailing_newline_after_markers() {
        let prompt = "<|im_start|>user hi<|im_end|><|im_start|>assistant";
        let wire = PromptFormat::Granite.to_wire(prompt);
        assert_eq!(PromptFormat::Granite.to_canonical(&wire), prompt);
    }

    #[test]
    fn unknown_format_is_a_config_error() {
        let error = PromptFormat::parse("mistral").expect_err("unknown format should fail");
        assert!(error.to_string().contains("mistral"));
    }

    #[test]
    fn parse_accepts_known_names_case_insensitively() {
        assert_eq!(
            PromptFormat::parse("RAW").expect("raw parses"),
            PromptFormat::ChatMl
        );
        assert_eq!(
            PromptFormat::parse("Granite").expect("granite parses"),
            PromptFormat::Granite
        );
    }
}
