use crate::language::LanguageProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineClass {
    pub kind: LineKind,
    pub is_function: bool,
    pub is_class: bool,
}

impl LineClass {
    const fn plain(kind: LineKind) -> Self {
        LineClass {
            kind,
            is_function: false,
            is_class: false,
        }
    }
}

/// Classify one line on its own, with no memory of earlier lines.
///
/// A comment pattern may match anywhere in the line, so code followed by an
/// inline block comment counts as a comment line.
pub fn classify(line: &str, profile: &LanguageProfile) -> LineClass {
    if line.trim().is_empty() {
        return LineClass::plain(LineKind::Blank);
    }

    if profile
        .comment_patterns()
        .iter()
        .any(|pattern| pattern.is_match(line))
    {
        return LineClass::plain(LineKind::Comment);
    }

    LineClass {
        kind: LineKind::Code,
        is_function: profile
            .function_pattern()
            .is_some_and(|pattern| pattern.is_match(line)),
        is_class: profile
            .class_pattern()
            .is_some_and(|pattern| pattern.is_match(line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{LanguageRegistry, ProfileSpec};

    fn profile(spec: ProfileSpec) -> LanguageProfile {
        LanguageProfile::compile(&spec).expect("test profile should compile")
    }

    fn go_like() -> LanguageProfile {
        profile(ProfileSpec {
            name: "GoLike",
            extensions: &[".gl"],
            function: Some(r"^\s*func\s+\w+\s*\("),
            class: Some(r"^\s*type\s+\w+\s+struct"),
            comments: &[r"^\s*//"],
        })
    }

    #[test]
    fn test_line_comment_is_comment() {
        assert_eq!(classify("// comment", &go_like()).kind, LineKind::Comment);
        assert_eq!(
            classify("    // indented", &go_like()).kind,
            LineKind::Comment
        );
    }

    #[test]
    fn test_whitespace_only_is_blank_for_any_profile() {
        let empty = profile(ProfileSpec {
            name: "Empty",
            extensions: &[],
            function: None,
            class: None,
            comments: &[],
        });
        for p in [go_like(), empty] {
            assert_eq!(classify("    ", &p), LineClass::plain(LineKind::Blank));
            assert_eq!(classify("\t \t", &p).kind, LineKind::Blank);
            assert_eq!(classify("", &p).kind, LineKind::Blank);
        }
    }

    #[test]
    fn test_function_declaration_is_flagged() {
        let class = classify("func Foo() {", &go_like());
        assert_eq!(class.kind, LineKind::Code);
        assert!(class.is_function);
        assert!(!class.is_class);
    }

    #[test]
    fn test_trailing_comment_anywhere_pattern_wins() {
        let p = profile(ProfileSpec {
            name: "Trailing",
            extensions: &[],
            function: None,
            class: None,
            comments: &[r"//"],
        });
        assert_eq!(classify("x := 1 // trailing", &p).kind, LineKind::Comment);
    }

    #[test]
    fn test_inline_block_comment_marks_whole_line() -> crate::error::Result<()> {
        let registry = LanguageRegistry::builtin()?;
        let rust = registry.get("Rust").expect("Rust profile");
        assert_eq!(
            classify("let x = 1; /* note */", rust).kind,
            LineKind::Comment
        );
        // opening a block comment is not tracked to later lines
        assert_eq!(classify("/* start", rust).kind, LineKind::Code);
        assert_eq!(classify("still inside */", rust).kind, LineKind::Code);
        Ok(())
    }

    #[test]
    fn test_function_and_class_are_independent() {
        let p = profile(ProfileSpec {
            name: "Both",
            extensions: &[],
            function: Some(r"\bdef\b"),
            class: Some(r"\bclass\b"),
            comments: &[r"^\s*#"],
        });
        let both = classify("class A: def f(self): pass", &p);
        assert!(both.is_function && both.is_class);
        let neither = classify("x = 1", &p);
        assert!(!neither.is_function && !neither.is_class);
        // comment lines never count as declarations
        let commented = classify("# def f():", &p);
        assert_eq!(commented, LineClass::plain(LineKind::Comment));
    }

    #[test]
    fn test_indentation_sensitive_patterns_see_untrimmed_line() {
        let p = profile(ProfileSpec {
            name: "TopLevel",
            extensions: &[],
            function: Some(r"^def\s"),
            class: None,
            comments: &[r"^#"],
        });
        assert!(classify("def top():", &p).is_function);
        assert!(!classify("    def nested():", &p).is_function);
        assert_eq!(classify("    # indented", &p).kind, LineKind::Code);
    }
}
