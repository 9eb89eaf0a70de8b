/// Translation path selected for one source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// `@Name`; carries the text after the marker.
    UnitDirective(&'a str),
    /// `func ...`; carries the whole line.
    FunctionDeclaration(&'a str),
    /// `###name(...) # intent # type`; carries the whole line.
    AiFunction(&'a str),
    /// Anything else, blank lines included.
    Generic(&'a str),
}

pub const UNIT_MARKER: &str = "@";
pub const FUNCTION_KEYWORD: &str = "func";
pub const AI_FUNCTION_MARKER: &str = "###";

/// Classifies a trimmed line by its prefix.
///
/// Prefixes are checked in a fixed order: unit directive, function
/// declaration, AI-function marker. The first hit decides.
///
/// # Examples
///
/// ```
/// use guav_core::classify::{classify_line, LineKind};
///
/// assert_eq!(classify_line("@Hello"), LineKind::UnitDirective("Hello"));
/// assert_eq!(classify_line("func greet()"), LineKind::FunctionDeclaration("func greet()"));
/// assert_eq!(classify_line("function()"), LineKind::Generic("function()"));
/// ```
pub fn classify_line(line: &str) -> LineKind<'_> {
    if let Some(name) = line.strip_prefix(UNIT_MARKER) {
        return LineKind::UnitDirective(name.trim());
    }
    if line
        .strip_prefix(FUNCTION_KEYWORD)
        .and_then(|rest| rest.chars().next())
        .is_some_and(char::is_whitespace)
    {
        return LineKind::FunctionDeclaration(line);
    }
    if line.starts_with(AI_FUNCTION_MARKER) {
        return LineKind::AiFunction(line);
    }
    LineKind::Generic(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_keyword_needs_a_separator() {
        assert_eq!(
            classify_line("func\tint twice(int x)"),
            LineKind::FunctionDeclaration("func\tint twice(int x)")
        );
        assert_eq!(classify_line("func"), LineKind::Generic("func"));
        assert_eq!(classify_line("funcs = 3;"), LineKind::Generic("funcs = 3;"));
    }

    #[test]
    fn ai_marker_is_never_generic() {
        let line = "###sum(int a, int b) # adds them # int";
        assert_eq!(classify_line(line), LineKind::AiFunction(line));
        assert_eq!(classify_line("## note"), LineKind::Generic("## note"));
    }

    #[test]
    fn blank_lines_are_generic() {
        assert_eq!(classify_line(""), LineKind::Generic(""));
    }

    #[test]
    fn directive_name_is_trimmed() {
        assert_eq!(classify_line("@  Demo "), LineKind::UnitDirective("Demo"));
    }
}
