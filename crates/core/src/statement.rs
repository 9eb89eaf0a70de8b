//! Generic-line translation.
//!
//! A line is checked against [`STATEMENT_RULES`] in order and the first rule
//! that fires produces the translation. Lines no rule claims go through
//! [`normalize`] only.

use crate::rules::{substitute_tokens, LOOP_RULES, READER_NAME};
use regex::Regex;
use std::sync::LazyLock;

static INPUT_READ_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w\[\]<>]+)\s+(\w+)\s*=\s*input\.(\w+)\s*\(\s*\)\s*;*$")
        .expect("input read regex is valid")
});

static NEXT_READ_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w\[\]<>]+)\s+(\w+)\s*=\s*next\s*(\w+)\s*\(\s*\)\s*;*$")
        .expect("next read regex is valid")
});

static ARRAY_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arr\(\s*(\w+)\s*\)\s+(\w+)\s*=\s*\{(.*)\}\s*;*$")
        .expect("array literal regex is valid")
});

static ARRAY_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arr\(\s*(\w+)\s*\)\s+(\w+)\s*=\s*([\w.]+)\s*\((.*)\)\s*;*$")
        .expect("array call regex is valid")
});

static ARRAY_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arr\(\s*(\w+)\s*\)\s+(\w+)\s*=\s*size\s*\(([^()]+)\)\s*;*$")
        .expect("array size regex is valid")
});

static TRAILING_TERMINATORS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";{2,}\s*$").expect("terminator regex is valid"));

static DOUBLED_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*\{\s*$").expect("block regex is valid"));

/// One entry of the ordered generic-line rule list.
#[derive(Clone, Copy)]
pub struct StatementRule {
    pub name: &'static str,
    apply: fn(&str) -> Option<String>,
}

impl StatementRule {
    pub fn apply(&self, line: &str) -> Option<String> {
        (self.apply)(line)
    }
}

impl std::fmt::Debug for StatementRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementRule")
            .field("name", &self.name)
            .finish()
    }
}

/// Generic-line rules in priority order. The order is part of the contract.
pub const STATEMENT_RULES: &[StatementRule] = &[
    StatementRule {
        name: "loop-header",
        apply: loop_header,
    },
    StatementRule {
        name: "token-substitution",
        apply: token_substitution,
    },
    StatementRule {
        name: "input-read",
        apply: input_read,
    },
    StatementRule {
        name: "array-literal",
        apply: array_literal,
    },
    StatementRule {
        name: "array-from-call",
        apply: array_from_call,
    },
    StatementRule {
        name: "array-by-size",
        apply: array_by_size,
    },
];

/// Translates one generic line. Never fails: unclaimed lines come back
/// normalized but otherwise untouched.
///
/// # Examples
///
/// ```
/// use guav_core::statement::translate_statement;
///
/// assert_eq!(translate_statement("arr(int) a = size(5);"), "int[] a = new int[5];");
/// assert_eq!(translate_statement("int x = input.Int();"), "int x = sc.nextInt();");
/// assert_eq!(translate_statement("loop(int i = 0; i < 3; i++) {"), "for(int i = 0; i < 3; i++) {");
/// ```
pub fn translate_statement(line: &str) -> String {
    let line = line.trim();
    STATEMENT_RULES
        .iter()
        .find_map(|rule| rule.apply(line))
        .unwrap_or_else(|| normalize(line))
}

/// Fallback rewrite: collapses a trailing run of `;` and a trailing `{ {`.
pub fn normalize(line: &str) -> String {
    let line = TRAILING_TERMINATORS_RE.replace(line, ";");
    DOUBLED_OPEN_RE.replace(&line, "{").into_owned()
}

/// Ensures a translated line not ending in `{` or `}` ends in exactly one `;`.
pub fn terminate_statement(line: &str) -> String {
    let line = line.trim_end();
    if line.is_empty() || line.ends_with('{') || line.ends_with('}') {
        return line.to_string();
    }
    let body = line.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    format!("{body};")
}

fn loop_header(line: &str) -> Option<String> {
    LOOP_RULES.iter().find_map(|rule| {
        let clause = line.strip_prefix(rule.keyword)?.trim_start();
        if !clause.starts_with('(') {
            return None;
        }
        let mut header = format!("{}{}", rule.target, clause);
        if header.ends_with(')') && header.matches(')').count() > header.matches('(').count() {
            header.pop();
        }
        Some(header)
    })
}

fn token_substitution(line: &str) -> Option<String> {
    substitute_tokens(line).map(|substituted| normalize(&substituted))
}

fn input_read(line: &str) -> Option<String> {
    let caps = INPUT_READ_RE
        .captures(line)
        .or_else(|| NEXT_READ_RE.captures(line))?;
    Some(format!(
        "{} {} = {READER_NAME}.next{}();",
        &caps[1],
        &caps[2],
        capitalize(&caps[3])
    ))
}

fn array_literal(line: &str) -> Option<String> {
    let caps = ARRAY_LITERAL_RE.captures(line)?;
    Some(format!("{}[] {} = {{{}}};", &caps[1], &caps[2], &caps[3]))
}

fn array_from_call(line: &str) -> Option<String> {
    let caps = ARRAY_CALL_RE.captures(line)?;
    if &caps[3] == "size" {
        return None;
    }
    Some(format!(
        "{}[] {} = {}({});",
        &caps[1], &caps[2], &caps[3], &caps[4]
    ))
}

fn array_by_size(line: &str) -> Option<String> {
    let caps = ARRAY_SIZE_RE.captures(line)?;
    Some(format!(
        "{ty}[] {} = new {ty}[{}];",
        &caps[2],
        caps[3].trim(),
        ty = &caps[1]
    ))
}

fn capitalize(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_shorthands_map_to_java_keywords() {
        assert_eq!(
            translate_statement("loop(int i = 0; i<ans.length ;i++) {"),
            "for(int i = 0; i<ans.length ;i++) {"
        );
        assert_eq!(
            translate_statement("foreach(int v : values) {"),
            "for(int v : values) {"
        );
        assert_eq!(translate_statement("until (done) {"), "while(done) {");
    }

    #[test]
    fn loop_header_drops_one_surplus_paren() {
        assert_eq!(translate_statement("until(x < 3))"), "while(x < 3)");
        assert_eq!(translate_statement("loop(;;)"), "for(;;)");
    }

    #[test]
    fn loop_keyword_needs_a_clause() {
        assert_eq!(translate_statement("looping = true;"), "looping = true;");
        assert_eq!(translate_statement("until = 4;"), "until = 4;");
    }

    #[test]
    fn print_shorthands_are_substituted() {
        assert_eq!(
            translate_statement("shout(ans[i] + \", \");"),
            "System.out.println(ans[i] + \", \");"
        );
        assert_eq!(
            translate_statement("output(x);;;"),
            "System.out.print(x);"
        );
    }

    #[test]
    fn entry_point_marker_is_expanded() {
        assert_eq!(
            translate_statement("main() {"),
            "public static void main(String[] args) {"
        );
        assert_eq!(
            translate_statement("main() { {"),
            "public static void main(String[] args) {"
        );
    }

    #[test]
    fn both_input_forms_produce_the_same_reader_call() {
        let expected = "int x = sc.nextInt();";
        assert_eq!(translate_statement("int x = input.Int();"), expected);
        assert_eq!(translate_statement("int x = nextInt();"), expected);
        assert_eq!(translate_statement("int x = next Int();"), expected);
        assert_eq!(translate_statement("int x = input.int()"), expected);
    }

    #[test]
    fn input_kind_is_not_validated() {
        assert_eq!(
            translate_statement("String s = input.line();"),
            "String s = sc.nextLine();"
        );
        assert_eq!(
            translate_statement("Foo f = input.fooBar();"),
            "Foo f = sc.nextFooBar();"
        );
    }

    #[test]
    fn array_forms() {
        assert_eq!(translate_statement("arr(int) a = {1,2,3};"), "int[] a = {1,2,3};");
        assert_eq!(
            translate_statement("arr(int) ans = getConcatenation(a);"),
            "int[] ans = getConcatenation(a);"
        );
        assert_eq!(
            translate_statement("arr(String) parts = line.split(\",\");"),
            "String[] parts = line.split(\",\");"
        );
        assert_eq!(translate_statement("arr(int) a = size(5);"), "int[] a = new int[5];");
        assert_eq!(
            translate_statement("arr(double) buf = size( n * 2 );"),
            "double[] buf = new double[n * 2];"
        );
    }

    #[test]
    fn unmatched_lines_pass_through() {
        assert_eq!(translate_statement("x = x + 1"), "x = x + 1");
        assert_eq!(translate_statement("}"), "}");
        assert_eq!(translate_statement("arr(int) a = what"), "arr(int) a = what");
    }

    #[test]
    fn already_translated_java_is_stable() {
        for line in [
            "System.out.println(x);",
            "int[] a = new int[5];",
            "int x = sc.nextInt();",
            "for (int i = 0; i < n; i++) {",
            "for(;;) {",
            "public static void main(String[] args) {",
            "int[][] grid = { {1, 2}, {3, 4} };",
            "} }",
        ] {
            assert_eq!(translate_statement(line), line);
        }
        assert_eq!(translate_statement("int y = 2;;"), "int y = 2;");
    }

    #[test]
    fn terminator_is_exactly_one() {
        assert_eq!(terminate_statement("output x;;;"), "output x;");
        assert_eq!(terminate_statement("x = 1"), "x = 1;");
        assert_eq!(terminate_statement("x = 1; ;"), "x = 1;");
        assert_eq!(terminate_statement("while(x) {"), "while(x) {");
        assert_eq!(terminate_statement("}"), "}");
    }

    #[test]
    fn rule_order_is_fixed() {
        let names: Vec<_> = STATEMENT_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            [
                "loop-header",
                "token-substitution",
                "input-read",
                "array-literal",
                "array-from-call",
                "array-by-size"
            ]
        );
    }
}
