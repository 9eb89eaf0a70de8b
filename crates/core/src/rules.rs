//! Shorthand vocabulary of guav and the fixed Java constructs it maps onto.

/// Import block that opens every generated unit.
pub const IMPORT_PREAMBLE: &str = "import java.util.*;";

/// Name of the `Scanner` instance input reads are rewritten against.
pub const READER_NAME: &str = "sc";

/// Statement injected as the first line of the entry-point body.
pub const READER_CONSTRUCTION: &str = "Scanner sc = new Scanner(System.in);";

pub const ENTRY_POINT_SIGNATURE: &str = "public static void main(String[] args)";

/// Scalar types a `func` line may declare as its return type. Every entry
/// except `void` is also accepted in its `[]` array form.
pub const RETURN_TYPES: &[&str] = &[
    "void", "int", "double", "String", "char", "boolean", "float", "long", "short", "byte",
];

/// Whole-token substitution applied anywhere in a generic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRule {
    pub shorthand: &'static str,
    pub target: &'static str,
}

pub const TOKEN_RULES: &[TokenRule] = &[
    TokenRule {
        shorthand: "shout(",
        target: "System.out.println(",
    },
    TokenRule {
        shorthand: "output(",
        target: "System.out.print(",
    },
    TokenRule {
        shorthand: "main()",
        target: ENTRY_POINT_SIGNATURE,
    },
];

/// Keyword-to-keyword rule for loop headers.
///
/// `until` maps onto `while` as a plain keyword swap; whoever writes the
/// condition keeps the continuation sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRule {
    pub keyword: &'static str,
    pub target: &'static str,
}

pub const LOOP_RULES: &[LoopRule] = &[
    LoopRule {
        keyword: "loop",
        target: "for",
    },
    LoopRule {
        keyword: "foreach",
        target: "for",
    },
    LoopRule {
        keyword: "until",
        target: "while",
    },
];

pub fn is_return_type(token: &str) -> bool {
    match token.strip_suffix("[]") {
        Some(scalar) => scalar != "void" && RETURN_TYPES.contains(&scalar),
        None => RETURN_TYPES.contains(&token),
    }
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Applies every [`TokenRule`] to `line`, skipping string and char literals.
///
/// Returns `None` when nothing was substituted.
pub fn substitute_tokens(line: &str) -> Option<String> {
    let mut out = String::with_capacity(line.len());
    let mut changed = false;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    let mut i = 0;

    while i < line.len() {
        let rest = &line[i..];
        let Some(c) = rest.chars().next() else {
            break;
        };

        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
        } else {
            let at_boundary = !matches!(prev, Some(p) if is_ident_char(p) || p == '.');
            let hit = at_boundary
                .then(|| TOKEN_RULES.iter().find(|r| rest.starts_with(r.shorthand)))
                .flatten();
            if let Some(rule) = hit {
                out.push_str(rule.target);
                i += rule.shorthand.len();
                prev = rule.shorthand.chars().last();
                changed = true;
                continue;
            }
            out.push(c);
        }

        prev = Some(c);
        i += c.len_utf8();
    }

    changed.then_some(out)
}

/// Net count of `{` over `}` in `line`, ignoring braces inside literals.
pub fn brace_balance(line: &str) -> isize {
    let mut balance = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '{' => balance += 1,
                '}' => balance -= 1,
                _ => {}
            },
        }
    }
    balance
}
