use crate::rules::{is_return_type, RETURN_TYPES};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    let scalars = RETURN_TYPES.join("|");
    Regex::new(&format!(
        r"^func\s+(?:(public|protected|private)\s+)?(?:(static|nonstatic)\s+)?(?:((?:{scalars})(?:\[\])?)\s+)?([A-Za-z_$][\w$]*)\s*\((.*)\)\s*\{{?$"
    ))
    .expect("function declaration regex is valid")
});

static ENTRY_PARAMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^String\s*\[\s*\]\s*[A-Za-z_$][\w$]*$").expect("entry-point regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// A `func` line after default inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub visibility: Visibility,
    pub is_static: bool,
    pub return_type: String,
    pub name: String,
    /// Forwarded verbatim; never parsed.
    pub params: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error(
        "function syntax invalid in line `{0}`; expected `func [visibility] [static|nonstatic] [type] name(params)`"
    )]
    Malformed(String),
}

impl FunctionSignature {
    /// Parses a function declaration line, filling omitted fields with
    /// `public`, `static` and `void`.
    ///
    /// # Examples
    ///
    /// ```
    /// use guav_core::signature::FunctionSignature;
    ///
    /// let sig = FunctionSignature::parse("func greet()").unwrap();
    /// assert_eq!(sig.to_string(), "public static void greet()");
    ///
    /// let sig = FunctionSignature::parse("func private nonstatic int[] pick(int n)").unwrap();
    /// assert_eq!(sig.to_string(), "private int[] pick(int n)");
    /// ```
    pub fn parse(line: &str) -> Result<Self, SignatureError> {
        let caps = FUNCTION_RE
            .captures(line.trim())
            .ok_or_else(|| SignatureError::Malformed(line.to_string()))?;

        let visibility = caps
            .get(1)
            .and_then(|m| Visibility::parse(m.as_str()))
            .unwrap_or_default();
        let is_static = caps.get(2).map(|m| m.as_str()) != Some("nonstatic");
        let return_type = match caps.get(3).map(|m| m.as_str()) {
            Some(t) if is_return_type(t) => t.to_string(),
            Some(_) => return Err(SignatureError::Malformed(line.to_string())),
            None => "void".to_string(),
        };

        Ok(Self {
            visibility,
            is_static,
            return_type,
            name: caps[4].to_string(),
            params: caps[5].trim().to_string(),
        })
    }

    /// Whether this is `public static void main(String[] <name>)`.
    pub fn is_entry_point(&self) -> bool {
        self.visibility == Visibility::Public
            && self.is_static
            && self.return_type == "void"
            && self.name == "main"
            && ENTRY_PARAMS_RE.is_match(&self.params)
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.visibility.as_str())?;
        if self.is_static {
            f.write_str("static ")?;
        }
        write!(f, "{} {}({})", self.return_type, self.name, self.params)
    }
}
