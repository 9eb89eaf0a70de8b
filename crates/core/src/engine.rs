use crate::bridge::{AiFunctionBridge, Expansion};
use crate::classify::{classify_line, LineKind};
use crate::providers::CodeGenerator;
use crate::rules::{
    brace_balance, is_ident_char, ENTRY_POINT_SIGNATURE, IMPORT_PREAMBLE, READER_CONSTRUCTION,
};
use crate::signature::FunctionSignature;
use crate::statement::{terminate_statement, translate_statement};
use crate::types::{SourceLine, UnitDirective};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fatal translation failures. No output file is written when one occurs.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot read source file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("output filename not defined: no `@Name` unit directive found")]
    MissingDirective,
    #[error("line {line}: `{text}` appears before the `@Name` unit directive")]
    DirectiveNotFirst { line: usize, text: String },
    #[error("line {line}: second unit directive; `@{first}` was already declared")]
    DuplicateDirective { line: usize, first: String },
    #[error("line {line}: `{name}` is not a valid unit name")]
    InvalidUnitName { line: usize, name: String },
    #[error("cannot write unit to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A `func` line did not parse; the line was skipped.
    InvalidFunction,
    /// A `###` line did not parse; the line was skipped.
    InvalidAiFunction,
    /// The code-generation service failed; a placeholder was spliced.
    Service,
}

/// Non-fatal problem found while translating one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// In-memory result of translating one source file.
#[derive(Debug, Clone)]
pub struct TranslatedUnit {
    pub unit_name: String,
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
    /// Completion tokens reported by the service across every `###` line.
    pub tokens_used: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub unit_name: String,
    pub output_path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
    pub tokens_used: u32,
}

/// Per-file state. Created fresh for every translation.
#[derive(Debug, Default)]
pub struct TranslationState {
    pub lines: Vec<String>,
    pub unit: Option<UnitDirective>,
    pub reader_injected: bool,
    /// Open-brace depth inside the entry point that received the reader;
    /// zero once that body closes or another method starts.
    pub entry_depth: usize,
    /// A bare `main()` line whose `{` has not been seen yet.
    pub pending_entry: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub tokens_used: u32,
}

impl TranslationState {
    fn warn(&mut self, line: usize, kind: DiagnosticKind, message: String) {
        warn!(line, ?kind, "{message}");
        self.diagnostics.push(Diagnostic {
            line,
            kind,
            message,
        });
    }

    fn push(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    /// Opens a method body, adding the reader preamble to the entry point once.
    fn open_method(&mut self, header: String, entry_point: bool) {
        self.entry_depth = 0;
        self.push(header);
        if entry_point && !self.reader_injected {
            self.push(format!("    {READER_CONSTRUCTION}"));
            self.reader_injected = true;
            self.entry_depth = 1;
        }
    }

    /// Appends a body statement. A second reader construction inside the
    /// entry point that already holds the injected one is dropped.
    fn push_statement(&mut self, line: usize, text: String) {
        if self.entry_depth > 0 {
            if text == READER_CONSTRUCTION {
                debug!(line, "dropping duplicate reader construction");
                return;
            }
            self.entry_depth = self.entry_depth.saturating_add_signed(brace_balance(&text));
        }
        self.push(text);
    }

    fn set_unit(&mut self, line: usize, name: &str) -> Result<(), EngineError> {
        if let Some(first) = &self.unit {
            return Err(EngineError::DuplicateDirective {
                line,
                first: first.name.clone(),
            });
        }
        if !is_unit_name(name) {
            return Err(EngineError::InvalidUnitName {
                line,
                name: name.to_string(),
            });
        }
        self.unit = Some(UnitDirective {
            name: name.to_string(),
            line,
        });
        Ok(())
    }

    fn finish(self) -> Result<TranslatedUnit, EngineError> {
        let unit = self.unit.ok_or(EngineError::MissingDirective)?;
        let mut code = format!("{IMPORT_PREAMBLE}\n\npublic class {} {{\n", unit.name);
        for line in &self.lines {
            code.push_str(line);
            if !line.ends_with('\n') {
                code.push('\n');
            }
        }
        code.push_str("}\n");
        Ok(TranslatedUnit {
            unit_name: unit.name,
            code,
            diagnostics: self.diagnostics,
            tokens_used: self.tokens_used,
        })
    }
}

fn is_unit_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(is_ident_char)
}

/// Drives classification and translation over a whole guav file.
///
/// Lines are handled strictly in order; a `###` line suspends the walk until
/// the [`CodeGenerator`] answers.
pub struct Engine<P>
where
    P: CodeGenerator,
{
    bridge: AiFunctionBridge<P>,
    output_dir: PathBuf,
}

impl<P> Engine<P>
where
    P: CodeGenerator,
{
    /// Builds an engine writing units under `output/`.
    pub fn new(provider: P) -> Self {
        Self {
            bridge: AiFunctionBridge::new(provider),
            output_dir: PathBuf::from("output"),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Where the unit named `unit_name` is written.
    pub fn output_path(&self, unit_name: &str) -> PathBuf {
        self.output_dir.join(format!("{unit_name}.java"))
    }

    /// Translates guav source text into the text of one Java unit.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use guav_core::engine::Engine;
    /// use guav_core::providers::MockProvider;
    ///
    /// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    /// let engine = Engine::new(MockProvider);
    /// let unit = engine
    ///     .translate_source("@Hello\nfunc main(String[] args) {\nshout(\"hi\");\n}")
    ///     .await?;
    /// assert!(unit.code.contains("public class Hello {"));
    /// assert!(unit.code.contains("System.out.println(\"hi\");"));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn translate_source(&self, source: &str) -> Result<TranslatedUnit, EngineError> {
        let has_directive = source.lines().any(|raw| {
            matches!(
                classify_line(SourceLine::new(0, raw).text),
                LineKind::UnitDirective(_)
            )
        });
        if !has_directive {
            return Err(EngineError::MissingDirective);
        }

        let mut state = TranslationState::default();

        for (idx, raw) in source.lines().enumerate() {
            let line = SourceLine::new(idx + 1, raw);
            if line.text.is_empty() {
                continue;
            }

            let kind = classify_line(line.text);
            debug!(line = line.number, ?kind, "dispatching line");

            if let LineKind::UnitDirective(name) = kind {
                state.set_unit(line.number, name)?;
                continue;
            }
            if state.unit.is_none() {
                return Err(EngineError::DirectiveNotFirst {
                    line: line.number,
                    text: line.text.to_string(),
                });
            }

            let pending_entry = std::mem::take(&mut state.pending_entry);
            match kind {
                LineKind::UnitDirective(_) => {}
                LineKind::FunctionDeclaration(text) => match FunctionSignature::parse(text) {
                    Ok(sig) => {
                        let entry_point = sig.is_entry_point();
                        state.open_method(format!("{sig} {{"), entry_point);
                    }
                    Err(err) => {
                        state.warn(line.number, DiagnosticKind::InvalidFunction, err.to_string())
                    }
                },
                LineKind::AiFunction(text) => match self.bridge.expand(text).await {
                    Ok(Expansion::Generated { code, tokens }) => {
                        state.entry_depth = 0;
                        state.tokens_used += tokens.unwrap_or(0);
                        state.push(code);
                    }
                    Ok(Expansion::Placeholder { code, error }) => {
                        state.entry_depth = 0;
                        state.warn(
                            line.number,
                            DiagnosticKind::Service,
                            format!("error generating function: {error}"),
                        );
                        state.push(code);
                    }
                    Err(err) => {
                        state.warn(line.number, DiagnosticKind::InvalidAiFunction, err.to_string())
                    }
                },
                LineKind::Generic(text) => {
                    let statement = translate_statement(text);
                    if pending_entry && statement == "{" {
                        state.open_method(statement, true);
                        continue;
                    }
                    if statement.trim_end().ends_with(ENTRY_POINT_SIGNATURE) {
                        // opening brace follows on its own line
                        state.push(statement);
                        state.pending_entry = true;
                        continue;
                    }
                    let translated = terminate_statement(&statement);
                    if translated.is_empty() {
                        continue;
                    }
                    if translated.ends_with('{') && translated.contains(ENTRY_POINT_SIGNATURE) {
                        state.open_method(translated, true);
                    } else {
                        state.push_statement(line.number, translated);
                    }
                }
            }
        }

        state.finish()
    }

    /// Reads `path`, translates it and writes `<output_dir>/<Name>.java`.
    pub async fn translate_file(&self, path: &Path) -> Result<TranslationReport, EngineError> {
        let source = fs::read_to_string(path).map_err(|source| EngineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let unit = self.translate_source(&source).await?;

        let output_path = self.output_path(&unit.unit_name);
        fs::create_dir_all(&self.output_dir)
            .and_then(|()| fs::write(&output_path, &unit.code))
            .map_err(|source| EngineError::Write {
                path: output_path.clone(),
                source,
            })?;
        info!(
            unit = %unit.unit_name,
            path = %output_path.display(),
            warnings = unit.diagnostics.len(),
            tokens = unit.tokens_used,
            "wrote translated unit"
        );

        Ok(TranslationReport {
            unit_name: unit.unit_name,
            output_path,
            diagnostics: unit.diagnostics,
            tokens_used: unit.tokens_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockProvider, ProviderError};
    use crate::types::{FunctionRequest, GeneratedCode};
    use async_trait::async_trait;

    /// Fails for the function named `broken`, answers with a body otherwise.
    struct Flaky;

    #[async_trait]
    impl CodeGenerator for Flaky {
        async fn generate(&self, req: FunctionRequest) -> Result<GeneratedCode, ProviderError> {
            if req.name == "broken" {
                return Err(ProviderError::Request("http status 429 from provider".to_string()));
            }
            Ok(GeneratedCode {
                code: "```java\nreturn nums;\n```".to_string(),
                tokens: Some(5),
            })
        }
    }

    const PROGRAM: &str = "\
@test2
###getConcatenation(int[] nums) # returns nums concatenated with itself # int[]
func main(String[] args) {
arr(int) a = {1,2,3};
arr(int) ans = getConcatenation(a);
loop(int i = 0; i<ans.length ;i++) {
shout(ans[i] + \", \");
}
}
";

    #[tokio::test]
    async fn translates_a_whole_program() {
        let unit = Engine::new(Flaky)
            .translate_source(PROGRAM)
            .await
            .expect("translation should succeed");
        let expected = "\
import java.util.*;

public class test2 {
public static int[] getConcatenation(int[] nums) {
return nums;
}
public static void main(String[] args) {
    Scanner sc = new Scanner(System.in);
int[] a = {1,2,3};
int[] ans = getConcatenation(a);
for(int i = 0; i<ans.length ;i++) {
System.out.println(ans[i] + \", \");
}
}
}
";
        assert_eq!(unit.code, expected);
        assert_eq!(unit.unit_name, "test2");
        assert!(unit.diagnostics.is_empty());
        assert_eq!(unit.tokens_used, 5);
    }

    #[tokio::test]
    async fn reader_is_injected_once_even_without_reads() {
        let unit = Engine::new(MockProvider)
            .translate_source("@A\nfunc main(String[] args)\n}\nmain() {\n}")
            .await
            .unwrap();
        assert_eq!(unit.code.matches(READER_CONSTRUCTION).count(), 1);
        let lines: Vec<_> = unit.code.lines().collect();
        let open = lines
            .iter()
            .position(|l| *l == "public static void main(String[] args) {")
            .unwrap();
        assert_eq!(lines[open + 1].trim(), READER_CONSTRUCTION);
    }

    #[tokio::test]
    async fn entry_point_marker_line_gets_reader() {
        let unit = Engine::new(MockProvider)
            .translate_source("@A\nmain() {\nint n = input.int();\n}")
            .await
            .unwrap();
        assert!(unit.code.contains(
            "public static void main(String[] args) {\n    Scanner sc = new Scanner(System.in);\nint n = sc.nextInt();\n"
        ));
    }

    #[tokio::test]
    async fn user_reader_after_injection_is_dropped() {
        let unit = Engine::new(MockProvider)
            .translate_source("@A\nfunc main(String[] args) {\nScanner sc = new Scanner(System.in)\n}")
            .await
            .unwrap();
        assert_eq!(unit.code.matches("new Scanner").count(), 1);
    }

    #[tokio::test]
    async fn nested_user_reader_in_entry_point_is_dropped() {
        let unit = Engine::new(MockProvider)
            .translate_source("@A\nmain() {\nif (true) {\nScanner sc = new Scanner(System.in);\n}\n}")
            .await
            .unwrap();
        assert_eq!(unit.code.matches("new Scanner").count(), 1);
        assert!(unit.code.contains("if (true) {\n}\n}\n}\n"));
    }

    #[tokio::test]
    async fn helper_keeps_its_own_reader() {
        let src = "@A\nfunc main(String[] args) {\n}\nfunc int readOne() {\nScanner sc = new Scanner(System.in);\nreturn sc.nextInt();\n}";
        let unit = Engine::new(MockProvider).translate_source(src).await.unwrap();
        assert!(unit.code.contains(
            "public static int readOne() {\nScanner sc = new Scanner(System.in);\nreturn sc.nextInt();\n}"
        ));
        assert_eq!(unit.code.matches("new Scanner").count(), 2);
    }

    #[tokio::test]
    async fn reader_after_entry_point_closes_is_kept() {
        let src = "@A\n###helper() # does work # void\nmain() {\n}\nmain() {\nScanner sc = new Scanner(System.in);\n}";
        let unit = Engine::new(MockProvider).translate_source(src).await.unwrap();
        assert_eq!(unit.code.matches("new Scanner").count(), 2);
    }

    #[tokio::test]
    async fn main_marker_with_brace_on_next_line_gets_reader() {
        let unit = Engine::new(MockProvider)
            .translate_source("@A\nmain()\n\n{\nint n = input.int();\n}")
            .await
            .unwrap();
        assert!(unit.code.contains(
            "public static void main(String[] args)\n{\n    Scanner sc = new Scanner(System.in);\nint n = sc.nextInt();\n}"
        ));
    }

    #[tokio::test]
    async fn non_entry_functions_get_no_reader() {
        let unit = Engine::new(MockProvider)
            .translate_source("@A\nfunc int main(String[] args) {\nreturn 0\n}")
            .await
            .unwrap();
        assert!(!unit.code.contains("Scanner"));
        assert!(unit.code.contains("public static int main(String[] args) {\nreturn 0;\n}"));
    }

    #[tokio::test]
    async fn service_failure_leaves_placeholder_and_continues() {
        let src = "@A\n###broken(int x) # explodes # int\n###fine(int[] nums) # works # int[]\nfunc greet() {\nshout(1);\n}";
        let unit = Engine::new(Flaky).translate_source(src).await.unwrap();
        assert!(unit.code.contains("// Error generating function broken"));
        assert!(unit.code.contains("public static int[] fine(int[] nums) {"));
        assert!(unit.code.contains("public static void greet() {\nSystem.out.println(1);\n}"));
        assert_eq!(unit.diagnostics.len(), 1);
        assert_eq!(unit.diagnostics[0].kind, DiagnosticKind::Service);
        assert_eq!(unit.diagnostics[0].line, 2);
        assert_eq!(unit.tokens_used, 5);
    }

    #[tokio::test]
    async fn token_usage_adds_up_across_markers() {
        let src = "@A\n###one() # a # int[]\n###two() # b # int[]\n###three() # c # int[]";
        let unit = Engine::new(Flaky).translate_source(src).await.unwrap();
        assert_eq!(unit.tokens_used, 15);
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped_with_warnings() {
        let src = "@A\nfunc greet\n###nope\nfunc ok() {\n}";
        let unit = Engine::new(MockProvider).translate_source(src).await.unwrap();
        assert!(!unit.code.contains("greet"));
        assert!(!unit.code.contains("nope"));
        assert!(unit.code.contains("public static void ok() {"));
        let kinds: Vec<_> = unit.diagnostics.iter().map(|d| (d.line, d.kind)).collect();
        assert_eq!(
            kinds,
            [
                (2, DiagnosticKind::InvalidFunction),
                (3, DiagnosticKind::InvalidAiFunction)
            ]
        );
    }

    #[tokio::test]
    async fn every_plain_statement_ends_in_one_terminator() {
        let unit = Engine::new(MockProvider)
            .translate_source("@A\nfunc f() {\noutput x;;;\nx = 1\n\n\n}")
            .await
            .unwrap();
        assert!(unit.code.contains("{\noutput x;\nx = 1;\n}"));
        assert!(!unit.code.contains("\n;\n"));
    }

    #[tokio::test]
    async fn missing_directive_is_structural() {
        let err = Engine::new(MockProvider)
            .translate_source("\n\n")
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::MissingDirective));
    }

    #[tokio::test]
    async fn code_without_any_directive_reports_missing() {
        let err = Engine::new(MockProvider)
            .translate_source("func f() {\n}\n")
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::MissingDirective));
    }

    #[tokio::test]
    async fn byte_order_mark_before_directive_is_accepted() {
        let unit = Engine::new(MockProvider)
            .translate_source("\u{feff}@A\nfunc f() {\n}")
            .await
            .unwrap();
        assert_eq!(unit.unit_name, "A");
        assert!(unit.code.contains("public static void f() {\n}"));
    }

    #[tokio::test]
    async fn code_before_directive_is_structural() {
        let err = Engine::new(MockProvider)
            .translate_source("func main(String[] args) {\n@A")
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::DirectiveNotFirst { line: 1, .. }));
    }

    #[tokio::test]
    async fn second_directive_is_structural() {
        let err = Engine::new(MockProvider)
            .translate_source("@A\n@B")
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::DuplicateDirective { line: 2, .. }));
    }

    #[tokio::test]
    async fn unit_name_must_be_an_identifier() {
        for src in ["@", "@../escape", "@9lives", "@two words"] {
            let err = Engine::new(MockProvider)
                .translate_source(src)
                .await
                .expect_err("must fail");
            assert!(matches!(err, EngineError::InvalidUnitName { line: 1, .. }), "{src}");
        }
    }

    #[tokio::test]
    async fn translate_file_writes_named_unit() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("hello.guav");
        fs::write(&src, "@Hello\nmain() {\nshout(\"hi\");\n}\n").unwrap();

        let out_dir = dir.path().join("out");
        let engine = Engine::new(MockProvider).with_output_dir(&out_dir);
        let report = engine.translate_file(&src).await.unwrap();

        assert_eq!(report.output_path, out_dir.join("Hello.java"));
        let written = fs::read_to_string(&report.output_path).unwrap();
        assert!(written.starts_with("import java.util.*;\n\npublic class Hello {\n"));
        assert!(written.ends_with("}\n}\n"));
    }

    #[tokio::test]
    async fn failed_translation_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bad.guav");
        fs::write(&src, "shout(1);\n").unwrap();

        let out_dir = dir.path().join("out");
        let engine = Engine::new(MockProvider).with_output_dir(&out_dir);
        assert!(engine.translate_file(&src).await.is_err());
        assert!(!out_dir.exists());
    }

    #[tokio::test]
    async fn unreadable_source_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let err = Engine::new(MockProvider)
            .translate_file(&dir.path().join("missing.guav"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::Read { .. }));
        assert!(err.to_string().contains("missing.guav"));
    }
}
