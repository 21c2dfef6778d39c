//! Ruby formula parser.
//!
//! Parses the Ruby DSL used in Homebrew-style formulas into a `FormulaSpec`.
//! Unlike a bottle-only installer, the interpreter needs the `install` and
//! `test` blocks too, so `system` invocations, `lib.install` artifact copies,
//! `fails_with` declarations, and conditional `on_macos`/`on_linux`
//! dependencies are all lifted into the declarative model.
//!
//! # Supported DSL Elements
//!
//! ```ruby
//! class Foo < Formula
//!   desc "Description"
//!   homepage "https://..."
//!   url "https://.../foo-1.2.3.tar.gz"
//!   sha256 "..."
//!   license "MIT"
//!
//!   depends_on "cmake" => :build
//!   depends_on "fmt"
//!
//!   on_macos do
//!     depends_on "llvm" if DevelopmentTools.clang_build_version <= 1100
//!   end
//!
//!   fails_with :clang do
//!     build 1100
//!     cause <<-EOS
//!       ...diagnostic...
//!     EOS
//!   end
//!
//!   fails_with gcc: "5"
//!
//!   def install
//!     ENV.llvm_clang if OS.mac? && (DevelopmentTools.clang_build_version <= 1100)
//!     args = std_cmake_args + %W[-DFOO=#{prefix}]
//!     system "cmake", "-S", ".", "-B", "build", *args
//!     system "cmake", "--build", "build"
//!     lib.install "build/libfoo.a"
//!   end
//!
//!   test do
//!     (testpath/"test.cc").write <<~EOS
//!       int main() { return 0; }
//!     EOS
//!     system ENV.cxx, "test.cc", "-o", "test"
//!     system "./test"
//!   end
//! end
//! ```
//!
//! Interpolations (`#{prefix}`), splats (`*std_cmake_args`), and compiler
//! references (`ENV.cxx`) are kept as raw tokens; the executor expands them
//! against an explicit prefix and toolchain.

use std::collections::HashMap;

use tree_sitter::{Node, Parser};

use crate::errors::Error;
use crate::formula::{ArtifactDir, BuildStep, FormulaSpec, TestFile, TestSpec};
use crate::platform::{Compiler, Effect, Os, PlatformRule, Predicate};

/// Error type for formula parsing failures.
#[derive(Debug)]
pub enum ParseError {
    /// Failed to initialize tree-sitter parser.
    ParserInit,
    /// Failed to parse Ruby source code.
    ParseFailed,
    /// Formula class not found in source.
    NoFormulaClass,
    /// Required field is missing.
    MissingField(&'static str),
    /// Invalid field value.
    InvalidValue { field: &'static str, message: String },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::ParserInit => write!(f, "failed to initialize Ruby parser"),
            ParseError::ParseFailed => write!(f, "failed to parse Ruby source"),
            ParseError::NoFormulaClass => write!(f, "no Formula class found in source"),
            ParseError::MissingField(field) => write!(f, "missing required field: {}", field),
            ParseError::InvalidValue { field, message } => {
                write!(f, "invalid value for {}: {}", field, message)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    /// Fold into the crate-wide error taxonomy.
    pub fn into_error(self, name: &str) -> Error {
        Error::MalformedSpec {
            name: name.to_string(),
            message: self.to_string(),
        }
    }
}

/// Parses a Ruby formula file into a `FormulaSpec`.
///
/// # Arguments
/// * `source` - The Ruby source code of the formula file.
/// * `name` - The formula name (typically derived from the filename).
pub fn parse_formula(source: &str, name: &str) -> Result<FormulaSpec, ParseError> {
    let mut parser = Parser::new();
    let language = tree_sitter_ruby::LANGUAGE;
    parser
        .set_language(&language.into())
        .map_err(|_| ParseError::ParserInit)?;

    let tree = parser.parse(source, None).ok_or(ParseError::ParseFailed)?;
    let root = tree.root_node();

    let class_node = find_formula_class(&root, source)?;

    let mut spec = FormulaSpec {
        name: name.to_string(),
        ..Default::default()
    };

    parse_class_body(&class_node, source, &mut spec)?;

    if spec.url.is_empty() {
        return Err(ParseError::MissingField("url"));
    }
    if spec.sha256.is_empty() {
        return Err(ParseError::MissingField("sha256"));
    }
    if spec.sha256.len() != 64 || !spec.sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidValue {
            field: "sha256",
            message: format!("expected 64 hex characters, got '{}'", spec.sha256),
        });
    }
    if spec.version.is_empty() {
        return Err(ParseError::MissingField("version"));
    }

    Ok(spec)
}

/// Finds the Formula class definition in the AST.
fn find_formula_class<'a>(root: &'a Node, source: &str) -> Result<Node<'a>, ParseError> {
    let mut cursor = root.walk();

    for child in root.children(&mut cursor) {
        if child.kind() == "class"
            && let Some(superclass) = child.child_by_field_name("superclass")
        {
            let mut sc_cursor = superclass.walk();
            for sc_child in superclass.children(&mut sc_cursor) {
                if sc_child.kind() == "constant" && get_node_text(&sc_child, source) == "Formula" {
                    return Ok(child);
                }
            }
        }
    }

    Err(ParseError::NoFormulaClass)
}

fn parse_class_body(class_node: &Node, source: &str, spec: &mut FormulaSpec) -> Result<(), ParseError> {
    let Some(body) = class_node.child_by_field_name("body") else {
        return Ok(());
    };

    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "call" | "method_call" => {
                parse_class_statement(&child, source, spec)?;
            }
            "method" => {
                // `def install` is the only method definition we interpret;
                // `def test` never appears (tests use the `test do` block).
                if method_def_name(&child, source).as_deref() == Some("install") {
                    parse_install_body(&child, source, spec)?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn method_def_name(node: &Node, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| get_node_text(&n, source))
}

/// Dispatches a top-level call inside the Formula class.
fn parse_class_statement(node: &Node, source: &str, spec: &mut FormulaSpec) -> Result<(), ParseError> {
    let Some(method_name) = call_method_name(node, source) else {
        return Ok(());
    };

    match method_name.as_str() {
        "desc" => spec.desc = extract_string_arg(node, source),
        "homepage" => spec.homepage = extract_string_arg(node, source),
        "license" => spec.license = extract_string_arg(node, source),
        "version" => {
            if let Some(v) = extract_string_arg(node, source) {
                spec.version = v;
            }
        }
        "url" => {
            if let Some(url) = extract_string_arg(node, source) {
                if spec.version.is_empty()
                    && let Some(v) = extract_version_from_url(&url)
                {
                    spec.version = v;
                }
                spec.url = url;
            }
        }
        "sha256" => {
            if let Some(digest) = extract_string_arg(node, source) {
                spec.sha256 = digest;
            }
        }
        "depends_on" => parse_depends_on(node, source, spec, None),
        "on_macos" => parse_on_os_block(node, source, spec, Os::Macos),
        "on_linux" => parse_on_os_block(node, source, spec, Os::Linux),
        "fails_with" => parse_fails_with(node, source, spec),
        "test" => {
            if let Some(test) = parse_test_block(node, source) {
                spec.test = Some(test);
            }
        }
        // bottle blocks and head URLs belong to the surrounding package
        // manager (prebuilt binaries), not the interpreter.
        "bottle" | "head" => {}
        _ => {}
    }

    Ok(())
}

fn call_method_name(node: &Node, source: &str) -> Option<String> {
    if let Some(method_node) = node.child_by_field_name("method") {
        Some(get_node_text(&method_node, source))
    } else {
        node.child(0).map(|c| get_node_text(&c, source))
    }
}

/// Parses a depends_on declaration. When `predicate` is given (inside an
/// `on_macos`/`on_linux` block) the dependency becomes a conditional
/// `AddDependency` rule instead of a declared entry.
fn parse_depends_on(node: &Node, source: &str, spec: &mut FormulaSpec, predicate: Option<Predicate>) {
    let Some(args) = node.child_by_field_name("arguments") else {
        return;
    };

    let mut cursor = args.walk();
    let mut dep_name: Option<String> = None;
    let mut is_build_only = false;

    for child in args.children(&mut cursor) {
        match child.kind() {
            "string" | "bare_string" => {
                dep_name = extract_string_value(&child, source);
            }
            "pair" | "hash" => {
                if let Some((name, dep_type)) = parse_dependency_pair(&child, source) {
                    dep_name = Some(name);
                    is_build_only = matches!(dep_type.as_str(), "build" | "test");
                }
            }
            "argument_list" => {
                let mut inner_cursor = child.walk();
                for inner_child in child.children(&mut inner_cursor) {
                    if let Some(s) = extract_string_value(&inner_child, source) {
                        dep_name = Some(s);
                    }
                    if inner_child.kind() == "pair"
                        && let Some((name, dep_type)) = parse_dependency_pair(&inner_child, source)
                    {
                        dep_name = Some(name);
                        is_build_only = matches!(dep_type.as_str(), "build" | "test");
                    }
                }
            }
            _ => {}
        }
    }

    let Some(name) = dep_name else {
        return;
    };

    if let Some(predicate) = predicate {
        spec.platform_rules.push(PlatformRule {
            predicate,
            effect: Effect::AddDependency { name },
        });
    } else if is_build_only {
        if !spec.build_dependencies.contains(&name) {
            spec.build_dependencies.push(name);
        }
    } else if !spec.dependencies.contains(&name) {
        spec.dependencies.push(name);
    }
}

/// Parses a dependency pair like "name" => :build.
fn parse_dependency_pair(node: &Node, source: &str) -> Option<(String, String)> {
    let key = node.child_by_field_name("key")?;
    let value = node.child_by_field_name("value")?;

    let name = extract_string_value(&key, source)?;
    let dep_type = get_node_text(&value, source)
        .trim_start_matches(':')
        .to_string();

    Some((name, dep_type))
}

/// Parses an `on_macos do ... end` / `on_linux do ... end` block into
/// conditional dependency rules.
fn parse_on_os_block(node: &Node, source: &str, spec: &mut FormulaSpec, os: Os) {
    let Some(body) = block_body(node) else {
        return;
    };

    let base = Predicate {
        os: Some(os),
        ..Default::default()
    };

    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "call" | "method_call" => {
                if call_method_name(&child, source).as_deref() == Some("depends_on") {
                    parse_depends_on(&child, source, spec, Some(base.clone()));
                }
            }
            "if_modifier" => {
                let Some(stmt) = child.child_by_field_name("body") else {
                    continue;
                };
                let Some(condition) = child.child_by_field_name("condition") else {
                    continue;
                };
                if call_method_name(&stmt, source).as_deref() == Some("depends_on") {
                    let predicate =
                        predicate_from_condition(&get_node_text(&condition, source), base.clone());
                    parse_depends_on(&stmt, source, spec, Some(predicate));
                }
            }
            _ => {}
        }
    }
}

/// Parses `fails_with :clang do ... end` and `fails_with gcc: "5"` into
/// `FailsWith` rules.
fn parse_fails_with(node: &Node, source: &str, spec: &mut FormulaSpec) {
    let mut predicate = Predicate::default();
    let mut cause = String::new();

    if let Some(args) = node.child_by_field_name("arguments") {
        let mut cursor = args.walk();
        for child in args.children(&mut cursor) {
            match child.kind() {
                "simple_symbol" => {
                    predicate.compiler =
                        compiler_from_name(get_node_text(&child, source).trim_start_matches(':'));
                }
                "pair" => apply_fails_with_pair(&child, source, &mut predicate),
                "hash" => {
                    let mut hash_cursor = child.walk();
                    for pair in child.children(&mut hash_cursor) {
                        if pair.kind() == "pair" {
                            apply_fails_with_pair(&pair, source, &mut predicate);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if let Some(body) = block_body(node) {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            if !matches!(child.kind(), "call" | "method_call") {
                continue;
            }
            match call_method_name(&child, source).as_deref() {
                Some("build") => {
                    if let Some(n) = extract_integer_arg(&child, source) {
                        predicate.max_build = Some(n as u32);
                    }
                }
                Some("cause") => {
                    if let Some(text) = extract_text_arg(&child, source) {
                        cause = text;
                    }
                }
                _ => {}
            }
        }
    }

    if predicate.compiler.is_some() {
        spec.platform_rules.push(PlatformRule {
            predicate,
            effect: Effect::FailsWith { cause },
        });
    }
}

/// `fails_with gcc: "5"` - the value is a major version bound.
fn apply_fails_with_pair(pair: &Node, source: &str, predicate: &mut Predicate) {
    let (Some(key), Some(value)) = (
        pair.child_by_field_name("key"),
        pair.child_by_field_name("value"),
    ) else {
        return;
    };
    let key_text = get_node_text(&key, source)
        .trim_start_matches(':')
        .to_string();
    predicate.compiler = compiler_from_name(&key_text);
    if let Some(v) = extract_string_value(&value, source)
        && let Ok(n) = v.parse::<u32>()
    {
        predicate.max_build = Some(n);
    }
}

fn compiler_from_name(name: &str) -> Option<Compiler> {
    match name {
        "clang" => Some(Compiler::Clang),
        "gcc" => Some(Compiler::Gcc),
        _ => None,
    }
}

/// Classifies an `if` condition from the formula source into a predicate.
/// Conditions are boolean combinations of `OS.mac?` / `OS.linux?` and
/// `DevelopmentTools.clang_build_version <= N`; anything else is ignored
/// (the predicate keeps only what it recognizes).
fn predicate_from_condition(condition: &str, mut base: Predicate) -> Predicate {
    if condition.contains("OS.mac?") {
        base.os = Some(Os::Macos);
    } else if condition.contains("OS.linux?") {
        base.os = Some(Os::Linux);
    }

    let build_bound = regex::Regex::new(r"clang_build_version\s*<=\s*(\d+)")
        .ok()
        .and_then(|re| re.captures(condition).and_then(|c| c.get(1)?.as_str().parse().ok()));
    if let Some(bound) = build_bound {
        base.compiler = Some(Compiler::Clang);
        base.max_build = Some(bound);
    }

    base
}

/// Parses the body of `def install` into build steps and toolchain rules.
fn parse_install_body(method_node: &Node, source: &str, spec: &mut FormulaSpec) -> Result<(), ParseError> {
    let Some(body) = method_body(method_node) else {
        return Ok(());
    };

    // Local array variables like `args = std_cmake_args + %W[...]`,
    // flattened into token lists so later `*args` splats can expand.
    let mut locals: HashMap<String, Vec<String>> = HashMap::new();

    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "assignment" => {
                if let (Some(left), Some(right)) = (
                    child.child_by_field_name("left"),
                    child.child_by_field_name("right"),
                ) {
                    let name = get_node_text(&left, source);
                    let tokens = flatten_array_expr(&right, source, &locals);
                    locals.insert(name, tokens);
                }
            }
            "call" | "method_call" => {
                parse_install_statement(&child, source, spec, &locals);
            }
            "if_modifier" => {
                let (Some(stmt), Some(condition)) = (
                    child.child_by_field_name("body"),
                    child.child_by_field_name("condition"),
                ) else {
                    continue;
                };
                let stmt_text = get_node_text(&stmt, source);
                if stmt_text.trim() == "ENV.llvm_clang" {
                    // Explicit toolchain substitution instead of mutating the
                    // global build environment.
                    let predicate = predicate_from_condition(
                        &get_node_text(&condition, source),
                        Predicate::default(),
                    );
                    spec.platform_rules.push(PlatformRule {
                        predicate,
                        effect: Effect::SubstituteToolchain {
                            cc: "clang".to_string(),
                            cxx: "clang++".to_string(),
                        },
                    });
                } else if matches!(stmt.kind(), "call" | "method_call") {
                    // Conditional build steps keep their condition as a rule-free
                    // step; the formulas we interpret only gate toolchain tweaks.
                    parse_install_statement(&stmt, source, spec, &locals);
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn parse_install_statement(
    node: &Node,
    source: &str,
    spec: &mut FormulaSpec,
    locals: &HashMap<String, Vec<String>>,
) {
    let Some(method_name) = call_method_name(node, source) else {
        return;
    };

    match method_name.as_str() {
        "system" => {
            if let Some(step) = parse_system_call(node, source, locals) {
                spec.build_steps.push(step);
            }
        }
        "install" => {
            // lib.install / bin.install / include.install
            let Some(receiver) = node.child_by_field_name("receiver") else {
                return;
            };
            let dest = match get_node_text(&receiver, source).as_str() {
                "lib" => ArtifactDir::Lib,
                "bin" => ArtifactDir::Bin,
                "include" => ArtifactDir::Include,
                _ => return,
            };
            let sources = string_args(node, source);
            if !sources.is_empty() {
                spec.build_steps.push(BuildStep::InstallArtifacts { dest, sources });
            }
        }
        _ => {}
    }
}

/// Parses a `system "prog", "arg", *splat, ...` call into a `Run` step.
fn parse_system_call(
    node: &Node,
    source: &str,
    locals: &HashMap<String, Vec<String>>,
) -> Option<BuildStep> {
    let args = node.child_by_field_name("arguments")?;
    let tokens = argument_tokens(&args, source, locals);
    let mut iter = tokens.into_iter();
    let program = iter.next()?;

    Some(BuildStep::Run {
        program,
        args: iter.collect(),
    })
}

/// Collects raw tokens from an argument list: string literals (interpolation
/// kept verbatim), `ENV.cc`/`ENV.cxx` references, and `*local` splats.
fn argument_tokens(
    args: &Node,
    source: &str,
    locals: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut cursor = args.walk();

    for child in args.children(&mut cursor) {
        match child.kind() {
            "string" | "bare_string" => {
                if let Some(s) = extract_string_value(&child, source) {
                    tokens.push(s);
                }
            }
            "call" | "method_call" => {
                let text = get_node_text(&child, source);
                if text.starts_with("ENV.") {
                    tokens.push(text);
                }
            }
            "splat_argument" => {
                let inner = get_node_text(&child, source);
                let name = inner.trim_start_matches('*');
                tokens.extend(expand_identifier(name, locals));
            }
            "identifier" => {
                let name = get_node_text(&child, source);
                tokens.extend(expand_identifier(&name, locals));
            }
            "string_array" => {
                tokens.extend(string_array_elements(&child, source));
            }
            _ => {}
        }
    }

    tokens
}

/// Expands a bare identifier: the std args builtins stay symbolic for the
/// executor, locals expand to their collected tokens.
fn expand_identifier(name: &str, locals: &HashMap<String, Vec<String>>) -> Vec<String> {
    match name {
        "std_cmake_args" => vec!["*std_cmake_args".to_string()],
        "std_configure_args" => vec!["*std_configure_args".to_string()],
        _ => locals.get(name).cloned().unwrap_or_default(),
    }
}

/// Flattens an array-valued expression (`std_cmake_args + %W[...]`) into
/// tokens.
fn flatten_array_expr(
    node: &Node,
    source: &str,
    locals: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    match node.kind() {
        "binary" => {
            let mut tokens = Vec::new();
            if let Some(left) = node.child_by_field_name("left") {
                tokens.extend(flatten_array_expr(&left, source, locals));
            }
            if let Some(right) = node.child_by_field_name("right") {
                tokens.extend(flatten_array_expr(&right, source, locals));
            }
            tokens
        }
        "identifier" => expand_identifier(&get_node_text(node, source), locals),
        "string_array" => string_array_elements(node, source),
        "string" => extract_string_value(node, source).into_iter().collect(),
        "array" => {
            let mut tokens = Vec::new();
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                tokens.extend(flatten_array_expr(&child, source, locals));
            }
            tokens
        }
        _ => Vec::new(),
    }
}

/// Elements of a `%w[...]` / `%W[...]` literal, raw text with interpolations
/// intact.
fn string_array_elements(node: &Node, source: &str) -> Vec<String> {
    let mut elements = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "bare_string" {
            elements.push(get_node_text(&child, source));
        }
    }
    elements
}

/// Plain string arguments of a call (for `lib.install "a", "b"`).
fn string_args(node: &Node, source: &str) -> Vec<String> {
    let Some(args) = node.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = args.walk();
    for child in args.children(&mut cursor) {
        if let Some(s) = extract_string_value(&child, source) {
            out.push(s);
        }
    }
    out
}

/// Parses a `test do ... end` block into probe files and steps.
fn parse_test_block(node: &Node, source: &str) -> Option<TestSpec> {
    let body = block_body(node)?;
    let mut test = TestSpec::default();
    let locals = HashMap::new();

    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "call" | "method_call" => {
                parse_test_statement(&child, source, &mut test, &locals);
            }
            // `ENV.clang if OS.mac?` - the probe always runs with the stock
            // toolchain, so a forced reset is a no-op for us.
            "if_modifier" => {}
            _ => {}
        }
    }

    if test.files.is_empty() && test.steps.is_empty() {
        None
    } else {
        Some(test)
    }
}

fn parse_test_statement(
    node: &Node,
    source: &str,
    test: &mut TestSpec,
    locals: &HashMap<String, Vec<String>>,
) {
    match call_method_name(node, source).as_deref() {
        Some("system") => {
            if let Some(step) = parse_system_call(node, source, locals) {
                test.steps.push(step);
            }
        }
        Some("write") => {
            let Some(receiver) = node.child_by_field_name("receiver") else {
                return;
            };
            let receiver_text = get_node_text(&receiver, source);
            let path_re = regex::Regex::new(r#"testpath\s*/\s*"([^"]+)""#).ok();
            let Some(path) = path_re
                .and_then(|re| re.captures(&receiver_text).map(|c| c[1].to_string()))
            else {
                return;
            };
            if let Some(contents) = extract_text_arg(node, source) {
                test.files.push(TestFile { path, contents });
            }
        }
        _ => {}
    }
}

/// Extracts the textual argument of a call: either a plain string or a
/// heredoc (`<<~EOS` / `<<-EOS`).
fn extract_text_arg(node: &Node, source: &str) -> Option<String> {
    let args = node.child_by_field_name("arguments")?;
    let text = get_node_text(&args, source);
    if let Some(rest) = text.trim_start().strip_prefix("<<") {
        return extract_heredoc(source, args.start_byte(), rest);
    }
    extract_string_arg(node, source)
}

/// Extracts heredoc contents by scanning the source after the opening token.
/// `after_marker` is the text following `<<` (e.g. `~EOS` or `-EOS`).
fn extract_heredoc(source: &str, start_byte: usize, after_marker: &str) -> Option<String> {
    let squiggly = after_marker.starts_with('~');
    let delimiter: String = after_marker
        .trim_start_matches(['~', '-'])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if delimiter.is_empty() {
        return None;
    }

    // Body starts on the line after the opening marker.
    let line_end = source[start_byte..].find('\n')? + start_byte + 1;
    let mut lines = Vec::new();
    for line in source[line_end..].lines() {
        if line.trim() == delimiter {
            break;
        }
        lines.push(line.to_string());
    }

    if squiggly {
        // <<~ strips the common leading indentation.
        let indent = lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0);
        for line in &mut lines {
            if line.len() >= indent {
                *line = line[indent..].to_string();
            }
        }
    }

    let mut contents = lines.join("\n");
    contents.push('\n');
    Some(contents)
}

/// Extracts a string argument from a method call.
fn extract_string_arg(node: &Node, source: &str) -> Option<String> {
    let args = node.child_by_field_name("arguments")?;

    let mut cursor = args.walk();
    for child in args.children(&mut cursor) {
        if let Some(s) = extract_string_value(&child, source) {
            return Some(s);
        }
    }

    None
}

/// Extracts a string value from various string node types. Interpolations
/// inside double-quoted strings are kept verbatim (`"-I#{include}"` becomes
/// the token `-I#{include}`).
fn extract_string_value(node: &Node, source: &str) -> Option<String> {
    match node.kind() {
        "string" | "string_content" => {
            let text = get_node_text(node, source);
            let trimmed = text
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')));
            Some(trimmed.unwrap_or(&text).to_string())
        }
        "bare_string" => Some(get_node_text(node, source)),
        _ => None,
    }
}

/// Extracts an integer argument from a method call.
fn extract_integer_arg(node: &Node, source: &str) -> Option<i64> {
    let args = node.child_by_field_name("arguments")?;

    let mut cursor = args.walk();
    for child in args.children(&mut cursor) {
        if child.kind() == "integer" {
            return get_node_text(&child, source).parse().ok();
        }
    }

    None
}

/// Extracts version from a URL using common patterns.
fn extract_version_from_url(url: &str) -> Option<String> {
    // Common patterns:
    // - archive/refs/tags/v1.2.3.tar.gz
    // - archive/refs/tags/v2023.05.15.00.tar.gz
    // - releases/download/v1.2.3/...
    // - package-1.2.3.tar.gz
    let version_regex = regex::Regex::new(
        r"[-_/]v?(\d+\.\d+(?:\.\d+)*)(?:[-_.](?:tar|zip|gz|tgz|xz|bz2)|/|$)",
    )
    .ok()?;

    version_regex
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// The body of a `do ... end` block attached to a call.
fn block_body<'a>(node: &'a Node) -> Option<Node<'a>> {
    let block = node
        .child_by_field_name("block")
        .or_else(|| find_child_by_kind(node, "do_block"))
        .or_else(|| find_child_by_kind(node, "block"))?;

    block
        .child_by_field_name("body")
        .or_else(move || find_child_by_kind(&block, "body_statement"))
}

/// The body of a `def ... end` method definition.
fn method_body<'a>(node: &'a Node) -> Option<Node<'a>> {
    node.child_by_field_name("body")
        .or_else(|| find_child_by_kind(node, "body_statement"))
}

/// Gets the text content of a node.
fn get_node_text(node: &Node, source: &str) -> String {
    source[node.start_byte()..node.end_byte()].to_string()
}

/// Finds a child node by kind.
fn find_child_by_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == kind {
            return Some(child);
        }
    }
    None
}
