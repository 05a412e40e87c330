//! C++ name utilities
//!
//! A small recursive descent parser for template argument lists, plus
//! helpers for splitting qualified names and abbreviating argument text.
//! Nesting is bounded by [`MAX_TEMPLATE_DEPTH`]; deeper input is rejected
//! with a parse error instead of growing the stack.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::DiagramError;

/// Maximum nesting of `<...>` accepted by [`parse_template_arguments`]
pub const MAX_TEMPLATE_DEPTH: usize = 64;

/// Argument text longer than this is abbreviated in message names
pub const ABBREVIATED_ARGUMENTS_LENGTH: usize = 15;

/// One template argument, possibly itself a template instantiation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TemplateArgument {
    /// Type or value text before any `<`
    pub name: String,
    /// Nested arguments, empty for non-template types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<TemplateArgument>,
    /// Text following the closing `>`, such as `::type` or ` *`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    /// True when the argument list was written, even if empty (`A<>`)
    #[serde(default)]
    pub is_template: bool,
}

impl TemplateArgument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Nesting depth of this argument (0 for a plain type)
    pub fn depth(&self) -> usize {
        self.arguments
            .iter()
            .map(|a| a.depth() + 1)
            .max()
            .unwrap_or(usize::from(self.is_template))
    }
}

impl fmt::Display for TemplateArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.is_template {
            write!(f, "<{}>", format_template_arguments(&self.arguments))?;
        }
        write!(f, "{}", self.suffix)
    }
}

/// Join arguments in the canonical `a,b<c>` form
pub fn format_template_arguments(arguments: &[TemplateArgument]) -> String {
    arguments
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

struct Cursor<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn error(&self, message: &str) -> DiagramError {
        DiagramError::parse_error(
            format!("{} in template arguments '{}'", message, self.input),
            1,
            self.pos + 1,
        )
    }

    /// Read plain text up to the next `<`, `>` or `,` outside parentheses
    fn text(&mut self) -> Result<String, DiagramError> {
        let mut out = String::new();
        let mut parens = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '(' | '[' => parens += 1,
                ')' | ']' => {
                    if parens == 0 {
                        return Err(self.error("Unbalanced parenthesis"));
                    }
                    parens -= 1;
                }
                '<' | '>' | ',' if parens == 0 => break,
                _ => {}
            }
            out.push(c);
            self.pos += 1;
        }
        if parens > 0 {
            return Err(self.error("Unclosed parenthesis"));
        }
        Ok(out)
    }

    fn argument(&mut self, depth: usize) -> Result<TemplateArgument, DiagramError> {
        let name = self.text()?.trim().to_string();
        let mut argument = TemplateArgument::new(name);

        if self.peek() == Some('<') {
            if depth + 1 > MAX_TEMPLATE_DEPTH {
                return Err(self.error("Template nesting too deep"));
            }
            self.bump();
            argument.is_template = true;
            argument.arguments = self.list(depth + 1, true)?;
            if self.bump() != Some('>') {
                return Err(self.error("Expected '>'"));
            }
            // Anything up to the next separator belongs to this argument
            argument.suffix = normalize_suffix(&self.text()?);
            if self.peek() == Some('<') {
                return Err(self.error("Unexpected '<'"));
            }
        }

        Ok(argument)
    }

    fn list(&mut self, depth: usize, nested: bool) -> Result<Vec<TemplateArgument>, DiagramError> {
        let mut arguments = Vec::new();

        loop {
            if nested && self.peek() == Some('>') {
                break;
            }
            let argument = self.argument(depth)?;
            let empty = argument.name.is_empty() && !argument.is_template;
            match self.peek() {
                Some(',') => {
                    if empty {
                        return Err(self.error("Empty template argument"));
                    }
                    arguments.push(argument);
                    self.bump();
                }
                Some('>') if nested => {
                    if !empty {
                        arguments.push(argument);
                    } else if !arguments.is_empty() {
                        return Err(self.error("Empty template argument"));
                    }
                    break;
                }
                Some('>') => return Err(self.error("Unexpected '>'")),
                None if nested => return Err(self.error("Unclosed '<'")),
                None => {
                    if !empty {
                        arguments.push(argument);
                    } else if !arguments.is_empty() {
                        return Err(self.error("Empty template argument"));
                    }
                    break;
                }
                Some(_) => return Err(self.error("Unexpected character")),
            }
        }

        Ok(arguments)
    }
}

fn normalize_suffix(suffix: &str) -> String {
    let trimmed = suffix.trim();
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with("::") {
        trimmed.to_string()
    } else {
        format!(" {}", trimmed)
    }
}

/// Parse a comma separated template argument list (the text between the
/// outermost `<` and `>`)
///
/// ```
/// use cxxuml::core::names::parse_template_arguments;
///
/// let args = parse_template_arguments("int, std::map<std::string, std::vector<T>>").unwrap();
/// assert_eq!(args.len(), 2);
/// assert_eq!(args[1].to_string(), "std::map<std::string,std::vector<T>>");
/// ```
pub fn parse_template_arguments(input: &str) -> Result<Vec<TemplateArgument>, DiagramError> {
    let mut cursor = Cursor::new(input);
    let arguments = cursor.list(0, false)?;
    if !cursor.at_end() {
        return Err(cursor.error("Trailing input"));
    }
    Ok(arguments)
}

/// Normalize the template arguments of a name like `A<int , B<C> >` to `A<int,B<C>>`
///
/// Names without template arguments are returned trimmed.
pub fn normalize_template_name(name: &str) -> Result<String, DiagramError> {
    let trimmed = name.trim();
    match (trimmed.find('<'), trimmed.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let arguments = parse_template_arguments(&trimmed[open + 1..close])?;
            Ok(format!(
                "{}<{}>{}",
                trimmed[..open].trim_end(),
                format_template_arguments(&arguments),
                normalize_suffix(&trimmed[close + 1..])
            ))
        }
        (None, None) => Ok(trimmed.to_string()),
        _ => Err(DiagramError::parse_error(
            format!("Unbalanced template brackets in '{}'", name),
            1,
            1,
        )),
    }
}

/// Split a qualified name on `::` outside template arguments and parameter lists
///
/// `ns::A<x::y>::f(a::b)` splits into `["ns", "A<x::y>", "f(a::b)"]`.
pub fn split_qualified_name(name: &str) -> Vec<&str> {
    let bytes = name.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' | b'[' => depth += 1,
            b'>' | b')' | b']' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(&name[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&name[start..]);
    segments.retain(|s| !s.is_empty());
    segments
}

/// Strip the trailing parameter list (and qualifiers) from a function signature
pub fn strip_parameters(signature: &str) -> &str {
    let mut angle = 0i32;
    let mut paren = 0i32;
    let mut last_list = None;
    for (i, c) in signature.char_indices() {
        match c {
            '<' => angle += 1,
            '>' => angle -= 1,
            '(' if angle == 0 => {
                if paren == 0 {
                    last_list = Some(i);
                }
                paren += 1;
            }
            ')' if angle == 0 => paren -= 1,
            _ => {}
        }
    }
    match last_list {
        Some(i) => &signature[..i],
        None => signature,
    }
}

/// Cut `s` to at most `max_length` characters, ending with `...` when shortened
pub fn abbreviate(s: &str, max_length: usize) -> String {
    if s.chars().count() <= max_length {
        return s.to_string();
    }
    let mut res: String = s.chars().take(max_length).collect();
    if max_length > 3 {
        let keep: String = res.chars().take(max_length - 3).collect();
        res = format!("{}...", keep);
    }
    res
}

/// True when `path` ends with `suffix` on a path component boundary
pub fn path_ends_with(path: &str, suffix: &str) -> bool {
    let path = path.replace('\\', "/");
    let suffix = suffix.replace('\\', "/");
    let suffix = suffix.trim_start_matches("./");
    if suffix.is_empty() {
        return false;
    }
    path == suffix || path.ends_with(&format!("/{}", suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_arguments() {
        let args = parse_template_arguments("int, double,  char *").unwrap();
        let names: Vec<_> = args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["int", "double", "char *"]);
    }

    #[test]
    fn test_parse_nested_arguments() {
        let args = parse_template_arguments("std::map<K, std::vector<V>>::iterator").unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].name, "std::map");
        assert_eq!(args[0].arguments[1].arguments[0].name, "V");
        assert_eq!(args[0].suffix, "::iterator");
        assert_eq!(args[0].depth(), 2);
    }

    #[test]
    fn test_commas_inside_function_types() {
        let args = parse_template_arguments("std::function<void(int, int)>, bool").unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].arguments[0].name, "void(int, int)");
    }

    #[test]
    fn test_empty_argument_list() {
        assert!(parse_template_arguments("").unwrap().is_empty());
        let args = parse_template_arguments("A<>").unwrap();
        assert!(args[0].is_template);
        assert_eq!(args[0].to_string(), "A<>");
    }

    #[test]
    fn test_depth_limit() {
        let ok = format!(
            "{}int{}",
            "A<".repeat(MAX_TEMPLATE_DEPTH),
            ">".repeat(MAX_TEMPLATE_DEPTH)
        );
        assert!(parse_template_arguments(&ok).is_ok());

        let deep = format!(
            "{}int{}",
            "A<".repeat(MAX_TEMPLATE_DEPTH + 1),
            ">".repeat(MAX_TEMPLATE_DEPTH + 1)
        );
        let err = parse_template_arguments(&deep).unwrap_err();
        assert!(err.to_string().contains("too deep"));
    }

    #[test]
    fn test_unbalanced_input() {
        assert!(parse_template_arguments("A<int").is_err());
        assert!(parse_template_arguments("int>").is_err());
        assert!(parse_template_arguments("int,,char").is_err());
        assert!(parse_template_arguments("f(int").is_err());
    }

    #[test]
    fn test_normalize_template_name() {
        assert_eq!(
            normalize_template_name("ns::A< int , B<C> >").unwrap(),
            "ns::A<int,B<C>>"
        );
        assert_eq!(normalize_template_name(" plain ").unwrap(), "plain");
        assert!(normalize_template_name("A<int").is_err());
    }

    #[test]
    fn test_split_qualified_name() {
        assert_eq!(
            split_qualified_name("ns::A<x::y>::f(a::b)"),
            vec!["ns", "A<x::y>", "f(a::b)"]
        );
        assert_eq!(split_qualified_name("::main()"), vec!["main()"]);
    }

    #[test]
    fn test_strip_parameters() {
        assert_eq!(strip_parameters("A<f(int)>::add(int,int)"), "A<f(int)>::add");
        assert_eq!(strip_parameters("ns::run"), "ns::run");
        assert_eq!(strip_parameters("tmain()::(lambda)() const"), "tmain()::(lambda)");
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("int,int", 15), "int,int");
        assert_eq!(abbreviate("std::string,std::string", 15), "std::string,...");
        assert_eq!(abbreviate("abcdef", 3), "abc");
    }

    #[test]
    fn test_path_ends_with() {
        assert!(path_ends_with("/src/project/main.cc", "main.cc"));
        assert!(path_ends_with("/src/project/main.cc", "project/main.cc"));
        assert!(!path_ends_with("/src/project/domain.cc", "main.cc"));
        assert!(path_ends_with("src\\main.cc", "./main.cc"));
    }
}
