use crate::error::IndexError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tree_sitter::{Parser, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
}

#[derive(Debug, Clone)]
struct LanguageSpec {
    language: Language,
    name: &'static str,
    aliases: &'static [&'static str],
    extensions: &'static [&'static str],
}

static LANGUAGE_SPECS: &[LanguageSpec] = &[
    LanguageSpec {
        language: Language::JavaScript,
        name: "javascript",
        aliases: &["js", "jsx"],
        extensions: &["js", "jsx", "mjs", "cjs"],
    },
    LanguageSpec {
        language: Language::TypeScript,
        name: "typescript",
        aliases: &["ts"],
        extensions: &["ts", "mts", "cts"],
    },
    LanguageSpec {
        language: Language::Tsx,
        name: "tsx",
        aliases: &[],
        extensions: &["tsx"],
    },
];

impl Language {
    pub fn name(self) -> &'static str {
        LANGUAGE_SPECS
            .iter()
            .find(|spec| spec.language == self)
            .map(|spec| spec.name)
            .unwrap_or("unknown")
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        LANGUAGE_SPECS
            .iter()
            .find(|spec| spec.extensions.contains(&ext.as_str()))
            .map(|spec| spec.language)
    }

    fn grammar(self) -> tree_sitter::Language {
        match self {
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = IndexError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.trim().to_ascii_lowercase();
        LANGUAGE_SPECS
            .iter()
            .find(|spec| spec.name == lower || spec.aliases.contains(&lower.as_str()))
            .map(|spec| spec.language)
            .ok_or(IndexError::UnsupportedLanguage(value.to_string()))
    }
}

/// Produces immutable syntax trees, one lazily created parser per language.
#[derive(Default)]
pub struct SyntaxParser {
    parsers: HashMap<Language, Parser>,
}

impl SyntaxParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&mut self, path: &str, source: &str, language: Language) -> Result<Tree, IndexError> {
        let parser = match self.parsers.entry(language) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let mut parser = Parser::new();
                parser
                    .set_language(&language.grammar())
                    .map_err(|err| IndexError::Parse {
                        path: path.to_string(),
                        message: format!("load {language} grammar: {err}"),
                    })?;
                entry.insert(parser)
            }
        };
        let tree = parser.parse(source, None).ok_or_else(|| IndexError::Parse {
            path: path.to_string(),
            message: "parser produced no tree".to_string(),
        })?;
        if nothing_salvageable(&tree, source) {
            return Err(IndexError::Parse {
                path: path.to_string(),
                message: "no well-formed top-level statement".to_string(),
            });
        }
        Ok(tree)
    }
}

fn nothing_salvageable(tree: &Tree, source: &str) -> bool {
    let root = tree.root_node();
    if source.trim().is_empty() {
        return false;
    }
    if root.is_error() {
        return true;
    }
    if !root.has_error() {
        return false;
    }
    let mut cursor = root.walk();
    let mut saw_child = false;
    for child in root.named_children(&mut cursor) {
        if child.kind() == "comment" {
            continue;
        }
        saw_child = true;
        if !child.is_error() {
            return false;
        }
    }
    saw_child
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_language_from_extension_and_name() {
        assert_eq!(Language::from_path("/repo/a.ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_path("/repo/a.tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_path("/repo/a.mjs"), Some(Language::JavaScript));
        assert_eq!(Language::from_path("/repo/a.py"), None);
        assert_eq!("ts".parse::<Language>().unwrap(), Language::TypeScript);
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn parses_valid_source() {
        let mut parser = SyntaxParser::new();
        let tree = parser
            .parse("a.ts", "function f(): number { return 1; }", Language::TypeScript)
            .unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn tolerates_partial_errors() {
        let mut parser = SyntaxParser::new();
        let source = "function ok() {}\nfunction broken( {\n";
        assert!(parser.parse("a.js", source, Language::JavaScript).is_ok());
    }
}
