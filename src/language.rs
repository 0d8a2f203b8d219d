//! Per-language lexical rules and the extension lookup table built from them.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};

/// Static description of a language, compiled into a [`LanguageProfile`].
///
/// Extensions starting with `.` are matched against a file's dotted extension;
/// anything else is a bare file name such as `Makefile`.
#[derive(Debug, Clone, Copy)]
pub struct ProfileSpec {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub function: Option<&'static str>,
    pub class: Option<&'static str>,
    pub comments: &'static [&'static str],
}

#[derive(Debug)]
pub struct LanguageProfile {
    name: String,
    extensions: Vec<String>,
    function: Option<Regex>,
    class: Option<Regex>,
    comments: Vec<Regex>,
}

impl LanguageProfile {
    pub fn compile(spec: &ProfileSpec) -> Result<Self> {
        let build = |kind: &'static str, pattern: &str| {
            Regex::new(pattern).map_err(|source| Error::Regex {
                language: spec.name.to_string(),
                kind,
                source,
            })
        };

        Ok(LanguageProfile {
            name: spec.name.to_string(),
            extensions: spec.extensions.iter().map(|e| e.to_string()).collect(),
            function: spec.function.map(|p| build("function", p)).transpose()?,
            class: spec.class.map(|p| build("class", p)).transpose()?,
            comments: spec
                .comments
                .iter()
                .map(|p| build("comment", p))
                .collect::<Result<_>>()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn function_pattern(&self) -> Option<&Regex> {
        self.function.as_ref()
    }

    pub fn class_pattern(&self) -> Option<&Regex> {
        self.class.as_ref()
    }

    /// Comment patterns in registration order; the first match wins.
    pub fn comment_patterns(&self) -> &[Regex] {
        &self.comments
    }
}

/// An extension claimed by more than one profile. The later profile owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConflict {
    pub key: String,
    pub previous: String,
    pub winner: String,
}

/// Immutable lookup from extension or file name to language profile.
#[derive(Debug)]
pub struct LanguageRegistry {
    profiles: Vec<LanguageProfile>,
    by_key: HashMap<String, usize>,
    conflicts: Vec<ExtensionConflict>,
}

impl LanguageRegistry {
    pub fn builtin() -> Result<Self> {
        Self::from_specs(BUILTIN_PROFILES)
    }

    pub fn from_specs(specs: &[ProfileSpec]) -> Result<Self> {
        let mut profiles = Vec::with_capacity(specs.len());
        let mut by_key: HashMap<String, usize> = HashMap::new();
        let mut conflicts = Vec::new();

        for spec in specs {
            let profile = LanguageProfile::compile(spec)?;
            let index = profiles.len();
            for ext in &profile.extensions {
                let key = ext.to_lowercase();
                if let Some(previous) = by_key.insert(key.clone(), index) {
                    if previous == index {
                        continue;
                    }
                    let previous_name = profiles
                        .get(previous)
                        .map(|p: &LanguageProfile| p.name.clone())
                        .unwrap_or_default();
                    warn!(
                        "extension '{}' registered by both {} and {}; using {}",
                        key, previous_name, profile.name, profile.name
                    );
                    conflicts.push(ExtensionConflict {
                        key,
                        previous: previous_name,
                        winner: profile.name.clone(),
                    });
                }
            }
            profiles.push(profile);
        }

        Ok(LanguageRegistry {
            profiles,
            by_key,
            conflicts,
        })
    }

    /// Looks up a dotted extension (`.rs`) or a bare file name (`Makefile`),
    /// case-insensitively.
    pub fn resolve(&self, extension: &str) -> Option<&LanguageProfile> {
        self.by_key
            .get(&extension.to_lowercase())
            .and_then(|&index| self.profiles.get(index))
    }

    /// Resolves a path by its full file name first, then by its dotted extension.
    pub fn resolve_path(&self, path: &Path) -> Option<&LanguageProfile> {
        // lossy so a non-UTF-8 stem still resolves by its extension
        let name = path.file_name()?.to_string_lossy();
        if let Some(profile) = self.resolve(&name) {
            return Some(profile);
        }
        dotted_extension(&name).and_then(|ext| self.resolve(ext))
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&LanguageProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &LanguageProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn conflicts(&self) -> &[ExtensionConflict] {
        &self.conflicts
    }
}

/// Everything from the last `.` of a file name, so `.env` is its own extension.
fn dotted_extension(file_name: &str) -> Option<&str> {
    file_name.rfind('.').map(|idx| &file_name[idx..])
}

const SLASH_COMMENTS: &[&str] = &[r"^\s*//", r"/\*.*?\*/"];
const HASH_COMMENTS: &[&str] = &[r"^\s*#"];
const DASH_COMMENTS: &[&str] = &[r"^\s*--"];
const PERCENT_COMMENTS: &[&str] = &[r"^\s*%"];
const MARKUP_COMMENTS: &[&str] = &[r"<!--.*?-->"];

const fn lang(name: &'static str, extensions: &'static [&'static str]) -> ProfileSpec {
    ProfileSpec {
        name,
        extensions,
        function: None,
        class: None,
        comments: &[],
    }
}

impl ProfileSpec {
    pub const fn function(mut self, pattern: &'static str) -> Self {
        self.function = Some(pattern);
        self
    }

    pub const fn class(mut self, pattern: &'static str) -> Self {
        self.class = Some(pattern);
        self
    }

    pub const fn comments(mut self, patterns: &'static [&'static str]) -> Self {
        self.comments = patterns;
        self
    }
}

pub const BUILTIN_PROFILES: &[ProfileSpec] = &[
    lang("Go", &[".go"])
        .function(r"^\s*func\s+(\w+|\([^)]*\)\s*\w+)\s*\(")
        .class(r"^\s*type\s+\w+\s+(struct|interface)")
        .comments(SLASH_COMMENTS),
    lang("Python", &[".py", ".pyw", ".pyx"])
        .function(r"^\s*def\s+\w+\s*\(")
        .class(r"^\s*class\s+\w+")
        .comments(&[r"^\s*#", r#"^\s*""".*?""""#, r"^\s*'''.*?'''"]),
    lang("JavaScript", &[".js", ".jsx", ".mjs", ".cjs"])
        .function(r"^\s*(function\s+\w+|const\s+\w+\s*=\s*\(|let\s+\w+\s*=\s*\(|var\s+\w+\s*=\s*\(|\w+\s*:\s*function|\w+\s*=>\s*)")
        .class(r"^\s*class\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("TypeScript", &[".ts", ".tsx"])
        .function(r"^\s*(function\s+\w+|const\s+\w+\s*=\s*\(|let\s+\w+\s*=\s*\(|export\s+function|\w+\s*:\s*\(|\w+\s*=>\s*)")
        .class(r"^\s*(export\s+)?(abstract\s+)?class\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("Java", &[".java"])
        .function(r"^\s*(public|private|protected|static|\s)*\s+\w+\s+\w+\s*\(")
        .class(r"^\s*(public|private|protected)?\s*(abstract\s+)?(class|interface)\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("C", &[".c", ".h"])
        .function(r"^\s*\w+\s+\w+\s*\(")
        .comments(SLASH_COMMENTS),
    lang("C++", &[".cpp", ".cc", ".cxx", ".hpp", ".hxx"])
        .function(r"^\s*(\w+\s+)*\w+\s+\w+\s*\(")
        .class(r"^\s*(class|struct)\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("C#", &[".cs"])
        .function(r"^\s*(public|private|protected|internal|static|\s)*\s+\w+\s+\w+\s*\(")
        .class(r"^\s*(public|private|protected|internal)?\s*(abstract\s+)?(class|interface|struct)\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("Rust", &[".rs"])
        .function(r"^\s*(pub\s+)?fn\s+\w+")
        .class(r"^\s*(pub\s+)?(struct|enum|trait)\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("PHP", &[".php", ".phtml"])
        .function(r"^\s*(public|private|protected)?\s*function\s+\w+")
        .class(r"^\s*(abstract\s+)?(class|interface|trait)\s+\w+")
        .comments(&[r"^\s*//", r"^\s*#", r"/\*.*?\*/"]),
    lang("Ruby", &[".rb", ".rbw"])
        .function(r"^\s*def\s+\w+")
        .class(r"^\s*class\s+\w+")
        .comments(HASH_COMMENTS),
    lang("Swift", &[".swift"])
        .function(r"^\s*(private|public|internal)?\s*func\s+\w+")
        .class(r"^\s*(public|private|internal)?\s*(class|struct|protocol)\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("Kotlin", &[".kt", ".kts"])
        .function(r"^\s*(private|public|internal|protected)?\s*fun\s+\w+")
        .class(r"^\s*(public|private|internal|protected)?\s*(class|interface|object)\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("Shell", &[".sh", ".bash", ".zsh", ".fish"])
        .function(r"^\s*\w+\s*\(\s*\)\s*\{")
        .comments(HASH_COMMENTS),
    lang("HTML", &[".html", ".htm", ".xhtml"]).comments(MARKUP_COMMENTS),
    // SCSS/Sass also allow line comments
    lang("CSS", &[".css", ".scss", ".sass", ".less"]).comments(&[r"/\*.*?\*/", r"^\s*//"]),
    lang("SQL", &[".sql"]).comments(&[r"^\s*--", r"/\*.*?\*/"]),
    lang("YAML", &[".yml", ".yaml"]).comments(HASH_COMMENTS),
    lang("JSON", &[".json"]),
    lang("XML", &[".xml", ".xsd", ".xsl"]).comments(MARKUP_COMMENTS),
    lang("Markdown", &[".md", ".markdown"]),
    lang("TOML", &[".toml"]).comments(HASH_COMMENTS),
    lang("INI", &[".ini", ".cfg", ".conf"]).comments(&[r"^\s*[#;]"]),
    lang("Dart", &[".dart"])
        .function(r"^\s*(static\s+)?\w+\s+\w+\s*\(")
        .class(r"^\s*(abstract\s+)?class\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("Scala", &[".scala", ".sc"])
        .function(r"^\s*def\s+\w+")
        .class(r"^\s*(class|object|trait)\s+\w+")
        .comments(SLASH_COMMENTS),
    lang("Lua", &[".lua"])
        .function(r"^\s*(local\s+)?function\s+\w+")
        .comments(DASH_COMMENTS),
    lang("Perl", &[".pl", ".pm", ".perl"])
        .function(r"^\s*sub\s+\w+")
        .comments(HASH_COMMENTS),
    lang("R", &[".r", ".R", ".Rmd"])
        .function(r"^\s*\w+\s*<-\s*function")
        .comments(HASH_COMMENTS),
    lang("MATLAB", &[".m", ".mlx"])
        .function(r"^\s*function\s+.*=\s*\w+")
        .comments(PERCENT_COMMENTS),
    lang("Julia", &[".jl"])
        .function(r"^\s*function\s+\w+")
        .comments(HASH_COMMENTS),
    lang("Haskell", &[".hs", ".lhs"])
        .function(r"^\s*\w+\s*::")
        .comments(DASH_COMMENTS),
    lang("Erlang", &[".erl", ".hrl"])
        .function(r"^\s*\w+\s*\(")
        .comments(PERCENT_COMMENTS),
    lang("Elixir", &[".ex", ".exs"])
        .function(r"^\s*def\s+\w+")
        .comments(HASH_COMMENTS),
    lang("F#", &[".fs", ".fsx", ".fsi"])
        .function(r"^\s*let\s+\w+")
        .comments(&[r"^\s*//", r"\(\*.*?\*\)"]),
    lang("OCaml", &[".ml", ".mli"])
        .function(r"^\s*let\s+\w+")
        .comments(&[r"\(\*.*?\*\)"]),
    lang("Assembly", &[".asm", ".s", ".S"]).comments(&[r"^\s*[#;]"]),
    lang("Vim", &[".vim", ".vimrc"])
        .function(r"^\s*function!?\s+\w+")
        .comments(&[r#"^\s*""#]),
    lang("Batch", &[".bat", ".cmd"])
        .function(r"^\s*:\w+")
        .comments(&[r"^\s*rem\s", r"^\s*::"]),
    lang("PowerShell", &[".ps1", ".psm1", ".psd1"])
        .function(r"^\s*function\s+\w+")
        .comments(HASH_COMMENTS),
    lang("Dockerfile", &["Dockerfile", ".dockerfile"]).comments(HASH_COMMENTS),
    lang("Terraform", &[".tf", ".tfvars"]).comments(&[r"^\s*#", r"/\*.*?\*/"]),
    lang("GraphQL", &[".graphql", ".gql"]).comments(HASH_COMMENTS),
    lang("Protobuf", &[".proto"]).comments(&[r"^\s*//"]),
    lang("CMake", &[".cmake", "CMakeLists.txt"])
        .function(r"^\s*function\s*\(")
        .comments(HASH_COMMENTS),
    lang("Makefile", &["Makefile", ".mk", "makefile"]).comments(HASH_COMMENTS),
    lang("Properties", &[".properties", ".env"]).comments(&[r"^\s*[#!]"]),
    lang("Groovy", &[".groovy", ".gradle"])
        .function(r"^\s*def\s+\w+")
        .class(r"^\s*class\s+\w+")
        .comments(SLASH_COMMENTS),
];
