//! Static table of the languages the playground can run.
//!
//! The registry is the only place that decides which execution strategy a
//! language uses. Every other component asks for a descriptor and dispatches
//! on `Strategy::kind()`, so adding a language means adding one `LanguageId`
//! variant and one entry in `DESCRIPTORS`.

use crate::errors::LanguageParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    Javascript,
    Python,
    Typescript,
    Java,
    Cpp,
    C,
    Go,
    Rust,
    Html,
    Css,
}

impl LanguageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageId::Javascript => "javascript",
            LanguageId::Python => "python",
            LanguageId::Typescript => "typescript",
            LanguageId::Java => "java",
            LanguageId::Cpp => "cpp",
            LanguageId::C => "c",
            LanguageId::Go => "go",
            LanguageId::Rust => "rust",
            LanguageId::Html => "html",
            LanguageId::Css => "css",
        }
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageId {
    type Err = LanguageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "javascript" | "js" => Ok(LanguageId::Javascript),
            "python" | "py" => Ok(LanguageId::Python),
            "typescript" | "ts" => Ok(LanguageId::Typescript),
            "java" => Ok(LanguageId::Java),
            "cpp" | "c++" => Ok(LanguageId::Cpp),
            "c" => Ok(LanguageId::C),
            "go" | "golang" => Ok(LanguageId::Go),
            "rust" | "rs" => Ok(LanguageId::Rust),
            "html" => Ok(LanguageId::Html),
            "css" => Ok(LanguageId::Css),
            _ => Err(LanguageParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Local,
    Wasm,
    Remote,
    Preview,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Local => "local",
            StrategyKind::Wasm => "wasm",
            StrategyKind::Remote => "remote",
            StrategyKind::Preview => "preview",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewFlavor {
    Html,
    Css,
}

/// How a language is executed, with the data each strategy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Local,
    Wasm,
    /// Name and version understood by the remote execution service.
    Remote {
        language: &'static str,
        version: &'static str,
    },
    Preview {
        flavor: PreviewFlavor,
    },
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Local => StrategyKind::Local,
            Strategy::Wasm => StrategyKind::Wasm,
            Strategy::Remote { .. } => StrategyKind::Remote,
            Strategy::Preview { .. } => StrategyKind::Preview,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageDescriptor {
    pub id: LanguageId,
    pub display_name: &'static str,
    pub file_extension: &'static str,
    pub strategy: Strategy,
    pub default_source: &'static str,
}

const DESCRIPTORS: &[LanguageDescriptor] = &[
    LanguageDescriptor {
        id: LanguageId::Javascript,
        display_name: "JavaScript",
        file_extension: "js",
        strategy: Strategy::Local,
        default_source: "// JavaScript runs right here in the playground\nconsole.log(\"Hello, World!\");\n",
    },
    LanguageDescriptor {
        id: LanguageId::Python,
        display_name: "Python",
        file_extension: "py",
        strategy: Strategy::Wasm,
        default_source: "# Python runs in a WebAssembly interpreter\nprint(\"Hello, World!\")\n",
    },
    LanguageDescriptor {
        id: LanguageId::Typescript,
        display_name: "TypeScript",
        file_extension: "ts",
        strategy: Strategy::Remote {
            language: "typescript",
            version: "5.0.3",
        },
        default_source: "const greeting: string = \"Hello, World!\";\nconsole.log(greeting);\n",
    },
    LanguageDescriptor {
        id: LanguageId::Java,
        display_name: "Java",
        file_extension: "java",
        strategy: Strategy::Remote {
            language: "java",
            version: "15.0.2",
        },
        default_source: "public class Main {\n    public static void main(String[] args) {\n        System.out.println(\"Hello, World!\");\n    }\n}\n",
    },
    LanguageDescriptor {
        id: LanguageId::Cpp,
        display_name: "C++",
        file_extension: "cpp",
        strategy: Strategy::Remote {
            language: "c++",
            version: "10.2.0",
        },
        default_source: "#include <iostream>\n\nint main() {\n    std::cout << \"Hello, World!\" << std::endl;\n    return 0;\n}\n",
    },
    LanguageDescriptor {
        id: LanguageId::C,
        display_name: "C",
        file_extension: "c",
        strategy: Strategy::Remote {
            language: "c",
            version: "10.2.0",
        },
        default_source: "#include <stdio.h>\n\nint main(void) {\n    printf(\"Hello, World!\\n\");\n    return 0;\n}\n",
    },
    LanguageDescriptor {
        id: LanguageId::Go,
        display_name: "Go",
        file_extension: "go",
        strategy: Strategy::Remote {
            language: "go",
            version: "1.16.2",
        },
        default_source: "package main\n\nimport \"fmt\"\n\nfunc main() {\n    fmt.Println(\"Hello, World!\")\n}\n",
    },
    LanguageDescriptor {
        id: LanguageId::Rust,
        display_name: "Rust",
        file_extension: "rs",
        strategy: Strategy::Remote {
            language: "rust",
            version: "1.68.2",
        },
        default_source: "fn main() {\n    println!(\"Hello, World!\");\n}\n",
    },
    LanguageDescriptor {
        id: LanguageId::Html,
        display_name: "HTML",
        file_extension: "html",
        strategy: Strategy::Preview {
            flavor: PreviewFlavor::Html,
        },
        default_source: "<!DOCTYPE html>\n<html>\n  <head>\n    <title>Playground</title>\n  </head>\n  <body>\n    <h1>Hello, World!</h1>\n  </body>\n</html>\n",
    },
    LanguageDescriptor {
        id: LanguageId::Css,
        display_name: "CSS",
        file_extension: "css",
        strategy: Strategy::Preview {
            flavor: PreviewFlavor::Css,
        },
        default_source: "body {\n  font-family: sans-serif;\n  background: #f5f5f5;\n}\n\nh1 {\n  color: #3b82f6;\n}\n",
    },
];

/// Lookup over the fixed language table.
#[derive(Debug, Default, Clone, Copy)]
pub struct Registry;

impl Registry {
    pub fn new() -> Self {
        Self
    }

    /// Returns the descriptor for `id`.
    ///
    /// # Panics
    ///
    /// Panics if a `LanguageId` variant has no table entry, which is a
    /// programming error caught by the registry tests.
    pub fn describe(&self, id: LanguageId) -> &'static LanguageDescriptor {
        match DESCRIPTORS.iter().find(|d| d.id == id) {
            Some(descriptor) => descriptor,
            None => panic!("language {} is missing from the registry", id),
        }
    }

    pub fn all(&self) -> &'static [LanguageDescriptor] {
        DESCRIPTORS
    }

    pub fn find_by_display_name(&self, name: &str) -> Option<&'static LanguageDescriptor> {
        DESCRIPTORS
            .iter()
            .find(|d| d.display_name.eq_ignore_ascii_case(name))
    }

    pub fn default_language(&self) -> LanguageId {
        LanguageId::Javascript
    }
}
