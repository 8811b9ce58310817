//! Sandboxed preview for markup languages.
//!
//! Markup is never executed by the orchestrator. It is turned into a complete
//! document and handed to a rendering surface that isolates it: scripts inside
//! the document may run, but the document gets an opaque origin (no access to
//! the host's storage or cookies) and cannot navigate the top-level page.

use crate::errors::PreviewError;
use crate::registry::PreviewFlavor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const HOST_PAGE_NAME: &str = "preview.html";

const CSS_SAMPLE_BODY: &str = r##"<h1>Heading</h1>
<p>A paragraph with <a href="#">a link</a> and <strong>bold text</strong>.</p>
<ul>
  <li>First item</li>
  <li>Second item</li>
</ul>
<button>Button</button>"##;

/// Capabilities granted to the isolated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPolicy {
    pub allow_scripts: bool,
    pub allow_same_origin: bool,
    pub allow_top_navigation: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            allow_scripts: true,
            allow_same_origin: false,
            allow_top_navigation: false,
        }
    }
}

impl SandboxPolicy {
    /// Value for an iframe `sandbox` attribute. Every capability not listed is denied.
    pub fn sandbox_attribute(&self) -> String {
        let mut tokens = Vec::new();
        if self.allow_scripts {
            tokens.push("allow-scripts");
        }
        if self.allow_same_origin {
            tokens.push("allow-same-origin");
        }
        if self.allow_top_navigation {
            tokens.push("allow-top-navigation");
        }
        tokens.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxedDocument {
    pub html: String,
    pub policy: SandboxPolicy,
}

impl SandboxedDocument {
    pub fn from_source(flavor: PreviewFlavor, source: &str) -> Self {
        let html = match flavor {
            PreviewFlavor::Html => source.to_string(),
            PreviewFlavor::Css => format!(
                "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n{}\n</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
                source, CSS_SAMPLE_BODY
            ),
        };
        Self {
            html,
            policy: SandboxPolicy::default(),
        }
    }

    /// Host page embedding the document in a sandboxed iframe.
    pub fn host_page(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Playground preview</title>\n<style>html,body,iframe{{margin:0;width:100%;height:100%;border:0;}}</style>\n</head>\n<body>\n<iframe title=\"preview\" sandbox=\"{}\" srcdoc=\"{}\"></iframe>\n</body>\n</html>\n",
            self.policy.sandbox_attribute(),
            escape_attribute(&self.html)
        )
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// What a rendering surface reports back after accepting a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewArtifact {
    pub location: Option<PathBuf>,
    pub bytes: usize,
    pub sandbox: String,
}

pub trait PreviewSurface: Send + Sync {
    fn render(&self, document: &SandboxedDocument) -> Result<PreviewArtifact, PreviewError>;
}

/// Writes a host page to disk so the preview can be opened in a browser.
pub struct FilePreviewSurface {
    output_dir: PathBuf,
}

impl FilePreviewSurface {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl PreviewSurface for FilePreviewSurface {
    fn render(&self, document: &SandboxedDocument) -> Result<PreviewArtifact, PreviewError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let page = document.host_page();
        let path = self.output_dir.join(HOST_PAGE_NAME);
        std::fs::write(&path, page.as_bytes())?;
        log::debug!("Preview written to {}", path.display());
        Ok(PreviewArtifact {
            location: Some(path),
            bytes: document.html.len(),
            sandbox: document.policy.sandbox_attribute(),
        })
    }
}

/// Keeps the most recent document in memory for an embedding UI to pick up.
#[derive(Default)]
pub struct MemoryPreviewSurface {
    last: Mutex<Option<SandboxedDocument>>,
}

impl MemoryPreviewSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_document(&self) -> Option<SandboxedDocument> {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl PreviewSurface for MemoryPreviewSurface {
    fn render(&self, document: &SandboxedDocument) -> Result<PreviewArtifact, PreviewError> {
        *self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(document.clone());
        Ok(PreviewArtifact {
            location: None,
            bytes: document.html.len(),
            sandbox: document.policy.sandbox_attribute(),
        })
    }
}
