use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{GeneratorError, Result};

/// Extension of files rendered rather than copied.
pub const TEMPLATE_EXTENSION: &str = "jinja";

static TEMPLATE_DIRECTORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^elife-(\d+)-(vor|poa)-(r|v)\d+$").expect("valid template directory regex")
});
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\}").expect("valid placeholder regex")
});

/// Variables available to templates besides `article.id`.
pub type TemplateVariables = BTreeMap<String, String>;

/// A template directory such as `elife-06847-vor-r1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleTemplate {
    pub directory: PathBuf,
    pub template_id: String,
    /// `vor` or `poa`.
    pub kind: String,
}

/// The single template directory for `template_id` under `templates`.
pub fn choose_template(templates: &Path, template_id: &str) -> Result<ArticleTemplate> {
    let mut found: Vec<ArticleTemplate> = template_directories(templates)?
        .into_iter()
        .filter(|template| template.template_id == template_id)
        .collect();
    match found.len() {
        0 => Err(GeneratorError::Template(format!(
            "No candidate templates found for elife-{template_id}-*-* in {}",
            templates.display()
        ))),
        1 => Ok(found.remove(0)),
        _ => Err(GeneratorError::Template(format!(
            "Found multiple candidate templates: {:?}",
            found.iter().map(|t| t.directory.display().to_string()).collect::<Vec<_>>()
        ))),
    }
}

/// Every well-named article template directory, sorted by path.
pub fn template_directories(templates: &Path) -> Result<Vec<ArticleTemplate>> {
    let entries = std::fs::read_dir(templates).map_err(GeneratorError::io(templates))?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(GeneratorError::io(templates))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(captures) = TEMPLATE_DIRECTORY.captures(&name) {
            found.push(ArticleTemplate {
                template_id: captures[1].to_string(),
                kind: captures[2].to_string(),
                directory: path,
            });
        }
    }
    found.sort_by(|a, b| a.directory.cmp(&b.directory));
    Ok(found)
}

/// Substitute `{{ article.id }}` and `{{ name }}` expressions.
/// Undefined names render as nothing.
pub fn render(template: &str, article_id: &str, variables: &TemplateVariables) -> String {
    PLACEHOLDER
        .replace_all(template, |captures: &Captures| {
            let name = &captures[1];
            if name == "article.id" {
                return article_id.to_string();
            }
            match variables.get(name) {
                Some(value) => value.clone(),
                None => {
                    debug!(name, "Undefined template variable");
                    String::new()
                }
            }
        })
        .into_owned()
}
