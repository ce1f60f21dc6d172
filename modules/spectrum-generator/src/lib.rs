pub mod article;
pub mod error;
pub mod fixtures;
pub mod id;
pub mod template;
pub mod zip;

pub use article::{ArticleSubjects, ArticleZip, DigestZip, Generator, DOI_PREFIX, RESERVED_TEMPLATES};
pub use error::{GeneratorError, Result};
pub use fixtures::Fixtures;
pub use id::{article_id_with_prefix, generate_article_id, generate_article_title, KITCHEN_SINK_ID};
pub use template::{choose_template, render, ArticleTemplate, TemplateVariables};
pub use zip::{entry_names, read_zip, write_zip, zip_bytes, ZipEntry};
