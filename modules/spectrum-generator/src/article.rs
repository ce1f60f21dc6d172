use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use spectrum_common::Common;
use tracing::info;

use crate::error::{GeneratorError, Result};
use crate::id::generate_article_id;
use crate::template::{choose_template, render, template_directories, TemplateVariables, TEMPLATE_EXTENSION};
use crate::zip::{read_zip, write_zip, zip_bytes, ZipEntry};

pub const DOI_PREFIX: &str = "10.7554/eLife.";

/// Templates kept for dedicated tests rather than the standard ingest and publish.
pub const RESERVED_TEMPLATES: [&str; 3] = ["19532", "06847", "22661"];

const DIGEST_TEMPLATE: &str = "digests/DIGEST 99999.docx";
const DIGEST_IMAGE: &str = "digests/alligator.jpg";
const DIGEST_DOCUMENT: &str = "word/document.xml";
const DIGEST_MANUSCRIPT_NUMBER: &str = "99999";
const MAXIMUM_SUBJECTS_SUFFIX: u64 = 999_999_999;

static FIGURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^elife-\d+-(.+)\.tif$").expect("valid figure regex"));
static ZIP_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(r|v)\d+\.zip$").expect("valid zip suffix regex"));
static DIRECTORY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(r|v)\d+$").expect("valid directory suffix regex"));

/// A generated article package: the zip plus the directory it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleZip {
    id: String,
    filename: PathBuf,
    directory: PathBuf,
    revision: u32,
    version: u32,
    figure_names: Vec<String>,
    has_pdf: bool,
}

impl ArticleZip {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn doi(&self) -> String {
        format!("{DOI_PREFIX}{}", self.id)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn figure_names(&self) -> &[String] {
        &self.figure_names
    }

    pub fn has_pdf(&self) -> bool {
        self.has_pdf
    }

    /// A copy suffixed `-r{revision + 1}`, optionally for another version.
    pub fn new_revision(&self, version: Option<u32>) -> Result<ArticleZip> {
        let revision = self.revision + 1;
        self.copy_as(&format!("-r{revision}"), revision, version.unwrap_or(self.version))
    }

    /// A copy suffixed `-v{version}`. What changes on the dashboard is the run.
    pub fn new_version(&self, version: u32) -> Result<ArticleZip> {
        self.copy_as(&format!("-v{version}"), self.revision + 1, version)
    }

    fn copy_as(&self, suffix: &str, revision: u32, version: u32) -> Result<ArticleZip> {
        let filename = PathBuf::from(
            ZIP_SUFFIX
                .replace(&self.filename.to_string_lossy(), format!("{suffix}.zip").as_str())
                .into_owned(),
        );
        let directory = PathBuf::from(
            DIRECTORY_SUFFIX
                .replace(&self.directory.to_string_lossy(), suffix)
                .into_owned(),
        );
        fs::copy(&self.filename, &filename).map_err(GeneratorError::io(&filename))?;
        copy_dir(&self.directory, &directory)?;
        info!(id = %self.id, filename = %filename.display(), revision, version, "Copied article");
        Ok(ArticleZip {
            id: self.id.clone(),
            filename,
            directory,
            revision,
            version,
            figure_names: self.figure_names.clone(),
            has_pdf: self.has_pdf,
        })
    }

    /// Apply text replacements to the XML of the article and rebuild its zip
    /// in place.
    pub fn replace_in_text(&self, replacements: &[(&str, &str)]) -> Result<()> {
        info!(id = %self.id, replacements = ?replacements, "Replacing in article");
        let mut entries = Vec::new();
        for file in sorted_files(&self.directory)? {
            let mut contents = fs::read(&file).map_err(GeneratorError::io(&file))?;
            if file.extension().is_some_and(|ext| ext == "xml") {
                let mut text = String::from_utf8_lossy(&contents).into_owned();
                for (search, replace) in replacements {
                    text = text.replace(search, replace);
                }
                fs::write(&file, &text).map_err(GeneratorError::io(&file))?;
                contents = text.into_bytes();
            }
            entries.push(ZipEntry::new(file_name(&file), contents));
        }
        write_zip(&self.filename, &entries)
    }

    /// Delete the zip and its directory; missing ones are skipped.
    pub fn clean(&self) -> Result<()> {
        if self.filename.exists() {
            fs::remove_file(&self.filename).map_err(GeneratorError::io(&self.filename))?;
            info!(filename = %self.filename.display(), "Deleted file");
        } else {
            info!(filename = %self.filename.display(), "Not deleted file because it doesn't exist");
        }
        if self.directory.exists() {
            fs::remove_dir_all(&self.directory).map_err(GeneratorError::io(&self.directory))?;
            info!(directory = %self.directory.display(), "Deleted directory");
        } else {
            info!(directory = %self.directory.display(), "Not deleted directory because it doesn't exist");
        }
        Ok(())
    }
}

/// A zipped digest document for an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestZip {
    pub article_id: String,
    pub filename: PathBuf,
}

/// A CSV assigning heading subjects to articles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSubjects {
    pub filename: PathBuf,
}

/// Builds fixtures from the template directory into the scratch directory.
#[derive(Debug, Clone)]
pub struct Generator {
    tmp: PathBuf,
    templates: PathBuf,
}

impl Generator {
    pub fn new(common: &Common) -> Self {
        Self {
            tmp: common.tmp.clone(),
            templates: common.templates.clone(),
        }
    }

    pub fn tmp(&self) -> &Path {
        &self.tmp
    }

    /// Render template `template_id` into `elife-{id}-{kind}-r1` and zip it.
    /// A fresh id is generated unless `article_id` is given.
    pub fn article_zip(
        &self,
        template_id: &str,
        article_id: Option<&str>,
        variables: &TemplateVariables,
    ) -> Result<ArticleZip> {
        let template = choose_template(&self.templates, template_id)?;
        let id = match article_id {
            Some(id) => id.to_string(),
            None => generate_article_id(template_id)?,
        };
        fs::create_dir_all(&self.tmp).map_err(GeneratorError::io(&self.tmp))?;
        let directory = self.tmp.join(format!("elife-{id}-{}-r1", template.kind));
        fs::create_dir(&directory).map_err(GeneratorError::io(&directory))?;

        let mut entries = Vec::new();
        let mut figure_names = Vec::new();
        let mut has_pdf = false;
        for source in sorted_files(&template.directory)? {
            let mut name = file_name(&source).replace(template_id, &id);
            let contents = if source.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION) {
                let text = fs::read_to_string(&source).map_err(GeneratorError::io(&source))?;
                name.truncate(name.len() - TEMPLATE_EXTENSION.len() - 1);
                render(&text, &id, variables).into_bytes()
            } else {
                fs::read(&source).map_err(GeneratorError::io(&source))?
            };
            let target = directory.join(&name);
            fs::write(&target, &contents).map_err(GeneratorError::io(&target))?;

            if let Some(captures) = FIGURE.captures(&name) {
                figure_names.push(captures[1].to_string());
            }
            has_pdf |= name.ends_with(".pdf");
            entries.push(ZipEntry::new(name, contents));
        }

        let filename = directory.with_extension("zip");
        write_zip(&filename, &entries)?;
        info!(id = %id, filename = %filename.display(), figures = ?figure_names, "Generated article");
        Ok(ArticleZip {
            id,
            filename,
            directory,
            revision: 1,
            version: 1,
            figure_names,
            has_pdf,
        })
    }

    /// Zip the digest template, with its manuscript number replaced by a
    /// fresh id, alongside the digest image.
    pub fn digest_zip(&self, template_id: &str) -> Result<DigestZip> {
        let article_id = generate_article_id(template_id)?;
        let source = self.templates.join(DIGEST_TEMPLATE);
        let docx = fs::read(&source).map_err(GeneratorError::io(&source))?;

        let mut document = read_zip(&docx)?;
        let body = document
            .iter_mut()
            .find(|entry| entry.name == DIGEST_DOCUMENT)
            .ok_or_else(|| GeneratorError::Template(format!("{} has no {DIGEST_DOCUMENT}", source.display())))?;
        let text = String::from_utf8_lossy(&body.contents).into_owned();
        let occurrences = text.matches(DIGEST_MANUSCRIPT_NUMBER).count();
        if occurrences != 1 {
            return Err(GeneratorError::Template(format!(
                "Wrong number of manuscript numbers in {}: {occurrences}",
                source.display()
            )));
        }
        body.contents = text.replace(DIGEST_MANUSCRIPT_NUMBER, &article_id).into_bytes();

        let image = self.templates.join(DIGEST_IMAGE);
        let image_contents = fs::read(&image).map_err(GeneratorError::io(&image))?;

        fs::create_dir_all(&self.tmp).map_err(GeneratorError::io(&self.tmp))?;
        let filename = self.tmp.join(format!("DIGEST {article_id}.zip"));
        write_zip(
            &filename,
            &[
                ZipEntry::new(format!("DIGEST {article_id}.docx"), zip_bytes(&document)?),
                ZipEntry::new(file_name(&image), image_contents),
            ],
        )?;
        info!(id = %article_id, filename = %filename.display(), "Generated digest zip");
        Ok(DigestZip { article_id, filename })
    }

    /// Write `article_subjects_{n}.csv` mapping each id to a heading subject.
    pub fn article_subjects(&self, ids_to_subjects: &[(&str, &str)]) -> Result<ArticleSubjects> {
        let suffix = rand::rng().random_range(1..=MAXIMUM_SUBJECTS_SUFFIX);
        fs::create_dir_all(&self.tmp).map_err(GeneratorError::io(&self.tmp))?;
        let filename = self.tmp.join(format!("article_subjects_{suffix}.csv"));
        let mut csv = String::from("DOI,subj-group-type,subject\n");
        for (id, subject) in ids_to_subjects {
            csv.push_str(&format!("{DOI_PREFIX}{id},heading,{subject}\n"));
        }
        fs::write(&filename, csv).map_err(GeneratorError::io(&filename))?;
        Ok(ArticleSubjects { filename })
    }

    /// Remove every `elife*` file and directory left in the scratch directory.
    pub fn clean(&self) -> Result<()> {
        if !self.tmp.exists() {
            return Ok(());
        }
        for path in sorted_entries(&self.tmp)? {
            if !file_name(&path).starts_with("elife") {
                continue;
            }
            if path.is_dir() {
                fs::remove_dir_all(&path).map_err(GeneratorError::io(&path))?;
                info!(directory = %path.display(), "Deleted directory");
            } else {
                fs::remove_file(&path).map_err(GeneratorError::io(&path))?;
                info!(filename = %path.display(), "Deleted file");
            }
        }
        Ok(())
    }

    /// Template ids usable for the standard ingest and publish, sorted.
    pub fn all_stored_articles(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = template_directories(&self.templates)?
            .into_iter()
            .map(|template| template.template_id)
            .filter(|id| !RESERVED_TEMPLATES.contains(&id.as_str()))
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sorted_entries(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(directory).map_err(GeneratorError::io(directory))? {
        paths.push(entry.map_err(GeneratorError::io(directory))?.path());
    }
    paths.sort();
    Ok(paths)
}

fn sorted_files(directory: &Path) -> Result<Vec<PathBuf>> {
    Ok(sorted_entries(directory)?
        .into_iter()
        .filter(|path| path.is_file())
        .collect())
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir(to).map_err(GeneratorError::io(to))?;
    for path in sorted_entries(from)? {
        let target = to.join(file_name(&path));
        if path.is_dir() {
            copy_dir(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(GeneratorError::io(&target))?;
        }
    }
    Ok(())
}
