//! Article fixtures generated into a scratch directory from on-disk templates.

use std::fs;
use std::path::Path;

use spectrum_common::Common;
use spectrum_generator::{
    entry_names, read_zip, zip_bytes, Fixtures, Generator, GeneratorError, TemplateVariables, ZipEntry,
};
use tempfile::TempDir;

struct Workspace {
    _root: TempDir,
    generator: Generator,
}

fn workspace() -> Workspace {
    let root = tempfile::tempdir().unwrap();
    let templates = root.path().join("templates");

    let vor = templates.join("elife-09560-vor-r1");
    fs::create_dir_all(&vor).unwrap();
    fs::write(
        vor.join("elife-09560.xml.jinja"),
        "<article-id>{{ article.id }}</article-id><title>{{ title }}</title>",
    )
    .unwrap();
    fs::write(vor.join("elife-09560-fig1.tif"), [1u8, 2, 3]).unwrap();
    fs::write(vor.join("elife-09560-fig2.tif"), [4u8, 5, 6]).unwrap();
    fs::write(vor.join("elife-09560.pdf"), "%PDF").unwrap();

    let reserved = templates.join("elife-06847-poa-v1");
    fs::create_dir_all(&reserved).unwrap();
    fs::write(reserved.join("elife-06847.xml"), "<article/>").unwrap();

    let digests = templates.join("digests");
    fs::create_dir_all(&digests).unwrap();
    let docx = zip_bytes(&[
        ZipEntry::new("[Content_Types].xml", "<Types/>"),
        ZipEntry::new(
            "word/document.xml",
            "<w:p><w:r><w:t>MANUSCRIPT NUMBER</w:t></w:r><w:r><w:t>99999</w:t></w:r></w:p>",
        ),
    ])
    .unwrap();
    fs::write(digests.join("DIGEST 99999.docx"), docx).unwrap();
    fs::write(digests.join("alligator.jpg"), [0xffu8, 0xd8]).unwrap();

    let common = Common {
        tmp: root.path().join("tmp"),
        templates,
    };
    Workspace {
        generator: Generator::new(&common),
        _root: root,
    }
}

fn variables() -> TemplateVariables {
    let mut variables = TemplateVariables::new();
    variables.insert("title".into(), "Cell biology".into());
    variables
}

#[test]
fn article_zip_renders_templates_and_finds_figures() {
    let ws = workspace();

    let article = ws
        .generator
        .article_zip("09560", Some("9009560"), &variables())
        .unwrap();

    assert_eq!(article.id(), "9009560");
    assert_eq!(article.doi(), "10.7554/eLife.9009560");
    assert_eq!((article.revision(), article.version()), (1, 1));
    assert_eq!(article.figure_names(), ["fig1", "fig2"]);
    assert!(article.has_pdf());
    assert!(article.filename().ends_with("elife-9009560-vor-r1.zip"));

    let xml = fs::read_to_string(article.directory().join("elife-9009560.xml")).unwrap();
    assert_eq!(xml, "<article-id>9009560</article-id><title>Cell biology</title>");
    assert_eq!(
        entry_names(&fs::read(article.filename()).unwrap()),
        [
            "elife-9009560-fig1.tif",
            "elife-9009560-fig2.tif",
            "elife-9009560.pdf",
            "elife-9009560.xml",
        ]
    );
}

#[test]
fn new_revision_and_new_version_keep_id_and_figures() {
    let ws = workspace();
    let article = ws.generator.article_zip("09560", None, &variables()).unwrap();

    let revised = article.new_revision(None).unwrap();
    assert_eq!(revised.id(), article.id());
    assert_eq!(revised.figure_names(), article.figure_names());
    assert_eq!((revised.revision(), revised.version()), (2, 1));
    assert!(revised.filename().to_string_lossy().ends_with("-r2.zip"));
    assert!(revised.directory().to_string_lossy().ends_with("-r2"));
    assert!(revised.filename().exists());

    let versioned = revised.new_version(2).unwrap();
    assert_eq!(versioned.id(), article.id());
    assert_eq!(versioned.figure_names(), article.figure_names());
    assert_eq!((versioned.revision(), versioned.version()), (3, 2));
    assert!(versioned.filename().to_string_lossy().ends_with("-v2.zip"));
    assert!(versioned.directory().join(format!("elife-{}.xml", article.id())).exists());

    // the original is untouched
    assert!(article.filename().exists());
    assert!(article.directory().to_string_lossy().ends_with("-r1"));
}

#[test]
fn replace_in_text_rewrites_xml_and_zip() {
    let ws = workspace();
    let article = ws.generator.article_zip("09560", Some("9009560"), &variables()).unwrap();

    article.replace_in_text(&[("Cell biology", "Neuroscience")]).unwrap();

    let xml = fs::read_to_string(article.directory().join("elife-9009560.xml")).unwrap();
    assert!(xml.contains("Neuroscience"));
    let zipped = read_zip(&fs::read(article.filename()).unwrap()).unwrap();
    let zipped_xml = zipped.iter().find(|e| e.name == "elife-9009560.xml").unwrap();
    assert!(String::from_utf8_lossy(&zipped_xml.contents).contains("Neuroscience"));
    // binaries are carried over untouched
    let figure = zipped.iter().find(|e| e.name == "elife-9009560-fig1.tif").unwrap();
    assert_eq!(figure.contents, [1u8, 2, 3]);
}

#[test]
fn unknown_template_is_rejected() {
    let ws = workspace();
    assert!(matches!(
        ws.generator.article_zip("00666", None, &variables()),
        Err(GeneratorError::Template(_))
    ));
}

#[test]
fn digest_zip_stamps_the_manuscript_number() {
    let ws = workspace();

    let digest = ws.generator.digest_zip("99999").unwrap();

    assert!(digest.article_id.ends_with("099999"), "{}", digest.article_id);
    let outer = read_zip(&fs::read(&digest.filename).unwrap()).unwrap();
    assert_eq!(outer[0].name, format!("DIGEST {}.docx", digest.article_id));
    assert_eq!(outer[1].name, "alligator.jpg");
    let docx = read_zip(&outer[0].contents).unwrap();
    let document = docx.iter().find(|e| e.name == "word/document.xml").unwrap();
    let text = String::from_utf8_lossy(&document.contents);
    assert!(text.contains(&format!("<w:t>{}</w:t>", digest.article_id)));
}

#[test]
fn article_subjects_writes_a_heading_csv() {
    let ws = workspace();

    let subjects = ws
        .generator
        .article_subjects(&[("9009560", "Neuroscience")])
        .unwrap();

    assert_eq!(
        fs::read_to_string(&subjects.filename).unwrap(),
        "DOI,subj-group-type,subject\n10.7554/eLife.9009560,heading,Neuroscience\n"
    );
}

#[test]
fn stored_articles_skip_reserved_templates() {
    let ws = workspace();
    assert_eq!(ws.generator.all_stored_articles().unwrap(), ["09560"]);
}

fn leftovers(tmp: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(tmp)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn clean_removes_generated_articles_only() {
    let ws = workspace();
    ws.generator.article_zip("09560", None, &variables()).unwrap();
    fs::write(ws.generator.tmp().join("notes.txt"), "keep").unwrap();

    ws.generator.clean().unwrap();

    assert_eq!(leftovers(ws.generator.tmp()), ["notes.txt"]);
}

#[test]
fn fixtures_clean_up_on_drop() {
    let ws = workspace();
    let (zip, directory, csv) = {
        let mut fixtures = Fixtures::new();
        let article = fixtures.article(ws.generator.article_zip("09560", None, &variables()).unwrap());
        let subjects = ws.generator.article_subjects(&[(article.id(), "Ecology")]).unwrap();
        fixtures.file(&subjects.filename);
        assert_eq!(fixtures.len(), 2);
        (
            article.filename().to_path_buf(),
            article.directory().to_path_buf(),
            subjects.filename,
        )
    };

    assert!(!zip.exists());
    assert!(!directory.exists());
    assert!(!csv.exists());
}
