//! End-to-end builds of the fixture site through the public API.

use almanac::config::load_config;
use almanac::payload::Payload;
use almanac::render::{Converter, TemplateEngine, TemplateError};
use almanac::site::{Site, SiteError};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

fn fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn site(root: &Path, overrides: &[(&str, toml::Value)]) -> Site {
    let table: toml::Table = overrides
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Site::new(load_config(root, table).unwrap())
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}

#[test]
fn builds_fixture_site() {
    let tmp = fixture();
    let mut site = site(tmp.path(), &[]);
    site.process().unwrap();
    let out = tmp.path().join("_site");

    for expected in [
        "2008/11/05/first-post.html",
        "rust/2008/11/06/second-post.html",
        "blog/2009/02/03/nested.html",
        "2009/01/02/sunset.html",
        "about.html",
        "index.html",
        "css/style.css",
        ".htaccess",
        "2008/index.html",
        "2009/index.html",
    ] {
        assert!(out.join(expected).is_file(), "missing {expected}");
    }
    for unexpected in [
        ".hidden",
        "notes.txt~",
        "_config.toml",
        "_posts",
        "_layouts",
        "2008/12",
        "2011",
    ] {
        assert!(!out.join(unexpected).exists(), "unexpected {unexpected}");
    }

    let first = read(&out.join("2008/11/05/first-post.html"));
    assert!(first.contains("<title>First Post | Fixture Journal</title>"));
    assert!(first.contains("<strong>world</strong>"));
    assert!(first.contains("<p class=\"tags\">intro and rust</p>"));
    assert!(first.contains("<time datetime=\"2008-11-05T00:00:00"));

    let archive = read(&out.join("2008/index.html"));
    assert!(archive.contains("<h1>2008</h1>"));
    assert!(archive.contains("2 posts, newest: Second Post"));

    assert_eq!(read(&out.join("css/style.css")), "body { font-family: serif; }\n");
}

#[test]
fn rebuild_drops_outputs_of_deleted_sources() {
    let tmp = fixture();
    let mut site = site(tmp.path(), &[]);
    site.process().unwrap();
    let out = tmp.path().join("_site");
    assert!(out.join("2008/11/05/first-post.html").exists());

    fs::remove_file(tmp.path().join("_posts/2008-11-05-first-post.md")).unwrap();
    site.process().unwrap();
    // Nothing else lives under 2008/ apart from the archive page, which is
    // swept with it and written again afterwards.
    assert!(site.report().cleanup.removed.contains(&out.join("2008")));
    assert!(!out.join("2008/11").exists());
    assert!(out.join("2008/index.html").exists());
    assert!(out.join("rust/2008/11/06/second-post.html").exists());
}

#[test]
fn destination_outside_source() {
    let tmp = fixture();
    let elsewhere = TempDir::new().unwrap();
    let mut site = site(
        tmp.path(),
        &[(
            "destination",
            toml::Value::String(elsewhere.path().to_string_lossy().into_owned()),
        )],
    );
    site.process().unwrap();
    assert!(elsewhere.path().join("about.html").is_file());
    assert!(!tmp.path().join("_site").exists());
}

#[test]
fn destination_equal_to_source_is_refused() {
    let tmp = fixture();
    let mut site = site(tmp.path(), &[("destination", toml::Value::String(".".into()))]);
    let err = site.process().unwrap_err();
    assert!(matches!(err, SiteError::DestinationContainsSource { .. }));
    for kept in [
        "_config.toml",
        "_posts/2008-11-05-first-post.md",
        "_layouts/post.html",
        "blog/_posts/2009-02-03-nested.md",
        "about.md",
        ".hidden",
        "notes.txt~",
    ] {
        assert!(tmp.path().join(kept).is_file(), "{kept} was removed");
    }
}

#[test]
fn pretty_permalinks_write_index_files() {
    let tmp = fixture();
    let mut site = site(
        tmp.path(),
        &[("permalink", toml::Value::String("pretty".into()))],
    );
    site.process().unwrap();
    let out = tmp.path().join("_site");
    assert!(out.join("2008/11/05/first-post/index.html").is_file());
    assert!(out.join("about/index.html").is_file());
    assert!(out.join("index.html").is_file());
}

#[test]
fn custom_permalink_template() {
    let tmp = fixture();
    let mut site = site(
        tmp.path(),
        &[(
            "permalink",
            toml::Value::String("/:year/:title:output_ext".into()),
        )],
    );
    site.process().unwrap();
    let out = tmp.path().join("_site");
    assert!(out.join("2008/first-post.html").is_file());
    assert!(out.join("2009/nested.html").is_file());
}

struct CountingEngine {
    calls: Arc<AtomicUsize>,
}

impl TemplateEngine for CountingEngine {
    fn render(&self, template: &str, _payload: &Payload<'_>) -> Result<String, TemplateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(template.to_string())
    }
}

#[test]
fn custom_template_engine_is_used() {
    let tmp = fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut site = site(tmp.path(), &[]).with_engine(Box::new(CountingEngine {
        calls: calls.clone(),
    }));
    site.process().unwrap();
    assert!(calls.load(Ordering::SeqCst) > 0);
    let about = read(&tmp.path().join("_site/about.html"));
    assert!(about.contains("{{ site.title }}"));
}

struct Shout;

impl Converter for Shout {
    fn matches(&self, ext: &str) -> bool {
        ext == ".shout"
    }

    fn output_ext(&self, _ext: &str) -> String {
        ".txt".to_string()
    }

    fn convert(&self, content: &str) -> String {
        content.to_uppercase()
    }
}

#[test]
fn registered_converter_handles_its_extension() {
    let tmp = fixture();
    fs::write(tmp.path().join("motto.shout"), "---\n---\nquiet please\n").unwrap();
    let mut site = site(tmp.path(), &[]);
    site.add_converter(Box::new(Shout));
    site.process().unwrap();
    assert_eq!(read(&tmp.path().join("_site/motto.txt")), "QUIET PLEASE\n");
}

#[test]
fn invalid_limit_posts_aborts_build() {
    let tmp = fixture();
    let mut site = site(tmp.path(), &[("limit_posts", toml::Value::Integer(0))]);
    let err = site.process().unwrap_err();
    assert!(matches!(err, SiteError::InvalidLimitPosts(0)));
    assert!(!tmp.path().join("_site").exists());
}
