use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ph_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ph");
    path
}

const POSTS: &str = r#"[
    {"timestamp": 1700000000, "data": [{"post": "hello from november"}],
     "attachments": [{"data": [
        {"media": {"uri": "your_facebook_activity/posts/media/a.jpg"}},
        {"external_context": {"url": "https://example.com/p/1"}}
     ]}]},
    {"timestamp": 1701500000, "data": [{"post": "december post"}]},
    {"timestamp": "nope", "data": [{"post": "dropped"}]}
]"#;

fn write_zip(path: &Path, members: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, body) in members {
        zip.start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("ph.toml");
    fs::write(
        &config_path,
        r#"[browse]
page_size = 1
timezone = "utc"
"#,
    )
    .unwrap();

    let archives = root.join("archives");
    fs::create_dir_all(&archives).unwrap();
    write_zip(
        &archives.join("export.zip"),
        &[
            ("your_facebook_activity/posts/media/a.jpg", "jpg"),
            ("your_facebook_activity/posts/your_posts_1.json", POSTS),
            ("your_facebook_activity/comments/comments.json", "[]"),
        ],
    );

    (tmp, config_path, archives)
}

fn run_ph(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ph_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ph binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_ingest_prints_report() {
    let (_tmp, config, archives) = setup_test_env();
    let (stdout, stderr, ok) = run_ph(&config, &["ingest", archives.to_str().unwrap()]);
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("Ingested 2 posts from 1 archive(s)"));
    assert!(stdout.contains("skipped (wrong path):   1"));
    assert!(stdout.contains("skipped (no timestamp): 1"));
}

#[test]
fn test_months_and_list() {
    let (_tmp, config, archives) = setup_test_env();
    let dir = archives.to_str().unwrap();

    let (stdout, _, ok) = run_ph(&config, &["months", dir]);
    assert!(ok);
    assert!(stdout.contains("2023"));
    assert!(stdout.contains("  12  1"));
    assert!(stdout.contains("  11  1"));

    let (stdout, _, ok) = run_ph(&config, &["list", dir]);
    assert!(ok);
    assert!(stdout.contains("2023/12 (1)"));
    assert!(stdout.contains("december post"));

    let (stdout, _, ok) = run_ph(
        &config,
        &["list", dir, "--year", "2023", "--month", "11", "--search", "NOVEMBER"],
    );
    assert!(ok);
    assert!(stdout.contains("11/14"));
    assert!(stdout.contains("22:13"));
    assert!(stdout.contains("page 1 of 1 (1 posts)"));
}

#[test]
fn test_list_rejects_month_without_year() {
    let (_tmp, config, archives) = setup_test_env();
    let (_, stderr, ok) = run_ph(&config, &["list", archives.to_str().unwrap(), "--month", "3"]);
    assert!(!ok);
    assert!(stderr.contains("--month requires --year"));
}

#[test]
fn test_paths_and_export() {
    let (tmp, config, archives) = setup_test_env();
    let dir = archives.to_str().unwrap();

    let (stdout, _, ok) = run_ph(&config, &["paths", dir]);
    assert!(ok);
    assert_eq!(stdout.trim(), "your_facebook_activity");

    let out = tmp.path().join("export.json");
    let (_, stderr, ok) = run_ph(
        &config,
        &["export", dir, "--out", out.to_str().unwrap(), "--inline-media"],
    );
    assert!(ok, "export failed: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let posts = json["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(json["report"]["adopted"], 2);

    let november = &posts[1];
    assert_eq!(november["permalink"], "https://example.com/p/1");
    assert_eq!(november["media"][0]["type"], "image");
    assert!(november["media"][0]["handle"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));

    let id = november["id"].as_str().unwrap();
    let (stdout, _, ok) = run_ph(&config, &["show", dir, "--id", id]);
    assert!(ok);
    assert!(stdout.contains("2023/11/14 22:13"));
    assert!(stdout.contains("link:   https://example.com/p/1"));
    assert!(stdout.contains("[image] your_facebook_activity/posts/media/a.jpg"));
}

#[test]
fn test_no_posts_lists_top_paths() {
    let (tmp, config, _) = setup_test_env();
    let archive = tmp.path().join("other.zip");
    write_zip(&archive, &[("messages/inbox/chat.json", "[]")]);

    let (stdout, _, ok) = run_ph(&config, &["ingest", archive.to_str().unwrap()]);
    assert!(ok);
    assert!(stdout.contains("No posts found"));
    assert!(stdout.contains("  messages"));
}

#[test]
fn test_unreadable_archive_fails() {
    let (tmp, config, _) = setup_test_env();
    let archive = tmp.path().join("broken.zip");
    fs::write(&archive, b"not a zip").unwrap();

    let (stdout, stderr, ok) = run_ph(&config, &["ingest", archive.to_str().unwrap()]);
    assert!(!ok);
    assert!(stdout.contains("broken.zip"));
    assert!(stderr.contains("could be read"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let (tmp, _, archives) = setup_test_env();
    let absent = tmp.path().join("config/absent.toml");
    let (stdout, _, ok) = run_ph(&absent, &["ingest", archives.to_str().unwrap()]);
    assert!(ok);
    assert!(stdout.contains("adopted posts:          2"));
}
