// End-to-end tests for the extract -> barrier -> report pipeline

#[path = "integration/mod.rs"]
mod test_utils;
use test_utils::fixtures::{BOOKS_GENRE_XML, BOOKS_JSON, LIBRARY_JSON};
use test_utils::{rows, sorted, TestFixture};

#[tokio::test]
async fn test_books_scenario() {
    let fixture = TestFixture::new();
    fixture.create_json_file("books.json", BOOKS_JSON);

    let summary = attrstats::run(&fixture.config("genre,author", 4)).await
        .expect("Run should succeed");

    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.reports_written, 2);

    let genre = fixture.read_report("genre");
    assert_eq!(genre.len(), 5, "Five distinct genres expected");
    assert_eq!(genre[0], ("Romance".to_string(), 2));
    assert_eq!(
        sorted(genre),
        rows(&[("Dystopian", 1), ("Political Fiction", 1), ("Romance", 2), ("Satire", 1), ("Tragedy", 1)])
    );

    assert_eq!(
        sorted(fixture.read_report("author")),
        rows(&[("George Orwell", 1), ("Jane Austen", 1), ("William Shakespeare", 1)])
    );
}

#[tokio::test]
async fn test_books_report_exact_layout() {
    let fixture = TestFixture::new();
    fixture.create_json_file("books.json", BOOKS_JSON);

    attrstats::run(&fixture.config("genre", 1)).await.expect("Run should succeed");

    let xml = std::fs::read_to_string(fixture.report_path("genre")).expect("Report should exist");
    assert_eq!(xml, BOOKS_GENRE_XML);
}

#[tokio::test]
async fn test_object_root_file_isolated() {
    let fixture = TestFixture::new();
    fixture.create_json_file("books.json", BOOKS_JSON);
    fixture.create_json_file("single.json", r#"{"genre": "Romance", "author": "Nobody"}"#);

    let summary = attrstats::run(&fixture.config("genre,author", 2)).await
        .expect("Run should succeed despite one bad file");

    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.files_failed, 1);
    let failed = summary.file_stats.iter()
        .find(|f| f.path.ends_with("single.json"))
        .expect("Bad file should have an outcome");
    assert!(failed.error.is_some());

    // Counts are exactly those of the valid file
    assert_eq!(fixture.read_report("genre")[0], ("Romance".to_string(), 2));
    assert_eq!(fixture.read_report("author").len(), 3);
}

#[tokio::test]
async fn test_empty_attribute_list_writes_nothing() {
    let fixture = TestFixture::new();
    fixture.create_json_file("books.json", BOOKS_JSON);
    fixture.create_json_file("library.json", LIBRARY_JSON);

    let summary = attrstats::run(&fixture.config("", 2)).await.expect("Run should succeed");

    assert_eq!(summary.files_processed, 2);
    assert!(summary.reports.is_empty());
    assert!(fixture.output_files().is_empty());
}

#[tokio::test]
async fn test_unmatched_attribute_has_no_report() {
    let fixture = TestFixture::new();
    fixture.create_json_file("books.json", BOOKS_JSON);

    attrstats::run(&fixture.config("genre,isbn", 2)).await.expect("Run should succeed");

    assert_eq!(fixture.output_files(), vec!["statistics_by_genre.xml".to_string()]);
}

#[tokio::test]
async fn test_embedded_empty_segment() {
    let fixture = TestFixture::new();
    fixture.create_json_file("tags.json", r#"[{"tag": "a,,b"}]"#);

    attrstats::run(&fixture.config("tag", 1)).await.expect("Run should succeed");

    assert_eq!(sorted(fixture.read_report("tag")), rows(&[("a", 1), ("b", 1)]));
}

#[tokio::test]
async fn test_nested_shapes() {
    let fixture = TestFixture::new();
    fixture.create_json_file("library.json", LIBRARY_JSON);

    attrstats::run(&fixture.config("name,genre,city,rating,open,notes", 2)).await
        .expect("Run should succeed");

    assert_eq!(
        sorted(fixture.read_report("name")),
        rows(&[("Central", 1), ("Main branch", 1), ("Olena", 1), ("Riverside", 1), ("Taras", 1)])
    );
    assert_eq!(
        sorted(fixture.read_report("genre")),
        rows(&[("Fantasy", 2), ("Horror", 1), ("Science Fiction", 1)])
    );
    assert_eq!(sorted(fixture.read_report("city")), rows(&[("Kyiv", 1), ("Lviv", 1)]));
    assert_eq!(fixture.read_report("rating"), rows(&[("4.5", 2)]));
    assert_eq!(fixture.read_report("notes"), rows(&[("Closed Mondays", 1)]));
    // Booleans are never counted
    assert!(!fixture.report_path("open").exists());
}

#[tokio::test]
async fn test_only_json_files_in_top_directory() {
    let fixture = TestFixture::new();
    fixture.create_json_file("upper.JSON", r#"[{"tag": "upper"}]"#);
    fixture.create_json_file("notes.txt", r#"[{"tag": "text"}]"#);
    fixture.create_json_file("nested/deep.json", r#"[{"tag": "deep"}]"#);

    let summary = attrstats::run(&fixture.config("tag", 2)).await.expect("Run should succeed");

    assert_eq!(summary.file_stats.len(), 1);
    assert_eq!(fixture.read_report("tag"), rows(&[("upper", 1)]));
}

#[tokio::test]
async fn test_missing_directory_is_fatal() {
    let fixture = TestFixture::new();
    let mut config = fixture.config("genre", 1);
    config.root_dir = fixture.root_path.join("does-not-exist");

    let result = attrstats::run(&config).await;

    assert!(result.is_err());
    assert!(fixture.output_files().is_empty());
}

#[tokio::test]
async fn test_reports_sorted_descending() {
    let fixture = TestFixture::new();
    let mut records = Vec::new();
    for i in 0..40 {
        // value k appears k times for k in 1..=8
        let value = (i % 8) + 1;
        for _ in 0..value {
            records.push(format!(r#"{{"level": {value}}}"#));
        }
    }
    fixture.create_json_file("levels.json", &format!("[{}]", records.join(",")));

    attrstats::run(&fixture.config("level", 3)).await.expect("Run should succeed");

    let report = fixture.read_report("level");
    assert_eq!(report.len(), 8);
    assert!(report.windows(2).all(|w| w[0].1 >= w[1].1), "Rows must be sorted by count: {report:?}");
    assert_eq!(report[0], ("8".to_string(), 40));
}
