// Test fixtures with known inputs and expected counts

/// Three books with comma-joined genres
pub const BOOKS_JSON: &str = r#"[
  {"title": "1984", "author": "George Orwell", "yearPublished": 1949, "genre": "Dystopian, Political Fiction"},
  {"title": "Pride and Prejudice", "author": "Jane Austen", "yearPublished": 1813, "genre": "Romance, Satire"},
  {"title": "Romeo and Juliet", "author": "William Shakespeare", "yearPublished": 1597, "genre": "Romance, Tragedy"}
]"#;

/// Exact report expected for `genre` over BOOKS_JSON (ties ordered by value)
pub const BOOKS_GENRE_XML: &str = "<statistics>
  <item>
   <value>Romance</value>
   <count>2</count>
  </item>
  <item>
   <value>Dystopian</value>
   <count>1</count>
  </item>
  <item>
   <value>Political Fiction</value>
   <count>1</count>
  </item>
  <item>
   <value>Satire</value>
   <count>1</count>
  </item>
  <item>
   <value>Tragedy</value>
   <count>1</count>
  </item>
</statistics>";

/// Library records mixing nested objects, arrays and nulls
pub const LIBRARY_JSON: &str = r#"[
  {
    "name": "Central",
    "genre": ["Fantasy", "Science Fiction, Horror"],
    "address": {"city": "Kyiv", "name": "Main branch"},
    "staff": [{"name": "Olena"}, {"name": "Taras"}],
    "rating": 4.5,
    "open": true,
    "notes": null
  },
  {
    "name": "Riverside",
    "genre": "Fantasy",
    "address": {"city": "Lviv"},
    "staff": [],
    "rating": 4.5,
    "open": false,
    "notes": "Closed Mondays"
  }
]"#;

/// A single record per file, used to hammer one (attribute, value) pair
pub fn single_tag_file(tag: &str) -> String {
    format!(r#"[{{"tag": "{tag}"}}]"#)
}
