use crate::book::{Book, BookError};
use std::collections::HashSet;
use std::path::Path;

/// Loads and validates a book manifest from a TOML file
///
/// Chapters are returned sorted by id regardless of their order in the file.
///
/// # Example
///
/// ```no_run
/// use novel_harvest::book::load_book;
/// use std::path::Path;
///
/// let book = load_book(Path::new("book.toml")).unwrap();
/// println!("{} has {} chapters", book.title, book.chapters.len());
/// ```
pub fn load_book(path: &Path) -> Result<Book, BookError> {
    let content = std::fs::read_to_string(path)?;
    parse_book(&content)
}

/// Parses and validates a book manifest from TOML text
pub fn parse_book(content: &str) -> Result<Book, BookError> {
    let mut book: Book = toml::from_str(content)?;
    validate_book(&book)?;
    book.chapters.sort_by_key(|c| c.id);
    Ok(book)
}

fn validate_book(book: &Book) -> Result<(), BookError> {
    if book.title.trim().is_empty() {
        return Err(BookError::Validation("title cannot be empty".to_string()));
    }

    if book.chapters.is_empty() {
        return Err(BookError::Validation(
            "book must list at least one chapter".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for chapter in &book.chapters {
        if chapter.id == 0 {
            return Err(BookError::Validation(format!(
                "chapter ids start at 1, got 0 for '{}'",
                chapter.title
            )));
        }

        if !seen.insert(chapter.id) {
            return Err(BookError::Validation(format!(
                "duplicate chapter id {}",
                chapter.id
            )));
        }

        if chapter.url.trim().is_empty() {
            return Err(BookError::Validation(format!(
                "chapter {} has no url",
                chapter.id
            )));
        }
    }

    Ok(())
}
