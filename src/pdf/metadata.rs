//! PDF metadata extraction
//!
//! Used to describe merged results and local inputs without sending them
//! anywhere.

use std::path::Path;
use lopdf::{Dictionary, Document, Object};
use crate::error::{Error, Result};

/// PDF metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: usize,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
}

/// Page count from the root Pages node's Count field
///
/// More reliable than walking the tree with get_pages() for nested page trees.
fn page_count(doc: &Document) -> Result<usize> {
    let pages_id = doc
        .catalog()?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| Error::General("Catalog has no Pages reference".to_string()))?;

    let count = doc
        .get_dictionary(pages_id)?
        .get(b"Count")
        .and_then(Object::as_i64)
        .map_err(|_| Error::General("Pages has no integer Count".to_string()))?;

    Ok(count.max(0) as usize)
}

/// A text entry of the Info dictionary, if it is valid UTF-8
fn info_text(info: &Dictionary, key: &[u8]) -> Option<String> {
    let bytes = info.get(key).and_then(Object::as_str).ok()?;
    String::from_utf8(bytes.to_vec()).ok()
}

fn describe(doc: &Document) -> Result<PdfMetadata> {
    let page_count = page_count(doc)?;

    let info = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .and_then(|id| doc.get_dictionary(id))
        .ok();

    Ok(PdfMetadata {
        page_count,
        title: info.and_then(|i| info_text(i, b"Title")),
        author: info.and_then(|i| info_text(i, b"Author")),
    })
}

/// Extract metadata from an in-memory PDF, such as a merged result
pub fn inspect_bytes(bytes: &[u8]) -> Result<PdfMetadata> {
    let doc = Document::load_mem(bytes)?;
    describe(&doc)
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let doc = Document::load(path)?;
    describe(&doc)
}

/// Count the number of pages in a PDF file
pub fn count_pages(path: &Path) -> Result<usize> {
    extract_metadata(path).map(|m| m.page_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use tempfile::TempDir;

    fn sample_pdf(pages: usize, title: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if let Some(title) = title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title),
            });
            doc.trailer.set("Info", info_id);
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("Failed to serialize sample PDF");
        buffer
    }

    #[test]
    fn test_inspect_bytes() {
        let metadata = inspect_bytes(&sample_pdf(3, Some("Handout"))).unwrap();
        assert_eq!(metadata.page_count, 3);
        assert_eq!(metadata.title.as_deref(), Some("Handout"));
        assert_eq!(metadata.author, None);
    }

    #[test]
    fn test_inspect_garbage_fails() {
        assert!(inspect_bytes(b"decrypt failed").is_err());
    }

    #[test]
    fn test_count_pages_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("two.pdf");
        std::fs::write(&path, sample_pdf(2, None)).unwrap();

        assert_eq!(count_pages(&path).unwrap(), 2);
    }

    #[test]
    fn test_count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }

    #[test]
    fn test_extract_metadata_nonexistent_file() {
        let result = extract_metadata(Path::new("nonexistent.pdf"));
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }
}
