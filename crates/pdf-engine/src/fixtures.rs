//! In-memory PDF builder used by tests across the workspace.

use crate::{PageSize, PdfEngineError};
use lopdf::content::Content;
use lopdf::{dictionary, Document, Object, Stream};

/// Builds a PDF whose pages are empty and sized as given. An empty slice
/// yields a structurally valid document with zero pages.
pub fn blank_pdf(pages: &[PageSize]) -> Result<Vec<u8>, PdfEngineError> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let mut kids = Vec::with_capacity(pages.len());
    for size in pages {
        let content = Content { operations: Vec::new() };
        let content_id = document.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::from(0.0_f32),
                Object::from(0.0_f32),
                Object::from(size.width_pt),
                Object::from(size.height_pt),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    document.save_to(&mut bytes)?;
    Ok(bytes)
}
