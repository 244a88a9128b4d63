//! MIME type tables, sniffing heuristics and the extension normalizer.

mod normalize;
mod sniff;
mod table;

pub use normalize::normalize_extension;
pub use sniff::{
    file_extension, is_generic_mime, mime_from_file_name, mime_from_file_name_or_default,
    mime_from_url_keywords,
};
pub use table::{
    canonical_mime, extension_for_mime, mime_from_extension, GIF, JPEG, OCTET_STREAM, PDF, PNG,
};
