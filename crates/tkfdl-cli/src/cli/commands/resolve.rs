//! `tkfdl resolve <url>` – print the file name and MIME type for a download.

use anyhow::Result;
use tkfdl_core::classify::{Classifier, DownloadRequest, SiteRules};
use tkfdl_core::config::TkfConfig;
use tkfdl_core::platform::Collection;

pub fn run_resolve(
    cfg: &TkfConfig,
    url: &str,
    content_disposition: Option<String>,
    mime: Option<String>,
    name: Option<String>,
) -> Result<()> {
    let mut request = DownloadRequest::new(url);
    request.content_disposition = content_disposition;
    request.declared_mime_type = mime;
    request.declared_file_name = name;

    let resolved = Classifier::new(SiteRules::from_config(cfg)).resolve(&request);
    let collection = Collection::for_mime(&resolved.mime_type);
    println!("file name:  {}", resolved.file_name);
    println!("mime type:  {}", resolved.mime_type);
    println!(
        "collection: {:?} ({})",
        collection,
        collection.relative_path(&cfg.download_subdir)
    );
    Ok(())
}
