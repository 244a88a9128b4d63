//! `tkfdl probe <url>` – HEAD request and the file name it suggests.

use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use tkfdl_core::bridge::size_label;
use tkfdl_core::config::TkfConfig;
use tkfdl_core::fetch_head;
use tkfdl_core::url_model::derive_file_name;

pub fn run_probe(cfg: &TkfConfig, url: &str) -> Result<()> {
    let mut headers = HashMap::new();
    headers.insert("User-Agent".to_string(), cfg.user_agent.clone());
    let head = fetch_head::probe(url, &headers, Duration::from_secs(cfg.connect_timeout_secs))?;

    let dash = || "-".to_string();
    println!(
        "length:      {}",
        head.content_length.map(size_label).unwrap_or_else(dash)
    );
    println!(
        "type:        {}",
        head.content_type.clone().unwrap_or_else(dash)
    );
    println!(
        "disposition: {}",
        head.content_disposition.clone().unwrap_or_else(dash)
    );
    if let Some(name) = derive_file_name(url, head.content_disposition.as_deref()) {
        println!("file name:   {name}");
    }
    Ok(())
}
