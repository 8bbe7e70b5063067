use chrono::Local;
use reqwest::header::LAST_MODIFIED;
use std::path::Path;
use tracing::{debug, warn};

use super::feed_source::FeedSource;
use crate::hashfolder::{hash_bytes_sip_zero, hash_file_sip_zero, hash_folder_sip_zero};

pub const FINGERPRINT_MAX_LENGTH: usize = 255;

pub fn truncate_fingerprint(value: &str) -> String {
    value.chars().take(FINGERPRINT_MAX_LENGTH).collect()
}

fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Last-Modified header, else a hash of the downloaded bytes, else today's
/// date when the source can't be reached.
pub async fn feed_fingerprint(client: &reqwest::Client, location: &str) -> String {
    let fingerprint = match FeedSource::parse(location) {
        FeedSource::Remote(url) => remote_fingerprint(client, &url).await,
        FeedSource::Local(path) => local_fingerprint(&path).await,
    };

    truncate_fingerprint(&fingerprint)
}

async fn remote_fingerprint(client: &reqwest::Client, url: &str) -> String {
    match client.head(url).send().await {
        Ok(response) if response.status().is_success() => {
            if let Some(last_modified) = response
                .headers()
                .get(LAST_MODIFIED)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
            {
                return last_modified.to_string();
            }
        }
        Ok(response) => {
            debug!("HEAD {} returned {}", url, response.status());
        }
        Err(err) => {
            warn!("Could not reach {} for fingerprinting: {}", url, err);
            return today();
        }
    }

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status());

    match response {
        Ok(response) => match response.bytes().await {
            Ok(bytes) => format!("{:016x}", hash_bytes_sip_zero(&bytes)),
            Err(err) => {
                warn!("Could not download {} for fingerprinting: {}", url, err);
                today()
            }
        },
        Err(err) => {
            warn!("Could not download {} for fingerprinting: {}", url, err);
            today()
        }
    }
}

async fn local_fingerprint(path: &Path) -> String {
    let hash = if path.is_dir() {
        hash_folder_sip_zero(path).await
    } else {
        hash_file_sip_zero(path).await
    };

    match hash {
        Ok(hash) => format!("{:016x}", hash),
        Err(err) => {
            warn!("Could not fingerprint {}: {}", path.display(), err);
            today()
        }
    }
}
