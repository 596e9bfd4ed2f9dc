//! Archive download and extraction
//!
//! Used to bootstrap the SDK from its release tarball.

use crate::error::{SetupError, SetupResult};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};

/// File name to store a download under, taken from the URL's last segment
fn file_name_for(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("download")
        .to_string()
}

fn download_blocking(url: &str, dest_dir: &Path) -> SetupResult<PathBuf> {
    let to_download_err = |reason: String| SetupError::Download {
        url: url.to_string(),
        reason,
    };

    fs::create_dir_all(dest_dir)
        .map_err(|e| SetupError::io(format!("creating {}", dest_dir.display()), e))?;
    let dest = dest_dir.join(file_name_for(url));

    let response = ureq::get(url)
        .call()
        .map_err(|e| to_download_err(e.to_string()))?;
    let mut reader = response.into_body().into_reader();

    let mut file = File::create(&dest)
        .map_err(|e| SetupError::io(format!("creating {}", dest.display()), e))?;
    let bytes = io::copy(&mut reader, &mut file).map_err(|e| to_download_err(e.to_string()))?;

    debug!("Downloaded {} bytes to {}", bytes, dest.display());
    Ok(dest)
}

fn extract_blocking(archive_path: &Path, dest_dir: &Path) -> SetupResult<()> {
    let to_archive_err = |source: io::Error| SetupError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dest_dir).map_err(to_archive_err)?;
    let file = File::open(archive_path).map_err(to_archive_err)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.unpack(dest_dir).map_err(to_archive_err)?;
    Ok(())
}

/// Download `url` into `dest_dir`, returning the local file path
pub async fn download(url: &str, dest_dir: &Path) -> SetupResult<PathBuf> {
    info!("Downloading {}", url);
    let url = url.to_string();
    let dest_dir = dest_dir.to_path_buf();
    tokio::task::spawn_blocking(move || download_blocking(&url, &dest_dir))
        .await
        .map_err(|e| SetupError::Internal(format!("Download task failed: {}", e)))?
}

/// Extract a `.tar.gz` archive into `dest_dir`
pub async fn extract_archive(archive_path: &Path, dest_dir: &Path) -> SetupResult<()> {
    info!("Extracting {} to {}", archive_path.display(), dest_dir.display());
    let archive_path = archive_path.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&archive_path, &dest_dir))
        .await
        .map_err(|e| SetupError::Internal(format!("Extract task failed: {}", e)))?
}
