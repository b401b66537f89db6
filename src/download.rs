//! Downloads scene archives and extracts their raster members.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Error, Result};
use flate2::read::GzDecoder;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tar::Archive;
use tracing::debug;
use zip::ZipArchive;

use crate::error::ExtractionError;

/// Downloads with progress bar based on content length
pub async fn download_with_progress(url: &str, file_path: &Path, progress_bar: &ProgressBar) -> Result<(), Error> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::msg(format!("Failed to download file: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::msg(format!("Failed to download file: {}", response.status())));
    }

    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        progress_bar.set_length(total_size);
        progress_bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}")?
                .progress_chars("=> "),
        );
    }

    let mut file = File::create(file_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {}", e)))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }

    Ok(())
}

/// Extracts `member` from a zip or tar.gz archive into `dest_dir`.
///
/// The raster lands at `<dest_dir>/<file name of member>`.
pub fn extract_member(archive: &Path, member: &str, dest_dir: &Path) -> Result<PathBuf, ExtractionError> {
    let file_name = Path::new(member)
        .file_name()
        .ok_or_else(|| ExtractionError::MissingMember {
            archive: archive.to_path_buf(),
            member: member.to_string(),
        })?;
    let out_path = dest_dir.join(file_name);

    let name = archive.to_string_lossy();
    if name.ends_with(".zip") {
        extract_from_zip(archive, member, &out_path)?;
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_from_tar_gz(archive, member, &out_path)?;
    } else {
        return Err(ExtractionError::UnsupportedArchive(archive.to_path_buf()));
    }

    debug!("Extracted {} from {}", member, archive.display());

    Ok(out_path)
}

fn extract_from_zip(archive: &Path, member: &str, out_path: &Path) -> Result<(), ExtractionError> {
    let file = File::open(archive).map_err(|source| io_error(archive, source))?;
    let mut zip = ZipArchive::new(file).map_err(|source| ExtractionError::Archive {
        path: archive.to_path_buf(),
        source,
    })?;

    let mut entry = match zip.by_name(member) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ExtractionError::MissingMember {
                archive: archive.to_path_buf(),
                member: member.to_string(),
            })
        }
        Err(source) => {
            return Err(ExtractionError::Archive {
                path: archive.to_path_buf(),
                source,
            })
        }
    };

    write_entry(&mut entry, out_path)
}

fn extract_from_tar_gz(archive: &Path, member: &str, out_path: &Path) -> Result<(), ExtractionError> {
    let tar_gz = File::open(archive).map_err(|source| io_error(archive, source))?;
    let tar = GzDecoder::new(tar_gz);
    let mut tarball = Archive::new(tar);

    let entries = tarball.entries().map_err(|source| io_error(archive, source))?;
    for entry in entries {
        let mut entry = entry.map_err(|source| io_error(archive, source))?;
        let is_member = entry
            .path()
            .map(|path| path == Path::new(member))
            .map_err(|source| io_error(archive, source))?;
        if is_member {
            return write_entry(&mut entry, out_path);
        }
    }

    Err(ExtractionError::MissingMember {
        archive: archive.to_path_buf(),
        member: member.to_string(),
    })
}

fn write_entry<R: io::Read>(entry: &mut R, out_path: &Path) -> Result<(), ExtractionError> {
    let mut out = File::create(out_path).map_err(|source| io_error(out_path, source))?;
    if let Err(source) = io::copy(entry, &mut out) {
        drop(out);
        let _ = fs::remove_file(out_path);
        return Err(io_error(out_path, source));
    }

    Ok(())
}

fn io_error(path: &Path, source: io::Error) -> ExtractionError {
    ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    use super::*;

    /// Writes a zip holding `member` with `content`.
    pub(crate) fn write_zip(path: &Path, member: &str, content: &[u8]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(member, SimpleFileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
        zip.finish().unwrap();
    }

    fn write_tar_gz(path: &Path, member: &str, content: &[u8]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, member, content).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn should_extract_member_from_zip() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("SWS_a.zip");
        write_zip(&archive, "SWS_a/SWS_a_WSM.tif", b"raster");

        let out = extract_member(&archive, "SWS_a/SWS_a_WSM.tif", dir.path()).unwrap();

        assert_eq!(out, dir.path().join("SWS_a_WSM.tif"));
        assert_eq!(fs::read(out).unwrap(), b"raster");
    }

    #[test]
    fn should_extract_member_from_tar_gz() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("SWS_a.tar.gz");
        write_tar_gz(&archive, "SWS_a/SWS_a_WSM.tif", b"raster");

        let out = extract_member(&archive, "SWS_a/SWS_a_WSM.tif", dir.path()).unwrap();

        assert_eq!(fs::read(out).unwrap(), b"raster");
    }

    #[test]
    fn should_report_missing_member() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("SWS_a.zip");
        write_zip(&archive, "SWS_a/other.tif", b"raster");

        let result = extract_member(&archive, "SWS_a/SWS_a_WSM.tif", dir.path());

        assert!(matches!(result, Err(ExtractionError::MissingMember { .. })));
    }

    #[test]
    fn should_report_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("SWS_a.zip");
        fs::write(&archive, b"not a zip file").unwrap();

        let result = extract_member(&archive, "SWS_a/SWS_a_WSM.tif", dir.path());

        assert!(matches!(result, Err(ExtractionError::Archive { .. })));
    }

    #[test]
    fn should_reject_unknown_archive_type() {
        let dir = TempDir::new().unwrap();
        let result = extract_member(&dir.path().join("SWS_a.rar"), "x/y.tif", dir.path());

        assert!(matches!(result, Err(ExtractionError::UnsupportedArchive(_))));
    }

    /// Serves one HTTP response with `status` and `body` on a local port.
    fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        use std::{io::Read, net::TcpListener, thread};

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(body).unwrap();
        });

        format!("http://{}/SWS_a.zip", addr)
    }

    #[tokio::test]
    async fn should_download_body_and_track_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("SWS_a.zip");
        let url = serve_once("200 OK", b"archive bytes");
        let pb = ProgressBar::hidden();

        download_with_progress(&url, &path, &pb).await.unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"archive bytes");
        assert_eq!(pb.length(), Some(13));
        assert_eq!(pb.position(), 13);
    }

    #[tokio::test]
    async fn should_fail_on_error_status_without_creating_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("SWS_a.zip");
        let url = serve_once("404 Not Found", b"");

        let result = download_with_progress(&url, &path, &ProgressBar::hidden()).await;

        assert!(result.is_err());
        assert!(!path.exists());
    }
}
