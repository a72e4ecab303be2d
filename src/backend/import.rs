/// Folder import: walks a directory tree and adds every supported image to
/// the catalog together with its pixel dimensions.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use super::requests::with_library;
use crate::error::{LibraryError, RequestError};
use crate::state::library::Library;

/// Supported image file extensions
pub const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "tif"];

/// Result of a folder import operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub imported_count: usize,
    /// Already in the catalog
    pub skipped_count: usize,
    /// Could not be decoded far enough to read dimensions
    pub failed_count: usize,
}

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Import every supported image below `folder`
pub fn import_folder(library: &Library, folder: &Path) -> Result<ImportResult, LibraryError> {
    let mut result = ImportResult::default();

    info!(folder = %folder.display(), "🔍 scanning folder");

    // Walk the directory tree recursively
    for entry in WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_supported_image(path) {
            continue;
        }

        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        // Only the header is read here, not the whole image
        let (width, height) = match image::image_dimensions(path) {
            Ok(dimensions) => dimensions,
            Err(e) => {
                warn!(file = %filename, error = %e, "⚠️  unreadable image, skipping");
                result.failed_count += 1;
                continue;
            }
        };

        match library.import_image(&path.to_string_lossy(), &filename, width, height)? {
            Some(_) => {
                result.imported_count += 1;
                if result.imported_count % 100 == 0 {
                    info!(count = result.imported_count, "⏳ imported files");
                }
            }
            None => result.skipped_count += 1,
        }
    }

    info!(
        imported = result.imported_count,
        skipped = result.skipped_count,
        failed = result.failed_count,
        "✅ import complete"
    );

    Ok(result)
}

/// Background import on its own catalog connection
pub async fn import_folder_async(folder: PathBuf, db_path: PathBuf) -> Result<ImportResult, RequestError> {
    with_library(db_path, "import folder", move |library| import_folder(library, &folder)).await
}
