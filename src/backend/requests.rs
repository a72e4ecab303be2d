/// Asynchronous requests against the catalog.
///
/// `rusqlite::Connection` is not `Send`, so the main connection cannot be
/// shared with background work. Every request opens its own connection on a
/// blocking worker, runs, and reports back through a cloneable error that can
/// travel inside an iced message.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::{LibraryError, RequestError};
use crate::search::ImageFilter;
use crate::state::data::{ImageId, ImageItem, Tag, TagId};
use crate::state::library::Library;

/// Run `f` against a fresh connection to the catalog at `db_path`
pub(crate) async fn with_library<T, F>(
    db_path: PathBuf,
    operation: &'static str,
    f: F,
) -> Result<T, RequestError>
where
    T: Send + 'static,
    F: FnOnce(&Library) -> Result<T, LibraryError> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        let library = Library::open(&db_path)?;
        f(&library)
    })
    .await;

    match joined {
        Ok(Ok(value)) => {
            debug!(operation, "request finished");
            Ok(value)
        }
        Ok(Err(e)) => {
            warn!(operation, error = %e, "⚠️  request failed");
            Err(RequestError::new(operation, e))
        }
        Err(e) => {
            warn!(operation, error = %e, "⚠️  request worker failed");
            Err(RequestError::new(operation, e))
        }
    }
}

pub async fn fetch_images(db_path: PathBuf, filter: ImageFilter) -> Result<Vec<ImageItem>, RequestError> {
    with_library(db_path, "fetch images", move |library| library.get_images(&filter)).await
}

pub async fn fetch_tags(db_path: PathBuf) -> Result<Vec<Tag>, RequestError> {
    with_library(db_path, "fetch tags", |library| library.get_tags()).await
}

pub async fn create_tag(db_path: PathBuf, name: String, color: String) -> Result<Tag, RequestError> {
    with_library(db_path, "create tag", move |library| library.create_tag(&name, &color)).await
}

pub async fn assign_tag(db_path: PathBuf, image: ImageId, tag: TagId) -> Result<(), RequestError> {
    with_library(db_path, "assign tag", move |library| library.add_tag_to_image(image, tag)).await
}

pub async fn remove_tag(db_path: PathBuf, image: ImageId, tag: TagId) -> Result<(), RequestError> {
    with_library(db_path, "remove tag", move |library| library.remove_tag_from_image(image, tag)).await
}

/// Mark catalog entries whose files disappeared; returns how many are missing
pub async fn verify_files(db_path: PathBuf) -> Result<usize, RequestError> {
    with_library(db_path, "verify files", |library| library.verify_files()).await
}


#[cfg(test)]
mod tests {
    use super::testing::scratch_dir;
    use super::*;

    fn seeded_catalog(label: &str) -> (PathBuf, ImageId) {
        let dir = scratch_dir(label);
        let db_path = dir.join("catalog.db");
        let image_path = dir.join("sunset.jpg");
        std::fs::write(&image_path, b"not really a jpeg").unwrap();

        let library = Library::open(&db_path).unwrap();
        let id = library
            .import_image(&image_path.to_string_lossy(), "sunset.jpg", 640, 480)
            .unwrap()
            .unwrap();
        (db_path, id)
    }

    #[tokio::test]
    async fn test_tag_round_trip() {
        let (db_path, image) = seeded_catalog("requests-round-trip");

        let tag = create_tag(db_path.clone(), "beach".into(), "#ff0000".into())
            .await
            .unwrap();
        assert_eq!(fetch_tags(db_path.clone()).await.unwrap(), vec![tag.clone()]);

        assign_tag(db_path.clone(), image, tag.id).await.unwrap();
        let images = fetch_images(db_path.clone(), ImageFilter::new([tag.id], ""))
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].tags, vec![tag.clone()]);

        remove_tag(db_path.clone(), image, tag.id).await.unwrap();
        let images = fetch_images(db_path, ImageFilter::new([tag.id], "")).await.unwrap();
        assert!(images.is_empty());
    }

    #[tokio::test]
    async fn test_failures_become_request_errors() {
        let (db_path, image) = seeded_catalog("requests-errors");

        create_tag(db_path.clone(), "dup".into(), "#000".into()).await.unwrap();
        let err = create_tag(db_path.clone(), "dup".into(), "#000".into())
            .await
            .unwrap_err();
        assert_eq!(err.operation, "create tag");

        let err = assign_tag(db_path, image, TagId(999)).await.unwrap_err();
        assert_eq!(err.operation, "assign tag");
        assert!(err.to_string().contains("999"));
    }

    #[tokio::test]
    async fn test_verify_files_reports_missing() {
        let (db_path, _) = seeded_catalog("requests-verify");
        assert_eq!(verify_files(db_path.clone()).await.unwrap(), 0);

        std::fs::remove_file(db_path.with_file_name("sunset.jpg")).unwrap();
        assert_eq!(verify_files(db_path.clone()).await.unwrap(), 1);
        assert!(fetch_images(db_path, ImageFilter::default()).await.unwrap().is_empty());
    }
}
