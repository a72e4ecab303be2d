use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::data::{ImageId, ImageItem, Tag, TagId};
use crate::error::LibraryError;
use crate::search::ImageFilter;

/// The Library manages the SQLite catalog database.
/// It stores image metadata, tags and the image/tag relation.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Open the catalog at its default location, creating it if needed.
    ///
    /// The database file is created in the user's data directory:
    /// - Linux: ~/.local/share/image-browser/image_browser.db
    /// - macOS: ~/Library/Application Support/image-browser/image_browser.db
    /// - Windows: %APPDATA%\image-browser\image_browser.db
    pub fn new() -> Result<Self, LibraryError> {
        let db_path = Self::default_db_path()?;
        Self::open(&db_path)
    }

    /// Open (or create) a catalog at an explicit path
    pub fn open(db_path: &Path) -> Result<Self, LibraryError> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        debug!(path = %db_path.display(), "catalog opened");

        let mut library = Library {
            conn,
            db_path: db_path.to_path_buf(),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Throwaway catalog, used by tests
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, LibraryError> {
        let mut library = Library {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Get the path where the database should be stored
    pub fn default_db_path() -> Result<PathBuf, LibraryError> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(LibraryError::NoDataDir)?;

        path.push("image-browser");
        path.push("image_browser.db");
        Ok(path)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&mut self) -> Result<(), LibraryError> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS images (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                path            TEXT NOT NULL UNIQUE,
                filename        TEXT NOT NULL,
                width           INTEGER NOT NULL DEFAULT 0,
                height          INTEGER NOT NULL DEFAULT 0,
                imported_at     INTEGER NOT NULL,
                file_status     TEXT NOT NULL DEFAULT 'exists'
            );

            CREATE TABLE IF NOT EXISTS tags (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL UNIQUE,
                color           TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS image_tags (
                image_id        INTEGER NOT NULL,
                tag_id          INTEGER NOT NULL,
                PRIMARY KEY (image_id, tag_id),
                FOREIGN KEY(image_id) REFERENCES images(id) ON DELETE CASCADE,
                FOREIGN KEY(tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_images_imported_at
                ON images(imported_at DESC);

            CREATE INDEX IF NOT EXISTS idx_image_tags_tag_id
                ON image_tags(tag_id);",
        )?;

        debug!("catalog schema initialized");
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Get a count of images in the library
    pub fn image_count(&self) -> Result<i64, LibraryError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Import a new image into the library.
    /// Returns the new image ID, or `None` if the path was already imported.
    pub fn import_image(
        &self,
        path: &str,
        filename: &str,
        width: u32,
        height: u32,
    ) -> Result<Option<ImageId>, LibraryError> {
        let result = self.conn.execute(
            "INSERT INTO images (path, filename, width, height, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path, filename, width, height, chrono::Utc::now().timestamp()],
        );

        match result {
            Ok(_) => Ok(Some(ImageId(self.conn.last_insert_rowid()))),
            // UNIQUE constraint violation means a duplicate path
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Images matching `filter`, newest first.
    /// Files that disappeared from disk are left out.
    pub fn get_images(&self, filter: &ImageFilter) -> Result<Vec<ImageItem>, LibraryError> {
        let mut tags_by_image = self.tags_by_image()?;

        let mut stmt = self.conn.prepare(
            "SELECT id, path, filename, width, height FROM images
             WHERE file_status = 'exists'
             ORDER BY imported_at DESC, id DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                ImageId(row.get(0)?),
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut images = Vec::new();
        for row in rows {
            let (id, path, filename, width, height) = row?;
            let image = ImageItem {
                id,
                url: path,
                width: width as f32,
                height: height as f32,
                name: filename,
                tags: tags_by_image.remove(&id).unwrap_or_default(),
            };
            if filter.matches(&image) {
                images.push(image);
            }
        }

        Ok(images)
    }

    fn tags_by_image(&self) -> Result<HashMap<ImageId, Vec<Tag>>, LibraryError> {
        let mut stmt = self.conn.prepare(
            "SELECT it.image_id, t.id, t.name, t.color
             FROM image_tags it JOIN tags t ON t.id = it.tag_id
             ORDER BY t.name COLLATE NOCASE",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                ImageId(row.get(0)?),
                Tag::new(TagId(row.get(1)?), row.get::<_, String>(2)?, row.get::<_, String>(3)?),
            ))
        })?;

        let mut map: HashMap<ImageId, Vec<Tag>> = HashMap::new();
        for row in rows {
            let (image_id, tag) = row?;
            map.entry(image_id).or_default().push(tag);
        }
        Ok(map)
    }

    /// All tags, alphabetically
    pub fn get_tags(&self) -> Result<Vec<Tag>, LibraryError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color FROM tags ORDER BY name COLLATE NOCASE")?;

        let tags = stmt
            .query_map([], |row| {
                Ok(Tag::new(TagId(row.get(0)?), row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tags)
    }

    pub fn create_tag(&self, name: &str, color: &str) -> Result<Tag, LibraryError> {
        let name = name.trim();
        let result = self.conn.execute(
            "INSERT INTO tags (name, color) VALUES (?1, ?2)",
            params![name, color],
        );

        match result {
            Ok(_) => {
                let tag = Tag::new(TagId(self.conn.last_insert_rowid()), name, color);
                info!(tag = %tag.name, id = %tag.id, "🏷️  created tag");
                Ok(tag)
            }
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Err(LibraryError::DuplicateTag(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Attach a tag to an image. Attaching twice is a no-op.
    pub fn add_tag_to_image(&self, image_id: ImageId, tag_id: TagId) -> Result<(), LibraryError> {
        self.ensure_image(image_id)?;
        self.ensure_tag(tag_id)?;

        self.conn.execute(
            "INSERT OR IGNORE INTO image_tags (image_id, tag_id) VALUES (?1, ?2)",
            params![image_id.0, tag_id.0],
        )?;
        Ok(())
    }

    pub fn remove_tag_from_image(&self, image_id: ImageId, tag_id: TagId) -> Result<(), LibraryError> {
        self.ensure_image(image_id)?;

        self.conn.execute(
            "DELETE FROM image_tags WHERE image_id = ?1 AND tag_id = ?2",
            params![image_id.0, tag_id.0],
        )?;
        Ok(())
    }

    fn ensure_image(&self, image_id: ImageId) -> Result<(), LibraryError> {
        self.conn
            .query_row("SELECT 1 FROM images WHERE id = ?1", [image_id.0], |_| Ok(()))
            .optional()?
            .ok_or(LibraryError::UnknownImage(image_id))
    }

    fn ensure_tag(&self, tag_id: TagId) -> Result<(), LibraryError> {
        self.conn
            .query_row("SELECT 1 FROM tags WHERE id = ?1", [tag_id.0], |_| Ok(()))
            .optional()?
            .ok_or(LibraryError::UnknownTag(tag_id))
    }

    /// Verify that image files still exist on disk.
    /// Missing files are marked 'deleted', files that came back are restored.
    pub fn verify_files(&self) -> Result<usize, LibraryError> {
        let mut stmt = self.conn.prepare("SELECT id, path, file_status FROM images")?;

        let known: Vec<(i64, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut deleted_count = 0;
        for (id, file_path, status) in known {
            let exists = Path::new(&file_path).exists();
            let wanted = if exists { "exists" } else { "deleted" };
            if wanted != status {
                self.conn.execute(
                    "UPDATE images SET file_status = ?1 WHERE id = ?2",
                    params![wanted, id],
                )?;
            }
            if !exists {
                deleted_count += 1;
            }
        }

        if deleted_count > 0 {
            warn!(count = deleted_count, "⚠️  marked missing files as deleted");
        }

        Ok(deleted_count)
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_with_images() -> (Library, ImageId, ImageId) {
        let library = Library::open_in_memory().unwrap();
        let lake = library
            .import_image("/photos/lake.jpg", "lake.jpg", 400, 300)
            .unwrap()
            .unwrap();
        let dune = library
            .import_image("/photos/dune.png", "Dune.png", 300, 600)
            .unwrap()
            .unwrap();
        (library, lake, dune)
    }

    #[test]
    fn test_duplicate_import_is_skipped() {
        let (library, _, _) = library_with_images();
        let again = library
            .import_image("/photos/lake.jpg", "lake.jpg", 400, 300)
            .unwrap();

        assert!(again.is_none());
        assert_eq!(library.image_count().unwrap(), 2);
    }

    #[test]
    fn test_images_carry_dimensions_and_tags() {
        let (library, lake, _) = library_with_images();
        let tag = library.create_tag("water", "#00f").unwrap();
        library.add_tag_to_image(lake, tag.id).unwrap();
        // second time is a no-op
        library.add_tag_to_image(lake, tag.id).unwrap();

        let images = library.get_images(&ImageFilter::default()).unwrap();
        let lake_item = images.iter().find(|i| i.id == lake).unwrap();

        assert_eq!(lake_item.width, 400.0);
        assert_eq!(lake_item.height, 300.0);
        assert_eq!(lake_item.tags, vec![tag]);
    }

    #[test]
    fn test_filter_by_tags_and_text() {
        let (library, lake, dune) = library_with_images();
        let water = library.create_tag("water", "#00f").unwrap();
        let nature = library.create_tag("nature", "#0f0").unwrap();
        library.add_tag_to_image(lake, water.id).unwrap();
        library.add_tag_to_image(lake, nature.id).unwrap();
        library.add_tag_to_image(dune, nature.id).unwrap();

        let both = library
            .get_images(&ImageFilter::new([water.id, nature.id], ""))
            .unwrap();
        assert_eq!(both.iter().map(|i| i.id).collect::<Vec<_>>(), vec![lake]);

        let by_name = library.get_images(&ImageFilter::new([], "dune")).unwrap();
        assert_eq!(by_name.iter().map(|i| i.id).collect::<Vec<_>>(), vec![dune]);
    }

    #[test]
    fn test_remove_tag() {
        let (library, lake, _) = library_with_images();
        let tag = library.create_tag("water", "#00f").unwrap();
        library.add_tag_to_image(lake, tag.id).unwrap();
        library.remove_tag_from_image(lake, tag.id).unwrap();

        let images = library.get_images(&ImageFilter::new([tag.id], "")).unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn test_duplicate_tag_name_fails() {
        let library = Library::open_in_memory().unwrap();
        library.create_tag("water", "#00f").unwrap();

        assert!(matches!(
            library.create_tag("water", "#f00"),
            Err(LibraryError::DuplicateTag(name)) if name == "water"
        ));
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        let (library, lake, _) = library_with_images();
        assert!(matches!(
            library.add_tag_to_image(lake, TagId(99)),
            Err(LibraryError::UnknownTag(TagId(99)))
        ));
        assert!(matches!(
            library.remove_tag_from_image(ImageId(42), TagId(1)),
            Err(LibraryError::UnknownImage(ImageId(42)))
        ));
    }

    #[test]
    fn test_missing_files_are_hidden() {
        let (library, _, _) = library_with_images();
        // Neither /photos path exists in the test environment
        assert_eq!(library.verify_files().unwrap(), 2);
        assert!(library.get_images(&ImageFilter::default()).unwrap().is_empty());
    }
}
