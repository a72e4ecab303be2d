/// Offscreen measurement of UI fragments.
///
/// A fragment is laid out inside a detached, invisible container hanging off a
/// dedicated off-screen root. Measurement only reads geometry once every image
/// embedded in the fragment has settled (loaded or failed) and two frame ticks
/// have passed, so heights that depend on decoded image sizes are correct.
///
/// Every call attaches its own container and tears it down when done, so
/// concurrent measurements never see each other's geometry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::geometry::Rect;
use crate::error::MeasureError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Natural pixel size of a decoded image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: f32,
    pub height: f32,
}

/// Outcome of waiting for one embedded image. Both variants count as settled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageLoad {
    Loaded(ImageSize),
    Failed,
}

/// Settled images of one fragment, by source
#[derive(Debug, Clone, Default)]
pub struct ImageSizes {
    sizes: HashMap<String, ImageLoad>,
}

impl ImageSizes {
    pub fn insert(&mut self, source: impl Into<String>, load: ImageLoad) {
        self.sizes.insert(source.into(), load);
    }

    /// `None` for failed or never-settled images; they take no space
    pub fn get(&self, source: &str) -> Option<ImageSize> {
        match self.sizes.get(source) {
            Some(ImageLoad::Loaded(size)) => Some(*size),
            _ => None,
        }
    }
}

/// Loads images and reports their natural size
pub trait ImageLoader: Send + Sync {
    fn load(&self, source: &str) -> BoxFuture<ImageLoad>;
}

/// Drives the two frame ticks measurement waits for after images settle
pub trait FrameClock: Send + Sync {
    fn next_frame(&self) -> BoxFuture<()>;
}

/// Reads image headers from disk on a blocking worker, remembering results so
/// images seen before settle immediately
#[derive(Debug, Default)]
pub struct DiskImageLoader {
    seen: Arc<Mutex<HashMap<String, ImageLoad>>>,
}

impl DiskImageLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageLoader for DiskImageLoader {
    fn load(&self, source: &str) -> BoxFuture<ImageLoad> {
        let cached = self
            .seen
            .lock()
            .ok()
            .and_then(|seen| seen.get(source).copied());
        if let Some(load) = cached {
            return Box::pin(async move { load });
        }

        let seen = Arc::clone(&self.seen);
        let source = source.to_string();
        Box::pin(async move {
            let path = source.clone();
            let load = match tokio::task::spawn_blocking(move || image::image_dimensions(&path)).await {
                Ok(Ok((width, height))) => ImageLoad::Loaded(ImageSize {
                    width: width as f32,
                    height: height as f32,
                }),
                Ok(Err(e)) => {
                    warn!(%source, error = %e, "image failed to load");
                    ImageLoad::Failed
                }
                Err(e) => {
                    warn!(%source, error = %e, "image load task failed");
                    ImageLoad::Failed
                }
            };
            if let Ok(mut seen) = seen.lock() {
                seen.insert(source, load);
            }
            load
        })
    }
}

/// Frame ticks from a fixed interval timer
#[derive(Debug, Clone, Copy)]
pub struct IntervalClock {
    pub interval: Duration,
}

impl FrameClock for IntervalClock {
    fn next_frame(&self) -> BoxFuture<()> {
        let interval = self.interval;
        Box::pin(async move { tokio::time::sleep(interval).await })
    }
}

/// A box in a laid-out fragment. Offsets are relative to the fragment origin.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentBox {
    pub id: Option<&'static str>,
    pub bounds: Rect,
    pub children: Vec<FragmentBox>,
}

impl FragmentBox {
    pub fn new(bounds: Rect) -> Self {
        Self {
            id: None,
            bounds,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: &'static str) -> Self {
        self.id = Some(id);
        self
    }

    pub fn push(mut self, child: FragmentBox) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first search for a descendant (or self) with `id`
    pub fn find(&self, id: &str) -> Option<&FragmentBox> {
        if self.id == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

/// Something that can be laid out offscreen
pub trait Fragment: Send + Sync {
    /// Sources of every image embedded in the fragment
    fn images(&self) -> Vec<String>;

    /// Lay the fragment out at `width` once its images have settled
    fn layout(&self, width: f32, images: &ImageSizes) -> FragmentBox;
}

/// Frame box plus, when asked for, the box of a named descendant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub frame: Rect,
    pub target: Option<Rect>,
}

/// The dedicated root detached measuring containers hang off
pub struct OffscreenRoot {
    loader: Arc<dyn ImageLoader>,
    clock: Arc<dyn FrameClock>,
    settle_timeout: Option<Duration>,
    containers: Mutex<HashMap<u64, f32>>,
    next_container: AtomicU64,
}

impl OffscreenRoot {
    pub fn new(
        loader: Arc<dyn ImageLoader>,
        clock: Arc<dyn FrameClock>,
        settle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            loader,
            clock,
            settle_timeout,
            containers: Mutex::new(HashMap::new()),
            next_container: AtomicU64::new(1),
        }
    }

    /// Number of containers currently attached
    #[cfg(test)]
    pub fn attached(&self) -> usize {
        self.containers.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn attach(self: &Arc<Self>, width: f32) -> DetachedContainer {
        let id = self.next_container.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut containers) = self.containers.lock() {
            containers.insert(id, width);
        }
        DetachedContainer {
            root: Arc::clone(self),
            id,
            width,
        }
    }

    /// Load every image concurrently. Returns once all have settled or the
    /// settle timeout elapsed, whichever comes first.
    async fn settle_images(&self, sources: Vec<String>) -> ImageSizes {
        let mut sizes = ImageSizes::default();
        if sources.is_empty() {
            return sizes;
        }

        let mut pending = JoinSet::new();
        for source in sources {
            let load = self.loader.load(&source);
            pending.spawn(async move { (source, load.await) });
        }

        let settle = async {
            while let Some(joined) = pending.join_next().await {
                match joined {
                    Ok((source, load)) => sizes.insert(source, load),
                    Err(e) => warn!(error = %e, "image settle task failed"),
                }
            }
        };

        match self.settle_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, settle).await.is_err() {
                    warn!(?limit, "gave up waiting for images, measuring anyway");
                }
            }
            None => settle.await,
        }

        sizes
    }
}

/// A measuring container; detached from the root on drop
struct DetachedContainer {
    root: Arc<OffscreenRoot>,
    id: u64,
    width: f32,
}

impl Drop for DetachedContainer {
    fn drop(&mut self) {
        if let Ok(mut containers) = self.root.containers.lock() {
            containers.remove(&self.id);
        }
    }
}

/// Handle used by the layout engine to measure fragments
#[derive(Clone)]
pub struct MeasureService {
    root: Arc<OffscreenRoot>,
}

impl MeasureService {
    /// Requesting the service without an offscreen root is a configuration
    /// error and reported right away, not through a failed measurement.
    pub fn attach(root: Option<Arc<OffscreenRoot>>) -> Result<Self, MeasureError> {
        root.map(|root| Self { root }).ok_or(MeasureError::MissingRoot)
    }

    /// Bounding box of `fragment` laid out at `width`, plus the box of the
    /// `target` descendant relative to the fragment origin when one is named.
    /// Both come from the same layout.
    pub fn measure<F>(
        &self,
        fragment: F,
        width: f32,
        target: Option<&str>,
    ) -> impl Future<Output = Result<FrameGeometry, MeasureError>> + Send + 'static
    where
        F: Fragment + 'static,
    {
        let root = Arc::clone(&self.root);
        let target = target.map(str::to_string);

        async move {
            let container = root.attach(width);
            debug!(container = container.id, width, "measuring fragment");

            let sizes = root.settle_images(fragment.images()).await;

            root.clock.next_frame().await;
            root.clock.next_frame().await;

            let laid_out = fragment.layout(container.width, &sizes);
            let frame = Rect::new(0.0, 0.0, laid_out.bounds.width, laid_out.bounds.height);

            let target = match target {
                Some(id) => {
                    let found = laid_out
                        .find(&id)
                        .ok_or_else(|| MeasureError::TargetNotFound(id.clone()))?;
                    Some(found.bounds.translate(-laid_out.bounds.x, -laid_out.bounds.y))
                }
                None => None,
            };

            drop(container);
            Ok(FrameGeometry { frame, target })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    /// One image followed by a fixed 40px caption
    struct Captioned {
        source: String,
    }

    impl Fragment for Captioned {
        fn images(&self) -> Vec<String> {
            vec![self.source.clone()]
        }

        fn layout(&self, width: f32, images: &ImageSizes) -> FragmentBox {
            let image_height = images
                .get(&self.source)
                .map(|size| size.height * width / size.width)
                .unwrap_or(0.0);
            FragmentBox::new(Rect::new(0.0, 0.0, width, 10.0 + image_height + 40.0))
                .push(FragmentBox::new(Rect::new(0.0, 10.0, width, image_height)).with_id("image"))
        }
    }

    fn captioned(source: &str) -> Captioned {
        Captioned {
            source: source.to_string(),
        }
    }

    fn loaded(width: f32, height: f32) -> ImageLoad {
        ImageLoad::Loaded(ImageSize { width, height })
    }

    #[test]
    fn test_missing_root_is_reported_synchronously() {
        assert_eq!(MeasureService::attach(None).err(), Some(MeasureError::MissingRoot));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_images_before_measuring() {
        let loader = ScriptedLoader::default().with("slow.jpg", 500, loaded(200.0, 100.0));
        let service = MeasureService::attach(Some(root_with(loader, None))).unwrap();

        let rect = service.measure(captioned("slow.jpg"), 400.0, None).await.unwrap().frame;

        // 10 + 200 (400 wide at 2:1) + 40
        assert_eq!(rect, Rect::new(0.0, 0.0, 400.0, 250.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_image_counts_as_settled() {
        let loader = ScriptedLoader::default().with("broken.jpg", 5, ImageLoad::Failed);
        let service = MeasureService::attach(Some(root_with(loader, None))).unwrap();

        let rect = service.measure(captioned("broken.jpg"), 300.0, None).await.unwrap().frame;
        assert_eq!(rect.height, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_box_is_relative_to_fragment() {
        let loader = ScriptedLoader::default().with("a.jpg", 1, loaded(100.0, 100.0));
        let service = MeasureService::attach(Some(root_with(loader, None))).unwrap();

        let geometry = service
            .measure(captioned("a.jpg"), 300.0, Some("image"))
            .await
            .unwrap();

        assert_eq!(geometry.frame.height, 350.0);
        assert_eq!(geometry.target, Some(Rect::new(0.0, 10.0, 300.0, 300.0)));

        let missing = service.measure(captioned("a.jpg"), 300.0, Some("nope")).await;
        assert_eq!(missing, Err(MeasureError::TargetNotFound("nope".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_loading_image_times_out() {
        // "stuck.jpg" is not scripted and takes an hour
        let root = root_with(ScriptedLoader::default(), Some(Duration::from_millis(200)));
        let service = MeasureService::attach(Some(root)).unwrap();

        let rect = service.measure(captioned("stuck.jpg"), 300.0, None).await.unwrap().frame;
        assert_eq!(rect.height, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_measurements_use_separate_containers() {
        let loader = ScriptedLoader::default()
            .with("wide.jpg", 30, loaded(400.0, 100.0))
            .with("tall.jpg", 10, loaded(100.0, 400.0));
        let root = root_with(loader, None);
        let service = MeasureService::attach(Some(Arc::clone(&root))).unwrap();

        let wide = tokio::spawn(service.measure(captioned("wide.jpg"), 200.0, None));
        let tall = tokio::spawn(service.measure(captioned("tall.jpg"), 100.0, None));

        tokio::task::yield_now().await;
        assert_eq!(root.attached(), 2);

        let (wide, tall) = (wide.await.unwrap().unwrap().frame, tall.await.unwrap().unwrap().frame);
        assert_eq!(wide, Rect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(tall, Rect::new(0.0, 0.0, 100.0, 450.0));
        assert_eq!(root.attached(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_container_is_detached_after_error() {
        let loader = ScriptedLoader::default().with("a.jpg", 1, loaded(1.0, 1.0));
        let root = root_with(loader, None);
        let service = MeasureService::attach(Some(Arc::clone(&root))).unwrap();

        let _ = service.measure(captioned("a.jpg"), 100.0, Some("missing")).await;
        assert_eq!(root.attached(), 0);
    }
}
