use iced::keyboard::{self, key::Named, Key};
use iced::widget::{column, scrollable, stack};
use iced::{event, window, Element, Event, Size, Subscription, Task, Theme};
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod backend;
mod color;
mod error;
mod layout;
mod search;
mod selection;
mod state;
mod ui;

use backend::import::{import_folder_async, ImportResult};
use backend::requests;
use error::{MeasureError, RequestError};
use layout::debounce::{DebounceTicket, Debouncer};
use layout::engine::{LayoutEngine, PassRequest, PassTicket};
use layout::geometry::Rect;
use layout::measure::{DiskImageLoader, FrameGeometry, IntervalClock, MeasureService, OffscreenRoot};
use search::{ImageFilter, SearchFacet};
use selection::controller::{Back, Mode, SelectionController};
use selection::route::Route;
use selection::transition::{AnchorAnimator, AnchorKey};
use state::cache::{Dispatch, MutationId, QueryCache, TagOp};
use state::config::GalleryConfig;
use state::data::{ImageId, ImageItem, Tag, TagId};
use state::library::Library;
use ui::gallery::GalleryView;
use ui::search_bar::SEARCH_BAR_HEIGHT;

const INITIAL_WINDOW_SIZE: Size = Size::new(1280.0, 860.0);

/// Main application state
struct ImageBrowser {
    config: GalleryConfig,
    /// The catalog database
    library: Library,
    /// Images and tags as last confirmed by the catalog, plus local edits
    cache: QueryCache,
    search: SearchFacet,
    engine: LayoutEngine,
    measure: MeasureService,
    /// Container widths waiting for the resize burst to end
    resize: Debouncer<f32>,
    selection: SelectionController,
    animator: AnchorAnimator,
    /// Window size
    viewport: Size,
    scroll_y: f32,
    /// Contents of the detail card's tag input
    tag_input: String,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    ImagesFetched(ImageFilter, Result<Vec<ImageItem>, RequestError>),
    TagsFetched(Result<Vec<Tag>, RequestError>),
    FilesVerified(Result<usize, RequestError>),

    Resized(Size),
    ResizeSettled(DebounceTicket),
    Scrolled(scrollable::Viewport),
    Measured(PassTicket, Result<FrameGeometry, MeasureError>),
    Tick,

    /// Grid item clicked
    Open(ImageId),
    Back,
    Escape,
    Backspace,
    /// Detail card image clicked
    EnterFullscreen(ImageId),
    CloseFullscreen,

    SearchInput(String),
    SearchSubmit,
    SearchSelectTag(Tag),
    SearchRemoveTag(TagId),
    SearchClear,

    TagInput(String),
    TagSubmit,
    RemoveTag(ImageId, TagId),
    TagCreated(MutationId, Result<Tag, RequestError>),
    TagChanged(MutationId, Result<(), RequestError>),

    /// User clicked the "Import Folder" button
    ImportFolder,
    /// Background import completed with results
    ImportComplete(Result<ImportResult, RequestError>),
}

impl ImageBrowser {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = GalleryConfig::load().unwrap_or_else(|e| {
            error!(error = %e, "⚠️  could not load config, using defaults");
            GalleryConfig::default()
        });

        // Initialize the database
        // If this fails, we panic because the app cannot function without its database
        let library = match &config.library_path {
            Some(path) => Library::open(path),
            None => Library::new(),
        }
        .expect("Failed to initialize database. Check permissions and disk space.");

        // Same for the offscreen root: without it the detail frame cannot be sized
        let root = OffscreenRoot::new(
            Arc::new(DiskImageLoader::new()),
            Arc::new(IntervalClock {
                interval: config.frame_interval(),
            }),
            config.measure_settle_timeout(),
        );
        let measure = MeasureService::attach(Some(Arc::new(root)))
            .expect("Failed to attach the offscreen measurement root.");

        let image_count = library.image_count().unwrap_or(0);
        info!(images = image_count, "🎨 Image Browser initialized");

        let mut app = ImageBrowser {
            engine: LayoutEngine::new(config.layout_params()),
            resize: Debouncer::new(config.resize_debounce()),
            selection: SelectionController::new(start_route(), config.transition()),
            animator: AnchorAnimator::new(config.transition()),
            library,
            measure,
            cache: QueryCache::new(),
            search: SearchFacet::new(),
            viewport: INITIAL_WINDOW_SIZE,
            scroll_y: 0.0,
            tag_input: String::new(),
            status: format!("Ready. {} images in library.", image_count),
            config,
        };

        let width = app.grid_width();
        let first_pass = app.engine.set_container_width(width);
        let verify = Task::perform(requests::verify_files(app.db_path()), Message::FilesVerified);

        let tasks = Task::batch([
            app.dispatch(first_pass),
            verify,
            app.fetch_tags(),
            app.fetch_images(),
        ]);
        (app, tasks)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ImagesFetched(filter, Ok(images)) => {
                if self.cache.images.receive(filter, images) {
                    return self.relayout();
                }
                Task::none()
            }
            Message::ImagesFetched(filter, Err(e)) => {
                self.cache.images.fetch_failed(&filter);
                self.status = format!("⚠️  {e}");
                Task::none()
            }
            Message::TagsFetched(Ok(tags)) => {
                self.cache.tags.receive(tags);
                let before = self.search.filter();
                self.search.retain_known(&self.cache.tags.tags());
                if self.search.filter() != before {
                    return self.refilter();
                }
                Task::none()
            }
            Message::TagsFetched(Err(e)) => {
                self.status = format!("⚠️  {e}");
                Task::none()
            }
            Message::FilesVerified(Ok(missing)) => {
                if missing == 0 {
                    return Task::none();
                }
                self.status = format!("⚠️  {missing} images are missing on disk.");
                self.refetch_images()
            }
            Message::FilesVerified(Err(e)) => {
                warn!(error = %e, "could not verify files");
                Task::none()
            }

            Message::Resized(size) => {
                self.viewport = size;
                self.selection.resize_viewport(size);
                let ticket = self.resize.signal(self.grid_width());
                Task::perform(self.resize.wait(ticket), Message::ResizeSettled)
            }
            Message::ResizeSettled(ticket) => match self.resize.fire(ticket) {
                Some(width) => {
                    let request = self.engine.set_container_width(width);
                    self.dispatch(request)
                }
                None => Task::none(),
            },
            Message::Scrolled(viewport) => {
                self.scroll_y = viewport.absolute_offset().y;
                Task::none()
            }
            Message::Measured(ticket, result) => {
                if self.engine.complete_measurement(ticket, result) {
                    self.on_published();
                }
                Task::none()
            }
            Message::Tick => {
                self.selection.tick(Instant::now());
                Task::none()
            }

            Message::Open(id) => {
                if !self.selection.open(id) {
                    return Task::none();
                }
                self.tag_input.clear();
                self.relayout()
            }
            Message::Back => match self.selection.navigate_back() {
                Back::CloseOverlay(_) => {
                    self.close_fullscreen();
                    Task::none()
                }
                Back::Route(_) => self.relayout(),
                Back::Nothing => Task::none(),
            },
            Message::Escape => match self.selection.mode() {
                Mode::Fullscreen(_) => {
                    self.close_fullscreen();
                    Task::none()
                }
                Mode::Detail(_) => self.update(Message::Back),
                Mode::Browsing => Task::none(),
            },
            Message::Backspace => {
                if self.search.backspace() {
                    return self.refilter();
                }
                Task::none()
            }
            Message::EnterFullscreen(id) => {
                let now = Instant::now();
                // Capture where the image is right now, before anything re-renders
                let on_screen = self.image_on_screen(id, now);
                let item = self.engine.items().iter().find(|item| item.id == id).cloned();
                if let (Some(item), Some(rect)) = (item, on_screen) {
                    self.selection.enter_fullscreen(item, rect, self.viewport, now);
                }
                Task::none()
            }
            Message::CloseFullscreen => {
                self.close_fullscreen();
                Task::none()
            }

            Message::SearchInput(input) => {
                let before = self.search.filter();
                self.search.set_input(input);
                if self.search.filter() != before {
                    return self.refilter();
                }
                Task::none()
            }
            Message::SearchSubmit => {
                if self.search.submit(&self.cache.tags.tags()) {
                    return self.refilter();
                }
                Task::none()
            }
            Message::SearchSelectTag(tag) => {
                self.search.select_tag(tag);
                self.refilter()
            }
            Message::SearchRemoveTag(id) => {
                self.search.remove_tag(id);
                self.refilter()
            }
            Message::SearchClear => {
                self.search.clear();
                self.refilter()
            }

            Message::TagInput(input) => {
                self.search.edited_elsewhere();
                self.tag_input = input;
                Task::none()
            }
            Message::TagSubmit => self.submit_tag(),
            Message::RemoveTag(image, tag) => {
                let ready = self.cache.change_tags(image, TagOp::Remove(tag));
                Task::batch([self.send(ready), self.relayout()])
            }
            Message::TagCreated(mutation, Ok(tag)) => {
                self.status = format!("🏷️  Created tag {}", tag.name);
                let ready = self.cache.tag_created(mutation, tag);
                Task::batch([self.send(ready), self.relayout()])
            }
            Message::TagCreated(mutation, Err(e)) => {
                self.status = format!("⚠️  {e}");
                let ready = self.cache.tag_rejected(mutation);
                Task::batch([self.send(ready), self.relayout()])
            }
            Message::TagChanged(mutation, result) => {
                if let Err(e) = &result {
                    self.status = format!("⚠️  {e}");
                }
                let ready = self.cache.tag_changed(mutation, result.is_ok());
                Task::batch([self.send(ready), self.relayout()])
            }

            Message::ImportFolder => {
                // Show the native folder picker dialog
                let folder = FileDialog::new()
                    .set_title("Select Folder with Photos")
                    .pick_folder();

                if let Some(folder_path) = folder {
                    self.status = format!("Importing from {}...", folder_path.display());
                    return Task::perform(
                        import_folder_async(folder_path, self.db_path()),
                        Message::ImportComplete,
                    );
                }

                Task::none()
            }
            Message::ImportComplete(Ok(result)) => {
                self.status = format!(
                    "✅ Import complete! Added {} images, skipped {} duplicates.",
                    result.imported_count, result.skipped_count
                );
                if result.failed_count > 0 {
                    self.status.push_str(&format!(" {} could not be read.", result.failed_count));
                }
                info!(
                    imported = result.imported_count,
                    skipped = result.skipped_count,
                    "📊 Import summary"
                );
                self.refetch_images()
            }
            Message::ImportComplete(Err(e)) => {
                self.status = format!("⚠️  {e}");
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        let now = Instant::now();

        let tags = self.cache.tags.tags();
        let suggestions = self.search.suggestions(&tags).into_iter().cloned().collect();

        let gallery = GalleryView {
            layout: self.engine.layout(),
            animator: &self.animator,
            selection: &self.selection,
            tag_input: &self.tag_input,
            padding: [self.config.padding_y, self.config.padding_x],
            loaded: self.cache.images.is_loaded(),
        }
        .view(now);

        let content = column![ui::search_bar::view(&self.search, suggestions, &self.status), gallery];

        match (self.selection.overlay_item(), self.selection.overlay_rect(now)) {
            (Some(item), Some(rect)) => stack![
                content,
                ui::fullscreen::overlay(item, rect, self.selection.overlay_opacity(now), self.viewport.height),
            ]
            .into(),
            _ => content.into(),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![
            window::resize_events().map(|(_id, size)| Message::Resized(size)),
            event::listen_with(key_message),
        ];

        // frame ticks only while something moves
        if self.is_animating(Instant::now()) {
            subscriptions.push(window::frames().map(|_| Message::Tick));
        }

        Subscription::batch(subscriptions)
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn db_path(&self) -> PathBuf {
        self.library.path().clone()
    }

    fn grid_width(&self) -> f32 {
        (self.viewport.width - 2.0 * self.config.padding_x).max(0.0)
    }

    fn is_animating(&self, now: Instant) -> bool {
        self.animator.is_animating(now) || self.selection.is_animating(now)
    }

    /// Cache view filtered by the active search
    fn visible_items(&self) -> Vec<ImageItem> {
        let filter = self.search.filter();
        self.cache
            .images
            .images()
            .into_iter()
            .filter(|image| filter.matches(image))
            .collect()
    }

    fn fetch_images(&mut self) -> Task<Message> {
        match self.cache.images.request(self.search.filter()) {
            Some(filter) => Task::perform(
                requests::fetch_images(self.db_path(), filter.clone()),
                move |result| Message::ImagesFetched(filter.clone(), result),
            ),
            None => Task::none(),
        }
    }

    fn refetch_images(&mut self) -> Task<Message> {
        match self.cache.images.invalidate() {
            Some(filter) => Task::perform(
                requests::fetch_images(self.db_path(), filter.clone()),
                move |result| Message::ImagesFetched(filter.clone(), result),
            ),
            None => Task::none(),
        }
    }

    fn fetch_tags(&self) -> Task<Message> {
        Task::perform(requests::fetch_tags(self.db_path()), Message::TagsFetched)
    }

    fn refilter(&mut self) -> Task<Message> {
        Task::batch([self.fetch_images(), self.relayout()])
    }

    /// Feed the current items and selection to the layout engine
    fn relayout(&mut self) -> Task<Message> {
        let visible = self.visible_items();
        let selection = self.selection.sync_with(&visible);

        let mut request = self.engine.set_items(visible);
        if self.engine.selection() != selection {
            request = self.engine.set_selection(selection);
        }
        self.dispatch(request)
    }

    fn dispatch(&mut self, request: PassRequest) -> Task<Message> {
        match request {
            PassRequest::Published => {
                self.on_published();
                Task::none()
            }
            PassRequest::Measure(job) => {
                let ticket = job.ticket;
                Task::perform(
                    self.measure.measure(job.frame, job.width, Some(job.target)),
                    move |result| Message::Measured(ticket, result),
                )
            }
        }
    }

    fn on_published(&mut self) {
        if let Some(layout) = self.engine.layout() {
            self.animator.retarget(layout, Instant::now());
        }
    }

    /// Window rectangle of an item's image, from where the grid draws it now
    fn image_on_screen(&self, id: ImageId, now: Instant) -> Option<Rect> {
        let rect = self
            .animator
            .rect(AnchorKey::SelectedImage(id), now)
            .or_else(|| self.animator.rect(AnchorKey::Slot(id), now))?;

        let top = SEARCH_BAR_HEIGHT + self.config.padding_y - self.scroll_y;
        Some(rect.translate(self.config.padding_x, top))
    }

    fn close_fullscreen(&mut self) {
        let now = Instant::now();
        let Some(id) = self.selection.overlay_item().map(|item| item.id) else {
            return;
        };

        // Shrink into the center if the item left the grid meanwhile
        let return_to = self.image_on_screen(id, now).unwrap_or(Rect::new(
            self.viewport.width / 2.0,
            self.viewport.height / 2.0,
            0.0,
            0.0,
        ));
        self.selection.leave_fullscreen(return_to, now);
    }

    /// Assign the tag named in the detail card, creating it first if needed
    fn submit_tag(&mut self) -> Task<Message> {
        let Mode::Detail(image) = self.selection.mode() else {
            return Task::none();
        };
        let name = self.tag_input.trim().to_string();
        if name.is_empty() {
            return Task::none();
        }
        self.tag_input.clear();

        if let Some(tag) = self.cache.tags.find_by_name(&name) {
            if self.cache.images.image(image).is_some_and(|item| item.has_tag(tag.id)) {
                return Task::none();
            }
            let ready = self.cache.change_tags(image, TagOp::Assign(tag));
            return Task::batch([self.send(ready), self.relayout()]);
        }

        let color = self.config.default_tag_color.clone();
        let (pending, ready) = self.cache.create_and_assign(image, &name, &color);

        let mutation = pending.mutation;
        let create = Task::perform(
            requests::create_tag(self.db_path(), name, color),
            move |result| Message::TagCreated(mutation, result),
        );

        Task::batch([create, self.send(ready), self.relayout()])
    }

    /// Send tag changes to the catalog
    fn send(&self, ready: Vec<Dispatch>) -> Task<Message> {
        Task::batch(ready.into_iter().map(|dispatch| self.request_mutation(dispatch)))
    }

    fn request_mutation(&self, dispatch: Dispatch) -> Task<Message> {
        let mutation = dispatch.mutation;
        let db_path = self.db_path();

        match dispatch.op {
            TagOp::Assign(tag) => Task::perform(
                requests::assign_tag(db_path, dispatch.image, tag.id),
                move |result| Message::TagChanged(mutation, result),
            ),
            TagOp::Remove(tag) => Task::perform(
                requests::remove_tag(db_path, dispatch.image, tag),
                move |result| Message::TagChanged(mutation, result),
            ),
        }
    }
}

/// Optional first argument: a route to open at startup, e.g. `/12/`
fn start_route() -> Route {
    match std::env::args().nth(1) {
        None => Route::Gallery,
        Some(arg) => Route::parse(&arg).unwrap_or_else(|| {
            warn!(%arg, "ignoring unknown start route");
            Route::Gallery
        }),
    }
}

/// Backspace only matters when a text input took it; the search facet then
/// knows from the input's own edit whether that input was the search bar
fn key_message(event: Event, status: event::Status, _window: window::Id) -> Option<Message> {
    match event {
        Event::Keyboard(keyboard::Event::KeyPressed {
            key: Key::Named(Named::Escape),
            ..
        }) => Some(Message::Escape),
        Event::Keyboard(keyboard::Event::KeyPressed {
            key: Key::Named(Named::Backspace),
            ..
        }) if status == event::Status::Captured => Some(Message::Backspace),
        _ => None,
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("image_browser=info")),
        )
        .init();

    iced::application("Image Browser", ImageBrowser::update, ImageBrowser::view)
        .subscription(ImageBrowser::subscription)
        .theme(ImageBrowser::theme)
        .window_size(INITIAL_WINDOW_SIZE)
        .centered()
        .run_with(ImageBrowser::new)
}
